use std::num::NonZeroUsize;

use crate::{Error, Sequence};

/// Distance in samples each recursion level looks back into the filter.
pub const DECIMATION_STRIDE: NonZeroUsize = match NonZeroUsize::new(3000) {
    Some(stride) => stride,
    None => panic!("decimation stride must not be zero"),
};

/// What to do when a lookback lands in front of the first sample.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BoundsPolicy {
    /// Fail with [`Error::IndexOutOfRange`].
    #[default]
    Strict,
    /// Count negative positions from the end of the buffer, as the legacy
    /// tool did. Positions that are still out of range after wrapping fail.
    Wrap,
}

impl std::fmt::Display for BoundsPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                BoundsPolicy::Strict => "strict",
                BoundsPolicy::Wrap => "wrap",
            }
        )
    }
}

/// Derives a filter sequence from a signal by recursive, decimated
/// self-reference:
///
/// ```text
/// for idx in 0..len
///     for k in 1..=depth
///         h[idx] = 2^-k * k * h[idx - stride * k]
/// ```
///
/// `h` starts out as a copy of the input and every step reads the evolving
/// buffer, so earlier writes feed later ones.
#[derive(Debug, Clone, Copy)]
pub struct Generator {
    depth: usize,
    policy: BoundsPolicy,
    stride: NonZeroUsize,
}

impl Generator {
    pub fn new(depth: usize, policy: BoundsPolicy) -> Self {
        Self {
            depth,
            policy,
            stride: DECIMATION_STRIDE,
        }
    }

    pub fn with_stride(mut self, stride: NonZeroUsize) -> Self {
        self.stride = stride;
        self
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn policy(&self) -> BoundsPolicy {
        self.policy
    }

    pub fn generate(&self, x: &Sequence) -> Result<Sequence, Error> {
        let mut h = x.as_slice().to_vec();
        let len = h.len();

        for idx in 0..len {
            for k in 1..=self.depth {
                let lookback = self.stride.get().saturating_mul(k);
                let source = self.source_index(idx, lookback, len)?;

                let gain = 2f64.powi(-(k as i32)) * k as f64;
                h[idx] = gain * h[source];
            }
        }

        Ok(Sequence::new(h, x.offset()))
    }

    fn source_index(&self, index: usize, lookback: usize, len: usize) -> Result<usize, Error> {
        if let Some(source) = index.checked_sub(lookback) {
            return Ok(source);
        }

        let out_of_range = Error::IndexOutOfRange {
            index,
            lookback,
            len,
        };

        match self.policy {
            BoundsPolicy::Strict => Err(out_of_range),
            BoundsPolicy::Wrap => (len + index).checked_sub(lookback).ok_or(out_of_range),
        }
    }
}

/// Shorthand for `Generator::new(depth, policy).generate(x)`.
pub fn generate(x: &Sequence, depth: usize, policy: BoundsPolicy) -> Result<Sequence, Error> {
    Generator::new(depth, policy).generate(x)
}

#[cfg(test)]
mod test {
    use std::num::NonZeroUsize;

    use rand::{rngs::SmallRng, Rng, SeedableRng};

    use super::{generate, BoundsPolicy, Generator, DECIMATION_STRIDE};
    use crate::{Error, Sequence};

    fn impulse_at(len: usize, index: usize) -> Sequence {
        let mut data = vec![0.0; len];
        data[index] = 1.0;
        Sequence::from_samples(data)
    }

    #[test]
    fn default_stride() {
        let x = impulse_at(6001, 5000);

        let explicit = Generator::new(1, BoundsPolicy::Wrap).with_stride(DECIMATION_STRIDE);
        let default = Generator::new(1, BoundsPolicy::Wrap);

        assert_eq!(DECIMATION_STRIDE.get(), 3000);
        assert_eq!(explicit.generate(&x).unwrap(), default.generate(&x).unwrap());
    }

    #[test]
    fn depth_zero_is_identity() {
        let mut rng = SmallRng::seed_from_u64(5);
        let x = Sequence::new((0..4000).map(|_| rng.gen_range(-1.0..1.0)).collect(), 3);

        for policy in [BoundsPolicy::Strict, BoundsPolicy::Wrap] {
            let h = generate(&x, 0, policy).unwrap();
            assert_eq!(h, x);
        }

        let empty = Sequence::from_samples(vec![]);
        assert_eq!(generate(&empty, 0, BoundsPolicy::Strict).unwrap(), empty);
    }

    #[test]
    fn strict_rejects_short_sequences() {
        for len in [1, 2, 100, 3000] {
            for depth in 1..=3 {
                let x = Sequence::from_samples(vec![1.0; len]);

                let err = generate(&x, depth, BoundsPolicy::Strict).unwrap_err();
                assert!(matches!(
                    err,
                    Error::IndexOutOfRange {
                        index: 0,
                        lookback: 3000,
                        len: l
                    } if l == len
                ));
            }
        }
    }

    #[test]
    fn strict_rejects_first_sample_of_long_sequence() {
        let x = impulse_at(6001, 5000);

        let err = generate(&x, 1, BoundsPolicy::Strict).unwrap_err();
        assert!(matches!(
            err,
            Error::IndexOutOfRange {
                index: 0,
                lookback: 3000,
                len: 6001
            }
        ));
    }

    #[test]
    fn wrap_chain_of_single_impulse() {
        let x = impulse_at(6001, 5000);

        let h = generate(&x, 1, BoundsPolicy::Wrap).unwrap();

        // h[1999] wraps around to x[5000], h[4999] then reads the new h[1999]
        let mut expected = vec![0.0; 6001];
        expected[1999] = 0.5;
        expected[4999] = 0.25;

        assert_eq!(h.len(), x.len());
        assert_eq!(h.as_slice()[5000], 0.0);
        assert_eq!(h.as_slice(), expected.as_slice());
        assert_eq!(x.as_slice()[5000], 1.0);
    }

    #[test]
    fn wrap_rejects_lookback_beyond_buffer() {
        let x = Sequence::from_samples(vec![1.0; 100]);

        let err = generate(&x, 1, BoundsPolicy::Wrap).unwrap_err();
        assert!(matches!(
            err,
            Error::IndexOutOfRange {
                index: 0,
                lookback: 3000,
                len: 100
            }
        ));
    }

    #[test]
    fn every_level_overwrites_the_sample() {
        let x = Sequence::from_samples(vec![1.0, 2.0, 3.0, 4.0]);
        let generator = Generator::new(2, BoundsPolicy::Wrap).with_stride(NonZeroUsize::MIN);

        let h = generator.generate(&x).unwrap();

        assert_eq!(h.as_slice(), &[1.5, 2.0, 0.75, 1.0]);
    }

    #[test]
    fn reads_already_written_samples() {
        let x = Sequence::new(vec![1.0, 2.0, 3.0, 4.0, 5.0], 2);
        let stride = NonZeroUsize::new(2).unwrap();
        let generator = Generator::new(1, BoundsPolicy::Wrap).with_stride(stride);

        let h = generator.generate(&x).unwrap();

        assert_eq!(h.as_slice(), &[2.0, 2.5, 1.0, 1.25, 0.5]);
        assert_eq!(h.offset(), 2);
    }
}
