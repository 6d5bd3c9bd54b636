//! Direct (time domain) convolution.
//!
//! The operands are put into a canonical order first: the shorter one is the
//! outer operand `a`, on equal lengths the one that compares lower sample by
//! sample under [`f64::total_cmp`]. Every output sample `z[n]` is then
//! accumulated over `a` in ascending index order,
//! `z[n] = ((a[0]·b[n] + a[1]·b[n-1]) + ...)`, skipping the terms that fall
//! outside of `b`. Both argument orders run the same additions, so
//! `convolve(x, y)` and `convolve(y, x)` are bit-identical.

use std::{cmp::Ordering, num::NonZeroUsize};

use rayon::prelude::*;

use crate::{Error, InvalidInput, Sequence};

/// Number of outer operand samples per rayon task in [`convolve_parallel`].
pub const PARTITION_LEN: usize = 4096;

/// Full convolution of `x` and `y`, `len(x) + len(y) - 1` samples long.
///
/// The result carries the offset of the longer input, `x` on a tie.
pub fn convolve(x: &Sequence, y: &Sequence) -> Result<Sequence, Error> {
    check_inputs(x, y)?;

    let (a, b) = canonical(x.as_slice(), y.as_slice());
    let data = accumulate(a, b);

    Ok(Sequence::new(data, result_offset(x, y)))
}

/// Same as [`convolve`], but splits the outer operand into `partitions`
/// contiguous chunks that are convolved on the rayon pool.
///
/// The partial results are merged by index-wise summation in ascending chunk
/// order, so the output only depends on the inputs and `partitions`, never on
/// scheduling. With a single partition it is bit-identical to [`convolve`].
pub fn convolve_partitioned(
    x: &Sequence,
    y: &Sequence,
    partitions: NonZeroUsize,
) -> Result<Sequence, Error> {
    check_inputs(x, y)?;

    let (a, b) = canonical(x.as_slice(), y.as_slice());
    let data = partitioned(a, b, partitions);

    Ok(Sequence::new(data, result_offset(x, y)))
}

/// [`convolve_partitioned`] with one partition per [`PARTITION_LEN`] samples
/// of the outer operand.
///
/// The partitioning follows from the input lengths alone, so results are
/// reproducible across machines and thread counts. Inputs with a shorter
/// outer operand than [`PARTITION_LEN`] give exactly [`convolve`]'s result.
pub fn convolve_parallel(x: &Sequence, y: &Sequence) -> Result<Sequence, Error> {
    check_inputs(x, y)?;

    let (a, b) = canonical(x.as_slice(), y.as_slice());
    let partitions =
        NonZeroUsize::new(a.len().div_ceil(PARTITION_LEN)).unwrap_or(NonZeroUsize::MIN);
    let data = partitioned(a, b, partitions);

    Ok(Sequence::new(data, result_offset(x, y)))
}

fn canonical<'a>(x: &'a [f64], y: &'a [f64]) -> (&'a [f64], &'a [f64]) {
    let order = x.len().cmp(&y.len()).then_with(|| {
        x.iter()
            .zip(y.iter())
            .map(|(a, b)| a.total_cmp(b))
            .find(|o| o.is_ne())
            .unwrap_or(Ordering::Equal)
    });

    match order {
        Ordering::Greater => (y, x),
        _ => (x, y),
    }
}

fn partitioned(a: &[f64], b: &[f64], partitions: NonZeroUsize) -> Vec<f64> {
    if partitions == NonZeroUsize::MIN {
        return accumulate(a, b);
    }

    let chunk_size = a.len().div_ceil(partitions.get());

    let partials: Vec<(usize, Vec<f64>)> = a
        .par_chunks(chunk_size)
        .enumerate()
        .map(|(n, chunk)| (n * chunk_size, accumulate(chunk, b)))
        .collect();

    let mut data = vec![0.0; a.len() + b.len() - 1];
    for (start, partial) in partials {
        for (z, p) in data[start..].iter_mut().zip(partial) {
            *z += p;
        }
    }

    data
}

fn accumulate(a: &[f64], b: &[f64]) -> Vec<f64> {
    let mut z = vec![0.0; a.len() + b.len() - 1];

    for (i, ai) in a.iter().enumerate() {
        for (j, bj) in b.iter().enumerate() {
            z[i + j] += ai * bj;
        }
    }

    z
}

pub(crate) fn check_inputs(x: &Sequence, y: &Sequence) -> Result<(), Error> {
    if x.is_empty() || y.is_empty() {
        return Err(InvalidInput::EmptySequence.into());
    }

    Ok(())
}

pub(crate) fn output_len(x: &Sequence, y: &Sequence) -> usize {
    x.len() + y.len() - 1
}

pub(crate) fn result_offset(x: &Sequence, y: &Sequence) -> i64 {
    if x.len() < y.len() {
        y.offset()
    } else {
        x.offset()
    }
}
