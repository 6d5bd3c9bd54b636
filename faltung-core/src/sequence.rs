use std::{ops::Range, slice::Iter};

/// A finite, zero-indexed list of samples.
///
/// `offset` names the index that sits at position zero on a display axis.
/// It is carried along as metadata and never takes part in any computation.
#[derive(Debug, Clone, PartialEq)]
pub struct Sequence {
    data: Vec<f64>,
    offset: i64,
}

impl Sequence {
    pub fn new(data: Vec<f64>, offset: i64) -> Self {
        Self { data, offset }
    }

    pub fn from_samples(data: Vec<f64>) -> Self {
        Self::new(data, 0)
    }

    pub fn with_offset(self, offset: i64) -> Self {
        Self {
            data: self.data,
            offset,
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn offset(&self) -> i64 {
        self.offset
    }

    pub fn iter(&self) -> Iter<'_, f64> {
        self.data.iter()
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    pub fn into_inner(self) -> Vec<f64> {
        self.data
    }

    /// Display positions covered by the samples, the first one being `-offset`.
    pub fn axis(&self) -> Range<i64> {
        let start = -self.offset;
        start..start + self.data.len() as i64
    }

    /// Samples paired with their display position.
    pub fn stems(&self) -> impl Iterator<Item = (i64, f64)> + '_ {
        self.axis().zip(self.data.iter().copied())
    }

    pub fn peak(&self) -> f64 {
        self.data.iter().fold(0.0f64, |peak, s| peak.max(s.abs()))
    }
}

impl AsRef<[f64]> for Sequence {
    fn as_ref(&self) -> &[f64] {
        &self.data
    }
}

impl<'a> IntoIterator for &'a Sequence {
    type Item = &'a f64;
    type IntoIter = Iter<'a, f64>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
