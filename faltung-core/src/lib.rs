mod audio;
mod sequence;

pub mod convolution;
pub mod impulse_response;
pub mod parse;
pub mod pipeline;
pub mod reference;

pub use audio::*;
pub use impulse_response::{BoundsPolicy, DECIMATION_STRIDE};
pub use pipeline::{Engine, Pipeline, PipelineConfig};
pub use sequence::Sequence;

use thiserror::Error;

use std::{
    io::{self},
    path::Path,
    slice::Iter,
};

/// Sample rate the recordings are captured and played back at unless
/// configured otherwise.
pub const DEFAULT_SAMPLE_RATE: u32 = 8100;

/// A mono audio buffer together with its sample rate.
#[derive(Debug, Clone, PartialEq)]
pub struct Recording {
    sample_rate: u32,
    data: Vec<f32>,
}

impl Recording {
    pub fn new(sample_rate: u32, data: Vec<f32>) -> Self {
        Self { sample_rate, data }
    }

    pub fn from_sequence(sample_rate: u32, sequence: &Sequence) -> Self {
        let data = sequence.iter().map(|s| *s as f32).collect();

        Self { sample_rate, data }
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, WavError> {
        let mut reader = hound::WavReader::open(path).map_err(map_hound_error)?;

        let spec = reader.spec();
        let data: Vec<f32> = match spec.sample_format {
            hound::SampleFormat::Float => reader
                .samples::<f32>()
                .collect::<Result<_, _>>()
                .map_err(map_hound_error)?,
            hound::SampleFormat::Int => {
                let scale = (1i64 << (spec.bits_per_sample - 1)) as f32;
                reader
                    .samples::<i32>()
                    .map(|s| s.map(|s| s as f32 / scale))
                    .collect::<Result<_, _>>()
                    .map_err(map_hound_error)?
            }
        };

        // keep the first channel only
        let channels = spec.channels.max(1) as usize;
        let data = data.into_iter().step_by(channels).collect();

        Ok(Self {
            sample_rate: spec.sample_rate,
            data,
        })
    }

    pub fn to_file(&self, path: impl AsRef<Path>) -> Result<(), WavError> {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: self.sample_rate,
            bits_per_sample: 32,
            sample_format: hound::SampleFormat::Float,
        };

        let mut writer = hound::WavWriter::create(path, spec).map_err(map_hound_error)?;
        for s in self.data.iter() {
            writer.write_sample(*s).map_err(map_hound_error)?;
        }
        writer.finalize().map_err(map_hound_error)?;

        Ok(())
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Length in samples.
    pub fn duration(&self) -> usize {
        self.data.len()
    }

    pub fn seconds(&self) -> f32 {
        self.data.len() as f32 / self.sample_rate as f32
    }

    pub fn iter(&self) -> Iter<'_, f32> {
        self.data.iter()
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    pub fn to_sequence(&self) -> Sequence {
        Sequence::from_samples(self.data.iter().map(|s| *s as f64).collect())
    }

    pub fn peak(&self) -> f32 {
        self.data.iter().fold(0.0f32, |peak, s| peak.max(s.abs()))
    }

    /// Scales the buffer so its absolute peak is 1.0. Silence stays silent.
    pub fn normalized(&self) -> Self {
        let peak = self.peak();
        if peak == 0.0 || !peak.is_finite() {
            return self.clone();
        }

        let data = self.data.iter().map(|s| s / peak).collect();
        Self {
            sample_rate: self.sample_rate,
            data,
        }
    }
}

#[inline]
pub fn dbfs(v: f32) -> f32 {
    20.0 * f32::log10(v.abs())
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid input: {0}")]
    InvalidInput(#[from] InvalidInput),
    #[error("sample {index} looks back {lookback} samples, outside of a sequence of length {len}")]
    IndexOutOfRange {
        index: usize,
        lookback: usize,
        len: usize,
    },
    #[error("audio device failed")]
    Device(#[from] AudioBackendError),
    #[error("error accessing a recording")]
    Wav(#[from] WavError),
    #[error("visualizer failed")]
    Visualizer(#[source] Box<dyn std::error::Error + Send + Sync>),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum InvalidInput {
    #[error("sequence is empty")]
    EmptySequence,
    #[error("'{token}' at position {position} is not a number")]
    NotANumber { token: String, position: usize },
    #[error("'{0}' is not an integer")]
    NotAnInteger(String),
}

#[derive(Error, Debug)]
pub enum WavError {
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("unsupported wav file: {0}")]
    Format(String),
}

pub(crate) fn map_hound_error(err: hound::Error) -> WavError {
    match err {
        hound::Error::IoError(error) => WavError::Io(error),
        other => WavError::Format(other.to_string()),
    }
}
