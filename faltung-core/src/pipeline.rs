//! Sequencing of the convolution and filter stages.
//!
//! Every stage is a separate method so a front end can pause, prompt or
//! substitute a stage in between.

use std::{path::PathBuf, time::Duration};

use crate::{
    convolution, dbfs,
    impulse_response::{BoundsPolicy, Generator},
    reference, AudioDevice, Error, Recording, Sequence, DEFAULT_SAMPLE_RATE,
};

/// Renders sequences and recordings.
pub trait Visualizer {
    /// Stem plots of both inputs and both convolution results.
    fn comparison(&mut self, comparison: &Comparison) -> Result<(), Error>;

    /// Line plot of a recording.
    fn waveform(&mut self, title: &str, recording: &Recording) -> Result<(), Error>;
}

/// Which convolution implementation filters the recording.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Engine {
    #[default]
    Direct,
    Reference,
}

impl Engine {
    /// `n` picks the reference convolver, anything else the direct one.
    pub fn from_choice(choice: &str) -> Self {
        match choice.trim() {
            "n" => Engine::Reference,
            _ => Engine::Direct,
        }
    }

    pub fn convolve(&self, x: &Sequence, y: &Sequence) -> Result<Sequence, Error> {
        match self {
            Engine::Direct => convolution::convolve_parallel(x, y),
            Engine::Reference => reference::convolve(x, y),
        }
    }
}

impl std::fmt::Display for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Engine::Direct => "direct",
                Engine::Reference => "reference",
            }
        )
    }
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub sample_rate: u32,
    /// Where the raw recording gets written to, if anywhere.
    pub recording_path: Option<PathBuf>,
    pub filtered_path: Option<PathBuf>,
    pub normalize_playback: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            recording_path: None,
            filtered_path: None,
            normalize_playback: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FilterSettings {
    pub depth: usize,
    pub engine: Engine,
    pub policy: BoundsPolicy,
}

impl Default for FilterSettings {
    fn default() -> Self {
        Self {
            depth: 3,
            engine: Engine::Direct,
            policy: BoundsPolicy::Strict,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Comparison {
    pub x: Sequence,
    pub y: Sequence,
    pub direct: Sequence,
    pub reference: Sequence,
}

impl Comparison {
    pub fn max_deviation(&self) -> f64 {
        self.direct
            .iter()
            .zip(self.reference.iter())
            .map(|(a, b)| (a - b).abs())
            .fold(0.0, f64::max)
    }
}

#[derive(Debug, Clone)]
pub struct FilteredRecording {
    pub raw: Recording,
    pub filter: Sequence,
    pub filtered: Recording,
}

pub struct Pipeline<'a, A, V> {
    audio: &'a mut A,
    visualizer: &'a mut V,
    config: PipelineConfig,
}

impl<'a, A, V> Pipeline<'a, A, V>
where
    A: AudioDevice,
    V: Visualizer,
{
    pub fn new(audio: &'a mut A, visualizer: &'a mut V, config: PipelineConfig) -> Self {
        Self {
            audio,
            visualizer,
            config,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Convolves `x` and `y` with both engines and shows the results.
    pub fn compare(&mut self, x: Sequence, y: Sequence) -> Result<Comparison, Error> {
        let direct = convolution::convolve(&x, &y)?;
        let reference = reference::convolve(&x, &y)?;

        let comparison = Comparison {
            x,
            y,
            direct,
            reference,
        };

        tracing::info!(
            "direct: {:?}, reference: {:?}",
            comparison.direct.as_slice(),
            comparison.reference.as_slice()
        );
        tracing::debug!(deviation = comparison.max_deviation(), "engines compared");

        self.visualizer.comparison(&comparison)?;

        Ok(comparison)
    }

    pub fn record(&mut self, duration: Duration) -> Result<Recording, Error> {
        let sample_rate = self.config.sample_rate;

        tracing::info!("recording {:.1}s at {sample_rate} Hz", duration.as_secs_f32());
        let data = self.audio.record(duration, sample_rate)?;
        let recording = Recording::new(sample_rate, data);

        tracing::debug!(
            samples = recording.duration(),
            "peak {:.2} dBFS",
            dbfs(recording.peak())
        );

        if let Some(path) = &self.config.recording_path {
            recording.to_file(path)?;
            tracing::info!("recording written to {}", path.display());
        }

        Ok(recording)
    }

    pub fn play(&mut self, recording: &Recording) -> Result<(), Error> {
        let normalized;
        let recording = if self.config.normalize_playback {
            normalized = recording.normalized();
            &normalized
        } else {
            recording
        };

        self.audio
            .play(recording.as_slice(), recording.sample_rate())?;

        Ok(())
    }

    pub fn show(&mut self, title: &str, recording: &Recording) -> Result<(), Error> {
        self.visualizer.waveform(title, recording)
    }

    /// Generates the filter from `recording` and convolves the two.
    pub fn filter(
        &mut self,
        recording: &Recording,
        settings: FilterSettings,
    ) -> Result<FilteredRecording, Error> {
        let signal = recording.to_sequence();

        tracing::info!(
            depth = settings.depth,
            policy = %settings.policy,
            "calculating filter for {:.1}s recording",
            recording.seconds()
        );
        let filter = Generator::new(settings.depth, settings.policy).generate(&signal)?;

        tracing::info!(engine = %settings.engine, "convolving recording with filter");
        let filtered = settings.engine.convolve(&signal, &filter)?;
        let filtered = Recording::from_sequence(recording.sample_rate(), &filtered);

        if let Some(path) = &self.config.filtered_path {
            filtered.to_file(path)?;
            tracing::info!("filtered recording written to {}", path.display());
        }

        Ok(FilteredRecording {
            raw: recording.clone(),
            filter,
            filtered,
        })
    }
}

pub const FILTERED_TITLE: &str = "Convolution Result of the Recording";

pub fn recording_title(recording: &Recording) -> String {
    format!("{} seconds recording", recording.seconds().round())
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use super::{
        recording_title, Comparison, Engine, FilterSettings, Pipeline, PipelineConfig, Visualizer,
    };
    use crate::{AudioBackendError, AudioDevice, BoundsPolicy, Error, Recording, Sequence};

    #[derive(Debug, PartialEq)]
    enum Event {
        Record(Duration, u32),
        Play(Vec<f32>),
        Comparison,
        Waveform(String),
    }

    #[derive(Default)]
    struct Fake {
        events: Vec<Event>,
        recording: Vec<f32>,
        broken: bool,
    }

    impl AudioDevice for Fake {
        fn record(
            &mut self,
            duration: Duration,
            sample_rate: u32,
        ) -> Result<Vec<f32>, AudioBackendError> {
            if self.broken {
                return Err(AudioBackendError::Stopped);
            }

            self.events.push(Event::Record(duration, sample_rate));
            Ok(self.recording.clone())
        }

        fn play(&mut self, samples: &[f32], _sample_rate: u32) -> Result<(), AudioBackendError> {
            self.events.push(Event::Play(samples.to_vec()));
            Ok(())
        }
    }

    #[derive(Default)]
    struct Screen {
        events: Vec<Event>,
    }

    impl Visualizer for Screen {
        fn comparison(&mut self, _comparison: &Comparison) -> Result<(), Error> {
            self.events.push(Event::Comparison);
            Ok(())
        }

        fn waveform(&mut self, title: &str, _recording: &Recording) -> Result<(), Error> {
            self.events.push(Event::Waveform(title.to_string()));
            Ok(())
        }
    }

    #[test]
    fn engine_choice() {
        assert_eq!(Engine::from_choice("n"), Engine::Reference);
        assert_eq!(Engine::from_choice("n\n"), Engine::Reference);
        assert_eq!(Engine::from_choice(""), Engine::Direct);
        assert_eq!(Engine::from_choice("y"), Engine::Direct);
    }

    #[test]
    fn compare_runs_both_engines() {
        let mut audio = Fake::default();
        let mut screen = Screen::default();
        let mut pipeline = Pipeline::new(&mut audio, &mut screen, PipelineConfig::default());

        let comparison = pipeline
            .compare(
                Sequence::new(vec![1.0, 2.0, 3.0], 1),
                Sequence::new(vec![1.0, -1.0], 0),
            )
            .unwrap();

        assert_eq!(comparison.direct.as_slice(), &[1.0, 1.0, 1.0, -3.0]);
        assert_eq!(comparison.direct.offset(), 1);
        assert_eq!(comparison.reference.len(), 4);
        assert!(comparison.max_deviation() < 1e-12);
        assert_eq!(screen.events, vec![Event::Comparison]);
    }

    #[test]
    fn filter_convolves_recording_with_its_filter() {
        let mut audio = Fake::default();
        let mut screen = Screen::default();
        let mut pipeline = Pipeline::new(&mut audio, &mut screen, PipelineConfig::default());

        let recording = Recording::new(8100, vec![0.5, 0.25]);
        let settings = FilterSettings {
            depth: 0,
            engine: Engine::Direct,
            policy: BoundsPolicy::Strict,
        };
        let filtered = pipeline.filter(&recording, settings).unwrap();

        // depth 0 leaves the filter equal to the recording
        assert_eq!(filtered.filter.as_slice(), &[0.5, 0.25]);
        assert_eq!(filtered.filtered.as_slice(), &[0.25, 0.25, 0.0625]);
        assert_eq!(filtered.raw, recording);
        assert!(audio.events.is_empty());
    }

    #[test]
    fn record_and_show() {
        let mut audio = Fake {
            recording: vec![0.0; 16200],
            ..Default::default()
        };
        let mut screen = Screen::default();
        let mut pipeline = Pipeline::new(&mut audio, &mut screen, PipelineConfig::default());

        let recording = pipeline.record(Duration::from_secs(2)).unwrap();
        pipeline.show(&recording_title(&recording), &recording).unwrap();

        assert_eq!(recording.sample_rate(), 8100);
        assert_eq!(audio.events, vec![Event::Record(Duration::from_secs(2), 8100)]);
        assert_eq!(
            screen.events,
            vec![Event::Waveform("2 seconds recording".to_string())]
        );
    }

    #[test]
    fn reference_engine_filters_too() {
        let mut audio = Fake {
            recording: vec![0.5, 0.25],
            ..Default::default()
        };
        let mut screen = Screen::default();
        let mut pipeline = Pipeline::new(&mut audio, &mut screen, PipelineConfig::default());

        let recording = Recording::new(8100, vec![0.5, 0.25]);
        let settings = FilterSettings {
            depth: 0,
            engine: Engine::Reference,
            policy: BoundsPolicy::Strict,
        };
        let filtered = pipeline.filter(&recording, settings).unwrap();

        for (a, b) in filtered.filtered.iter().zip([0.25, 0.25, 0.0625]) {
            assert!((a - b).abs() < 1e-6);
        }
    }

    #[test]
    fn strict_filter_fails_before_writing() {
        let dir = tempfile::tempdir().unwrap();
        let config = PipelineConfig {
            filtered_path: Some(dir.path().join("filtered_recording.wav")),
            ..Default::default()
        };

        let mut audio = Fake::default();
        let mut screen = Screen::default();
        let mut pipeline = Pipeline::new(&mut audio, &mut screen, config);

        let recording = Recording::new(8100, vec![0.1; 100]);
        let err = pipeline
            .filter(&recording, FilterSettings::default())
            .unwrap_err();

        assert!(matches!(err, Error::IndexOutOfRange { index: 0, .. }));
        assert!(!dir.path().join("filtered_recording.wav").exists());
    }

    #[test]
    fn device_error_aborts_recording() {
        let mut audio = Fake {
            broken: true,
            ..Default::default()
        };
        let mut screen = Screen::default();
        let mut pipeline = Pipeline::new(&mut audio, &mut screen, PipelineConfig::default());

        let err = pipeline.record(Duration::from_secs(1)).unwrap_err();

        assert!(matches!(err, Error::Device(AudioBackendError::Stopped)));
    }

    #[test]
    fn invalid_sequence_aborts_before_visualizing() {
        let mut audio = Fake::default();
        let mut screen = Screen::default();
        let mut pipeline = Pipeline::new(&mut audio, &mut screen, PipelineConfig::default());

        let err = pipeline
            .compare(Sequence::from_samples(vec![]), Sequence::from_samples(vec![1.0]))
            .unwrap_err();

        assert!(matches!(err, Error::InvalidInput(_)));
        assert!(screen.events.is_empty());
    }

    #[test]
    fn recordings_are_written_and_normalized() {
        let dir = tempfile::tempdir().unwrap();
        let config = PipelineConfig {
            recording_path: Some(dir.path().join("my_recording.wav")),
            filtered_path: Some(dir.path().join("filtered_recording.wav")),
            normalize_playback: true,
            ..Default::default()
        };

        let mut audio = Fake {
            recording: vec![0.5, 0.25],
            ..Default::default()
        };
        let mut screen = Screen::default();
        let mut pipeline = Pipeline::new(&mut audio, &mut screen, config);

        let recording = pipeline.record(Duration::from_secs(1)).unwrap();
        pipeline.play(&recording).unwrap();
        let filtered = pipeline
            .filter(&recording, FilterSettings {
                depth: 0,
                ..Default::default()
            })
            .unwrap();

        assert_eq!(audio.events[1], Event::Play(vec![1.0, 0.5]));

        let written = Recording::from_file(dir.path().join("my_recording.wav")).unwrap();
        assert_eq!(written, recording);

        let written = Recording::from_file(dir.path().join("filtered_recording.wav")).unwrap();
        assert_eq!(written, filtered.filtered);
    }
}
