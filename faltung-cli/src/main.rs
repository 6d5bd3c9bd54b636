mod log;
mod plot;
mod prompt;

use std::{io, path::PathBuf, time::Duration};

use clap::{Parser, ValueEnum};

use faltung_core::{
    pipeline::{recording_title, FilterSettings, Visualizer, FILTERED_TITLE},
    AudioBackendError, AudioDevice, BoundsPolicy, Engine, JackDevice, Pipeline,
    PipelineConfig, Recording, DEFAULT_SAMPLE_RATE,
};

use plot::Plotter;
use prompt::Prompt;

const DEFAULT_SECONDS: u64 = 5;
const DEFAULT_DEPTH: usize = 3;

#[derive(Parser)]
#[clap(author, version, about = "Convolution of two sequences and of a filtered voice recording")]
struct Cli {
    #[arg(long, default_value = "faltung")]
    client_name: String,
    /// Jack port the recording is captured from.
    #[arg(short, long)]
    input_port: Option<String>,
    #[arg(long = "dest-port")]
    dest_ports: Vec<String>,
    #[clap(long, default_value_t = DEFAULT_SAMPLE_RATE)]
    sample_rate: u32,
    /// Directory for the recordings and plots.
    #[arg(long, default_value = ".")]
    output_dir: PathBuf,
    /// Use this wav file instead of recording.
    #[arg(long)]
    recording: Option<PathBuf>,
    #[arg(long, value_enum, default_value_t = Policy::Strict)]
    bounds_policy: Policy,
    /// Peak normalize buffers before playing them.
    #[arg(long)]
    normalize: bool,
    #[arg(long, default_value_t = tracing::Level::INFO)]
    log_level: tracing::Level,
    #[arg(long)]
    log_file: Option<PathBuf>,
}

#[derive(Clone, Copy, ValueEnum)]
enum Policy {
    Strict,
    Wrap,
}

impl From<Policy> for BoundsPolicy {
    fn from(policy: Policy) -> Self {
        match policy {
            Policy::Strict => BoundsPolicy::Strict,
            Policy::Wrap => BoundsPolicy::Wrap,
        }
    }
}

/// Connects to the audio backend on first use, so the comparison stage runs
/// without one.
struct LazyDevice<F, D> {
    connect: F,
    device: Option<D>,
}

impl<F, D> LazyDevice<F, D>
where
    F: FnMut() -> Result<D, AudioBackendError>,
    D: AudioDevice,
{
    fn new(connect: F) -> Self {
        Self {
            connect,
            device: None,
        }
    }

    fn get(&mut self) -> Result<&mut D, AudioBackendError> {
        let device = match self.device.take() {
            Some(device) => device,
            None => (self.connect)()?,
        };

        Ok(self.device.insert(device))
    }
}

impl<F, D> AudioDevice for LazyDevice<F, D>
where
    F: FnMut() -> Result<D, AudioBackendError>,
    D: AudioDevice,
{
    fn record(
        &mut self,
        duration: Duration,
        sample_rate: u32,
    ) -> Result<Vec<f32>, AudioBackendError> {
        self.get()?.record(duration, sample_rate)
    }

    fn play(&mut self, samples: &[f32], sample_rate: u32) -> Result<(), AudioBackendError> {
        self.get()?.play(samples, sample_rate)
    }
}

/// Answers taken from the command line instead of the prompt.
struct Session {
    recording: Option<PathBuf>,
    policy: BoundsPolicy,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    log::init(cli.log_level, cli.log_file.as_deref())?;
    std::fs::create_dir_all(&cli.output_dir)?;

    let mut device = LazyDevice::new(|| {
        let device = JackDevice::new(
            &cli.client_name,
            cli.input_port.as_deref(),
            &cli.dest_ports,
        )?;
        if cli.dest_ports.is_empty() {
            tracing::warn!(
                "no --dest-port given, playback is silent. available: {:?}",
                device.out_ports()
            );
        }

        Ok(device)
    });

    let mut plotter = Plotter::new(&cli.output_dir);
    let config = PipelineConfig {
        sample_rate: cli.sample_rate,
        recording_path: Some(cli.output_dir.join("my_recording.wav")),
        filtered_path: Some(cli.output_dir.join("filtered_recording.wav")),
        normalize_playback: cli.normalize,
    };
    let mut pipeline = Pipeline::new(&mut device, &mut plotter, config);

    let session = Session {
        recording: cli.recording.clone(),
        policy: cli.bounds_policy.into(),
    };

    let mut prompt = Prompt::stdio();
    run(&mut pipeline, &mut prompt, &session)
}

fn run<A, V>(
    pipeline: &mut Pipeline<'_, A, V>,
    prompt: &mut Prompt<impl io::BufRead, impl io::Write>,
    session: &Session,
) -> anyhow::Result<()>
where
    A: AudioDevice,
    V: Visualizer,
{
    let x = prompt.sequence("X")?;
    let y = prompt.sequence("Y")?;

    let comparison = pipeline.compare(x, y)?;
    prompt.say(format_args!(
        "Direct convolution of x and y: {:?}",
        comparison.direct.as_slice()
    ))?;
    prompt.say(format_args!(
        "Reference convolution of x and y: {:?}",
        comparison.reference.as_slice()
    ))?;

    let recording = match &session.recording {
        Some(path) => {
            let recording = Recording::from_file(path)?;
            tracing::info!(
                "using {} ({:.1}s at {} Hz) instead of recording",
                path.display(),
                recording.seconds(),
                recording.sample_rate()
            );
            recording
        }
        None => {
            let seconds = prompt.integer_or(
                &format!("Enter how many seconds you want to record your voice (default is {DEFAULT_SECONDS}): "),
                DEFAULT_SECONDS,
            )?;
            prompt.pause(&format!(
                "Press enter to record your voice for {seconds} seconds"
            ))?;
            pipeline.record(Duration::from_secs(seconds))?
        }
    };

    prompt.pause("Recording is done. Press enter to listen to the recording")?;
    pipeline.play(&recording)?;

    prompt.pause("Press enter to see the plot of the recording")?;
    pipeline.show(&recording_title(&recording), &recording)?;

    let depth = prompt.integer_or(
        &format!("Please enter the value of M for the h vector calculation (default is {DEFAULT_DEPTH}): "),
        DEFAULT_DEPTH,
    )?;
    let choice = prompt.ask(
        "Use the direct engine or the reference convolver? (enter for direct, 'n' for reference): ",
    )?;

    let settings = FilterSettings {
        depth,
        engine: Engine::from_choice(&choice),
        policy: session.policy,
    };

    prompt.say("Calculating the convolution of the recording and h vector. Please wait...")?;
    let filtered = pipeline.filter(&recording, settings)?;
    prompt.say("Convolution is done.")?;

    prompt.pause("Press enter to listen to the recording BEFORE convolution.")?;
    pipeline.play(&filtered.raw)?;
    prompt.pause("Press enter to listen to the recording AFTER convolution.")?;
    pipeline.play(&filtered.filtered)?;

    pipeline.show(FILTERED_TITLE, &filtered.filtered)?;

    Ok(())
}
