use jack::PortFlags;
use ringbuf::{HeapConsumer, HeapProducer, HeapRb};
use thiserror::Error;

use std::{
    sync::mpsc::{sync_channel, Receiver, RecvTimeoutError, SendError, SyncSender},
    time::{Duration, Instant},
};

/// Slack on top of the expected length of a recording or playback before the
/// jack server counts as gone.
pub const GRACE_PERIOD: Duration = Duration::from_secs(1);

#[derive(Error, Debug)]
pub enum AudioBackendError {
    #[error("audio backend stopped")]
    Stopped,
    #[error("no input port registered")]
    NoInput,
    #[error("jack: {0}")]
    Jack(#[from] jack::Error),
}

impl<I, J> From<SendError<Message<I, J>>> for AudioBackendError
where
    I: Iterator<Item = f32>,
    J: IntoIterator<IntoIter = I>,
{
    fn from(_err: SendError<Message<I, J>>) -> Self {
        Self::Stopped
    }
}

/// Blocking audio capture and playback.
pub trait AudioDevice {
    /// Records `duration` worth of mono samples at `sample_rate`, returns
    /// once the recording is complete.
    fn record(&mut self, duration: Duration, sample_rate: u32)
        -> Result<Vec<f32>, AudioBackendError>;

    /// Plays `samples` at `sample_rate`, returns once playback has finished.
    fn play(&mut self, samples: &[f32], sample_rate: u32) -> Result<(), AudioBackendError>;
}

pub enum Message<I, J>
where
    I: Iterator<Item = f32>,
    J: IntoIterator<IntoIter = I>,
{
    RegisterOutPort(jack::Port<jack::AudioOut>),
    RegisterInPort(jack::Port<jack::AudioIn>, HeapProducer<f32>),
    PlaySignal {
        signal: J,
        respond_to: SyncSender<bool>,
    },
}

pub struct ProcessHandler<I, J>
where
    I: Iterator<Item = f32>,
    J: IntoIterator<IntoIter = I>,
{
    respond_to: Option<SyncSender<bool>>,
    cur_signal: Option<I>,
    out_port: Option<jack::Port<jack::AudioOut>>,
    input: Option<(jack::Port<jack::AudioIn>, HeapProducer<f32>)>,
    msg_rx: Receiver<Message<I, J>>,
}

impl<I, J> jack::ProcessHandler for ProcessHandler<I, J>
where
    I: Iterator<Item = f32> + Send,
    J: IntoIterator<IntoIter = I> + Send,
{
    fn process(&mut self, _: &jack::Client, process_scope: &jack::ProcessScope) -> jack::Control {
        let mut signal_ended = false;

        if let Some(out) = &mut self.out_port {
            let out = out.as_mut_slice(process_scope);

            match &mut self.cur_signal {
                Some(signal) => {
                    for o in out.iter_mut() {
                        if let Some(sample) = signal.next() {
                            *o = sample;
                        } else {
                            *o = 0.0f32;
                            signal_ended = true;
                        }
                    }
                }
                None => out.fill(0.0),
            }
        } else if self.cur_signal.is_some() {
            // nowhere to play to, finish right away instead of blocking forever
            signal_ended = true;
        }

        if let Some((port, buf)) = &mut self.input {
            let in_a_p = port.as_slice(process_scope);
            buf.push_slice(in_a_p);
        }

        if signal_ended {
            if let Some(respond_to) = self.respond_to.take() {
                let _ = respond_to.try_send(true);
            }
            self.cur_signal = None;
        }

        if let Ok(msg) = self.msg_rx.try_recv() {
            match msg {
                Message::RegisterOutPort(p) => self.out_port = Some(p),
                Message::RegisterInPort(port, prod) => self.input = Some((port, prod)),
                Message::PlaySignal { signal, respond_to } => {
                    self.respond_to = Some(respond_to);
                    self.cur_signal = Some(signal.into_iter());
                }
            }
        }

        jack::Control::Continue
    }
}

pub struct AudioEngine<I, J>
where
    I: Iterator<Item = f32>,
    J: IntoIterator<IntoIter = I>,
{
    client: jack::AsyncClient<(), ProcessHandler<I, J>>,
    msg_tx: SyncSender<Message<I, J>>,
}

impl<I, J> AudioEngine<I, J>
where
    I: Iterator<Item = f32> + Send + 'static,
    J: IntoIterator<IntoIter = I> + Send + Sync + 'static,
{
    pub fn new(name: &str) -> Result<Self, AudioBackendError> {
        let (client, _status) = jack::Client::new(name, jack::ClientOptions::NO_START_SERVER)?;

        let (msg_tx, msg_rx) = sync_channel(64);

        let process_handler = ProcessHandler {
            respond_to: None,
            out_port: None,
            input: None,
            cur_signal: None,
            msg_rx,
        };

        let active_client = client.activate_async((), process_handler)?;

        Ok(Self {
            client: active_client,
            msg_tx,
        })
    }

    pub fn register_out_port<T: AsRef<str>>(
        &self,
        port_name: &str,
        dest_ports: &[T],
    ) -> Result<(), AudioBackendError> {
        let out_port = self
            .client
            .as_client()
            .register_port(port_name, jack::AudioOut::default())?;

        let full_port_name = out_port.name()?;

        for dest_port in dest_ports {
            self.client
                .as_client()
                .connect_ports_by_name(&full_port_name, dest_port.as_ref())?;
        }

        self.msg_tx.send(Message::RegisterOutPort(out_port))?;

        Ok(())
    }

    pub fn register_in_port(
        &self,
        port_name: &str,
        input_port_name: &str,
    ) -> Result<HeapConsumer<f32>, AudioBackendError> {
        // a few jack periods of headroom for the 10ms polling in `record`
        const BUFF_SIZE: usize = 16 * 1024;

        let in_port = self
            .client
            .as_client()
            .register_port(port_name, jack::AudioIn::default())?;

        let rb = HeapRb::<_>::new(BUFF_SIZE);
        let (prod, cons) = rb.split();

        let full_port_name = in_port.name()?;
        self.client
            .as_client()
            .connect_ports_by_name(input_port_name, &full_port_name)?;

        self.msg_tx.send(Message::RegisterInPort(in_port, prod))?;

        Ok(cons)
    }

    pub fn sample_rate(&self) -> u32 {
        self.client.as_client().sample_rate() as u32
    }

    pub fn play_signal(&self, signal: J) -> Result<Receiver<bool>, AudioBackendError> {
        let (tx, rx) = sync_channel(1);
        self.msg_tx.send(Message::PlaySignal {
            signal,
            respond_to: tx,
        })?;

        Ok(rx)
    }

    pub fn out_ports(&self) -> Vec<String> {
        self.client
            .as_client()
            .ports(None, Some("32 bit float mono audio"), PortFlags::IS_INPUT)
    }
}

/// [`AudioDevice`] backed by a jack client.
///
/// The jack server runs at its own sample rate, buffers are resampled from
/// and to the rate the caller asks for.
pub struct JackDevice {
    engine: AudioEngine<std::vec::IntoIter<f32>, Vec<f32>>,
    input: Option<HeapConsumer<f32>>,
}

impl JackDevice {
    pub fn new<T: AsRef<str>>(
        client_name: &str,
        input_port: Option<&str>,
        dest_ports: &[T],
    ) -> Result<Self, AudioBackendError> {
        let engine = AudioEngine::new(client_name)?;
        engine.register_out_port("playback_out", dest_ports)?;

        let input = match input_port {
            Some(port) => Some(engine.register_in_port("recording_in", port)?),
            None => None,
        };

        tracing::debug!(
            sample_rate = engine.sample_rate(),
            "jack client {client_name} ready"
        );

        Ok(Self { engine, input })
    }

    pub fn out_ports(&self) -> Vec<String> {
        self.engine.out_ports()
    }
}

impl AudioDevice for JackDevice {
    fn record(
        &mut self,
        duration: Duration,
        sample_rate: u32,
    ) -> Result<Vec<f32>, AudioBackendError> {
        let server_rate = self.engine.sample_rate();
        let input = self.input.as_mut().ok_or(AudioBackendError::NoInput)?;

        let n_samples = (duration.as_secs_f64() * server_rate as f64).round() as usize;
        let data = capture(input, n_samples, duration + GRACE_PERIOD)?;

        Ok(resample(&data, server_rate, sample_rate))
    }

    fn play(&mut self, samples: &[f32], sample_rate: u32) -> Result<(), AudioBackendError> {
        let server_rate = self.engine.sample_rate();
        let signal = resample(samples, sample_rate, server_rate);
        let length = Duration::from_secs_f64(signal.len() as f64 / server_rate.max(1) as f64);

        let response = self.engine.play_signal(signal)?;
        wait_for(&response, length + GRACE_PERIOD)
    }
}

/// Pops `n_samples` from `input`, polling every 10 ms. Fails with
/// [`AudioBackendError::Stopped`] if they did not arrive within `timeout`.
fn capture(
    input: &mut HeapConsumer<f32>,
    n_samples: usize,
    timeout: Duration,
) -> Result<Vec<f32>, AudioBackendError> {
    let deadline = Instant::now() + timeout;
    let mut data = Vec::with_capacity(n_samples);

    // drop whatever piled up since the last recording
    input.pop_iter().for_each(drop);

    while data.len() < n_samples {
        let missing = n_samples - data.len();
        data.extend(input.pop_iter().take(missing));

        if data.len() == n_samples {
            break;
        }

        if Instant::now() >= deadline {
            tracing::error!(
                "recording stalled after {} of {n_samples} samples",
                data.len()
            );
            return Err(AudioBackendError::Stopped);
        }

        std::thread::sleep(Duration::from_millis(10));
    }

    Ok(data)
}

fn wait_for(response: &Receiver<bool>, timeout: Duration) -> Result<(), AudioBackendError> {
    match response.recv_timeout(timeout) {
        Ok(_) => Ok(()),
        Err(RecvTimeoutError::Timeout) => {
            tracing::error!("playback did not finish within {:.1}s", timeout.as_secs_f32());
            Err(AudioBackendError::Stopped)
        }
        Err(RecvTimeoutError::Disconnected) => Err(AudioBackendError::Stopped),
    }
}

/// Linear interpolation from `from` Hz to `to` Hz.
pub fn resample(samples: &[f32], from: u32, to: u32) -> Vec<f32> {
    if from == to || samples.is_empty() {
        return samples.to_vec();
    }

    let ratio = from as f64 / to as f64;
    let len = (samples.len() as f64 / ratio).round() as usize;
    let last = samples.len() - 1;

    (0..len)
        .map(|n| {
            let position = n as f64 * ratio;
            let index = (position.floor() as usize).min(last);
            let next = (index + 1).min(last);
            let fraction = (position - index as f64) as f32;

            samples[index] + (samples[next] - samples[index]) * fraction
        })
        .collect()
}
