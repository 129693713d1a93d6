use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::{Receiver, Sender};

use crate::audio_api::{AudioCommand, VoiceEvent};
use crate::error::OutputError;

mod clock;
pub mod decode;
mod device;
mod engine;
mod frame;
mod sample_buffer;
mod voice;

pub use clock::AudioClock;
pub use decode::SymphoniaDecoder;
pub use device::list_output_devices;
pub use frame::StereoFrame;
pub use sample_buffer::SampleBuffer;
pub use voice::pan_gains;

use engine::Engine;

const COMMAND_QUEUE: usize = 1024;
const EVENT_QUEUE: usize = 1024;
const HEADLESS_BLOCK: usize = 256;

/// Where the output context renders to.
#[derive(Clone, Debug, PartialEq)]
pub enum OutputTarget {
    /// A CPAL device; `None` picks the host default.
    Device { name: Option<String> },
    /// No device: the clock only moves when [`AudioOutput::render`] is called.
    Headless { sample_rate: u32 },
}

#[derive(Clone, Debug)]
pub struct OutputSettings {
    pub target: OutputTarget,
    pub max_voices: usize,
    pub smoothing_ms: f32,
}

/// Cheap handle sessions use to reach the master bus: the command queue into
/// the engine plus the audio clock.
#[derive(Clone)]
pub struct MasterBus {
    tx: Sender<AudioCommand>,
    clock: Arc<AudioClock>,
}

impl MasterBus {
    pub fn send(&self, cmd: AudioCommand) -> bool {
        match self.tx.try_send(cmd) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("audio command dropped: {e}");
                false
            }
        }
    }

    /// Current audio clock time in seconds.
    pub fn now(&self) -> f64 {
        self.clock.now_seconds()
    }

    pub fn sample_rate(&self) -> u32 {
        self.clock.sample_rate()
    }
}

enum Backend {
    Device {
        _stream: cpal::Stream,
    },
    Headless {
        engine: RefCell<Engine>,
        scratch: RefCell<Vec<StereoFrame>>,
    },
}

/// An open output: one engine, one master gain stage.
pub struct AudioOutput {
    bus: MasterBus,
    events: Receiver<VoiceEvent>,
    description: String,
    backend: Backend,
}

impl AudioOutput {
    pub fn open(settings: &OutputSettings) -> Result<Self, OutputError> {
        match &settings.target {
            OutputTarget::Device { name } => Self::open_device(name.as_deref(), settings),
            OutputTarget::Headless { sample_rate } => Ok(Self::headless(*sample_rate, settings)),
        }
    }

    fn open_device(name: Option<&str>, settings: &OutputSettings) -> Result<Self, OutputError> {
        let host = cpal::default_host();
        let device = device::pick_device(&host, name)?;
        let supported = device
            .default_output_config()
            .map_err(|e| OutputError::Config(e.to_string()))?;
        let sample_format = supported.sample_format();
        let config: cpal::StreamConfig = supported.into();

        let clock = Arc::new(AudioClock::new(config.sample_rate));
        let (tx, rx) = crossbeam_channel::bounded(COMMAND_QUEUE);
        let (ev_tx, events) = crossbeam_channel::bounded(EVENT_QUEUE);
        let engine = Engine::new(
            clock.clone(),
            rx,
            ev_tx,
            settings.max_voices,
            settings.smoothing_ms,
        );

        let stream =
            device::build_output_stream(&device, &config, sample_format, engine, clock.clone())?;
        stream.play().map_err(|e| OutputError::Play(e.to_string()))?;

        let description = device::device_name(&device).unwrap_or_else(|| "unknown".to_string());
        tracing::info!(
            device = %description,
            rate_hz = config.sample_rate,
            channels = config.channels,
            format = ?sample_format,
            "audio output opened"
        );

        Ok(Self {
            bus: MasterBus { tx, clock },
            events,
            description,
            backend: Backend::Device { _stream: stream },
        })
    }

    pub fn headless(sample_rate: u32, settings: &OutputSettings) -> Self {
        let clock = Arc::new(AudioClock::new(sample_rate));
        let (tx, rx) = crossbeam_channel::bounded(COMMAND_QUEUE);
        let (ev_tx, events) = crossbeam_channel::bounded(EVENT_QUEUE);
        let engine = Engine::new(
            clock.clone(),
            rx,
            ev_tx,
            settings.max_voices,
            settings.smoothing_ms,
        );
        Self {
            bus: MasterBus { tx, clock },
            events,
            description: "headless".to_string(),
            backend: Backend::Headless {
                engine: RefCell::new(engine),
                scratch: RefCell::new(vec![StereoFrame::zero(); HEADLESS_BLOCK]),
            },
        }
    }

    pub fn bus(&self) -> &MasterBus {
        &self.bus
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// Completion notifications the engine has posted since the last call.
    pub fn drain_events(&self) -> Vec<VoiceEvent> {
        self.events.try_iter().collect()
    }

    /// Clamp to [0, 1] and glide the master gain there.
    pub fn set_master_volume(&self, volume: f32) -> f32 {
        let volume = if volume.is_finite() {
            volume.clamp(0.0, 1.0)
        } else {
            0.0
        };
        self.bus.send(AudioCommand::SetMasterGain(volume));
        volume
    }

    /// Gain the engine actually applied at the end of its last block.
    pub fn master_gain(&self) -> f32 {
        self.bus.clock.master_gain()
    }

    pub fn latency_estimate(&self) -> Option<Duration> {
        self.bus.clock.latency()
    }

    /// Headless only: render `seconds` of audio, advancing the clock.
    /// Returns `false` on a device backend, whose clock runs by itself.
    pub fn render(&self, seconds: f64) -> bool {
        let Backend::Headless { engine, scratch } = &self.backend else {
            return false;
        };
        let mut engine = engine.borrow_mut();
        let mut scratch = scratch.borrow_mut();
        let mut remaining = (seconds.max(0.0) * self.bus.sample_rate() as f64).round() as usize;
        while remaining > 0 {
            let n = remaining.min(scratch.len());
            engine.process(&mut scratch[..n]);
            remaining -= n;
        }
        true
    }
}

/// Lazily opened output shared by the cue runner and the master fader.
///
/// Nothing touches the device until the first [`OutputContext::ensure`];
/// [`OutputContext::shutdown`] drops it again.
pub struct OutputContext {
    settings: OutputSettings,
    output: RefCell<Option<Rc<AudioOutput>>>,
}

impl OutputContext {
    pub fn new(settings: OutputSettings) -> Self {
        Self {
            settings,
            output: RefCell::new(None),
        }
    }

    pub fn ensure(&self) -> Result<Rc<AudioOutput>, OutputError> {
        if let Some(output) = self.output.borrow().as_ref() {
            return Ok(output.clone());
        }
        let output = Rc::new(AudioOutput::open(&self.settings)?);
        *self.output.borrow_mut() = Some(output.clone());
        Ok(output)
    }

    /// The output if it has been opened; never opens it.
    pub fn get(&self) -> Option<Rc<AudioOutput>> {
        self.output.borrow().clone()
    }

    #[cfg(test)]
    pub(crate) fn is_open(&self) -> bool {
        self.output.borrow().is_some()
    }

    /// Opens the output if needed. `None` when the device could not be opened.
    pub fn set_master_volume(&self, volume: f32) -> Option<f32> {
        match self.ensure() {
            Ok(output) => Some(output.set_master_volume(volume)),
            Err(e) => {
                tracing::warn!("master volume not applied: {e}");
                None
            }
        }
    }

    /// Operator-facing latency; `None` before first use or when the host
    /// gives no usable figure.
    pub fn latency_estimate(&self) -> Option<Duration> {
        self.get().and_then(|o| o.latency_estimate())
    }

    pub fn shutdown(&self) {
        if self.output.borrow_mut().take().is_some() {
            tracing::info!("audio output closed");
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    pub const RATE: u32 = 48_000;

    pub fn settings() -> OutputSettings {
        OutputSettings {
            target: OutputTarget::Headless { sample_rate: RATE },
            max_voices: 64,
            smoothing_ms: 10.0,
        }
    }

    pub fn context() -> Rc<OutputContext> {
        Rc::new(OutputContext::new(settings()))
    }
}

#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;

    #[test]
    fn context_opens_lazily_and_reuses_output() {
        let ctx = context();
        assert!(!ctx.is_open());
        assert_eq!(ctx.latency_estimate(), None);

        let a = ctx.ensure().unwrap();
        let b = ctx.ensure().unwrap();
        assert!(Rc::ptr_eq(&a, &b));
        assert!(ctx.is_open());

        ctx.shutdown();
        assert!(!ctx.is_open());
    }

    #[test]
    fn master_volume_scales_linearly() {
        let ctx = context();
        let output = ctx.ensure().unwrap();

        assert_eq!(ctx.set_master_volume(0.0), Some(0.0));
        output.render(0.2);
        assert!(output.master_gain().abs() < 1e-4);

        assert_eq!(ctx.set_master_volume(1.0), Some(1.0));
        output.render(0.2);
        assert!((output.master_gain() - 1.0).abs() < 1e-4);

        ctx.set_master_volume(0.35);
        output.render(0.2);
        assert!((output.master_gain() - 0.35).abs() < 1e-4);
    }

    #[test]
    fn master_volume_is_clamped() {
        let ctx = context();
        assert_eq!(ctx.set_master_volume(1.7), Some(1.0));
        assert_eq!(ctx.set_master_volume(-0.2), Some(0.0));
        assert_eq!(ctx.set_master_volume(f32::NAN), Some(0.0));
    }

    #[test]
    fn master_volume_change_is_smoothed() {
        let ctx = context();
        let output = ctx.ensure().unwrap();
        ctx.set_master_volume(0.0);
        output.render(1.0 / RATE as f64);
        assert!(output.master_gain() > 0.9);
    }

    #[test]
    fn headless_render_moves_the_clock() {
        let ctx = context();
        let output = ctx.ensure().unwrap();
        assert!(output.render(0.5));
        assert!((output.bus().now() - 0.5).abs() < 1e-9);
        assert_eq!(output.latency_estimate(), None);
    }
}
