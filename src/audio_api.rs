use std::sync::Arc;

pub use crate::audio::{SampleBuffer, StereoFrame};
use crate::shared::SessionId;

/// Identifies one concrete generator: the owning session plus the generation
/// token it was started under. A session bumps its token on every pause,
/// resume and stop, so an `Ended` carrying an old token is stale.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct VoiceKey {
    pub session: SessionId,
    pub token: u64,
}

#[derive(Clone, Debug)]
pub enum VoiceSource {
    Tone { hz: f32 },
    Buffer(Arc<SampleBuffer>),
}

#[derive(Clone, Debug)]
pub struct StartVoice {
    pub key: VoiceKey,
    pub source: VoiceSource,
    pub offset_seconds: f64,
    // tones stop on their own after this; buffers end with their data
    pub length_seconds: Option<f64>,
    pub gain: f32,
    pub pan: f32,
}

// The engine can't decode files (interrupts the audio thread), so buffers are
// decoded up front by the cache and handed over ready to read.
#[derive(Clone, Debug)]
pub enum AudioCommand {
    Start(StartVoice),
    Stop(VoiceKey),
    SetMasterGain(f32),
}

// Sent back from the audio thread when a generator runs out on its own.
// Explicit stops never produce one.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VoiceEvent {
    Ended(VoiceKey),
}
