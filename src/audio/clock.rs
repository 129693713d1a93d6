use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::Duration;

/// State the audio thread publishes for the control side: frames rendered so
/// far (the audio clock), the master gain actually applied, and the latest
/// output latency estimate.
#[derive(Debug)]
pub struct AudioClock {
    sample_rate: u32,
    frames: AtomicU64,
    master_gain_bits: AtomicU32,
    latency_micros: AtomicU64, // 0 = unknown
}

impl AudioClock {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate: sample_rate.max(1),
            frames: AtomicU64::new(0),
            master_gain_bits: AtomicU32::new(1.0f32.to_bits()),
            latency_micros: AtomicU64::new(0),
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Seconds of audio rendered since the stream opened.
    pub fn now_seconds(&self) -> f64 {
        self.frames.load(Ordering::Acquire) as f64 / self.sample_rate as f64
    }

    pub fn frames(&self) -> u64 {
        self.frames.load(Ordering::Acquire)
    }

    pub(crate) fn advance(&self, frames: usize) {
        self.frames.fetch_add(frames as u64, Ordering::AcqRel);
    }

    pub fn master_gain(&self) -> f32 {
        f32::from_bits(self.master_gain_bits.load(Ordering::Relaxed))
    }

    pub(crate) fn publish_master_gain(&self, gain: f32) {
        self.master_gain_bits.store(gain.to_bits(), Ordering::Relaxed);
    }

    pub fn latency(&self) -> Option<Duration> {
        match self.latency_micros.load(Ordering::Relaxed) {
            0 => None,
            us => Some(Duration::from_micros(us)),
        }
    }

    pub(crate) fn publish_latency(&self, latency: Duration) {
        self.latency_micros
            .store(latency.as_micros() as u64, Ordering::Relaxed);
    }
}
