use std::f32::consts::{FRAC_PI_4, TAU};
use std::sync::Arc;

use super::frame::StereoFrame;
use super::sample_buffer::SampleBuffer;
use crate::audio_api::{StartVoice, VoiceKey, VoiceSource};

/// Equal-power pan law: -1 is hard left, 0 is centre (~0.707 each), +1 is hard right.
pub fn pan_gains(pan: f32) -> (f32, f32) {
    let p = if pan.is_finite() { pan.clamp(-1.0, 1.0) } else { 0.0 };
    let angle = (p + 1.0) * FRAC_PI_4;
    (angle.cos(), angle.sin())
}

#[derive(Debug)]
enum Generator {
    Tone {
        phase: f32,
        phase_inc: f32, // radians per output frame
        remaining: u64,
    },
    Buffer {
        buffer: Arc<SampleBuffer>,
        pos: f64,
        step: f64, // source frames per output frame
    },
}

/// One sounding generator on the audio thread, already routed through its
/// session's gain and pan.
#[derive(Debug)]
pub struct Voice {
    pub key: VoiceKey,
    generator: Generator,
    gain_left: f32,
    gain_right: f32,
    active: bool,
}

impl Voice {
    pub fn new(start: StartVoice, output_rate: u32) -> Self {
        let rate = output_rate.max(1) as f64;
        let offset = start.offset_seconds.max(0.0);
        let generator = match start.source {
            VoiceSource::Tone { hz } => {
                let length = start.length_seconds.unwrap_or(0.0);
                let remaining = ((length - offset).max(0.0) * rate).round() as u64;
                let cycles = hz as f64 * offset;
                Generator::Tone {
                    phase: (cycles.fract() * TAU as f64) as f32,
                    phase_inc: (TAU as f64 * hz as f64 / rate) as f32,
                    remaining,
                }
            }
            VoiceSource::Buffer(buffer) => {
                let source_rate = buffer.sample_rate as f64;
                Generator::Buffer {
                    pos: offset * source_rate,
                    step: source_rate / rate,
                    buffer,
                }
            }
        };
        let (left, right) = pan_gains(start.pan);
        Self {
            key: start.key,
            generator,
            gain_left: start.gain * left,
            gain_right: start.gain * right,
            active: true,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    // mixes into `out`, marks itself inactive once the source runs dry
    pub fn render_into(&mut self, out: &mut [StereoFrame]) {
        if !self.active {
            return;
        }
        match &mut self.generator {
            Generator::Tone {
                phase,
                phase_inc,
                remaining,
            } => {
                for frame in out.iter_mut() {
                    if *remaining == 0 {
                        self.active = false;
                        break;
                    }
                    let s = phase.sin();
                    frame.left += s * self.gain_left;
                    frame.right += s * self.gain_right;
                    *phase += *phase_inc;
                    if *phase > TAU {
                        *phase -= TAU;
                    }
                    *remaining -= 1;
                }
                if *remaining == 0 {
                    self.active = false;
                }
            }
            Generator::Buffer { buffer, pos, step } => {
                let len = buffer.len() as f64;
                for frame in out.iter_mut() {
                    if *pos >= len {
                        self.active = false;
                        break;
                    }
                    let s = buffer.frame_at(*pos);
                    frame.left += s.left * self.gain_left;
                    frame.right += s.right * self.gain_right;
                    *pos += *step;
                }
                if *pos >= len {
                    self.active = false;
                }
            }
        }
    }
}
