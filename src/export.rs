use std::f64::consts::TAU;
use std::path::{Path, PathBuf};

use anyhow::Context;

use crate::audio::{StereoFrame, pan_gains};
use crate::tone::ToneSpec;

pub const EXPORT_SAMPLE_RATE: u32 = 44_100;
const FADE_SECONDS: f64 = 0.010;

/// Fade length in frames: 10 ms, or half the tone if that is shorter.
pub fn fade_frames(total: usize, sample_rate: u32) -> usize {
    let fade = (sample_rate as f64 * FADE_SECONDS).floor() as usize;
    fade.min(total / 2)
}

pub fn render_tone(spec: &ToneSpec, sample_rate: u32) -> Vec<StereoFrame> {
    let rate = sample_rate.max(1) as f64;
    let total = (spec.seconds * rate).floor() as usize;
    let fade = fade_frames(total, sample_rate);
    let gain = spec.linear_gain() as f32;
    let (left, right) = pan_gains(spec.pan as f32);

    (0..total)
        .map(|i| {
            let mut amp = (TAU * spec.hz * i as f64 / rate).sin();
            if fade > 0 {
                if i < fade {
                    amp *= i as f64 / fade as f64;
                } else if i > total - fade {
                    amp *= (total - i) as f64 / fade as f64;
                }
            }
            let s = amp as f32 * gain;
            StereoFrame {
                left: s * left,
                right: s * right,
            }
        })
        .collect()
}

/// `out` with `.wav` appended unless it already ends in it (any case).
pub fn wav_path(out: &Path) -> PathBuf {
    let has_ext = out
        .extension()
        .is_some_and(|e| e.eq_ignore_ascii_case("wav"));
    if has_ext {
        out.to_path_buf()
    } else {
        let mut name = out.as_os_str().to_owned();
        name.push(".wav");
        PathBuf::from(name)
    }
}

/// Write `spec` as 16-bit stereo PCM at 44.1 kHz. Returns the path written.
pub fn write_tone_wav(out: &Path, spec: &ToneSpec) -> anyhow::Result<PathBuf> {
    let path = wav_path(out);
    let wav_spec = hound::WavSpec {
        channels: 2,
        sample_rate: EXPORT_SAMPLE_RATE,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(&path, wav_spec)
        .with_context(|| format!("creating {}", path.display()))?;
    for frame in render_tone(spec, EXPORT_SAMPLE_RATE) {
        writer.write_sample(to_i16(frame.left))?;
        writer.write_sample(to_i16(frame.right))?;
    }
    writer.finalize()?;
    tracing::info!(path = %path.display(), hz = spec.hz, seconds = spec.seconds, "tone exported");
    Ok(path)
}

fn to_i16(s: f32) -> i16 {
    (s.clamp(-1.0, 1.0) * i16::MAX as f32).round() as i16
}
