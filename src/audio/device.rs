use std::sync::Arc;
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait};

use super::clock::AudioClock;
use super::engine::Engine;
use super::frame::StereoFrame;
use crate::error::OutputError;

// grown only if the host asks for a bigger block than this
const SCRATCH_FRAMES: usize = 8192;

/// Pick the first output device whose name contains `needle`
/// (case-insensitive), or the host default when no needle is given.
pub fn pick_device(host: &cpal::Host, needle: Option<&str>) -> Result<cpal::Device, OutputError> {
    if let Some(needle) = needle {
        let devices = host
            .output_devices()
            .map_err(|e| OutputError::NoDevice(e.to_string()))?;
        for device in devices {
            if device_name(&device).is_some_and(|n| matches_device_name(&n, needle)) {
                return Ok(device);
            }
        }
        return Err(OutputError::NoDevice(format!("nothing matched {needle:?}")));
    }

    host.default_output_device()
        .ok_or_else(|| OutputError::NoDevice("no default output device".to_string()))
}

pub fn device_name(device: &cpal::Device) -> Option<String> {
    device.description().ok().map(|d| d.name().to_string())
}

/// Names of every output device the host reports.
pub fn list_output_devices() -> Result<Vec<String>, OutputError> {
    let host = cpal::default_host();
    let devices = host
        .output_devices()
        .map_err(|e| OutputError::NoDevice(e.to_string()))?;
    Ok(devices.filter_map(|d| device_name(&d)).collect())
}

fn matches_device_name(name: &str, needle: &str) -> bool {
    name.to_lowercase().contains(&needle.to_lowercase())
}

/// Build (but do not start) an output stream that renders `engine`.
pub fn build_output_stream(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    sample_format: cpal::SampleFormat,
    engine: Engine,
    clock: Arc<AudioClock>,
) -> Result<cpal::Stream, OutputError> {
    match sample_format {
        cpal::SampleFormat::F32 => build_stream::<f32>(device, config, engine, clock),
        cpal::SampleFormat::I16 => build_stream::<i16>(device, config, engine, clock),
        cpal::SampleFormat::I32 => build_stream::<i32>(device, config, engine, clock),
        cpal::SampleFormat::U16 => build_stream::<u16>(device, config, engine, clock),
        other => Err(OutputError::UnsupportedFormat(format!("{other:?}"))),
    }
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    mut engine: Engine,
    clock: Arc<AudioClock>,
) -> Result<cpal::Stream, OutputError>
where
    T: cpal::Sample + cpal::SizedSample + cpal::FromSample<f32>,
{
    let channels = (config.channels as usize).max(1);
    let rate = clock.sample_rate() as f64;
    let mut scratch = vec![StereoFrame::zero(); SCRATCH_FRAMES];

    let err_fn = |err| tracing::warn!("audio output stream error: {err}");

    device
        .build_output_stream(
            config,
            move |data: &mut [T], info: &cpal::OutputCallbackInfo| {
                let frames = data.len() / channels;
                if scratch.len() < frames {
                    scratch.resize(frames, StereoFrame::zero());
                }
                let block = &mut scratch[..frames];
                engine.process(block);
                write_interleaved(data, block, channels);

                // base latency of the device plus the block we just queued
                let ts = info.timestamp();
                let device_latency = ts.playback.duration_since(&ts.callback).unwrap_or_default();
                let buffering = Duration::from_secs_f64(frames as f64 / rate);
                clock.publish_latency(device_latency + buffering);
            },
            err_fn,
            None,
        )
        .map_err(|e| OutputError::Build(e.to_string()))
}

/// Map stereo frames onto the device layout: mono devices get the average,
/// extra channels beyond the front pair stay silent.
fn write_interleaved<T>(data: &mut [T], block: &[StereoFrame], channels: usize)
where
    T: cpal::Sample + cpal::FromSample<f32>,
{
    for (out, frame) in data.chunks_exact_mut(channels).zip(block) {
        match out {
            [mono] => *mono = T::from_sample(0.5 * (frame.left + frame.right)),
            [left, right, rest @ ..] => {
                *left = T::from_sample(frame.left);
                *right = T::from_sample(frame.right);
                for ch in rest {
                    *ch = T::from_sample(0.0f32);
                }
            }
            [] => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_device_name_is_case_insensitive() {
        assert!(matches_device_name("MacBook Pro Speakers", "speakers"));
        assert!(!matches_device_name("USB DAC", "speakers"));
    }

    #[test]
    fn mono_device_gets_average() {
        let mut data = [0.0f32; 2];
        let block = [
            StereoFrame {
                left: 1.0,
                right: 0.0,
            },
            StereoFrame::mono(0.25),
        ];
        write_interleaved(&mut data, &block, 1);
        assert_eq!(data, [0.5, 0.25]);
    }

    #[test]
    fn surround_device_keeps_front_pair() {
        let mut data = [9.0f32; 4];
        let block = [StereoFrame {
            left: 0.1,
            right: 0.2,
        }];
        write_interleaved(&mut data, &block, 4);
        assert_eq!(data, [0.1, 0.2, 0.0, 0.0]);
    }

    #[test]
    fn integer_formats_are_converted() {
        let mut data = [0i16; 2];
        write_interleaved(&mut data, &[StereoFrame::mono(0.0)], 2);
        assert_eq!(data, [0, 0]);
    }
}
