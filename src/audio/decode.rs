use std::fs::File;
use std::path::Path;

use symphonia::core::audio::SampleBuffer as PacketSamples;
use symphonia::core::{
    codecs::DecoderOptions, formats::FormatOptions, io::MediaSourceStream, meta::MetadataOptions,
    probe::Hint,
};

use super::sample_buffer::{SampleBuffer, push_interleaved};
use crate::cache::Decode;
use crate::error::DecodeError;

/// The production decoder behind the decode cache.
#[derive(Clone, Copy, Debug, Default)]
pub struct SymphoniaDecoder;

impl Decode for SymphoniaDecoder {
    fn decode(&self, path: &str) -> Result<SampleBuffer, DecodeError> {
        decode_file(Path::new(path))
    }
}

/// Decode `path` completely.
///
/// Corrupt packets are skipped; a file that yields no frames at all is an error.
pub fn decode_file(path: &Path) -> Result<SampleBuffer, DecodeError> {
    let file = File::open(path).map_err(|e| DecodeError::Open {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let mss = MediaSourceStream::new(Box::new(file), Default::default());
    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| DecodeError::Probe(e.to_string()))?;

    let mut format = probed.format;
    let track = format.default_track().ok_or(DecodeError::NoTrack)?;
    let track_id = track.id;
    let codec_params = track.codec_params.clone();
    let sample_rate = codec_params.sample_rate.ok_or(DecodeError::NoTrack)?;

    let mut decoder = symphonia::default::get_codecs()
        .make(&codec_params, &DecoderOptions::default())
        .map_err(|e| DecodeError::Codec(e.to_string()))?;

    let mut frames = Vec::new();
    loop {
        let packet = match format.next_packet() {
            Ok(p) => p,
            Err(_) => break, // EOF
        };
        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(d) => d,
            Err(_) => continue,
        };

        let spec = *decoded.spec();
        let mut samples = PacketSamples::<f32>::new(decoded.capacity() as u64, spec);
        samples.copy_interleaved_ref(decoded);
        push_interleaved(&mut frames, samples.samples(), spec.channels.count());
    }

    if frames.is_empty() {
        return Err(DecodeError::Empty(path.display().to_string()));
    }

    tracing::debug!(
        path = %path.display(),
        frames = frames.len(),
        rate_hz = sample_rate,
        "decoded"
    );
    Ok(SampleBuffer::new(frames, sample_rate))
}
