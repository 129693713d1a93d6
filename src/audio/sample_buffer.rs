use super::frame::StereoFrame;

/// A fully decoded file held in memory at its native sample rate.
///
/// Voices read it with fractional positions, so no resampling pass is needed
/// when the device runs at a different rate.
#[derive(Clone, Debug, PartialEq)]
pub struct SampleBuffer {
    pub data: Vec<StereoFrame>, // the audio data array
    pub sample_rate: u32,
}

impl SampleBuffer {
    pub fn new(data: Vec<StereoFrame>, sample_rate: u32) -> Self {
        Self { data, sample_rate }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn duration_seconds(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.data.len() as f64 / self.sample_rate as f64
    }

    /// Linear-interpolated read at a fractional frame position.
    pub fn frame_at(&self, pos: f64) -> StereoFrame {
        if self.data.is_empty() || pos < 0.0 {
            return StereoFrame::zero();
        }
        let i = pos as usize;
        let Some(&s0) = self.data.get(i) else {
            return StereoFrame::zero();
        };
        let s1 = self.data.get(i + 1).copied().unwrap_or(s0);
        StereoFrame::lerp(s0, s1, (pos - i as f64) as f32)
    }
}

// mono goes to both sides, anything wider than stereo keeps its first two channels
pub(crate) fn push_interleaved(out: &mut Vec<StereoFrame>, samples: &[f32], channels: usize) {
    match channels {
        0 => {}
        1 => out.extend(samples.iter().map(|&x| StereoFrame::mono(x))),
        n => out.extend(samples.chunks_exact(n).map(|c| StereoFrame {
            left: c[0],
            right: c[1],
        })),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mono_is_duplicated() {
        let mut frames = Vec::new();
        push_interleaved(&mut frames, &[0.5, -0.5], 1);
        assert_eq!(frames, vec![StereoFrame::mono(0.5), StereoFrame::mono(-0.5)]);
    }

    #[test]
    fn wide_layouts_keep_front_pair() {
        let mut frames = vec![StereoFrame::zero()];
        push_interleaved(&mut frames, &[0.1, 0.2, 0.9, 0.3, 0.4, 0.9], 3);
        assert_eq!(frames.len(), 3);
        assert_eq!(frames[2], StereoFrame { left: 0.3, right: 0.4 });
    }

    #[test]
    fn duration_follows_native_rate() {
        let buf = SampleBuffer::new(vec![StereoFrame::zero(); 22_050], 44_100);
        assert!((buf.duration_seconds() - 0.5).abs() < 1e-9);
        assert_eq!(SampleBuffer::new(vec![], 0).duration_seconds(), 0.0);
    }

    #[test]
    fn frame_at_interpolates_and_bounds() {
        let buf = SampleBuffer::new(vec![StereoFrame::mono(0.0), StereoFrame::mono(1.0)], 2);
        assert!((buf.frame_at(0.25).left - 0.25).abs() < 1e-6);
        assert_eq!(buf.frame_at(1.5), StereoFrame::mono(1.0));
        assert_eq!(buf.frame_at(2.0), StereoFrame::zero());
        assert_eq!(buf.frame_at(-1.0), StereoFrame::zero());
    }
}
