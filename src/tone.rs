pub const MIN_TONE_SECONDS: f64 = 0.05;
pub const MAX_TONE_SECONDS: f64 = 60.0;
pub const DEFAULT_TONE_SECONDS: f64 = 1.0;

/// gain = 10^(dB/20)
pub fn db_to_gain(db: f64) -> f64 {
    if !db.is_finite() {
        return 1.0;
    }
    10f64.powf(db / 20.0)
}

/// A validated sine tone: finite positive frequency, length inside
/// [`MIN_TONE_SECONDS`, `MAX_TONE_SECONDS`], pan inside [-1, 1].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ToneSpec {
    pub hz: f64,
    pub seconds: f64,
    pub gain_db: f64,
    pub pan: f64,
}

impl ToneSpec {
    /// `None` when the frequency is not finite and positive. A non-finite
    /// length falls back to the default, a non-finite gain or pan to neutral.
    pub fn new(hz: f64, seconds: f64, gain_db: f64, pan: f64) -> Option<Self> {
        if !hz.is_finite() || hz <= 0.0 {
            return None;
        }
        let seconds = if seconds.is_finite() {
            seconds
        } else {
            DEFAULT_TONE_SECONDS
        };
        Some(Self {
            hz,
            seconds: seconds.clamp(MIN_TONE_SECONDS, MAX_TONE_SECONDS),
            gain_db: if gain_db.is_finite() { gain_db } else { 0.0 },
            pan: if pan.is_finite() { pan.clamp(-1.0, 1.0) } else { 0.0 },
        })
    }

    pub fn linear_gain(&self) -> f64 {
        db_to_gain(self.gain_db)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn db_to_gain_matches_decibel_law() {
        assert!((db_to_gain(0.0) - 1.0).abs() < 1e-12);
        assert!((db_to_gain(-6.0) - 0.501_187).abs() < 1e-6);
        assert!((db_to_gain(20.0) - 10.0).abs() < 1e-9);
        assert_eq!(db_to_gain(f64::NAN), 1.0);
    }

    #[test]
    fn rejects_unusable_frequencies() {
        assert!(ToneSpec::new(0.0, 1.0, 0.0, 0.0).is_none());
        assert!(ToneSpec::new(-440.0, 1.0, 0.0, 0.0).is_none());
        assert!(ToneSpec::new(f64::NAN, 1.0, 0.0, 0.0).is_none());
        assert!(ToneSpec::new(f64::INFINITY, 1.0, 0.0, 0.0).is_none());
    }

    #[test]
    fn clamps_length_and_pan() {
        let short = ToneSpec::new(440.0, 0.001, 0.0, -3.0).unwrap();
        assert_eq!(short.seconds, MIN_TONE_SECONDS);
        assert_eq!(short.pan, -1.0);

        let long = ToneSpec::new(440.0, 600.0, 0.0, 0.0).unwrap();
        assert_eq!(long.seconds, MAX_TONE_SECONDS);

        let odd = ToneSpec::new(440.0, f64::NAN, f64::NAN, f64::NAN).unwrap();
        assert_eq!(odd.seconds, DEFAULT_TONE_SECONDS);
        assert_eq!(odd.gain_db, 0.0);
        assert_eq!(odd.pan, 0.0);
    }
}
