mod model;
mod persistence;
pub mod warm;

pub use model::{Cue, CueSource, Pad, Show};
pub use persistence::{choose_show, load_shows, parse_shows, tone_test_show};
pub use warm::pick_warm_paths;

/// `-MM:SS,t`, the countdown style shows carry in `durationLabel`.
pub fn format_duration_label(seconds: f64) -> Option<String> {
    if !seconds.is_finite() || seconds <= 0.0 {
        return None;
    }
    let tenths = (seconds * 10.0).round() as u64;
    let minutes = tenths / 600;
    let secs = (tenths / 10) % 60;
    Some(format!("-{minutes:02}:{secs:02},{}", tenths % 10))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duration_labels() {
        assert_eq!(format_duration_label(4.8).as_deref(), Some("-00:04,8"));
        assert_eq!(format_duration_label(183.3).as_deref(), Some("-03:03,3"));
        assert_eq!(format_duration_label(59.96).as_deref(), Some("-01:00,0"));
        assert_eq!(format_duration_label(0.0), None);
        assert_eq!(format_duration_label(f64::NAN), None);
    }
}
