use serde::{Deserialize, Serialize};

use crate::shared::{CueId, PadId};
use crate::tone::ToneSpec;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cue {
    pub id: CueId,
    pub number: u32,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tone_hz: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tone_seconds: Option<f64>,
    #[serde(default)]
    pub gain_db: f64,
    #[serde(default)]
    pub pan: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pad {
    pub id: PadId,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_path: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Show {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub subtitle: String,
    #[serde(default)]
    pub cues: Vec<Cue>,
    #[serde(default)]
    pub pads: Vec<Pad>,
}

/// What a cue actually plays once its fields are validated.
#[derive(Clone, Debug, PartialEq)]
pub enum CueSource {
    Tone(ToneSpec),
    File { path: String, gain_db: f64, pan: f64 },
}

impl Cue {
    pub fn tone(id: &str, number: u32, title: &str, hz: f64) -> Self {
        Self {
            id: CueId::new(id),
            number,
            title: title.to_string(),
            duration_label: None,
            subtitle: None,
            notes: None,
            media_path: None,
            tone_hz: Some(hz),
            tone_seconds: None,
            gain_db: 0.0,
            pan: 0.0,
        }
    }

    pub fn file(id: &str, number: u32, title: &str, path: &str) -> Self {
        Self {
            media_path: Some(path.to_string()),
            tone_hz: None,
            ..Self::tone(id, number, title, 0.0)
        }
    }

    /// Tone wins over file, but only a tone that validates; a blank path
    /// counts as no file. `None` means GO on this cue does nothing.
    pub fn source(&self, default_tone_seconds: f64) -> Option<CueSource> {
        let tone = self.tone_hz.and_then(|hz| {
            ToneSpec::new(
                hz,
                self.tone_seconds.unwrap_or(default_tone_seconds),
                self.gain_db,
                self.pan,
            )
        });
        if let Some(spec) = tone {
            return Some(CueSource::Tone(spec));
        }
        let path = self
            .media_path
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())?;
        Some(CueSource::File {
            path: path.to_string(),
            gain_db: if self.gain_db.is_finite() { self.gain_db } else { 0.0 },
            pan: if self.pan.is_finite() { self.pan.clamp(-1.0, 1.0) } else { 0.0 },
        })
    }

    /// Short operator-facing description of the source.
    pub fn source_label(&self) -> String {
        if let Some(hz) = self.tone_hz.filter(|hz| hz.is_finite() && *hz > 0.0) {
            return format!("{hz} Hz");
        }
        match self.media_path.as_deref().map(str::trim) {
            Some(p) if !p.is_empty() => std::path::Path::new(p)
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| p.to_string()),
            _ => "-".to_string(),
        }
    }
}

impl Pad {
    pub fn media(&self) -> Option<&str> {
        self.media_path.as_deref().map(str::trim).filter(|p| !p.is_empty())
    }
}

impl Show {
    /// Cues come in from disk in any order; everything downstream walks them
    /// by ordinal.
    pub fn sort_cues(&mut self) {
        self.cues.sort_by_key(|c| c.number);
    }

    pub fn cue(&self, id: &CueId) -> Option<&Cue> {
        self.cues.iter().find(|c| &c.id == id)
    }

    pub fn pad(&self, id: &PadId) -> Option<&Pad> {
        self.pads.iter().find(|p| &p.id == id)
    }

    pub fn first_cue(&self) -> Option<&Cue> {
        self.cues.iter().min_by_key(|c| c.number)
    }

    /// The cue at ordinal `number + 1`, if there is one.
    pub fn cue_after(&self, number: u32) -> Option<&Cue> {
        let next = number.checked_add(1)?;
        self.cues.iter().find(|c| c.number == next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn show() -> Show {
        let mut show = Show {
            id: "s".to_string(),
            title: "S".to_string(),
            subtitle: String::new(),
            cues: vec![
                Cue::tone("c3", 3, "three", 660.0),
                Cue::tone("c1", 1, "one", 220.0),
                Cue::file("c2", 2, "two", "a.wav"),
            ],
            pads: vec![],
        };
        show.sort_cues();
        show
    }

    #[test]
    fn walks_cues_by_ordinal() {
        let show = show();
        assert_eq!(show.first_cue().unwrap().id, CueId::new("c1"));
        assert_eq!(show.cue_after(1).unwrap().id, CueId::new("c2"));
        assert!(show.cue_after(3).is_none());
        assert!(show.cue_after(u32::MAX).is_none());
    }

    #[test]
    fn tone_wins_when_valid() {
        let mut cue = Cue::tone("c", 1, "both", 440.0);
        cue.media_path = Some("x.wav".to_string());
        cue.gain_db = -6.0;
        match cue.source(1.0) {
            Some(CueSource::Tone(spec)) => {
                assert_eq!(spec.hz, 440.0);
                assert_eq!(spec.seconds, 1.0);
                assert_eq!(spec.gain_db, -6.0);
            }
            other => panic!("expected a tone, got {other:?}"),
        }
    }

    #[test]
    fn invalid_tone_falls_back_to_file() {
        let mut cue = Cue::file("c", 1, "f", "x.wav");
        cue.tone_hz = Some(-5.0);
        assert!(matches!(
            cue.source(1.0),
            Some(CueSource::File { ref path, .. }) if path == "x.wav"
        ));

        cue.media_path = Some("   ".to_string());
        assert_eq!(cue.source(1.0), None);
    }

    #[test]
    fn tone_seconds_override_default() {
        let mut cue = Cue::tone("c", 1, "t", 440.0);
        cue.tone_seconds = Some(0.01);
        let Some(CueSource::Tone(spec)) = cue.source(1.0) else {
            panic!("expected a tone");
        };
        assert_eq!(spec.seconds, 0.05);
    }

    #[test]
    fn reads_camel_case_fields() {
        let json = r#"{"id":"c9","number":9,"title":"Door",
            "mediaPath":"/sfx/door.mp3","gainDb":-3,"pan":0.5}"#;
        let cue: Cue = serde_json::from_str(json).unwrap();
        assert_eq!(cue.media_path.as_deref(), Some("/sfx/door.mp3"));
        assert_eq!(cue.gain_db, -3.0);
        assert_eq!(cue.pan, 0.5);
        assert_eq!(cue.tone_hz, None);
        assert_eq!(cue.source_label(), "door.mp3");
    }
}
