// Show files are read-only here: whatever edits them lives elsewhere.
use std::path::Path;

use anyhow::Context;
use serde::Deserialize;

use super::model::{Cue, Show};

// a show file holds either one show or a list of them
#[derive(Deserialize)]
#[serde(untagged)]
enum ShowFile {
    Many(Vec<Show>),
    One(Show),
}

pub fn load_shows(path: &Path) -> anyhow::Result<Vec<Show>> {
    let data = std::fs::read_to_string(path)
        .with_context(|| format!("reading show file {}", path.display()))?;
    parse_shows(&data).with_context(|| format!("parsing show file {}", path.display()))
}

pub fn parse_shows(json: &str) -> anyhow::Result<Vec<Show>> {
    let mut shows = match serde_json::from_str(json)? {
        ShowFile::Many(shows) => shows,
        ShowFile::One(show) => vec![show],
    };
    for show in &mut shows {
        show.sort_cues();
    }
    Ok(shows)
}

/// Pick a show by id, or the first one.
pub fn choose_show(shows: Vec<Show>, id: Option<&str>) -> anyhow::Result<Show> {
    match id {
        Some(id) => shows
            .into_iter()
            .find(|s| s.id == id)
            .with_context(|| format!("no show with id {id:?}")),
        None => shows.into_iter().next().context("show file has no shows"),
    }
}

/// Built-in line check show: eight sine cues, no pads.
pub fn tone_test_show() -> Show {
    let tones = [
        ("t1", "A3 - 220 Hz", 220.0),
        ("t2", "A4 - 440 Hz", 440.0),
        ("t3", "C5 - 523.25 Hz", 523.25),
        ("t4", "E5 - 659.25 Hz", 659.25),
        ("t5", "A5 - 880 Hz", 880.0),
        ("t6", "1 kHz - 1000 Hz", 1000.0),
        ("t7", "2 kHz - 2000 Hz", 2000.0),
        ("t8", "Low - 110 Hz", 110.0),
    ];
    Show {
        id: "tone-test".to_string(),
        title: "Tone Test".to_string(),
        subtitle: format!("{} cues / 0 hits", tones.len()),
        cues: tones
            .iter()
            .zip(1u32..)
            .map(|(&(id, title, hz), number)| Cue::tone(id, number, title, hz))
            .collect(),
        pads: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::CueId;

    #[test]
    fn single_show_document() {
        let json = r#"{
            "id": "hamlet",
            "title": "Hamlet",
            "cues": [
                {"id": "h2", "number": 2, "title": "Knock", "mediaPath": "knock.wav"},
                {"id": "h1", "number": 1, "title": "Storm", "toneHz": 110}
            ],
            "pads": [{"id": "p1", "label": "Thunder"}]
        }"#;
        let shows = parse_shows(json).unwrap();
        assert_eq!(shows.len(), 1);
        let ids: Vec<_> = shows[0].cues.iter().map(|c| c.id.clone()).collect();
        assert_eq!(ids, vec![CueId::new("h1"), CueId::new("h2")]);
        assert_eq!(shows[0].pads[0].media(), None);
    }

    #[test]
    fn list_document_and_choice() {
        let json = r#"[
            {"id": "a", "title": "A"},
            {"id": "b", "title": "B", "subtitle": "second"}
        ]"#;
        let shows = parse_shows(json).unwrap();
        assert_eq!(shows.len(), 2);
        let b = choose_show(shows.clone(), Some("b")).unwrap();
        assert_eq!(b.subtitle, "second");
        assert_eq!(choose_show(shows.clone(), None).unwrap().id, "a");
        assert!(choose_show(shows, Some("zzz")).is_err());
    }

    #[test]
    fn load_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_shows(&dir.path().join("nope.json")).unwrap_err();
        assert!(format!("{err:#}").contains("nope.json"));
    }

    #[test]
    fn tone_test_show_is_contiguous() {
        let show = tone_test_show();
        let numbers: Vec<u32> = show.cues.iter().map(|c| c.number).collect();
        assert_eq!(numbers, (1..=8).collect::<Vec<_>>());
        assert_eq!(show.cues[1].tone_hz, Some(440.0));
        assert!(show.pads.is_empty());
    }
}
