use std::collections::HashSet;

use super::model::Show;

// plenty; only a handful ever get preloaded
const MAX_CANDIDATES: usize = 50;

/// Media paths worth decoding at startup, best first.
///
/// Cues come before pads (GO is the hot path), blanks are skipped, and
/// duplicates are dropped case-insensitively keeping the first spelling.
/// MP3s are the slowest to decode so they go to the front.
pub fn pick_warm_paths(shows: &[Show], max: usize) -> Vec<String> {
    if max == 0 {
        return Vec::new();
    }
    let mut candidates = collect_candidates(shows);
    candidates.truncate(MAX_CANDIDATES);
    // stable, so ties keep show order
    candidates.sort_by_key(|p| !is_mp3(p));
    candidates.truncate(max);
    candidates
}

fn collect_candidates(shows: &[Show]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    let mut add = |out: &mut Vec<String>, raw: Option<&str>| {
        let Some(p) = raw.map(str::trim).filter(|p| !p.is_empty()) else {
            return;
        };
        if seen.insert(p.to_lowercase()) {
            out.push(p.to_string());
        }
    };

    for show in shows {
        for cue in &show.cues {
            add(&mut out, cue.media_path.as_deref());
        }
        for pad in &show.pads {
            add(&mut out, pad.media_path.as_deref());
        }
        if out.len() >= MAX_CANDIDATES {
            break;
        }
    }
    out
}

fn is_mp3(path: &str) -> bool {
    path.to_lowercase().ends_with(".mp3")
}
