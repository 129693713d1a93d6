// Types shared between the playback core, the show model and the TUI.
//
// Keys (see tui/input.rs):
//   Space        GO
//   Up / Down    select previous / next cue
//   s            stop the stop target
//   Esc          stop everything
//   p            pause / resume everything
//   1..9         fire pad 1..9
//   - / =        master fader down / up
//   d            dim on / off
//   q            quit
//
// The TUI only renders a DisplayState built by the console each frame; it
// never looks at sessions directly.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

// ye olde types
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CueId(pub String);

#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PadId(pub String);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(pub u64);

impl CueId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl PadId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for CueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for PadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

static NEXT_SESSION: AtomicU64 = AtomicU64::new(1);

// atomic counter so ids stay unique even if sessions get built off-thread
pub fn next_session_id() -> SessionId {
    SessionId(NEXT_SESSION.fetch_add(1, Ordering::Relaxed))
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct CueRow {
    pub id: CueId,
    pub number: u32,
    pub title: String,
    pub subtitle: Option<String>,
    pub duration_label: Option<String>,
    pub decoding: bool, // file still being decoded
    pub source_label: String,     // "440 Hz", file name, or "-"
    pub progress: Option<f64>,    // Some while at least one session is live
    pub selected: bool,
    pub stop_target: bool,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct DisplayState {
    pub show_title: String,
    pub cues: Vec<CueRow>,
    pub pads: Vec<String>,
    pub paused: bool,
    pub master_level: f32,
    pub dimmed: bool,
    pub latency_ms: Option<f64>,
    pub status: String,
}
