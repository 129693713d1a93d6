use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;

use crate::tone::DEFAULT_TONE_SECONDS;

/// Runtime knobs. Every field has a default, so a config file only needs the
/// ones it changes.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub poll_interval_ms: u64,
    pub preload_cap: usize,
    pub default_tone_seconds: f64,
    pub fader_step: f32,
    pub dim_level: f32,
    pub master_smoothing_ms: f32,
    pub max_voices: usize,
    pub device: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            poll_interval_ms: 16, // ~60fps
            preload_cap: 3,
            default_tone_seconds: DEFAULT_TONE_SECONDS,
            fader_step: 0.02,
            dim_level: 0.3,
            master_smoothing_ms: 10.0,
            max_voices: 64,
            device: None,
        }
    }
}

impl Config {
    /// Defaults when `path` is `None`; a named file that is missing or
    /// malformed is an error.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        serde_json::from_str(&data).with_context(|| format!("parsing config {}", path.display()))
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}
