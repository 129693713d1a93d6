//! cuebox: a show-cue player with tone and file cues, hot pads and a master fader.

pub mod audio;
pub mod audio_api;
pub mod cache;
pub mod config;
pub mod console;
pub mod error;
pub mod export;
pub mod fader;
pub mod poller;
pub mod runner;
pub mod session;
pub mod shared;
pub mod show;
pub mod tone;
pub mod tui;
