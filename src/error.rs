// Never shown to the operator; a failure becomes "nothing started" and a log line.

use thiserror::Error;

/// Why a file could not be turned into a playable buffer.
///
/// `Clone` because one decode result is shared by every waiter on the same
/// cache entry.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("empty media path")]
    EmptyPath,

    #[error("open {path}: {reason}")]
    Open { path: String, reason: String },

    #[error("unrecognised container: {0}")]
    Probe(String),

    #[error("no playable audio track")]
    NoTrack,

    #[error("codec error: {0}")]
    Codec(String),

    #[error("decoded no audio from {0}")]
    Empty(String),

    #[error("decode worker failed: {0}")]
    Worker(String),
}

/// Failures while opening the output device.
#[derive(Error, Debug)]
pub enum OutputError {
    #[error("no output device: {0}")]
    NoDevice(String),

    #[error("output config: {0}")]
    Config(String),

    #[error("build output stream: {0}")]
    Build(String),

    #[error("start output stream: {0}")]
    Play(String),

    #[error("unsupported sample format {0}")]
    UnsupportedFormat(String),
}
