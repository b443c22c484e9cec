//! Error types for slot_player.
//!
//! Every engine wrapper and loader returns one of these instead of leaving a
//! status code to be polled after the call.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// The audio file could not be opened (usually: it does not exist).
    #[error("File does not exist: {}", .0.display())]
    FileOpen(PathBuf),

    /// The file exists but the decoder rejected it.
    #[error("Audio decode error: {0}")]
    Decode(String),

    /// Output device or stream errors.
    #[error("Audio output error: {0}")]
    AudioOutput(String),

    /// The engine refused to start a channel. Fatal for the session.
    #[error("Could not start playback: {0}")]
    Start(String),

    #[error("Seek failed: {0}")]
    Seek(String),

    /// A sample or channel handle the engine does not know about.
    #[error("Unknown engine handle: {0}")]
    InvalidHandle(u32),

    #[error("Schedule error at line {line}: {message}")]
    ScheduleParse { line: usize, message: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Errors that must end the session instead of being retried or skipped.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Start(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
