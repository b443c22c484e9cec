//! Leveled operator log.
//!
//! Every message goes to `tracing` and into a bounded in-memory buffer the
//! control panel draws from. `log_once` suppresses repeats of the same text,
//! which keeps retry loops from flooding the log.

use chrono::Local;
use std::collections::{HashSet, VecDeque};
use std::fmt;

const LOG_BUFFER_MAX: usize = 500;
/// Distinct `log_once` messages remembered before the set starts over.
const LOG_ONCE_MAX: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Info => write!(f, "INFO"),
            Severity::Warning => write!(f, "WARN"),
            Severity::Error => write!(f, "ERROR"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LogEntry {
    pub timestamp: String,
    pub severity: Severity,
    pub message: String,
}

pub struct LogBuffer {
    entries: VecDeque<LogEntry>,
}

impl LogBuffer {
    pub fn new() -> Self {
        LogBuffer {
            entries: VecDeque::new(),
        }
    }

    pub fn push(&mut self, severity: Severity, message: String) {
        let timestamp = Local::now().format("%H:%M:%S").to_string();
        self.entries.push_back(LogEntry {
            timestamp,
            severity,
            message,
        });
        while self.entries.len() > LOG_BUFFER_MAX {
            self.entries.pop_front();
        }
    }

    /// The newest `count` entries, oldest first.
    pub fn tail(&self, count: usize) -> Vec<LogEntry> {
        let skip = self.entries.len().saturating_sub(count);
        self.entries.iter().skip(skip).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for LogBuffer {
    fn default() -> Self {
        Self::new()
    }
}

pub struct Logger {
    buffer: LogBuffer,
    seen: HashSet<String>,
}

impl Logger {
    pub fn new() -> Self {
        Logger {
            buffer: LogBuffer::new(),
            seen: HashSet::new(),
        }
    }

    pub fn log(&mut self, severity: Severity, message: impl Into<String>) {
        let message = message.into();
        match severity {
            Severity::Info => tracing::info!("{}", message),
            Severity::Warning => tracing::warn!("{}", message),
            Severity::Error => tracing::error!("{}", message),
        }
        self.buffer.push(severity, message);
    }

    /// Log `message` only the first time this exact text is seen.
    pub fn log_once(&mut self, severity: Severity, message: impl Into<String>) {
        let message = message.into();
        if self.seen.contains(&message) {
            return;
        }
        if self.seen.len() >= LOG_ONCE_MAX {
            self.seen.clear();
        }
        self.seen.insert(message.clone());
        self.log(severity, message);
    }

    /// Let every `log_once` message through again.
    pub fn forget_once(&mut self) {
        self.seen.clear();
    }

    pub fn info(&mut self, message: impl Into<String>) {
        self.log(Severity::Info, message);
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        self.log(Severity::Warning, message);
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.log(Severity::Error, message);
    }

    pub fn buffer(&self) -> &LogBuffer {
        &self.buffer
    }
}

impl Default for Logger {
    fn default() -> Self {
        Self::new()
    }
}
