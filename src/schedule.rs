//! The input list: the day's slots, each a file with a start and end time.
//!
//! File format, one item per line:
//!
//! ```text
//! # comment
//! folder = /srv/radio/%Y-%m-%d
//! 08:00 09:00 morning show.mp3
//! 09:00 10:30:00 news.mp3
//! ```
//!
//! The folder is a chrono strftime template expanded with the current date, so
//! a new day switches to that day's folder. A relative folder is resolved
//! against the schedule file's directory; without a `folder` line the
//! schedule's own directory is used.

use crate::error::{Error, Result};
use chrono::format::{Item, StrftimeItems};
use chrono::{NaiveDate, NaiveTime};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleEntry {
    pub file_name: String,
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl ScheduleEntry {
    pub fn start_display(&self) -> String {
        self.start.format("%H:%M").to_string()
    }

    pub fn end_display(&self) -> String {
        self.end.format("%H:%M").to_string()
    }
}

/// Parsed contents of a schedule file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleFile {
    pub folder: String,
    pub entries: Vec<ScheduleEntry>,
}

/// Owns the schedule and the cursor into it.
#[derive(Debug)]
pub struct Schedule {
    path: PathBuf,
    folder: String,
    entries: Vec<ScheduleEntry>,
    index: usize,
    modified: Option<SystemTime>,
}

impl Schedule {
    /// Read and parse a schedule file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("cannot read schedule '{}': {}", path.display(), e))
        })?;
        let parsed = parse_schedule(&text)?;
        Ok(Schedule {
            path: path.to_path_buf(),
            folder: parsed.folder,
            entries: parsed.entries,
            index: 0,
            modified: modified_time(path),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn entries(&self) -> &[ScheduleEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn current_index(&self) -> usize {
        self.index
    }

    pub fn current(&self) -> Option<&ScheduleEntry> {
        self.entries.get(self.index)
    }

    /// Advance to the next entry, wrapping after the last one.
    pub fn next(&mut self) {
        if self.entries.is_empty() {
            self.index = 0;
        } else {
            self.index = (self.index + 1) % self.entries.len();
        }
    }

    /// Back to the first entry.
    pub fn reset(&mut self) {
        self.index = 0;
    }

    /// The folder holding the files for `date`.
    pub fn folder_for(&self, date: NaiveDate) -> PathBuf {
        let expanded = PathBuf::from(date.format(&self.folder).to_string());
        if expanded.is_absolute() {
            return expanded;
        }
        match self.path.parent() {
            Some(dir) => dir.join(expanded),
            None => expanded,
        }
    }

    /// Full path of the current entry's file for `date`.
    pub fn current_path(&self, date: NaiveDate) -> Option<PathBuf> {
        self.current()
            .map(|entry| self.folder_for(date).join(&entry.file_name))
    }

    /// Re-read the file if its modification time moved.
    ///
    /// Returns `Ok(true)` when new contents were loaded. The cursor is kept
    /// if it still points inside the list, otherwise it goes back to the top.
    /// On a parse error the previous contents stay in place.
    pub fn refresh(&mut self) -> Result<bool> {
        let modified = modified_time(&self.path);
        if modified == self.modified {
            return Ok(false);
        }
        self.modified = modified;
        let text = fs::read_to_string(&self.path)?;
        let parsed = parse_schedule(&text)?;
        self.folder = parsed.folder;
        self.entries = parsed.entries;
        if self.index >= self.entries.len() {
            self.index = 0;
        }
        Ok(true)
    }
}

fn modified_time(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|m| m.modified()).ok()
}

/// Parse a time string in HH:MM or HH:MM:SS format.
pub fn parse_time(s: &str) -> std::result::Result<NaiveTime, String> {
    NaiveTime::parse_from_str(s, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M"))
        .map_err(|_| format!("Invalid time '{}'. Expected HH:MM or HH:MM:SS", s))
}

/// Parse the text of a schedule file.
pub fn parse_schedule(text: &str) -> Result<ScheduleFile> {
    let mut folder = String::from(".");
    let mut entries = Vec::new();

    for (i, raw) in text.lines().enumerate() {
        let line_no = i + 1;
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if let Some(rest) = line.strip_prefix("folder") {
            if let Some(value) = rest.trim_start().strip_prefix('=') {
                let value = value.trim();
                if value.is_empty() {
                    return Err(parse_error(line_no, "empty folder"));
                }
                if StrftimeItems::new(value).any(|item| matches!(item, Item::Error)) {
                    return Err(parse_error(
                        line_no,
                        &format!("invalid date pattern in folder '{}'", value),
                    ));
                }
                folder = value.to_string();
                continue;
            }
        }

        let (start, rest) = split_field(line)
            .ok_or_else(|| parse_error(line_no, "expected '<start> <end> <file>'"))?;
        let (end, file_name) = split_field(rest)
            .ok_or_else(|| parse_error(line_no, "expected '<start> <end> <file>'"))?;
        let start = parse_time(start).map_err(|m| parse_error(line_no, &m))?;
        let end = parse_time(end).map_err(|m| parse_error(line_no, &m))?;

        entries.push(ScheduleEntry {
            file_name: file_name.to_string(),
            start,
            end,
        });
    }

    Ok(ScheduleFile { folder, entries })
}

/// Split off the first whitespace-separated field; the remainder is trimmed
/// and must be non-empty.
fn split_field(s: &str) -> Option<(&str, &str)> {
    let (head, tail) = s.split_once(char::is_whitespace)?;
    let tail = tail.trim();
    if tail.is_empty() { None } else { Some((head, tail)) }
}

fn parse_error(line: usize, message: &str) -> Error {
    Error::ScheduleParse {
        line,
        message: message.to_string(),
    }
}
