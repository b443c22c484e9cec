//! Playback session state and the guards that drive its transitions.

use crate::engine::{ChannelHandle, SampleHandle};
use chrono::{NaiveTime, Timelike};
use std::fmt;
use std::time::Duration;

/// Fraction of the length at which a track counts as finished.
const END_FRACTION: f64 = 0.9999;
/// Fraction of the length still counted as "at the very start".
const START_FRACTION: f64 = 0.0001;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    /// Content loaded and not started, or nothing scheduled.
    Idle,
    /// The current entry must be (re)loaded on the next tick.
    Loading,
    PlayingIntro,
    Playing,
    PlayingOutro,
    Paused,
}

impl PlaybackState {
    /// Whether the open channel belongs to the content sample.
    pub fn is_content(&self) -> bool {
        matches!(
            self,
            PlaybackState::Idle | PlaybackState::Playing | PlaybackState::Paused
        )
    }

    pub fn is_jingle(&self) -> bool {
        matches!(self, PlaybackState::PlayingIntro | PlaybackState::PlayingOutro)
    }
}

impl fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlaybackState::Idle => write!(f, "idle"),
            PlaybackState::Loading => write!(f, "loading"),
            PlaybackState::PlayingIntro => write!(f, "intro"),
            PlaybackState::Playing => write!(f, "playing"),
            PlaybackState::PlayingOutro => write!(f, "outro"),
            PlaybackState::Paused => write!(f, "paused"),
        }
    }
}

/// Everything the control loop owns about what is loaded right now.
#[derive(Debug, Clone)]
pub struct Session {
    pub sample: Option<SampleHandle>,
    pub channel: Option<ChannelHandle>,
    /// Length of the content channel when it was loaded. A channel reporting
    /// a different length is a jingle.
    pub sample_length: Duration,
    pub state: PlaybackState,
}

impl Session {
    pub fn new() -> Self {
        Session {
            sample: None,
            channel: None,
            sample_length: Duration::ZERO,
            state: PlaybackState::Loading,
        }
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

/// The content channel has played out.
pub fn reached_natural_end(position: Duration, length: Duration, sample_length: Duration) -> bool {
    !length.is_zero()
        && length == sample_length
        && position.as_secs_f64() >= length.as_secs_f64() * END_FRACTION
}

/// The channel has not moved off its first moments.
pub fn at_track_start(position: Duration, length: Duration) -> bool {
    position.as_secs_f64() <= length.as_secs_f64() * START_FRACTION
}

/// Wall clock and slot time agree to the minute.
pub fn matches_minute(now: NaiveTime, slot: NaiveTime) -> bool {
    now.hour() == slot.hour() && now.minute() == slot.minute()
}

/// Detects day-of-month changes between ticks.
#[derive(Debug, Clone)]
pub struct DayWatch {
    today: u32,
}

impl DayWatch {
    pub fn new(day: u32) -> Self {
        DayWatch { today: day }
    }

    pub fn today(&self) -> u32 {
        self.today
    }

    /// Record `day`; true if it differs from the last one seen.
    pub fn changed(&mut self, day: u32) -> bool {
        if day == self.today {
            return false;
        }
        self.today = day;
        true
    }
}

/// Fires once per (schedule index, minute) pair.
///
/// The wall clock matches a slot's HH:MM for a whole minute, i.e. thousands of
/// ticks; the action must run only on the first.
#[derive(Debug, Clone, Default)]
pub struct TimeTrigger {
    last: Option<(usize, u32, u32)>,
}

impl TimeTrigger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fire(&mut self, index: usize, now: NaiveTime, slot: NaiveTime) -> bool {
        if !matches_minute(now, slot) {
            return false;
        }
        let key = (index, now.hour(), now.minute());
        if self.last == Some(key) {
            return false;
        }
        self.last = Some(key);
        true
    }

    /// Forget the last firing. Called on a new day so the same slot fires again.
    pub fn reset(&mut self) {
        self.last = None;
    }
}
