//! The audio engine boundary.
//!
//! The player never decodes or mixes audio itself. It loads a *sample* (a
//! decoded asset), derives a *channel* (a playable instance with its own
//! position) from it, and drives that channel through this trait.

use crate::error::Result;
use std::fmt;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SampleHandle(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChannelHandle(pub u32);

/// What the engine reports about a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    /// Never started, finished, stopped, or unknown.
    Stopped,
    Playing,
    Paused,
}

impl fmt::Display for ChannelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelState::Stopped => write!(f, "stopped"),
            ChannelState::Playing => write!(f, "playing"),
            ChannelState::Paused => write!(f, "paused"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    Microphone,
    Loopback,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputDevice {
    pub name: String,
    pub enabled: bool,
    pub kind: InputKind,
}

impl InputDevice {
    pub fn is_enabled_microphone(&self) -> bool {
        self.enabled && self.kind == InputKind::Microphone
    }
}

pub trait AudioEngine {
    /// Load and decode a file. A missing file is `Error::FileOpen`.
    fn load_sample(&mut self, path: &Path) -> Result<SampleHandle>;

    /// Release a sample and every channel derived from it.
    fn free_sample(&mut self, sample: SampleHandle);

    /// Create a stopped channel positioned at the start of `sample`.
    fn create_channel(&mut self, sample: SampleHandle) -> Result<ChannelHandle>;

    /// Start or resume. `Error::Start` means the engine could not start.
    fn play(&mut self, channel: ChannelHandle) -> Result<()>;

    fn pause(&mut self, channel: ChannelHandle);

    /// Stop and release the channel. Later queries report it as stopped.
    fn stop(&mut self, channel: ChannelHandle);

    fn state(&self, channel: ChannelHandle) -> ChannelState;

    fn position(&self, channel: ChannelHandle) -> Duration;

    /// Total length of the channel's audio. Zero for unknown channels.
    fn length(&self, channel: ChannelHandle) -> Duration;

    fn set_position(&mut self, channel: ChannelHandle, position: Duration) -> Result<()>;

    fn set_volume(&mut self, channel: ChannelHandle, volume: f32);

    fn input_devices(&mut self) -> Vec<InputDevice>;
}
