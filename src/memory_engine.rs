//! Headless engine that simulates playback time.
//!
//! Files must exist on disk to load, but nothing is decoded: every sample
//! gets the length registered for its path, or the default length. Time only
//! moves when `advance` is called, which makes it deterministic in tests and
//! usable for rehearsing a schedule without a sound card.

use crate::engine::{AudioEngine, ChannelHandle, ChannelState, InputDevice, SampleHandle};
use crate::error::{Error, Result};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_LENGTH: Duration = Duration::from_secs(180);

struct MemorySample {
    length: Duration,
}

struct MemoryChannel {
    sample: SampleHandle,
    length: Duration,
    position: Duration,
    state: ChannelState,
    volume: f32,
}

pub struct MemoryEngine {
    next_handle: u32,
    samples: HashMap<SampleHandle, MemorySample>,
    channels: HashMap<ChannelHandle, MemoryChannel>,
    lengths: HashMap<PathBuf, Duration>,
    undecodable: HashSet<PathBuf>,
    default_length: Duration,
    fail_start: bool,
    devices: Vec<InputDevice>,
    load_attempts: Vec<PathBuf>,
}

impl MemoryEngine {
    pub fn new() -> Self {
        MemoryEngine {
            next_handle: 1,
            samples: HashMap::new(),
            channels: HashMap::new(),
            lengths: HashMap::new(),
            undecodable: HashSet::new(),
            default_length: DEFAULT_LENGTH,
            fail_start: false,
            devices: Vec::new(),
            load_attempts: Vec::new(),
        }
    }

    /// Register the length reported for a given file.
    pub fn set_length(&mut self, path: &Path, length: Duration) {
        self.lengths.insert(path.to_path_buf(), length);
    }

    /// Make loads of `path` fail with `Error::Decode`, like a corrupt file.
    pub fn set_undecodable(&mut self, path: &Path) {
        self.undecodable.insert(path.to_path_buf());
    }

    pub fn set_default_length(&mut self, length: Duration) {
        self.default_length = length;
    }

    /// Make every subsequent `play` fail with `Error::Start`.
    pub fn set_fail_start(&mut self, fail: bool) {
        self.fail_start = fail;
    }

    pub fn set_input_devices(&mut self, devices: Vec<InputDevice>) {
        self.devices = devices;
    }

    /// Move playing channels forward. Channels that reach their end stop.
    pub fn advance(&mut self, elapsed: Duration) {
        for ch in self.channels.values_mut() {
            if ch.state != ChannelState::Playing {
                continue;
            }
            ch.position += elapsed;
            if ch.position >= ch.length {
                ch.position = ch.length;
                ch.state = ChannelState::Stopped;
            }
        }
    }

    /// Every path `load_sample` was asked for, in order.
    pub fn load_attempts(&self) -> &[PathBuf] {
        &self.load_attempts
    }

    pub fn loaded_samples(&self) -> usize {
        self.samples.len()
    }

    pub fn open_channels(&self) -> usize {
        self.channels.len()
    }

    pub fn volume(&self, channel: ChannelHandle) -> Option<f32> {
        self.channels.get(&channel).map(|c| c.volume)
    }

    fn next_handle(&mut self) -> u32 {
        let id = self.next_handle;
        self.next_handle += 1;
        id
    }
}

impl Default for MemoryEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioEngine for MemoryEngine {
    fn load_sample(&mut self, path: &Path) -> Result<SampleHandle> {
        self.load_attempts.push(path.to_path_buf());
        if !path.is_file() {
            return Err(Error::FileOpen(path.to_path_buf()));
        }
        if self.undecodable.contains(path) {
            return Err(Error::Decode(format!("Cannot decode '{}'", path.display())));
        }
        let length = self
            .lengths
            .get(path)
            .copied()
            .unwrap_or(self.default_length);
        let handle = SampleHandle(self.next_handle());
        self.samples.insert(handle, MemorySample { length });
        Ok(handle)
    }

    fn free_sample(&mut self, sample: SampleHandle) {
        self.samples.remove(&sample);
        self.channels.retain(|_, ch| ch.sample != sample);
    }

    fn create_channel(&mut self, sample: SampleHandle) -> Result<ChannelHandle> {
        let length = self
            .samples
            .get(&sample)
            .map(|s| s.length)
            .ok_or(Error::InvalidHandle(sample.0))?;
        let handle = ChannelHandle(self.next_handle());
        self.channels.insert(
            handle,
            MemoryChannel {
                sample,
                length,
                position: Duration::ZERO,
                state: ChannelState::Stopped,
                volume: 1.0,
            },
        );
        Ok(handle)
    }

    fn play(&mut self, channel: ChannelHandle) -> Result<()> {
        if self.fail_start {
            return Err(Error::Start("simulated start failure".to_string()));
        }
        let ch = self
            .channels
            .get_mut(&channel)
            .ok_or_else(|| Error::Start(format!("unknown channel {}", channel.0)))?;
        ch.state = ChannelState::Playing;
        Ok(())
    }

    fn pause(&mut self, channel: ChannelHandle) {
        if let Some(ch) = self.channels.get_mut(&channel) {
            if ch.state == ChannelState::Playing {
                ch.state = ChannelState::Paused;
            }
        }
    }

    fn stop(&mut self, channel: ChannelHandle) {
        self.channels.remove(&channel);
    }

    fn state(&self, channel: ChannelHandle) -> ChannelState {
        self.channels
            .get(&channel)
            .map(|c| c.state)
            .unwrap_or(ChannelState::Stopped)
    }

    fn position(&self, channel: ChannelHandle) -> Duration {
        self.channels
            .get(&channel)
            .map(|c| c.position)
            .unwrap_or_default()
    }

    fn length(&self, channel: ChannelHandle) -> Duration {
        self.channels
            .get(&channel)
            .map(|c| c.length)
            .unwrap_or_default()
    }

    fn set_position(&mut self, channel: ChannelHandle, position: Duration) -> Result<()> {
        let ch = self
            .channels
            .get_mut(&channel)
            .ok_or(Error::InvalidHandle(channel.0))?;
        ch.position = position.min(ch.length);
        Ok(())
    }

    fn set_volume(&mut self, channel: ChannelHandle, volume: f32) {
        if let Some(ch) = self.channels.get_mut(&channel) {
            ch.volume = volume;
        }
    }

    fn input_devices(&mut self) -> Vec<InputDevice> {
        self.devices.clone()
    }
}
