//! Real playback through rodio.
//!
//! A sample is the file's bytes held in memory; a channel is a rodio `Sink`
//! decoding its own cursor over those bytes, so channels from one sample
//! never share position. Not serializable or `Sync`; lives on the thread that
//! runs the control loop.

use crate::engine::{
    AudioEngine, ChannelHandle, ChannelState, InputDevice, InputKind, SampleHandle,
};
use crate::error::{Error, Result};
use lofty::file::AudioFile;
use rodio::cpal::traits::{DeviceTrait, HostTrait};
use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink, Source};
use std::collections::HashMap;
use std::fs;
use std::io::{Cursor, ErrorKind};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// How long an input-device scan stays valid. Enumeration goes to the OS
/// audio layer and is too slow to repeat every frame.
const DEVICE_SCAN_TTL: Duration = Duration::from_secs(5);

/// rodio's `try_seek` flushes the sink's buffer, so it can look drained for
/// a moment afterwards.
const SEEK_SETTLE: Duration = Duration::from_millis(500);

struct RodioSample {
    path: PathBuf,
    data: Arc<[u8]>,
    length: Duration,
}

struct RodioChannel {
    sample: SampleHandle,
    sink: Sink,
    length: Duration,
    started: bool,
    seeked_at: Option<Instant>,
}

impl RodioChannel {
    /// Started and played out.
    fn drained(&self) -> bool {
        let settling = self
            .seeked_at
            .map(|t| t.elapsed() < SEEK_SETTLE)
            .unwrap_or(false);
        self.started && !settling && self.sink.empty()
    }
}

pub struct RodioEngine {
    _stream: OutputStream,
    stream_handle: OutputStreamHandle,
    next_handle: u32,
    samples: HashMap<SampleHandle, RodioSample>,
    channels: HashMap<ChannelHandle, RodioChannel>,
    device_scan: Option<(Instant, Vec<InputDevice>)>,
}

impl RodioEngine {
    /// Open the named output device, or the system default.
    pub fn new(device_name: Option<&str>) -> Result<Self> {
        let (stream, handle) = match device_name {
            Some(name) => {
                let device = find_output_device(name)?;
                OutputStream::try_from_device(&device).map_err(|e| {
                    Error::AudioOutput(format!("Failed to open device '{}': {}", name, e))
                })?
            }
            None => OutputStream::try_default()
                .map_err(|e| Error::AudioOutput(format!("Failed to open audio output: {}", e)))?,
        };
        Ok(RodioEngine {
            _stream: stream,
            stream_handle: handle,
            next_handle: 1,
            samples: HashMap::new(),
            channels: HashMap::new(),
            device_scan: None,
        })
    }

    fn next_handle(&mut self) -> u32 {
        let id = self.next_handle;
        self.next_handle += 1;
        id
    }

    fn decoder(sample: &RodioSample) -> Result<Decoder<Cursor<Arc<[u8]>>>> {
        Decoder::new(Cursor::new(sample.data.clone()))
            .map_err(|e| Error::Decode(format!("Cannot decode '{}': {}", sample.path.display(), e)))
    }
}

impl AudioEngine for RodioEngine {
    fn load_sample(&mut self, path: &Path) -> Result<SampleHandle> {
        let data: Arc<[u8]> = match fs::read(path) {
            Ok(bytes) => bytes.into(),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(Error::FileOpen(path.to_path_buf()));
            }
            Err(e) => return Err(Error::Io(e)),
        };
        let mut sample = RodioSample {
            path: path.to_path_buf(),
            data,
            length: Duration::ZERO,
        };
        // Decode once up front so a corrupt file fails here, not at play time.
        let decoder = Self::decoder(&sample)?;
        sample.length = probe_length(path)
            .or_else(|| decoder.total_duration())
            .unwrap_or_default();

        let handle = SampleHandle(self.next_handle());
        self.samples.insert(handle, sample);
        Ok(handle)
    }

    fn free_sample(&mut self, sample: SampleHandle) {
        self.samples.remove(&sample);
        self.channels.retain(|_, ch| {
            if ch.sample == sample {
                ch.sink.stop();
                false
            } else {
                true
            }
        });
    }

    fn create_channel(&mut self, sample: SampleHandle) -> Result<ChannelHandle> {
        let (decoder, length) = {
            let s = self
                .samples
                .get(&sample)
                .ok_or(Error::InvalidHandle(sample.0))?;
            (Self::decoder(s)?, s.length)
        };
        let sink = Sink::try_new(&self.stream_handle)
            .map_err(|e| Error::AudioOutput(format!("Failed to create sink: {}", e)))?;
        sink.pause();
        sink.append(decoder);

        let handle = ChannelHandle(self.next_handle());
        self.channels.insert(
            handle,
            RodioChannel {
                sample,
                sink,
                length,
                started: false,
                seeked_at: None,
            },
        );
        Ok(handle)
    }

    fn play(&mut self, channel: ChannelHandle) -> Result<()> {
        let ch = self
            .channels
            .get_mut(&channel)
            .ok_or_else(|| Error::Start(format!("unknown channel {}", channel.0)))?;
        ch.sink.play();
        ch.started = true;
        Ok(())
    }

    fn pause(&mut self, channel: ChannelHandle) {
        if let Some(ch) = self.channels.get(&channel) {
            ch.sink.pause();
        }
    }

    fn stop(&mut self, channel: ChannelHandle) {
        if let Some(ch) = self.channels.remove(&channel) {
            ch.sink.stop();
        }
    }

    fn state(&self, channel: ChannelHandle) -> ChannelState {
        match self.channels.get(&channel) {
            Some(ch) if !ch.started || ch.drained() => ChannelState::Stopped,
            Some(ch) if ch.sink.is_paused() => ChannelState::Paused,
            Some(_) => ChannelState::Playing,
            None => ChannelState::Stopped,
        }
    }

    fn position(&self, channel: ChannelHandle) -> Duration {
        match self.channels.get(&channel) {
            // A drained sink resets its position; report the end instead.
            Some(ch) if ch.drained() => ch.length,
            Some(ch) => ch.sink.get_pos(),
            None => Duration::ZERO,
        }
    }

    fn length(&self, channel: ChannelHandle) -> Duration {
        self.channels
            .get(&channel)
            .map(|ch| ch.length)
            .unwrap_or_default()
    }

    fn set_position(&mut self, channel: ChannelHandle, position: Duration) -> Result<()> {
        let ch = self
            .channels
            .get_mut(&channel)
            .ok_or(Error::InvalidHandle(channel.0))?;
        ch.sink
            .try_seek(position)
            .map_err(|e| Error::Seek(e.to_string()))?;
        ch.seeked_at = Some(Instant::now());
        Ok(())
    }

    fn set_volume(&mut self, channel: ChannelHandle, volume: f32) {
        if let Some(ch) = self.channels.get(&channel) {
            ch.sink.set_volume(volume);
        }
    }

    fn input_devices(&mut self) -> Vec<InputDevice> {
        if let Some((at, devices)) = &self.device_scan {
            if at.elapsed() < DEVICE_SCAN_TTL {
                return devices.clone();
            }
        }
        let devices = list_input_devices();
        self.device_scan = Some((Instant::now(), devices.clone()));
        devices
    }
}

/// Duration from the file's metadata.
fn probe_length(path: &Path) -> Option<Duration> {
    let tagged = lofty::read_from_path(path).ok()?;
    let duration = tagged.properties().duration();
    if duration.is_zero() { None } else { Some(duration) }
}

fn find_output_device(name: &str) -> Result<rodio::cpal::Device> {
    let host = rodio::cpal::default_host();
    let mut devices = host
        .output_devices()
        .map_err(|e| Error::AudioOutput(format!("Failed to enumerate devices: {}", e)))?;
    devices
        .find(|d| d.name().map(|n| n == name).unwrap_or(false))
        .ok_or_else(|| Error::AudioOutput(format!("Output device '{}' not found", name)))
}

/// Names of all output devices on the default host.
pub fn list_output_devices() -> Vec<String> {
    let host = rodio::cpal::default_host();
    match host.output_devices() {
        Ok(devices) => devices.filter_map(|d| d.name().ok()).collect(),
        Err(e) => {
            tracing::warn!("failed to enumerate output devices: {}", e);
            Vec::new()
        }
    }
}

/// Capture devices on the default host. A device counts as enabled when it
/// reports a usable default input configuration.
pub fn list_input_devices() -> Vec<InputDevice> {
    let host = rodio::cpal::default_host();
    let devices = match host.input_devices() {
        Ok(d) => d,
        Err(e) => {
            tracing::debug!("failed to enumerate input devices: {}", e);
            return Vec::new();
        }
    };
    devices
        .filter_map(|d| {
            let name = d.name().ok()?;
            let enabled = d.default_input_config().is_ok();
            Some(InputDevice {
                kind: classify_input(&name),
                name,
                enabled,
            })
        })
        .collect()
}

/// The OS does not say what kind of capture device it is; loopback and
/// monitor sources are recognisable by name, anything else is a microphone.
fn classify_input(name: &str) -> InputKind {
    let lower = name.to_lowercase();
    if ["monitor", "loopback", "stereo mix", "what u hear"]
        .iter()
        .any(|k| lower.contains(k))
    {
        InputKind::Loopback
    } else {
        InputKind::Microphone
    }
}
