use crate::control_panel::ControlPanel;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const CONFIG_FILE: &str = "config.json";

/// Player configuration, persisted as JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// The day's schedule (input list).
    pub schedule_path: PathBuf,
    /// One alternate folder per line, tried when a scheduled file is missing.
    pub random_list_path: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intro_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outro_path: Option<PathBuf>,
    /// Master volume, 0.0–1.0.
    pub volume: f32,
    /// Start with the random fallback switched on.
    pub random_fallback: bool,
    /// Start with intro/outro jingles switched on.
    pub jingles_enabled: bool,
    /// Control loop period in milliseconds (one "frame").
    pub tick_ms: u64,
    /// Where the content resumes after an intro finishes.
    pub intro_resume_offset_ms: u64,
    /// Output device name. None = system default.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_device: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            schedule_path: PathBuf::from("input.txt"),
            random_list_path: PathBuf::from("randlist.txt"),
            intro_path: None,
            outro_path: None,
            volume: 1.0,
            random_fallback: false,
            jingles_enabled: false,
            tick_ms: 16,
            intro_resume_offset_ms: 0,
            output_device: None,
        }
    }
}

impl Config {
    /// `<config dir>/slot_player/config.json`, or the working directory when
    /// the platform has no config dir.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .map(|d| d.join("slot_player").join(CONFIG_FILE))
            .unwrap_or_else(|| PathBuf::from(CONFIG_FILE))
    }

    /// Load configuration, or fall back to defaults if missing or corrupt.
    pub fn load(path: &Path) -> Self {
        if path.exists() {
            match fs::read_to_string(path) {
                Ok(data) => match serde_json::from_str(&data) {
                    Ok(config) => return config,
                    Err(e) => tracing::warn!("corrupt config file, using defaults: {}", e),
                },
                Err(e) => tracing::warn!("could not read config file: {}", e),
            }
        }
        Config::default()
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        self.validate()?;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.volume) {
            return Err(Error::Config(format!(
                "volume {} out of range (expected 0.0-1.0)",
                self.volume
            )));
        }
        if self.tick_ms == 0 {
            return Err(Error::Config("tick_ms must be at least 1".to_string()));
        }
        Ok(())
    }

    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms.max(1))
    }

    pub fn intro_resume_offset(&self) -> Duration {
        Duration::from_millis(self.intro_resume_offset_ms)
    }

    /// Copy the operator's panel settings back so they survive a restart.
    pub fn apply_panel(&mut self, panel: &ControlPanel) {
        self.volume = panel.volume();
        self.random_fallback = panel.random_active();
        self.jingles_enabled = panel.jingles_enabled();
    }
}
