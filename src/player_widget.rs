//! Transport: play/pause intent and the seek bar.

use std::time::Duration;

const BAR_WIDTH: usize = 30;

#[derive(Debug, Clone, Default)]
pub struct PlayerWidget {
    play_active: bool,
    seeker_pos: Duration,
    channel_length: Duration,
    seek_pending: bool,
}

impl PlayerWidget {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mirror the engine's position unless the operator has a seek pending.
    pub fn update(&mut self, position: Duration, length: Duration) {
        self.channel_length = length;
        if !self.seek_pending {
            self.seeker_pos = position;
        }
    }

    /// True while playback is wanted.
    pub fn play_music(&self) -> bool {
        self.play_active
    }

    /// True while playback is not wanted.
    pub fn stop_music(&self) -> bool {
        !self.play_active
    }

    pub fn set_play_active(&mut self, active: bool) {
        self.play_active = active;
    }

    pub fn toggle_play(&mut self) -> bool {
        self.play_active = !self.play_active;
        self.play_active
    }

    pub fn seeker_pos(&self) -> Duration {
        self.seeker_pos
    }

    pub fn channel_length(&self) -> Duration {
        self.channel_length
    }

    /// Move the seeker without asking the engine to follow.
    pub fn set_seeker_pos(&mut self, position: Duration) {
        self.seeker_pos = position;
        self.seek_pending = false;
    }

    /// Operator seek. The engine follows on the next tick.
    pub fn seek_to(&mut self, position: Duration) {
        self.seeker_pos = if self.channel_length.is_zero() {
            position
        } else {
            position.min(self.channel_length)
        };
        self.seek_pending = true;
    }

    /// The pending seek target, if the seeker moved since the last call.
    pub fn take_seek(&mut self) -> Option<Duration> {
        if self.seek_pending {
            self.seek_pending = false;
            Some(self.seeker_pos)
        } else {
            None
        }
    }

    pub fn render(&self) -> String {
        let filled = if self.channel_length.is_zero() {
            0
        } else {
            let ratio = self.seeker_pos.as_secs_f64() / self.channel_length.as_secs_f64();
            ((ratio.clamp(0.0, 1.0) * BAR_WIDTH as f64).round()) as usize
        };
        format!(
            "[{}] {}{} {} / {}",
            if self.play_active { ">" } else { "||" },
            "#".repeat(filled),
            "-".repeat(BAR_WIDTH - filled),
            format_mmss(self.seeker_pos),
            format_mmss(self.channel_length)
        )
    }
}

/// Format as MM:SS.
pub fn format_mmss(d: Duration) -> String {
    let secs = d.as_secs();
    format!("{:02}:{:02}", secs / 60, secs % 60)
}
