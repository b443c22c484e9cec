//! Application: the per-frame control loop.
//!
//! Once per tick it reads the schedule, the wall clock and the operator's
//! intent, decides what the engine should do, and mirrors the engine's
//! state back into the widgets. The rules run in a fixed priority order:
//!
//! 1. new day: back to the first entry
//! 2. schedule changed on disk: reload the current entry
//! 3. content finished or slot end time reached: outro, or next entry
//! 4. outro finished: next entry
//! 5. intro finished: start the content
//! 6. slot start time reached: want playback
//! 7. playback wanted and not playing: intro or play
//! 8. playback not wanted and playing: pause
//! 9. seek bar moved: seek
//! 10. note an enabled microphone
//!
//! `update` only returns an error when the session cannot go on.

use crate::config::Config;
use crate::console::{Operator, UiCommand};
use crate::control_panel::ControlPanel;
use crate::engine::{AudioEngine, ChannelHandle, ChannelState, SampleHandle};
use crate::error::{Error, Result};
use crate::logger::{Logger, Severity};
use crate::player_widget::PlayerWidget;
use crate::random_list::RandomList;
use crate::schedule::{Schedule, ScheduleEntry};
use crate::session::{self, DayWatch, PlaybackState, Session, TimeTrigger};
use chrono::{Datelike, NaiveDate, NaiveDateTime};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Random fallback picks tried for one missing file before giving up on them.
pub const MAX_RANDOM_ATTEMPTS: u32 = 10;

/// Log lines shown under the transport.
const LOG_LINES_SHOWN: usize = 3;

struct Jingles {
    intro: Option<SampleHandle>,
    outro: Option<SampleHandle>,
}

pub struct Application<E: AudioEngine> {
    engine: E,
    schedule: Schedule,
    random_list: RandomList,
    panel: ControlPanel,
    transport: PlayerWidget,
    session: Session,
    jingles: Jingles,
    logger: Logger,
    day: DayWatch,
    start_trigger: TimeTrigger,
    end_trigger: TimeTrigger,
    intro_resume_offset: Duration,
}

impl<E: AudioEngine> Application<E> {
    /// Load the schedule and jingles, then the first entry.
    pub fn setup<O: Operator>(
        config: &Config,
        mut engine: E,
        now: NaiveDateTime,
        operator: &mut O,
    ) -> Result<Self> {
        let schedule = Schedule::load(&config.schedule_path)?;
        let mut logger = Logger::new();
        let mut panel = ControlPanel::new(
            config.volume,
            config.random_fallback,
            config.jingles_enabled,
        );

        let intro = load_jingle(&mut engine, &mut logger, config.intro_path.as_deref(), "intro");
        let outro = load_jingle(&mut engine, &mut logger, config.outro_path.as_deref(), "outro");
        panel.set_jingle_names(
            intro.and(config.intro_path.as_deref()).and_then(file_label),
            outro.and(config.outro_path.as_deref()).and_then(file_label),
        );

        logger.info(format!(
            "schedule {} loaded ({} entries)",
            schedule.path().display(),
            schedule.len()
        ));

        let mut app = Application {
            engine,
            schedule,
            random_list: RandomList::new(&config.random_list_path),
            panel,
            transport: PlayerWidget::new(),
            session: Session::new(),
            jingles: Jingles { intro, outro },
            logger,
            day: DayWatch::new(now.day()),
            start_trigger: TimeTrigger::new(),
            end_trigger: TimeTrigger::new(),
            intro_resume_offset: config.intro_resume_offset(),
        };
        app.load_or_skip(now.date(), operator)?;
        Ok(app)
    }

    // ── Accessors ───────────────────────────────────────────────────────────

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    pub fn schedule(&self) -> &Schedule {
        &self.schedule
    }

    pub fn panel(&self) -> &ControlPanel {
        &self.panel
    }

    pub fn transport(&self) -> &PlayerWidget {
        &self.transport
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn state(&self) -> PlaybackState {
        self.session.state
    }

    pub fn logger(&self) -> &Logger {
        &self.logger
    }

    // ── Operator input ──────────────────────────────────────────────────────

    pub fn handle_command(&mut self, cmd: UiCommand) {
        match cmd {
            UiCommand::TogglePlay => {
                self.transport.toggle_play();
            }
            UiCommand::Seek(position) => self.transport.seek_to(position),
            UiCommand::Volume(volume) => self.panel.set_volume(volume),
            UiCommand::ToggleRandom => {
                let on = self.panel.toggle_random();
                self.logger
                    .info(format!("random fallback {}", if on { "on" } else { "off" }));
            }
            UiCommand::ToggleJingles => {
                let on = self.panel.toggle_jingles();
                self.logger
                    .info(format!("intro/outro {}", if on { "on" } else { "off" }));
            }
            UiCommand::Quit => {}
        }
    }

    // ── Per-frame tick ──────────────────────────────────────────────────────

    pub fn update<O: Operator>(&mut self, now: NaiveDateTime, operator: &mut O) -> Result<()> {
        let date = now.date();
        let time = now.time();

        if self.day.changed(date.day()) {
            self.logger
                .info(format!("new day {} -> back to the first entry", date));
            self.schedule.reset();
            self.start_trigger.reset();
            self.end_trigger.reset();
            self.session.state = PlaybackState::Loading;
        }

        match self.schedule.refresh() {
            Ok(true) => {
                self.logger.info("schedule changed on disk -> reloading");
                self.session.state = PlaybackState::Loading;
            }
            Ok(false) => {}
            Err(e) => self
                .logger
                .log_once(Severity::Error, format!("schedule update ignored: {}", e)),
        }

        if self.session.state == PlaybackState::Loading {
            self.load_or_skip(date, operator)?;
        }

        self.sync_widgets();

        if let Some(entry) = self.schedule.current() {
            let (index, end) = (self.schedule.current_index(), entry.end);
            let state = self.session.state;
            let end_due = state != PlaybackState::Loading
                && state != PlaybackState::PlayingOutro
                && self.end_trigger.fire(index, time, end);
            let natural_end = state == PlaybackState::Playing && self.content_finished();

            if end_due || natural_end {
                if end_due {
                    self.logger
                        .warn("time limit exceeded -> channel stopped automatically");
                }
                if state == PlaybackState::Playing
                    && self.panel.jingles_enabled()
                    && self.jingles.outro.is_some()
                {
                    self.start_outro(date, operator)?;
                } else {
                    self.advance(date, operator)?;
                }
            }
        }

        if self.session.state == PlaybackState::PlayingOutro
            && self.channel_state() == ChannelState::Stopped
        {
            self.logger.info("outro finished");
            self.advance(date, operator)?;
        }

        if self.session.state == PlaybackState::PlayingIntro
            && self.channel_state() == ChannelState::Stopped
        {
            self.logger.info("intro finished");
            self.finish_intro()?;
        }

        if let Some(entry) = self.schedule.current() {
            let (index, start) = (self.schedule.current_index(), entry.start);
            if self.start_trigger.fire(index, time, start) {
                self.logger
                    .info(format!("scheduled start {} -> playing", start.format("%H:%M")));
                self.transport.set_play_active(true);
            }
        }

        if let Some(ch) = self.session.channel {
            if self.transport.play_music() && self.engine.state(ch) != ChannelState::Playing {
                self.start_playback(ch)?;
            } else if self.transport.stop_music() && self.engine.state(ch) == ChannelState::Playing
            {
                self.engine.pause(ch);
                if self.session.state == PlaybackState::Playing {
                    self.session.state = PlaybackState::Paused;
                }
                self.logger.info("channel paused");
            }
        }

        if let Some(target) = self.transport.take_seek() {
            match self.session.channel {
                Some(ch) if self.session.state.is_content() => {
                    if let Err(e) = self.engine.set_position(ch, target) {
                        self.logger.warn(format!("{}", e));
                    }
                }
                // Jingles are not seekable.
                _ => {}
            }
        }

        let devices = self.engine.input_devices();
        if let Some(mic) = devices.iter().find(|d| d.is_enabled_microphone()) {
            self.logger.log_once(
                Severity::Info,
                format!("microphone input available: {}", mic.name),
            );
        }

        Ok(())
    }

    /// Panel, transport, current slot and the latest log lines.
    pub fn compose(&self) -> String {
        let slot = match self.schedule.current() {
            Some(e) => format!(
                "[{}/{}] {}  {}-{}",
                self.schedule.current_index() + 1,
                self.schedule.len(),
                e.file_name,
                e.start_display(),
                e.end_display()
            ),
            None => "no scheduled entries".to_string(),
        };
        let mut out = format!(
            "{}\n{} ({})\n{}",
            self.panel.render(),
            slot,
            self.session.state,
            self.transport.render()
        );
        for entry in self.logger.buffer().tail(LOG_LINES_SHOWN) {
            out.push_str(&format!(
                "\n{} {:<5} {}",
                entry.timestamp, entry.severity, entry.message
            ));
        }
        out
    }

    /// Stop everything and release all engine resources.
    pub fn shutdown(&mut self) {
        self.release_current();
        for sample in [self.jingles.intro.take(), self.jingles.outro.take()]
            .into_iter()
            .flatten()
        {
            self.engine.free_sample(sample);
        }
        self.session.state = PlaybackState::Idle;
    }

    // ── Transitions ─────────────────────────────────────────────────────────

    fn sync_widgets(&mut self) {
        let (position, length) = match self.session.channel {
            Some(ch) => (self.engine.position(ch), self.engine.length(ch)),
            None => (Duration::ZERO, Duration::ZERO),
        };
        self.transport.update(position, length);
        if let Some(ch) = self.session.channel {
            self.engine.set_volume(ch, self.panel.volume());
        }
    }

    fn channel_state(&self) -> ChannelState {
        self.session
            .channel
            .map(|ch| self.engine.state(ch))
            .unwrap_or(ChannelState::Stopped)
    }

    /// The content channel played out: either the engine stopped it or the
    /// position reached the end of the loaded sample.
    fn content_finished(&self) -> bool {
        let Some(ch) = self.session.channel else {
            return false;
        };
        self.engine.state(ch) == ChannelState::Stopped
            || session::reached_natural_end(
                self.engine.position(ch),
                self.engine.length(ch),
                self.session.sample_length,
            )
    }

    fn start_playback(&mut self, ch: ChannelHandle) -> Result<()> {
        match self.session.state {
            PlaybackState::Idle => {
                let (position, length) = (self.engine.position(ch), self.engine.length(ch));
                if self.panel.jingles_enabled()
                    && self.jingles.intro.is_some()
                    && session::at_track_start(position, length)
                    && length == self.session.sample_length
                {
                    return self.start_intro();
                }
                self.play_channel(ch)?;
                self.session.state = PlaybackState::Playing;
            }
            PlaybackState::Playing | PlaybackState::Paused => {
                self.play_channel(ch)?;
                self.session.state = PlaybackState::Playing;
            }
            PlaybackState::PlayingIntro | PlaybackState::PlayingOutro => {
                self.play_channel(ch)?;
            }
            PlaybackState::Loading => {}
        }
        Ok(())
    }

    /// Play, turning any engine refusal into a fatal start error.
    fn play_channel(&mut self, ch: ChannelHandle) -> Result<()> {
        match self.engine.play(ch) {
            Ok(()) => {
                self.logger.info("channel started");
                Ok(())
            }
            Err(e) => {
                let e = match e {
                    Error::Start(_) => e,
                    other => Error::Start(other.to_string()),
                };
                self.logger.error(format!(
                    "error playing on main channel -> please restart the program ({})",
                    e
                ));
                Err(e)
            }
        }
    }

    fn start_intro(&mut self) -> Result<()> {
        let Some(intro) = self.jingles.intro else {
            return Ok(());
        };
        if let Some(ch) = self.session.channel.take() {
            self.engine.stop(ch);
        }
        match self.engine.create_channel(intro) {
            Ok(ch) => {
                self.engine.set_volume(ch, self.panel.volume());
                self.session.channel = Some(ch);
                self.session.state = PlaybackState::PlayingIntro;
                self.logger.info("intro started");
                self.play_channel(ch)
            }
            Err(e) => {
                self.logger.error(format!("intro unavailable: {}", e));
                self.restart_content(Duration::ZERO)
            }
        }
    }

    fn finish_intro(&mut self) -> Result<()> {
        if let Some(ch) = self.session.channel.take() {
            self.engine.stop(ch);
        }
        self.restart_content(self.intro_resume_offset)
    }

    /// Fresh content channel from the loaded sample, played from `offset`.
    fn restart_content(&mut self, offset: Duration) -> Result<()> {
        let Some(sample) = self.session.sample else {
            self.session.state = PlaybackState::Loading;
            return Ok(());
        };
        let ch = match self.engine.create_channel(sample) {
            Ok(ch) => ch,
            Err(e) => {
                self.logger.error(format!("cannot reopen content: {}", e));
                self.session.state = PlaybackState::Loading;
                return Ok(());
            }
        };
        self.engine.set_volume(ch, self.panel.volume());
        if !offset.is_zero() {
            if let Err(e) = self.engine.set_position(ch, offset) {
                self.logger.warn(format!("{}", e));
            }
        }
        self.session.channel = Some(ch);
        self.session.state = PlaybackState::Playing;
        self.transport.set_play_active(true);
        self.transport.set_seeker_pos(offset);
        self.play_channel(ch)
    }

    fn start_outro<O: Operator>(&mut self, date: NaiveDate, operator: &mut O) -> Result<()> {
        let Some(outro) = self.jingles.outro else {
            return self.advance(date, operator);
        };
        if let Some(ch) = self.session.channel.take() {
            self.engine.stop(ch);
        }
        match self.engine.create_channel(outro) {
            Ok(ch) => {
                self.engine.set_volume(ch, self.panel.volume());
                self.session.channel = Some(ch);
                self.session.state = PlaybackState::PlayingOutro;
                self.transport.set_play_active(true);
                self.logger.info("outro started");
                self.play_channel(ch)
            }
            Err(e) => {
                self.logger.error(format!("outro unavailable: {}", e));
                self.advance(date, operator)
            }
        }
    }

    /// Stop whatever is playing and load the next entry.
    fn advance<O: Operator>(&mut self, date: NaiveDate, operator: &mut O) -> Result<()> {
        if let Some(ch) = self.session.channel.take() {
            self.engine.stop(ch);
        }
        self.schedule.next();
        self.load_or_skip(date, operator)
    }

    // ── Loading ─────────────────────────────────────────────────────────────

    /// Load the current entry. A file that exists but cannot be used is
    /// skipped; the next entry is tried on the following tick.
    fn load_or_skip<O: Operator>(&mut self, date: NaiveDate, operator: &mut O) -> Result<()> {
        match self.load_current_input(date, operator) {
            Ok(()) => Ok(()),
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => {
                self.logger
                    .log_once(Severity::Error, format!("{} -> skipping to next entry", e));
                self.schedule.next();
                self.session.state = PlaybackState::Loading;
                Ok(())
            }
        }
    }

    fn release_current(&mut self) {
        if let Some(ch) = self.session.channel.take() {
            self.engine.pause(ch);
            self.engine.stop(ch);
        }
        if let Some(sample) = self.session.sample.take() {
            self.engine.free_sample(sample);
        }
        self.session.sample_length = Duration::ZERO;
    }

    fn load_current_input<O: Operator>(&mut self, date: NaiveDate, operator: &mut O) -> Result<()> {
        self.release_current();

        let (entry, primary) = match (self.schedule.current(), self.schedule.current_path(date)) {
            (Some(entry), Some(path)) => (entry.clone(), path),
            _ => {
                self.logger
                    .log_once(Severity::Warning, "schedule is empty -> nothing to play");
                self.session.state = PlaybackState::Idle;
                return Ok(());
            }
        };
        self.panel
            .set_header_text(self.schedule.folder_for(date).display().to_string());

        let mut location = primary.clone();
        let mut attempts = 0u32;
        let sample = loop {
            match self.engine.load_sample(&location) {
                Ok(sample) => break sample,
                Err(Error::FileOpen(_)) => {}
                Err(e) => return Err(e),
            }
            self.logger.log_once(
                Severity::Warning,
                format!("{} - file does not exist", location.display()),
            );
            location = self.fallback_location(&entry, &primary, attempts, operator);
            attempts += 1;
        };

        // A file that goes missing again later should warn again.
        self.logger.forget_once();
        self.logger.info(format!("{} - loaded", location.display()));

        let channel = match self.engine.create_channel(sample) {
            Ok(ch) => ch,
            Err(e) => {
                self.engine.free_sample(sample);
                return Err(e);
            }
        };
        self.engine.set_volume(channel, self.panel.volume());
        self.session.sample = Some(sample);
        self.session.channel = Some(channel);
        self.session.sample_length = self.engine.length(channel);
        self.session.state = PlaybackState::Idle;

        self.transport.set_play_active(false);
        self.transport.set_seeker_pos(Duration::ZERO);
        self.transport.update(Duration::ZERO, self.session.sample_length);
        Ok(())
    }

    /// Where to look next after `attempts` failed loads of this entry.
    fn fallback_location<O: Operator>(
        &mut self,
        entry: &ScheduleEntry,
        primary: &Path,
        attempts: u32,
        operator: &mut O,
    ) -> PathBuf {
        if self.panel.random_active() && attempts >= MAX_RANDOM_ATTEMPTS {
            self.logger.error(format!(
                "{} randomizing attempts failed -> random fallback disabled",
                attempts
            ));
            self.panel.set_random_active(false);
        }

        if self.panel.random_active() {
            if attempts > 0 {
                self.logger.log_once(
                    Severity::Error,
                    format!(
                        "please fix the contents of {}",
                        self.random_list.path().display()
                    ),
                );
            }
            match self.random_list.pick() {
                Ok(Some(folder)) => {
                    self.logger.log_once(
                        Severity::Info,
                        format!("random fallback active -> loading from {}", folder.display()),
                    );
                    self.panel.set_header_text(folder.display().to_string());
                    return folder.join(&entry.file_name);
                }
                Ok(None) | Err(_) => {
                    self.panel.set_random_active(false);
                    self.logger.error(format!(
                        "{} empty or missing -> random fallback disabled",
                        self.random_list.path().display()
                    ));
                }
            }
        }

        self.logger
            .warn(format!("please create {} then press enter", primary.display()));
        operator.wait_for_file(primary);
        if let Some(folder) = primary.parent() {
            self.panel.set_header_text(folder.display().to_string());
        }
        primary.to_path_buf()
    }
}

fn load_jingle<E: AudioEngine>(
    engine: &mut E,
    logger: &mut Logger,
    path: Option<&Path>,
    label: &str,
) -> Option<SampleHandle> {
    let path = path?;
    match engine.load_sample(path) {
        Ok(sample) => {
            logger.info(format!("{} jingle {} loaded", label, path.display()));
            Some(sample)
        }
        Err(e) => {
            logger.warn(format!("{} jingle unavailable: {}", label, e));
            None
        }
    }
}

fn file_label(path: &Path) -> Option<String> {
    path.file_name().map(|n| n.to_string_lossy().to_string())
}
