//! Headless integration tests for slot_player.
//!
//! These drive `Application` end-to-end on the in-memory engine with a
//! simulated wall clock. No audio device is needed.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use slot_player::app::Application;
use slot_player::config::Config;
use slot_player::console::{Operator, UiCommand};
use slot_player::engine::{AudioEngine, InputDevice, InputKind};
use slot_player::error::Error;
use slot_player::memory_engine::MemoryEngine;
use slot_player::session::PlaybackState;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

/// Fails the test if the player ever asks for a file.
struct NoOperator;

impl Operator for NoOperator {
    fn wait_for_file(&mut self, path: &Path) {
        panic!("unexpected prompt for {}", path.display());
    }

    fn acknowledge_fatal(&mut self, _message: &str) {}
}

/// Puts the requested file in place, like an operator copying it over.
#[derive(Default)]
struct CopyingOperator {
    prompts: Vec<PathBuf>,
}

impl Operator for CopyingOperator {
    fn wait_for_file(&mut self, path: &Path) {
        fs::write(path, b"audio").unwrap();
        self.prompts.push(path.to_path_buf());
    }

    fn acknowledge_fatal(&mut self, _message: &str) {}
}

fn on(day: u32, h: u32, m: u32, s: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2026, 10, day)
        .unwrap()
        .and_time(NaiveTime::from_hms_opt(h, m, s).unwrap())
}

fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
    on(18, h, m, s)
}

struct Studio {
    dir: tempfile::TempDir,
    config: Config,
}

impl Studio {
    /// A schedule file next to the given audio files.
    fn new(schedule: &str, files: &[&str]) -> Self {
        let dir = tempfile::tempdir().unwrap();
        for f in files {
            fs::write(dir.path().join(f), b"audio").unwrap();
        }
        let schedule_path = dir.path().join("input.txt");
        fs::write(&schedule_path, schedule).unwrap();
        let config = Config {
            schedule_path,
            random_list_path: dir.path().join("randlist.txt"),
            ..Config::default()
        };
        Studio { dir, config }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    /// Folders containing (or not) `file`, written to the random list.
    fn random_folders(&self, count: usize, file: Option<&str>) -> Vec<PathBuf> {
        let mut folders = Vec::new();
        let mut list = String::new();
        for i in 0..count {
            let folder = self.path(&format!("alt{}", i));
            fs::create_dir_all(&folder).unwrap();
            if let Some(f) = file {
                fs::write(folder.join(f), b"audio").unwrap();
            }
            list.push_str(&format!("{}\n", folder.display()));
            folders.push(folder);
        }
        fs::write(&self.config.random_list_path, list).unwrap();
        folders
    }

    fn start(&self, engine: MemoryEngine) -> Application<MemoryEngine> {
        Application::setup(&self.config, engine, at(10, 0, 0), &mut NoOperator).unwrap()
    }
}

fn log_count(app: &Application<MemoryEngine>, needle: &str) -> usize {
    let buffer = app.logger().buffer();
    buffer
        .tail(buffer.len())
        .iter()
        .filter(|e| e.message.contains(needle))
        .count()
}

fn last_load(app: &Application<MemoryEngine>) -> PathBuf {
    app.engine().load_attempts().last().cloned().unwrap()
}

// ── Loading ───────────────────────────────────────────────────────────────

#[test]
fn loaded_entry_waits_with_transport_reset() {
    let studio = Studio::new("20:00 21:00 a.mp3\n", &["a.mp3"]);
    let mut engine = MemoryEngine::new();
    engine.set_length(&studio.path("a.mp3"), Duration::from_secs(120));
    let app = studio.start(engine);

    assert_eq!(app.state(), PlaybackState::Idle);
    assert!(!app.transport().play_music());
    assert_eq!(app.transport().seeker_pos(), Duration::ZERO);
    assert_eq!(app.transport().channel_length(), Duration::from_secs(120));

    let ch = app.session().channel.unwrap();
    assert_eq!(app.session().sample_length, app.engine().length(ch));
    assert_eq!(app.engine().loaded_samples(), 1);
    assert_eq!(app.engine().open_channels(), 1);
}

#[test]
fn missing_file_with_random_fallback_uses_a_listed_folder() {
    let mut studio = Studio::new("20:00 21:00 show.mp3\n", &[]);
    studio.config.random_fallback = true;
    let folders = studio.random_folders(3, Some("show.mp3"));

    let app = studio.start(MemoryEngine::new());

    let attempts = app.engine().load_attempts();
    assert_eq!(attempts.len(), 2);
    assert_eq!(attempts[0], studio.path("show.mp3"));
    let used = attempts[1].parent().unwrap().to_path_buf();
    assert!(folders.contains(&used));
    assert_eq!(app.panel().header_text(), used.display().to_string());
    assert!(app.panel().random_active());
    assert_eq!(app.state(), PlaybackState::Idle);
}

#[test]
fn random_fallback_gives_up_after_ten_picks_then_prompts() {
    let mut studio = Studio::new("20:00 21:00 show.mp3\n", &[]);
    studio.config.random_fallback = true;
    studio.random_folders(3, None);

    let mut operator = CopyingOperator::default();
    let app = Application::setup(&studio.config, MemoryEngine::new(), at(10, 0, 0), &mut operator)
        .unwrap();

    // Primary, ten random picks, then the primary again after the prompt.
    assert_eq!(app.engine().load_attempts().len(), 12);
    assert_eq!(operator.prompts, vec![studio.path("show.mp3")]);
    assert_eq!(last_load(&app), studio.path("show.mp3"));
    assert!(!app.panel().random_active());
    assert_eq!(log_count(&app, "randomizing attempts failed"), 1);
    assert_eq!(app.state(), PlaybackState::Idle);
}

#[test]
fn empty_random_list_disables_fallback() {
    let mut studio = Studio::new("20:00 21:00 show.mp3\n", &[]);
    studio.config.random_fallback = true;
    fs::write(&studio.config.random_list_path, "# nothing here\n").unwrap();

    let mut operator = CopyingOperator::default();
    let app = Application::setup(&studio.config, MemoryEngine::new(), at(10, 0, 0), &mut operator)
        .unwrap();

    assert!(!app.panel().random_active());
    assert_eq!(operator.prompts.len(), 1);
    assert_eq!(app.engine().load_attempts().len(), 2);
}

#[test]
fn missing_random_list_disables_fallback() {
    let mut studio = Studio::new("20:00 21:00 show.mp3\n", &[]);
    studio.config.random_fallback = true;

    let mut operator = CopyingOperator::default();
    let app = Application::setup(&studio.config, MemoryEngine::new(), at(10, 0, 0), &mut operator)
        .unwrap();

    assert!(!app.panel().random_active());
    assert_eq!(log_count(&app, "empty or missing"), 1);
    assert_eq!(app.state(), PlaybackState::Idle);
}

// ── Schedule timing ───────────────────────────────────────────────────────

#[test]
fn end_time_without_outro_moves_to_next_entry() {
    let studio = Studio::new(
        "17:00 18:00 a.mp3\n18:00 19:00 b.mp3\n",
        &["a.mp3", "b.mp3"],
    );
    let mut app = studio.start(MemoryEngine::new());

    app.update(at(17, 0, 0), &mut NoOperator).unwrap();
    assert_eq!(app.state(), PlaybackState::Playing);

    app.update(at(18, 0, 0), &mut NoOperator).unwrap();
    assert_eq!(app.schedule().current_index(), 1);
    assert_eq!(last_load(&app), studio.path("b.mp3"));
    // b starts at 18:00 too, so it goes straight to air.
    assert_eq!(app.state(), PlaybackState::Playing);
    assert_eq!(log_count(&app, "time limit exceeded"), 1);
    assert_eq!(app.engine().loaded_samples(), 1);
    assert_eq!(app.engine().open_channels(), 1);

    // The rest of the minute changes nothing.
    app.update(at(18, 0, 30), &mut NoOperator).unwrap();
    assert_eq!(app.schedule().current_index(), 1);
    assert_eq!(app.engine().load_attempts().len(), 2);
}

#[test]
fn new_day_returns_to_first_entry_once() {
    let studio = Studio::new(
        "20:00 21:00 a.mp3\n21:00 22:00 b.mp3\n",
        &["a.mp3", "b.mp3"],
    );
    let mut app = studio.start(MemoryEngine::new());

    app.update(at(21, 0, 0), &mut NoOperator).unwrap();
    assert_eq!(app.schedule().current_index(), 1);
    assert_eq!(app.state(), PlaybackState::Playing);

    app.update(on(19, 0, 0, 1), &mut NoOperator).unwrap();
    assert_eq!(app.schedule().current_index(), 0);
    assert_eq!(last_load(&app), studio.path("a.mp3"));
    assert_eq!(app.state(), PlaybackState::Idle);

    app.update(on(19, 0, 0, 2), &mut NoOperator).unwrap();
    app.update(on(19, 0, 1, 0), &mut NoOperator).unwrap();
    assert_eq!(log_count(&app, "new day"), 1);
    assert_eq!(app.engine().load_attempts().len(), 3);
}

#[test]
fn schedule_edit_on_disk_reloads_current_entry() {
    let studio = Studio::new("20:00 21:00 a.mp3\n", &["a.mp3", "b.mp3"]);
    let mut app = studio.start(MemoryEngine::new());
    assert_eq!(last_load(&app), studio.path("a.mp3"));

    fs::write(&studio.config.schedule_path, "20:00 21:00 b.mp3\n").unwrap();
    let later = SystemTime::now() + Duration::from_secs(5);
    fs::File::options()
        .write(true)
        .open(&studio.config.schedule_path)
        .unwrap()
        .set_modified(later)
        .unwrap();

    app.update(at(10, 0, 1), &mut NoOperator).unwrap();
    assert_eq!(last_load(&app), studio.path("b.mp3"));
    assert_eq!(app.state(), PlaybackState::Idle);
    assert_eq!(app.engine().loaded_samples(), 1);
}

// ── Natural end and jingles ───────────────────────────────────────────────

#[test]
fn track_at_99_percent_keeps_playing() {
    let studio = Studio::new(
        "20:00 21:00 a.mp3\n21:00 22:00 b.mp3\n",
        &["a.mp3", "b.mp3"],
    );
    let mut engine = MemoryEngine::new();
    engine.set_length(&studio.path("a.mp3"), Duration::from_secs(100));
    let mut app = studio.start(engine);

    app.handle_command(UiCommand::TogglePlay);
    app.update(at(10, 0, 1), &mut NoOperator).unwrap();
    assert_eq!(app.state(), PlaybackState::Playing);

    app.engine_mut().advance(Duration::from_secs(99));
    app.update(at(10, 1, 40), &mut NoOperator).unwrap();
    assert_eq!(app.schedule().current_index(), 0);
    assert_eq!(app.state(), PlaybackState::Playing);

    app.engine_mut().advance(Duration::from_secs(1));
    app.update(at(10, 1, 41), &mut NoOperator).unwrap();
    assert_eq!(app.schedule().current_index(), 1);
    assert_eq!(last_load(&app), studio.path("b.mp3"));
    // b is not due yet.
    assert_eq!(app.state(), PlaybackState::Idle);
}

#[test]
fn intro_content_outro_then_next_entry() {
    let mut studio = Studio::new(
        "10:30 11:00 a.mp3\n11:00 12:00 b.mp3\n",
        &["a.mp3", "b.mp3", "intro.mp3", "outro.mp3"],
    );
    studio.config.intro_path = Some(studio.path("intro.mp3"));
    studio.config.outro_path = Some(studio.path("outro.mp3"));
    studio.config.jingles_enabled = true;

    let mut engine = MemoryEngine::new();
    engine.set_length(&studio.path("intro.mp3"), Duration::from_secs(5));
    engine.set_length(&studio.path("outro.mp3"), Duration::from_secs(4));
    engine.set_length(&studio.path("a.mp3"), Duration::from_secs(60));
    let mut app = studio.start(engine);
    // Two jingles plus the content.
    assert_eq!(app.engine().loaded_samples(), 3);

    app.update(at(10, 30, 0), &mut NoOperator).unwrap();
    assert_eq!(app.state(), PlaybackState::PlayingIntro);
    assert_eq!(app.engine().open_channels(), 1);

    app.engine_mut().advance(Duration::from_secs(5));
    app.update(at(10, 30, 5), &mut NoOperator).unwrap();
    assert_eq!(app.state(), PlaybackState::Playing);
    assert_eq!(app.engine().open_channels(), 1);
    let ch = app.session().channel.unwrap();
    assert_eq!(app.engine().length(ch), Duration::from_secs(60));

    app.engine_mut().advance(Duration::from_secs(60));
    app.update(at(10, 31, 5), &mut NoOperator).unwrap();
    assert_eq!(app.state(), PlaybackState::PlayingOutro);
    assert_eq!(app.schedule().current_index(), 0);
    assert_eq!(app.engine().open_channels(), 1);

    app.engine_mut().advance(Duration::from_secs(4));
    app.update(at(10, 31, 9), &mut NoOperator).unwrap();
    assert_eq!(app.schedule().current_index(), 1);
    assert_eq!(last_load(&app), studio.path("b.mp3"));
    assert_eq!(app.state(), PlaybackState::Idle);
    assert_eq!(app.engine().open_channels(), 1);
    assert_eq!(app.engine().loaded_samples(), 3);
}

#[test]
fn jingles_off_plays_content_directly() {
    let mut studio = Studio::new("10:30 11:00 a.mp3\n", &["a.mp3", "intro.mp3"]);
    studio.config.intro_path = Some(studio.path("intro.mp3"));
    let mut app = studio.start(MemoryEngine::new());

    app.update(at(10, 30, 0), &mut NoOperator).unwrap();
    assert_eq!(app.state(), PlaybackState::Playing);
}

// ── Failures and devices ──────────────────────────────────────────────────

#[test]
fn start_failure_is_fatal() {
    let studio = Studio::new("20:00 21:00 a.mp3\n", &["a.mp3"]);
    let mut engine = MemoryEngine::new();
    engine.set_fail_start(true);
    let mut app = studio.start(engine);

    app.handle_command(UiCommand::TogglePlay);
    let err = app.update(at(10, 0, 1), &mut NoOperator).unwrap_err();
    assert!(matches!(err, Error::Start(_)));
    assert!(err.is_fatal());
    assert_eq!(log_count(&app, "please restart"), 1);
}

#[test]
fn enabled_microphone_is_logged_once() {
    let studio = Studio::new("20:00 21:00 a.mp3\n", &["a.mp3"]);
    let mut engine = MemoryEngine::new();
    engine.set_input_devices(vec![
        InputDevice {
            name: "Monitor of Built-in Audio".to_string(),
            enabled: true,
            kind: InputKind::Loopback,
        },
        InputDevice {
            name: "USB Microphone".to_string(),
            enabled: true,
            kind: InputKind::Microphone,
        },
    ]);
    let mut app = studio.start(engine);

    for s in 1..5 {
        app.update(at(10, 0, s), &mut NoOperator).unwrap();
    }
    assert_eq!(log_count(&app, "microphone input available: USB Microphone"), 1);
}

#[test]
fn disabled_microphone_is_not_logged() {
    let studio = Studio::new("20:00 21:00 a.mp3\n", &["a.mp3"]);
    let mut engine = MemoryEngine::new();
    engine.set_input_devices(vec![InputDevice {
        name: "USB Microphone".to_string(),
        enabled: false,
        kind: InputKind::Microphone,
    }]);
    let mut app = studio.start(engine);
    app.update(at(10, 0, 1), &mut NoOperator).unwrap();
    assert_eq!(log_count(&app, "microphone"), 0);
}

// ── Day rollover and skipped entries ──────────────────────────────────────

#[test]
fn single_slot_starts_and_ends_again_the_next_day() {
    let studio = Studio::new("10:30 11:00 a.mp3\n", &["a.mp3"]);
    let mut app = studio.start(MemoryEngine::new());

    app.update(on(18, 10, 30, 0), &mut NoOperator).unwrap();
    assert_eq!(app.state(), PlaybackState::Playing);
    app.update(on(18, 11, 0, 0), &mut NoOperator).unwrap();
    assert_eq!(app.state(), PlaybackState::Idle);
    assert_eq!(app.schedule().current_index(), 0);

    app.update(on(19, 9, 0, 0), &mut NoOperator).unwrap();
    app.update(on(19, 10, 30, 0), &mut NoOperator).unwrap();
    assert_eq!(app.state(), PlaybackState::Playing);

    app.update(on(19, 11, 0, 0), &mut NoOperator).unwrap();
    assert_eq!(app.state(), PlaybackState::Idle);
    assert_eq!(log_count(&app, "time limit exceeded"), 2);
}

#[test]
fn undecodable_entry_is_skipped_on_next_tick() {
    let studio = Studio::new(
        "20:00 21:00 a.mp3\n21:00 22:00 b.mp3\n",
        &["a.mp3", "b.mp3"],
    );
    let mut engine = MemoryEngine::new();
    engine.set_undecodable(&studio.path("a.mp3"));
    let mut app = studio.start(engine);

    assert_eq!(app.schedule().current_index(), 1);
    assert_eq!(app.state(), PlaybackState::Loading);
    assert!(app.session().channel.is_none());
    assert_eq!(last_load(&app), studio.path("a.mp3"));

    app.update(at(10, 0, 1), &mut NoOperator).unwrap();
    assert_eq!(last_load(&app), studio.path("b.mp3"));
    assert_eq!(app.state(), PlaybackState::Idle);
    assert_eq!(log_count(&app, "skipping to next entry"), 1);
}

#[test]
fn missing_file_warns_again_on_a_later_day() {
    let studio = Studio::new("20:00 21:00 a.mp3\n", &[]);
    let mut operator = CopyingOperator::default();
    let mut app =
        Application::setup(&studio.config, MemoryEngine::new(), at(10, 0, 0), &mut operator)
            .unwrap();
    assert_eq!(log_count(&app, "file does not exist"), 1);

    fs::remove_file(studio.path("a.mp3")).unwrap();
    app.update(on(19, 0, 0, 1), &mut operator).unwrap();

    assert_eq!(log_count(&app, "file does not exist"), 2);
    assert_eq!(operator.prompts.len(), 2);
    assert_eq!(app.state(), PlaybackState::Idle);
}

// ── Jingle timing ─────────────────────────────────────────────────────────

#[test]
fn end_time_while_playing_runs_outro_before_next_entry() {
    let mut studio = Studio::new(
        "10:30 11:00 a.mp3\n11:00 12:00 b.mp3\n",
        &["a.mp3", "b.mp3", "outro.mp3"],
    );
    studio.config.outro_path = Some(studio.path("outro.mp3"));
    studio.config.jingles_enabled = true;
    let mut engine = MemoryEngine::new();
    engine.set_length(&studio.path("outro.mp3"), Duration::from_secs(4));
    let mut app = studio.start(engine);

    app.update(at(10, 30, 0), &mut NoOperator).unwrap();
    assert_eq!(app.state(), PlaybackState::Playing);

    app.update(at(11, 0, 0), &mut NoOperator).unwrap();
    assert_eq!(app.state(), PlaybackState::PlayingOutro);
    assert!(app.transport().play_music());
    assert_eq!(app.schedule().current_index(), 0);
    assert_eq!(log_count(&app, "time limit exceeded"), 1);
    assert_eq!(app.engine().open_channels(), 1);

    app.engine_mut().advance(Duration::from_secs(4));
    app.update(at(11, 0, 4), &mut NoOperator).unwrap();
    assert_eq!(app.schedule().current_index(), 1);
    assert_eq!(last_load(&app), studio.path("b.mp3"));
    // b is due at 11:00, so it starts right after the outro.
    assert_eq!(app.state(), PlaybackState::Playing);
}

#[test]
fn content_resumes_at_configured_offset_after_intro() {
    let mut studio = Studio::new("10:30 11:00 a.mp3\n", &["a.mp3", "intro.mp3"]);
    studio.config.intro_path = Some(studio.path("intro.mp3"));
    studio.config.jingles_enabled = true;
    studio.config.intro_resume_offset_ms = 2_000;
    let mut engine = MemoryEngine::new();
    engine.set_length(&studio.path("intro.mp3"), Duration::from_secs(5));
    engine.set_length(&studio.path("a.mp3"), Duration::from_secs(60));
    let mut app = studio.start(engine);

    app.update(at(10, 30, 0), &mut NoOperator).unwrap();
    assert_eq!(app.state(), PlaybackState::PlayingIntro);

    app.engine_mut().advance(Duration::from_secs(5));
    app.update(at(10, 30, 5), &mut NoOperator).unwrap();
    assert_eq!(app.state(), PlaybackState::Playing);
    let ch = app.session().channel.unwrap();
    assert_eq!(app.engine().position(ch), Duration::from_secs(2));
    assert_eq!(app.transport().seeker_pos(), Duration::from_secs(2));
}
