//! Operator console: keyboard commands in, blocking prompts out.
//!
//! A dedicated thread reads stdin and forwards lines over an `mpsc` channel,
//! so the control loop can poll without blocking. The prompts used while a
//! file is missing read from the same channel.

use std::collections::VecDeque;
use std::io::{self, BufRead, Write};
use std::path::Path;
use std::sync::mpsc;
use std::time::Duration;

/// How often a prompt re-checks when stdin is closed (e.g. running detached).
const DETACHED_RETRY: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, PartialEq)]
pub enum UiCommand {
    TogglePlay,
    Seek(Duration),
    Volume(f32),
    ToggleRandom,
    ToggleJingles,
    Quit,
}

impl UiCommand {
    /// Parse one console line. Unknown input yields an error message.
    pub fn parse(line: &str) -> Result<Option<Self>, String> {
        let line = line.trim();
        let (word, arg) = match line.split_once(char::is_whitespace) {
            Some((w, a)) => (w, Some(a.trim())),
            None => (line, None),
        };
        match (word, arg) {
            ("", None) => Ok(None),
            ("p" | "play" | "pause", None) => Ok(Some(UiCommand::TogglePlay)),
            ("s" | "seek", Some(a)) => parse_seek(a).map(|d| Some(UiCommand::Seek(d))),
            ("v" | "volume", Some(a)) => {
                let pct: f32 = a
                    .parse()
                    .map_err(|_| format!("Invalid volume '{}'. Expected 0-100", a))?;
                if !(0.0..=100.0).contains(&pct) {
                    return Err(format!("Volume {} out of range (0-100)", pct));
                }
                Ok(Some(UiCommand::Volume(pct / 100.0)))
            }
            ("r" | "random", None) => Ok(Some(UiCommand::ToggleRandom)),
            ("i" | "jingles", None) => Ok(Some(UiCommand::ToggleJingles)),
            ("q" | "quit", None) => Ok(Some(UiCommand::Quit)),
            _ => Err(format!(
                "Unknown command '{}'. Commands: p, s <secs|mm:ss>, v <0-100>, r, i, q",
                line
            )),
        }
    }
}

/// Seconds (`95`, `95.5`) or minutes and seconds (`1:35`).
fn parse_seek(s: &str) -> Result<Duration, String> {
    let err = || format!("Invalid seek position '{}'. Expected seconds or MM:SS", s);
    if let Some((m, sec)) = s.split_once(':') {
        let m: u64 = m.parse().map_err(|_| err())?;
        let sec: u64 = sec.parse().map_err(|_| err())?;
        if sec >= 60 {
            return Err(err());
        }
        let total = m.checked_mul(60).and_then(|s| s.checked_add(sec)).ok_or_else(err)?;
        return Ok(Duration::from_secs(total));
    }
    let secs: f64 = s.parse().map_err(|_| err())?;
    Duration::try_from_secs_f64(secs).map_err(|_| err())
}

/// Blocking interactions the control loop needs from a human.
pub trait Operator {
    /// Block until the operator says the missing file is in place.
    fn wait_for_file(&mut self, path: &Path);

    /// Show an unrecoverable error and wait for acknowledgement.
    fn acknowledge_fatal(&mut self, message: &str);
}

pub struct Console {
    rx: mpsc::Receiver<String>,
    /// Lines that arrived while a prompt was waiting; handed to `poll` later.
    backlog: VecDeque<String>,
}

impl Console {
    /// Start the stdin reader thread.
    pub fn spawn() -> io::Result<Self> {
        let (tx, rx) = mpsc::channel::<String>();
        std::thread::Builder::new()
            .name("console-input".into())
            .spawn(move || {
                let stdin = io::stdin();
                for line in stdin.lock().lines() {
                    match line {
                        Ok(l) => {
                            if tx.send(l).is_err() {
                                break;
                            }
                        }
                        Err(_) => break,
                    }
                }
            })?;
        Ok(Console::with_receiver(rx))
    }

    fn with_receiver(rx: mpsc::Receiver<String>) -> Self {
        Console {
            rx,
            backlog: VecDeque::new(),
        }
    }

    /// Commands typed since the last poll. Bad input is reported and dropped.
    pub fn poll(&mut self) -> Vec<UiCommand> {
        let mut commands = Vec::new();
        while let Some(line) = self.backlog.pop_front().or_else(|| self.rx.try_recv().ok()) {
            match UiCommand::parse(&line) {
                Ok(Some(cmd)) => commands.push(cmd),
                Ok(None) => {}
                Err(e) => eprintln!("{}", e),
            }
        }
        commands
    }

    /// Block for an empty line. Anything typed before or during the prompt
    /// is kept for the next `poll`. False once stdin is closed.
    fn wait_for_enter(&mut self) -> bool {
        while let Ok(line) = self.rx.try_recv() {
            self.backlog.push_back(line);
        }
        loop {
            match self.rx.recv() {
                Ok(line) if line.trim().is_empty() => return true,
                Ok(line) => self.backlog.push_back(line),
                Err(_) => return false,
            }
        }
    }
}

impl Operator for Console {
    fn wait_for_file(&mut self, path: &Path) {
        eprint!("Please create {} then press Enter... ", path.display());
        let _ = io::stderr().flush();
        if !self.wait_for_enter() {
            // No operator attached: poll the filesystem instead.
            while !path.exists() {
                std::thread::sleep(DETACHED_RETRY);
            }
        }
    }

    fn acknowledge_fatal(&mut self, message: &str) {
        eprintln!("{}", message);
        eprint!("Press Enter to exit... ");
        let _ = io::stderr().flush();
        self.wait_for_enter();
    }
}
