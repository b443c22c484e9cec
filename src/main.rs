use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use slot_player::app::Application;
use slot_player::config::Config;
use slot_player::console::{Console, Operator, UiCommand};
use slot_player::engine::AudioEngine;
use slot_player::error::{Error, Result};
use slot_player::memory_engine::MemoryEngine;
use slot_player::rodio_engine::{self, RodioEngine};
use slot_player::schedule::Schedule;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// How often the status block is redrawn.
const DRAW_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Parser)]
#[command(name = "slotplayer", about = "Scheduled radio slot player")]
#[command(version)]
struct Cli {
    /// Configuration file (defaults to the platform config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the player against the schedule
    Run {
        /// Simulate playback without an audio device
        #[arg(long)]
        headless: bool,
        /// Schedule file (overrides config)
        #[arg(short, long)]
        schedule: Option<PathBuf>,
    },
    /// Parse the schedule and report which files are present
    Check {
        /// Date to resolve the folder for (YYYY-MM-DD, default today)
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// List audio output and input devices
    Devices,
    /// Configuration file
    Config {
        #[command(subcommand)]
        action: ConfigCmd,
    },
}

#[derive(Subcommand)]
enum ConfigCmd {
    /// Print the effective configuration
    Show,
    /// Write the default configuration if none exists
    Init,
}

fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "slot_player=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config_path = cli.config.unwrap_or_else(Config::default_path);
    let mut config = Config::load(&config_path);

    let outcome = match cli.command {
        Commands::Run { headless, schedule } => {
            if let Some(path) = schedule {
                config.schedule_path = path;
            }
            run(config, &config_path, headless)
        }
        Commands::Check { date } => check(&config, date.unwrap_or_else(|| Local::now().date_naive())),
        Commands::Devices => {
            devices();
            Ok(())
        }
        Commands::Config { action } => match action {
            ConfigCmd::Show => show_config(&config, &config_path),
            ConfigCmd::Init => init_config(&config_path),
        },
    };

    if let Err(e) = outcome {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(config: Config, config_path: &Path, headless: bool) -> Result<()> {
    config.validate()?;
    let mut console = Console::spawn()?;
    info!(
        "starting with schedule {} ({})",
        config.schedule_path.display(),
        if headless { "headless" } else { "audio output" }
    );

    let result = if headless {
        run_loop(config, config_path, MemoryEngine::new(), &mut console, |engine, elapsed| {
            engine.advance(elapsed)
        })
    } else {
        let engine = RodioEngine::new(config.output_device.as_deref())?;
        run_loop(config, config_path, engine, &mut console, |_, _| {})
    };

    if let Err(e) = &result {
        if e.is_fatal() {
            console.acknowledge_fatal(&e.to_string());
        }
    }
    result
}

/// Poll input, tick the application, redraw. Returns when the operator quits
/// or a fatal error stops the session.
fn run_loop<E, F>(
    mut config: Config,
    config_path: &Path,
    engine: E,
    console: &mut Console,
    mut on_tick: F,
) -> Result<()>
where
    E: AudioEngine,
    F: FnMut(&mut E, Duration),
{
    let mut app = Application::setup(&config, engine, Local::now().naive_local(), console)?;
    let tick = config.tick();
    let mut last_tick = Instant::now();
    let mut last_draw: Option<Instant> = None;

    'outer: loop {
        for cmd in console.poll() {
            if cmd == UiCommand::Quit {
                break 'outer;
            }
            app.handle_command(cmd);
        }

        let elapsed = last_tick.elapsed();
        last_tick = Instant::now();
        on_tick(app.engine_mut(), elapsed);

        app.update(Local::now().naive_local(), console)?;

        if last_draw.is_none_or(|t| t.elapsed() >= DRAW_INTERVAL) {
            println!("{}\n", app.compose());
            last_draw = Some(Instant::now());
        }

        std::thread::sleep(tick);
    }

    info!("shutting down");
    app.shutdown();
    config.apply_panel(app.panel());
    if let Err(e) = config.save(config_path) {
        eprintln!("Warning: could not save settings: {}", e);
    }
    Ok(())
}

fn check(config: &Config, date: NaiveDate) -> Result<()> {
    let schedule = Schedule::load(&config.schedule_path)?;
    println!(
        "Schedule {} ({} entries), folder for {}: {}",
        schedule.path().display(),
        schedule.len(),
        date,
        schedule.folder_for(date).display()
    );
    let folder = schedule.folder_for(date);
    let mut missing = 0;
    for (i, entry) in schedule.entries().iter().enumerate() {
        let path = folder.join(&entry.file_name);
        let status = if path.is_file() {
            "ok"
        } else {
            missing += 1;
            "MISSING"
        };
        println!(
            "  {:>3}. {}-{}  {}  [{}]",
            i + 1,
            entry.start_display(),
            entry.end_display(),
            entry.file_name,
            status
        );
    }
    if missing > 0 {
        println!("{} file(s) missing.", missing);
    }
    Ok(())
}

fn devices() {
    let outputs = rodio_engine::list_output_devices();
    println!("Output devices:");
    if outputs.is_empty() {
        println!("  (none)");
    }
    for name in outputs {
        println!("  {}", name);
    }

    let inputs = rodio_engine::list_input_devices();
    println!("Input devices:");
    if inputs.is_empty() {
        println!("  (none)");
    }
    for dev in inputs {
        println!(
            "  {} ({:?}{})",
            dev.name,
            dev.kind,
            if dev.enabled { "" } else { ", disabled" }
        );
    }
}

fn show_config(config: &Config, path: &Path) -> Result<()> {
    println!("# {}", path.display());
    println!("{}", serde_json::to_string_pretty(config)?);
    Ok(())
}

fn init_config(path: &Path) -> Result<()> {
    if path.exists() {
        return Err(Error::Config(format!(
            "{} already exists",
            path.display()
        )));
    }
    Config::default().save(path)?;
    println!("Wrote default configuration to {}", path.display());
    Ok(())
}
