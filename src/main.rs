//! datagrab CLI
//!
//! Records synchronized screen frames and input events, and validates
//! recorded sessions.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use datagrab::{
    collector::{check_permission, PlatformHook, StopKey},
    config::Config,
    core::{StopReason, StopSignal},
    screen::{open_platform_screen, ScreenSource},
    session::{default_rec_id, Session, SessionConfig},
    validate::{validate_session, EarlyEventPolicy, ValidateOptions},
    VERSION,
};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "datagrab")]
#[command(version = VERSION)]
#[command(about = "Screen and input recorder for computer-use datasets", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Record a session until the stop key, a stop flag, SIGINT/SIGTERM or the duration cap
    Record {
        /// Directory that holds the sessions
        #[arg(long)]
        dataset_root: Option<PathBuf>,

        /// Session id (default: rec_YYYYMMDD_HHMMSS)
        #[arg(long)]
        rec_id: Option<String>,

        /// Task description stored with the session
        #[arg(long, default_value = "")]
        task: String,

        /// Target frames per second
        #[arg(long)]
        fps: Option<u32>,

        /// 1-based monitor index
        #[arg(long)]
        monitor: Option<usize>,

        /// Key that stops the recording (esc, enter, space, f1-f24 or one character)
        #[arg(long)]
        stop_key: Option<String>,

        /// Stop after this many seconds
        #[arg(long)]
        max_duration: Option<f64>,

        /// Operator name stored in the metadata
        #[arg(long)]
        operator: Option<String>,

        /// Log per-second diagnostics
        #[arg(long)]
        dev: bool,
    },

    /// Check a recorded session for consistency
    Validate {
        /// Session directory
        rec_dir: PathBuf,

        /// Check that frame images exist and share one size
        #[arg(long)]
        check_images: bool,

        /// Frames shape-checked at each end (0 = none, negative = all)
        #[arg(long, allow_negative_numbers = true)]
        sample_frames: Option<i64>,

        /// Treat events before the first frame as errors
        #[arg(long)]
        strict_early_events: bool,

        /// Print the full report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show configuration
    Config {
        /// Persist the effective configuration
        #[arg(long)]
        save: bool,
    },
}

fn main() {
    let cli = Cli::parse();
    let dev = matches!(cli.command, Commands::Record { dev: true, .. });
    init_tracing(dev);

    let code = match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:#}");
            1
        }
    };
    std::process::exit(code);
}

fn run(cli: Cli) -> Result<i32> {
    match cli.command {
        Commands::Record {
            dataset_root,
            rec_id,
            task,
            fps,
            monitor,
            stop_key,
            max_duration,
            operator,
            dev,
        } => {
            let mut config = load_config();
            config.dataset_root = dataset_root.unwrap_or(config.dataset_root);
            config.fps = fps.unwrap_or(config.fps).max(1);
            config.monitor_index = monitor.unwrap_or(config.monitor_index);
            config.stop_key = stop_key.unwrap_or(config.stop_key);
            config.max_duration_secs = max_duration.or(config.max_duration_secs);
            config.operator = operator.unwrap_or(config.operator);

            let session = SessionConfig {
                rec_id: rec_id.unwrap_or_else(default_rec_id),
                task,
                fps: config.fps,
                stop_key: StopKey::resolve(&config.stop_key),
                operator: config.effective_operator(),
                max_duration: config.max_duration_secs,
                dev,
                ..SessionConfig::new(config.dataset_root.clone())
            };
            cmd_record(session, config.monitor_index)
        }
        Commands::Validate {
            rec_dir,
            check_images,
            sample_frames,
            strict_early_events,
            json,
        } => {
            let config = load_config();
            let options = ValidateOptions {
                check_images,
                sample_frames: sample_frames.unwrap_or(config.sample_frames),
                early_events: if strict_early_events {
                    EarlyEventPolicy::Error
                } else {
                    config.early_events
                },
            };
            cmd_validate(rec_dir, &options, json)
        }
        Commands::Config { save } => cmd_config(save),
    }
}

fn cmd_record(config: SessionConfig, monitor_index: usize) -> Result<i32> {
    println!("datagrab v{VERSION}");
    println!();

    if !check_permission() {
        eprintln!("Error: Input Monitoring permission not granted.");
        eprintln!();
        eprintln!("To grant permission:");
        eprintln!("1. Open System Settings > Privacy & Security");
        eprintln!("2. Select 'Input Monitoring' and 'Screen Recording'");
        eprintln!("3. Add this application to the allowed list");
        eprintln!("4. Restart the application");
        return Ok(1);
    }

    let screen = open_platform_screen(monitor_index).context("cannot open screen")?;
    let monitor = screen.monitor().clone();
    let stop_key = config.stop_key.clone();
    let fps = config.fps;

    let mut session = Session::new(config);
    let stop_flag = session.dir().join(".stop");

    println!("Recording to {}", session.dir().display());
    println!(
        "  Monitor: {} ({}x{} at {},{})",
        monitor.index, monitor.width, monitor.height, monitor.left, monitor.top
    );
    println!("  Target: {fps} fps");
    println!();
    println!(
        "Press {stop_key} or Ctrl+C to stop, send SIGTERM, or create {}",
        stop_flag.display()
    );
    println!();

    ctrlc_handler(session.stop_signal());

    let mut hook = PlatformHook::new();
    let report = session
        .run(screen, &mut hook)
        .context("recording failed")?;

    println!();
    println!("Stopped by {}.", report.stop_reason);
    println!("{}", report.summary);
    println!("Session saved to {}", report.dir.display());
    Ok(0)
}

fn cmd_validate(rec_dir: PathBuf, options: &ValidateOptions, json: bool) -> Result<i32> {
    let report = validate_session(&rec_dir, options)
        .with_context(|| format!("cannot validate {}", rec_dir.display()))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{report}");
    }
    Ok(report.exit_code())
}

fn cmd_config(save: bool) -> Result<i32> {
    let config = load_config();

    println!("Configuration");
    println!("=============");
    println!();
    println!("Config file: {:?}", Config::config_path());
    println!();
    println!("{}", serde_json::to_string_pretty(&config)?);

    if save {
        config.save().context("cannot save configuration")?;
        println!();
        println!("Saved.");
    }
    Ok(0)
}

/// Config file values with environment overrides applied.
fn load_config() -> Config {
    let mut config = Config::load().unwrap_or_else(|e| {
        eprintln!("Warning: Could not load config, using defaults: {e}");
        Config::default()
    });
    config.apply_env();
    config
}

fn init_tracing(dev: bool) {
    let default = if dev { "datagrab=debug" } else { "datagrab=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Set up the Ctrl+C and termination signal handler.
fn ctrlc_handler(stop: StopSignal) {
    ctrlc::set_handler(move || {
        stop.trigger(StopReason::Signal);
    })
    .expect("Error setting signal handler");
}
