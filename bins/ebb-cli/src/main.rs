//! ebb-cli — Scenario replay and snapshot inspection for the ebb engine.
//!
//! Replays a JSON scenario against a fresh engine driven by a manual clock
//! and an in-memory vault, printing one JSON line per step and a final
//! summary. Snapshots written with `--save-snapshot` can be examined with
//! `inspect`.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::info;

mod scenario;
mod settings;

use scenario::{inspect, Replay, Scenario};
use settings::Settings;

/// Lock-accounting engine driver.
#[derive(Parser, Debug)]
#[command(name = "ebb-cli", version, about = "Replay lock-accounting scenarios and inspect snapshots")]
struct Cli {
    /// Settings file (TOML, YAML, or JSON). `EBB_*` variables apply on top.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Log output format ("text" or "json")
    #[arg(long, global = true)]
    log_format: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Replay a scenario file.
    Replay(ReplayArgs),
    /// Print the contents of a snapshot file.
    Inspect {
        /// Snapshot written by `replay --save-snapshot`.
        snapshot: PathBuf,
    },
}

#[derive(Args, Debug)]
struct ReplayArgs {
    /// Scenario JSON file.
    #[arg(long)]
    scenario: PathBuf,

    /// Unlock-time rounding interval, in seconds.
    #[arg(long)]
    interval: Option<u64>,

    /// Maximum lock duration, in seconds.
    #[arg(long)]
    max_lock_duration: Option<u64>,

    /// Interval steps one catch-up may walk.
    #[arg(long)]
    max_catch_up_steps: Option<u32>,

    /// Write the final engine state here.
    #[arg(long)]
    save_snapshot: Option<PathBuf>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut settings = Settings::load(cli.config.as_deref())?;
    if let Some(level) = cli.log_level {
        settings.log_level = level;
    }
    if let Some(format) = cli.log_format {
        settings.log_format = format;
    }
    init_logging(&settings.log_level, &settings.log_format);

    match cli.command {
        Command::Replay(args) => replay(settings, args),
        Command::Inspect { snapshot } => {
            let bytes = std::fs::read(&snapshot)
                .with_context(|| format!("failed to read {}", snapshot.display()))?;
            let inspection = inspect(&bytes)?;
            println!("{}", serde_json::to_string_pretty(&inspection)?);
            Ok(())
        }
    }
}

fn replay(settings: Settings, args: ReplayArgs) -> Result<()> {
    let mut config = settings.escrow;
    if let Some(interval) = args.interval {
        config.interval = interval;
    }
    if let Some(max) = args.max_lock_duration {
        config.max_lock_duration = max;
    }
    if let Some(steps) = args.max_catch_up_steps {
        config.max_catch_up_steps = steps;
    }

    let text = std::fs::read_to_string(&args.scenario)
        .with_context(|| format!("failed to read {}", args.scenario.display()))?;
    let scenario = Scenario::from_json(&text)?;
    info!(
        scenario = %args.scenario.display(),
        steps = scenario.steps.len(),
        interval = config.interval,
        "replaying"
    );

    let mut replay = Replay::new(config, scenario.start)?;
    for outcome in replay.run(&scenario.steps) {
        println!("{}", serde_json::to_string(&outcome)?);
    }
    println!("{}", serde_json::to_string_pretty(&replay.summary()?)?);

    if let Some(path) = args.save_snapshot {
        let bytes = replay.escrow().snapshot()?;
        std::fs::write(&path, &bytes)
            .with_context(|| format!("failed to write {}", path.display()))?;
        info!(path = %path.display(), bytes = bytes.len(), "snapshot saved");
    }
    Ok(())
}

/// Initialize tracing with the given level and output format.
///
/// `RUST_LOG` takes precedence over `level`. Logs go to stderr so stdout
/// stays machine-readable.
fn init_logging(level: &str, format: &str) {
    use tracing_subscriber::filter::EnvFilter;
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    if format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .init();
    }
}
