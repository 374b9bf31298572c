//! FlightRing CLI
//!
//! Ingest simulator sessions and extract ring datasets from stored trials.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use flightring_cli::{ExtractSummary, PipelineRunner};
use flightring_core::{PipelineConfig, RingMode};
use std::path::PathBuf;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "flightring")]
#[command(about = "Normalize flight logs and extract ring datasets", long_about = None)]
struct Args {
    /// JSON pipeline config; flags override its values
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// JSON summary on stdout
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Store the simulator's current session as the participant's next trial
    Ingest {
        /// Participant name
        #[arg(short, long)]
        name: String,

        /// Directory the simulator wrote its logs into
        #[arg(long)]
        session: Option<PathBuf>,

        /// Root of the trial directories
        #[arg(long)]
        trials: Option<PathBuf>,
    },

    /// Aggregate all trials, extract the ring and export the results
    Extract {
        /// Root of the trial directories
        #[arg(long)]
        trials: Option<PathBuf>,

        /// Output directory for collated arrays and plot exports
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Inner ring radius
        #[arg(long)]
        inner: Option<f64>,

        /// Outer ring radius
        #[arg(long)]
        outer: Option<f64>,

        /// Skip the relative-distance pass
        #[arg(long)]
        absolute_only: bool,
    },

    /// Rebuild a participant's trial index from the directories on disk
    Reindex {
        /// Participant name
        #[arg(short, long)]
        name: String,

        /// Root of the trial directories
        #[arg(long)]
        trials: Option<PathBuf>,
    },
}

impl Command {
    /// Applies the flags that override config file values.
    fn apply_overrides(&self, config: &mut PipelineConfig) {
        match self {
            Command::Ingest {
                session, trials, ..
            } => {
                if let Some(dir) = session {
                    config.session_root = dir.clone();
                }
                if let Some(dir) = trials {
                    config.trials_root = dir.clone();
                }
            }
            Command::Extract {
                trials,
                out,
                inner,
                outer,
                ..
            } => {
                if let Some(dir) = trials {
                    config.trials_root = dir.clone();
                }
                if let Some(dir) = out {
                    config.collated_root = dir.clone();
                }
                if let Some(r) = inner {
                    config.radii.inner = *r;
                }
                if let Some(r) = outer {
                    config.radii.outer = *r;
                }
            }
            Command::Reindex { trials, .. } => {
                if let Some(dir) = trials {
                    config.trials_root = dir.clone();
                }
            }
        }
    }
}

fn load_config(args: &Args) -> Result<PipelineConfig> {
    let mut config = match &args.config {
        Some(path) => PipelineConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => PipelineConfig::default(),
    };
    args.command.apply_overrides(&mut config);
    Ok(config)
}

fn print_extract_summary(summary: &ExtractSummary) {
    info!("");
    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    for (name, trials) in &summary.participants {
        info!("  {}: {} trials", name, trials);
    }
    info!(
        "Ring [{}, {}]: {} rows total",
        summary.inner, summary.outer, summary.total_rows
    );
    for pass in &summary.passes {
        info!(
            "  {} ring: {} rows -> {}",
            pass.mode,
            pass.ring_rows,
            pass.plot.display()
        );
    }
}

fn run(args: Args) -> Result<()> {
    let config = load_config(&args)?;
    let runner = PipelineRunner::new(config).context("Invalid pipeline configuration")?;

    match &args.command {
        Command::Ingest { name, .. } => {
            let report = runner
                .ingest(name)
                .with_context(|| format!("Failed to ingest session for {}", name))?;

            if args.json {
                let summary = serde_json::json!({
                    "participant": report.trial.participant,
                    "trial": report.trial.trial,
                    "dir": report.dir,
                    "steps": report.steps,
                    "moved_files": report.moved_files,
                });
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                info!("✓ {} stored in {}", report.trial, report.dir.display());
            }
        }
        Command::Extract { absolute_only, .. } => {
            let summary = runner
                .extract(*absolute_only)
                .context("Ring extraction failed")?;

            if args.json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                print_extract_summary(&summary);
                if summary.ring_rows(RingMode::Absolute) == Some(0) {
                    info!("No rows fell inside the ring");
                }
            }
        }
        Command::Reindex { name, .. } => {
            let trials = runner
                .reindex(name)
                .with_context(|| format!("Failed to reindex {}", name))?;

            if args.json {
                let summary = serde_json::json!({ "participant": name, "trials": trials });
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                info!("✓ {} indexed with {} trials", name, trials);
            }
        }
    }

    Ok(())
}

fn main() {
    let args = Args::parse();

    // Logs go to stderr so --json output stays parseable
    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Error: failed to set tracing subscriber: {}", e);
        std::process::exit(1);
    }

    if let Err(e) = run(args) {
        error!("✗ {:#}", e);
        std::process::exit(1);
    }
}
