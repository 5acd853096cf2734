//! TiltCam CLI: drive the orientation-aware recorder from the terminal.
//!
//! Usage:
//!   tiltcam replay <SCRIPT>          Replay a JSONL sensor/command script
//!   tiltcam classify --beta --gamma  Classify a single sensor sample
//!   tiltcam constraints <ORIENTATION> Print the camera request for an orientation

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use tiltcam_capture_engine::backend::GrantOutcome;
use tiltcam_common::config::AppConfig;
use tiltcam_common::posture::Orientation;

mod commands;

#[derive(Parser)]
#[command(
    name = "tiltcam",
    about = "Orientation-aware video recording core",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (defaults to the XDG config location)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// How the simulated camera answers permission requests.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum Grant {
    Grant,
    Deny,
    NoDevice,
}

impl From<Grant> for GrantOutcome {
    fn from(grant: Grant) -> Self {
        match grant {
            Grant::Grant => GrantOutcome::Grant,
            Grant::Deny => GrantOutcome::DenyPermission,
            Grant::NoDevice => GrantOutcome::NoDevice,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a scripted session against the simulated camera
    Replay {
        /// Path to the JSONL script
        script: PathBuf,

        /// Output directory for recordings (overrides config)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Simulated permission outcome
        #[arg(long, value_enum, default_value = "grant")]
        grant: Grant,

        /// Simulated permission prompt latency (milliseconds)
        #[arg(long, default_value = "0")]
        latency_ms: u64,

        /// Milliseconds to wait after the last scripted step before shutdown
        #[arg(long, default_value = "500")]
        settle_ms: u64,
    },

    /// Classify one sensor sample with the configured thresholds
    Classify {
        #[arg(long, default_value = "0", allow_hyphen_values = true)]
        alpha: f64,

        #[arg(long, allow_hyphen_values = true)]
        beta: f64,

        #[arg(long, allow_hyphen_values = true)]
        gamma: f64,
    },

    /// Print the capture constraints for an orientation as JSON
    Constraints {
        /// landscape or portrait
        orientation: Orientation,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => AppConfig::load_from(path)
            .map_err(|e| anyhow::anyhow!("Failed to load config {}: {e}", path.display()))?,
        None => AppConfig::load(),
    };

    let mut logging = config.logging.clone();
    if cli.verbose {
        logging.level = "debug".to_string();
    }
    tiltcam_common::logging::init_logging(&logging);

    match cli.command {
        Commands::Replay {
            script,
            output,
            grant,
            latency_ms,
            settle_ms,
        } => {
            commands::replay::run(
                config,
                script,
                output,
                grant.into(),
                latency_ms,
                settle_ms,
            )
            .await
        }
        Commands::Classify { alpha, beta, gamma } => {
            commands::classify::run(&config, alpha, beta, gamma)
        }
        Commands::Constraints { orientation } => commands::constraints::run(orientation),
    }
}
