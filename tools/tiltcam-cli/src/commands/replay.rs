//! Replay a scripted session against the simulated camera.
//!
//! A script is JSON lines, one step each, scheduled by `at_ms` from start:
//!
//! ```text
//! {"at_ms": 0,    "type": "sample", "beta": 10, "gamma": 60}
//! {"at_ms": 100,  "type": "start"}
//! {"at_ms": 900,  "type": "sample", "beta": 90, "gamma": 10}
//! {"at_ms": 1200, "type": "mode", "mode": "toggle"}
//! {"at_ms": 1300, "type": "orientation", "orientation": "portrait"}
//! {"at_ms": 2000, "type": "stop"}
//! ```
//!
//! Blank lines and lines starting with `#` are skipped.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tokio::sync::mpsc;
use tokio::time::Instant;

use tiltcam_capture_engine::backend::{GrantOutcome, SimulatedDevices, SimulatedRecorder};
use tiltcam_capture_engine::{
    Command, ExportOutcome, FileExportSink, MediaBackend, RecorderHost, RunSummary,
};
use tiltcam_common::config::AppConfig;
use tiltcam_common::error::{TiltcamError, TiltcamResult};
use tiltcam_common::posture::{Mode, Orientation};
use tiltcam_orientation::{ReplaySource, SensorReading, TimedReading};

#[derive(Debug, Deserialize)]
struct Line {
    at_ms: u64,
    #[serde(flatten)]
    step: Step,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Step {
    Sample(SensorReading),
    Mode { mode: Mode },
    Orientation { orientation: Orientation },
    Start,
    Stop,
}

/// A parsed script: sensor readings and user commands on one timeline.
#[derive(Debug, Default, PartialEq)]
pub struct Script {
    pub readings: Vec<TimedReading>,
    pub commands: Vec<(u64, Command)>,
    pub end_ms: u64,
}

pub fn parse_script(text: &str) -> TiltcamResult<Script> {
    let mut script = Script::default();

    for (idx, raw) in text.lines().enumerate() {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let line: Line = serde_json::from_str(trimmed)
            .map_err(|e| TiltcamError::script(idx + 1, e.to_string()))?;

        script.end_ms = script.end_ms.max(line.at_ms);
        let command = match line.step {
            Step::Sample(reading) => {
                script.readings.push(TimedReading {
                    at_ms: line.at_ms,
                    reading,
                });
                continue;
            }
            Step::Mode { mode } => Command::SetMode(mode),
            Step::Orientation { orientation } => Command::SetOrientation(orientation),
            Step::Start => Command::StartRecording,
            Step::Stop => Command::StopRecording,
        };
        script.commands.push((line.at_ms, command));
    }

    // Stable: steps sharing a timestamp keep file order.
    script.commands.sort_by_key(|(at, _)| *at);
    Ok(script)
}

pub async fn run(
    config: AppConfig,
    script_path: PathBuf,
    output: Option<PathBuf>,
    grant: GrantOutcome,
    latency_ms: u64,
    settle_ms: u64,
) -> anyhow::Result<()> {
    let text = std::fs::read_to_string(&script_path)
        .map_err(|e| anyhow::anyhow!("Failed to read script {}: {e}", script_path.display()))?;
    let script = parse_script(&text)?;

    let output_dir = output.unwrap_or_else(|| config.export.output_dir.clone());
    std::fs::create_dir_all(&output_dir)?;

    println!("Replaying script: {}", script_path.display());
    println!("  Sensor samples: {}", script.readings.len());
    println!("  Commands: {}", script.commands.len());
    println!("  Output: {}", output_dir.display());
    println!();

    let backend = MediaBackend::new(
        Arc::new(
            SimulatedDevices::new()
                .with_outcome(grant)
                .with_latency(Duration::from_millis(latency_ms)),
        ),
        Arc::new(SimulatedRecorder::new()),
        Arc::new(FileExportSink::new(&output_dir, &config.export.file_prefix)),
    );
    let source = ReplaySource::new(script.readings);
    let mut host = RecorderHost::new(&config, backend, Box::new(source))?;

    let (tx, rx) = mpsc::channel(16);
    let commands = script.commands;
    let end_ms = script.end_ms;
    let feeder = tokio::spawn(async move {
        let start = Instant::now();
        for (at_ms, command) in commands {
            tokio::time::sleep_until(start + Duration::from_millis(at_ms)).await;
            tracing::debug!(at_ms, ?command, "Scripted command");
            if tx.send(command).await.is_err() {
                return;
            }
        }
        tokio::time::sleep_until(start + Duration::from_millis(end_ms + settle_ms)).await;
        let _ = tx.send(Command::Shutdown).await;
    });

    let summary = host.run(rx).await?;
    feeder.abort();

    print_summary(&summary);
    Ok(())
}

fn print_summary(summary: &RunSummary) {
    println!("Sessions requested: {}", summary.requested.len());
    println!("Sessions started: {}", summary.started.len());
    if summary.discarded > 0 {
        println!("Late grants released: {}", summary.discarded);
    }

    for finished in &summary.finished {
        let artifact = &finished.artifact;
        println!();
        println!("Session {}", artifact.session);
        println!("  Orientation: {}", artifact.orientation);
        println!("  Stop reason: {:?}", artifact.stop_reason);
        println!(
            "  Data: {} bytes in {} chunk(s), {:.2}s",
            artifact.len(),
            artifact.chunk_count,
            artifact.duration_secs()
        );
        match &finished.export {
            ExportOutcome::Saved(Some(path)) => println!("  Saved to: {}", path.display()),
            ExportOutcome::Saved(None) => println!("  Saved"),
            ExportOutcome::Failed(e) => println!("  Export failed: {e}"),
        }
    }

    if !summary.failures.is_empty() {
        println!("\nFailures:");
        for failure in &summary.failures {
            println!("  - {failure}");
        }
    }
}
