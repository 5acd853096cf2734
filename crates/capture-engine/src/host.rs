//! The recorder host.
//!
//! Owns the sensor subscription, the mode arbiter, and the recording
//! controller, and drives them from one event loop. Orientation or mode
//! changes that land while a session is in flight stop that session:
//! constraints are fixed for a session's lifetime.

use std::time::Duration;

use serde::Serialize;
use tokio::sync::mpsc;
use tokio::time::Instant;

use tiltcam_common::config::AppConfig;
use tiltcam_common::error::{TiltcamError, TiltcamResult};
use tiltcam_common::posture::{Mode, Orientation};
use tiltcam_orientation::{
    ModeArbiter, OrientationClassifier, SensorReading, SensorSample, SensorSource,
};

use crate::backend::MediaBackend;
use crate::constraints::CaptureConstraints;
use crate::session::{
    FinishedSession, RecordingController, SessionEvent, SessionId, SessionState, SessionUpdate,
    StopReason,
};

/// How long a shutdown waits for an in-flight recorder to flush.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// User-initiated input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    SetMode(Mode),
    SetOrientation(Orientation),
    StartRecording,
    StopRecording,
    /// Finish any in-flight session, then leave the event loop.
    Shutdown,
}

/// Latest raw angles and the orientation they produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Diagnostics {
    pub alpha: i64,
    pub beta: i64,
    pub gamma: i64,
    pub orientation: Orientation,
}

/// What happened during one [`RecorderHost::run`].
#[derive(Debug, Default)]
pub struct RunSummary {
    /// Sessions that began acquiring.
    pub requested: Vec<SessionId>,
    /// Sessions whose recorder started.
    pub started: Vec<SessionId>,
    pub finished: Vec<FinishedSession>,
    /// Late stream grants released after their session was torn down.
    pub discarded: usize,
    pub failures: Vec<String>,
}

impl RunSummary {
    fn record(&mut self, update: SessionUpdate) {
        match update {
            SessionUpdate::Started(session) => self.started.push(session),
            SessionUpdate::Finished(finished) => self.finished.push(finished),
            SessionUpdate::Discarded(_) => self.discarded += 1,
            SessionUpdate::Buffered { .. } | SessionUpdate::Ignored => {}
        }
    }
}

pub struct RecorderHost {
    arbiter: ModeArbiter,
    classifier: OrientationClassifier,
    controller: RecordingController,
    session_events: mpsc::UnboundedReceiver<SessionEvent>,
    sensor: Box<dyn SensorSource>,
    readings: Option<mpsc::UnboundedReceiver<SensorReading>>,
    latest: Option<SensorSample>,
    diagnostic_interval: Duration,
    disposed: bool,
}

impl RecorderHost {
    /// Build the host and register its sensor subscription.
    pub fn new(
        config: &AppConfig,
        backend: MediaBackend,
        mut sensor: Box<dyn SensorSource>,
    ) -> TiltcamResult<Self> {
        config.validate()?;
        let readings = sensor.subscribe()?;
        tracing::info!(source = sensor.name(), "Sensor subscription registered");

        let (controller, session_events) =
            RecordingController::new(backend, config.recording.clone());

        Ok(Self {
            arbiter: ModeArbiter::new(
                config.orientation.initial_mode,
                config.orientation.initial_orientation,
            ),
            classifier: OrientationClassifier::new(config.orientation.thresholds),
            controller,
            session_events,
            sensor,
            readings: Some(readings),
            latest: None,
            diagnostic_interval: Duration::from_millis(config.orientation.diagnostic_interval_ms),
            disposed: false,
        })
    }

    pub fn arbiter(&self) -> &ModeArbiter {
        &self.arbiter
    }

    pub fn controller(&self) -> &RecordingController {
        &self.controller
    }

    pub fn session_state(&self) -> SessionState {
        self.controller.state()
    }

    pub fn latest_sample(&self) -> Option<SensorSample> {
        self.latest
    }

    /// Constraints a session started now would request.
    pub fn current_constraints(&self) -> CaptureConstraints {
        CaptureConstraints::for_orientation(self.arbiter.orientation())
    }

    /// Feed one sensor reading. Returns the new orientation if it changed.
    pub fn on_reading(&mut self, reading: SensorReading) -> Option<Orientation> {
        let sample = SensorSample::from(reading);
        self.latest = Some(sample);
        let decision = self.classifier.classify(&sample);
        let orientation = self.arbiter.feed_decision(decision)?;
        self.interrupt_session(StopReason::OrientationChanged);
        Some(orientation)
    }

    /// User mode selection.
    pub fn set_mode(&mut self, mode: Mode) -> bool {
        let changed = self.arbiter.set_mode(mode);
        if changed {
            self.interrupt_session(StopReason::ModeChanged);
        }
        changed
    }

    /// User orientation selection; ignored outside toggle mode.
    pub fn set_orientation(&mut self, orientation: Orientation) -> bool {
        let changed = self.arbiter.set_orientation(orientation);
        if changed {
            self.interrupt_session(StopReason::OrientationChanged);
        }
        let constraints = self.current_constraints();
        tracing::debug!(
            landscape = self.arbiter.is_landscape(),
            width = constraints.width.ideal,
            height = constraints.height.ideal,
            aspect_ratio = constraints.aspect_ratio,
            "Orientation selection applied"
        );
        changed
    }

    /// Start a session with the current orientation. No-op while one exists.
    pub fn start_recording(&mut self) -> Option<SessionId> {
        self.controller.start(self.arbiter.orientation())
    }

    pub fn stop_recording(&mut self) -> bool {
        self.controller.stop(StopReason::User)
    }

    /// Apply a command. Returns the session id if a session was requested.
    pub fn apply(&mut self, command: Command) -> Option<SessionId> {
        match command {
            Command::SetMode(mode) => {
                self.set_mode(mode);
                None
            }
            Command::SetOrientation(orientation) => {
                self.set_orientation(orientation);
                None
            }
            Command::StartRecording => self.start_recording(),
            Command::StopRecording => {
                self.stop_recording();
                None
            }
            Command::Shutdown => {
                self.controller.stop(StopReason::Shutdown);
                None
            }
        }
    }

    /// Wait for the next session completion and apply it.
    /// Returns `None` once the host has been disposed.
    pub async fn pump_session_event(&mut self) -> Option<TiltcamResult<SessionUpdate>> {
        let event = self.session_events.recv().await?;
        Some(self.controller.handle_event(event).await)
    }

    /// Diagnostic snapshot; only reported in auto mode.
    pub fn diagnostics(&self) -> Option<Diagnostics> {
        if self.arbiter.mode() != Mode::Auto {
            return None;
        }
        let sample = self.latest.unwrap_or_default();
        Some(Diagnostics {
            alpha: sample.alpha,
            beta: sample.beta,
            gamma: sample.gamma,
            orientation: self.arbiter.orientation(),
        })
    }

    /// Run until `Shutdown` (or the command channel closes), then dispose.
    pub async fn run(
        &mut self,
        mut commands: mpsc::Receiver<Command>,
    ) -> TiltcamResult<RunSummary> {
        if self.disposed {
            return Err(TiltcamError::sensor("host already disposed"));
        }

        let period = self.diagnostic_interval;
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        let mut summary = RunSummary::default();
        let mut shutdown_deadline: Option<Instant> = None;

        tracing::info!("Recorder host running");

        loop {
            tokio::select! {
                command = commands.recv(), if shutdown_deadline.is_none() => match command {
                    Some(Command::Shutdown) | None => {
                        tracing::info!("Shutdown requested");
                        self.apply(Command::Shutdown);
                        shutdown_deadline = Some(Instant::now() + SHUTDOWN_GRACE);
                    }
                    Some(command) => {
                        if let Some(session) = self.apply(command) {
                            summary.requested.push(session);
                        }
                    }
                },

                reading = next_reading(&mut self.readings) => match reading {
                    Some(reading) => {
                        self.on_reading(reading);
                    }
                    None => {
                        tracing::debug!("Sensor stream ended");
                        self.readings = None;
                    }
                },

                Some(event) = self.session_events.recv() => {
                    match self.controller.handle_event(event).await {
                        Ok(update) => summary.record(update),
                        Err(e) => {
                            tracing::warn!(error = %e, "Recording session failed");
                            summary.failures.push(e.to_string());
                        }
                    }
                }

                _ = ticker.tick() => self.report_diagnostics(),

                _ = async {
                    match shutdown_deadline {
                        Some(deadline) => tokio::time::sleep_until(deadline).await,
                        None => std::future::pending().await,
                    }
                } => {
                    tracing::warn!(
                        state = self.controller.state().name(),
                        "Recorder did not finish before shutdown deadline"
                    );
                    break;
                }
            }

            if shutdown_deadline.is_some() && self.controller.state().is_idle() {
                break;
            }
        }

        self.dispose();
        Ok(summary)
    }

    /// Deregister the sensor, tear down any session, and release streams
    /// still in flight. Safe to call more than once.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;

        self.sensor.unsubscribe();
        self.readings = None;
        self.controller.dispose();

        self.session_events.close();
        while let Ok(event) = self.session_events.try_recv() {
            event.release();
        }
        tracing::info!(source = self.sensor.name(), "Recorder host disposed");
    }

    fn interrupt_session(&mut self, reason: StopReason) {
        if !self.controller.state().is_idle() {
            self.controller.stop(reason);
        }
    }

    fn report_diagnostics(&self) {
        if let Some(d) = self.diagnostics() {
            tracing::info!(
                z = d.alpha,
                x = d.beta,
                y = d.gamma,
                orientation = %d.orientation,
                "Orientation diagnostics"
            );
        }
    }
}

impl Drop for RecorderHost {
    fn drop(&mut self) {
        self.dispose();
    }
}

async fn next_reading(
    readings: &mut Option<mpsc::UnboundedReceiver<SensorReading>>,
) -> Option<SensorReading> {
    match readings.as_mut() {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}
