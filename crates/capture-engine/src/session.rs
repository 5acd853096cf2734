//! Recording session management.
//!
//! A [`RecordingController`] runs at most one session at a time:
//!
//! ```text
//! Idle ──start──▶ Acquiring ──stream──▶ Active ──stop──▶ Finalizing ──flushed──▶ Idle
//!                     │                                               (export, release)
//!                     └──stop / failure──▶ Idle
//! ```
//!
//! Both suspension points (stream acquisition and recorder flush) complete
//! through [`SessionEvent`]s on the controller's channel, so orientation or
//! mode changes can land while either is outstanding. Every event carries
//! the [`SessionId`] it belongs to; events for a session that is no longer
//! current are dropped, and any stream they carry is released.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::mpsc;

use tiltcam_common::clock::RecordingClock;
use tiltcam_common::config::RecordingDefaults;
use tiltcam_common::error::TiltcamResult;
use tiltcam_common::posture::Orientation;

use crate::backend::{
    ActiveRecorder, MediaBackend, MediaRequest, MediaStream, RecorderEvents, RecorderOptions,
    RecorderState,
};
use crate::codec::select_codec;
use crate::constraints::CaptureConstraints;
use crate::export::RecordingArtifact;

/// Identifier of one recording session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(u64);

impl SessionId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// State of the recording controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    /// No session.
    #[default]
    Idle,
    /// Waiting for the camera/microphone grant.
    Acquiring {
        session: SessionId,
        orientation: Orientation,
    },
    /// Recorder running, chunks buffering.
    Active {
        session: SessionId,
        orientation: Orientation,
    },
    /// Recorder asked to stop, waiting for its final flush.
    Finalizing {
        session: SessionId,
        orientation: Orientation,
    },
}

impl SessionState {
    pub fn session(&self) -> Option<SessionId> {
        match *self {
            SessionState::Idle => None,
            SessionState::Acquiring { session, .. }
            | SessionState::Active { session, .. }
            | SessionState::Finalizing { session, .. } => Some(session),
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, SessionState::Idle)
    }

    /// Active or finalizing: a recorder exists for this session.
    pub fn is_recording(&self) -> bool {
        matches!(
            self,
            SessionState::Active { .. } | SessionState::Finalizing { .. }
        )
    }

    pub fn name(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::Acquiring { .. } => "acquiring",
            SessionState::Active { .. } => "active",
            SessionState::Finalizing { .. } => "finalizing",
        }
    }
}

/// Why a session was stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Explicit stop request.
    User,
    /// The published orientation changed mid-session.
    OrientationChanged,
    /// The orientation mode changed mid-session.
    ModeChanged,
    /// The recorder stopped on its own.
    RecorderEnded,
    /// The host is shutting down.
    Shutdown,
}

/// Asynchronous completions delivered to the controller.
pub enum SessionEvent {
    /// Stream acquisition finished.
    StreamReady {
        session: SessionId,
        result: TiltcamResult<Arc<dyn MediaStream>>,
    },
    /// The recorder produced a chunk.
    Data { session: SessionId, chunk: Bytes },
    /// The recorder flushed and stopped.
    RecorderStopped { session: SessionId },
}

impl SessionEvent {
    pub fn session(&self) -> SessionId {
        match self {
            SessionEvent::StreamReady { session, .. }
            | SessionEvent::Data { session, .. }
            | SessionEvent::RecorderStopped { session } => *session,
        }
    }

    /// Release anything this event owns without applying it.
    pub fn release(self) {
        if let SessionEvent::StreamReady {
            session,
            result: Ok(stream),
        } = self
        {
            tracing::info!(%session, stream = %stream.id(), "Releasing undelivered stream");
            stream.stop_all_tracks();
        }
    }
}

/// Outcome of exporting a finished session.
#[derive(Debug, Clone, PartialEq)]
pub enum ExportOutcome {
    /// Saved; carries the file path for file-backed sinks.
    Saved(Option<PathBuf>),
    /// The sink failed. Resources were released regardless.
    Failed(String),
}

/// A session that reached Idle through finalization.
#[derive(Debug, Clone, PartialEq)]
pub struct FinishedSession {
    pub artifact: RecordingArtifact,
    pub export: ExportOutcome,
}

/// What handling one [`SessionEvent`] did.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionUpdate {
    /// The event belonged to no current session.
    Ignored,
    /// A stream arrived after its session was torn down and was released.
    Discarded(SessionId),
    /// Stream granted and recorder running.
    Started(SessionId),
    /// A chunk was appended.
    Buffered { session: SessionId, chunks: usize },
    /// The session was finalized and its resources released.
    Finished(FinishedSession),
}

/// Owner of the recording lifecycle and its stream/recorder pair.
pub struct RecordingController {
    backend: MediaBackend,
    settings: RecordingDefaults,
    events_tx: mpsc::UnboundedSender<SessionEvent>,
    state: SessionState,
    next_session: u64,
    stream: Option<Arc<dyn MediaStream>>,
    recorder: Option<Box<dyn ActiveRecorder>>,
    chunks: Vec<Bytes>,
    clock: Option<RecordingClock>,
    mime_type: Option<String>,
    stop_reason: Option<StopReason>,
}

impl RecordingController {
    /// Create a controller and the receiver its completions arrive on.
    /// The caller must feed every received event to [`handle_event`].
    ///
    /// [`handle_event`]: RecordingController::handle_event
    pub fn new(
        backend: MediaBackend,
        settings: RecordingDefaults,
    ) -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let controller = Self {
            backend,
            settings,
            events_tx,
            state: SessionState::Idle,
            next_session: 1,
            stream: None,
            recorder: None,
            chunks: Vec::new(),
            clock: None,
            mime_type: None,
            stop_reason: None,
        };
        (controller, events_rx)
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// The live stream, for preview rendering only.
    pub fn preview_stream(&self) -> Option<Arc<dyn MediaStream>> {
        self.stream.clone()
    }

    /// Chunks buffered for the current session.
    pub fn buffered_chunks(&self) -> usize {
        self.chunks.len()
    }

    /// Seconds since the current recorder started.
    pub fn elapsed_secs(&self) -> f64 {
        self.clock.as_ref().map(|c| c.elapsed_secs()).unwrap_or(0.0)
    }

    /// Begin a session for `orientation`.
    ///
    /// Returns `None` without side effects unless the controller is idle.
    /// Must be called inside a Tokio runtime: acquisition runs as a task
    /// and reports back with [`SessionEvent::StreamReady`].
    pub fn start(&mut self, orientation: Orientation) -> Option<SessionId> {
        if !self.state.is_idle() {
            tracing::debug!(state = self.state.name(), "Ignoring start, session in progress");
            return None;
        }

        let session = SessionId(self.next_session);
        self.next_session += 1;

        let constraints = CaptureConstraints::for_orientation(orientation);
        log_dimensions(orientation, &constraints);

        let request = MediaRequest {
            video: constraints,
            audio: self.settings.capture_audio,
        };
        let devices = self.backend.devices.clone();
        let tx = self.events_tx.clone();
        tokio::spawn(async move {
            let result = devices.get_user_media(request).await;
            if let Err(mpsc::error::SendError(event)) =
                tx.send(SessionEvent::StreamReady { session, result })
            {
                // Controller is gone; nobody else will release this grant.
                event.release();
            }
        });

        tracing::info!(%session, %orientation, "Acquiring media stream");
        self.state = SessionState::Acquiring {
            session,
            orientation,
        };
        Some(session)
    }

    /// Stop the current session.
    ///
    /// Idle and finalizing controllers ignore the request. An acquiring
    /// session is abandoned immediately; its stream is released when the
    /// grant eventually arrives. Returns `true` if anything was stopped.
    pub fn stop(&mut self, reason: StopReason) -> bool {
        match self.state {
            SessionState::Idle | SessionState::Finalizing { .. } => {
                tracing::debug!(state = self.state.name(), ?reason, "Nothing to stop");
                false
            }
            SessionState::Acquiring { session, .. } => {
                tracing::info!(%session, ?reason, "Abandoning stream acquisition");
                self.state = SessionState::Idle;
                true
            }
            SessionState::Active {
                session,
                orientation,
            } => {
                tracing::info!(%session, ?reason, "Stopping recorder");
                self.stop_reason = Some(reason);
                if let Some(recorder) = self.recorder.as_mut() {
                    if recorder.state() != RecorderState::Inactive {
                        recorder.stop();
                    }
                }
                self.state = SessionState::Finalizing {
                    session,
                    orientation,
                };
                true
            }
        }
    }

    /// Apply one completion. Acquisition and recorder-start failures for
    /// the current session are returned as errors after the controller
    /// has gone back to idle.
    pub async fn handle_event(&mut self, event: SessionEvent) -> TiltcamResult<SessionUpdate> {
        match event {
            SessionEvent::StreamReady { session, result } => self.on_stream_ready(session, result),
            SessionEvent::Data { session, chunk } => Ok(self.on_data(session, chunk)),
            SessionEvent::RecorderStopped { session } => {
                Ok(self.on_recorder_stopped(session).await)
            }
        }
    }

    /// Tear everything down immediately. Buffered chunks are dropped
    /// without export.
    pub fn dispose(&mut self) {
        if let Some(session) = self.state.session() {
            tracing::info!(%session, state = self.state.name(), "Disposing recording session");
        }
        if let Some(mut recorder) = self.recorder.take() {
            if recorder.state() != RecorderState::Inactive {
                recorder.stop();
            }
        }
        self.reset();
    }

    fn on_stream_ready(
        &mut self,
        session: SessionId,
        result: TiltcamResult<Arc<dyn MediaStream>>,
    ) -> TiltcamResult<SessionUpdate> {
        let orientation = match self.state {
            SessionState::Acquiring {
                session: current,
                orientation,
            } if current == session => orientation,
            _ => {
                return Ok(match result {
                    Ok(stream) => {
                        tracing::info!(
                            %session,
                            stream = %stream.id(),
                            "Releasing stream granted after cancellation"
                        );
                        stream.stop_all_tracks();
                        SessionUpdate::Discarded(session)
                    }
                    Err(e) => {
                        tracing::debug!(
                            %session,
                            error = %e,
                            "Ignoring failure of abandoned acquisition"
                        );
                        SessionUpdate::Ignored
                    }
                });
            }
        };

        let stream = match result {
            Ok(stream) => stream,
            Err(e) => {
                tracing::warn!(%session, error = %e, "Media stream acquisition failed");
                self.state = SessionState::Idle;
                return Err(e);
            }
        };

        log_track_diagnostics(stream.as_ref());

        let options = RecorderOptions {
            mime_type: select_codec(
                self.backend.recorder.as_ref(),
                &self.settings.preferred_codecs,
            ),
            video_bits_per_second: self.settings.video_bits_per_second,
            timeslice_ms: self.settings.timeslice_ms,
        };
        let events = RecorderEvents::new(session, self.events_tx.clone());

        let recorder = match self.backend.recorder.start(stream.clone(), &options, events) {
            Ok(recorder) => recorder,
            Err(e) => {
                tracing::warn!(%session, error = %e, "Recorder failed to start");
                stream.stop_all_tracks();
                self.state = SessionState::Idle;
                return Err(e);
            }
        };

        self.mime_type = recorder
            .mime_type()
            .map(str::to_string)
            .or(options.mime_type);
        self.recorder = Some(recorder);
        self.stream = Some(stream);
        self.chunks.clear();
        self.clock = Some(RecordingClock::start());
        self.stop_reason = None;
        self.state = SessionState::Active {
            session,
            orientation,
        };

        tracing::info!(
            %session,
            %orientation,
            mime_type = ?self.mime_type,
            bits_per_second = self.settings.video_bits_per_second,
            "Recording started"
        );
        Ok(SessionUpdate::Started(session))
    }

    fn on_data(&mut self, session: SessionId, chunk: Bytes) -> SessionUpdate {
        if !self.state.is_recording() || self.state.session() != Some(session) {
            tracing::debug!(%session, "Dropping chunk for inactive session");
            return SessionUpdate::Ignored;
        }
        if chunk.is_empty() {
            return SessionUpdate::Ignored;
        }
        self.chunks.push(chunk);
        SessionUpdate::Buffered {
            session,
            chunks: self.chunks.len(),
        }
    }

    async fn on_recorder_stopped(&mut self, session: SessionId) -> SessionUpdate {
        let orientation = match self.state {
            SessionState::Active {
                session: current,
                orientation,
            }
            | SessionState::Finalizing {
                session: current,
                orientation,
            } if current == session => orientation,
            _ => return SessionUpdate::Ignored,
        };

        // A recorder that stops without being asked still finalizes.
        let reason = self.stop_reason.unwrap_or(StopReason::RecorderEnded);
        self.state = SessionState::Finalizing {
            session,
            orientation,
        };

        let artifact = RecordingArtifact::assemble(
            session,
            orientation,
            self.mime_type.clone(),
            &self.chunks,
            self.clock.as_ref(),
            reason,
        );
        tracing::info!(
            %session,
            bytes = artifact.len(),
            chunks = artifact.chunk_count,
            duration_secs = artifact.duration_secs(),
            ?reason,
            "Recording finalized"
        );

        let export = match self.backend.exporter.export(&artifact).await {
            Ok(path) => ExportOutcome::Saved(path),
            Err(e) => {
                tracing::warn!(%session, error = %e, "Export failed, releasing resources anyway");
                ExportOutcome::Failed(e.to_string())
            }
        };

        self.reset();
        SessionUpdate::Finished(FinishedSession { artifact, export })
    }

    /// Clear the buffer, stop every track, and return to idle.
    fn reset(&mut self) {
        self.recorder = None;
        self.chunks.clear();
        if let Some(stream) = self.stream.take() {
            stream.stop_all_tracks();
        }
        self.clock = None;
        self.mime_type = None;
        self.stop_reason = None;
        self.state = SessionState::Idle;
    }
}

impl Drop for RecordingController {
    fn drop(&mut self) {
        if !self.state.is_idle() {
            self.dispose();
        }
    }
}

fn log_dimensions(orientation: Orientation, constraints: &CaptureConstraints) {
    tracing::info!(
        landscape = orientation.is_landscape(),
        width = constraints.width.ideal,
        height = constraints.height.ideal,
        aspect_ratio = constraints.aspect_ratio,
        "Capture dimensions"
    );
}

fn log_track_diagnostics(stream: &dyn MediaStream) {
    if let Some(track) = stream.video_tracks().first() {
        tracing::info!(
            stream = %stream.id(),
            width = ?track.settings.width,
            height = ?track.settings.height,
            "Actual video resolution"
        );
        if let Some(caps) = track.capabilities {
            tracing::debug!(
                width = ?caps.width,
                height = ?caps.height,
                "Supported resolutions"
            );
        }
    }
}

