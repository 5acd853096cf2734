//! Media backend contracts.
//!
//! The controller never talks to a camera directly. It asks a
//! [`MediaDevices`] for a stream, hands that stream to a [`RecorderSink`],
//! and passes the finished recording to an [`ExportSink`]. Recorders report
//! back asynchronously through [`RecorderEvents`].

use std::path::PathBuf;
use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::mpsc;

use tiltcam_common::error::TiltcamResult;

use crate::constraints::CaptureConstraints;
use crate::export::RecordingArtifact;
use crate::session::{SessionEvent, SessionId};

pub mod simulated;

pub use simulated::{GrantOutcome, MemoryExportSink, SimulatedDevices, SimulatedRecorder};

/// Kind of media carried by a track.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackKind {
    Video,
    Audio,
}

/// Values the device actually negotiated for a track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TrackSettings {
    pub width: Option<u32>,
    pub height: Option<u32>,
}

/// Resolution ranges a video track could deliver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackCapabilities {
    pub width: (u32, u32),
    pub height: (u32, u32),
}

/// Description of one track in a stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackInfo {
    pub kind: TrackKind,
    pub label: String,
    pub settings: TrackSettings,
    pub capabilities: Option<TrackCapabilities>,
}

/// A stream request: video constraints plus an audio flag.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MediaRequest {
    pub video: CaptureConstraints,
    pub audio: bool,
}

/// A granted camera/microphone stream.
pub trait MediaStream: Send + Sync {
    fn id(&self) -> &str;

    fn tracks(&self) -> Vec<TrackInfo>;

    fn video_tracks(&self) -> Vec<TrackInfo> {
        self.tracks()
            .into_iter()
            .filter(|t| t.kind == TrackKind::Video)
            .collect()
    }

    /// Stop every track, releasing the devices. Idempotent.
    fn stop_all_tracks(&self);

    /// Whether any track is still live.
    fn is_active(&self) -> bool;
}

/// Platform camera/microphone access.
#[async_trait::async_trait]
pub trait MediaDevices: Send + Sync {
    /// Request a stream. Fails with `PermissionDenied` or
    /// `DeviceUnavailable`.
    async fn get_user_media(&self, request: MediaRequest) -> TiltcamResult<Arc<dyn MediaStream>>;
}

/// Options handed to a recorder at start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecorderOptions {
    /// `None` lets the recorder pick its default.
    pub mime_type: Option<String>,
    pub video_bits_per_second: u32,
    pub timeslice_ms: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecorderState {
    Inactive,
    Recording,
}

/// Factory for recorders.
pub trait RecorderSink: Send + Sync {
    fn is_type_supported(&self, mime_type: &str) -> bool;

    /// Begin recording `stream`. Chunks and the terminal stop notification
    /// are delivered through `events`.
    fn start(
        &self,
        stream: Arc<dyn MediaStream>,
        options: &RecorderOptions,
        events: RecorderEvents,
    ) -> TiltcamResult<Box<dyn ActiveRecorder>>;
}

/// A running recorder.
pub trait ActiveRecorder: Send {
    fn state(&self) -> RecorderState;

    /// Request a flush and stop. Completion is signalled later through
    /// [`RecorderEvents::stopped`]; calling this when inactive does nothing.
    fn stop(&mut self);

    /// Mime type the recorder is actually producing.
    fn mime_type(&self) -> Option<&str>;
}

/// Callback handle given to a recorder, tagged with its session.
#[derive(Debug, Clone)]
pub struct RecorderEvents {
    session: SessionId,
    tx: mpsc::UnboundedSender<SessionEvent>,
}

impl RecorderEvents {
    pub(crate) fn new(session: SessionId, tx: mpsc::UnboundedSender<SessionEvent>) -> Self {
        Self { session, tx }
    }

    pub fn session(&self) -> SessionId {
        self.session
    }

    /// Deliver a chunk of encoded data.
    pub fn data(&self, chunk: Bytes) {
        let _ = self.tx.send(SessionEvent::Data {
            session: self.session,
            chunk,
        });
    }

    /// Signal that the recorder has flushed its last chunk and stopped.
    pub fn stopped(&self) {
        let _ = self.tx.send(SessionEvent::RecorderStopped {
            session: self.session,
        });
    }
}

/// Destination for finished recordings.
#[async_trait::async_trait]
pub trait ExportSink: Send + Sync {
    /// Save the artifact. Returns where it landed, if it is a file.
    async fn export(&self, artifact: &RecordingArtifact) -> TiltcamResult<Option<PathBuf>>;
}

/// The three collaborators a recording session needs.
#[derive(Clone)]
pub struct MediaBackend {
    pub devices: Arc<dyn MediaDevices>,
    pub recorder: Arc<dyn RecorderSink>,
    pub exporter: Arc<dyn ExportSink>,
}

impl MediaBackend {
    pub fn new(
        devices: Arc<dyn MediaDevices>,
        recorder: Arc<dyn RecorderSink>,
        exporter: Arc<dyn ExportSink>,
    ) -> Self {
        Self {
            devices,
            recorder,
            exporter,
        }
    }
}
