//! In-process media backend.
//!
//! Stands in for a real camera: grants (or refuses) streams whose tracks
//! honour the requested ideal resolution, and records them into small
//! labelled chunks. Used by the CLI replay command and by tests.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use tokio::task::JoinHandle;

use tiltcam_common::error::{TiltcamError, TiltcamResult};

use super::{
    ActiveRecorder, ExportSink, MediaDevices, MediaRequest, MediaStream, RecorderEvents,
    RecorderOptions, RecorderSink, RecorderState, TrackCapabilities, TrackInfo, TrackKind,
    TrackSettings,
};
use crate::codec::normalize_mime;
use crate::export::RecordingArtifact;

/// How [`SimulatedDevices`] answers a stream request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GrantOutcome {
    #[default]
    Grant,
    DenyPermission,
    NoDevice,
}

/// Fake camera and microphone.
pub struct SimulatedDevices {
    outcome: Mutex<GrantOutcome>,
    latency: Duration,
    requests: Mutex<Vec<MediaRequest>>,
    granted: Mutex<Vec<Arc<SimulatedStream>>>,
    next_id: AtomicU64,
}

impl SimulatedDevices {
    pub fn new() -> Self {
        Self {
            outcome: Mutex::new(GrantOutcome::Grant),
            latency: Duration::ZERO,
            requests: Mutex::new(Vec::new()),
            granted: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn with_outcome(self, outcome: GrantOutcome) -> Self {
        self.set_outcome(outcome);
        self
    }

    /// Delay every grant, simulating the permission prompt.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn set_outcome(&self, outcome: GrantOutcome) {
        *lock(&self.outcome) = outcome;
    }

    /// Every request received so far, in order.
    pub fn requests(&self) -> Vec<MediaRequest> {
        lock(&self.requests).clone()
    }

    /// Every stream granted so far, in order.
    pub fn granted_streams(&self) -> Vec<Arc<SimulatedStream>> {
        lock(&self.granted).clone()
    }
}

impl Default for SimulatedDevices {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl MediaDevices for SimulatedDevices {
    async fn get_user_media(&self, request: MediaRequest) -> TiltcamResult<Arc<dyn MediaStream>> {
        lock(&self.requests).push(request);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let outcome = *lock(&self.outcome);
        match outcome {
            GrantOutcome::DenyPermission => {
                return Err(TiltcamError::permission_denied(
                    "camera access was refused",
                ))
            }
            GrantOutcome::NoDevice => {
                return Err(TiltcamError::device_unavailable(
                    "no camera satisfies the requested constraints",
                ))
            }
            GrantOutcome::Grant => {}
        }

        let id = format!("sim-stream-{}", self.next_id.fetch_add(1, Ordering::SeqCst));
        let stream = Arc::new(SimulatedStream::negotiate(id, &request));
        lock(&self.granted).push(stream.clone());
        Ok(stream)
    }
}

/// A granted fake stream. Tracks stay live until stopped.
pub struct SimulatedStream {
    id: String,
    tracks: Vec<(TrackInfo, AtomicBool)>,
}

impl SimulatedStream {
    fn negotiate(id: String, request: &MediaRequest) -> Self {
        let video = TrackInfo {
            kind: TrackKind::Video,
            label: "simulated rear camera".to_string(),
            settings: TrackSettings {
                width: Some(request.video.width.ideal),
                height: Some(request.video.height.ideal),
            },
            capabilities: Some(TrackCapabilities {
                width: (480, 1920),
                height: (480, 1920),
            }),
        };
        let mut tracks = vec![(video, AtomicBool::new(true))];
        if request.audio {
            let audio = TrackInfo {
                kind: TrackKind::Audio,
                label: "simulated microphone".to_string(),
                settings: TrackSettings::default(),
                capabilities: None,
            };
            tracks.push((audio, AtomicBool::new(true)));
        }
        Self { id, tracks }
    }

    pub fn live_track_count(&self) -> usize {
        self.tracks
            .iter()
            .filter(|(_, live)| live.load(Ordering::SeqCst))
            .count()
    }

    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }
}

impl MediaStream for SimulatedStream {
    fn id(&self) -> &str {
        &self.id
    }

    fn tracks(&self) -> Vec<TrackInfo> {
        self.tracks.iter().map(|(info, _)| info.clone()).collect()
    }

    fn stop_all_tracks(&self) {
        for (_, live) in &self.tracks {
            live.store(false, Ordering::SeqCst);
        }
    }

    fn is_active(&self) -> bool {
        self.live_track_count() > 0
    }
}

/// Fake recorder producing labelled chunks.
pub struct SimulatedRecorder {
    supported: Vec<String>,
    started: AtomicU64,
}

impl SimulatedRecorder {
    /// A recorder supporting both webm codecs.
    pub fn new() -> Self {
        Self::with_supported(["video/webm;codecs=vp9", "video/webm;codecs=vp8"])
    }

    pub fn with_supported<I, S>(supported: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            supported: supported
                .into_iter()
                .map(|m| normalize_mime(m.as_ref()))
                .collect(),
            started: AtomicU64::new(0),
        }
    }

    /// Number of recorders started so far.
    pub fn started_count(&self) -> u64 {
        self.started.load(Ordering::SeqCst)
    }
}

impl Default for SimulatedRecorder {
    fn default() -> Self {
        Self::new()
    }
}

impl RecorderSink for SimulatedRecorder {
    fn is_type_supported(&self, mime_type: &str) -> bool {
        self.supported.contains(&normalize_mime(mime_type))
    }

    fn start(
        &self,
        stream: Arc<dyn MediaStream>,
        options: &RecorderOptions,
        events: RecorderEvents,
    ) -> TiltcamResult<Box<dyn ActiveRecorder>> {
        if !stream.is_active() {
            return Err(TiltcamError::recorder(format!(
                "stream {} has no live tracks",
                stream.id()
            )));
        }
        self.started.fetch_add(1, Ordering::SeqCst);

        let recording = Arc::new(AtomicBool::new(true));
        let sequence = Arc::new(AtomicU64::new(0));

        let ticker = options.timeslice_ms.map(|ms| {
            let events = events.clone();
            let recording = recording.clone();
            let sequence = sequence.clone();
            tokio::spawn(async move {
                let period = Duration::from_millis(ms);
                let mut interval =
                    tokio::time::interval_at(tokio::time::Instant::now() + period, period);
                loop {
                    interval.tick().await;
                    if !recording.load(Ordering::SeqCst) {
                        break;
                    }
                    events.data(chunk_payload(sequence.fetch_add(1, Ordering::SeqCst)));
                }
            })
        });

        tracing::debug!(
            stream = %stream.id(),
            mime_type = ?options.mime_type,
            bits_per_second = options.video_bits_per_second,
            "Simulated recorder started"
        );

        Ok(Box::new(SimulatedActiveRecorder {
            events,
            recording,
            sequence,
            ticker,
            mime_type: options
                .mime_type
                .clone()
                .or_else(|| Some("video/webm".to_string())),
        }))
    }
}

struct SimulatedActiveRecorder {
    events: RecorderEvents,
    recording: Arc<AtomicBool>,
    sequence: Arc<AtomicU64>,
    ticker: Option<JoinHandle<()>>,
    mime_type: Option<String>,
}

impl ActiveRecorder for SimulatedActiveRecorder {
    fn state(&self) -> RecorderState {
        if self.recording.load(Ordering::SeqCst) {
            RecorderState::Recording
        } else {
            RecorderState::Inactive
        }
    }

    fn stop(&mut self) {
        if !self.recording.swap(false, Ordering::SeqCst) {
            return;
        }
        if let Some(ticker) = self.ticker.take() {
            ticker.abort();
        }
        // Final flush, then the terminal notification.
        self.events
            .data(chunk_payload(self.sequence.fetch_add(1, Ordering::SeqCst)));
        self.events.stopped();
    }

    fn mime_type(&self) -> Option<&str> {
        self.mime_type.as_deref()
    }
}

impl Drop for SimulatedActiveRecorder {
    fn drop(&mut self) {
        self.recording.store(false, Ordering::SeqCst);
        if let Some(ticker) = self.ticker.take() {
            ticker.abort();
        }
    }
}

fn chunk_payload(sequence: u64) -> Bytes {
    Bytes::from(format!("chunk-{sequence};"))
}

/// Export sink that keeps artifacts in memory.
#[derive(Default)]
pub struct MemoryExportSink {
    artifacts: Mutex<Vec<RecordingArtifact>>,
    fail: AtomicBool,
}

impl MemoryExportSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent export fail.
    pub fn fail_exports(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn artifacts(&self) -> Vec<RecordingArtifact> {
        lock(&self.artifacts).clone()
    }
}

#[async_trait::async_trait]
impl ExportSink for MemoryExportSink {
    async fn export(&self, artifact: &RecordingArtifact) -> TiltcamResult<Option<PathBuf>> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(TiltcamError::export("memory sink configured to fail"));
        }
        lock(&self.artifacts).push(artifact.clone());
        Ok(None)
    }
}

/// Lock a mutex, recovering the data if a holder panicked.
fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraints::CaptureConstraints;
    use tiltcam_common::posture::Orientation;

    fn request(orientation: Orientation, audio: bool) -> MediaRequest {
        MediaRequest {
            video: CaptureConstraints::for_orientation(orientation),
            audio,
        }
    }

    #[tokio::test]
    async fn granted_stream_honours_ideal_resolution() {
        let devices = SimulatedDevices::new();
        let stream = devices
            .get_user_media(request(Orientation::Portrait, true))
            .await
            .unwrap();

        let video = stream.video_tracks();
        assert_eq!(video.len(), 1);
        assert_eq!(video[0].settings.width, Some(1080));
        assert_eq!(video[0].settings.height, Some(1920));
        assert_eq!(stream.tracks().len(), 2);
    }

    #[tokio::test]
    async fn refusal_maps_to_acquisition_errors() {
        let devices = SimulatedDevices::new().with_outcome(GrantOutcome::DenyPermission);
        let err = devices
            .get_user_media(request(Orientation::Landscape, true))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, TiltcamError::PermissionDenied { .. }));

        devices.set_outcome(GrantOutcome::NoDevice);
        let err = devices
            .get_user_media(request(Orientation::Landscape, false))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, TiltcamError::DeviceUnavailable { .. }));
        assert_eq!(devices.requests().len(), 2);
        assert!(devices.granted_streams().is_empty());
    }

    #[test]
    fn stopping_tracks_is_idempotent() {
        let stream = SimulatedStream::negotiate("s".into(), &request(Orientation::Landscape, true));
        assert_eq!(stream.live_track_count(), 2);
        stream.stop_all_tracks();
        stream.stop_all_tracks();
        assert_eq!(stream.live_track_count(), 0);
        assert!(!stream.is_active());
    }

    #[test]
    fn support_check_ignores_spacing_and_case() {
        let recorder = SimulatedRecorder::new();
        assert!(recorder.is_type_supported("video/webm; codecs=VP9"));
        assert!(!recorder.is_type_supported("video/mp4"));
    }
}
