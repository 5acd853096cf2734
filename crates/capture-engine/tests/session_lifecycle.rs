use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::mpsc;

use tiltcam_capture_engine::backend::{
    ActiveRecorder, GrantOutcome, MediaBackend, MediaStream, MemoryExportSink, RecorderEvents,
    RecorderOptions, RecorderSink, RecorderState, SimulatedDevices, SimulatedRecorder,
};
use tiltcam_capture_engine::constraints::{BASE_HEIGHT, BASE_WIDTH};
use tiltcam_capture_engine::{
    ExportOutcome, RecordingController, SessionEvent, SessionState, SessionUpdate, StopReason,
};
use tiltcam_common::config::RecordingDefaults;
use tiltcam_common::error::{TiltcamError, TiltcamResult};
use tiltcam_common::posture::Orientation;

struct Rig {
    controller: RecordingController,
    events: mpsc::UnboundedReceiver<SessionEvent>,
    devices: Arc<SimulatedDevices>,
    exporter: Arc<MemoryExportSink>,
}

impl Rig {
    fn new() -> Self {
        Self::with(
            SimulatedDevices::new(),
            Arc::new(SimulatedRecorder::new()),
            RecordingDefaults::default(),
        )
    }

    fn with(
        devices: SimulatedDevices,
        recorder: Arc<dyn RecorderSink>,
        settings: RecordingDefaults,
    ) -> Self {
        let devices = Arc::new(devices);
        let exporter = Arc::new(MemoryExportSink::new());
        let backend = MediaBackend::new(devices.clone(), recorder, exporter.clone());
        let (controller, events) = RecordingController::new(backend, settings);
        Self {
            controller,
            events,
            devices,
            exporter,
        }
    }

    async fn pump(&mut self) -> TiltcamResult<SessionUpdate> {
        let event = self.events.recv().await.expect("event channel open");
        self.controller.handle_event(event).await
    }

    /// Pump until the session finishes, returning the final update.
    async fn pump_until_finished(&mut self) -> SessionUpdate {
        loop {
            let update = self.pump().await.expect("session event applies");
            if matches!(update, SessionUpdate::Finished(_)) {
                return update;
            }
        }
    }
}

/// Recorder whose callbacks are fired by the test.
#[derive(Default)]
struct ManualRecorder {
    handles: Mutex<Vec<(RecorderEvents, Arc<Mutex<RecorderState>>)>>,
}

impl ManualRecorder {
    fn events(&self, index: usize) -> RecorderEvents {
        self.handles.lock().unwrap()[index].0.clone()
    }

    fn state(&self, index: usize) -> RecorderState {
        *self.handles.lock().unwrap()[index].1.lock().unwrap()
    }
}

struct ManualActive {
    state: Arc<Mutex<RecorderState>>,
}

impl RecorderSink for ManualRecorder {
    fn is_type_supported(&self, _mime_type: &str) -> bool {
        true
    }

    fn start(
        &self,
        _stream: Arc<dyn MediaStream>,
        _options: &RecorderOptions,
        events: RecorderEvents,
    ) -> TiltcamResult<Box<dyn ActiveRecorder>> {
        let state = Arc::new(Mutex::new(RecorderState::Recording));
        self.handles.lock().unwrap().push((events, state.clone()));
        Ok(Box::new(ManualActive { state }))
    }
}

impl ActiveRecorder for ManualActive {
    fn state(&self) -> RecorderState {
        *self.state.lock().unwrap()
    }

    fn stop(&mut self) {
        *self.state.lock().unwrap() = RecorderState::Inactive;
    }

    fn mime_type(&self) -> Option<&str> {
        None
    }
}

#[tokio::test]
async fn session_runs_from_idle_back_to_idle() {
    let mut rig = Rig::new();

    let session = rig.controller.start(Orientation::Landscape).unwrap();
    assert!(matches!(rig.controller.state(), SessionState::Acquiring { .. }));

    assert_eq!(rig.pump().await.unwrap(), SessionUpdate::Started(session));
    assert_eq!(
        rig.controller.state(),
        SessionState::Active {
            session,
            orientation: Orientation::Landscape
        }
    );
    assert!(rig.controller.preview_stream().is_some());

    let request = rig.devices.requests()[0];
    assert_eq!(request.video.width, BASE_WIDTH);
    assert_eq!(request.video.height, BASE_HEIGHT);
    assert!(request.audio);

    assert!(rig.controller.stop(StopReason::User));
    assert!(matches!(rig.controller.state(), SessionState::Finalizing { .. }));

    let SessionUpdate::Finished(finished) = rig.pump_until_finished().await else {
        unreachable!()
    };
    assert_eq!(&finished.artifact.data[..], b"chunk-0;");
    assert_eq!(
        finished.artifact.mime_type.as_deref(),
        Some("video/webm;codecs=vp9")
    );
    assert_eq!(finished.artifact.stop_reason, StopReason::User);
    assert_eq!(finished.export, ExportOutcome::Saved(None));

    assert!(rig.controller.state().is_idle());
    assert!(rig.controller.preview_stream().is_none());
    assert_eq!(rig.controller.buffered_chunks(), 0);
    assert_eq!(rig.exporter.artifacts().len(), 1);
    assert_eq!(rig.devices.granted_streams()[0].live_track_count(), 0);
}

#[tokio::test]
async fn start_while_busy_is_a_no_op() {
    let mut rig = Rig::new();

    assert!(rig.controller.start(Orientation::Landscape).is_some());
    assert!(rig.controller.start(Orientation::Portrait).is_none());

    rig.pump().await.unwrap();
    assert!(rig.controller.start(Orientation::Portrait).is_none());

    rig.controller.stop(StopReason::User);
    assert!(rig.controller.start(Orientation::Portrait).is_none());

    assert_eq!(rig.devices.requests().len(), 1);
}

#[tokio::test]
async fn stop_without_session_is_a_no_op() {
    let mut rig = Rig::new();
    assert!(!rig.controller.stop(StopReason::User));
    assert!(rig.controller.state().is_idle());
}

#[tokio::test]
async fn acquisition_failure_is_surfaced_and_controller_recovers() {
    let mut rig = Rig::with(
        SimulatedDevices::new().with_outcome(GrantOutcome::DenyPermission),
        Arc::new(SimulatedRecorder::new()),
        RecordingDefaults::default(),
    );

    rig.controller.start(Orientation::Portrait).unwrap();
    let err = rig.pump().await.unwrap_err();
    assert!(matches!(err, TiltcamError::PermissionDenied { .. }));
    assert!(rig.controller.state().is_idle());

    rig.devices.set_outcome(GrantOutcome::NoDevice);
    rig.controller.start(Orientation::Portrait).unwrap();
    let err = rig.pump().await.unwrap_err();
    assert!(err.is_acquisition_failure());

    rig.devices.set_outcome(GrantOutcome::Grant);
    let session = rig.controller.start(Orientation::Portrait).unwrap();
    assert_eq!(rig.pump().await.unwrap(), SessionUpdate::Started(session));
}

#[tokio::test(start_paused = true)]
async fn grant_arriving_after_teardown_is_released() {
    let mut rig = Rig::with(
        SimulatedDevices::new().with_latency(Duration::from_millis(100)),
        Arc::new(SimulatedRecorder::new()),
        RecordingDefaults::default(),
    );

    let abandoned = rig.controller.start(Orientation::Landscape).unwrap();
    assert!(rig.controller.stop(StopReason::OrientationChanged));
    assert!(rig.controller.state().is_idle());

    assert_eq!(rig.pump().await.unwrap(), SessionUpdate::Discarded(abandoned));
    let streams = rig.devices.granted_streams();
    assert_eq!(streams.len(), 1);
    assert_eq!(streams[0].live_track_count(), 0);
    assert!(rig.controller.state().is_idle());

    let next = rig.controller.start(Orientation::Portrait).unwrap();
    assert_ne!(next, abandoned);
    assert_eq!(rig.pump().await.unwrap(), SessionUpdate::Started(next));
}

#[tokio::test]
async fn failed_export_still_releases_tracks() {
    let mut rig = Rig::new();
    rig.exporter.fail_exports(true);

    rig.controller.start(Orientation::Landscape).unwrap();
    rig.pump().await.unwrap();
    rig.controller.stop(StopReason::User);

    let SessionUpdate::Finished(finished) = rig.pump_until_finished().await else {
        unreachable!()
    };
    assert!(matches!(finished.export, ExportOutcome::Failed(_)));
    assert!(rig.controller.state().is_idle());
    assert_eq!(rig.devices.granted_streams()[0].live_track_count(), 0);
    assert!(rig.exporter.artifacts().is_empty());
}

#[tokio::test]
async fn unsupported_codecs_fall_back_to_recorder_default() {
    let mut rig = Rig::with(
        SimulatedDevices::new(),
        Arc::new(SimulatedRecorder::with_supported(["video/mp4"])),
        RecordingDefaults::default(),
    );

    let session = rig.controller.start(Orientation::Landscape).unwrap();
    assert_eq!(rig.pump().await.unwrap(), SessionUpdate::Started(session));
    rig.controller.stop(StopReason::User);

    let SessionUpdate::Finished(finished) = rig.pump_until_finished().await else {
        unreachable!()
    };
    assert_eq!(finished.artifact.mime_type.as_deref(), Some("video/webm"));
}

#[tokio::test(start_paused = true)]
async fn timesliced_chunks_are_kept_in_arrival_order() {
    let settings = RecordingDefaults {
        timeslice_ms: Some(100),
        ..RecordingDefaults::default()
    };
    let mut rig = Rig::with(
        SimulatedDevices::new(),
        Arc::new(SimulatedRecorder::new()),
        settings,
    );

    rig.controller.start(Orientation::Portrait).unwrap();
    rig.pump().await.unwrap();

    tokio::time::sleep(Duration::from_millis(350)).await;
    rig.controller.stop(StopReason::User);

    let SessionUpdate::Finished(finished) = rig.pump_until_finished().await else {
        unreachable!()
    };
    assert_eq!(
        &finished.artifact.data[..],
        b"chunk-0;chunk-1;chunk-2;chunk-3;"
    );
    assert_eq!(finished.artifact.chunk_count, 4);
    assert_eq!(finished.artifact.orientation, Orientation::Portrait);
}

#[tokio::test]
async fn finalizing_waits_for_recorder_and_ignores_stray_events() {
    let recorder = Arc::new(ManualRecorder::default());
    let mut rig = Rig::with(
        SimulatedDevices::new(),
        recorder.clone(),
        RecordingDefaults::default(),
    );

    let session = rig.controller.start(Orientation::Landscape).unwrap();
    rig.pump().await.unwrap();
    let events = recorder.events(0);

    events.data(Bytes::from_static(b"a"));
    events.data(Bytes::new());
    assert_eq!(
        rig.pump().await.unwrap(),
        SessionUpdate::Buffered {
            session,
            chunks: 1
        }
    );
    assert_eq!(rig.pump().await.unwrap(), SessionUpdate::Ignored);

    assert!(rig.controller.stop(StopReason::User));
    assert_eq!(recorder.state(0), RecorderState::Inactive);
    // A second stop while finalizing does nothing.
    assert!(!rig.controller.stop(StopReason::User));
    assert!(matches!(rig.controller.state(), SessionState::Finalizing { .. }));

    events.data(Bytes::from_static(b"b"));
    events.stopped();
    let SessionUpdate::Finished(finished) = rig.pump_until_finished().await else {
        unreachable!()
    };
    assert_eq!(&finished.artifact.data[..], b"ab");
    // The recorder reports no mime type, so the requested one is kept.
    assert_eq!(
        finished.artifact.mime_type.as_deref(),
        Some("video/webm;codecs=vp9")
    );

    // Late callbacks from the finished session are dropped.
    events.data(Bytes::from_static(b"late"));
    events.stopped();
    assert_eq!(rig.pump().await.unwrap(), SessionUpdate::Ignored);
    assert_eq!(rig.pump().await.unwrap(), SessionUpdate::Ignored);
}

#[tokio::test]
async fn recorder_ending_on_its_own_still_finalizes() {
    let recorder = Arc::new(ManualRecorder::default());
    let mut rig = Rig::with(
        SimulatedDevices::new(),
        recorder.clone(),
        RecordingDefaults::default(),
    );

    rig.controller.start(Orientation::Landscape).unwrap();
    rig.pump().await.unwrap();
    recorder.events(0).stopped();

    let SessionUpdate::Finished(finished) = rig.pump_until_finished().await else {
        unreachable!()
    };
    assert_eq!(finished.artifact.stop_reason, StopReason::RecorderEnded);
    assert!(finished.artifact.is_empty());
    assert_eq!(rig.devices.granted_streams()[0].live_track_count(), 0);
}

#[tokio::test]
async fn dispose_releases_active_stream_without_export() {
    let mut rig = Rig::new();
    rig.controller.start(Orientation::Landscape).unwrap();
    rig.pump().await.unwrap();

    rig.controller.dispose();
    assert!(rig.controller.state().is_idle());
    assert_eq!(rig.devices.granted_streams()[0].live_track_count(), 0);
    assert!(rig.exporter.artifacts().is_empty());
}
