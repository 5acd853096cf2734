//! TiltCam Capture Engine
//!
//! Turns the published orientation into camera requests and runs one
//! recording session at a time against a pluggable media backend.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                    RecorderHost                      │
//! │  sensor ─▶ Classifier ─▶ ModeArbiter ◀─ user toggles │
//! │                              │                       │
//! │                              ▼ orientation           │
//! │                     CaptureConstraints               │
//! │                              │                       │
//! │                              ▼                       │
//! │  ┌────────────────────────────────────────────────┐  │
//! │  │            RecordingController                 │  │
//! │  │ Idle ─▶ Acquiring ─▶ Active ─▶ Finalizing ─▶ Idle │
//! │  └──────┬─────────────┬──────────────┬────────────┘  │
//! │         ▼             ▼              ▼               │
//! │   MediaDevices   RecorderSink    ExportSink          │
//! └──────────────────────────────────────────────────────┘
//! ```

pub mod backend;
pub mod codec;
pub mod constraints;
pub mod export;
pub mod host;
pub mod session;

pub use backend::MediaBackend;
pub use constraints::{CaptureConstraints, ConstrainRange, FacingMode};
pub use export::{FileExportSink, RecordingArtifact};
pub use host::{Command, Diagnostics, RecorderHost, RunSummary};
pub use session::*;
