//! TiltCam Common Utilities
//!
//! Shared infrastructure for all TiltCam crates:
//! - Error types and result aliases
//! - Capture posture types (orientation, mode, hysteresis thresholds)
//! - Recording clock
//! - Tracing/logging initialization
//! - Configuration loading

pub mod clock;
pub mod config;
pub mod error;
pub mod logging;
pub mod posture;

pub use clock::*;
pub use config::*;
pub use error::*;
pub use posture::*;
