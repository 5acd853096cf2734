//! TiltCam Orientation
//!
//! Turns device tilt into a published capture orientation:
//! - **Sensor:** raw readings normalized into integer-degree samples
//! - **Classifier:** hysteresis banding from a sample to a decision
//! - **Arbiter:** auto/toggle authority over the published orientation
//! - **Sources:** sensor subscriptions (live channel feed, timed replay)
//!
//! The classifier is pure computation. Only the arbiter owns state, and it
//! publishes orientation and mode through `tokio::sync::watch` channels.

pub mod arbiter;
pub mod classifier;
pub mod sensor;
pub mod source;

pub use arbiter::ModeArbiter;
pub use classifier::{Decision, OrientationClassifier};
pub use sensor::{SensorReading, SensorSample};
pub use source::{ChannelSource, ReplaySource, SensorFeed, SensorSource, TimedReading};
pub use tiltcam_common::posture::{Mode, Orientation, Thresholds};
