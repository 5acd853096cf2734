//! Sensor sources.
//!
//! A host registers one subscription with its source at construction and
//! deregisters it on shutdown. Readings arrive on an unbounded channel at
//! whatever rate the platform delivers them.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use tiltcam_common::error::{TiltcamError, TiltcamResult};

use crate::sensor::SensorReading;

/// Trait for device-orientation sources.
pub trait SensorSource: Send {
    /// Source name for logging.
    fn name(&self) -> &str;

    /// Register the subscription. A source hands out one receiver only.
    fn subscribe(&mut self) -> TiltcamResult<mpsc::UnboundedReceiver<SensorReading>>;

    /// Deregister. No readings are delivered afterwards.
    fn unsubscribe(&mut self);

    /// Whether a subscription is currently registered.
    fn is_subscribed(&self) -> bool;
}

/// A source fed by hand through a [`SensorFeed`] handle.
pub struct ChannelSource {
    rx: Option<mpsc::UnboundedReceiver<SensorReading>>,
    active: Arc<AtomicBool>,
}

/// Push side of a [`ChannelSource`].
#[derive(Clone)]
pub struct SensorFeed {
    tx: mpsc::UnboundedSender<SensorReading>,
    active: Arc<AtomicBool>,
}

impl ChannelSource {
    pub fn new() -> (Self, SensorFeed) {
        let (tx, rx) = mpsc::unbounded_channel();
        let active = Arc::new(AtomicBool::new(false));
        (
            Self {
                rx: Some(rx),
                active: active.clone(),
            },
            SensorFeed { tx, active },
        )
    }
}

impl SensorSource for ChannelSource {
    fn name(&self) -> &str {
        "channel"
    }

    fn subscribe(&mut self) -> TiltcamResult<mpsc::UnboundedReceiver<SensorReading>> {
        let rx = self
            .rx
            .take()
            .ok_or_else(|| TiltcamError::sensor("channel source already subscribed"))?;
        self.active.store(true, Ordering::SeqCst);
        Ok(rx)
    }

    fn unsubscribe(&mut self) {
        self.active.store(false, Ordering::SeqCst);
    }

    fn is_subscribed(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }
}

impl SensorFeed {
    /// Deliver a reading. Returns `false` if nobody is subscribed.
    pub fn push(&self, reading: SensorReading) -> bool {
        if !self.active.load(Ordering::SeqCst) {
            return false;
        }
        self.tx.send(reading).is_ok()
    }
}

/// A reading scheduled at an offset from subscription time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimedReading {
    pub at_ms: u64,
    #[serde(flatten)]
    pub reading: SensorReading,
}

/// Replays a fixed list of readings on their schedule.
///
/// `subscribe` spawns the replay task and must be called inside a Tokio
/// runtime.
pub struct ReplaySource {
    readings: Vec<TimedReading>,
    task: Option<JoinHandle<()>>,
    subscribed: bool,
}

impl ReplaySource {
    pub fn new(mut readings: Vec<TimedReading>) -> Self {
        readings.sort_by_key(|r| r.at_ms);
        Self {
            readings,
            task: None,
            subscribed: false,
        }
    }

    pub fn len(&self) -> usize {
        self.readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }
}

impl SensorSource for ReplaySource {
    fn name(&self) -> &str {
        "replay"
    }

    fn subscribe(&mut self) -> TiltcamResult<mpsc::UnboundedReceiver<SensorReading>> {
        if self.subscribed {
            return Err(TiltcamError::sensor("replay source already subscribed"));
        }
        let (tx, rx) = mpsc::unbounded_channel();
        let readings = self.readings.clone();
        self.task = Some(tokio::spawn(async move {
            let origin = tokio::time::Instant::now();
            for timed in readings {
                tokio::time::sleep_until(origin + Duration::from_millis(timed.at_ms)).await;
                if tx.send(timed.reading).is_err() {
                    break;
                }
            }
            tracing::debug!("Sensor replay finished");
        }));
        self.subscribed = true;
        Ok(rx)
    }

    fn unsubscribe(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        self.subscribed = false;
    }

    fn is_subscribed(&self) -> bool {
        self.subscribed
    }
}

impl Drop for ReplaySource {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}
