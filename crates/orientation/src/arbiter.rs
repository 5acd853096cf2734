//! Auto/toggle authority over the published orientation.
//!
//! Sensor decisions and user selections can arrive in any order. The
//! arbiter resolves them by mode alone: in `Auto` only sensor decisions
//! apply, in `Toggle` only user selections do. Rejected inputs are dropped
//! silently.

use tokio::sync::watch;

use tiltcam_common::posture::{Mode, Orientation};

use crate::classifier::Decision;

/// Owner of the published orientation and mode.
///
/// Subscribers observe values through `watch` receivers; the arbiter's own
/// state is always updated before a receiver can see the change.
#[derive(Debug)]
pub struct ModeArbiter {
    mode: watch::Sender<Mode>,
    orientation: watch::Sender<Orientation>,
}

impl ModeArbiter {
    pub fn new(mode: Mode, orientation: Orientation) -> Self {
        let (mode, _) = watch::channel(mode);
        let (orientation, _) = watch::channel(orientation);
        Self { mode, orientation }
    }

    pub fn mode(&self) -> Mode {
        *self.mode.borrow()
    }

    pub fn orientation(&self) -> Orientation {
        *self.orientation.borrow()
    }

    pub fn is_landscape(&self) -> bool {
        self.orientation().is_landscape()
    }

    /// Observe the published orientation.
    pub fn subscribe_orientation(&self) -> watch::Receiver<Orientation> {
        self.orientation.subscribe()
    }

    /// Observe the current mode.
    pub fn subscribe_mode(&self) -> watch::Receiver<Mode> {
        self.mode.subscribe()
    }

    /// Switch mode. Leaves the orientation untouched.
    /// Returns `true` if the mode actually changed.
    pub fn set_mode(&self, mode: Mode) -> bool {
        let changed = publish(&self.mode, mode);
        if changed {
            tracing::info!(%mode, "Orientation mode changed");
        }
        changed
    }

    /// Apply a classifier decision. Only honoured in `Auto`.
    /// Returns the new orientation if it changed.
    pub fn feed_decision(&self, decision: Decision) -> Option<Orientation> {
        if self.mode() != Mode::Auto {
            return None;
        }
        let orientation = decision.orientation()?;
        if publish(&self.orientation, orientation) {
            tracing::debug!(%orientation, "Orientation changed by sensor");
            Some(orientation)
        } else {
            None
        }
    }

    /// Apply a user selection. Only honoured in `Toggle`; ignored otherwise.
    /// Returns `true` if the orientation actually changed.
    pub fn set_orientation(&self, orientation: Orientation) -> bool {
        if self.mode() != Mode::Toggle {
            tracing::debug!(%orientation, "Ignoring orientation selection outside toggle mode");
            return false;
        }
        let changed = publish(&self.orientation, orientation);
        if changed {
            tracing::info!(%orientation, "Orientation changed by user");
        }
        changed
    }
}

impl Default for ModeArbiter {
    fn default() -> Self {
        Self::new(Mode::default(), Orientation::default())
    }
}

/// Store `value`, notifying receivers only when it differs.
fn publish<T: PartialEq>(sender: &watch::Sender<T>, value: T) -> bool {
    sender.send_if_modified(|current| {
        if *current == value {
            false
        } else {
            *current = value;
            true
        }
    })
}
