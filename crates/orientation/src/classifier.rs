//! Tilt classification with hysteresis.
//!
//! A sample is classified as landscape when the device is rolled well onto
//! its side while lying roughly flat or upside-down, and as portrait when it
//! is pitched upright. Everything in between leaves the published
//! orientation alone, so small wobbles near a boundary never flip it.

use tiltcam_common::posture::{Orientation, Thresholds};

use crate::sensor::SensorSample;

/// Outcome of classifying one sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Landscape,
    Portrait,
    /// The sample sits in the dead zone.
    NoChange,
}

impl Decision {
    /// The orientation this decision asks for, if any.
    pub fn orientation(self) -> Option<Orientation> {
        match self {
            Decision::Landscape => Some(Orientation::Landscape),
            Decision::Portrait => Some(Orientation::Portrait),
            Decision::NoChange => None,
        }
    }
}

/// Stateless classifier from sensor samples to decisions.
#[derive(Debug, Clone, Default)]
pub struct OrientationClassifier {
    thresholds: Thresholds,
}

impl OrientationClassifier {
    pub fn new(thresholds: Thresholds) -> Self {
        Self { thresholds }
    }

    pub fn with_defaults() -> Self {
        Self::default()
    }

    pub fn thresholds(&self) -> &Thresholds {
        &self.thresholds
    }

    /// Classify a sample. Landscape takes precedence over portrait.
    pub fn classify(&self, sample: &SensorSample) -> Decision {
        let t = &self.thresholds;
        let beta = sample.beta;
        let gamma = sample.gamma;

        if gamma > t.landscape_min_gamma
            && (beta < t.landscape_max_low_beta || beta > t.landscape_min_high_beta)
        {
            Decision::Landscape
        } else if beta > t.portrait_min_beta && beta < t.portrait_max_beta {
            Decision::Portrait
        } else {
            Decision::NoChange
        }
    }
}
