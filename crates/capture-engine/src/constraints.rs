//! Camera request parameters derived from the published orientation.

use serde::{Deserialize, Serialize};

use tiltcam_common::posture::Orientation;

/// An ideal value with acceptable bounds, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstrainRange {
    pub ideal: u32,
    pub min: u32,
    pub max: u32,
}

/// Which camera the request prefers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FacingMode {
    /// Rear camera.
    Environment,
    /// Front camera.
    User,
}

/// Landscape-native width profile.
pub const BASE_WIDTH: ConstrainRange = ConstrainRange {
    ideal: 1920,
    min: 640,
    max: 1920,
};

/// Landscape-native height profile.
pub const BASE_HEIGHT: ConstrainRange = ConstrainRange {
    ideal: 1080,
    min: 480,
    max: 1080,
};

/// Video constraints for one stream request.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureConstraints {
    pub width: ConstrainRange,
    pub height: ConstrainRange,
    /// Always the landscape ratio of the base profile; only the
    /// width/height ranges follow the orientation.
    pub aspect_ratio: f64,
    pub facing_mode: FacingMode,
}

impl CaptureConstraints {
    /// Build constraints for an orientation. Portrait swaps the width and
    /// height profiles so the long side becomes the height.
    pub fn for_orientation(orientation: Orientation) -> Self {
        let (width, height) = match orientation {
            Orientation::Landscape => (BASE_WIDTH, BASE_HEIGHT),
            Orientation::Portrait => (BASE_HEIGHT, BASE_WIDTH),
        };
        Self {
            width,
            height,
            aspect_ratio: BASE_WIDTH.ideal as f64 / BASE_HEIGHT.ideal as f64,
            facing_mode: FacingMode::Environment,
        }
    }

    /// Whether the requested ideal frame is taller than it is wide.
    pub fn is_portrait_shaped(&self) -> bool {
        self.height.ideal > self.width.ideal
    }
}
