//! Capture posture types shared by the orientation and capture crates.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Discrete capture posture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Orientation {
    #[default]
    Landscape,
    Portrait,
}

impl Orientation {
    pub fn is_landscape(self) -> bool {
        self == Orientation::Landscape
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Orientation::Landscape => "landscape",
            Orientation::Portrait => "portrait",
        }
    }
}

impl fmt::Display for Orientation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Orientation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "landscape" => Ok(Orientation::Landscape),
            "portrait" => Ok(Orientation::Portrait),
            other => Err(format!("unknown orientation '{other}'")),
        }
    }
}

/// Who has authority over the published orientation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Orientation follows sensor samples.
    #[default]
    Auto,
    /// Orientation follows explicit user selection only.
    Toggle,
}

impl Mode {
    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Auto => "auto",
            Mode::Toggle => "toggle",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(Mode::Auto),
            "toggle" => Ok(Mode::Toggle),
            other => Err(format!("unknown mode '{other}'")),
        }
    }
}

/// Hysteresis thresholds (degrees) for orientation classification.
///
/// All comparisons are strict. The gap between the landscape beta limits
/// and the portrait beta band is the dead zone that prevents flicker.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    /// Landscape requires gamma above this.
    pub landscape_min_gamma: i64,
    /// Landscape requires beta below this...
    pub landscape_max_low_beta: i64,
    /// ...or above this.
    pub landscape_min_high_beta: i64,
    /// Portrait requires beta above this.
    pub portrait_min_beta: i64,
    /// Portrait requires beta below this.
    pub portrait_max_beta: i64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            landscape_min_gamma: 45,
            landscape_max_low_beta: 30,
            landscape_min_high_beta: 150,
            portrait_min_beta: 45,
            portrait_max_beta: 135,
        }
    }
}
