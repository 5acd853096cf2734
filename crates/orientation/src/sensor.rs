//! Sensor readings and normalized samples.

use serde::{Deserialize, Serialize};

/// A raw device-orientation reading in degrees.
///
/// Platforms may omit any axis; a missing axis reads as zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SensorReading {
    /// Rotation around the z-axis.
    #[serde(default)]
    pub alpha: Option<f64>,
    /// Rotation around the x-axis (front/back tilt).
    #[serde(default)]
    pub beta: Option<f64>,
    /// Rotation around the y-axis (left/right tilt).
    #[serde(default)]
    pub gamma: Option<f64>,
}

impl SensorReading {
    pub fn new(alpha: f64, beta: f64, gamma: f64) -> Self {
        Self {
            alpha: Some(alpha),
            beta: Some(beta),
            gamma: Some(gamma),
        }
    }
}

/// Angle magnitudes rounded to whole degrees.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SensorSample {
    pub alpha: i64,
    pub beta: i64,
    pub gamma: i64,
}

impl SensorSample {
    /// Build a sample directly from angles (tests and replay scripts).
    pub fn from_angles(alpha: f64, beta: f64, gamma: f64) -> Self {
        Self::from(SensorReading::new(alpha, beta, gamma))
    }
}

impl From<SensorReading> for SensorSample {
    fn from(reading: SensorReading) -> Self {
        Self {
            alpha: magnitude(reading.alpha),
            beta: magnitude(reading.beta),
            gamma: magnitude(reading.gamma),
        }
    }
}

/// `|round(angle)|`, with halves rounding toward positive infinity.
/// Missing or non-finite readings count as zero; huge ones saturate.
fn magnitude(angle: Option<f64>) -> i64 {
    match angle {
        Some(a) if a.is_finite() => ((a + 0.5).floor() as i64).saturating_abs(),
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negative_angles_become_magnitudes() {
        let sample = SensorSample::from_angles(-270.2, -89.6, -60.0);
        assert_eq!(sample, SensorSample { alpha: 270, beta: 90, gamma: 60 });
    }

    #[test]
    fn halves_round_up() {
        assert_eq!(SensorSample::from_angles(0.0, 44.5, -44.5).beta, 45);
        assert_eq!(SensorSample::from_angles(0.0, 44.5, -44.5).gamma, 44);
    }

    #[test]
    fn missing_axes_read_as_zero() {
        let reading = SensorReading {
            alpha: None,
            beta: Some(80.0),
            gamma: None,
        };
        let sample = SensorSample::from(reading);
        assert_eq!(sample, SensorSample { alpha: 0, beta: 80, gamma: 0 });
        assert_eq!(SensorSample::from_angles(f64::NAN, 1.0, 2.0).alpha, 0);
    }

    #[test]
    fn huge_angles_saturate() {
        let sample = SensorSample::from_angles(1e300, -1e300, -1e19);
        assert_eq!(sample.alpha, i64::MAX);
        assert_eq!(sample.beta, i64::MAX);
        assert_eq!(sample.gamma, i64::MAX);
    }

    #[test]
    fn partial_json_reading_deserializes() {
        let reading: SensorReading = serde_json::from_str(r#"{"beta": 12.5}"#).unwrap();
        assert_eq!(reading.alpha, None);
        assert_eq!(reading.beta, Some(12.5));
    }
}
