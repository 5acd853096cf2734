//! Application configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{TiltcamError, TiltcamResult};
use crate::posture::{Mode, Orientation, Thresholds};

/// Global application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Recorder settings.
    pub recording: RecordingDefaults,

    /// Orientation tracking settings.
    pub orientation: OrientationDefaults,

    /// Where finished recordings are written.
    pub export: ExportConfig,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

/// Default recording parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordingDefaults {
    /// Target video bitrate handed to the recorder.
    pub video_bits_per_second: u32,

    /// Container/codec mime types in preference order; first supported wins.
    pub preferred_codecs: Vec<String>,

    /// Request a microphone track alongside the camera.
    pub capture_audio: bool,

    /// Emit a data chunk every N milliseconds. `None` produces a single
    /// chunk when the recorder stops.
    pub timeslice_ms: Option<u64>,
}

/// Orientation tracking parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrientationDefaults {
    /// Mode at startup.
    pub initial_mode: Mode,

    /// Published orientation at startup.
    pub initial_orientation: Orientation,

    /// Classifier hysteresis band.
    pub thresholds: Thresholds,

    /// Period of the auto-mode diagnostic report.
    pub diagnostic_interval_ms: u64,
}

/// Export sink settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Directory for exported recordings.
    pub output_dir: PathBuf,

    /// File name prefix, followed by a short random id.
    pub file_prefix: String,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "tiltcam=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,
}

impl Default for RecordingDefaults {
    fn default() -> Self {
        Self {
            video_bits_per_second: 2_500_000,
            preferred_codecs: vec![
                "video/webm;codecs=vp9".to_string(),
                "video/webm;codecs=vp8".to_string(),
            ],
            capture_audio: true,
            timeslice_ms: None,
        }
    }
}

impl Default for OrientationDefaults {
    fn default() -> Self {
        Self {
            initial_mode: Mode::Auto,
            initial_orientation: Orientation::Landscape,
            thresholds: Thresholds::default(),
            diagnostic_interval_ms: 1000,
        }
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            output_dir: default_export_dir(),
            file_prefix: "video".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl AppConfig {
    /// Load config from the standard location, falling back to defaults.
    pub fn load() -> Self {
        let config_path = config_file_path();
        if config_path.exists() {
            match Self::load_from(&config_path) {
                Ok(config) => return config,
                Err(e) => {
                    tracing::warn!("Failed to load config at {:?}: {}", config_path, e);
                }
            }
        }
        Self::default()
    }

    /// Load config from an explicit path. Missing keys take their defaults.
    pub fn load_from(path: &Path) -> TiltcamResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save config to the standard location.
    pub fn save(&self) -> Result<(), std::io::Error> {
        let config_path = config_file_path();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(config_path, json)
    }

    /// Reject values the recorder or ticker cannot work with.
    pub fn validate(&self) -> TiltcamResult<()> {
        if self.recording.video_bits_per_second == 0 {
            return Err(TiltcamError::config("video_bits_per_second must be > 0"));
        }
        if self.orientation.diagnostic_interval_ms == 0 {
            return Err(TiltcamError::config("diagnostic_interval_ms must be > 0"));
        }
        if self.recording.timeslice_ms == Some(0) {
            return Err(TiltcamError::config("timeslice_ms must be > 0 when set"));
        }
        Ok(())
    }
}

/// Standard config file location.
fn config_file_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".config")
        });
    base.join("tiltcam").join("config.json")
}

/// Default export directory.
fn default_export_dir() -> PathBuf {
    let base = std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".local").join("share")
        });
    base.join("tiltcam").join("recordings")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_carry_recorder_bitrate_and_codecs() {
        let config = AppConfig::default();
        assert_eq!(config.recording.video_bits_per_second, 2_500_000);
        assert_eq!(
            config.recording.preferred_codecs,
            vec!["video/webm;codecs=vp9", "video/webm;codecs=vp8"]
        );
        assert_eq!(config.orientation.diagnostic_interval_ms, 1000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_json_fills_in_defaults() {
        let config: AppConfig =
            serde_json::from_str(r#"{"orientation": {"initial_mode": "toggle"}}"#).unwrap();
        assert_eq!(config.orientation.initial_mode, Mode::Toggle);
        assert_eq!(config.orientation.initial_orientation, Orientation::Landscape);
        assert_eq!(config.recording.video_bits_per_second, 2_500_000);
    }

    #[test]
    fn zero_interval_is_rejected() {
        let mut config = AppConfig::default();
        config.orientation.diagnostic_interval_ms = 0;
        assert!(matches!(
            config.validate(),
            Err(TiltcamError::Config { .. })
        ));
    }
}
