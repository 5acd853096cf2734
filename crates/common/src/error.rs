//! Error types shared across TiltCam crates.

/// Top-level error type for TiltCam operations.
#[derive(Debug, thiserror::Error)]
pub enum TiltcamError {
    #[error("Permission denied: {message}")]
    PermissionDenied { message: String },

    #[error("Device unavailable: {message}")]
    DeviceUnavailable { message: String },

    #[error("Recorder error: {message}")]
    Recorder { message: String },

    #[error("Export error: {message}")]
    Export { message: String },

    #[error("Sensor error: {message}")]
    Sensor { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Script error on line {line}: {message}")]
    Script { line: usize, message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using TiltcamError.
pub type TiltcamResult<T> = Result<T, TiltcamError>;

impl TiltcamError {
    pub fn permission_denied(msg: impl Into<String>) -> Self {
        Self::PermissionDenied {
            message: msg.into(),
        }
    }

    pub fn device_unavailable(msg: impl Into<String>) -> Self {
        Self::DeviceUnavailable {
            message: msg.into(),
        }
    }

    pub fn recorder(msg: impl Into<String>) -> Self {
        Self::Recorder {
            message: msg.into(),
        }
    }

    pub fn export(msg: impl Into<String>) -> Self {
        Self::Export {
            message: msg.into(),
        }
    }

    pub fn sensor(msg: impl Into<String>) -> Self {
        Self::Sensor {
            message: msg.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    pub fn script(line: usize, msg: impl Into<String>) -> Self {
        Self::Script {
            line,
            message: msg.into(),
        }
    }

    /// Whether this error came from stream acquisition (camera/microphone).
    pub fn is_acquisition_failure(&self) -> bool {
        matches!(
            self,
            Self::PermissionDenied { .. } | Self::DeviceUnavailable { .. }
        )
    }
}
