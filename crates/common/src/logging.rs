//! Logging and tracing initialization.

use tracing_subscriber::{fmt, EnvFilter};

use crate::config::LoggingConfig;

/// Crates whose events follow the configured level. Everything else,
/// including the async runtime, stays at `warn`.
const TILTCAM_TARGETS: [&str; 4] = [
    "tiltcam",
    "tiltcam_common",
    "tiltcam_orientation",
    "tiltcam_capture_engine",
];

/// Filter directives for `level`, scoped to the TiltCam crates.
pub fn filter_directives(level: &str) -> String {
    let mut directives = String::from("warn");
    for target in TILTCAM_TARGETS {
        directives.push_str(&format!(",{target}={level}"));
    }
    directives
}

/// Install the global subscriber. `RUST_LOG` takes precedence over the
/// configured level. A subscriber installed earlier is left in place.
pub fn init_logging(config: &LoggingConfig) {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(filter_directives(&config.level)))
        .unwrap_or_else(|_| EnvFilter::new(filter_directives("info")));

    let installed = if config.json {
        let subscriber = fmt::Subscriber::builder()
            .with_env_filter(env_filter)
            .json()
            .finish();
        tracing::subscriber::set_global_default(subscriber).is_ok()
    } else {
        let subscriber = fmt::Subscriber::builder()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .finish();
        tracing::subscriber::set_global_default(subscriber).is_ok()
    };

    if installed {
        tracing::debug!(level = %config.level, json = config.json, "Logging initialized");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directives_scope_level_to_workspace_crates() {
        let directives = filter_directives("debug");
        assert!(directives.starts_with("warn,"));
        assert!(directives.contains("tiltcam_capture_engine=debug"));
        assert!(directives.contains("tiltcam=debug"));
        assert!(EnvFilter::try_new(&directives).is_ok());
    }

    #[test]
    fn second_init_keeps_first_subscriber() {
        let config = LoggingConfig::default();
        init_logging(&config);
        init_logging(&config);
    }
}
