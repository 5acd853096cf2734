//! Recorder codec selection.

use crate::backend::RecorderSink;

/// Pick the first preferred mime type the recorder supports.
///
/// Returns `None` when nothing matches; the recorder then uses its own
/// default container and codec.
pub fn select_codec(recorder: &dyn RecorderSink, preferred: &[String]) -> Option<String> {
    let chosen = preferred
        .iter()
        .find(|mime| recorder.is_type_supported(mime))
        .cloned();

    match &chosen {
        Some(mime) => tracing::info!(mime_type = %mime, "Selected recorder codec"),
        None => tracing::warn!(
            candidates = preferred.len(),
            "No preferred codec supported, falling back to recorder default"
        ),
    }
    chosen
}

/// Normalize a mime type for comparison: lowercase, no whitespace.
pub fn normalize_mime(mime: &str) -> String {
    mime.chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_ascii_lowercase()
}

/// File extension for a container mime type. Unknown or missing types
/// default to `webm`.
pub fn container_extension(mime: Option<&str>) -> &'static str {
    let container = mime
        .map(normalize_mime)
        .and_then(|m| m.split(';').next().map(str::to_string))
        .unwrap_or_default();

    match container.as_str() {
        "video/mp4" => "mp4",
        "video/x-matroska" => "mkv",
        "video/quicktime" => "mov",
        _ => "webm",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::backend::{ActiveRecorder, MediaStream, RecorderEvents, RecorderOptions};
    use tiltcam_common::error::{TiltcamError, TiltcamResult};

    struct Supports(Vec<&'static str>);

    impl RecorderSink for Supports {
        fn is_type_supported(&self, mime_type: &str) -> bool {
            let wanted = normalize_mime(mime_type);
            self.0.iter().any(|m| normalize_mime(m) == wanted)
        }

        fn start(
            &self,
            _stream: Arc<dyn MediaStream>,
            _options: &RecorderOptions,
            _events: RecorderEvents,
        ) -> TiltcamResult<Box<dyn ActiveRecorder>> {
            Err(TiltcamError::recorder("selection only"))
        }
    }

    fn preferred() -> Vec<String> {
        vec![
            "video/webm;codecs=vp9".to_string(),
            "video/webm;codecs=vp8".to_string(),
        ]
    }

    #[test]
    fn first_supported_wins() {
        let recorder = Supports(vec!["video/webm; codecs=vp8", "video/webm; codecs=vp9"]);
        assert_eq!(
            select_codec(&recorder, &preferred()).as_deref(),
            Some("video/webm;codecs=vp9")
        );
    }

    #[test]
    fn falls_through_to_later_preference() {
        let recorder = Supports(vec!["video/webm;codecs=vp8"]);
        assert_eq!(
            select_codec(&recorder, &preferred()).as_deref(),
            Some("video/webm;codecs=vp8")
        );
    }

    #[test]
    fn nothing_supported_yields_default() {
        let recorder = Supports(vec!["video/mp4"]);
        assert_eq!(select_codec(&recorder, &preferred()), None);
    }

    #[test]
    fn extension_follows_container() {
        assert_eq!(container_extension(Some("video/webm; codecs=vp9")), "webm");
        assert_eq!(container_extension(Some("video/MP4;codecs=avc1")), "mp4");
        assert_eq!(container_extension(None), "webm");
    }
}
