//! Finished recordings and the file export sink.

use std::path::PathBuf;

use bytes::{Bytes, BytesMut};

use tiltcam_common::clock::RecordingClock;
use tiltcam_common::error::{TiltcamError, TiltcamResult};
use tiltcam_common::posture::Orientation;

use crate::backend::ExportSink;
use crate::codec::container_extension;
use crate::session::{SessionId, StopReason};

/// One session's buffered chunks, assembled in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordingArtifact {
    pub session: SessionId,
    pub orientation: Orientation,
    pub mime_type: Option<String>,
    pub data: Bytes,
    pub chunk_count: usize,
    pub duration_ns: u64,
    /// Wall-clock recording start (RFC 3339).
    pub started_at: String,
    pub stop_reason: StopReason,
}

impl RecordingArtifact {
    pub(crate) fn assemble(
        session: SessionId,
        orientation: Orientation,
        mime_type: Option<String>,
        chunks: &[Bytes],
        clock: Option<&RecordingClock>,
        stop_reason: StopReason,
    ) -> Self {
        let mut data = BytesMut::with_capacity(chunks.iter().map(Bytes::len).sum());
        for chunk in chunks {
            data.extend_from_slice(chunk);
        }
        Self {
            session,
            orientation,
            mime_type,
            data: data.freeze(),
            chunk_count: chunks.len(),
            duration_ns: clock.map(RecordingClock::elapsed_ns).unwrap_or(0),
            started_at: clock
                .map(|c| c.epoch_wall().to_string())
                .unwrap_or_default(),
            stop_reason,
        }
    }

    pub fn duration_secs(&self) -> f64 {
        RecordingClock::ns_to_secs(self.duration_ns)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// File extension matching the container.
    pub fn extension(&self) -> &'static str {
        container_extension(self.mime_type.as_deref())
    }
}

/// Writes artifacts as `<prefix><id>.<ext>` into a directory.
#[derive(Debug, Clone)]
pub struct FileExportSink {
    dir: PathBuf,
    prefix: String,
}

impl FileExportSink {
    pub fn new(dir: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            prefix: prefix.into(),
        }
    }

    pub fn dir(&self) -> &PathBuf {
        &self.dir
    }

    fn file_name(&self, artifact: &RecordingArtifact) -> String {
        format!("{}{}.{}", self.prefix, short_id(), artifact.extension())
    }
}

#[async_trait::async_trait]
impl ExportSink for FileExportSink {
    async fn export(&self, artifact: &RecordingArtifact) -> TiltcamResult<Option<PathBuf>> {
        tokio::fs::create_dir_all(&self.dir).await.map_err(|e| {
            TiltcamError::export(format!("cannot create {}: {e}", self.dir.display()))
        })?;

        let path = self.dir.join(self.file_name(artifact));
        tokio::fs::write(&path, &artifact.data)
            .await
            .map_err(|e| TiltcamError::export(format!("cannot write {}: {e}", path.display())))?;

        tracing::info!(
            session = %artifact.session,
            path = %path.display(),
            bytes = artifact.len(),
            "Recording exported"
        );
        Ok(Some(path))
    }
}

/// Nine lowercase alphanumerics.
fn short_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..9].to_string()
}
