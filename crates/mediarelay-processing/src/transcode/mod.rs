//! Remux capability used by the transcode relay.
//!
//! The relay treats the transcoder as a black box with three outcomes: success
//! with an output file, a failed run with diagnostics, or a transcoder that
//! cannot be started at all.

mod ffmpeg;

pub use ffmpeg::FfmpegTranscoder;

use async_trait::async_trait;
use mediarelay_core::RelayError;
use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum TranscodeError {
    /// The tool could not be started (missing binary, permissions).
    #[error("transcoder unavailable: {0}")]
    Unavailable(String),

    /// The tool ran and failed; carries its captured error stream.
    #[error("transcode failed: {diagnostics}")]
    Failed { diagnostics: String },

    #[error("transcode exceeded {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    #[error("transcode I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<TranscodeError> for RelayError {
    fn from(err: TranscodeError) -> Self {
        match err {
            TranscodeError::Unavailable(msg) => RelayError::TranscodeUnavailable(msg),
            TranscodeError::Failed { diagnostics } => RelayError::TranscodeFailure { diagnostics },
            TranscodeError::Timeout { timeout_secs } => {
                RelayError::TranscodeTimeout { timeout_secs }
            }
            TranscodeError::Io(e) => RelayError::Internal(format!("Transcode I/O error: {}", e)),
        }
    }
}

/// Repackages a media file so its metadata precedes the media data.
#[async_trait]
pub trait Transcoder: Send + Sync {
    /// Copy all streams from `input` into an MP4 at `output` with the index moved
    /// to the front. Must not re-encode.
    async fn remux_faststart(&self, input: &Path, output: &Path) -> Result<(), TranscodeError>;

    /// Short identifier for logs.
    fn name(&self) -> &str;
}
