//! FfmpegTranscoder - stream-copy remux with `+faststart`.

use super::{TranscodeError, Transcoder};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

/// Upper bound on diagnostic text handed back to callers.
const MAX_DIAGNOSTIC_CHARS: usize = 4000;

/// Validate that a binary path doesn't contain shell metacharacters or traversal
fn validate_binary_path(path: &str) -> Result<()> {
    if path.trim().is_empty() {
        return Err(anyhow!("ffmpeg path is empty"));
    }

    let dangerous_chars = [';', '|', '&', '$', '`', '(', ')', '<', '>', '\n', '\r'];
    if path.chars().any(|c| dangerous_chars.contains(&c)) {
        return Err(anyhow!(
            "ffmpeg path contains dangerous characters: {}",
            path
        ));
    }

    if path.contains("..") {
        return Err(anyhow!(
            "ffmpeg path contains directory traversal: {}",
            path
        ));
    }

    Ok(())
}

#[derive(Debug, Clone)]
pub struct FfmpegTranscoder {
    ffmpeg_path: String,
    timeout: Duration,
}

impl FfmpegTranscoder {
    pub fn new(ffmpeg_path: impl Into<String>, timeout: Duration) -> Result<Self> {
        let ffmpeg_path = ffmpeg_path.into();
        validate_binary_path(&ffmpeg_path)?;
        Ok(Self {
            ffmpeg_path,
            timeout,
        })
    }

    pub fn ffmpeg_path(&self) -> &str {
        &self.ffmpeg_path
    }

    fn remux_args(input: &Path, output: &Path) -> Vec<String> {
        vec![
            "-y".to_string(),
            "-hide_banner".to_string(),
            "-loglevel".to_string(),
            "error".to_string(),
            "-i".to_string(),
            input.to_string_lossy().to_string(),
            "-map".to_string(),
            "0".to_string(),
            "-c".to_string(),
            "copy".to_string(),
            "-movflags".to_string(),
            "+faststart".to_string(),
            "-f".to_string(),
            "mp4".to_string(),
            output.to_string_lossy().to_string(),
        ]
    }
}

/// Replace staging paths in tool output so they never reach a client, and keep
/// only the tail of very long output.
fn sanitize_diagnostics(stderr: &str, input: &Path, output: &Path) -> String {
    let mut text = stderr.trim().to_string();
    for (path, placeholder) in [(input, "<input>"), (output, "<output>")] {
        let path = path.to_string_lossy();
        if !path.is_empty() {
            text = text.replace(path.as_ref(), placeholder);
        }
    }

    let char_count = text.chars().count();
    if char_count > MAX_DIAGNOSTIC_CHARS {
        let tail: String = text
            .chars()
            .skip(char_count - MAX_DIAGNOSTIC_CHARS)
            .collect();
        text = format!("...{}", tail);
    }
    text
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    #[tracing::instrument(skip(self, input, output), fields(ffmpeg = %self.ffmpeg_path))]
    async fn remux_faststart(&self, input: &Path, output: &Path) -> Result<(), TranscodeError> {
        let start = std::time::Instant::now();

        // kill_on_drop: a cancelled request (client gone, timeout) must not leave ffmpeg running
        let child = Command::new(&self.ffmpeg_path)
            .args(Self::remux_args(input, output))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                tracing::error!(error = %e, "Failed to start ffmpeg");
                // The binary path stays in the log, not in the client message
                TranscodeError::Unavailable(format!("failed to start ffmpeg: {}", e))
            })?;

        let result = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(result) => result?,
            Err(_) => {
                tracing::warn!(
                    timeout_secs = self.timeout.as_secs(),
                    "Transcode timed out, process killed"
                );
                return Err(TranscodeError::Timeout {
                    timeout_secs: self.timeout.as_secs(),
                });
            }
        };

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            let mut diagnostics = sanitize_diagnostics(&stderr, input, output);
            if diagnostics.is_empty() {
                diagnostics = format!("process exited with {}", result.status);
            }
            tracing::error!(
                exit_status = %result.status,
                diagnostics = %diagnostics,
                "FFmpeg remux failed"
            );
            return Err(TranscodeError::Failed { diagnostics });
        }

        if !tokio::fs::try_exists(output).await.unwrap_or(false) {
            return Err(TranscodeError::Failed {
                diagnostics: "transcoder exited successfully but produced no output".to_string(),
            });
        }

        tracing::info!(
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "FFmpeg remux complete"
        );
        Ok(())
    }

    fn name(&self) -> &str {
        "ffmpeg"
    }
}
