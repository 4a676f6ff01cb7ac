//! Per-request staging files for the transcode relay.
//!
//! Each transcode owns one input/output pair named after a fresh UUID, so
//! concurrent requests never share a path. The pair is removed when the guard
//! drops, whatever the outcome.

use std::path::{Path, PathBuf};
use uuid::Uuid;

const FILE_PREFIX: &str = "mediarelay";

#[derive(Debug)]
pub struct StagingFiles {
    token: String,
    input: PathBuf,
    output: PathBuf,
}

impl StagingFiles {
    /// Reserve a unique input/output pair under `dir`. No files are created yet.
    pub fn new(dir: &Path, input_extension: &str) -> Self {
        let token = Uuid::new_v4().simple().to_string();
        let input = dir.join(format!(
            "{}-{}-input.{}",
            FILE_PREFIX,
            token,
            sanitize_extension(input_extension)
        ));
        let output = dir.join(format!("{}-{}-output.mp4", FILE_PREFIX, token));
        Self {
            token,
            input,
            output,
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn input(&self) -> &Path {
        &self.input
    }

    pub fn output(&self) -> &Path {
        &self.output
    }
}

impl Drop for StagingFiles {
    fn drop(&mut self) {
        // Best-effort: a file that was never created or is already gone is fine
        for path in [&self.input, &self.output] {
            if let Err(e) = std::fs::remove_file(path) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    tracing::debug!(
                        token = %self.token,
                        error = %e,
                        "Failed to remove staging file"
                    );
                }
            }
        }
    }
}

fn sanitize_extension(ext: &str) -> String {
    let ext: String = ext
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .take(8)
        .collect::<String>()
        .to_ascii_lowercase();
    if ext.is_empty() {
        "bin".to_string()
    } else {
        ext
    }
}
