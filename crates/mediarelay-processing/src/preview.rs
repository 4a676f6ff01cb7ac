//! Preview conversion for local, single-user use.
//!
//! A `PreviewConverter` re-encodes a remote clip into a small web-playable MP4.
//! The encoding engine is loaded lazily on first use; a failed load is not
//! cached, so the next call tries again.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use bytes::Bytes;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use tempfile::TempDir;
use tokio::process::Command;
use tokio::sync::OnceCell;
use uuid::Uuid;

/// Arguments for the web-preview encode, between the input and output names.
pub const PREVIEW_ARGS: &[&str] = &[
    "-c:v",
    "libx264",
    "-preset",
    "ultrafast",
    "-crf",
    "28",
    "-pix_fmt",
    "yuv420p",
    "-c:a",
    "aac",
    "-b:a",
    "128k",
    "-movflags",
    "+faststart",
];

/// An encoding engine with its own private file namespace.
#[async_trait]
pub trait PreviewEngine: Send + Sync {
    async fn write_file(&self, name: &str, data: &[u8]) -> Result<()>;
    /// Run the engine with ffmpeg-style arguments; file names refer to the
    /// engine's namespace.
    async fn exec(&self, args: &[String]) -> Result<()>;
    async fn read_file(&self, name: &str) -> Result<Bytes>;
    async fn delete_file(&self, name: &str) -> Result<()>;
}

#[async_trait]
pub trait EngineLoader: Send + Sync {
    async fn load(&self) -> Result<Arc<dyn PreviewEngine>>;
}

pub struct PreviewConverter {
    loader: Box<dyn EngineLoader>,
    engine: OnceCell<Arc<dyn PreviewEngine>>,
    http: reqwest::Client,
}

impl PreviewConverter {
    pub fn new(loader: impl EngineLoader + 'static) -> Self {
        Self::with_client(loader, reqwest::Client::new())
    }

    pub fn with_client(loader: impl EngineLoader + 'static, http: reqwest::Client) -> Self {
        Self {
            loader: Box::new(loader),
            engine: OnceCell::new(),
            http,
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.engine.initialized()
    }

    async fn engine(&self) -> Result<&Arc<dyn PreviewEngine>> {
        self.engine
            .get_or_try_init(|| async {
                tracing::info!("Loading preview engine");
                self.loader.load().await
            })
            .await
    }

    /// Convert the clip at `source_url` into a preview MP4.
    ///
    /// Returns `None` on any failure; the cause is logged.
    pub async fn convert(&self, source_url: &str) -> Option<Bytes> {
        match self.try_convert(source_url).await {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                tracing::warn!(url = %source_url, error = %e, "Preview conversion failed");
                None
            }
        }
    }

    async fn try_convert(&self, source_url: &str) -> Result<Bytes> {
        let engine = self.engine().await.context("preview engine failed to load")?;

        let response = self
            .http
            .get(source_url)
            .send()
            .await
            .context("failed to fetch source")?;
        if !response.status().is_success() {
            return Err(anyhow!(
                "source responded with status {}",
                response.status().as_u16()
            ));
        }
        let source = response.bytes().await.context("failed to read source body")?;

        let token = Uuid::new_v4().simple().to_string();
        let input = format!("preview-{}-input", token);
        let output = format!("preview-{}-output.mp4", token);

        engine.write_file(&input, &source).await?;

        let mut args = vec!["-i".to_string(), input.clone()];
        args.extend(PREVIEW_ARGS.iter().map(|a| a.to_string()));
        args.push(output.clone());
        engine.exec(&args).await?;

        let converted = engine.read_file(&output).await?;

        for name in [&input, &output] {
            if let Err(e) = engine.delete_file(name).await {
                tracing::debug!(file = %name, error = %e, "Failed to delete preview file");
            }
        }

        tracing::info!(
            source_bytes = source.len(),
            preview_bytes = converted.len(),
            "Preview conversion complete"
        );
        Ok(converted)
    }
}

/// Loads an ffmpeg-backed engine whose namespace is a private scratch directory.
#[derive(Debug, Clone)]
pub struct FfmpegEngineLoader {
    ffmpeg_path: String,
}

impl FfmpegEngineLoader {
    pub fn new(ffmpeg_path: impl Into<String>) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
        }
    }
}

#[async_trait]
impl EngineLoader for FfmpegEngineLoader {
    async fn load(&self) -> Result<Arc<dyn PreviewEngine>> {
        let status = Command::new(&self.ffmpeg_path)
            .arg("-version")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .with_context(|| format!("failed to start {}", self.ffmpeg_path))?;
        if !status.success() {
            return Err(anyhow!(
                "{} -version exited with {}",
                self.ffmpeg_path,
                status
            ));
        }

        let workdir = tempfile::Builder::new()
            .prefix("mediarelay-preview-")
            .tempdir()
            .context("failed to create preview workdir")?;

        Ok(Arc::new(FfmpegPreviewEngine {
            ffmpeg_path: self.ffmpeg_path.clone(),
            workdir,
        }))
    }
}

pub struct FfmpegPreviewEngine {
    ffmpeg_path: String,
    workdir: TempDir,
}

impl FfmpegPreviewEngine {
    fn resolve(&self, name: &str) -> Result<PathBuf> {
        let valid = !name.is_empty()
            && !name.starts_with('.')
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
        if !valid {
            return Err(anyhow!("invalid engine file name: {}", name));
        }
        Ok(self.workdir.path().join(name))
    }

    pub fn workdir(&self) -> &Path {
        self.workdir.path()
    }
}

#[async_trait]
impl PreviewEngine for FfmpegPreviewEngine {
    async fn write_file(&self, name: &str, data: &[u8]) -> Result<()> {
        tokio::fs::write(self.resolve(name)?, data).await?;
        Ok(())
    }

    async fn exec(&self, args: &[String]) -> Result<()> {
        let output = Command::new(&self.ffmpeg_path)
            .current_dir(self.workdir.path())
            .arg("-y")
            .arg("-hide_banner")
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .with_context(|| format!("failed to start {}", self.ffmpeg_path))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let tail: String = stderr
                .lines()
                .rev()
                .take(5)
                .collect::<Vec<_>>()
                .into_iter()
                .rev()
                .collect::<Vec<_>>()
                .join("\n");
            return Err(anyhow!("preview encode failed: {}", tail));
        }
        Ok(())
    }

    async fn read_file(&self, name: &str) -> Result<Bytes> {
        let data = tokio::fs::read(self.resolve(name)?).await?;
        Ok(Bytes::from(data))
    }

    async fn delete_file(&self, name: &str) -> Result<()> {
        tokio::fs::remove_file(self.resolve(name)?).await?;
        Ok(())
    }
}
