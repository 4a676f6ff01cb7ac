//! Service construction

use crate::services::ReqwestFetcher;
use crate::state::AppState;
use anyhow::{Context, Result};
use mediarelay_core::RelayConfig;
use mediarelay_processing::FfmpegTranscoder;
use std::sync::Arc;

pub async fn initialize_services(config: &RelayConfig) -> Result<Arc<AppState>> {
    tokio::fs::create_dir_all(&config.staging_dir)
        .await
        .with_context(|| {
            format!(
                "Failed to create staging directory {}",
                config.staging_dir.display()
            )
        })?;

    let fetcher = ReqwestFetcher::new(config).context("Failed to build upstream HTTP client")?;
    let transcoder = FfmpegTranscoder::new(config.ffmpeg_path.clone(), config.transcode_timeout)?;

    tracing::info!(
        ffmpeg_path = %transcoder.ffmpeg_path(),
        max_concurrent_transcodes = config.max_concurrent_transcodes,
        staging_dir = %config.staging_dir.display(),
        "Relay services initialized"
    );

    Ok(Arc::new(AppState::new(
        config.clone(),
        Arc::new(fetcher),
        Arc::new(transcoder),
    )))
}
