//! The relay itself: stream (or buffer) an upstream object back to the client,
//! or stage it, remux it with faststart and serve the result.

use crate::services::upstream::{UpstreamBody, UpstreamFetcher, UpstreamResponse};
use axum::{
    body::Body,
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::Response,
};
use futures::{StreamExt, TryStreamExt};
use mediarelay_core::policy::relay_headers;
use mediarelay_core::request::path_extension;
use mediarelay_core::{
    CachePolicy, ContentTypePolicy, RelayConfig, RelayError, RelayMode, RelayRequest,
};
use mediarelay_processing::{atoms, StagingFiles, Transcoder};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::io::AsyncWriteExt;
use tokio::sync::Semaphore;
use tokio_util::io::ReaderStream;

pub struct MediaRelay {
    fetcher: Arc<dyn UpstreamFetcher>,
    transcoder: Arc<dyn Transcoder>,
    transcode_slots: Semaphore,
    staging_dir: PathBuf,
    content_type: ContentTypePolicy,
    cache: CachePolicy,
}

impl MediaRelay {
    pub fn new(
        config: &RelayConfig,
        fetcher: Arc<dyn UpstreamFetcher>,
        transcoder: Arc<dyn Transcoder>,
    ) -> Self {
        Self {
            fetcher,
            transcoder,
            transcode_slots: Semaphore::new(config.max_concurrent_transcodes.max(1)),
            staging_dir: config.staging_dir.clone(),
            content_type: config.content_type.clone(),
            cache: config.cache,
        }
    }

    /// Transcode permits currently free.
    pub fn available_transcode_slots(&self) -> usize {
        self.transcode_slots.available_permits()
    }

    #[tracing::instrument(
        skip(self, request),
        fields(upstream_host = %request.upstream_host(), mode = %request.mode)
    )]
    pub async fn relay(&self, request: &RelayRequest) -> Result<Response, RelayError> {
        match request.mode {
            RelayMode::Passthrough | RelayMode::Normalize => self.relay_stream(request).await,
            RelayMode::Transcode => self.relay_transcoded(request).await,
        }
    }

    async fn fetch_success(
        &self,
        request: &RelayRequest,
        range: Option<&HeaderValue>,
    ) -> Result<UpstreamResponse, RelayError> {
        let upstream = self.fetcher.fetch(&request.upstream, range).await?;
        if !upstream.status.is_success() {
            return Err(RelayError::UpstreamFailure {
                status: upstream.status.as_u16(),
            });
        }
        Ok(upstream)
    }

    async fn relay_stream(&self, request: &RelayRequest) -> Result<Response, RelayError> {
        let upstream = self.fetch_success(request, request.range.as_ref()).await?;
        let status = upstream.status;
        let mut headers = relay_headers(
            &upstream.headers,
            request.mode,
            &self.content_type,
            &self.cache,
        );

        let body = match upstream.body {
            UpstreamBody::Stream(stream) => {
                let upstream_host = request.upstream_host().to_string();
                // Headers are already on the wire by the time a chunk fails; all
                // that is left is to log and let hyper abort the connection.
                Body::from_stream(stream.inspect_err(move |e| {
                    let err = RelayError::StreamingFailure(e.to_string());
                    tracing::error!(
                        upstream_host = %upstream_host,
                        error = %err,
                        error_type = err.error_type(),
                        "Upstream stream failed mid-response"
                    );
                }))
            }
            UpstreamBody::Buffered(pending) => {
                let bytes = pending.await?;
                headers.insert(header::CONTENT_LENGTH, HeaderValue::from(bytes.len()));
                tracing::debug!(size_bytes = bytes.len(), "Upstream body buffered");
                Body::from(bytes)
            }
        };

        tracing::info!(status = status.as_u16(), "Relaying upstream response");
        Ok(build_response(status, headers, body))
    }

    async fn relay_transcoded(&self, request: &RelayRequest) -> Result<Response, RelayError> {
        let permit = self
            .transcode_slots
            .acquire()
            .await
            .map_err(|_| RelayError::Internal("transcode slots closed".to_string()))?;

        // Range is meaningless against a file that does not exist yet
        let upstream = self.fetch_success(request, None).await?;

        let extension = path_extension(&request.upstream).unwrap_or_default();
        let staging = StagingFiles::new(&self.staging_dir, &extension);

        let staged_bytes = stage_upstream_body(upstream.body, staging.input()).await?;
        tracing::debug!(
            token = staging.token(),
            size_bytes = staged_bytes,
            "Upstream body staged"
        );

        let start = Instant::now();
        self.transcoder
            .remux_faststart(staging.input(), staging.output())
            .await?;
        drop(permit);

        match atoms::is_faststart(staging.output()).await {
            Ok(true) => {}
            Ok(false) => {
                tracing::warn!(
                    token = staging.token(),
                    "Remuxed output does not place moov before mdat"
                )
            }
            Err(e) => tracing::warn!(error = %e, "Failed to inspect remuxed output"),
        }

        let file = tokio::fs::File::open(staging.output()).await?;
        let size = file.metadata().await?.len();
        tracing::info!(
            transcoder = self.transcoder.name(),
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Transcode complete"
        );

        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            self.content_type.resolve(RelayMode::Transcode, None),
        );
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from(size));
        headers.insert(header::ACCEPT_RANGES, HeaderValue::from_static("none"));
        self.cache.apply(&mut headers);

        // The staging guard rides along with the body and removes both files
        // once the body is finished or dropped.
        let stream = ReaderStream::new(file).map(move |chunk| {
            let _staging = &staging;
            chunk
        });

        Ok(build_response(
            StatusCode::OK,
            headers,
            Body::from_stream(stream),
        ))
    }
}

/// Write the upstream body to `path`, which must not exist yet.
async fn stage_upstream_body(body: UpstreamBody, path: &Path) -> Result<u64, RelayError> {
    let mut file = tokio::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .await?;

    let written = match body {
        UpstreamBody::Stream(mut stream) => {
            let mut written = 0u64;
            while let Some(chunk) = stream.next().await {
                let chunk = chunk.map_err(|e| {
                    RelayError::UpstreamUnreachable(format!("upstream body failed: {}", e))
                })?;
                file.write_all(&chunk).await?;
                written += chunk.len() as u64;
            }
            written
        }
        UpstreamBody::Buffered(pending) => {
            let bytes = pending.await?;
            file.write_all(&bytes).await?;
            bytes.len() as u64
        }
    };

    file.flush().await?;
    Ok(written)
}

fn build_response(status: StatusCode, headers: HeaderMap, body: Body) -> Response {
    let mut response = Response::new(body);
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    response
}
