//! Upstream object-store client.

use async_trait::async_trait;
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use bytes::{Bytes, BytesMut};
use futures::future::BoxFuture;
use futures::stream::BoxStream;
use futures::{FutureExt, StreamExt, TryStreamExt};
use mediarelay_core::{BodyMode, HostAllowList, RelayConfig, RelayError};
use reqwest::{redirect, Url};

const MAX_REDIRECTS: usize = 10;

pub type ByteStream = BoxStream<'static, Result<Bytes, std::io::Error>>;

pub enum UpstreamBody {
    /// Chunks as they arrive from the network.
    Stream(ByteStream),
    /// The whole body, read into memory when awaited.
    Buffered(BoxFuture<'static, Result<Bytes, RelayError>>),
}

pub struct UpstreamResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: UpstreamBody,
}

#[async_trait]
pub trait UpstreamFetcher: Send + Sync {
    /// GET `url`, forwarding `range` verbatim when present.
    ///
    /// Any response, including non-2xx, is returned as-is; only transport
    /// failures are errors.
    async fn fetch(
        &self,
        url: &Url,
        range: Option<&HeaderValue>,
    ) -> Result<UpstreamResponse, RelayError>;
}

/// `reqwest`-backed fetcher. Redirects are followed only while every hop
/// stays on the allow-list.
pub struct ReqwestFetcher {
    client: reqwest::Client,
    body_mode: BodyMode,
    max_buffer_bytes: usize,
}

impl ReqwestFetcher {
    pub fn new(config: &RelayConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .redirect(allow_listed_redirects(config.allow_list.clone()))
            .connect_timeout(config.upstream_connect_timeout)
            .read_timeout(config.upstream_read_timeout)
            .user_agent(concat!("mediarelay/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            body_mode: config.body_mode,
            max_buffer_bytes: config.max_buffer_bytes,
        })
    }
}

fn allow_listed_redirects(allow_list: HostAllowList) -> redirect::Policy {
    redirect::Policy::custom(move |attempt| {
        if attempt.previous().len() >= MAX_REDIRECTS {
            return attempt.error("too many redirects");
        }
        if allow_list.is_allowed(attempt.url()) {
            attempt.follow()
        } else {
            let host = attempt.url().host_str().unwrap_or_default().to_string();
            tracing::warn!(
                redirect_host = %host,
                "Refusing redirect to host outside the allow-list"
            );
            attempt.error(format!("redirect to disallowed host {}", host))
        }
    })
}

/// Flatten an error and its sources into one line.
fn error_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

async fn read_capped(response: reqwest::Response, limit: usize) -> Result<Bytes, RelayError> {
    if let Some(len) = response.content_length() {
        if len > limit as u64 {
            return Err(RelayError::BufferFailure(format!(
                "upstream body of {} bytes exceeds the {} byte buffer limit",
                len, limit
            )));
        }
    }

    let mut stream = response.bytes_stream();
    let mut buffer = BytesMut::new();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| RelayError::BufferFailure(error_chain(&e)))?;
        if buffer.len() + chunk.len() > limit {
            return Err(RelayError::BufferFailure(format!(
                "upstream body exceeds the {} byte buffer limit",
                limit
            )));
        }
        buffer.extend_from_slice(&chunk);
    }
    Ok(buffer.freeze())
}

#[async_trait]
impl UpstreamFetcher for ReqwestFetcher {
    async fn fetch(
        &self,
        url: &Url,
        range: Option<&HeaderValue>,
    ) -> Result<UpstreamResponse, RelayError> {
        let mut request = self.client.get(url.clone());
        if let Some(range) = range {
            request = request.header(header::RANGE, range.clone());
        }

        let response = request
            .send()
            .await
            .map_err(|e| RelayError::UpstreamUnreachable(error_chain(&e)))?;

        let status = response.status();
        let headers = response.headers().clone();
        tracing::debug!(
            status = status.as_u16(),
            content_length = ?response.content_length(),
            "Upstream responded"
        );

        let body = match self.body_mode {
            BodyMode::Stream => UpstreamBody::Stream(
                response
                    .bytes_stream()
                    .map_err(|e| std::io::Error::other(error_chain(&e)))
                    .boxed(),
            ),
            BodyMode::Buffer => {
                UpstreamBody::Buffered(read_capped(response, self.max_buffer_bytes).boxed())
            }
        };

        Ok(UpstreamResponse {
            status,
            headers,
            body,
        })
    }
}
