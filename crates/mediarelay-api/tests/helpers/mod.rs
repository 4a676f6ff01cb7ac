//! Test helpers: build the relay router against a mockito upstream.
//!
//! Upstream mocks listen on 127.0.0.1, so that is the only allow-listed host.

#![allow(dead_code)]

use async_trait::async_trait;
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum_test::TestServer;
use bytes::Bytes;
use futures::StreamExt;
use mediarelay_api::services::{ReqwestFetcher, UpstreamBody, UpstreamFetcher, UpstreamResponse};
use mediarelay_api::setup::routes;
use mediarelay_api::state::AppState;
use mediarelay_core::{HostAllowList, RelayConfig, RelayError};
use mediarelay_processing::{TranscodeError, Transcoder};
use reqwest::Url;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

pub const ALLOWED_HOST: &str = "127.0.0.1";

pub struct TestApp {
    pub server: TestServer,
    pub staging: TempDir,
}

impl TestApp {
    /// Files currently left in the staging directory.
    pub fn staged_file_count(&self) -> usize {
        std::fs::read_dir(self.staging.path())
            .map(|entries| entries.count())
            .unwrap_or(0)
    }
}

pub fn test_config(staging: &Path) -> RelayConfig {
    RelayConfig {
        allow_list: HostAllowList::new([ALLOWED_HOST], Vec::<String>::new()),
        staging_dir: staging.to_path_buf(),
        ..RelayConfig::default()
    }
}

/// Default app: streaming bodies and a transcoder that copies input to output.
pub fn setup_test_app() -> TestApp {
    setup_test_app_with(|_| {}, Arc::new(FakeTranscoder::copying()))
}

pub fn setup_test_app_with(
    configure: impl FnOnce(&mut RelayConfig),
    transcoder: Arc<dyn Transcoder>,
) -> TestApp {
    let staging = TempDir::new().expect("Failed to create staging dir");
    let mut config = test_config(staging.path());
    configure(&mut config);

    let fetcher = ReqwestFetcher::new(&config).expect("Failed to build upstream client");
    build_app(config, staging, Arc::new(fetcher), transcoder)
}

/// App whose upstream is `fetcher` instead of the network.
pub fn setup_test_app_with_fetcher(fetcher: Arc<dyn UpstreamFetcher>) -> TestApp {
    let staging = TempDir::new().expect("Failed to create staging dir");
    let config = test_config(staging.path());
    let transcoder = Arc::new(FakeTranscoder::copying());
    build_app(config, staging, fetcher, transcoder)
}

fn build_app(
    config: RelayConfig,
    staging: TempDir,
    fetcher: Arc<dyn UpstreamFetcher>,
    transcoder: Arc<dyn Transcoder>,
) -> TestApp {
    let state = Arc::new(AppState::new(config, fetcher, transcoder));
    let server =
        TestServer::new(routes::setup_routes(state)).expect("Failed to create test server");

    TestApp { server, staging }
}

pub fn upstream_url(upstream: &mockito::ServerGuard, path: &str) -> String {
    format!("{}{}", upstream.url(), path)
}

pub enum FakeOutcome {
    Copy,
    Fail(String),
    Unavailable,
}

/// Stand-in for ffmpeg that records the staged input paths it was given.
pub struct FakeTranscoder {
    outcome: FakeOutcome,
    delay: Duration,
    inputs: Mutex<Vec<PathBuf>>,
}

impl FakeTranscoder {
    fn new(outcome: FakeOutcome) -> Self {
        Self {
            outcome,
            delay: Duration::ZERO,
            inputs: Mutex::new(Vec::new()),
        }
    }

    pub fn copying() -> Self {
        Self::new(FakeOutcome::Copy)
    }

    pub fn failing(diagnostics: &str) -> Self {
        Self::new(FakeOutcome::Fail(diagnostics.to_string()))
    }

    pub fn unavailable() -> Self {
        Self::new(FakeOutcome::Unavailable)
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn inputs(&self) -> Vec<PathBuf> {
        self.inputs.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transcoder for FakeTranscoder {
    async fn remux_faststart(&self, input: &Path, output: &Path) -> Result<(), TranscodeError> {
        self.inputs.lock().unwrap().push(input.to_path_buf());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        match &self.outcome {
            FakeOutcome::Copy => {
                tokio::fs::copy(input, output).await?;
                Ok(())
            }
            FakeOutcome::Fail(diagnostics) => Err(TranscodeError::Failed {
                diagnostics: diagnostics.clone(),
            }),
            FakeOutcome::Unavailable => Err(TranscodeError::Unavailable(
                "failed to start ffmpeg: No such file or directory".to_string(),
            )),
        }
    }

    fn name(&self) -> &str {
        "fake"
    }
}

/// Upstream stand-in that answers 200 and records each forwarded `Range`.
#[derive(Default)]
pub struct RecordingFetcher {
    ranges: Mutex<Vec<Option<HeaderValue>>>,
}

impl RecordingFetcher {
    pub fn ranges(&self) -> Vec<Option<HeaderValue>> {
        self.ranges.lock().unwrap().clone()
    }
}

#[async_trait]
impl UpstreamFetcher for RecordingFetcher {
    async fn fetch(
        &self,
        _url: &Url,
        range: Option<&HeaderValue>,
    ) -> Result<UpstreamResponse, RelayError> {
        self.ranges.lock().unwrap().push(range.cloned());
        let chunks = vec![Ok(Bytes::from_static(b"recorded"))];
        Ok(UpstreamResponse {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: UpstreamBody::Stream(futures::stream::iter(chunks).boxed()),
        })
    }
}
