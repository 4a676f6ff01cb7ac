use crate::services::{MediaRelay, UpstreamFetcher};
use mediarelay_core::RelayConfig;
use mediarelay_processing::Transcoder;
use std::sync::Arc;

/// Shared, read-only state handed to every request.
pub struct AppState {
    pub config: Arc<RelayConfig>,
    pub relay: MediaRelay,
}

impl AppState {
    pub fn new(
        config: RelayConfig,
        fetcher: Arc<dyn UpstreamFetcher>,
        transcoder: Arc<dyn Transcoder>,
    ) -> Self {
        let relay = MediaRelay::new(&config, fetcher, transcoder);
        Self {
            config: Arc::new(config),
            relay,
        }
    }
}
