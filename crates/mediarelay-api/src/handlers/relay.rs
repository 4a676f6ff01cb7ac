use crate::error::HttpRelayError;
use crate::state::AppState;
use axum::{
    extract::{rejection::QueryRejection, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::Response,
};
use mediarelay_core::{RelayError, RelayRequest};
use serde::Deserialize;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
pub struct RelayParams {
    pub url: Option<String>,
    pub mode: Option<String>,
}

/// `GET /relay?url=<upstream>&mode=<raw|normalize|transcode>`
pub async fn relay_media(
    State(state): State<Arc<AppState>>,
    query: Result<Query<RelayParams>, QueryRejection>,
    headers: HeaderMap,
) -> Result<Response, HttpRelayError> {
    let Query(params) = query.map_err(|e| RelayError::InvalidUrl(e.body_text()))?;

    let range = headers.get(header::RANGE).cloned();

    let request = RelayRequest::from_parts(
        params.url.as_deref(),
        params.mode.as_deref(),
        range,
        &state.config.allow_list,
        &state.config.media_extensions,
    )?;

    Ok(state.relay.relay(&request).await?)
}

/// `OPTIONS /relay`: CORS preflight. No validation, no upstream traffic.
pub async fn relay_preflight() -> StatusCode {
    StatusCode::NO_CONTENT
}
