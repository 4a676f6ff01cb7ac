//! Configuration module
//!
//! All settings come from the environment (optionally seeded from a `.env` file)
//! and are fixed for the lifetime of the process.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use http::HeaderValue;

use crate::allowlist::HostAllowList;
use crate::policy::{CachePolicy, ContentTypePolicy};

const SERVER_PORT: u16 = 3000;
const ALLOWED_HOSTS: &str = "storage.googleapis.com,firebasestorage.googleapis.com";
const ALLOWED_HOST_SUFFIXES: &str = ".firebasestorage.app,.appspot.com";
const MEDIA_EXTENSIONS: &str = "mov,mp4,m4v";
const FORCED_CONTENT_TYPE: &str = "video/mp4";
const MAX_BUFFER_MB: usize = 512;
const UPSTREAM_CONNECT_TIMEOUT_SECS: u64 = 10;
const UPSTREAM_READ_TIMEOUT_SECS: u64 = 30;
const TRANSCODE_TIMEOUT_SECS: u64 = 300;
const MAX_CONCURRENT_TRANSCODES: usize = 2;
const HTTP_CONCURRENCY_LIMIT: usize = 10_000;

/// How upstream bodies reach the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BodyMode {
    /// Pipe upstream chunks straight through.
    #[default]
    Stream,
    /// Read the whole body into memory first.
    Buffer,
}

impl FromStr for BodyMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "stream" => Ok(BodyMode::Stream),
            "buffer" => Ok(BodyMode::Buffer),
            other => Err(anyhow::anyhow!(
                "RELAY_BODY_MODE must be 'stream' or 'buffer', got '{}'",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Relay service configuration.
#[derive(Clone, Debug)]
pub struct RelayConfig {
    pub server_port: u16,
    pub environment: String,
    pub log_format: LogFormat,
    pub allow_list: HostAllowList,
    pub media_extensions: Vec<String>,
    pub content_type: ContentTypePolicy,
    pub cache: CachePolicy,
    pub body_mode: BodyMode,
    pub max_buffer_bytes: usize,
    pub upstream_connect_timeout: Duration,
    pub upstream_read_timeout: Duration,
    pub ffmpeg_path: String,
    pub transcode_timeout: Duration,
    pub max_concurrent_transcodes: usize,
    pub staging_dir: PathBuf,
    pub http_concurrency_limit: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            server_port: SERVER_PORT,
            environment: "development".to_string(),
            log_format: LogFormat::Text,
            allow_list: HostAllowList::new(
                split_list(ALLOWED_HOSTS),
                split_list(ALLOWED_HOST_SUFFIXES),
            ),
            media_extensions: parse_extensions(MEDIA_EXTENSIONS),
            content_type: ContentTypePolicy::new(HeaderValue::from_static(FORCED_CONTENT_TYPE)),
            cache: CachePolicy::default(),
            body_mode: BodyMode::Stream,
            max_buffer_bytes: MAX_BUFFER_MB * 1024 * 1024,
            upstream_connect_timeout: Duration::from_secs(UPSTREAM_CONNECT_TIMEOUT_SECS),
            upstream_read_timeout: Duration::from_secs(UPSTREAM_READ_TIMEOUT_SECS),
            ffmpeg_path: "ffmpeg".to_string(),
            transcode_timeout: Duration::from_secs(TRANSCODE_TIMEOUT_SECS),
            max_concurrent_transcodes: MAX_CONCURRENT_TRANSCODES,
            staging_dir: env::temp_dir(),
            http_concurrency_limit: HTTP_CONCURRENCY_LIMIT,
        }
    }
}

impl RelayConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        // A missing .env file is normal outside local development
        dotenvy::dotenv().ok();

        let defaults = RelayConfig::default();

        let environment = env::var("ENVIRONMENT")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or(defaults.environment);

        let log_format = match env::var("LOG_FORMAT") {
            Ok(v) if v.trim().eq_ignore_ascii_case("json") => LogFormat::Json,
            _ => LogFormat::Text,
        };

        let hosts = env::var("RELAY_ALLOWED_HOSTS").unwrap_or_else(|_| ALLOWED_HOSTS.to_string());
        let suffixes = env::var("RELAY_ALLOWED_HOST_SUFFIXES")
            .unwrap_or_else(|_| ALLOWED_HOST_SUFFIXES.to_string());
        let allow_list = HostAllowList::new(split_list(&hosts), split_list(&suffixes));

        let forced_content_type = env::var("RELAY_FORCED_CONTENT_TYPE")
            .unwrap_or_else(|_| FORCED_CONTENT_TYPE.to_string());
        let forced_content_type = match HeaderValue::from_str(forced_content_type.trim()) {
            Ok(value) => value,
            Err(_) => {
                return Err(anyhow::anyhow!(
                    "RELAY_FORCED_CONTENT_TYPE is not a valid header value: {}",
                    forced_content_type
                ))
            }
        };

        let cache = CachePolicy {
            browser_max_age_secs: env_or(
                "RELAY_BROWSER_MAX_AGE_SECS",
                defaults.cache.browser_max_age_secs,
            ),
            cdn_max_age_secs: env_or("RELAY_CDN_MAX_AGE_SECS", defaults.cache.cdn_max_age_secs),
            cdn_stale_while_revalidate_secs: env_or(
                "RELAY_CDN_STALE_WHILE_REVALIDATE_SECS",
                defaults.cache.cdn_stale_while_revalidate_secs,
            ),
        };

        let body_mode = match env::var("RELAY_BODY_MODE") {
            Ok(v) => v.parse()?,
            Err(_) => BodyMode::default(),
        };

        let media_extensions =
            env::var("RELAY_MEDIA_EXTENSIONS").unwrap_or_else(|_| MEDIA_EXTENSIONS.to_string());
        let max_buffer_bytes = buffer_limit_bytes(env_or("RELAY_MAX_BUFFER_MB", MAX_BUFFER_MB))?;

        let config = RelayConfig {
            server_port: env::var("PORT")
                .unwrap_or_else(|_| SERVER_PORT.to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number"))?,
            environment,
            log_format,
            allow_list,
            media_extensions: parse_extensions(&media_extensions),
            content_type: ContentTypePolicy::new(forced_content_type),
            cache,
            body_mode,
            max_buffer_bytes,
            upstream_connect_timeout: Duration::from_secs(env_or(
                "RELAY_UPSTREAM_CONNECT_TIMEOUT_SECS",
                UPSTREAM_CONNECT_TIMEOUT_SECS,
            )),
            upstream_read_timeout: Duration::from_secs(env_or(
                "RELAY_UPSTREAM_READ_TIMEOUT_SECS",
                UPSTREAM_READ_TIMEOUT_SECS,
            )),
            ffmpeg_path: env::var("FFMPEG_PATH").unwrap_or_else(|_| "ffmpeg".to_string()),
            transcode_timeout: Duration::from_secs(env_or(
                "TRANSCODE_TIMEOUT_SECS",
                TRANSCODE_TIMEOUT_SECS,
            )),
            max_concurrent_transcodes: env_or(
                "MAX_CONCURRENT_TRANSCODES",
                MAX_CONCURRENT_TRANSCODES,
            ),
            staging_dir: env::var("RELAY_STAGING_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.staging_dir),
            http_concurrency_limit: env_or("HTTP_CONCURRENCY_LIMIT", HTTP_CONCURRENCY_LIMIT),
        };

        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.allow_list.is_empty() {
            return Err(anyhow::anyhow!(
                "RELAY_ALLOWED_HOSTS and RELAY_ALLOWED_HOST_SUFFIXES cannot both be empty"
            ));
        }

        if self.max_concurrent_transcodes == 0 {
            return Err(anyhow::anyhow!(
                "MAX_CONCURRENT_TRANSCODES must be at least 1"
            ));
        }

        if self.http_concurrency_limit == 0 {
            return Err(anyhow::anyhow!("HTTP_CONCURRENCY_LIMIT must be at least 1"));
        }

        if self.max_buffer_bytes == 0 {
            return Err(anyhow::anyhow!("RELAY_MAX_BUFFER_MB must be at least 1"));
        }

        if self.ffmpeg_path.trim().is_empty() {
            return Err(anyhow::anyhow!("FFMPEG_PATH cannot be empty"));
        }

        Ok(())
    }
}

/// Convert the configured buffer limit in MiB to bytes.
fn buffer_limit_bytes(megabytes: usize) -> Result<usize, anyhow::Error> {
    megabytes
        .checked_mul(1024 * 1024)
        .ok_or_else(|| anyhow::anyhow!("RELAY_MAX_BUFFER_MB is too large: {}", megabytes))
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn parse_extensions(raw: &str) -> Vec<String> {
    split_list(raw)
        .into_iter()
        .map(|e| e.trim_start_matches('.').to_lowercase())
        .filter(|e| !e.is_empty())
        .collect()
}
