//! Response header policy: content-type negotiation, two-tier caching and CORS.

use http::header::{self, HeaderMap, HeaderName, HeaderValue};

use crate::request::RelayMode;

pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// `CDN-Cache-Control` is honoured by CDNs and ignored by browsers.
pub static CDN_CACHE_CONTROL: HeaderName = HeaderName::from_static("cdn-cache-control");

pub const CORS_ALLOW_ORIGIN: &str = "*";
pub const CORS_ALLOW_METHODS: &str = "GET, OPTIONS";
pub const CORS_ALLOW_HEADERS: &str = "Content-Type, Range";
pub const CORS_EXPOSE_HEADERS: &str = "Content-Length, Content-Range, Accept-Ranges";

/// The full CORS header set carried by every relay response.
pub fn cors_headers() -> [(HeaderName, HeaderValue); 4] {
    [
        (
            header::ACCESS_CONTROL_ALLOW_ORIGIN,
            HeaderValue::from_static(CORS_ALLOW_ORIGIN),
        ),
        (
            header::ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static(CORS_ALLOW_METHODS),
        ),
        (
            header::ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static(CORS_ALLOW_HEADERS),
        ),
        (
            header::ACCESS_CONTROL_EXPOSE_HEADERS,
            HeaderValue::from_static(CORS_EXPOSE_HEADERS),
        ),
    ]
}

/// Decides the `Content-Type` presented to the client.
///
/// The forced type is a best-effort heuristic: browsers play most QuickTime
/// H.264/AAC files when told they are MP4, but the codecs are never inspected.
#[derive(Debug, Clone)]
pub struct ContentTypePolicy {
    forced: HeaderValue,
}

impl ContentTypePolicy {
    pub fn new(forced: HeaderValue) -> Self {
        Self { forced }
    }

    pub fn forced(&self) -> &HeaderValue {
        &self.forced
    }

    pub fn resolve(&self, mode: RelayMode, upstream: Option<&HeaderValue>) -> HeaderValue {
        match mode {
            RelayMode::Passthrough => upstream
                .cloned()
                .unwrap_or_else(|| HeaderValue::from_static(DEFAULT_CONTENT_TYPE)),
            RelayMode::Normalize | RelayMode::Transcode => self.forced.clone(),
        }
    }
}

/// Distinct browser and CDN cache lifetimes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachePolicy {
    pub browser_max_age_secs: u64,
    pub cdn_max_age_secs: u64,
    pub cdn_stale_while_revalidate_secs: u64,
}

impl CachePolicy {
    pub fn browser_directive(&self) -> String {
        format!("public, max-age={}", self.browser_max_age_secs)
    }

    pub fn cdn_directive(&self) -> String {
        format!(
            "public, max-age={}, stale-while-revalidate={}",
            self.cdn_max_age_secs, self.cdn_stale_while_revalidate_secs
        )
    }

    pub fn apply(&self, headers: &mut HeaderMap) {
        if let Ok(value) = HeaderValue::from_str(&self.browser_directive()) {
            headers.insert(header::CACHE_CONTROL, value);
        }
        if let Ok(value) = HeaderValue::from_str(&self.cdn_directive()) {
            headers.insert(CDN_CACHE_CONTROL.clone(), value);
        }
    }
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self {
            browser_max_age_secs: 3600,
            cdn_max_age_secs: 86_400,
            cdn_stale_while_revalidate_secs: 604_800,
        }
    }
}

/// Headers for a successful relay of an upstream response.
///
/// Length and range are copied only when upstream sent them; `Accept-Ranges`
/// defaults to `bytes`.
pub fn relay_headers(
    upstream: &HeaderMap,
    mode: RelayMode,
    content_type: &ContentTypePolicy,
    cache: &CachePolicy,
) -> HeaderMap {
    let mut headers = HeaderMap::new();

    headers.insert(
        header::CONTENT_TYPE,
        content_type.resolve(mode, upstream.get(header::CONTENT_TYPE)),
    );

    for name in [header::CONTENT_LENGTH, header::CONTENT_RANGE] {
        if let Some(value) = upstream.get(&name) {
            headers.insert(name, value.clone());
        }
    }

    headers.insert(
        header::ACCEPT_RANGES,
        upstream
            .get(header::ACCEPT_RANGES)
            .cloned()
            .unwrap_or_else(|| HeaderValue::from_static("bytes")),
    );

    cache.apply(&mut headers);
    headers
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mp4_policy() -> ContentTypePolicy {
        ContentTypePolicy::new(HeaderValue::from_static("video/mp4"))
    }

    #[test]
    fn test_content_type_resolution() {
        let policy = mp4_policy();
        let quicktime = HeaderValue::from_static("video/quicktime");

        assert_eq!(
            policy.resolve(RelayMode::Normalize, Some(&quicktime)),
            "video/mp4"
        );
        assert_eq!(
            policy.resolve(RelayMode::Passthrough, Some(&quicktime)),
            "video/quicktime"
        );
        assert_eq!(
            policy.resolve(RelayMode::Passthrough, None),
            DEFAULT_CONTENT_TYPE
        );
    }

    #[test]
    fn test_relay_headers_copy_only_present() {
        let mut upstream = HeaderMap::new();
        upstream.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("video/quicktime"),
        );
        upstream.insert(header::CONTENT_LENGTH, HeaderValue::from_static("100"));
        upstream.insert(
            header::CONTENT_RANGE,
            HeaderValue::from_static("bytes 0-99/1000"),
        );
        upstream.insert(header::ETAG, HeaderValue::from_static("\"abc\""));

        let headers = relay_headers(
            &upstream,
            RelayMode::Normalize,
            &mp4_policy(),
            &CachePolicy::default(),
        );
        assert_eq!(headers[header::CONTENT_TYPE], "video/mp4");
        assert_eq!(headers[header::CONTENT_LENGTH], "100");
        assert_eq!(headers[header::CONTENT_RANGE], "bytes 0-99/1000");
        assert_eq!(headers[header::ACCEPT_RANGES], "bytes");
        assert!(headers.get(header::ETAG).is_none());

        let bare = relay_headers(
            &HeaderMap::new(),
            RelayMode::Passthrough,
            &mp4_policy(),
            &CachePolicy::default(),
        );
        assert!(bare.get(header::CONTENT_LENGTH).is_none());
        assert!(bare.get(header::CONTENT_RANGE).is_none());
    }

    #[test]
    fn test_accept_ranges_passed_through() {
        let mut upstream = HeaderMap::new();
        upstream.insert(header::ACCEPT_RANGES, HeaderValue::from_static("none"));
        let headers = relay_headers(
            &upstream,
            RelayMode::Passthrough,
            &mp4_policy(),
            &CachePolicy::default(),
        );
        assert_eq!(headers[header::ACCEPT_RANGES], "none");
    }

    #[test]
    fn test_two_tier_cache_directives() {
        let policy = CachePolicy {
            browser_max_age_secs: 60,
            cdn_max_age_secs: 600,
            cdn_stale_while_revalidate_secs: 6000,
        };
        let mut headers = HeaderMap::new();
        policy.apply(&mut headers);
        assert_eq!(headers[header::CACHE_CONTROL], "public, max-age=60");
        assert_eq!(
            headers[&CDN_CACHE_CONTROL],
            "public, max-age=600, stale-while-revalidate=6000"
        );
    }
}
