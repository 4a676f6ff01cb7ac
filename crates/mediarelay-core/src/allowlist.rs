//! Upstream host allow-list
//!
//! Keeps the relay from being used as an open proxy (SSRF). A candidate URL passes
//! only if its hostname is one of the literal hosts, or ends with one of the
//! configured domain suffixes on a label boundary. Paths and query strings are
//! never consulted.

use url::Url;

use crate::error::RelayError;

/// Literal hosts and domain suffixes permitted as relay targets.
#[derive(Clone, Debug, Default)]
pub struct HostAllowList {
    hosts: Vec<String>,
    suffixes: Vec<String>,
}

impl HostAllowList {
    pub fn new<H, S>(hosts: H, suffixes: S) -> Self
    where
        H: IntoIterator,
        H::Item: AsRef<str>,
        S: IntoIterator,
        S::Item: AsRef<str>,
    {
        let hosts = hosts
            .into_iter()
            .map(|h| normalize_host(h.as_ref()))
            .filter(|h| !h.is_empty())
            .collect();

        // A suffix always matches on a label boundary: "appspot.com" becomes ".appspot.com"
        let suffixes = suffixes
            .into_iter()
            .map(|s| normalize_host(s.as_ref().trim_start_matches('.')))
            .filter(|s| !s.is_empty())
            .map(|s| format!(".{}", s))
            .collect();

        Self { hosts, suffixes }
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty() && self.suffixes.is_empty()
    }

    pub fn hosts(&self) -> &[String] {
        &self.hosts
    }

    pub fn suffixes(&self) -> &[String] {
        &self.suffixes
    }

    /// Parse `candidate` and check its host against the allow-list.
    pub fn validate(&self, candidate: &str) -> Result<Url, RelayError> {
        let url = Url::parse(candidate.trim()).map_err(|e| RelayError::InvalidUrl(e.to_string()))?;

        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(RelayError::InvalidUrl(format!(
                "unsupported scheme '{}'",
                url.scheme()
            )));
        }

        let host = url
            .host_str()
            .ok_or_else(|| RelayError::InvalidUrl("URL must have a host".to_string()))?;

        if !self.is_host_allowed(host) {
            return Err(RelayError::HostNotAllowed(host.to_string()));
        }

        Ok(url)
    }

    /// Check an already-parsed URL (used for redirect hops).
    pub fn is_allowed(&self, url: &Url) -> bool {
        matches!(url.scheme(), "http" | "https")
            && url.host_str().is_some_and(|h| self.is_host_allowed(h))
    }

    fn is_host_allowed(&self, host: &str) -> bool {
        let host = normalize_host(host);
        if host.is_empty() {
            return false;
        }
        self.hosts.iter().any(|allowed| *allowed == host)
            || self.suffixes.iter().any(|suffix| host.ends_with(suffix.as_str()))
    }
}

fn normalize_host(host: &str) -> String {
    let host = host.trim().to_ascii_lowercase();
    host.strip_suffix('.').map(str::to_string).unwrap_or(host)
}
