//! Request-scoped relay model.

use std::fmt;
use std::str::FromStr;

use http::HeaderValue;
use url::Url;

use crate::allowlist::HostAllowList;
use crate::error::RelayError;

/// How the relay presents the upstream object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RelayMode {
    /// Upstream bytes and content type, unchanged.
    Passthrough,
    /// Upstream bytes under the configured forced media type.
    #[default]
    Normalize,
    /// Remux through the external transcoder before relaying.
    Transcode,
}

impl RelayMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelayMode::Passthrough => "raw",
            RelayMode::Normalize => "normalize",
            RelayMode::Transcode => "transcode",
        }
    }

    /// Whether the upstream path must carry a media extension.
    pub fn expects_media(&self) -> bool {
        !matches!(self, RelayMode::Passthrough)
    }
}

impl fmt::Display for RelayMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RelayMode {
    type Err = RelayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "raw" | "passthrough" => Ok(RelayMode::Passthrough),
            "" | "normalize" => Ok(RelayMode::Normalize),
            "transcode" | "remux" => Ok(RelayMode::Transcode),
            _ => Err(RelayError::InvalidMode(s.to_string())),
        }
    }
}

/// One inbound relay request, validated and ready to forward.
#[derive(Debug, Clone)]
pub struct RelayRequest {
    pub upstream: Url,
    /// Inbound `Range` header, forwarded byte for byte.
    pub range: Option<HeaderValue>,
    pub mode: RelayMode,
}

impl RelayRequest {
    /// Build a request from raw inbound parts.
    ///
    /// Checks run in client-visible order: missing `url`, unknown mode, malformed
    /// URL, host policy, then media extension.
    pub fn from_parts(
        url: Option<&str>,
        mode: Option<&str>,
        range: Option<HeaderValue>,
        allow_list: &HostAllowList,
        media_extensions: &[String],
    ) -> Result<Self, RelayError> {
        let url = url
            .filter(|u| !u.trim().is_empty())
            .ok_or(RelayError::MissingParameter("url"))?;

        let mode = match mode {
            Some(m) => m.parse()?,
            None => RelayMode::default(),
        };

        let upstream = allow_list.validate(url)?;

        if mode.expects_media() {
            check_media_extension(&upstream, media_extensions)?;
        }

        Ok(Self {
            upstream,
            range,
            mode,
        })
    }

    pub fn upstream_host(&self) -> &str {
        self.upstream.host_str().unwrap_or_default()
    }
}

/// Extension of the last path segment, lowercased.
///
/// Percent-encoded separators stay inside the segment, so Firebase object paths
/// such as `o/videos%2Fclip.MOV` yield `mov`.
pub fn path_extension(url: &Url) -> Option<String> {
    let segment = url.path_segments()?.next_back()?;
    let (stem, ext) = segment.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

pub fn check_media_extension(url: &Url, media_extensions: &[String]) -> Result<(), RelayError> {
    if media_extensions.is_empty() {
        return Ok(());
    }

    let allowed = path_extension(url)
        .map(|ext| media_extensions.iter().any(|allowed| *allowed == ext))
        .unwrap_or(false);

    if allowed {
        Ok(())
    } else {
        Err(RelayError::UnsupportedExtension {
            expected: media_extensions
                .iter()
                .map(|e| format!(".{}", e))
                .collect::<Vec<_>>()
                .join(", "),
        })
    }
}
