//! Mediarelay Core Library
//!
//! Configuration, the error taxonomy, the upstream host allow-list and the
//! header policies shared by every Mediarelay component.

pub mod allowlist;
pub mod config;
pub mod error;
pub mod policy;
pub mod request;

// Re-export commonly used types
pub use allowlist::HostAllowList;
pub use config::{BodyMode, LogFormat, RelayConfig};
pub use error::{ErrorMetadata, LogLevel, RelayError};
pub use policy::{CachePolicy, ContentTypePolicy};
pub use request::{RelayMode, RelayRequest};
