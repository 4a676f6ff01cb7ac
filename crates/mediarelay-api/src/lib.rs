//! Mediarelay API Library
//!
//! The HTTP surface of the relay: handlers, the upstream client, the relay
//! service and application setup.

mod handlers;

pub mod error;
pub mod services;
pub mod setup;
pub mod state;

pub use error::HttpRelayError;
pub use state::AppState;
