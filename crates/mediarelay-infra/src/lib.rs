//! Mediarelay Infrastructure Library
//!
//! Tracing initialisation and the HTTP middleware shared by Mediarelay services.

pub mod middleware;
pub mod telemetry;

pub use middleware::{request_id_middleware, RequestId, REQUEST_ID_HEADER};
pub use telemetry::{init_telemetry, shutdown_telemetry};
