pub mod relay;
pub mod upstream;

pub use relay::MediaRelay;
pub use upstream::{ReqwestFetcher, UpstreamBody, UpstreamFetcher, UpstreamResponse};
