//! Small helpers shared across providers and the gateway

pub mod url;

pub use url::UrlUtils;
