//! Shared fixtures for integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use stream_resolver::config::Config;
use stream_resolver::context::ResolverContext;
use stream_resolver::errors::ProviderResult;
use stream_resolver::gateway::{GatewayRequest, GatewayResponse, HttpTransport};
use stream_resolver::pipeline::StreamResolver;

/// Upstream stand-in answering from `(needle, status, body)` routes.
///
/// Needles are matched against `url?key=value&...` with the query
/// unencoded; unmatched requests get a 404.
#[derive(Default)]
pub struct StubUpstream {
    routes: Vec<(String, u16, String)>,
    seen: Mutex<Vec<String>>,
}

impl StubUpstream {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(mut self, needle: &str, status: u16, body: &str) -> Self {
        self.routes.push((needle.to_string(), status, body.to_string()));
        self
    }

    /// Search provider answer for exactly `query`
    pub fn search(self, query: &str, body: &str) -> Self {
        let needle = format!("/gw/search?query={query}&");
        self.route(&needle, 200, body)
    }

    /// Wikidata answer for both label languages
    pub fn wikidata_title(self, label: &str, instance: &str) -> Self {
        let body = format!(
            r#"{{"results":{{"bindings":[{{"filmLabel":{{"value":"{label}"}},"instanceLabel":{{"value":"{instance}"}}}}]}}}}"#
        );
        self.route("wikidata.org/sparql", 200, &body)
    }

    pub fn seen(&self) -> Vec<String> {
        self.seen.lock().unwrap().clone()
    }

    pub fn searched(&self, query: &str) -> bool {
        let needle = format!("/gw/search?query={query}&");
        self.seen().iter().any(|target| target.contains(&needle))
    }
}

#[async_trait]
impl HttpTransport for StubUpstream {
    async fn execute(&self, request: &GatewayRequest) -> ProviderResult<GatewayResponse> {
        let query: Vec<String> = request
            .query
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect();
        let target = format!("{}?{}", request.url, query.join("&"));
        self.seen.lock().unwrap().push(target.clone());

        Ok(self
            .routes
            .iter()
            .find(|(needle, _, _)| target.contains(needle.as_str()))
            .map(|(_, status, body)| GatewayResponse::new(*status, body.clone()))
            .unwrap_or_else(|| GatewayResponse::new(404, "")))
    }
}

/// Default configuration without gateway spacing or a TMDb key
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.gateway.min_interval = Duration::ZERO;
    config.metadata.tmdb_api_key = None;
    config
}

pub fn build(config: &Config, upstream: Arc<StubUpstream>) -> (ResolverContext, StreamResolver) {
    let ctx = ResolverContext::with_transport(config, upstream);
    let resolver = StreamResolver::from_context(&ctx, config);
    (ctx, resolver)
}
