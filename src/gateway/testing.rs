//! Canned HTTP transport for provider tests

use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::{GatewayRequest, GatewayResponse, HttpTransport, RequestGateway, RetryPolicy};
use crate::errors::ProviderResult;

/// Answers requests from a list of `(needle, status, body)` routes.
///
/// A route matches when the needle occurs in `url?key=value&...` with the
/// query left unencoded. Unmatched requests get a 404.
#[derive(Default)]
pub(crate) struct RouteTransport {
    routes: Vec<(String, u16, String)>,
    requests: Mutex<Vec<GatewayRequest>>,
}

impl RouteTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(mut self, needle: &str, status: u16, body: &str) -> Self {
        self.routes
            .push((needle.to_string(), status, body.to_string()));
        self
    }

    pub fn requests(&self) -> Vec<GatewayRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn gateway(self: &Arc<Self>) -> RequestGateway {
        RequestGateway::new(self.clone(), Duration::ZERO, RetryPolicy::default())
    }

    fn target(request: &GatewayRequest) -> String {
        let query: Vec<String> = request
            .query
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect();
        format!("{}?{}", request.url, query.join("&"))
    }
}

#[async_trait]
impl HttpTransport for RouteTransport {
    async fn execute(&self, request: &GatewayRequest) -> ProviderResult<GatewayResponse> {
        self.requests.lock().unwrap().push(request.clone());
        let target = Self::target(request);
        let response = self
            .routes
            .iter()
            .find(|(needle, _, _)| target.contains(needle.as_str()))
            .map(|(_, status, body)| GatewayResponse::new(*status, body.clone()))
            .unwrap_or_else(|| GatewayResponse::new(404, ""));
        Ok(response)
    }
}
