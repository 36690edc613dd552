//! Hellspy content-search client

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use super::traits::ContentSearchProvider;
use crate::config::Config;
use crate::errors::ProviderResult;
use crate::gateway::{GatewayRequest, RequestGateway};
use crate::models::{SearchResultItem, StreamVariant};
use crate::utils::url::UrlUtils;

pub const PROVIDER_NAME: &str = "hellspy";

#[derive(Debug, Deserialize)]
struct SearchPage {
    #[serde(default)]
    items: Vec<RawSearchItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSearchItem {
    #[serde(default)]
    id: Value,
    #[serde(default)]
    file_hash: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    size: Value,
    #[serde(default)]
    object_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VideoDetail {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    duration: Option<f64>,
    /// Quality key (`"720"`) to URL; an empty list when there are none
    #[serde(default)]
    conversions: Value,
    #[serde(default)]
    download: Option<String>,
}

/// Identifier that may arrive as a JSON string or number
fn value_as_id(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn value_as_size(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

impl From<RawSearchItem> for SearchResultItem {
    fn from(raw: RawSearchItem) -> Self {
        SearchResultItem {
            provider_id: value_as_id(&raw.id),
            file_hash: raw.file_hash.filter(|h| !h.trim().is_empty()),
            title: raw.title.unwrap_or_default(),
            size_bytes: value_as_size(&raw.size),
            item_kind: raw.object_type.unwrap_or_default(),
        }
    }
}

/// One variant per conversion; the direct download only when there are none
fn variants_from_detail(detail: &VideoDetail) -> Vec<StreamVariant> {
    let mut variants: Vec<StreamVariant> = match &detail.conversions {
        Value::Object(map) => map
            .iter()
            .filter_map(|(quality, url)| {
                let url = url.as_str()?.trim();
                (!url.is_empty()).then(|| StreamVariant {
                    url: url.to_string(),
                    quality: format!("{quality}p"),
                })
            })
            .collect(),
        _ => Vec::new(),
    };

    if variants.is_empty()
        && let Some(download) = detail.download.as_deref().filter(|d| !d.trim().is_empty())
    {
        debug!("No conversions available, using direct download link");
        variants.push(StreamVariant {
            url: download.to_string(),
            quality: "original".to_string(),
        });
    }

    variants
}

pub struct HellspyProvider {
    gateway: RequestGateway,
    base_url: String,
    page_limit: u32,
}

impl HellspyProvider {
    pub fn new<S: Into<String>>(gateway: RequestGateway, base_url: S, page_limit: u32) -> Self {
        Self {
            gateway,
            base_url: base_url.into(),
            page_limit,
        }
    }

    pub fn from_config(gateway: RequestGateway, config: &Config) -> Self {
        Self::new(
            gateway,
            config.endpoints.search_base_url.clone(),
            config.search.page_limit,
        )
    }
}

#[async_trait]
impl ContentSearchProvider for HellspyProvider {
    async fn search(&self, query: &str) -> ProviderResult<Vec<SearchResultItem>> {
        debug!("Searching Hellspy for \"{}\"", query);
        let request = GatewayRequest::get(PROVIDER_NAME, UrlUtils::endpoint(&self.base_url, "search"))
            .query("query", query)
            .query("offset", "0")
            .query("limit", self.page_limit.to_string());

        let page: SearchPage = self.gateway.enqueue(request).await?.json(PROVIDER_NAME)?;
        let total = page.items.len();
        let items: Vec<SearchResultItem> = page
            .items
            .into_iter()
            .map(SearchResultItem::from)
            .filter(SearchResultItem::is_video)
            .collect();

        debug!(
            "Hellspy returned {} items for \"{}\" ({} videos)",
            total,
            query,
            items.len()
        );
        Ok(items)
    }

    async fn get_detail(
        &self,
        provider_id: &str,
        file_hash: &str,
    ) -> ProviderResult<Vec<StreamVariant>> {
        let path = format!("video/{provider_id}/{file_hash}");
        let request = GatewayRequest::get(PROVIDER_NAME, UrlUtils::endpoint(&self.base_url, &path));

        let detail: VideoDetail = self.gateway.enqueue(request).await?.json(PROVIDER_NAME)?;
        let duration = detail.duration.unwrap_or(0.0) as u64;
        debug!(
            "Found video \"{}\" ({}m {}s)",
            detail.title.as_deref().unwrap_or_default(),
            duration / 60,
            duration % 60
        );

        let variants = variants_from_detail(&detail);
        debug!(
            "Found {} quality options for {}: {}",
            variants.len(),
            provider_id,
            variants
                .iter()
                .map(|v| v.quality.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );
        Ok(variants)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ProviderError;
    use crate::gateway::testing::RouteTransport;
    use std::sync::Arc;

    fn provider(transport: &Arc<RouteTransport>) -> HellspyProvider {
        HellspyProvider::new(transport.gateway(), "https://api.test/gw", 64)
    }

    #[tokio::test]
    async fn test_search_keeps_only_video_items() {
        let transport = Arc::new(RouteTransport::new().route(
            "/gw/search",
            200,
            r#"{"items":[
                {"objectType":"GWSearchVideo","id":123,"fileHash":"abc","title":"Demo Show - 04","size":1073741824},
                {"objectType":"GWSearchFolder","id":"9","title":"Folder"},
                {"objectType":"GWSearchVideo","id":"456","title":"No hash"}
            ]}"#,
        ));

        let items = provider(&transport).search("Demo Show").await.unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].provider_id.as_deref(), Some("123"));
        assert_eq!(items[0].file_hash.as_deref(), Some("abc"));
        assert_eq!(items[0].size_bytes, Some(1_073_741_824));
        assert_eq!(items[1].provider_id.as_deref(), Some("456"));
        assert!(items[1].file_hash.is_none());

        let request = &transport.requests()[0];
        assert_eq!(request.url, "https://api.test/gw/search");
        assert!(request.query.contains(&("query".to_string(), "Demo Show".to_string())));
        assert!(request.query.contains(&("limit".to_string(), "64".to_string())));
    }

    #[tokio::test]
    async fn test_search_without_items_is_empty() {
        let transport = Arc::new(RouteTransport::new().route("/gw/search", 200, "{}"));
        assert!(provider(&transport).search("x").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_search_reports_malformed_body() {
        let transport = Arc::new(RouteTransport::new().route("/gw/search", 200, "not json"));
        let err = provider(&transport).search("x").await.unwrap_err();
        assert!(matches!(err, ProviderError::Malformed { .. }));
    }

    #[tokio::test]
    async fn test_detail_emits_one_variant_per_conversion() {
        let transport = Arc::new(RouteTransport::new().route(
            "/gw/video/1/h",
            200,
            r#"{"title":"Demo","duration":1500,"conversions":{"720":"https://cdn/720.mp4","1080":"https://cdn/1080.mp4"},"download":"https://cdn/orig.mkv"}"#,
        ));

        let mut variants = provider(&transport).get_detail("1", "h").await.unwrap();
        variants.sort_by(|a, b| a.quality.cmp(&b.quality));
        assert_eq!(variants.len(), 2);
        assert_eq!(variants[0].quality, "1080p");
        assert_eq!(variants[1].quality, "720p");
        assert_eq!(variants[1].url, "https://cdn/720.mp4");
    }

    #[tokio::test]
    async fn test_detail_falls_back_to_download_link() {
        let transport = Arc::new(RouteTransport::new().route(
            "/gw/video/1/h",
            200,
            r#"{"title":"Demo","conversions":[],"download":"https://cdn/orig.mkv"}"#,
        ));

        let variants = provider(&transport).get_detail("1", "h").await.unwrap();
        assert_eq!(
            variants,
            vec![StreamVariant {
                url: "https://cdn/orig.mkv".to_string(),
                quality: "original".to_string()
            }]
        );
    }

    #[tokio::test]
    async fn test_detail_without_links_is_empty() {
        let transport = Arc::new(RouteTransport::new().route("/gw/video/1/h", 200, r#"{"title":"x"}"#));
        assert!(provider(&transport).get_detail("1", "h").await.unwrap().is_empty());
    }
}
