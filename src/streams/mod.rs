//! Stream fetcher: provider detail lookups turned into stream descriptors

use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::cache::TtlCache;
use crate::models::{SearchResultItem, StreamDescriptor, StreamVariant};
use crate::providers::ContentSearchProvider;

/// Sort key for quality labels: `"original"` first, then numeric resolution
fn quality_rank(label: &str) -> u32 {
    if label == "original" {
        return u32::MAX;
    }
    let digits: String = label.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().unwrap_or(0)
}

/// Highest resolution first; equal ranks keep provider order
pub fn sort_by_quality(variants: &mut [StreamVariant]) {
    variants.sort_by(|a, b| quality_rank(&b.quality).cmp(&quality_rank(&a.quality)));
}

pub struct StreamFetcher {
    provider: Arc<dyn ContentSearchProvider>,
    cache: TtlCache<(String, String), Vec<StreamVariant>>,
    concurrency: usize,
}

impl StreamFetcher {
    pub fn new(
        provider: Arc<dyn ContentSearchProvider>,
        cache: TtlCache<(String, String), Vec<StreamVariant>>,
        concurrency: usize,
    ) -> Self {
        Self {
            provider,
            cache,
            concurrency: concurrency.max(1),
        }
    }

    /// Descriptors for one search item; empty when the item is unusable or
    /// its detail lookup fails
    pub async fn fetch_streams(&self, item: &SearchResultItem) -> Vec<StreamDescriptor> {
        let (Some(provider_id), Some(file_hash)) = (&item.provider_id, &item.file_hash) else {
            warn!("Skipping result without id or file hash: {:?}", item.title);
            return Vec::new();
        };

        let key = (provider_id.clone(), file_hash.clone());
        let variants = match self.cache.get(&key).await {
            Some(cached) => cached,
            None => match self.provider.get_detail(provider_id, file_hash).await {
                Ok(mut variants) => {
                    sort_by_quality(&mut variants);
                    self.cache.set(key, variants.clone()).await;
                    variants
                }
                Err(e) => {
                    warn!("Detail lookup failed for {} ({}): {}", provider_id, item.title, e);
                    return Vec::new();
                }
            },
        };

        variants
            .into_iter()
            .map(|variant| StreamDescriptor {
                url: variant.url,
                quality_label: variant.quality,
                source_title: item.title.clone(),
                size_bytes: item.size_bytes,
            })
            .collect()
    }

    /// Fetch every item with bounded concurrency; output follows input order
    /// and a failed item contributes nothing
    pub async fn fetch_all(&self, items: &[SearchResultItem]) -> Vec<StreamDescriptor> {
        let per_item: Vec<Vec<StreamDescriptor>> = stream::iter(items)
            .map(|item| self.fetch_streams(item))
            .buffered(self.concurrency)
            .collect()
            .await;

        let descriptors: Vec<StreamDescriptor> = per_item.into_iter().flatten().collect();
        debug!(
            "Fetched {} streams from {} candidates",
            descriptors.len(),
            items.len()
        );
        descriptors
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ProviderError;
    use crate::providers::traits::MockContentSearchProvider;
    use mockall::predicate::eq;
    use std::time::Duration;

    fn item(id: Option<&str>, hash: Option<&str>, title: &str) -> SearchResultItem {
        SearchResultItem {
            provider_id: id.map(str::to_string),
            file_hash: hash.map(str::to_string),
            title: title.to_string(),
            size_bytes: Some(1_073_741_824),
            item_kind: crate::models::VIDEO_ITEM_KIND.to_string(),
        }
    }

    fn variant(quality: &str) -> StreamVariant {
        StreamVariant {
            url: format!("https://cdn/{quality}.mp4"),
            quality: quality.to_string(),
        }
    }

    fn fetcher(provider: MockContentSearchProvider) -> StreamFetcher {
        StreamFetcher::new(
            Arc::new(provider),
            TtlCache::new("streams", Duration::from_secs(3600)),
            4,
        )
    }

    #[test]
    fn test_quality_order() {
        let mut variants = vec![variant("360p"), variant("1080p"), variant("720p")];
        sort_by_quality(&mut variants);
        let labels: Vec<&str> = variants.iter().map(|v| v.quality.as_str()).collect();
        assert_eq!(labels, vec!["1080p", "720p", "360p"]);
    }

    #[tokio::test]
    async fn test_descriptors_carry_item_title_and_size() {
        let mut provider = MockContentSearchProvider::new();
        provider
            .expect_get_detail()
            .with(eq("1"), eq("h"))
            .times(1)
            .returning(|_, _| Ok(vec![variant("720p"), variant("1080p")]));
        let fetcher = fetcher(provider);

        let descriptors = fetcher.fetch_streams(&item(Some("1"), Some("h"), "Demo Show - 04")).await;
        assert_eq!(descriptors.len(), 2);
        assert_eq!(descriptors[0].quality_label, "1080p");
        assert_eq!(descriptors[0].source_title, "Demo Show - 04");
        assert_eq!(descriptors[0].size_bytes, Some(1_073_741_824));

        // Served from cache the second time
        assert_eq!(
            fetcher.fetch_streams(&item(Some("1"), Some("h"), "Demo Show - 04")).await.len(),
            2
        );
    }

    #[tokio::test]
    async fn test_items_without_identity_are_skipped() {
        let mut provider = MockContentSearchProvider::new();
        provider.expect_get_detail().never();
        let fetcher = fetcher(provider);

        assert!(fetcher.fetch_streams(&item(None, Some("h"), "x")).await.is_empty());
        assert!(fetcher.fetch_streams(&item(Some("1"), None, "x")).await.is_empty());
    }

    #[tokio::test]
    async fn test_failures_do_not_abort_siblings() {
        let mut provider = MockContentSearchProvider::new();
        provider.expect_get_detail().returning(|id, _| match id {
            "2" => Err(ProviderError::network("reset")),
            _ => Ok(vec![variant("720p")]),
        });
        let fetcher = fetcher(provider);

        let items = vec![
            item(Some("1"), Some("a"), "first"),
            item(Some("2"), Some("b"), "second"),
            item(None, None, "third"),
            item(Some("4"), Some("d"), "fourth"),
        ];
        let descriptors = fetcher.fetch_all(&items).await;
        let titles: Vec<&str> = descriptors.iter().map(|d| d.source_title.as_str()).collect();
        assert_eq!(titles, vec!["first", "fourth"]);
    }
}
