//! Search & match engine: cached provider search plus tier escalation

use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::cache::{TtlCache, cache_key};
use crate::matching::{EpisodePatterns, MatchTier};
use crate::models::{EpisodeRef, SearchResultItem};
use crate::providers::ContentSearchProvider;

pub struct SearchEngine {
    provider: Arc<dyn ContentSearchProvider>,
    cache: TtlCache<String, Vec<SearchResultItem>>,
}

impl SearchEngine {
    pub fn new(
        provider: Arc<dyn ContentSearchProvider>,
        cache: TtlCache<String, Vec<SearchResultItem>>,
    ) -> Self {
        Self { provider, cache }
    }

    /// Provider results for `query`; a failed search counts as no results
    pub async fn search(&self, query: &str) -> Vec<SearchResultItem> {
        let query = query.trim();
        if query.is_empty() {
            return Vec::new();
        }

        let key = cache_key("search", "query", query);
        if let Some(cached) = self.cache.get(&key).await {
            debug!("Search cache hit for \"{}\" ({} items)", query, cached.len());
            return cached;
        }

        match self.provider.search(query).await {
            Ok(items) => {
                self.cache.set(key, items.clone()).await;
                items
            }
            Err(e) => {
                warn!("Search for \"{}\" failed: {}", query, e);
                Vec::new()
            }
        }
    }

    /// Try `queries` in order; for each, test its results tier by tier and
    /// return the first non-empty tier. Later tiers and queries are not tried
    /// once something matched.
    pub async fn search_series_with_pattern(
        &self,
        queries: &[String],
        episode: EpisodeRef,
    ) -> Vec<SearchResultItem> {
        let patterns = EpisodePatterns::for_episode(episode);
        let mut tried = HashSet::new();

        for query in queries {
            if !tried.insert(query.to_lowercase()) {
                continue;
            }

            debug!("Trying query \"{}\"", query);
            let results = self.search(query).await;
            if results.is_empty() {
                continue;
            }

            for tier in MatchTier::ALL {
                let matched: Vec<SearchResultItem> = results
                    .iter()
                    .filter(|item| patterns.matches_tier(&item.title, tier))
                    .cloned()
                    .collect();
                if !matched.is_empty() {
                    info!(
                        "Query \"{}\" matched {} results for {} ({:?} tier)",
                        query,
                        matched.len(),
                        episode.sxxeyy(),
                        tier
                    );
                    return matched;
                }
            }
        }

        Vec::new()
    }

    /// Results of the first query that returns anything
    pub async fn search_first_non_empty(&self, queries: &[String]) -> Vec<SearchResultItem> {
        for query in queries {
            let results = self.search(query).await;
            if !results.is_empty() {
                info!("Query \"{}\" returned {} results", query, results.len());
                return results;
            }
        }
        Vec::new()
    }

    /// Title-only fallback: pool results up to the first productive query,
    /// then keep what matches any episode pattern
    pub async fn generic_search(
        &self,
        queries: &[String],
        episode: EpisodeRef,
    ) -> Vec<SearchResultItem> {
        let mut pooled = Vec::new();
        for query in queries {
            debug!("Generic search for \"{}\"", query);
            let results = self.search(query).await;
            let found = !results.is_empty();
            pooled.extend(results);
            if found {
                break;
            }
        }

        let patterns = EpisodePatterns::for_episode(episode);
        let matched: Vec<SearchResultItem> = pooled
            .into_iter()
            .filter(|item| patterns.matches_any(&item.title))
            .collect();
        debug!("Generic search matched {} results for {}", matched.len(), episode.sxxeyy());
        matched
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ProviderError;
    use crate::providers::traits::MockContentSearchProvider;
    use std::time::Duration;

    fn item(title: &str) -> SearchResultItem {
        SearchResultItem {
            provider_id: Some(title.len().to_string()),
            file_hash: Some("h".to_string()),
            title: title.to_string(),
            size_bytes: None,
            item_kind: crate::models::VIDEO_ITEM_KIND.to_string(),
        }
    }

    fn engine(provider: MockContentSearchProvider) -> SearchEngine {
        SearchEngine::new(
            Arc::new(provider),
            TtlCache::new("search", Duration::from_secs(3600)),
        )
    }

    fn queries(list: &[&str]) -> Vec<String> {
        list.iter().map(|q| q.to_string()).collect()
    }

    #[tokio::test]
    async fn test_search_is_cached() {
        let mut provider = MockContentSearchProvider::new();
        provider
            .expect_search()
            .times(1)
            .returning(|_| Ok(vec![item("Show S01E01")]));
        let engine = engine(provider);

        assert_eq!(engine.search("Show").await.len(), 1);
        assert_eq!(engine.search("Show").await.len(), 1);
    }

    #[tokio::test]
    async fn test_failed_search_is_empty_and_not_cached() {
        let mut provider = MockContentSearchProvider::new();
        provider
            .expect_search()
            .times(2)
            .returning(|_| Err(ProviderError::network("down")));
        let engine = engine(provider);

        assert!(engine.search("Show").await.is_empty());
        assert!(engine.search("Show").await.is_empty());
    }

    #[tokio::test]
    async fn test_tier_two_match_does_not_fall_through() {
        let mut provider = MockContentSearchProvider::new();
        provider.expect_search().times(1).returning(|_| {
            Ok(vec![
                item("Show #04"),
                item("Show - 04"),
                item("Show Episode 4"),
            ])
        });
        let engine = engine(provider);

        let matched = engine
            .search_series_with_pattern(&queries(&["Show S01E04", "Show 01x04"]), EpisodeRef::new(1, 4))
            .await;
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].title, "Show - 04");
    }

    #[tokio::test]
    async fn test_exact_tier_wins_over_anime() {
        let mut provider = MockContentSearchProvider::new();
        provider
            .expect_search()
            .returning(|_| Ok(vec![item("Show - 04"), item("Show S01E04")]));
        let engine = engine(provider);

        let matched = engine
            .search_series_with_pattern(&queries(&["Show"]), EpisodeRef::new(1, 4))
            .await;
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].title, "Show S01E04");
    }

    #[tokio::test]
    async fn test_escalates_to_next_query_when_nothing_matches() {
        let mut provider = MockContentSearchProvider::new();
        provider.expect_search().returning(|query| match query {
            "First" => Ok(vec![item("First S02E01")]),
            "Second" => Ok(vec![item("Second S01E04")]),
            _ => Ok(Vec::new()),
        });
        let engine = engine(provider);

        let matched = engine
            .search_series_with_pattern(&queries(&["First", "first", "Second"]), EpisodeRef::new(1, 4))
            .await;
        assert_eq!(matched[0].title, "Second S01E04");
    }

    #[tokio::test]
    async fn test_first_non_empty_stops_early() {
        let mut provider = MockContentSearchProvider::new();
        provider.expect_search().times(2).returning(|query| match query {
            "Movie 2020" => Ok(Vec::new()),
            _ => Ok(vec![item("Movie 1080p")]),
        });
        let engine = engine(provider);

        let results = engine
            .search_first_non_empty(&queries(&["Movie 2020", "Movie", "Never"]))
            .await;
        assert_eq!(results.len(), 1);
    }

    #[tokio::test]
    async fn test_generic_search_filters_pooled_results() {
        let mut provider = MockContentSearchProvider::new();
        provider.expect_search().returning(|query| match query {
            "Demo Show" => Ok(vec![
                item("Demo Show [04]"),
                item("Demo Show complete"),
            ]),
            _ => Ok(Vec::new()),
        });
        let engine = engine(provider);

        let matched = engine
            .generic_search(&queries(&["Nothing", "Demo Show", "Later"]), EpisodeRef::new(1, 4))
            .await;
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].title, "Demo Show [04]");
    }
}
