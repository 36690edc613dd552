//! Stream resolution pipeline: title, queries, search, ranking, streams

use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::context::ResolverContext;
use crate::errors::{AppError, AppResult};
use crate::matching::filter_and_rank;
use crate::models::{
    EpisodeRef, MediaKind, MediaRequest, RequesterId, SearchResultItem, StreamDescriptor,
    StreamResponse, TitleInfo,
};
use crate::providers::{
    ContentSearchProvider, HellspyProvider, MetadataProvider, TitleVariations, TmdbProvider,
    WikidataProvider,
};
use crate::query::QueryGenerator;
use crate::queue::FairnessQueue;
use crate::resolver::TitleResolver;
use crate::search::SearchEngine;
use crate::streams::StreamFetcher;

/// Upstream collaborators the pipeline is built over
pub struct PipelineProviders {
    pub search: Arc<dyn ContentSearchProvider>,
    pub primary: Option<Arc<dyn MetadataProvider>>,
    pub fallback: Arc<dyn MetadataProvider>,
    pub variations: TitleVariations,
}

impl PipelineProviders {
    /// Hellspy search, TMDb when a key is configured, Wikidata fallback
    pub fn from_context(ctx: &ResolverContext, config: &Config) -> Self {
        let tmdb = TmdbProvider::from_config(ctx.gateway.clone(), config).map(Arc::new);

        let mut variations = TitleVariations::static_only();
        if config.metadata.use_alternative_titles
            && let Some(tmdb) = &tmdb
        {
            variations = variations.with_source(tmdb.clone());
        }

        match &tmdb {
            Some(_) => info!("TMDb configured as primary metadata source"),
            None => info!("No TMDb key configured, using Wikidata only"),
        }

        Self {
            search: Arc::new(HellspyProvider::from_config(ctx.gateway.clone(), config)),
            primary: tmdb.map(|t| t as Arc<dyn MetadataProvider>),
            fallback: Arc::new(WikidataProvider::from_config(ctx.gateway.clone(), config)),
            variations,
        }
    }
}

/// Kind precedence: explicit, then episode presence, then metadata
fn infer_kind(request: &MediaRequest, info: &TitleInfo) -> MediaKind {
    if request.kind != MediaKind::Unknown {
        return request.kind;
    }
    if request.episode.is_some() {
        return MediaKind::Series;
    }
    info.kind.unwrap_or_default()
}

/// Split a compound id the caller did not already split
fn normalize(request: MediaRequest) -> AppResult<MediaRequest> {
    if request.external_id.trim().is_empty() {
        return Err(AppError::validation("Empty media identifier"));
    }
    if request.episode.is_some() || !request.external_id.contains(':') {
        return Ok(request);
    }

    let parsed = MediaRequest::from_compound_id(request.kind, &request.external_id);
    Ok(MediaRequest {
        display_name: request.display_name,
        year: request.year,
        ..parsed
    })
}

pub struct StreamResolver {
    resolver: TitleResolver,
    variations: TitleVariations,
    search: SearchEngine,
    fetcher: StreamFetcher,
    queue: FairnessQueue,
    resolve_timeout: Duration,
    max_wait: Duration,
    max_candidates: usize,
    addon_name: String,
}

impl StreamResolver {
    pub fn new(ctx: &ResolverContext, config: &Config, providers: PipelineProviders) -> Self {
        Self {
            resolver: TitleResolver::new(
                providers.primary,
                providers.fallback,
                ctx.title_cache.clone(),
                ctx.episode_cache.clone(),
            ),
            variations: providers.variations,
            search: SearchEngine::new(providers.search.clone(), ctx.search_cache.clone()),
            fetcher: StreamFetcher::new(
                providers.search,
                ctx.stream_cache.clone(),
                config.search.fetch_concurrency,
            ),
            queue: ctx.queue.clone(),
            resolve_timeout: config.pipeline.resolve_timeout,
            max_wait: config.queue.max_wait,
            max_candidates: config.search.max_candidates,
            addon_name: config.pipeline.addon_name.clone(),
        }
    }

    /// Pipeline over the production providers
    pub fn from_context(ctx: &ResolverContext, config: &Config) -> Self {
        Self::new(ctx, config, PipelineProviders::from_context(ctx, config))
    }

    /// Admit `requester` through the fairness queue, then resolve.
    ///
    /// A requester still queued after `queue.max_wait` gets an empty list with
    /// a notice carrying its position and ETA.
    pub async fn handle(&self, requester: &RequesterId, request: MediaRequest) -> StreamResponse {
        let admission = self.queue.wait_for_turn(requester, self.max_wait).await;
        if !admission.admitted {
            info!(
                "Requester {} still queued at position {:?}",
                requester, admission.queue_position
            );
            return StreamResponse::with_notice(admission.notice());
        }

        let guard = self.queue.guard(requester);
        let response = self.resolve_streams(request).await;
        guard.release().await;
        response
    }

    /// Resolve `request` into stream descriptors within the time limit.
    ///
    /// Never fails: misses, upstream failures and timeouts all yield an
    /// empty response.
    pub async fn resolve_streams(&self, request: MediaRequest) -> StreamResponse {
        let external_id = request.external_id.clone();
        match timeout(self.resolve_timeout, self.run(request)).await {
            Ok(Ok(descriptors)) => {
                info!("Resolved {} streams for {}", descriptors.len(), external_id);
                StreamResponse::from_descriptors(&descriptors, &self.addon_name)
            }
            Ok(Err(e)) => {
                error!("Stream resolution failed for {}: {}", external_id, e);
                StreamResponse::empty()
            }
            Err(_) => {
                warn!(
                    "Stream resolution for {} exceeded {:?}",
                    external_id, self.resolve_timeout
                );
                StreamResponse::empty()
            }
        }
    }

    async fn run(&self, request: MediaRequest) -> AppResult<Vec<StreamDescriptor>> {
        let request = normalize(request)?;
        debug!(
            "Resolving {} {} (episode {:?})",
            request.kind, request.external_id, request.episode
        );

        let info = match &request.display_name {
            Some(name) => TitleInfo {
                localized_title: Some(name.trim().to_string()),
                year: request.year,
                ..Default::default()
            },
            None if request.has_catalog_id() => {
                match self.resolver.resolve(&request.external_id).await {
                    Some(info) => info,
                    None => {
                        info!("No title found for {}", request.external_id);
                        return Ok(Vec::new());
                    }
                }
            }
            None => {
                info!("No title or catalog id for {}", request.external_id);
                return Ok(Vec::new());
            }
        };

        let Some(title) = info.display_title().map(str::to_string) else {
            info!("No usable title for {}", request.external_id);
            return Ok(Vec::new());
        };

        let kind = infer_kind(&request, &info);
        let year = request.year.or(info.year);
        let request = MediaRequest {
            kind,
            year,
            ..request
        };
        info!("Searching for \"{}\" as {}", title, kind);

        let variations = self.variations.collect(&title, kind).await;
        let results = match request.series_episode() {
            Some(episode) => {
                self.search_episode(&request, &title, episode, &variations)
                    .await
            }
            None => self.search_title(&request, &title, &variations).await,
        };

        if results.is_empty() {
            info!("No search results for \"{}\"", title);
            return Ok(Vec::new());
        }

        let candidates = filter_and_rank(results, &request, self.max_candidates);
        if candidates.is_empty() {
            info!("No candidates survived filtering for \"{}\"", title);
            return Ok(Vec::new());
        }
        debug!("Fetching streams for {} candidates", candidates.len());
        Ok(self.fetcher.fetch_all(&candidates).await)
    }

    /// Resolved metadata whose English title differs from `title`
    async fn alternate(&self, request: &MediaRequest, title: &str) -> Option<(TitleInfo, String)> {
        if !request.has_catalog_id() {
            return None;
        }
        let info = self.resolver.resolve(&request.external_id).await?;
        let alternate = info
            .original_language_title
            .clone()
            .filter(|alt| !alt.trim().is_empty() && !alt.eq_ignore_ascii_case(title))?;
        Some((info, alternate))
    }

    /// Episode templates, then the alternate title, then title-only queries
    async fn search_episode(
        &self,
        request: &MediaRequest,
        title: &str,
        episode: EpisodeRef,
        variations: &[String],
    ) -> Vec<SearchResultItem> {
        let queries = QueryGenerator::series_queries(title, episode, variations);
        let results = self.search.search_series_with_pattern(&queries, episode).await;
        if !results.is_empty() {
            return results;
        }

        if let Some((info, alternate)) = self.alternate(request, title).await {
            info!("Trying alternate title \"{}\"", alternate);
            let episode_title = self.resolver.episode_title(&info, episode).await;
            let queries =
                QueryGenerator::alternate_series_queries(&alternate, episode, episode_title.as_deref());
            let results = self.search.search_series_with_pattern(&queries, episode).await;
            if !results.is_empty() {
                return results;
            }
        }

        info!("No episode matches for \"{}\", trying generic search", title);
        let queries = QueryGenerator::generic_queries(title, variations);
        self.search.generic_search(&queries, episode).await
    }

    /// Movie or unknown kind: first productive query, then the alternate title
    async fn search_title(
        &self,
        request: &MediaRequest,
        title: &str,
        variations: &[String],
    ) -> Vec<SearchResultItem> {
        let info = TitleInfo {
            localized_title: Some(title.to_string()),
            year: request.year,
            ..Default::default()
        };
        let queries = QueryGenerator::generate(&info, request.kind, None, variations);
        let results = self.search.search_first_non_empty(&queries).await;
        if !results.is_empty() {
            return results;
        }

        match self.alternate(request, title).await {
            Some((_, alternate)) => {
                info!("Trying alternate title \"{}\"", alternate);
                let queries = QueryGenerator::movie_queries(&alternate, request.year);
                self.search.search_first_non_empty(&queries).await
            }
            None => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ProviderError;
    use crate::gateway::testing::RouteTransport;
    use crate::models::{StreamVariant, VIDEO_ITEM_KIND};
    use crate::providers::traits::{MockContentSearchProvider, MockMetadataProvider};
    use mockall::predicate::eq;

    fn item(id: &str, title: &str, size: u64) -> SearchResultItem {
        SearchResultItem {
            provider_id: Some(id.to_string()),
            file_hash: Some(format!("h{id}")),
            title: title.to_string(),
            size_bytes: Some(size),
            item_kind: VIDEO_ITEM_KIND.to_string(),
        }
    }

    fn variant(quality: &str) -> StreamVariant {
        StreamVariant {
            url: format!("https://cdn.test/{quality}.mp4"),
            quality: quality.to_string(),
        }
    }

    fn resolver_with(
        search: impl ContentSearchProvider + 'static,
        mut fallback: MockMetadataProvider,
        config: &Config,
    ) -> StreamResolver {
        fallback.expect_name().return_const("wikidata");
        let ctx = ResolverContext::with_transport(config, Arc::new(RouteTransport::new()));
        let providers = PipelineProviders {
            search: Arc::new(search),
            primary: None,
            fallback: Arc::new(fallback) as Arc<dyn MetadataProvider>,
            variations: TitleVariations::new(Vec::new()),
        };
        StreamResolver::new(&ctx, config, providers)
    }

    fn title(localized: &str, english: Option<&str>, kind: MediaKind) -> TitleInfo {
        TitleInfo {
            localized_title: Some(localized.to_string()),
            original_language_title: english.map(str::to_string),
            kind: Some(kind),
            ..Default::default()
        }
    }

    #[test]
    fn test_normalize_splits_compound_ids() {
        let request = MediaRequest {
            kind: MediaKind::Unknown,
            external_id: "tt0944947:2:5".to_string(),
            display_name: Some("Hra o trůny".to_string()),
            episode: None,
            year: Some(2011),
        };
        let request = normalize(request).unwrap();
        assert_eq!(request.external_id, "tt0944947");
        assert_eq!(request.kind, MediaKind::Series);
        assert_eq!(request.episode, Some(EpisodeRef::new(2, 5)));
        assert_eq!(request.display_name.as_deref(), Some("Hra o trůny"));
        assert_eq!(request.year, Some(2011));

        assert!(normalize(MediaRequest::from_compound_id(MediaKind::Movie, " ")).is_err());
    }

    #[test]
    fn test_infer_kind_precedence() {
        let info = title("X", None, MediaKind::Movie);
        let explicit = MediaRequest::from_compound_id(MediaKind::Series, "tt1");
        assert_eq!(infer_kind(&explicit, &info), MediaKind::Series);

        let unknown = MediaRequest::from_compound_id(MediaKind::Unknown, "tt1");
        assert_eq!(infer_kind(&unknown, &info), MediaKind::Movie);
        assert_eq!(infer_kind(&unknown, &TitleInfo::default()), MediaKind::Unknown);
    }

    #[tokio::test]
    async fn test_series_request_resolves_title_and_streams() {
        let mut fallback = MockMetadataProvider::new();
        fallback
            .expect_find_by_external_id()
            .with(eq("tt1234567"))
            .times(1)
            .returning(|_| Ok(Some(title("Demo Show", None, MediaKind::Series))));

        let mut search = MockContentSearchProvider::new();
        search.expect_search().returning(|query| {
            if query == "Demo Show S01E04" {
                Ok(vec![item("1", "Demo.Show.S01E04.1080p", 2_000_000_000)])
            } else {
                Ok(Vec::new())
            }
        });
        search
            .expect_get_detail()
            .with(eq("1"), eq("h1"))
            .returning(|_, _| Ok(vec![variant("720p"), variant("1080p")]));

        let resolver = resolver_with(search, fallback, &Config::default());
        let response = resolver
            .resolve_streams(MediaRequest::from_compound_id(MediaKind::Series, "tt1234567:1:4"))
            .await;

        assert_eq!(response.streams.len(), 2);
        assert_eq!(response.streams[0].quality, "1080p");
        assert!(response.streams[0].title.starts_with("Demo.Show.S01E04.1080p\n1080p | "));
        assert_eq!(response.streams[0].name, "Hellspy - 1080p");
    }

    #[tokio::test]
    async fn test_alternate_title_pass_runs_after_primary_queries() {
        let mut fallback = MockMetadataProvider::new();
        fallback
            .expect_find_by_external_id()
            .returning(|_| Ok(Some(title("Hra o trůny", Some("Game of Thrones"), MediaKind::Series))));

        let mut search = MockContentSearchProvider::new();
        search.expect_search().returning(|query| {
            if query == "Game of Thrones S02E05" {
                Ok(vec![item("7", "Game.of.Thrones.S02E05.720p", 1_000)])
            } else {
                Ok(Vec::new())
            }
        });
        search
            .expect_get_detail()
            .returning(|_, _| Ok(vec![variant("720p")]));

        let resolver = resolver_with(search, fallback, &Config::default());
        let response = resolver
            .resolve_streams(MediaRequest::from_compound_id(MediaKind::Series, "tt0944947:2:5"))
            .await;

        assert_eq!(response.streams.len(), 1);
        assert_eq!(response.streams[0].quality, "720p");
    }

    #[tokio::test]
    async fn test_display_name_skips_title_resolution() {
        let mut fallback = MockMetadataProvider::new();
        fallback.expect_find_by_external_id().never();

        let mut search = MockContentSearchProvider::new();
        search.expect_search().returning(|query| {
            if query == "Inception 2010" {
                Ok(vec![
                    item("1", "Inception S01E01", 5_000),
                    item("2", "Inception 2010 1080p", 4_000),
                ])
            } else {
                Ok(Vec::new())
            }
        });
        search
            .expect_get_detail()
            .with(eq("2"), eq("h2"))
            .times(1)
            .returning(|_, _| Ok(vec![variant("original")]));

        let resolver = resolver_with(search, fallback, &Config::default());
        let request = MediaRequest::from_compound_id(MediaKind::Movie, "kitsu:999")
            .with_display_name("Inception")
            .with_year(2010);
        let response = resolver.resolve_streams(request).await;

        assert_eq!(response.streams.len(), 1);
        assert_eq!(response.streams[0].quality, "original");
    }

    #[tokio::test]
    async fn test_unresolvable_id_is_empty() {
        let mut fallback = MockMetadataProvider::new();
        fallback
            .expect_find_by_external_id()
            .returning(|_| Err(ProviderError::network("unreachable")));
        let mut search = MockContentSearchProvider::new();
        search.expect_search().never();

        let resolver = resolver_with(search, fallback, &Config::default());
        let response = resolver
            .resolve_streams(MediaRequest::from_compound_id(MediaKind::Movie, "tt0000000"))
            .await;
        assert!(response.streams.is_empty());
        assert!(response.notice.is_none());
    }

    struct SlowSearch;

    #[async_trait::async_trait]
    impl ContentSearchProvider for SlowSearch {
        async fn search(&self, _query: &str) -> crate::errors::ProviderResult<Vec<SearchResultItem>> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(vec![item("1", "Slow 2020", 1)])
        }

        async fn get_detail(
            &self,
            _provider_id: &str,
            _file_hash: &str,
        ) -> crate::errors::ProviderResult<Vec<StreamVariant>> {
            Ok(vec![variant("720p")])
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_time_limit_yields_empty_response() {
        let mut config = Config::default();
        config.pipeline.resolve_timeout = Duration::from_secs(5);

        let mut fallback = MockMetadataProvider::new();
        fallback.expect_find_by_external_id().never();

        let resolver = resolver_with(SlowSearch, fallback, &config);
        let request = MediaRequest::from_compound_id(MediaKind::Movie, "x").with_display_name("Slow");
        let response = resolver.resolve_streams(request).await;
        assert!(response.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_handle_releases_slot() {
        let mut fallback = MockMetadataProvider::new();
        fallback.expect_find_by_external_id().returning(|_| Ok(None));
        let search = MockContentSearchProvider::new();

        let resolver = resolver_with(search, fallback, &Config::default());
        let requester = RequesterId::new("a");
        let response = resolver
            .handle(&requester, MediaRequest::from_compound_id(MediaKind::Movie, "tt1"))
            .await;
        assert!(response.streams.is_empty());

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(resolver.queue.stats().await.processing, 0);
    }
}
