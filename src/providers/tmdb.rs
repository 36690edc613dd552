//! TMDb client: primary metadata, episode names and alternative titles

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info};

use super::traits::{MetadataProvider, TitleVariationSource};
use crate::config::Config;
use crate::errors::{ProviderError, ProviderResult};
use crate::gateway::{GatewayRequest, RequestGateway};
use crate::models::{EpisodeRef, MediaKind, TitleInfo};
use crate::utils::url::UrlUtils;

pub const PROVIDER_NAME: &str = "tmdb";

/// Well-known movie used to check a credential
const KEY_CHECK_PATH: &str = "movie/550";

#[derive(Debug, Deserialize)]
struct FindResponse {
    #[serde(default)]
    movie_results: Vec<TmdbMovie>,
    #[serde(default)]
    tv_results: Vec<TmdbShow>,
}

#[derive(Debug, Deserialize)]
struct TmdbMovie {
    id: u64,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    original_title: Option<String>,
    #[serde(default)]
    release_date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TmdbShow {
    id: u64,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    original_name: Option<String>,
    #[serde(default)]
    first_air_date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EpisodeDetail {
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    id: u64,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    original_title: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    original_name: Option<String>,
}

/// Movies list these under `titles`, shows under `results`
#[derive(Debug, Deserialize)]
struct AlternativeTitles {
    #[serde(default, alias = "results")]
    titles: Vec<AlternativeTitle>,
}

#[derive(Debug, Deserialize)]
struct AlternativeTitle {
    #[serde(default)]
    title: Option<String>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Year from an ISO date such as `2011-04-17`
pub(crate) fn year_from_date(date: Option<&str>) -> Option<u32> {
    date.and_then(|d| d.get(..4)).and_then(|y| y.parse().ok())
}

impl From<TmdbMovie> for TitleInfo {
    fn from(movie: TmdbMovie) -> Self {
        let original = non_blank(movie.original_title);
        TitleInfo {
            localized_title: non_blank(movie.title),
            original_language_title: original.clone(),
            original_title: original,
            year: year_from_date(movie.release_date.as_deref()),
            kind: Some(MediaKind::Movie),
            external_metadata_id: Some(movie.id),
        }
    }
}

impl From<TmdbShow> for TitleInfo {
    fn from(show: TmdbShow) -> Self {
        let original = non_blank(show.original_name);
        TitleInfo {
            localized_title: non_blank(show.name),
            original_language_title: original.clone(),
            original_title: original,
            year: year_from_date(show.first_air_date.as_deref()),
            kind: Some(MediaKind::Series),
            external_metadata_id: Some(show.id),
        }
    }
}

pub struct TmdbProvider {
    gateway: RequestGateway,
    base_url: String,
    api_key: String,
    language: String,
}

impl TmdbProvider {
    pub fn new<B, K, L>(gateway: RequestGateway, base_url: B, api_key: K, language: L) -> Self
    where
        B: Into<String>,
        K: Into<String>,
        L: Into<String>,
    {
        Self {
            gateway,
            base_url: base_url.into(),
            api_key: api_key.into(),
            language: language.into(),
        }
    }

    /// `None` when no credential is configured
    pub fn from_config(gateway: RequestGateway, config: &Config) -> Option<Self> {
        let key = config.metadata.tmdb_key()?;
        Some(Self::new(
            gateway,
            config.endpoints.tmdb_base_url.clone(),
            key,
            config.metadata.tmdb_language.clone(),
        ))
    }

    fn request(&self, path: &str) -> GatewayRequest {
        GatewayRequest::get(PROVIDER_NAME, UrlUtils::endpoint(&self.base_url, path))
            .query("api_key", self.api_key.as_str())
    }

    fn localized_request(&self, path: &str) -> GatewayRequest {
        self.request(path).query("language", self.language.as_str())
    }

    /// Whether TMDb accepts the credential; other failures are returned as errors
    pub async fn verify_key(&self) -> ProviderResult<bool> {
        match self.gateway.enqueue(self.request(KEY_CHECK_PATH)).await {
            Ok(_) => Ok(true),
            Err(ProviderError::Http { status: 401, .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// First search hit's names followed by its alternative titles
    pub async fn alternative_titles(&self, name: &str, kind: MediaKind) -> ProviderResult<Vec<String>> {
        if name.trim().is_empty() {
            return Ok(Vec::new());
        }

        let segment = match kind {
            MediaKind::Series => "tv",
            _ => "movie",
        };
        debug!("Searching TMDb for alternative titles for \"{}\" ({})", name, kind);

        let search: SearchResponse = self
            .gateway
            .enqueue(
                self.localized_request(&format!("search/{segment}"))
                    .query("query", name),
            )
            .await?
            .json(PROVIDER_NAME)?;

        let Some(hit) = search.results.into_iter().next() else {
            debug!("No TMDb results found for \"{}\"", name);
            return Ok(Vec::new());
        };

        let alternatives: AlternativeTitles = self
            .gateway
            .enqueue(self.request(&format!("{segment}/{}/alternative_titles", hit.id)))
            .await?
            .json(PROVIDER_NAME)?;

        let (primary, original) = match kind {
            MediaKind::Series => (hit.name, hit.original_name),
            _ => (hit.title, hit.original_title),
        };

        let mut titles: Vec<String> = Vec::new();
        let candidates = [primary, original]
            .into_iter()
            .chain(alternatives.titles.into_iter().map(|t| t.title));
        for title in candidates.flatten() {
            let title = title.trim().to_string();
            if !title.is_empty() && !titles.contains(&title) {
                titles.push(title);
            }
        }

        debug!("Found {} alternative titles for \"{}\"", titles.len(), name);
        Ok(titles)
    }
}

#[async_trait]
impl MetadataProvider for TmdbProvider {
    fn name(&self) -> &'static str {
        PROVIDER_NAME
    }

    async fn find_by_external_id(&self, external_id: &str) -> ProviderResult<Option<TitleInfo>> {
        debug!("Fetching title information for {} from TMDb", external_id);
        let found: FindResponse = self
            .gateway
            .enqueue(
                self.localized_request(&format!("find/{external_id}"))
                    .query("external_source", "imdb_id"),
            )
            .await?
            .json(PROVIDER_NAME)?;

        let info = if let Some(movie) = found.movie_results.into_iter().next() {
            TitleInfo::from(movie)
        } else if let Some(show) = found.tv_results.into_iter().next() {
            TitleInfo::from(show)
        } else {
            info!("No results found on TMDb for {}", external_id);
            return Ok(None);
        };

        debug!(
            "TMDb: {} {:?} ({})",
            info.kind.unwrap_or_default(),
            info.display_title().unwrap_or("?"),
            info.year.map(|y| y.to_string()).unwrap_or_else(|| "unknown year".to_string())
        );
        Ok(Some(info))
    }

    async fn episode_title(
        &self,
        metadata_id: u64,
        episode: EpisodeRef,
    ) -> ProviderResult<Option<String>> {
        let path = format!(
            "tv/{metadata_id}/season/{}/episode/{}",
            episode.season, episode.number
        );
        let response = match self.gateway.enqueue(self.localized_request(&path)).await {
            Ok(response) => response,
            Err(ProviderError::Http { status: 404, .. }) => return Ok(None),
            Err(e) => return Err(e),
        };

        let detail: EpisodeDetail = response.json(PROVIDER_NAME)?;
        let name = non_blank(detail.name).map(|n| n.trim().to_string());
        match &name {
            Some(name) => debug!("Found episode {}: {}", episode.sxxeyy(), name),
            None => debug!("No episode data found for {}", episode.sxxeyy()),
        }
        Ok(name)
    }
}

#[async_trait]
impl TitleVariationSource for TmdbProvider {
    fn source_name(&self) -> &'static str {
        PROVIDER_NAME
    }

    async fn variations(&self, title: &str, kind: MediaKind) -> ProviderResult<Vec<String>> {
        self.alternative_titles(title, kind).await
    }
}
