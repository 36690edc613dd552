//! Title resolution: external identifier to [`TitleInfo`].
//!
//! The credential-gated primary provider is asked first; the fallback only
//! when the primary has nothing usable. Lookups, misses included, are cached.

use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::cache::{TtlCache, cache_key};
use crate::models::{EpisodeRef, TitleInfo};
use crate::providers::MetadataProvider;

pub struct TitleResolver {
    primary: Option<Arc<dyn MetadataProvider>>,
    fallback: Arc<dyn MetadataProvider>,
    titles: TtlCache<String, Option<TitleInfo>>,
    episode_titles: TtlCache<String, Option<String>>,
}

impl TitleResolver {
    pub fn new(
        primary: Option<Arc<dyn MetadataProvider>>,
        fallback: Arc<dyn MetadataProvider>,
        titles: TtlCache<String, Option<TitleInfo>>,
        episode_titles: TtlCache<String, Option<String>>,
    ) -> Self {
        Self {
            primary,
            fallback,
            titles,
            episode_titles,
        }
    }

    /// Title metadata for `external_id`, or `None` when no provider knows it
    pub async fn resolve(&self, external_id: &str) -> Option<TitleInfo> {
        let primary = match &self.primary {
            Some(provider) => self.lookup(provider.as_ref(), external_id).await,
            None => None,
        };

        let resolved = match primary {
            Some(info) if info.display_title().is_some() => Some(info),
            partial => {
                let fallback = self.lookup(self.fallback.as_ref(), external_id).await;
                match (partial, fallback) {
                    (Some(partial), Some(fallback)) => Some(partial.merge(fallback)),
                    (partial, fallback) => fallback.or(partial),
                }
            }
        };

        match &resolved {
            Some(info) => debug!(
                "Resolved {} to {:?} ({})",
                external_id,
                info.display_title(),
                info.year.map(|y| y.to_string()).unwrap_or_else(|| "unknown year".to_string())
            ),
            None => info!("Could not resolve a title for {}", external_id),
        }
        resolved
    }

    /// Localized episode name from the primary provider, when it has one
    pub async fn episode_title(&self, info: &TitleInfo, episode: EpisodeRef) -> Option<String> {
        let provider = self.primary.as_ref()?;
        let metadata_id = info.external_metadata_id?;

        let key = cache_key(
            provider.name(),
            "episode",
            &format!("{metadata_id}:{}", episode.sxxeyy()),
        );
        if let Some(cached) = self.episode_titles.get(&key).await {
            return cached;
        }

        match provider.episode_title(metadata_id, episode).await {
            Ok(name) => {
                self.episode_titles.set(key, name.clone()).await;
                name
            }
            Err(e) => {
                warn!(
                    "{} episode lookup failed for {} {}: {}",
                    provider.name(),
                    metadata_id,
                    episode.sxxeyy(),
                    e
                );
                None
            }
        }
    }

    /// Cached provider lookup; errors are logged and not cached
    async fn lookup(&self, provider: &dyn MetadataProvider, external_id: &str) -> Option<TitleInfo> {
        let key = cache_key(provider.name(), "find", external_id);
        if let Some(cached) = self.titles.get(&key).await {
            return cached;
        }

        match provider.find_by_external_id(external_id).await {
            Ok(info) => {
                self.titles.set(key, info.clone()).await;
                info
            }
            Err(e) => {
                warn!("{} lookup failed for {}: {}", provider.name(), external_id, e);
                None
            }
        }
    }
}
