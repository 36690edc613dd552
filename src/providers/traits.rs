//! Provider seams consumed by the resolution pipeline

use async_trait::async_trait;

use crate::errors::ProviderResult;
use crate::models::{EpisodeRef, MediaKind, SearchResultItem, StreamVariant, TitleInfo};

/// Full-text search over the content provider's catalog
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ContentSearchProvider: Send + Sync {
    /// Video items matching `query`; non-video items are already dropped
    async fn search(&self, query: &str) -> ProviderResult<Vec<SearchResultItem>>;

    /// Playable encodings of one item
    async fn get_detail(
        &self,
        provider_id: &str,
        file_hash: &str,
    ) -> ProviderResult<Vec<StreamVariant>>;
}

/// Maps an external catalog identifier to title metadata
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MetadataProvider: Send + Sync {
    fn name(&self) -> &'static str;

    /// `Ok(None)` when the provider has no entry for the identifier
    async fn find_by_external_id(&self, external_id: &str) -> ProviderResult<Option<TitleInfo>>;

    /// Localized episode name, for providers that know about episodes
    async fn episode_title(
        &self,
        _metadata_id: u64,
        _episode: EpisodeRef,
    ) -> ProviderResult<Option<String>> {
        Ok(None)
    }
}

/// Supplies alternate names (aliases, translations) for a title
#[async_trait]
pub trait TitleVariationSource: Send + Sync {
    fn source_name(&self) -> &'static str;

    /// Alternate names for `title`; may or may not include `title` itself
    async fn variations(&self, title: &str, kind: MediaKind) -> ProviderResult<Vec<String>>;
}
