//! Process-scoped state shared by every pipeline invocation

use std::sync::Arc;

use crate::cache::TtlCache;
use crate::config::Config;
use crate::errors::AppResult;
use crate::gateway::{HttpTransport, RequestGateway, ReqwestTransport};
use crate::models::{SearchResultItem, StreamVariant, TitleInfo};
use crate::queue::FairnessQueue;

/// Gateway, caches and fairness queue, created once and injected into the
/// pipeline instead of living in globals
#[derive(Clone)]
pub struct ResolverContext {
    pub gateway: RequestGateway,
    pub search_cache: TtlCache<String, Vec<SearchResultItem>>,
    pub stream_cache: TtlCache<(String, String), Vec<StreamVariant>>,
    pub title_cache: TtlCache<String, Option<TitleInfo>>,
    pub episode_cache: TtlCache<String, Option<String>>,
    pub queue: FairnessQueue,
}

impl ResolverContext {
    /// Context over an arbitrary transport
    pub fn with_transport(config: &Config, transport: Arc<dyn HttpTransport>) -> Self {
        let ttl = config.cache.ttl;
        Self {
            gateway: RequestGateway::from_config(transport, &config.gateway),
            search_cache: TtlCache::new("search", ttl),
            stream_cache: TtlCache::new("streams", ttl),
            title_cache: TtlCache::new("metadata", ttl),
            episode_cache: TtlCache::new("episodes", ttl),
            queue: FairnessQueue::new(&config.queue),
        }
    }

    /// Context over the production `reqwest` transport
    pub fn from_config(config: &Config) -> AppResult<Self> {
        let transport = ReqwestTransport::new(&config.gateway)?;
        Ok(Self::with_transport(config, Arc::new(transport)))
    }
}
