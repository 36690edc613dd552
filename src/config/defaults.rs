/// Configuration default values
///
/// All default values for configuration options live here so they can be
/// changed in one place.
// Request gateway defaults
pub const DEFAULT_MIN_INTERVAL_MS: u64 = 1000;
pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_RETRY_BASE_DELAY_MS: u64 = 2000;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_USER_AGENT: &str = concat!("stream-resolver/", env!("CARGO_PKG_VERSION"));

// Cache defaults
pub const DEFAULT_CACHE_TTL_SECS: u64 = 3600;

// Search defaults
pub const DEFAULT_PAGE_LIMIT: u32 = 64;
pub const DEFAULT_MAX_CANDIDATES: usize = 10;
pub const DEFAULT_FETCH_CONCURRENCY: usize = 4;

// Metadata defaults
pub const DEFAULT_TMDB_LANGUAGE: &str = "cs-CZ";
pub const DEFAULT_WIKIDATA_LANGUAGE: &str = "cs";

// Fairness queue defaults
pub const DEFAULT_MAX_CONCURRENT: usize = 1;
pub const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 300;
pub const DEFAULT_PROMOTION_DELAY_MS: u64 = 250;
pub const DEFAULT_ESTIMATED_REQUEST_SECS: u64 = 20;
pub const DEFAULT_MAX_WAIT_SECS: u64 = 30;

// Pipeline defaults
pub const DEFAULT_RESOLVE_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_ADDON_NAME: &str = "Hellspy";

// Upstream endpoints
pub const DEFAULT_SEARCH_BASE_URL: &str = "https://api.hellspy.to/gw";
pub const DEFAULT_TMDB_BASE_URL: &str = "https://api.themoviedb.org/3";
pub const DEFAULT_WIKIDATA_ENDPOINT: &str = "https://query.wikidata.org/sparql";
