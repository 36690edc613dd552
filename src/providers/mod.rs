//! Upstream providers: content search, title metadata and title variations

pub mod hellspy;
pub mod tmdb;
pub mod traits;
pub mod variations;
pub mod wikidata;

pub use hellspy::HellspyProvider;
pub use tmdb::TmdbProvider;
pub use traits::{ContentSearchProvider, MetadataProvider, TitleVariationSource};
pub use variations::{StaticAliasTable, TitleVariations};
pub use wikidata::WikidataProvider;
