//! Domain types shared by every stage of the resolution pipeline.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

use crate::errors::AppError;

/// What the caller asked for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Movie,
    Series,
    #[default]
    Unknown,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Movie => "movie",
            MediaKind::Series => "series",
            MediaKind::Unknown => "unknown",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MediaKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "movie" => Ok(MediaKind::Movie),
            "series" | "tv" => Ok(MediaKind::Series),
            "" | "unknown" => Ok(MediaKind::Unknown),
            other => Err(AppError::validation(format!("Unknown media kind '{other}'"))),
        }
    }
}

/// Season/episode coordinates of a series request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EpisodeRef {
    pub season: u32,
    pub number: u32,
}

impl EpisodeRef {
    pub fn new(season: u32, number: u32) -> Self {
        Self { season, number }
    }

    /// Season zero-padded to two digits
    pub fn season_padded(&self) -> String {
        format!("{:02}", self.season)
    }

    /// Episode zero-padded to two digits
    pub fn episode_padded(&self) -> String {
        format!("{:02}", self.number)
    }

    /// `S01E04`
    pub fn sxxeyy(&self) -> String {
        format!("S{:02}E{:02}", self.season, self.number)
    }

    /// `01x04`
    pub fn cross_form(&self) -> String {
        format!("{:02}x{:02}", self.season, self.number)
    }
}

/// One inbound stream request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaRequest {
    #[serde(default)]
    pub kind: MediaKind,
    pub external_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub episode: Option<EpisodeRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<u32>,
}

impl MediaRequest {
    /// Build a request from a possibly compound identifier (`tt123:1:4`).
    ///
    /// A well-formed `:season:episode` suffix is split off into [`EpisodeRef`]
    /// and makes an unknown kind a series. Anything else keeps the identifier
    /// untouched.
    pub fn from_compound_id(kind: MediaKind, id: &str) -> Self {
        let id = id.trim();
        let mut parts = id.split(':');
        let base = parts.next().unwrap_or_default();
        let rest: Vec<&str> = parts.collect();

        let episode = match rest.as_slice() {
            [season, number] => match (season.parse::<u32>(), number.parse::<u32>()) {
                (Ok(season), Ok(number)) => Some(EpisodeRef::new(season, number)),
                _ => None,
            },
            _ => None,
        };

        match episode {
            Some(episode) => Self {
                kind: if kind == MediaKind::Unknown {
                    MediaKind::Series
                } else {
                    kind
                },
                external_id: base.to_string(),
                display_name: None,
                episode: Some(episode),
                year: None,
            },
            None => Self {
                kind,
                external_id: id.to_string(),
                display_name: None,
                episode: None,
                year: None,
            },
        }
    }

    pub fn with_display_name<S: Into<String>>(mut self, name: S) -> Self {
        let name = name.into();
        self.display_name = (!name.trim().is_empty()).then_some(name);
        self
    }

    pub fn with_year(mut self, year: u32) -> Self {
        self.year = Some(year);
        self
    }

    /// Whether the identifier looks like an IMDb-style `tt` identifier
    pub fn has_catalog_id(&self) -> bool {
        self.external_id.starts_with("tt")
    }

    /// The episode coordinates when this is a series request that names one
    pub fn series_episode(&self) -> Option<EpisodeRef> {
        match self.kind {
            MediaKind::Series => self.episode,
            _ => None,
        }
    }
}

/// Title metadata resolved for an external identifier.
///
/// Never mutated after creation; [`TitleInfo::merge`] builds a new value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TitleInfo {
    /// Title in the configured metadata language
    pub localized_title: Option<String>,
    /// English-language title, used as the alternate search title
    pub original_language_title: Option<String>,
    /// Title in the production's own language
    pub original_title: Option<String>,
    pub year: Option<u32>,
    pub kind: Option<MediaKind>,
    /// Identifier at the metadata provider (TMDb id)
    pub external_metadata_id: Option<u64>,
}

impl TitleInfo {
    /// Best title for searching: localized, then English, then original
    pub fn display_title(&self) -> Option<&str> {
        self.localized_title
            .as_deref()
            .or(self.original_language_title.as_deref())
            .or(self.original_title.as_deref())
    }

    /// Field-wise first-non-null merge; `self` takes precedence
    pub fn merge(self, fallback: TitleInfo) -> TitleInfo {
        TitleInfo {
            localized_title: self.localized_title.or(fallback.localized_title),
            original_language_title: self
                .original_language_title
                .or(fallback.original_language_title),
            original_title: self.original_title.or(fallback.original_title),
            year: self.year.or(fallback.year),
            kind: self.kind.or(fallback.kind),
            external_metadata_id: self.external_metadata_id.or(fallback.external_metadata_id),
        }
    }
}

/// Search provider marker for playable video items
pub const VIDEO_ITEM_KIND: &str = "GWSearchVideo";

/// Raw hit from the content-search provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResultItem {
    pub provider_id: Option<String>,
    pub file_hash: Option<String>,
    pub title: String,
    pub size_bytes: Option<u64>,
    pub item_kind: String,
}

impl SearchResultItem {
    pub fn is_video(&self) -> bool {
        self.item_kind == VIDEO_ITEM_KIND
    }

    pub fn size_or_zero(&self) -> u64 {
        self.size_bytes.unwrap_or(0)
    }
}

/// One playable encoding reported by the provider's detail endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamVariant {
    pub url: String,
    /// `"720p"`, `"1080p"` or `"original"`
    pub quality: String,
}

/// Final unit returned by the pipeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamDescriptor {
    pub url: String,
    pub quality_label: String,
    pub source_title: String,
    pub size_bytes: Option<u64>,
}

impl StreamDescriptor {
    /// Source title on the first line, quality and size on the second
    pub fn display_title(&self) -> String {
        format!(
            "{}\n{} | {}",
            self.source_title,
            self.quality_label,
            format_size_gb(self.size_bytes)
        )
    }

    pub fn display_name(&self, addon_name: &str) -> String {
        format!("{addon_name} - {}", self.quality_label)
    }
}

/// `"1.50 GB"`, or `"Unknown size"` without a size
pub fn format_size_gb(size_bytes: Option<u64>) -> String {
    match size_bytes {
        Some(size) if size > 0 => {
            format!("{:.2} GB", size as f64 / 1024.0 / 1024.0 / 1024.0)
        }
        _ => "Unknown size".to_string(),
    }
}

/// Player-facing stream entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamEntry {
    pub url: String,
    pub quality: String,
    pub title: String,
    pub name: String,
}

/// Response shape handed back to the transport adapter
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamResponse {
    pub streams: Vec<StreamEntry>,
    /// Human-readable status for callers that can show inline messages
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notice: Option<String>,
}

impl StreamResponse {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_notice<S: Into<String>>(notice: S) -> Self {
        Self {
            streams: Vec::new(),
            notice: Some(notice.into()),
        }
    }

    pub fn from_descriptors(descriptors: &[StreamDescriptor], addon_name: &str) -> Self {
        let streams = descriptors
            .iter()
            .map(|d| StreamEntry {
                url: d.url.clone(),
                quality: d.quality_label.clone(),
                title: d.display_title(),
                name: d.display_name(addon_name),
            })
            .collect();
        Self {
            streams,
            notice: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }
}

/// Caller identity used by the fairness queue.
///
/// Derived from network identity, so unrelated callers may collide; that only
/// affects scheduling order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RequesterId(String);

impl RequesterId {
    pub fn new<S: Into<String>>(id: S) -> Self {
        Self(id.into())
    }

    /// Hash of the caller address and client signature (e.g. user agent)
    pub fn from_client(address: &str, client_signature: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(address.as_bytes());
        hasher.update(b"|");
        hasher.update(client_signature.as_bytes());
        let digest = hex::encode(hasher.finalize());
        Self(digest[..16].to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequesterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
