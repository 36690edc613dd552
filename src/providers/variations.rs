//! Title variations: a static anime alias table plus optional dynamic sources

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};

use super::traits::TitleVariationSource;
use crate::errors::ProviderResult;
use crate::models::MediaKind;

/// Well-known anime names and the aliases releases tend to use instead
const ANIME_ALIASES: &[(&str, &[&str])] = &[
    (
        "Sósó no Frieren",
        &["Frieren", "Frieren Beyond Journeys End", "Sousou no Frieren", "Frieren: Beyond Journey's End"],
    ),
    (
        "葬送のフリーレン",
        &["Frieren", "Frieren Beyond Journeys End", "Sousou no Frieren", "Frieren: Beyond Journey's End"],
    ),
    (
        "Sousou no Frieren",
        &["Frieren", "Frieren Beyond Journeys End", "Frieren: Beyond Journey's End"],
    ),
    ("Frieren: Beyond Journey's End", &["Frieren", "Sousou no Frieren"]),
    ("Spy×Family", &["Spy Family", "SpyFamily", "Spy x Family"]),
    ("Jujutsu Kaisen", &["JJK"]),
    ("Boku no Hero Academia", &["My Hero Academia", "MHA"]),
    ("Shingeki no Kyojin", &["Attack on Titan", "AOT"]),
    ("Kimetsu no Yaiba", &["Demon Slayer"]),
    ("One Piece", &["ワンピース", "Wan Pīsu"]),
    ("Naruto", &["ナルト"]),
    ("Dragon Ball", &["ドラゴンボール", "Doragon Bōru"]),
    ("Bleach", &["ブリーチ", "Burīchi"]),
    ("Hunter x Hunter", &["Hunter × Hunter", "HxH", "ハンターハンター"]),
    (
        "Fullmetal Alchemist",
        &["Fullmetal Alchemist: Brotherhood", "FMA", "FMA:B", "鋼の錬金術師"],
    ),
    ("Death Note", &["デスノート", "Desu Nōto"]),
    ("Tokyo Ghoul", &["東京喰種", "Tōkyō Gūru"]),
    ("Attack on Titan", &["Shingeki no Kyojin", "AOT", "進撃の巨人"]),
    ("Demon Slayer", &["Kimetsu no Yaiba", "鬼滅の刃"]),
    ("My Hero Academia", &["Boku no Hero Academia", "MHA", "僕のヒーローアカデミア"]),
    ("One Punch Man", &["ワンパンマン", "Wanpanman"]),
    ("Vinland Saga", &["ヴィンランド・サガ"]),
    ("Chainsaw Man", &["チェンソーマン", "Chensō Man"]),
    ("Bocchi the Rock!", &["ぼっち・ざ・ろっく!"]),
    ("Solo Leveling", &["나 혼자만 레벨업", "Na Honjaman Level Up", "I Level Up Alone"]),
    ("Oshi no Ko", &["【推しの子】", "My Star"]),
    ("Jigokuraku", &["Hell's Paradise", "地獄楽"]),
];

/// Words this short are too common to link two titles
const MIN_SHARED_WORD_CHARS: usize = 4;

/// Aliases this short (`AOT`, `MHA`) only match as whole words
const SHORT_ALIAS_CHARS: usize = 3;

fn words(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

/// Case-insensitive containment; short aliases must match a whole word
fn mentions(title_lower: &str, title_words: &[String], name: &str) -> bool {
    let name_lower = name.to_lowercase();
    if name_lower.chars().count() <= SHORT_ALIAS_CHARS {
        title_words.iter().any(|w| *w == name_lower)
    } else {
        title_lower.contains(&name_lower)
    }
}

/// Push `value` unless an equal string (ignoring case) is already present
pub(crate) fn push_unique(list: &mut Vec<String>, value: &str) {
    let value = value.trim();
    if value.is_empty() {
        return;
    }
    if !list.iter().any(|v| v.to_lowercase() == value.to_lowercase()) {
        list.push(value.to_string());
    }
}

/// Lookup over [`ANIME_ALIASES`]
#[derive(Debug, Default, Clone, Copy)]
pub struct StaticAliasTable;

impl StaticAliasTable {
    pub fn new() -> Self {
        Self
    }

    /// Aliases of every entry the title mentions, then the title itself.
    ///
    /// An entry applies when the title contains its key or one of its aliases,
    /// or shares a word longer than three characters with its key.
    pub fn lookup(&self, title: &str) -> Vec<String> {
        let title = title.trim();
        if title.is_empty() {
            return Vec::new();
        }

        let title_lower = title.to_lowercase();
        let title_words = words(title);
        let mut variations = Vec::new();

        for (key, aliases) in ANIME_ALIASES {
            let direct = mentions(&title_lower, &title_words, key)
                || aliases.iter().any(|a| mentions(&title_lower, &title_words, a));
            if direct {
                for alias in *aliases {
                    push_unique(&mut variations, alias);
                }
                push_unique(&mut variations, key);
            }
        }

        for (key, aliases) in ANIME_ALIASES {
            let shared_word = words(key)
                .iter()
                .any(|w| w.chars().count() >= MIN_SHARED_WORD_CHARS && title_words.contains(w));
            if shared_word {
                for alias in *aliases {
                    push_unique(&mut variations, alias);
                }
                push_unique(&mut variations, key);
            }
        }

        push_unique(&mut variations, title);
        variations
    }
}

#[async_trait]
impl TitleVariationSource for StaticAliasTable {
    fn source_name(&self) -> &'static str {
        "static-aliases"
    }

    async fn variations(&self, title: &str, _kind: MediaKind) -> ProviderResult<Vec<String>> {
        Ok(self.lookup(title))
    }
}

/// Merges every configured variation source
#[derive(Clone, Default)]
pub struct TitleVariations {
    sources: Vec<Arc<dyn TitleVariationSource>>,
}

impl TitleVariations {
    pub fn new(sources: Vec<Arc<dyn TitleVariationSource>>) -> Self {
        Self { sources }
    }

    /// Only the static alias table
    pub fn static_only() -> Self {
        Self::new(vec![Arc::new(StaticAliasTable::new())])
    }

    pub fn with_source(mut self, source: Arc<dyn TitleVariationSource>) -> Self {
        self.sources.push(source);
        self
    }

    /// Deduplicated variations of `title` from every source, `title` last.
    ///
    /// A failing source contributes nothing.
    pub async fn collect(&self, title: &str, kind: MediaKind) -> Vec<String> {
        let mut all = Vec::new();
        if title.trim().is_empty() {
            return all;
        }

        for source in &self.sources {
            match source.variations(title, kind).await {
                Ok(found) => {
                    for variation in &found {
                        push_unique(&mut all, variation);
                    }
                }
                Err(e) => warn!(
                    "Title variation source {} failed for \"{}\": {}",
                    source.source_name(),
                    title,
                    e
                ),
            }
        }
        push_unique(&mut all, title);

        if all.len() > 1 {
            debug!("{} name variations for \"{}\"", all.len(), title);
        }
        all
    }
}
