//! Search query generation.
//!
//! Pure and deterministic: the order of the returned list is the order the
//! search engine tries the queries in, so earlier entries are the more
//! specific ones. Lists are deduplicated ignoring case, first occurrence wins.

use crate::models::{EpisodeRef, MediaKind, TitleInfo};

/// Title truncated at its first colon, when that removes a subtitle
pub fn simplify_title(title: &str) -> Option<String> {
    let (head, _) = title.split_once(':')?;
    let head = head.trim();
    (!head.is_empty() && head != title.trim()).then(|| head.to_string())
}

/// Title without `:` and `&`, whitespace collapsed
pub fn classic_base(title: &str) -> String {
    title
        .replace([':', '&'], " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// First two words of a title
fn first_two_words(title: &str) -> String {
    title.split_whitespace().take(2).collect::<Vec<_>>().join(" ")
}

/// Ordered, case-insensitively unique list of queries
#[derive(Debug, Default)]
struct QueryList {
    queries: Vec<String>,
}

impl QueryList {
    fn push<S: AsRef<str>>(&mut self, query: S) {
        let query = query.as_ref().trim();
        if query.is_empty() {
            return;
        }
        let lower = query.to_lowercase();
        if !self.queries.iter().any(|q| q.to_lowercase() == lower) {
            self.queries.push(query.to_string());
        }
    }

    fn extend<I, S>(&mut self, queries: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for query in queries {
            self.push(query);
        }
    }

    fn into_vec(self) -> Vec<String> {
        self.queries
    }
}

/// Episode templates applied to one base title, most specific first
fn episode_templates(base: &str, episode: EpisodeRef) -> Vec<String> {
    let ee = episode.episode_padded();
    let e = episode.number;
    vec![
        format!("{base} {}", episode.sxxeyy()),
        format!("{base} {}", episode.cross_form()),
        format!("{base} - {ee}"),
        format!("{base} - {e}"),
        format!("{base} #{ee}"),
        format!("{base} #{e}"),
        format!("{} {ee}", classic_base(base)),
    ]
}

fn japanese_templates(base: &str, episode: EpisodeRef) -> Vec<String> {
    let e = episode.number;
    vec![format!("{base} 第{e}話"), format!("{base} 第{e}集")]
}

fn movie_templates(base: &str, year: Option<u32>) -> Vec<String> {
    match year {
        Some(year) => vec![format!("{base} {year}"), base.to_string()],
        None => vec![base.to_string()],
    }
}

pub struct QueryGenerator;

impl QueryGenerator {
    /// Queries for `info` in the order they should be tried.
    ///
    /// Series requests without an episode, and unknown kinds, get the generic
    /// title-only list.
    pub fn generate(
        info: &TitleInfo,
        kind: MediaKind,
        episode: Option<EpisodeRef>,
        variations: &[String],
    ) -> Vec<String> {
        let Some(title) = info.display_title() else {
            return Vec::new();
        };
        match (kind, episode) {
            (MediaKind::Series, Some(episode)) => Self::series_queries(title, episode, variations),
            (MediaKind::Movie, _) => Self::movie_queries(title, info.year),
            _ => Self::generic_queries(title, variations),
        }
    }

    /// Title, then simplified title, then each variation through the episode
    /// templates; Japanese episode markers last
    pub fn series_queries(title: &str, episode: EpisodeRef, variations: &[String]) -> Vec<String> {
        let title = title.trim();
        let mut list = QueryList::default();
        if title.is_empty() {
            return list.into_vec();
        }

        let simplified = simplify_title(title);
        list.extend(episode_templates(title, episode));
        if let Some(simplified) = &simplified {
            list.extend(episode_templates(simplified, episode));
        }
        for variation in variations {
            list.extend(episode_templates(variation.trim(), episode));
        }
        list.extend(japanese_templates(title, episode));
        if let Some(simplified) = &simplified {
            list.extend(japanese_templates(simplified, episode));
        }
        list.into_vec()
    }

    /// `<title> <year>`, `<title>`, then the simplified equivalents. Also used
    /// for alternate movie titles; provider variations are not applied to movies
    pub fn movie_queries(title: &str, year: Option<u32>) -> Vec<String> {
        let title = title.trim();
        let mut list = QueryList::default();
        if title.is_empty() {
            return list.into_vec();
        }

        list.extend(movie_templates(title, year));
        if let Some(simplified) = simplify_title(title) {
            list.extend(movie_templates(&simplified, year));
        }
        list.into_vec()
    }

    /// Queries for an alternate (English/original) series title.
    ///
    /// Episode-name queries follow the alternate title's own templates and
    /// precede the simplified alternate title.
    pub fn alternate_series_queries(
        alternate: &str,
        episode: EpisodeRef,
        episode_title: Option<&str>,
    ) -> Vec<String> {
        let alternate = alternate.trim();
        let mut list = QueryList::default();
        if alternate.is_empty() {
            return list.into_vec();
        }

        let simplified = simplify_title(alternate);
        let sxxeyy = episode.sxxeyy();
        let cross = episode.cross_form();
        let ee = episode.episode_padded();

        list.push(format!("{alternate} {sxxeyy}"));
        list.push(format!("{alternate} {cross}"));
        list.push(format!("{alternate} - {ee}"));

        if let Some(episode_title) = episode_title.map(str::trim).filter(|t| !t.is_empty()) {
            list.push(format!("{alternate} {episode_title}"));
            list.push(episode_title);
            if let Some(simplified) = &simplified {
                list.push(format!("{simplified} {episode_title}"));
            }
        }

        if let Some(simplified) = &simplified {
            list.push(format!("{simplified} {sxxeyy}"));
            list.push(format!("{simplified} {cross}"));
            list.push(format!("{simplified} - {ee}"));
        }
        list.into_vec()
    }

    /// Title-only queries for the generic fallback search; the first-two-word
    /// forms come last
    pub fn generic_queries(title: &str, variations: &[String]) -> Vec<String> {
        let title = title.trim();
        let mut list = QueryList::default();
        if title.is_empty() {
            return list.into_vec();
        }

        let simplified = simplify_title(title);
        list.push(title);
        if let Some(simplified) = &simplified {
            list.push(simplified);
        }
        list.extend(variations);
        list.push(first_two_words(title));
        if let Some(simplified) = &simplified {
            list.push(first_two_words(simplified));
        }
        list.into_vec()
    }
}
