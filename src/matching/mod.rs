//! Filtering and ranking of search results against a request

use regex::{Regex, RegexBuilder};
use std::collections::HashSet;
use std::sync::OnceLock;
use tracing::debug;

pub mod patterns;

pub use patterns::{EpisodePatterns, MatchTier, PATTERN_TABLE};

use crate::models::{EpisodeRef, MediaKind, MediaRequest, SearchResultItem};

/// Naming conventions that mark a release as a single TV episode
const EPISODE_MARKERS: &[&str] = &[
    r"\bS\d{1,2}E\d{1,2}\b",
    r"\b\d{1,2}x\d{1,2}\b",
    r"\s-\s\d{1,2}\b",
    r"\s#\d{1,2}\b",
    r"\[\s?\d{1,2}\s?\]",
    r"第\d{1,2}[話集]",
    r"\bEP\.?\s\d{1,2}\b",
    r"\bEPISODE\s\d{1,2}\b",
];

static EPISODE_MARKER_REGEXES: OnceLock<Vec<Regex>> = OnceLock::new();

fn episode_marker_regexes() -> &'static [Regex] {
    EPISODE_MARKER_REGEXES.get_or_init(|| {
        EPISODE_MARKERS
            .iter()
            .filter_map(|pattern| {
                RegexBuilder::new(pattern)
                    .case_insensitive(true)
                    .build()
                    .ok()
            })
            .collect()
    })
}

/// Whether a free-text title looks like a TV episode rip
pub fn looks_like_episode(title: &str) -> bool {
    episode_marker_regexes().iter().any(|re| re.is_match(title))
}

/// `" - 04"`, the anime-style suffix ranked first for series
pub fn anime_suffix(episode: EpisodeRef) -> String {
    format!(" - {}", episode.episode_padded())
}

/// Drop repeated `(provider_id, file_hash)` pairs, keeping the first
fn dedup_items(items: Vec<SearchResultItem>) -> Vec<SearchResultItem> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| match (&item.provider_id, &item.file_hash) {
            (Some(id), Some(hash)) => seen.insert((id.clone(), hash.clone())),
            _ => true,
        })
        .collect()
}

/// Filter by kind, rank series candidates, cap at `max_candidates`.
///
/// Series with an episode keep titles matching any episode pattern; when more
/// than one survives, anime-style `" - NN"` titles sort first and ties go to
/// the larger file. Movies lose anything that looks like an episode. Other
/// requests pass through unranked.
pub fn filter_and_rank(
    items: Vec<SearchResultItem>,
    request: &MediaRequest,
    max_candidates: usize,
) -> Vec<SearchResultItem> {
    let before = items.len();
    let items = dedup_items(items);

    let mut kept: Vec<SearchResultItem> = match (request.kind, request.episode) {
        (MediaKind::Series, Some(episode)) => {
            let patterns = EpisodePatterns::for_episode(episode);
            let mut kept: Vec<SearchResultItem> = items
                .into_iter()
                .filter(|item| patterns.matches_any(&item.title))
                .collect();

            if kept.len() > 1 {
                let suffix = anime_suffix(episode);
                kept.sort_by(|a, b| {
                    let a_anime = a.title.contains(&suffix);
                    let b_anime = b.title.contains(&suffix);
                    b_anime
                        .cmp(&a_anime)
                        .then_with(|| b.size_or_zero().cmp(&a.size_or_zero()))
                });
            }
            kept
        }
        (MediaKind::Movie, _) => items
            .into_iter()
            .filter(|item| !looks_like_episode(&item.title))
            .collect(),
        _ => items,
    };

    debug!(
        "{} of {} results kept for {} {}",
        kept.len(),
        before,
        request.kind,
        request.external_id
    );
    for item in kept.iter().take(5) {
        debug!(
            "- {} ({} MB)",
            item.title,
            item.size_or_zero() / 1024 / 1024
        );
    }

    kept.truncate(max_candidates);
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn item(id: &str, title: &str, size: u64) -> SearchResultItem {
        SearchResultItem {
            provider_id: Some(id.to_string()),
            file_hash: Some(format!("hash-{id}")),
            title: title.to_string(),
            size_bytes: Some(size),
            item_kind: crate::models::VIDEO_ITEM_KIND.to_string(),
        }
    }

    fn series_request() -> MediaRequest {
        MediaRequest::from_compound_id(MediaKind::Series, "tt1:1:4")
    }

    #[rstest]
    #[case("Show S01E04 1080p", true)]
    #[case("Show 1x4", true)]
    #[case("Show - 04", true)]
    #[case("Show #4", true)]
    #[case("Show [ 04 ]", true)]
    #[case("Show Ep. 4", true)]
    #[case("Show episode 12", true)]
    #[case("ショー 第4話", true)]
    #[case("Movie Title 2020 1080p", false)]
    #[case("Spider-Man - Across the Spider-Verse 2023", false)]
    fn test_looks_like_episode(#[case] title: &str, #[case] expected: bool) {
        assert_eq!(looks_like_episode(title), expected);
    }

    #[test]
    fn test_movie_filter_drops_episodes() {
        let request = MediaRequest::from_compound_id(MediaKind::Movie, "tt2");
        let items = vec![
            item("1", "Show S01E04 1080p", 10),
            item("2", "Movie Title 2020 1080p", 5),
        ];

        let kept = filter_and_rank(items, &request, 10);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].title, "Movie Title 2020 1080p");
    }

    #[test]
    fn test_anime_suffix_ranks_first_regardless_of_size() {
        let items = vec![
            item("1", "Demo Show S01E04 1080p", 4_000_000_000),
            item("2", "Demo Show - 04", 300_000_000),
        ];
        let kept = filter_and_rank(items, &series_request(), 10);
        assert_eq!(kept[0].title, "Demo Show - 04");
        assert_eq!(kept[1].title, "Demo Show S01E04 1080p");
    }

    #[test]
    fn test_size_breaks_ties() {
        let items = vec![
            item("1", "Demo Show - 04 [720p]", 300),
            item("2", "Demo Show - 04 [1080p]", 900),
            item("3", "Demo Show S01E04 small", 100),
            item("4", "Demo Show S01E04 big", 800),
        ];
        let kept = filter_and_rank(items, &series_request(), 10);
        let ids: Vec<&str> = kept.iter().filter_map(|i| i.provider_id.as_deref()).collect();
        assert_eq!(ids, vec!["2", "1", "4", "3"]);
    }

    #[test]
    fn test_series_filter_and_cap() {
        let items = vec![
            item("1", "Demo Show S01E05", 900),
            item("2", "Demo Show S01E04 a", 800),
            item("3", "Demo Show S01E04 b", 700),
            item("4", "Demo Show S01E04 c", 600),
        ];
        let kept = filter_and_rank(items, &series_request(), 2);
        let ids: Vec<&str> = kept.iter().filter_map(|i| i.provider_id.as_deref()).collect();
        assert_eq!(ids, vec!["2", "3"]);
    }

    #[test]
    fn test_duplicates_are_removed() {
        let items = vec![
            item("1", "Demo Show S01E04", 900),
            item("1", "Demo Show S01E04", 900),
        ];
        assert_eq!(filter_and_rank(items, &series_request(), 10).len(), 1);
    }

    #[test]
    fn test_unknown_kind_passes_through() {
        let request = MediaRequest::from_compound_id(MediaKind::Unknown, "tt3");
        let items = vec![item("1", "Anything S01E01", 1), item("2", "Else", 2)];
        let kept = filter_and_rank(items, &request, 10);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].title, "Anything S01E01");
    }
}
