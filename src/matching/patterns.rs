//! Episode pattern table.
//!
//! Each tier lists templates with `{ss}` (zero-padded season), `{ee}`
//! (zero-padded episode) and `{e}` (bare episode number). A title matches a
//! template when it contains the rendered text, ignoring case. New naming
//! conventions are new rows here, not new code.

use crate::models::EpisodeRef;

/// Priority bucket of episode patterns, strongest first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MatchTier {
    /// `S01E04`, `01x04`
    Exact,
    /// Anime release naming, `Title - 04`
    Anime,
    /// Keywords, hashes, brackets, bare spaced numbers, Japanese markers
    Loose,
}

impl MatchTier {
    pub const ALL: [MatchTier; 3] = [MatchTier::Exact, MatchTier::Anime, MatchTier::Loose];
}

pub const PATTERN_TABLE: &[(MatchTier, &[&str])] = &[
    (MatchTier::Exact, &["S{ss}E{ee}", "{ss}x{ee}"]),
    (MatchTier::Anime, &[" - {ee}", " - {e}"]),
    (
        MatchTier::Loose,
        &[
            "#{ee}",
            "#{e}",
            "Ep. {ee}",
            "Ep {ee}",
            "Episode {ee}",
            "Episode {e}",
            " {ee} ",
            " {e} ",
            "[{ee}]",
            "[{e}]",
            "第{e}話",
            "第{e}集",
        ],
    ),
];

fn render(template: &str, episode: EpisodeRef) -> String {
    template
        .replace("{ss}", &episode.season_padded())
        .replace("{ee}", &episode.episode_padded())
        .replace("{e}", &episode.number.to_string())
}

/// The pattern table rendered for one episode
#[derive(Debug, Clone)]
pub struct EpisodePatterns {
    tiers: Vec<(MatchTier, Vec<String>)>,
}

impl EpisodePatterns {
    pub fn for_episode(episode: EpisodeRef) -> Self {
        let tiers = PATTERN_TABLE
            .iter()
            .map(|(tier, templates)| {
                let rendered = templates
                    .iter()
                    .map(|t| render(t, episode).to_uppercase())
                    .collect();
                (*tier, rendered)
            })
            .collect();
        Self { tiers }
    }

    /// Rendered, upper-cased patterns of one tier
    pub fn tier(&self, tier: MatchTier) -> &[String] {
        self.tiers
            .iter()
            .find(|(t, _)| *t == tier)
            .map(|(_, patterns)| patterns.as_slice())
            .unwrap_or_default()
    }

    pub fn matches_tier(&self, title: &str, tier: MatchTier) -> bool {
        let title = title.to_uppercase();
        self.tier(tier).iter().any(|p| title.contains(p.as_str()))
    }

    pub fn matches_any(&self, title: &str) -> bool {
        self.best_tier(title).is_some()
    }

    /// Strongest tier the title matches
    pub fn best_tier(&self, title: &str) -> Option<MatchTier> {
        let title = title.to_uppercase();
        self.tiers
            .iter()
            .find(|(_, patterns)| patterns.iter().any(|p| title.contains(p.as_str())))
            .map(|(tier, _)| *tier)
    }
}
