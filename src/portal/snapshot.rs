//! Freshly scraped view of one series
//!
//! Snapshots are built per reconciliation pass and discarded after
//! classification; they are never persisted as-is.

use crate::language::LanguageFlags;

/// One episode as currently listed on the portal
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EpisodeSnapshot {
    pub season: i32,
    pub episode: i32,
    pub name: String,
    pub languages: LanguageFlags,
}

/// One season's episode listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeasonSnapshot {
    pub season: i32,
    /// Zero when the season page listed no episode rows. Such seasons are
    /// retained so the classifier sees "season exists, no episodes" rather
    /// than a missing season.
    pub episode_count: i32,
    pub episodes: Vec<EpisodeSnapshot>,
}

/// Full scrape result for one series
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeriesSnapshot {
    pub name: String,
    /// Portal-relative identifier, e.g. `attack-on-titan`
    pub path: String,
    pub cover_art_url: Option<String>,
    pub season_count: i32,
    pub seasons: Vec<SeasonSnapshot>,
}

impl SeriesSnapshot {
    /// All episodes across seasons, in season/episode order.
    pub fn episodes(&self) -> impl Iterator<Item = &EpisodeSnapshot> {
        self.seasons.iter().flat_map(|s| s.episodes.iter())
    }

    /// Episode count of the last season, zero when no seasons were scraped.
    pub fn last_season_episode_count(&self) -> i32 {
        self.seasons.last().map(|s| s.episode_count).unwrap_or(0)
    }
}
