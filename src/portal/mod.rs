//! Streaming portal abstraction
//!
//! Both supported portals serve near-identical markup and differ only in
//! their base URL and stream path prefix, so a single scraping client is
//! configured once per portal instead of duplicating the algorithm.

pub mod client;
pub mod snapshot;

pub use client::PortalClient;
pub use snapshot::{EpisodeSnapshot, SeasonSnapshot, SeriesSnapshot};

use std::fmt;

/// Supported streaming portals
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Portal {
    AniWorld,
    Sto,
}

impl Portal {
    /// Database/display identifier
    pub fn as_str(self) -> &'static str {
        match self {
            Portal::AniWorld => "aniworld",
            Portal::Sto => "sto",
        }
    }

    /// Parse the database identifier
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "aniworld" => Some(Portal::AniWorld),
            "sto" => Some(Portal::Sto),
            _ => None,
        }
    }

    /// Portal-relative path of a series root page
    pub fn series_path(self, path: &str) -> String {
        match self {
            Portal::AniWorld => format!("/anime/stream/{path}"),
            Portal::Sto => format!("/serie/stream/{path}"),
        }
    }

    /// Portal-relative path of one season page
    pub fn season_path(self, path: &str, season: i32) -> String {
        format!("{}/staffel-{season}", self.series_path(path))
    }
}

impl fmt::Display for Portal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure taxonomy of one scrape attempt.
///
/// The sweep treats `Unreachable` and `Parse` identically (skip the series,
/// log, continue); `NotFound` means the page resolved but is not a series
/// page we can read.
#[derive(Debug, thiserror::Error)]
pub enum PortalError {
    /// Series page did not resolve: non-success status or the season-count
    /// marker is absent/not an integer.
    #[error("series not found on {portal}: {path}")]
    NotFound { portal: Portal, path: String },

    /// Portal down, network failure, or an anti-bot challenge page.
    #[error("portal {portal} unreachable: {reason}")]
    Unreachable { portal: Portal, reason: String },

    /// Expected markup present but malformed beyond the not-found cases.
    #[error("failed to parse {portal} page: {reason}")]
    Parse { portal: Portal, reason: String },
}
