//! Diffing a fresh snapshot against persisted episode state
//!
//! Three independent detector passes (new episodes, language additions,
//! renames) over the same snapshot. An episode can legitimately show up in
//! both the rename and the language list with different fields changed.

use std::collections::HashMap;

use crate::db::EpisodeRecord;
use crate::language::LanguageFlags;
use crate::portal::{EpisodeSnapshot, SeriesSnapshot};

/// A persisted episode whose language set gained at least one variant
#[derive(Debug, Clone)]
pub struct LanguageUpdate {
    /// Record with name and `language_flags` already advanced to the
    /// snapshot values, ready to be written back by primary key
    pub record: EpisodeRecord,
    /// Exactly the bits that were added, for notification matching
    pub added: LanguageFlags,
}

/// Classified differences of one reconciliation pass
#[derive(Debug, Clone, Default)]
pub struct ChangeSet {
    pub new_episodes: Vec<EpisodeSnapshot>,
    pub language_updates: Vec<LanguageUpdate>,
    /// Episodes whose display name changed; carry the persisted identity so
    /// the write-back goes through the primary key, never an insert
    pub renames: Vec<EpisodeRecord>,
    /// Flag changes with no added bit (the portal only lost a variant).
    /// Persisted so the next sweep sees current state, but never surfaced
    /// to any notification path.
    pub flag_syncs: Vec<EpisodeRecord>,
}

impl ChangeSet {
    /// True when something notification-worthy was detected.
    pub fn update_available(&self) -> bool {
        !self.new_episodes.is_empty()
            || !self.language_updates.is_empty()
            || !self.renames.is_empty()
    }

    /// True when any persistence write is pending, including silent flag
    /// syncs.
    pub fn has_writes(&self) -> bool {
        self.update_available() || !self.flag_syncs.is_empty()
    }
}

/// Compare a snapshot against the persisted episode set for the series.
///
/// A snapshot with zero seasons is treated as a malformed scrape and yields
/// an empty `ChangeSet` rather than mass-deletion semantics. With no
/// persisted records at all, every snapshot episode is new (first-time
/// ingestion).
pub fn classify(snapshot: &SeriesSnapshot, persisted: &[EpisodeRecord]) -> ChangeSet {
    if snapshot.seasons.is_empty() {
        return ChangeSet::default();
    }

    let by_key: HashMap<(i32, i32), &EpisodeRecord> = persisted
        .iter()
        .map(|ep| ((ep.season, ep.episode), ep))
        .collect();

    let mut changes = ChangeSet::default();

    for fresh in snapshot.episodes() {
        let Some(&known) = by_key.get(&(fresh.season, fresh.episode)) else {
            changes.new_episodes.push(fresh.clone());
            continue;
        };

        if known.languages() != fresh.languages {
            let added = known.languages().added_in(fresh.languages);

            let mut record = known.clone();
            record.name = fresh.name.clone();
            record.language_flags = fresh.languages.as_db();

            if added.is_empty() {
                changes.flag_syncs.push(record);
            } else {
                changes.language_updates.push(LanguageUpdate { record, added });
            }
        }

        // Rename detection runs independently of the language pass
        if known.name != fresh.name {
            let mut record = known.clone();
            record.name = fresh.name.clone();
            changes.renames.push(record);
        }
    }

    changes
}
