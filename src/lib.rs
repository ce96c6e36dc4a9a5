//! Herald - episode release tracker for streaming portals
//!
//! Periodically scrapes subscribed series on AniWorld/S.TO, diffs the fresh
//! snapshot against persisted state and notifies Telegram subscribers about
//! new episodes and added language variants.

pub mod api;
pub mod config;
pub mod db;
pub mod jobs;
pub mod language;
pub mod portal;
pub mod services;

use crate::db::Database;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
}
