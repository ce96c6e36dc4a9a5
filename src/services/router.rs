//! Notification routing and digest rendering
//!
//! Decides which changed episodes matter to which subscriber and renders the
//! Telegram digest texts. Rename-only changes are never sent to subscribers;
//! they show up on the admin audit path only.

use anyhow::Result;
use tracing::info;

use crate::db::{SubscriberSettings, SubscriptionRecord};
use crate::language::LanguageFlags;
use crate::portal::SeriesSnapshot;
use crate::services::classifier::ChangeSet;
use crate::services::telegram::{Messenger, SendOptions};

const CONFETTI: &str = "🎉";
const WAVE: &str = "〰";
const SQUARE: &str = "▪";
const MINUS: &str = "➖";
const ARROW: &str = "➡";

/// Digest length cap; older qualifying entries are cut with a marker.
const DIGEST_CAP: usize = 5;

/// One digest line: an episode relevant to a subscriber
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigestEntry {
    pub season: i32,
    pub episode: i32,
    pub name: String,
    /// Full availability set, rendered at the end of the line
    pub languages: LanguageFlags,
}

/// Select the episodes from a `ChangeSet` that are relevant to a preference
/// mask: full flags decide for new episodes, only the added bits for
/// language updates. Entries come back in season/episode order.
pub fn relevant_entries(changes: &ChangeSet, preference: LanguageFlags) -> Vec<DigestEntry> {
    let mut entries = Vec::new();

    for ep in &changes.new_episodes {
        if ep.languages.intersects_preference(preference) {
            entries.push(DigestEntry {
                season: ep.season,
                episode: ep.episode,
                name: ep.name.clone(),
                languages: ep.languages,
            });
        }
    }

    for update in &changes.language_updates {
        if update.added.intersects_preference(preference) {
            entries.push(DigestEntry {
                season: update.record.season,
                episode: update.record.episode,
                name: update.record.name.clone(),
                languages: update.record.languages(),
            });
        }
    }

    entries.sort_by_key(|e| (e.season, e.episode));
    entries
}

/// Render the subscriber-facing digest text.
pub fn render_digest(
    snapshot: &SeriesSnapshot,
    entries: &[DigestEntry],
    username: Option<&str>,
    preference: LanguageFlags,
) -> String {
    let mut text = String::new();

    if let Some(username) = username {
        text.push_str(&format!("Hallo {username}!\n\n"));
    }

    text.push_str(&format!(
        "{CONFETTI} Neue Folge(n) für <b>{}</b> sind erschienen! {CONFETTI}\n\n",
        snapshot.name
    ));
    text.push_str(&format!(
        "{WAVE} Staffel: <b>{}</b> Episode: <b>{}</b> {WAVE}\n\n",
        snapshot.season_count,
        snapshot.last_season_episode_count()
    ));

    // Most recent N entries win when the digest would get too long
    let start = entries.len().saturating_sub(DIGEST_CAP);
    for entry in &entries[start..] {
        text.push_str(&render_line(entry));
    }

    if entries.len() > DIGEST_CAP {
        text.push_str(&format!("{SQUARE} <b>...</b>\n"));
    }

    text.push_str(&format!(
        "\nFür Benachrichtigung eingestellte Sprache(n): {}",
        preference.to_language_text()
    ));

    text
}

/// Render the admin audit text covering every change, renames included.
pub fn render_admin_digest(series_name: &str, changes: &ChangeSet) -> String {
    let mut text = format!(
        "{CONFETTI} Neue Folge(n) zu den Downloads hinzugefügt! (<b>{series_name}</b>) {CONFETTI}\n\n"
    );

    for ep in &changes.new_episodes {
        text.push_str(&render_line(&DigestEntry {
            season: ep.season,
            episode: ep.episode,
            name: ep.name.clone(),
            languages: ep.languages,
        }));
    }

    for update in &changes.language_updates {
        text.push_str(&format!(
            "{SQUARE} S<b>{:02}</b> E<b>{:02}</b> {MINUS} {} [+{}]\n",
            update.record.season,
            update.record.episode,
            update.record.name,
            update.added.to_language_text()
        ));
    }

    for rename in &changes.renames {
        text.push_str(&format!(
            "{SQUARE} S<b>{:02}</b> E<b>{:02}</b> {MINUS} umbenannt {ARROW} {}\n",
            rename.season, rename.episode, rename.name
        ));
    }

    text
}

fn render_line(entry: &DigestEntry) -> String {
    format!(
        "{SQUARE} S<b>{:02}</b> E<b>{:02}</b> {MINUS} {} [{}]\n",
        entry.season,
        entry.episode,
        entry.name,
        entry.languages.to_language_text()
    )
}

/// Routes rendered digests through the messaging gateway.
pub struct NotificationRouter<'a> {
    messenger: &'a dyn Messenger,
    admin_chat: Option<&'a str>,
}

impl<'a> NotificationRouter<'a> {
    pub fn new(messenger: &'a dyn Messenger, admin_chat: Option<&'a str>) -> Self {
        Self {
            messenger,
            admin_chat,
        }
    }

    /// Deliver one subscriber's digest, honoring the settings side-table.
    pub async fn notify_subscriber(
        &self,
        subscription: &SubscriptionRecord,
        settings: SubscriberSettings,
        snapshot: &SeriesSnapshot,
        entries: &[DigestEntry],
    ) -> Result<()> {
        let text = render_digest(
            snapshot,
            entries,
            subscription.username.as_deref(),
            subscription.preference(),
        );

        let options = SendOptions {
            silent: settings.suppress_sound,
            show_preview: false,
        };

        match &snapshot.cover_art_url {
            Some(cover) if !settings.suppress_cover_art => {
                self.messenger
                    .send_photo(&subscription.chat_id, cover, &text, options)
                    .await?;
            }
            _ => {
                self.messenger
                    .send_text(&subscription.chat_id, &text, options)
                    .await?;
            }
        }

        info!(
            user = subscription.username.as_deref().unwrap_or("N/A"),
            chat = %subscription.chat_id,
            episodes = entries.len(),
            "Sent new-episode notification"
        );

        Ok(())
    }

    /// Deliver the admin audit message; skipped when no operator channel is
    /// configured. Always silent by policy.
    pub async fn notify_admin(&self, series_name: &str, changes: &ChangeSet) -> Result<()> {
        let Some(admin_chat) = self.admin_chat else {
            return Ok(());
        };

        let text = render_admin_digest(series_name, changes);
        let options = SendOptions {
            silent: true,
            show_preview: false,
        };

        self.messenger.send_text(admin_chat, &text, options).await?;

        info!(chat = admin_chat, series = series_name, "Sent admin audit notification");
        Ok(())
    }
}
