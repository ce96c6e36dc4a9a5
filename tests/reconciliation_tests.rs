//! End-to-end tests of the reconciliation pipeline: classify a scraped
//! snapshot, route the change set, and deliver digests through a recording
//! messenger fake.

use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;
use pretty_assertions::assert_eq;

use herald::db::{EpisodeRecord, SubscriberSettings, SubscriptionRecord};
use herald::language::LanguageFlags;
use herald::portal::{EpisodeSnapshot, SeasonSnapshot, SeriesSnapshot};
use herald::services::classifier::classify;
use herald::services::router::{NotificationRouter, relevant_entries};
use herald::services::telegram::{Messenger, SendOptions};

#[derive(Debug, Clone, PartialEq, Eq)]
enum SentKind {
    Text,
    Photo,
}

#[derive(Debug, Clone)]
struct Sent {
    kind: SentKind,
    chat: String,
    text: String,
    silent: bool,
}

/// Messenger fake that records every delivery
#[derive(Default)]
struct RecordingMessenger {
    sent: Mutex<Vec<Sent>>,
}

impl RecordingMessenger {
    fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Messenger for RecordingMessenger {
    async fn send_text(&self, chat_id: &str, text: &str, options: SendOptions) -> Result<()> {
        self.sent.lock().unwrap().push(Sent {
            kind: SentKind::Text,
            chat: chat_id.to_string(),
            text: text.to_string(),
            silent: options.silent,
        });
        Ok(())
    }

    async fn send_photo(
        &self,
        chat_id: &str,
        _photo_url: &str,
        caption: &str,
        options: SendOptions,
    ) -> Result<()> {
        self.sent.lock().unwrap().push(Sent {
            kind: SentKind::Photo,
            chat: chat_id.to_string(),
            text: caption.to_string(),
            silent: options.silent,
        });
        Ok(())
    }
}

fn episode(season: i32, number: i32, name: &str, languages: LanguageFlags) -> EpisodeSnapshot {
    EpisodeSnapshot {
        season,
        episode: number,
        name: name.to_string(),
        languages,
    }
}

fn snapshot(seasons: Vec<Vec<EpisodeSnapshot>>, cover: Option<&str>) -> SeriesSnapshot {
    SeriesSnapshot {
        name: "Testserie".to_string(),
        path: "testserie".to_string(),
        cover_art_url: cover.map(str::to_string),
        season_count: seasons.len() as i32,
        seasons: seasons
            .into_iter()
            .enumerate()
            .map(|(i, episodes)| SeasonSnapshot {
                season: i as i32 + 1,
                episode_count: episodes.len() as i32,
                episodes,
            })
            .collect(),
    }
}

fn persisted(series_id: i64, episodes: &[EpisodeSnapshot]) -> Vec<EpisodeRecord> {
    episodes
        .iter()
        .enumerate()
        .map(|(i, ep)| EpisodeRecord {
            id: i as i64 + 1,
            series_id,
            season: ep.season,
            episode: ep.episode,
            name: ep.name.clone(),
            language_flags: ep.languages.as_db(),
        })
        .collect()
}

fn subscription(chat: &str, username: Option<&str>, preference: LanguageFlags) -> SubscriptionRecord {
    SubscriptionRecord {
        user_id: 1,
        chat_id: chat.to_string(),
        username: username.map(str::to_string),
        language_flags: preference.as_db(),
        series_id: 7,
        series_name: "Testserie".to_string(),
        series_path: "testserie".to_string(),
        portal: "aniworld".to_string(),
        season_count: 1,
        last_episode_count: 10,
        cover_art_url: None,
    }
}

/// Baseline scenario: 10 persisted GerDub episodes, scrape adds GerSub
/// to episode 5 and a new 3-episode season 2.
fn scenario() -> (SeriesSnapshot, Vec<EpisodeRecord>) {
    let old_season: Vec<EpisodeSnapshot> = (1..=10)
        .map(|e| episode(1, e, &format!("Folge {e}"), LanguageFlags::GER_DUB))
        .collect();
    let records = persisted(7, &old_season);

    let fresh_season1: Vec<EpisodeSnapshot> = (1..=10)
        .map(|e| {
            let languages = if e == 5 {
                LanguageFlags::GER_DUB | LanguageFlags::GER_SUB
            } else {
                LanguageFlags::GER_DUB
            };
            episode(1, e, &format!("Folge {e}"), languages)
        })
        .collect();
    let fresh_season2: Vec<EpisodeSnapshot> = (1..=3)
        .map(|e| {
            episode(
                2,
                e,
                &format!("Neue Folge {e}"),
                LanguageFlags::GER_DUB | LanguageFlags::GER_SUB,
            )
        })
        .collect();

    (
        snapshot(vec![fresh_season1, fresh_season2], Some("https://portal.test/cover.jpg")),
        records,
    )
}

#[tokio::test]
async fn test_sub_subscriber_gets_update_and_new_season() {
    let (snap, records) = scenario();
    let changes = classify(&snap, &records);

    let sub = subscription("100", Some("alice"), LanguageFlags::GER_SUB);
    let entries = relevant_entries(&changes, sub.preference());

    // ep5 (added GerSub) plus all three new episodes
    let keys: Vec<(i32, i32)> = entries.iter().map(|e| (e.season, e.episode)).collect();
    assert_eq!(keys, vec![(1, 5), (2, 1), (2, 2), (2, 3)]);

    let messenger = RecordingMessenger::default();
    let router = NotificationRouter::new(&messenger, None);
    router
        .notify_subscriber(&sub, SubscriberSettings::default(), &snap, &entries)
        .await
        .unwrap();

    let sent = messenger.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].kind, SentKind::Photo);
    assert_eq!(sent[0].chat, "100");
    assert!(!sent[0].silent);
    assert!(sent[0].text.starts_with("Hallo alice!"));
    assert!(sent[0].text.contains("S<b>01</b> E<b>05</b>"));
    assert!(sent[0].text.contains("S<b>02</b> E<b>03</b>"));
}

#[tokio::test]
async fn test_dub_subscriber_gets_only_new_season() {
    let (snap, records) = scenario();
    let changes = classify(&snap, &records);

    let sub = subscription("200", None, LanguageFlags::GER_DUB);
    let entries = relevant_entries(&changes, sub.preference());

    // Episode 5 already had GerDub before; only the additions count
    let keys: Vec<(i32, i32)> = entries.iter().map(|e| (e.season, e.episode)).collect();
    assert_eq!(keys, vec![(2, 1), (2, 2), (2, 3)]);

    let messenger = RecordingMessenger::default();
    let router = NotificationRouter::new(&messenger, None);
    router
        .notify_subscriber(&sub, SubscriberSettings::default(), &snap, &entries)
        .await
        .unwrap();

    let sent = messenger.sent();
    assert_eq!(sent.len(), 1);
    // No username on record: anonymous phrasing
    assert!(!sent[0].text.contains("Hallo"));
    assert!(!sent[0].text.contains("E<b>05</b>"));
}

#[tokio::test]
async fn test_unrelated_subscriber_gets_nothing() {
    let (snap, records) = scenario();
    let changes = classify(&snap, &records);

    // EngDub-only subscriber: neither the added GerSub nor the new
    // GerDub|GerSub episodes intersect the preference
    let mut season2_dub_only = snap.clone();
    for ep in &mut season2_dub_only.seasons[1].episodes {
        ep.languages = LanguageFlags::GER_DUB;
    }
    let changes_dub_only = classify(&season2_dub_only, &records);

    assert!(relevant_entries(&changes, LanguageFlags::ENG_DUB).is_empty());
    assert!(relevant_entries(&changes_dub_only, LanguageFlags::ENG_SUB).is_empty());
}

#[tokio::test]
async fn test_subscriber_settings_suppress_cover_and_sound() {
    let (snap, records) = scenario();
    let changes = classify(&snap, &records);

    let sub = subscription("300", Some("bob"), LanguageFlags::GER_SUB);
    let entries = relevant_entries(&changes, sub.preference());

    let messenger = RecordingMessenger::default();
    let router = NotificationRouter::new(&messenger, None);
    let settings = SubscriberSettings {
        suppress_sound: true,
        suppress_cover_art: true,
    };
    router
        .notify_subscriber(&sub, settings, &snap, &entries)
        .await
        .unwrap();

    let sent = messenger.sent();
    assert_eq!(sent.len(), 1);
    // Cover art exists on the snapshot but the settings force the text path
    assert_eq!(sent[0].kind, SentKind::Text);
    assert!(sent[0].silent);
}

#[tokio::test]
async fn test_cover_art_absence_falls_back_to_text() {
    let (mut snap, records) = scenario();
    snap.cover_art_url = None;
    let changes = classify(&snap, &records);

    let sub = subscription("400", None, LanguageFlags::GER_SUB);
    let entries = relevant_entries(&changes, sub.preference());

    let messenger = RecordingMessenger::default();
    let router = NotificationRouter::new(&messenger, None);
    router
        .notify_subscriber(&sub, SubscriberSettings::default(), &snap, &entries)
        .await
        .unwrap();

    assert_eq!(messenger.sent()[0].kind, SentKind::Text);
}

#[tokio::test]
async fn test_admin_audit_fires_silent_and_includes_everything() {
    let (snap, mut records) = scenario();
    // Add a rename on top of the scenario
    records[2].name = "Alter Titel".to_string();
    let changes = classify(&snap, &records);
    assert_eq!(changes.renames.len(), 1);

    let messenger = RecordingMessenger::default();
    let router = NotificationRouter::new(&messenger, Some("admin-chat"));
    router.notify_admin(&snap.name, &changes).await.unwrap();

    let sent = messenger.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].chat, "admin-chat");
    assert!(sent[0].silent);
    // New episodes, the language update and the rename all show up
    assert!(sent[0].text.contains("Neue Folge 1"));
    assert!(sent[0].text.contains("[+<b>GerSub</b>]"));
    assert!(sent[0].text.contains("umbenannt"));
}

#[tokio::test]
async fn test_admin_audit_skipped_without_operator_channel() {
    let (snap, records) = scenario();
    let changes = classify(&snap, &records);

    let messenger = RecordingMessenger::default();
    let router = NotificationRouter::new(&messenger, None);
    router.notify_admin(&snap.name, &changes).await.unwrap();

    assert!(messenger.sent().is_empty());
}

#[tokio::test]
async fn test_second_pass_is_quiet_after_persisting() {
    let (snap, records) = scenario();
    let first = classify(&snap, &records);
    assert!(first.update_available());

    // Simulate persistence: renames/updates applied, new episodes inserted
    let mut after: Vec<EpisodeRecord> = records;
    for update in &first.language_updates {
        let slot = after.iter_mut().find(|r| r.id == update.record.id).unwrap();
        *slot = update.record.clone();
    }
    let mut next_id = after.len() as i64 + 1;
    for ep in &first.new_episodes {
        after.push(EpisodeRecord {
            id: next_id,
            series_id: 7,
            season: ep.season,
            episode: ep.episode,
            name: ep.name.clone(),
            language_flags: ep.languages.as_db(),
        });
        next_id += 1;
    }

    let second = classify(&snap, &after);
    assert!(!second.has_writes());
    assert!(relevant_entries(&second, LanguageFlags::all()).is_empty());
}
