//! Subscription, subscriber-settings and delivery-audit repository

use anyhow::Result;
use sqlx::PgPool;

use crate::language::LanguageFlags;

/// One active subscription, joined with user and series identity.
///
/// Flat join record; the sweep groups rows by `series_id`.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SubscriptionRecord {
    pub user_id: i64,
    pub chat_id: String,
    pub username: Option<String>,
    pub language_flags: i32,
    pub series_id: i64,
    pub series_name: String,
    pub series_path: String,
    pub portal: String,
    pub season_count: i32,
    pub last_episode_count: i32,
    pub cover_art_url: Option<String>,
}

impl SubscriptionRecord {
    /// The subscriber's language-preference mask for this series
    pub fn preference(&self) -> LanguageFlags {
        LanguageFlags::from_db(self.language_flags)
    }
}

/// Per-subscriber delivery preferences from the settings side-table.
///
/// Absence of a row defaults to cover-art-on, sound-on.
#[derive(Debug, Clone, Copy, Default, sqlx::FromRow)]
pub struct SubscriberSettings {
    pub suppress_sound: bool,
    pub suppress_cover_art: bool,
}

pub struct SubscriptionRepository {
    pool: PgPool,
}

impl SubscriptionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// All active subscriptions joined with series and portal identity.
    pub async fn list_all(&self) -> Result<Vec<SubscriptionRecord>> {
        let records = sqlx::query_as::<_, SubscriptionRecord>(
            r#"
            SELECT u.id AS user_id, u.chat_id, u.username,
                   sub.language_flags,
                   s.id AS series_id, s.name AS series_name, s.path AS series_path,
                   s.portal, s.season_count, s.last_episode_count, s.cover_art_url
            FROM subscriptions sub
            JOIN users u ON u.id = sub.user_id
            JOIN series s ON s.id = sub.series_id
            ORDER BY s.id, u.id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }

    /// Delivery preferences for one subscriber, if a settings row exists.
    pub async fn get_settings(&self, user_id: i64) -> Result<Option<SubscriberSettings>> {
        let record = sqlx::query_as::<_, SubscriberSettings>(
            r#"
            SELECT suppress_sound, suppress_cover_art
            FROM subscriber_settings
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    /// Audit trail: which `(season, episode)` pairs were delivered to a user.
    pub async fn insert_deliveries(
        &self,
        user_id: i64,
        series_id: i64,
        episodes: &[(i32, i32)],
    ) -> Result<usize> {
        let mut count = 0;

        for (season, episode) in episodes {
            sqlx::query(
                r#"
                INSERT INTO deliveries (user_id, series_id, season, episode, delivered_at)
                VALUES ($1, $2, $3, $4, NOW())
                "#,
            )
            .bind(user_id)
            .bind(series_id)
            .bind(season)
            .bind(episode)
            .execute(&self.pool)
            .await?;

            count += 1;
        }

        Ok(count)
    }
}
