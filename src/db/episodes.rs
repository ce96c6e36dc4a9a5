//! Episode database repository

use anyhow::Result;
use sqlx::PgPool;

use crate::language::LanguageFlags;
use crate::portal::EpisodeSnapshot;

/// Episode record from database
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct EpisodeRecord {
    pub id: i64,
    pub series_id: i64,
    pub season: i32,
    pub episode: i32,
    pub name: String,
    pub language_flags: i32,
}

impl EpisodeRecord {
    /// Decoded language availability set
    pub fn languages(&self) -> LanguageFlags {
        LanguageFlags::from_db(self.language_flags)
    }
}

pub struct EpisodeRepository {
    pool: PgPool,
}

impl EpisodeRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get all persisted episodes for a series.
    ///
    /// An empty result means no episodes were persisted yet, which the
    /// classifier treats as first-time ingestion.
    pub async fn list_by_series(&self, series_id: i64) -> Result<Vec<EpisodeRecord>> {
        let records = sqlx::query_as::<_, EpisodeRecord>(
            r#"
            SELECT id, series_id, season, episode, name, language_flags
            FROM episodes
            WHERE series_id = $1
            ORDER BY season, episode
            "#,
        )
        .bind(series_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }

    /// Insert newly observed episodes.
    pub async fn insert_batch(&self, series_id: i64, episodes: &[EpisodeSnapshot]) -> Result<usize> {
        let mut count = 0;

        for ep in episodes {
            sqlx::query(
                r#"
                INSERT INTO episodes (series_id, season, episode, name, language_flags)
                VALUES ($1, $2, $3, $4, $5)
                ON CONFLICT (series_id, season, episode) DO UPDATE SET
                    name = EXCLUDED.name,
                    language_flags = EXCLUDED.language_flags
                "#,
            )
            .bind(series_id)
            .bind(ep.season)
            .bind(ep.episode)
            .bind(&ep.name)
            .bind(ep.languages.as_db())
            .execute(&self.pool)
            .await?;

            count += 1;
        }

        Ok(count)
    }

    /// Write back updated name/language flags by primary key.
    pub async fn update_batch(&self, episodes: &[EpisodeRecord]) -> Result<usize> {
        let mut count = 0;

        for ep in episodes {
            sqlx::query(
                r#"
                UPDATE episodes
                SET name = $2, language_flags = $3
                WHERE id = $1
                "#,
            )
            .bind(ep.id)
            .bind(&ep.name)
            .bind(ep.language_flags)
            .execute(&self.pool)
            .await?;

            count += 1;
        }

        Ok(count)
    }
}
