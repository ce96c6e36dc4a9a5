//! Series database repository

use anyhow::Result;
use sqlx::PgPool;

use crate::portal::SeriesSnapshot;

pub struct SeriesRepository {
    pool: PgPool,
}

impl SeriesRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Update the persisted series header after a snapshot grew.
    ///
    /// `last_episode_count` tracks the episode count of the last season.
    pub async fn update_info(&self, series_id: i64, snapshot: &SeriesSnapshot) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE series
            SET season_count = $2, last_episode_count = $3, cover_art_url = $4
            WHERE id = $1
            "#,
        )
        .bind(series_id)
        .bind(snapshot.season_count)
        .bind(snapshot.last_season_episode_count())
        .bind(&snapshot.cover_art_url)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
