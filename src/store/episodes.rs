//! Episode ingestion, pending queries, and batch application.

use std::path::Path;

use sqlx::QueryBuilder;

use crate::error::StoreError;
use crate::feed::ParsedEpisode;

use super::{Episode, EpisodeStatus, EpisodeStore, FeedScope, StagedDownload};

impl EpisodeStore {
    /// Insert or refresh feed entries, preserving the download state of
    /// rows that already exist. Returns the number of new episodes.
    pub async fn upsert_episodes(
        &self,
        scope: &FeedScope,
        episodes: &[ParsedEpisode],
    ) -> Result<usize, StoreError> {
        let count_sql = format!("SELECT COUNT(*) FROM {}", scope.quoted());
        let upsert_sql = format!(
            r#"
            INSERT INTO {} (
                id, title, link, direct_link, summary,
                published_raw, published_normalized,
                episode_number, season_number, episode_image_url, status
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                title = excluded.title,
                link = excluded.link,
                direct_link = excluded.direct_link,
                summary = excluded.summary,
                published_raw = excluded.published_raw,
                published_normalized = excluded.published_normalized,
                episode_number = excluded.episode_number,
                season_number = excluded.season_number,
                episode_image_url = excluded.episode_image_url
            "#,
            scope.quoted()
        );

        let mut tx = self.pool().begin().await?;

        let before: i64 = sqlx::query_scalar(&count_sql).fetch_one(&mut *tx).await?;

        for episode in episodes {
            sqlx::query(&upsert_sql)
                .bind(&episode.id)
                .bind(&episode.title)
                .bind(&episode.link)
                .bind(&episode.direct_link)
                .bind(&episode.summary)
                .bind(&episode.published_raw)
                .bind(&episode.published_normalized)
                .bind(episode.episode_number)
                .bind(episode.season_number)
                .bind(&episode.episode_image_url)
                .bind(EpisodeStatus::NotDownloaded)
                .execute(&mut *tx)
                .await?;
        }

        let after: i64 = sqlx::query_scalar(&count_sql).fetch_one(&mut *tx).await?;

        tx.commit().await?;

        Ok((after - before).max(0) as usize)
    }

    /// All episodes still awaiting download, most recent first. Episodes
    /// sharing a publish timestamp are ordered by id so a rerun visits
    /// them identically.
    pub async fn pending_episodes(
        &self,
        scope: &FeedScope,
        latest_only: bool,
    ) -> Result<Vec<Episode>, StoreError> {
        let mut sql = format!(
            r#"
            SELECT id, title, link, direct_link, summary,
                   published_raw, published_normalized,
                   episode_number, season_number, episode_image_url,
                   status, saved_path, file_size, file_name
            FROM {}
            WHERE status = ?
            ORDER BY published_normalized DESC, id ASC
            "#,
            scope.quoted()
        );
        if latest_only {
            sql.push_str(" LIMIT 1");
        }

        let rows = sqlx::query_as::<_, Episode>(&sql)
            .bind(EpisodeStatus::NotDownloaded)
            .fetch_all(self.pool())
            .await?;

        Ok(rows)
    }

    /// Fetch one episode by id. Mostly useful for tests and drift reports.
    pub async fn episode(
        &self,
        scope: &FeedScope,
        episode_id: &str,
    ) -> Result<Option<Episode>, StoreError> {
        let sql = format!(
            r#"
            SELECT id, title, link, direct_link, summary,
                   published_raw, published_normalized,
                   episode_number, season_number, episode_image_url,
                   status, saved_path, file_size, file_name
            FROM {}
            WHERE id = ?
            "#,
            scope.quoted()
        );

        let row = sqlx::query_as::<_, Episode>(&sql)
            .bind(episode_id)
            .fetch_optional(self.pool())
            .await?;

        Ok(row)
    }

    /// Durably apply a batch of download results as one transaction.
    ///
    /// Each staged file must exist on disk at commit time; the whole batch
    /// is applied through a single bulk write and rolled back on any
    /// failure. Returns the number of rows updated.
    pub async fn apply_batch(
        &self,
        scope: &FeedScope,
        mutations: &[StagedDownload],
    ) -> Result<usize, StoreError> {
        if mutations.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool().begin().await?;

        for mutation in mutations {
            if !mutation.saved_path.exists() {
                tx.rollback().await.ok();
                return Err(StoreError::MissingFile {
                    episode_id: mutation.episode_id.clone(),
                    path: mutation.saved_path.clone(),
                });
            }
        }

        let mut builder =
            QueryBuilder::new("WITH changes(id, saved_path, file_size, file_name) AS (");
        builder.push_values(mutations.iter(), |mut row, mutation| {
            row.push_bind(&mutation.episode_id)
                .push_bind(mutation.saved_path.display().to_string())
                .push_bind(mutation.file_size as i64)
                .push_bind(&mutation.file_name);
        });
        builder.push(format!(
            r#") UPDATE {table} SET
                status = 'downloaded',
                saved_path = changes.saved_path,
                file_size = changes.file_size,
                file_name = changes.file_name
            FROM changes WHERE {table}.id = changes.id"#,
            table = scope.quoted()
        ));

        let result = match builder.build().execute(&mut *tx).await {
            Ok(result) => result,
            Err(e) => {
                tx.rollback().await.ok();
                return Err(StoreError::Query(e));
            }
        };

        tx.commit().await?;

        Ok(result.rows_affected() as usize)
    }

    /// Ids of episodes recorded as downloaded whose file is gone from
    /// disk. Reports drift without correcting it.
    pub async fn verify_files_exist(&self, scope: &FeedScope) -> Result<Vec<String>, StoreError> {
        let sql = format!(
            "SELECT id, saved_path FROM {} WHERE status = ? AND saved_path IS NOT NULL",
            scope.quoted()
        );

        let rows: Vec<(String, String)> = sqlx::query_as(&sql)
            .bind(EpisodeStatus::Downloaded)
            .fetch_all(self.pool())
            .await?;

        Ok(rows
            .into_iter()
            .filter(|(_, path)| !Path::new(path).exists())
            .map(|(id, _)| id)
            .collect())
    }
}
