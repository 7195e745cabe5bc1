//! Derived per-feed summary rows.

use crate::error::StoreError;

use super::{EpisodeStatus, EpisodeStore, FeedScope, FeedSummary};

const SUMMARY_COLUMNS: &str = "name, total_episodes, downloaded_count, not_downloaded_count, \
     percent_downloaded, last_downloaded_at, feed_image_url, feed_url";

impl EpisodeStore {
    /// Recompute the summary row for `scope` from the episode set and
    /// upsert it.
    ///
    /// Counts are always derived by aggregate query; the summary is a
    /// view, never incremented in place. Passing `None` for the URL
    /// arguments preserves previously stored values.
    pub async fn recompute_summary(
        &self,
        scope: &FeedScope,
        feed_url: Option<&str>,
        feed_image_url: Option<&str>,
    ) -> Result<FeedSummary, StoreError> {
        let aggregate_sql = format!(
            r#"
            SELECT COUNT(*),
                   COALESCE(SUM(CASE WHEN status = ? THEN 1 ELSE 0 END), 0)
            FROM {}
            "#,
            scope.quoted()
        );
        let (total, downloaded): (i64, i64) = sqlx::query_as(&aggregate_sql)
            .bind(EpisodeStatus::Downloaded)
            .fetch_one(self.pool())
            .await?;

        let not_downloaded = total - downloaded;
        let percent = if total > 0 {
            ((downloaded as f64 / total as f64) * 10_000.0).round() / 100.0
        } else {
            0.0
        };

        let last_sql = format!(
            r#"
            SELECT published_normalized FROM {}
            WHERE status = ? AND published_normalized IS NOT NULL
            ORDER BY published_normalized DESC
            LIMIT 1
            "#,
            scope.quoted()
        );
        let last_downloaded_at: Option<String> = sqlx::query_scalar(&last_sql)
            .bind(EpisodeStatus::Downloaded)
            .fetch_optional(self.pool())
            .await?;

        sqlx::query(
            r#"
            INSERT INTO summary (
                name, total_episodes, downloaded_count, not_downloaded_count,
                percent_downloaded, last_downloaded_at, feed_image_url, feed_url
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(name) DO UPDATE SET
                total_episodes = excluded.total_episodes,
                downloaded_count = excluded.downloaded_count,
                not_downloaded_count = excluded.not_downloaded_count,
                percent_downloaded = excluded.percent_downloaded,
                last_downloaded_at = excluded.last_downloaded_at,
                feed_image_url = COALESCE(excluded.feed_image_url, summary.feed_image_url),
                feed_url = COALESCE(excluded.feed_url, summary.feed_url)
            "#,
        )
        .bind(scope.as_str())
        .bind(total)
        .bind(downloaded)
        .bind(not_downloaded)
        .bind(percent)
        .bind(&last_downloaded_at)
        .bind(feed_image_url)
        .bind(feed_url)
        .execute(self.pool())
        .await?;

        let summary = self.summary(scope).await?.ok_or_else(|| {
            StoreError::Query(sqlx::Error::RowNotFound)
        })?;
        Ok(summary)
    }

    /// Read the summary row for `scope`, if one has been computed
    pub async fn summary(&self, scope: &FeedScope) -> Result<Option<FeedSummary>, StoreError> {
        let sql = format!("SELECT {SUMMARY_COLUMNS} FROM summary WHERE name = ?");
        let row = sqlx::query_as::<_, FeedSummary>(&sql)
            .bind(scope.as_str())
            .fetch_optional(self.pool())
            .await?;

        Ok(row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use tempfile::tempdir;

    use crate::feed::ParsedEpisode;
    use crate::store::StagedDownload;

    fn parsed_episode(id: &str, published: &str) -> ParsedEpisode {
        ParsedEpisode {
            id: id.to_string(),
            title: format!("Episode {id}"),
            link: None,
            direct_link: Some(format!("https://example.com/{id}.mp3")),
            summary: None,
            published_raw: None,
            published_normalized: Some(published.to_string()),
            episode_number: None,
            season_number: None,
            episode_image_url: None,
        }
    }

    async fn seeded_store() -> (EpisodeStore, FeedScope) {
        let store = EpisodeStore::in_memory().await.unwrap();
        let scope = FeedScope::new("my_podcast").unwrap();
        store.ensure_schema(&scope).await.unwrap();
        store
            .upsert_episodes(
                &scope,
                &[
                    parsed_episode("ep-1", "2024-01-01T00:00:00+00:00"),
                    parsed_episode("ep-2", "2024-01-02T00:00:00+00:00"),
                    parsed_episode("ep-3", "2024-01-03T00:00:00+00:00"),
                ],
            )
            .await
            .unwrap();
        (store, scope)
    }

    #[tokio::test]
    async fn summary_counts_are_derived_from_episodes() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("ep-2.mp3");
        std::fs::write(&file, b"audio").unwrap();

        let (store, scope) = seeded_store().await;
        store
            .apply_batch(
                &scope,
                &[StagedDownload {
                    episode_id: "ep-2".to_string(),
                    saved_path: file,
                    file_size: 5,
                    file_name: "ep-2.mp3".to_string(),
                }],
            )
            .await
            .unwrap();

        let summary = store
            .recompute_summary(&scope, Some("https://example.com/feed.xml"), None)
            .await
            .unwrap();

        assert_eq!(summary.name, "my_podcast");
        assert_eq!(summary.total_episodes, 3);
        assert_eq!(summary.downloaded_count, 1);
        assert_eq!(summary.not_downloaded_count, 2);
        assert!((summary.percent_downloaded - 33.33).abs() < 0.001);
        assert_eq!(
            summary.last_downloaded_at,
            Some("2024-01-02T00:00:00+00:00".to_string())
        );
        assert_eq!(
            summary.feed_url,
            Some("https://example.com/feed.xml".to_string())
        );
    }

    #[tokio::test]
    async fn recompute_preserves_urls_when_not_provided() {
        let (store, scope) = seeded_store().await;

        store
            .recompute_summary(
                &scope,
                Some("https://example.com/feed.xml"),
                Some("https://example.com/cover.jpg"),
            )
            .await
            .unwrap();

        let summary = store.recompute_summary(&scope, None, None).await.unwrap();

        assert_eq!(
            summary.feed_url,
            Some("https://example.com/feed.xml".to_string())
        );
        assert_eq!(
            summary.feed_image_url,
            Some("https://example.com/cover.jpg".to_string())
        );
    }

    #[tokio::test]
    async fn empty_feed_summary_is_all_zeroes() {
        let store = EpisodeStore::in_memory().await.unwrap();
        let scope = FeedScope::new("empty_feed").unwrap();
        store.ensure_schema(&scope).await.unwrap();

        let summary = store.recompute_summary(&scope, None, None).await.unwrap();

        assert_eq!(summary.total_episodes, 0);
        assert_eq!(summary.downloaded_count, 0);
        assert_eq!(summary.percent_downloaded, 0.0);
        assert!(summary.last_downloaded_at.is_none());
    }

    #[tokio::test]
    async fn summary_is_none_before_first_recompute() {
        let store = EpisodeStore::in_memory().await.unwrap();
        let scope = FeedScope::new("fresh_feed").unwrap();
        store.ensure_schema(&scope).await.unwrap();

        assert!(store.summary(&scope).await.unwrap().is_none());
    }
}
