use crate::error::StoreError;
use crate::store::{EpisodeStore, FeedScope, StagedDownload};

/// Outcome of one flush
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommitResult {
    /// Number of episode rows made durable
    pub committed: usize,
}

/// Accumulates episode state changes and flushes them as one durable
/// transaction per batch.
///
/// A failed flush discards every staged mutation: the affected episodes
/// simply require re-download on the next run instead of leaving the
/// store partially updated.
pub struct BatchCommitter {
    staged: Vec<StagedDownload>,
    batch_size: usize,
}

impl BatchCommitter {
    pub fn new(batch_size: usize) -> Self {
        Self {
            staged: Vec::new(),
            batch_size: batch_size.max(1),
        }
    }

    /// Hold a state change until the next flush
    pub fn stage(&mut self, mutation: StagedDownload) {
        self.staged.push(mutation);
    }

    pub fn staged_len(&self) -> usize {
        self.staged.len()
    }

    /// Apply everything staged as one transaction. The staged list is
    /// consumed whether the flush succeeds or not.
    pub async fn flush(
        &mut self,
        store: &EpisodeStore,
        scope: &FeedScope,
    ) -> Result<CommitResult, StoreError> {
        if self.staged.is_empty() {
            return Ok(CommitResult { committed: 0 });
        }

        let mutations = std::mem::take(&mut self.staged);
        let committed = store.apply_batch(scope, &mutations).await?;
        Ok(CommitResult { committed })
    }

    /// Flush only once the configured batch size has accumulated
    pub async fn flush_if_full(
        &mut self,
        store: &EpisodeStore,
        scope: &FeedScope,
    ) -> Result<Option<CommitResult>, StoreError> {
        if self.staged.len() >= self.batch_size {
            self.flush(store, scope).await.map(Some)
        } else {
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use tempfile::tempdir;

    use crate::feed::ParsedEpisode;
    use crate::store::EpisodeStatus;

    fn parsed_episode(id: &str) -> ParsedEpisode {
        ParsedEpisode {
            id: id.to_string(),
            title: format!("Episode {id}"),
            link: None,
            direct_link: None,
            summary: None,
            published_raw: None,
            published_normalized: Some("2024-01-01T00:00:00+00:00".to_string()),
            episode_number: None,
            season_number: None,
            episode_image_url: None,
        }
    }

    fn staged(id: &str, dir: &std::path::Path) -> StagedDownload {
        let path = dir.join(format!("{id}.mp3"));
        std::fs::write(&path, b"audio").unwrap();
        StagedDownload {
            episode_id: id.to_string(),
            saved_path: path,
            file_size: 5,
            file_name: format!("{id}.mp3"),
        }
    }

    async fn store_with_episodes(ids: &[&str]) -> (EpisodeStore, FeedScope) {
        let store = EpisodeStore::in_memory().await.unwrap();
        let scope = FeedScope::new("my_podcast").unwrap();
        store.ensure_schema(&scope).await.unwrap();
        let episodes: Vec<ParsedEpisode> = ids.iter().map(|id| parsed_episode(id)).collect();
        store.upsert_episodes(&scope, &episodes).await.unwrap();
        (store, scope)
    }

    #[tokio::test]
    async fn flush_if_full_waits_for_threshold() {
        let dir = tempdir().unwrap();
        let (store, scope) = store_with_episodes(&["ep-1", "ep-2", "ep-3"]).await;
        let mut committer = BatchCommitter::new(3);

        committer.stage(staged("ep-1", dir.path()));
        assert!(
            committer
                .flush_if_full(&store, &scope)
                .await
                .unwrap()
                .is_none()
        );

        committer.stage(staged("ep-2", dir.path()));
        committer.stage(staged("ep-3", dir.path()));
        let result = committer
            .flush_if_full(&store, &scope)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(result.committed, 3);
        assert_eq!(committer.staged_len(), 0);
    }

    #[tokio::test]
    async fn flush_with_nothing_staged_commits_zero() {
        let (store, scope) = store_with_episodes(&[]).await;
        let mut committer = BatchCommitter::new(5);

        let result = committer.flush(&store, &scope).await.unwrap();
        assert_eq!(result.committed, 0);
    }

    #[tokio::test]
    async fn failed_flush_discards_all_staged_mutations() {
        let dir = tempdir().unwrap();
        let (store, scope) = store_with_episodes(&["ep-1", "ep-2"]).await;
        let mut committer = BatchCommitter::new(10);

        committer.stage(staged("ep-1", dir.path()));
        committer.stage(StagedDownload {
            episode_id: "ep-2".to_string(),
            saved_path: dir.path().join("missing.mp3"),
            file_size: 5,
            file_name: "missing.mp3".to_string(),
        });

        let result = committer.flush(&store, &scope).await;
        assert!(matches!(result, Err(StoreError::MissingFile { .. })));
        assert_eq!(committer.staged_len(), 0);

        // Both episodes revert to requiring re-download
        for id in ["ep-1", "ep-2"] {
            let episode = store.episode(&scope, id).await.unwrap().unwrap();
            assert_eq!(episode.status, EpisodeStatus::NotDownloaded);
        }
    }

    #[tokio::test]
    async fn tail_flush_commits_a_short_batch() {
        let dir = tempdir().unwrap();
        let (store, scope) = store_with_episodes(&["ep-1"]).await;
        let mut committer = BatchCommitter::new(10);

        committer.stage(staged("ep-1", dir.path()));
        let result = committer.flush(&store, &scope).await.unwrap();

        assert_eq!(result.committed, 1);
    }
}
