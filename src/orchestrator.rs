// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{Datelike, NaiveDate, Utc};

use crate::batch::BatchCommitter;
use crate::cache::FeedCache;
use crate::config::EngineConfig;
use crate::error::{DownloadError, EngineError};
use crate::events::{EngineEvent, SharedEventSink};
use crate::feed::{extract_item_xml, parse_feed};
use crate::fetch::Fetcher;
use crate::filename;
use crate::http::HttpClient;
use crate::store::{Episode, EpisodeStore, FeedScope, StagedDownload};
use crate::tags::{TagSet, TagWriter};

/// Success and failure counts for one download session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunReport {
    pub succeeded: usize,
    pub failed: usize,
}

/// Drives feed ingestion and bulk episode downloads.
///
/// Strictly sequential: one feed, one episode, one blocking operation at
/// a time. Every per-episode failure is absorbed at the loop boundary so
/// a single bad episode never aborts the run.
pub struct Orchestrator<C> {
    store: EpisodeStore,
    fetcher: Fetcher<C>,
    cache: FeedCache,
    tag_writer: Box<dyn TagWriter>,
    sink: SharedEventSink,
    downloads_dir: PathBuf,
    batch_size: usize,
    episode_delay: Duration,
}

impl<C: HttpClient> Orchestrator<C> {
    pub fn new(
        config: &EngineConfig,
        store: EpisodeStore,
        client: C,
        tag_writer: Box<dyn TagWriter>,
        sink: SharedEventSink,
    ) -> Self {
        let fetcher = Fetcher::new(
            client,
            config.retry.clone(),
            config.request_timeout,
            sink.clone(),
        );
        let cache = FeedCache::new(&config.cache, sink.clone());

        Self {
            store,
            fetcher,
            cache,
            tag_writer,
            sink,
            downloads_dir: config.downloads_dir.clone(),
            batch_size: config.batch_size,
            episode_delay: config.episode_delay,
        }
    }

    pub fn store(&self) -> &EpisodeStore {
        &self.store
    }

    /// Fetch and parse the feed, persist its entries, and recompute the
    /// summary. Returns the scope derived from the channel title.
    pub async fn refresh_feed(&mut self, feed_url: &str) -> Result<FeedScope, EngineError> {
        self.sink.emit(EngineEvent::FeedRefreshStarted {
            url: feed_url.to_string(),
        });

        let bytes = self.cache.get(feed_url, &self.fetcher).await?;
        let feed = parse_feed(&bytes, feed_url)?;
        let scope = FeedScope::from_title(&feed.title)?;

        self.store.ensure_schema(&scope).await?;
        let new_episodes = self.store.upsert_episodes(&scope, &feed.episodes).await?;
        self.store
            .recompute_summary(&scope, Some(feed_url), feed.image_url.as_deref())
            .await?;

        self.sink.emit(EngineEvent::FeedRefreshed {
            scope: scope.as_str().to_string(),
            total_episodes: feed.episodes.len(),
            new_episodes,
        });

        Ok(scope)
    }

    /// Download every pending episode of `scope`, pausing between
    /// episodes
    pub async fn download_all(&mut self, scope: &FeedScope) -> Result<RunReport, EngineError> {
        let episodes = self.store.pending_episodes(scope, false).await?;
        self.run(scope, episodes, self.episode_delay).await
    }

    /// Download only the most recent pending episode. Returns whether an
    /// episode was downloaded.
    pub async fn download_latest(&mut self, scope: &FeedScope) -> Result<bool, EngineError> {
        let episodes = self.store.pending_episodes(scope, true).await?;
        let report = self.run(scope, episodes, Duration::ZERO).await?;
        Ok(report.succeeded > 0)
    }

    async fn run(
        &mut self,
        scope: &FeedScope,
        episodes: Vec<Episode>,
        delay: Duration,
    ) -> Result<RunReport, EngineError> {
        let summary = self.store.summary(scope).await?;
        let feed_url = summary.as_ref().and_then(|s| s.feed_url.clone());
        let feed_image_url = summary.as_ref().and_then(|s| s.feed_image_url.clone());

        let mut committer = BatchCommitter::new(self.batch_size);
        // The feed-level cover is fetched at most once per run
        let mut feed_cover: Option<Option<PathBuf>> = None;

        let mut succeeded = 0;
        let mut failed = 0;
        let total = episodes.len();

        for (index, episode) in episodes.iter().enumerate() {
            self.sink.emit(EngineEvent::EpisodeStarted {
                episode_id: episode.id.clone(),
                title: episode.title.clone(),
                index,
                total,
            });

            let outcome = self
                .process_episode(
                    scope,
                    episode,
                    feed_url.as_deref(),
                    feed_image_url.as_deref(),
                    &mut feed_cover,
                )
                .await;

            match outcome {
                Ok(mutation) => {
                    succeeded += 1;
                    committer.stage(mutation);

                    let staged = committer.staged_len();
                    match committer.flush_if_full(&self.store, scope).await {
                        Ok(Some(result)) => self.sink.emit(EngineEvent::BatchCommitted {
                            count: result.committed,
                        }),
                        Ok(None) => {}
                        // Only the in-flight batch is lost; earlier
                        // commits stay durable
                        Err(e) => self.sink.emit(EngineEvent::BatchDiscarded {
                            count: staged,
                            error: e.to_string(),
                        }),
                    }
                }
                Err(e) => {
                    failed += 1;
                    self.sink.emit(EngineEvent::EpisodeFailed {
                        episode_id: episode.id.clone(),
                        title: episode.title.clone(),
                        error: e.to_string(),
                    });
                }
            }

            if index + 1 < total && !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }

        let staged = committer.staged_len();
        match committer.flush(&self.store, scope).await {
            Ok(result) if result.committed > 0 => self.sink.emit(EngineEvent::BatchCommitted {
                count: result.committed,
            }),
            Ok(_) => {}
            Err(e) => self.sink.emit(EngineEvent::BatchDiscarded {
                count: staged,
                error: e.to_string(),
            }),
        }

        self.store
            .recompute_summary(scope, feed_url.as_deref(), feed_image_url.as_deref())
            .await?;

        self.sink
            .emit(EngineEvent::RunCompleted { succeeded, failed });

        Ok(RunReport { succeeded, failed })
    }

    async fn process_episode(
        &mut self,
        scope: &FeedScope,
        episode: &Episode,
        feed_url: Option<&str>,
        feed_image_url: Option<&str>,
        feed_cover: &mut Option<Option<PathBuf>>,
    ) -> Result<StagedDownload, DownloadError> {
        let media_url = episode
            .direct_link
            .as_deref()
            .or(episode.link.as_deref())
            .filter(|url| !url.is_empty())
            .ok_or_else(|| DownloadError::MissingMediaUrl {
                title: episode.title.clone(),
            })?;

        let date = episode
            .published()
            .map(|dt| dt.date_naive())
            .unwrap_or_else(|| Utc::now().date_naive());

        let episode_dir = self.episode_dir(scope, date, &episode.title);
        tokio::fs::create_dir_all(&episode_dir)
            .await
            .map_err(|e| DownloadError::CreateDirFailed {
                path: episode_dir.clone(),
                source: e,
            })?;

        let safe_title = filename::sanitize_component(&episode.title);
        let extension = filename::media_extension(media_url);
        let file_name = filename::media_file_name(&episode.title, scope.as_str(), &extension);
        let media_path = episode_dir.join(&file_name);

        let bytes = if media_path.exists() {
            self.sink.emit(EngineEvent::EpisodeAlreadyPresent {
                episode_id: episode.id.clone(),
                title: episode.title.clone(),
            });
            tokio::fs::metadata(&media_path)
                .await
                .map_or(0, |meta| meta.len())
        } else {
            let bytes = self.fetcher.fetch_to_file(media_url, &media_path).await?;
            self.sink.emit(EngineEvent::EpisodeDownloaded {
                episode_id: episode.id.clone(),
                title: episode.title.clone(),
                bytes,
            });
            bytes
        };

        let episode_cover = match episode.episode_image_url.as_deref().filter(|u| !u.is_empty()) {
            Some(url) => {
                let stem = format!("{safe_title} - {}", scope.as_str());
                self.save_image(url, &episode_dir, &stem).await
            }
            None => None,
        };
        let feed_cover_path = self
            .feed_cover_art(scope, feed_image_url, feed_cover)
            .await;

        let tags = TagSet {
            title: episode.title.clone(),
            artist: scope.as_str().to_string(),
            album: scope.as_str().to_string(),
            year: Some(date.year()),
            track: episode.episode_number,
            disc: episode.season_number,
            comment: episode.summary.clone(),
            // The episode's own art wins over the feed-level cover
            cover_image_path: episode_cover.or(feed_cover_path),
            genre: "Podcast".to_string(),
        };
        if let Err(e) = self.tag_writer.write_tags(&tags, &media_path) {
            self.sink.emit(EngineEvent::TagWriteFailed {
                episode_id: episode.id.clone(),
                error: e.to_string(),
            });
        }

        self.archive_metadata(episode, feed_url, &episode_dir).await;

        Ok(StagedDownload {
            episode_id: episode.id.clone(),
            saved_path: media_path,
            file_size: bytes,
            file_name,
        })
    }

    fn episode_dir(&self, scope: &FeedScope, date: NaiveDate, title: &str) -> PathBuf {
        self.downloads_dir
            .join(scope.as_str())
            .join(date.year().to_string())
            .join(filename::episode_dir_name(
                &date.format("%Y-%m-%d").to_string(),
                title,
            ))
    }

    /// Best-effort image download; the episode never fails because of
    /// cover art
    async fn save_image(&self, url: &str, dir: &Path, stem: &str) -> Option<PathBuf> {
        let extension = filename::image_extension(url);
        let path = dir.join(format!("{stem}.{extension}"));
        if path.exists() {
            return Some(path);
        }

        let bytes = match self.fetcher.fetch_bytes(url).await {
            Ok(bytes) => bytes,
            Err(e) => {
                self.sink.emit(EngineEvent::CoverArtFailed {
                    url: url.to_string(),
                    error: e.to_string(),
                });
                return None;
            }
        };

        match tokio::fs::write(&path, &bytes).await {
            Ok(()) => Some(path),
            Err(e) => {
                self.sink.emit(EngineEvent::CoverArtFailed {
                    url: url.to_string(),
                    error: e.to_string(),
                });
                None
            }
        }
    }

    async fn feed_cover_art(
        &self,
        scope: &FeedScope,
        feed_image_url: Option<&str>,
        memo: &mut Option<Option<PathBuf>>,
    ) -> Option<PathBuf> {
        if let Some(known) = memo {
            return known.clone();
        }

        let result = match feed_image_url.filter(|url| !url.is_empty()) {
            Some(url) => {
                let feed_dir = self.downloads_dir.join(scope.as_str());
                self.save_image(url, &feed_dir, "podcast_image").await
            }
            None => None,
        };

        // Attempted once per run, whatever the outcome
        *memo = Some(result.clone());
        result
    }

    /// Archive the episode's original feed entry next to the media file.
    /// Sourced through the feed cache, so a whole-feed run costs one
    /// fetch.
    async fn archive_metadata(
        &mut self,
        episode: &Episode,
        feed_url: Option<&str>,
        episode_dir: &Path,
    ) {
        let Some(feed_url) = feed_url else {
            self.sink.emit(EngineEvent::ArchiveSkipped {
                episode_id: episode.id.clone(),
                reason: "feed URL not recorded in summary".to_string(),
            });
            return;
        };

        let bytes = match self.cache.get(feed_url, &self.fetcher).await {
            Ok(bytes) => bytes,
            Err(e) => {
                self.sink.emit(EngineEvent::ArchiveSkipped {
                    episode_id: episode.id.clone(),
                    reason: e.to_string(),
                });
                return;
            }
        };

        let fragment = match extract_item_xml(
            &bytes,
            &episode.id,
            &episode.title,
            episode.link.as_deref(),
        ) {
            Ok(Some(fragment)) => fragment,
            Ok(None) => {
                self.sink.emit(EngineEvent::ArchiveSkipped {
                    episode_id: episode.id.clone(),
                    reason: "entry no longer present in feed".to_string(),
                });
                return;
            }
            Err(e) => {
                self.sink.emit(EngineEvent::ArchiveSkipped {
                    episode_id: episode.id.clone(),
                    reason: e.to_string(),
                });
                return;
            }
        };

        let path = episode_dir.join("episode_metadata.xml");
        if let Err(e) = tokio::fs::write(&path, fragment).await {
            self.sink.emit(EngineEvent::ArchiveSkipped {
                episode_id: episode.id.clone(),
                reason: e.to_string(),
            });
        }
    }
}
