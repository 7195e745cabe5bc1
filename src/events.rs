use std::sync::Arc;
use std::time::Duration;

/// Events emitted by the engine components for progress reporting and
/// diagnostics.
///
/// Implementations can use these to drive terminal output, collect
/// statistics, or stay silent.
#[derive(Debug, Clone)]
pub enum EngineEvent {
    /// A feed is being refreshed from its URL
    FeedRefreshStarted { url: String },

    /// Feed parsed and persisted
    FeedRefreshed {
        scope: String,
        total_episodes: usize,
        new_episodes: usize,
    },

    /// Feed content served from cache
    CacheHit { url: String },

    /// Feed content absent from cache
    CacheMiss { url: String },

    /// Cached feed content was older than the TTL
    CacheExpired { url: String },

    /// An entry was evicted to stay within cache limits
    CacheEvicted { url: String, size_bytes: usize },

    /// A failed fetch will be retried after a backoff delay
    RetryScheduled {
        url: String,
        attempt: u32,
        max_attempts: u32,
        delay: Duration,
    },

    /// Per-episode processing started
    EpisodeStarted {
        episode_id: String,
        title: String,
        index: usize,
        total: usize,
    },

    /// The media file was already on disk at the expected path
    EpisodeAlreadyPresent { episode_id: String, title: String },

    /// Episode media downloaded and finalized
    EpisodeDownloaded {
        episode_id: String,
        title: String,
        bytes: u64,
    },

    /// Per-episode processing failed; the run continues
    EpisodeFailed {
        episode_id: String,
        title: String,
        error: String,
    },

    /// Cover art could not be fetched or written
    CoverArtFailed { url: String, error: String },

    /// The tag writer reported a failure; the episode stays downloaded
    TagWriteFailed { episode_id: String, error: String },

    /// The feed-entry XML fragment could not be archived
    ArchiveSkipped { episode_id: String, reason: String },

    /// A batch of state changes became durable
    BatchCommitted { count: usize },

    /// A batch flush failed and its staged changes were discarded
    BatchDiscarded { count: usize, error: String },

    /// Download session finished
    RunCompleted { succeeded: usize, failed: usize },
}

/// Sink for engine events.
///
/// A single sink instance is injected into every component; components
/// never own their own output configuration.
pub trait EventSink: Send + Sync {
    /// Handle one event
    fn emit(&self, event: EngineEvent);
}

/// A shared reference to an event sink
pub type SharedEventSink = Arc<dyn EventSink>;

/// Sink that silently drops all events. Useful for tests or quiet mode.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl EventSink for NoopSink {
    fn emit(&self, _event: EngineEvent) {
        // Intentionally empty
    }
}

impl NoopSink {
    /// Create a NoopSink wrapped in an Arc
    pub fn shared() -> SharedEventSink {
        Arc::new(Self)
    }
}
