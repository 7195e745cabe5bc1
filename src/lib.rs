pub mod batch;
pub mod cache;
pub mod config;
pub mod error;
pub mod events;
pub mod feed;
pub mod fetch;
pub mod filename;
pub mod http;
pub mod orchestrator;
pub mod resolver;
pub mod store;
pub mod tags;

// Re-export main types for convenience
pub use batch::{BatchCommitter, CommitResult};
pub use cache::{CacheStats, FeedCache};
pub use config::{CacheConfig, EngineConfig, RetryConfig};
pub use error::{DownloadError, EngineError, FetchError, StoreError, ValidationError};
pub use events::{EngineEvent, EventSink, NoopSink, SharedEventSink};
pub use feed::{ParsedEpisode, ParsedFeed, extract_item_xml, parse_feed};
pub use fetch::Fetcher;
pub use http::{HttpClient, ReqwestClient};
pub use orchestrator::{Orchestrator, RunReport};
pub use resolver::{DirectResolver, FeedUrlResolver};
pub use store::{Episode, EpisodeStatus, EpisodeStore, FeedScope, FeedSummary, StagedDownload};
pub use tags::{NoopTagWriter, TagSet, TagWriter};
