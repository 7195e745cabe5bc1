use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the input validation gates (feed scopes and feed URLs)
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("feed scope cannot be empty")]
    EmptyScope,

    #[error("feed scope '{name}' exceeds {max} characters")]
    ScopeTooLong { name: String, max: usize },

    #[error("feed scope '{name}' contains characters outside [a-z0-9_]")]
    UnsafeScope { name: String },

    #[error("feed scope '{name}' is a reserved word")]
    ReservedScope { name: String },

    #[error("invalid feed URL '{url}': {reason}")]
    InvalidFeedUrl { url: String, reason: String },
}

/// Classified network fetch failures
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("request to {url} timed out")]
    Timeout { url: String },

    #[error("connection to {url} failed: {source}")]
    Connection {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("HTTP status {status} for {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("malformed URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("request to {url} failed: {source}")]
    Other {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

impl FetchError {
    /// Timeouts, connection failures and 5xx responses may succeed on a
    /// later attempt; everything else fails on first occurrence.
    pub fn is_transient(&self) -> bool {
        match self {
            FetchError::Timeout { .. } | FetchError::Connection { .. } => true,
            FetchError::HttpStatus { status, .. } => *status >= 500,
            FetchError::InvalidUrl(_) | FetchError::Other { .. } => false,
        }
    }

    /// Classify a reqwest transport error
    pub(crate) fn from_transport(url: &str, source: reqwest::Error) -> Self {
        if source.is_timeout() {
            FetchError::Timeout {
                url: url.to_string(),
            }
        } else if source.is_connect() {
            FetchError::Connection {
                url: url.to_string(),
                source,
            }
        } else {
            FetchError::Other {
                url: url.to_string(),
                source,
            }
        }
    }
}

/// Errors while downloading one episode's files
#[derive(Error, Debug)]
pub enum DownloadError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("episode '{title}' has no downloadable media URL")]
    MissingMediaUrl { title: String },

    #[error("failed to create directory {path}: {source}")]
    CreateDirFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {path}: {source}")]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to move {from} into place: {source}")]
    FinalizeFailed {
        from: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl DownloadError {
    /// Filesystem failures are never retried; network failures defer to
    /// [`FetchError::is_transient`].
    pub fn is_transient(&self) -> bool {
        matches!(self, DownloadError::Fetch(e) if e.is_transient())
    }
}

/// Errors from the episode store
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("failed to open database: {0}")]
    Open(#[source] sqlx::Error),

    #[error("database query failed: {0}")]
    Query(#[from] sqlx::Error),

    #[error("episode '{episode_id}' staged as downloaded but {path} does not exist")]
    MissingFile { episode_id: String, path: PathBuf },

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// Top-level errors for orchestrated runs
#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("failed to parse RSS feed: {0}")]
    FeedParse(#[from] rss::Error),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Download(#[from] DownloadError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_is_transient() {
        let err = FetchError::Timeout {
            url: "https://example.com/feed.xml".to_string(),
        };
        assert!(err.is_transient());
    }

    #[test]
    fn server_errors_are_transient() {
        let err = FetchError::HttpStatus {
            url: "https://example.com/ep.mp3".to_string(),
            status: 503,
        };
        assert!(err.is_transient());
    }

    #[test]
    fn client_errors_are_permanent() {
        let err = FetchError::HttpStatus {
            url: "https://example.com/ep.mp3".to_string(),
            status: 404,
        };
        assert!(!err.is_transient());
    }

    #[test]
    fn malformed_url_is_permanent() {
        let err = FetchError::InvalidUrl(url::Url::parse("not a url").unwrap_err());
        assert!(!err.is_transient());
    }

    #[test]
    fn filesystem_errors_are_permanent() {
        let err = DownloadError::WriteFailed {
            path: PathBuf::from("/tmp/episode.mp3"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        assert!(!err.is_transient());
    }

    #[test]
    fn download_fetch_errors_keep_their_classification() {
        let transient = DownloadError::Fetch(FetchError::Timeout {
            url: "https://example.com/ep.mp3".to_string(),
        });
        assert!(transient.is_transient());

        let permanent = DownloadError::Fetch(FetchError::HttpStatus {
            url: "https://example.com/ep.mp3".to_string(),
            status: 410,
        });
        assert!(!permanent.is_transient());
    }
}
