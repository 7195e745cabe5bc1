//! SQLite-backed episode store.
//!
//! One table per feed scope holds the episode records; a shared `summary`
//! table holds one derived row per feed. The store exclusively owns all
//! persisted state; callers hand it batches of mutations and read back
//! whole records.
//!
//! Methods on [`EpisodeStore`] are organized by domain:
//! - [`episodes`]: episode ingestion, pending queries, batch application
//! - [`summary`]: derived per-feed summary rows

use std::fmt;
use std::path::Path;

use chrono::{DateTime, FixedOffset};
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};

use crate::error::{StoreError, ValidationError};

mod episodes;
mod summary;

const MAX_SCOPE_LENGTH: usize = 100;

/// SQL keywords and table names a scope may never shadow
const RESERVED_SCOPES: &[&str] = &[
    "select", "insert", "update", "delete", "create", "drop", "alter", "table", "index", "view",
    "trigger", "database", "schema", "summary",
];

/// Validated feed-scope identifier.
///
/// The only gateway through which a per-feed table name reaches SQL text.
/// Construction rejects anything outside `[a-z0-9_]`, so quoting the
/// name can never break out of the identifier position.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FeedScope(String);

impl FeedScope {
    pub fn new(name: &str) -> Result<Self, ValidationError> {
        if name.is_empty() {
            return Err(ValidationError::EmptyScope);
        }
        if name.len() > MAX_SCOPE_LENGTH {
            return Err(ValidationError::ScopeTooLong {
                name: name.to_string(),
                max: MAX_SCOPE_LENGTH,
            });
        }

        let first_is_digit = name.chars().next().is_some_and(|c| c.is_ascii_digit());
        if first_is_digit
            || !name
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
        {
            return Err(ValidationError::UnsafeScope {
                name: name.to_string(),
            });
        }

        if RESERVED_SCOPES.contains(&name) {
            return Err(ValidationError::ReservedScope {
                name: name.to_string(),
            });
        }

        Ok(Self(name.to_string()))
    }

    /// Derive a scope from a raw feed title: lowercase, separators become
    /// underscores, everything else is dropped.
    pub fn from_title(title: &str) -> Result<Self, ValidationError> {
        let mut out = String::new();
        for c in title.trim().chars() {
            if c.is_ascii_alphanumeric() {
                out.push(c.to_ascii_lowercase());
            } else if (c.is_whitespace() || matches!(c, '-' | '.' | '_')) && !out.ends_with('_') {
                out.push('_');
            }
        }

        let mut out = out.trim_matches('_').to_string();
        if out.is_empty() {
            out = "unknown_podcast".to_string();
        }
        if out.chars().next().is_some_and(|c| c.is_ascii_digit())
            || RESERVED_SCOPES.contains(&out.as_str())
        {
            out = format!("podcast_{out}");
        }
        out.truncate(MAX_SCOPE_LENGTH);
        let out = out.trim_end_matches('_').to_string();

        Self::new(&out)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The scope as a quoted SQL identifier
    pub(crate) fn quoted(&self) -> String {
        format!("\"{}\"", self.0)
    }
}

impl fmt::Display for FeedScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Download state of one episode
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(rename_all = "snake_case")]
pub enum EpisodeStatus {
    NotDownloaded,
    Downloaded,
}

impl EpisodeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EpisodeStatus::NotDownloaded => "not_downloaded",
            EpisodeStatus::Downloaded => "downloaded",
        }
    }
}

/// One persisted episode record
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Episode {
    pub id: String,
    pub title: String,
    pub link: Option<String>,
    pub direct_link: Option<String>,
    pub summary: Option<String>,
    pub published_raw: Option<String>,
    pub published_normalized: Option<String>,
    pub episode_number: Option<i64>,
    pub season_number: Option<i64>,
    pub episode_image_url: Option<String>,
    pub status: EpisodeStatus,
    pub saved_path: Option<String>,
    pub file_size: Option<i64>,
    pub file_name: Option<String>,
}

impl Episode {
    /// Publish date parsed from the normalized value, falling back to the
    /// raw feed string
    pub fn published(&self) -> Option<DateTime<FixedOffset>> {
        if let Some(normalized) = &self.published_normalized
            && let Ok(dt) = DateTime::parse_from_rfc3339(normalized)
        {
            return Some(dt);
        }
        if let Some(raw) = &self.published_raw
            && let Ok(dt) = DateTime::parse_from_rfc2822(raw)
        {
            return Some(dt);
        }
        None
    }
}

/// An episode state change staged for a batch flush
#[derive(Debug, Clone)]
pub struct StagedDownload {
    pub episode_id: String,
    pub saved_path: std::path::PathBuf,
    pub file_size: u64,
    pub file_name: String,
}

/// Derived per-feed summary row
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct FeedSummary {
    pub name: String,
    pub total_episodes: i64,
    pub downloaded_count: i64,
    pub not_downloaded_count: i64,
    pub percent_downloaded: f64,
    pub last_downloaded_at: Option<String>,
    pub feed_image_url: Option<String>,
    pub feed_url: Option<String>,
}

/// Durable episode store over a SQLite file
pub struct EpisodeStore {
    pool: SqlitePool,
}

impl EpisodeStore {
    /// Open (creating if missing) the store at `path`
    pub async fn open(path: &Path) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(StoreError::Open)?;

        Ok(Self { pool })
    }

    /// In-memory store for tests
    pub async fn in_memory() -> Result<Self, StoreError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(StoreError::Open)?;

        Ok(Self { pool })
    }

    /// Create the episode table for `scope` and the shared summary table
    /// if they do not exist yet
    pub async fn ensure_schema(&self, scope: &FeedScope) -> Result<(), StoreError> {
        let episodes = format!(
            r#"
            CREATE TABLE IF NOT EXISTS {} (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                link TEXT,
                direct_link TEXT,
                summary TEXT,
                published_raw TEXT,
                published_normalized TEXT,
                episode_number INTEGER,
                season_number INTEGER,
                episode_image_url TEXT,
                status TEXT NOT NULL DEFAULT 'not_downloaded',
                saved_path TEXT,
                file_size INTEGER,
                file_name TEXT
            )
            "#,
            scope.quoted()
        );
        sqlx::query(&episodes).execute(&self.pool).await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS summary (
                name TEXT PRIMARY KEY,
                total_episodes INTEGER NOT NULL,
                downloaded_count INTEGER NOT NULL,
                not_downloaded_count INTEGER NOT NULL,
                percent_downloaded REAL NOT NULL,
                last_downloaded_at TEXT,
                feed_image_url TEXT,
                feed_url TEXT
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub(crate) fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scope_accepts_safe_names() {
        assert!(FeedScope::new("my_podcast").is_ok());
        assert!(FeedScope::new("show42").is_ok());
        assert!(FeedScope::new("_private").is_ok());
    }

    #[test]
    fn scope_rejects_empty_names() {
        assert!(matches!(
            FeedScope::new(""),
            Err(ValidationError::EmptyScope)
        ));
    }

    #[test]
    fn scope_rejects_sql_metacharacters() {
        for name in [
            "my podcast",
            "name\"; DROP TABLE summary; --",
            "name'with'quotes",
            "Uppercase",
            "semi;colon",
        ] {
            assert!(
                matches!(
                    FeedScope::new(name),
                    Err(ValidationError::UnsafeScope { .. })
                ),
                "expected '{}' to be rejected",
                name
            );
        }
    }

    #[test]
    fn scope_rejects_leading_digit() {
        assert!(matches!(
            FeedScope::new("99problems"),
            Err(ValidationError::UnsafeScope { .. })
        ));
    }

    #[test]
    fn scope_rejects_reserved_words() {
        assert!(matches!(
            FeedScope::new("select"),
            Err(ValidationError::ReservedScope { .. })
        ));
        assert!(matches!(
            FeedScope::new("summary"),
            Err(ValidationError::ReservedScope { .. })
        ));
    }

    #[test]
    fn scope_rejects_overlong_names() {
        let name = "a".repeat(MAX_SCOPE_LENGTH + 1);
        assert!(matches!(
            FeedScope::new(&name),
            Err(ValidationError::ScopeTooLong { .. })
        ));
    }

    #[test]
    fn scope_from_title_normalizes() {
        assert_eq!(
            FeedScope::from_title("My Great Podcast!").unwrap().as_str(),
            "my_great_podcast"
        );
        assert_eq!(
            FeedScope::from_title("  Spaced   Out  ").unwrap().as_str(),
            "spaced_out"
        );
        assert_eq!(
            FeedScope::from_title("Ünïcödé Show").unwrap().as_str(),
            "ncd_show"
        );
    }

    #[test]
    fn scope_from_title_handles_degenerate_titles() {
        assert_eq!(
            FeedScope::from_title("!!!").unwrap().as_str(),
            "unknown_podcast"
        );
        assert_eq!(
            FeedScope::from_title("99 Luftballons").unwrap().as_str(),
            "podcast_99_luftballons"
        );
        assert_eq!(
            FeedScope::from_title("Summary").unwrap().as_str(),
            "podcast_summary"
        );
    }

    #[test]
    fn quoted_scope_is_wrapped_in_double_quotes() {
        let scope = FeedScope::new("my_podcast").unwrap();
        assert_eq!(scope.quoted(), "\"my_podcast\"");
    }

    #[tokio::test]
    async fn ensure_schema_is_idempotent() {
        let store = EpisodeStore::in_memory().await.unwrap();
        let scope = FeedScope::new("my_podcast").unwrap();

        store.ensure_schema(&scope).await.unwrap();
        store.ensure_schema(&scope).await.unwrap();
    }
}
