use url::Url;

use crate::error::ValidationError;

const MAX_URL_LENGTH: usize = 2048;

/// Resolves a user-supplied link into a canonical feed URL.
///
/// Directory-specific resolvers (e.g. podcast platform pages) plug in
/// here; the engine itself only ever sees the canonical URL.
pub trait FeedUrlResolver: Send + Sync {
    fn resolve(&self, raw: &str) -> Result<String, ValidationError>;
}

/// Pass-through resolver: validates the URL shape and returns it unchanged
#[derive(Debug, Default, Clone, Copy)]
pub struct DirectResolver;

impl FeedUrlResolver for DirectResolver {
    fn resolve(&self, raw: &str) -> Result<String, ValidationError> {
        let trimmed = raw.trim();

        if trimmed.is_empty() {
            return Err(ValidationError::InvalidFeedUrl {
                url: raw.to_string(),
                reason: "URL cannot be empty".to_string(),
            });
        }
        if trimmed.len() > MAX_URL_LENGTH {
            return Err(ValidationError::InvalidFeedUrl {
                url: trimmed.to_string(),
                reason: format!("URL exceeds {MAX_URL_LENGTH} characters"),
            });
        }

        let parsed = Url::parse(trimmed).map_err(|e| ValidationError::InvalidFeedUrl {
            url: trimmed.to_string(),
            reason: e.to_string(),
        })?;

        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ValidationError::InvalidFeedUrl {
                url: trimmed.to_string(),
                reason: format!("scheme must be http or https, got '{}'", parsed.scheme()),
            });
        }
        if parsed.host_str().is_none() {
            return Err(ValidationError::InvalidFeedUrl {
                url: trimmed.to_string(),
                reason: "URL must include a host".to_string(),
            });
        }

        Ok(trimmed.to_string())
    }
}
