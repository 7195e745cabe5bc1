use std::path::{Path, PathBuf};

use thiserror::Error;

/// Structured tag-set handed to the external tag writer
#[derive(Debug, Clone)]
pub struct TagSet {
    pub title: String,
    pub artist: String,
    pub album: String,
    pub year: Option<i32>,
    /// Episode number
    pub track: Option<i64>,
    /// Season number
    pub disc: Option<i64>,
    pub comment: Option<String>,
    pub cover_image_path: Option<PathBuf>,
    pub genre: String,
}

#[derive(Debug, Error)]
#[error("tag write failed: {reason}")]
pub struct TagWriteError {
    pub reason: String,
}

/// External sink that applies a tag-set to a media file.
///
/// A failure here never reverts an episode's downloaded state; the media
/// file itself is the primary deliverable.
pub trait TagWriter: Send + Sync {
    fn write_tags(&self, tags: &TagSet, media_path: &Path) -> Result<(), TagWriteError>;
}

/// Tag writer that accepts everything and writes nothing
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopTagWriter;

impl TagWriter for NoopTagWriter {
    fn write_tags(&self, _tags: &TagSet, _media_path: &Path) -> Result<(), TagWriteError> {
        Ok(())
    }
}
