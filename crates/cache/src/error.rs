use std::path::PathBuf;

use thiserror::Error;

/// Failures surfaced by cache operations.
///
/// Messages are relayed verbatim to the calling agent and end with the
/// action that resolves them.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("invalid input: {0}")]
    Validation(String),

    #[error("cache not initialized in this session. Run cache_init (new topic) or cache_load (existing topic) first.")]
    NotInitialized,

    #[error("cache directory {} does not exist. Run cache_init for this topic first.", .0.display())]
    DirectoryMissing(PathBuf),

    #[error("topic '{0}' not found. Run cache_list_topics to see available topics, or cache_init to create it.")]
    TopicNotFound(String),

    #[error("no legacy cache found at {}. Pass a topic, or run cache_init without one.", .0.display())]
    LegacyNotFound(PathBuf),

    #[error("topic '{0}' is archived. Run cache_init with this topic to reactivate it.")]
    TopicArchived(String),

    #[error("manifest {} kept changing while being updated ({attempts} attempts). Retry the operation.", .path.display())]
    ManifestConflict { path: PathBuf, attempts: u32 },

    #[error("i/o error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CacheError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}

/// Result type for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;
