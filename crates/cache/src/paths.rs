use std::path::{Path, PathBuf};

use crate::error::{CacheError, CacheResult};

pub const MANIFEST_FILE: &str = "session_manifest.json";

const MAX_TOPIC_LEN: usize = 64;

/// The markdown files that make up one cache directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheArtifact {
    ConversationLog,
    ProjectState,
    Decisions,
    NextSteps,
    Protocol,
}

impl CacheArtifact {
    /// Every artifact, in the order they are written by init.
    pub const ALL: [CacheArtifact; 5] = [
        Self::ConversationLog,
        Self::ProjectState,
        Self::Decisions,
        Self::NextSteps,
        Self::Protocol,
    ];

    /// The four artifacts that carry session memory.  The protocol document
    /// is guidance, not memory, and is neither loaded nor required.
    pub const MEMORY: [CacheArtifact; 4] = [
        Self::ConversationLog,
        Self::ProjectState,
        Self::Decisions,
        Self::NextSteps,
    ];

    pub fn file_name(self) -> &'static str {
        match self {
            Self::ConversationLog => "conversation_log.md",
            Self::ProjectState => "current_project_state.md",
            Self::Decisions => "decisions_made.md",
            Self::NextSteps => "next_steps.md",
            Self::Protocol => "cache_protocol.md",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::ConversationLog => "Conversation Log",
            Self::ProjectState => "Project State",
            Self::Decisions => "Decisions",
            Self::NextSteps => "Next Steps",
            Self::Protocol => "Cache Protocol",
        }
    }

    pub fn path_in(self, dir: &Path) -> PathBuf {
        dir.join(self.file_name())
    }
}

/// Map a base directory and optional topic to the concrete cache directory.
/// Without a topic the base itself is the cache (legacy layout).
pub fn resolve_cache_dir(base: &Path, topic: Option<&str>) -> PathBuf {
    match topic {
        Some(topic) => base.join(topic),
        None => base.to_path_buf(),
    }
}

pub fn manifest_path(base: &Path) -> PathBuf {
    base.join(MANIFEST_FILE)
}

/// Reject topic names that would not map to exactly one child directory.
pub fn validate_topic(topic: &str) -> CacheResult<()> {
    if topic.trim().is_empty() {
        return Err(CacheError::validation("topic must not be empty"));
    }
    if topic.len() > MAX_TOPIC_LEN {
        return Err(CacheError::validation(format!(
            "topic must be at most {MAX_TOPIC_LEN} bytes"
        )));
    }
    if topic.contains(['/', '\\']) || topic.contains('\0') {
        return Err(CacheError::validation(format!(
            "topic '{topic}' must not contain path separators"
        )));
    }
    if topic.starts_with('.') {
        return Err(CacheError::validation(format!(
            "topic '{topic}' must not start with '.'"
        )));
    }
    Ok(())
}
