use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::debug;

use mnemo_config::CacheConfig;

use crate::clock::Clock;
use crate::error::{CacheError, CacheResult};
use crate::io::{FileIo, WriteMode};
use crate::manifest::ManifestStore;
use crate::paths::{CacheArtifact, validate_topic};
use crate::state::{AutoUpdateJob, CacheState};

mod lifecycle;
mod maintenance;
mod settings;

pub use maintenance::select_for_cleanup;

/// The cache state manager for one session.
///
/// Owns the session's [`CacheState`] and talks to disk only through the
/// injected [`FileIo`].  Construct one per connection; two sessions sharing
/// a manager would share the active topic.
pub struct CacheManager {
    io: Arc<dyn FileIo>,
    clock: Arc<dyn Clock>,
    manifests: ManifestStore,
    state: Mutex<CacheState>,
    config: CacheConfig,
}

impl CacheManager {
    pub fn new(config: &CacheConfig, io: Arc<dyn FileIo>, clock: Arc<dyn Clock>) -> Self {
        let state = CacheState::new(config.base_path(), config.update_interval);
        Self {
            manifests: ManifestStore::new(io.clone(), config.manifest_retry_attempts),
            io,
            clock,
            state: Mutex::new(state),
            config: config.clone(),
        }
    }

    /// A copy of the current session state.
    pub async fn state(&self) -> CacheState {
        self.state.lock().await.clone()
    }

    pub fn manifests(&self) -> &ManifestStore {
        &self.manifests
    }

    /// Count one external tool call.  Returns the update to run when the
    /// auto-update cadence is reached.
    pub async fn register_tool_call(&self) -> Option<AutoUpdateJob> {
        let now = self.now();
        let mut state = self.state.lock().await;
        let job = state.register_tool_call(now);
        debug!(
            tool_calls = state.tool_call_count,
            due = job.is_some(),
            "tool call registered"
        );
        job
    }

    fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    async fn base_for(&self, explicit: Option<PathBuf>) -> PathBuf {
        match explicit {
            Some(dir) => dir,
            None => self.state.lock().await.base_cache_dir.clone(),
        }
    }

    async fn append(&self, dir: &Path, artifact: CacheArtifact, section: &str) -> CacheResult<()> {
        let path = artifact.path_in(dir);
        self.io
            .write_file(&path, section, WriteMode::Append)
            .await
            .map_err(|err| CacheError::io(&path, err))
    }

    /// All four memory artifacts exist directly under `base`.
    async fn legacy_present(&self, base: &Path) -> bool {
        for artifact in CacheArtifact::MEMORY {
            if !self.io.file_exists(&artifact.path_in(base)).await {
                return false;
            }
        }
        true
    }
}

/// Trim and validate an optional topic argument.  A blank topic counts as
/// no topic.
fn normalize_topic(topic: Option<String>) -> CacheResult<Option<String>> {
    match topic {
        None => Ok(None),
        Some(raw) if raw.trim().is_empty() => Ok(None),
        Some(raw) => {
            let topic = raw.trim().to_string();
            validate_topic(&topic)?;
            Ok(Some(topic))
        }
    }
}

fn non_blank(text: Option<String>) -> Option<String> {
    text.filter(|text| !text.trim().is_empty())
}

#[cfg(test)]
mod scenarios;
