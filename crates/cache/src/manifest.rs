//! Persisted topic index: `<base>/session_manifest.json`.
//!
//! The manifest is one JSON document per base directory, rewritten as a whole
//! by every mutating operation.  [`ManifestStore::modify`] guards the
//! read-modify-write cycle with a SHA-256 fingerprint of the bytes it loaded:
//! if the file changed before the save, the edit is replayed against the new
//! content instead of overwriting it.  Cross-process writers can still race
//! in the short window between the fingerprint check and the rename.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::error::{CacheError, CacheResult};
use crate::io::{FileIo, WriteMode};
use crate::paths::manifest_path;

pub const MANIFEST_VERSION: &str = "1.0";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestEntry {
    pub created_at: DateTime<Utc>,
    pub last_used: DateTime<Utc>,
    #[serde(default)]
    pub project_name: String,
    #[serde(default)]
    pub session_only: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_cleanup_after_days: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archived_at: Option<DateTime<Utc>>,
}

/// Where a topic currently lives in the manifest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopicRecord<'a> {
    Active(&'a ManifestEntry),
    Archived(&'a ManifestEntry),
}

impl<'a> TopicRecord<'a> {
    pub fn entry(self) -> &'a ManifestEntry {
        match self {
            Self::Active(entry) | Self::Archived(entry) => entry,
        }
    }

    pub fn is_archived(self) -> bool {
        matches!(self, Self::Archived(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    #[serde(default)]
    pub active_sessions: BTreeMap<String, ManifestEntry>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub archived_sessions: BTreeMap<String, ManifestEntry>,
    #[serde(default = "current_version")]
    pub manifest_version: String,
}

fn current_version() -> String {
    MANIFEST_VERSION.to_string()
}

impl Default for Manifest {
    fn default() -> Self {
        Self {
            active_sessions: BTreeMap::new(),
            archived_sessions: BTreeMap::new(),
            manifest_version: current_version(),
        }
    }
}

impl Manifest {
    pub fn locate(&self, topic: &str) -> Option<TopicRecord<'_>> {
        if let Some(entry) = self.active_sessions.get(topic) {
            return Some(TopicRecord::Active(entry));
        }
        self.archived_sessions.get(topic).map(TopicRecord::Archived)
    }

    pub fn is_active(&self, topic: &str) -> bool {
        self.active_sessions.contains_key(topic)
    }

    pub fn is_archived(&self, topic: &str) -> bool {
        self.archived_sessions.contains_key(topic)
    }

    /// Insert or replace the active record of `topic`.  Any archived record
    /// of the same name is dropped so the topic lives in exactly one set.
    /// Returns the archived record that was replaced, if any.
    pub fn activate(&mut self, topic: &str, mut entry: ManifestEntry) -> Option<ManifestEntry> {
        entry.archived_at = None;
        let previous = self.archived_sessions.remove(topic);
        self.active_sessions.insert(topic.to_string(), entry);
        previous
    }

    /// Move `topic` from the active to the archived set.  `None` if the
    /// topic is not active.
    pub fn archive(&mut self, topic: &str, at: DateTime<Utc>) -> Option<&ManifestEntry> {
        let mut entry = self.active_sessions.remove(topic)?;
        entry.archived_at = Some(at);
        self.archived_sessions.insert(topic.to_string(), entry);
        self.archived_sessions.get(topic)
    }

    /// Bump `lastUsed` of an active topic.  Archived topics are left alone.
    pub fn touch(&mut self, topic: &str, at: DateTime<Utc>) -> bool {
        match self.active_sessions.get_mut(topic) {
            Some(entry) => {
                entry.last_used = at;
                true
            }
            None => false,
        }
    }

    /// Active topics, most recently used first.  Ties break by name so the
    /// order is stable.
    pub fn active_by_recency(&self) -> Vec<(&str, &ManifestEntry)> {
        let mut topics = self
            .active_sessions
            .iter()
            .map(|(name, entry)| (name.as_str(), entry))
            .collect::<Vec<_>>();
        topics.sort_by(|(left_name, left), (right_name, right)| {
            right
                .last_used
                .cmp(&left.last_used)
                .then_with(|| left_name.cmp(right_name))
        });
        topics
    }
}

/// The manifest as read from disk, plus the fingerprint of the exact bytes.
#[derive(Debug, Clone)]
struct Snapshot {
    manifest: Manifest,
    fingerprint: String,
}

pub struct ManifestStore {
    io: Arc<dyn FileIo>,
    retry_attempts: u32,
    write_lock: Mutex<()>,
}

impl ManifestStore {
    pub fn new(io: Arc<dyn FileIo>, retry_attempts: u32) -> Self {
        Self {
            io,
            retry_attempts: retry_attempts.max(1),
            write_lock: Mutex::new(()),
        }
    }

    /// Read the manifest of `base`.  A missing file yields an empty manifest;
    /// so does an unparsable one, after its bytes are copied to a `.corrupt`
    /// sidecar.
    pub async fn load(&self, base: &Path) -> CacheResult<Manifest> {
        Ok(self.snapshot(base).await?.manifest)
    }

    pub async fn save(&self, base: &Path, manifest: &Manifest) -> CacheResult<()> {
        self.io
            .create_dir(base)
            .await
            .map_err(|err| CacheError::io(base, err))?;
        let path = manifest_path(base);
        let rendered = serde_json::to_string_pretty(manifest)?;
        self.io
            .write_file(&path, &rendered, WriteMode::Rewrite)
            .await
            .map_err(|err| CacheError::io(&path, err))
    }

    /// Load, apply `edit`, and save, unless the file changed on disk since
    /// it was loaded, in which case `edit` is re-applied to the fresh copy.
    ///
    /// `edit` may run more than once and must only touch the manifest it is
    /// given.  An edit that leaves the manifest unchanged skips the write.
    pub async fn modify<T, F>(&self, base: &Path, mut edit: F) -> CacheResult<T>
    where
        F: FnMut(&mut Manifest) -> CacheResult<T>,
    {
        let _guard = self.write_lock.lock().await;

        for attempt in 1..=self.retry_attempts {
            let snapshot = self.snapshot(base).await?;
            let mut manifest = snapshot.manifest.clone();
            let value = edit(&mut manifest)?;
            if manifest == snapshot.manifest {
                return Ok(value);
            }

            let current = self.fingerprint_on_disk(base).await?;
            if current != snapshot.fingerprint {
                warn!(
                    attempt,
                    path = %manifest_path(base).display(),
                    "manifest changed during update, retrying against fresh copy"
                );
                continue;
            }

            self.save(base, &manifest).await?;
            debug!(attempt, path = %manifest_path(base).display(), "manifest saved");
            return Ok(value);
        }

        Err(CacheError::ManifestConflict {
            path: manifest_path(base),
            attempts: self.retry_attempts,
        })
    }

    async fn read_raw(&self, base: &Path) -> CacheResult<Option<Vec<u8>>> {
        let path = manifest_path(base);
        if !self.io.file_exists(&path).await {
            return Ok(None);
        }
        self.io
            .read_bytes(&path)
            .await
            .map(Some)
            .map_err(|err| CacheError::io(&path, err))
    }

    async fn fingerprint_on_disk(&self, base: &Path) -> CacheResult<String> {
        Ok(fingerprint(self.read_raw(base).await?.as_deref()))
    }

    async fn snapshot(&self, base: &Path) -> CacheResult<Snapshot> {
        let raw = self.read_raw(base).await?;
        let fingerprint = fingerprint(raw.as_deref());
        let manifest = match raw {
            None => Manifest::default(),
            // Invalid UTF-8 surfaces here as a serde error too.
            Some(raw) => match serde_json::from_slice::<Manifest>(&raw) {
                Ok(manifest) => manifest,
                Err(err) => {
                    self.quarantine(base, &raw, &err).await;
                    Manifest::default()
                }
            },
        };
        Ok(Snapshot {
            manifest,
            fingerprint,
        })
    }

    async fn quarantine(&self, base: &Path, raw: &[u8], err: &serde_json::Error) {
        let path = manifest_path(base);
        let corrupt_path = path.with_file_name(format!(
            "{}.corrupt",
            crate::paths::MANIFEST_FILE
        ));
        warn!(
            error = %err,
            path = %path.display(),
            sidecar = %corrupt_path.display(),
            "corrupt manifest, starting from an empty one (original preserved in .corrupt file)"
        );
        if let Err(write_err) = self.io.write_bytes(&corrupt_path, raw).await {
            warn!(error = %write_err, "failed to preserve corrupt manifest");
        }
    }
}

fn fingerprint(raw: Option<&[u8]>) -> String {
    match raw {
        None => "absent".to_string(),
        Some(raw) => {
            let digest = Sha256::digest(raw);
            digest.iter().map(|byte| format!("{byte:02x}")).collect()
        }
    }
}
