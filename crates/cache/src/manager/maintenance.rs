//! Archive and cleanup.  Both only edit the manifest; topic directories and
//! their files are never deleted.

use std::path::Path;

use chrono::{DateTime, TimeDelta, Utc};
use tracing::info;

use crate::error::{CacheError, CacheResult};
use crate::manifest::Manifest;
use crate::paths::resolve_cache_dir;
use crate::report::{ArchiveOutcome, CleanupCandidate, CleanupOutcome, CleanupReason};
use crate::request::{ArchiveRequest, CleanupRequest};

use super::{CacheManager, normalize_topic};

impl CacheManager {
    pub async fn archive(&self, req: ArchiveRequest) -> CacheResult<ArchiveOutcome> {
        let topic = normalize_topic(Some(req.topic))?
            .ok_or_else(|| CacheError::validation("topic must not be empty"))?;
        if !req.confirm_archive {
            return Ok(ArchiveOutcome::ConfirmationRequired { topic });
        }

        let base = self.base_for(req.cache_dir).await;
        let now = self.now();
        self.manifests
            .modify(&base, |manifest| match manifest.archive(&topic, now) {
                Some(_) => Ok(()),
                None => Err(CacheError::TopicNotFound(topic.clone())),
            })
            .await?;

        let was_active = {
            let mut state = self.state.lock().await;
            state.per_topic_auto_update.remove(&topic);
            let was_active = state.active_topic.as_deref() == Some(topic.as_str());
            if was_active {
                state.active_topic = None;
                state.global_auto_update_enabled = false;
            }
            was_active
        };

        info!(topic = %topic, was_active, "topic archived");
        Ok(ArchiveOutcome::Archived {
            dir: resolve_cache_dir(&base, Some(&topic)),
            topic,
            archived_at: now,
            was_active,
        })
    }

    /// Drop stale or surplus topics from the manifest.  Without confirmation
    /// only the candidates are reported.
    pub async fn cleanup(&self, req: CleanupRequest) -> CacheResult<CleanupOutcome> {
        let after_days = req
            .cleanup_after_days
            .unwrap_or(self.config.default_cleanup_after_days);
        let max_sessions = req
            .max_sessions
            .unwrap_or(self.config.default_max_sessions);
        let base = self.base_for(req.cache_dir).await;
        let protected = {
            let state = self.state.lock().await;
            if state.base_cache_dir == base {
                state.active_topic.clone()
            } else {
                None
            }
        };
        let now = self.now();

        if !req.confirm_cleanup {
            let manifest = self.manifests.load(&base).await?;
            let candidates = select_for_cleanup(
                &manifest,
                &base,
                now,
                after_days,
                max_sessions,
                protected.as_deref(),
            );
            return Ok(CleanupOutcome::ConfirmationRequired { candidates });
        }

        let (removed, retained) = self
            .manifests
            .modify(&base, |manifest| {
                let candidates = select_for_cleanup(
                    manifest,
                    &base,
                    now,
                    after_days,
                    max_sessions,
                    protected.as_deref(),
                );
                for candidate in &candidates {
                    manifest.active_sessions.remove(&candidate.topic);
                }
                Ok((candidates, manifest.active_sessions.len()))
            })
            .await?;

        {
            let mut state = self.state.lock().await;
            for candidate in &removed {
                state.per_topic_auto_update.remove(&candidate.topic);
            }
        }

        info!(
            base = %base.display(),
            removed = removed.len(),
            retained,
            "cache cleanup finished"
        );
        Ok(CleanupOutcome::Cleaned { removed, retained })
    }
}

/// Active topics that cleanup would remove: those last used before the
/// `after_days` cutoff, plus any ranked at or beyond `max_sessions` by
/// recency.  `protected` is never selected.
pub fn select_for_cleanup(
    manifest: &Manifest,
    base: &Path,
    now: DateTime<Utc>,
    after_days: u64,
    max_sessions: usize,
    protected: Option<&str>,
) -> Vec<CleanupCandidate> {
    let cutoff = i64::try_from(after_days)
        .ok()
        .and_then(TimeDelta::try_days)
        .and_then(|age| now.checked_sub_signed(age))
        .unwrap_or(DateTime::<Utc>::MIN_UTC);

    manifest
        .active_by_recency()
        .into_iter()
        .enumerate()
        .filter(|(_, (name, _))| Some(*name) != protected)
        .filter_map(|(index, (name, entry))| {
            let reason = if entry.last_used < cutoff {
                CleanupReason::Stale {
                    idle_days: (now - entry.last_used).num_days(),
                }
            } else if index >= max_sessions {
                CleanupReason::OverLimit { rank: index + 1 }
            } else {
                return None;
            };
            Some(CleanupCandidate {
                topic: name.to_string(),
                dir: resolve_cache_dir(base, Some(name)),
                last_used: entry.last_used,
                reason,
            })
        })
        .collect()
}
