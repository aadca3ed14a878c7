use tracing::info;

use crate::error::{CacheError, CacheResult};
use crate::paths::resolve_cache_dir;
use crate::report::{
    AutoUpdateReport, SessionStatus, StatusReport, TopicFlag, TopicListing, TopicListingRow,
    TopicStatus,
};
use crate::request::{AutoUpdateRequest, ListTopicsRequest, StatusRequest};

use super::{CacheManager, normalize_topic};

impl CacheManager {
    /// Turn automatic progress notes on or off for a topic, or globally when
    /// no topic is given or active.
    pub async fn configure_auto_update(
        &self,
        req: AutoUpdateRequest,
    ) -> CacheResult<AutoUpdateReport> {
        if req.update_interval == Some(0) {
            return Err(CacheError::validation("updateInterval must be greater than 0"));
        }
        let explicit = normalize_topic(req.topic)?;

        let (base, target) = {
            let state = self.state.lock().await;
            (
                state.base_cache_dir.clone(),
                explicit.or_else(|| state.active_topic.clone()),
            )
        };
        if let Some(topic) = &target {
            if self.manifests.load(&base).await?.is_archived(topic) {
                return Err(CacheError::TopicArchived(topic.clone()));
            }
        }

        let mut state = self.state.lock().await;
        let mirrored_to_global = match &target {
            Some(topic) => {
                state
                    .per_topic_auto_update
                    .insert(topic.clone(), req.enable);
                let is_active = state.active_topic.as_deref() == Some(topic.as_str());
                if is_active {
                    state.global_auto_update_enabled = req.enable;
                }
                is_active
            }
            None => {
                state.global_auto_update_enabled = req.enable;
                false
            }
        };
        if let Some(interval) = req.update_interval {
            state.update_interval = interval;
        }

        info!(
            topic = target.as_deref().unwrap_or("(global)"),
            enabled = req.enable,
            interval = state.update_interval,
            "auto-update configured"
        );
        Ok(AutoUpdateReport {
            topic: target,
            enabled: req.enable,
            update_interval: state.update_interval,
            mirrored_to_global,
        })
    }

    /// Read-only view of one topic, or of the whole session.
    pub async fn status(&self, req: StatusRequest) -> CacheResult<StatusReport> {
        let topic = normalize_topic(req.topic)?;
        let state = self.state().await;
        let manifest = self.manifests.load(&state.base_cache_dir).await?;

        if let Some(topic) = topic {
            let record = manifest.locate(&topic);
            let dir = resolve_cache_dir(&state.base_cache_dir, Some(&topic));
            return Ok(StatusReport::Topic(TopicStatus {
                entry: record.map(|record| record.entry().clone()),
                archived: record.is_some_and(|record| record.is_archived()),
                dir_exists: self.io.dir_exists(&dir).await,
                dir,
                auto_update: state.topic_auto_update(&topic),
                is_active: state.active_topic.as_deref() == Some(topic.as_str()),
                topic,
            }));
        }

        let topics = manifest
            .active_sessions
            .keys()
            .map(|name| (name, false))
            .chain(manifest.archived_sessions.keys().map(|name| (name, true)))
            .map(|(name, archived)| TopicFlag {
                topic: name.clone(),
                archived,
                auto_update: state.topic_auto_update(name),
            })
            .collect();
        Ok(StatusReport::Session(SessionStatus {
            is_initialized: state.is_initialized,
            base_cache_dir: state.base_cache_dir.clone(),
            active_topic: state.active_topic.clone(),
            global_auto_update: state.global_auto_update_enabled,
            effective_auto_update: state.effective_auto_update(),
            tool_call_count: state.tool_call_count,
            update_interval: state.update_interval,
            last_update: state.last_update,
            has_create_permission: state.has_create_permission,
            permission_granted_at: state.permission_granted_at,
            topics,
        }))
    }

    /// Active topics under a base directory, most recently used first.
    pub async fn list_topics(&self, req: ListTopicsRequest) -> CacheResult<TopicListing> {
        let base = self.base_for(req.cache_dir).await;
        let manifest = self.manifests.load(&base).await?;
        let state = self.state().await;

        let mut active = Vec::with_capacity(manifest.active_sessions.len());
        for (name, entry) in manifest.active_by_recency() {
            let dir = resolve_cache_dir(&base, Some(name));
            active.push(TopicListingRow {
                topic: name.to_string(),
                entry: entry.clone(),
                dir_exists: self.io.dir_exists(&dir).await,
                auto_update: state.topic_auto_update(name),
                is_current: state.active_topic.as_deref() == Some(name),
            });
        }

        Ok(TopicListing {
            legacy_present: self.legacy_present(&base).await,
            archived_count: manifest.archived_sessions.len(),
            base,
            active,
        })
    }
}
