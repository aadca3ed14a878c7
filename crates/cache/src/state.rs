use std::collections::HashMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};

/// Mutable record of one session's cache configuration.
#[derive(Debug, Clone)]
pub struct CacheState {
    pub is_initialized: bool,
    pub base_cache_dir: PathBuf,
    /// `None` means legacy (topic-less) mode.
    pub active_topic: Option<String>,
    /// Only consulted while no topic is active.
    pub global_auto_update_enabled: bool,
    pub per_topic_auto_update: HashMap<String, bool>,
    pub tool_call_count: u64,
    pub update_interval: u64,
    pub last_update: Option<DateTime<Utc>>,
    pub has_create_permission: bool,
    pub permission_granted_at: Option<DateTime<Utc>>,
}

/// An automatic progress note that is due.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AutoUpdateJob {
    pub topic: Option<String>,
    pub summary: String,
    pub tool_call_count: u64,
}

impl CacheState {
    pub fn new(base_cache_dir: PathBuf, update_interval: u64) -> Self {
        Self {
            is_initialized: false,
            base_cache_dir,
            active_topic: None,
            global_auto_update_enabled: false,
            per_topic_auto_update: HashMap::new(),
            tool_call_count: 0,
            update_interval: update_interval.max(1),
            last_update: None,
            has_create_permission: false,
            permission_granted_at: None,
        }
    }

    pub fn topic_auto_update(&self, topic: &str) -> bool {
        self.per_topic_auto_update
            .get(topic)
            .copied()
            .unwrap_or(false)
    }

    /// Per-topic flag of the active topic, or the global flag in legacy mode.
    pub fn effective_auto_update(&self) -> bool {
        match &self.active_topic {
            Some(topic) => self.topic_auto_update(topic),
            None => self.global_auto_update_enabled,
        }
    }

    /// Count one tool call and return the job to run if an automatic update
    /// is due on this call.
    pub fn register_tool_call(&mut self, now: DateTime<Utc>) -> Option<AutoUpdateJob> {
        self.tool_call_count = self.tool_call_count.saturating_add(1);
        let due = self.effective_auto_update()
            && self.is_initialized
            && self.tool_call_count % self.update_interval == 0;
        if !due {
            return None;
        }
        Some(AutoUpdateJob {
            topic: self.active_topic.clone(),
            summary: format!(
                "Auto-update triggered after {} tool calls at {}",
                self.tool_call_count,
                now.to_rfc3339()
            ),
            tool_call_count: self.tool_call_count,
        })
    }

    pub fn grant_create_permission(&mut self, at: DateTime<Utc>) {
        self.has_create_permission = true;
        self.permission_granted_at = Some(at);
    }
}
