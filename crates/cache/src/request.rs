//! Operation inputs.  Field names deserialize from the camelCase argument
//! names agents send (`confirmCreate`, `conversationSummary`, ...).

use std::path::PathBuf;

use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct InitRequest {
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,
    #[serde(default)]
    pub project_name: Option<String>,
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default)]
    pub confirm_create: bool,
    #[serde(default)]
    pub understood_growth: bool,
    #[serde(default)]
    pub session_only: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpdateRequest {
    #[serde(default)]
    pub topic: Option<String>,
    pub conversation_summary: String,
    #[serde(default)]
    pub project_update: Option<String>,
    #[serde(default)]
    pub decisions_update: Option<String>,
    #[serde(default)]
    pub next_steps_update: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct LoadRequest {
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default)]
    pub use_legacy: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AutoUpdateRequest {
    pub enable: bool,
    #[serde(default)]
    pub update_interval: Option<u64>,
    #[serde(default)]
    pub topic: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct StatusRequest {
    #[serde(default)]
    pub topic: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ListTopicsRequest {
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ArchiveRequest {
    pub topic: String,
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,
    pub confirm_archive: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CleanupRequest {
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,
    /// Defaults to `cache.default_cleanup_after_days` (30).
    #[serde(default)]
    pub cleanup_after_days: Option<u64>,
    /// Defaults to `cache.default_max_sessions` (10).
    #[serde(default)]
    pub max_sessions: Option<usize>,
    pub confirm_cleanup: bool,
}
