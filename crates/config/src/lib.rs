use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Environment variable that overrides `cache.base_dir`.
pub const CACHE_DIR_ENV: &str = "MNEMO_CACHE_DIR";

// ── Cache config ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Base cache directory.  Topic caches live in sub-directories of this
    /// path; legacy (topic-less) caches write directly into it.
    pub base_dir: String,
    /// Number of tool calls between automatic progress notes.  Shared by
    /// every topic; enablement is per topic.
    pub update_interval: u64,
    /// Age in days after which `cache_cleanup` considers a topic stale when
    /// the caller does not pass `cleanupAfterDays`.
    pub default_cleanup_after_days: u64,
    /// Number of most-recently-used topics `cache_cleanup` keeps when the
    /// caller does not pass `maxSessions`.
    pub default_max_sessions: usize,
    /// Suggested cleanup age recorded on session-only topics.  Informational
    /// only: nothing deletes a topic automatically.
    pub session_only_cleanup_days: u32,
    /// Maximum number of lines returned per artifact by `cache_load`.
    pub load_max_lines: usize,
    /// How many times a manifest modification is retried when the file
    /// changed underneath it before giving up with a conflict.
    pub manifest_retry_attempts: u32,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            base_dir: ".mnemo/cache".to_string(),
            update_interval: 10,
            default_cleanup_after_days: 30,
            default_max_sessions: 10,
            session_only_cleanup_days: 7,
            load_max_lines: 2000,
            manifest_retry_attempts: 3,
        }
    }
}

impl CacheConfig {
    pub fn base_path(&self) -> PathBuf {
        PathBuf::from(&self.base_dir)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    pub log_level: String,
    /// When set, `mnemo serve` writes logs to this file instead of stderr.
    pub log_file: Option<String>,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_file: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub cache: CacheConfig,
    pub telemetry: TelemetryConfig,
}

impl AppConfig {
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = Self::default();
        if let Ok(raw) = fs::read_to_string(path) {
            config = toml::from_str(&raw)
                .with_context(|| format!("invalid config file {}", path.display()))?;
        }

        if let Ok(value) = env::var(CACHE_DIR_ENV) {
            if !value.trim().is_empty() {
                config.cache.base_dir = value;
            }
        }

        config.normalize();
        Ok(config)
    }

    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<()> {
        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent)?;
        }

        fs::write(path, self.to_toml()?)?;
        Ok(())
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("failed to render config")
    }

    /// Clamp values the cache manager cannot work with.  A zero interval
    /// would make the auto-update modulus undefined.
    fn normalize(&mut self) {
        if self.cache.update_interval == 0 {
            self.cache.update_interval = CacheConfig::default().update_interval;
        }
        if self.cache.manifest_retry_attempts == 0 {
            self.cache.manifest_retry_attempts = 1;
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────
