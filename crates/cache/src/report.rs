//! Operation results.  `Display` renders the text relayed back to the agent.

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};

use crate::manifest::ManifestEntry;
use crate::paths::CacheArtifact;
use crate::permission::BlockReason;

fn stamp(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M UTC").to_string()
}

fn topic_label(topic: Option<&str>) -> &str {
    topic.unwrap_or("(legacy)")
}

fn on_off(flag: bool) -> &'static str {
    if flag { "on" } else { "off" }
}

// ── init ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub enum InitOutcome {
    Blocked { dir: PathBuf, reason: BlockReason },
    Initialized(InitReport),
}

#[derive(Debug, Clone)]
pub struct InitReport {
    pub dir: PathBuf,
    pub topic: Option<String>,
    pub project_name: String,
    pub created_dir: bool,
    pub files: Vec<CacheArtifact>,
    /// The topic was archived and has been moved back to the active set.
    pub unarchived: bool,
    /// Suggested cleanup age of a session-only topic.
    pub auto_cleanup_after_days: Option<u32>,
}

impl fmt::Display for InitOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Blocked { dir, reason } => {
                writeln!(f, "Cache directory {} does not exist yet.", dir.display())?;
                write!(f, "{reason}")
            }
            Self::Initialized(report) => {
                writeln!(
                    f,
                    "Cache initialized for '{}' (topic: {}).",
                    report.project_name,
                    topic_label(report.topic.as_deref())
                )?;
                writeln!(f, "- directory: {}", report.dir.display())?;
                if report.created_dir {
                    writeln!(f, "- directory created")?;
                }
                if report.unarchived {
                    writeln!(f, "- topic was archived and is active again")?;
                }
                if let Some(days) = report.auto_cleanup_after_days {
                    writeln!(f, "- session-only cache (suggested cleanup after {days} days)")?;
                }
                for artifact in &report.files {
                    writeln!(f, "- wrote {}", artifact.file_name())?;
                }
                Ok(())
            }
        }
    }
}

// ── update ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct UpdateReport {
    pub dir: PathBuf,
    pub topic: Option<String>,
    pub appended: Vec<CacheArtifact>,
    pub at: DateTime<Utc>,
}

impl fmt::Display for UpdateReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Cache updated at {} (topic: {}).",
            stamp(self.at),
            topic_label(self.topic.as_deref())
        )?;
        for artifact in &self.appended {
            writeln!(f, "- appended to {}", artifact.file_name())?;
        }
        Ok(())
    }
}

// ── load ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct TopicSummary {
    pub name: String,
    pub project_name: String,
    pub last_used: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct DiscoveryReport {
    pub base: PathBuf,
    pub active: Vec<TopicSummary>,
    pub archived: Vec<String>,
    pub legacy_present: bool,
}

#[derive(Debug, Clone)]
pub struct ArtifactRead {
    pub artifact: CacheArtifact,
    /// File content, or the read error rendered as text.
    pub content: Result<String, String>,
}

#[derive(Debug, Clone)]
pub struct LoadReport {
    pub dir: PathBuf,
    pub topic: Option<String>,
    pub archived: bool,
    pub artifacts: Vec<ArtifactRead>,
}

impl LoadReport {
    pub fn content_of(&self, artifact: CacheArtifact) -> Option<&str> {
        self.artifacts
            .iter()
            .find(|read| read.artifact == artifact)
            .and_then(|read| read.content.as_deref().ok())
    }

    pub fn failed(&self) -> impl Iterator<Item = &ArtifactRead> {
        self.artifacts.iter().filter(|read| read.content.is_err())
    }
}

#[derive(Debug, Clone)]
pub enum LoadOutcome {
    Discovery(DiscoveryReport),
    Loaded(LoadReport),
}

impl fmt::Display for LoadOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Discovery(report) => {
                writeln!(f, "No topic given, so nothing was loaded.")?;
                if report.active.is_empty() && report.archived.is_empty() && !report.legacy_present {
                    writeln!(f, "No caches exist under {}.", report.base.display())?;
                    writeln!(
                        f,
                        "Run cache_init with a topic, confirmCreate: true and understoodGrowth: true to start one."
                    )?;
                    return Ok(());
                }
                if !report.active.is_empty() {
                    writeln!(f, "Available topics (most recent first):")?;
                    for topic in &report.active {
                        writeln!(
                            f,
                            "- {} ({}), last used {}",
                            topic.name,
                            topic.project_name,
                            stamp(topic.last_used)
                        )?;
                    }
                }
                if !report.archived.is_empty() {
                    writeln!(f, "Archived topics: {}", report.archived.join(", "))?;
                }
                if report.legacy_present {
                    writeln!(f, "A legacy cache exists; pass useLegacy: true to load it.")?;
                }
                writeln!(f, "Call cache_load again with the topic you want.")
            }
            Self::Loaded(report) => fmt::Display::fmt(report, f),
        }
    }
}

impl fmt::Display for LoadReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Loaded cache for topic {} from {}.",
            topic_label(self.topic.as_deref()),
            self.dir.display()
        )?;
        if self.archived {
            writeln!(
                f,
                "Note: this topic is archived. Run cache_init to reactivate it."
            )?;
        }
        for read in &self.artifacts {
            writeln!(f, "\n=== {} ===", read.artifact.label())?;
            match &read.content {
                Ok(content) => writeln!(f, "{content}")?,
                Err(err) => writeln!(f, "(could not read {}: {err})", read.artifact.file_name())?,
            }
        }
        Ok(())
    }
}

// ── configure auto-update ────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct AutoUpdateReport {
    /// `None` when the global (legacy) flag was set.
    pub topic: Option<String>,
    pub enabled: bool,
    pub update_interval: u64,
    pub mirrored_to_global: bool,
}

impl fmt::Display for AutoUpdateReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.topic {
            Some(topic) => writeln!(f, "Auto-update {} for topic '{topic}'.", on_off(self.enabled))?,
            None => writeln!(f, "Global auto-update {}.", on_off(self.enabled))?,
        }
        writeln!(f, "- interval: every {} tool calls (shared by all topics)", self.update_interval)?;
        if self.mirrored_to_global {
            writeln!(f, "- applies to the active session")?;
        }
        Ok(())
    }
}

// ── status ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct TopicStatus {
    pub topic: String,
    pub entry: Option<ManifestEntry>,
    pub archived: bool,
    pub dir: PathBuf,
    pub dir_exists: bool,
    pub auto_update: bool,
    pub is_active: bool,
}

#[derive(Debug, Clone)]
pub struct TopicFlag {
    pub topic: String,
    pub archived: bool,
    pub auto_update: bool,
}

#[derive(Debug, Clone)]
pub struct SessionStatus {
    pub is_initialized: bool,
    pub base_cache_dir: PathBuf,
    pub active_topic: Option<String>,
    pub global_auto_update: bool,
    pub effective_auto_update: bool,
    pub tool_call_count: u64,
    pub update_interval: u64,
    pub last_update: Option<DateTime<Utc>>,
    pub has_create_permission: bool,
    pub permission_granted_at: Option<DateTime<Utc>>,
    pub topics: Vec<TopicFlag>,
}

#[derive(Debug, Clone)]
pub enum StatusReport {
    Topic(TopicStatus),
    Session(SessionStatus),
}

impl fmt::Display for StatusReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Topic(status) => {
                writeln!(f, "── topic '{}' ──", status.topic)?;
                match &status.entry {
                    Some(entry) => {
                        let state = if status.archived { "archived" } else { "active" };
                        writeln!(f, "  state           : {state}")?;
                        writeln!(f, "  project         : {}", entry.project_name)?;
                        writeln!(f, "  created         : {}", stamp(entry.created_at))?;
                        writeln!(f, "  last used       : {}", stamp(entry.last_used))?;
                        writeln!(f, "  session only    : {}", entry.session_only)?;
                        if let Some(at) = entry.archived_at {
                            writeln!(f, "  archived at     : {}", stamp(at))?;
                        }
                    }
                    None => writeln!(f, "  state           : not in manifest")?,
                }
                writeln!(f, "  directory       : {}", status.dir.display())?;
                writeln!(f, "  directory exists: {}", status.dir_exists)?;
                writeln!(f, "  auto-update     : {}", on_off(status.auto_update))?;
                writeln!(f, "  current session : {}", status.is_active)
            }
            Self::Session(status) => {
                writeln!(f, "── cache session ──")?;
                writeln!(f, "  initialized     : {}", status.is_initialized)?;
                writeln!(f, "  base directory  : {}", status.base_cache_dir.display())?;
                writeln!(f, "  active topic    : {}", topic_label(status.active_topic.as_deref()))?;
                writeln!(f, "  global auto     : {}", on_off(status.global_auto_update))?;
                writeln!(f, "  effective auto  : {}", on_off(status.effective_auto_update))?;
                writeln!(
                    f,
                    "  tool calls      : {} (update every {})",
                    status.tool_call_count, status.update_interval
                )?;
                writeln!(
                    f,
                    "  last update     : {}",
                    status.last_update.map(stamp).unwrap_or_else(|| "(never)".to_string())
                )?;
                writeln!(
                    f,
                    "  create granted  : {}",
                    status
                        .permission_granted_at
                        .filter(|_| status.has_create_permission)
                        .map(stamp)
                        .unwrap_or_else(|| "no".to_string())
                )?;
                if status.topics.is_empty() {
                    return writeln!(f, "  topics          : (none)");
                }
                writeln!(f, "  topics:")?;
                for topic in &status.topics {
                    let archived = if topic.archived { " [archived]" } else { "" };
                    writeln!(
                        f,
                        "    {}{archived} — auto-update {}",
                        topic.topic,
                        on_off(topic.auto_update)
                    )?;
                }
                Ok(())
            }
        }
    }
}

// ── list topics ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct TopicListingRow {
    pub topic: String,
    pub entry: ManifestEntry,
    pub dir_exists: bool,
    pub auto_update: bool,
    pub is_current: bool,
}

#[derive(Debug, Clone)]
pub struct TopicListing {
    pub base: PathBuf,
    pub active: Vec<TopicListingRow>,
    pub archived_count: usize,
    pub legacy_present: bool,
}

impl fmt::Display for TopicListing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Topics under {}:", self.base.display())?;
        if self.active.is_empty() {
            writeln!(f, "  (no active topics)")?;
        }
        for row in &self.active {
            let current = if row.is_current { " *current*" } else { "" };
            let missing = if row.dir_exists { "" } else { " [directory missing]" };
            writeln!(
                f,
                "- {}{current}{missing}: {} — last used {}, auto-update {}",
                row.topic,
                row.entry.project_name,
                stamp(row.entry.last_used),
                on_off(row.auto_update)
            )?;
        }
        if self.archived_count > 0 {
            writeln!(f, "Archived topics: {}", self.archived_count)?;
        }
        if self.legacy_present {
            writeln!(f, "Legacy cache present (load with useLegacy: true).")?;
        }
        Ok(())
    }
}

// ── archive ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub enum ArchiveOutcome {
    ConfirmationRequired { topic: String },
    Archived {
        topic: String,
        dir: PathBuf,
        archived_at: DateTime<Utc>,
        was_active: bool,
    },
}

impl fmt::Display for ArchiveOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfirmationRequired { topic } => {
                writeln!(f, "Archiving '{topic}' requires confirmation.")?;
                writeln!(
                    f,
                    "Archived topics stay readable with cache_load but stop auto-updating."
                )?;
                writeln!(f, "Call cache_archive again with confirmArchive: true to proceed.")
            }
            Self::Archived {
                topic,
                dir,
                archived_at,
                was_active,
            } => {
                writeln!(f, "Topic '{topic}' archived at {}.", stamp(*archived_at))?;
                writeln!(f, "- files kept at {}", dir.display())?;
                if *was_active {
                    writeln!(f, "- it was the active topic; the session is back in legacy mode")?;
                }
                Ok(())
            }
        }
    }
}

// ── cleanup ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CleanupReason {
    Stale { idle_days: i64 },
    OverLimit { rank: usize },
}

impl fmt::Display for CleanupReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stale { idle_days } => write!(f, "unused for {idle_days} days"),
            Self::OverLimit { rank } => write!(f, "ranked #{rank} by recency"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CleanupCandidate {
    pub topic: String,
    pub dir: PathBuf,
    pub last_used: DateTime<Utc>,
    pub reason: CleanupReason,
}

#[derive(Debug, Clone)]
pub enum CleanupOutcome {
    ConfirmationRequired { candidates: Vec<CleanupCandidate> },
    Cleaned {
        removed: Vec<CleanupCandidate>,
        retained: usize,
    },
}

impl fmt::Display for CleanupOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfirmationRequired { candidates } => {
                writeln!(f, "Cleanup requires confirmation.")?;
                if candidates.is_empty() {
                    writeln!(f, "No topics currently qualify for cleanup.")?;
                } else {
                    writeln!(f, "Topics that would be removed from the manifest:")?;
                    for candidate in candidates {
                        writeln!(f, "- {} ({})", candidate.topic, candidate.reason)?;
                    }
                }
                writeln!(
                    f,
                    "No files are ever deleted. Call cache_cleanup with confirmCleanup: true to proceed."
                )
            }
            Self::Cleaned { removed, retained } => {
                if removed.is_empty() {
                    writeln!(f, "Nothing to clean up; {retained} topics retained.")?;
                    return Ok(());
                }
                writeln!(
                    f,
                    "Removed {} topics from the manifest; {retained} retained.",
                    removed.len()
                )?;
                for candidate in removed {
                    writeln!(f, "- {} ({})", candidate.topic, candidate.reason)?;
                }
                writeln!(f, "Their directories were NOT deleted. Remove them manually if no longer needed:")?;
                for candidate in removed {
                    writeln!(f, "  {}", candidate.dir.display())?;
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn discovery(active: Vec<TopicSummary>, archived: &[&str]) -> LoadOutcome {
        LoadOutcome::Discovery(DiscoveryReport {
            base: PathBuf::from("/tmp/caches"),
            active,
            archived: archived.iter().map(|name| name.to_string()).collect(),
            legacy_present: false,
        })
    }

    #[test]
    fn discovery_lists_archived_topics_without_active_ones() {
        let text = discovery(Vec::new(), &["old-api", "spike"]).to_string();
        assert!(text.contains("Archived topics: old-api, spike"), "{text}");
        assert!(!text.contains("No caches exist"), "{text}");
    }

    #[test]
    fn discovery_of_empty_base_suggests_init() {
        let text = discovery(Vec::new(), &[]).to_string();
        assert!(text.contains("No caches exist under /tmp/caches"));
        assert!(text.contains("cache_init"));
    }

    #[test]
    fn loaded_outcome_renders_like_its_report() {
        let report = LoadReport {
            dir: PathBuf::from("/tmp/caches/demo"),
            topic: Some("demo".to_string()),
            archived: true,
            artifacts: vec![
                ArtifactRead {
                    artifact: CacheArtifact::ProjectState,
                    content: Ok("state body".to_string()),
                },
                ArtifactRead {
                    artifact: CacheArtifact::Decisions,
                    content: Err("permission denied".to_string()),
                },
            ],
        };
        let text = report.to_string();
        assert!(text.starts_with("Loaded cache for topic demo"));
        assert!(text.contains("state body"));
        assert!(text.contains("(could not read decisions_made.md: permission denied)"));
        assert!(text.contains("archived"));
        assert_eq!(LoadOutcome::Loaded(report).to_string(), text);
    }
}
