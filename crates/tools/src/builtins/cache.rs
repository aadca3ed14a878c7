//! Context-cache tools: the eight operations an agent uses to persist and
//! restore working memory.

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;

use mnemo_cache::{
    ArchiveRequest, AutoUpdateRequest, CacheManager, CleanupRequest, InitRequest,
    ListTopicsRequest, LoadRequest, StatusRequest, UpdateRequest,
};

use crate::{ParamType, SecurityLevel, Tool, ToolMetadata, ToolOutput, ToolParam, ToolRegistry, ToolSpec};

const GROUP: &str = "cache";

/// Deserialize the agent's arguments into a typed request.  `null` is
/// treated as an empty object.
fn parse_args<T: DeserializeOwned>(tool: &str, args: &serde_json::Value) -> Result<T> {
    let args = if args.is_null() {
        serde_json::Value::Object(serde_json::Map::new())
    } else {
        args.clone()
    };
    serde_json::from_value(args).with_context(|| format!("invalid arguments for {tool}"))
}

fn metadata(security_level: SecurityLevel, read_only: bool) -> ToolMetadata {
    ToolMetadata {
        security_level,
        read_only,
        group: GROUP.to_string(),
    }
}

fn cache_dir_param() -> ToolParam {
    ToolParam::optional(
        "cacheDir",
        "Base cache directory (default: the session's base directory)",
    )
}

fn topic_param(description: &str) -> ToolParam {
    ToolParam::optional("topic", description)
}

fn flag(name: &str, description: &str, required: bool) -> ToolParam {
    ToolParam {
        name: name.to_string(),
        description: description.to_string(),
        required,
        param_type: ParamType::Boolean,
        default: (!required).then(|| "false".to_string()),
    }
}

/// Register all eight cache tools against one session's manager.
pub fn register_cache_tools(registry: &mut ToolRegistry, manager: Arc<CacheManager>) {
    registry.register(Box::new(CacheInitTool { manager: manager.clone() }));
    registry.register(Box::new(CacheUpdateTool { manager: manager.clone() }));
    registry.register(Box::new(CacheLoadTool { manager: manager.clone() }));
    registry.register(Box::new(CacheAutoUpdateTool { manager: manager.clone() }));
    registry.register(Box::new(CacheStatusTool { manager: manager.clone() }));
    registry.register(Box::new(CacheListTopicsTool { manager: manager.clone() }));
    registry.register(Box::new(CacheArchiveTool { manager: manager.clone() }));
    registry.register(Box::new(CacheCleanupTool { manager }));
}

// ── cache_init ───────────────────────────────────────────────────────────────

pub struct CacheInitTool {
    pub manager: Arc<CacheManager>,
}

#[async_trait]
impl Tool for CacheInitTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "cache_init".to_string(),
            description: "Create a context cache for a topic (or the legacy cache) and make it \
                          active. Creating a new directory requires confirmCreate and \
                          understoodGrowth."
                .to_string(),
            params: vec![
                cache_dir_param(),
                ToolParam::optional("projectName", "Human-readable project name"),
                topic_param("Topic name; omit for the legacy cache"),
                flag("confirmCreate", "Consent to creating the cache directory", false),
                flag("understoodGrowth", "Acknowledge that cache files grow over time", false),
                flag("sessionOnly", "Mark the topic as short-lived", false),
            ],
            metadata: metadata(SecurityLevel::Medium, false),
        }
    }

    async fn run(&self, args: &serde_json::Value) -> Result<ToolOutput> {
        let req: InitRequest = parse_args("cache_init", args)?;
        Ok(ToolOutput::ok(self.manager.init(req).await?.to_string()))
    }
}

// ── cache_update ─────────────────────────────────────────────────────────────

pub struct CacheUpdateTool {
    pub manager: Arc<CacheManager>,
}

#[async_trait]
impl Tool for CacheUpdateTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "cache_update".to_string(),
            description: "Append a timestamped progress note to the active (or given) cache."
                .to_string(),
            params: vec![
                topic_param("Topic to update (default: the active topic)"),
                ToolParam::required("conversationSummary", "What happened since the last update"),
                ToolParam::optional("projectUpdate", "Change to the project state"),
                ToolParam::optional("decisionsUpdate", "Decisions made, with rationale"),
                ToolParam::optional("nextStepsUpdate", "Revised next steps"),
            ],
            metadata: metadata(SecurityLevel::Low, false),
        }
    }

    async fn run(&self, args: &serde_json::Value) -> Result<ToolOutput> {
        let req: UpdateRequest = parse_args("cache_update", args)?;
        Ok(ToolOutput::ok(self.manager.update(req).await?.to_string()))
    }
}

// ── cache_load ───────────────────────────────────────────────────────────────

pub struct CacheLoadTool {
    pub manager: Arc<CacheManager>,
}

#[async_trait]
impl Tool for CacheLoadTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "cache_load".to_string(),
            description: "Load a topic's cached context into the session. Without a topic, \
                          lists the topics that can be loaded."
                .to_string(),
            params: vec![
                cache_dir_param(),
                topic_param("Topic to load"),
                flag("useLegacy", "Load the legacy (topic-less) cache", false),
            ],
            metadata: metadata(SecurityLevel::Low, false),
        }
    }

    async fn run(&self, args: &serde_json::Value) -> Result<ToolOutput> {
        let req: LoadRequest = parse_args("cache_load", args)?;
        Ok(ToolOutput::ok(self.manager.load(req).await?.to_string()))
    }
}

// ── cache_auto_update ────────────────────────────────────────────────────────

pub struct CacheAutoUpdateTool {
    pub manager: Arc<CacheManager>,
}

#[async_trait]
impl Tool for CacheAutoUpdateTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "cache_auto_update".to_string(),
            description: "Enable or disable automatic progress notes every N tool calls."
                .to_string(),
            params: vec![
                flag("enable", "Turn automatic updates on or off", true),
                ToolParam::optional("updateInterval", "Tool calls between automatic updates")
                    .of_type(ParamType::Integer)
                    .with_default("10"),
                topic_param("Topic to configure (default: the active topic)"),
            ],
            metadata: metadata(SecurityLevel::Low, false),
        }
    }

    async fn run(&self, args: &serde_json::Value) -> Result<ToolOutput> {
        let req: AutoUpdateRequest = parse_args("cache_auto_update", args)?;
        Ok(ToolOutput::ok(
            self.manager.configure_auto_update(req).await?.to_string(),
        ))
    }
}

// ── cache_status ─────────────────────────────────────────────────────────────

pub struct CacheStatusTool {
    pub manager: Arc<CacheManager>,
}

#[async_trait]
impl Tool for CacheStatusTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "cache_status".to_string(),
            description: "Show the session's cache state, or one topic's record.".to_string(),
            params: vec![topic_param("Topic to describe")],
            metadata: metadata(SecurityLevel::Low, true),
        }
    }

    async fn run(&self, args: &serde_json::Value) -> Result<ToolOutput> {
        let req: StatusRequest = parse_args("cache_status", args)?;
        Ok(ToolOutput::ok(self.manager.status(req).await?.to_string()))
    }
}

// ── cache_list_topics ────────────────────────────────────────────────────────

pub struct CacheListTopicsTool {
    pub manager: Arc<CacheManager>,
}

#[async_trait]
impl Tool for CacheListTopicsTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "cache_list_topics".to_string(),
            description: "List active topics, most recently used first.".to_string(),
            params: vec![cache_dir_param()],
            metadata: metadata(SecurityLevel::Low, true),
        }
    }

    async fn run(&self, args: &serde_json::Value) -> Result<ToolOutput> {
        let req: ListTopicsRequest = parse_args("cache_list_topics", args)?;
        Ok(ToolOutput::ok(self.manager.list_topics(req).await?.to_string()))
    }
}

// ── cache_archive ────────────────────────────────────────────────────────────

pub struct CacheArchiveTool {
    pub manager: Arc<CacheManager>,
}

#[async_trait]
impl Tool for CacheArchiveTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "cache_archive".to_string(),
            description: "Archive a topic. Its files stay on disk and remain loadable."
                .to_string(),
            params: vec![
                ToolParam::required("topic", "Topic to archive"),
                cache_dir_param(),
                flag("confirmArchive", "Confirm the archive", true),
            ],
            metadata: metadata(SecurityLevel::Medium, false),
        }
    }

    async fn run(&self, args: &serde_json::Value) -> Result<ToolOutput> {
        let req: ArchiveRequest = parse_args("cache_archive", args)?;
        Ok(ToolOutput::ok(self.manager.archive(req).await?.to_string()))
    }
}

// ── cache_cleanup ────────────────────────────────────────────────────────────

pub struct CacheCleanupTool {
    pub manager: Arc<CacheManager>,
}

#[async_trait]
impl Tool for CacheCleanupTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "cache_cleanup".to_string(),
            description: "Remove stale or surplus topics from the manifest. Never deletes files."
                .to_string(),
            params: vec![
                cache_dir_param(),
                ToolParam::optional("cleanupAfterDays", "Idle days before a topic is stale")
                    .of_type(ParamType::Integer)
                    .with_default("30"),
                ToolParam::optional("maxSessions", "Most recent topics to keep")
                    .of_type(ParamType::Integer)
                    .with_default("10"),
                flag("confirmCleanup", "Confirm the cleanup; false previews it", true),
            ],
            metadata: metadata(SecurityLevel::High, false),
        }
    }

    async fn run(&self, args: &serde_json::Value) -> Result<ToolOutput> {
        let req: CleanupRequest = parse_args("cache_cleanup", args)?;
        Ok(ToolOutput::ok(self.manager.cleanup(req).await?.to_string()))
    }
}
