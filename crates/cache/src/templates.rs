//! Markdown bodies for the cache artifacts.

use chrono::{DateTime, Utc};

use crate::paths::CacheArtifact;

/// Context rendered into freshly initialized artifacts.
#[derive(Debug, Clone)]
pub struct InitContext<'a> {
    pub project_name: &'a str,
    pub topic: Option<&'a str>,
    pub created_at: DateTime<Utc>,
    pub session_only: bool,
}

fn stamp(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

pub fn initial_content(artifact: CacheArtifact, ctx: &InitContext<'_>) -> String {
    let created = stamp(ctx.created_at);
    let scope = ctx.topic.unwrap_or("(legacy cache)");
    match artifact {
        CacheArtifact::ConversationLog => format!(
            "# Conversation Log: {project}\n\n\
             Topic: {scope}\n\
             Started: {created}\n\n\
             Each update appends a timestamped section below.\n",
            project = ctx.project_name,
        ),
        CacheArtifact::ProjectState => format!(
            "# Current Project State: {project}\n\n\
             Last initialized: {created}\n\n\
             ## Status\n\
             - Project initialized, no progress recorded yet.\n",
            project = ctx.project_name,
        ),
        CacheArtifact::Decisions => format!(
            "# Decisions Made: {project}\n\n\
             Record architectural and process decisions with their rationale.\n",
            project = ctx.project_name,
        ),
        CacheArtifact::NextSteps => format!(
            "# Next Steps: {project}\n\n\
             - [ ] Capture the first working notes with cache_update.\n",
            project = ctx.project_name,
        ),
        CacheArtifact::Protocol => {
            let lifetime = if ctx.session_only {
                "This is a session-only cache: it is suggested for cleanup after a week of inactivity."
            } else {
                "This cache persists until it is archived or cleaned up explicitly."
            };
            format!(
                "# Cache Protocol\n\n\
                 Topic: {scope}\n\
                 Created: {created}\n\n\
                 1. At the start of a conversation, call cache_load with this topic.\n\
                 2. After meaningful progress, call cache_update with a conversation summary.\n\
                 3. Record decisions and next steps alongside the summary when they change.\n\
                 4. Use cache_archive when the work is finished; files are kept on disk.\n\n\
                 {lifetime}\n"
            )
        }
    }
}

/// Section appended to an artifact by an update.
pub fn update_section(artifact: CacheArtifact, body: &str, at: DateTime<Utc>) -> String {
    let heading = match artifact {
        CacheArtifact::ConversationLog => "Session",
        CacheArtifact::ProjectState => "State Update",
        CacheArtifact::Decisions => "Decisions",
        CacheArtifact::NextSteps => "Next Steps",
        CacheArtifact::Protocol => "Protocol Note",
    };
    format!("\n## {heading} — {}\n\n{}\n", stamp(at), body.trim_end())
}
