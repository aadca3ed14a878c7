//! One-shot administrative commands.  Each runs against a fresh session, so
//! nothing here depends on an active topic carried over from an earlier call.

use std::path::PathBuf;

use anyhow::Result;

use mnemo_cache::{
    ArchiveRequest, CacheManager, CleanupRequest, InitRequest, ListTopicsRequest, LoadRequest,
    StatusRequest,
};
use mnemo_tools::{ToolSpec, specs_to_openai_tools};

pub async fn run_init(
    manager: &CacheManager,
    topic: Option<String>,
    project_name: Option<String>,
    session_only: bool,
    yes: bool,
) -> Result<()> {
    let outcome = manager
        .init(InitRequest {
            topic,
            project_name,
            session_only,
            confirm_create: yes,
            understood_growth: yes,
            ..InitRequest::default()
        })
        .await?;
    print!("{outcome}");
    Ok(())
}

pub async fn run_load(manager: &CacheManager, topic: Option<String>, legacy: bool) -> Result<()> {
    let outcome = manager
        .load(LoadRequest {
            topic,
            use_legacy: legacy,
            ..LoadRequest::default()
        })
        .await?;
    print!("{outcome}");
    Ok(())
}

pub async fn run_status(manager: &CacheManager, topic: Option<String>) -> Result<()> {
    print!("{}", manager.status(StatusRequest { topic }).await?);
    Ok(())
}

pub async fn run_topics(manager: &CacheManager, cache_dir: Option<PathBuf>) -> Result<()> {
    print!("{}", manager.list_topics(ListTopicsRequest { cache_dir }).await?);
    Ok(())
}

pub async fn run_archive(manager: &CacheManager, topic: String, yes: bool) -> Result<()> {
    let outcome = manager
        .archive(ArchiveRequest {
            topic,
            cache_dir: None,
            confirm_archive: yes,
        })
        .await?;
    print!("{outcome}");
    Ok(())
}

pub async fn run_cleanup(
    manager: &CacheManager,
    after_days: Option<u64>,
    max_sessions: Option<usize>,
    yes: bool,
) -> Result<()> {
    let outcome = manager
        .cleanup(CleanupRequest {
            cache_dir: None,
            cleanup_after_days: after_days,
            max_sessions,
            confirm_cleanup: yes,
        })
        .await?;
    print!("{outcome}");
    Ok(())
}

pub fn run_tools(specs: &[ToolSpec], as_json: bool) -> Result<()> {
    if as_json {
        println!("{}", serde_json::to_string_pretty(&specs_to_openai_tools(specs))?);
        return Ok(());
    }
    print!("{}", render_tools(specs));
    Ok(())
}

fn render_tools(specs: &[ToolSpec]) -> String {
    let mut out = String::from("── cache tools ──────────────────────────────────────\n");
    for spec in specs {
        let access = if spec.metadata.read_only {
            "read-only"
        } else {
            "writes"
        };
        out.push_str(&format!(
            "  {} [{}, {access}] — {}\n",
            spec.name,
            spec.metadata.security_level.as_str(),
            spec.description
        ));
        for p in &spec.params {
            out.push_str(&format!(
                "      {} [{}] — {}\n",
                p.name,
                if p.required { "required" } else { "optional" },
                p.description
            ));
        }
    }
    out.push_str(&format!("  ({} tools total)\n", specs.len()));
    out
}
