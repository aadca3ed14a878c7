use std::fs;
use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tempfile::TempDir;

use mnemo_config::CacheConfig;

use super::CacheManager;
use crate::clock::ManualClock;
use crate::error::{CacheError, CacheResult};
use crate::io::TokioFileIo;
use crate::paths::{CacheArtifact, MANIFEST_FILE};
use crate::report::{ArchiveOutcome, CleanupOutcome, InitOutcome, LoadOutcome, StatusReport};
use crate::request::{
    ArchiveRequest, AutoUpdateRequest, CleanupRequest, InitRequest, ListTopicsRequest,
    LoadRequest, StatusRequest, UpdateRequest,
};

struct Harness {
    dir: TempDir,
    clock: ManualClock,
    manager: CacheManager,
}

fn start() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2026-03-01T09:00:00Z")
        .unwrap()
        .with_timezone(&Utc)
}

fn harness() -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let clock = ManualClock::new(start());
    let config = CacheConfig {
        base_dir: dir.path().to_string_lossy().into_owned(),
        ..CacheConfig::default()
    };
    let manager = CacheManager::new(&config, Arc::new(TokioFileIo), Arc::new(clock.clone()));
    Harness {
        dir,
        clock,
        manager,
    }
}

fn consented(topic: &str) -> InitRequest {
    InitRequest {
        topic: Some(topic.to_string()),
        confirm_create: true,
        understood_growth: true,
        ..InitRequest::default()
    }
}

fn summary(text: &str) -> UpdateRequest {
    UpdateRequest {
        conversation_summary: text.to_string(),
        ..UpdateRequest::default()
    }
}

fn manifest_json(base: &Path) -> serde_json::Value {
    let raw = fs::read_to_string(base.join(MANIFEST_FILE)).unwrap();
    serde_json::from_str(&raw).unwrap()
}

#[tokio::test]
async fn init_creates_files_and_manifest_entry() -> CacheResult<()> {
    let h = harness();
    let outcome = h
        .manager
        .init(InitRequest {
            project_name: Some("Compiler".into()),
            ..consented("parser")
        })
        .await?;
    let InitOutcome::Initialized(report) = outcome else {
        panic!("init should succeed with consent");
    };
    assert!(report.created_dir);
    assert!(!report.unarchived);

    let topic_dir = h.dir.path().join("parser");
    for artifact in CacheArtifact::ALL {
        assert!(artifact.path_in(&topic_dir).is_file(), "{} missing", artifact.file_name());
    }

    let manifest = manifest_json(h.dir.path());
    let entry = &manifest["activeSessions"]["parser"];
    assert_eq!(entry["projectName"], "Compiler");
    assert_eq!(entry["sessionOnly"], false);
    assert!(entry["createdAt"].is_string());
    assert!(manifest.get("archivedSessions").is_none());

    let state = h.manager.state().await;
    assert!(state.is_initialized && state.has_create_permission);
    assert_eq!(state.active_topic.as_deref(), Some("parser"));
    Ok(())
}

#[tokio::test]
async fn init_without_consent_creates_nothing() -> CacheResult<()> {
    let h = harness();
    let outcome = h
        .manager
        .init(InitRequest {
            topic: Some("t".into()),
            confirm_create: true,
            ..InitRequest::default()
        })
        .await?;
    let InitOutcome::Blocked { reason, .. } = &outcome else {
        panic!("expected a consent block");
    };
    assert!(reason.missing_understood_growth && !reason.missing_confirm_create);
    assert!(outcome.to_string().contains("understoodGrowth: true"));
    assert!(!h.dir.path().join("t").exists());
    assert!(!h.dir.path().join(MANIFEST_FILE).exists());
    assert!(!h.manager.state().await.is_initialized);
    Ok(())
}

#[tokio::test]
async fn reinit_of_existing_directory_needs_no_consent() -> CacheResult<()> {
    let h = harness();
    h.manager.init(consented("t")).await?;
    let again = h
        .manager
        .init(InitRequest {
            topic: Some("t".into()),
            ..InitRequest::default()
        })
        .await?;
    assert!(matches!(again, InitOutcome::Initialized(ref report) if !report.created_dir));
    Ok(())
}

#[tokio::test]
async fn session_only_topic_records_cleanup_hint() -> CacheResult<()> {
    let h = harness();
    h.manager
        .init(InitRequest {
            session_only: true,
            ..consented("scratch")
        })
        .await?;
    let manifest = manifest_json(h.dir.path());
    assert_eq!(manifest["activeSessions"]["scratch"]["autoCleanupAfterDays"], 7);
    Ok(())
}

#[tokio::test]
async fn update_appends_and_advances_last_used() -> CacheResult<()> {
    let h = harness();
    h.manager.init(consented("t")).await?;
    h.clock.advance(Duration::hours(2));

    let report = h
        .manager
        .update(UpdateRequest {
            project_update: Some("parser handles generics".into()),
            decisions_update: Some("   ".into()),
            ..summary("Refactored the lexer")
        })
        .await?;
    assert_eq!(
        report.appended,
        vec![CacheArtifact::ConversationLog, CacheArtifact::ProjectState]
    );

    let dir = h.dir.path().join("t");
    let log = fs::read_to_string(dir.join("conversation_log.md")).unwrap();
    assert!(log.contains("## Session — 2026-03-01 11:00:00 UTC\n\nRefactored the lexer\n"));
    let state = fs::read_to_string(dir.join("current_project_state.md")).unwrap();
    assert!(state.contains("parser handles generics"));
    let decisions = fs::read_to_string(dir.join("decisions_made.md")).unwrap();
    assert!(!decisions.contains("## Decisions"));

    let manifest = h.manager.manifests().load(h.dir.path()).await?;
    let entry = &manifest.active_sessions["t"];
    assert_eq!(entry.last_used, start() + Duration::hours(2));
    assert_eq!(entry.created_at, start());
    assert_eq!(h.manager.state().await.last_update, Some(start() + Duration::hours(2)));
    Ok(())
}

#[tokio::test]
async fn update_requires_an_initialized_session() {
    let h = harness();
    let err = h.manager.update(summary("notes")).await.unwrap_err();
    assert!(matches!(err, CacheError::NotInitialized));
}

#[tokio::test]
async fn update_of_unknown_topic_reports_missing_directory() -> CacheResult<()> {
    let h = harness();
    h.manager.init(consented("t")).await?;
    let err = h
        .manager
        .update(UpdateRequest {
            topic: Some("ghost".into()),
            ..summary("notes")
        })
        .await
        .unwrap_err();
    assert!(matches!(err, CacheError::DirectoryMissing(ref dir) if dir.ends_with("ghost")));
    Ok(())
}

#[tokio::test]
async fn blank_summary_is_rejected() -> CacheResult<()> {
    let h = harness();
    h.manager.init(consented("t")).await?;
    let err = h.manager.update(summary(" \n")).await.unwrap_err();
    assert!(matches!(err, CacheError::Validation(_)));
    Ok(())
}

#[tokio::test]
async fn legacy_cache_lives_directly_under_base() -> CacheResult<()> {
    let h = harness();
    h.manager
        .init(InitRequest {
            confirm_create: true,
            understood_growth: true,
            ..InitRequest::default()
        })
        .await?;
    h.manager.update(summary("legacy note")).await?;
    let log = fs::read_to_string(h.dir.path().join("conversation_log.md")).unwrap();
    assert!(log.contains("legacy note"));
    assert!(!h.dir.path().join(MANIFEST_FILE).exists());

    let listing = h.manager.list_topics(ListTopicsRequest::default()).await?;
    assert!(listing.legacy_present);
    Ok(())
}

#[tokio::test]
async fn load_without_topic_lists_choices() -> CacheResult<()> {
    let h = harness();
    h.manager.init(consented("older")).await?;
    h.clock.advance(Duration::minutes(5));
    h.manager.init(consented("newer")).await?;

    let LoadOutcome::Discovery(report) = h.manager.load(LoadRequest::default()).await? else {
        panic!("expected discovery");
    };
    let names = report.active.iter().map(|t| t.name.as_str()).collect::<Vec<_>>();
    assert_eq!(names, vec!["newer", "older"]);
    assert!(!report.legacy_present);
    Ok(())
}

#[tokio::test]
async fn load_of_unknown_topic_fails() {
    let h = harness();
    let err = h
        .manager
        .load(LoadRequest {
            topic: Some("nope".into()),
            ..LoadRequest::default()
        })
        .await
        .unwrap_err();
    assert!(matches!(err, CacheError::TopicNotFound(ref t) if t == "nope"));

    // The base directory exists, so a legacy load goes ahead and reports
    // every artifact as unreadable.
    let legacy = h
        .manager
        .load(LoadRequest {
            use_legacy: true,
            ..LoadRequest::default()
        })
        .await;
    let LoadOutcome::Loaded(report) = legacy.unwrap() else {
        panic!("expected a legacy load");
    };
    assert_eq!(report.failed().count(), 4);
}

#[tokio::test]
async fn load_reports_unreadable_artifacts_individually() -> CacheResult<()> {
    let h = harness();
    h.manager.init(consented("t")).await?;
    fs::remove_file(h.dir.path().join("t/decisions_made.md")).unwrap();

    let LoadOutcome::Loaded(report) = h
        .manager
        .load(LoadRequest {
            topic: Some("t".into()),
            ..LoadRequest::default()
        })
        .await?
    else {
        panic!("expected a load");
    };
    let failed = report.failed().map(|read| read.artifact).collect::<Vec<_>>();
    assert_eq!(failed, vec![CacheArtifact::Decisions]);
    assert!(report.content_of(CacheArtifact::NextSteps).is_some());
    assert!(report.to_string().contains("could not read decisions_made.md"));
    Ok(())
}

#[tokio::test]
async fn archived_topic_stays_loadable_and_reinit_restores_it() -> CacheResult<()> {
    let h = harness();
    h.manager.init(consented("t")).await?;
    h.manager.update(summary("before archive")).await?;

    let preview = h
        .manager
        .archive(ArchiveRequest {
            topic: "t".into(),
            confirm_archive: false,
            ..ArchiveRequest::default()
        })
        .await?;
    assert!(matches!(preview, ArchiveOutcome::ConfirmationRequired { .. }));
    assert!(h.manager.manifests().load(h.dir.path()).await?.is_active("t"));

    let outcome = h
        .manager
        .archive(ArchiveRequest {
            topic: "t".into(),
            confirm_archive: true,
            ..ArchiveRequest::default()
        })
        .await?;
    assert!(matches!(outcome, ArchiveOutcome::Archived { was_active: true, .. }));
    assert_eq!(h.manager.state().await.active_topic, None);

    let manifest = manifest_json(h.dir.path());
    assert!(manifest["activeSessions"].get("t").is_none());
    assert!(manifest["archivedSessions"]["t"]["archivedAt"].is_string());

    let LoadOutcome::Loaded(report) = h
        .manager
        .load(LoadRequest {
            topic: Some("t".into()),
            ..LoadRequest::default()
        })
        .await?
    else {
        panic!("expected a load");
    };
    assert!(report.archived);
    assert!(report
        .content_of(CacheArtifact::ConversationLog)
        .is_some_and(|log| log.contains("before archive")));

    let err = h
        .manager
        .configure_auto_update(AutoUpdateRequest {
            enable: true,
            topic: Some("t".into()),
            ..AutoUpdateRequest::default()
        })
        .await
        .unwrap_err();
    assert!(matches!(err, CacheError::TopicArchived(_)));

    let InitOutcome::Initialized(report) = h.manager.init(consented("t")).await? else {
        panic!("reinit should succeed");
    };
    assert!(report.unarchived);
    let manifest = h.manager.manifests().load(h.dir.path()).await?;
    assert!(manifest.is_active("t") && !manifest.is_archived("t"));
    Ok(())
}

#[tokio::test]
async fn archiving_unknown_topic_fails() {
    let h = harness();
    let err = h
        .manager
        .archive(ArchiveRequest {
            topic: "missing".into(),
            confirm_archive: true,
            ..ArchiveRequest::default()
        })
        .await
        .unwrap_err();
    assert!(matches!(err, CacheError::TopicNotFound(_)));
}

#[tokio::test]
async fn cleanup_drops_stale_topics_but_keeps_files() -> CacheResult<()> {
    let h = harness();
    h.manager.init(consented("old")).await?;
    h.clock.advance(Duration::days(35));
    h.manager.init(consented("recent")).await?;

    let preview = h.manager.cleanup(CleanupRequest::default()).await?;
    let CleanupOutcome::ConfirmationRequired { candidates } = preview else {
        panic!("expected a preview");
    };
    assert_eq!(candidates.len(), 1);
    assert!(h.manager.manifests().load(h.dir.path()).await?.is_active("old"));

    let CleanupOutcome::Cleaned { removed, retained } = h
        .manager
        .cleanup(CleanupRequest {
            confirm_cleanup: true,
            ..CleanupRequest::default()
        })
        .await?
    else {
        panic!("expected a cleanup");
    };
    assert_eq!(removed.len(), 1);
    assert_eq!(removed[0].topic, "old");
    assert_eq!(retained, 1);
    assert!(h.dir.path().join("old/conversation_log.md").is_file());
    assert!(!h.manager.manifests().load(h.dir.path()).await?.is_active("old"));
    Ok(())
}

#[tokio::test]
async fn cleanup_limit_never_removes_active_topic() -> CacheResult<()> {
    let h = harness();
    for topic in ["a", "b", "c"] {
        h.manager.init(consented(topic)).await?;
        h.clock.advance(Duration::minutes(1));
    }
    h.manager
        .load(LoadRequest {
            topic: Some("a".into()),
            ..LoadRequest::default()
        })
        .await?;

    let CleanupOutcome::Cleaned { removed, retained } = h
        .manager
        .cleanup(CleanupRequest {
            max_sessions: Some(0),
            confirm_cleanup: true,
            ..CleanupRequest::default()
        })
        .await?
    else {
        panic!("expected a cleanup");
    };
    let mut names = removed.iter().map(|c| c.topic.as_str()).collect::<Vec<_>>();
    names.sort();
    assert_eq!(names, vec!["b", "c"]);
    assert_eq!(retained, 1);
    assert!(h.manager.manifests().load(h.dir.path()).await?.is_active("a"));
    Ok(())
}

#[tokio::test]
async fn auto_update_flags_follow_active_topic() -> CacheResult<()> {
    let h = harness();
    h.manager.init(consented("a")).await?;
    h.manager.init(consented("b")).await?;

    let report = h
        .manager
        .configure_auto_update(AutoUpdateRequest {
            enable: true,
            topic: Some("a".into()),
            update_interval: Some(4),
        })
        .await?;
    assert!(!report.mirrored_to_global);
    let state = h.manager.state().await;
    assert!(state.topic_auto_update("a"));
    assert!(!state.effective_auto_update());
    assert_eq!(state.update_interval, 4);

    let err = h
        .manager
        .configure_auto_update(AutoUpdateRequest {
            enable: true,
            update_interval: Some(0),
            topic: None,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, CacheError::Validation(_)));

    let report = h
        .manager
        .configure_auto_update(AutoUpdateRequest {
            enable: true,
            ..AutoUpdateRequest::default()
        })
        .await?;
    assert_eq!(report.topic.as_deref(), Some("b"));
    assert!(report.mirrored_to_global);
    assert!(h.manager.state().await.effective_auto_update());
    Ok(())
}

#[tokio::test]
async fn status_describes_topic_and_session() -> CacheResult<()> {
    let h = harness();
    h.manager.init(consented("t")).await?;

    let StatusReport::Topic(topic) = h
        .manager
        .status(StatusRequest {
            topic: Some("t".into()),
        })
        .await?
    else {
        panic!("expected topic status");
    };
    assert!(topic.entry.is_some() && topic.dir_exists && topic.is_active && !topic.archived);

    let StatusReport::Session(session) = h.manager.status(StatusRequest::default()).await? else {
        panic!("expected session status");
    };
    assert!(session.is_initialized);
    assert_eq!(session.topics.len(), 1);
    assert_eq!(session.topics[0].topic, "t");
    Ok(())
}

#[tokio::test]
async fn list_topics_marks_current_and_missing_directories() -> CacheResult<()> {
    let h = harness();
    h.manager.init(consented("kept")).await?;
    h.clock.advance(Duration::minutes(1));
    h.manager.init(consented("gone")).await?;
    fs::remove_dir_all(h.dir.path().join("kept")).unwrap();

    let listing = h.manager.list_topics(ListTopicsRequest::default()).await?;
    assert_eq!(listing.active.len(), 2);
    assert_eq!(listing.active[0].topic, "gone");
    assert!(listing.active[0].is_current && listing.active[0].dir_exists);
    assert!(!listing.active[1].dir_exists);
    assert!(listing.to_string().contains("[directory missing]"));
    Ok(())
}
