//! Creating, appending to, and restoring caches.

use tracing::{info, warn};

use crate::error::{CacheError, CacheResult};
use crate::io::WriteMode;
use crate::manifest::ManifestEntry;
use crate::paths::{CacheArtifact, resolve_cache_dir};
use crate::permission::check_create;
use crate::report::{
    ArtifactRead, DiscoveryReport, InitOutcome, InitReport, LoadOutcome, LoadReport, TopicSummary,
    UpdateReport,
};
use crate::request::{InitRequest, LoadRequest, UpdateRequest};
use crate::templates::{InitContext, initial_content, update_section};

use super::{CacheManager, non_blank, normalize_topic};

const DEFAULT_PROJECT_NAME: &str = "Untitled Project";

impl CacheManager {
    /// Create (or re-create) a cache and make it the session's active one.
    ///
    /// A directory that does not exist yet is only created when both consent
    /// flags are set; otherwise the guidance is returned and nothing changes.
    /// Re-running init rewrites all artifacts from their templates.
    pub async fn init(&self, req: InitRequest) -> CacheResult<InitOutcome> {
        let topic = normalize_topic(req.topic)?;
        let base = self.base_for(req.cache_dir).await;
        let dir = resolve_cache_dir(&base, topic.as_deref());
        let now = self.now();

        let created_dir = !self.io.dir_exists(&dir).await;
        if created_dir {
            if let Some(reason) = check_create(req.confirm_create, req.understood_growth) {
                info!(dir = %dir.display(), "cache creation blocked pending consent");
                return Ok(InitOutcome::Blocked { dir, reason });
            }
            self.io
                .create_dir(&dir)
                .await
                .map_err(|err| CacheError::io(&dir, err))?;
            self.state.lock().await.grant_create_permission(now);
        }

        let project_name = non_blank(req.project_name)
            .or_else(|| topic.clone())
            .unwrap_or_else(|| DEFAULT_PROJECT_NAME.to_string());
        let ctx = InitContext {
            project_name: &project_name,
            topic: topic.as_deref(),
            created_at: now,
            session_only: req.session_only,
        };
        for artifact in CacheArtifact::ALL {
            let path = artifact.path_in(&dir);
            self.io
                .write_file(&path, &initial_content(artifact, &ctx), WriteMode::Rewrite)
                .await
                .map_err(|err| CacheError::io(&path, err))?;
        }

        let auto_cleanup_after_days = req
            .session_only
            .then_some(self.config.session_only_cleanup_days);
        let unarchived = match &topic {
            Some(topic) => {
                let entry = ManifestEntry {
                    created_at: now,
                    last_used: now,
                    project_name: project_name.clone(),
                    session_only: req.session_only,
                    auto_cleanup_after_days,
                    archived_at: None,
                };
                self.manifests
                    .modify(&base, |manifest| {
                        Ok(manifest.activate(topic, entry.clone()).is_some())
                    })
                    .await?
            }
            None => false,
        };

        {
            let mut state = self.state.lock().await;
            state.is_initialized = true;
            state.active_topic = topic.clone();
            state.base_cache_dir = base;
        }

        info!(
            topic = topic.as_deref().unwrap_or("(legacy)"),
            dir = %dir.display(),
            created_dir,
            unarchived,
            "cache initialized"
        );
        Ok(InitOutcome::Initialized(InitReport {
            dir,
            topic,
            project_name,
            created_dir,
            files: CacheArtifact::ALL.to_vec(),
            unarchived,
            auto_cleanup_after_days,
        }))
    }

    /// Append a timestamped section to the conversation log, and to each
    /// other artifact whose update text is non-blank.
    ///
    /// The target is the explicit topic, else the active topic, else the
    /// legacy cache.  Nothing is merged or deduplicated.
    pub async fn update(&self, req: UpdateRequest) -> CacheResult<UpdateReport> {
        if req.conversation_summary.trim().is_empty() {
            return Err(CacheError::validation("conversationSummary must not be empty"));
        }
        let explicit = normalize_topic(req.topic)?;

        let (base, topic) = {
            let state = self.state.lock().await;
            if !state.is_initialized {
                return Err(CacheError::NotInitialized);
            }
            (
                state.base_cache_dir.clone(),
                explicit.or_else(|| state.active_topic.clone()),
            )
        };

        let dir = resolve_cache_dir(&base, topic.as_deref());
        if !self.io.dir_exists(&dir).await {
            return Err(CacheError::DirectoryMissing(dir));
        }

        let now = self.now();
        let mut appended = Vec::new();
        let sections = [
            (CacheArtifact::ConversationLog, Some(req.conversation_summary)),
            (CacheArtifact::ProjectState, non_blank(req.project_update)),
            (CacheArtifact::Decisions, non_blank(req.decisions_update)),
            (CacheArtifact::NextSteps, non_blank(req.next_steps_update)),
        ];
        for (artifact, body) in sections {
            let Some(body) = body else { continue };
            self.append(&dir, artifact, &update_section(artifact, &body, now))
                .await?;
            appended.push(artifact);
        }

        if let Some(topic) = &topic {
            self.manifests
                .modify(&base, |manifest| Ok(manifest.touch(topic, now)))
                .await?;
        }
        self.state.lock().await.last_update = Some(now);

        info!(
            topic = topic.as_deref().unwrap_or("(legacy)"),
            files = appended.len(),
            "cache updated"
        );
        Ok(UpdateReport {
            dir,
            topic,
            appended,
            at: now,
        })
    }

    /// Restore a cache into the session.
    ///
    /// Without a topic (and without `use_legacy`) nothing is loaded; the
    /// known topics are listed instead so the caller picks one deliberately.
    /// Each artifact is read independently and a failed read is reported in
    /// place of its content.
    pub async fn load(&self, req: LoadRequest) -> CacheResult<LoadOutcome> {
        let topic = normalize_topic(req.topic)?;
        let base = self.base_for(req.cache_dir).await;

        if topic.is_none() && !req.use_legacy {
            let manifest = self.manifests.load(&base).await?;
            let active = manifest
                .active_by_recency()
                .into_iter()
                .map(|(name, entry)| TopicSummary {
                    name: name.to_string(),
                    project_name: entry.project_name.clone(),
                    last_used: entry.last_used,
                })
                .collect();
            let archived = manifest.archived_sessions.keys().cloned().collect();
            return Ok(LoadOutcome::Discovery(DiscoveryReport {
                legacy_present: self.legacy_present(&base).await,
                base,
                active,
                archived,
            }));
        }

        let dir = resolve_cache_dir(&base, topic.as_deref());
        if !self.io.dir_exists(&dir).await {
            return Err(match topic {
                Some(topic) => CacheError::TopicNotFound(topic),
                None => CacheError::LegacyNotFound(dir),
            });
        }

        let mut artifacts = Vec::with_capacity(CacheArtifact::MEMORY.len());
        for artifact in CacheArtifact::MEMORY {
            let path = artifact.path_in(&dir);
            let content = self
                .io
                .read_file(&path, 0, self.config.load_max_lines)
                .await
                .map_err(|err| err.to_string());
            if let Err(err) = &content {
                warn!(path = %path.display(), error = %err, "cache artifact unreadable");
            }
            artifacts.push(ArtifactRead { artifact, content });
        }

        let now = self.now();
        let archived = match &topic {
            Some(topic) => {
                self.manifests
                    .modify(&base, |manifest| {
                        let touched = manifest.touch(topic, now);
                        Ok(!touched && manifest.is_archived(topic))
                    })
                    .await?
            }
            None => false,
        };

        {
            let mut state = self.state.lock().await;
            state.is_initialized = true;
            state.active_topic = topic.clone();
            state.base_cache_dir = base;
        }

        let report = LoadReport {
            dir,
            topic,
            archived,
            artifacts,
        };
        info!(
            topic = report.topic.as_deref().unwrap_or("(legacy)"),
            archived,
            unreadable = report.failed().count(),
            "cache loaded"
        );
        Ok(LoadOutcome::Loaded(report))
    }
}
