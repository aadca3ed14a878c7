//! Background writer for automatic progress notes.
//!
//! Every routed tool call goes through [`AutoUpdateTrigger::tick`].  When the
//! cadence is reached the due update is queued on a single-slot channel and
//! written by one worker task, so the caller never waits on disk I/O.  A
//! trigger that fires while the slot is still occupied is coalesced into the
//! pending one.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::manager::CacheManager;
use crate::request::UpdateRequest;
use crate::state::AutoUpdateJob;

pub struct AutoUpdateTrigger {
    manager: Arc<CacheManager>,
    tx: mpsc::Sender<AutoUpdateJob>,
    worker: JoinHandle<()>,
}

impl AutoUpdateTrigger {
    /// Start the worker.  Must be called from within a tokio runtime.
    pub fn spawn(manager: Arc<CacheManager>) -> Self {
        let (tx, mut rx) = mpsc::channel::<AutoUpdateJob>(1);
        let worker_manager = manager.clone();
        let worker = tokio::spawn(async move {
            while let Some(job) = rx.recv().await {
                let count = job.tool_call_count;
                let req = UpdateRequest {
                    topic: job.topic,
                    conversation_summary: job.summary,
                    ..UpdateRequest::default()
                };
                match worker_manager.update(req).await {
                    Ok(report) => {
                        info!(tool_calls = count, dir = %report.dir.display(), "auto-update written")
                    }
                    Err(err) => warn!(tool_calls = count, error = %err, "auto-update failed"),
                }
            }
        });
        Self {
            manager,
            tx,
            worker,
        }
    }

    pub fn manager(&self) -> &Arc<CacheManager> {
        &self.manager
    }

    /// Count one tool call.  Returns `true` when an update was queued.
    pub async fn tick(&self) -> bool {
        let Some(job) = self.manager.register_tool_call().await else {
            return false;
        };
        match self.tx.try_send(job) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(job)) => {
                debug!(
                    tool_calls = job.tool_call_count,
                    "auto-update already pending; coalesced"
                );
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                warn!("auto-update worker is gone; update dropped");
                false
            }
        }
    }

    /// Stop accepting work and wait for any queued update to be written.
    pub async fn shutdown(self) {
        drop(self.tx);
        if let Err(err) = self.worker.await {
            warn!(error = %err, "auto-update worker ended abnormally");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::io::TokioFileIo;
    use crate::report::InitOutcome;
    use crate::request::{AutoUpdateRequest, InitRequest};
    use mnemo_config::CacheConfig;

    fn manager(base: &std::path::Path) -> Arc<CacheManager> {
        let config = CacheConfig {
            base_dir: base.to_string_lossy().into_owned(),
            ..CacheConfig::default()
        };
        Arc::new(CacheManager::new(
            &config,
            Arc::new(TokioFileIo),
            Arc::new(ManualClock::new(chrono::Utc::now())),
        ))
    }

    #[tokio::test]
    async fn ticks_without_auto_update_never_queue() {
        let dir = tempfile::tempdir().unwrap();
        let trigger = AutoUpdateTrigger::spawn(manager(dir.path()));
        for _ in 0..25 {
            assert!(!trigger.tick().await);
        }
        assert_eq!(trigger.manager().state().await.tool_call_count, 25);
        trigger.shutdown().await;
    }

    #[tokio::test]
    async fn due_update_is_written_before_shutdown_returns() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager(dir.path());
        let outcome = manager
            .init(InitRequest {
                topic: Some("demo".into()),
                confirm_create: true,
                understood_growth: true,
                ..InitRequest::default()
            })
            .await
            .unwrap();
        assert!(matches!(outcome, InitOutcome::Initialized(_)));
        manager
            .configure_auto_update(AutoUpdateRequest {
                enable: true,
                update_interval: Some(2),
                topic: None,
            })
            .await
            .unwrap();

        let trigger = AutoUpdateTrigger::spawn(manager);
        assert!(!trigger.tick().await);
        assert!(trigger.tick().await);
        trigger.shutdown().await;

        let log = std::fs::read_to_string(dir.path().join("demo/conversation_log.md")).unwrap();
        assert_eq!(log.matches("Auto-update triggered after 2 tool calls").count(), 1);
    }
}
