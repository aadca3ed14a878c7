//! Dispatch of named tool calls for one session.

use std::sync::Arc;

use tracing::{debug, warn};

use mnemo_cache::{AutoUpdateTrigger, CacheManager};

use crate::{ToolOutput, ToolRegistry, ToolSpec, register_cache_tools};

/// Routes tool calls to the registry, counting every call towards the
/// auto-update cadence before it runs.
pub struct ToolRouter {
    registry: ToolRegistry,
    trigger: AutoUpdateTrigger,
}

impl ToolRouter {
    pub fn new(registry: ToolRegistry, trigger: AutoUpdateTrigger) -> Self {
        Self { registry, trigger }
    }

    /// A router with the cache tools registered and an auto-update worker
    /// running for `manager`.  Must be called from within a tokio runtime.
    pub fn for_session(manager: Arc<CacheManager>) -> Self {
        let mut registry = ToolRegistry::default();
        register_cache_tools(&mut registry, manager.clone());
        Self::new(registry, AutoUpdateTrigger::spawn(manager))
    }

    pub fn specs(&self) -> Vec<ToolSpec> {
        self.registry.list_specs()
    }

    pub fn manager(&self) -> &Arc<CacheManager> {
        self.trigger.manager()
    }

    /// Run the named tool.  Failures, including unknown tools and malformed
    /// arguments, come back as an unsuccessful [`ToolOutput`].
    pub async fn call(&self, name: &str, args: &serde_json::Value) -> ToolOutput {
        let queued = self.trigger.tick().await;
        debug!(tool = name, auto_update_queued = queued, "routing tool call");

        let Some(tool) = self.registry.get(name) else {
            warn!(tool = name, "unknown tool");
            return ToolOutput::failed(format!("unknown tool: {name}"));
        };
        match tool.run(args).await {
            Ok(output) => output,
            Err(err) => {
                warn!(tool = name, error = %format!("{err:#}"), "tool call failed");
                ToolOutput::failed(format!("{err:#}"))
            }
        }
    }

    /// Wait for any queued auto-update to finish.
    pub async fn shutdown(self) {
        self.trigger.shutdown().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mnemo_cache::{SystemClock, TokioFileIo};
    use mnemo_config::CacheConfig;
    use serde_json::json;

    fn router(base: &std::path::Path) -> ToolRouter {
        let config = CacheConfig {
            base_dir: base.to_string_lossy().into_owned(),
            ..CacheConfig::default()
        };
        let manager = CacheManager::new(
            &config,
            Arc::new(TokioFileIo),
            Arc::new(SystemClock),
        );
        ToolRouter::for_session(Arc::new(manager))
    }

    #[tokio::test]
    async fn every_call_is_counted_even_unknown_ones() {
        let dir = tempfile::tempdir().unwrap();
        let router = router(dir.path());
        let out = router.call("no_such_tool", &json!({})).await;
        assert!(!out.success);
        assert!(out.output.contains("unknown tool"));
        router.call("cache_status", &json!({})).await;
        assert_eq!(router.manager().state().await.tool_call_count, 2);
        router.shutdown().await;
    }

    #[tokio::test]
    async fn errors_become_failed_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let router = router(dir.path());
        let out = router
            .call("cache_update", &json!({ "conversationSummary": "x" }))
            .await;
        assert!(!out.success);
        assert!(out.output.contains("not initialized"));
        router.shutdown().await;
    }

    #[tokio::test]
    async fn interval_of_calls_writes_one_auto_update() {
        let dir = tempfile::tempdir().unwrap();
        let router = router(dir.path());
        let init = router
            .call(
                "cache_init",
                &json!({ "topic": "t", "confirmCreate": true, "understoodGrowth": true }),
            )
            .await;
        assert!(init.success, "{}", init.output);
        let auto = router
            .call("cache_auto_update", &json!({ "enable": true, "updateInterval": 5 }))
            .await;
        assert!(auto.success, "{}", auto.output);
        for _ in 0..3 {
            router.call("cache_status", &json!({})).await;
        }
        router.shutdown().await;

        let log = std::fs::read_to_string(dir.path().join("t/conversation_log.md")).unwrap();
        assert_eq!(log.matches("tool calls").count(), 1);
    }
}
