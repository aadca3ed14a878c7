//! Built-in tool implementations.

mod cache;

pub use cache::{
    CacheArchiveTool, CacheAutoUpdateTool, CacheCleanupTool, CacheInitTool, CacheListTopicsTool,
    CacheLoadTool, CacheStatusTool, CacheUpdateTool, register_cache_tools,
};
