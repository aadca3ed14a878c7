pub mod auto_update;
pub mod clock;
pub mod error;
pub mod io;
pub mod manager;
pub mod manifest;
pub mod paths;
pub mod permission;
pub mod report;
pub mod request;
pub mod state;
pub mod templates;

pub use auto_update::AutoUpdateTrigger;
pub use clock::{Clock, SystemClock};
pub use error::{CacheError, CacheResult};
pub use io::{FileIo, TokioFileIo, WriteMode};
pub use manager::{CacheManager, select_for_cleanup};
pub use manifest::{Manifest, ManifestEntry, ManifestStore};
pub use paths::{CacheArtifact, resolve_cache_dir, validate_topic};
pub use report::{
    ArchiveOutcome, CleanupOutcome, InitOutcome, LoadOutcome, StatusReport, TopicListing,
    UpdateReport,
};
pub use request::{
    ArchiveRequest, AutoUpdateRequest, CleanupRequest, InitRequest, ListTopicsRequest,
    LoadRequest, StatusRequest, UpdateRequest,
};
pub use state::{AutoUpdateJob, CacheState};
