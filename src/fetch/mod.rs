//! Retrieval of song audio through an external fetch engine.

mod engine;
mod orchestrator;
mod retry_policy;
mod ytdlp;

pub use engine::{FetchEngine, FetchError, FetchErrorKind, FetchRequest};
pub use orchestrator::{
    DownloadError, DownloadOrchestrator, DownloadResult, DownloadSettings, DownloadedAudio,
};
pub use retry_policy::RetryPolicy;
pub use ytdlp::{classify_failure, YtDlp};

#[cfg(any(test, feature = "mock"))]
pub use engine::MockFetchEngine;
