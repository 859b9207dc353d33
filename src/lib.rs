//! usdx-fetch library
//!
//! Attaches audio to UltraStar song folders: finds the video referenced by
//! each song description, downloads its audio with yt-dlp and optionally
//! normalizes its loudness with rsgain.

pub mod batch;
pub mod cli_style;
pub mod config;
pub mod description;
pub mod fetch;
pub mod media;
pub mod post_process;
pub mod process;

// Re-export commonly used types for convenience
pub use batch::{BatchRunner, BatchSettings, SongOutcome, SongStatus};
pub use config::AppConfig;
pub use description::{extract, BareTokenPolicy, ExtractorOptions, VideoReference};
pub use fetch::{DownloadOrchestrator, DownloadSettings, FetchEngine};
