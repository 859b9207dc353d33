//! Batch processing of a song library: one folder at a time, with every
//! per-song failure recorded on that song's outcome.

mod discovery;
mod outcome;
mod permissions;
mod runner;
mod summary;

pub use discovery::{inspect_folder, list_song_folders, DiscoveryError, FolderContents};
pub use outcome::{SongFailure, SongOutcome, SongStatus, StageReport};
pub use permissions::{fix_permissions, SONG_FILE_MODE};
pub use runner::{BatchRunner, BatchSettings};
pub use summary::{exit_code, has_failures, print_summary, render_summary, StatusCounts};
