//! Common test infrastructure
//!
//! Song library trees on disk plus in-process fakes for the external tools,
//! so batch runs can be tested without yt-dlp or rsgain installed.
//!
//! # Example
//!
//! ```no_run
//! mod common;
//! use common::{FakeFetchEngine, SongLibrary, TestBatch};
//!
//! #[tokio::test]
//! async fn test_download_one_song() {
//!     let library = SongLibrary::new();
//!     library.add_song("Band - Song", &common::description_with_url("dQw4w9WgXcQ"));
//!     let batch = TestBatch::new(FakeFetchEngine::new());
//!     let outcomes = batch.run(&library).await;
//!     assert_eq!(outcomes.len(), 1);
//! }
//! ```

#![allow(dead_code)]

mod constants;
mod fakes;
mod fixtures;

pub use constants::*;
pub use fakes::{FakeFetchEngine, FakeLoudnessTool, FakeResponse, TestBatch};
pub use fixtures::{description_with_url, SongLibrary};
