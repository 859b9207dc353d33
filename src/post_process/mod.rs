//! Optional processing of a downloaded artifact: loudness normalization and
//! ID3 tagging.

mod id3_tags;
mod loudness;

pub use id3_tags::{supports_id3, write_song_tags, TagError};
pub use loudness::{LoudnessTool, Rsgain};

#[cfg(any(test, feature = "mock"))]
pub use loudness::MockLoudnessTool;

use std::fs;
use std::io;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

use crate::process::ToolError;

#[derive(Debug, Error)]
pub enum PostProcessError {
    #[error("loudness normalization failed: {0}")]
    NormalizationFailed(#[from] ToolError),

    #[error("I/O error while normalizing: {0}")]
    Io(#[from] io::Error),
}

pub type PostProcessResult = Result<(), PostProcessError>;

pub struct PostProcessor {
    tool: Arc<dyn LoudnessTool>,
}

impl PostProcessor {
    pub fn new(tool: Arc<dyn LoudnessTool>) -> Self {
        Self { tool }
    }

    /// Normalize the loudness of the artifact at `path`.
    ///
    /// The tool works on a sibling copy that replaces the artifact only on
    /// success; on failure the artifact is left byte-identical.
    #[instrument(skip(self, cancel))]
    pub async fn normalize(&self, path: &Path, cancel: &CancellationToken) -> PostProcessResult {
        let parent = path.parent().unwrap_or_else(|| Path::new("."));
        // the tool picks its tag format from the extension
        let suffix = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| format!(".{}", e))
            .unwrap_or_default();
        let staging = tempfile::Builder::new()
            .prefix(".usdx-fetch-")
            .suffix(&suffix)
            .tempfile_in(parent)?;

        fs::copy(path, staging.path())?;
        self.tool.apply(staging.path(), cancel).await?;
        let permissions = fs::metadata(path)?.permissions();
        fs::set_permissions(staging.path(), permissions)?;
        staging.persist(path).map_err(|e| e.error)?;
        debug!("Normalized {}", path.display());
        Ok(())
    }
}
