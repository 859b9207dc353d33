use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::instrument;

use crate::process::{run_tool, ToolError};

/// External tool writing loudness-normalization tags into an audio file in place.
#[cfg_attr(any(test, feature = "mock"), mockall::automock)]
#[async_trait]
pub trait LoudnessTool: Send + Sync {
    async fn apply(&self, path: &Path, cancel: &CancellationToken) -> Result<(), ToolError>;
}

/// `rsgain` in custom mode: ReplayGain 2.0 tags, positive-gain clipping protection.
pub struct Rsgain {
    bin_path: PathBuf,
    timeout: Duration,
}

impl Rsgain {
    pub fn new(bin_path: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            bin_path: bin_path.into(),
            timeout,
        }
    }

    fn build_command(&self, path: &Path) -> Command {
        let mut command = Command::new(&self.bin_path);
        command
            .args(["custom", "--tagmode=i", "--clip-mode=p", "--quiet"])
            .arg(path);
        command
    }
}

#[async_trait]
impl LoudnessTool for Rsgain {
    #[instrument(name = "rsgain", skip(self, cancel))]
    async fn apply(&self, path: &Path, cancel: &CancellationToken) -> Result<(), ToolError> {
        run_tool(self.build_command(path), self.timeout, cancel)
            .await
            .map(|_| ())
    }
}
