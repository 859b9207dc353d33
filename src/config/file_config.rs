use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct FileConfig {
    // Core settings (can override CLI)
    pub root_dir: Option<String>,
    pub normalize_loudness: Option<bool>,
    pub timeout_secs: Option<u64>,
    pub overwrite_existing: Option<bool>,
    pub audio_format: Option<String>,
    pub bare_tokens: Option<String>,
    pub write_id3_tags: Option<bool>,
    pub update_description: Option<bool>,
    pub fix_permissions: Option<bool>,

    // Sections
    pub tools: Option<ToolsConfig>,
    pub retry: Option<RetryConfig>,
}

/// Paths of the external binaries, `[tools]`.
#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct ToolsConfig {
    pub yt_dlp: Option<String>,
    pub rsgain: Option<String>,
    pub ffprobe: Option<String>,
}

/// Fetch retry behaviour, `[retry]`.
#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct RetryConfig {
    pub max_retries: Option<u32>,
    pub initial_backoff_secs: Option<u64>,
    pub max_backoff_secs: Option<u64>,
    pub backoff_multiplier: Option<f64>,
    /// Failure categories to retry, e.g. `["timeout", "network"]`.
    pub retry_on: Option<Vec<String>>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }
}
