mod file_config;

pub use file_config::{FileConfig, RetryConfig, ToolsConfig};

use anyhow::{bail, Result};
use clap::ValueEnum;
use std::path::PathBuf;
use std::time::Duration;

use crate::batch::BatchSettings;
use crate::description::{BareTokenPolicy, ExtractorOptions};
use crate::fetch::{DownloadSettings, FetchErrorKind, RetryPolicy};
use crate::media::AudioFormat;

/// CLI arguments that can be used for config resolution.
/// This struct mirrors the CLI arguments that can be overridden by TOML config.
#[derive(Debug, Clone)]
pub struct CliConfig {
    pub root_dir: Option<PathBuf>,
    pub normalize_loudness: bool,
    pub timeout_secs: u64,
    pub overwrite_existing: bool,
    pub audio_format: AudioFormat,
    pub bare_tokens: BareTokenPolicy,
    pub max_retries: u32,
    pub write_id3_tags: bool,
    pub update_description: bool,
    pub fix_permissions: bool,
    pub yt_dlp: Option<PathBuf>,
    pub rsgain: Option<PathBuf>,
    pub ffprobe: Option<PathBuf>,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            root_dir: None,
            normalize_loudness: false,
            timeout_secs: 600,
            overwrite_existing: false,
            audio_format: AudioFormat::default(),
            bare_tokens: BareTokenPolicy::default(),
            max_retries: 0,
            write_id3_tags: true,
            update_description: true,
            fix_permissions: false,
            yt_dlp: None,
            rsgain: None,
            ffprobe: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    // Core settings
    pub root_dir: PathBuf,
    pub normalize_loudness: bool,
    pub timeout_secs: u64,
    pub overwrite_existing: bool,
    pub audio_format: AudioFormat,
    pub bare_tokens: BareTokenPolicy,
    pub write_id3_tags: bool,
    pub update_description: bool,
    pub fix_permissions: bool,

    // Sections (with defaults)
    pub tools: ToolPaths,
    pub retry: RetrySettings,
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        let root_dir = file
            .root_dir
            .map(PathBuf::from)
            .or_else(|| cli.root_dir.clone())
            .ok_or_else(|| {
                anyhow::anyhow!("root directory must be given as ROOT or root_dir in config file")
            })?;

        // Validate root_dir exists
        if !root_dir.exists() {
            bail!("Root directory does not exist: {:?}", root_dir);
        }
        if !root_dir.is_dir() {
            bail!("root_dir is not a directory: {:?}", root_dir);
        }

        let timeout_secs = file.timeout_secs.unwrap_or(cli.timeout_secs);
        if timeout_secs == 0 {
            bail!("timeout_secs must be greater than zero");
        }

        let audio_format = match file.audio_format {
            Some(s) => parse_audio_format(&s)
                .ok_or_else(|| anyhow::anyhow!("Invalid audio_format: {:?}", s))?,
            None => cli.audio_format,
        };
        let bare_tokens = match file.bare_tokens {
            Some(s) => parse_bare_token_policy(&s)
                .ok_or_else(|| anyhow::anyhow!("Invalid bare_tokens: {:?}", s))?,
            None => cli.bare_tokens,
        };

        let normalize_loudness = file.normalize_loudness.unwrap_or(cli.normalize_loudness);
        let overwrite_existing = file.overwrite_existing.unwrap_or(cli.overwrite_existing);
        let write_id3_tags = file.write_id3_tags.unwrap_or(cli.write_id3_tags);
        let update_description = file.update_description.unwrap_or(cli.update_description);
        let fix_permissions = file.fix_permissions.unwrap_or(cli.fix_permissions);

        // Tool paths - [tools] section, then CLI, then PATH lookup by name
        let tools_file = file.tools.unwrap_or_default();
        let defaults = ToolPaths::default();
        let tools = ToolPaths {
            yt_dlp: tools_file
                .yt_dlp
                .map(PathBuf::from)
                .or_else(|| cli.yt_dlp.clone())
                .unwrap_or(defaults.yt_dlp),
            rsgain: tools_file
                .rsgain
                .map(PathBuf::from)
                .or_else(|| cli.rsgain.clone())
                .unwrap_or(defaults.rsgain),
            ffprobe: tools_file
                .ffprobe
                .map(PathBuf::from)
                .or_else(|| cli.ffprobe.clone())
                .unwrap_or(defaults.ffprobe),
        };

        // Retry settings - merge file config with defaults
        let retry_file = file.retry.unwrap_or_default();
        let retry_defaults = RetrySettings::default();
        let retry_on = match retry_file.retry_on {
            Some(names) => parse_retry_on(&names)?,
            None => retry_defaults.retry_on,
        };
        let retry = RetrySettings {
            max_retries: retry_file.max_retries.unwrap_or(cli.max_retries),
            initial_backoff_secs: retry_file
                .initial_backoff_secs
                .unwrap_or(retry_defaults.initial_backoff_secs),
            max_backoff_secs: retry_file
                .max_backoff_secs
                .unwrap_or(retry_defaults.max_backoff_secs),
            backoff_multiplier: retry_file
                .backoff_multiplier
                .unwrap_or(retry_defaults.backoff_multiplier),
            retry_on,
        };
        if retry.backoff_multiplier.is_nan() || retry.backoff_multiplier < 1.0 {
            bail!("backoff_multiplier must be at least 1.0");
        }

        Ok(Self {
            root_dir,
            normalize_loudness,
            timeout_secs,
            overwrite_existing,
            audio_format,
            bare_tokens,
            write_id3_tags,
            update_description,
            fix_permissions,
            tools,
            retry,
        })
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn download_settings(&self) -> DownloadSettings {
        DownloadSettings {
            audio_format: self.audio_format,
            timeout: self.timeout(),
            overwrite_existing: self.overwrite_existing,
        }
    }

    pub fn batch_settings(&self) -> BatchSettings {
        BatchSettings {
            extractor: ExtractorOptions {
                bare_tokens: self.bare_tokens,
            },
            write_id3_tags: self.write_id3_tags,
            update_description: self.update_description,
            fix_permissions: self.fix_permissions,
            retry: RetryPolicy::new(&self.retry),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolPaths {
    pub yt_dlp: PathBuf,
    pub rsgain: PathBuf,
    pub ffprobe: PathBuf,
}

impl Default for ToolPaths {
    fn default() -> Self {
        Self {
            yt_dlp: PathBuf::from("yt-dlp"),
            rsgain: PathBuf::from("rsgain"),
            ffprobe: PathBuf::from("ffprobe"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RetrySettings {
    pub max_retries: u32,
    pub initial_backoff_secs: u64,
    pub max_backoff_secs: u64,
    pub backoff_multiplier: f64,
    pub retry_on: Vec<FetchErrorKind>,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: 0,
            initial_backoff_secs: 30,
            max_backoff_secs: 600,
            backoff_multiplier: 2.0,
            retry_on: vec![
                FetchErrorKind::Timeout,
                FetchErrorKind::Network,
                FetchErrorKind::RateLimited,
            ],
        }
    }
}

/// Parses an audio format string. Uses clap's ValueEnum trait for parsing.
fn parse_audio_format(s: &str) -> Option<AudioFormat> {
    AudioFormat::from_str(s, true).ok()
}

fn parse_bare_token_policy(s: &str) -> Option<BareTokenPolicy> {
    BareTokenPolicy::from_str(s, true).ok()
}

fn parse_retry_on(names: &[String]) -> Result<Vec<FetchErrorKind>> {
    let mut kinds = Vec::with_capacity(names.len());
    for name in names {
        let kind = match FetchErrorKind::from_str(&name.to_lowercase()) {
            Some(kind) => kind,
            None => bail!("Unknown failure category in retry_on: {:?}", name),
        };
        if !kind.is_transient() {
            bail!("Failure category {:?} can never be retried", name);
        }
        kinds.push(kind);
    }
    Ok(kinds)
}
