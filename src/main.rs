use anyhow::{bail, Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, level_filters::LevelFilter, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use usdx_fetch::batch::{exit_code, print_summary, BatchRunner};
use usdx_fetch::cli_style::{get_styles, print_error, print_warning};
use usdx_fetch::config::{AppConfig, CliConfig, FileConfig};
use usdx_fetch::description::BareTokenPolicy;
use usdx_fetch::fetch::{DownloadOrchestrator, YtDlp};
use usdx_fetch::media::{AudioFormat, FfProbe, MediaProber};
use usdx_fetch::post_process::{PostProcessor, Rsgain};
use usdx_fetch::process::check_available;

/// Exit code for errors that prevent the batch from running at all.
const EXIT_SETUP_ERROR: u8 = 2;

fn parse_path(s: &str) -> Result<PathBuf> {
    let path_buf = PathBuf::from(s);
    let original_path = match path_buf.canonicalize() {
        Ok(path) => path,
        Err(msg) => {
            if msg.kind() == std::io::ErrorKind::NotFound {
                path_buf
            } else {
                return Err(msg).with_context(|| format!("Error resolving path: {}", s));
            }
        }
    };
    if original_path.is_absolute() {
        return Ok(original_path);
    }
    let cwd = std::env::current_dir()?;
    Ok(cwd.join(original_path))
}

/// Download the audio of UltraStar songs from the video referenced in each
/// song's description file.
#[derive(Parser, Debug)]
#[command(name = "usdx-fetch", styles = get_styles())]
#[command(version = concat!(env!("CARGO_PKG_VERSION"), "-", env!("GIT_HASH")))]
struct CliArgs {
    /// Library root: one subdirectory per song, each with one .txt description.
    #[clap(value_name = "ROOT", value_parser = parse_path)]
    pub root_dir: Option<PathBuf>,

    /// Path to a TOML config file. Its values override command-line values.
    #[clap(long, value_parser = parse_path)]
    pub config: Option<PathBuf>,

    /// Write ReplayGain loudness tags with rsgain after each download.
    #[clap(long)]
    pub normalize_loudness: bool,

    /// Timeout in seconds for each external tool invocation.
    #[clap(long, default_value_t = 600)]
    pub timeout_secs: u64,

    /// Download again even if the song folder already has audio.
    #[clap(long)]
    pub overwrite_existing: bool,

    /// Audio format requested from yt-dlp.
    #[clap(long, value_enum, default_value_t = AudioFormat::Mp3)]
    pub audio_format: AudioFormat,

    /// When identifier-shaped words without a URL are accepted.
    #[clap(long, value_enum, default_value_t = BareTokenPolicy::Anywhere)]
    pub bare_tokens: BareTokenPolicy,

    /// Retries for transient fetch failures (timeout, network, rate limiting).
    #[clap(long, default_value_t = 0)]
    pub max_retries: u32,

    /// Do not write title/artist ID3 tags into downloaded MP3 files.
    #[clap(long)]
    pub no_id3_tags: bool,

    /// Do not point the description's #MP3 header at the downloaded file.
    #[clap(long)]
    pub no_update_description: bool,

    /// Set the files of each downloaded song folder to mode 0640.
    #[clap(long)]
    pub fix_permissions: bool,

    /// yt-dlp binary.
    #[clap(long = "yt-dlp", value_name = "PATH")]
    pub yt_dlp: Option<PathBuf>,

    /// rsgain binary.
    #[clap(long, value_name = "PATH")]
    pub rsgain: Option<PathBuf>,

    /// ffprobe binary, used to report durations.
    #[clap(long, value_name = "PATH")]
    pub ffprobe: Option<PathBuf>,
}

impl CliArgs {
    fn to_cli_config(&self) -> CliConfig {
        CliConfig {
            root_dir: self.root_dir.clone(),
            normalize_loudness: self.normalize_loudness,
            timeout_secs: self.timeout_secs,
            overwrite_existing: self.overwrite_existing,
            audio_format: self.audio_format,
            bare_tokens: self.bare_tokens,
            max_retries: self.max_retries,
            write_id3_tags: !self.no_id3_tags,
            update_description: !self.no_update_description,
            fix_permissions: self.fix_permissions,
            yt_dlp: self.yt_dlp.clone(),
            rsgain: self.rsgain.clone(),
            ffprobe: self.ffprobe.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli_args = CliArgs::parse();

    // Logs go to stderr, the summary to stdout
    let init = tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init();
    if let Err(e) = init {
        eprintln!("Failed to initialize logging: {}", e);
    }

    match run(cli_args).await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            error!("{:#}", e);
            print_error(&format!("{:#}", e));
            ExitCode::from(EXIT_SETUP_ERROR)
        }
    }
}

async fn run(cli_args: CliArgs) -> Result<u8> {
    let file_config = match &cli_args.config {
        Some(path) => {
            info!("Loading config from {:?}", path);
            Some(FileConfig::load(path)?)
        }
        None => None,
    };
    let mut config = AppConfig::resolve(&cli_args.to_cli_config(), file_config)?;

    if !check_available(&config.tools.yt_dlp, "--version").await {
        bail!(
            "yt-dlp is required but {:?} could not be run",
            config.tools.yt_dlp
        );
    }
    if config.normalize_loudness && !check_available(&config.tools.rsgain, "--version").await {
        let message = format!(
            "rsgain not available at {:?}, loudness normalization disabled",
            config.tools.rsgain
        );
        warn!("{}", message);
        print_warning(&message);
        config.normalize_loudness = false;
    }
    let prober: Option<Arc<dyn MediaProber>> =
        if check_available(&config.tools.ffprobe, "-version").await {
            Some(Arc::new(FfProbe::new(&config.tools.ffprobe, config.timeout())))
        } else {
            info!("ffprobe not available, durations will not be reported");
            None
        };

    let orchestrator = DownloadOrchestrator::new(
        Arc::new(YtDlp::new(&config.tools.yt_dlp)),
        prober,
        config.download_settings(),
    );
    let post_processor = config.normalize_loudness.then(|| {
        PostProcessor::new(Arc::new(Rsgain::new(&config.tools.rsgain, config.timeout())))
    });
    let runner = BatchRunner::new(orchestrator, post_processor, config.batch_settings());

    let cancel = CancellationToken::new();
    let ctrl_c_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl+C, stopping after the current song");
            ctrl_c_token.cancel();
        }
    });

    info!("Processing songs in {:?}", config.root_dir);
    let outcomes = runner
        .run(&config.root_dir, &cancel)
        .await
        .with_context(|| format!("Cannot process song library {:?}", config.root_dir))?;

    print_summary(&outcomes);
    Ok(exit_code(&outcomes))
}
