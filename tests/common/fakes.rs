//! In-process stand-ins for yt-dlp and rsgain

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use usdx_fetch::batch::{BatchRunner, BatchSettings, SongOutcome};
use usdx_fetch::description::BareTokenPolicy;
use usdx_fetch::fetch::{
    DownloadOrchestrator, DownloadSettings, FetchEngine, FetchError, FetchErrorKind, FetchRequest,
    RetryPolicy,
};
use usdx_fetch::post_process::{LoudnessTool, PostProcessor};
use usdx_fetch::process::ToolError;

use super::constants::{LOUDNESS_MARKER, MP3_BYTES};
use super::fixtures::SongLibrary;

/// What the fake engine does for one fetch call.
#[derive(Debug, Clone)]
pub enum FakeResponse {
    Produce {
        extension: &'static str,
        bytes: Vec<u8>,
    },
    /// Claims success but leaves an empty file.
    Empty,
    Fail(FetchErrorKind),
}

impl FakeResponse {
    pub fn mp3() -> Self {
        FakeResponse::Produce {
            extension: "mp3",
            bytes: MP3_BYTES.to_vec(),
        }
    }
}

/// Fetch engine writing canned artifacts into the staging directory.
///
/// Responses are queued per video id; an id with no queued response gets an MP3.
#[derive(Default)]
pub struct FakeFetchEngine {
    responses: Mutex<HashMap<String, VecDeque<FakeResponse>>>,
    calls: Mutex<Vec<String>>,
    cancel_on_call: Mutex<Option<(usize, CancellationToken)>>,
}

impl FakeFetchEngine {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn respond(&self, video_id: &str, response: FakeResponse) {
        self.responses
            .lock()
            .unwrap()
            .entry(video_id.to_string())
            .or_default()
            .push_back(response);
    }

    /// Fire `token` during the `call`-th fetch (1-based), which then reports interruption.
    pub fn cancel_on_call(&self, call: usize, token: CancellationToken) {
        *self.cancel_on_call.lock().unwrap() = Some((call, token));
    }

    /// Video ids fetched so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl FetchEngine for FakeFetchEngine {
    async fn fetch(
        &self,
        request: &FetchRequest,
        _cancel: &CancellationToken,
    ) -> Result<PathBuf, FetchError> {
        let call = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(request.video_id.clone());
            calls.len()
        };
        if let Some((at, token)) = self.cancel_on_call.lock().unwrap().as_ref() {
            if *at == call {
                token.cancel();
                return Err(FetchError::new(
                    FetchErrorKind::Interrupted,
                    "yt-dlp was interrupted",
                ));
            }
        }

        let response = self
            .responses
            .lock()
            .unwrap()
            .get_mut(&request.video_id)
            .and_then(|queue| queue.pop_front())
            .unwrap_or_else(FakeResponse::mp3);

        let write = |extension: &str, bytes: &[u8]| -> Result<PathBuf, FetchError> {
            let path = request
                .staging_dir
                .join(format!("{}.{}", request.file_stem, extension));
            fs::write(&path, bytes)
                .map_err(|e| FetchError::new(FetchErrorKind::Unknown, e.to_string()))?;
            Ok(path)
        };
        match response {
            FakeResponse::Produce { extension, bytes } => write(extension, &bytes),
            FakeResponse::Empty => write(request.audio_format.extension(), &[]),
            FakeResponse::Fail(kind) => Err(FetchError::new(
                kind,
                format!("ERROR: [youtube] {}: simulated {}", request.video_id, kind),
            )),
        }
    }
}

/// Loudness tool appending `LOUDNESS_MARKER` to the file, optionally failing afterwards.
#[derive(Default)]
pub struct FakeLoudnessTool {
    fail: bool,
    calls: Mutex<Vec<PathBuf>>,
}

impl FakeLoudnessTool {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// A tool that modifies the file it is given and then reports failure.
    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            fail: true,
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl LoudnessTool for FakeLoudnessTool {
    async fn apply(&self, path: &Path, _cancel: &CancellationToken) -> Result<(), ToolError> {
        self.calls.lock().unwrap().push(path.to_path_buf());
        let mut file = OpenOptions::new()
            .append(true)
            .open(path)
            .map_err(|source| ToolError::Spawn {
                program: "rsgain".to_string(),
                source,
            })?;
        file.write_all(LOUDNESS_MARKER)
            .map_err(|source| ToolError::Wait {
                program: "rsgain".to_string(),
                source,
            })?;
        if self.fail {
            return Err(ToolError::TimedOut {
                program: "rsgain".to_string(),
                timeout: Duration::from_secs(1),
            });
        }
        Ok(())
    }
}

/// Batch runner wired to fakes, with test-friendly settings.
pub struct TestBatch {
    pub engine: Arc<FakeFetchEngine>,
    loudness: Option<Arc<FakeLoudnessTool>>,
    download: DownloadSettings,
    settings: BatchSettings,
}

impl TestBatch {
    pub fn new(engine: Arc<FakeFetchEngine>) -> Self {
        Self {
            engine,
            loudness: None,
            download: DownloadSettings::default(),
            settings: BatchSettings {
                write_id3_tags: true,
                update_description: true,
                ..BatchSettings::default()
            },
        }
    }

    pub fn with_loudness(mut self, tool: Arc<FakeLoudnessTool>) -> Self {
        self.loudness = Some(tool);
        self
    }

    pub fn with_overwrite(mut self) -> Self {
        self.download.overwrite_existing = true;
        self
    }

    pub fn with_bare_tokens(mut self, policy: BareTokenPolicy) -> Self {
        self.settings.extractor.bare_tokens = policy;
        self
    }

    /// Retries without backoff for the given categories.
    pub fn with_retries(mut self, max_retries: u32, retry_on: Vec<FetchErrorKind>) -> Self {
        self.settings.retry = RetryPolicy {
            max_retries,
            initial_backoff_secs: 0,
            max_backoff_secs: 0,
            backoff_multiplier: 1.0,
            retry_on,
        };
        self
    }

    pub fn without_description_update(mut self) -> Self {
        self.settings.update_description = false;
        self
    }

    pub fn runner(&self) -> BatchRunner {
        let orchestrator =
            DownloadOrchestrator::new(self.engine.clone(), None, self.download.clone());
        let post_processor = self
            .loudness
            .clone()
            .map(|tool| PostProcessor::new(tool as Arc<dyn LoudnessTool>));
        BatchRunner::new(orchestrator, post_processor, self.settings.clone())
    }

    pub async fn run(&self, library: &SongLibrary) -> Vec<SongOutcome> {
        self.run_with_cancel(library, &CancellationToken::new()).await
    }

    pub async fn run_with_cancel(
        &self,
        library: &SongLibrary,
        cancel: &CancellationToken,
    ) -> Vec<SongOutcome> {
        self.runner()
            .run(library.root(), cancel)
            .await
            .expect("Library root should be readable")
    }
}
