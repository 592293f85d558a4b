use std::collections::HashMap;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use futures::stream::{self, StreamExt};
use reqwest::Client;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::fetch::error::{FetchError, FetchFailureReason};
use crate::tile::{canonical_file_name, TileRecord};

/// Prefix of in-flight downloads inside the cache directory
pub const PARTIAL_PREFIX: &str = ".partial-";

#[derive(Debug, Clone)]
pub struct FetchOptions {
    /// Maximum number of requests in flight
    pub concurrency: usize,
    pub request_timeout: Duration,
    pub user_agent: String,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            concurrency: 4,
            request_timeout: Duration::from_secs(30),
            user_agent: format!("tilestitch/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// How a URL came to be satisfied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchSource {
    /// Downloaded in this run
    Downloaded { bytes: usize },
    /// Already present in the cache, no request issued
    Cache,
}

#[derive(Debug, Clone, Serialize)]
pub struct FetchedFile {
    pub url: String,
    pub local_path: PathBuf,
    pub source: FetchSource,
}

impl FetchedFile {
    /// Tile record for this file, if its name carries tile geometry
    pub fn tile_record(&self) -> Option<TileRecord> {
        let cache_dir = self.local_path.parent()?;
        TileRecord::for_url(&self.url, cache_dir).map(TileRecord::mark_fetched)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FetchFailure {
    pub url: String,
    pub reason: FetchFailureReason,
}

/// Outcome of a fetch batch
#[derive(Debug, Clone, Default, Serialize)]
pub struct FetchReport {
    /// URLs with a local copy, in input order
    pub succeeded: Vec<FetchedFile>,
    pub failed: Vec<FetchFailure>,
    /// URLs not attempted because the batch was cancelled
    pub cancelled: Vec<String>,
}

impl FetchReport {
    pub fn downloaded_count(&self) -> usize {
        self.succeeded
            .iter()
            .filter(|f| matches!(f.source, FetchSource::Downloaded { .. }))
            .count()
    }

    pub fn cached_count(&self) -> usize {
        self.succeeded
            .iter()
            .filter(|f| f.source == FetchSource::Cache)
            .count()
    }

    pub fn is_complete(&self) -> bool {
        self.failed.is_empty() && self.cancelled.is_empty()
    }

    pub fn tile_records(&self) -> Vec<TileRecord> {
        self.succeeded
            .iter()
            .filter_map(FetchedFile::tile_record)
            .collect()
    }
}

/// One download, shared by every URL that maps to its file
struct Job {
    url: String,
    path: PathBuf,
}

/// How an input URL is settled once the downloads are done
#[derive(Debug, PartialEq, Eq)]
enum Slot {
    Invalid(String),
    /// Owns the download at this job index
    Primary(usize),
    /// Takes the outcome of another URL's download
    Duplicate { url: String, job: usize },
}

#[derive(Clone)]
enum Outcome {
    Done(FetchedFile),
    Failed(FetchFailure),
    Cancelled(String),
}

impl Outcome {
    /// The same outcome, reported for `url`.
    ///
    /// A successful download counts as a cache hit for the other URLs.
    fn for_duplicate(&self, url: &str) -> Outcome {
        match self {
            Outcome::Done(file) => Outcome::Done(FetchedFile {
                url: url.to_string(),
                local_path: file.local_path.clone(),
                source: FetchSource::Cache,
            }),
            Outcome::Failed(failure) => Outcome::Failed(FetchFailure {
                url: url.to_string(),
                reason: failure.reason.clone(),
            }),
            Outcome::Cancelled(_) => Outcome::Cancelled(url.to_string()),
        }
    }
}

/// Downloads tiles into a flat cache directory
///
/// The cache directory is only ever written through this type. A file that
/// already exists is never requested again.
pub struct TileFetcher {
    client: Client,
    cache_dir: PathBuf,
    concurrency: usize,
    cancel: CancellationToken,
}

impl TileFetcher {
    pub fn new(cache_dir: impl Into<PathBuf>, options: FetchOptions) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(options.request_timeout)
            .user_agent(options.user_agent)
            .build()?;
        Ok(Self {
            client,
            cache_dir: cache_dir.into(),
            concurrency: options.concurrency.max(1),
            cancel: CancellationToken::new(),
        })
    }

    /// Stop starting new downloads when `cancel` fires
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Ensure every URL has a cached copy.
    ///
    /// Per-URL problems land in the report; only an unusable cache directory
    /// fails the whole batch.
    pub async fn fetch_all(&self, urls: &[String]) -> Result<FetchReport, FetchError> {
        std::fs::create_dir_all(&self.cache_dir).map_err(|source| FetchError::CacheDir {
            path: self.cache_dir.clone(),
            source,
        })?;

        let (jobs, slots) = self.plan(urls);
        let outcomes: Vec<Outcome> = stream::iter(jobs)
            .map(|job| self.run_job(job))
            .buffered(self.concurrency)
            .collect()
            .await;

        let mut report = FetchReport::default();
        for slot in slots {
            let outcome = match slot {
                Slot::Invalid(url) => {
                    tracing::warn!(url = %url, "Skipping URL without a file name");
                    Outcome::Failed(FetchFailure {
                        url,
                        reason: FetchFailureReason::InvalidUrl,
                    })
                }
                Slot::Primary(job) => outcomes[job].clone(),
                Slot::Duplicate { url, job } => outcomes[job].for_duplicate(&url),
            };
            match outcome {
                Outcome::Done(file) => report.succeeded.push(file),
                Outcome::Failed(failure) => report.failed.push(failure),
                Outcome::Cancelled(url) => report.cancelled.push(url),
            }
        }

        tracing::info!(
            downloaded = report.downloaded_count(),
            cached = report.cached_count(),
            failed = report.failed.len(),
            cancelled = report.cancelled.len(),
            "Tile fetch finished"
        );
        Ok(report)
    }

    /// Map URLs to cache files, giving each file a single writer
    fn plan(&self, urls: &[String]) -> (Vec<Job>, Vec<Slot>) {
        let mut jobs = Vec::new();
        let mut by_name: HashMap<String, usize> = HashMap::new();
        let slots: Vec<Slot> = urls
            .iter()
            .map(|url| {
                let Some(name) = canonical_file_name(url) else {
                    return Slot::Invalid(url.clone());
                };
                if let Some(&job) = by_name.get(&name) {
                    return Slot::Duplicate {
                        url: url.clone(),
                        job,
                    };
                }
                let job = jobs.len();
                jobs.push(Job {
                    url: url.clone(),
                    path: self.cache_dir.join(&name),
                });
                by_name.insert(name, job);
                Slot::Primary(job)
            })
            .collect();
        (jobs, slots)
    }

    async fn run_job(&self, job: Job) -> Outcome {
        let Job { url, path } = job;
        if self.cancel.is_cancelled() {
            return Outcome::Cancelled(url);
        }
        match self.fetch_one(&url, &path).await {
            Ok(source) => Outcome::Done(FetchedFile {
                url,
                local_path: path,
                source,
            }),
            Err(reason) => {
                tracing::warn!(url = %url, reason = %reason, "Tile download failed");
                Outcome::Failed(FetchFailure { url, reason })
            }
        }
    }

    async fn fetch_one(&self, url: &str, path: &Path) -> Result<FetchSource, FetchFailureReason> {
        if tokio::fs::try_exists(path).await.unwrap_or(false) {
            tracing::debug!(path = %path.display(), "Tile already cached");
            return Ok(FetchSource::Cache);
        }

        tracing::info!(url = %url, "Downloading tile");
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchFailureReason::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchFailureReason::HttpStatus(status.as_u16()));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| FetchFailureReason::Transport(e.to_string()))?;
        let bytes = body.len();

        let cache_dir = self.cache_dir.clone();
        let target = path.to_path_buf();
        let written = tokio::task::spawn_blocking(move || persist_tile(&cache_dir, &target, &body))
            .await
            .map_err(|e| FetchFailureReason::Io(e.to_string()))?
            .map_err(|e| FetchFailureReason::Io(e.to_string()))?;

        if written {
            Ok(FetchSource::Downloaded { bytes })
        } else {
            tracing::debug!(path = %path.display(), "Tile written concurrently by another fetcher");
            Ok(FetchSource::Cache)
        }
    }
}

/// Write `body` to `path` via a temp file and a no-clobber rename.
///
/// Returns `Ok(false)` when `path` appeared in the meantime; the existing file
/// is left untouched.
fn persist_tile(cache_dir: &Path, path: &Path, body: &[u8]) -> io::Result<bool> {
    let mut tmp = tempfile::Builder::new()
        .prefix(PARTIAL_PREFIX)
        .tempfile_in(cache_dir)?;
    tmp.write_all(body)?;
    tmp.as_file().sync_all()?;

    match tmp.persist_noclobber(path) {
        Ok(_) => Ok(true),
        Err(e) if e.error.kind() == io::ErrorKind::AlreadyExists => Ok(false),
        Err(e) => Err(e.error),
    }
}
