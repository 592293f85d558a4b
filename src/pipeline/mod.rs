//! Observe, fetch, compose
//!
//! Each phase completes before the next starts. The browser session is closed
//! as soon as observation ends, and nothing touches the cache or the output
//! when discovery finds no tiles.

pub mod error;
pub mod url_list;

use chrono::{DateTime, Utc};
use reqwest::Url;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::browser::BrowserSession;
use crate::config::Config;
use crate::fetch::{FetchReport, TileFetcher};
use crate::mosaic::{compose, ComposeReport};
use crate::observe::{Observation, Observer};

pub use error::PipelineError;
pub use url_list::{read_url_list, write_url_list};

/// Everything a full run did, for reporting
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub target: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub observation: Observation,
    pub fetch: FetchReport,
    pub compose: ComposeReport,
}

pub struct Pipeline {
    config: Config,
    cancel: CancellationToken,
}

impl Pipeline {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            cancel: CancellationToken::new(),
        }
    }

    /// Abort between phases and between tile fetches when `cancel` fires
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn check_cancelled(&self) -> Result<(), PipelineError> {
        if self.cancel.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }
        Ok(())
    }

    /// Open `session` on `target` and collect tile URLs.
    ///
    /// Fails with [`PipelineError::DiscoveryEmpty`] when no tile was seen.
    pub async fn discover(
        &self,
        session: &dyn BrowserSession,
        target: &Url,
    ) -> Result<Observation, PipelineError> {
        tracing::info!(session = session.name(), target = %target, "Opening browser session");
        let mut handle = session.open(target).await?;

        let observation = Observer::new(self.config.observe)
            .with_cancellation(self.cancel.clone())
            .observe(&mut handle)
            .await;
        handle.close().await;

        self.check_cancelled()?;
        if observation.is_empty() {
            return Err(PipelineError::DiscoveryEmpty);
        }
        if observation.has_prefix_mismatch() {
            tracing::warn!(
                prefix = %observation.prefix.as_ref().map(|p| p.as_str()).unwrap_or("-"),
                others = ?observation.foreign_prefixes,
                "Collected tiles span more than one tile set"
            );
        }
        Ok(observation)
    }

    /// Download `urls` into the configured cache
    pub async fn fetch(&self, urls: &[String]) -> Result<FetchReport, PipelineError> {
        let fetcher = TileFetcher::new(&self.config.cache_dir, self.config.fetch.clone())?
            .with_cancellation(self.cancel.clone());
        let report = fetcher.fetch_all(urls).await?;
        self.check_cancelled()?;
        Ok(report)
    }

    /// Compose the configured cache into the configured output
    pub async fn compose(&self) -> Result<ComposeReport, PipelineError> {
        let cache_dir = self.config.cache_dir.clone();
        let output = self.config.output.clone();
        let options = self.config.compose;

        let report = tokio::task::spawn_blocking(move || compose(&cache_dir, &output, &options))
            .await
            .map_err(|e| PipelineError::Internal(format!("compose task failed: {e}")))??;
        Ok(report)
    }

    /// Full run: discover, fetch, compose
    pub async fn run(
        &self,
        session: &dyn BrowserSession,
        target: &Url,
    ) -> Result<RunSummary, PipelineError> {
        let started_at = Utc::now();

        let observation = self.discover(session, target).await?;
        tracing::info!(
            prefix = %observation.prefix.as_ref().map(|p| p.as_str()).unwrap_or("-"),
            tiles = observation.urls.len(),
            "Discovery complete"
        );

        let fetch = self.fetch(&observation.urls).await?;
        for failure in &fetch.failed {
            tracing::warn!(url = %failure.url, reason = %failure.reason, "Tile missing from mosaic");
        }

        let compose = self.compose().await?;

        Ok(RunSummary {
            target: target.to_string(),
            started_at,
            finished_at: Utc::now(),
            observation,
            fetch,
            compose,
        })
    }
}
