//! Tile discovery from page network traffic
//!
//! There is no tile index to download, so tiles are found by watching what the
//! page requests. [`Observer::observe`] drains a session's event channel until
//! its deadline and returns what it saw as an [`Observation`].

use std::collections::{BTreeSet, HashSet};
use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::Url;
use serde::Serialize;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::browser::{BrowserEvent, SessionHandle};
use crate::tile::{parse_wire_name, SessionPrefix, TileIdentity};

/// Path fragment every tile URL contains
const TILES_PATH_MARKER: &str = "/tiles/";

/// Classify a response URL as a tile response.
///
/// The URL path must contain `/tiles/` and its last segment must be a bare
/// tile name (`<prefix>-<x>-<y>-<w>-<h>`, no extension).
pub fn classify_tile_url(url: &str) -> Option<TileIdentity> {
    let parsed = Url::parse(url).ok()?;
    if !parsed.path().contains(TILES_PATH_MARKER) {
        return None;
    }
    let last = parsed.path_segments()?.last()?;
    parse_wire_name(last)
}

/// What [`TileDiscovery::record`] did with a URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Discovered {
    /// Not a tile response
    Ignored,
    /// Already collected
    Duplicate,
    /// New tile URL under the run's prefix
    Added,
    /// New tile URL under a different prefix than the first one seen
    AddedForeign,
}

/// Accumulator for one discovery run
#[derive(Debug, Default)]
pub struct TileDiscovery {
    prefix: Option<SessionPrefix>,
    urls: Vec<String>,
    seen: HashSet<String>,
    foreign_prefixes: BTreeSet<String>,
    responses_seen: usize,
}

impl TileDiscovery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one response URL through the tile filter
    pub fn record(&mut self, url: &str) -> Discovered {
        self.responses_seen += 1;

        let Some(identity) = classify_tile_url(url) else {
            return Discovered::Ignored;
        };
        if !self.seen.insert(url.to_string()) {
            return Discovered::Duplicate;
        }
        self.urls.push(url.to_string());

        match &self.prefix {
            None => {
                tracing::info!(prefix = %identity.prefix, "Tile prefix found");
                self.prefix = Some(identity.prefix);
                Discovered::Added
            }
            Some(prefix) if *prefix == identity.prefix => Discovered::Added,
            Some(prefix) => {
                if self.foreign_prefixes.insert(identity.prefix.to_string()) {
                    tracing::warn!(
                        prefix = %prefix,
                        other = %identity.prefix,
                        url = %url,
                        "Tiles observed under more than one prefix"
                    );
                }
                Discovered::AddedForeign
            }
        }
    }

    pub fn prefix(&self) -> Option<&SessionPrefix> {
        self.prefix.as_ref()
    }

    pub fn urls(&self) -> &[String] {
        &self.urls
    }
}

/// Result of watching a session
#[derive(Debug, Clone, Serialize)]
pub struct Observation {
    /// Prefix of the first tile seen
    pub prefix: Option<SessionPrefix>,
    /// Tile URLs in first-seen order, without duplicates
    pub urls: Vec<String>,
    /// Prefixes seen after the first one (advisory)
    pub foreign_prefixes: BTreeSet<String>,
    /// Number of responses inspected, tiles or not
    pub responses_seen: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl Observation {
    /// True when no tile traffic was seen at all
    pub fn is_empty(&self) -> bool {
        self.prefix.is_none() || self.urls.is_empty()
    }

    /// True when tiles from more than one tile set were collected
    pub fn has_prefix_mismatch(&self) -> bool {
        !self.foreign_prefixes.is_empty()
    }
}

/// Timing of an observation
#[derive(Debug, Clone, Copy)]
pub struct ObserveOptions {
    /// How long to keep listening once the page has loaded
    pub window: Duration,
    /// Upper bound on waiting for the page load event
    pub navigation_timeout: Duration,
}

impl Default for ObserveOptions {
    fn default() -> Self {
        Self {
            window: Duration::from_secs(15),
            navigation_timeout: Duration::from_secs(60),
        }
    }
}

/// Why an observation stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StopReason {
    Deadline,
    SessionClosed,
    Cancelled,
}

pub struct Observer {
    options: ObserveOptions,
    cancel: CancellationToken,
}

impl Observer {
    pub fn new(options: ObserveOptions) -> Self {
        Self {
            options,
            cancel: CancellationToken::new(),
        }
    }

    /// Stop observing early when `cancel` fires
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Drain `handle` until the observation window closes.
    ///
    /// The window starts at the page load event. Until that arrives the
    /// navigation timeout bounds the wait, so a page that never reports a
    /// load still terminates.
    pub async fn observe(&self, handle: &mut SessionHandle) -> Observation {
        let started_at = Utc::now();
        let mut discovery = TileDiscovery::new();
        let mut deadline = Instant::now() + self.options.navigation_timeout;
        let mut page_loaded = false;

        let reason = loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break StopReason::Cancelled,
                _ = tokio::time::sleep_until(deadline) => break StopReason::Deadline,
                event = handle.events.recv() => match event {
                    None => break StopReason::SessionClosed,
                    Some(BrowserEvent::PageLoaded { url }) => {
                        if !page_loaded {
                            page_loaded = true;
                            deadline = Instant::now() + self.options.window;
                            tracing::info!(
                                url = url.as_deref().unwrap_or("-"),
                                window_secs = self.options.window.as_secs_f64(),
                                "Page loaded, watching tile traffic"
                            );
                        }
                    }
                    Some(BrowserEvent::Response(response)) => {
                        if discovery.record(&response.url) != Discovered::Ignored {
                            tracing::debug!(url = %response.url, status = ?response.status, "Tile response");
                        }
                    }
                    Some(BrowserEvent::Unknown) => {}
                },
            }
        };

        if !page_loaded && reason == StopReason::Deadline {
            tracing::warn!(
                timeout_secs = self.options.navigation_timeout.as_secs_f64(),
                "Page never reported a load event"
            );
        }
        tracing::info!(
            reason = ?reason,
            tiles = discovery.urls.len(),
            responses = discovery.responses_seen,
            "Observation finished"
        );

        Observation {
            prefix: discovery.prefix,
            urls: discovery.urls,
            foreign_prefixes: discovery.foreign_prefixes,
            responses_seen: discovery.responses_seen,
            started_at,
            finished_at: Utc::now(),
        }
    }
}
