//! Mock browser session for deterministic testing
//!
//! Implements [`BrowserSession`] by emitting pre-configured events instead of
//! driving a real browser. Use this for integration tests of discovery and
//! the full pipeline.
//!
//! # Example
//! ```no_run
//! use tilestitch::browser::mock::{MockEventBuilder, MockSession};
//!
//! let events = MockEventBuilder::new("http://127.0.0.1:8080")
//!     .tile("0123456789abcdef0123456789abcdef", 0, 0, 64, 64)
//!     .page_loaded()
//!     .build();
//! let session = MockSession::new().with_events(events);
//! ```

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::Url;
use tokio::sync::mpsc;

use crate::browser::error::SessionError;
use crate::browser::events::BrowserEvent;
use crate::browser::session::{BrowserSession, SessionHandle, EVENT_CHANNEL_CAPACITY};

/// Configuration for mock session behavior
#[derive(Clone, Default)]
pub struct MockConfig {
    /// Events to emit when opened
    pub events: Vec<BrowserEvent>,
    /// Delay between events (simulates network pacing)
    pub event_delay: Duration,
    /// Keep the event channel open after the last event, like a live browser
    pub keep_open: bool,
    /// Whether open() should fail
    pub fail_on_open: bool,
}

impl MockConfig {
    pub fn with_events(mut self, events: Vec<BrowserEvent>) -> Self {
        self.events = events;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.event_delay = delay;
        self
    }

    pub fn kept_open(mut self) -> Self {
        self.keep_open = true;
        self
    }

    pub fn failing(mut self) -> Self {
        self.fail_on_open = true;
        self
    }
}

/// Mock browser session for testing
#[derive(Clone, Default)]
pub struct MockSession {
    config: MockConfig,
    /// Targets passed to open(), for assertions
    opened: Arc<Mutex<Vec<Url>>>,
}

impl MockSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(mut self, config: MockConfig) -> Self {
        self.config = config;
        self
    }

    /// Configure events to emit (convenience method)
    pub fn with_events(mut self, events: Vec<BrowserEvent>) -> Self {
        self.config.events = events;
        self
    }

    /// Targets this session was opened with
    pub fn opened_targets(&self) -> Vec<Url> {
        self.opened.lock().clone()
    }
}

#[async_trait]
impl BrowserSession for MockSession {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn open(&self, target: &Url) -> Result<SessionHandle, SessionError> {
        self.opened.lock().push(target.clone());

        if self.config.fail_on_open {
            return Err(SessionError::OpenFailed("mock-failure".into()));
        }

        let (tx, rx) = mpsc::channel::<BrowserEvent>(EVENT_CHANNEL_CAPACITY);
        let events = self.config.events.clone();
        let delay = self.config.event_delay;
        let keep_open = self.config.keep_open;

        tokio::spawn(async move {
            for event in events {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                if tx.send(event).await.is_err() {
                    return;
                }
            }
            if keep_open {
                tx.closed().await;
            }
        });

        Ok(SessionHandle::new(rx))
    }
}

/// Builder for mock event sequences
pub struct MockEventBuilder {
    base_url: String,
    events: Vec<BrowserEvent>,
}

impl MockEventBuilder {
    /// `base_url` is the origin tile URLs are built under
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            events: Vec::new(),
        }
    }

    pub fn page_loaded(mut self) -> Self {
        self.events.push(BrowserEvent::PageLoaded {
            url: Some(format!("{}/", self.base_url)),
        });
        self
    }

    /// A successful response for an arbitrary path under the base URL
    pub fn response(mut self, path: &str) -> Self {
        self.events
            .push(BrowserEvent::response(format!("{}{}", self.base_url, path), 200));
        self
    }

    /// A tile response at `/tiles/<prefix>-<x>-<y>-<w>-<h>`
    pub fn tile(self, prefix: &str, x: u32, y: u32, width: u32, height: u32) -> Self {
        let path = format!("/tiles/{prefix}-{x}-{y}-{width}-{height}");
        self.response(&path)
    }

    pub fn build(self) -> Vec<BrowserEvent> {
        self.events
    }
}
