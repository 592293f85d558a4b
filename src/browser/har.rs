//! Replay of a recorded HAR file
//!
//! Lets a page visit captured with the browser's devtools ("Save all as HAR")
//! stand in for a live session.

use std::fs;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use reqwest::Url;
use serde::Deserialize;
use tokio::sync::mpsc;

use crate::browser::error::SessionError;
use crate::browser::events::{BrowserEvent, ResponseEvent};
use crate::browser::session::{BrowserSession, SessionHandle, EVENT_CHANNEL_CAPACITY};

#[derive(Debug, Deserialize)]
struct HarFile {
    log: HarLog,
}

#[derive(Debug, Deserialize)]
struct HarLog {
    #[serde(default)]
    entries: Vec<HarEntry>,
}

#[derive(Debug, Deserialize)]
struct HarEntry {
    request: HarRequest,
    #[serde(default)]
    response: Option<HarResponse>,
}

#[derive(Debug, Deserialize)]
struct HarRequest {
    url: String,
}

#[derive(Debug, Deserialize)]
struct HarResponse {
    #[serde(default)]
    status: Option<i64>,
    #[serde(default)]
    content: Option<HarContent>,
}

#[derive(Debug, Deserialize)]
struct HarContent {
    #[serde(rename = "mimeType", default)]
    mime_type: Option<String>,
}

impl HarEntry {
    fn into_event(self) -> BrowserEvent {
        let (status, mime_type) = match self.response {
            Some(resp) => (
                // HAR uses 0 (or -1) for requests that never got a response
                resp.status
                    .and_then(|s| u16::try_from(s).ok())
                    .filter(|s| *s > 0),
                resp.content.and_then(|c| c.mime_type),
            ),
            None => (None, None),
        };
        BrowserEvent::Response(ResponseEvent {
            url: self.request.url,
            status,
            mime_type,
        })
    }
}

pub struct HarSession {
    path: PathBuf,
}

impl HarSession {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load_events(&self) -> Result<Vec<BrowserEvent>, SessionError> {
        let contents = fs::read_to_string(&self.path)?;
        let har: HarFile = serde_json::from_str(&contents).map_err(|e| {
            SessionError::InvalidHar(format!("{}: {e}", self.path.display()))
        })?;
        Ok(har
            .log
            .entries
            .into_iter()
            .map(HarEntry::into_event)
            .collect())
    }
}

#[async_trait]
impl BrowserSession for HarSession {
    fn name(&self) -> &'static str {
        "har"
    }

    async fn open(&self, target: &Url) -> Result<SessionHandle, SessionError> {
        let events = self.load_events()?;
        tracing::info!(
            har = %self.path.display(),
            entries = events.len(),
            "Replaying HAR file"
        );

        let (tx, rx) = mpsc::channel::<BrowserEvent>(EVENT_CHANNEL_CAPACITY);
        let loaded = BrowserEvent::PageLoaded {
            url: Some(target.to_string()),
        };

        tokio::spawn(async move {
            for event in std::iter::once(loaded).chain(events) {
                if tx.send(event).await.is_err() {
                    break;
                }
            }
        });

        Ok(SessionHandle::new(rx))
    }
}
