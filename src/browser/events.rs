use serde::{Deserialize, Serialize};

/// Network-level event emitted by a browser session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BrowserEvent {
    /// The target page finished its initial load
    PageLoaded {
        #[serde(default)]
        url: Option<String>,
    },

    /// A response was received for some request issued by the page
    Response(ResponseEvent),

    /// Unknown event type (for forward compatibility with drivers)
    #[serde(other)]
    Unknown,
}

impl BrowserEvent {
    pub fn response(url: impl Into<String>, status: u16) -> Self {
        BrowserEvent::Response(ResponseEvent {
            url: url.into(),
            status: Some(status),
            mime_type: None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseEvent {
    pub url: String,
    #[serde(default)]
    pub status: Option<u16>,
    #[serde(default)]
    pub mime_type: Option<String>,
}
