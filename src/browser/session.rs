use async_trait::async_trait;
use reqwest::Url;
use tokio::process::Child;
use tokio::sync::mpsc;

use crate::browser::error::SessionError;
use crate::browser::events::BrowserEvent;

/// Capacity of the event channel between a session and its observer
pub const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Handle to an open browser session
///
/// Dropping the handle closes the session: the event receiver goes away and
/// any driver process owned by the handle is killed.
pub struct SessionHandle {
    /// Receiver for network events of the page
    pub events: mpsc::Receiver<BrowserEvent>,
    /// Process ID of the driver, when the session runs out of process
    pub pid: Option<u32>,
    child: Option<Child>,
}

impl SessionHandle {
    pub fn new(events: mpsc::Receiver<BrowserEvent>) -> Self {
        Self {
            events,
            pid: None,
            child: None,
        }
    }

    /// Attach a driver process whose lifetime is tied to this handle
    pub fn with_child(mut self, child: Child) -> Self {
        self.pid = child.id();
        self.child = Some(child);
        self
    }

    /// Close the session, terminating the driver if one is running
    pub async fn close(mut self) {
        self.events.close();
        if let Some(mut child) = self.child.take() {
            if let Err(e) = child.kill().await {
                tracing::debug!(pid = ?self.pid, error = %e, "Driver already exited");
            }
        }
    }
}

/// Source of page network events
///
/// Implementations navigate to the target and stream what the page loads.
#[async_trait]
pub trait BrowserSession: Send + Sync {
    /// Short identifier used in logs
    fn name(&self) -> &'static str;

    /// Open a session navigated to `target`
    async fn open(&self, target: &Url) -> Result<SessionHandle, SessionError>;
}
