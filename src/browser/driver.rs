//! Out-of-process browser driver
//!
//! The driver is any program that loads a page in a real browser and prints
//! one [`BrowserEvent`] per line on stdout, for example a small Playwright
//! script:
//!
//! ```text
//! {"type":"response","url":"https://host/tiles/<prefix>-0-0-256-256","status":200}
//! {"type":"page_loaded","url":"https://host/map"}
//! ```
//!
//! The driver keeps running until it is killed; the observer decides how long
//! to listen.

use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use reqwest::Url;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;

use crate::browser::error::SessionError;
use crate::browser::events::BrowserEvent;
use crate::browser::session::{BrowserSession, SessionHandle, EVENT_CHANNEL_CAPACITY};
use crate::browser::stream::JsonlStreamParser;

/// Argument placeholder replaced by the target URL
pub const URL_PLACEHOLDER: &str = "{url}";

pub struct DriverSession {
    binary_path: PathBuf,
    args: Vec<String>,
}

impl DriverSession {
    /// Resolve `command` on `PATH` (or as a path) and remember its arguments
    pub fn new(command: &str, args: Vec<String>) -> Result<Self, SessionError> {
        let binary_path =
            which::which(command).map_err(|_| SessionError::BinaryNotFound(command.to_string()))?;
        Ok(Self { binary_path, args })
    }

    /// Arguments with the target substituted in
    fn resolve_args(&self, target: &Url) -> Vec<String> {
        let mut args: Vec<String> = self
            .args
            .iter()
            .map(|arg| arg.replace(URL_PLACEHOLDER, target.as_str()))
            .collect();
        if !self.args.iter().any(|arg| arg.contains(URL_PLACEHOLDER)) {
            args.push(target.to_string());
        }
        args
    }

    fn build_command(&self, target: &Url) -> Command {
        let mut cmd = Command::new(&self.binary_path);
        cmd.args(self.resolve_args(target));

        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.kill_on_drop(true);

        cmd
    }
}

#[async_trait]
impl BrowserSession for DriverSession {
    fn name(&self) -> &'static str {
        "driver"
    }

    async fn open(&self, target: &Url) -> Result<SessionHandle, SessionError> {
        let mut child = self
            .build_command(target)
            .spawn()
            .map_err(SessionError::SpawnFailed)?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| SessionError::OpenFailed("driver stdout not captured".into()))?;
        let stderr = child.stderr.take();

        tracing::info!(
            driver = %self.binary_path.display(),
            pid = ?child.id(),
            target = %target,
            "Started browser driver"
        );

        let (tx, rx) = mpsc::channel::<BrowserEvent>(EVENT_CHANNEL_CAPACITY);

        tokio::spawn(async move {
            match JsonlStreamParser::parse_stream(stdout, tx).await {
                Ok(stats) => tracing::debug!(
                    events = stats.forwarded,
                    malformed = stats.malformed,
                    "Driver stdout closed"
                ),
                Err(e) => tracing::warn!(error = %e, "Driver stream failed"),
            }
        });

        if let Some(stderr) = stderr {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    tracing::debug!(target: "tilestitch::driver", "{line}");
                }
            });
        }

        Ok(SessionHandle::new(rx).with_child(child))
    }
}
