use serde::de::DeserializeOwned;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::mpsc;

use crate::browser::error::SessionError;

/// Line counts from one driver output stream
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamStats {
    pub forwarded: usize,
    pub malformed: usize,
}

/// Reads newline-delimited JSON events from a driver process
pub struct JsonlStreamParser;

impl JsonlStreamParser {
    /// Decode each line of `reader` and push it into `tx`.
    ///
    /// A line that does not decode is logged and dropped. Stops at EOF or once
    /// the observer has hung up.
    pub async fn parse_stream<R, T>(reader: R, tx: mpsc::Sender<T>) -> Result<StreamStats, SessionError>
    where
        R: AsyncRead + Unpin,
        T: DeserializeOwned + Send + 'static,
    {
        let mut lines = BufReader::new(reader).lines();
        let mut stats = StreamStats::default();

        while let Some(line) = lines.next_line().await? {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            tracing::trace!(line, "Driver output");

            let event = match serde_json::from_str::<T>(line) {
                Ok(event) => event,
                Err(e) => {
                    stats.malformed += 1;
                    tracing::warn!(error = %e, line, "Ignoring malformed driver event");
                    continue;
                }
            };
            if tx.send(event).await.is_err() {
                tracing::debug!("Event receiver closed, dropping remaining driver output");
                break;
            }
            stats.forwarded += 1;
        }

        Ok(stats)
    }
}
