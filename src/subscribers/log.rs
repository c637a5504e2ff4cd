//! # LogWriter: observer that turns events into `tracing` records.
//!
//! ```text
//! INFO  cloud status   status=ready
//! WARN  runtime error  source=transport.send reason="queue full" kind=recoverable
//! ERROR runtime error  source=transport.connect reason="certificate rejected" kind=fatal
//! ```

use async_trait::async_trait;

use crate::events::{Event, ErrorKind};
use crate::subscribers::Subscribe;

/// Logs every cloud status change and error event.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogWriter;

impl LogWriter {
    /// Creates a writer; equivalent to `LogWriter` or `LogWriter::default()`.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        match e {
            Event::Cloud(status) => {
                tracing::info!(status = status.as_label(), "cloud status");
            }
            Event::Error(err) => match err.kind {
                ErrorKind::Fatal => {
                    tracing::error!(source = err.source, reason = %err.reason, kind = "fatal", "runtime error");
                }
                ErrorKind::Recoverable => {
                    tracing::warn!(source = err.source, reason = %err.reason, kind = "recoverable", "runtime error");
                }
            },
        }
    }

    fn name(&self) -> &'static str {
        "log-writer"
    }
}
