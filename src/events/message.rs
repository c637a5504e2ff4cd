//! # Messages carried by the bus.
//!
//! ## Example
//! ```rust
//! use cloudlink::{ErrorEvent, ErrorKind, Payload};
//!
//! let p = Payload::from("{\"temp\": 21.5}");
//! assert_eq!(p.len(), 14);
//!
//! let e = ErrorEvent::recoverable("transport.send", "socket closed");
//! assert_eq!(e.kind, ErrorKind::Recoverable);
//! assert_eq!(e.source, "transport.send");
//! ```

use std::fmt;
use std::sync::Arc;
use std::time::SystemTime;

/// Link-layer availability change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkEvent {
    /// The link came up.
    Connected,
    /// The link went down.
    Disconnected,
}

/// Outward-facing connectivity status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloudEvent {
    /// No cloud session.
    Disconnected,
    /// Session established; payloads are forwarded.
    Ready,
    /// Session was ready but the link dropped; waiting for the link to return.
    Paused,
}

impl CloudEvent {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            CloudEvent::Disconnected => "disconnected",
            CloudEvent::Ready => "ready",
            CloudEvent::Paused => "paused",
        }
    }
}

/// Application data to forward to the cloud.
///
/// Immutable once built; clones share the same buffer, so publishing to several
/// receivers never copies the bytes.
#[derive(Clone, PartialEq, Eq)]
pub struct Payload {
    buffer: Arc<[u8]>,
}

impl Payload {
    /// Wraps a byte buffer.
    pub fn new(buffer: impl Into<Arc<[u8]>>) -> Self {
        Self {
            buffer: buffer.into(),
        }
    }

    /// The payload bytes.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    /// Length in bytes.
    #[inline]
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// True for a zero-length payload.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Payload").field("len", &self.len()).finish()
    }
}

impl From<&[u8]> for Payload {
    fn from(bytes: &[u8]) -> Self {
        Self::new(bytes)
    }
}

impl From<Vec<u8>> for Payload {
    fn from(bytes: Vec<u8>) -> Self {
        Self::new(bytes)
    }
}

impl From<&str> for Payload {
    fn from(text: &str) -> Self {
        Self::new(text.as_bytes())
    }
}

/// Severity of a fault report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Terminates the process through the fault escalator.
    Fatal,
    /// Logged only.
    Recoverable,
}

/// Fault report published on the `error` channel.
#[derive(Debug, Clone)]
pub struct ErrorEvent {
    /// Severity.
    pub kind: ErrorKind,
    /// Component that detected the fault (`transport.connect`, `transport.send`, `watchdog`).
    pub source: &'static str,
    /// Human-readable detail.
    pub reason: Arc<str>,
    /// Wall-clock timestamp.
    pub at: SystemTime,
}

impl ErrorEvent {
    /// Creates a fatal report.
    pub fn fatal(source: &'static str, reason: impl Into<Arc<str>>) -> Self {
        Self::new(ErrorKind::Fatal, source, reason)
    }

    /// Creates a recoverable report.
    pub fn recoverable(source: &'static str, reason: impl Into<Arc<str>>) -> Self {
        Self::new(ErrorKind::Recoverable, source, reason)
    }

    fn new(kind: ErrorKind, source: &'static str, reason: impl Into<Arc<str>>) -> Self {
        Self {
            kind,
            source,
            reason: reason.into(),
            at: SystemTime::now(),
        }
    }

    /// True for [`ErrorKind::Fatal`].
    #[inline]
    pub fn is_fatal(&self) -> bool {
        matches!(self.kind, ErrorKind::Fatal)
    }
}

/// Outbound traffic as seen by observers.
#[derive(Debug, Clone)]
pub enum Event {
    /// A `cloud-status` message.
    Cloud(CloudEvent),
    /// An `error` message.
    Error(ErrorEvent),
}

impl From<CloudEvent> for Event {
    fn from(ev: CloudEvent) -> Self {
        Event::Cloud(ev)
    }
}

impl From<ErrorEvent> for Event {
    fn from(ev: ErrorEvent) -> Self {
        Event::Error(ev)
    }
}
