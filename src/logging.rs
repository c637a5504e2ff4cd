//! Human-readable `tracing` output for binaries embedding the runtime.
//!
//! The filter comes from `RUST_LOG` when set, `info` otherwise. Output is
//! compact, without timestamps (the device log collector adds them), on stderr.

use tracing_subscriber::{
    EnvFilter,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

/// Installs the global subscriber.
///
/// Returns `false` if one was already installed; the existing one is kept.
pub fn init() -> bool {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_span_events(FmtSpan::CLOSE)
                .event_format(fmt::format().compact().with_target(false).without_time()),
        )
        .try_init()
        .is_ok()
}
