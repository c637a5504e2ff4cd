//! # Single calls into the cloud client.
//!
//! Executes one `connect()` or one `send()` and logs its outcome. Classification
//! belongs to the client; this module only reports it.
//!
//! ```text
//! connect_once(attempt) ─► client.connect() ─► Success          (info)
//!                                            ─► RetryableFailure (warn)
//!                                            ─► FatalFailure     (error)
//!
//! send_once(payload)    ─► client.send(bytes, TELEMETRY) ─► Ok   (debug)
//!                                                        ─► Err  (warn)
//! ```

use tokio::time::Instant;

use crate::error::SendError;
use crate::events::Payload;
use crate::transport::{CloudClient, ConnectOutcome, SendFlags};

/// Runs one connect attempt; `attempt` is the number of retryable failures so far.
pub async fn connect_once(client: &dyn CloudClient, attempt: u32) -> ConnectOutcome {
    let started = Instant::now();
    let outcome = client.connect().await;
    let took = started.elapsed();

    match &outcome {
        ConnectOutcome::Success => {
            tracing::info!(attempt, ?took, "cloud session established");
        }
        ConnectOutcome::RetryableFailure(reason) => {
            tracing::warn!(attempt, ?took, %reason, "connect failed, will retry");
        }
        ConnectOutcome::FatalFailure(reason) => {
            tracing::error!(attempt, ?took, %reason, "connect failed fatally");
        }
    }
    outcome
}

/// Sends one payload as operational telemetry.
pub async fn send_once(client: &dyn CloudClient, payload: &Payload) -> Result<(), SendError> {
    let flags = SendFlags::TELEMETRY;
    match client.send(payload.as_bytes(), flags).await {
        Ok(()) => {
            tracing::debug!(len = payload.len(), %flags, "payload sent");
            Ok(())
        }
        Err(e) => {
            tracing::warn!(len = payload.len(), %flags, err = %e, "payload send failed");
            Err(e)
        }
    }
}
