//! Host simulation of a device keeping its cloud session alive.
//!
//! ```text
//! cargo run --example device
//! CLOUDLINK_BACKOFF_INITIAL_SECONDS=1 RUST_LOG=debug cargo run --example device
//! ```
//!
//! The simulated broker refuses roughly half of the connect attempts, the link
//! drops once midway and comes back, and telemetry is produced every second.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use cloudlink::{
    CloudClient, Config, ConnectOutcome, LogWriter, NetworkEvent, Payload, RuntimeBuilder,
    SendError, SendFlags, Subscribe,
};

/// Broker that flips a coin on every connect.
#[derive(Default)]
struct FlakyBroker {
    sent: AtomicU32,
}

#[async_trait]
impl CloudClient for FlakyBroker {
    async fn connect(&self) -> ConnectOutcome {
        tokio::time::sleep(Duration::from_millis(200)).await;
        if rand::random_bool(0.5) {
            ConnectOutcome::Success
        } else {
            ConnectOutcome::RetryableFailure("broker busy".into())
        }
    }

    async fn disconnect(&self) {
        tracing::info!("broker session closed");
    }

    async fn send(&self, bytes: &[u8], flags: SendFlags) -> Result<(), SendError> {
        let n = self.sent.fetch_add(1, Ordering::Relaxed) + 1;
        tracing::info!(n, len = bytes.len(), %flags, "broker received telemetry");
        Ok(())
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    cloudlink::logging::init();

    let cfg = Config::from_env()?;
    tracing::info!(?cfg, "configuration loaded");

    let runtime = RuntimeBuilder::new(cfg, Arc::new(FlakyBroker::default()))
        .with_subscribers(vec![Arc::new(LogWriter) as Arc<dyn Subscribe>])
        .build()?;
    let bus = runtime.bus().clone();
    let token = runtime.shutdown_token();

    tokio::spawn(async move {
        bus.network.publish(NetworkEvent::Connected);
        for tick in 1..=60u32 {
            tokio::time::sleep(Duration::from_secs(1)).await;
            bus.payload
                .publish(Payload::from(format!("uptime={tick}").into_bytes()));
            match tick {
                30 => bus.network.publish(NetworkEvent::Disconnected),
                35 => bus.network.publish(NetworkEvent::Connected),
                _ => 0,
            };
        }
        token.cancel();
    });

    runtime.run().await?;
    Ok(())
}
