//! # ConnectivityMachine: the single owner of connectivity state.
//!
//! Consumes `network` and `payload` messages one at a time, drives the cloud
//! client through connect / retry / disconnect, gates payload forwarding and
//! publishes every status change on `cloud-status`.
//!
//! ## Architecture
//! ```text
//! run(token)
//!   ├─► announce: publish CloudEvent::Disconnected (initial state)
//!   └─► loop {
//!         next message (network first when both are queued), fed while waiting
//!         ├─ Network(Connected)    in Disconnected/Paused ─► connect_sequence()
//!         ├─ Network(Disconnected) in Ready              ─► Paused
//!         ├─ Network(Disconnected) in Connecting         ─► disconnect(), Disconnected
//!         ├─ Payload               in Ready              ─► send(bytes, TELEMETRY)
//!         ├─ Payload               otherwise             ─► drop
//!         └─ anything else                               ─► ignore
//!       }
//!
//! connect_sequence()
//!   loop {
//!     ├─► connect_once()                       (fed for at most one liveness budget)
//!     ├─► drop payloads queued meanwhile       (they arrived while Connecting)
//!     ├─ Success          ─► Ready, publish Ready
//!     ├─ FatalFailure     ─► publish ErrorEvent::Fatal ─► FaultEscalator (no return)
//!     └─ RetryableFailure ─► delay = backoff.advance()
//!                            sleep(delay)      (fed, not interruptible)
//!                            queued Disconnected? ─► disconnect(), Disconnected, stop
//!   }
//! ```
//!
//! ## Rules
//! - Messages are handled strictly sequentially; nothing else mutates the state.
//! - A backoff sleep or client call is never interrupted; messages that arrive
//!   meanwhile are examined once it completes.
//! - A client call still pending after one liveness budget is no longer fed for,
//!   so a hung call ends in watchdog escalation.
//! - Backoff is reset only when a fresh sequence starts (`Disconnected|Paused → Connecting`).
//! - A status is published once per transition that changes it, never otherwise.

use std::sync::Arc;

use tokio::sync::broadcast::{
    self,
    error::{RecvError, TryRecvError},
};
use tokio::sync::watch;
use tokio::time;
use tokio_util::sync::CancellationToken;

use crate::core::attempt::{connect_once, send_once};
use crate::core::fault::{Fault, FaultEscalator};
use crate::core::liveness::LivenessReporter;
use crate::core::state::{BackoffState, ConnectivityState};
use crate::error::RuntimeError;
use crate::events::{Bus, ErrorEvent, NetworkEvent, Payload};
use crate::policies::BackoffPolicy;
use crate::transport::{CloudClient, ConnectOutcome};

/// One inbound message, or the end of the bus.
enum Inbound {
    Network(NetworkEvent),
    Payload(Payload),
    Closed,
}

/// Connectivity state machine.
///
/// ### Responsibilities
/// - **State**: sole owner of [`ConnectivityState`] and [`BackoffState`]
/// - **Sequencing**: connect, retry with backoff, abandon on link loss
/// - **Gating**: forwards payloads only while `Ready`
/// - **Liveness**: feeds the watchdog at every await point
/// - **Faults**: hands fatal transport failures to the [`FaultEscalator`]
pub struct ConnectivityMachine {
    client: Arc<dyn CloudClient>,
    backoff: BackoffPolicy,
    bus: Bus,
    network_rx: broadcast::Receiver<NetworkEvent>,
    payload_rx: broadcast::Receiver<Payload>,
    state: ConnectivityState,
    retry: BackoffState,
    state_tx: watch::Sender<ConnectivityState>,
    liveness: LivenessReporter,
    escalator: Arc<FaultEscalator>,
}

impl ConnectivityMachine {
    /// Creates the machine and subscribes it to `network` and `payload`.
    ///
    /// Messages published after this call are delivered to the machine even if
    /// [`run`](Self::run) has not started yet. The returned receiver mirrors the
    /// current state.
    pub fn new(
        client: Arc<dyn CloudClient>,
        backoff: BackoffPolicy,
        bus: &Bus,
        liveness: LivenessReporter,
        escalator: Arc<FaultEscalator>,
    ) -> (Self, watch::Receiver<ConnectivityState>) {
        let (state_tx, state_rx) = watch::channel(ConnectivityState::Disconnected);
        let machine = Self {
            client,
            backoff,
            bus: bus.clone(),
            network_rx: bus.network.subscribe(),
            payload_rx: bus.payload.subscribe(),
            state: ConnectivityState::Disconnected,
            retry: BackoffState::default(),
            state_tx,
            liveness,
            escalator,
        };
        (machine, state_rx)
    }

    /// Current state.
    pub fn state(&self) -> ConnectivityState {
        self.state
    }

    /// Runs until `token` is cancelled, the bus closes, or a fatal fault escalates.
    ///
    /// ### Exit conditions
    /// - `Ok(())` on cancellation or bus closure; an open session is disconnected
    /// - `Err(RuntimeError::Escalated)` after a fatal transport failure, if the
    ///   process control returned instead of restarting the process
    pub async fn run(mut self, token: CancellationToken) -> Result<(), RuntimeError> {
        self.announce();

        loop {
            let inbound = tokio::select! {
                biased;
                _ = token.cancelled() => break,
                inbound = self.liveness.keep_fed(recv_inbound(&mut self.network_rx, &mut self.payload_rx)) => inbound,
            };

            match inbound {
                Inbound::Network(ev) => self.on_network(ev, &token).await?,
                Inbound::Payload(payload) => self.on_payload(payload).await,
                Inbound::Closed => {
                    tracing::info!("bus closed; connectivity machine stopping");
                    break;
                }
            }
        }

        self.close().await;
        Ok(())
    }

    fn announce(&mut self) {
        tracing::info!(state = %self.state, "connectivity machine started");
        self.state_tx.send_replace(self.state);
        if let Some(status) = self.state.status() {
            self.bus.cloud.publish(status);
        }
    }

    /// Moves to `next` and publishes its status, if it has one.
    fn transition(&mut self, next: ConnectivityState) {
        let prev = std::mem::replace(&mut self.state, next);
        self.state_tx.send_replace(next);
        tracing::info!(from = %prev, to = %next, "connectivity transition");

        if let Some(status) = next.status() {
            self.bus.cloud.publish(status);
        }
    }

    async fn on_network(
        &mut self,
        ev: NetworkEvent,
        token: &CancellationToken,
    ) -> Result<(), RuntimeError> {
        use ConnectivityState::*;

        match (self.state, ev) {
            (Disconnected | Paused, NetworkEvent::Connected) => {
                self.retry.reset();
                self.transition(Connecting);
                self.connect_sequence(token).await
            }
            (Ready, NetworkEvent::Disconnected) => {
                self.transition(Paused);
                Ok(())
            }
            (Connecting, NetworkEvent::Disconnected) => {
                self.abandon().await;
                Ok(())
            }
            (state, ev) => {
                tracing::debug!(%state, ?ev, "network event ignored");
                Ok(())
            }
        }
    }

    /// Attempts `connect()` until it succeeds, fails fatally, or the link goes away.
    async fn connect_sequence(&mut self, token: &CancellationToken) -> Result<(), RuntimeError> {
        loop {
            let outcome = self
                .liveness
                .keep_fed_bounded(connect_once(self.client.as_ref(), self.retry.attempt()))
                .await;
            self.drop_queued_payloads();

            match outcome {
                ConnectOutcome::Success => {
                    self.transition(ConnectivityState::Ready);
                    return Ok(());
                }
                ConnectOutcome::FatalFailure(reason) => {
                    return Err(self.fail(reason).await);
                }
                ConnectOutcome::RetryableFailure(_) => {
                    let delay = self.retry.advance(&self.backoff);
                    tracing::info!(attempt = self.retry.attempt(), ?delay, "connect backoff scheduled");

                    self.liveness.keep_fed(time::sleep(delay)).await;

                    if token.is_cancelled() {
                        return Ok(());
                    }
                    if self.contrary_event_queued().await {
                        return Ok(());
                    }
                }
            }
        }
    }

    /// Looks at network events queued during a backoff sleep.
    ///
    /// Returns `true` if a `Disconnected` ended the sequence.
    async fn contrary_event_queued(&mut self) -> bool {
        self.drop_queued_payloads();
        loop {
            match self.network_rx.try_recv() {
                Ok(NetworkEvent::Disconnected) => {
                    self.abandon().await;
                    return true;
                }
                Ok(NetworkEvent::Connected) => {
                    tracing::debug!("link up while already connecting; ignored");
                }
                Err(TryRecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "network channel lagged during backoff");
                }
                Err(TryRecvError::Empty | TryRecvError::Closed) => return false,
            }
        }
    }

    /// Drops every payload queued while the state was not `Ready`.
    fn drop_queued_payloads(&mut self) {
        loop {
            match self.payload_rx.try_recv() {
                Ok(payload) => {
                    tracing::debug!(state = %self.state, len = payload.len(), "payload dropped: session not ready");
                }
                Err(TryRecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "payload channel lagged");
                }
                Err(TryRecvError::Empty | TryRecvError::Closed) => return,
            }
        }
    }

    /// Gives up the current attempt sequence.
    async fn abandon(&mut self) {
        self.liveness
            .keep_fed_bounded(self.client.disconnect())
            .await;
        self.transition(ConnectivityState::Disconnected);
    }

    async fn fail(&mut self, reason: String) -> RuntimeError {
        self.bus
            .error
            .publish(ErrorEvent::fatal("transport.connect", reason.as_str()));
        self.escalator.escalate(Fault::transport(reason)).await
    }

    async fn on_payload(&mut self, payload: Payload) {
        if !self.state.accepts_payloads() {
            tracing::debug!(state = %self.state, len = payload.len(), "payload dropped: session not ready");
            return;
        }
        if let Err(e) = self
            .liveness
            .keep_fed_bounded(send_once(self.client.as_ref(), &payload))
            .await
        {
            self.bus
                .error
                .publish(ErrorEvent::recoverable("transport.send", e.to_string()));
        }
    }

    async fn close(&mut self) {
        if self.state != ConnectivityState::Disconnected {
            tracing::info!(state = %self.state, "closing cloud session");
            self.client.disconnect().await;
        }
    }
}

/// Waits for the next message, preferring `network` when both channels have one.
async fn recv_inbound(
    network: &mut broadcast::Receiver<NetworkEvent>,
    payload: &mut broadcast::Receiver<Payload>,
) -> Inbound {
    loop {
        tokio::select! {
            biased;
            res = network.recv() => match res {
                Ok(ev) => return Inbound::Network(ev),
                Err(RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "network channel lagged");
                }
                Err(RecvError::Closed) => return Inbound::Closed,
            },
            res = payload.recv() => match res {
                Ok(p) => return Inbound::Payload(p),
                Err(RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "payload channel lagged");
                }
                Err(RecvError::Closed) => return Inbound::Closed,
            },
        }
    }
}
