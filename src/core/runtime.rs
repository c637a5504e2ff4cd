//! # Runtime: wires the machine, the liveness monitor and the observers.
//!
//! [`Runtime`] is produced by [`RuntimeBuilder`](crate::RuntimeBuilder) and owns
//! every task the connectivity service needs.
//!
//! ## Tasks
//! ```text
//! run()
//!   ├─► observer listener: cloud-status + error ─► Event ─► SubscriberSet::emit
//!   ├─► liveness monitor:  rearm, watchdog.starved() ─► error: Fatal("watchdog")
//!   │                                                 ─► FaultEscalator::escalate(Watchdog)
//!   └─► connectivity machine: ConnectivityMachine::run(token)
//!
//! exit:
//!   machine Ok, no escalation      ─► Ok(())                 (shutdown token cancelled)
//!   machine Ok, escalation engaged ─► await monitor ─► Err(Escalated{Watchdog})
//!   machine Err(e)                 ─► Err(e)                 (fatal transport)
//!   machine panicked               ─► await monitor          (it stops feeding)
//!   then: cancel token, drain observers, SubscriberSet::shutdown()
//! ```

use std::sync::Arc;

use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::core::fault::FaultEscalator;
use crate::core::liveness::LivenessMonitor;
use crate::core::machine::ConnectivityMachine;
use crate::core::state::ConnectivityState;
use crate::error::RuntimeError;
use crate::events::{Bus, CloudEvent, ErrorEvent, Event};
use crate::subscribers::{Subscribe, SubscriberSet};

/// A fully wired connectivity service, ready to [`run`](Self::run).
pub struct Runtime {
    bus: Bus,
    state: watch::Receiver<ConnectivityState>,
    token: CancellationToken,
    machine: ConnectivityMachine,
    monitor: LivenessMonitor,
    escalator: Arc<FaultEscalator>,
    subscribers: Vec<Arc<dyn Subscribe>>,
    cloud_rx: broadcast::Receiver<CloudEvent>,
    error_rx: broadcast::Receiver<ErrorEvent>,
}

impl Runtime {
    pub(crate) fn new_internal(
        bus: Bus,
        state: watch::Receiver<ConnectivityState>,
        token: CancellationToken,
        machine: ConnectivityMachine,
        monitor: LivenessMonitor,
        escalator: Arc<FaultEscalator>,
        subscribers: Vec<Arc<dyn Subscribe>>,
    ) -> Self {
        let cloud_rx = bus.cloud.subscribe();
        let error_rx = bus.error.subscribe();
        Self {
            bus,
            state,
            token,
            machine,
            monitor,
            escalator,
            subscribers,
            cloud_rx,
            error_rx,
        }
    }

    /// The bus; clone it to publish `network` and `payload` messages.
    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    /// Read-only view of the machine's state.
    pub fn state(&self) -> watch::Receiver<ConnectivityState> {
        self.state.clone()
    }

    /// Cancelling this token stops the runtime gracefully.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Runs until shutdown or a fatal fault.
    ///
    /// In production a fatal fault ends with a process restart and this never
    /// returns; `Err(RuntimeError::Escalated)` is seen only with a process
    /// control that returns.
    pub async fn run(self) -> Result<(), RuntimeError> {
        let Runtime {
            bus,
            token,
            machine,
            monitor,
            escalator,
            subscribers,
            cloud_rx,
            error_rx,
            ..
        } = self;

        let listener = tokio::spawn(observer_listener(
            cloud_rx,
            error_rx,
            SubscriberSet::new(subscribers),
            token.clone(),
        ));
        monitor.rearm();
        let mut monitor = {
            let escalator = Arc::clone(&escalator);
            tokio::spawn(async move {
                let fault = monitor.starved().await;
                bus.error.publish(ErrorEvent::fatal("watchdog", fault.reason.clone()));
                escalator.escalate(fault).await
            })
        };
        let mut machine = tokio::spawn(machine.run(token.clone()));

        let result = tokio::select! {
            res = &mut machine => match res {
                Ok(Ok(())) if escalator.is_engaged() => Err(join_escalation(monitor).await),
                Ok(Ok(())) => {
                    monitor.abort();
                    Ok(())
                }
                Ok(Err(e)) => {
                    monitor.abort();
                    Err(e)
                }
                Err(e) => {
                    tracing::error!(err = %e, "connectivity machine panicked; awaiting watchdog");
                    Err(join_escalation(monitor).await)
                }
            },
            res = &mut monitor => {
                let err = res.unwrap_or(RuntimeError::Panicked { task: "liveness-monitor" });
                machine.abort();
                Err(err)
            }
        };

        token.cancel();
        if listener.await.is_err() {
            tracing::warn!("observer listener panicked");
        }
        match &result {
            Ok(()) => tracing::info!("connectivity runtime stopped"),
            Err(e) => tracing::error!(err = %e, label = e.as_label(), "connectivity runtime failed"),
        }
        result
    }
}

async fn join_escalation(monitor: JoinHandle<RuntimeError>) -> RuntimeError {
    monitor
        .await
        .unwrap_or(RuntimeError::Panicked { task: "liveness-monitor" })
}

/// Forwards outbound messages to the observers until `token` is cancelled,
/// then delivers what is still queued and waits for the observers to finish.
async fn observer_listener(
    mut cloud: broadcast::Receiver<CloudEvent>,
    mut error: broadcast::Receiver<ErrorEvent>,
    set: SubscriberSet,
    token: CancellationToken,
) {
    loop {
        let ev: Event = tokio::select! {
            biased;
            res = cloud.recv() => match res {
                Ok(status) => status.into(),
                Err(RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, channel = "cloud-status", "observer listener lagged");
                    continue;
                }
                Err(RecvError::Closed) => break,
            },
            res = error.recv() => match res {
                Ok(err) => err.into(),
                Err(RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, channel = "error", "observer listener lagged");
                    continue;
                }
                Err(RecvError::Closed) => break,
            },
            _ = token.cancelled() => break,
        };
        set.emit(&ev);
    }

    drain(&mut cloud, &set);
    drain(&mut error, &set);
    set.shutdown().await;
}

fn drain<T: Clone + Into<Event>>(rx: &mut broadcast::Receiver<T>, set: &SubscriberSet) {
    loop {
        match rx.try_recv() {
            Ok(msg) => set.emit(&msg.into()),
            Err(TryRecvError::Lagged(_)) => continue,
            Err(TryRecvError::Empty | TryRecvError::Closed) => return,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;
    use tokio::time::{self, Instant};

    use super::*;
    use crate::core::fault::FaultOrigin;
    use crate::error::SendError;
    use crate::core::{Config, RuntimeBuilder};
    use crate::events::{ErrorKind, NetworkEvent, Payload};
    use crate::testing::{ManualWatchdog, ScriptedCloud, Step, Trace, settle};
    use crate::transport::{CloudClient, ConnectOutcome, SendFlags};
    use crate::watchdog::SoftWatchdog;

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<Event>>,
    }

    impl Recorder {
        fn statuses(&self) -> Vec<CloudEvent> {
            self.events
                .lock()
                .unwrap()
                .iter()
                .filter_map(|e| match e {
                    Event::Cloud(c) => Some(*c),
                    Event::Error(_) => None,
                })
                .collect()
        }

        fn errors(&self) -> Vec<ErrorEvent> {
            self.events
                .lock()
                .unwrap()
                .iter()
                .filter_map(|e| match e {
                    Event::Error(err) => Some(err.clone()),
                    Event::Cloud(_) => None,
                })
                .collect()
        }
    }

    #[async_trait]
    impl Subscribe for Recorder {
        async fn on_event(&self, event: &Event) {
            self.events.lock().unwrap().push(event.clone());
        }
    }

    fn builder(cloud: Arc<ScriptedCloud>, trace: &Trace, recorder: Arc<Recorder>) -> RuntimeBuilder {
        RuntimeBuilder::new(Config::default(), cloud)
            .with_log_sink(trace.log_sink())
            .with_diagnostics(trace.diagnostics())
            .with_process_control(trace.process())
            .with_subscribers(vec![recorder as Arc<dyn Subscribe>])
    }

    #[tokio::test(start_paused = true)]
    async fn observers_see_status_changes_and_shutdown_is_clean() {
        let cloud = Arc::new(ScriptedCloud::accepting());
        let trace = Trace::new();
        let recorder = Arc::new(Recorder::default());
        let rt = builder(cloud.clone(), &trace, recorder.clone())
            .with_watchdog(Arc::new(ManualWatchdog::new()))
            .build()
            .unwrap();
        let bus = rt.bus().clone();
        let state = rt.state();
        let token = rt.shutdown_token();
        let run = tokio::spawn(rt.run());
        settle().await;

        bus.network.publish(NetworkEvent::Connected);
        settle().await;
        assert_eq!(*state.borrow(), ConnectivityState::Ready);
        bus.payload.publish(Payload::from("hello"));
        settle().await;

        token.cancel();
        run.await.unwrap().unwrap();

        assert_eq!(
            recorder.statuses(),
            vec![CloudEvent::Disconnected, CloudEvent::Ready]
        );
        assert_eq!(cloud.sent().len(), 1);
        assert_eq!(cloud.disconnects(), 1);
        assert!(trace.steps().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn watchdog_starvation_flushes_reports_waits_then_restarts() {
        let cloud = Arc::new(ScriptedCloud::accepting());
        let trace = Trace::new();
        let wdt = Arc::new(ManualWatchdog::new());
        let recorder = Arc::new(Recorder::default());
        let rt = builder(cloud, &trace, recorder.clone())
            .with_watchdog(wdt.clone())
            .build()
            .unwrap();
        let run = tokio::spawn(rt.run());
        settle().await;

        let starved_at = Instant::now();
        wdt.starve();
        let res = run.await.unwrap();

        assert_eq!(
            trace.steps(),
            vec![Step::Flush, Step::Diagnostics, Step::Restart]
        );
        assert!(trace.at(Step::Restart).unwrap() - starved_at >= Duration::from_secs(10));
        assert!(trace.at(Step::Diagnostics).unwrap() - starved_at < Duration::from_secs(1));
        assert!(matches!(
            res,
            Err(RuntimeError::Escalated { origin: FaultOrigin::Watchdog, .. })
        ));
        let errors = recorder.errors();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, ErrorKind::Fatal);
        assert_eq!(errors[0].source, "watchdog");
    }

    #[tokio::test(start_paused = true)]
    async fn open_session_closes_only_after_diagnostics() {
        let trace = Trace::new();
        let cloud = Arc::new(ScriptedCloud::accepting().traced(&trace));
        let wdt = Arc::new(ManualWatchdog::new());
        let rt = builder(cloud.clone(), &trace, Arc::new(Recorder::default()))
            .with_watchdog(wdt.clone())
            .build()
            .unwrap();
        let bus = rt.bus().clone();
        let state = rt.state();
        let run = tokio::spawn(rt.run());
        settle().await;

        bus.network.publish(NetworkEvent::Connected);
        settle().await;
        assert_eq!(*state.borrow(), ConnectivityState::Ready);

        wdt.starve();
        let res = run.await.unwrap();

        assert!(matches!(
            res,
            Err(RuntimeError::Escalated { origin: FaultOrigin::Watchdog, .. })
        ));
        assert_eq!(
            trace.steps(),
            vec![Step::Flush, Step::Diagnostics, Step::Disconnect, Step::Restart]
        );
        assert_eq!(cloud.disconnects(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn idle_time_between_build_and_run_is_not_starvation() {
        let cloud = Arc::new(ScriptedCloud::accepting());
        let trace = Trace::new();
        let rt = builder(cloud, &trace, Arc::new(Recorder::default()))
            .with_watchdog(Arc::new(SoftWatchdog::default()))
            .build()
            .unwrap();
        let token = rt.shutdown_token();

        time::sleep(Duration::from_secs(61)).await;
        let run = tokio::spawn(rt.run());
        time::sleep(Duration::from_secs(5)).await;
        token.cancel();

        run.await.unwrap().unwrap();
        assert!(trace.steps().is_empty());
    }

    struct HungBroker;

    #[async_trait]
    impl CloudClient for HungBroker {
        async fn connect(&self) -> ConnectOutcome {
            std::future::pending().await
        }

        async fn disconnect(&self) {}

        async fn send(&self, _bytes: &[u8], _flags: SendFlags) -> Result<(), SendError> {
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn hung_connect_starves_watchdog_and_escalates() {
        let trace = Trace::new();
        let recorder = Arc::new(Recorder::default());
        let rt = RuntimeBuilder::new(Config::default(), Arc::new(HungBroker))
            .with_log_sink(trace.log_sink())
            .with_diagnostics(trace.diagnostics())
            .with_process_control(trace.process())
            .with_subscribers(vec![recorder.clone() as Arc<dyn Subscribe>])
            .with_watchdog(Arc::new(SoftWatchdog::default()))
            .build()
            .unwrap();
        let bus = rt.bus().clone();
        let run = tokio::spawn(rt.run());
        settle().await;

        let connected_at = Instant::now();
        bus.network.publish(NetworkEvent::Connected);
        let res = time::timeout(Duration::from_secs(3600), run)
            .await
            .expect("hung connect was never escalated")
            .unwrap();

        assert!(matches!(
            res,
            Err(RuntimeError::Escalated { origin: FaultOrigin::Watchdog, .. })
        ));
        assert_eq!(
            trace.steps(),
            vec![Step::Flush, Step::Diagnostics, Step::Restart]
        );
        assert!(trace.at(Step::Diagnostics).unwrap() - connected_at <= Duration::from_secs(150));
        assert_eq!(recorder.errors()[0].source, "watchdog");
    }

    #[tokio::test(start_paused = true)]
    async fn fatal_connect_reaches_observers_and_escalates() {
        let cloud = Arc::new(ScriptedCloud::new(ConnectOutcome::FatalFailure(
            "device revoked".into(),
        )));
        let trace = Trace::new();
        let recorder = Arc::new(Recorder::default());
        let rt = builder(cloud, &trace, recorder.clone())
            .with_watchdog(Arc::new(ManualWatchdog::new()))
            .build()
            .unwrap();
        let bus = rt.bus().clone();
        let run = tokio::spawn(rt.run());
        settle().await;

        bus.network.publish(NetworkEvent::Connected);
        let res = run.await.unwrap();

        assert!(matches!(
            res,
            Err(RuntimeError::Escalated { origin: FaultOrigin::Transport, .. })
        ));
        assert_eq!(trace.steps(), vec![Step::Flush, Step::Restart]);
        let errors = recorder.errors();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, ErrorKind::Fatal);
    }

    #[tokio::test(start_paused = true)]
    async fn soft_watchdog_stays_fed_through_long_backoff() {
        let cloud = Arc::new(ScriptedCloud::new(ConnectOutcome::RetryableFailure(
            "no route".into(),
        )));
        let trace = Trace::new();
        let rt = builder(cloud.clone(), &trace, Arc::new(Recorder::default()))
            .with_watchdog(Arc::new(SoftWatchdog::default()))
            .build()
            .unwrap();
        let bus = rt.bus().clone();
        let token = rt.shutdown_token();
        let run = tokio::spawn(rt.run());
        settle().await;

        bus.network.publish(NetworkEvent::Connected);
        time::sleep(Duration::from_secs(2 * 3600)).await;
        token.cancel();

        run.await.unwrap().unwrap();
        assert!(trace.steps().is_empty());
        assert!(cloud.connect_count() >= 5);
    }
}
