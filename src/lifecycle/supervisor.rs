//! Top-level lifecycle orchestration for one serve cycle.
//!
//! ```text
//! Idle → Binding → Serving → Draining → Stopped
//!           │                         ↘ ForceStopped
//!           ↘ BindFailed
//! ```

use std::future::Future;
use std::net::SocketAddr;

use tokio::sync::watch;

use crate::config::SupervisorConfig;
use crate::error::SupervisorError;
use crate::http::{Server, ServiceRegistry};
use crate::lifecycle::shutdown::{GracePeriod, ShutdownOutcome, ShutdownRace};
use crate::lifecycle::signals::{StopReason, StopTrigger};
use crate::net::{ListenSpec, Listener};

/// Where a supervised run currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    Idle,
    Binding,
    Serving { addr: SocketAddr },
    Draining,
    Stopped,
    ForceStopped,
    BindFailed,
}

impl SupervisorState {
    /// True once the run can no longer change state.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SupervisorState::Stopped | SupervisorState::ForceStopped | SupervisorState::BindFailed
        )
    }
}

/// Binds, serves until told to stop, then shuts down within a grace period.
///
/// Built once and consumed by a single `run*` call; a fresh server is created
/// for that run and discarded when it ends.
#[derive(Debug)]
pub struct ServerSupervisor {
    listen: ListenSpec,
    max_connections: usize,
    grace_period: GracePeriod,
    registry: ServiceRegistry,
    state: watch::Sender<SupervisorState>,
}

impl ServerSupervisor {
    pub const DEFAULT_MAX_CONNECTIONS: usize = 10_000;

    pub fn new(
        listen_port: u16,
        grace_period: impl Into<GracePeriod>,
        registry: ServiceRegistry,
    ) -> Self {
        Self {
            listen: ListenSpec::new(listen_port),
            max_connections: Self::DEFAULT_MAX_CONNECTIONS,
            grace_period: grace_period.into(),
            registry,
            state: watch::Sender::new(SupervisorState::Idle),
        }
    }

    /// Build from an already-validated configuration.
    pub fn from_config(config: &SupervisorConfig, registry: ServiceRegistry) -> Self {
        Self::new(
            config.listener.port,
            config.shutdown.grace_period(),
            registry,
        )
        .with_max_connections(config.listener.max_connections)
    }

    /// Cap concurrently open connections. Values below 1 are raised to 1.
    pub fn with_max_connections(mut self, max_connections: usize) -> Self {
        self.max_connections = max_connections.max(1);
        self
    }

    pub fn grace_period(&self) -> GracePeriod {
        self.grace_period
    }

    /// Observe state transitions, including the bound address once serving.
    pub fn subscribe(&self) -> watch::Receiver<SupervisorState> {
        self.state.subscribe()
    }

    /// Serve until SIGINT, SIGQUIT or SIGTERM arrives.
    pub async fn run_until_interrupted(self) -> Result<ShutdownOutcome, SupervisorError> {
        self.run(StopTrigger::os_signals()).await
    }

    /// Serve until `stop` resolves.
    pub async fn run_until_stopped<F>(self, stop: F) -> Result<ShutdownOutcome, SupervisorError>
    where
        F: Future + Send + 'static,
    {
        self.run(StopTrigger::from_future(stop)).await
    }

    /// Serve until `trigger` resolves.
    ///
    /// Both graceful and forced shutdowns are `Ok`; only failing to bind
    /// (or to subscribe to signals, or a crashed serving task) is an error.
    pub async fn run(self, trigger: StopTrigger) -> Result<ShutdownOutcome, SupervisorError> {
        let Self {
            listen,
            max_connections,
            grace_period,
            registry,
            state,
        } = self;

        state.send_replace(SupervisorState::Binding);
        let server = Server::new(registry.apply());

        let listener = match Listener::bind(listen, max_connections).await {
            Ok(listener) => listener,
            Err(err) => {
                tracing::error!(error = %err, "Failed to bind; server will not start");
                state.send_replace(SupervisorState::BindFailed);
                return Err(err.into());
            }
        };

        let running = server.start(listener);
        let addr = running.local_addr();
        state.send_replace(SupervisorState::Serving { addr });
        tracing::info!(address = %addr, grace_period = %grace_period, "Serving");

        let stop = trigger.await;
        match &stop {
            Ok(StopReason::Signal(signal)) => {
                tracing::info!(signal = %signal, "Stopping server");
            }
            Ok(StopReason::Requested) => tracing::info!("Stop requested; stopping server"),
            Err(err) => tracing::error!(error = %err, "Stop trigger failed; stopping server"),
        }

        state.send_replace(SupervisorState::Draining);
        let (outcome, report) = ShutdownRace::new(grace_period).run(running).await;

        state.send_replace(match outcome {
            ShutdownOutcome::Graceful => SupervisorState::Stopped,
            ShutdownOutcome::ForcedAfterTimeout => SupervisorState::ForceStopped,
        });

        let report = report?;
        tracing::info!(
            outcome = outcome.as_str(),
            accepted = report.accepted,
            severed = report.severed,
            "Server stopped"
        );

        stop?;
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn bind_failure_never_polls_the_stop_trigger() {
        let occupied = std::net::TcpListener::bind("0.0.0.0:0").unwrap();
        let port = occupied.local_addr().unwrap().port();

        let polled = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&polled);
        let trigger = StopTrigger::from_future(async move {
            flag.store(true, Ordering::SeqCst);
        });

        let supervisor = ServerSupervisor::new(port, Duration::from_secs(1), ServiceRegistry::new());
        let state = supervisor.subscribe();
        let err = supervisor.run(trigger).await.unwrap_err();

        assert!(err.is_bind_failure());
        assert_eq!(*state.borrow(), SupervisorState::BindFailed);
        assert!(!polled.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn resolved_trigger_goes_straight_to_draining() {
        let supervisor = ServerSupervisor::new(0, GracePeriod::from_secs(10), ServiceRegistry::new());
        let mut state = supervisor.subscribe();
        assert_eq!(*state.borrow_and_update(), SupervisorState::Idle);

        let outcome = tokio::time::timeout(
            Duration::from_secs(2),
            supervisor.run_until_stopped(std::future::ready(())),
        )
        .await
        .expect("run did not finish promptly")
        .unwrap();

        assert_eq!(outcome, ShutdownOutcome::Graceful);
        assert_eq!(*state.borrow(), SupervisorState::Stopped);
        assert!(state.borrow().is_terminal());
    }

    #[test]
    fn config_values_are_carried_over() {
        let mut config = SupervisorConfig::default();
        config.shutdown.grace_period_secs = 3;
        config.listener.max_connections = 0;

        let supervisor = ServerSupervisor::from_config(&config, ServiceRegistry::new());
        assert_eq!(supervisor.grace_period(), GracePeriod::from_secs(3));
        assert_eq!(supervisor.max_connections, 1);
    }
}
