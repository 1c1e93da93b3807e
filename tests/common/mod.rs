//! Shared utilities for integration testing.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;

use server_supervisor::{
    GracePeriod, ServerSupervisor, ServiceRegistry, ShutdownOutcome, SupervisorError,
    SupervisorState,
};

/// A supervisor running in the background on an ephemeral port.
pub struct SupervisedServer {
    /// Loopback address of the bound port.
    pub addr: SocketAddr,
    pub state: watch::Receiver<SupervisorState>,
    stop: Option<oneshot::Sender<()>>,
    run: JoinHandle<Result<ShutdownOutcome, SupervisorError>>,
}

impl SupervisedServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Resolve the stop trigger.
    pub fn stop(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
    }

    /// Wait for the run to return, failing the test after `limit`.
    pub async fn finish(self, limit: Duration) -> Result<ShutdownOutcome, SupervisorError> {
        tokio::time::timeout(limit, self.run)
            .await
            .expect("supervisor did not return in time")
            .expect("supervisor task panicked")
    }

    pub fn is_finished(&self) -> bool {
        self.run.is_finished()
    }
}

/// Start a supervisor on an ephemeral port and wait until it is serving.
pub async fn start_supervisor(
    grace_period: impl Into<GracePeriod>,
    registry: ServiceRegistry,
) -> SupervisedServer {
    let supervisor = ServerSupervisor::new(0, grace_period, registry);
    let mut state = supervisor.subscribe();
    let (stop, stopped) = oneshot::channel::<()>();
    let run = tokio::spawn(supervisor.run_until_stopped(stopped));

    let port = {
        let serving = tokio::time::timeout(
            Duration::from_secs(5),
            state.wait_for(|s| matches!(s, SupervisorState::Serving { .. })),
        )
        .await
        .expect("supervisor never started serving")
        .expect("supervisor dropped before serving");
        match *serving {
            SupervisorState::Serving { addr } => addr.port(),
            _ => unreachable!(),
        }
    };

    SupervisedServer {
        addr: SocketAddr::from(([127, 0, 0, 1], port)),
        state,
        stop: Some(stop),
        run,
    }
}

/// HTTP client that never reuses connections or goes through a proxy.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}
