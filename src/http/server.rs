//! HTTP server setup and the serving task.
//!
//! # Responsibilities
//! - Build the dispatch router from applied registrations
//! - Wire up middleware (request ID, tracing)
//! - Serve HTTP/1.1 and HTTP/2 on an already-bound listener
//! - Stop accepting and drain on request, or sever everything on demand

use std::future::Future;
use std::net::SocketAddr;

use axum::Router;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder;
use hyper_util::server::graceful::GracefulShutdown;
use hyper_util::service::TowerToHyperService;
use tokio::sync::watch;
use tokio::task::{JoinError, JoinHandle, JoinSet};
use tower::ServiceBuilder;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use tracing::Instrument;

use crate::http::registry::ServiceRegistrar;
use crate::lifecycle::shutdown::Drain;
use crate::net::{ConnectionTracker, Listener};
use crate::observability::metrics;

/// Pause after a failed accept (e.g. out of file descriptors) before retrying.
const ACCEPT_ERROR_BACKOFF: std::time::Duration = std::time::Duration::from_millis(50);

/// What the serving task has been asked to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ServerPhase {
    Serving,
    Draining,
    Terminating,
}

/// Totals reported by a server once it has stopped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ServeReport {
    /// Connections accepted over the server's lifetime.
    pub accepted: u64,
    /// Connections still open when a forced stop severed them.
    pub severed: u64,
}

/// A server with all services attached that has not started accepting yet.
pub struct Server {
    router: Router,
}

impl Server {
    /// Build the server from applied registrations.
    pub fn new(registrar: ServiceRegistrar) -> Self {
        let middleware = ServiceBuilder::new()
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
            .layer(TraceLayer::new_for_http())
            .layer(PropagateRequestIdLayer::x_request_id());

        Self {
            router: registrar.into_router().layer(middleware),
        }
    }

    /// Start accepting connections on `listener`.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(self, listener: Listener) -> RunningServer {
        let local_addr = listener.local_addr();
        let (control, phase) = watch::channel(ServerPhase::Serving);

        tracing::info!(address = %local_addr, "HTTP server starting");
        let task = tokio::spawn(serve(listener, self.router, phase));

        RunningServer {
            local_addr,
            control,
            task,
        }
    }
}

/// Handle to a server that is accepting connections.
///
/// Owned by exactly one supervisor run. Dropping the handle stops the server
/// and severs whatever is still in flight.
#[derive(Debug)]
pub struct RunningServer {
    local_addr: SocketAddr,
    control: watch::Sender<ServerPhase>,
    task: JoinHandle<ServeReport>,
}

impl RunningServer {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}

impl Drain for RunningServer {
    type Report = Result<ServeReport, JoinError>;

    fn drain(&mut self) -> impl Future<Output = Self::Report> + Send {
        self.control.send_replace(ServerPhase::Draining);
        &mut self.task
    }

    fn force_stop(self) -> impl Future<Output = Self::Report> + Send {
        self.control.send_replace(ServerPhase::Terminating);
        self.task
    }
}

async fn serve(
    listener: Listener,
    router: Router,
    mut phase: watch::Receiver<ServerPhase>,
) -> ServeReport {
    let builder = Builder::new(TokioExecutor::new());
    let graceful = GracefulShutdown::new();
    let tracker = ConnectionTracker::new();
    let mut connections = JoinSet::new();
    let mut report = ServeReport::default();

    loop {
        tokio::select! {
            biased;
            () = phase_reached(&mut phase, |p| *p != ServerPhase::Serving) => break,
            Some(finished) = connections.join_next(), if !connections.is_empty() => {
                if let Err(err) = finished {
                    tracing::warn!(error = %err, "Connection task failed");
                }
            }
            accepted = listener.accept() => {
                let (stream, peer_addr, permit) = match accepted {
                    Ok(accepted) => accepted,
                    Err(err) => {
                        tracing::warn!(error = %err, "Accept failed");
                        tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
                        continue;
                    }
                };

                let guard = tracker.track();
                let span = tracing::debug_span!(
                    "connection",
                    connection_id = %guard.id(),
                    peer_addr = %peer_addr
                );
                report.accepted += 1;
                metrics::record_connection_accepted();

                let io = TokioIo::new(stream);
                let service = TowerToHyperService::new(router.clone());
                let watcher = graceful.watcher();
                let builder = builder.clone();

                connections.spawn(
                    async move {
                        let _permit = permit;
                        let _guard = guard;
                        let conn = builder.serve_connection_with_upgrades(io, service);
                        if let Err(err) = watcher.watch(conn).await {
                            tracing::debug!(error = %err, "Connection ended with error");
                        }
                    }
                    .instrument(span),
                );
            }
        }
    }

    // Closing the listener refuses new connections from here on.
    drop(listener);
    tracing::debug!(
        in_flight = tracker.active_count(),
        "Stopped accepting connections"
    );

    let forced = tokio::select! {
        biased;
        () = graceful.shutdown() => false,
        () = phase_reached(&mut phase, |p| *p == ServerPhase::Terminating) => true,
    };

    if forced {
        report.severed = tracker.active_count();
        connections.shutdown().await;
        tracing::debug!(severed = report.severed, "In-flight connections severed");
    } else {
        while connections.join_next().await.is_some() {}
    }

    report
}

/// Resolves once the current phase satisfies `reached`.
///
/// A closed channel means the handle was dropped, which counts as reached.
async fn phase_reached(
    phase: &mut watch::Receiver<ServerPhase>,
    reached: impl FnMut(&ServerPhase) -> bool,
) {
    let _ = phase.wait_for(reached).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::registry::ServiceRegistry;
    use crate::net::ListenSpec;
    use axum::routing::get;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::Notify;

    async fn start(registry: ServiceRegistry) -> RunningServer {
        let listener = Listener::bind(ListenSpec::new(0), 16).await.unwrap();
        Server::new(registry.apply()).start(listener)
    }

    fn loopback(server: &RunningServer) -> String {
        format!("http://127.0.0.1:{}", server.local_addr().port())
    }

    #[tokio::test]
    async fn serves_registered_routes_with_request_ids() {
        let registry = ServiceRegistry::new().register(|server| {
            server.route("/ping", get(|| async { "pong" }));
        });
        let mut server = start(registry).await;

        let response = reqwest::get(format!("{}/ping", loopback(&server))).await.unwrap();
        assert_eq!(response.status(), 200);
        assert!(response.headers().contains_key("x-request-id"));
        assert_eq!(response.text().await.unwrap(), "pong");

        let report = server.drain().await.unwrap();
        assert_eq!(report.accepted, 1);
        assert_eq!(report.severed, 0);
    }

    /// A `/slow` route that announces on `started` before holding for `hold`.
    fn slow_route(hold: Duration, started: Arc<Notify>) -> ServiceRegistry {
        ServiceRegistry::new().register(move |server| {
            server.route(
                "/slow",
                get(move || {
                    let started = Arc::clone(&started);
                    async move {
                        started.notify_one();
                        tokio::time::sleep(hold).await;
                        "done"
                    }
                }),
            );
        })
    }

    async fn wait_started(started: &Notify) {
        tokio::time::timeout(Duration::from_secs(5), started.notified())
            .await
            .expect("handler never started");
    }

    #[tokio::test]
    async fn drain_waits_for_in_flight_request() {
        let started = Arc::new(Notify::new());
        let mut server = start(slow_route(Duration::from_millis(300), Arc::clone(&started))).await;
        let url = format!("{}/slow", loopback(&server));
        let request = tokio::spawn(async move { reqwest::get(url).await?.text().await });

        wait_started(&started).await;
        let report = server.drain().await.unwrap();

        assert_eq!(report.severed, 0);
        assert_eq!(request.await.unwrap().unwrap(), "done");
    }

    #[tokio::test]
    async fn force_stop_severs_in_flight_request() {
        let started = Arc::new(Notify::new());
        let server = start(slow_route(Duration::from_secs(30), Arc::clone(&started))).await;
        let url = format!("{}/slow", loopback(&server));
        let request = tokio::spawn(async move { reqwest::get(url).await });

        wait_started(&started).await;
        let report = server.force_stop().await.unwrap();

        assert_eq!(report.severed, 1);
        assert!(request.await.unwrap().is_err());
    }

    #[tokio::test]
    async fn listener_is_closed_after_drain() {
        let mut server = start(ServiceRegistry::new()).await;
        let port = server.local_addr().port();
        server.drain().await.unwrap();

        let rebound = Listener::bind(ListenSpec::new(port), 1).await;
        assert!(rebound.is_ok());
    }
}
