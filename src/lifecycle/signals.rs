//! Stop triggers and OS signal handling.
//!
//! # Responsibilities
//! - Turn a caller-supplied future into a stop trigger
//! - Subscribe to SIGINT, SIGQUIT and SIGTERM and resolve on the first one
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - Subscriptions are made on first poll, so a run that fails to bind never
//!   touches process-wide signal state
//! - Once the trigger resolves every subscription is dropped; later signals
//!   in the same run do not start a second shutdown

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures_util::future::BoxFuture;
use futures_util::FutureExt;

use crate::error::SupervisorError;

/// OS termination notifications that stop a server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TerminationSignal {
    Interrupt,
    Quit,
    Terminate,
}

impl TerminationSignal {
    pub const ALL: [TerminationSignal; 3] = [
        TerminationSignal::Interrupt,
        TerminationSignal::Quit,
        TerminationSignal::Terminate,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            TerminationSignal::Interrupt => "SIGINT",
            TerminationSignal::Quit => "SIGQUIT",
            TerminationSignal::Terminate => "SIGTERM",
        }
    }

    #[cfg(unix)]
    fn kind(&self) -> tokio::signal::unix::SignalKind {
        use tokio::signal::unix::SignalKind;

        match self {
            TerminationSignal::Interrupt => SignalKind::interrupt(),
            TerminationSignal::Quit => SignalKind::quit(),
            TerminationSignal::Terminate => SignalKind::terminate(),
        }
    }
}

impl fmt::Display for TerminationSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Why the shutdown sequence started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// An OS termination notification arrived.
    Signal(TerminationSignal),
    /// A caller-supplied future resolved.
    Requested,
}

/// A single-resolution "begin shutdown now" condition.
///
/// Exactly one source backs a trigger: either a caller future
/// ([`StopTrigger::from_future`]) or the OS termination notifications
/// ([`StopTrigger::os_signals`]).
#[must_use = "a stop trigger does nothing until a supervisor awaits it"]
pub struct StopTrigger {
    inner: BoxFuture<'static, Result<StopReason, SupervisorError>>,
}

impl StopTrigger {
    /// Stop when `stop` resolves. Its output is ignored.
    pub fn from_future<F>(stop: F) -> Self
    where
        F: Future + Send + 'static,
    {
        Self {
            inner: stop.map(|_| Ok(StopReason::Requested)).boxed(),
        }
    }

    /// Stop on the first of SIGINT, SIGQUIT or SIGTERM.
    ///
    /// On non-Unix platforms only Ctrl-C is observed.
    pub fn os_signals() -> Self {
        Self {
            inner: first_termination_signal().boxed(),
        }
    }
}

impl fmt::Debug for StopTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StopTrigger").finish_non_exhaustive()
    }
}

impl Future for StopTrigger {
    type Output = Result<StopReason, SupervisorError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.inner.as_mut().poll(cx)
    }
}

#[cfg(unix)]
async fn first_termination_signal() -> Result<StopReason, SupervisorError> {
    use crate::lifecycle::race::first_of;

    let [interrupt, quit, terminate] = TerminationSignal::ALL.map(subscribe);
    let subscriptions = [interrupt?, quit?, terminate?];
    tracing::debug!("Waiting for SIGINT, SIGQUIT or SIGTERM");

    let (which, _) = first_of(subscriptions).await;
    tracing::info!(signal = %which, "Termination signal received");
    Ok(StopReason::Signal(which))
}

/// Install a handler for `which` and wait for its next delivery.
#[cfg(unix)]
fn subscribe(
    which: TerminationSignal,
) -> Result<BoxFuture<'static, TerminationSignal>, SupervisorError> {
    let mut stream = tokio::signal::unix::signal(which.kind())
        .map_err(|source| SupervisorError::SignalSubscription { signal: which, source })?;

    Ok(async move {
        stream.recv().await;
        which
    }
    .boxed())
}

#[cfg(not(unix))]
async fn first_termination_signal() -> Result<StopReason, SupervisorError> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|source| SupervisorError::SignalSubscription {
            signal: TerminationSignal::Interrupt,
            source,
        })?;
    tracing::info!(signal = %TerminationSignal::Interrupt, "Termination signal received");
    Ok(StopReason::Signal(TerminationSignal::Interrupt))
}
