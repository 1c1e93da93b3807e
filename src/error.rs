//! Error taxonomy for a supervised run.
//!
//! Only failures that end a run early are modeled here. A drain that runs
//! past its grace period is recovered inside the shutdown race and never
//! reaches the caller as an error.

use thiserror::Error;
use tokio::task::JoinError;

use crate::lifecycle::signals::TerminationSignal;
use crate::net::listener::ListenerError;

/// Errors returned by [`crate::lifecycle::ServerSupervisor`].
#[derive(Debug, Error)]
pub enum SupervisorError {
    /// The listen address could not be reserved. Nothing was served.
    #[error(transparent)]
    Bind(#[from] ListenerError),

    /// Subscribing to an OS termination notification failed.
    #[error("failed to subscribe to {signal} notifications: {source}")]
    SignalSubscription {
        signal: TerminationSignal,
        #[source]
        source: std::io::Error,
    },

    /// The serving task panicked or was cancelled from outside the supervisor.
    #[error("server task failed: {0}")]
    ServerTask(#[from] JoinError),
}

impl SupervisorError {
    /// True if the run never reached the serving state.
    pub fn is_bind_failure(&self) -> bool {
        matches!(self, SupervisorError::Bind(_))
    }
}
