//! Bounded shutdown: an orderly drain raced against a countdown.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use futures_util::FutureExt;

use crate::lifecycle::race::first_of;
use crate::observability::metrics;

/// Maximum time in-flight work gets after a stop before it is severed.
///
/// Zero means no draining at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct GracePeriod(Duration);

impl GracePeriod {
    pub const ZERO: GracePeriod = GracePeriod(Duration::ZERO);

    pub fn from_secs(secs: u64) -> Self {
        Self(Duration::from_secs(secs))
    }

    pub fn as_duration(&self) -> Duration {
        self.0
    }
}

impl From<Duration> for GracePeriod {
    fn from(duration: Duration) -> Self {
        Self(duration)
    }
}

impl fmt::Display for GracePeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.0)
    }
}

/// How a shutdown ended. Both variants are successful completions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownOutcome {
    /// All in-flight work finished before the grace period ran out.
    Graceful,
    /// The grace period ran out and remaining work was severed.
    ForcedAfterTimeout,
}

impl ShutdownOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            ShutdownOutcome::Graceful => "graceful",
            ShutdownOutcome::ForcedAfterTimeout => "forced",
        }
    }
}

/// Something that can be stopped politely or forcibly.
pub trait Drain: Send {
    /// What the target reports once it has stopped.
    type Report: Send;

    /// Stop taking new work and resolve once in-flight work has finished.
    ///
    /// May be dropped before completion if the grace period runs out;
    /// `force_stop` is then called.
    fn drain(&mut self) -> impl Future<Output = Self::Report> + Send;

    /// Sever all remaining work immediately and resolve once it is gone.
    fn force_stop(self) -> impl Future<Output = Self::Report> + Send;
}

/// Races [`Drain::drain`] against a countdown of the grace period.
#[derive(Debug, Clone, Copy)]
pub struct ShutdownRace {
    grace_period: GracePeriod,
}

impl ShutdownRace {
    pub fn new(grace_period: GracePeriod) -> Self {
        Self { grace_period }
    }

    /// Drain `target`, forcing it if the grace period elapses first.
    ///
    /// The drain and the countdown start together. A drain that is ready at
    /// the same instant the countdown fires counts as graceful. Whichever
    /// side loses is dropped before this returns, so no timer outlives the
    /// race. `force_stop` runs at most once, and only when the countdown wins.
    pub async fn run<D: Drain>(self, mut target: D) -> (ShutdownOutcome, D::Report) {
        tracing::debug!(grace_period = %self.grace_period, "Server has begun draining");

        let drained = {
            let contenders = [
                target.drain().map(Some).boxed(),
                tokio::time::sleep(self.grace_period.as_duration())
                    .map(|_| None)
                    .boxed(),
            ];
            first_of(contenders).await.0
        };

        let (outcome, report) = match drained {
            Some(report) => {
                tracing::debug!("Server has exited gracefully");
                (ShutdownOutcome::Graceful, report)
            }
            None => {
                tracing::warn!(
                    grace_period = %self.grace_period,
                    "Server failed to stop gracefully within the grace period; hard-stopping now"
                );
                let report = target.force_stop().await;
                tracing::debug!("Server was forcefully stopped");
                (ShutdownOutcome::ForcedAfterTimeout, report)
            }
        };

        metrics::record_shutdown(outcome);
        (outcome, report)
    }
}
