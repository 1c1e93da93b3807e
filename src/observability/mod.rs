//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events via `tracing`)
//!     → metrics.rs (counters and gauges via the `metrics` facade)
//!
//! Consumers:
//!     → stdout (pretty or JSON lines)
//!     → whatever recorder the embedding process installs
//! ```

pub mod logging;
pub mod metrics;

pub use logging::init_logging;
