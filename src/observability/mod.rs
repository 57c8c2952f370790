//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events via `tracing`)
//!     → metrics.rs (counters and histograms)
//!
//! Consumers:
//!     → stdout (fmt subscriber)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Request ID flows through the trace span and gate logs
//! - Metric updates are no-ops until a recorder is installed

pub mod logging;
pub mod metrics;
