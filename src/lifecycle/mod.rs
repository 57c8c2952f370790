//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Load .env → Load config → Validate → Logging/metrics → Bind → Serve
//!
//! Shutdown (shutdown.rs):
//!     Signal received → Stop accepting → Drain connections → Exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//!
//! Janitor (janitor.rs):
//!     Interval tick → Purge sessions → Sweep rate-limit windows
//! ```
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Ordered startup: config first, then observability, then listeners

pub mod janitor;
pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use startup::{start, StartupError};
