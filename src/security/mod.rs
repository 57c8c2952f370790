//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → headers.rs (resolve client identifier)
//!     → rate_limit.rs (count client:path against the policy)
//!     → access_control.rs (session cookie presence per surface)
//!     → Pass to handlers
//! ```
//!
//! # Design Decisions
//! - Rate limiting runs before the session check
//! - Fail closed: reject on any security check failure
//! - Session validity is the handlers' job, not the gate's

pub mod access_control;
pub mod headers;
pub mod rate_limit;

pub use access_control::{AccessDecision, Surface};
pub use rate_limit::{
    MemoryRateLimitStore, RateLimitDecision, RateLimitPolicy, RateLimitStore, RateLimiter,
};
