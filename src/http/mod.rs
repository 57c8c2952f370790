//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware stack)
//!     → request.rs (assign x-request-id)
//!     → middleware/gate.rs (rate limit, session cookie presence)
//!     → extract.rs (resolve session to an account)
//!     → handlers/ (resource logic)
//!     → response.rs (errors as JSON)
//!     → Send to client
//! ```

pub mod extract;
pub mod handlers;
pub mod middleware;
pub mod request;
pub mod response;
pub mod server;

pub use request::{RequestIdExt, X_REQUEST_ID};
pub use response::{ApiError, ApiResult};
pub use server::{build_router, AppState, HttpServer};
