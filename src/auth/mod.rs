//! Authentication subsystem.
//!
//! # Data Flow
//! ```text
//! POST /api/auth/login
//!     → password.rs (shared password check)
//!     → users.rs (identifier lookup)
//!     → session.rs (issue token, store keyed hash)
//!     → cookie.rs (Set-Cookie)
//!
//! Later requests:
//!     cookie.rs (read token) → session.rs (resolve) → users.rs (load account)
//! ```

pub mod cookie;
pub mod password;
pub mod session;
pub mod users;

pub use password::SharedPassword;
pub use session::{MemorySessionStore, Session, SessionManager, SessionStore};
pub use users::{MemoryUserStore, NewUser, ProfileUpdate, SafeUser, User, UserError, UserRole, UserStore};
