//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML) + environment
//!     → loader.rs (parse, deserialize, env overrides)
//!     → validation.rs (semantic checks)
//!     → AppConfig (validated, immutable)
//!     → shared via Arc to all subsystems
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → rate-limit policy swapped atomically
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; only the rate-limit policy hot-reloads
//! - All fields have defaults to allow minimal configs
//! - Secrets may come from the environment instead of the file

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, load_or_default, ConfigError};
pub use schema::{
    AppConfig, AuthConfig, JanitorConfig, ListenerConfig, ObservabilityConfig, RateLimitConfig,
    RouteLimit, TimeoutConfig, UploadConfig, UserSeed,
};
