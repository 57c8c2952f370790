//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the server.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

use crate::auth::users::UserRole;

/// Root configuration for the chat server.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    /// Listener configuration (bind address, body limit).
    pub listener: ListenerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Per-route rate limiting applied by the request gate.
    pub rate_limit: RateLimitConfig,

    /// Session cookie and credential settings.
    pub auth: AuthConfig,

    /// Upload directory and size ceilings.
    pub uploads: UploadConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Background cleanup settings.
    pub janitor: JanitorConfig,

    /// Accounts created at startup.
    pub users: Vec<UserSeed>,
}

impl AppConfig {
    /// Sections that differ from `newer` and only take effect on restart.
    /// `rate_limit` is applied live and never reported.
    pub fn restart_only_changes(&self, newer: &AppConfig) -> Vec<&'static str> {
        let mut changed = Vec::new();
        if self.listener != newer.listener {
            changed.push("listener");
        }
        if self.timeouts != newer.timeouts {
            changed.push("timeouts");
        }
        if self.auth != newer.auth {
            changed.push("auth");
        }
        if self.uploads != newer.uploads {
            changed.push("uploads");
        }
        if self.observability != newer.observability {
            changed.push("observability");
        }
        if self.janitor != newer.janitor {
            changed.push("janitor");
        }
        if self.users != newer.users {
            changed.push("users");
        }
        changed
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:3000").
    pub bind_address: String,

    /// Largest request body accepted by any route, in bytes.
    pub max_body_bytes: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3000".to_string(),
            max_body_bytes: 21 * 1024 * 1024,
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Enable rate limiting.
    pub enabled: bool,

    /// Fixed window length in seconds.
    pub window_secs: u64,

    /// Requests per window for paths without an override.
    pub default_limit: u32,

    /// Table size above which expired records are swept.
    pub sweep_threshold: usize,

    /// Exact-path limits.
    pub overrides: Vec<RouteLimit>,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            window_secs: 60,
            default_limit: 120,
            sweep_threshold: 5_000,
            overrides: vec![
                RouteLimit::new("/api/auth/login", 20),
                RouteLimit::new("/api/me/profile-image", 30),
                RouteLimit::new("/api/media/upload", 30),
                RouteLimit::new("/api/media/giphy/search", 20),
                RouteLimit::new("/api/media/giphy/import", 10),
            ],
        }
    }
}

/// Limit for a single exact path.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct RouteLimit {
    /// Request path, matched exactly.
    pub path: String,

    /// Requests allowed per window.
    pub limit: u32,
}

impl RouteLimit {
    pub fn new(path: impl Into<String>, limit: u32) -> Self {
        Self {
            path: path.into(),
            limit,
        }
    }
}

/// Session and credential configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct AuthConfig {
    /// Name of the session cookie.
    pub cookie_name: String,

    /// Key mixed into every stored session token hash.
    pub session_secret: String,

    /// Password shared by every account.
    pub shared_password: String,

    /// Session lifetime in seconds.
    pub session_max_age_secs: u64,

    /// Mark the session cookie `Secure`.
    pub secure_cookie: bool,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            cookie_name: "session".to_string(),
            session_secret: String::new(),
            shared_password: String::new(),
            session_max_age_secs: 60 * 60 * 24 * 30,
            secure_cookie: false,
        }
    }
}

/// Upload storage configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct UploadConfig {
    /// Root directory; profile images and chat media live in subdirectories.
    pub base_dir: String,

    /// Size ceiling for profile images.
    pub max_profile_image_bytes: usize,

    /// Size ceiling for chat media.
    pub max_chat_media_bytes: usize,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            base_dir: "/data/uploads".to_string(),
            max_profile_image_bytes: 2 * 1024 * 1024,
            max_chat_media_bytes: 20 * 1024 * 1024,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Background cleanup configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct JanitorConfig {
    /// Seconds between sweeps of expired sessions and rate-limit records.
    pub interval_secs: u64,
}

impl Default for JanitorConfig {
    fn default() -> Self {
        Self { interval_secs: 600 }
    }
}

/// An account created when the server starts.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct UserSeed {
    pub username: String,

    #[serde(default)]
    pub email: Option<String>,

    pub display_name: String,

    #[serde(default)]
    pub role: UserRole,
}
