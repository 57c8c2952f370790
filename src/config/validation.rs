//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (windows, limits, upload ceilings)
//! - Detect duplicate route overrides and seed accounts
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: AppConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::net::SocketAddr;

use crate::auth::users::{is_valid_username, normalize_identifier};
use crate::config::schema::AppConfig;

/// A single semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("auth.session_secret must be set")]
    MissingSessionSecret,

    #[error("auth.shared_password must be set")]
    MissingSharedPassword,

    #[error("auth.cookie_name must be a non-empty token")]
    InvalidCookieName,

    #[error("auth.session_max_age_secs must be greater than zero")]
    ZeroSessionMaxAge,

    #[error("rate_limit.window_secs must be greater than zero")]
    ZeroWindow,

    #[error("rate_limit.default_limit must be greater than zero")]
    ZeroDefaultLimit,

    #[error("rate limit override for {path} must be greater than zero")]
    ZeroRouteLimit { path: String },

    #[error("rate limit override path {path} is not under /api")]
    OverrideOutsideApi { path: String },

    #[error("rate limit override for {path} is declared twice")]
    DuplicateOverride { path: String },

    #[error("uploads.{field} must be between 1 and listener.max_body_bytes")]
    UploadLimitOutOfRange { field: &'static str },

    #[error("{field} is not a valid socket address: {value}")]
    InvalidAddress { field: &'static str, value: String },

    #[error("janitor.interval_secs must be greater than zero")]
    ZeroJanitorInterval,

    #[error("seed username {username:?} must match [a-z0-9_]{{3,24}}")]
    InvalidSeedUsername { username: String },

    #[error("seed username {username} is declared twice")]
    DuplicateSeedUsername { username: String },
}

/// Check a parsed configuration for semantic problems.
pub fn validate_config(config: &AppConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.auth.session_secret.trim().is_empty() {
        errors.push(ValidationError::MissingSessionSecret);
    }
    if config.auth.shared_password.is_empty() {
        errors.push(ValidationError::MissingSharedPassword);
    }
    if config.auth.cookie_name.is_empty()
        || !config
            .auth
            .cookie_name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
    {
        errors.push(ValidationError::InvalidCookieName);
    }
    if config.auth.session_max_age_secs == 0 {
        errors.push(ValidationError::ZeroSessionMaxAge);
    }

    let rate_limit = &config.rate_limit;
    if rate_limit.window_secs == 0 {
        errors.push(ValidationError::ZeroWindow);
    }
    if rate_limit.default_limit == 0 {
        errors.push(ValidationError::ZeroDefaultLimit);
    }
    let mut seen_paths = HashSet::new();
    for route in &rate_limit.overrides {
        if route.limit == 0 {
            errors.push(ValidationError::ZeroRouteLimit {
                path: route.path.clone(),
            });
        }
        if !route.path.starts_with("/api/") {
            errors.push(ValidationError::OverrideOutsideApi {
                path: route.path.clone(),
            });
        }
        if !seen_paths.insert(route.path.as_str()) {
            errors.push(ValidationError::DuplicateOverride {
                path: route.path.clone(),
            });
        }
    }

    let max_body = config.listener.max_body_bytes;
    if config.uploads.max_profile_image_bytes == 0 || config.uploads.max_profile_image_bytes > max_body {
        errors.push(ValidationError::UploadLimitOutOfRange {
            field: "max_profile_image_bytes",
        });
    }
    if config.uploads.max_chat_media_bytes == 0 || config.uploads.max_chat_media_bytes > max_body {
        errors.push(ValidationError::UploadLimitOutOfRange {
            field: "max_chat_media_bytes",
        });
    }

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field: "listener.bind_address",
            value: config.listener.bind_address.clone(),
        });
    }
    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidAddress {
            field: "observability.metrics_address",
            value: config.observability.metrics_address.clone(),
        });
    }

    if config.janitor.interval_secs == 0 {
        errors.push(ValidationError::ZeroJanitorInterval);
    }

    let mut seen_users = HashSet::new();
    for seed in &config.users {
        let username = normalize_identifier(&seed.username);
        if !is_valid_username(&username) {
            errors.push(ValidationError::InvalidSeedUsername {
                username: seed.username.clone(),
            });
        } else if !seen_users.insert(username.clone()) {
            errors.push(ValidationError::DuplicateSeedUsername { username });
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
