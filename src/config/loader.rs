//! Configuration loading from disk and the environment.

use std::fs;
use std::path::Path;

use crate::config::schema::AppConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load, apply environment overrides to, and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<AppConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let config: AppConfig = toml::from_str(&content)?;
    finish(config)
}

/// Like [`load_config`], but starts from defaults when no file is given.
pub fn load_or_default(path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    match path {
        Some(path) => load_config(path),
        None => finish(AppConfig::default()),
    }
}

fn finish(mut config: AppConfig) -> Result<AppConfig, ConfigError> {
    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Overlay deployment secrets and paths from the environment.
///
/// Size overrides that are not positive integers are ignored.
pub fn apply_env_overrides<F>(config: &mut AppConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(secret) = lookup("SESSION_SECRET").filter(|v| !v.is_empty()) {
        config.auth.session_secret = secret;
    }
    if let Some(password) = lookup("SHARED_PASSWORD").filter(|v| !v.is_empty()) {
        config.auth.shared_password = password;
    }
    if let Some(dir) = lookup("UPLOAD_BASE_DIR") {
        let dir = dir.trim();
        if !dir.is_empty() {
            config.uploads.base_dir = dir.to_string();
        }
    }
    if let Some(bytes) = lookup("MAX_PROFILE_IMAGE_BYTES").and_then(|v| parse_positive(&v)) {
        config.uploads.max_profile_image_bytes = bytes;
    }
    if let Some(bytes) = lookup("MAX_CHAT_MEDIA_BYTES").and_then(|v| parse_positive(&v)) {
        config.uploads.max_chat_media_bytes = bytes;
    }
    if let Some(addr) = lookup("BIND_ADDRESS").filter(|v| !v.trim().is_empty()) {
        config.listener.bind_address = addr.trim().to_string();
    }
}

fn parse_positive(raw: &str) -> Option<usize> {
    raw.trim().parse::<usize>().ok().filter(|v| *v > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_env_overrides() {
        let mut config = AppConfig::default();
        apply_env_overrides(
            &mut config,
            env(&[
                ("SESSION_SECRET", "s3cret"),
                ("SHARED_PASSWORD", "letmein"),
                ("UPLOAD_BASE_DIR", "  /tmp/up  "),
                ("MAX_PROFILE_IMAGE_BYTES", "1024"),
                ("MAX_CHAT_MEDIA_BYTES", "not-a-number"),
            ]),
        );

        assert_eq!(config.auth.session_secret, "s3cret");
        assert_eq!(config.auth.shared_password, "letmein");
        assert_eq!(config.uploads.base_dir, "/tmp/up");
        assert_eq!(config.uploads.max_profile_image_bytes, 1024);
        assert_eq!(config.uploads.max_chat_media_bytes, 20 * 1024 * 1024);
    }

    #[test]
    fn test_zero_size_override_ignored() {
        let mut config = AppConfig::default();
        apply_env_overrides(&mut config, env(&[("MAX_CHAT_MEDIA_BYTES", "0")]));
        assert_eq!(config.uploads.max_chat_media_bytes, 20 * 1024 * 1024);
    }

    #[test]
    fn test_parse_partial_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[auth]
session_secret = "from-file"
shared_password = "pw"

[rate_limit]
default_limit = 60
overrides = [{{ path = "/api/auth/login", limit = 5 }}]

[[users]]
username = "admin"
display_name = "Admin"
role = "ADMIN"
"#
        )
        .unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.rate_limit.default_limit, 60);
        assert_eq!(config.rate_limit.window_secs, 60);
        assert_eq!(config.rate_limit.overrides.len(), 1);
        assert_eq!(config.users.len(), 1);
        assert_eq!(config.listener.bind_address, "0.0.0.0:3000");
    }

    #[test]
    fn test_invalid_file_reports_validation() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[rate_limit]\nwindow_secs = 0").unwrap();

        match load_config(file.path()) {
            Err(ConfigError::Validation(errors)) => {
                assert!(errors.contains(&ValidationError::ZeroWindow));
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }
}
