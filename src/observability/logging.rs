//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the `tracing` subscriber once at startup
//! - Take the default filter from configuration, `RUST_LOG` wins when set

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter used when `RUST_LOG` is unset.
pub fn default_directive(log_level: &str) -> String {
    format!("huddle={log_level},tower_http={log_level}")
}

/// Install the global subscriber. Later calls are ignored.
pub fn init_logging(log_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(log_level)));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directive() {
        assert_eq!(default_directive("debug"), "huddle=debug,tower_http=debug");
    }

    #[test]
    fn test_init_twice_is_harmless() {
        init_logging("info");
        init_logging("warn");
    }
}
