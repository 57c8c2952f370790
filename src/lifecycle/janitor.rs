//! Periodic cleanup of in-memory tables.
//!
//! Expired or revoked sessions are purged and stale rate-limit windows are
//! swept on a fixed interval until shutdown.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::auth::SessionManager;
use crate::security::RateLimiter;

/// Counts from one cleanup pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Sweep {
    pub sessions_purged: usize,
    pub rate_limit_keys_swept: usize,
}

pub fn sweep_once(sessions: &SessionManager, limiter: &RateLimiter) -> Sweep {
    Sweep {
        sessions_purged: sessions.purge_expired(),
        rate_limit_keys_swept: limiter.sweep(),
    }
}

pub fn spawn(
    sessions: Arc<SessionManager>,
    limiter: Arc<RateLimiter>,
    interval: Duration,
    mut shutdown: broadcast::Receiver<()>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval.max(Duration::from_secs(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let sweep = sweep_once(&sessions, &limiter);
                    tracing::debug!(
                        sessions_purged = sweep.sessions_purged,
                        rate_limit_keys_swept = sweep.rate_limit_keys_swept,
                        "Janitor pass complete"
                    );
                }
                _ = shutdown.recv() => break,
            }
        }
        tracing::debug!("Janitor stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::MemorySessionStore;
    use crate::config::RateLimitConfig;
    use crate::lifecycle::Shutdown;
    use std::time::{Instant, SystemTime};
    use uuid::Uuid;

    fn sessions() -> Arc<SessionManager> {
        Arc::new(SessionManager::new(
            "secret",
            Duration::from_secs(60),
            Arc::new(MemorySessionStore::new()),
        ))
    }

    #[test]
    fn test_sweep_once() {
        let sessions = sessions();
        let limiter = RateLimiter::in_memory(&RateLimitConfig {
            window_secs: 1,
            ..RateLimitConfig::default()
        });

        let live = sessions.create(Uuid::new_v4());
        sessions.create_at(Uuid::new_v4(), SystemTime::now() - Duration::from_secs(120));
        limiter.check("10.0.0.1", "/api/me");
        std::thread::sleep(Duration::from_millis(1100));
        limiter.check_at("10.0.0.2", "/api/me", Instant::now() + Duration::from_secs(60));

        let sweep = sweep_once(&sessions, &limiter);
        assert_eq!(sweep.sessions_purged, 1);
        assert_eq!(sweep.rate_limit_keys_swept, 1);
        assert!(sessions.resolve(&live).is_some());
        assert_eq!(limiter.tracked_keys(), 1);
    }

    #[tokio::test]
    async fn test_stops_on_shutdown() {
        let shutdown = Shutdown::new();
        let limiter = Arc::new(RateLimiter::in_memory(&RateLimitConfig::default()));
        let handle = spawn(sessions(), limiter, Duration::from_secs(3600), shutdown.subscribe());

        shutdown.trigger();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("janitor did not stop")
            .unwrap();
    }
}
