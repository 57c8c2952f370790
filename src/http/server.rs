//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Build the shared application state from configuration
//! - Create the Axum Router with all handlers
//! - Wire up middleware (request gate, body limit, timeout, request ID, tracing)
//! - Serve on a listener until shutdown
//! - Apply rate-limit policy reloads from the config watcher

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::DefaultBodyLimit,
    http::Request,
    middleware,
    routing::{delete, get, post, put},
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::admin;
use crate::auth::{MemorySessionStore, MemoryUserStore, SessionManager, SharedPassword, UserError, UserStore};
use crate::chat::{ConversationStore, MemoryConversationStore};
use crate::config::AppConfig;
use crate::http::handlers::{auth, conversations, health, me, media};
use crate::http::middleware::gate_middleware;
use crate::http::request::{propagate_request_id_layer, set_request_id_layer, RequestIdExt};
use crate::http::response::ApiError;
use crate::lifecycle::janitor;
use crate::media::{MediaCatalog, MediaStorage, MemoryMediaCatalog};
use crate::security::{RateLimitPolicy, RateLimiter};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub users: Arc<dyn UserStore>,
    pub sessions: Arc<SessionManager>,
    pub password: Arc<SharedPassword>,
    pub storage: MediaStorage,
    pub media: Arc<dyn MediaCatalog>,
    pub conversations: Arc<dyn ConversationStore>,
    pub limiter: Arc<RateLimiter>,
}

impl AppState {
    /// In-memory state seeded with the configured accounts.
    pub fn new(config: AppConfig) -> Result<Self, UserError> {
        let users = MemoryUserStore::seeded(&config.users)?;
        let sessions = SessionManager::new(
            config.auth.session_secret.clone(),
            Duration::from_secs(config.auth.session_max_age_secs),
            Arc::new(MemorySessionStore::new()),
        );

        Ok(Self {
            users: Arc::new(users),
            sessions: Arc::new(sessions),
            password: Arc::new(SharedPassword::new(&config.auth.shared_password)),
            storage: MediaStorage::new(&config.uploads.base_dir),
            media: Arc::new(MemoryMediaCatalog::new()),
            conversations: Arc::new(MemoryConversationStore::new()),
            limiter: Arc::new(RateLimiter::in_memory(&config.rate_limit)),
            config: Arc::new(config),
        })
    }
}

/// HTTP server for the chat backend.
pub struct HttpServer {
    router: Router,
    state: AppState,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: AppConfig) -> Result<Self, UserError> {
        let state = AppState::new(config)?;
        Ok(Self::with_state(state))
    }

    pub fn with_state(state: AppState) -> Self {
        let router = build_router(state.clone());
        Self { router, state }
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(
        self,
        listener: TcpListener,
        mut config_updates: mpsc::UnboundedReceiver<AppConfig>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let janitor = janitor::spawn(
            self.state.sessions.clone(),
            self.state.limiter.clone(),
            Duration::from_secs(self.state.config.janitor.interval_secs),
            shutdown.resubscribe(),
        );

        let limiter = self.state.limiter.clone();
        let mut applied = (*self.state.config).clone();
        let reloader = tokio::spawn(async move {
            while let Some(new_config) = config_updates.recv().await {
                let ignored = applied.restart_only_changes(&new_config);
                if !ignored.is_empty() {
                    tracing::info!(sections = ?ignored, "Config changes need a restart to apply");
                }
                limiter.reload(RateLimitPolicy::from_config(&new_config.rate_limit));
                applied.rate_limit = new_config.rate_limit;
            }
        });

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        reloader.abort();
        let _ = janitor.await;
        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Build the Axum router with all middleware layers.
#[allow(deprecated)]
pub fn build_router(state: AppState) -> Router {
    let config = state.config.clone();

    Router::new()
        .route("/api/health", get(health::health))
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/logout", post(auth::logout))
        .route("/api/me", get(me::get_me).patch(me::update_me))
        .route("/api/me/profile-image", post(me::upload_profile_image))
        .route(
            "/api/conversations",
            get(conversations::list_conversations).post(conversations::create_conversation),
        )
        .route(
            "/api/conversations/{id}",
            get(conversations::get_conversation).patch(conversations::rename_conversation),
        )
        .route("/api/conversations/{id}/participants", post(conversations::invite_participant))
        .route(
            "/api/conversations/{id}/participants/{user_id}",
            delete(conversations::remove_participant),
        )
        .route(
            "/api/conversations/{id}/messages",
            get(conversations::list_messages).post(conversations::post_message),
        )
        .route(
            "/api/conversations/{id}/messages/{message_id}/reactions",
            put(conversations::put_reaction).delete(conversations::delete_reaction),
        )
        .route("/api/media/upload", post(media::upload_media))
        .route("/api/media/{media_id}", get(media::get_media))
        .route("/uploads/profile-images/{filename}", get(media::serve_profile_image))
        .merge(admin::router())
        .fallback(not_found)
        .layer(middleware::from_fn_with_state(state.clone(), gate_middleware))
        .layer(DefaultBodyLimit::max(config.listener.max_body_bytes))
        .with_state(state)
        .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
        .layer(propagate_request_id_layer())
        .layer(TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
            tracing::info_span!(
                "request",
                method = %request.method(),
                path = %request.uri().path(),
                request_id = %request.request_id(),
            )
        }))
        .layer(set_request_id_layer())
}

async fn not_found() -> ApiError {
    ApiError::NotFound("Not found.".into())
}
