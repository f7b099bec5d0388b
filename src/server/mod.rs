//! HTTP server for the chat API
//!
//! Routes (all JSON unless noted):
//!
//! | Method | Path | Handler |
//! |---|---|---|
//! | POST | `/api/v1/chat` | [`chat::handle_chat`] (JSON or `text/event-stream`) |
//! | GET | `/api/v1/health`, `/health` | [`health::health`] |
//! | GET | `/api/v1/docs` | [`docs::openapi`] |
//! | GET | `/api/v1/conversations/stats` | [`conversations::stats`] |
//! | GET, DELETE | `/api/v1/conversations/:id` | [`conversations`] |
//!
//! Anything else answers 404 `{"error":"Not Found"}`; a known path with the
//! wrong method answers 405 `{"error":"Method Not Allowed"}`.

pub mod chat;
pub mod conversations;
pub mod docs;
pub mod error;
pub mod health;
pub mod middleware;
pub mod validation;

use std::future::Future;
use std::sync::Arc;

use anyhow::anyhow;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tokio::task::JoinError;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::conversation::ConversationStore;
use crate::error::{ChatRelayError, Result};
use crate::providers::{create_provider, CompletionProvider};

/// Shared handles passed to every handler
#[derive(Clone)]
pub struct AppState {
    /// Conversation memory
    pub store: Arc<ConversationStore>,
    /// Upstream completion provider
    pub provider: Arc<dyn CompletionProvider>,
}

impl AppState {
    /// Bundles the store and provider
    pub fn new(store: Arc<ConversationStore>, provider: Arc<dyn CompletionProvider>) -> Self {
        Self { store, provider }
    }
}

/// Builds the application router
pub fn router(state: AppState, body_limit_bytes: usize) -> Router {
    let api = Router::new()
        .route("/chat", post(chat::handle_chat))
        .route("/health", get(health::health))
        .route("/docs", get(docs::openapi))
        .route("/conversations/stats", get(conversations::stats))
        .route(
            "/conversations/:id",
            get(conversations::get_conversation).delete(conversations::delete_conversation),
        )
        .method_not_allowed_fallback(error::method_not_allowed);

    Router::new()
        .nest("/api/v1", api)
        .route("/health", get(health::health))
        .method_not_allowed_fallback(error::method_not_allowed)
        .fallback(error::not_found)
        .layer(DefaultBodyLimit::max(body_limit_bytes))
        .layer(axum::middleware::from_fn(middleware::log_requests))
        .layer(axum::middleware::from_fn(middleware::cors))
        .with_state(state)
}

/// Runs the chat server until Ctrl-C or SIGTERM
///
/// # Errors
///
/// Returns error if the provider configuration is invalid, the address
/// cannot be bound, or a background task fails.
pub async fn serve(config: &Config) -> Result<()> {
    config.validate_provider()?;

    let provider = create_provider(&config.provider)?;
    let store = Arc::new(ConversationStore::new(&config.store));

    let address = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&address).await.map_err(|e| {
        ChatRelayError::Config(format!("Failed to bind {}: {}", address, e))
    })?;

    tracing::info!(
        address = %address,
        provider = provider.name(),
        "Chat server listening"
    );

    run(listener, AppState::new(store, provider), config, shutdown_signal()).await
}

/// Serves on an already bound listener until `shutdown` resolves
///
/// The expiry sweeper runs alongside the server. If it dies, the server is
/// stopped and an error returned so the process exits non-zero.
///
/// # Errors
///
/// Returns error if serving fails or the sweeper stops unexpectedly.
pub async fn run<F>(listener: TcpListener, state: AppState, config: &Config, shutdown: F) -> Result<()>
where
    F: Future<Output = ()>,
{
    let token = CancellationToken::new();
    let mut sweeper = state
        .store
        .spawn_sweeper(config.store.sweep_interval(), token.clone());

    let app = router(state, config.server.body_limit_bytes);
    let server_token = token.clone();
    let mut server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(server_token.cancelled_owned())
            .await
    });

    tokio::select! {
        _ = shutdown => {
            tracing::info!("Shutting down chat server");
            token.cancel();
            let served = server.await;
            let _ = sweeper.await;
            server_outcome(served)
        }
        joined = &mut sweeper => {
            token.cancel();
            let _ = server.await;
            match joined {
                Err(e) if e.is_panic() => {
                    tracing::error!("Conversation sweeper panicked, shutting down");
                    Err(anyhow!("conversation sweeper panicked"))
                }
                _ => Err(anyhow!("conversation sweeper stopped unexpectedly")),
            }
        }
        served = &mut server => {
            token.cancel();
            let _ = sweeper.await;
            server_outcome(served)
        }
    }
}

fn server_outcome(served: std::result::Result<std::io::Result<()>, JoinError>) -> Result<()> {
    match served {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(ChatRelayError::Io(e).into()),
        Err(e) => Err(anyhow!("server task failed: {}", e)),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
