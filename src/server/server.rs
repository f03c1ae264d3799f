/// Server implementation for the web shell
use std::net::SocketAddr;
use std::time::Duration;

use axum::{
    Router,
    http::Method,
    routing::{get, patch},
};
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

use crate::{app_state::AppState, handlers};

/// Bound on waiting for sessions to finish after a shutdown signal
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Build the application router with routes
pub fn build_router(state: AppState) -> Router {
    // Create CORS layer to allow cross-origin requests
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(Any);

    Router::new()
        .route("/", get(|| async { "rs_webshell - terminal bridge" }))
        .route("/health", get(handlers::rest::health_check))
        .route("/ping", get(handlers::rest::ping))
        // WebSocket endpoints for terminal communication
        .route("/terminal", get(handlers::websocket::terminal_handler))
        .route("/ws", get(handlers::websocket::terminal_handler))
        // REST API endpoints for session management
        .nest("/api", api_routes())
        .merge(file_routes())
        .layer(cors)
        .with_state(state)
}

/// Build API routes for session management
fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/sessions", get(handlers::rest::get_all_sessions))
        .route(
            "/sessions/:session_id",
            get(handlers::rest::get_session).delete(handlers::rest::close_session),
        )
}

fn file_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/files",
            get(handlers::files::list_files).post(handlers::files::create_file),
        )
        .route(
            "/files/:filename",
            get(handlers::files::read_file)
                .put(handlers::files::update_file)
                .delete(handlers::files::delete_file),
        )
        .route("/files/:filename/rename", patch(handlers::files::rename_file))
}

/// Bind the configured address
pub async fn bind(state: &AppState) -> Result<TcpListener, std::io::Error> {
    let addr = state
        .config
        .socket_addr()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string()))?;
    TcpListener::bind(addr).await
}

/// Run the HTTP server
pub async fn run_server(listener: TcpListener, state: AppState) -> Result<(), std::io::Error> {
    run_server_with_graceful_shutdown(listener, state, shutdown_signal()).await
}

/// Run the HTTP server with graceful shutdown support.
///
/// Once `shutdown` resolves the listener stops accepting, every live session
/// is closed and the server waits (bounded) for them to finish.
pub async fn run_server_with_graceful_shutdown<F>(
    listener: TcpListener,
    state: AppState,
    shutdown: F,
) -> Result<(), std::io::Error>
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    let addr: SocketAddr = listener.local_addr()?;
    info!("Server running on http://{}", addr);
    info!("WebSocket terminal available at ws://{}/terminal", addr);

    let sessions = state.sessions.clone();
    let router = build_router(state);

    // Sessions hold upgraded connections open, so they must be told to close
    // before axum's graceful shutdown can finish.
    let graceful_shutdown = async move {
        shutdown.await;
        sessions.shutdown(SHUTDOWN_TIMEOUT).await;
    };

    axum::serve(listener, router)
        .with_graceful_shutdown(graceful_shutdown)
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
pub async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C signal, initiating graceful shutdown..."),
            Err(e) => {
                error!("Failed to install Ctrl+C handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
                info!("Received SIGTERM signal, initiating graceful shutdown...");
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
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
