use axum::{
    extract::State,
    extract::ws::WebSocketUpgrade,
    response::{IntoResponse, Response},
};
use tracing::{debug, error, info, warn};

use crate::{api::ApiError, app_state::AppState, protocol::WebSocketConnection};

/// Terminal websocket endpoint.
///
/// The shell is spawned before the upgrade is accepted, so a spawn failure
/// turns into an HTTP 500 instead of a websocket that closes right away.
pub async fn terminal_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> Result<Response, ApiError> {
    let session = state.sessions.open().map_err(|e| {
        error!("Failed to create terminal session: {}", e);
        ApiError::from(e)
    })?;
    let session_id = session.id();
    info!(%session_id, pid = session.pid(), "Accepting terminal websocket");

    let response = ws
        .on_failed_upgrade(move |e| {
            // The session was moved into the upgrade callback and is dropped with it.
            warn!(%session_id, "WebSocket upgrade failed: {}", e);
        })
        .on_upgrade(move |socket| async move {
            match session.run(WebSocketConnection::new(socket)).await {
                Ok(report) => debug!(
                    %session_id,
                    reason = %report.reason,
                    failures = report.failures.len(),
                    "Terminal websocket finished"
                ),
                Err(e) => error!(%session_id, "Terminal session failed: {}", e),
            }
        });
    Ok(response.into_response())
}
