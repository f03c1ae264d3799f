/// REST API handlers for terminal session management
use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::info;

use crate::{
    api::{
        ApiError,
        dto::{CloseSessionResponse, MessageResponse, SessionResponse, SuccessResponse},
    },
    app_state::{AppState, SessionId},
    service::SessionError,
};

/// Unparseable ids are reported like unknown ones.
fn parse_session_id(raw: &str) -> Result<SessionId, ApiError> {
    raw.parse::<SessionId>()
        .map_err(|_| ApiError::NotFound(format!("Session not found: {raw}")))
}

/// Get all terminal sessions
pub async fn get_all_sessions(State(state): State<AppState>) -> impl IntoResponse {
    info!("Getting all terminal sessions");

    let sessions: Vec<SessionResponse> = state
        .sessions
        .list()
        .await
        .into_iter()
        .map(SessionResponse::from)
        .collect();

    (StatusCode::OK, Json(sessions))
}

/// Get a specific terminal session by ID
pub async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    info!("Getting terminal session: {}", session_id);

    let id = parse_session_id(&session_id)?;
    let snapshot = state.sessions.get(&id).await?;
    Ok((StatusCode::OK, Json(SessionResponse::from(snapshot))))
}

/// Close a terminal session
pub async fn close_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    info!("Closing terminal session: {}", session_id);

    let id = parse_session_id(&session_id)?;
    let delivered = match state.sessions.close(&id).await {
        Ok(delivered) => delivered,
        Err(SessionError::NotFound(_)) => {
            return Err(ApiError::NotFound(format!("Session not found: {session_id}")));
        }
        Err(e) => return Err(e.into()),
    };
    let reason = if delivered {
        "Session closed by API request".to_string()
    } else {
        "Session was already closing".to_string()
    };

    Ok((
        StatusCode::OK,
        Json(CloseSessionResponse {
            session_id: id,
            success: delivered,
            reason,
        }),
    ))
}

/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(SuccessResponse {
            success: true,
            message: "Health check passed".to_string(),
        }),
    )
}

pub async fn ping() -> Json<MessageResponse> {
    Json(MessageResponse {
        message: "pong".to_string(),
    })
}
