/// Data Transfer Objects (DTOs) for REST API endpoints
use serde::{Deserialize, Serialize};

use crate::app_state::{CloseReason, SessionId, SessionSnapshot, SessionState};
use crate::protocol::ConnectionType;

/// Response DTO for a terminal session
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub id: SessionId,

    /// Session state, lowercase
    pub state: SessionState,

    /// Shell process id
    pub pid: u32,

    pub shell: String,

    /// Connection type (WebSocket/Channel)
    pub connection_type: ConnectionType,

    /// Session creation timestamp
    pub created_at: u64,

    /// Set once the session started closing
    #[serde(skip_serializing_if = "Option::is_none")]
    pub close_reason: Option<CloseReason>,
}

impl From<SessionSnapshot> for SessionResponse {
    fn from(snapshot: SessionSnapshot) -> Self {
        Self {
            id: snapshot.id,
            state: snapshot.state,
            pid: snapshot.pid,
            shell: snapshot.shell,
            connection_type: snapshot.connection_type,
            created_at: snapshot.created_at,
            close_reason: snapshot.close_reason,
        }
    }
}

/// Response DTO for an explicit close request
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CloseSessionResponse {
    /// Session ID
    pub session_id: SessionId,

    /// Whether this request is the one that closed the session
    pub success: bool,

    pub reason: String,
}

/// Generic success response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SuccessResponse {
    /// Success flag
    pub success: bool,

    /// Response message
    pub message: String,
}

/// Generic error response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    /// Error flag
    pub error: bool,

    /// Error message
    pub message: String,

    /// Optional error code
    pub code: Option<u16>,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

// ================ 文件 DTO ================
// Field names are what the editor frontend already sends and expects.

#[derive(Debug, Serialize)]
pub struct FileListResponse {
    pub files: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct FileContentResponse {
    pub filename: String,
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateFileRequest {
    pub filename: String,
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateFileRequest {
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct RenameFileRequest {
    pub new_filename: String,
}

/// Result of create/update/delete
#[derive(Debug, Serialize)]
pub struct FileMessageResponse {
    pub message: String,
    pub filename: String,
}

#[derive(Debug, Serialize)]
pub struct RenameFileResponse {
    pub message: String,
    pub old: String,
    pub new: String,
}
