/// REST handlers for the in-memory file store
use axum::extract::{Json, Path, State};
use tracing::info;

use crate::api::ApiError;
use crate::api::dto::{
    CreateFileRequest, FileContentResponse, FileListResponse, FileMessageResponse,
    RenameFileRequest, RenameFileResponse, UpdateFileRequest,
};
use crate::app_state::AppState;

pub async fn list_files(State(state): State<AppState>) -> Json<FileListResponse> {
    Json(FileListResponse {
        files: state.files.list().await,
    })
}

pub async fn read_file(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Result<Json<FileContentResponse>, ApiError> {
    let content = state.files.read(&filename).await?;
    Ok(Json(FileContentResponse { filename, content }))
}

pub async fn create_file(
    State(state): State<AppState>,
    Json(req): Json<CreateFileRequest>,
) -> Result<Json<FileMessageResponse>, ApiError> {
    state.files.create(&req.filename, req.content).await?;
    info!("Created file: {}", req.filename);
    Ok(Json(FileMessageResponse {
        message: "File created".to_string(),
        filename: req.filename,
    }))
}

pub async fn update_file(
    State(state): State<AppState>,
    Path(filename): Path<String>,
    Json(req): Json<UpdateFileRequest>,
) -> Result<Json<FileMessageResponse>, ApiError> {
    state.files.update(&filename, req.content).await?;
    info!("Updated file: {}", filename);
    Ok(Json(FileMessageResponse {
        message: "File updated".to_string(),
        filename,
    }))
}

pub async fn delete_file(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Result<Json<FileMessageResponse>, ApiError> {
    state.files.delete(&filename).await?;
    info!("Deleted file: {}", filename);
    Ok(Json(FileMessageResponse {
        message: "File deleted".to_string(),
        filename,
    }))
}

pub async fn rename_file(
    State(state): State<AppState>,
    Path(filename): Path<String>,
    Json(req): Json<RenameFileRequest>,
) -> Result<Json<RenameFileResponse>, ApiError> {
    state.files.rename(&filename, &req.new_filename).await?;
    info!("Renamed file: {} -> {}", filename, req.new_filename);
    Ok(Json(RenameFileResponse {
        message: "File renamed".to_string(),
        old: filename,
        new: req.new_filename,
    }))
}
