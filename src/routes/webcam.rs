//! Webcam recordings made while watching a video

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::post,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::auth::AuthUser;
use super::videos::blob_path;
use crate::AppState;
use crate::constants::WEBCAM_UPLOAD_POINTS;
use crate::domain::recordings;
use crate::models::{UploadStatus, WebcamRecording};
use crate::services::error::{LogErr, ServiceError};
use crate::services::storage::lenient;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/videos/{id}/webcam-upload", post(webcam_upload))
        .route("/webcam-recordings/{id}/status", post(update_status))
}

#[derive(Debug, Deserialize)]
struct WebcamUploadRequest {
    filename: Option<String>,
}

#[derive(Serialize)]
struct WebcamUploadResponse {
    upload_url: Option<String>,
    recording_id: i64,
    message: String,
    total_points: i64,
}

/// POST /videos/{id}/webcam-upload
///
/// Creates a pending recording and credits the recorder, whether or not a
/// signed upload URL could be produced.
async fn webcam_upload(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(video_id): Path<i64>,
    Json(req): Json<WebcamUploadRequest>,
) -> Result<(StatusCode, Json<WebcamUploadResponse>), ServiceError> {
    let filename = req
        .filename
        .as_deref()
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .ok_or_else(|| ServiceError::validation("filename", "This field is required."))?;

    if state.ledger.find_video(video_id).await?.is_none() {
        return Err(ServiceError::NotFound("Video not found".to_string()));
    }

    let container = &state.containers.webcam;
    let path = format!("{}/{}", video_id, blob_path(user.id, filename));
    let upload_url = lenient(state.storage.upload_url(container, &path), "webcam upload");
    let view_url = lenient(state.storage.view_url(container, &path), "webcam view");

    let upload = state
        .ledger
        .record_webcam_upload(
            video_id,
            user.id,
            filename,
            view_url.as_deref(),
            WEBCAM_UPLOAD_POINTS,
        )
        .await?;

    tracing::info!(
        recording_id = upload.recording.id,
        video_id,
        user_id = user.id,
        "webcam recording registered"
    );

    Ok((
        StatusCode::CREATED,
        Json(WebcamUploadResponse {
            upload_url,
            recording_id: upload.recording.id,
            message: format!(
                "Upload URL generated and {} points awarded",
                WEBCAM_UPLOAD_POINTS
            ),
            total_points: upload.total_points,
        }),
    ))
}

#[derive(Debug, Deserialize)]
struct StatusRequest {
    status: Option<String>,
}

/// POST /webcam-recordings/{id}/status - Recorder reports the upload outcome
async fn update_status(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(recording_id): Path<i64>,
    Json(req): Json<StatusRequest>,
) -> Result<Json<WebcamRecording>, ServiceError> {
    let status = match req.status.as_deref().map(UploadStatus::parse) {
        Some(Some(status @ (UploadStatus::Completed | UploadStatus::Failed))) => status,
        _ => {
            return Err(ServiceError::validation(
                "status",
                "Must be \"completed\" or \"failed\".",
            ));
        }
    };

    let recording = recordings::set_upload_status(&state.db, recording_id, user.id, status)
        .await
        .log_500("Update recording status error")?
        .ok_or_else(|| ServiceError::NotFound("Recording not found".to_string()))?;

    Ok(Json(recording))
}
