//! Video endpoints: feed, detail, counters, sharing and upload

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use super::Page;
use super::auth::{MaybeUser, UploaderUser};
use crate::AppState;
use crate::domain::videos::{self, NewVideo};
use crate::models::{Video, Visibility};
use crate::services::counters::{LikeOutcome, ViewOutcome};
use crate::services::error::{LogErr, ServiceError};
use crate::services::storage::lenient;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/videos", get(list_videos).post(create_video))
        .route("/videos/{id}", get(get_video))
        .route("/videos/{id}/view", post(record_view))
        .route("/videos/{id}/like", post(toggle_like))
        .route("/videos/{id}/share", post(create_share))
}

/// Blob name under the uploader's prefix; only the final path component of
/// the client's filename is kept
pub fn blob_path(owner_id: i64, filename: &str) -> String {
    let name = filename
        .rsplit(['/', '\\'])
        .next()
        .filter(|n| !n.is_empty())
        .unwrap_or("upload");
    format!("{}/{}_{}", owner_id, Uuid::new_v4().simple(), name)
}

/// GET /videos - Public feed, newest first
async fn list_videos(
    State(state): State<Arc<AppState>>,
    Query(page): Query<Page>,
) -> Result<Json<Vec<Video>>, ServiceError> {
    let videos = videos::list_public_videos(&state.db, page.limit(), page.offset())
        .await
        .log_500("List public videos error")?;

    Ok(Json(videos))
}

/// GET /videos/{id} - Resolve a numeric id or share token
async fn get_video(
    State(state): State<Arc<AppState>>,
    MaybeUser(user): MaybeUser,
    Path(identifier): Path<String>,
) -> Result<Json<Video>, ServiceError> {
    let video = state.resolver.resolve(&identifier, user.as_ref()).await?;
    Ok(Json(video))
}

/// POST /videos/{id}/view
async fn record_view(
    State(state): State<Arc<AppState>>,
    MaybeUser(user): MaybeUser,
    Path(video_id): Path<i64>,
) -> Result<Json<ViewOutcome>, ServiceError> {
    let outcome = state.counters.record_view(video_id, user.as_ref()).await?;
    Ok(Json(outcome))
}

/// POST /videos/{id}/like - Toggle the caller's like
async fn toggle_like(
    State(state): State<Arc<AppState>>,
    MaybeUser(user): MaybeUser,
    Path(video_id): Path<i64>,
) -> Result<Json<LikeOutcome>, ServiceError> {
    let outcome = state.counters.toggle_like(video_id, user.as_ref()).await?;
    Ok(Json(outcome))
}

#[derive(Serialize)]
struct ShareResponse {
    id: i64,
    video_id: i64,
    share_token: Uuid,
    share_url: String,
    created_at: DateTime<Utc>,
}

/// POST /videos/{id}/share
async fn create_share(
    State(state): State<Arc<AppState>>,
    MaybeUser(user): MaybeUser,
    Path(video_id): Path<i64>,
) -> Result<(StatusCode, Json<ShareResponse>), ServiceError> {
    let share = state.counters.create_share(video_id, user.as_ref()).await?;

    Ok((
        StatusCode::CREATED,
        Json(ShareResponse {
            id: share.id,
            video_id: share.video_id,
            share_url: format!("{}/videos/{}", state.frontend_url, share.share_token),
            share_token: share.share_token,
            created_at: share.created_at,
        }),
    ))
}

#[derive(Debug, Deserialize)]
struct CreateVideoRequest {
    title: Option<String>,
    #[serde(default)]
    description: String,
    category: Option<String>,
    visibility: Option<String>,
    filename: Option<String>,
    thumbnail_filename: Option<String>,
    duration: Option<String>,
    video_view_limit: Option<i64>,
    auto_private_after: Option<DateTime<Utc>>,
}

#[derive(Serialize)]
struct CreateVideoResponse {
    video: Video,
    upload_url: Option<String>,
    thumbnail_upload_url: Option<String>,
}

/// POST /videos - Register a video and hand back signed upload URLs
async fn create_video(
    State(state): State<Arc<AppState>>,
    UploaderUser(user): UploaderUser,
    Json(req): Json<CreateVideoRequest>,
) -> Result<(StatusCode, Json<CreateVideoResponse>), ServiceError> {
    let title = req
        .title
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ServiceError::validation("title", "This field is required."))?;
    let filename = req
        .filename
        .as_deref()
        .filter(|f| !f.trim().is_empty())
        .ok_or_else(|| ServiceError::validation("filename", "This field is required."))?;
    let visibility = match req.visibility.as_deref() {
        None => Visibility::Public,
        Some(v) => Visibility::parse(v)
            .ok_or_else(|| ServiceError::validation("visibility", format!("\"{}\" is not a valid choice.", v)))?,
    };
    if req.video_view_limit.is_some_and(|limit| limit <= 0) {
        return Err(ServiceError::validation(
            "video_view_limit",
            "Ensure this value is greater than 0.",
        ));
    }

    let containers = &state.containers;
    let video_path = blob_path(user.id, filename);
    let upload_url = lenient(
        state.storage.upload_url(&containers.video, &video_path),
        "video upload",
    );
    let video_url = lenient(state.storage.view_url(&containers.video, &video_path), "video view")
        .unwrap_or_else(|| format!("{}/{}", containers.video, video_path));

    let thumbnail_path = req.thumbnail_filename.as_deref().map(|f| blob_path(user.id, f));
    let thumbnail_upload_url = thumbnail_path.as_deref().and_then(|path| {
        lenient(
            state.storage.upload_url(&containers.thumbnail, path),
            "thumbnail upload",
        )
    });
    let thumbnail_url = thumbnail_path.as_deref().map(|path| {
        lenient(state.storage.view_url(&containers.thumbnail, path), "thumbnail view")
            .unwrap_or_else(|| format!("{}/{}", containers.thumbnail, path))
    });

    let video = videos::insert_video(
        &state.db,
        &NewVideo {
            uploader_id: user.id,
            title,
            description: &req.description,
            category: req.category.as_deref().filter(|c| !c.is_empty()),
            visibility,
            video_url: &video_url,
            thumbnail_url: thumbnail_url.as_deref(),
            duration: req.duration.as_deref(),
            video_view_limit: req.video_view_limit,
            auto_private_after: req.auto_private_after,
        },
    )
    .await
    .log_500("Insert video error")?;

    tracing::info!(video_id = video.id, uploader_id = user.id, "video registered");

    Ok((
        StatusCode::CREATED,
        Json(CreateVideoResponse {
            video,
            upload_url,
            thumbnail_upload_url,
        }),
    ))
}
