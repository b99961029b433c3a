//! Admin endpoints: user lookup and promotion, video moderation, statistics,
//! webcam recordings

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tower_governor::{
    GovernorLayer, governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor,
};

use super::auth::AdminUser;
use crate::AppState;
use crate::constants::STATS_TOP_N;
use crate::domain::recordings::{self, RecordingFilter, RecordingListRow};
use crate::domain::videos::{self, CategoryCount, VideoRanking, VideoUpdate};
use crate::domain::users;
use crate::models::{UploadStatus, User, Video, Visibility};
use crate::services::error::{LogErr, ServiceError};
use crate::services::promotion::Promoted;

pub fn routes() -> Router<Arc<AppState>> {
    // Promotion re-authenticates against the identity provider; keep it slow
    let rate_limit_config = GovernorConfigBuilder::default()
        .per_second(6)
        .burst_size(10)
        .key_extractor(SmartIpKeyExtractor)
        .finish()
        .expect("Failed to build rate limit config");

    let rate_limit_layer = GovernorLayer {
        config: rate_limit_config.into(),
    };

    let promote = Router::new()
        .route("/admin/users/promote", post(promote_user))
        .layer(rate_limit_layer);

    Router::new()
        .route("/admin/users/search", get(search_user))
        .route("/admin/videos", get(list_videos))
        .route("/admin/videos/stats", get(video_stats))
        .route(
            "/admin/videos/{id}",
            get(get_video).patch(update_video).delete(delete_video),
        )
        .route("/admin/webcam-recordings", get(list_recordings))
        .merge(promote)
}

#[derive(Debug, Deserialize)]
struct SearchQuery {
    email: Option<String>,
}

/// GET /admin/users/search?email= - Case-insensitive exact match
async fn search_user(
    State(state): State<Arc<AppState>>,
    AdminUser(_admin): AdminUser,
    Query(query): Query<SearchQuery>,
) -> Result<Json<User>, ServiceError> {
    let email = query
        .email
        .as_deref()
        .map(str::trim)
        .filter(|e| !e.is_empty())
        .ok_or_else(|| ServiceError::validation("email", "Email parameter is required"))?;

    let user = users::find_user_by_email(&state.db, email)
        .await
        .log_500("Find user by email error")?
        .ok_or_else(|| ServiceError::NotFound("User not found".to_string()))?;

    Ok(Json(user))
}

#[derive(Debug, Deserialize)]
struct PromoteRequest {
    user_id: Option<i64>,
    admin_password: Option<String>,
}

/// POST /admin/users/promote
async fn promote_user(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    Json(req): Json<PromoteRequest>,
) -> Result<Json<Promoted>, ServiceError> {
    tracing::info!(admin_id = admin.id, target = ?req.user_id, "promotion requested");

    let promoted = state
        .promotion
        .promote(req.user_id, req.admin_password.as_deref())
        .await?;

    Ok(Json(promoted))
}

/// GET /admin/videos - Every video, newest first
async fn list_videos(
    State(state): State<Arc<AppState>>,
    AdminUser(_admin): AdminUser,
) -> Result<Json<Vec<Video>>, ServiceError> {
    let videos = videos::list_all_videos(&state.db)
        .await
        .log_500("List all videos error")?;

    Ok(Json(videos))
}

/// GET /admin/videos/{id}
async fn get_video(
    State(state): State<Arc<AppState>>,
    AdminUser(_admin): AdminUser,
    Path(video_id): Path<i64>,
) -> Result<Json<Video>, ServiceError> {
    let video = state
        .ledger
        .find_video(video_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound("Video not found".to_string()))?;

    Ok(Json(video))
}

#[derive(Debug, Default, Deserialize)]
struct UpdateVideoRequest {
    title: Option<String>,
    description: Option<String>,
    category: Option<String>,
    visibility: Option<String>,
}

impl UpdateVideoRequest {
    fn into_update(self) -> Result<VideoUpdate, ServiceError> {
        let visibility = self
            .visibility
            .map(|v| {
                Visibility::parse(&v).ok_or_else(|| {
                    ServiceError::validation("visibility", format!("\"{}\" is not a valid choice.", v))
                })
            })
            .transpose()?;

        if self.title.as_deref().is_some_and(|t| t.trim().is_empty()) {
            return Err(ServiceError::validation("title", "This field may not be blank."));
        }

        Ok(VideoUpdate {
            title: self.title,
            description: self.description,
            category: self.category,
            visibility,
        })
    }
}

/// PATCH /admin/videos/{id} - Partial metadata update
async fn update_video(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    Path(video_id): Path<i64>,
    Json(req): Json<UpdateVideoRequest>,
) -> Result<Json<Video>, ServiceError> {
    let update = req.into_update()?;

    let video = videos::update_video_metadata(&state.db, video_id, &update)
        .await
        .log_500("Update video error")?
        .ok_or_else(|| ServiceError::NotFound("Video not found".to_string()))?;

    tracing::info!(video_id, admin_id = admin.id, "video updated");
    Ok(Json(video))
}

/// DELETE /admin/videos/{id}
async fn delete_video(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    Path(video_id): Path<i64>,
) -> Result<StatusCode, ServiceError> {
    let deleted = videos::delete_video(&state.db, video_id)
        .await
        .log_500("Delete video error")?;

    if !deleted {
        return Err(ServiceError::NotFound("Video not found".to_string()));
    }

    tracing::info!(video_id, admin_id = admin.id, "video deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Serialize)]
struct VideoStats {
    total_videos: i64,
    visibility: BTreeMap<&'static str, i64>,
    categories: Vec<CategoryStat>,
    most_viewed: Vec<Video>,
    most_liked: Vec<Video>,
    recent: Vec<Video>,
}

#[derive(Serialize)]
struct CategoryStat {
    category: String,
    count: i64,
}

impl From<CategoryCount> for CategoryStat {
    fn from(c: CategoryCount) -> Self {
        Self {
            category: c.category,
            count: c.count,
        }
    }
}

/// Every visibility appears, zero when no video has it
fn visibility_breakdown(counts: &[videos::VisibilityCount]) -> BTreeMap<&'static str, i64> {
    [Visibility::Public, Visibility::Private, Visibility::Unlisted]
        .into_iter()
        .map(|v| {
            let count = counts
                .iter()
                .find(|c| c.visibility == v)
                .map_or(0, |c| c.count);
            (v.as_str(), count)
        })
        .collect()
}

/// GET /admin/videos/stats
async fn video_stats(
    State(state): State<Arc<AppState>>,
    AdminUser(_admin): AdminUser,
) -> Result<Json<VideoStats>, ServiceError> {
    let db = &state.db;

    let total_videos = videos::count_videos(db).await.log_500("Count videos error")?;
    let by_visibility = videos::count_by_visibility(db)
        .await
        .log_500("Count by visibility error")?;
    let categories = videos::count_by_category(db)
        .await
        .log_500("Count by category error")?;
    let most_viewed = videos::list_ranked_videos(db, VideoRanking::MostViewed, STATS_TOP_N)
        .await
        .log_500("Most viewed videos error")?;
    let most_liked = videos::list_ranked_videos(db, VideoRanking::MostLiked, STATS_TOP_N)
        .await
        .log_500("Most liked videos error")?;
    let recent = videos::list_ranked_videos(db, VideoRanking::Recent, STATS_TOP_N)
        .await
        .log_500("Recent videos error")?;

    Ok(Json(VideoStats {
        total_videos,
        visibility: visibility_breakdown(&by_visibility),
        categories: categories.into_iter().map(CategoryStat::from).collect(),
        most_viewed,
        most_liked,
        recent,
    }))
}

#[derive(Debug, Deserialize)]
struct RecordingQuery {
    user_id: Option<i64>,
    video_id: Option<i64>,
    status: Option<String>,
}

#[derive(Serialize)]
struct RecordingResponse {
    id: i64,
    filename: String,
    recording_url: Option<String>,
    upload_status: UploadStatus,
    recording_date: DateTime<Utc>,
    upload_completed_at: Option<DateTime<Utc>>,
    recorder: RecorderSummary,
    video: VideoSummary,
}

#[derive(Serialize)]
struct RecorderSummary {
    id: i64,
    email: String,
}

#[derive(Serialize)]
struct VideoSummary {
    id: i64,
    title: String,
}

impl From<RecordingListRow> for RecordingResponse {
    fn from(row: RecordingListRow) -> Self {
        Self {
            id: row.id,
            filename: row.filename,
            recording_url: row.recording_url,
            upload_status: row.upload_status,
            recording_date: row.recording_date,
            upload_completed_at: row.upload_completed_at,
            recorder: RecorderSummary {
                id: row.recorder_id,
                email: row.recorder_email,
            },
            video: VideoSummary {
                id: row.video_id,
                title: row.video_title,
            },
        }
    }
}

/// GET /admin/webcam-recordings?user_id=&video_id=&status=
async fn list_recordings(
    State(state): State<Arc<AppState>>,
    AdminUser(_admin): AdminUser,
    Query(query): Query<RecordingQuery>,
) -> Result<Json<Vec<RecordingResponse>>, ServiceError> {
    let status = query
        .status
        .as_deref()
        .map(|s| {
            UploadStatus::parse(s)
                .ok_or_else(|| ServiceError::validation("status", format!("\"{}\" is not a valid choice.", s)))
        })
        .transpose()?;

    let filter = RecordingFilter {
        recorder_id: query.user_id,
        video_id: query.video_id,
        status,
    };

    let rows = recordings::list_recordings(&state.db, filter)
        .await
        .log_500("List webcam recordings error")?;

    Ok(Json(rows.into_iter().map(RecordingResponse::from).collect()))
}
