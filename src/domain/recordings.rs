//! Webcam recording domain - DB queries for recording metadata

use chrono::{DateTime, Utc};
use sqlx::{Executor, Postgres};

use crate::models::{UploadStatus, WebcamRecording};

/// Recording joined with recorder and video context, for the admin listing
#[derive(Debug, sqlx::FromRow)]
pub struct RecordingListRow {
    pub id: i64,
    pub filename: String,
    pub recording_url: Option<String>,
    pub upload_status: UploadStatus,
    pub recording_date: DateTime<Utc>,
    pub upload_completed_at: Option<DateTime<Utc>>,
    pub recorder_id: i64,
    pub recorder_email: String,
    pub video_id: i64,
    pub video_title: String,
}

/// Optional filters for the admin listing
#[derive(Debug, Clone, Copy, Default)]
pub struct RecordingFilter {
    pub recorder_id: Option<i64>,
    pub video_id: Option<i64>,
    pub status: Option<UploadStatus>,
}

pub async fn insert_recording<'e, E>(
    executor: E,
    video_id: i64,
    recorder_id: i64,
    filename: &str,
    recording_url: Option<&str>,
) -> Result<WebcamRecording, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as(
        r#"
        INSERT INTO webcam_recordings (video_id, recorder_id, filename, recording_url)
        VALUES ($1, $2, $3, $4)
        RETURNING id, video_id, recorder_id, filename, recording_url, upload_status,
                  recording_date, upload_completed_at
        "#,
    )
    .bind(video_id)
    .bind(recorder_id)
    .bind(filename)
    .bind(recording_url)
    .fetch_one(executor)
    .await
}

/// Update the status of a recording owned by `recorder_id`.
/// `upload_completed_at` is stamped only on completion.
pub async fn set_upload_status<'e, E>(
    executor: E,
    recording_id: i64,
    recorder_id: i64,
    status: UploadStatus,
) -> Result<Option<WebcamRecording>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as(
        r#"
        UPDATE webcam_recordings SET
            upload_status = $3,
            upload_completed_at = CASE WHEN $3 = 'completed' THEN NOW() ELSE upload_completed_at END
        WHERE id = $1 AND recorder_id = $2
        RETURNING id, video_id, recorder_id, filename, recording_url, upload_status,
                  recording_date, upload_completed_at
        "#,
    )
    .bind(recording_id)
    .bind(recorder_id)
    .bind(status)
    .fetch_optional(executor)
    .await
}

/// List recordings newest first, narrowed by any provided filter
pub async fn list_recordings<'e, E>(
    executor: E,
    filter: RecordingFilter,
) -> Result<Vec<RecordingListRow>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as(
        r#"
        SELECT r.id, r.filename, r.recording_url, r.upload_status, r.recording_date,
               r.upload_completed_at, r.recorder_id, u.email AS recorder_email,
               r.video_id, v.title AS video_title
        FROM webcam_recordings r
        JOIN users u ON u.id = r.recorder_id
        JOIN videos v ON v.id = r.video_id
        WHERE ($1::bigint IS NULL OR r.recorder_id = $1)
          AND ($2::bigint IS NULL OR r.video_id = $2)
          AND ($3::text IS NULL OR r.upload_status = $3)
        ORDER BY r.recording_date DESC, r.id DESC
        "#,
    )
    .bind(filter.recorder_id)
    .bind(filter.video_id)
    .bind(filter.status)
    .fetch_all(executor)
    .await
}
