//! Engagement domain - view history, likes and share links
//!
//! All functions use the generic Executor pattern, allowing them to work with
//! both `&PgPool` (for standalone queries) and `&mut PgConnection` (for transactions).

use sqlx::{Executor, Postgres};
use uuid::Uuid;

use crate::models::{Video, VideoShare};

/// Append a view row; `viewer_id` is `None` for anonymous views
pub async fn insert_view<'e, E>(
    executor: E,
    video_id: i64,
    viewer_id: Option<i64>,
) -> Result<(), sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query("INSERT INTO video_views (video_id, viewer_id) VALUES ($1, $2)")
        .bind(video_id)
        .bind(viewer_id)
        .execute(executor)
        .await?;

    Ok(())
}

/// Distinct videos a user has viewed, most recently viewed first
pub async fn list_viewed_videos<'e, E>(executor: E, user_id: i64) -> Result<Vec<Video>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as(
        r#"
        SELECT v.id, v.uploader_id, v.title, v.description, v.category, v.visibility,
               v.video_url, v.thumbnail_url, v.duration, v.views, v.likes,
               v.video_view_limit, v.auto_private_after, v.created_at
        FROM videos v
        JOIN (
            SELECT video_id, MAX(viewed_at) AS last_viewed
            FROM video_views
            WHERE viewer_id = $1
            GROUP BY video_id
        ) history ON history.video_id = v.id
        ORDER BY history.last_viewed DESC
        "#,
    )
    .bind(user_id)
    .fetch_all(executor)
    .await
}

/// Insert a like; returns false when the (video, user) pair already exists
pub async fn insert_like<'e, E>(executor: E, video_id: i64, user_id: i64) -> Result<bool, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let result = sqlx::query(
        r#"
        INSERT INTO video_likes (video_id, user_id)
        VALUES ($1, $2)
        ON CONFLICT (video_id, user_id) DO NOTHING
        "#,
    )
    .bind(video_id)
    .bind(user_id)
    .execute(executor)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Remove a like; returns false when there was nothing to remove
pub async fn delete_like<'e, E>(executor: E, video_id: i64, user_id: i64) -> Result<bool, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let result = sqlx::query("DELETE FROM video_likes WHERE video_id = $1 AND user_id = $2")
        .bind(video_id)
        .bind(user_id)
        .execute(executor)
        .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn insert_share<'e, E>(
    executor: E,
    video_id: i64,
    created_by: i64,
    share_token: Uuid,
) -> Result<VideoShare, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as(
        r#"
        INSERT INTO video_shares (video_id, created_by, share_token)
        VALUES ($1, $2, $3)
        RETURNING id, video_id, created_by, share_token, active, access_count, created_at
        "#,
    )
    .bind(video_id)
    .bind(created_by)
    .bind(share_token)
    .fetch_one(executor)
    .await
}

/// Count one access against an active share token and return its video id.
/// Lookup and increment are one statement, so concurrent resolutions of the
/// same token each land exactly once.
pub async fn record_share_access<'e, E>(
    executor: E,
    share_token: Uuid,
) -> Result<Option<i64>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let row: Option<(i64,)> = sqlx::query_as(
        r#"
        UPDATE video_shares SET access_count = access_count + 1
        WHERE share_token = $1 AND active = TRUE
        RETURNING video_id
        "#,
    )
    .bind(share_token)
    .fetch_optional(executor)
    .await?;

    Ok(row.map(|(video_id,)| video_id))
}
