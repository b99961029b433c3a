//! Video domain - DB queries for videos and their counters
//!
//! Counter updates are single `UPDATE ... SET c = c + 1` statements so
//! concurrent requests against the same row never lose increments.

use chrono::{DateTime, Utc};
use sqlx::{Executor, Postgres};

use crate::models::{Video, Visibility};

macro_rules! video_columns {
    () => {
        "id, uploader_id, title, description, category, visibility, video_url, thumbnail_url, \
         duration, views, likes, video_view_limit, auto_private_after, created_at"
    };
}

/// Fields supplied when a company or admin registers a new upload
#[derive(Debug, Clone)]
pub struct NewVideo<'a> {
    pub uploader_id: i64,
    pub title: &'a str,
    pub description: &'a str,
    pub category: Option<&'a str>,
    pub visibility: Visibility,
    pub video_url: &'a str,
    pub thumbnail_url: Option<&'a str>,
    pub duration: Option<&'a str>,
    pub video_view_limit: Option<i64>,
    pub auto_private_after: Option<DateTime<Utc>>,
}

/// Partial metadata update; `None` leaves the column untouched
#[derive(Debug, Clone, Default)]
pub struct VideoUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub visibility: Option<Visibility>,
}

#[derive(Debug, sqlx::FromRow)]
pub struct VisibilityCount {
    pub visibility: Visibility,
    pub count: i64,
}

#[derive(Debug, sqlx::FromRow)]
pub struct CategoryCount {
    pub category: String,
    pub count: i64,
}

/// Ordering used by the admin statistics lists
#[derive(Debug, Clone, Copy)]
pub enum VideoRanking {
    MostViewed,
    MostLiked,
    Recent,
}

impl VideoRanking {
    fn order_by(&self) -> &'static str {
        match self {
            VideoRanking::MostViewed => "views DESC, id DESC",
            VideoRanking::MostLiked => "likes DESC, id DESC",
            VideoRanking::Recent => "created_at DESC, id DESC",
        }
    }
}

pub async fn get_video<'e, E>(executor: E, video_id: i64) -> Result<Option<Video>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as(concat!("SELECT ", video_columns!(), " FROM videos WHERE id = $1"))
        .bind(video_id)
        .fetch_optional(executor)
        .await
}

/// Public feed, newest first
pub async fn list_public_videos<'e, E>(
    executor: E,
    limit: i64,
    offset: i64,
) -> Result<Vec<Video>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as(concat!(
        "SELECT ",
        video_columns!(),
        " FROM videos WHERE visibility = 'public' ORDER BY created_at DESC, id DESC LIMIT $1 OFFSET $2"
    ))
    .bind(limit)
    .bind(offset)
    .fetch_all(executor)
    .await
}

/// Every video regardless of visibility (admin)
pub async fn list_all_videos<'e, E>(executor: E) -> Result<Vec<Video>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as(concat!(
        "SELECT ",
        video_columns!(),
        " FROM videos ORDER BY created_at DESC, id DESC"
    ))
    .fetch_all(executor)
    .await
}

pub async fn list_ranked_videos<'e, E>(
    executor: E,
    ranking: VideoRanking,
    limit: i64,
) -> Result<Vec<Video>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let query = format!(
        "SELECT {} FROM videos ORDER BY {} LIMIT $1",
        video_columns!(),
        ranking.order_by()
    );

    sqlx::query_as(&query).bind(limit).fetch_all(executor).await
}

pub async fn insert_video<'e, E>(executor: E, video: &NewVideo<'_>) -> Result<Video, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as(concat!(
        r#"
        INSERT INTO videos (uploader_id, title, description, category, visibility, video_url,
                            thumbnail_url, duration, video_view_limit, auto_private_after)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        RETURNING "#,
        video_columns!()
    ))
    .bind(video.uploader_id)
    .bind(video.title)
    .bind(video.description)
    .bind(video.category)
    .bind(video.visibility)
    .bind(video.video_url)
    .bind(video.thumbnail_url)
    .bind(video.duration)
    .bind(video.video_view_limit)
    .bind(video.auto_private_after)
    .fetch_one(executor)
    .await
}

pub async fn update_video_metadata<'e, E>(
    executor: E,
    video_id: i64,
    update: &VideoUpdate,
) -> Result<Option<Video>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as(concat!(
        r#"
        UPDATE videos SET
            title = COALESCE($2, title),
            description = COALESCE($3, description),
            category = COALESCE($4, category),
            visibility = COALESCE($5, visibility)
        WHERE id = $1
        RETURNING "#,
        video_columns!()
    ))
    .bind(video_id)
    .bind(update.title.as_deref())
    .bind(update.description.as_deref())
    .bind(update.category.as_deref())
    .bind(update.visibility)
    .fetch_optional(executor)
    .await
}

/// Returns true when a row was deleted
pub async fn delete_video<'e, E>(executor: E, video_id: i64) -> Result<bool, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let result = sqlx::query("DELETE FROM videos WHERE id = $1")
        .bind(video_id)
        .execute(executor)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// Atomically bump the view counter of a non-private video, returning the
/// new count. `None` when the video is missing or already private.
pub async fn increment_views<'e, E>(executor: E, video_id: i64) -> Result<Option<i64>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let row: Option<(i64,)> = sqlx::query_as(
        r#"
        UPDATE videos SET views = views + 1
        WHERE id = $1 AND visibility <> 'private'
        RETURNING views
        "#,
    )
    .bind(video_id)
    .fetch_optional(executor)
    .await?;

    Ok(row.map(|(views,)| views))
}

/// Atomically adjust the like counter by `delta`, flooring at zero
pub async fn adjust_likes<'e, E>(
    executor: E,
    video_id: i64,
    delta: i64,
) -> Result<Option<i64>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let row: Option<(i64,)> = sqlx::query_as(
        "UPDATE videos SET likes = GREATEST(likes + $2, 0) WHERE id = $1 RETURNING likes",
    )
    .bind(video_id)
    .bind(delta)
    .fetch_optional(executor)
    .await?;

    Ok(row.map(|(likes,)| likes))
}

/// Lock the video row for the rest of the transaction and return its like
/// count. `None` when the video does not exist.
pub async fn lock_like_count<'e, E>(executor: E, video_id: i64) -> Result<Option<i64>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let row: Option<(i64,)> = sqlx::query_as("SELECT likes FROM videos WHERE id = $1 FOR UPDATE")
        .bind(video_id)
        .fetch_optional(executor)
        .await?;

    Ok(row.map(|(likes,)| likes))
}

/// Flip a single video to private. Returns false when it was already
/// private or does not exist, so only one caller ever observes the change.
pub async fn make_private<'e, E>(executor: E, video_id: i64) -> Result<bool, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let result = sqlx::query(
        "UPDATE videos SET visibility = 'private' WHERE id = $1 AND visibility <> 'private'",
    )
    .bind(video_id)
    .execute(executor)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Flip every non-private video whose view limit was reached or whose
/// auto-private deadline passed. Returns the ids that changed.
pub async fn make_due_videos_private<'e, E>(
    executor: E,
    default_view_limit: Option<i64>,
    now: DateTime<Utc>,
) -> Result<Vec<i64>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let rows: Vec<(i64,)> = sqlx::query_as(
        r#"
        UPDATE videos SET visibility = 'private'
        WHERE visibility <> 'private'
          AND (views >= COALESCE(video_view_limit, $1)
               OR auto_private_after <= $2)
        RETURNING id
        "#,
    )
    .bind(default_view_limit)
    .bind(now)
    .fetch_all(executor)
    .await?;

    Ok(rows.into_iter().map(|(id,)| id).collect())
}

pub async fn count_videos<'e, E>(executor: E) -> Result<i64, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM videos")
        .fetch_one(executor)
        .await?;
    Ok(count)
}

pub async fn count_by_visibility<'e, E>(executor: E) -> Result<Vec<VisibilityCount>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as("SELECT visibility, COUNT(*) AS count FROM videos GROUP BY visibility")
        .fetch_all(executor)
        .await
}

pub async fn count_by_category<'e, E>(executor: E) -> Result<Vec<CategoryCount>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as(
        r#"
        SELECT category, COUNT(*) AS count FROM videos
        WHERE category IS NOT NULL AND category <> ''
        GROUP BY category
        ORDER BY count DESC, category
        "#,
    )
    .fetch_all(executor)
    .await
}
