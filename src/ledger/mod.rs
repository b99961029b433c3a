//! The relational ledger behind the core services.
//!
//! Visibility resolution, counters and role promotion talk to storage through
//! this trait so they can run against Postgres in production and an in-memory
//! ledger in tests. Every method that mutates a counter or a row pair must be
//! atomic at the storage layer; callers never load-then-store.

mod postgres;

#[cfg(test)]
pub mod memory;

use uuid::Uuid;

use crate::models::{Role, User, Video, VideoShare, WebcamRecording};

pub use postgres::PgLedger;

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("conflict: {0}")]
    Conflict(String),
}

pub type LedgerResult<T> = Result<T, LedgerError>;

/// A freshly registered webcam recording and the recorder's new balance
#[derive(Debug, Clone)]
pub struct WebcamUpload {
    pub recording: WebcamRecording,
    pub total_points: i64,
}

/// Outcome of a like toggle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LikeToggle {
    pub liked: bool,
    pub likes: i64,
}

#[async_trait::async_trait]
pub trait Ledger: Send + Sync {
    async fn find_user(&self, user_id: i64) -> LedgerResult<Option<User>>;

    async fn find_user_by_external_id(&self, external_id: &str) -> LedgerResult<Option<User>>;

    async fn find_video(&self, video_id: i64) -> LedgerResult<Option<Video>>;

    /// Count one access on an active share token and return its video.
    /// Inactive and unknown tokens yield `None`.
    async fn record_share_access(&self, share_token: Uuid) -> LedgerResult<Option<Video>>;

    /// Increment `views` and append a view row as one unit, returning the
    /// refreshed video. `None` when the video does not exist or is private;
    /// private videos are never counted.
    async fn record_view(&self, video_id: i64, viewer_id: Option<i64>)
    -> LedgerResult<Option<Video>>;

    /// Flip a non-private video to private. Only the call that performs the
    /// flip gets `true`.
    async fn make_private(&self, video_id: i64) -> LedgerResult<bool>;

    /// Flip the (video, user) like row and adjust `likes` by the matching
    /// delta. `None` when the video does not exist.
    async fn toggle_like(&self, video_id: i64, user_id: i64) -> LedgerResult<Option<LikeToggle>>;

    async fn create_share(
        &self,
        video_id: i64,
        created_by: i64,
        share_token: Uuid,
    ) -> LedgerResult<VideoShare>;

    /// Insert a pending recording and credit the recorder's viewer profile
    /// (created on demand) in one transaction
    async fn record_webcam_upload(
        &self,
        video_id: i64,
        recorder_id: i64,
        filename: &str,
        recording_url: Option<&str>,
        points: i64,
    ) -> LedgerResult<WebcamUpload>;

    /// Set `role = admin` and drop the user's company/viewer profiles in one
    /// transaction. `None` when the user does not exist.
    async fn promote_to_admin(&self, user_id: i64) -> LedgerResult<Option<User>>;

    /// Put back a role captured before promotion
    async fn restore_role(&self, user_id: i64, role: Role) -> LedgerResult<()>;
}
