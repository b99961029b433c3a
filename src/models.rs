//! Shared data models used across modules

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Application role stored on `users.role`
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Company,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Company => "company",
            Role::Admin => "admin",
        }
    }
}

/// Video visibility
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Public,
    Private,
    Unlisted,
}

impl Visibility {
    /// Parse a request value; column decoding goes through the derive
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "public" => Some(Visibility::Public),
            "private" => Some(Visibility::Private),
            "unlisted" => Some(Visibility::Unlisted),
            _ => None,
        }
    }
}

/// Webcam recording upload status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum UploadStatus {
    Pending,
    Completed,
    Failed,
}

impl UploadStatus {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(UploadStatus::Pending),
            "completed" => Some(UploadStatus::Completed),
            "failed" => Some(UploadStatus::Failed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub email: String,
    #[serde(skip_serializing)]
    pub external_id: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Video {
    pub id: i64,
    pub uploader_id: i64,
    pub title: String,
    pub description: String,
    pub category: Option<String>,
    pub visibility: Visibility,
    pub video_url: String,
    pub thumbnail_url: Option<String>,
    pub duration: Option<String>,
    pub views: i64,
    pub likes: i64,
    pub video_view_limit: Option<i64>,
    pub auto_private_after: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct VideoShare {
    pub id: i64,
    pub video_id: i64,
    pub created_by: i64,
    pub share_token: Uuid,
    pub active: bool,
    pub access_count: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct WebcamRecording {
    pub id: i64,
    pub video_id: i64,
    pub recorder_id: i64,
    pub filename: String,
    pub recording_url: Option<String>,
    pub upload_status: UploadStatus,
    pub recording_date: DateTime<Utc>,
    pub upload_completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ViewerProfile {
    pub user_id: i64,
    pub points: i64,
    pub points_earned: i64,
    pub points_redeemed: i64,
    pub birthday: Option<NaiveDate>,
    pub gender: Option<String>,
    pub country: Option<String>,
    pub city: Option<String>,
    pub education_level: Option<String>,
    pub occupation: Option<String>,
    pub content_preferences: sqlx::types::Json<Vec<String>>,
    pub onboarding_completed: bool,
}
