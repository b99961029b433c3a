//! In-memory ledger for tests.
//!
//! A single mutex guards all tables, which gives every trait method the same
//! all-or-nothing behaviour the Postgres statements have.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Utc;
use uuid::Uuid;

use super::{Ledger, LedgerError, LedgerResult, LikeToggle, WebcamUpload};
use crate::models::{Role, UploadStatus, User, Video, VideoShare, Visibility, WebcamRecording};

#[derive(Default)]
struct Tables {
    next_id: i64,
    users: HashMap<i64, User>,
    videos: HashMap<i64, Video>,
    views: Vec<(i64, Option<i64>)>,
    likes: HashSet<(i64, i64)>,
    shares: Vec<VideoShare>,
    company_profiles: HashSet<i64>,
    /// user id -> points balance
    viewer_profiles: HashMap<i64, i64>,
    recordings: Vec<WebcamRecording>,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

fn insert_user(tables: &mut Tables, id: i64, email: &str, external_id: &str, role: Role) -> User {
    let user = User {
        id,
        email: email.to_string(),
        external_id: external_id.to_string(),
        role,
        created_at: Utc::now(),
    };
    tables.users.insert(id, user.clone());
    user
}

#[derive(Default)]
pub struct MemoryLedger {
    tables: Mutex<Tables>,
    pub fail_restore: AtomicBool,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_user(&self, email: &str, external_id: &str, role: Role) -> User {
        let mut tables = self.tables.lock().unwrap();
        let id = tables.next_id();
        insert_user(&mut tables, id, email, external_id, role)
    }

    pub fn add_user_with_id(&self, id: i64, email: &str, external_id: &str, role: Role) -> User {
        let mut tables = self.tables.lock().unwrap();
        insert_user(&mut tables, id, email, external_id, role)
    }

    pub fn add_video(&self, uploader_id: i64, visibility: Visibility) -> Video {
        let mut tables = self.tables.lock().unwrap();
        let id = tables.next_id();
        let video = Video {
            id,
            uploader_id,
            title: format!("Video {}", id),
            description: String::new(),
            category: None,
            visibility,
            video_url: format!("https://example.com/videos/{}", id),
            thumbnail_url: None,
            duration: None,
            views: 0,
            likes: 0,
            video_view_limit: None,
            auto_private_after: None,
            created_at: Utc::now(),
        };
        tables.videos.insert(id, video.clone());
        video
    }

    pub fn update_video(&self, video_id: i64, f: impl FnOnce(&mut Video)) {
        let mut tables = self.tables.lock().unwrap();
        if let Some(video) = tables.videos.get_mut(&video_id) {
            f(video);
        }
    }

    pub fn video(&self, video_id: i64) -> Option<Video> {
        self.tables.lock().unwrap().videos.get(&video_id).cloned()
    }

    pub fn user(&self, user_id: i64) -> Option<User> {
        self.tables.lock().unwrap().users.get(&user_id).cloned()
    }

    pub fn add_company_profile(&self, user_id: i64) {
        self.tables.lock().unwrap().company_profiles.insert(user_id);
    }

    pub fn add_viewer_profile(&self, user_id: i64) {
        self.tables.lock().unwrap().viewer_profiles.entry(user_id).or_insert(0);
    }

    pub fn has_company_profile(&self, user_id: i64) -> bool {
        self.tables.lock().unwrap().company_profiles.contains(&user_id)
    }

    pub fn has_viewer_profile(&self, user_id: i64) -> bool {
        self.tables.lock().unwrap().viewer_profiles.contains_key(&user_id)
    }

    pub fn view_rows(&self, video_id: i64) -> usize {
        let tables = self.tables.lock().unwrap();
        tables.views.iter().filter(|(v, _)| *v == video_id).count()
    }

    pub fn like_rows(&self, video_id: i64) -> usize {
        let tables = self.tables.lock().unwrap();
        tables.likes.iter().filter(|(v, _)| *v == video_id).count()
    }

    pub fn points(&self, user_id: i64) -> Option<i64> {
        self.tables.lock().unwrap().viewer_profiles.get(&user_id).copied()
    }

    pub fn recordings(&self, video_id: i64) -> Vec<WebcamRecording> {
        let tables = self.tables.lock().unwrap();
        tables
            .recordings
            .iter()
            .filter(|r| r.video_id == video_id)
            .cloned()
            .collect()
    }

    pub fn share(&self, share_token: Uuid) -> Option<VideoShare> {
        let tables = self.tables.lock().unwrap();
        tables
            .shares
            .iter()
            .find(|s| s.share_token == share_token)
            .cloned()
    }

    pub fn deactivate_share(&self, share_token: Uuid) {
        let mut tables = self.tables.lock().unwrap();
        if let Some(share) = tables.shares.iter_mut().find(|s| s.share_token == share_token) {
            share.active = false;
        }
    }
}

#[async_trait::async_trait]
impl Ledger for MemoryLedger {
    async fn find_user(&self, user_id: i64) -> LedgerResult<Option<User>> {
        Ok(self.user(user_id))
    }

    async fn find_user_by_external_id(&self, external_id: &str) -> LedgerResult<Option<User>> {
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .users
            .values()
            .find(|u| u.external_id == external_id)
            .cloned())
    }

    async fn find_video(&self, video_id: i64) -> LedgerResult<Option<Video>> {
        Ok(self.video(video_id))
    }

    async fn record_share_access(&self, share_token: Uuid) -> LedgerResult<Option<Video>> {
        let mut tables = self.tables.lock().unwrap();
        let Some(share) = tables
            .shares
            .iter_mut()
            .find(|s| s.share_token == share_token && s.active)
        else {
            return Ok(None);
        };
        share.access_count += 1;
        let video_id = share.video_id;
        Ok(tables.videos.get(&video_id).cloned())
    }

    async fn record_view(
        &self,
        video_id: i64,
        viewer_id: Option<i64>,
    ) -> LedgerResult<Option<Video>> {
        let mut tables = self.tables.lock().unwrap();
        let Some(video) = tables
            .videos
            .get_mut(&video_id)
            .filter(|v| v.visibility != Visibility::Private)
        else {
            return Ok(None);
        };
        video.views += 1;
        let video = video.clone();
        tables.views.push((video_id, viewer_id));
        Ok(Some(video))
    }

    async fn make_private(&self, video_id: i64) -> LedgerResult<bool> {
        let mut tables = self.tables.lock().unwrap();
        match tables.videos.get_mut(&video_id) {
            Some(video) if video.visibility != Visibility::Private => {
                video.visibility = Visibility::Private;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn toggle_like(&self, video_id: i64, user_id: i64) -> LedgerResult<Option<LikeToggle>> {
        let mut tables = self.tables.lock().unwrap();
        if !tables.videos.contains_key(&video_id) {
            return Ok(None);
        }

        let liked = if tables.likes.remove(&(video_id, user_id)) {
            false
        } else {
            tables.likes.insert((video_id, user_id));
            true
        };

        let Some(video) = tables.videos.get_mut(&video_id) else {
            return Ok(None);
        };
        video.likes = if liked {
            video.likes + 1
        } else {
            (video.likes - 1).max(0)
        };

        Ok(Some(LikeToggle {
            liked,
            likes: video.likes,
        }))
    }

    async fn create_share(
        &self,
        video_id: i64,
        created_by: i64,
        share_token: Uuid,
    ) -> LedgerResult<VideoShare> {
        let mut tables = self.tables.lock().unwrap();
        if tables.shares.iter().any(|s| s.share_token == share_token) {
            return Err(LedgerError::Conflict(format!(
                "share token {} already exists",
                share_token
            )));
        }

        let share = VideoShare {
            id: tables.next_id(),
            video_id,
            created_by,
            share_token,
            active: true,
            access_count: 0,
            created_at: Utc::now(),
        };
        tables.shares.push(share.clone());
        Ok(share)
    }

    async fn record_webcam_upload(
        &self,
        video_id: i64,
        recorder_id: i64,
        filename: &str,
        recording_url: Option<&str>,
        points: i64,
    ) -> LedgerResult<WebcamUpload> {
        let mut tables = self.tables.lock().unwrap();
        let recording = WebcamRecording {
            id: tables.next_id(),
            video_id,
            recorder_id,
            filename: filename.to_string(),
            recording_url: recording_url.map(str::to_string),
            upload_status: UploadStatus::Pending,
            recording_date: Utc::now(),
            upload_completed_at: None,
        };
        tables.recordings.push(recording.clone());

        let balance = tables.viewer_profiles.entry(recorder_id).or_insert(0);
        *balance += points;
        let total_points = *balance;

        Ok(WebcamUpload {
            recording,
            total_points,
        })
    }

    async fn promote_to_admin(&self, user_id: i64) -> LedgerResult<Option<User>> {
        let mut tables = self.tables.lock().unwrap();
        let Some(user) = tables.users.get_mut(&user_id) else {
            return Ok(None);
        };
        user.role = Role::Admin;
        let user = user.clone();
        tables.company_profiles.remove(&user_id);
        tables.viewer_profiles.remove(&user_id);
        Ok(Some(user))
    }

    async fn restore_role(&self, user_id: i64, role: Role) -> LedgerResult<()> {
        if self.fail_restore.load(Ordering::SeqCst) {
            return Err(LedgerError::Database(sqlx::Error::PoolTimedOut));
        }
        let mut tables = self.tables.lock().unwrap();
        if let Some(user) = tables.users.get_mut(&user_id) {
            user.role = role;
        }
        Ok(())
    }
}
