//! Auto-private policy consulted after every view and by the hourly sweep

use chrono::{DateTime, Utc};

use crate::models::{Video, Visibility};

pub trait PrivacyPolicy: Send + Sync {
    /// Whether `video` should be flipped to private as of `now`.
    /// Already-private videos never report true.
    fn should_go_private(&self, video: &Video, now: DateTime<Utc>) -> bool;
}

/// Private once a view limit is reached or an expiry timestamp has passed.
///
/// The per-video `video_view_limit` wins over `default_view_limit`; with
/// neither set, only `auto_private_after` applies.
#[derive(Debug, Clone, Copy, Default)]
pub struct ViewLimitPolicy {
    pub default_view_limit: Option<i64>,
}

impl ViewLimitPolicy {
    pub fn new(default_view_limit: Option<i64>) -> Self {
        Self { default_view_limit }
    }
}

impl PrivacyPolicy for ViewLimitPolicy {
    fn should_go_private(&self, video: &Video, now: DateTime<Utc>) -> bool {
        if video.visibility == Visibility::Private {
            return false;
        }

        let limit_reached = video
            .video_view_limit
            .or(self.default_view_limit)
            .is_some_and(|limit| video.views >= limit);
        let expired = video.auto_private_after.is_some_and(|at| at <= now);

        limit_reached || expired
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn video(views: i64, limit: Option<i64>) -> Video {
        Video {
            id: 1,
            uploader_id: 1,
            title: "t".into(),
            description: String::new(),
            category: None,
            visibility: Visibility::Public,
            video_url: "https://example.com/v".into(),
            thumbnail_url: None,
            duration: None,
            views,
            likes: 0,
            video_view_limit: limit,
            auto_private_after: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn flips_at_the_limit_not_before() {
        let policy = ViewLimitPolicy::default();
        assert!(!policy.should_go_private(&video(99, Some(100)), Utc::now()));
        assert!(policy.should_go_private(&video(100, Some(100)), Utc::now()));
    }

    #[test]
    fn per_video_limit_overrides_default() {
        let policy = ViewLimitPolicy::new(Some(10));
        assert!(!policy.should_go_private(&video(50, Some(100)), Utc::now()));
        assert!(policy.should_go_private(&video(10, None), Utc::now()));
    }

    #[test]
    fn no_limit_means_never_by_views() {
        let policy = ViewLimitPolicy::default();
        assert!(!policy.should_go_private(&video(1_000_000, None), Utc::now()));
    }

    #[test]
    fn expiry_timestamp_applies() {
        let policy = ViewLimitPolicy::default();
        let now = Utc::now();
        let mut v = video(0, None);
        v.auto_private_after = Some(now - Duration::minutes(1));
        assert!(policy.should_go_private(&v, now));
        v.auto_private_after = Some(now + Duration::minutes(1));
        assert!(!policy.should_go_private(&v, now));
    }

    #[test]
    fn private_videos_never_change() {
        let policy = ViewLimitPolicy::default();
        let mut v = video(500, Some(100));
        v.visibility = Visibility::Private;
        assert!(!policy.should_go_private(&v, Utc::now()));
    }
}
