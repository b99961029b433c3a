//! View, like and share counters.
//!
//! All counter arithmetic happens inside the ledger as single-statement
//! deltas; this layer only decides whether a mutation is allowed and what
//! follows from it.

use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use super::error::{ServiceError, ServiceResult};
use super::privacy::PrivacyPolicy;
use crate::ledger::{Ledger, LedgerError};
use crate::models::{User, Video, VideoShare, Visibility};

pub const PRIVATE_MESSAGE: &str = "Video is private";
const VIDEO_NOT_FOUND: &str = "Video not found";

/// Fresh tokens are random v4 UUIDs; a unique-index conflict is retried once
const SHARE_TOKEN_ATTEMPTS: usize = 2;

#[derive(Debug, Clone, Serialize)]
pub struct ViewOutcome {
    pub video: Video,
    pub views: i64,
    pub privacy_changed: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct LikeOutcome {
    pub video_id: i64,
    pub liked: bool,
    pub likes: i64,
}

#[derive(Clone)]
pub struct CounterService {
    ledger: Arc<dyn Ledger>,
    policy: Arc<dyn PrivacyPolicy>,
}

impl CounterService {
    pub fn new(ledger: Arc<dyn Ledger>, policy: Arc<dyn PrivacyPolicy>) -> Self {
        Self { ledger, policy }
    }

    pub async fn record_view(&self, video_id: i64, viewer: Option<&User>) -> ServiceResult<ViewOutcome> {
        let video = self
            .ledger
            .find_video(video_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(VIDEO_NOT_FOUND.to_string()))?;

        if video.visibility == Visibility::Private {
            return Err(ServiceError::Forbidden(PRIVATE_MESSAGE.to_string()));
        }

        // The increment skips private videos, so a video that went private
        // (or was deleted) since the read above is not counted
        let Some(mut video) = self
            .ledger
            .record_view(video_id, viewer.map(|u| u.id))
            .await?
        else {
            return Err(match self.ledger.find_video(video_id).await? {
                Some(_) => ServiceError::Forbidden(PRIVATE_MESSAGE.to_string()),
                None => ServiceError::NotFound(VIDEO_NOT_FOUND.to_string()),
            });
        };

        // Only the view that performs the flip reports it
        let privacy_changed = self.policy.should_go_private(&video, Utc::now())
            && self.ledger.make_private(video_id).await?;
        if privacy_changed {
            tracing::info!(video_id, views = video.views, "video switched to private");
            video.visibility = Visibility::Private;
        }

        Ok(ViewOutcome {
            views: video.views,
            video,
            privacy_changed,
        })
    }

    pub async fn toggle_like(&self, video_id: i64, user: Option<&User>) -> ServiceResult<LikeOutcome> {
        let user = user.ok_or(ServiceError::Unauthenticated)?;

        let toggle = self
            .ledger
            .toggle_like(video_id, user.id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(VIDEO_NOT_FOUND.to_string()))?;

        Ok(LikeOutcome {
            video_id,
            liked: toggle.liked,
            likes: toggle.likes,
        })
    }

    pub async fn create_share(&self, video_id: i64, user: Option<&User>) -> ServiceResult<VideoShare> {
        let user = user.ok_or(ServiceError::Unauthenticated)?;

        if self.ledger.find_video(video_id).await?.is_none() {
            return Err(ServiceError::NotFound(VIDEO_NOT_FOUND.to_string()));
        }

        let mut attempt = 0;
        loop {
            attempt += 1;
            match self
                .ledger
                .create_share(video_id, user.id, Uuid::new_v4())
                .await
            {
                Err(LedgerError::Conflict(reason)) if attempt < SHARE_TOKEN_ATTEMPTS => {
                    tracing::warn!(video_id, %reason, "share token collision, regenerating");
                }
                result => return Ok(result?),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::memory::MemoryLedger;
    use crate::models::Role;
    use crate::services::privacy::ViewLimitPolicy;
    use futures::future::join_all;

    struct Fixture {
        ledger: Arc<MemoryLedger>,
        counters: CounterService,
        owner: User,
        viewer: User,
    }

    fn fixture(policy: ViewLimitPolicy) -> Fixture {
        let ledger = Arc::new(MemoryLedger::new());
        let counters = CounterService::new(ledger.clone(), Arc::new(policy));
        let owner = ledger.add_user("owner@example.com", "owner", Role::Company);
        let viewer = ledger.add_user("viewer@example.com", "viewer", Role::User);
        Fixture {
            ledger,
            counters,
            owner,
            viewer,
        }
    }

    #[tokio::test]
    async fn view_increments_and_records_row() {
        let f = fixture(ViewLimitPolicy::default());
        let video = f.ledger.add_video(f.owner.id, Visibility::Public);

        let outcome = f.counters.record_view(video.id, Some(&f.viewer)).await.unwrap();
        assert_eq!(outcome.views, 1);
        assert!(!outcome.privacy_changed);

        f.counters.record_view(video.id, None).await.unwrap();
        assert_eq!(f.ledger.video(video.id).unwrap().views, 2);
        assert_eq!(f.ledger.view_rows(video.id), 2);
    }

    #[tokio::test]
    async fn private_video_view_is_forbidden_and_unchanged() {
        let f = fixture(ViewLimitPolicy::default());
        let video = f.ledger.add_video(f.owner.id, Visibility::Private);

        let err = f.counters.record_view(video.id, Some(&f.viewer)).await.unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(ref m) if m == PRIVATE_MESSAGE));
        assert_eq!(f.ledger.video(video.id).unwrap().views, 0);
        assert_eq!(f.ledger.view_rows(video.id), 0);
    }

    #[tokio::test]
    async fn view_of_missing_video_is_not_found() {
        let f = fixture(ViewLimitPolicy::default());
        assert!(matches!(
            f.counters.record_view(404, None).await,
            Err(ServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn hundredth_view_flips_to_private() {
        let f = fixture(ViewLimitPolicy::default());
        let video = f.ledger.add_video(f.owner.id, Visibility::Public);
        f.ledger.update_video(video.id, |v| {
            v.views = 99;
            v.video_view_limit = Some(100);
        });

        let outcome = f.counters.record_view(video.id, Some(&f.viewer)).await.unwrap();
        assert!(outcome.privacy_changed);
        assert_eq!(outcome.views, 100);
        assert_eq!(outcome.video.visibility, Visibility::Private);
        assert_eq!(
            f.ledger.video(video.id).unwrap().visibility,
            Visibility::Private
        );

        // Nobody gets the 101st view
        assert!(matches!(
            f.counters.record_view(video.id, Some(&f.viewer)).await,
            Err(ServiceError::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn concurrent_views_at_the_limit_flip_exactly_once() {
        let f = fixture(ViewLimitPolicy::default());
        let video = f.ledger.add_video(f.owner.id, Visibility::Public);
        f.ledger.update_video(video.id, |v| {
            v.views = 99;
            v.video_view_limit = Some(100);
        });

        let results = join_all((0..5).map(|_| f.counters.record_view(video.id, None))).await;
        let flipped = results
            .iter()
            .filter(|r| matches!(r, Ok(o) if o.privacy_changed))
            .count();
        let forbidden = results
            .iter()
            .filter(|r| matches!(r, Err(ServiceError::Forbidden(_))))
            .count();

        assert_eq!(flipped, 1);
        assert_eq!(forbidden, 4);
        assert_eq!(f.ledger.video(video.id).unwrap().views, 100);
        assert_eq!(f.ledger.view_rows(video.id), 1);
    }

    #[tokio::test]
    async fn ledger_skips_private_videos_and_flips_once() {
        let f = fixture(ViewLimitPolicy::default());
        let video = f.ledger.add_video(f.owner.id, Visibility::Public);

        assert!(f.ledger.make_private(video.id).await.unwrap());
        assert!(!f.ledger.make_private(video.id).await.unwrap());
        assert!(f.ledger.record_view(video.id, None).await.unwrap().is_none());
        assert_eq!(f.ledger.video(video.id).unwrap().views, 0);
    }

    #[tokio::test]
    async fn global_default_limit_applies_without_per_video_limit() {
        let f = fixture(ViewLimitPolicy::new(Some(2)));
        let video = f.ledger.add_video(f.owner.id, Visibility::Unlisted);

        assert!(!f.counters.record_view(video.id, None).await.unwrap().privacy_changed);
        assert!(f.counters.record_view(video.id, None).await.unwrap().privacy_changed);
    }

    #[tokio::test]
    async fn concurrent_views_are_all_counted() {
        let f = fixture(ViewLimitPolicy::default());
        let video = f.ledger.add_video(f.owner.id, Visibility::Public);

        let results = join_all((0..50).map(|_| f.counters.record_view(video.id, None))).await;
        let successes = results.iter().filter(|r| r.is_ok()).count() as i64;

        assert_eq!(successes, 50);
        assert_eq!(f.ledger.video(video.id).unwrap().views, successes);
        assert_eq!(f.ledger.view_rows(video.id), 50);
    }

    #[tokio::test]
    async fn like_requires_authentication() {
        let f = fixture(ViewLimitPolicy::default());
        let video = f.ledger.add_video(f.owner.id, Visibility::Public);
        assert!(matches!(
            f.counters.toggle_like(video.id, None).await,
            Err(ServiceError::Unauthenticated)
        ));
        assert!(matches!(
            f.counters.toggle_like(404, Some(&f.viewer)).await,
            Err(ServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn double_toggle_restores_state() {
        let f = fixture(ViewLimitPolicy::default());
        let video = f.ledger.add_video(f.owner.id, Visibility::Public);
        f.ledger.update_video(video.id, |v| v.likes = 7);

        let first = f.counters.toggle_like(video.id, Some(&f.viewer)).await.unwrap();
        assert!(first.liked);
        assert_eq!(first.likes, 8);
        assert_eq!(f.ledger.like_rows(video.id), 1);

        let second = f.counters.toggle_like(video.id, Some(&f.viewer)).await.unwrap();
        assert!(!second.liked);
        assert_eq!(second.likes, 7);
        assert_eq!(f.ledger.like_rows(video.id), 0);
    }

    #[tokio::test]
    async fn unlike_never_goes_negative() {
        let f = fixture(ViewLimitPolicy::default());
        let video = f.ledger.add_video(f.owner.id, Visibility::Public);
        f.counters.toggle_like(video.id, Some(&f.viewer)).await.unwrap();
        // Counter drifted below the row count
        f.ledger.update_video(video.id, |v| v.likes = 0);

        let outcome = f.counters.toggle_like(video.id, Some(&f.viewer)).await.unwrap();
        assert!(!outcome.liked);
        assert_eq!(outcome.likes, 0);
    }

    #[tokio::test]
    async fn concurrent_toggles_keep_one_row_at_most() {
        let f = fixture(ViewLimitPolicy::default());
        let video = f.ledger.add_video(f.owner.id, Visibility::Public);

        let results =
            join_all((0..10).map(|_| f.counters.toggle_like(video.id, Some(&f.viewer)))).await;
        assert!(results.iter().all(|r| r.is_ok()));

        let stored = f.ledger.video(video.id).unwrap();
        let rows = f.ledger.like_rows(video.id);
        assert!(rows <= 1);
        assert_eq!(stored.likes, rows as i64);
        assert!(stored.likes >= 0);
    }

    #[tokio::test]
    async fn share_creates_active_token() {
        let f = fixture(ViewLimitPolicy::default());
        let video = f.ledger.add_video(f.owner.id, Visibility::Public);

        let share = f.counters.create_share(video.id, Some(&f.viewer)).await.unwrap();
        assert!(share.active);
        assert_eq!(share.access_count, 0);
        assert_eq!(share.created_by, f.viewer.id);
        assert_eq!(share.share_token.get_version_num(), 4);

        let other = f.counters.create_share(video.id, Some(&f.viewer)).await.unwrap();
        assert_ne!(share.share_token, other.share_token);
    }

    #[tokio::test]
    async fn share_requires_user_and_video() {
        let f = fixture(ViewLimitPolicy::default());
        let video = f.ledger.add_video(f.owner.id, Visibility::Public);
        assert!(matches!(
            f.counters.create_share(video.id, None).await,
            Err(ServiceError::Unauthenticated)
        ));
        assert!(matches!(
            f.counters.create_share(404, Some(&f.viewer)).await,
            Err(ServiceError::NotFound(_))
        ));
    }
}
