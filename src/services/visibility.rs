//! Resolve an opaque video identifier and decide who may see the result.
//!
//! Identifiers are either a numeric primary key or a v4 share token. The two
//! paths fail differently on purpose: a numeric id that exists but is
//! unavailable is `Forbidden`, while an unknown or inactive share token is
//! only ever `NotFound`, so token guessing reveals nothing about private
//! videos.

use std::sync::Arc;
use uuid::Uuid;

use super::error::{ServiceError, ServiceResult};
use crate::ledger::Ledger;
use crate::models::{Role, User, Video, Visibility};

pub const NOT_FOUND_MESSAGE: &str = "Resource not found";
pub const UNAVAILABLE_MESSAGE: &str = "This video is no longer available";

enum Identifier {
    Id(i64),
    ShareToken(Uuid),
}

fn parse_identifier(identifier: &str) -> Option<Identifier> {
    if !identifier.is_empty() && identifier.bytes().all(|b| b.is_ascii_digit()) {
        // Digits that overflow i64 cannot name a row
        return identifier.parse().ok().map(Identifier::Id);
    }

    Uuid::parse_str(identifier)
        .ok()
        .filter(|token| token.get_version_num() == 4)
        .map(Identifier::ShareToken)
}

/// Admins and owners see everything; everyone else sees non-private videos
pub fn is_available(video: &Video, requester: Option<&User>) -> bool {
    match requester {
        Some(user) if user.role == Role::Admin => true,
        Some(user) if user.id == video.uploader_id => true,
        _ => video.visibility != Visibility::Private,
    }
}

#[derive(Clone)]
pub struct VisibilityResolver {
    ledger: Arc<dyn Ledger>,
}

impl VisibilityResolver {
    pub fn new(ledger: Arc<dyn Ledger>) -> Self {
        Self { ledger }
    }

    pub async fn resolve(&self, identifier: &str, requester: Option<&User>) -> ServiceResult<Video> {
        let not_found = || ServiceError::NotFound(NOT_FOUND_MESSAGE.to_string());

        match parse_identifier(identifier).ok_or_else(not_found)? {
            Identifier::Id(video_id) => {
                let video = self
                    .ledger
                    .find_video(video_id)
                    .await?
                    .ok_or_else(not_found)?;

                if !is_available(&video, requester) {
                    return Err(ServiceError::Forbidden(UNAVAILABLE_MESSAGE.to_string()));
                }
                Ok(video)
            }
            Identifier::ShareToken(token) => {
                let video = self
                    .ledger
                    .record_share_access(token)
                    .await?
                    .ok_or_else(not_found)?;

                tracing::debug!(video_id = video.id, "resolved share token");
                Ok(video)
            }
        }
    }
}
