//! Request authentication
//!
//! Sessions are HS256 JWTs whose `sub` is the identity provider uid. The token
//! is read from `Authorization: Bearer` first and the `access_token` cookie
//! second, then resolved to a ledger user.

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use axum_extra::extract::CookieJar;
use std::sync::Arc;

use crate::AppState;
use crate::models::{Role, User};
use crate::services::error::ServiceError;
use crate::services::session;

const ACCESS_TOKEN_COOKIE: &str = "access_token";

fn bearer_token(parts: &Parts) -> Option<String> {
    parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|t| t.trim().to_string())
}

/// Resolve the caller, `None` when no token was sent at all.
/// A token that is present but invalid is always rejected.
async fn current_user(parts: &mut Parts, state: &Arc<AppState>) -> Result<Option<User>, ServiceError> {
    let token = match bearer_token(parts) {
        Some(token) => token,
        None => {
            let jar = CookieJar::from_request_parts(parts, state)
                .await
                .map_err(|_| ServiceError::Unauthenticated)?;
            match jar.get(ACCESS_TOKEN_COOKIE) {
                Some(cookie) => cookie.value().to_string(),
                None => return Ok(None),
            }
        }
    };

    let external_id = session::validate_access_token(&token, &state.jwt_secret).map_err(|e| {
        tracing::debug!(error = %e, "JWT validation failed");
        ServiceError::Unauthenticated
    })?;

    // A valid token for a user the ledger does not know is still unauthenticated
    let user = state
        .ledger
        .find_user_by_external_id(&external_id)
        .await?
        .ok_or(ServiceError::Unauthenticated)?;

    Ok(Some(user))
}

/// Extractor for routes that require a signed-in user
pub struct AuthUser(pub User);

impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = ServiceError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        current_user(parts, state)
            .await?
            .map(AuthUser)
            .ok_or(ServiceError::Unauthenticated)
    }
}

/// Extractor for routes open to anonymous callers
pub struct MaybeUser(pub Option<User>);

impl FromRequestParts<Arc<AppState>> for MaybeUser {
    type Rejection = ServiceError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        Ok(MaybeUser(current_user(parts, state).await?))
    }
}

/// Extractor for admin-only routes: 401 without a user, 403 for non-admins
pub struct AdminUser(pub User);

impl FromRequestParts<Arc<AppState>> for AdminUser {
    type Rejection = ServiceError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let AuthUser(user) = AuthUser::from_request_parts(parts, state).await?;
        if user.role != Role::Admin {
            return Err(ServiceError::Forbidden(
                "You do not have permission to perform this action.".to_string(),
            ));
        }
        Ok(AdminUser(user))
    }
}

/// Extractor for uploaders: companies and admins
pub struct UploaderUser(pub User);

impl FromRequestParts<Arc<AppState>> for UploaderUser {
    type Rejection = ServiceError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let AuthUser(user) = AuthUser::from_request_parts(parts, state).await?;
        match user.role {
            Role::Company | Role::Admin => Ok(UploaderUser(user)),
            Role::User => Err(ServiceError::Forbidden(
                "Only companies and admins can upload videos".to_string(),
            )),
        }
    }
}
