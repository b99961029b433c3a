//! Signed-in user endpoints (/me, history, points, onboarding)

use axum::{
    Json, Router,
    extract::State,
    routing::get,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::auth::AuthUser;
use crate::AppState;
use crate::constants::POINTS_CONVERSION_RATE;
use crate::domain::{engagement, profiles};
use crate::models::{Role, User, Video, ViewerProfile};
use crate::services::error::{LogErr, ServiceError};

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/me", get(get_me))
        .route("/me/history", get(get_history))
        .route("/me/points", get(get_points))
        .route(
            "/me/onboarding",
            axum::routing::put(update_onboarding).patch(update_onboarding),
        )
}

/// GET /me - Current user
async fn get_me(AuthUser(user): AuthUser) -> Json<User> {
    Json(user)
}

/// GET /me/history - Videos the caller has viewed, most recent view first
async fn get_history(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
) -> Result<Json<Vec<Video>>, ServiceError> {
    let videos = engagement::list_viewed_videos(&state.db, user.id)
        .await
        .log_500("List viewed videos error")?;

    Ok(Json(videos))
}

#[derive(Debug, Serialize, PartialEq)]
struct PointsResponse {
    points: i64,
    points_earned: i64,
    points_redeemed: i64,
    points_value: f64,
    conversion_rate: f64,
}

impl PointsResponse {
    fn from_profile(profile: Option<&ViewerProfile>) -> Self {
        let (points, points_earned, points_redeemed) = profile
            .map(|p| (p.points, p.points_earned, p.points_redeemed))
            .unwrap_or_default();

        Self {
            points,
            points_earned,
            points_redeemed,
            points_value: points as f64 * POINTS_CONVERSION_RATE,
            conversion_rate: POINTS_CONVERSION_RATE,
        }
    }
}

/// GET /me/points - Balance and its currency value
async fn get_points(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
) -> Result<Json<PointsResponse>, ServiceError> {
    let profile = profiles::get_viewer_profile(&state.db, user.id)
        .await
        .log_500("Get viewer profile error")?;

    Ok(Json(PointsResponse::from_profile(profile.as_ref())))
}

#[derive(Debug, Default, Deserialize)]
struct OnboardingRequest {
    birthday: Option<String>,
    gender: Option<String>,
    country: Option<String>,
    city: Option<String>,
    education_level: Option<String>,
    occupation: Option<String>,
    content_preferences: Option<Vec<String>>,
}

impl OnboardingRequest {
    fn into_update(self) -> Result<profiles::OnboardingUpdate, ServiceError> {
        let birthday = self
            .birthday
            .filter(|b| !b.is_empty())
            .map(|b| {
                NaiveDate::parse_from_str(&b, "%Y-%m-%d").map_err(|_| {
                    ServiceError::validation(
                        "birthday",
                        "Date has wrong format. Use one of these formats instead: YYYY-MM-DD.",
                    )
                })
            })
            .transpose()?;

        Ok(profiles::OnboardingUpdate {
            birthday,
            gender: self.gender,
            country: self.country,
            city: self.city,
            education_level: self.education_level,
            occupation: self.occupation,
            content_preferences: self.content_preferences,
        })
    }
}

/// PUT/PATCH /me/onboarding - Viewer profile answers
async fn update_onboarding(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Json(req): Json<OnboardingRequest>,
) -> Result<Json<ViewerProfile>, ServiceError> {
    if user.role != Role::User {
        return Err(ServiceError::Forbidden(
            "Only viewers have an onboarding profile".to_string(),
        ));
    }
    let update = req.into_update()?;

    let profile = profiles::upsert_onboarding(&state.db, user.id, &update)
        .await
        .log_500("Upsert onboarding error")?;

    Ok(Json(profile))
}
