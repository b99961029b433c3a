//! Role-specific profile side records (viewer and company profiles)

use chrono::NaiveDate;
use sqlx::{Executor, Postgres};

use crate::models::ViewerProfile;

/// Onboarding fields; `None` keeps the stored value
#[derive(Debug, Clone, Default)]
pub struct OnboardingUpdate {
    pub birthday: Option<NaiveDate>,
    pub gender: Option<String>,
    pub country: Option<String>,
    pub city: Option<String>,
    pub education_level: Option<String>,
    pub occupation: Option<String>,
    pub content_preferences: Option<Vec<String>>,
}

pub async fn get_viewer_profile<'e, E>(
    executor: E,
    user_id: i64,
) -> Result<Option<ViewerProfile>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as(
        r#"
        SELECT user_id, points, points_earned, points_redeemed, birthday, gender, country, city,
               education_level, occupation, content_preferences, onboarding_completed
        FROM viewer_profiles WHERE user_id = $1
        "#,
    )
    .bind(user_id)
    .fetch_optional(executor)
    .await
}

/// Credit points, creating the profile on first award
pub async fn award_points<'e, E>(
    executor: E,
    user_id: i64,
    points: i64,
) -> Result<ViewerProfile, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as(
        r#"
        INSERT INTO viewer_profiles (user_id, points, points_earned)
        VALUES ($1, $2, $2)
        ON CONFLICT (user_id) DO UPDATE SET
            points = viewer_profiles.points + EXCLUDED.points,
            points_earned = viewer_profiles.points_earned + EXCLUDED.points_earned,
            updated_at = NOW()
        RETURNING user_id, points, points_earned, points_redeemed, birthday, gender, country, city,
                  education_level, occupation, content_preferences, onboarding_completed
        "#,
    )
    .bind(user_id)
    .bind(points)
    .fetch_one(executor)
    .await
}

/// Upsert onboarding answers and mark onboarding complete
pub async fn upsert_onboarding<'e, E>(
    executor: E,
    user_id: i64,
    update: &OnboardingUpdate,
) -> Result<ViewerProfile, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let preferences = update.content_preferences.clone().map(sqlx::types::Json);

    sqlx::query_as(
        r#"
        INSERT INTO viewer_profiles (user_id, birthday, gender, country, city, education_level,
                                     occupation, content_preferences, onboarding_completed)
        VALUES ($1, $2, $3, $4, $5, $6, $7, COALESCE($8, '[]'::jsonb), TRUE)
        ON CONFLICT (user_id) DO UPDATE SET
            birthday = COALESCE(EXCLUDED.birthday, viewer_profiles.birthday),
            gender = COALESCE(EXCLUDED.gender, viewer_profiles.gender),
            country = COALESCE(EXCLUDED.country, viewer_profiles.country),
            city = COALESCE(EXCLUDED.city, viewer_profiles.city),
            education_level = COALESCE(EXCLUDED.education_level, viewer_profiles.education_level),
            occupation = COALESCE(EXCLUDED.occupation, viewer_profiles.occupation),
            content_preferences = COALESCE($8, viewer_profiles.content_preferences),
            onboarding_completed = TRUE,
            updated_at = NOW()
        RETURNING user_id, points, points_earned, points_redeemed, birthday, gender, country, city,
                  education_level, occupation, content_preferences, onboarding_completed
        "#,
    )
    .bind(user_id)
    .bind(update.birthday)
    .bind(update.gender.as_deref())
    .bind(update.country.as_deref())
    .bind(update.city.as_deref())
    .bind(update.education_level.as_deref())
    .bind(update.occupation.as_deref())
    .bind(preferences)
    .fetch_one(executor)
    .await
}

pub async fn delete_company_profile<'e, E>(executor: E, user_id: i64) -> Result<bool, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let result = sqlx::query("DELETE FROM company_profiles WHERE user_id = $1")
        .bind(user_id)
        .execute(executor)
        .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn delete_viewer_profile<'e, E>(executor: E, user_id: i64) -> Result<bool, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let result = sqlx::query("DELETE FROM viewer_profiles WHERE user_id = $1")
        .bind(user_id)
        .execute(executor)
        .await?;

    Ok(result.rows_affected() > 0)
}
