//! User domain - DB queries for users
//!
//! All functions use the generic Executor pattern, allowing them to work with
//! both `&PgPool` (for standalone queries) and `&mut PgConnection` (for transactions).

use sqlx::{Executor, Postgres};

use crate::models::{Role, User};

/// Get a user by primary key
pub async fn get_user_by_id<'e, E>(executor: E, user_id: i64) -> Result<Option<User>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as("SELECT id, email, external_id, role, created_at FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(executor)
        .await
}

/// Get a user by identity provider UID (session subject)
pub async fn get_user_by_external_id<'e, E>(
    executor: E,
    external_id: &str,
) -> Result<Option<User>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as(
        "SELECT id, email, external_id, role, created_at FROM users WHERE external_id = $1",
    )
    .bind(external_id)
    .fetch_optional(executor)
    .await
}

/// Case-insensitive lookup by email
pub async fn find_user_by_email<'e, E>(executor: E, email: &str) -> Result<Option<User>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as(
        "SELECT id, email, external_id, role, created_at FROM users WHERE LOWER(email) = LOWER($1)",
    )
    .bind(email)
    .fetch_optional(executor)
    .await
}

/// Overwrite a user's role, returning the updated row
pub async fn set_user_role<'e, E>(
    executor: E,
    user_id: i64,
    role: Role,
) -> Result<Option<User>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as(
        r#"
        UPDATE users SET role = $2
        WHERE id = $1
        RETURNING id, email, external_id, role, created_at
        "#,
    )
    .bind(user_id)
    .bind(role)
    .fetch_optional(executor)
    .await
}
