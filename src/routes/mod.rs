pub mod admin;
pub mod auth;
pub mod user;
pub mod videos;
pub mod webcam;

use axum::Router;
use serde::Deserialize;
use std::sync::Arc;

use crate::AppState;
use crate::constants::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};

/// Build all routes for the API
pub fn build_routes() -> Router<Arc<AppState>> {
    Router::new()
        .merge(admin::routes())
        .merge(user::routes())
        .merge(videos::routes())
        .merge(webcam::routes())
}

/// `?limit=&offset=` query shared by list endpoints
#[derive(Debug, Default, Deserialize)]
pub struct Page {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl Page {
    pub fn limit(&self) -> i64 {
        self.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE)
    }

    pub fn offset(&self) -> i64 {
        self.offset.unwrap_or(0).max(0)
    }
}
