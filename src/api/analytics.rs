//! Engagement analytics handlers

use axum::{extract::State, Json};
use std::sync::Arc;

use super::error::ApiResult;
use super::handlers::AppState;
use crate::models::AdSummary;

/// Total clicks, views and completed views across every ad.
///
/// Scans the whole collection; there is no per-package breakdown.
pub async fn get_summary(State(state): State<Arc<AppState>>) -> ApiResult<Json<AdSummary>> {
    let summary = state.storage.summary().await?;
    Ok(Json(summary))
}
