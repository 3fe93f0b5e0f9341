use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    Json,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

use super::error::{ApiError, ApiResult};
use crate::models::dates;
use crate::models::{
    Ad, AdScope, CreateAdRequest, DeleteAllResponse, FilterQuery, UpdateAdRequest,
};
use crate::storage::Storage;

pub struct AppState {
    pub storage: Arc<dyn Storage>,
}

#[derive(Serialize)]
pub struct SuccessResponse {
    pub message: String,
}

/// Create a new ad
pub async fn create_ad(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CreateAdRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Ad>)> {
    let Json(payload) = payload?;
    let new_ad = payload.validate()?;

    let ad = state.storage.create(new_ad).await?;
    info!(ad_id = %ad.id, package = %ad.package_name, "Ad created");

    Ok((StatusCode::CREATED, Json(ad)))
}

/// List every ad of a package
pub async fn list_ads(
    State(state): State<Arc<AppState>>,
    package_name: Result<Path<String>, PathRejection>,
) -> ApiResult<Json<Vec<Ad>>> {
    let Path(package_name) = package_name?;
    let ads = state.storage.list(&package_name).await?;
    Ok(Json(ads))
}

/// Get an ad by id
pub async fn get_ad(
    State(state): State<Arc<AppState>>,
    path: Result<Path<(String, String)>, PathRejection>,
) -> ApiResult<Json<Ad>> {
    let Path((package_name, id)) = path?;
    state
        .storage
        .get(&package_name, &id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("Ad not found".to_string()))
}

/// Update the supplied fields of an ad
pub async fn update_ad(
    State(state): State<Arc<AppState>>,
    path: Result<Path<(String, String)>, PathRejection>,
    payload: Result<Json<UpdateAdRequest>, JsonRejection>,
) -> ApiResult<Json<Ad>> {
    let Path((package_name, id)) = path?;
    let Json(payload) = payload?;
    let patch = payload.into_patch()?;

    if patch.changes_one_window_end() {
        let current = state
            .storage
            .get(&package_name, &id)
            .await?
            .ok_or_else(|| ApiError::NotFound("Ad not found".to_string()))?;
        patch.check_window(&current)?;
    }

    let ad = state.storage.update(&package_name, &id, &patch).await?;
    info!(ad_id = %ad.id, package = %ad.package_name, "Ad updated");

    Ok(Json(ad))
}

/// List a package's ads by date, location and category
pub async fn filter_ads(
    State(state): State<Arc<AppState>>,
    package_name: Result<Path<String>, PathRejection>,
    query: Result<Query<FilterQuery>, QueryRejection>,
) -> ApiResult<Json<Vec<Ad>>> {
    let Path(package_name) = package_name?;
    let Query(query) = query?;
    let filter = query.into_filter(dates::now())?;

    let ads = state.storage.filter(&package_name, &filter).await?;
    Ok(Json(ads))
}

/// Delete every ad of every package
pub async fn delete_all_ads(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<DeleteAllResponse>> {
    let deleted_count = state.storage.delete_all().await?;
    tracing::warn!(deleted_count, "All ads deleted");

    Ok(Json(DeleteAllResponse {
        message: "All ads deleted successfully".to_string(),
        deleted_count,
    }))
}

/// Record a click on an ad
pub async fn record_click(
    State(state): State<Arc<AppState>>,
    id: Result<Path<String>, PathRejection>,
    scope: Result<Query<AdScope>, QueryRejection>,
) -> ApiResult<Json<Ad>> {
    let Path(id) = id?;
    let Query(scope) = scope?;
    let ad = state
        .storage
        .increment_click(&id, &scope.normalized())
        .await?;
    Ok(Json(ad))
}

/// Record a view of an ad
pub async fn record_view(
    State(state): State<Arc<AppState>>,
    id: Result<Path<String>, PathRejection>,
    scope: Result<Query<AdScope>, QueryRejection>,
) -> ApiResult<Json<Ad>> {
    let Path(id) = id?;
    let Query(scope) = scope?;
    let ad = state
        .storage
        .increment_view(&id, &scope.normalized())
        .await?;
    Ok(Json(ad))
}

/// Record a video ad watched to the end
pub async fn record_completed_view(
    State(state): State<Arc<AppState>>,
    id: Result<Path<String>, PathRejection>,
    scope: Result<Query<AdScope>, QueryRejection>,
) -> ApiResult<Json<Ad>> {
    let Path(id) = id?;
    let Query(scope) = scope?;
    let ad = state
        .storage
        .increment_completed_view(&id, &scope.normalized())
        .await?;
    Ok(Json(ad))
}

pub async fn index() -> &'static str {
    "Welcome to Ad SDK API!"
}

/// Answers requests for paths no route serves
pub async fn route_not_found() -> ApiError {
    ApiError::NotFound("Route not found".to_string())
}

pub async fn method_not_allowed() -> ApiError {
    ApiError::MethodNotAllowed("Method not allowed".to_string())
}

/// Health check endpoint
pub async fn health_check() -> Json<SuccessResponse> {
    Json(SuccessResponse {
        message: "OK".to_string(),
    })
}
