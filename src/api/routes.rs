use axum::{
    http::HeaderValue,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::CorsConfig;
use crate::storage::Storage;

use super::analytics::get_summary;
use super::handlers::{
    create_ad, delete_all_ads, filter_ads, get_ad, health_check, index, list_ads,
    method_not_allowed, record_click, record_completed_view, record_view, route_not_found,
    update_ad, AppState,
};

pub fn create_api_router(storage: Arc<dyn Storage>, cors: &CorsConfig) -> Router {
    let state = Arc::new(AppState { storage });

    let ad_routes = Router::new()
        .route("/ad_sdk", post(create_ad).delete(delete_all_ads))
        .route("/ad_sdk/AdClickStats/summary", get(get_summary))
        .route("/ad_sdk/{package}", get(filter_ads))
        .route("/ad_sdk/{package}/all", get(list_ads))
        .route("/ad_sdk/{package}/{id}", get(get_ad).put(update_ad))
        .route("/ad_sdk/{id}/click", post(record_click))
        .route("/ad_sdk/{id}/view", post(record_view))
        .route("/ad_sdk/{id}/view/completed", post(record_completed_view))
        .with_state(state);

    Router::new()
        .route("/", get(index))
        .route("/health", get(health_check))
        .merge(ad_routes)
        .fallback(route_not_found)
        .method_not_allowed_fallback(method_not_allowed)
        .layer(cors_layer(cors))
        .layer(TraceLayer::new_for_http())
}

fn cors_layer(config: &CorsConfig) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);

    if config.allowed_origins.is_empty() {
        return layer.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin '{origin}'");
                None
            }
        })
        .collect();

    layer.allow_origin(origins)
}
