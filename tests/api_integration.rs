//! API integration tests
//!
//! Drive the full router (routing, extraction, validation, storage and error
//! mapping) against an in-memory SQLite backend.

use ad_sdk::api;
use ad_sdk::config::CorsConfig;
use ad_sdk::storage::{SqliteStorage, Storage};
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

/// Helper to create test storage
async fn create_test_storage() -> Arc<dyn Storage> {
    let storage = SqliteStorage::new("sqlite::memory:", 5).await.unwrap();
    storage.init().await.unwrap();
    Arc::new(storage)
}

async fn create_test_app() -> Router {
    api::create_api_router(create_test_storage().await, &CorsConfig::default())
}

/// The sample payload from the project README
fn taizu_payload() -> Value {
    json!({
        "package_name": "Ads",
        "name": "TAIZU",
        "description": "Asian fusion restaurant",
        "ad_type": "image",
        "beginning_date": "2024-01-01 00:00:00",
        "expiration_date": "2030-12-31 23:59:59",
        "ad_location": "Tel Aviv",
        "ad_link": "https://www.taizu.co.il",
        "ad_image_link": "https://www.taizu.co.il/logo.png",
        "category": "food"
    })
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| {
            Value::String(String::from_utf8_lossy(&bytes).into_owned())
        })
    };

    (status, json)
}

async fn create_ad(app: &Router, payload: Value) -> Value {
    let (status, body) = send(app, "POST", "/ad_sdk", Some(payload)).await;
    assert_eq!(status, StatusCode::CREATED, "unexpected body: {body}");
    body
}

#[tokio::test]
async fn test_readme_click_scenario() {
    let app = create_test_app().await;

    let created = create_ad(&app, taizu_payload()).await;
    let id = created["id"].as_str().unwrap().to_string();
    assert!(!id.is_empty());
    assert_eq!(created["click_count"], 0);
    assert_eq!(created["view_count"], 0);
    assert_eq!(created["completed_view_count"], 0);

    for _ in 0..3 {
        let (status, _) = send(
            &app,
            "POST",
            &format!("/ad_sdk/{id}/click?package_name=Ads"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, ad) = send(&app, "GET", &format!("/ad_sdk/Ads/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ad["click_count"], 3);
    assert_eq!(ad["name"], "TAIZU");
    assert_eq!(ad["beginning_date"], "2024-01-01 00:00:00");
}

#[tokio::test]
async fn test_create_rejects_missing_fields() {
    let app = create_test_app().await;

    let mut payload = taizu_payload();
    payload.as_object_mut().unwrap().remove("package_name");

    let (status, body) = send(&app, "POST", "/ad_sdk", Some(payload)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "missing required field: package_name");
}

#[tokio::test]
async fn test_create_rejects_bad_values() {
    let app = create_test_app().await;

    let mut bad_date = taizu_payload();
    bad_date["beginning_date"] = json!("01/01/2024");
    let (status, body) = send(&app, "POST", "/ad_sdk", Some(bad_date)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("beginning_date"));

    let mut inverted = taizu_payload();
    inverted["beginning_date"] = json!("2031-01-01 00:00:00");
    let (status, _) = send(&app, "POST", "/ad_sdk", Some(inverted)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let mut bad_type = taizu_payload();
    bad_type["ad_type"] = json!("hologram");
    let (status, _) = send(&app, "POST", "/ad_sdk", Some(bad_type)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_create_rejects_malformed_json() {
    let app = create_test_app().await;

    let request = Request::builder()
        .method("POST")
        .uri("/ad_sdk")
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_get_unknown_ad_is_404() {
    let app = create_test_app().await;

    let (status, body) = send(&app, "GET", "/ad_sdk/Ads/12345", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Ad not found");

    // Ads are scoped by package
    let created = create_ad(&app, taizu_payload()).await;
    let id = created["id"].as_str().unwrap();
    let (status, _) = send(&app, "GET", &format!("/ad_sdk/Other/{id}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_list_all_for_package() {
    let app = create_test_app().await;

    let (status, body) = send(&app, "GET", "/ad_sdk/Ads/all", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));

    create_ad(&app, taizu_payload()).await;
    let mut second = taizu_payload();
    second["name"] = json!("Second");
    create_ad(&app, second).await;
    let mut other = taizu_payload();
    other["package_name"] = json!("Games");
    create_ad(&app, other).await;

    let (status, body) = send(&app, "GET", "/ad_sdk/Ads/all", None).await;
    assert_eq!(status, StatusCode::OK);
    let ads = body.as_array().unwrap();
    assert_eq!(ads.len(), 2);
    assert!(ads.iter().all(|ad| ad["package_name"] == "Ads"));
}

#[tokio::test]
async fn test_filter_endpoint() {
    let app = create_test_app().await;

    let mut tel_aviv = taizu_payload();
    tel_aviv["beginning_date"] = json!("2024-03-01 00:00:00");
    tel_aviv["expiration_date"] = json!("2024-03-31 00:00:00");
    create_ad(&app, tel_aviv).await;

    let mut haifa = taizu_payload();
    haifa["ad_location"] = json!("Haifa");
    haifa["category"] = json!("fashion");
    haifa["beginning_date"] = json!("2024-04-01 00:00:00");
    haifa["expiration_date"] = json!("2024-04-30 00:00:00");
    create_ad(&app, haifa).await;

    let (status, body) = send(&app, "GET", "/ad_sdk/Ads?location=Tel%20Aviv", None).await;
    assert_eq!(status, StatusCode::OK);
    let ads = body.as_array().unwrap();
    assert_eq!(ads.len(), 1);
    assert_eq!(ads[0]["ad_location"], "Tel Aviv");

    let (_, body) = send(&app, "GET", "/ad_sdk/Ads?date=2024-04-15", None).await;
    let ads = body.as_array().unwrap();
    assert_eq!(ads.len(), 1);
    assert_eq!(ads[0]["ad_location"], "Haifa");

    let (_, body) = send(&app, "GET", "/ad_sdk/Ads?category=fashion&location=Haifa", None).await;
    assert_eq!(body.as_array().unwrap().len(), 1);

    let (_, body) = send(&app, "GET", "/ad_sdk/Ads?location=Eilat", None).await;
    assert_eq!(body, json!([]));

    // Neither window contains the present day
    let (_, body) = send(&app, "GET", "/ad_sdk/Ads?active=true", None).await;
    assert_eq!(body, json!([]));

    // Blank criteria are ignored
    let (_, body) = send(&app, "GET", "/ad_sdk/Ads?date=&location=", None).await;
    assert_eq!(body.as_array().unwrap().len(), 2);

    let (status, body) = send(&app, "GET", "/ad_sdk/Ads?date=15-04-2024", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid date format (use YYYY-MM-DD)");
}

#[tokio::test]
async fn test_active_filter_matches_running_ads() {
    let app = create_test_app().await;

    // TAIZU runs from 2024 to 2030
    create_ad(&app, taizu_payload()).await;

    let (status, body) = send(&app, "GET", "/ad_sdk/Ads?active=true", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_update_changes_only_supplied_fields() {
    let app = create_test_app().await;

    let created = create_ad(&app, taizu_payload()).await;
    let id = created["id"].as_str().unwrap();

    let (status, updated) = send(
        &app,
        "PUT",
        &format!("/ad_sdk/Ads/{id}"),
        Some(json!({
            "expiration_date": "2031-06-30 12:00:00",
            "category": "restaurants"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["expiration_date"], "2031-06-30 12:00:00");
    assert_eq!(updated["category"], "restaurants");

    for field in [
        "id",
        "package_name",
        "name",
        "description",
        "ad_type",
        "beginning_date",
        "ad_location",
        "ad_link",
        "ad_image_link",
        "click_count",
        "created_at",
    ] {
        assert_eq!(updated[field], created[field], "{field} changed");
    }

    let (_, fetched) = send(&app, "GET", &format!("/ad_sdk/Ads/{id}"), None).await;
    assert_eq!(fetched, updated);
}

#[tokio::test]
async fn test_update_errors() {
    let app = create_test_app().await;

    let created = create_ad(&app, taizu_payload()).await;
    let id = created["id"].as_str().unwrap();

    let (status, body) = send(&app, "PUT", &format!("/ad_sdk/Ads/{id}"), Some(json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "no fields provided for update");

    // Moving the end before the stored beginning
    let (status, _) = send(
        &app,
        "PUT",
        &format!("/ad_sdk/Ads/{id}"),
        Some(json!({ "expiration_date": "2023-01-01 00:00:00" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        "PUT",
        "/ad_sdk/Ads/99999",
        Some(json!({ "name": "Ghost" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(
        &app,
        "PUT",
        "/ad_sdk/Ads/99999",
        Some(json!({ "beginning_date": "2024-02-01 00:00:00" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_view_counters() {
    let app = create_test_app().await;

    let created = create_ad(&app, taizu_payload()).await;
    let id = created["id"].as_str().unwrap();

    let (status, ad) = send(
        &app,
        "POST",
        &format!("/ad_sdk/{id}/view?package_name=Ads&category=food"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ad["view_count"], 1);

    let (status, ad) = send(
        &app,
        "POST",
        &format!("/ad_sdk/{id}/view/completed?package_name=Ads"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ad["completed_view_count"], 1);
    assert_eq!(ad["view_count"], 1);
    assert_eq!(ad["click_count"], 0);

    // Scope mismatch
    let (status, _) = send(
        &app,
        "POST",
        &format!("/ad_sdk/{id}/view?package_name=Ads&category=games"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_counters_on_unknown_ad_are_404() {
    let app = create_test_app().await;

    for path in [
        "/ad_sdk/424242/click?package_name=Ads",
        "/ad_sdk/424242/view?package_name=Ads",
        "/ad_sdk/424242/view/completed?package_name=Ads",
        "/ad_sdk/not-an-id/click",
    ] {
        let (status, body) = send(&app, "POST", path, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{path}");
        assert_eq!(body["error"], "Ad not found");
    }
}

#[tokio::test]
async fn test_delete_all() {
    let app = create_test_app().await;

    create_ad(&app, taizu_payload()).await;
    let mut other = taizu_payload();
    other["package_name"] = json!("Games");
    create_ad(&app, other).await;

    let (status, body) = send(&app, "DELETE", "/ad_sdk", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["deleted_count"], 2);
    assert_eq!(body["message"], "All ads deleted successfully");

    for package in ["Ads", "Games"] {
        let (_, body) = send(&app, "GET", &format!("/ad_sdk/{package}/all"), None).await;
        assert_eq!(body, json!([]));
    }
}

#[tokio::test]
async fn test_summary() {
    let app = create_test_app().await;

    let (status, body) = send(&app, "GET", "/ad_sdk/AdClickStats/summary", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({ "total_clicks": 0, "total_views": 0, "total_completed_views": 0 })
    );

    let a = create_ad(&app, taizu_payload()).await;
    let mut second = taizu_payload();
    second["package_name"] = json!("Games");
    let b = create_ad(&app, second).await;

    for (ad, clicks) in [(&a, 5), (&b, 3)] {
        let id = ad["id"].as_str().unwrap();
        for _ in 0..clicks {
            send(&app, "POST", &format!("/ad_sdk/{id}/click"), None).await;
        }
    }
    let id = a["id"].as_str().unwrap();
    send(&app, "POST", &format!("/ad_sdk/{id}/view"), None).await;

    let (status, body) = send(&app, "GET", "/ad_sdk/AdClickStats/summary", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_clicks"], 8);
    assert_eq!(body["total_views"], 1);
    assert_eq!(body["total_completed_views"], 0);
}

#[tokio::test]
async fn test_index_and_health() {
    let app = create_test_app().await;

    let (status, body) = send(&app, "GET", "/", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!("Welcome to Ad SDK API!"));

    let (status, body) = send(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "OK");
}

#[tokio::test]
async fn test_routing_errors_have_json_bodies() {
    let app = create_test_app().await;

    let cases = [
        ("GET", "/ad_sdk", StatusCode::METHOD_NOT_ALLOWED),
        ("PATCH", "/ad_sdk/Ads/1", StatusCode::METHOD_NOT_ALLOWED),
        ("GET", "/ad_sdk/%FF/all", StatusCode::BAD_REQUEST),
        ("POST", "/ad_sdk/%FF/click", StatusCode::BAD_REQUEST),
        ("GET", "/nope", StatusCode::NOT_FOUND),
    ];

    for (method, uri, expected) in cases {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), expected, "{method} {uri}");

        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_string();
        assert!(
            content_type.starts_with("application/json"),
            "{method} {uri}: {content_type}"
        );

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert!(body["error"].is_string(), "{method} {uri}: {body}");
    }
}
