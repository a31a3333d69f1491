//! HTTP API ルーティングの結合テスト
//!
//! ブラウザは起動せず、照会部分を固定応答のフェイクに差し替える

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use lawgic_scraper::api::{build_router, AppState};
use lawgic_scraper::service::VoterLookup;
use lawgic_scraper::voter::{VoterInfo, VoterQuery};
use lawgic_scraper::ScraperError;
use serde_json::{json, Value};
use tower::util::ServiceExt; // for `oneshot`

/// 姓が "Nobody" なら該当なし、それ以外は固定の登録情報を返す
struct FakeLookup;

#[async_trait]
impl VoterLookup for FakeLookup {
    async fn lookup(&self, query: VoterQuery) -> Result<VoterInfo, ScraperError> {
        if query.last_name == "Nobody" {
            return Err(ScraperError::Login("No voter record found".into()));
        }
        Ok(VoterInfo {
            name: Some(format!("{} {}", query.first_name, query.last_name).to_uppercase()),
            parish: Some("East Baton Rouge".into()),
            ward_precinct: Some("03/016".into()),
            party: Some("No Party".into()),
            status: Some("Active".into()),
            ..Default::default()
        })
    }
}

fn setup_app() -> axum::Router {
    build_router(AppState::new(FakeLookup))
}

fn json_request(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn extract_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .expect("Should read body");
    serde_json::from_slice(&bytes).expect("Should parse JSON")
}

fn voter(first: &str, last: &str) -> Value {
    json!({
        "first_name": first,
        "last_name": last,
        "zip_code": "70817",
        "birth_month": 7,
        "birth_year": 2003
    })
}

// =============================================================================
// Health
// =============================================================================

#[tokio::test]
async fn test_health_endpoint() {
    let request = Request::builder()
        .uri("/health")
        .body(Body::empty())
        .unwrap();
    let response = setup_app().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body, json!({ "status": "healthy", "service": "voter-info-api" }));
}

#[tokio::test]
async fn test_unknown_route_is_json_404() {
    let request = Request::builder()
        .uri("/api/unknown")
        .body(Body::empty())
        .unwrap();
    let response = setup_app().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body, json!({ "success": false, "error": "Endpoint not found" }));
}

// =============================================================================
// POST /api/voter-info
// =============================================================================

#[tokio::test]
async fn test_voter_info_success() {
    let response = setup_app()
        .oneshot(json_request("/api/voter-info", voter("Ashtyn", "Roberts")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["parish"], "East Baton Rouge");
    assert_eq!(body["data"]["ward_precinct"], "03/016");
    assert!(body["data"].get("voting_location_name").is_none());
}

#[tokio::test]
async fn test_voter_info_not_found() {
    let response = setup_app()
        .oneshot(json_request("/api/voter-info", voter("Ashtyn", "Nobody")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["success"], false);
    assert!(body["error"]
        .as_str()
        .unwrap()
        .contains("No voter record found"));
}

#[tokio::test]
async fn test_voter_info_requires_json() {
    let request = Request::builder()
        .method("POST")
        .uri("/api/voter-info")
        .header(header::CONTENT_TYPE, "text/plain")
        .body(Body::from("first_name=Ashtyn"))
        .unwrap();
    let response = setup_app().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["error"], "Request must be JSON");
}

#[tokio::test]
async fn test_voter_info_validation_error() {
    let mut payload = voter("Ashtyn", "Roberts");
    payload["zip_code"] = json!("123");
    let response = setup_app()
        .oneshot(json_request("/api/voter-info", payload))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = extract_json(response.into_body()).await;
    assert_eq!(
        body,
        json!({ "success": false, "error": "zip_code must be a 5-digit number" })
    );
}

#[tokio::test]
async fn test_cors_headers_present() {
    let mut request = json_request("/api/voter-info", voter("Ashtyn", "Roberts"));
    request
        .headers_mut()
        .insert(header::ORIGIN, "http://localhost:3000".parse().unwrap());
    let response = setup_app().oneshot(request).await.unwrap();

    assert!(response
        .headers()
        .contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN));
}

// =============================================================================
// POST /api/batch-voter-info
// =============================================================================

#[tokio::test]
async fn test_batch_mixed_results() {
    let mut found = voter("Ashtyn", "Roberts");
    found["uid"] = json!("user1");
    let mut missing = voter("Jane", "Nobody");
    missing["uid"] = json!("user2");
    let mut invalid = voter("Joe", "Smith");
    invalid["uid"] = json!("user3");
    invalid["birth_month"] = json!(0);

    let response = setup_app()
        .oneshot(json_request(
            "/api/batch-voter-info",
            json!({ "users": [found, missing, invalid] }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["success"], true);

    let results = body["results"].as_array().unwrap();
    assert_eq!(results.len(), 3);

    assert_eq!(results[0]["uid"], "user1");
    assert_eq!(results[0]["success"], true);
    assert_eq!(results[0]["data"]["status"], "Active");
    assert!(results[0]["error"].is_null());

    assert_eq!(results[1]["uid"], "user2");
    assert_eq!(results[1]["success"], false);
    assert!(results[1]["data"].is_null());

    assert_eq!(results[2]["success"], false);
    assert_eq!(results[2]["error"], "birth_month must be between 1 and 12");
}

#[tokio::test]
async fn test_batch_users_must_be_array() {
    let response = setup_app()
        .oneshot(json_request(
            "/api/batch-voter-info",
            json!({ "users": "user1" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["error"], "users must be an array");
}

#[tokio::test]
async fn test_batch_size_limit() {
    let users: Vec<Value> = (0..51).map(|_| voter("Ashtyn", "Roberts")).collect();
    let response = setup_app()
        .oneshot(json_request("/api/batch-voter-info", json!({ "users": users })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["error"], "Batch size limited to 50 users");
}

#[tokio::test]
async fn test_batch_without_users_is_empty() {
    let response = setup_app()
        .oneshot(json_request("/api/batch-voter-info", json!({})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body, json!({ "success": true, "results": [] }));
}
