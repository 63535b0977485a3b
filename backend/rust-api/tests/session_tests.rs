// Session cookie, language preference and operational endpoints
use axum::http::{header, StatusCode};
use serde_json::json;

mod common;
use common::*;

#[tokio::test]
async fn test_first_request_issues_session_cookie() {
    let app = create_test_app(ScriptedGenerationClient::new(vec![]));

    let response = get(&app, "/", None).await;
    assert_eq!(response.status, StatusCode::OK);

    let set_cookie = response.set_cookie_header().unwrap();
    assert!(set_cookie.starts_with("quiz_session="));
    assert!(set_cookie.contains("HttpOnly"));
    assert!(set_cookie.contains("SameSite=Lax"));
    assert!(set_cookie.contains("Path=/"));
    assert!(!set_cookie.contains("Max-Age"));
    assert!(!set_cookie.contains("Expires"));
}

#[tokio::test]
async fn test_known_session_is_not_reissued() {
    let app = create_test_app(ScriptedGenerationClient::new(vec![]));
    let cookie = get(&app, "/", None).await.session_cookie().unwrap();

    let response = get(&app, "/", Some(&cookie)).await;
    assert_eq!(response.status, StatusCode::OK);
    assert!(response.session_cookie().is_none());
}

#[tokio::test]
async fn test_tampered_cookie_starts_fresh_session() {
    let app = create_test_app(ScriptedGenerationClient::new(vec![]));

    let cookie = post_json(&app, "/set-language", json!({ "language": "de" }), None)
        .await
        .session_cookie()
        .unwrap();
    let tampered = format!("{}x", cookie);

    let response = get(&app, "/", Some(&tampered)).await;
    let reissued = response.session_cookie().expect("new cookie for tampered one");
    assert_ne!(reissued, cookie);

    let html = String::from_utf8(response.body).unwrap();
    assert!(html.contains(r#"<html lang="en">"#));
}

#[tokio::test]
async fn test_language_preference_persists() {
    let app = create_test_app(ScriptedGenerationClient::new(vec![]));

    let response = post_json(&app, "/set-language", json!({ "language": "fr" }), None).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.json(), json!({ "status": "ok", "language": "fr" }));
    let cookie = response.session_cookie().unwrap();

    let page = get(&app, "/", Some(&cookie)).await;
    assert_eq!(
        page.headers.get(header::CONTENT_TYPE).unwrap(),
        "text/html; charset=utf-8"
    );
    let html = String::from_utf8(page.body).unwrap();
    assert!(html.contains(r#"<html lang="fr">"#));
}

#[tokio::test]
async fn test_set_language_defaults_to_english() {
    let app = create_test_app(ScriptedGenerationClient::new(vec![]));

    let response = post_json(&app, "/set-language", json!({}), None).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.json()["language"], "en");

    let too_long = post_json(
        &app,
        "/set-language",
        json!({ "language": "x".repeat(17) }),
        None,
    )
    .await;
    assert_eq!(too_long.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_health_reports_session_store() {
    let app = create_test_app(ScriptedGenerationClient::new(vec![]));

    let response = get(&app, "/health", None).await;
    assert_eq!(response.status, StatusCode::OK);
    assert!(response.session_cookie().is_none());

    let body = response.json();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["service"], "quizspark-api");
    assert_eq!(body["dependencies"]["memory"]["status"], "healthy");
    assert_eq!(body["dependencies"]["gemini"]["status"], "unconfigured");
}

#[tokio::test]
async fn test_metrics_require_basic_auth() {
    let app = create_test_app(ScriptedGenerationClient::new(vec![]));

    let response = get(&app, "/metrics", None).await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_responses_carry_trace_id_and_csp() {
    let app = create_test_app(ScriptedGenerationClient::new(vec![]));

    let response = get(&app, "/health", None).await;
    assert!(response.headers.contains_key("x-trace-id"));
    assert!(response
        .headers
        .contains_key(header::CONTENT_SECURITY_POLICY));
}
