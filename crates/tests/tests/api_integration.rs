mod common;

use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use lyra_api::{build_app_with, ApiConfig};
use serde_json::json;
use tower::ServiceExt;

use common::{body_json, body_text, get, post_json, test_app, test_config, test_settings};

fn birth(year: i32) -> serde_json::Value {
    json!({
        "year": year,
        "month": 7,
        "day": 21,
        "hour": 9,
        "minute": 15,
        "latitude": 51.5,
        "longitude": -0.12
    })
}

#[tokio::test]
async fn health_is_public() {
    let app = test_app().await;

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let parsed = body_json(response).await;
    assert_eq!(parsed["status"], "ok");
    assert!(parsed.get("metrics").is_some());
}

#[tokio::test]
async fn chat_requires_api_key() {
    let app = test_app().await;

    let request = Request::builder()
        .method("POST")
        .uri("/v1/chat")
        .header("content-type", "application/json")
        .body(Body::from(json!({ "text": "hello" }).to_string()))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let parsed = body_json(response).await;
    assert_eq!(parsed["error"], "unauthorized");
}

#[tokio::test]
async fn chat_returns_reply_with_intent() {
    let app = test_app().await;

    let response = app
        .oneshot(post_json(
            "/v1/chat",
            json!({ "text": "I feel really lonely tonight", "user_name": "Jo" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response
            .headers()
            .get("x-content-type-options")
            .and_then(|value| value.to_str().ok()),
        Some("nosniff")
    );

    let parsed = body_json(response).await;
    assert_eq!(parsed["intent"], "sad");
    assert_eq!(parsed["persona"], "Astrologer");
    assert_eq!(parsed["limited"], false);
    assert!(parsed["session_id"].as_str().is_some_and(|id| !id.is_empty()));
    let reply = parsed["reply_text"].as_str().expect("reply text");
    assert!(!reply.is_empty());
    assert!(!reply.contains('{'));
}

#[tokio::test]
async fn session_onboarding_and_dashboard_flow() {
    let app = test_app().await;

    let response = app
        .clone()
        .oneshot(post_json(
            "/v1/session",
            json!({ "user_name": "Ada", "persona": "friend" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let session = body_json(response).await;
    assert_eq!(session["persona"], "Friend");
    assert!(session["welcome_message"]
        .as_str()
        .is_some_and(|text| text.contains("Friend guide")));
    let session_id = session["session_id"].as_str().expect("session id").to_string();

    let response = app
        .clone()
        .oneshot(post_json(
            "/v1/onboarding",
            json!({
                "session_id": session_id,
                "date": "1990-04-02",
                "time": "06:45",
                "location": "Reykjavik"
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let onboarded = body_json(response).await;
    assert_eq!(onboarded["birth"]["location"], "Reykjavik");
    assert!(onboarded["big_three"]["rising"].is_string());

    let response = app
        .clone()
        .oneshot(get(&format!(
            "/v1/dashboard?session_id={session_id}&period=monthly"
        )))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let dashboard = body_json(response).await;
    assert_eq!(dashboard["horoscope"]["period"], "monthly");
    assert_eq!(dashboard["energy"].as_array().map(Vec::len), Some(4));
    assert_eq!(dashboard["transits"].as_array().map(Vec::len), Some(5));
    assert_eq!(dashboard["big_three"], onboarded["big_three"]);
    assert!(dashboard["chart_svg"]
        .as_str()
        .is_some_and(|svg| svg.starts_with("<svg")));

    let response = app
        .clone()
        .oneshot(post_json(
            "/v1/persona",
            json!({ "session_id": session_id, "persona": "therapist" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["persona"], "Therapist");

    let response = app
        .oneshot(get(&format!("/v1/chart.svg?session_id={session_id}&width=300&height=300")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let svg = body_text(response).await;
    assert!(svg.contains(r#"width="300""#));
}

#[tokio::test]
async fn unknown_session_is_not_found() {
    let app = test_app().await;

    let response = app
        .oneshot(post_json(
            "/v1/chat",
            json!({ "session_id": "does-not-exist", "text": "hi" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["error"], "session_not_found");
}

#[tokio::test]
async fn ended_session_is_not_found_afterwards() {
    let app = test_app().await;

    let response = app
        .clone()
        .oneshot(post_json("/v1/session", json!({ "user_name": "Lee" })))
        .await
        .unwrap();
    let session_id = body_json(response).await["session_id"]
        .as_str()
        .expect("session id")
        .to_string();

    let response = app
        .clone()
        .oneshot(post_json(
            "/v1/session/end",
            json!({ "session_id": session_id }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["ended"], true);

    let response = app
        .clone()
        .oneshot(post_json(
            "/v1/chat",
            json!({ "session_id": session_id, "text": "still there?" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app
        .oneshot(post_json(
            "/v1/session/end",
            json!({ "session_id": session_id }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["error"], "session_not_found");
}

#[tokio::test]
async fn forwarded_header_does_not_reset_the_rate_limit() {
    let config = ApiConfig {
        rate_limit_max: 1,
        ..test_config()
    };
    let app = build_app_with(config, test_settings())
        .await
        .expect("app should build");

    let forwarded = |address: &str| {
        let mut request = get("/v1/transits");
        request
            .headers_mut()
            .insert("x-forwarded-for", address.parse().expect("header value"));
        request
    };

    let response = app.clone().oneshot(forwarded("198.51.100.1")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.oneshot(forwarded("198.51.100.2")).await.unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn invalid_birth_date_is_a_bad_request() {
    let app = test_app().await;

    let response = app
        .clone()
        .oneshot(post_json("/v1/session", json!({})))
        .await
        .unwrap();
    let session_id = body_json(response).await["session_id"]
        .as_str()
        .expect("session id")
        .to_string();

    let response = app
        .oneshot(post_json(
            "/v1/onboarding",
            json!({
                "session_id": session_id,
                "date": "yesterday",
                "time": "06:45",
                "location": "Paris"
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "invalid_input");
}

#[tokio::test]
async fn blank_chat_is_a_bad_request() {
    let app = test_app().await;

    let response = app
        .oneshot(post_json("/v1/chat", json!({ "text": "   " })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "empty_message");
}

#[tokio::test]
async fn chart_svg_is_served_as_svg() {
    let app = test_app().await;

    let response = app.oneshot(get("/v1/chart.svg")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert!(content_type.starts_with("image/svg+xml"));

    let svg = body_text(response).await;
    let document = roxmltree::Document::parse(&svg).expect("well-formed svg");
    assert_eq!(document.root_element().tag_name().name(), "svg");
    assert!(!svg.contains("href"));
}

#[tokio::test]
async fn chart_endpoint_returns_chart_and_svg() {
    let app = test_app().await;

    let mut payload = birth(1985);
    payload["width"] = json!(500);
    payload["height"] = json!(500);
    let response = app.oneshot(post_json("/v1/chart", payload)).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let parsed = body_json(response).await;
    assert_eq!(parsed["chart"]["bodies"].as_array().map(Vec::len), Some(10));
    assert_eq!(parsed["chart"]["houses"].as_array().map(Vec::len), Some(12));
    assert_eq!(parsed["chart"]["aspects"].as_array().map(Vec::len), Some(4));
    assert!(parsed["svg"]
        .as_str()
        .is_some_and(|svg| svg.contains(r#"width="500""#)));
}

#[tokio::test]
async fn transits_and_compatibility() {
    let app = test_app().await;

    let response = app.clone().oneshot(get("/v1/transits")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let transits = body_json(response).await;
    assert_eq!(transits["transits"].as_array().map(Vec::len), Some(5));
    assert_eq!(transits["chart"]["bodies"].as_array().map(Vec::len), Some(10));

    let response = app
        .oneshot(post_json(
            "/v1/compatibility",
            json!({ "first": birth(1990), "second": birth(1993) }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let report = body_json(response).await;
    let percentage = report["percentage"].as_u64().expect("percentage");
    assert!((60..100).contains(&percentage));
    assert_eq!(report["aspects"].as_array().map(Vec::len), Some(6));
}

#[tokio::test]
async fn classify_uses_group_priority() {
    let app = test_app().await;

    let response = app
        .oneshot(post_json(
            "/v1/classify",
            json!({ "text": "Hello!   Will my   career improve?" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let parsed = body_json(response).await;
    assert_eq!(parsed["intent"], "greeting");
    assert_eq!(parsed["normalized"], "Hello! Will my career improve?");
}

#[tokio::test]
async fn rate_limit_rejects_excess_requests() {
    let config = ApiConfig {
        rate_limit_window: Duration::from_secs(60),
        rate_limit_max: 2,
        ..test_config()
    };
    let app = build_app_with(config, test_settings())
        .await
        .expect("app should build");

    for _ in 0..2 {
        let response = app.clone().oneshot(get("/v1/transits")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = app.clone().oneshot(get("/v1/transits")).await.unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body_json(response).await["error"], "rate_limited");

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
