//! End-to-end tests for the HTTP routes, driven through the router with a
//! scripted provider.

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::json;

use chatrelay::providers::fake::Script;
use chatrelay::providers::{Message, Role};

use common::{json, sse_events, TestApp};

#[tokio::test]
async fn test_follow_up_turn_carries_prior_history_upstream() {
    let app = TestApp::new(Script::reply(["4"]));

    let (status, body) = app
        .post_chat(json!({"messages": [{"role": "user", "content": "What is 2+2?"}]}))
        .await;
    assert_eq!(status, StatusCode::OK);
    let first = json(&body);
    assert_eq!(first["content"], "4");
    let id = first["conversationId"].as_str().unwrap().to_string();
    assert!(first["raw"].is_object());

    app.provider.set_script(Script::reply(["5"]));
    let (status, body) = app
        .post_chat(json!({
            "messages": [{"role": "user", "content": "And 2+3?"}],
            "conversationId": id
        }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json(&body)["conversationId"], id.as_str());

    let calls = app.provider.calls();
    assert_eq!(
        calls[1],
        vec![
            Message::user("What is 2+2?"),
            Message::assistant("4"),
            Message::user("And 2+3?"),
        ]
    );
    assert_eq!(app.store.history(&id).len(), 4);
}

#[tokio::test]
async fn test_streamed_reply_is_stored_once() {
    let app = TestApp::new(Script::reply(["Hel", "lo", "!"]));

    let (status, body) = app
        .post_chat(json!({
            "messages": [{"role": "user", "content": "Say hello"}],
            "stream": true
        }))
        .await;
    assert_eq!(status, StatusCode::OK);

    let events = sse_events(&body);
    assert_eq!(events.len(), 4);
    assert_eq!(events[0], json!({"content": "Hel"}));
    assert_eq!(events[1], json!({"content": "lo"}));
    assert_eq!(events[2], json!({"content": "!"}));
    assert_eq!(events[3]["type"], "done");

    let id = events[3]["conversationId"].as_str().unwrap();
    let history = app.store.history(id);
    assert_eq!(
        history,
        vec![Message::user("Say hello"), Message::assistant("Hello!")]
    );
}

#[tokio::test]
async fn test_blocking_upstream_failure_is_500() {
    let app = TestApp::new(Script::Fail {
        status: 503,
        message: "overloaded".to_string(),
    });

    let id = app.store.create(Vec::new()).id;

    let (status, body) = app
        .post_chat(json!({
            "messages": [{"role": "user", "content": "hi"}],
            "conversationId": id
        }))
        .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json(&body), json!({"error": "Chat completion failed"}));

    // The user turn is kept even though no reply was produced
    assert_eq!(app.store.history(&id), vec![Message::user("hi")]);
    assert_eq!(app.store.len(), 1);
}

#[tokio::test]
async fn test_stream_failure_ends_with_error_event() {
    let app = TestApp::new(Script::FailMidStream {
        deltas: vec!["par".to_string()],
        message: "connection reset".to_string(),
    });

    let id = app.store.create(Vec::new()).id;

    let (status, body) = app
        .post_chat(json!({
            "messages": [{"role": "user", "content": "hi"}],
            "conversationId": id,
            "stream": true
        }))
        .await;
    assert_eq!(status, StatusCode::OK);

    let events = sse_events(&body);
    assert_eq!(events.first(), Some(&json!({"content": "par"})));
    assert_eq!(events.last(), Some(&json!({"error": "Upstream provider error"})));
    assert!(events.iter().all(|e| e.get("type").is_none()));

    // The partial reply is dropped
    let history = app.store.history(&id);
    assert_eq!(history, vec![Message::user("hi")]);
    assert!(history.iter().all(|m| m.role != Role::Assistant));
}

#[tokio::test]
async fn test_stream_open_failure_sends_only_error_event() {
    let app = TestApp::new(Script::Fail {
        status: 401,
        message: "bad key".to_string(),
    });

    let (_, body) = app
        .post_chat(json!({
            "messages": [{"role": "user", "content": "hi"}],
            "stream": true
        }))
        .await;
    assert_eq!(
        sse_events(&body),
        vec![json!({"error": "Upstream provider error"})]
    );
}

#[tokio::test]
async fn test_unknown_conversation_id_starts_fresh() {
    let app = TestApp::new(Script::reply(["ok"]));

    let (status, body) = app
        .post_chat(json!({
            "messages": [{"role": "user", "content": "hi"}],
            "conversationId": "does-not-exist"
        }))
        .await;
    assert_eq!(status, StatusCode::OK);
    let id = json(&body)["conversationId"].as_str().unwrap().to_string();
    assert_ne!(id, "does-not-exist");
    assert_eq!(app.provider.calls()[0], vec![Message::user("hi")]);
}

#[tokio::test]
async fn test_system_messages_reach_upstream_but_are_not_stored() {
    let app = TestApp::new(Script::reply(["Arr"]));

    let (_, body) = app
        .post_chat(json!({
            "messages": [
                {"role": "system", "content": "Talk like a pirate"},
                {"role": "user", "content": "hi"}
            ]
        }))
        .await;
    let id = json(&body)["conversationId"].as_str().unwrap().to_string();

    let sent = &app.provider.calls()[0];
    assert_eq!(sent[0].role, Role::System);
    assert_eq!(sent.len(), 2);
    assert!(app
        .store
        .history(&id)
        .iter()
        .all(|m| m.role != Role::System));
}

#[tokio::test]
async fn test_invalid_body_lists_every_violation() {
    let app = TestApp::new(Script::reply(["unused"]));

    let (status, body) = app
        .post_chat(json!({
            "messages": [{"role": "wizard", "content": "hi"}],
            "temperature": 5,
            "max_tokens": 0
        }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let body = json(&body);
    assert_eq!(body["error"], "Validation failed");
    let fields: Vec<&str> = body["details"]
        .as_array()
        .unwrap()
        .iter()
        .map(|d| d["field"].as_str().unwrap())
        .collect();
    assert!(fields.contains(&"messages[0].role"));
    assert!(fields.contains(&"temperature"));
    assert!(fields.contains(&"max_tokens"));
    assert!(app.provider.calls().is_empty());
    assert!(app.store.is_empty());
}

#[tokio::test]
async fn test_malformed_json_is_400() {
    let app = TestApp::new(Script::reply(["unused"]));
    let request = Request::builder()
        .method("POST")
        .uri("/api/v1/chat")
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();

    let (status, body) = app.send(request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json(&body)["error"], "Validation failed");
}

#[tokio::test]
async fn test_unknown_route_is_404() {
    let app = TestApp::new(Script::reply(["unused"]));
    let (status, body) = app.get("/api/v2/nothing").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json(&body), json!({"error": "Not Found"}));
}

#[tokio::test]
async fn test_health_routes() {
    let app = TestApp::new(Script::reply(["unused"]));
    for uri in ["/health", "/api/v1/health"] {
        let (status, body) = app.get(uri).await;
        assert_eq!(status, StatusCode::OK);
        let body = json(&body);
        assert_eq!(body["status"], "ok");
        assert!(body["timestamp"].is_string());
    }
}

#[tokio::test]
async fn test_docs_describe_chat_route() {
    let app = TestApp::new(Script::reply(["unused"]));
    let (status, body) = app.get("/api/v1/docs").await;
    assert_eq!(status, StatusCode::OK);
    assert!(json(&body)["paths"]["/chat"]["post"].is_object());
}

#[tokio::test]
async fn test_preflight_and_cors_headers() {
    let app = TestApp::new(Script::reply(["unused"]));

    let preflight = Request::builder()
        .method("OPTIONS")
        .uri("/api/v1/chat")
        .body(Body::empty())
        .unwrap();
    let response = tower::ServiceExt::oneshot(app.router.clone(), preflight)
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert_eq!(
        response.headers()["access-control-allow-origin"],
        "*"
    );

    let response = tower::ServiceExt::oneshot(
        app.router.clone(),
        Request::builder().uri("/health").body(Body::empty()).unwrap(),
    )
    .await
    .unwrap();
    assert!(response.headers().contains_key("access-control-allow-origin"));
}

#[tokio::test]
async fn test_conversation_lookup_and_delete() {
    let app = TestApp::new(Script::reply(["hello"]));
    let (_, body) = app
        .post_chat(json!({"messages": [{"role": "user", "content": "hi"}]}))
        .await;
    let id = json(&body)["conversationId"].as_str().unwrap().to_string();

    let (status, body) = app.get(&format!("/api/v1/conversations/{}", id)).await;
    assert_eq!(status, StatusCode::OK);
    let record = json(&body);
    assert_eq!(record["id"], id.as_str());
    assert_eq!(record["messages"][1]["role"], "assistant");
    assert!(record["messages"][1]["timestamp"].is_string());

    let delete = Request::builder()
        .method("DELETE")
        .uri(format!("/api/v1/conversations/{}", id))
        .body(Body::empty())
        .unwrap();
    let (status, _) = app.send(delete).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = app.get(&format!("/api/v1/conversations/{}", id)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_oversized_body_rejected() {
    let app = TestApp::new(Script::reply(["unused"]));
    let huge = "x".repeat(common::BODY_LIMIT + 1);
    let (status, body) = app
        .post_chat(json!({"messages": [{"role": "user", "content": huge}]}))
        .await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(json(&body), json!({"error": "Payload Too Large"}));
    assert!(app.provider.calls().is_empty());
}

#[tokio::test]
async fn test_wrong_method_is_json_405() {
    let app = TestApp::new(Script::reply(["unused"]));

    let (status, body) = app.get("/api/v1/chat").await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(json(&body), json!({"error": "Method Not Allowed"}));

    for uri in ["/api/v1/health", "/health"] {
        let put = Request::builder()
            .method("PUT")
            .uri(uri)
            .body(Body::empty())
            .unwrap();
        let (status, body) = app.send(put).await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(json(&body)["error"], "Method Not Allowed");
    }
}
