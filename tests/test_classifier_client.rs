//! Integration tests for the classification service client
//!
//! Covers session creation, the run request shape, and terminal-result
//! extraction from the event stream.


use case_triage::classifier::{ClassifierApi, ClassifierClient, RemoteSession};
use case_triage::identity::Credential;
use case_triage::model::Record;
use case_triage::testing::test_record;
use case_triage::TriageError;
use serde_json::{json, Map, Value};
use wiremock::matchers::{body_json, body_partial_json, header, method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(server: &MockServer) -> ClassifierClient {
    let config = test_helpers::test_config("http://crm.invalid", &server.uri());
    ClassifierClient::new(config.classifier, &config.http).unwrap()
}

fn token() -> Credential {
    Credential::new("id-token")
}

fn session() -> RemoteSession {
    RemoteSession {
        id: "sess-1".to_string(),
        app_name: "case_triage".to_string(),
        user_id: "triage-user".to_string(),
        state: Value::Null,
        extra: Map::new(),
    }
}

fn record() -> Record {
    test_record("500A", "00001001")
}

#[tokio::test]
async fn test_open_session_posts_initial_state() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path_regex(
            r"^/apps/case_triage/users/triage-user/sessions/[0-9a-f-]{36}$",
        ))
        .and(header("Authorization", "Bearer id-token"))
        .and(body_json(json!({"visit_count": 0, "language": "en"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "returned-session",
            "appName": "case_triage",
            "userId": "triage-user",
            "state": {"visit_count": 0, "language": "en"},
            "events": [],
            "lastUpdateTime": 1714560000.0
        })))
        .expect(1)
        .mount(&server)
        .await;

    let session = client(&server).open_session(&token(), "500A").await.unwrap();

    assert_eq!(session.id, "returned-session");
    assert_eq!(session.app_name, "case_triage");
    assert_eq!(session.state["language"], "en");
}

#[tokio::test]
async fn test_each_session_gets_a_fresh_id() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path_regex(r"^/apps/case_triage/users/triage-user/sessions/"))
        .respond_with(ResponseTemplate::new(200))
        .expect(2)
        .mount(&server)
        .await;

    let client = client(&server);
    let first = client.open_session(&token(), "500A").await.unwrap();
    let second = client.open_session(&token(), "500B").await.unwrap();

    // Empty descriptors fall back to the locally generated id
    assert_ne!(first.id, second.id);
    assert_eq!(first.id.len(), 36);
    assert_eq!(first.user_id, "triage-user");
}

#[tokio::test]
async fn test_open_session_error_status_is_session_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path_regex(r"^/apps/"))
        .respond_with(ResponseTemplate::new(503).set_body_string("upstream unavailable"))
        .mount(&server)
        .await;

    let err = client(&server)
        .open_session(&token(), "500A")
        .await
        .unwrap_err();

    assert!(matches!(err, TriageError::Session { .. }));
    assert!(!err.is_fatal());
    assert_eq!(err.response_body(), Some("upstream unavailable"));
}

#[tokio::test]
async fn test_classify_sends_projection_and_returns_final_json() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/run_sse"))
        .and(header("Authorization", "Bearer id-token"))
        .and(body_partial_json(json!({
            "app_name": "case_triage",
            "userId": "triage-user",
            "session_id": "sess-1",
            "streaming": false,
            "new_message": {"role": "user"}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            test_helpers::sse_body_with_result(json!({
                "Id": "500A",
                "CaseTierCategorisation__c": "Tier 1"
            })),
        ))
        .expect(1)
        .mount(&server)
        .await;

    let result = client(&server)
        .classify(&token(), &session(), &record())
        .await
        .unwrap();

    assert_eq!(result.record_key("Id").unwrap(), "500A");
    assert_eq!(result.fields()["CaseTierCategorisation__c"], "Tier 1");

    let requests = server.received_requests().await.unwrap();
    let sent: Value = serde_json::from_slice(&requests[0].body).unwrap();
    let text = sent["new_message"]["parts"][0]["text"].as_str().unwrap();
    let projection: Value = serde_json::from_str(text).unwrap();
    assert_eq!(
        projection,
        json!({
            "Id": "500A",
            "Type": "Problem",
            "Subject": "Subject for 00001001",
            "Description": "Customer reports an issue",
            "Origin": "Email"
        })
    );
}

#[tokio::test]
async fn test_classify_picks_first_qualifying_event() {
    let server = MockServer::start().await;

    let first = json!({
        "author": "json_generator",
        "actions": {"stateDelta": {"final_json": {"Id": "500A", "Tier": "first"}}}
    });
    let second = json!({
        "author": "json_generator",
        "actions": {"stateDelta": {"final_json": {"Id": "500A", "Tier": "second"}}}
    });
    let body = format!("data: {{broken\n\ndata: {first}\n\ndata: {second}\n\n");

    Mock::given(method("POST"))
        .and(path("/run_sse"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(&server)
        .await;

    let result = client(&server)
        .classify(&token(), &session(), &record())
        .await
        .unwrap();

    assert_eq!(result.fields()["Tier"], "first");
}

#[tokio::test]
async fn test_classify_without_terminal_event_is_not_found() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/run_sse"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string(test_helpers::sse_body_without_result()),
        )
        .mount(&server)
        .await;

    let err = client(&server)
        .classify(&token(), &session(), &record())
        .await
        .unwrap_err();

    assert!(matches!(err, TriageError::ClassificationNotFound { events: 1 }));
    assert!(!err.is_fatal());
}

#[tokio::test]
async fn test_classify_error_status_is_request_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/run_sse"))
        .respond_with(ResponseTemplate::new(500).set_body_string("agent crashed"))
        .mount(&server)
        .await;

    let err = client(&server)
        .classify(&token(), &session(), &record())
        .await
        .unwrap_err();

    assert!(matches!(err, TriageError::ClassificationRequest { .. }));
    assert!(err.to_string().contains("500"));
}

#[tokio::test]
async fn test_classify_non_object_final_json_is_invalid_result() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/run_sse"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string(test_helpers::sse_body_with_result(
                json!(["Tier 1"]),
            )),
        )
        .mount(&server)
        .await;

    let err = client(&server)
        .classify(&token(), &session(), &record())
        .await
        .unwrap_err();

    assert!(matches!(err, TriageError::InvalidResult { .. }));
}
