//! Collaborator clients against wiremock servers.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use proctor_collab::{
    AnswerOutcome, CollabError, HttpActivityLogger, InterviewClient, InterviewId,
    InterviewMalpracticeLogger,
};
use proctor_monitor::{ActivityLogger, ActivitySink, ChannelSink, LogForwarder};
use proctor_types::{ActivityKind, ActivityRecord, CollaboratorConfig, SessionId, SubjectId};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config(token: Option<&str>) -> CollaboratorConfig {
    CollaboratorConfig {
        auth_token: token.map(str::to_string),
        request_timeout_ms: 2000,
        ..CollaboratorConfig::default()
    }
}

fn record(kind: ActivityKind, data: Option<serde_json::Value>) -> ActivityRecord {
    ActivityRecord::new(
        kind,
        SubjectId::new("alice"),
        SessionId::generate(),
        Some(1),
        data,
        Utc::now(),
    )
}

// ── Logging collaborator ────────────────────────────────────────────────

#[tokio::test]
async fn test_warning_is_posted_to_camera_log() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/camera/log"))
        .and(header("authorization", "Bearer secret"))
        .and(body_partial_json(json!({
            "username": "alice",
            "activity": "Malpractice Warning",
            "questionIndex": 1,
            "data": { "category": "HIGH_NOISE" },
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "success": true })))
        .expect(1)
        .mount(&server)
        .await;

    let logger = HttpActivityLogger::new(&server.uri(), &config(Some("secret"))).unwrap();
    logger
        .deliver(&record(
            ActivityKind::WarningRaised,
            Some(json!({ "category": "HIGH_NOISE" })),
        ))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_transition_is_posted_to_quiz_log() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/quiz/log"))
        .and(body_partial_json(json!({ "activity": "Session Paused" })))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    let logger = HttpActivityLogger::new(&server.uri(), &config(None)).unwrap();
    logger
        .deliver(&record(ActivityKind::SessionPaused, None))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_server_error_surfaces_as_delivery_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/quiz/log"))
        .respond_with(
            ResponseTemplate::new(503).set_body_json(json!({ "message": "log store down" })),
        )
        .mount(&server)
        .await;

    let logger = HttpActivityLogger::new(&server.uri(), &config(None)).unwrap();
    let err = logger
        .post(&record(ActivityKind::SessionStarted, None))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        CollabError::Api { status: 503, ref message } if message == "log store down"
    ));
    assert!(err.is_transient());

    let err = logger
        .deliver(&record(ActivityKind::SessionStarted, None))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("log store down"));
}

#[tokio::test]
async fn test_forwarder_retries_after_outage() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/quiz/log"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/quiz/log"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let logger = Arc::new(HttpActivityLogger::new(&server.uri(), &config(None)).unwrap());
    let (sink, rx) = ChannelSink::new();
    let forwarder = LogForwarder::new(logger, 8, Duration::from_secs(3600)).spawn(rx);

    sink.submit(record(ActivityKind::SessionStarted, None));
    sink.submit(record(ActivityKind::SessionPaused, None));
    drop(sink);

    let stats = forwarder.await.unwrap();
    assert_eq!(stats.delivered, 2);
    assert_eq!(stats.failed_attempts, 1);
    assert_eq!(stats.pending, 0);

    let received = server.received_requests().await.unwrap();
    assert_eq!(received.len(), 3);
}

// ── Interview collaborator ──────────────────────────────────────────────

#[tokio::test]
async fn test_interview_start_and_answers() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/interview/start"))
        .and(body_partial_json(json!({ "domain": "rust" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "sessionId": "iv-42",
            "firstQuestion": "What does the borrow checker enforce?",
            "totalQuestions": 2,
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/interview/answer"))
        .and(body_partial_json(json!({ "sessionId": "iv-42", "questionIndex": 0 })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "nextQuestion": "Explain Send and Sync.",
            "nextIndex": 1,
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/interview/answer"))
        .and(body_partial_json(json!({ "sessionId": "iv-42", "questionIndex": 1 })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "completed": true,
            "analysis": { "totalScore": 74 },
        })))
        .mount(&server)
        .await;

    let client = InterviewClient::new(&server.uri(), &config(Some("jwt"))).unwrap();
    let started = client.start("rust").await.unwrap();
    assert_eq!(started.session_id, InterviewId("iv-42".into()));
    assert_eq!(started.total_questions, 2);

    let first = client
        .submit_answer(&started.session_id, 0, "aliasing xor mutability")
        .await
        .unwrap();
    assert_eq!(
        first,
        AnswerOutcome::Next {
            question: "Explain Send and Sync.".into(),
            index: 1,
        }
    );

    let last = client
        .submit_answer(&started.session_id, 1, "thread-safety markers")
        .await
        .unwrap();
    assert_eq!(
        last,
        AnswerOutcome::Completed {
            analysis: Some(json!({ "totalScore": 74 })),
        }
    );
}

#[tokio::test]
async fn test_interview_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/interview/answer"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "success": false,
            "message": "Interview not found",
        })))
        .mount(&server)
        .await;

    let client = InterviewClient::new(&server.uri(), &config(None)).unwrap();
    let err = client
        .submit_answer(&InterviewId("missing".into()), 0, "answer")
        .await
        .unwrap_err();
    assert!(matches!(err, CollabError::NotFound(ref m) if m == "Interview not found"));
}

#[tokio::test]
async fn test_malpractice_logger_forwards_only_warnings() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/interview/malpractice"))
        .and(body_partial_json(json!({
            "sessionId": "iv-7",
            "type": "Multiple faces detected",
            "evidence": "visual",
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "success": true })))
        .expect(1)
        .mount(&server)
        .await;

    let client = Arc::new(InterviewClient::new(&server.uri(), &config(None)).unwrap());
    let logger = InterviewMalpracticeLogger::new(client, InterviewId("iv-7".into()));

    logger
        .deliver(&record(ActivityKind::SessionStarted, None))
        .await
        .unwrap();
    logger
        .deliver(&record(ActivityKind::CameraHeartbeat, None))
        .await
        .unwrap();
    logger
        .deliver(&record(
            ActivityKind::WarningRaised,
            Some(json!({ "category": "MULTIPLE_FACES", "runLength": 3 })),
        ))
        .await
        .unwrap();
}
