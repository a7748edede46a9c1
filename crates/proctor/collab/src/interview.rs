//! Interview-session collaborator.
//!
//! The interview backend owns the question bank and answer analysis; this client starts an
//! interview, submits answers one question at a time and reports malpractice findings.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use proctor_monitor::{ActivityLogger, LogDeliveryError, QuestionPlan};
use proctor_types::{ActivityKind, ActivityRecord, CollaboratorConfig, MalpracticeCategory};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::error::{CollabError, CollabResult};
use crate::http::{build_client, check_status, decode, normalize_base, with_auth};

/// Interview id assigned by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InterviewId(pub String);

impl std::fmt::Display for InterviewId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Response to `POST /interview/start`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartedInterview {
    pub session_id: InterviewId,
    pub first_question: String,
    pub total_questions: usize,
}

impl StartedInterview {
    /// Question plan for monitoring this interview.
    pub fn question_plan(&self, answer_time: Duration) -> QuestionPlan {
        QuestionPlan::new(self.total_questions, answer_time)
    }
}

/// What the backend did with a submitted answer.
#[derive(Debug, Clone, PartialEq)]
pub enum AnswerOutcome {
    Next { question: String, index: usize },
    Completed { analysis: Option<Value> },
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnswerResponse {
    #[serde(default)]
    completed: bool,
    analysis: Option<Value>,
    next_question: Option<String>,
    next_index: Option<usize>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StartRequest<'a> {
    domain: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AnswerRequest<'a> {
    session_id: &'a InterviewId,
    question_index: usize,
    answer: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct MalpracticeRequest<'a> {
    session_id: &'a InterviewId,
    #[serde(rename = "type")]
    kind: &'a str,
    evidence: &'a str,
}

/// Client for the interview backend.
pub struct InterviewClient {
    client: Client,
    base_url: String,
    auth_token: Option<String>,
}

impl InterviewClient {
    pub fn new(base_url: &str, config: &CollaboratorConfig) -> CollabResult<Self> {
        Ok(Self {
            client: build_client(config.request_timeout())?,
            base_url: normalize_base(base_url)?,
            auth_token: config.auth_token.clone(),
        })
    }

    /// Start an interview in the given domain.
    pub async fn start(&self, domain: &str) -> CollabResult<StartedInterview> {
        let started: StartedInterview = self
            .post_json("/interview/start", &StartRequest { domain })
            .await?;
        info!(
            interview = %started.session_id,
            total_questions = started.total_questions,
            "Interview started"
        );
        Ok(started)
    }

    /// Submit the answer to one question.
    pub async fn submit_answer(
        &self,
        session: &InterviewId,
        question_index: usize,
        answer: &str,
    ) -> CollabResult<AnswerOutcome> {
        let response: AnswerResponse = self
            .post_json(
                "/interview/answer",
                &AnswerRequest {
                    session_id: session,
                    question_index,
                    answer,
                },
            )
            .await?;

        if response.completed {
            return Ok(AnswerOutcome::Completed {
                analysis: response.analysis,
            });
        }
        match response.next_question {
            Some(question) => Ok(AnswerOutcome::Next {
                question,
                index: response.next_index.unwrap_or(question_index + 1),
            }),
            None => Err(CollabError::InvalidResponse(
                "answer response has neither nextQuestion nor completed".into(),
            )),
        }
    }

    /// Report one malpractice finding.
    pub async fn report_malpractice(
        &self,
        session: &InterviewId,
        kind: &str,
        evidence: &str,
    ) -> CollabResult<()> {
        let url = format!("{}/interview/malpractice", self.base_url);
        let request = with_auth(self.client.post(&url), self.auth_token.as_deref());
        let response = request
            .json(&MalpracticeRequest {
                session_id: session,
                kind,
                evidence,
            })
            .send()
            .await?;
        check_status(response).await?;
        debug!(interview = %session, kind, evidence, "Malpractice reported");
        Ok(())
    }

    async fn post_json<B: Serialize, T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> CollabResult<T> {
        let url = format!("{}{}", self.base_url, path);
        let request = with_auth(self.client.post(&url), self.auth_token.as_deref());
        let response = request.json(body).send().await?;
        decode(response).await
    }
}

impl std::fmt::Debug for InterviewClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InterviewClient")
            .field("base_url", &self.base_url)
            .finish()
    }
}

/// Evidence class the interview backend files a category under.
pub fn evidence_class(category: MalpracticeCategory) -> &'static str {
    match category {
        MalpracticeCategory::HighNoise => "audio",
        MalpracticeCategory::TabUnfocused => "system",
        _ => "visual",
    }
}

/// Forwards warning activities of one interview to `/interview/malpractice`.
///
/// Lifecycle activities and heartbeats are accepted and dropped.
pub struct InterviewMalpracticeLogger {
    client: Arc<InterviewClient>,
    interview: InterviewId,
}

impl InterviewMalpracticeLogger {
    pub fn new(client: Arc<InterviewClient>, interview: InterviewId) -> Self {
        Self { client, interview }
    }
}

#[async_trait]
impl ActivityLogger for InterviewMalpracticeLogger {
    async fn deliver(&self, record: &ActivityRecord) -> Result<(), LogDeliveryError> {
        if record.kind() != Some(ActivityKind::WarningRaised) {
            return Ok(());
        }

        let category = record
            .entry
            .data
            .as_ref()
            .and_then(|data| data.get("category"))
            .and_then(Value::as_str)
            .and_then(MalpracticeCategory::from_code);

        let (kind, evidence) = match category {
            Some(category) => (category.label(), evidence_class(category)),
            None => (record.entry.activity.as_str(), "visual"),
        };

        self.client
            .report_malpractice(&self.interview, kind, evidence)
            .await
            .map_err(LogDeliveryError::from)
    }

    fn name(&self) -> &str {
        "interview-malpractice"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_evidence_classes() {
        assert_eq!(evidence_class(MalpracticeCategory::HighNoise), "audio");
        assert_eq!(evidence_class(MalpracticeCategory::TabUnfocused), "system");
        assert_eq!(evidence_class(MalpracticeCategory::MultipleFaces), "visual");
    }

    #[test]
    fn test_started_interview_wire_shape() {
        let started: StartedInterview = serde_json::from_value(serde_json::json!({
            "sessionId": "66f0c2",
            "firstQuestion": "What is a borrow?",
            "totalQuestions": 4,
        }))
        .unwrap();
        assert_eq!(started.session_id, InterviewId("66f0c2".into()));

        let plan = started.question_plan(Duration::from_secs(60));
        assert_eq!(plan.total_questions, 4);
    }

    #[test]
    fn test_malpractice_body_uses_type_key() {
        let id = InterviewId("abc".into());
        let body = serde_json::to_value(MalpracticeRequest {
            session_id: &id,
            kind: "No face detected",
            evidence: "visual",
        })
        .unwrap();
        assert_eq!(body["sessionId"], "abc");
        assert_eq!(body["type"], "No face detected");
    }
}
