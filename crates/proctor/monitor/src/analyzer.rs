//! Answer analysis capability.
//!
//! The monitor does not score answers itself. An [`AnswerAnalyzer`] turns a question and the
//! submitted text into a bounded score plus strengths and weaknesses; a language-model service
//! can be plugged in here without touching the session state machine.

use async_trait::async_trait;
use futures::future::join_all;
use proctor_types::{AnswerAnalysis, AnswerReview};
use tracing::warn;

use crate::error::ProctorResult;

/// Scores a submitted answer.
#[async_trait]
pub trait AnswerAnalyzer: Send + Sync {
    async fn analyze(
        &self,
        question: Option<&str>,
        answer: &str,
    ) -> ProctorResult<AnswerAnalysis>;

    fn name(&self) -> &str;
}

/// Analyzer that never scores.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnscoredAnalyzer;

#[async_trait]
impl AnswerAnalyzer for UnscoredAnalyzer {
    async fn analyze(
        &self,
        _question: Option<&str>,
        _answer: &str,
    ) -> ProctorResult<AnswerAnalysis> {
        Ok(AnswerAnalysis::unscored())
    }

    fn name(&self) -> &str {
        "unscored"
    }
}

/// Analyze every review concurrently. A failed analysis leaves that answer unscored.
pub async fn review_answers(
    analyzer: &dyn AnswerAnalyzer,
    reviews: Vec<AnswerReview>,
) -> Vec<AnswerReview> {
    let analyses = join_all(
        reviews
            .iter()
            .map(|r| analyzer.analyze(r.question.as_deref(), &r.answer)),
    )
    .await;

    reviews
        .into_iter()
        .zip(analyses)
        .map(|(mut review, analysis)| {
            review.analysis = match analysis {
                Ok(analysis) => analysis,
                Err(e) => {
                    warn!(
                        analyzer = analyzer.name(),
                        question = review.question_index,
                        error = %e,
                        "Answer analysis failed"
                    );
                    AnswerAnalysis::unscored()
                }
            };
            review
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProctorError;

    /// Scores by answer length, fails on empty answers.
    struct LengthAnalyzer;

    #[async_trait]
    impl AnswerAnalyzer for LengthAnalyzer {
        async fn analyze(
            &self,
            _question: Option<&str>,
            answer: &str,
        ) -> ProctorResult<AnswerAnalysis> {
            if answer.is_empty() {
                return Err(ProctorError::Analysis("empty answer".into()));
            }
            Ok(AnswerAnalysis::scored(
                answer.len().min(100) as u8,
                vec!["answered".into()],
                Vec::new(),
            ))
        }

        fn name(&self) -> &str {
            "length"
        }
    }

    fn review(index: usize, answer: &str) -> AnswerReview {
        AnswerReview {
            question_index: index,
            question: Some(format!("Question {}", index + 1)),
            answer: answer.to_string(),
            analysis: AnswerAnalysis::unscored(),
        }
    }

    #[tokio::test]
    async fn test_unscored_analyzer() {
        let reviewed = review_answers(&UnscoredAnalyzer, vec![review(0, "ownership moves")]).await;
        assert_eq!(reviewed[0].analysis.score, None);
    }

    #[tokio::test]
    async fn test_failures_leave_answer_unscored() {
        let reviewed =
            review_answers(&LengthAnalyzer, vec![review(0, "borrowing"), review(1, "")]).await;

        assert_eq!(reviewed.len(), 2);
        assert_eq!(reviewed[0].analysis.score, Some(9));
        assert_eq!(reviewed[1].analysis, AnswerAnalysis::unscored());
    }
}
