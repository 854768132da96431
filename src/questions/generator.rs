//! On-demand question generation backend
//!
//! The generator is an external HTTP service; this client posts the request
//! and normalizes whatever comes back.

use crate::error::Result;
use crate::questions::model::{normalize_questions, Question, RawQuestion};
use crate::questions::source::{QuestionRequest, QuestionSource};
use anyhow::{anyhow, Context};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::{info, warn};

/// Response body accepted from the generator
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum GeneratorResponse {
    Wrapped { questions: Vec<RawQuestion> },
    Bare(Vec<RawQuestion>),
}

impl GeneratorResponse {
    fn into_questions(self) -> Vec<RawQuestion> {
        match self {
            GeneratorResponse::Wrapped { questions } => questions,
            GeneratorResponse::Bare(questions) => questions,
        }
    }
}

/// HTTP client for the question generation service
#[derive(Debug, Clone)]
pub struct HttpQuestionGenerator {
    client: reqwest::Client,
    url: String,
}

impl HttpQuestionGenerator {
    /// Create a generator client with a request timeout
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build question generator client")?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl QuestionSource for HttpQuestionGenerator {
    async fn fetch(&self, request: &QuestionRequest) -> Result<Vec<Question>> {
        let started = std::time::Instant::now();

        let response = self
            .client
            .post(&self.url)
            .json(request)
            .send()
            .await
            .context("Question generator request failed")?;

        let status = response.status();
        if !status.is_success() {
            warn!("Question generator responded with {}", status);
            return Err(anyhow!("Question generator responded with {}", status));
        }

        let body: GeneratorResponse = response
            .json()
            .await
            .context("Question generator returned an unexpected body")?;

        let questions = normalize_questions(&body.into_questions());
        info!(
            "Generated {} questions ({}, {}) in {:.2}ms",
            questions.len(),
            request.category,
            request.difficulty,
            started.elapsed().as_secs_f64() * 1000.0
        );

        Ok(questions.into_iter().take(request.count).collect())
    }

    fn name(&self) -> &'static str {
        "generator"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_wrapped_and_bare_bodies() {
        let wrapped: GeneratorResponse = serde_json::from_str(
            r#"{"questions": [{"question": "Q", "options": ["A", "B"], "correct": 0}]}"#,
        )
        .unwrap();
        assert_eq!(wrapped.into_questions().len(), 1);

        let bare: GeneratorResponse = serde_json::from_str(
            r#"[{"question": "Q", "options": ["A", "B"], "correctAnswer": "B"}]"#,
        )
        .unwrap();
        assert_eq!(bare.into_questions().len(), 1);
    }
}
