//! HTTP chatbot client implementation.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

use deskhub_core::config::chatbot::ChatbotConfig;
use deskhub_core::error::{AppError, ErrorKind};
use deskhub_core::result::AppResult;
use deskhub_entity::chatbot::ChatbotProfile;

use crate::gateway::{ChatbotGateway, SendQuestion};

/// Request body posted to the bot runtime's question endpoint.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct QuestionRequest<'a> {
    content: &'a str,
    ticket_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    session_id: Option<Uuid>,
    profile_id: Uuid,
}

/// reqwest-backed [`ChatbotGateway`] implementation.
///
/// Posts questions to the profile's configured webhook URL, falling back
/// to the globally configured runtime base URL.
#[derive(Debug, Clone)]
pub struct HttpChatbotClient {
    http: reqwest::Client,
    config: ChatbotConfig,
}

impl HttpChatbotClient {
    /// Create a new HTTP chatbot client from configuration.
    pub fn new(config: ChatbotConfig) -> AppResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .build()
            .map_err(|e| {
                AppError::with_source(
                    ErrorKind::ExternalService,
                    "Failed to build chatbot HTTP client",
                    e,
                )
            })?;
        Ok(Self { http, config })
    }

    /// The question endpoint for a profile.
    fn question_url(&self, profile: &ChatbotProfile) -> String {
        let base = profile
            .webhook_url
            .as_deref()
            .unwrap_or(&self.config.base_url);
        format!("{}/questions", base.trim_end_matches('/'))
    }
}

#[async_trait]
impl ChatbotGateway for HttpChatbotClient {
    async fn send_question(
        &self,
        profile: &ChatbotProfile,
        question: &SendQuestion,
    ) -> AppResult<()> {
        let url = self.question_url(profile);
        let body = QuestionRequest {
            content: &question.content,
            ticket_id: question.ticket_id,
            session_id: question.session_id,
            profile_id: profile.id,
        };

        debug!(profile_id = %profile.id, ticket_id = %question.ticket_id, %url, "Forwarding question to bot runtime");

        let response = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                AppError::with_source(
                    ErrorKind::ExternalService,
                    format!("Chatbot runtime request failed: {e}"),
                    e,
                )
            })?;

        if !response.status().is_success() {
            return Err(AppError::external_service(format!(
                "Chatbot runtime returned status {} for profile {}",
                response.status(),
                profile.id
            )));
        }

        Ok(())
    }
}
