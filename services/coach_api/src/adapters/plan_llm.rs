//! services/coach_api/src/adapters/plan_llm.rs
//!
//! This module contains the adapter for the plan-writing LLM.
//! It implements the `PlanCompletionService` port from the `core` crate.

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::{
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs, ResponseFormat,
    },
    Client,
};
use async_trait::async_trait;
use run_coach_core::{
    ports::{PlanCompletionService, PortError, PortResult},
    request::{CompletionRequest, CompletionResponse},
};
use tracing::debug;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `PlanCompletionService` using an OpenAI-compatible LLM.
#[derive(Clone)]
pub struct OpenAiPlanAdapter {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiPlanAdapter {
    pub fn new(client: Client<OpenAIConfig>, model: String) -> Self {
        Self { client, model }
    }
}

//=========================================================================================
// `PlanCompletionService` Trait Implementation
//=========================================================================================

#[async_trait]
impl PlanCompletionService for OpenAiPlanAdapter {
    /// Sends the instructions as the system message and the structured data as
    /// JSON in the user message, asking for a JSON object back.
    async fn complete_plan(&self, request: &CompletionRequest) -> PortResult<CompletionResponse> {
        let data = serde_json::to_string_pretty(&request.data)
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        let messages = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(request.instructions.as_str())
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
            ChatCompletionRequestUserMessageArgs::default()
                .content(format!("RUNNER DATA:\n{data}"))
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
        ];

        let chat_request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .response_format(ResponseFormat::JsonObject)
            .temperature(0.7_f32)
            .n(1)
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        debug!(kind = ?request.kind, model = %self.model, "Requesting plan completion");
        let response = self
            .client
            .chat()
            .create(chat_request)
            .await
            .map_err(|e: OpenAIError| PortError::Unexpected(e.to_string()))?;

        let content = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| {
                PortError::Malformed("Plan LLM returned no choices in its response.".to_string())
            })?
            .message
            .content
            .ok_or_else(|| {
                PortError::Malformed("Plan LLM response contained no text content.".to_string())
            })?;

        CompletionResponse::from_json(&content)
    }
}
