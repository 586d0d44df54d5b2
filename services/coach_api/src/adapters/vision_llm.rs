//! services/coach_api/src/adapters/vision_llm.rs
//!
//! This module contains the adapter for the screenshot-reading vision LLM.
//! It implements the `WorkoutExtractionService` port from the `core` crate.

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::{
        ChatCompletionRequestMessageContentPartImageArgs,
        ChatCompletionRequestMessageContentPartTextArgs, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, ChatCompletionRequestUserMessageContentPart,
        CreateChatCompletionRequestArgs, ImageDetail, ImageUrlArgs, ResponseFormat,
    },
    Client,
};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use run_coach_core::{
    domain::ReportedWorkout,
    matcher::RawWorkout,
    ports::{PortError, PortResult, WorkoutExtractionService},
};

const EXTRACTION_PROMPT: &str = r#"You read screenshots of running and fitness tracker apps.
Extract the workout shown and reply with one JSON object with these keys:
"date" (as displayed, preferably DD.MM.YYYY), "time", "distance_km" (number),
"duration", "pace" (min/km), "calories", "elevation", "workout_type" and "app_name".
Use null for anything not visible. Do not guess values that are not on the screen."#;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

#[derive(Clone)]
pub struct OpenAiWorkoutVisionAdapter {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiWorkoutVisionAdapter {
    pub fn new(client: Client<OpenAIConfig>, model: String) -> Self {
        Self { client, model }
    }
}

/// Builds the data URL the chat API accepts for inline images.
pub fn image_data_url(image: &[u8], content_type: &str) -> String {
    let mime = if content_type.starts_with("image/") {
        content_type
    } else {
        "image/jpeg"
    };
    format!("data:{};base64,{}", mime, STANDARD.encode(image))
}

//=========================================================================================
// `WorkoutExtractionService` Trait Implementation
//=========================================================================================

#[async_trait]
impl WorkoutExtractionService for OpenAiWorkoutVisionAdapter {
    async fn extract_workout(&self, image: &[u8], content_type: &str) -> PortResult<ReportedWorkout> {
        if image.is_empty() {
            return Err(PortError::Malformed("The uploaded image is empty.".to_string()));
        }

        let image_url = ImageUrlArgs::default()
            .url(image_data_url(image, content_type))
            .detail(ImageDetail::High)
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        let parts: Vec<ChatCompletionRequestUserMessageContentPart> = vec![
            ChatCompletionRequestMessageContentPartTextArgs::default()
                .text("Extract the workout from this screenshot.")
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
            ChatCompletionRequestMessageContentPartImageArgs::default()
                .image_url(image_url)
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
        ];

        let messages = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(EXTRACTION_PROMPT)
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
            ChatCompletionRequestUserMessageArgs::default()
                .content(parts)
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
        ];

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .response_format(ResponseFormat::JsonObject)
            .max_completion_tokens(500u32)
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e: OpenAIError| PortError::Unexpected(e.to_string()))?;

        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| {
                PortError::Malformed("Vision LLM response contained no text content.".to_string())
            })?;

        parse_extraction(&content)
    }
}

/// Maps the model's JSON reply onto a reported workout.
pub fn parse_extraction(content: &str) -> PortResult<ReportedWorkout> {
    let raw: RawWorkout = serde_json::from_str(content.trim())
        .map_err(|e| PortError::Malformed(format!("workout reply is not valid JSON: {e}")))?;
    Ok(raw.into_reported())
}
