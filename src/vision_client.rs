use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

use crate::config::VisionConfig;

const MAX_TOKENS: u32 = 1500;

#[derive(Debug, thiserror::Error)]
pub enum VisionError {
    #[error("Vision API request failed: {0}")]
    Request(String),
    #[error("Vision API returned an unreadable reply: {0}")]
    MalformedReply(String),
    #[error("Vision API task failed: {0}")]
    Task(String),
}

/// A single-turn multimodal prompt.
#[derive(Debug, Clone)]
pub struct VisionRequest {
    pub prompt: String,
    pub image_data_uri: String,
}

/// Anything that can answer a prompt about an image with text.
#[async_trait]
pub trait VisionModel: Send + Sync {
    async fn complete(&self, request: VisionRequest) -> Result<String, VisionError>;
}

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

/// OpenAI-compatible chat completions client.
pub struct OpenAiVisionClient {
    agent: ureq::Agent,
    api_key: String,
    model: String,
    endpoint: String,
}

impl OpenAiVisionClient {
    /// Returns `None` when no API key is configured.
    pub fn new(config: &VisionConfig) -> Option<Self> {
        let api_key = config.api_key.clone()?;
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(config.timeout_secs)))
            .build()
            .into();

        Some(Self {
            agent,
            api_key,
            model: config.model.clone(),
            endpoint: config.endpoint.clone(),
        })
    }

    fn request_body(&self, request: &VisionRequest) -> serde_json::Value {
        json!({
            "model": self.model,
            "messages": [{
                "role": "user",
                "content": [
                    { "type": "text", "text": request.prompt },
                    {
                        "type": "image_url",
                        "image_url": { "url": request.image_data_uri, "detail": "high" }
                    }
                ]
            }],
            "max_tokens": MAX_TOKENS
        })
    }
}

#[async_trait]
impl VisionModel for OpenAiVisionClient {
    async fn complete(&self, request: VisionRequest) -> Result<String, VisionError> {
        let body = self.request_body(&request);
        let agent = self.agent.clone();
        let endpoint = self.endpoint.clone();
        let authorization = format!("Bearer {}", self.api_key);

        // ureq is blocking; keep it off the async workers.
        tokio::task::spawn_blocking(move || {
            let mut response = agent
                .post(&endpoint)
                .header("Authorization", &authorization)
                .send_json(&body)
                .map_err(|e| VisionError::Request(e.to_string()))?;

            let completion: ChatCompletion = response
                .body_mut()
                .read_json()
                .map_err(|e| VisionError::MalformedReply(e.to_string()))?;

            completion
                .choices
                .into_iter()
                .next()
                .and_then(|choice| choice.message.content)
                .ok_or_else(|| VisionError::MalformedReply("reply has no message content".into()))
        })
        .await
        .map_err(|e| VisionError::Task(e.to_string()))?
    }
}
