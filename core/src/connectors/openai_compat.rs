//! Wire types for the OpenAI chat-completions dialect, spoken by OpenAI itself
//! and by LM Studio's local server.

use serde::{Deserialize, Serialize};

use super::params::OpenAiSampling;
use super::Model;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: &str) -> Self {
        Self {
            role: "user".to_string(),
            content: content.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest<'a> {
    pub model: &'a str,
    pub messages: Vec<ChatMessage>,
    pub stream: bool,
    #[serde(flatten)]
    pub sampling: OpenAiSampling,
}

impl<'a> ChatRequest<'a> {
    pub fn single_turn(model: &'a str, message: &str, sampling: OpenAiSampling) -> Self {
        Self {
            model,
            messages: vec![ChatMessage::user(message)],
            stream: false,
            sampling,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub message: String,
}

/// Assistant turn in a reply. `content` is null for refusals and tool calls.
#[derive(Debug, Clone, Deserialize)]
pub struct ReplyMessage {
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Choice {
    pub message: ReplyMessage,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatResponse {
    #[serde(default)]
    pub choices: Vec<Choice>,
    #[serde(default)]
    pub error: Option<ApiErrorBody>,
}

impl ChatResponse {
    pub fn embedded_error(&self) -> Option<String> {
        self.error.as_ref().map(|e| e.message.clone())
    }

    /// Text of the first choice; `None` when there are no choices or the
    /// first one carries no text.
    pub fn first_text(self) -> Option<String> {
        self.choices.into_iter().next().and_then(|c| c.message.content)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModelEntry {
    pub id: String,
}

/// `GET /v1/models` body.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelList {
    #[serde(default)]
    pub data: Vec<ModelEntry>,
}

impl ModelList {
    pub fn into_models(self) -> Vec<Model> {
        self.data.into_iter().map(|m| Model::named(m.id)).collect()
    }
}
