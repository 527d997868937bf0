//! One adapter for the hosted APIs (OpenAI, Anthropic, Google).
//!
//! All three follow the same "send the key, get JSON back" shape, so a single
//! connector branches on the provider for URLs, auth placement and schemas.

use std::fmt;
use std::sync::Arc;

use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::http::{
    budget_text, endpoint, read_reply, status_line, Reply, TransportFailure, CHAT_TIMEOUT,
    DISCOVERY_TIMEOUT,
};
use super::openai_compat::{ChatMessage, ChatRequest, ChatResponse, ModelList};
use super::params::{
    anthropic_sampling, gemini_generation_config, openai_sampling, AnthropicSampling,
    GeminiGenerationConfig,
};
use super::Model;
use crate::config::GenerationConfig;
use crate::errors::{LumenError, LumenResult};
use crate::logging::{log_event, EventSink, Level};
use crate::providers::ProviderId;

const MODULE: &str = "connector.cloud";
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Anthropic has no model listing we rely on; this is the curated set.
pub const ANTHROPIC_MODELS: [&str; 3] = [
    "claude-3-opus-20240229",
    "claude-3-sonnet-20240229",
    "claude-3-haiku-20240307",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CloudKind {
    OpenAi,
    Anthropic,
    Google,
}

impl CloudKind {
    fn of(provider: ProviderId) -> LumenResult<Self> {
        match provider {
            ProviderId::OpenAi => Ok(Self::OpenAi),
            ProviderId::Anthropic => Ok(Self::Anthropic),
            ProviderId::Google => Ok(Self::Google),
            other => Err(LumenError::UnsupportedProvider(other.to_string())),
        }
    }
}

#[derive(Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    #[serde(flatten)]
    sampling: AnthropicSampling,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
}

#[derive(Deserialize)]
struct AnthropicResponse {
    #[serde(default)]
    content: Vec<TextPart>,
    #[serde(default)]
    error: Option<ErrorBody>,
}

#[derive(Serialize, Deserialize)]
struct TextPart {
    #[serde(default)]
    text: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    generation_config: GeminiGenerationConfig,
}

#[derive(Serialize, Deserialize, Default)]
struct GeminiContent {
    #[serde(default)]
    parts: Vec<TextPart>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    #[serde(default)]
    error: Option<ErrorBody>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    #[serde(default)]
    content: GeminiContent,
    #[serde(default)]
    finish_reason: String,
}

#[derive(Deserialize)]
struct GeminiModelList {
    #[serde(default)]
    models: Vec<GeminiModel>,
}

#[derive(Deserialize)]
struct GeminiModel {
    name: String,
}

pub struct CloudConnector {
    client: Client,
    provider: ProviderId,
    kind: CloudKind,
    base_url: String,
    api_key: String,
    events: Arc<dyn EventSink>,
}

impl fmt::Debug for CloudConnector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CloudConnector")
            .field("provider", &self.provider)
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

impl CloudConnector {
    pub fn new(
        client: Client,
        provider: ProviderId,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        events: Arc<dyn EventSink>,
    ) -> LumenResult<Self> {
        Ok(Self {
            client,
            provider,
            kind: CloudKind::of(provider)?,
            base_url: base_url.into(),
            api_key: api_key.into(),
            events,
        })
    }

    pub fn provider(&self) -> ProviderId {
        self.provider
    }

    fn label(&self) -> &'static str {
        self.provider.display_name()
    }

    /// Attach the key the way this provider expects it.
    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match self.kind {
            CloudKind::OpenAi => request.bearer_auth(&self.api_key),
            CloudKind::Anthropic => request
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", ANTHROPIC_VERSION),
            CloudKind::Google => request.query(&[("key", self.api_key.as_str())]),
        }
    }

    fn trace(&self, operation: &str, path: &str) {
        log_event(
            self.events.as_ref(),
            Level::Debug,
            None,
            MODULE,
            &format!("{} {operation}", self.label()),
            None,
            Some(json!({ "provider": self.provider, "path": path })),
        );
    }

    /// Minimal authenticated request. Any failure is reported as a rejected key.
    pub async fn test_connection(&self) -> LumenResult<()> {
        let path = self.provider.discovery_path();
        self.trace("key validation", path);
        let response = self
            .authorize(self.client.get(endpoint(&self.base_url, path)))
            .timeout(DISCOVERY_TIMEOUT)
            .send()
            .await
            .map_err(|err| {
                LumenError::Credential(format!(
                    "API key validation failed: {}",
                    TransportFailure::from_reqwest(err).detail
                ))
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(LumenError::Credential(format!(
                "API key validation failed with status: {}",
                status_line(status)
            )));
        }
        Ok(())
    }

    pub async fn list_models(&self) -> LumenResult<Vec<Model>> {
        match self.kind {
            CloudKind::Anthropic => Ok(ANTHROPIC_MODELS.iter().copied().map(Model::named).collect()),
            CloudKind::OpenAi => {
                let reply = self.fetch_models().await?;
                let list = reply.decode::<ModelList, _>(self.label(), |_| None)?;
                Ok(list.into_models())
            }
            CloudKind::Google => {
                let reply = self.fetch_models().await?;
                let list = reply.decode::<GeminiModelList, _>(self.label(), |_| None)?;
                Ok(list
                    .models
                    .into_iter()
                    .map(|m| Model::named(m.name.trim_start_matches("models/")))
                    .collect())
            }
        }
    }

    async fn fetch_models(&self) -> LumenResult<Reply> {
        let path = self.provider.discovery_path();
        self.trace("model listing", path);
        let response = self
            .authorize(self.client.get(endpoint(&self.base_url, path)))
            .timeout(DISCOVERY_TIMEOUT)
            .send()
            .await
            .map_err(|err| self.send_error(err, None))?;
        let reply = read_reply(response)
            .await
            .map_err(|err| self.send_error(err, None))?;
        if !reply.status.is_success() {
            return Err(LumenError::Protocol {
                status: reply.status.as_u16(),
                message: format!("{} API error: {}", self.label(), reply.status_line()),
            });
        }
        Ok(reply)
    }

    pub async fn chat(
        &self,
        model: &str,
        message: &str,
        config: &GenerationConfig,
    ) -> LumenResult<String> {
        match self.kind {
            CloudKind::OpenAi => {
                let request = ChatRequest::single_turn(model, message, openai_sampling(config));
                let reply = self.post_chat("/v1/chat/completions", model, &request).await?;
                let parsed: ChatResponse = reply.decode(self.label(), ChatResponse::embedded_error)?;
                parsed.first_text().ok_or_else(|| {
                    LumenError::EmptyResult("no response choices from OpenAI".into())
                })
            }
            CloudKind::Anthropic => {
                let request = AnthropicRequest {
                    model,
                    messages: vec![ChatMessage::user(message)],
                    sampling: anthropic_sampling(config),
                };
                let reply = self.post_chat("/v1/messages", model, &request).await?;
                let parsed: AnthropicResponse = reply.decode(self.label(), |r: &AnthropicResponse| {
                    r.error.as_ref().map(|e| e.message.clone())
                })?;
                parsed
                    .content
                    .into_iter()
                    .next()
                    .map(|part| part.text)
                    .ok_or_else(|| {
                        LumenError::EmptyResult("no response content from Anthropic".into())
                    })
            }
            CloudKind::Google => {
                let model = model.trim_start_matches("models/");
                let request = GeminiRequest {
                    contents: vec![GeminiContent {
                        parts: vec![TextPart {
                            text: message.to_string(),
                        }],
                    }],
                    generation_config: gemini_generation_config(config),
                };
                let path = format!("/v1beta/models/{model}:generateContent");
                let reply = self.post_chat(&path, model, &request).await?;
                let parsed: GeminiResponse = reply.decode(self.label(), |r: &GeminiResponse| {
                    r.error.as_ref().map(|e| e.message.clone())
                })?;
                gemini_text(parsed)
            }
        }
    }

    async fn post_chat<B: Serialize + ?Sized>(
        &self,
        path: &str,
        model: &str,
        body: &B,
    ) -> LumenResult<Reply> {
        self.trace("chat", path);
        let response = self
            .authorize(self.client.post(endpoint(&self.base_url, path)))
            .timeout(CHAT_TIMEOUT)
            .json(body)
            .send()
            .await
            .map_err(|err| self.send_error(err, Some(model)))?;
        read_reply(response)
            .await
            .map_err(|err| self.send_error(err, Some(model)))
    }

    fn send_error(&self, err: reqwest::Error, model: Option<&str>) -> LumenError {
        let failure = TransportFailure::from_reqwest(err);
        match model {
            Some(model) if failure.timed_out() => LumenError::Transport(format!(
                "{} did not answer within {} for model '{model}'. Try again or pick a smaller model.",
                self.label(),
                budget_text(CHAT_TIMEOUT)
            )),
            _ => LumenError::Transport(format!(
                "failed to send request to {}: {}",
                self.label(),
                failure.detail
            )),
        }
    }
}

fn gemini_text(response: GeminiResponse) -> LumenResult<String> {
    let Some(candidate) = response.candidates.into_iter().next() else {
        return Err(LumenError::EmptyResult(
            "no response content from Google".into(),
        ));
    };
    if let Some(part) = candidate.content.parts.into_iter().next() {
        return Ok(part.text);
    }
    if !candidate.finish_reason.is_empty() {
        return Err(LumenError::Api(format!(
            "Google model finished with reason: '{}'. This can be due to safety filters or an invalid request",
            candidate.finish_reason
        )));
    }
    Err(LumenError::EmptyResult(
        "no response content from Google".into(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::EventLog;

    fn connector(provider: ProviderId) -> LumenResult<CloudConnector> {
        CloudConnector::new(
            Client::new(),
            provider,
            "http://127.0.0.1:9",
            "sk-very-secret",
            Arc::new(EventLog::new()),
        )
    }

    #[test]
    fn local_providers_are_rejected() {
        let err = connector(ProviderId::Ollama).unwrap_err();
        assert!(matches!(err, LumenError::UnsupportedProvider(_)));
    }

    #[test]
    fn debug_output_hides_the_key() {
        let rendered = format!("{:?}", connector(ProviderId::OpenAi).unwrap());
        assert!(!rendered.contains("sk-very-secret"));
        assert!(rendered.contains("redacted"));
    }

    #[tokio::test]
    async fn anthropic_listing_is_static() {
        let models = connector(ProviderId::Anthropic)
            .unwrap()
            .list_models()
            .await
            .unwrap();
        let names: Vec<_> = models.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, ANTHROPIC_MODELS);
    }

    #[test]
    fn gemini_finish_reason_is_reported() {
        let parsed: GeminiResponse = serde_json::from_str(
            r#"{"candidates":[{"content":{"parts":[]},"finishReason":"SAFETY"}]}"#,
        )
        .unwrap();
        let err = gemini_text(parsed).unwrap_err();
        assert!(err.to_string().contains("'SAFETY'"));
    }

    #[test]
    fn gemini_first_part_is_returned() {
        let parsed: GeminiResponse = serde_json::from_str(
            r#"{"candidates":[{"content":{"parts":[{"text":"hola"},{"text":"x"}]},"finishReason":"STOP"}]}"#,
        )
        .unwrap();
        assert_eq!(gemini_text(parsed).unwrap(), "hola");
    }

    #[test]
    fn anthropic_request_carries_max_tokens() {
        let request = AnthropicRequest {
            model: "claude",
            messages: vec![ChatMessage::user("hi")],
            sampling: anthropic_sampling(&GenerationConfig {
                context_size: 0,
                ..Default::default()
            }),
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["max_tokens"], 4096);
        assert_eq!(value["messages"][0]["content"], "hi");
    }
}
