//! LM Studio's OpenAI-compatible local server.
//!
//! Reasoning models served through LM Studio tend to leak their scratchpad,
//! so chat output goes through [`normalize_response`].

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;

use super::http::{
    budget_text, check_connectivity, endpoint, read_reply, status_line, TransportFailure,
    DISCOVERY_TIMEOUT, LONG_CHAT_TIMEOUT,
};
use super::openai_compat::{ChatRequest, ChatResponse, ModelList};
use super::params::openai_sampling;
use super::{Model, ModelConnector, ScanResult};
use crate::config::GenerationConfig;
use crate::errors::{LumenError, LumenResult};
use crate::logging::{log_event, EventSink, Level};
use crate::normalizer::normalize_response;
use crate::providers::ProviderId;

const MODULE: &str = "connector.lmstudio";
const CHAT_PATH: &str = "/v1/chat/completions";

pub struct LmStudioConnector {
    client: Client,
    base_url: String,
    events: Arc<dyn EventSink>,
}

impl LmStudioConnector {
    pub fn new(client: Client, base_url: impl Into<String>, events: Arc<dyn EventSink>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            events,
        }
    }

    async fn discover(&self) -> LumenResult<Vec<Model>> {
        let url = endpoint(&self.base_url, ProviderId::LmStudio.discovery_path());
        let response = self
            .client
            .get(&url)
            .timeout(DISCOVERY_TIMEOUT)
            .send()
            .await
            .map_err(|_| {
                LumenError::Transport(format!(
                    "Cannot connect to LM Studio at {}. Make sure LM Studio is running with a model loaded.",
                    self.base_url
                ))
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(LumenError::Protocol {
                status: status.as_u16(),
                message: format!(
                    "HTTP {}: {}. Make sure a model is loaded in LM Studio.",
                    status.as_u16(),
                    status_line(status)
                ),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|_| LumenError::Transport("Failed to read response body".into()))?;
        let list: ModelList = serde_json::from_str(&body)
            .map_err(|err| LumenError::Decode(format!("Failed to parse response: {err}")))?;
        if list.data.is_empty() {
            return Err(LumenError::EmptyResult(
                "No models loaded in LM Studio. Please load a model in LM Studio first.".into(),
            ));
        }
        Ok(list.into_models())
    }
}

#[async_trait]
impl ModelConnector for LmStudioConnector {
    fn provider(&self) -> ProviderId {
        ProviderId::LmStudio
    }

    async fn scan(&self) -> ScanResult {
        let result = self.discover().await;
        if let Err(err) = &result {
            log_event(
                self.events.as_ref(),
                Level::Warn,
                Some(err.code()),
                MODULE,
                &err.to_string(),
                Some(err.explain()),
                None,
            );
        }
        ScanResult::from_discovery(result)
    }

    async fn check_health(&self) -> LumenResult<()> {
        check_connectivity(
            &self.client,
            &endpoint(&self.base_url, ProviderId::LmStudio.discovery_path()),
        )
        .await
    }

    fn supports_chat(&self) -> bool {
        true
    }

    async fn chat(
        &self,
        model: &str,
        message: &str,
        config: &GenerationConfig,
    ) -> LumenResult<String> {
        let request = ChatRequest::single_turn(model, message, openai_sampling(config));
        let response = self
            .client
            .post(endpoint(&self.base_url, CHAT_PATH))
            .timeout(LONG_CHAT_TIMEOUT)
            .json(&request)
            .send()
            .await
            .map_err(|err| {
                let failure = TransportFailure::from_reqwest(err);
                if failure.timed_out() {
                    LumenError::Transport(format!(
                        "LM Studio did not answer within {}. The model '{model}' may still be \
                         loading or too large for this machine.",
                        budget_text(LONG_CHAT_TIMEOUT)
                    ))
                } else {
                    LumenError::Transport(format!(
                        "failed to send request to LM Studio: {}",
                        failure.detail
                    ))
                }
            })?;

        let reply = read_reply(response).await.map_err(|err| {
            LumenError::Transport(format!(
                "failed to read response body: {}",
                TransportFailure::from_reqwest(err).detail
            ))
        })?;
        let parsed: ChatResponse = reply.decode("LM Studio", ChatResponse::embedded_error)?;
        let raw = parsed
            .first_text()
            .ok_or_else(|| LumenError::EmptyResult("no response from LM Studio".into()))?;

        let cleaned = normalize_response(&raw);
        if cleaned.len() != raw.trim().len() {
            log_event(
                self.events.as_ref(),
                Level::Debug,
                None,
                MODULE,
                "Stripped reasoning markup from LM Studio reply",
                None,
                Some(json!({ "model": model, "raw_len": raw.len(), "clean_len": cleaned.len() })),
            );
        }
        Ok(cleaned)
    }
}
