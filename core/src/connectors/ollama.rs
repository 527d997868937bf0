//! Ollama: `/api/tags` discovery and `/api/generate` completions.
//!
//! Ollama is the backend the UI expects by default and polls on startup, so
//! discovery uses the short budget and every failure class gets its own
//! remediation text.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::{CACHE_CONTROL, EXPIRES, PRAGMA};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use super::http::{
    self, budget_text, check_connectivity, endpoint, read_reply, TransportFailure, TransportKind,
    CHAT_TIMEOUT, FAST_DISCOVERY_TIMEOUT, LIVENESS_TIMEOUT,
};
use super::params::ollama_options;
use super::{Model, ModelConnector, ScanResult};
use crate::config::GenerationConfig;
use crate::errors::{LumenError, LumenResult};
use crate::format::{format_bytes, format_date};
use crate::logging::{log_event, EventSink, Level};
use crate::providers::ProviderId;

const MODULE: &str = "connector.ollama";
const GENERATE_PATH: &str = "/api/generate";

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<TagEntry>,
}

#[derive(Debug, Deserialize)]
struct TagEntry {
    name: String,
    #[serde(default)]
    size: u64,
    #[serde(default)]
    modified_at: String,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
    #[serde(default)]
    error: Option<String>,
}

pub struct OllamaConnector {
    client: Client,
    base_url: String,
    events: Arc<dyn EventSink>,
}

impl OllamaConnector {
    pub fn new(client: Client, base_url: impl Into<String>, events: Arc<dyn EventSink>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            events,
        }
    }

    /// Cheap liveness probe against the root URL. Anything short of a 5xx
    /// counts as running.
    pub async fn is_running(&self) -> bool {
        match self
            .client
            .get(&self.base_url)
            .timeout(LIVENESS_TIMEOUT)
            .send()
            .await
        {
            Ok(response) => response.status().as_u16() < 500,
            Err(_) => false,
        }
    }

    async fn discover(&self) -> LumenResult<Vec<Model>> {
        let url = endpoint(&self.base_url, ProviderId::Ollama.discovery_path());
        log_event(
            self.events.as_ref(),
            Level::Debug,
            None,
            MODULE,
            "Scanning Ollama",
            None,
            Some(json!({ "url": url })),
        );

        let response = self
            .client
            .get(&url)
            .timeout(FAST_DISCOVERY_TIMEOUT)
            .header(CACHE_CONTROL, "no-cache, no-store, must-revalidate")
            .header(PRAGMA, "no-cache")
            .header(EXPIRES, "0")
            .send()
            .await
            .map_err(|err| {
                let failure = TransportFailure::from_reqwest(err);
                LumenError::Transport(format!(
                    "Cannot connect to Ollama at {}. {}",
                    self.base_url,
                    transport_hint(&failure)
                ))
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(LumenError::Protocol {
                status: status.as_u16(),
                message: format!(
                    "HTTP {}: {}{}",
                    status.as_u16(),
                    http::status_line(status),
                    status_hint(status.as_u16())
                ),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|_| LumenError::Transport("Failed to read response from Ollama".into()))?;
        if body.is_empty() {
            return Err(LumenError::Decode(
                "Received empty response from Ollama API".into(),
            ));
        }

        let tags: TagsResponse = serde_json::from_str(&body)
            .map_err(|err| LumenError::Decode(format!("Failed to parse Ollama response: {err}")))?;
        if tags.models.is_empty() {
            return Err(LumenError::EmptyResult(
                "No models found in Ollama. Pull some models using 'ollama pull <model-name>'"
                    .into(),
            ));
        }

        Ok(tags
            .models
            .into_iter()
            .map(|entry| Model {
                name: entry.name,
                size: format_bytes(entry.size),
                modified: format_date(&entry.modified_at),
            })
            .collect())
    }
}

fn transport_hint(failure: &TransportFailure) -> String {
    match failure.kind {
        TransportKind::Refused => {
            "Connection refused - Ollama is not running. Please start Ollama first.".into()
        }
        TransportKind::Timeout => {
            "Connection timeout - Ollama may be starting up or not responding.".into()
        }
        TransportKind::HostNotFound => {
            "Host not found - check if Ollama is installed and the endpoint is correct.".into()
        }
        TransportKind::Unreachable => {
            "Network unreachable - check your network connection.".into()
        }
        TransportKind::Other => format!("Error: {}", failure.detail),
    }
}

fn status_hint(status: u16) -> &'static str {
    match status {
        404 => " - Ollama API endpoint not found. Make sure you're using the correct Ollama version.",
        500 => " - Ollama server error. Try restarting Ollama.",
        503 => " - Ollama service unavailable. The service may be starting up.",
        s if s >= 500 => " - Ollama server is experiencing issues.",
        _ => "",
    }
}

#[async_trait]
impl ModelConnector for OllamaConnector {
    fn provider(&self) -> ProviderId {
        ProviderId::Ollama
    }

    async fn scan(&self) -> ScanResult {
        let result = self.discover().await;
        match &result {
            Ok(models) => log_event(
                self.events.as_ref(),
                Level::Info,
                None,
                MODULE,
                "Ollama models discovered",
                None,
                Some(json!({ "count": models.len() })),
            ),
            Err(err) => log_event(
                self.events.as_ref(),
                Level::Warn,
                Some(err.code()),
                MODULE,
                &err.to_string(),
                Some(err.explain()),
                None,
            ),
        }
        ScanResult::from_discovery(result)
    }

    async fn check_health(&self) -> LumenResult<()> {
        check_connectivity(
            &self.client,
            &endpoint(&self.base_url, ProviderId::Ollama.discovery_path()),
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
        let payload = json!({
            "model": model,
            "prompt": message,
            "stream": false,
            "options": ollama_options(config),
        });

        let response = self
            .client
            .post(endpoint(&self.base_url, GENERATE_PATH))
            .timeout(CHAT_TIMEOUT)
            .json(&payload)
            .send()
            .await
            .map_err(|err| {
                let failure = TransportFailure::from_reqwest(err);
                if failure.timed_out() {
                    LumenError::Transport(format!(
                        "request timed out after {}. The model '{model}' may be too large or your \
                         system may be under heavy load. Try using a smaller model or increasing \
                         system resources",
                        budget_text(CHAT_TIMEOUT)
                    ))
                } else {
                    LumenError::Transport(format!(
                        "failed to send request to Ollama: {}",
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
        let generated: GenerateResponse =
            reply.decode("Ollama", |r: &GenerateResponse| r.error.clone())?;
        if generated.response.is_empty() {
            return Err(LumenError::EmptyResult(
                "received empty response from Ollama".into(),
            ));
        }
        Ok(generated.response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_transport_class_has_its_own_hint() {
        let hint = |kind| {
            transport_hint(&TransportFailure {
                kind,
                detail: "boom".into(),
            })
        };
        assert!(hint(TransportKind::Refused).contains("not running"));
        assert!(hint(TransportKind::Timeout).contains("starting up"));
        assert!(hint(TransportKind::HostNotFound).contains("Host not found"));
        assert!(hint(TransportKind::Unreachable).contains("Network unreachable"));
        assert_eq!(hint(TransportKind::Other), "Error: boom");
    }

    #[test]
    fn status_hints_cover_known_codes() {
        assert!(status_hint(404).contains("endpoint not found"));
        assert!(status_hint(500).contains("restarting"));
        assert!(status_hint(503).contains("starting up"));
        assert!(status_hint(502).contains("experiencing issues"));
        assert_eq!(status_hint(401), "");
    }

    #[test]
    fn tags_tolerate_missing_optional_fields() {
        let tags: TagsResponse =
            serde_json::from_str(r#"{"models":[{"name":"llama3:8b"}]}"#).unwrap();
        assert_eq!(tags.models[0].size, 0);
        assert!(tags.models[0].modified_at.is_empty());
    }
}
