//! Self-hosted Hugging Face inference server. Discovery only.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;

use super::http::{check_connectivity, endpoint, status_line, DISCOVERY_TIMEOUT};
use super::openai_compat::ModelList;
use super::{Model, ModelConnector, ScanResult};
use crate::errors::{LumenError, LumenResult};
use crate::logging::{log_event, EventSink, Level};
use crate::providers::ProviderId;

const MODULE: &str = "connector.huggingface";

pub struct HuggingFaceConnector {
    client: Client,
    base_url: String,
    events: Arc<dyn EventSink>,
}

impl HuggingFaceConnector {
    pub fn new(client: Client, base_url: impl Into<String>, events: Arc<dyn EventSink>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            events,
        }
    }

    async fn discover(&self) -> LumenResult<Vec<Model>> {
        let url = endpoint(&self.base_url, ProviderId::HuggingFace.discovery_path());
        let response = self
            .client
            .get(&url)
            .timeout(DISCOVERY_TIMEOUT)
            .send()
            .await
            .map_err(|_| {
                LumenError::Transport(format!(
                    "Cannot connect to Hugging Face at {}. Make sure your Hugging Face service is running.",
                    self.base_url
                ))
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(LumenError::Protocol {
                status: status.as_u16(),
                message: format!(
                    "HTTP {}: {}. Make sure your Hugging Face service is properly configured.",
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
                "No models available in Hugging Face service. Make sure models are loaded.".into(),
            ));
        }
        Ok(list.into_models())
    }
}

#[async_trait]
impl ModelConnector for HuggingFaceConnector {
    fn provider(&self) -> ProviderId {
        ProviderId::HuggingFace
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
            &endpoint(&self.base_url, ProviderId::HuggingFace.discovery_path()),
        )
        .await
    }
}
