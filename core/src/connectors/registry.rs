use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use reqwest::Client;

use super::docker::DockerConnector;
use super::huggingface::HuggingFaceConnector;
use super::lmstudio::LmStudioConnector;
use super::ollama::OllamaConnector;
use super::{CloudConnector, ModelConnector};
use crate::errors::{LumenError, LumenResult};
use crate::logging::EventSink;
use crate::providers::{Endpoints, ProviderId};

const USER_AGENT: &str = concat!("Lumen-Core/", env!("CARGO_PKG_VERSION"));

/// Maps provider ids to connectors. Local backends are built once; cloud
/// connectors are built per call because they carry the caller's key.
pub struct ConnectorRegistry {
    client: Client,
    endpoints: Endpoints,
    events: Arc<dyn EventSink>,
    ollama: Arc<OllamaConnector>,
    local: BTreeMap<ProviderId, Arc<dyn ModelConnector>>,
}

impl ConnectorRegistry {
    pub fn new(endpoints: Endpoints, events: Arc<dyn EventSink>) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .context("failed to construct HTTP client")?;

        let ollama = Arc::new(OllamaConnector::new(
            client.clone(),
            endpoints.base_url(ProviderId::Ollama),
            events.clone(),
        ));
        let mut local: BTreeMap<ProviderId, Arc<dyn ModelConnector>> = BTreeMap::new();
        local.insert(ProviderId::Ollama, ollama.clone());
        local.insert(
            ProviderId::LmStudio,
            Arc::new(LmStudioConnector::new(
                client.clone(),
                endpoints.base_url(ProviderId::LmStudio),
                events.clone(),
            )),
        );
        local.insert(
            ProviderId::HuggingFace,
            Arc::new(HuggingFaceConnector::new(
                client.clone(),
                endpoints.base_url(ProviderId::HuggingFace),
                events.clone(),
            )),
        );
        local.insert(
            ProviderId::Docker,
            Arc::new(DockerConnector::new(
                client.clone(),
                endpoints.base_url(ProviderId::Docker),
            )),
        );

        Ok(Self {
            client,
            endpoints,
            events,
            ollama,
            local,
        })
    }

    /// Connector for a local backend. Cloud providers need a key; see
    /// [`ConnectorRegistry::cloud`].
    pub fn resolve(&self, provider: ProviderId) -> LumenResult<Arc<dyn ModelConnector>> {
        self.local
            .get(&provider)
            .cloned()
            .ok_or_else(|| LumenError::UnsupportedProvider(provider.to_string()))
    }

    pub fn resolve_id(&self, provider: &str) -> LumenResult<Arc<dyn ModelConnector>> {
        self.resolve(provider.parse()?)
    }

    pub fn ollama(&self) -> &OllamaConnector {
        &self.ollama
    }

    pub fn cloud(&self, provider: ProviderId, api_key: &str) -> LumenResult<CloudConnector> {
        CloudConnector::new(
            self.client.clone(),
            provider,
            self.endpoints.base_url(provider),
            api_key,
            self.events.clone(),
        )
    }
}
