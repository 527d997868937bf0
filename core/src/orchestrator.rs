//! Front door for every outward operation.
//!
//! The orchestrator parses provider ids, resolves connectors through the
//! registry, pulls generation parameters and sealed credentials from the
//! config store, and records one structured event per chat invocation. Disk
//! work is pushed onto the blocking pool so async callers never stall on I/O.

use std::sync::Arc;

use serde_json::json;
use tokio::task::spawn_blocking;

use crate::config::{AppInfo, ConfigStore, GenerationConfig, ModelKey};
use crate::connectors::{ConnectorRegistry, Model, ScanResult};
use crate::errors::{LumenError, LumenResult};
use crate::logging::{log_event, EventSink, Level};
use crate::providers::ProviderId;

const MODULE: &str = "ai.runtime";

pub struct Orchestrator {
    registry: ConnectorRegistry,
    store: Arc<ConfigStore>,
    events: Arc<dyn EventSink>,
}

impl Orchestrator {
    pub fn new(
        registry: ConnectorRegistry,
        store: ConfigStore,
        events: Arc<dyn EventSink>,
    ) -> Arc<Self> {
        Arc::new(Self {
            registry,
            store: Arc::new(store),
            events,
        })
    }

    /// Discover models on a local backend. Never fails; unknown and cloud
    /// providers come back as an unsuccessful result.
    pub async fn scan(&self, provider: &str) -> ScanResult {
        match self.registry.resolve_id(provider) {
            Ok(connector) => connector.scan().await,
            Err(err) => ScanResult::failure(err.to_string()),
        }
    }

    pub async fn check_health(&self, provider: &str) -> LumenResult<()> {
        self.registry.resolve_id(provider)?.check_health().await
    }

    pub async fn ollama_running(&self) -> bool {
        self.registry.ollama().is_running().await
    }

    /// Validate `secret` against the provider and store it only if accepted.
    /// An empty secret removes the stored credential without a network call.
    pub async fn test_and_save_credential(&self, provider: &str, secret: &str) -> LumenResult<()> {
        let provider = parse_cloud(provider)?;
        let secret = secret.trim().to_string();
        if !secret.is_empty() {
            let connector = self.registry.cloud(provider, &secret)?;
            if let Err(err) = connector.test_connection().await {
                log_event(
                    self.events.as_ref(),
                    Level::Warn,
                    Some(err.code()),
                    MODULE,
                    "API key rejected",
                    Some(err.explain()),
                    Some(json!({ "provider": provider, "error": err.to_string() })),
                );
                return Err(err);
            }
        }

        let removed = secret.is_empty();
        self.with_store(move |store| store.set_credential(provider, &secret))
            .await?;
        log_event(
            self.events.as_ref(),
            Level::Info,
            Some("KEY-0200"),
            MODULE,
            if removed { "API key removed" } else { "API key validated and saved" },
            None,
            Some(json!({ "provider": provider })),
        );
        Ok(())
    }

    /// List a cloud provider's models. With an empty `secret` the stored
    /// credential is used.
    pub async fn list_cloud_models(&self, provider: &str, secret: &str) -> LumenResult<Vec<Model>> {
        let provider = parse_cloud(provider)?;
        let secret = match secret.trim() {
            "" => self.stored_key(provider)?,
            given => given.to_string(),
        };
        self.registry.cloud(provider, &secret)?.list_models().await
    }

    pub async fn save_generation_config(
        &self,
        provider: &str,
        model: &str,
        config: GenerationConfig,
    ) -> LumenResult<()> {
        let key = ModelKey::new(provider.parse()?, model);
        self.with_store(move |store| {
            store.set_generation_config(key, config);
            Ok(())
        })
        .await
    }

    pub fn get_generation_config(&self, provider: &str, model: &str) -> LumenResult<GenerationConfig> {
        let key = ModelKey::new(provider.parse()?, model);
        Ok(self.store.generation_config(&key))
    }

    /// Run one completion with the parameters saved for `(provider, model)`.
    pub async fn chat(&self, provider: &str, model: &str, message: &str) -> LumenResult<String> {
        let provider_id: ProviderId = provider.parse()?;
        let config = self
            .store
            .generation_config(&ModelKey::new(provider_id, model));

        let result = self.dispatch_chat(provider_id, model, message, &config).await;

        match &result {
            Ok(text) => self.log_invocation_success(provider_id, model, text),
            Err(err) => self.log_invocation_failure(provider_id, model, err),
        }
        result
    }

    async fn dispatch_chat(
        &self,
        provider: ProviderId,
        model: &str,
        message: &str,
        config: &GenerationConfig,
    ) -> LumenResult<String> {
        if provider.is_cloud() {
            let key = self.stored_key(provider)?;
            return self.registry.cloud(provider, &key)?.chat(model, message, config).await;
        }
        self.registry.resolve(provider)?.chat(model, message, config).await
    }

    pub fn get_credential(&self, provider: &str) -> LumenResult<String> {
        self.store.credential(provider.parse()?)
    }

    /// Store a credential without validating it. An empty secret deletes it.
    pub async fn set_credential(&self, provider: &str, secret: &str) -> LumenResult<()> {
        let provider: ProviderId = provider.parse()?;
        let secret = secret.to_string();
        self.with_store(move |store| store.set_credential(provider, &secret))
            .await
    }

    pub fn app_info(&self) -> AppInfo {
        self.store.app_info()
    }

    fn stored_key(&self, provider: ProviderId) -> LumenResult<String> {
        let key = self.store.credential(provider)?;
        if key.is_empty() {
            return Err(LumenError::Credential(format!(
                "No API key configured for {}. Add one in settings first.",
                provider.display_name()
            )));
        }
        Ok(key)
    }

    async fn with_store<T, F>(&self, work: F) -> LumenResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&ConfigStore) -> LumenResult<T> + Send + 'static,
    {
        let store = Arc::clone(&self.store);
        spawn_blocking(move || work(&store))
            .await
            .map_err(|err| LumenError::Storage(format!("config task failed: {err}")))?
    }

    fn log_invocation_success(&self, provider: ProviderId, model: &str, text: &str) {
        let preview = text.chars().take(200).collect::<String>();
        log_event(
            self.events.as_ref(),
            Level::Info,
            Some("AI-0200"),
            MODULE,
            "AI chat invocation succeeded",
            None,
            Some(json!({
                "provider": provider,
                "model": model,
                "preview": preview,
            })),
        );
    }

    fn log_invocation_failure(&self, provider: ProviderId, model: &str, error: &LumenError) {
        log_event(
            self.events.as_ref(),
            Level::Warn,
            Some("AI-0201"),
            MODULE,
            "AI provider invocation failed",
            Some(error.explain()),
            Some(json!({
                "provider": provider,
                "model": model,
                "code": error.code(),
                "error": error.to_string(),
            })),
        );
    }
}

fn parse_cloud(provider: &str) -> LumenResult<ProviderId> {
    let id: ProviderId = provider.parse()?;
    if !id.is_cloud() {
        return Err(LumenError::UnsupportedProvider(id.to_string()));
    }
    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BuildInfo;
    use crate::crypto::CredentialCipher;
    use crate::logging::EventLog;
    use crate::providers::Endpoints;

    fn orchestrator(dir: &std::path::Path) -> (Arc<Orchestrator>, Arc<EventLog>) {
        let events = Arc::new(EventLog::new());
        // Nothing listens on port 9.
        let mut endpoints = Endpoints::defaults();
        for provider in ProviderId::ALL {
            endpoints = endpoints.with(provider, "http://127.0.0.1:9");
        }
        let registry = ConnectorRegistry::new(endpoints, events.clone()).unwrap();
        let store = ConfigStore::load(
            dir.join("config.json"),
            &BuildInfo::current(),
            CredentialCipher::new(&[7u8; 32]).unwrap(),
            events.clone(),
        );
        (Orchestrator::new(registry, store, events.clone()), events)
    }

    #[tokio::test]
    async fn cloud_and_unknown_scans_fail_softly() {
        let dir = tempfile::tempdir().unwrap();
        let (orch, _) = orchestrator(dir.path());
        for provider in ["openai", "mistral"] {
            let result = orch.scan(provider).await;
            assert!(!result.success);
            assert!(result.models.is_empty());
            assert!(result.error.starts_with("Unsupported provider"));
        }
    }

    #[tokio::test]
    async fn config_round_trips_through_the_store() {
        let dir = tempfile::tempdir().unwrap();
        let (orch, _) = orchestrator(dir.path());
        let custom = GenerationConfig {
            temperature: 0.3,
            stop_sequences: vec!["###".into()],
            ..Default::default()
        };
        orch.save_generation_config("ollama", "llama3", custom.clone())
            .await
            .unwrap();
        assert_eq!(orch.get_generation_config("ollama", "llama3").unwrap(), custom);
        assert_eq!(
            orch.get_generation_config("lmstudio", "llama3").unwrap(),
            GenerationConfig::default()
        );
        assert!(matches!(
            orch.get_generation_config("nope", "llama3"),
            Err(LumenError::UnsupportedProvider(_))
        ));
    }

    #[tokio::test]
    async fn cloud_chat_without_key_is_a_credential_error() {
        let dir = tempfile::tempdir().unwrap();
        let (orch, events) = orchestrator(dir.path());
        let err = orch.chat("anthropic", "claude-3-haiku-20240307", "hi").await.unwrap_err();
        assert!(matches!(err, LumenError::Credential(_)));
        assert_eq!(events.with_code("AI-0201").len(), 1);
    }

    #[tokio::test]
    async fn empty_secret_removes_without_network() {
        let dir = tempfile::tempdir().unwrap();
        let (orch, _) = orchestrator(dir.path());
        orch.set_credential("google", "AIza-123").await.unwrap();
        assert_eq!(orch.get_credential("google").unwrap(), "AIza-123");

        orch.test_and_save_credential("google", "  ").await.unwrap();
        assert_eq!(orch.get_credential("google").unwrap(), "");
    }

    #[tokio::test]
    async fn local_providers_cannot_take_keys() {
        let dir = tempfile::tempdir().unwrap();
        let (orch, _) = orchestrator(dir.path());
        assert!(matches!(
            orch.test_and_save_credential("ollama", "x").await,
            Err(LumenError::UnsupportedProvider(_))
        ));
        assert!(matches!(
            orch.list_cloud_models("lmstudio", "x").await,
            Err(LumenError::UnsupportedProvider(_))
        ));
    }

    #[tokio::test]
    async fn anthropic_listing_falls_back_to_stored_key() {
        let dir = tempfile::tempdir().unwrap();
        let (orch, _) = orchestrator(dir.path());
        assert!(matches!(
            orch.list_cloud_models("anthropic", "").await,
            Err(LumenError::Credential(_))
        ));
        orch.set_credential("anthropic", "sk-ant").await.unwrap();
        assert_eq!(orch.list_cloud_models("anthropic", "").await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn docker_chat_is_unsupported() {
        let dir = tempfile::tempdir().unwrap();
        let (orch, _) = orchestrator(dir.path());
        assert!(matches!(
            orch.chat("docker", "any", "hi").await,
            Err(LumenError::UnsupportedProvider(_))
        ));
    }
}
