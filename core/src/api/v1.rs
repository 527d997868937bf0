//! Version 1 of the command surface.
//!
//! Commands are thin wrappers: they forward to the [`Orchestrator`] and turn
//! errors into display strings, which is what every front end shows anyway.

use std::sync::Arc;

use serde::Serialize;
use time::OffsetDateTime;

use crate::config::{AppInfo, GenerationConfig};
use crate::connectors::{Model, ScanResult};
use crate::logging::{EventLog, LogEvent};
use crate::orchestrator::Orchestrator;

/// Shared state handed to each command.
#[derive(Clone)]
pub struct ApiState {
    pub orchestrator: Arc<Orchestrator>,
    pub events: Arc<EventLog>,
}

/// Liveness probe for front ends.
pub fn ping() -> serde_json::Value {
    serde_json::json!({
        "ok": true,
        "ts": OffsetDateTime::now_utc().unix_timestamp(),
    })
}

pub async fn scan_local_models(state: &ApiState, provider: &str) -> ScanResult {
    state.orchestrator.scan(provider).await
}

#[derive(Debug, Serialize)]
pub struct ProviderStatus {
    pub provider: String,
    pub reachable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub async fn check_provider(state: &ApiState, provider: &str) -> ProviderStatus {
    let outcome = state.orchestrator.check_health(provider).await;
    ProviderStatus {
        provider: provider.to_string(),
        reachable: outcome.is_ok(),
        error: outcome.err().map(|e| e.to_string()),
    }
}

pub async fn is_ollama_running(state: &ApiState) -> bool {
    state.orchestrator.ollama_running().await
}

pub async fn test_and_save_api_key(
    state: &ApiState,
    provider: &str,
    api_key: &str,
) -> Result<(), String> {
    state
        .orchestrator
        .test_and_save_credential(provider, api_key)
        .await
        .map_err(|e| e.to_string())
}

pub async fn list_cloud_models(
    state: &ApiState,
    provider: &str,
    api_key: &str,
) -> Result<Vec<Model>, String> {
    state
        .orchestrator
        .list_cloud_models(provider, api_key)
        .await
        .map_err(|e| e.to_string())
}

pub async fn save_model_config(
    state: &ApiState,
    provider: &str,
    model: &str,
    config: GenerationConfig,
) -> Result<String, String> {
    state
        .orchestrator
        .save_generation_config(provider, model, config)
        .await
        .map_err(|e| e.to_string())?;
    Ok(format!("Configuration saved for {provider}/{model}"))
}

pub fn get_model_config(
    state: &ApiState,
    provider: &str,
    model: &str,
) -> Result<GenerationConfig, String> {
    state
        .orchestrator
        .get_generation_config(provider, model)
        .map_err(|e| e.to_string())
}

pub async fn chat_with_model(
    state: &ApiState,
    provider: &str,
    model: &str,
    message: &str,
) -> Result<String, String> {
    state
        .orchestrator
        .chat(provider, model, message)
        .await
        .map_err(|e| e.to_string())
}

pub fn get_api_key(state: &ApiState, provider: &str) -> Result<String, String> {
    state
        .orchestrator
        .get_credential(provider)
        .map_err(|e| e.to_string())
}

pub async fn set_api_key(state: &ApiState, provider: &str, api_key: &str) -> Result<(), String> {
    state
        .orchestrator
        .set_credential(provider, api_key)
        .await
        .map_err(|e| e.to_string())
}

pub fn app_info(state: &ApiState) -> AppInfo {
    state.orchestrator.app_info()
}

/// Recent events from the chat runtime, newest first.
pub fn list_ai_events(state: &ApiState, limit: Option<usize>) -> Vec<LogEvent> {
    let events = state
        .events
        .recent(usize::MAX)
        .into_iter()
        .filter(|e| e.module == "ai.runtime");
    match limit {
        Some(limit) => events.take(limit).collect(),
        None => events.collect(),
    }
}

/// Everything still in the event buffer, newest first.
pub fn recent_events(state: &ApiState, limit: usize) -> Vec<LogEvent> {
    state.events.recent(limit)
}
