//! Backend connectors.
//!
//! Every backend family gets one connector that maps its discovery and chat
//! wire formats onto [`Model`], [`ScanResult`] and plain completion text.
//! Discovery never fails outward: each failure class is folded into a
//! [`ScanResult`] carrying a message the user can act on.

pub mod cloud;
pub mod docker;
pub mod http;
pub mod huggingface;
pub mod lmstudio;
pub mod ollama;
pub mod openai_compat;
pub mod params;
pub mod registry;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::GenerationConfig;
use crate::errors::{LumenError, LumenResult};
use crate::providers::ProviderId;

pub use cloud::CloudConnector;
pub use registry::ConnectorRegistry;

/// One discovery row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Model {
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub size: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub modified: String,
}

impl Model {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            size: String::new(),
            modified: String::new(),
        }
    }
}

/// Discovery outcome. `success` implies a non-empty model list and no error;
/// a failure never carries models.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanResult {
    pub models: Vec<Model>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub error: String,
    pub success: bool,
}

impl ScanResult {
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            models: Vec::new(),
            error: message.into(),
            success: false,
        }
    }

    pub fn from_discovery(result: LumenResult<Vec<Model>>) -> Self {
        match result {
            Ok(models) if models.is_empty() => Self::failure("No models found"),
            Ok(models) => Self {
                models,
                error: String::new(),
                success: true,
            },
            Err(err) => Self::failure(err.to_string()),
        }
    }
}

#[async_trait]
pub trait ModelConnector: Send + Sync {
    fn provider(&self) -> ProviderId;

    /// List available models. Must not fail; see [`ScanResult`].
    async fn scan(&self) -> ScanResult;

    /// Quick reachability probe of the discovery endpoint.
    async fn check_health(&self) -> LumenResult<()>;

    fn supports_chat(&self) -> bool {
        false
    }

    async fn chat(
        &self,
        _model: &str,
        _message: &str,
        _config: &GenerationConfig,
    ) -> LumenResult<String> {
        Err(LumenError::UnsupportedProvider(format!(
            "{} (chat)",
            self.provider()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_discovery_is_a_failure() {
        let result = ScanResult::from_discovery(Ok(Vec::new()));
        assert!(!result.success);
        assert!(result.models.is_empty());
        assert!(!result.error.is_empty());
    }

    #[test]
    fn errors_fold_into_failure_without_models() {
        let result = ScanResult::from_discovery(Err(LumenError::Transport("down".into())));
        assert_eq!(result, ScanResult::failure("down"));
    }

    #[test]
    fn success_has_no_error_field_on_the_wire() {
        let result = ScanResult::from_discovery(Ok(vec![Model::named("phi3")]));
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value, serde_json::json!({ "models": [{ "name": "phi3" }], "success": true }));
    }
}
