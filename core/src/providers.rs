//! Provider identities and the default endpoint table.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::LumenError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderId {
    Ollama,
    LmStudio,
    HuggingFace,
    Docker,
    OpenAi,
    Anthropic,
    Google,
}

impl ProviderId {
    pub const ALL: [ProviderId; 7] = [
        ProviderId::Ollama,
        ProviderId::LmStudio,
        ProviderId::HuggingFace,
        ProviderId::Docker,
        ProviderId::OpenAi,
        ProviderId::Anthropic,
        ProviderId::Google,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ollama => "ollama",
            Self::LmStudio => "lmstudio",
            Self::HuggingFace => "huggingface",
            Self::Docker => "docker",
            Self::OpenAi => "openai",
            Self::Anthropic => "anthropic",
            Self::Google => "google",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Self::Ollama => "Ollama",
            Self::LmStudio => "LM Studio",
            Self::HuggingFace => "Hugging Face",
            Self::Docker => "Docker",
            Self::OpenAi => "OpenAI",
            Self::Anthropic => "Anthropic",
            Self::Google => "Google",
        }
    }

    /// Path probed by discovery and health checks. For Anthropic this is only
    /// used to validate keys; its model list is curated.
    pub fn discovery_path(self) -> &'static str {
        PROVIDER_SEEDS
            .iter()
            .find(|seed| seed.id == self)
            .map(|seed| seed.discovery_path)
            .unwrap_or("/")
    }

    pub fn is_cloud(self) -> bool {
        matches!(self, Self::OpenAi | Self::Anthropic | Self::Google)
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderId {
    type Err = LumenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        ProviderId::ALL
            .into_iter()
            .find(|p| p.as_str() == wanted)
            .ok_or_else(|| LumenError::UnsupportedProvider(s.to_string()))
    }
}

pub struct ProviderSeed {
    pub id: ProviderId,
    pub base_url: &'static str,
    pub discovery_path: &'static str,
}

pub const PROVIDER_SEEDS: &[ProviderSeed] = &[
    ProviderSeed {
        id: ProviderId::Ollama,
        base_url: "http://localhost:11434",
        discovery_path: "/api/tags",
    },
    ProviderSeed {
        id: ProviderId::LmStudio,
        base_url: "http://localhost:1234",
        discovery_path: "/v1/models",
    },
    ProviderSeed {
        id: ProviderId::HuggingFace,
        base_url: "http://localhost:8000",
        discovery_path: "/models",
    },
    ProviderSeed {
        id: ProviderId::Docker,
        base_url: "http://localhost:8080",
        discovery_path: "/models",
    },
    ProviderSeed {
        id: ProviderId::OpenAi,
        base_url: "https://api.openai.com",
        discovery_path: "/v1/models",
    },
    ProviderSeed {
        id: ProviderId::Anthropic,
        base_url: "https://api.anthropic.com",
        discovery_path: "/v1/models",
    },
    ProviderSeed {
        id: ProviderId::Google,
        base_url: "https://generativelanguage.googleapis.com",
        discovery_path: "/v1beta/models",
    },
];

/// Base URL per provider, fixed once the registry is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    base_urls: BTreeMap<ProviderId, String>,
}

impl Endpoints {
    pub fn defaults() -> Self {
        let base_urls = PROVIDER_SEEDS
            .iter()
            .map(|seed| (seed.id, seed.base_url.to_string()))
            .collect();
        Self { base_urls }
    }

    /// Replace one base URL, consuming the table. Used to point providers at
    /// fakes in tests.
    pub fn with(mut self, provider: ProviderId, base_url: impl Into<String>) -> Self {
        let url: String = base_url.into();
        self.base_urls
            .insert(provider, url.trim_end_matches('/').to_string());
        self
    }

    pub fn base_url(&self, provider: ProviderId) -> &str {
        self.base_urls
            .get(&provider)
            .map(String::as_str)
            .unwrap_or_default()
    }
}

impl Default for Endpoints {
    fn default() -> Self {
        Self::defaults()
    }
}
