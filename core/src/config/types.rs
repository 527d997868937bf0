use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::providers::ProviderId;

pub const BUILD_NUMBER: u32 = 3;
pub const RELEASE_DATE: &str = "2025-07-14";

/// Metadata compiled into this binary, compared with the stored [`AppInfo`]
/// on every load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildInfo {
    pub version: String,
    pub build_number: u32,
    pub release_date: String,
}

impl BuildInfo {
    pub fn current() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            build_number: BUILD_NUMBER,
            release_date: RELEASE_DATE.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppInfo {
    pub version: String,
    pub build_number: u32,
    pub release_date: String,
    pub install_date: String,
    pub last_update_date: String,
}

/// Canonical, provider-agnostic sampling parameters. Field names on disk match
/// what the settings form has always sent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    pub temperature: f64,
    pub top_p: f64,
    pub top_k: u32,
    pub repeat_penalty: f64,
    #[serde(rename = "num_ctx")]
    pub context_size: u32,
    #[serde(rename = "stop")]
    pub stop_sequences: Vec<String>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            top_p: 0.9,
            top_k: 40,
            repeat_penalty: 1.1,
            context_size: 2048,
            stop_sequences: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ModelKey {
    pub provider: ProviderId,
    pub model: String,
}

impl ModelKey {
    pub fn new(provider: ProviderId, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
        }
    }
}

/// Base64 AES-GCM blob; see [`crate::crypto`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SealedCredential(pub String);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigDocument {
    pub app_info: AppInfo,
    #[serde(default, with = "nested_model_configs")]
    pub model_configs: BTreeMap<ModelKey, GenerationConfig>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub credentials: BTreeMap<ProviderId, SealedCredential>,
}

impl ConfigDocument {
    pub fn fresh(build: &BuildInfo, now: &str) -> Self {
        Self {
            app_info: AppInfo {
                version: build.version.clone(),
                build_number: build.build_number,
                release_date: build.release_date.clone(),
                install_date: now.to_string(),
                last_update_date: now.to_string(),
            },
            model_configs: BTreeMap::new(),
            credentials: BTreeMap::new(),
        }
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// On disk the map is `{ provider: { model: config } }`.
mod nested_model_configs {
    use super::*;

    type Nested = BTreeMap<ProviderId, BTreeMap<String, GenerationConfig>>;

    pub fn serialize<S>(
        configs: &BTreeMap<ModelKey, GenerationConfig>,
        serializer: S,
    ) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut nested: BTreeMap<ProviderId, BTreeMap<&str, &GenerationConfig>> = BTreeMap::new();
        for (key, config) in configs {
            nested
                .entry(key.provider)
                .or_default()
                .insert(key.model.as_str(), config);
        }
        nested.serialize(serializer)
    }

    pub fn deserialize<'de, D>(
        deserializer: D,
    ) -> Result<BTreeMap<ModelKey, GenerationConfig>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let nested: Nested = null_as_default(deserializer)?;
        Ok(nested
            .into_iter()
            .flat_map(|(provider, models)| {
                models
                    .into_iter()
                    .map(move |(model, config)| (ModelKey::new(provider, model), config))
            })
            .collect())
    }
}
