//! Canonical [`GenerationConfig`] to per-backend parameter blocks.
//!
//! Each mapper emits only the fields its backend understands. A zero top-k or
//! context size and an empty stop list count as "unset" and are left out of
//! the payload entirely.

use serde::Serialize;

use crate::config::GenerationConfig;

/// Anthropic rejects requests without `max_tokens`.
pub const ANTHROPIC_DEFAULT_MAX_TOKENS: u32 = 4096;

fn positive(value: u32) -> Option<u32> {
    (value > 0).then_some(value)
}

fn is_empty(stop: &[String]) -> bool {
    stop.is_empty()
}

/// Ollama `options` object.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OllamaOptions {
    pub temperature: f64,
    pub top_p: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_k: Option<u32>,
    pub repeat_penalty: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_ctx: Option<u32>,
    #[serde(skip_serializing_if = "is_empty")]
    pub stop: Vec<String>,
}

pub fn ollama_options(config: &GenerationConfig) -> OllamaOptions {
    OllamaOptions {
        temperature: config.temperature,
        top_p: config.top_p,
        top_k: positive(config.top_k),
        repeat_penalty: config.repeat_penalty,
        num_ctx: positive(config.context_size),
        stop: config.stop_sequences.clone(),
    }
}

/// Sampling fields of an OpenAI-style chat request (LM Studio and OpenAI).
/// OpenAI has no top-k.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OpenAiSampling {
    pub temperature: f64,
    pub top_p: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "is_empty")]
    pub stop: Vec<String>,
}

pub fn openai_sampling(config: &GenerationConfig) -> OpenAiSampling {
    OpenAiSampling {
        temperature: config.temperature,
        top_p: config.top_p,
        max_tokens: positive(config.context_size),
        stop: config.stop_sequences.clone(),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnthropicSampling {
    pub max_tokens: u32,
    pub temperature: f64,
    pub top_p: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_k: Option<u32>,
    #[serde(skip_serializing_if = "is_empty")]
    pub stop_sequences: Vec<String>,
}

pub fn anthropic_sampling(config: &GenerationConfig) -> AnthropicSampling {
    AnthropicSampling {
        max_tokens: positive(config.context_size).unwrap_or(ANTHROPIC_DEFAULT_MAX_TOKENS),
        temperature: config.temperature,
        top_p: config.top_p,
        top_k: positive(config.top_k),
        stop_sequences: config.stop_sequences.clone(),
    }
}

/// Gemini `generationConfig` sub-object.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiGenerationConfig {
    pub temperature: f64,
    pub top_p: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_k: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<u32>,
    #[serde(skip_serializing_if = "is_empty")]
    pub stop_sequences: Vec<String>,
}

pub fn gemini_generation_config(config: &GenerationConfig) -> GeminiGenerationConfig {
    GeminiGenerationConfig {
        temperature: config.temperature,
        top_p: config.top_p,
        top_k: positive(config.top_k),
        max_output_tokens: positive(config.context_size),
        stop_sequences: config.stop_sequences.clone(),
    }
}
