//! Lumen command-line front end.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use directories::ProjectDirs;
use serde::Serialize;

use lumen_core::api::v1::{self, ApiState};
use lumen_core::config::{BuildInfo, ConfigStore, GenerationConfig};
use lumen_core::connectors::ConnectorRegistry;
use lumen_core::crypto::{CredentialCipher, KEY_ENV_VAR};
use lumen_core::logging::EventLog;
use lumen_core::providers::Endpoints;
use lumen_core::Orchestrator;

/// Talk to local and hosted language models from one place
#[derive(Parser)]
#[command(name = "lumen")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Config file (default: per-user config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Print up to N diagnostic events recorded by this run to stderr.
    /// Events are kept in memory only and do not survive the process.
    #[arg(long, global = true, value_name = "N")]
    events: Option<usize>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Health check
    Ping,

    /// Stored and embedded build metadata
    Info,

    /// List models on a local backend (ollama, lmstudio, huggingface, docker)
    Scan { provider: String },

    /// Probe a backend's discovery endpoint
    Health { provider: String },

    /// Whether the Ollama server answers at all
    OllamaRunning,

    /// Validate a cloud API key and store it (empty key removes it)
    SaveKey { provider: String, key: String },

    /// Store a key without validating it
    SetKey { provider: String, key: String },

    /// Print the stored key
    GetKey { provider: String },

    /// List a cloud provider's models
    Models {
        provider: String,
        /// Use this key instead of the stored one
        #[arg(long, default_value = "")]
        key: String,
    },

    /// Show generation parameters for a model
    GetConfig { provider: String, model: String },

    /// Update generation parameters for a model
    SetConfig {
        provider: String,
        model: String,
        #[arg(long)]
        temperature: Option<f64>,
        #[arg(long)]
        top_p: Option<f64>,
        #[arg(long)]
        top_k: Option<u32>,
        #[arg(long)]
        repeat_penalty: Option<f64>,
        #[arg(long)]
        num_ctx: Option<u32>,
        /// Stop sequence, repeatable
        #[arg(long)]
        stop: Vec<String>,
    },

    /// Send one message and print the reply
    Chat {
        provider: String,
        model: String,
        message: String,
        /// Print the invocation record (timing, outcome) to stderr
        #[arg(long)]
        trace: bool,
    },
}

fn config_path(flag: Option<PathBuf>) -> PathBuf {
    if let Some(path) = flag {
        return path;
    }
    if let Some(proj) = ProjectDirs::from("com", "Lumen", "Lumen") {
        proj.config_dir().join("config.json")
    } else {
        std::env::temp_dir().join("Lumen").join("config.json")
    }
}

fn build_state(config: PathBuf) -> Result<ApiState> {
    let cipher = CredentialCipher::from_env()
        .with_context(|| format!("{KEY_ENV_VAR} must hold a 32-byte key"))?;
    let events = Arc::new(EventLog::new());
    let registry = ConnectorRegistry::new(Endpoints::defaults(), events.clone())?;
    let store = ConfigStore::load(config, &BuildInfo::current(), cipher, events.clone());
    log::debug!("config file: {}", store.path().display());
    Ok(ApiState {
        orchestrator: Orchestrator::new(registry, store, events.clone()),
        events,
    })
}

fn print<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn eprint<T: Serialize>(value: &T) -> Result<()> {
    eprintln!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let state = build_state(config_path(cli.config))?;
    let outcome = run(cli.command, &state).await;
    if let Some(limit) = cli.events {
        eprint(&v1::recent_events(&state, limit))?;
    }
    outcome
}

async fn run(command: Commands, state: &ApiState) -> Result<()> {
    match command {
        Commands::Ping => print(&v1::ping()),
        Commands::Info => print(&v1::app_info(state)),
        Commands::Scan { provider } => print(&v1::scan_local_models(state, &provider).await),
        Commands::Health { provider } => print(&v1::check_provider(state, &provider).await),
        Commands::OllamaRunning => print(&serde_json::json!({
            "running": v1::is_ollama_running(state).await,
        })),
        Commands::SaveKey { provider, key } => {
            v1::test_and_save_api_key(state, &provider, &key)
                .await
                .map_err(|e| anyhow!(e))?;
            println!("API key saved for {provider}");
            Ok(())
        }
        Commands::SetKey { provider, key } => {
            v1::set_api_key(state, &provider, &key)
                .await
                .map_err(|e| anyhow!(e))
        }
        Commands::GetKey { provider } => {
            println!("{}", v1::get_api_key(state, &provider).map_err(|e| anyhow!(e))?);
            Ok(())
        }
        Commands::Models { provider, key } => print(
            &v1::list_cloud_models(state, &provider, &key)
                .await
                .map_err(|e| anyhow!(e))?,
        ),
        Commands::GetConfig { provider, model } => print(
            &v1::get_model_config(state, &provider, &model).map_err(|e| anyhow!(e))?,
        ),
        Commands::SetConfig {
            provider,
            model,
            temperature,
            top_p,
            top_k,
            repeat_penalty,
            num_ctx,
            stop,
        } => {
            let current: GenerationConfig =
                v1::get_model_config(state, &provider, &model).map_err(|e| anyhow!(e))?;
            let updated = GenerationConfig {
                temperature: temperature.unwrap_or(current.temperature),
                top_p: top_p.unwrap_or(current.top_p),
                top_k: top_k.unwrap_or(current.top_k),
                repeat_penalty: repeat_penalty.unwrap_or(current.repeat_penalty),
                context_size: num_ctx.unwrap_or(current.context_size),
                stop_sequences: if stop.is_empty() {
                    current.stop_sequences
                } else {
                    stop
                },
            };
            let status = v1::save_model_config(state, &provider, &model, updated)
                .await
                .map_err(|e| anyhow!(e))?;
            println!("{status}");
            Ok(())
        }
        Commands::Chat {
            provider,
            model,
            message,
            trace,
        } => {
            let reply = v1::chat_with_model(state, &provider, &model, &message).await;
            if trace {
                eprint(&v1::list_ai_events(state, Some(1)))?;
            }
            println!("{}", reply.map_err(|e| anyhow!(e))?);
            Ok(())
        }
    }
}
