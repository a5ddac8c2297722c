//! Command-line entry point for the background removal API server
//!
//! Settings come from the environment (and `.env`); flags given on the
//! command line take precedence.

use crate::{
    auth::Authenticator,
    config::{BackendType, ExecutionProvider, ServerConfig},
    models::{ModelManager, ModelSpec},
    processor::{DefaultBackendFactory, ImageProcessor},
    server::{self, AppState},
    storage::StorageUploader,
    tracing_config::{TracingConfig, TracingFormat},
};
use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Background removal HTTP API server
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(name = "bgremove-api")]
pub struct Cli {
    /// Address to bind [env: HOST, default: 0.0.0.0]
    #[arg(long)]
    pub host: Option<String>,

    /// Port to listen on [env: PORT, default: 8000]
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Model name (u2net, u2netp, isnet-general-use) [env: MODEL_NAME]
    #[arg(short, long)]
    pub model: Option<String>,

    /// Path to a local ONNX model file; skips the cache and download
    #[arg(long, value_name = "PATH")]
    pub model_path: Option<PathBuf>,

    /// Inference backend (onnx, tract)
    #[arg(short, long)]
    pub backend: Option<BackendType>,

    /// ONNX Runtime execution provider (auto, cpu, cuda, coreml)
    #[arg(short, long)]
    pub execution_provider: Option<ExecutionProvider>,

    /// Number of intra-op threads (0 = auto-detect)
    #[arg(short, long)]
    pub threads: Option<usize>,

    /// Load the model before accepting requests
    #[arg(long)]
    pub preload_model: bool,

    /// Download the model into the cache and exit
    #[arg(long)]
    pub only_download: bool,

    /// Show execution provider diagnostics and exit
    #[arg(long)]
    pub show_providers: bool,

    /// List the models that can be selected and exit
    #[arg(long)]
    pub list_models: bool,

    /// Enable verbose logging (-v: DEBUG, -vv: TRACE)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Log output format (console, compact, json)
    #[arg(long, default_value = "console")]
    pub log_format: TracingFormat,
}

impl Cli {
    /// Overlay command-line flags on the environment configuration
    ///
    /// # Errors
    /// - Unknown model name
    pub fn apply(&self, config: &mut ServerConfig) -> Result<()> {
        if let Some(host) = &self.host {
            config.host.clone_from(host);
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(name) = &self.model {
            config.model.spec = ModelSpec::by_name(name)?;
        }
        if let Some(path) = &self.model_path {
            config.model.model_path = Some(path.clone());
        }
        if let Some(backend) = self.backend {
            config.model.backend_type = backend;
        }
        if let Some(provider) = self.execution_provider {
            config.model.execution_provider = provider;
        }
        if let Some(threads) = self.threads {
            config.model.intra_threads = threads;
        }
        Ok(())
    }
}

/// Main entry point for the server binary
pub async fn main() -> Result<()> {
    // Missing .env is fine; real environment variables still apply
    let dotenv = dotenvy::dotenv();

    let cli = Cli::parse();

    TracingConfig::new()
        .with_verbosity(cli.verbose)
        .with_format(cli.log_format)
        .init()
        .context("Failed to initialize tracing subscriber")?;

    if let Ok(path) = dotenv {
        debug!(path = %path.display(), "Loaded environment file");
    }

    if cli.show_providers {
        show_provider_diagnostics();
        return Ok(());
    }

    if cli.list_models {
        list_models();
        return Ok(());
    }

    let mut config = ServerConfig::from_env().context("Invalid configuration")?;
    cli.apply(&mut config)?;

    if cli.only_download {
        let manager = ModelManager::from_config(&config.model)?;
        let path = manager
            .ensure_available()
            .await
            .context("Failed to download model")?;
        println!("{}", path.display());
        return Ok(());
    }

    let authenticator = Authenticator::new(config.api_key.clone());
    if !authenticator.is_configured() {
        warn!("API_KEY is not set; every protected request will be rejected");
    }

    let uploader =
        StorageUploader::new(config.storage.clone()).context("Failed to create storage client")?;
    let processor = ImageProcessor::new(Arc::new(DefaultBackendFactory::new(
        config.model.clone(),
    )));

    if cli.preload_model {
        processor
            .preload()
            .await
            .context("Failed to preload model")?;
    }

    let state = AppState::new(authenticator, processor, uploader)?;

    let address = config.bind_address();
    info!(
        address = %address,
        model = config.model.spec.name,
        backend = %config.model.backend_type,
        "Starting background removal API"
    );

    server::serve(&address, state)
        .await
        .with_context(|| format!("Server error on {address}"))
}

fn show_provider_diagnostics() {
    let cpu_count = std::thread::available_parallelism()
        .map(std::num::NonZero::get)
        .unwrap_or(1);
    println!("System: {cpu_count} CPU cores detected");

    println!("\nBackends:");
    println!("  onnx: ONNX Runtime (default), hardware acceleration");
    println!("  tract: pure Rust, CPU only");

    #[cfg(feature = "onnx")]
    {
        println!("\nONNX Runtime execution providers:");
        for (name, available) in crate::backends::OnnxBackend::list_providers() {
            let status = if available { "available" } else { "not available" };
            println!("  {name}: {status}");
        }
    }
}

fn list_models() {
    let default = ModelSpec::default();
    for name in ModelSpec::AVAILABLE {
        let marker = if *name == default.name { " (default)" } else { "" };
        println!("{name}{marker}");
    }
}
