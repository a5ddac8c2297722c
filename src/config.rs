//! Configuration types and environment resolution
//!
//! Every setting is looked up through an ordered list of candidate variable
//! names; the first one that is set to a non-empty value wins. This lets the
//! service accept both the platform-provided bucket variables (`BUCKET`,
//! `ACCESS_KEY_ID`, ...) and the legacy `RAILWAY_BUCKET_*` names without a
//! special case per variable.

use crate::error::{BgRemovalError, Result};
use crate::models::ModelSpec;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Candidate environment variable names per setting, in priority order
pub mod env_keys {
    pub const API_KEY: &[&str] = &["API_KEY"];
    pub const BUCKET: &[&str] = &["BUCKET", "RAILWAY_BUCKET_NAME"];
    pub const REGION: &[&str] = &["REGION", "RAILWAY_BUCKET_REGION"];
    pub const ACCESS_KEY_ID: &[&str] = &["ACCESS_KEY_ID", "RAILWAY_BUCKET_ACCESS_KEY"];
    pub const SECRET_ACCESS_KEY: &[&str] = &["SECRET_ACCESS_KEY", "RAILWAY_BUCKET_SECRET_KEY"];
    pub const ENDPOINT: &[&str] = &["ENDPOINT", "RAILWAY_BUCKET_ENDPOINT"];
    pub const PUBLIC_BASE_URL: &[&str] = &["RAILWAY_BUCKET_URL", "RAILWAY_BUCKET_PUBLIC_URL"];
    pub const PRESIGNED_EXPIRY: &[&str] = &["PRESIGNED_URL_EXPIRY_SECONDS"];
    pub const HOST: &[&str] = &["HOST"];
    pub const PORT: &[&str] = &["PORT"];
    pub const MODEL_NAME: &[&str] = &["MODEL_NAME"];
    pub const MODEL_PATH: &[&str] = &["MODEL_PATH"];
    pub const MODEL_HOME: &[&str] = &["U2NET_HOME"];
    pub const BACKEND: &[&str] = &["INFERENCE_BACKEND"];
    pub const EXECUTION_PROVIDER: &[&str] = &["EXECUTION_PROVIDER"];
    pub const THREADS: &[&str] = &["INFERENCE_THREADS"];
}

/// Region used when none is configured or the provider reports `auto`
pub const DEFAULT_REGION: &str = "us-east-1";

/// Default lifetime of presigned URLs (7 days)
pub const DEFAULT_PRESIGNED_EXPIRY: Duration = Duration::from_secs(7 * 24 * 3600);

/// Longest presigned URL lifetime accepted by providers (90 days)
pub const MAX_PRESIGNED_EXPIRY: Duration = Duration::from_secs(90 * 24 * 3600);

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8000;

/// Source of configuration values
pub trait EnvSource {
    fn get(&self, key: &str) -> Option<String>;
}

/// Reads from the process environment
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

impl EnvSource for HashMap<String, String> {
    fn get(&self, key: &str) -> Option<String> {
        HashMap::get(self, key).cloned()
    }
}

/// Resolve a setting from its candidate names; the first non-empty value wins
pub fn resolve(env: &dyn EnvSource, candidates: &[&str]) -> Option<String> {
    candidates
        .iter()
        .filter_map(|key| env.get(key))
        .find(|value| !value.is_empty())
}

fn resolve_parsed<T>(env: &dyn EnvSource, candidates: &[&str]) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let Some(raw) = resolve(env, candidates) else {
        return Ok(None);
    };
    raw.trim().parse::<T>().map(Some).map_err(|e| {
        BgRemovalError::invalid_config(format!(
            "{} has invalid value '{}': {}",
            candidates.first().copied().unwrap_or("setting"),
            raw,
            e
        ))
    })
}

/// Execution provider options for ONNX Runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionProvider {
    /// Auto-detect best available provider (CUDA > `CoreML` > CPU)
    #[default]
    Auto,
    /// CPU execution (always available)
    Cpu,
    /// NVIDIA CUDA GPU acceleration
    Cuda,
    /// Apple Silicon acceleration
    CoreMl,
}

impl std::fmt::Display for ExecutionProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Auto => write!(f, "auto"),
            Self::Cpu => write!(f, "cpu"),
            Self::Cuda => write!(f, "cuda"),
            Self::CoreMl => write!(f, "coreml"),
        }
    }
}

impl FromStr for ExecutionProvider {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "cpu" => Ok(Self::Cpu),
            "cuda" => Ok(Self::Cuda),
            "coreml" => Ok(Self::CoreMl),
            other => Err(format!(
                "unknown execution provider '{other}' (expected auto, cpu, cuda or coreml)"
            )),
        }
    }
}

/// Inference runtime used to run the segmentation model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendType {
    /// ONNX Runtime backend (supports GPU acceleration)
    #[default]
    Onnx,
    /// Tract backend (pure Rust, no external dependencies)
    Tract,
}

impl std::fmt::Display for BackendType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Onnx => write!(f, "onnx"),
            Self::Tract => write!(f, "tract"),
        }
    }
}

impl FromStr for BackendType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "onnx" => Ok(Self::Onnx),
            "tract" => Ok(Self::Tract),
            other => Err(format!("unknown backend '{other}' (expected onnx or tract)")),
        }
    }
}

/// Bucket settings as found in the environment
///
/// Nothing here is required at startup; missing credentials surface as a
/// storage error on the first upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageConfig {
    pub bucket: Option<String>,
    pub region: Option<String>,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub endpoint: Option<String>,
    pub public_base_url: Option<String>,
    pub presigned_expiry: Duration,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            bucket: None,
            region: None,
            access_key_id: None,
            secret_access_key: None,
            endpoint: None,
            public_base_url: None,
            presigned_expiry: DEFAULT_PRESIGNED_EXPIRY,
        }
    }
}

impl StorageConfig {
    /// Resolve storage settings from the given source
    ///
    /// # Errors
    /// - `PRESIGNED_URL_EXPIRY_SECONDS` is not a number
    pub fn from_source(env: &dyn EnvSource) -> Result<Self> {
        let presigned_expiry = resolve_parsed::<u64>(env, env_keys::PRESIGNED_EXPIRY)?
            .map_or(DEFAULT_PRESIGNED_EXPIRY, Duration::from_secs);

        Ok(Self {
            bucket: resolve(env, env_keys::BUCKET),
            region: resolve(env, env_keys::REGION),
            access_key_id: resolve(env, env_keys::ACCESS_KEY_ID),
            secret_access_key: resolve(env, env_keys::SECRET_ACCESS_KEY),
            endpoint: resolve(env, env_keys::ENDPOINT),
            public_base_url: resolve(env, env_keys::PUBLIC_BASE_URL),
            presigned_expiry,
        })
    }

    /// Concrete region for the S3 client; `auto` or absent maps to the default
    #[must_use]
    pub fn effective_region(&self) -> &str {
        match self.region.as_deref() {
            None | Some("auto") => DEFAULT_REGION,
            Some(region) => region,
        }
    }

    /// Presigned URL lifetime clamped to what providers accept
    #[must_use]
    pub fn effective_presigned_expiry(&self) -> Duration {
        self.presigned_expiry
            .clamp(Duration::from_secs(1), MAX_PRESIGNED_EXPIRY)
    }

    /// Whether bucket name and both keys are present
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.bucket.is_some() && self.access_key_id.is_some() && self.secret_access_key.is_some()
    }
}

/// Segmentation model settings
#[derive(Debug, Clone, PartialEq)]
pub struct ModelConfig {
    pub spec: ModelSpec,
    /// Explicit model file; skips the cache and download
    pub model_path: Option<PathBuf>,
    /// Cache directory override
    pub model_home: Option<PathBuf>,
    pub backend_type: BackendType,
    pub execution_provider: ExecutionProvider,
    /// Number of intra-op threads (0 = auto)
    pub intra_threads: usize,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            spec: ModelSpec::default(),
            model_path: None,
            model_home: None,
            backend_type: BackendType::default(),
            execution_provider: ExecutionProvider::default(),
            intra_threads: 0,
        }
    }
}

impl ModelConfig {
    /// Resolve model settings from the given source
    ///
    /// # Errors
    /// - Unknown model name, backend or execution provider
    /// - Non-numeric thread count
    pub fn from_source(env: &dyn EnvSource) -> Result<Self> {
        let spec = match resolve(env, env_keys::MODEL_NAME) {
            Some(name) => ModelSpec::by_name(name.trim())?,
            None => ModelSpec::default(),
        };

        Ok(Self {
            spec,
            model_path: resolve(env, env_keys::MODEL_PATH).map(PathBuf::from),
            model_home: resolve(env, env_keys::MODEL_HOME).map(PathBuf::from),
            backend_type: resolve_parsed(env, env_keys::BACKEND)?.unwrap_or_default(),
            execution_provider: resolve_parsed(env, env_keys::EXECUTION_PROVIDER)?
                .unwrap_or_default(),
            intra_threads: resolve_parsed(env, env_keys::THREADS)?.unwrap_or(0),
        })
    }
}

/// Complete service configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub api_key: Option<String>,
    pub storage: StorageConfig,
    pub model: ModelConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            api_key: None,
            storage: StorageConfig::default(),
            model: ModelConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Resolve the configuration from the process environment
    ///
    /// # Errors
    /// See [`ServerConfig::from_source`].
    pub fn from_env() -> Result<Self> {
        Self::from_source(&ProcessEnv)
    }

    /// Resolve the configuration from an arbitrary source
    ///
    /// # Errors
    /// - `PORT` is not a valid port number
    /// - Invalid storage or model settings
    pub fn from_source(env: &dyn EnvSource) -> Result<Self> {
        Ok(Self {
            host: resolve(env, env_keys::HOST).unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port: resolve_parsed(env, env_keys::PORT)?.unwrap_or(DEFAULT_PORT),
            api_key: resolve(env, env_keys::API_KEY),
            storage: StorageConfig::from_source(env)?,
            model: ModelConfig::from_source(env)?,
        })
    }

    /// Socket address string to bind
    #[must_use]
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
