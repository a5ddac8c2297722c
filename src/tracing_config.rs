//! Tracing subscriber setup for the server binary
//!
//! The library only emits events; the binary decides where they go.
//! `RUST_LOG` overrides the verbosity flag when set.

use std::str::FromStr;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

/// Output format for log lines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TracingFormat {
    /// Human-readable output with colors
    #[default]
    Console,
    /// Plain compact output for CI and log collectors without ANSI support
    Compact,
    /// JSON structured logging
    #[cfg(feature = "tracing-json")]
    Json,
}

impl FromStr for TracingFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "console" => Ok(Self::Console),
            "compact" => Ok(Self::Compact),
            #[cfg(feature = "tracing-json")]
            "json" => Ok(Self::Json),
            #[cfg(not(feature = "tracing-json"))]
            "json" => Err("json logging requires the `tracing-json` feature".to_string()),
            other => Err(format!(
                "unknown log format '{other}' (expected console, compact or json)"
            )),
        }
    }
}

/// Tracing configuration builder
#[derive(Debug, Default)]
pub struct TracingConfig {
    /// Verbosity level from repeated `-v`
    pub verbosity: u8,
    pub format: TracingFormat,
    /// Explicit filter directive (overrides verbosity and `RUST_LOG`)
    pub env_filter: Option<String>,
}

impl TracingConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_verbosity(mut self, verbosity: u8) -> Self {
        self.verbosity = verbosity;
        self
    }

    #[must_use]
    pub fn with_format(mut self, format: TracingFormat) -> Self {
        self.format = format;
        self
    }

    #[must_use]
    pub fn with_env_filter<S: Into<String>>(mut self, filter: S) -> Self {
        self.env_filter = Some(filter.into());
        self
    }

    /// Filter directive for the configured verbosity
    #[must_use]
    pub fn verbosity_to_filter(&self) -> &'static str {
        match self.verbosity {
            0 => "info,ort=warn,tract_onnx=warn",
            1 => "debug,ort=info,hyper=info,h2=info,rustls=info",
            _ => "trace",
        }
    }

    fn build_filter(&self) -> anyhow::Result<EnvFilter> {
        if let Some(directive) = &self.env_filter {
            return Ok(EnvFilter::try_new(directive)?);
        }
        if std::env::var_os(EnvFilter::DEFAULT_ENV).is_some() {
            if let Ok(filter) = EnvFilter::try_from_default_env() {
                return Ok(filter);
            }
        }
        Ok(EnvFilter::try_new(self.verbosity_to_filter())?)
    }

    /// Install the global subscriber
    ///
    /// `log` records from the model backends are forwarded through the
    /// subscriber's `tracing-log` bridge.
    ///
    /// # Errors
    /// - Invalid filter directive
    /// - A global subscriber is already installed
    pub fn init(self) -> anyhow::Result<()> {
        let registry = Registry::default().with(self.build_filter()?);

        match self.format {
            TracingFormat::Console => {
                let fmt_layer = fmt::layer().with_ansi(true).with_target(false).compact();
                registry.with(fmt_layer).try_init()?;
            },
            TracingFormat::Compact => {
                let fmt_layer = fmt::layer().with_ansi(false).with_target(true).compact();
                registry.with(fmt_layer).try_init()?;
            },
            #[cfg(feature = "tracing-json")]
            TracingFormat::Json => {
                let fmt_layer = fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(true);
                registry.with(fmt_layer).try_init()?;
            },
        }

        Ok(())
    }
}
