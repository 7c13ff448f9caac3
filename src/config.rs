//! TOML configuration.
//!
//! Layered: an explicit path, then the `TRAFFICMEDIC_CONFIG` environment
//! variable, then `/etc/trafficmedic/trafficmedic.toml`, then compiled-in
//! defaults. Every section may be omitted.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::analysis::{AnalysisOptions, AnalysisOverrides, AnalysisSession};

pub const CONFIG_ENV: &str = "TRAFFICMEDIC_CONFIG";
pub const SYSTEM_CONFIG_PATH: &str = "/etc/trafficmedic/trafficmedic.toml";

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub monitor: MonitorConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from a TOML file at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("failed to parse config file: {}", path.display()))?;
        config.validate()?;
        info!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    /// Resolve configuration for a process.
    ///
    /// An explicit path must load; the environment and system locations
    /// fall through to defaults with a warning.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }

        if let Ok(env_path) = std::env::var(CONFIG_ENV) {
            let path = Path::new(&env_path);
            match Self::load(path) {
                Ok(cfg) => return Ok(cfg),
                Err(e) => {
                    warn!(
                        path = %path.display(),
                        error = %e,
                        "{} set but file could not be loaded, trying fallback",
                        CONFIG_ENV
                    );
                }
            }
        }

        let system_path = Path::new(SYSTEM_CONFIG_PATH);
        if system_path.exists() {
            match Self::load(system_path) {
                Ok(cfg) => return Ok(cfg),
                Err(e) => {
                    warn!(
                        path = %system_path.display(),
                        error = %e,
                        "system config file exists but could not be loaded, using defaults"
                    );
                }
            }
        }

        debug!("no config file found, using compiled-in defaults");
        Ok(Self::default())
    }

    pub fn validate(&self) -> Result<()> {
        if self.monitor.samples == 0 {
            anyhow::bail!("monitor.samples must be at least 1");
        }
        if self.monitor.interval_ms == 0 {
            anyhow::bail!("monitor.interval_ms must be positive");
        }
        for (name, opts) in [
            ("batch", self.analysis.batch_options()),
            ("streaming", self.analysis.streaming_options()),
        ] {
            opts.validate()
                .with_context(|| format!("invalid analysis.{name} options"))?;
        }
        Ok(())
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("failed to serialize configuration")
    }
}

// ---------------------------------------------------------------------------
// Server
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address for the dashboard API.
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8080".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Analysis
// ---------------------------------------------------------------------------

/// Per-context analysis settings; unset keys keep the context default.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub batch: AnalysisOverrides,
    pub streaming: AnalysisOverrides,
}

impl AnalysisConfig {
    pub fn batch_options(&self) -> AnalysisOptions {
        self.batch.apply(AnalysisOptions::batch())
    }

    pub fn streaming_options(&self) -> AnalysisOptions {
        self.streaming.apply(AnalysisOptions::streaming())
    }

    pub fn session(&self) -> AnalysisSession {
        AnalysisSession::new(self.batch_options(), self.streaming_options())
    }
}

// ---------------------------------------------------------------------------
// Monitor
// ---------------------------------------------------------------------------

/// Live traffic sampling.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Interface counters file.
    pub counters_path: PathBuf,
    /// Interfaces left out of the byte totals.
    pub exclude_interfaces: Vec<String>,
    /// Samples per monitoring run.
    pub samples: usize,
    /// Milliseconds between samples.
    pub interval_ms: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            counters_path: PathBuf::from("/proc/net/dev"),
            exclude_interfaces: vec!["lo".to_string()],
            samples: 15,
            interval_ms: 1000,
        }
    }
}

// ---------------------------------------------------------------------------
// Logging
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default tracing filter when `RUST_LOG` is unset.
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
