//! TOML configuration for nodewatch.
//!
//! Layered: compiled-in defaults, then an optional config file, then
//! environment overrides, then CLI flags (applied by the binary).

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::nodes::{NodeDescriptor, NodeRegistry};
use crate::probes::http::{default_user_agent, FetchSettings};

/// Config file path override.
pub const ENV_CONFIG: &str = "NODEWATCH_CONFIG";
/// Target URL override.
pub const ENV_URL: &str = "NODEWATCH_URL";
/// History file override.
pub const ENV_HISTORY: &str = "NODEWATCH_HISTORY";

const LOCAL_CONFIG: &str = "nodewatch.toml";

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProbeConfig {
    #[serde(default)]
    pub target: TargetConfig,
    #[serde(default)]
    pub history: HistoryConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Extra or overriding entries for the node registry.
    #[serde(default)]
    pub nodes: Vec<NodeDescriptor>,
}

impl ProbeConfig {
    /// Load configuration from a TOML file at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("failed to parse config file: {}", path.display()))?;
        info!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    /// Resolve the config file and apply environment overrides.
    ///
    /// An explicit `path` must load. Otherwise `NODEWATCH_CONFIG` is tried,
    /// then `./nodewatch.toml`, then compiled-in defaults.
    pub fn resolve(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(p) => Self::load(p)?,
            None => Self::load_or_default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    fn load_or_default() -> Self {
        if let Ok(env_path) = std::env::var(ENV_CONFIG) {
            let path = Path::new(&env_path);
            match Self::load(path) {
                Ok(cfg) => return cfg,
                Err(e) => {
                    warn!(
                        path = %path.display(),
                        error = %e,
                        "NODEWATCH_CONFIG set but file could not be loaded, trying fallback"
                    );
                }
            }
        }

        let local = Path::new(LOCAL_CONFIG);
        if local.exists() {
            match Self::load(local) {
                Ok(cfg) => return cfg,
                Err(e) => {
                    warn!(path = %local.display(), error = %e, "local config could not be loaded, using defaults");
                }
            }
        }

        debug!("no config file found, using compiled-in defaults");
        Self::default()
    }

    /// Apply `NODEWATCH_URL` / `NODEWATCH_HISTORY` from `lookup`.
    /// Empty values are ignored.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = non_empty(ENV_URL) {
            debug!(%url, "target url from environment");
            self.target.url = url;
        }
        if let Some(path) = non_empty(ENV_HISTORY) {
            debug!(%path, "history path from environment");
            self.history.path = PathBuf::from(path);
        }
    }

    pub fn fetch_settings(&self) -> FetchSettings {
        FetchSettings {
            timeout: Duration::from_secs(self.target.timeout_sec),
            max_redirects: self.target.max_redirects,
            user_agent: self.target.user_agent.clone(),
        }
    }

    pub fn registry(&self) -> NodeRegistry {
        NodeRegistry::builtin().with_nodes(self.nodes.iter().cloned())
    }
}

// ---------------------------------------------------------------------------
// Target
// ---------------------------------------------------------------------------

/// The page to probe and how to fetch it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetConfig {
    pub url: String,
    /// Per-hop request timeout (seconds).
    pub timeout_sec: u64,
    /// Redirect hops followed before the fetch fails.
    pub max_redirects: usize,
    pub user_agent: String,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            url: "https://webgate.ec.europa.eu/cas/".to_string(),
            timeout_sec: 15,
            max_redirects: 5,
            user_agent: default_user_agent(),
        }
    }
}

// ---------------------------------------------------------------------------
// History
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// JSON history document, created on first write.
    pub path: PathBuf,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("data/rotation-history.json"),
        }
    }
}

// ---------------------------------------------------------------------------
// Logging
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Minimum tracing level when `RUST_LOG` is unset.
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
