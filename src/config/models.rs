//! Configuration data structures for restroute.
//!
//! These types map directly to TOML (also JSON / YAML) configuration files. They are
//! intentionally serde‑friendly and include defaults so that minimal configs remain concise.
use std::{collections::BTreeMap, time::Duration};

use serde::{Deserialize, Serialize};

use crate::adapters::PathOptions;

fn default_cache_enabled() -> bool {
    true
}

fn default_cache_dir() -> String {
    ".restroute".to_string()
}

fn default_cache_ttl() -> String {
    "1h".to_string()
}

/// Persistence of the compiled route table between process starts.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    #[serde(default = "default_cache_enabled")]
    pub enabled: bool,
    /// Directory holding the cache file
    #[serde(default = "default_cache_dir")]
    pub dir: String,
    #[serde(default = "default_cache_ttl")]
    pub ttl: String, // Parsed by humantime, e.g., "30m", "1h"
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: default_cache_enabled(),
            dir: default_cache_dir(),
            ttl: default_cache_ttl(),
        }
    }
}

impl CacheConfig {
    pub fn ttl_duration(&self) -> Result<Duration, humantime::DurationError> {
        humantime::parse_duration(&self.ttl)
    }
}

/// Policy overrides. Fields left out are inherited from the parent.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct PolicyConfig {
    pub content_types: Option<Vec<String>>,
    pub https_only: Option<bool>,
    pub ip_allow: Option<Vec<String>>,
    pub ip_deny: Option<Vec<String>>,
    pub filters: Option<Vec<String>>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ActionConfig {
    pub name: String,
    pub method: String,
    /// Pattern relative to the controller prefix; `<name>` marks a variable
    #[serde(default)]
    pub uri: String,
    /// Regex constraints keyed by variable name
    #[serde(default)]
    pub parameters: BTreeMap<String, String>,
    #[serde(default)]
    pub policy: PolicyConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ControllerConfig {
    pub name: String,
    #[serde(default)]
    pub prefix: String,
    #[serde(default)]
    pub policy: PolicyConfig,
    #[serde(default)]
    pub actions: Vec<ActionConfig>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
pub struct DispatchConfig {
    /// Mount point stripped from request paths
    #[serde(default)]
    pub base_path: String,
    /// Version segment stripped after the base path
    #[serde(default)]
    pub version: Option<String>,
    /// Development mode; disables the route cache
    #[serde(default)]
    pub debug: bool,
    #[serde(default)]
    pub trust_forwarded: bool,
    /// Filter names provided by the host application
    #[serde(default)]
    pub filters: Vec<String>,
    #[serde(default)]
    pub defaults: PolicyConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub controllers: Vec<ControllerConfig>,
}

impl DispatchConfig {
    pub fn path_options(&self) -> PathOptions {
        PathOptions {
            base_path: self.base_path.clone(),
            version: self.version.clone(),
            trust_forwarded: self.trust_forwarded,
        }
    }

    /// Whether the compiled table should be persisted.
    pub fn cache_active(&self) -> bool {
        self.cache.enabled && !self.debug
    }
}
