//! Configuration management for sumo-source
//!
//! This module loads the Sumo Logic API settings (`sumologic.{yml,yaml,json,toml}`)
//! and the source task files from the configuration directory.

use crate::apply::ApplyConfig;
use crate::sumologic::{DEFAULT_API_ENDPOINT, DEFAULT_REQUEST_TIMEOUT};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Base name of the API settings file
pub const SUMO_CONFIG_NAME: &str = "sumologic";

/// Environment variable overriding the API username (access id)
pub const ENV_USERNAME: &str = "SUMOLOGIC_USERNAME";
/// Environment variable overriding the API password (access key)
pub const ENV_PASSWORD: &str = "SUMOLOGIC_PASSWORD";
/// Environment variable overriding the API endpoint
pub const ENV_API_ENDPOINT: &str = "SUMOLOGIC_API_ENDPOINT";

const SUPPORTED_EXTENSIONS: [&str; 4] = ["yml", "yaml", "json", "toml"];

/// Sumo Logic API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SumoConfig {
    /// Skip every source task without contacting the API
    #[serde(default)]
    pub disabled: bool,
    /// API access id
    #[serde(default, alias = "userID", alias = "access_id")]
    pub username: String,
    /// API access key
    #[serde(default, alias = "access_key")]
    pub password: String,
    /// Base URL of the API
    #[serde(default = "default_api_endpoint")]
    pub api_endpoint: String,
    /// Page size requested when listing collectors
    #[serde(default)]
    pub api_collectors_limit: Option<u32>,
    /// Collector to manage (defaults to the host name)
    #[serde(default)]
    pub collector_name: Option<String>,
    /// Also match `<name>-<13 digit timestamp>` collectors
    #[serde(default)]
    pub match_timestamped_names: bool,
    /// Retry budget in seconds for read requests (no retry when unset)
    #[serde(default)]
    pub timeout: Option<u64>,
    /// Timeout in seconds for a single HTTP attempt
    #[serde(default = "default_request_timeout")]
    pub request_timeout: u64,
}

/// Default API endpoint
pub fn default_api_endpoint() -> String {
    DEFAULT_API_ENDPOINT.to_string()
}

/// Default per-attempt timeout (30 seconds)
pub fn default_request_timeout() -> u64 {
    DEFAULT_REQUEST_TIMEOUT.as_secs()
}

impl Default for SumoConfig {
    fn default() -> Self {
        Self {
            disabled: false,
            username: String::new(),
            password: String::new(),
            api_endpoint: default_api_endpoint(),
            api_collectors_limit: None,
            collector_name: None,
            match_timestamped_names: false,
            timeout: None,
            request_timeout: default_request_timeout(),
        }
    }
}

impl SumoConfig {
    /// Apply `SUMOLOGIC_*` environment overrides
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    fn apply_overrides_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(username) = lookup(ENV_USERNAME) {
            self.username = username;
        }
        if let Some(password) = lookup(ENV_PASSWORD) {
            self.password = password;
        }
        if let Some(endpoint) = lookup(ENV_API_ENDPOINT) {
            self.api_endpoint = endpoint;
        }
    }

    /// Check that the settings are usable for API calls
    pub fn validate(&self) -> Result<()> {
        if self.disabled {
            return Ok(());
        }
        if self.username.is_empty() {
            anyhow::bail!(
                "Sumo Logic username is not configured (set `username` or {})",
                ENV_USERNAME
            );
        }
        if self.password.is_empty() {
            anyhow::bail!(
                "Sumo Logic password is not configured (set `password` or {})",
                ENV_PASSWORD
            );
        }
        if self.api_endpoint.is_empty() {
            anyhow::bail!("Sumo Logic api_endpoint cannot be empty");
        }
        if self.request_timeout == 0 {
            anyhow::bail!("request_timeout must be greater than zero");
        }
        if self.timeout == Some(0) {
            anyhow::bail!("timeout must be greater than zero");
        }
        Ok(())
    }

    /// Name of the collector to manage
    pub fn resolve_collector_name(&self) -> Result<String> {
        if let Some(name) = &self.collector_name {
            return Ok(name.clone());
        }

        hostname::get()
            .context("Failed to determine host name for collector")?
            .into_string()
            .map_err(|name| anyhow::anyhow!("Host name is not valid UTF-8: {:?}", name))
    }
}

/// Load the Sumo Logic settings from the config directory.
///
/// Missing files yield the defaults; environment overrides are applied last.
pub fn load_sumo_config(config_dir: &Path) -> Result<SumoConfig> {
    let mut config = match find_sumo_config_file(config_dir) {
        Some(path) => {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            parse_config_file(&path, &contents)?
        }
        None => SumoConfig::default(),
    };

    config.apply_env_overrides();
    Ok(config)
}

fn find_sumo_config_file(config_dir: &Path) -> Option<PathBuf> {
    SUPPORTED_EXTENSIONS
        .iter()
        .map(|ext| config_dir.join(format!("{}.{}", SUMO_CONFIG_NAME, ext)))
        .find(|path| path.is_file())
}

fn parse_config_file<T: serde::de::DeserializeOwned>(path: &Path, contents: &str) -> Result<T> {
    let parsed = match path.extension().and_then(|s| s.to_str()) {
        Some("json") => serde_json::from_str(contents)
            .with_context(|| format!("Invalid JSON in {}", path.display()))?,
        Some("toml") => toml::from_str(contents)
            .with_context(|| format!("Invalid TOML in {}", path.display()))?,
        Some("yaml") | Some("yml") => serde_yaml::from_str(contents)
            .with_context(|| format!("Invalid YAML in {}", path.display()))?,
        _ => {
            return Err(anyhow::anyhow!(
                "Unsupported config file format: {}",
                path.display()
            ))
        }
    };
    Ok(parsed)
}

/// Load and merge every source task file in the config directory
pub fn load_apply_config(config_dir: &Path) -> Result<ApplyConfig> {
    let files = find_config_files(config_dir, "sources")?;

    if files.is_empty() {
        return Err(anyhow::anyhow!(
            "No source configuration files found in {}",
            config_dir.display()
        ));
    }

    let mut merged = ApplyConfig::default();
    for path in &files {
        tracing::debug!("Loading source config from: {}", path.display());

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config: ApplyConfig = parse_config_file(path, &contents)?;
        merged.merge(config);
    }

    tracing::debug!(
        "Loaded {} source tasks from {} files",
        merged.tasks.len(),
        files.len()
    );
    Ok(merged)
}

/// Find task files, `{prefix}.*` first and the rest by name.
///
/// The API settings file, hidden files and backups are skipped.
fn find_config_files(config_dir: &Path, prefix: &str) -> Result<Vec<PathBuf>> {
    if !config_dir.exists() {
        return Err(anyhow::anyhow!(
            "Config directory does not exist: {}",
            config_dir.display()
        ));
    }

    let mut config_files = Vec::new();
    for entry in fs::read_dir(config_dir)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }

        let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if file_name.ends_with(".bak")
            || file_name.starts_with('.')
            || file_name.starts_with(&format!("{}.", SUMO_CONFIG_NAME))
        {
            continue;
        }

        let supported = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|ext| SUPPORTED_EXTENSIONS.contains(&ext))
            .unwrap_or(false);
        if supported {
            config_files.push(path);
        }
    }

    let prefix = format!("{}.", prefix);
    config_files.sort_by(|a, b| {
        let a_name = a.file_name().and_then(|n| n.to_str()).unwrap_or("");
        let b_name = b.file_name().and_then(|n| n.to_str()).unwrap_or("");
        let a_is_prefix = a_name.starts_with(&prefix);
        let b_is_prefix = b_name.starts_with(&prefix);

        b_is_prefix.cmp(&a_is_prefix).then_with(|| a_name.cmp(b_name))
    });

    Ok(config_files)
}
