//! TOML configuration.
//!
//! Every section is optional; a missing file at the default path yields
//! [`Config::default`]. The contents-API credential is never read from
//! this file: `github.token_env` names the environment variable that
//! holds it.
//!
//! ```toml
//! [classify]
//! text_extensions = ["txt", "md", "rs"]
//!
//! [local]
//! follow_symlinks = false
//! exclude_globs = ["**/.git/**"]
//!
//! [github]
//! api_base = "https://api.github.com"
//! token_env = "GITHUB_TOKEN"
//! max_retries = 3
//! max_concurrent_downloads = 4
//!
//! [backend]
//! url = "http://localhost:8000"
//! model_id = "ibm/granite-3-8b-instruct"
//! ```

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

use crate::classify::{TextClassifier, DEFAULT_TEXT_EXTENSIONS};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub classify: ClassifyConfig,
    #[serde(default)]
    pub local: LocalConfig,
    #[serde(default)]
    pub github: GithubConfig,
    #[serde(default)]
    pub backend: BackendConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ClassifyConfig {
    #[serde(default = "default_text_extensions")]
    pub text_extensions: Vec<String>,
}

impl Default for ClassifyConfig {
    fn default() -> Self {
        Self {
            text_extensions: default_text_extensions(),
        }
    }
}

fn default_text_extensions() -> Vec<String> {
    DEFAULT_TEXT_EXTENSIONS.iter().map(|s| s.to_string()).collect()
}

impl ClassifyConfig {
    pub fn classifier(&self) -> TextClassifier {
        TextClassifier::new(&self.text_extensions)
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct LocalConfig {
    #[serde(default)]
    pub follow_symlinks: bool,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GithubConfig {
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_token_env")]
    pub token_env: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default)]
    pub request_interval_ms: u64,
    #[serde(default = "default_max_backoff_secs")]
    pub max_backoff_secs: u64,
    #[serde(default = "default_max_concurrent_downloads")]
    pub max_concurrent_downloads: usize,
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            token_env: default_token_env(),
            user_agent: default_user_agent(),
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            request_interval_ms: 0,
            max_backoff_secs: default_max_backoff_secs(),
            max_concurrent_downloads: default_max_concurrent_downloads(),
        }
    }
}

fn default_api_base() -> String {
    "https://api.github.com".to_string()
}
fn default_token_env() -> String {
    "GITHUB_TOKEN".to_string()
}
fn default_user_agent() -> String {
    format!("codebase-ingest/{}", env!("CARGO_PKG_VERSION"))
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_max_retries() -> u32 {
    3
}
fn default_max_backoff_secs() -> u64 {
    32
}
fn default_max_concurrent_downloads() -> usize {
    4
}

impl GithubConfig {
    /// Read the bearer credential from the configured environment variable.
    ///
    /// Empty values count as unset.
    pub fn token(&self) -> Option<String> {
        std::env::var(&self.token_env)
            .ok()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct BackendConfig {
    #[serde(default = "default_backend_url")]
    pub url: String,
    #[serde(default = "default_model_id")]
    pub model_id: String,
    #[serde(default = "default_backend_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: default_backend_url(),
            model_id: default_model_id(),
            timeout_secs: default_backend_timeout_secs(),
        }
    }
}

fn default_backend_url() -> String {
    "http://localhost:8000".to_string()
}
fn default_model_id() -> String {
    "ibm/granite-3-8b-instruct".to_string()
}
fn default_backend_timeout_secs() -> u64 {
    120
}

/// Load and validate a config file.
///
/// When `required` is false and the file does not exist, defaults are used.
pub fn load_config(path: &Path, required: bool) -> Result<Config> {
    if !required && !path.exists() {
        return Ok(Config::default());
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

pub fn validate(config: &Config) -> Result<()> {
    if config
        .classify
        .text_extensions
        .iter()
        .any(|e| e.trim_start_matches('.').is_empty())
    {
        anyhow::bail!("classify.text_extensions must not contain empty entries");
    }

    let gh = &config.github;
    if gh.token_env.trim().is_empty() {
        anyhow::bail!("github.token_env must name an environment variable");
    }
    if !gh.api_base.starts_with("http://") && !gh.api_base.starts_with("https://") {
        anyhow::bail!("github.api_base must be an http(s) URL, got '{}'", gh.api_base);
    }
    if gh.timeout_secs == 0 {
        anyhow::bail!("github.timeout_secs must be > 0");
    }
    if gh.max_concurrent_downloads == 0 {
        anyhow::bail!("github.max_concurrent_downloads must be >= 1");
    }
    if gh.max_backoff_secs == 0 {
        anyhow::bail!("github.max_backoff_secs must be > 0");
    }

    if config.backend.timeout_secs == 0 {
        anyhow::bail!("backend.timeout_secs must be > 0");
    }

    for pattern in &config.local.exclude_globs {
        globset::Glob::new(pattern)
            .with_context(|| format!("Invalid local.exclude_globs pattern: '{}'", pattern))?;
    }

    Ok(())
}
