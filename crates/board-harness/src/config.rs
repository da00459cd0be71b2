//! TOML configuration.
//!
//! Every section is optional; missing keys fall back to the defaults below.
//! See `config/board.example.toml` for an annotated file.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub snapshot: SnapshotConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Board used when a tool call omits `board_id`.
    #[serde(default)]
    pub board_id: Option<String>,
    #[serde(default = "default_token_env")]
    pub token_env: String,
    /// Inline token; takes precedence over `token_env`.
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            board_id: None,
            token_env: default_token_env(),
            token: None,
            page_size: default_page_size(),
            timeout_secs: default_timeout_secs(),
            max_concurrency: default_max_concurrency(),
        }
    }
}

fn default_base_url() -> String {
    "https://api.miro.com".to_string()
}
fn default_token_env() -> String {
    "MIRO_ACCESS_TOKEN".to_string()
}
fn default_page_size() -> usize {
    50
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_max_concurrency() -> usize {
    8
}

impl ApiConfig {
    /// The bearer token: inline `token`, else the `token_env` variable.
    pub fn resolve_token(&self) -> Result<String> {
        if let Some(token) = self.token.as_deref().filter(|t| !t.trim().is_empty()) {
            return Ok(token.to_string());
        }
        match std::env::var(&self.token_env) {
            Ok(token) if !token.trim().is_empty() => Ok(token),
            _ => bail!(
                "no API token: set api.token or the {} environment variable",
                self.token_env
            ),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:7340".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct SnapshotConfig {
    /// Default listing cap for snapshots, 0 for unlimited.
    #[serde(default)]
    pub max_items: usize,
    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,
    #[serde(default = "default_depth")]
    pub default_depth: usize,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            max_items: 0,
            history_capacity: default_history_capacity(),
            default_depth: default_depth(),
        }
    }
}

fn default_history_capacity() -> usize {
    20
}
fn default_depth() -> usize {
    3
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_filter")]
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_filter(),
        }
    }
}

fn default_filter() -> String {
    "info".to_string()
}

impl Config {
    /// Defaults only, for commands run without a config file.
    pub fn minimal() -> Self {
        Self::default()
    }
}

fn validate(config: &Config) -> Result<()> {
    let api = &config.api;
    if !(api.base_url.starts_with("http://") || api.base_url.starts_with("https://")) {
        bail!(
            "api.base_url must start with http:// or https://, got '{}'",
            api.base_url
        );
    }
    if !(10..=50).contains(&api.page_size) {
        bail!("api.page_size must be between 10 and 50, got {}", api.page_size);
    }
    if api.max_concurrency < 1 {
        bail!("api.max_concurrency must be >= 1");
    }
    if config.snapshot.history_capacity < 1 {
        bail!("snapshot.history_capacity must be >= 1");
    }
    if !(1..=10).contains(&config.snapshot.default_depth) {
        bail!(
            "snapshot.default_depth must be between 1 and 10, got {}",
            config.snapshot.default_depth
        );
    }
    Ok(())
}

pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config(&content)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_uses_defaults() {
        let cfg = parse_config("").unwrap();
        assert_eq!(cfg.api.base_url, "https://api.miro.com");
        assert_eq!(cfg.api.page_size, 50);
        assert_eq!(cfg.api.max_concurrency, 8);
        assert_eq!(cfg.server.bind, "127.0.0.1:7340");
        assert_eq!(cfg.snapshot.history_capacity, 20);
        assert_eq!(cfg.snapshot.default_depth, 3);
        assert_eq!(cfg.logging.filter, "info");
    }

    #[test]
    fn test_page_size_bounds() {
        assert!(parse_config("[api]\npage_size = 5\n").is_err());
        assert!(parse_config("[api]\npage_size = 51\n").is_err());
        assert!(parse_config("[api]\npage_size = 10\n").is_ok());
    }

    #[test]
    fn test_depth_and_capacity_bounds() {
        assert!(parse_config("[snapshot]\ndefault_depth = 0\n").is_err());
        assert!(parse_config("[snapshot]\ndefault_depth = 11\n").is_err());
        assert!(parse_config("[snapshot]\nhistory_capacity = 0\n").is_err());
        assert!(parse_config("[api]\nmax_concurrency = 0\n").is_err());
    }

    #[test]
    fn test_base_url_scheme() {
        let err = parse_config("[api]\nbase_url = \"ftp://x\"\n").unwrap_err();
        assert!(err.to_string().contains("base_url"));
    }

    #[test]
    fn test_inline_token_wins() {
        let cfg = parse_config("[api]\ntoken = \"abc\"\ntoken_env = \"BOARD_HARNESS_UNSET_VAR\"\n").unwrap();
        assert_eq!(cfg.api.resolve_token().unwrap(), "abc");
    }

    #[test]
    fn test_missing_token_names_env_var() {
        let cfg = parse_config("[api]\ntoken_env = \"BOARD_HARNESS_SURELY_UNSET\"\n").unwrap();
        let err = cfg.api.resolve_token().unwrap_err();
        assert!(err.to_string().contains("BOARD_HARNESS_SURELY_UNSET"));
    }
}
