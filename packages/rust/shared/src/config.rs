//! Application configuration for the HR assistant.
//!
//! User config lives at `~/.rhassistant/rhassistant.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{AssistantError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "rhassistant.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".rhassistant";

// ---------------------------------------------------------------------------
// Config structs (matching rhassistant.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub knowledge: KnowledgeConfig,

    #[serde(default)]
    pub llm: LlmConfig,

    #[serde(default)]
    pub facts: FactsConfig,
}

/// `[storage]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// libSQL database file. Defaults to `~/.rhassistant/rhassistant.db`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub db_path: Option<String>,
}

/// Where cached chat responses live.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    /// Expiring entries in the libSQL database.
    #[default]
    Storage,
    /// In-process map: entries never expire.
    Memory,
}

/// `[cache]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default)]
    pub backend: CacheBackend,

    /// Entry lifetime for the storage backend.
    #[serde(default = "default_cache_ttl")]
    pub ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: CacheBackend::default(),
            ttl_secs: default_cache_ttl(),
        }
    }
}

fn default_cache_ttl() -> u64 {
    3600
}

/// Which retriever answers knowledge lookups.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KnowledgeBackend {
    /// Keyword search over the curated FAQ/policy corpus.
    #[default]
    Corpus,
    /// Semantic search over ingested documents.
    Index,
}

/// `[knowledge]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeConfig {
    #[serde(default)]
    pub backend: KnowledgeBackend,

    /// JSON corpus replacing the built-in CDG data.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub corpus_path: Option<String>,

    /// Number of candidates requested from the vector index.
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Dimension of the hashed embeddings stored in the index.
    #[serde(default = "default_embedding_dim")]
    pub embedding_dim: usize,
}

impl Default for KnowledgeConfig {
    fn default() -> Self {
        Self {
            backend: KnowledgeBackend::default(),
            corpus_path: None,
            top_k: default_top_k(),
            embedding_dim: default_embedding_dim(),
        }
    }
}

fn default_top_k() -> usize {
    5
}
fn default_embedding_dim() -> usize {
    384
}

/// `[llm]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// When false, the templated composition is the final answer.
    #[serde(default)]
    pub enabled: bool,

    /// OpenAI-compatible API root.
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,

    #[serde(default = "default_llm_model")]
    pub model: String,

    /// Name of the env var holding the API key (never store the key itself).
    #[serde(default = "default_llm_api_key_env")]
    pub api_key_env: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            base_url: default_llm_base_url(),
            model: default_llm_model(),
            api_key_env: default_llm_api_key_env(),
            temperature: default_temperature(),
            timeout_secs: default_llm_timeout(),
        }
    }
}

fn default_llm_base_url() -> String {
    "https://api.openai.com/v1".into()
}
fn default_llm_model() -> String {
    "gpt-4".into()
}
fn default_llm_api_key_env() -> String {
    "OPENAI_API_KEY".into()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_llm_timeout() -> u64 {
    30
}

/// `[facts]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FactsConfig {
    /// City used for weather lookups.
    #[serde(default = "default_city")]
    pub default_city: String,

    /// Env var with the OpenWeatherMap key. Unset ⇒ built-in reference data.
    #[serde(default = "default_weather_key_env")]
    pub weather_api_key_env: String,

    /// Env var with the Fixer key. Unset ⇒ built-in reference data.
    #[serde(default = "default_currency_key_env")]
    pub currency_api_key_env: String,

    #[serde(default = "default_weather_base_url")]
    pub weather_base_url: String,

    #[serde(default = "default_currency_base_url")]
    pub currency_base_url: String,

    #[serde(default = "default_facts_timeout")]
    pub timeout_secs: u64,
}

impl Default for FactsConfig {
    fn default() -> Self {
        Self {
            default_city: default_city(),
            weather_api_key_env: default_weather_key_env(),
            currency_api_key_env: default_currency_key_env(),
            weather_base_url: default_weather_base_url(),
            currency_base_url: default_currency_base_url(),
            timeout_secs: default_facts_timeout(),
        }
    }
}

fn default_city() -> String {
    "Rabat".into()
}
fn default_weather_key_env() -> String {
    "OPENWEATHER_API_KEY".into()
}
fn default_currency_key_env() -> String {
    "FIXER_API_KEY".into()
}
fn default_weather_base_url() -> String {
    "http://api.openweathermap.org".into()
}
fn default_currency_base_url() -> String {
    "http://data.fixer.io".into()
}
fn default_facts_timeout() -> u64 {
    10
}

impl AppConfig {
    /// Resolved database path (config value or the default under the config dir).
    pub fn db_path(&self) -> Result<PathBuf> {
        match &self.storage.db_path {
            Some(p) => Ok(PathBuf::from(p)),
            None => Ok(config_dir()?.join("rhassistant.db")),
        }
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.rhassistant/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| AssistantError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.rhassistant/rhassistant.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| AssistantError::io(path, e))?;

    toml::from_str(&content).map_err(|e| {
        AssistantError::config(format!("failed to parse {}: {e}", path.display()))
    })
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| AssistantError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| AssistantError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| AssistantError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Read a secret from the env var named `var_name`; empty counts as unset.
pub fn read_secret_env(var_name: &str) -> Option<String> {
    match std::env::var(var_name) {
        Ok(val) if !val.trim().is_empty() => Some(val),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("ttl_secs = 3600"));
        assert!(toml_str.contains("OPENAI_API_KEY"));
        assert!(!toml_str.contains("db_path"));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.cache.ttl_secs, 3600);
        assert_eq!(parsed.facts.default_city, "Rabat");
        assert!(!parsed.llm.enabled);
    }

    #[test]
    fn partial_config_fills_defaults() {
        let toml_str = r#"
[cache]
backend = "memory"

[knowledge]
backend = "index"
top_k = 3

[llm]
enabled = true
model = "gpt-4o-mini"
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.cache.backend, CacheBackend::Memory);
        assert_eq!(config.cache.ttl_secs, 3600);
        assert_eq!(config.knowledge.backend, KnowledgeBackend::Index);
        assert_eq!(config.knowledge.top_k, 3);
        assert_eq!(config.knowledge.embedding_dim, 384);
        assert!(config.llm.enabled);
        assert_eq!(config.llm.api_key_env, "OPENAI_API_KEY");
    }

    #[test]
    fn explicit_db_path_wins() {
        let mut config = AppConfig::default();
        config.storage.db_path = Some("/tmp/hr.db".into());
        assert_eq!(config.db_path().unwrap(), PathBuf::from("/tmp/hr.db"));
    }

    #[test]
    fn missing_secret_env_is_none() {
        // Use a unique env var name to avoid interfering with other tests
        assert!(read_secret_env("RHA_TEST_NONEXISTENT_KEY_12345").is_none());
    }
}
