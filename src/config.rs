use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Application configuration, loaded from a TOML file and overlaid with
/// environment variables. There is no global configuration state; the loaded
/// `Config` is passed explicitly to every component.
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub db: DbConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub search_index: SearchIndexConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store: StoreConfig::default(),
            db: DbConfig::default(),
            server: ServerConfig::default(),
            search_index: SearchIndexConfig::default(),
        }
    }
}

/// Document store settings.
#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    /// Directory holding one `<id>.json` file per collected transcript.
    /// This is also the directory the sync watcher observes.
    #[serde(default = "default_docs_dir")]
    pub docs_dir: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            docs_dir: default_docs_dir(),
        }
    }
}

fn default_docs_dir() -> PathBuf {
    PathBuf::from("./data/raw_json")
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./data/chats.sqlite")
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
    "127.0.0.1:8000".to_string()
}

/// Search index (Meilisearch-compatible) connection settings.
///
/// Each field has an environment override so the watcher can be deployed
/// without a config file:
///
/// | Field | Env var | Default |
/// |-------|---------|---------|
/// | `url` | `MEILI_URL` | `http://localhost:7700` |
/// | `api_key` | `MEILI_MASTER_KEY` | none |
/// | `index` | `INDEX_NAME` | `chats` |
///
/// The watched directory (`store.docs_dir`) is overridden by `DATA_DIR`.
#[derive(Debug, Deserialize, Clone)]
pub struct SearchIndexConfig {
    #[serde(default = "default_index_url")]
    pub url: String,
    /// Admin credential, sent as a bearer token when present.
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_index_name")]
    pub index: String,
    /// Health-check attempts before the watcher gives up on startup.
    #[serde(default = "default_health_retries")]
    pub health_retries: u32,
}

impl Default for SearchIndexConfig {
    fn default() -> Self {
        Self {
            url: default_index_url(),
            api_key: None,
            index: default_index_name(),
            health_retries: default_health_retries(),
        }
    }
}

fn default_index_url() -> String {
    "http://localhost:7700".to_string()
}
fn default_index_name() -> String {
    "chats".to_string()
}
fn default_health_retries() -> u32 {
    5
}

/// Loads configuration from `path`, falling back to built-in defaults when
/// the file does not exist, then applies environment overrides and validates.
pub fn load_config(path: &Path) -> Result<Config> {
    let mut config: Config = if path.exists() {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&content).with_context(|| "Failed to parse config file")?
    } else {
        Config::default()
    };

    apply_env_overrides(&mut config);

    // Validate server
    if config.server.bind.is_empty() {
        anyhow::bail!("server.bind must not be empty");
    }

    // Validate search index
    if config.search_index.health_retries == 0 {
        anyhow::bail!("search_index.health_retries must be >= 1");
    }
    if config.search_index.index.is_empty() {
        anyhow::bail!("search_index.index must not be empty");
    }
    // Trailing slashes break path joining against the index API.
    while config.search_index.url.ends_with('/') {
        config.search_index.url.pop();
    }
    if config.search_index.url.is_empty() {
        anyhow::bail!("search_index.url must not be empty");
    }

    Ok(config)
}

fn apply_env_overrides(config: &mut Config) {
    if let Ok(url) = std::env::var("MEILI_URL") {
        if !url.is_empty() {
            config.search_index.url = url;
        }
    }
    if let Ok(key) = std::env::var("MEILI_MASTER_KEY") {
        if !key.is_empty() {
            config.search_index.api_key = Some(key);
        }
    }
    if let Ok(name) = std::env::var("INDEX_NAME") {
        if !name.is_empty() {
            config.search_index.index = name;
        }
    }
    if let Ok(dir) = std::env::var("DATA_DIR") {
        if !dir.is_empty() {
            config.store.docs_dir = PathBuf::from(dir);
        }
    }
}
