use crate::storage::{self, StorageManager};
use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

const CONFIG_FILE: &str = "config.yaml";

const DEFAULT_LISTEN: &str = "0.0.0.0:8000";
const DEFAULT_MAX_UPLOAD_BYTES: usize = 100 * 1024 * 1024;

/// Default remote embedding model
const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-ada-002";
const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";
const DEFAULT_API_KEY_ENV: &str = "OPENAI_API_KEY";
const DEFAULT_BATCH_SIZE: usize = 500;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;
/// fastembed model used when `provider` is `local`
const DEFAULT_LOCAL_MODEL: &str = "bge-base-en-v1.5";

const DEFAULT_STORE_DIRECTORY: &str = "store";
const DEFAULT_COLLECTION: &str = "highlights";

const DEFAULT_TAG_OVERFETCH_FACTOR: usize = 3;
const DEFAULT_FALLBACK_FETCH: usize = 1000;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address the HTTP server binds to
    #[serde(default = "default_listen")]
    pub listen: String,

    /// Maximum accepted request body (CSV uploads)
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

fn default_listen() -> String {
    DEFAULT_LISTEN.to_string()
}

fn default_max_upload_bytes() -> usize {
    DEFAULT_MAX_UPLOAD_BYTES
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    /// OpenAI-compatible `/embeddings` endpoint
    #[default]
    OpenAi,
    /// In-process fastembed model
    Local,
}

/// Configuration for embedding generation
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    #[serde(default)]
    pub provider: EmbeddingProvider,

    /// Remote model name
    #[serde(default = "default_embedding_model")]
    pub model: String,

    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// Name of the environment variable holding the API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Texts per embedding request
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Model name for the local provider (e.g., "all-MiniLM-L6-v2")
    #[serde(default = "default_local_model")]
    pub local_model: String,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProvider::default(),
            model: default_embedding_model(),
            api_base: default_api_base(),
            api_key_env: default_api_key_env(),
            batch_size: default_batch_size(),
            request_timeout_secs: default_request_timeout_secs(),
            local_model: default_local_model(),
        }
    }
}

fn default_embedding_model() -> String {
    DEFAULT_EMBEDDING_MODEL.to_string()
}

fn default_api_base() -> String {
    DEFAULT_API_BASE.to_string()
}

fn default_api_key_env() -> String {
    DEFAULT_API_KEY_ENV.to_string()
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

fn default_local_model() -> String {
    DEFAULT_LOCAL_MODEL.to_string()
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Vector store directory, relative to the base path unless absolute
    #[serde(default = "default_store_directory")]
    pub directory: String,

    #[serde(default = "default_collection")]
    pub collection: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            directory: default_store_directory(),
            collection: default_collection(),
        }
    }
}

fn default_store_directory() -> String {
    DEFAULT_STORE_DIRECTORY.to_string()
}

fn default_collection() -> String {
    DEFAULT_COLLECTION.to_string()
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Candidate multiplier applied to `limit` when filtering by tags
    #[serde(default = "default_tag_overfetch_factor")]
    pub tag_overfetch_factor: usize,

    /// Candidates requested when the store reports zero items
    #[serde(default = "default_fallback_fetch")]
    pub fallback_fetch: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            tag_overfetch_factor: default_tag_overfetch_factor(),
            fallback_fetch: default_fallback_fetch(),
        }
    }
}

fn default_tag_overfetch_factor() -> usize {
    DEFAULT_TAG_OVERFETCH_FACTOR
}

fn default_fallback_fetch() -> usize {
    DEFAULT_FALLBACK_FETCH
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub search: SearchConfig,

    #[serde(skip_serializing, skip_deserializing)]
    base_path: String,
}

impl Config {
    fn validate(&self) -> anyhow::Result<()> {
        self.server
            .listen
            .parse::<SocketAddr>()
            .with_context(|| format!("server.listen is not a socket address: '{}'", self.server.listen))?;

        if self.server.max_upload_bytes == 0 {
            bail!("server.max_upload_bytes must be greater than 0");
        }

        let emb = &self.embedding;
        if emb.batch_size == 0 {
            bail!("embedding.batch_size must be greater than 0");
        }
        if emb.request_timeout_secs == 0 {
            bail!("embedding.request_timeout_secs must be greater than 0");
        }
        if emb.api_key_env.trim().is_empty() {
            bail!("embedding.api_key_env must not be empty");
        }

        let store = &self.store;
        if store.collection.trim().is_empty() {
            bail!("store.collection must not be empty");
        }
        if store.collection.contains(['/', '\\']) {
            bail!(
                "store.collection must be a plain name, got '{}'",
                store.collection
            );
        }

        if self.search.tag_overfetch_factor == 0 {
            bail!("search.tag_overfetch_factor must be greater than 0");
        }
        if self.search.fallback_fetch == 0 {
            bail!("search.fallback_fetch must be greater than 0");
        }

        Ok(())
    }

    pub fn load_with(base_path: &str) -> anyhow::Result<Self> {
        let store = storage::BackendLocal::new(base_path)?;

        // create new if does not exist
        if !store.exists(CONFIG_FILE) {
            log::info!("Writing default configuration to {base_path}/{CONFIG_FILE}");
            store.write(CONFIG_FILE, serde_yml::to_string(&Self::default())?.as_bytes())?;
        }

        let config_str =
            String::from_utf8(store.read(CONFIG_FILE)?).context("config file is not valid utf8")?;
        let mut config: Self = serde_yml::from_str(&config_str).context("config is malformed")?;

        config.base_path = base_path.to_string();

        config.validate()?;

        // resave in case config version needs an upgrade
        if config_str != serde_yml::to_string(&config)? {
            config.save()?;
        }

        Ok(config)
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let store = storage::BackendLocal::new(&self.base_path)?;

        let config_str = serde_yml::to_string(&self)?;
        store.write(CONFIG_FILE, config_str.as_bytes())?;
        Ok(())
    }

    pub fn base_path(&self) -> &str {
        &self.base_path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_creates_default_config() {
        let tmp = tempfile::tempdir().unwrap();
        let base = tmp.path().to_str().unwrap();

        let config = Config::load_with(base).unwrap();
        assert!(tmp.path().join(CONFIG_FILE).exists());

        assert_eq!(config.server.listen, "0.0.0.0:8000");
        assert_eq!(config.embedding.provider, EmbeddingProvider::OpenAi);
        assert_eq!(config.embedding.api_key_env, "OPENAI_API_KEY");
        assert_eq!(config.store.collection, "highlights");
        assert_eq!(config.search.tag_overfetch_factor, 3);
        assert_eq!(config.search.fallback_fetch, 1000);
        assert_eq!(config.base_path(), base);
    }

    #[test]
    fn partial_config_is_filled_and_resaved() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join(CONFIG_FILE);
        std::fs::write(&path, "embedding:\n  provider: local\nsearch:\n  tag_overfetch_factor: 5\n")
            .unwrap();

        let config = Config::load_with(tmp.path().to_str().unwrap()).unwrap();
        assert_eq!(config.embedding.provider, EmbeddingProvider::Local);
        assert_eq!(config.embedding.local_model, "bge-base-en-v1.5");
        assert_eq!(config.search.tag_overfetch_factor, 5);
        assert_eq!(config.search.fallback_fetch, 1000);

        let saved = std::fs::read_to_string(&path).unwrap();
        assert!(saved.contains("fallback_fetch: 1000"));
    }

    #[test]
    fn invalid_values_are_rejected() {
        let cases = [
            "search:\n  tag_overfetch_factor: 0\n",
            "embedding:\n  batch_size: 0\n",
            "server:\n  listen: not-an-address\n",
            "store:\n  collection: ../escape\n",
        ];

        for case in cases {
            let tmp = tempfile::tempdir().unwrap();
            std::fs::write(tmp.path().join(CONFIG_FILE), case).unwrap();

            let result = Config::load_with(tmp.path().to_str().unwrap());
            assert!(result.is_err(), "accepted invalid config: {case}");
        }
    }

    #[test]
    fn malformed_yaml_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join(CONFIG_FILE), "server: [unclosed").unwrap();

        assert!(Config::load_with(tmp.path().to_str().unwrap()).is_err());
    }
}
