use crate::{
    app::service::HighlightService,
    config::{Config, EmbeddingProvider},
    semantic::{Embedder, HighlightStore, LocalEmbedder, OpenAiEmbedder},
};
use anyhow::{Context, Result};
use homedir::my_home;
use std::path::PathBuf;
use std::sync::Arc;

/// Application factory for creating and configuring application components
pub struct AppFactory;

impl AppFactory {
    /// Build the highlight service: embedder, store and search settings.
    pub fn create_service(paths: &AppPaths, config: &Config) -> Result<HighlightService> {
        let embedder = Self::create_embedder(paths, config)?;
        log::info!("Using embedder '{}'", embedder.name());

        let store_dir = paths.store_dir(config);
        let store = HighlightStore::open(&store_dir, &config.store.collection, embedder)
            .with_context(|| format!("Failed to open vector store at {}", store_dir.display()))?;

        Ok(HighlightService::new(store, config.search.clone()))
    }

    /// Create the configured embedding provider.
    pub fn create_embedder(paths: &AppPaths, config: &Config) -> Result<Arc<dyn Embedder>> {
        let embedding = &config.embedding;
        let embedder: Arc<dyn Embedder> = match embedding.provider {
            EmbeddingProvider::OpenAi => Arc::new(OpenAiEmbedder::from_config(embedding)?),
            EmbeddingProvider::Local => Arc::new(LocalEmbedder::new(
                &embedding.local_model,
                PathBuf::from(&paths.base_path),
            )?),
        };
        Ok(embedder)
    }

    /// Load configuration from the base directory
    pub fn create_config(paths: &AppPaths) -> Result<Config> {
        Config::load_with(&paths.base_path)
            .with_context(|| format!("Failed to load configuration from {}", paths.base_path))
    }

    /// Get application paths with validation
    pub fn get_paths() -> Result<AppPaths> {
        let base_path = Self::get_base_path()?;

        std::fs::create_dir_all(&base_path)
            .context("Failed to create application base directory")?;

        Ok(AppPaths { base_path })
    }

    /// Get the base path for the application
    fn get_base_path() -> Result<String> {
        if let Ok(base_path) = std::env::var("HIGHLIGHTS_BASE_PATH") {
            return Ok(base_path);
        }

        let home = my_home()
            .context("Could not determine home directory")?
            .context("Home directory path is empty")?;
        Ok(format!("{}/.local/share/highlights", home.to_string_lossy()))
    }
}

/// Application paths structure
#[derive(Debug, Clone)]
pub struct AppPaths {
    pub base_path: String,
}

impl AppPaths {
    /// Directory holding the vector store files.
    pub fn store_dir(&self, config: &Config) -> PathBuf {
        // join keeps an absolute configured directory as is
        PathBuf::from(&self.base_path).join(&config.store.directory)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_dir_relative_and_absolute() {
        let paths = AppPaths {
            base_path: "/test/base".to_string(),
        };
        let mut config = Config::default();

        assert_eq!(paths.store_dir(&config), PathBuf::from("/test/base/store"));

        config.store.directory = "/var/lib/highlights".to_string();
        assert_eq!(
            paths.store_dir(&config),
            PathBuf::from("/var/lib/highlights")
        );
    }

    #[test]
    fn test_openai_provider_requires_key() {
        let tmp = tempfile::tempdir().unwrap();
        let paths = AppPaths {
            base_path: tmp.path().to_string_lossy().to_string(),
        };
        let mut config = Config::default();
        config.embedding.api_key_env = "HIGHLIGHTS_FACTORY_TEST_NO_KEY".to_string();

        let err = AppFactory::create_service(&paths, &config).err().unwrap();
        assert!(err
            .to_string()
            .contains("HIGHLIGHTS_FACTORY_TEST_NO_KEY environment variable is required"));
    }
}
