use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::vault::{chunker::DEFAULT_CHUNK_LEN, DEFAULT_DIMENSIONS, DEFAULT_TOP_K};

const CONFIG_FILE: &str = "config.yaml";

/// Default HTTP provider timeout in seconds
const DEFAULT_PROVIDER_TIMEOUT_SECS: u64 = 15;
/// Environment variable holding the provider API key
const DEFAULT_API_KEY_ENV: &str = "GROQ_API_KEY";

/// Overrides `embedding.dimensions`
pub const ENV_EMBED_DIM: &str = "MEDVAULT_EMBED_DIM";
/// Overrides the HTTP provider model
pub const ENV_EMBED_MODEL: &str = "MEDVAULT_EMBED_MODEL";

/// Raw override values, normally read from the environment.
#[derive(Clone, Debug, Default)]
pub struct EnvOverrides {
    pub dimensions: Option<String>,
    pub model: Option<String>,
}

impl EnvOverrides {
    pub fn from_env() -> Self {
        Self {
            dimensions: std::env::var(ENV_EMBED_DIM).ok(),
            model: std::env::var(ENV_EMBED_MODEL).ok(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("io error: {0:?}")]
    IO(#[from] std::io::Error),

    #[error("config is malformed: {0}")]
    Malformed(#[from] serde_yml::Error),

    #[error("{field} {message}")]
    Invalid { field: String, message: String },
}

impl ConfigError {
    fn invalid(field: &str, message: impl Into<String>) -> Self {
        ConfigError::Invalid {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

/// External embedding provider, tried before the hashing embedder
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProviderConfig {
    /// OpenAI-compatible embeddings endpoint
    Http {
        endpoint: String,
        model: String,
        #[serde(default = "default_api_key_env")]
        api_key_env: String,
        #[serde(default = "default_provider_timeout_secs")]
        timeout_secs: u64,
    },
    /// fastembed model, needs the `local-model` feature
    Local { model: String },
}

/// Configuration for embedding generation
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Vector dimensions for the whole store
    #[serde(default = "default_dimensions")]
    pub dimensions: usize,

    /// Optional external provider
    #[serde(default)]
    pub provider: Option<ProviderConfig>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            dimensions: DEFAULT_DIMENSIONS,
            provider: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChunkingConfig {
    /// Maximum chunk length in characters
    #[serde(default = "default_chunk_len")]
    pub max_len: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_len: DEFAULT_CHUNK_LEN,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default = "default_top_k")]
    pub default_top_k: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_top_k: DEFAULT_TOP_K,
        }
    }
}

fn default_dimensions() -> usize {
    DEFAULT_DIMENSIONS
}

fn default_chunk_len() -> usize {
    DEFAULT_CHUNK_LEN
}

fn default_top_k() -> usize {
    DEFAULT_TOP_K
}

fn default_api_key_env() -> String {
    DEFAULT_API_KEY_ENV.to_string()
}

fn default_provider_timeout_secs() -> u64 {
    DEFAULT_PROVIDER_TIMEOUT_SECS
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub search: SearchConfig,

    #[serde(skip_serializing, skip_deserializing)]
    base_path: PathBuf,
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.embedding.dimensions == 0 {
            return Err(ConfigError::invalid(
                "embedding.dimensions",
                "must be greater than 0",
            ));
        }

        if self.chunking.max_len == 0 {
            return Err(ConfigError::invalid(
                "chunking.max_len",
                "must be greater than 0",
            ));
        }

        if self.search.default_top_k == 0 {
            return Err(ConfigError::invalid(
                "search.default_top_k",
                "must be greater than 0",
            ));
        }

        match &self.embedding.provider {
            Some(ProviderConfig::Http {
                endpoint,
                model,
                timeout_secs,
                ..
            }) => {
                let url = url::Url::parse(endpoint).map_err(|e| {
                    ConfigError::invalid(
                        "embedding.provider.endpoint",
                        format!("is not a valid url: {e}"),
                    )
                })?;
                if !matches!(url.scheme(), "http" | "https") {
                    return Err(ConfigError::invalid(
                        "embedding.provider.endpoint",
                        format!("must be http or https, got '{}'", url.scheme()),
                    ));
                }
                if model.trim().is_empty() {
                    return Err(ConfigError::invalid(
                        "embedding.provider.model",
                        "must not be empty",
                    ));
                }
                if *timeout_secs == 0 {
                    return Err(ConfigError::invalid(
                        "embedding.provider.timeout_secs",
                        "must be greater than 0",
                    ));
                }
            }
            Some(ProviderConfig::Local { model }) if model.trim().is_empty() => {
                return Err(ConfigError::invalid(
                    "embedding.provider.model",
                    "must not be empty",
                ));
            }
            _ => {}
        }

        Ok(())
    }

    /// Apply `MEDVAULT_EMBED_DIM` / `MEDVAULT_EMBED_MODEL` values on top of the file.
    /// Blank values are ignored.
    pub fn apply_overrides(&mut self, overrides: &EnvOverrides) -> Result<(), ConfigError> {
        let dimensions = overrides.dimensions.as_deref().map(str::trim);
        if let Some(raw) = dimensions.filter(|s| !s.is_empty()) {
            self.embedding.dimensions = raw.parse().map_err(|_| {
                ConfigError::invalid(
                    ENV_EMBED_DIM,
                    format!("must be a positive integer, got '{raw}'"),
                )
            })?;
        }

        let model = overrides.model.as_deref().map(str::trim);
        if let Some(new_model) = model.filter(|s| !s.is_empty()) {
            match &mut self.embedding.provider {
                Some(ProviderConfig::Http { model, .. }) => *model = new_model.to_string(),
                _ => log::warn!("{ENV_EMBED_MODEL} ignored: no http provider configured"),
            }
        }

        Ok(())
    }

    /// Load `config.yaml` from `base_path` and apply the environment overrides.
    pub fn load_with(base_path: &Path) -> Result<Self, ConfigError> {
        Self::load_with_overrides(base_path, &EnvOverrides::from_env())
    }

    /// Load `config.yaml` from `base_path`, writing the defaults if it is missing.
    ///
    /// Overrides are applied after the file is saved, so they never end up on disk.
    pub fn load_with_overrides(
        base_path: &Path,
        overrides: &EnvOverrides,
    ) -> Result<Self, ConfigError> {
        std::fs::create_dir_all(base_path)?;
        let path = base_path.join(CONFIG_FILE);

        // create new if does not exist
        if !path.exists() {
            std::fs::write(&path, serde_yml::to_string(&Self::default())?)?;
        }

        let config_str = std::fs::read_to_string(&path)?;
        let mut config: Self = serde_yml::from_str(&config_str)?;

        config.base_path = base_path.to_path_buf();

        config.validate()?;

        // resave in case config version needs an upgrade
        if config_str != serde_yml::to_string(&config)? {
            config.save()?;
        }

        config.apply_overrides(overrides)?;
        config.validate()?;

        Ok(config)
    }

    pub fn save(&self) -> Result<(), ConfigError> {
        let config_str = serde_yml::to_string(&self)?;
        std::fs::write(self.base_path.join(CONFIG_FILE), config_str)?;
        Ok(())
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }
}
