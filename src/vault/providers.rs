//! External embedding providers.
//!
//! - `HttpEmbeddingProvider`: OpenAI-compatible `/embeddings` endpoint
//! - `LocalModelProvider`: fastembed model on disk (feature `local-model`)
//!
//! Providers are best-effort. The [`Embedder`](crate::vault::Embedder)
//! replaces any error they return with the hashing embedding.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::ProviderConfig;
use crate::vault::embeddings::{EmbeddingProvider, ProviderError};

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

/// Provider backed by an OpenAI-compatible embeddings API.
pub struct HttpEmbeddingProvider {
    client: reqwest::blocking::Client,
    endpoint: String,
    model: String,
    api_key: String,
    name: String,
}

impl HttpEmbeddingProvider {
    pub fn new(
        endpoint: &str,
        model: &str,
        api_key: String,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
            model: model.to_string(),
            api_key,
            name: format!("http:{model}"),
        })
    }

    /// Read the API key from `api_key_env` and build the provider.
    pub fn from_env(
        endpoint: &str,
        model: &str,
        api_key_env: &str,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        let api_key = std::env::var(api_key_env)
            .ok()
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty())
            .ok_or_else(|| ProviderError::MissingApiKey(api_key_env.to_string()))?;

        Self::new(endpoint, model, api_key, timeout)
    }
}

impl EmbeddingProvider for HttpEmbeddingProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&EmbeddingRequest {
                model: &self.model,
                input: text,
            })
            .send()?;

        let status = response.status();
        let body = response.text()?;
        if !status.is_success() {
            return Err(ProviderError::Status {
                status: status.as_u16(),
                body,
            });
        }

        parse_embedding_response(&body)
    }
}

/// Extract the first embedding from an `{"data": [{"embedding": [...]}]}` body.
pub fn parse_embedding_response(body: &str) -> Result<Vec<f32>, ProviderError> {
    let response: EmbeddingResponse = serde_json::from_str(body)
        .map_err(|e| ProviderError::MalformedResponse(e.to_string()))?;

    response
        .data
        .into_iter()
        .next()
        .map(|d| d.embedding)
        .ok_or_else(|| ProviderError::MalformedResponse("no embeddings".into()))
}

#[cfg(feature = "local-model")]
pub use local::LocalModelProvider;

#[cfg(feature = "local-model")]
mod local {
    use std::path::PathBuf;
    use std::sync::Mutex;

    use fastembed::{InitOptions, TextEmbedding};

    use super::*;

    /// Provider backed by a local fastembed model.
    /// Uses a Mutex because fastembed's embed() requires &mut self.
    pub struct LocalModelProvider {
        model: Mutex<TextEmbedding>,
        name: String,
    }

    impl LocalModelProvider {
        /// Load (downloading on first use) the named model into `cache_dir/models`.
        pub fn new(model_name: &str, cache_dir: PathBuf) -> Result<Self, ProviderError> {
            let model_enum = parse_model_name(model_name)?;

            let models_dir = cache_dir.join("models");
            std::fs::create_dir_all(&models_dir).map_err(|e| {
                ProviderError::InitFailed(format!("Failed to create models directory: {}", e))
            })?;

            let options = InitOptions::new(model_enum)
                .with_cache_dir(models_dir)
                .with_show_download_progress(true);

            let model = TextEmbedding::try_new(options)
                .map_err(|e| ProviderError::InitFailed(e.to_string()))?;

            Ok(Self {
                model: Mutex::new(model),
                name: format!("local:{model_name}"),
            })
        }
    }

    impl EmbeddingProvider for LocalModelProvider {
        fn name(&self) -> &str {
            &self.name
        }

        fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
            let mut model = self.model.lock().map_err(|e| {
                ProviderError::InitFailed(format!("Failed to acquire model lock: {}", e))
            })?;

            let embeddings = model
                .embed(vec![text], None)
                .map_err(|e| ProviderError::MalformedResponse(e.to_string()))?;

            embeddings
                .into_iter()
                .next()
                .ok_or_else(|| ProviderError::MalformedResponse("no embeddings".into()))
        }
    }

    /// 384-dimension models, matching the hashing embedder's default.
    const SUPPORTED_MODELS: &str = "all-MiniLM-L6-v2, bge-small-en-v1.5 (add -q for quantized)";

    fn parse_model_name(name: &str) -> Result<fastembed::EmbeddingModel, ProviderError> {
        match name.to_lowercase().as_str() {
            "all-minilm-l6-v2" => Ok(fastembed::EmbeddingModel::AllMiniLML6V2),
            "all-minilm-l6-v2-q" => Ok(fastembed::EmbeddingModel::AllMiniLML6V2Q),
            "bge-small-en-v1.5" => Ok(fastembed::EmbeddingModel::BGESmallENV15),
            "bge-small-en-v1.5-q" => Ok(fastembed::EmbeddingModel::BGESmallENV15Q),
            _ => {
                let message = format!("unknown model {name}, supported: {SUPPORTED_MODELS}");
                Err(ProviderError::InitFailed(message))
            }
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn test_invalid_model_name() {
            let temp_dir = tempfile::tempdir().unwrap();
            let cache_dir = temp_dir.path().to_path_buf();

            let result = LocalModelProvider::new("nonexistent-model", cache_dir);
            assert!(matches!(result, Err(ProviderError::InitFailed(_))));
        }

        #[test]
        #[ignore = "requires model download"]
        fn test_local_model_embeds() {
            let temp_dir = tempfile::tempdir().unwrap();
            let cache_dir = temp_dir.path().to_path_buf();
            let provider = LocalModelProvider::new("all-MiniLM-L6-v2", cache_dir).unwrap();

            let embedding = provider.embed("Hello, world!").unwrap();
            assert_eq!(embedding.len(), 384);
        }
    }
}

/// Build the configured provider.
///
/// `base_path` is where a local model is cached.
pub fn build_provider(
    config: &ProviderConfig,
    base_path: &Path,
) -> Result<Arc<dyn EmbeddingProvider>, ProviderError> {
    match config {
        ProviderConfig::Http {
            endpoint,
            model,
            api_key_env,
            timeout_secs,
        } => {
            let timeout = Duration::from_secs(*timeout_secs);
            let provider = HttpEmbeddingProvider::from_env(endpoint, model, api_key_env, timeout)?;
            Ok(Arc::new(provider))
        }
        ProviderConfig::Local { model } => build_local(model, base_path),
    }
}

#[cfg(feature = "local-model")]
fn build_local(model: &str, base_path: &Path) -> Result<Arc<dyn EmbeddingProvider>, ProviderError> {
    let provider = LocalModelProvider::new(model, base_path.to_path_buf())?;
    Ok(Arc::new(provider))
}

#[cfg(not(feature = "local-model"))]
fn build_local(
    model: &str,
    _base_path: &Path,
) -> Result<Arc<dyn EmbeddingProvider>, ProviderError> {
    let message = format!("local model {model} needs the local-model feature");
    Err(ProviderError::InitFailed(message))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_embedding_response() {
        let body = r#"{
            "object": "list",
            "data": [{"object": "embedding", "index": 0, "embedding": [0.5, -0.25, 1.0]}],
            "model": "m"
        }"#;

        let embedding = parse_embedding_response(body).unwrap();
        assert_eq!(embedding, vec![0.5, -0.25, 1.0]);
    }

    #[test]
    fn test_parse_embedding_response_empty_data() {
        let result = parse_embedding_response(r#"{"data": []}"#);
        assert!(matches!(result, Err(ProviderError::MalformedResponse(_))));
    }

    #[test]
    fn test_parse_embedding_response_garbage() {
        let result = parse_embedding_response("<html>rate limited</html>");
        assert!(matches!(result, Err(ProviderError::MalformedResponse(_))));
    }

    #[test]
    fn test_missing_api_key() {
        let result = HttpEmbeddingProvider::from_env(
            "http://127.0.0.1:9/v1/embeddings",
            "nomic-embed-text",
            "MEDVAULT_TEST_KEY_THAT_IS_NEVER_SET",
            Duration::from_secs(1),
        );
        assert!(matches!(result, Err(ProviderError::MissingApiKey(_))));
    }

    #[test]
    fn test_unreachable_endpoint_falls_back() {
        use crate::vault::embeddings::{hash_embed, Embedder};

        let provider = HttpEmbeddingProvider::new(
            "http://127.0.0.1:9/v1/embeddings",
            "nomic-embed-text",
            "key".to_string(),
            Duration::from_millis(200),
        )
        .unwrap();
        assert!(provider.embed("fever").is_err());

        let embedder = Embedder::hashing(16).with_provider(Arc::new(provider));
        assert_eq!(embedder.embed("fever"), hash_embed("fever", 16));
    }

    #[cfg(not(feature = "local-model"))]
    #[test]
    fn test_local_provider_needs_feature() {
        let config = ProviderConfig::Local {
            model: "all-MiniLM-L6-v2".to_string(),
        };
        let result = build_provider(&config, Path::new("/tmp"));
        assert!(matches!(result, Err(ProviderError::InitFailed(_))));
    }
}
