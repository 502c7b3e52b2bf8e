use crate::embedding::Embedder;
use crate::error::{PrebuildError, Result};
use anyhow::bail;
use async_trait::async_trait;
use fastembed::{
    read_file_to_bytes, EmbeddingModel, InitOptions, InitOptionsUserDefined, Pooling,
    TextEmbedding, TokenizerFiles, UserDefinedEmbeddingModel,
};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// Resolves an embedding model by its identifier.
#[async_trait]
pub trait EmbeddingModelFactory: Send + Sync {
    async fn get_model(&self, name: &str) -> Result<Arc<dyn Embedder>>;
}

/// How a model identifier maps onto fastembed.
enum ModelSpec {
    /// ONNX export plus tokenizer and pooling files in a local directory.
    Local { dir_name: &'static str },
    /// One of fastembed's bundled models, downloaded on first use.
    Bundled(EmbeddingModel),
}

fn resolve(name: &str) -> Option<ModelSpec> {
    match name {
        "qwen-small" => Some(ModelSpec::Local { dir_name: "qwen-small" }),
        "all-minilm-l6-v2" => Some(ModelSpec::Bundled(EmbeddingModel::AllMiniLML6V2)),
        "bge-small-en-v1.5" => Some(ModelSpec::Bundled(EmbeddingModel::BGESmallENV15)),
        _ => None,
    }
}

/// fastembed-backed factory. `model_dir` holds local model directories and
/// serves as the download cache for bundled models.
pub struct FastEmbedFactory {
    model_dir: PathBuf,
}

impl FastEmbedFactory {
    pub fn new(model_dir: impl Into<PathBuf>) -> Self {
        Self {
            model_dir: model_dir.into(),
        }
    }
}

#[async_trait]
impl EmbeddingModelFactory for FastEmbedFactory {
    async fn get_model(&self, name: &str) -> Result<Arc<dyn Embedder>> {
        let spec = resolve(name).ok_or_else(|| PrebuildError::UnknownModel(name.to_string()))?;
        let model_dir = self.model_dir.clone();
        let model_name = name.to_string();

        info!(model = %name, dir = %model_dir.display(), "loading embedding model");
        let model = tokio::task::spawn_blocking(move || match spec {
            ModelSpec::Local { dir_name } => get_local_model(&model_dir.join(dir_name)),
            ModelSpec::Bundled(model) => TextEmbedding::try_new(
                InitOptions::new(model)
                    .with_cache_dir(model_dir)
                    .with_show_download_progress(true),
            ),
        })
        .await?
        .map_err(|e| PrebuildError::ModelLoad {
            name: model_name,
            message: format!("{e:#}"),
        })?;

        Ok(Arc::new(FastEmbedModel {
            model: Arc::new(model),
        }))
    }
}

/// Pooling section of a sentence-transformers export (`1_Pooling/config.json`).
#[derive(Debug, Default, Deserialize)]
struct PoolingConfig {
    #[serde(default)]
    pooling_mode_cls_token: bool,
    #[serde(default)]
    pooling_mode_mean_tokens: bool,
    #[serde(default)]
    pooling_mode_max_tokens: bool,
    #[serde(default)]
    pooling_mode_lasttoken: bool,
}

/// The pooling the model was trained with. Modes fastembed cannot apply are
/// an error: vectors pooled differently would not match the runtime's.
fn pooling_from_config(raw: &[u8]) -> anyhow::Result<Pooling> {
    let config: PoolingConfig = serde_json::from_slice(raw)?;
    match config {
        PoolingConfig {
            pooling_mode_cls_token: true,
            pooling_mode_mean_tokens: false,
            pooling_mode_max_tokens: false,
            pooling_mode_lasttoken: false,
        } => Ok(Pooling::Cls),
        PoolingConfig {
            pooling_mode_cls_token: false,
            pooling_mode_mean_tokens: true,
            pooling_mode_max_tokens: false,
            pooling_mode_lasttoken: false,
        } => Ok(Pooling::Mean),
        other => bail!("unsupported pooling configuration {other:?}"),
    }
}

fn get_local_model(base_path: &Path) -> anyhow::Result<TextEmbedding> {
    let onnx_path = base_path.join("onnx").join("model.onnx");
    let tokenizer_path = base_path.join("tokenizer.json");
    let config_path = base_path.join("config.json");
    let special_tokens_map_path = base_path.join("special_tokens_map.json");
    let tokenizer_config_path = base_path.join("tokenizer_config.json");
    let pooling_config_path = base_path.join("1_Pooling").join("config.json");

    let pooling = pooling_from_config(&read_file_to_bytes(&pooling_config_path)?)?;
    let onnx_bytes = read_file_to_bytes(&onnx_path)?;
    let tokenizer_file = read_file_to_bytes(&tokenizer_path)?;
    let config_file = read_file_to_bytes(&config_path)?;
    let special_tokens_map_file = read_file_to_bytes(&special_tokens_map_path)?;
    let tokenizer_config_file = read_file_to_bytes(&tokenizer_config_path)?;

    let tokenizer_files: TokenizerFiles = TokenizerFiles {
        tokenizer_file,
        config_file,
        special_tokens_map_file,
        tokenizer_config_file,
    };

    let user_model =
        UserDefinedEmbeddingModel::new(onnx_bytes, tokenizer_files).with_pooling(pooling);

    TextEmbedding::try_new_from_user_defined(user_model, InitOptionsUserDefined::default())
}

/// A loaded fastembed model. Inference runs on the blocking pool.
pub struct FastEmbedModel {
    model: Arc<TextEmbedding>,
}

#[async_trait]
impl Embedder for FastEmbedModel {
    async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        let model = self.model.clone();
        tokio::task::spawn_blocking(move || {
            model
                .embed(texts, None)
                .map_err(|e| PrebuildError::Embedding(format!("{e:#}")))
        })
        .await?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_known_names() {
        assert!(matches!(
            resolve("qwen-small"),
            Some(ModelSpec::Local { dir_name: "qwen-small" })
        ));
        assert!(matches!(
            resolve("all-minilm-l6-v2"),
            Some(ModelSpec::Bundled(EmbeddingModel::AllMiniLML6V2))
        ));
        assert!(resolve("qwen-large").is_none());
    }

    #[test]
    fn pooling_follows_model_config() {
        let cls = br#"{"word_embedding_dimension": 384, "pooling_mode_cls_token": true}"#;
        let mean = br#"{"pooling_mode_cls_token": false, "pooling_mode_mean_tokens": true}"#;
        assert!(matches!(pooling_from_config(cls), Ok(Pooling::Cls)));
        assert!(matches!(pooling_from_config(mean), Ok(Pooling::Mean)));
    }

    #[test]
    fn last_token_pooling_is_refused() {
        let last_token = br#"{"pooling_mode_mean_tokens": false, "pooling_mode_lasttoken": true}"#;
        assert!(pooling_from_config(last_token).is_err());
        assert!(pooling_from_config(br#"{}"#).is_err());
        assert!(pooling_from_config(b"not json").is_err());
    }

    #[tokio::test]
    async fn last_token_model_fails_to_load() {
        let dir = tempfile::tempdir().unwrap();
        let pooling_dir = dir.path().join("qwen-small").join("1_Pooling");
        std::fs::create_dir_all(&pooling_dir).unwrap();
        std::fs::write(
            pooling_dir.join("config.json"),
            r#"{"pooling_mode_lasttoken": true}"#,
        )
        .unwrap();

        let factory = FastEmbedFactory::new(dir.path());
        let err = factory.get_model("qwen-small").await.err().unwrap();
        assert!(
            matches!(&err, PrebuildError::ModelLoad { message, .. } if message.contains("pooling"))
        );
    }

    #[tokio::test]
    async fn unknown_model_is_rejected() {
        let factory = FastEmbedFactory::new("/nonexistent");
        let err = factory.get_model("gpt-embed").await.err().unwrap();
        assert!(matches!(err, PrebuildError::UnknownModel(name) if name == "gpt-embed"));
    }

    #[tokio::test]
    async fn missing_local_model_files_fail_to_load() {
        let dir = tempfile::tempdir().unwrap();
        let factory = FastEmbedFactory::new(dir.path());
        let err = factory.get_model("qwen-small").await.err().unwrap();
        assert!(matches!(err, PrebuildError::ModelLoad { name, .. } if name == "qwen-small"));
    }
}
