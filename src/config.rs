//! Run configuration: the fixed contract values plus path overrides.

use crate::krkn_docs;
use std::path::PathBuf;

/// A documentation repository and the directory inside it to index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoSource {
    pub url: String,
    pub docs_path: PathBuf,
}

impl RepoSource {
    pub fn new(url: impl Into<String>, docs_path: impl Into<PathBuf>) -> Self {
        Self {
            url: url.into(),
            docs_path: docs_path.into(),
        }
    }
}

/// Chunk size and overlap, both counted in characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkingConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: krkn_docs::CHUNK_SIZE,
            chunk_overlap: krkn_docs::CHUNK_OVERLAP,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PrebuildConfig {
    pub collection_name: String,
    pub persist_dir: PathBuf,
    pub embedding_model: String,
    pub repo_sources: Vec<RepoSource>,
    pub help_file: PathBuf,
    pub chunking: ChunkingConfig,
    /// Where embedding model files live (or get downloaded to).
    pub model_dir: PathBuf,
    /// Where repositories are cloned; a temporary directory when unset.
    pub clone_dir: Option<PathBuf>,
}

impl Default for PrebuildConfig {
    fn default() -> Self {
        Self {
            collection_name: krkn_docs::COLLECTION_NAME.to_string(),
            persist_dir: PathBuf::from(krkn_docs::PERSIST_DIR),
            embedding_model: krkn_docs::EMBEDDING_MODEL.to_string(),
            repo_sources: krkn_docs::REPO_SOURCES
                .iter()
                .map(|(url, docs_path)| RepoSource::new(*url, *docs_path))
                .collect(),
            help_file: PathBuf::from(krkn_docs::HELP_FILE),
            chunking: ChunkingConfig::default(),
            model_dir: PathBuf::from(krkn_docs::MODEL_DIR),
            clone_dir: None,
        }
    }
}

impl PrebuildConfig {
    /// Defaults with filesystem locations taken from the environment
    /// (and `.env`, if present). Only paths can be overridden.
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();
        Self::default().with_overrides(|key| std::env::var(key).ok())
    }

    fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(dir) = get("PREBUILD_PERSIST_DIR") {
            self.persist_dir = PathBuf::from(dir);
        }
        if let Some(file) = get("PREBUILD_HELP_FILE") {
            self.help_file = PathBuf::from(file);
        }
        if let Some(dir) = get("PREBUILD_MODEL_DIR") {
            self.model_dir = PathBuf::from(dir);
        }
        if let Some(dir) = get("PREBUILD_CLONE_DIR") {
            self.clone_dir = Some(PathBuf::from(dir));
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults_match_runtime_contract() {
        let config = PrebuildConfig::default();
        assert_eq!(config.collection_name, "krkn-docs");
        assert_eq!(config.persist_dir, PathBuf::from("/app/docs_index"));
        assert_eq!(config.embedding_model, "qwen-small");
        assert_eq!(config.chunking.chunk_size, 1000);
        assert_eq!(config.chunking.chunk_overlap, 200);
        assert_eq!(config.help_file, PathBuf::from("/app/krknctl_help.txt"));
        assert_eq!(
            config.repo_sources,
            vec![
                RepoSource::new("https://github.com/krkn-chaos/website", "content/en/docs"),
                RepoSource::new("https://github.com/krkn-chaos/krkn-hub", "."),
            ]
        );
        assert!(config.clone_dir.is_none());
    }

    #[test]
    fn overrides_only_touch_paths() {
        let env: HashMap<&str, &str> = [
            ("PREBUILD_PERSIST_DIR", "/tmp/index"),
            ("PREBUILD_HELP_FILE", "/tmp/help.txt"),
            ("PREBUILD_MODEL_DIR", "/tmp/models"),
            ("PREBUILD_CLONE_DIR", "/tmp/clones"),
        ]
        .into_iter()
        .collect();

        let config = PrebuildConfig::default()
            .with_overrides(|key| env.get(key).map(|value| value.to_string()));

        assert_eq!(config.persist_dir, PathBuf::from("/tmp/index"));
        assert_eq!(config.help_file, PathBuf::from("/tmp/help.txt"));
        assert_eq!(config.model_dir, PathBuf::from("/tmp/models"));
        assert_eq!(config.clone_dir, Some(PathBuf::from("/tmp/clones")));
        assert_eq!(config.collection_name, "krkn-docs");
        assert_eq!(config.chunking, ChunkingConfig::default());
    }

    #[test]
    fn blank_overrides_are_ignored() {
        let config = PrebuildConfig::default().with_overrides(|key| {
            (key == "PREBUILD_PERSIST_DIR").then(|| "  ".to_string())
        });
        assert_eq!(config.persist_dir, PathBuf::from("/app/docs_index"));
    }
}
