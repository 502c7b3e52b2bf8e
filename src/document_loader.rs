//! Cloning documentation repositories and turning their files into chunks.

use crate::chunk::{self, DocumentChunk};
use crate::config::{ChunkingConfig, RepoSource};
use crate::error::{PrebuildError, Result};
use crate::splitter::{self, TextKind};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tempfile::TempDir;
use tokio::process::Command;
use tracing::{debug, info, warn};
use walkdir::{DirEntry, WalkDir};

/// Produces document chunks from repositories and local files.
#[async_trait]
pub trait DocumentLoader: Send + Sync {
    async fn clone_and_split(
        &self,
        source: &RepoSource,
        chunking: &ChunkingConfig,
    ) -> Result<Vec<DocumentChunk>>;

    async fn load_and_split(
        &self,
        paths: &[PathBuf],
        chunking: &ChunkingConfig,
    ) -> Result<Vec<DocumentChunk>>;
}

/// Loader that shells out to `git` for clones.
pub struct GitDocumentLoader {
    clone_root: PathBuf,
    // Keeps the default clone directory alive until the loader is dropped.
    _scratch: Option<TempDir>,
}

impl GitDocumentLoader {
    /// Clone into `clone_root`, or into a fresh temporary directory when `None`.
    pub fn new(clone_root: Option<PathBuf>) -> Result<Self> {
        match clone_root {
            Some(clone_root) => Ok(Self {
                clone_root,
                _scratch: None,
            }),
            None => {
                let scratch = TempDir::new()
                    .map_err(|e| PrebuildError::io(std::env::temp_dir(), e))?;
                Ok(Self {
                    clone_root: scratch.path().to_path_buf(),
                    _scratch: Some(scratch),
                })
            }
        }
    }

    pub fn clone_root(&self) -> &Path {
        &self.clone_root
    }

    /// Shallow-clone `repo_url`, then load and split every markdown file
    /// under `docs_path` inside the checkout.
    pub async fn clone_locally(
        &self,
        repo_url: &str,
        docs_path: &Path,
        chunking: &ChunkingConfig,
    ) -> Result<Vec<DocumentChunk>> {
        let checkout = self.clone_root().join(repo_dir_name(repo_url));
        git_clone(repo_url, &checkout).await?;
        load_docs_dir(repo_url, &checkout, docs_path, chunking).await
    }
}

#[async_trait]
impl DocumentLoader for GitDocumentLoader {
    async fn clone_and_split(
        &self,
        source: &RepoSource,
        chunking: &ChunkingConfig,
    ) -> Result<Vec<DocumentChunk>> {
        self.clone_locally(&source.url, &source.docs_path, chunking)
            .await
    }

    async fn load_and_split(
        &self,
        paths: &[PathBuf],
        chunking: &ChunkingConfig,
    ) -> Result<Vec<DocumentChunk>> {
        load_and_split(paths, chunking).await
    }
}

/// Read and split standalone files. Each file is its own source.
pub async fn load_and_split(
    paths: &[PathBuf],
    chunking: &ChunkingConfig,
) -> Result<Vec<DocumentChunk>> {
    let mut chunks = Vec::new();
    for path in paths {
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| PrebuildError::io(path, e))?;
        let pieces = splitter::split(&text, TextKind::for_path(path), chunking)?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        debug!(path = %path.display(), chunks = pieces.len(), "split file");
        chunks.extend(chunk::from_pieces(
            &path.to_string_lossy(),
            &file_name,
            pieces,
        ));
    }
    Ok(chunks)
}

async fn git_clone(repo_url: &str, checkout: &Path) -> Result<()> {
    if tokio::fs::try_exists(checkout).await.unwrap_or(false) {
        debug!(path = %checkout.display(), "removing previous checkout");
        tokio::fs::remove_dir_all(checkout)
            .await
            .map_err(|e| PrebuildError::io(checkout, e))?;
    }
    if let Some(parent) = checkout.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| PrebuildError::io(parent, e))?;
    }

    info!(url = %repo_url, path = %checkout.display(), "cloning repository");
    let output = Command::new("git")
        .args(["clone", "--depth", "1", "--quiet", repo_url])
        .arg(checkout)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await
        .map_err(|e| PrebuildError::Clone {
            url: repo_url.to_string(),
            message: format!("could not run git: {e}"),
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        warn!(url = %repo_url, stderr = %stderr.trim(), "git clone failed");
        return Err(PrebuildError::Clone {
            url: repo_url.to_string(),
            message: format!("git exited with {}: {}", output.status, stderr.trim()),
        });
    }
    Ok(())
}

/// Load every markdown file under `checkout/docs_path`, in path order.
async fn load_docs_dir(
    repo_url: &str,
    checkout: &Path,
    docs_path: &Path,
    chunking: &ChunkingConfig,
) -> Result<Vec<DocumentChunk>> {
    let missing = || PrebuildError::DocsPathMissing {
        url: repo_url.to_string(),
        path: docs_path.to_path_buf(),
    };
    if docs_path.is_absolute() {
        return Err(missing());
    }
    let docs_root = checkout.join(docs_path);
    if !docs_root.is_dir() {
        return Err(missing());
    }

    let files = tokio::task::spawn_blocking(move || collect_markdown_files(&docs_root)).await??;

    let mut chunks = Vec::new();
    for file in &files {
        let text = tokio::fs::read_to_string(file)
            .await
            .map_err(|e| PrebuildError::io(file, e))?;
        let pieces = splitter::split(&text, TextKind::Markdown, chunking)?;
        let rel_path = file.strip_prefix(checkout).unwrap_or(file);
        chunks.extend(chunk::from_pieces(
            repo_url,
            &rel_path.to_string_lossy(),
            pieces,
        ));
    }
    info!(url = %repo_url, files = files.len(), chunks = chunks.len(), "loaded repository docs");
    Ok(chunks)
}

/// Markdown files under `root` in path order. Symlinks are not followed and
/// hidden directories (`.git`, `.github`, ...) are skipped.
fn collect_markdown_files(root: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| entry.depth() == 0 || !is_hidden_dir(entry))
    {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(root).to_path_buf();
            PrebuildError::io(path, e.into())
        })?;
        if entry.file_type().is_file() && TextKind::for_path(entry.path()) == TextKind::Markdown {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

fn is_hidden_dir(entry: &DirEntry) -> bool {
    entry.file_type().is_dir()
        && entry
            .file_name()
            .to_str()
            .is_some_and(|name| name.starts_with('.'))
}

/// `https://github.com/krkn-chaos/krkn-hub.git` -> `krkn-hub`
fn repo_dir_name(repo_url: &str) -> String {
    let name = repo_url
        .trim_end_matches('/')
        .rsplit(['/', ':'])
        .next()
        .unwrap_or_default()
        .trim_end_matches(".git");
    if name.is_empty() {
        "repo".to_string()
    } else {
        name.to_string()
    }
}
