use crate::config::ChunkingConfig;
use crate::error::Result;
use std::path::Path;
use text_splitter::{ChunkConfig, MarkdownSplitter, TextSplitter};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextKind {
    Text,
    Markdown,
}

impl TextKind {
    pub fn for_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("md" | "markdown") => TextKind::Markdown,
            _ => TextKind::Text,
        }
    }
}

/// Split `text` into chunks of at most `chunk_size` characters, with
/// `chunk_overlap` characters shared between neighbours.
pub fn split(text: &str, kind: TextKind, chunking: &ChunkingConfig) -> Result<Vec<String>> {
    let config = ChunkConfig::new(chunking.chunk_size).with_overlap(chunking.chunk_overlap)?;
    let chunks = match kind {
        TextKind::Text => TextSplitter::new(config)
            .chunks(text)
            .map(|s| s.to_string())
            .collect(),
        TextKind::Markdown => MarkdownSplitter::new(config)
            .chunks(text)
            .map(|s| s.to_string())
            .collect(),
    };
    Ok(chunks)
}
