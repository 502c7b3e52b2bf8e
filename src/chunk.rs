use serde::Serialize;
use uuid::Uuid;

/// Where a chunk came from. Stored as JSON next to the vector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChunkMetadata {
    /// Repository URL, or the local file path for standalone files.
    pub source: String,
    /// File path relative to the source.
    pub path: String,
    pub chunk_index: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentChunk {
    pub id: String,
    pub text: String,
    pub metadata: ChunkMetadata,
}

impl DocumentChunk {
    pub fn new(text: String, metadata: ChunkMetadata) -> Self {
        Self {
            id: chunk_id(&metadata),
            text,
            metadata,
        }
    }
}

/// Stable per-position id, so re-indexing the same file overwrites its rows.
pub fn chunk_id(metadata: &ChunkMetadata) -> String {
    let key = format!(
        "{}#{}#{}",
        metadata.source, metadata.path, metadata.chunk_index
    );
    Uuid::new_v5(&Uuid::NAMESPACE_URL, key.as_bytes()).to_string()
}

/// Wrap the split pieces of one file into chunks, numbered from zero.
pub fn from_pieces(source: &str, path: &str, pieces: Vec<String>) -> Vec<DocumentChunk> {
    pieces
        .into_iter()
        .enumerate()
        .map(|(chunk_index, text)| {
            DocumentChunk::new(
                text,
                ChunkMetadata {
                    source: source.to_string(),
                    path: path.to_string(),
                    chunk_index,
                },
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_stable_and_position_specific() {
        let first = from_pieces("repo", "a.md", vec!["one".into(), "two".into()]);
        let again = from_pieces("repo", "a.md", vec!["uno".into(), "dos".into()]);
        let other = from_pieces("repo", "b.md", vec!["one".into()]);

        assert_eq!(first[0].id, again[0].id);
        assert_eq!(first[1].id, again[1].id);
        assert_ne!(first[0].id, first[1].id);
        assert_ne!(first[0].id, other[0].id);
        assert_eq!(first[1].metadata.chunk_index, 1);
    }
}
