use crate::chunk::DocumentChunk;
use crate::error::{PrebuildError, Result};
use async_trait::async_trait;
use tracing::debug;

pub const DEFAULT_BATCH_SIZE: usize = 32;

/// A loaded embedding model.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// One vector per input text, in input order.
    async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>>;
}

/// Embed every chunk, `batch_size` texts per model call.
///
/// Fails when the model returns the wrong number of vectors or when the
/// vector width changes between batches.
pub async fn embed_chunks(
    embedder: &dyn Embedder,
    chunks: &[DocumentChunk],
    batch_size: usize,
) -> Result<Vec<Vec<f32>>> {
    let batch_size = batch_size.max(1);
    let mut embeddings: Vec<Vec<f32>> = Vec::with_capacity(chunks.len());

    for (batch_index, batch) in chunks.chunks(batch_size).enumerate() {
        let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
        let vectors = embedder.embed(texts).await?;
        if vectors.len() != batch.len() {
            return Err(PrebuildError::Embedding(format!(
                "model returned {} vectors for {} texts",
                vectors.len(),
                batch.len()
            )));
        }

        let dimension = embeddings.first().or(vectors.first()).map(Vec::len);
        if let Some(bad) = vectors.iter().find(|v| Some(v.len()) != dimension) {
            return Err(PrebuildError::Embedding(format!(
                "inconsistent embedding width: {} vs {}",
                bad.len(),
                dimension.unwrap_or_default()
            )));
        }

        debug!(batch = batch_index, size = batch.len(), "embedded batch");
        embeddings.extend(vectors);
    }
    Ok(embeddings)
}


#[cfg(test)]
mod tests {
    use super::testing::HashEmbedder;
    use super::*;
    use crate::chunk;
    use std::sync::atomic::Ordering;

    struct ShortEmbedder;

    #[async_trait]
    impl Embedder for ShortEmbedder {
        async fn embed(&self, _texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
            Ok(vec![vec![0.0; 4]])
        }
    }

    fn chunks(n: usize) -> Vec<DocumentChunk> {
        chunk::from_pieces("src", "doc.md", (0..n).map(|i| format!("chunk {i}")).collect())
    }

    #[tokio::test]
    async fn embeds_in_batches() {
        let embedder = HashEmbedder::new(8);
        let vectors = embed_chunks(&embedder, &chunks(70), 32).await.unwrap();

        assert_eq!(vectors.len(), 70);
        assert!(vectors.iter().all(|v| v.len() == 8));
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn no_chunks_no_calls() {
        let embedder = HashEmbedder::new(8);
        let vectors = embed_chunks(&embedder, &[], 32).await.unwrap();

        assert!(vectors.is_empty());
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn wrong_vector_count_fails() {
        let err = embed_chunks(&ShortEmbedder, &chunks(3), 32).await.unwrap_err();
        assert!(matches!(err, PrebuildError::Embedding(_)));
    }
}
