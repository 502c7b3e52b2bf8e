//! The pre-build pipeline: load every source, embed, persist, verify.

use crate::chunk::DocumentChunk;
use crate::config::PrebuildConfig;
use crate::document_loader::DocumentLoader;
use crate::embedding_model_factory::EmbeddingModelFactory;
use crate::error::Result;
use crate::lancedb_util::CollectionBuilder;
use tracing::info;

/// What a successful run produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrebuildReport {
    /// Chunk counts per load call, in load order.
    pub per_source: Vec<(String, usize)>,
    pub total_chunks: usize,
    /// Row count reported by the collection, when it offers one.
    pub verified_count: Option<usize>,
}

pub struct Prebuild<L, F, B> {
    config: PrebuildConfig,
    loader: L,
    models: F,
    builder: B,
}

impl<L, F, B> Prebuild<L, F, B>
where
    L: DocumentLoader,
    F: EmbeddingModelFactory,
    B: CollectionBuilder,
{
    pub fn new(config: PrebuildConfig, loader: L, models: F, builder: B) -> Self {
        Self {
            config,
            loader,
            models,
            builder,
        }
    }

    pub async fn run(&self) -> Result<PrebuildReport> {
        let config = &self.config;
        println!("🔧 Pre-building vector collection...");

        println!(
            "📚 Loading documents from {} repositories + krknctl help...",
            config.repo_sources.len()
        );
        let mut all_splits: Vec<DocumentChunk> = Vec::new();
        let mut per_source = Vec::with_capacity(config.repo_sources.len() + 1);

        for source in &config.repo_sources {
            println!("Loading from: {}", source.url);
            let splits = self
                .loader
                .clone_and_split(source, &config.chunking)
                .await?;
            println!("Loaded {} chunks from {}", splits.len(), source.url);
            per_source.push((source.url.clone(), splits.len()));
            all_splits.extend(splits);
        }

        println!("Loading krknctl help file...");
        let help_splits = self
            .loader
            .load_and_split(std::slice::from_ref(&config.help_file), &config.chunking)
            .await?;
        println!("Loaded {} chunks from krknctl help", help_splits.len());
        per_source.push((
            config.help_file.to_string_lossy().into_owned(),
            help_splits.len(),
        ));
        all_splits.extend(help_splits);

        let total_chunks = all_splits.len();
        println!("Total document chunks: {}", total_chunks);

        println!("🔗 Loading embedding model: {}", config.embedding_model);
        let embedding_model = self.models.get_model(&config.embedding_model).await?;

        println!("💾 Building collection: {}", config.collection_name);
        let collection = self
            .builder
            .load_or_create(
                &config.collection_name,
                embedding_model,
                all_splits,
                &config.persist_dir,
            )
            .await?;

        println!("✅ Pre-build completed successfully!");
        println!("📍 Database saved to: {}", config.persist_dir.display());

        println!("🔍 Verifying collection...");
        let verified_count = collection.count().await?;
        if let Some(count) = verified_count {
            println!("✅ Collection contains {} documents", count);
        }

        info!(total_chunks, ?verified_count, "pre-build finished");
        Ok(PrebuildReport {
            per_source,
            total_chunks,
            verified_count,
        })
    }
}
