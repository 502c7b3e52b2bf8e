mod chunk;
mod config;
mod document_loader;
mod embedding;
mod embedding_model_factory;
mod error;
mod krkn_docs;
mod lancedb_util;
mod prebuild;
mod splitter;

use config::PrebuildConfig;
use document_loader::GitDocumentLoader;
use embedding_model_factory::FastEmbedFactory;
use lancedb_util::LanceCollectionBuilder;
use prebuild::Prebuild;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    // stdout is reserved for progress lines
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            println!("❌ Error during vector collection pre-build: {error}");
            tracing::error!(error = %error, "pre-build failed");
            eprintln!("{error:?}");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> anyhow::Result<()> {
    let config = PrebuildConfig::from_env();
    let loader = GitDocumentLoader::new(config.clone_dir.clone())?;
    let models = FastEmbedFactory::new(config.model_dir.clone());

    let report = Prebuild::new(config, loader, models, LanceCollectionBuilder::default())
        .run()
        .await?;
    tracing::debug!(sources = ?report.per_source, total = report.total_chunks, "chunks per source");
    Ok(())
}
