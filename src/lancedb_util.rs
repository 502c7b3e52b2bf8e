//! Persisted document collection on top of an embedded LanceDB database.

use crate::chunk::DocumentChunk;
use crate::embedding::{self, Embedder};
use crate::error::{PrebuildError, Result};
use arrow_array::cast::AsArray;
use arrow_array::types::Float32Type;
use arrow_array::{Array, ArrayRef, FixedSizeListArray, RecordBatch, RecordBatchIterator, StringArray};
use arrow_schema::{DataType, Field, Schema};
use async_trait::async_trait;
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase, Select};
use lancedb::{Connection, Table};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Rows deleted or appended per LanceDB call.
const WRITE_BATCH: usize = 512;

/// Handle to a built collection.
#[async_trait]
pub trait VectorCollection: Send + Sync {
    /// Number of stored documents, or `None` when the store cannot tell.
    async fn count(&self) -> Result<Option<usize>> {
        Ok(None)
    }
}

/// Creates a collection, or brings an existing one in line with `all_splits`.
#[async_trait]
pub trait CollectionBuilder: Send + Sync {
    async fn load_or_create(
        &self,
        collection_name: &str,
        embedding_model: Arc<dyn Embedder>,
        all_splits: Vec<DocumentChunk>,
        persist_dir: &Path,
    ) -> Result<Box<dyn VectorCollection>>;
}

pub struct LanceCollection {
    table: Table,
}

#[async_trait]
impl VectorCollection for LanceCollection {
    async fn count(&self) -> Result<Option<usize>> {
        Ok(Some(count_points(&self.table).await?))
    }
}

pub struct LanceCollectionBuilder {
    embed_batch_size: usize,
}

impl LanceCollectionBuilder {
    pub fn new(embed_batch_size: usize) -> Self {
        Self { embed_batch_size }
    }
}

impl Default for LanceCollectionBuilder {
    fn default() -> Self {
        Self::new(embedding::DEFAULT_BATCH_SIZE)
    }
}

#[async_trait]
impl CollectionBuilder for LanceCollectionBuilder {
    async fn load_or_create(
        &self,
        collection_name: &str,
        embedding_model: Arc<dyn Embedder>,
        all_splits: Vec<DocumentChunk>,
        persist_dir: &Path,
    ) -> Result<Box<dyn VectorCollection>> {
        if all_splits.is_empty() {
            return Err(PrebuildError::NoChunks);
        }

        info!(chunks = all_splits.len(), "embedding document chunks");
        let embeddings =
            embedding::embed_chunks(embedding_model.as_ref(), &all_splits, self.embed_batch_size)
                .await?;
        let vector_size = embeddings.first().map(Vec::len).unwrap_or_default();

        let connection = connect(persist_dir).await?;
        let table =
            create_collection_if_not_exists(&connection, collection_name, vector_size).await?;
        upsert_chunks(&table, &all_splits, &embeddings).await?;
        let removed = remove_stale_chunks(&table, &all_splits).await?;
        if removed > 0 {
            info!(removed, "removed chunks no longer produced by the sources");
        }

        Ok(Box::new(LanceCollection { table }))
    }
}

/// Open (creating the directory if needed) the database at `persist_dir`.
pub async fn connect(persist_dir: &Path) -> Result<Connection> {
    tokio::fs::create_dir_all(persist_dir)
        .await
        .map_err(|e| PrebuildError::io(persist_dir, e))?;
    Ok(lancedb::connect(&persist_dir.to_string_lossy())
        .execute()
        .await?)
}

pub async fn collection_exists(connection: &Connection, collection_name: &str) -> Result<bool> {
    let names = connection.table_names().execute().await?;
    Ok(names.iter().any(|name| name == collection_name))
}

/// Open `collection_name`, or create it empty with `vector_size`-wide
/// embeddings. An existing collection must have the same width.
pub async fn create_collection_if_not_exists(
    connection: &Connection,
    collection_name: &str,
    vector_size: usize,
) -> Result<Table> {
    if collection_exists(connection, collection_name).await? {
        let table = connection.open_table(collection_name).execute().await?;
        let existing = embedding_width(&table).await?;
        if existing != Some(vector_size) {
            return Err(PrebuildError::DimensionMismatch {
                collection: collection_name.to_string(),
                expected: existing.unwrap_or_default(),
                actual: vector_size,
            });
        }
        println!(
            "'{}' collection already exists; updating it in place",
            collection_name
        );
        Ok(table)
    } else {
        let schema = Arc::new(schema(vector_size)?);
        let batches =
            RecordBatchIterator::new(Vec::<RecordBatch>::new().into_iter().map(Ok), schema);
        let table = connection
            .create_table(collection_name, Box::new(batches))
            .execute()
            .await?;
        println!("created collection '{}'", collection_name);
        Ok(table)
    }
}

/// Write chunks with their embeddings, replacing rows that share an id.
pub async fn upsert_chunks(
    table: &Table,
    chunks: &[DocumentChunk],
    embeddings: &[Vec<f32>],
) -> Result<()> {
    if chunks.len() != embeddings.len() {
        return Err(PrebuildError::Embedding(format!(
            "{} embeddings for {} chunks",
            embeddings.len(),
            chunks.len()
        )));
    }
    let Some(vector_size) = embeddings.first().map(Vec::len) else {
        return Ok(());
    };
    let schema = Arc::new(schema(vector_size)?);

    for (chunk_batch, embedding_batch) in chunks
        .chunks(WRITE_BATCH)
        .zip(embeddings.chunks(WRITE_BATCH))
    {
        table
            .delete(&id_predicate(chunk_batch.iter().map(|c| c.id.as_str())))
            .await?;

        let batch = record_batch(schema.clone(), chunk_batch, embedding_batch, vector_size)?;
        let batches = RecordBatchIterator::new(vec![Ok(batch)], schema.clone());
        table.add(Box::new(batches)).execute().await?;
        debug!(rows = chunk_batch.len(), "wrote batch");
    }
    Ok(())
}

/// Delete every row whose id is not among `chunks`, so the collection holds
/// exactly the latest run's output. Returns the number of rows removed.
pub async fn remove_stale_chunks(table: &Table, chunks: &[DocumentChunk]) -> Result<usize> {
    let current: HashSet<&str> = chunks.iter().map(|c| c.id.as_str()).collect();
    let stale: Vec<String> = list_ids(table)
        .await?
        .into_iter()
        .filter(|id| !current.contains(id.as_str()))
        .collect();

    for batch in stale.chunks(WRITE_BATCH) {
        table
            .delete(&id_predicate(batch.iter().map(String::as_str)))
            .await?;
    }
    Ok(stale.len())
}

async fn list_ids(table: &Table) -> Result<Vec<String>> {
    let batches: Vec<RecordBatch> = table
        .query()
        .select(Select::columns(&["id"]))
        .execute()
        .await?
        .try_collect()
        .await?;

    let mut ids = Vec::new();
    for batch in batches {
        if let Some(id_col) = batch.column_by_name("id") {
            let values = id_col.as_string::<i32>();
            for index in 0..values.len() {
                if values.is_valid(index) {
                    ids.push(values.value(index).to_string());
                }
            }
        }
    }
    Ok(ids)
}

pub async fn count_points(table: &Table) -> Result<usize> {
    Ok(table.count_rows(None).await?)
}

fn schema(vector_size: usize) -> Result<Schema> {
    let width = i32::try_from(vector_size).map_err(|_| {
        PrebuildError::Embedding(format!("embedding width {vector_size} is too large"))
    })?;
    Ok(Schema::new(vec![
        Field::new("id", DataType::Utf8, false),
        Field::new("text", DataType::Utf8, false),
        Field::new("metadata", DataType::Utf8, false),
        Field::new(
            "embedding",
            DataType::FixedSizeList(Arc::new(Field::new("item", DataType::Float32, true)), width),
            false,
        ),
    ]))
}

async fn embedding_width(table: &Table) -> Result<Option<usize>> {
    let schema = table.schema().await?;
    let width = schema
        .field_with_name("embedding")
        .ok()
        .and_then(|field| match field.data_type() {
            DataType::FixedSizeList(_, size) => usize::try_from(*size).ok(),
            _ => None,
        });
    Ok(width)
}

fn record_batch(
    schema: Arc<Schema>,
    chunks: &[DocumentChunk],
    embeddings: &[Vec<f32>],
    vector_size: usize,
) -> Result<RecordBatch> {
    let ids = StringArray::from_iter_values(chunks.iter().map(|c| c.id.as_str()));
    let texts = StringArray::from_iter_values(chunks.iter().map(|c| c.text.as_str()));
    let metadata = chunks
        .iter()
        .map(|c| serde_json::to_string(&c.metadata))
        .collect::<std::result::Result<Vec<_>, _>>()?;
    let metadata = StringArray::from(metadata);
    let vectors = FixedSizeListArray::from_iter_primitive::<Float32Type, _, _>(
        embeddings
            .iter()
            .map(|v| Some(v.iter().copied().map(Some).collect::<Vec<_>>())),
        vector_size as i32,
    );

    Ok(RecordBatch::try_new(
        schema,
        vec![
            Arc::new(ids) as ArrayRef,
            Arc::new(texts) as ArrayRef,
            Arc::new(metadata) as ArrayRef,
            Arc::new(vectors) as ArrayRef,
        ],
    )?)
}

fn id_predicate<'a>(ids: impl IntoIterator<Item = &'a str>) -> String {
    let quoted = ids
        .into_iter()
        .map(|id| format!("'{}'", id.replace('\'', "''")))
        .collect::<Vec<_>>()
        .join(", ");
    format!("id IN ({quoted})")
}
