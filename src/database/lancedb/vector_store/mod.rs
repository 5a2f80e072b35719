
use super::{ChunkMetadata, EmbeddingRecord};
use crate::RagError;
use arrow::array::{
    Array, FixedSizeListArray, Float32Array, RecordBatchIterator, StringArray, UInt32Array,
};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use futures::TryStreamExt;
use lancedb::{
    Connection, Table,
    query::{ExecutableQuery, QueryBase},
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Name of the table holding embedded chunks
pub const TABLE_NAME: &str = "chunks";

/// Vector database store using LanceDB for similarity search.
///
/// The handle is cheap to share: every operation opens the table afresh, so
/// concurrent readers never contend on state held here.
pub struct VectorStore {
    connection: Connection,
    db_path: PathBuf,
    table_name: String,
}

/// Search result from vector similarity search
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub content: String,
    pub metadata: ChunkMetadata,
    pub distance: f32,
    pub similarity_score: f32,
}

impl VectorStore {
    /// Open the store at `db_path`, creating the directory if needed
    #[inline]
    pub async fn create_or_open(db_path: &Path) -> Result<Self, RagError> {
        std::fs::create_dir_all(db_path).map_err(|e| {
            RagError::Database(format!(
                "Failed to create vector database directory {}: {}",
                db_path.display(),
                e
            ))
        })?;

        Self::connect(db_path).await
    }

    /// Open a store that an earlier ingestion created
    #[inline]
    pub async fn open_existing(db_path: &Path) -> Result<Self, RagError> {
        if !db_path.is_dir() {
            return Err(RagError::Database(format!(
                "No vector store found at {}. Run the ingest command first.",
                db_path.display()
            )));
        }

        Self::connect(db_path).await
    }

    async fn connect(db_path: &Path) -> Result<Self, RagError> {
        debug!("Connecting to LanceDB at path: {:?}", db_path);

        let uri = db_path.display().to_string();
        let connection = lancedb::connect(&uri)
            .execute()
            .await
            .map_err(|e| RagError::Database(format!("Failed to connect to LanceDB: {}", e)))?;

        info!("Vector store opened at {}", db_path.display());
        Ok(Self {
            connection,
            db_path: db_path.to_path_buf(),
            table_name: TABLE_NAME.to_string(),
        })
    }

    /// Directory backing this store
    #[inline]
    pub fn path(&self) -> &Path {
        &self.db_path
    }

    /// Whether anything has been ingested yet
    #[inline]
    pub async fn table_exists(&self) -> Result<bool, RagError> {
        let table_names = self
            .connection
            .table_names()
            .execute()
            .await
            .map_err(|e| RagError::Database(format!("Failed to list tables: {}", e)))?;

        Ok(table_names.contains(&self.table_name))
    }

    async fn open_table(&self) -> Result<Table, RagError> {
        self.connection
            .open_table(&self.table_name)
            .execute()
            .await
            .map_err(|e| RagError::Database(format!("Failed to open table: {}", e)))
    }

    /// Vector dimension of the existing table, if there is one
    #[inline]
    pub async fn vector_dimension(&self) -> Result<Option<usize>, RagError> {
        if !self.table_exists().await? {
            return Ok(None);
        }

        let schema = self
            .open_table()
            .await?
            .schema()
            .await
            .map_err(|e| RagError::Database(format!("Failed to get table schema: {}", e)))?;

        for field in schema.fields() {
            if field.name() == "vector" {
                if let DataType::FixedSizeList(_, size) = field.data_type() {
                    return Ok(Some(*size as usize));
                }
            }
        }

        Err(RagError::Database(
            "Could not find vector column or determine dimension".to_string(),
        ))
    }

    /// Create schema with the specified vector dimension
    fn create_schema(vector_dim: usize) -> Arc<Schema> {
        Arc::new(Schema::new(vec![
            Field::new("id", DataType::Utf8, false),
            Field::new(
                "vector",
                DataType::FixedSizeList(
                    Arc::new(Field::new("item", DataType::Float32, false)),
                    vector_dim as i32,
                ),
                false,
            ),
            Field::new("content", DataType::Utf8, false),
            Field::new("source", DataType::Utf8, false),
            Field::new("page", DataType::UInt32, false),
            Field::new("chunk_index", DataType::UInt32, false),
            Field::new("embedding_model", DataType::Utf8, false),
            Field::new("created_at", DataType::Utf8, false),
        ]))
    }

    /// Store all records in a single append.
    ///
    /// Either every record lands or none do: if the append fails, a table
    /// created by this call is dropped again.
    #[inline]
    pub async fn store_embeddings_batch(
        &self,
        records: Vec<EmbeddingRecord>,
    ) -> Result<usize, RagError> {
        if records.is_empty() {
            debug!("No embeddings to store");
            return Ok(0);
        }

        let vector_dim = records[0].vector.len();
        if vector_dim == 0 {
            return Err(RagError::Database("Cannot store empty vectors".to_string()));
        }
        if let Some(bad) = records.iter().find(|r| r.vector.len() != vector_dim) {
            return Err(RagError::Database(format!(
                "Inconsistent vector dimensions in batch: expected {}, record {} has {}",
                vector_dim,
                bad.id,
                bad.vector.len()
            )));
        }

        let created_table = match self.vector_dimension().await? {
            Some(existing) if existing != vector_dim => {
                return Err(RagError::Database(format!(
                    "Vector dimension mismatch: store has {} dimensions but batch has {}. \
                     Was the store built with a different embedding model?",
                    existing, vector_dim
                )));
            }
            Some(_) => false,
            None => {
                info!("Creating {} table with {} dimensions", self.table_name, vector_dim);
                self.connection
                    .create_empty_table(&self.table_name, Self::create_schema(vector_dim))
                    .execute()
                    .await
                    .map_err(|e| RagError::Database(format!("Failed to create table: {}", e)))?;
                true
            }
        };

        let count = records.len();
        if let Err(e) = self.append_records(&records, vector_dim).await {
            if created_table {
                warn!("Append failed, dropping newly created table");
                if let Err(drop_err) = self.drop_table_if_exists().await {
                    warn!("Failed to drop table after failed append: {}", drop_err);
                }
            }
            return Err(e);
        }

        info!("Successfully stored {} embeddings", count);
        Ok(count)
    }

    async fn append_records(
        &self,
        records: &[EmbeddingRecord],
        vector_dim: usize,
    ) -> Result<(), RagError> {
        let record_batch = Self::create_record_batch(records, vector_dim)?;
        let table = self.open_table().await?;

        let schema = record_batch.schema();
        let reader = RecordBatchIterator::new(std::iter::once(Ok(record_batch)), schema);
        table
            .add(reader)
            .execute()
            .await
            .map_err(|e| RagError::Database(format!("Failed to insert embeddings: {}", e)))?;

        Ok(())
    }

    /// Create a RecordBatch from embedding records
    fn create_record_batch(
        records: &[EmbeddingRecord],
        vector_dim: usize,
    ) -> Result<RecordBatch, RagError> {
        let len = records.len();

        let mut ids = Vec::with_capacity(len);
        let mut flat_values = Vec::with_capacity(len * vector_dim);
        let mut contents = Vec::with_capacity(len);
        let mut sources = Vec::with_capacity(len);
        let mut pages = Vec::with_capacity(len);
        let mut chunk_indices = Vec::with_capacity(len);
        let mut models = Vec::with_capacity(len);
        let mut created_ats = Vec::with_capacity(len);

        for record in records {
            ids.push(record.id.as_str());
            flat_values.extend_from_slice(&record.vector);
            contents.push(record.content.as_str());
            sources.push(record.metadata.source.as_str());
            pages.push(record.metadata.page);
            chunk_indices.push(record.metadata.chunk_index);
            models.push(record.embedding_model.as_str());
            created_ats.push(record.created_at.as_str());
        }

        let values_array = Float32Array::from(flat_values);
        let field = Arc::new(Field::new("item", DataType::Float32, false));
        let vector_array =
            FixedSizeListArray::try_new(field, vector_dim as i32, Arc::new(values_array), None)
                .map_err(|e| {
                    RagError::Database(format!("Failed to create vector array: {}", e))
                })?;

        let arrays: Vec<Arc<dyn Array>> = vec![
            Arc::new(StringArray::from(ids)),
            Arc::new(vector_array),
            Arc::new(StringArray::from(contents)),
            Arc::new(StringArray::from(sources)),
            Arc::new(UInt32Array::from(pages)),
            Arc::new(UInt32Array::from(chunk_indices)),
            Arc::new(StringArray::from(models)),
            Arc::new(StringArray::from(created_ats)),
        ];

        RecordBatch::try_new(Self::create_schema(vector_dim), arrays)
            .map_err(|e| RagError::Database(format!("Failed to create record batch: {}", e)))
    }

    /// Search for the `limit` nearest chunks, closest first.
    /// A store with nothing ingested yields no results.
    #[inline]
    pub async fn search_similar(
        &self,
        query_vector: &[f32],
        limit: usize,
    ) -> Result<Vec<SearchResult>, RagError> {
        debug!("Searching for similar vectors with limit: {}", limit);

        let Some(vector_dim) = self.vector_dimension().await? else {
            debug!("No {} table yet, returning no results", self.table_name);
            return Ok(Vec::new());
        };

        if query_vector.len() != vector_dim {
            return Err(RagError::Database(format!(
                "Query vector has {} dimensions but the store has {}",
                query_vector.len(),
                vector_dim
            )));
        }

        let table = self.open_table().await?;
        let mut results = table
            .vector_search(query_vector)
            .map_err(|e| RagError::Database(format!("Failed to create vector search: {}", e)))?
            .column("vector")
            .limit(limit)
            .execute()
            .await
            .map_err(|e| RagError::Database(format!("Failed to execute search: {}", e)))?;

        let mut search_results = Vec::new();
        while let Some(batch) = results
            .try_next()
            .await
            .map_err(|e| RagError::Database(format!("Failed to read result stream: {}", e)))?
        {
            search_results.extend(Self::parse_search_batch(&batch)?);
        }

        search_results.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        search_results.truncate(limit);

        debug!("Parsed {} search results", search_results.len());
        Ok(search_results)
    }

    /// Parse a single record batch from search results
    fn parse_search_batch(batch: &RecordBatch) -> Result<Vec<SearchResult>, RagError> {
        let contents = string_column(batch, "content")?;
        let sources = string_column(batch, "source")?;
        let pages = u32_column(batch, "page")?;
        let chunk_indices = u32_column(batch, "chunk_index")?;

        let distances = batch
            .column_by_name("_distance")
            .and_then(|col| col.as_any().downcast_ref::<Float32Array>());

        let results = (0..batch.num_rows())
            .map(|row| {
                let distance =
                    distances.map_or(0.0, |d| if d.is_null(row) { 0.0 } else { d.value(row) });

                SearchResult {
                    content: contents.value(row).to_string(),
                    metadata: ChunkMetadata {
                        source: sources.value(row).to_string(),
                        page: pages.value(row),
                        chunk_index: chunk_indices.value(row),
                    },
                    distance,
                    similarity_score: 1.0 / (1.0 + distance.max(0.0)),
                }
            })
            .collect();

        Ok(results)
    }

    /// Embedding model recorded by the most recent ingestion, if any
    #[inline]
    pub async fn recorded_embedding_model(&self) -> Result<Option<String>, RagError> {
        if !self.table_exists().await? {
            return Ok(None);
        }

        let mut stream = self
            .open_table()
            .await?
            .query()
            .limit(1)
            .execute()
            .await
            .map_err(|e| RagError::Database(format!("Failed to query table: {}", e)))?;

        while let Some(batch) = stream
            .try_next()
            .await
            .map_err(|e| RagError::Database(format!("Failed to read query stream: {}", e)))?
        {
            if batch.num_rows() > 0 {
                let models = string_column(&batch, "embedding_model")?;
                return Ok(Some(models.value(0).to_string()));
            }
        }

        Ok(None)
    }

    /// Get the total number of chunks stored
    #[inline]
    pub async fn count_chunks(&self) -> Result<u64, RagError> {
        if !self.table_exists().await? {
            return Ok(0);
        }

        let count = self
            .open_table()
            .await?
            .count_rows(None)
            .await
            .map_err(|e| RagError::Database(format!("Failed to count rows: {}", e)))?;

        Ok(count as u64)
    }

    /// Drop the chunks table if it exists
    #[inline]
    pub async fn drop_table_if_exists(&self) -> Result<(), RagError> {
        if self.table_exists().await? {
            info!("Dropping {} table", self.table_name);
            self.connection
                .drop_table(&self.table_name)
                .await
                .map_err(|e| RagError::Database(format!("Failed to drop table: {}", e)))?;
        }

        Ok(())
    }
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray, RagError> {
    batch
        .column_by_name(name)
        .ok_or_else(|| RagError::Database(format!("Missing {} column", name)))?
        .as_any()
        .downcast_ref::<StringArray>()
        .ok_or_else(|| RagError::Database(format!("Invalid {} column type", name)))
}

fn u32_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a UInt32Array, RagError> {
    batch
        .column_by_name(name)
        .ok_or_else(|| RagError::Database(format!("Missing {} column", name)))?
        .as_any()
        .downcast_ref::<UInt32Array>()
        .ok_or_else(|| RagError::Database(format!("Invalid {} column type", name)))
}
