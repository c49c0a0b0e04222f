use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Postgres, QueryBuilder};
use thiserror::Error;
use tokio::sync::OnceCell;

use crate::config::Settings;
use crate::models::{is_valid_source_id, ProcessedDocument};

const POOL_MIN_CONNECTIONS: u32 = 2;
const POOL_MAX_CONNECTIONS: u32 = 10;
const POOL_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(30);

/// Upper bound on rows per INSERT statement. Each row binds 12 values and
/// Postgres rejects any statement carrying more than 65535 bind parameters.
const INSERT_CHUNK_ROWS: usize = 5000;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Write side of the service. A batch either lands as a whole or errors as
/// a whole; there is no partial acknowledgement.
#[async_trait]
pub trait SinkStore: Send + Sync {
    async fn ensure_schema(&self) -> Result<(), SinkError>;

    /// Inserts one batch and returns how many rows were submitted. Rows whose
    /// source id already exists are silently skipped by the store, so the
    /// return value counts submissions, not new rows.
    async fn insert_batch(&self, records: &[ProcessedDocument]) -> Result<usize, SinkError>;

    async fn ping(&self) -> bool;
}

pub struct PgSink {
    pool: PgPool,
    table: String,
    schema_ready: OnceCell<()>,
}

impl PgSink {
    /// Builds the pool without touching the network; connections open on
    /// first use, so this fails only on an unparseable URI.
    pub fn connect(settings: &Settings) -> crate::Result<Self> {
        let pool = PgPoolOptions::new()
            .min_connections(POOL_MIN_CONNECTIONS)
            .max_connections(POOL_MAX_CONNECTIONS)
            .acquire_timeout(POOL_ACQUIRE_TIMEOUT)
            .connect_lazy(&settings.pg_uri)
            .map_err(SinkError::from)?;

        Ok(Self {
            pool,
            table: settings.pg_table.clone(),
            schema_ready: OnceCell::new(),
        })
    }
}

#[async_trait]
impl SinkStore for PgSink {
    async fn ensure_schema(&self) -> Result<(), SinkError> {
        self.schema_ready
            .get_or_try_init(|| async {
                sqlx::raw_sql(&init_sql(&self.table)).execute(&self.pool).await?;
                tracing::info!(table = %self.table, "sink schema ready");
                Ok::<_, SinkError>(())
            })
            .await?;
        Ok(())
    }

    async fn insert_batch(&self, records: &[ProcessedDocument]) -> Result<usize, SinkError> {
        if records.is_empty() {
            return Ok(0);
        }
        self.ensure_schema().await?;

        let rows: Vec<InsertRow> = records.iter().filter_map(prepare_row).collect();
        if rows.is_empty() {
            tracing::warn!(rejected = records.len(), "batch had no insertable rows");
            return Ok(0);
        }
        let attempted = rows.len();

        // Statements are chunked so none exceeds the bind parameter cap; the
        // surrounding transaction keeps the batch all-or-nothing.
        let mut tx = self.pool.begin().await?;
        let mut inserted: u64 = 0;
        for chunk in rows.chunks(INSERT_CHUNK_ROWS) {
            let mut builder = insert_builder(&self.table, chunk);
            let result = builder.build().execute(&mut *tx).await?;
            inserted += result.rows_affected();
        }
        tx.commit().await?;

        tracing::debug!(attempted, inserted, "batch insert complete");
        Ok(attempted)
    }

    async fn ping(&self) -> bool {
        sqlx::query_scalar::<_, i32>("SELECT 1").fetch_one(&self.pool).await.is_ok()
    }
}

fn init_sql(table: &str) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {table} (
    id SERIAL PRIMARY KEY,
    source_id VARCHAR(24) UNIQUE NOT NULL,
    source VARCHAR(255),
    concept_id VARCHAR(255),
    origin_created_at TIMESTAMPTZ,
    processed_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    origin_keyword TEXT,
    keyword_lang CHAR(2),
    detected_lang CHAR(2),
    cleaned_text TEXT,
    tokens JSONB,
    tokens_filtered JSONB,
    lemmas JSONB,
    origin_url TEXT
);

CREATE INDEX IF NOT EXISTS idx_{table}_processed_at ON {table} (processed_at);
CREATE INDEX IF NOT EXISTS idx_{table}_detected_lang ON {table} (detected_lang);
CREATE INDEX IF NOT EXISTS idx_{table}_source ON {table} (source);
CREATE INDEX IF NOT EXISTS idx_{table}_concept_id ON {table} (concept_id);
CREATE INDEX IF NOT EXISTS idx_{table}_origin_created_at ON {table} (origin_created_at);
"
    )
}

struct InsertRow {
    source_id: String,
    source: String,
    concept_id: Option<String>,
    origin_created_at: Option<DateTime<Utc>>,
    origin_keyword: Option<String>,
    keyword_lang: Option<String>,
    detected_lang: Option<String>,
    cleaned_text: String,
    tokens: serde_json::Value,
    tokens_filtered: serde_json::Value,
    lemmas: serde_json::Value,
    origin_url: Option<String>,
}

// A bad row is dropped with a warning instead of poisoning its batch.
fn prepare_row(record: &ProcessedDocument) -> Option<InsertRow> {
    if !is_valid_source_id(&record.source_id) {
        tracing::warn!(source_id = %record.source_id, "skipping row with malformed source id");
        return None;
    }
    Some(InsertRow {
        source_id: record.source_id.clone(),
        source: record.source.clone(),
        concept_id: record.concept_id.clone(),
        origin_created_at: record.origin_created_at,
        origin_keyword: record.origin_keyword.clone(),
        keyword_lang: record.keyword_lang.clone(),
        detected_lang: record.detected_lang.clone(),
        cleaned_text: record.cleaned_text.clone(),
        tokens: json_list(&record.source_id, "tokens", &record.tokens)?,
        tokens_filtered: json_list(&record.source_id, "tokens_filtered", &record.tokens_filtered)?,
        lemmas: json_list(&record.source_id, "lemmas", &record.lemmas)?,
        origin_url: record.origin_url.clone(),
    })
}

fn json_list(source_id: &str, field: &str, values: &[String]) -> Option<serde_json::Value> {
    match serde_json::to_value(values) {
        Ok(value) => Some(value),
        Err(err) => {
            tracing::warn!(source_id = %source_id, field, %err, "unserializable list; skipping row");
            None
        }
    }
}

fn insert_builder<'a>(table: &str, rows: &'a [InsertRow]) -> QueryBuilder<'a, Postgres> {
    let mut builder = QueryBuilder::new(format!(
        "INSERT INTO {table} (source_id, source, concept_id, origin_created_at, origin_keyword, \
         keyword_lang, detected_lang, cleaned_text, tokens, tokens_filtered, lemmas, origin_url) "
    ));
    builder.push_values(rows, |mut b, row| {
        b.push_bind(&row.source_id)
            .push_bind(&row.source)
            .push_bind(&row.concept_id)
            .push_bind(&row.origin_created_at)
            .push_bind(&row.origin_keyword)
            .push_bind(&row.keyword_lang)
            .push_bind(&row.detected_lang)
            .push_bind(&row.cleaned_text)
            .push_bind(&row.tokens)
            .push_bind(&row.tokens_filtered)
            .push_bind(&row.lemmas)
            .push_bind(&row.origin_url);
    });
    builder.push(" ON CONFLICT (source_id) DO NOTHING");
    builder
}
