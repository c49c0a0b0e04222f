//! In-memory store gateways with the same observable behavior as the real
//! ones, for orchestrator tests and local experiments.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use mongodb::bson::oid::ObjectId;
use tokio::sync::Mutex;

use crate::models::{is_valid_source_id, ProcessedDocument};
use crate::sink::{SinkError, SinkStore};
use crate::source::{RawDocument, SourceStore};

/// Source double backed by a vector of documents and a set of marked ids.
pub struct MemorySource {
    documents: Mutex<Vec<RawDocument>>,
    marked: Mutex<HashSet<ObjectId>>,
    mark_enabled: bool,
    fetch_delay: Duration,
    fetch_calls: AtomicUsize,
    healthy: bool,
}

impl MemorySource {
    #[must_use]
    pub fn new(documents: Vec<RawDocument>) -> Self {
        Self {
            documents: Mutex::new(documents),
            marked: Mutex::new(HashSet::new()),
            mark_enabled: true,
            fetch_delay: Duration::ZERO,
            fetch_calls: AtomicUsize::new(0),
            healthy: true,
        }
    }

    #[must_use]
    pub fn with_mark_enabled(mut self, enabled: bool) -> Self {
        self.mark_enabled = enabled;
        self
    }

    /// Delays every fetch, to hold a cycle open from a test.
    #[must_use]
    pub fn with_fetch_delay(mut self, delay: Duration) -> Self {
        self.fetch_delay = delay;
        self
    }

    #[must_use]
    pub fn with_healthy(mut self, healthy: bool) -> Self {
        self.healthy = healthy;
        self
    }

    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    pub async fn unprocessed_len(&self) -> usize {
        let documents = self.documents.lock().await;
        let marked = self.marked.lock().await;
        documents
            .iter()
            .filter(|doc| doc_oid(doc).is_none_or(|id| !marked.contains(&id)))
            .count()
    }
}

#[async_trait]
impl SourceStore for MemorySource {
    async fn fetch_unprocessed(&self, limit: usize) -> Vec<RawDocument> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        if !self.fetch_delay.is_zero() {
            tokio::time::sleep(self.fetch_delay).await;
        }
        if !self.healthy {
            return Vec::new();
        }

        let documents = self.documents.lock().await;
        let marked = self.marked.lock().await;
        documents
            .iter()
            .filter(|doc| doc_oid(doc).is_none_or(|id| !marked.contains(&id)))
            .take(limit)
            .cloned()
            .collect()
    }

    async fn mark_processed(&self, ids: &[ObjectId]) -> u64 {
        if ids.is_empty() || !self.mark_enabled {
            return 0;
        }
        let documents = self.documents.lock().await;
        let mut marked = self.marked.lock().await;

        let mut modified = 0;
        for id in ids {
            let exists = documents.iter().any(|doc| doc_oid(doc) == Some(*id));
            if exists && marked.insert(*id) {
                modified += 1;
            }
        }
        modified
    }

    async fn ping(&self) -> bool {
        self.healthy
    }
}

fn doc_oid(doc: &RawDocument) -> Option<ObjectId> {
    doc.get_object_id("_id").ok()
}

/// Sink double keyed by source id, so conflicting inserts stay invisible
/// just like they do behind `ON CONFLICT DO NOTHING`.
pub struct MemorySink {
    rows: Mutex<HashMap<String, ProcessedDocument>>,
    fail_inserts: bool,
    healthy: bool,
}

impl Default for MemorySink {
    fn default() -> Self {
        Self::new()
    }
}

impl MemorySink {
    #[must_use]
    pub fn new() -> Self {
        Self {
            rows: Mutex::new(HashMap::new()),
            fail_inserts: false,
            healthy: true,
        }
    }

    /// Makes every insert fail, to simulate a sink outage.
    #[must_use]
    pub fn with_fail_inserts(mut self, fail: bool) -> Self {
        self.fail_inserts = fail;
        self
    }

    #[must_use]
    pub fn with_healthy(mut self, healthy: bool) -> Self {
        self.healthy = healthy;
        self
    }

    pub async fn row_count(&self) -> usize {
        self.rows.lock().await.len()
    }

    pub async fn contains(&self, source_id: &str) -> bool {
        self.rows.lock().await.contains_key(source_id)
    }
}

#[async_trait]
impl SinkStore for MemorySink {
    async fn ensure_schema(&self) -> Result<(), SinkError> {
        Ok(())
    }

    async fn insert_batch(&self, records: &[ProcessedDocument]) -> Result<usize, SinkError> {
        if self.fail_inserts {
            return Err(SinkError::Database(sqlx::Error::PoolClosed));
        }

        let mut rows = self.rows.lock().await;
        let mut attempted = 0;
        for record in records {
            if !is_valid_source_id(&record.source_id) {
                continue;
            }
            attempted += 1;
            rows.entry(record.source_id.clone())
                .or_insert_with(|| record.clone());
        }
        Ok(attempted)
    }

    async fn ping(&self) -> bool {
        self.healthy
    }
}
