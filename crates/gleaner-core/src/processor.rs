use std::collections::HashSet;
use std::sync::Arc;

use mongodb::bson::{oid::ObjectId, Bson};
use tokio::task::JoinSet;
use tracing::Instrument;
use uuid::Uuid;

use crate::models::{is_valid_source_id, ProcessedDocument};
use crate::pipeline::DocumentPipeline;
use crate::sink::SinkStore;
use crate::source::{RawDocument, SourceStore};

/// How a processing cycle came to an end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleEnd {
    /// The source reported no more unprocessed documents.
    Drained,
    /// Annotation resources never loaded, so no work was attempted.
    AnnotatorUnavailable,
    /// The sink rejected a batch; it stays unmarked for a later retry.
    SinkFailed,
    /// A fetch returned only documents this cycle had already seen.
    NoProgress,
}

#[derive(Debug, Clone)]
pub struct CycleReport {
    pub cycle_id: Uuid,
    pub batches: usize,
    pub fetched: usize,
    pub produced: usize,
    pub failed: usize,
    pub attempted: usize,
    pub marked: u64,
    pub end: CycleEnd,
}

impl CycleReport {
    fn new(cycle_id: Uuid) -> Self {
        Self {
            cycle_id,
            batches: 0,
            fetched: 0,
            produced: 0,
            failed: 0,
            attempted: 0,
            marked: 0,
            end: CycleEnd::Drained,
        }
    }
}

/// Drives batches from the source store through the pipeline into the sink,
/// marking source documents only after their batch was handed to the sink.
pub struct Processor {
    source: Arc<dyn SourceStore>,
    sink: Arc<dyn SinkStore>,
    pipeline: Option<Arc<DocumentPipeline>>,
    batch_size: usize,
    run_guard: tokio::sync::Mutex<()>,
}

impl Processor {
    #[must_use]
    pub fn new(
        source: Arc<dyn SourceStore>,
        sink: Arc<dyn SinkStore>,
        pipeline: Option<Arc<DocumentPipeline>>,
        batch_size: usize,
    ) -> Self {
        Self {
            source,
            sink,
            pipeline,
            batch_size,
            run_guard: tokio::sync::Mutex::new(()),
        }
    }

    /// Runs one full cycle, or returns `None` when a cycle is already in
    /// flight. Cycles never overlap, whatever triggered them.
    pub async fn try_run(&self) -> Option<CycleReport> {
        let Ok(_guard) = self.run_guard.try_lock() else {
            return None;
        };

        let cycle_id = Uuid::new_v4();
        let report = self
            .run_cycle(cycle_id)
            .instrument(tracing::info_span!("cycle", id = %cycle_id))
            .await;
        Some(report)
    }

    async fn run_cycle(&self, cycle_id: Uuid) -> CycleReport {
        let mut report = CycleReport::new(cycle_id);

        let Some(pipeline) = self.pipeline.as_ref() else {
            tracing::error!("annotation resources unavailable; skipping cycle");
            report.end = CycleEnd::AnnotatorUnavailable;
            return report;
        };

        tracing::info!(batch_size = self.batch_size, "processing cycle started");
        let mut seen: HashSet<String> = HashSet::new();

        report.end = loop {
            let batch = self.source.fetch_unprocessed(self.batch_size).await;
            if batch.is_empty() {
                break CycleEnd::Drained;
            }

            // Documents that were rejected or left unmarked earlier come back
            // on the next fetch. Once a fetch brings nothing new the cycle
            // stops instead of spinning on them.
            if batch.iter().all(|doc| is_already_seen(&seen, doc)) {
                tracing::warn!(
                    count = batch.len(),
                    "fetch returned only documents already seen this cycle"
                );
                break CycleEnd::NoProgress;
            }
            for doc in &batch {
                if let Some(key) = doc_key(doc) {
                    seen.insert(key);
                }
            }

            report.batches += 1;
            report.fetched += batch.len();

            let (produced, failed) = self.transform_batch(pipeline, batch).await;
            report.produced += produced.len();
            report.failed += failed;

            if produced.is_empty() {
                continue;
            }

            match self.sink.insert_batch(&produced).await {
                Ok(0) => {
                    tracing::warn!("sink accepted no rows; batch left unmarked");
                }
                Ok(attempted) => {
                    report.attempted += attempted;
                    let ids = object_ids(&produced);
                    report.marked += self.source.mark_processed(&ids).await;
                }
                Err(err) => {
                    tracing::error!(%err, "sink rejected batch; the batch stays unmarked for retry");
                    break CycleEnd::SinkFailed;
                }
            }
        };

        tracing::info!(
            batches = report.batches,
            fetched = report.fetched,
            produced = report.produced,
            failed = report.failed,
            attempted = report.attempted,
            marked = report.marked,
            end = ?report.end,
            "processing cycle finished"
        );
        report
    }

    async fn transform_batch(
        &self,
        pipeline: &Arc<DocumentPipeline>,
        batch: Vec<RawDocument>,
    ) -> (Vec<ProcessedDocument>, usize) {
        let mut tasks = JoinSet::new();
        for doc in batch {
            let pipeline = Arc::clone(pipeline);
            tasks.spawn(async move { pipeline.process(&doc) });
        }

        let mut produced = Vec::new();
        let mut failed = 0;
        while let Some(outcome) = tasks.join_next().await {
            match outcome {
                Ok(Some(document)) => produced.push(document),
                Ok(None) => failed += 1,
                Err(err) => {
                    tracing::error!(%err, "document transform task failed");
                    failed += 1;
                }
            }
        }
        (produced, failed)
    }
}

// Key used for progress tracking. Documents with no usable id can never be
// marked, so they count as seen from the start.
fn doc_key(doc: &RawDocument) -> Option<String> {
    match doc.get("_id") {
        Some(Bson::ObjectId(oid)) => Some(oid.to_hex()),
        Some(Bson::String(s)) if is_valid_source_id(s) => Some(s.clone()),
        _ => None,
    }
}

fn is_already_seen(seen: &HashSet<String>, doc: &RawDocument) -> bool {
    doc_key(doc).is_none_or(|key| seen.contains(&key))
}

fn object_ids(records: &[ProcessedDocument]) -> Vec<ObjectId> {
    records
        .iter()
        .filter_map(|r| ObjectId::parse_str(&r.source_id).ok())
        .collect()
}
