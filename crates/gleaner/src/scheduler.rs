use std::sync::Arc;
use std::time::Duration;

use gleaner_core::Processor;
use rand::Rng;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// Upper bound on the random delay added before each run, in seconds.
/// Spreads out the load when several instances share the same stores.
const JITTER_SECS: u64 = 60;

/// Handle to the periodic job. Cloning shares the same underlying task.
#[derive(Clone)]
pub struct SchedulerHandle {
    task: Arc<JoinHandle<()>>,
    token: CancellationToken,
}

impl SchedulerHandle {
    #[must_use]
    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    /// Stops the scheduler without waiting for an in-flight cycle; already
    /// inserted but unmarked batches are redelivered on the next run.
    pub fn shutdown(&self) {
        self.token.cancel();
    }
}

pub fn start(processor: Arc<Processor>, interval_minutes: u64) -> SchedulerHandle {
    let token = CancellationToken::new();
    let task = tokio::spawn(run(processor, interval_minutes, token.clone()));
    tracing::info!(interval_minutes, "scheduler started");
    SchedulerHandle { task: Arc::new(task), token }
}

async fn run(processor: Arc<Processor>, interval_minutes: u64, token: CancellationToken) {
    let period = Duration::from_secs(interval_minutes * 60);
    let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
    // A late tick fires once; ticks missed behind a long cycle are dropped
    // instead of bursting.
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            () = token.cancelled() => break,
            _ = ticker.tick() => {
                let jitter = Duration::from_secs(rand::rng().random_range(0..=JITTER_SECS));
                tokio::select! {
                    () = token.cancelled() => break,
                    () = fire(&processor, jitter) => {}
                }
            }
        }
    }
    tracing::info!("scheduler stopped");
}

async fn fire(processor: &Processor, jitter: Duration) {
    tokio::time::sleep(jitter).await;
    if processor.try_run().await.is_none() {
        tracing::warn!("previous cycle still running; this tick is skipped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gleaner_core::memory::{MemorySink, MemorySource};
    use gleaner_core::{Annotator, DocumentPipeline};

    fn idle_processor() -> Arc<Processor> {
        Arc::new(Processor::new(
            Arc::new(MemorySource::new(vec![])),
            Arc::new(MemorySink::new()),
            None,
            10,
        ))
    }

    fn annotating_processor(source: Arc<MemorySource>) -> Arc<Processor> {
        let pipeline = Arc::new(DocumentPipeline::new(Arc::new(Annotator::load().unwrap())));
        Arc::new(Processor::new(
            source,
            Arc::new(MemorySink::new()),
            Some(pipeline),
            10,
        ))
    }

    #[tokio::test]
    async fn test_handle_lifecycle() {
        let handle = start(idle_processor(), 60);
        assert!(handle.is_running());

        handle.shutdown();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!handle.is_running());
    }

    #[tokio::test]
    async fn test_clone_observes_same_task() {
        let handle = start(idle_processor(), 60);
        let other = handle.clone();

        other.shutdown();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!handle.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_elapsed_period_fires_cycle() {
        let source = Arc::new(MemorySource::new(vec![]));
        let handle = start(annotating_processor(source.clone()), 1);

        // One full period plus the worst possible jitter delay.
        tokio::time::sleep(Duration::from_secs(60 + JITTER_SECS + 1)).await;

        assert!(source.fetch_calls() >= 1);
        handle.shutdown();
    }
}
