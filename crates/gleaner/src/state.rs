use std::sync::Arc;

use gleaner_core::{Processor, SinkStore, SourceStore};

use crate::scheduler::SchedulerHandle;

/// Application state shared across all requests
#[derive(Clone)]
pub struct AppState {
    /// Gateway documents are fetched from and marked in
    pub source: Arc<dyn SourceStore>,
    /// Gateway processed rows are written to
    pub sink: Arc<dyn SinkStore>,
    /// Cycle orchestrator, shared with the scheduler
    pub processor: Arc<Processor>,
    /// Present only when the periodic job was registered at startup
    pub scheduler: Option<SchedulerHandle>,
}
