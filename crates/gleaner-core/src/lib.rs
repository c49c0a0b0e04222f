pub mod config;
pub mod error;
pub mod memory;
pub mod models;
pub mod pipeline;
pub mod processor;
pub mod sink;
pub mod source;

pub use config::Settings;
pub use error::{Error, Result};
pub use models::{ExtractedRecord, ProcessedDocument};
pub use pipeline::{clean, detect_language, Annotation, Annotator, DocumentPipeline};
pub use processor::{CycleEnd, CycleReport, Processor};
pub use sink::{PgSink, SinkStore};
pub use source::{MongoSource, RawDocument, SourceStore};
