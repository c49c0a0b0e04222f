use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error("Source store error: {0}")]
    Source(#[from] crate::source::SourceError),

    #[error("Sink store error: {0}")]
    Sink(#[from] crate::sink::SinkError),

    #[error("Annotator error: {0}")]
    Annotator(#[from] crate::pipeline::AnnotatorError),
}

pub type Result<T> = std::result::Result<T, Error>;
