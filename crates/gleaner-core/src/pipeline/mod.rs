mod clean;
mod extract;
mod lang;

pub use clean::clean;
pub use extract::extract;
pub use lang::{detect_language, Annotation, Annotator, AnnotatorError, SUPPORTED_LANGUAGES};

use std::sync::Arc;

use crate::models::ProcessedDocument;
use crate::source::RawDocument;

/// The full per-document transform: extract, clean, detect, annotate.
pub struct DocumentPipeline {
    annotator: Arc<Annotator>,
}

impl DocumentPipeline {
    #[must_use]
    pub fn new(annotator: Arc<Annotator>) -> Self {
        Self { annotator }
    }

    /// Returns `None` only when extraction rejects the document; the stages
    /// after extraction are total. A document whose language cannot be
    /// detected still comes out with its cleaned text and empty annotation.
    #[must_use]
    pub fn process(&self, doc: &RawDocument) -> Option<ProcessedDocument> {
        let record = extract(doc)?;
        let cleaned = clean(&record.text);
        let detected = detect_language(&cleaned);
        let annotation = detected
            .map(|lang| self.annotator.annotate(&cleaned, lang))
            .unwrap_or_default();

        Some(ProcessedDocument::from_record(
            record,
            detected,
            cleaned,
            annotation.tokens,
            annotation.tokens_filtered,
            annotation.lemmas,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson::{doc, oid::ObjectId};

    fn pipeline() -> DocumentPipeline {
        DocumentPipeline::new(Arc::new(Annotator::load().unwrap()))
    }

    #[test]
    fn test_process_end_to_end() {
        let id = ObjectId::new();
        let document = pipeline()
            .process(&doc! {
                "_id": id,
                "data_type": "social_post",
                "keyword_lang": " EN ",
                "post": {
                    "text": "<p>The gardens are still growing quickly this year!</p> see https://example.com #garden",
                },
            })
            .unwrap();

        assert_eq!(document.source_id, id.to_hex());
        assert_eq!(document.cleaned_text, "The gardens are still growing quickly this year see");
        assert_eq!(document.detected_lang.as_deref(), Some("en"));
        assert_eq!(document.keyword_lang.as_deref(), Some("en"));
        assert!(document.tokens.contains(&"gardens".to_string()));
        assert!(document.lemmas.contains(&"garden".to_string()));
    }

    #[test]
    fn test_process_rejects_unextractable_document() {
        assert!(pipeline().process(&doc! { "post": { "text": "no id" } }).is_none());
    }

    #[test]
    fn test_short_text_skips_detection_but_keeps_row() {
        let id = ObjectId::new();
        let document = pipeline()
            .process(&doc! { "_id": id, "post": { "text": "ok!" } })
            .unwrap();

        assert_eq!(document.cleaned_text, "ok");
        assert_eq!(document.detected_lang, None);
        assert!(document.tokens.is_empty());
        assert!(document.tokens_filtered.is_empty());
        assert!(document.lemmas.is_empty());
    }
}
