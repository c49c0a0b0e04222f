use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const SOURCE_ID_LEN: usize = 24;

/// Source ids are the hex form of a 12-byte object id.
#[must_use]
pub fn is_valid_source_id(id: &str) -> bool {
    id.len() == SOURCE_ID_LEN && id.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Coerces a language code to lowercase two-letter form; anything else
/// becomes `None`.
#[must_use]
pub fn normalize_lang_code(code: Option<&str>) -> Option<String> {
    let trimmed = code?.trim().to_lowercase();
    (trimmed.chars().count() == 2).then_some(trimmed)
}

/// Fields pulled out of one raw document before any text processing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedRecord {
    pub source_id: String,
    pub source: String,
    pub concept_id: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub text: String,
    pub origin_keyword: Option<String>,
    pub keyword_lang: Option<String>,
    pub origin_url: Option<String>,
}

/// One fully transformed document, ready for the sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessedDocument {
    pub source_id: String,
    pub source: String,
    pub concept_id: Option<String>,
    pub origin_created_at: Option<DateTime<Utc>>,
    pub origin_keyword: Option<String>,
    pub keyword_lang: Option<String>,
    pub detected_lang: Option<String>,
    pub cleaned_text: String,
    pub tokens: Vec<String>,
    pub tokens_filtered: Vec<String>,
    pub lemmas: Vec<String>,
    pub origin_url: Option<String>,
}

impl ProcessedDocument {
    /// Combines extraction output with pipeline output. Both language code
    /// fields are normalized here so downstream code never sees a malformed
    /// one.
    #[must_use]
    pub fn from_record(
        record: ExtractedRecord,
        detected_lang: Option<&str>,
        cleaned_text: String,
        tokens: Vec<String>,
        tokens_filtered: Vec<String>,
        lemmas: Vec<String>,
    ) -> Self {
        Self {
            source_id: record.source_id,
            source: record.source,
            concept_id: record.concept_id,
            origin_created_at: record.created_at,
            origin_keyword: record.origin_keyword,
            keyword_lang: normalize_lang_code(record.keyword_lang.as_deref()),
            detected_lang: normalize_lang_code(detected_lang),
            cleaned_text,
            tokens,
            tokens_filtered,
            lemmas,
            origin_url: record.origin_url,
        }
    }
}
