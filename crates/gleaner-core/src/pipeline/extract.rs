use chrono::{DateTime, Utc};
use mongodb::bson::{Bson, Document};

use crate::models::{is_valid_source_id, ExtractedRecord};

/// Pulls the fields of interest out of one raw document.
///
/// Only a missing or malformed id rejects a document; every other field is
/// coerced to a usable default so a sparse document still produces a record.
pub fn extract(doc: &Document) -> Option<ExtractedRecord> {
    let source_id = match doc.get("_id") {
        Some(Bson::ObjectId(oid)) => oid.to_hex(),
        Some(Bson::String(s)) if is_valid_source_id(s) => s.clone(),
        _ => {
            tracing::warn!("skipping document with missing or malformed _id");
            return None;
        }
    };

    let empty = Document::new();
    let payload = doc.get_document("post").unwrap_or(&empty);
    let text = payload.get_str("text").unwrap_or_default().to_string();

    let created_at = match payload.get("created_time") {
        Some(Bson::String(raw)) => match DateTime::parse_from_rfc3339(raw) {
            Ok(ts) => Some(ts.with_timezone(&Utc)),
            Err(err) => {
                tracing::warn!(source_id = %source_id, %err, "unparseable created_time left unset");
                None
            }
        },
        Some(Bson::DateTime(ts)) => DateTime::from_timestamp_millis(ts.timestamp_millis()),
        _ => None,
    };

    Some(ExtractedRecord {
        source_id,
        source: doc.get_str("data_type").unwrap_or("unknown").to_string(),
        concept_id: opt_str(doc, "concept_id"),
        created_at,
        text,
        origin_keyword: opt_str(doc, "origin_keyword"),
        keyword_lang: opt_str(doc, "keyword_lang"),
        origin_url: opt_str(payload, "link"),
    })
}

fn opt_str(doc: &Document, key: &str) -> Option<String> {
    doc.get_str(key).ok().map(String::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson::oid::ObjectId;
    use mongodb::bson::{doc, DateTime as BsonDateTime};

    #[test]
    fn test_rejects_document_without_usable_id() {
        assert!(extract(&doc! { "data_type": "post" }).is_none());
        assert!(extract(&doc! { "_id": 42, "post": { "text": "x" } }).is_none());
        assert!(extract(&doc! { "_id": "short-string" }).is_none());
    }

    #[test]
    fn test_accepts_hex_string_id() {
        let record = extract(&doc! { "_id": "65f2a1b3c4d5e6f708192a3b" }).unwrap();
        assert_eq!(record.source_id, "65f2a1b3c4d5e6f708192a3b");
    }

    #[test]
    fn test_sparse_document_gets_defaults() {
        let id = ObjectId::new();
        let record = extract(&doc! { "_id": id }).unwrap();

        assert_eq!(record.source_id, id.to_hex());
        assert_eq!(record.source, "unknown");
        assert_eq!(record.text, "");
        assert_eq!(record.created_at, None);
        assert_eq!(record.concept_id, None);
        assert_eq!(record.origin_url, None);
    }

    #[test]
    fn test_full_document_extraction() {
        let id = ObjectId::new();
        let record = extract(&doc! {
            "_id": id,
            "data_type": "social_post",
            "concept_id": "climate",
            "origin_keyword": "ouragan",
            "keyword_lang": "fr",
            "post": {
                "text": "Il pleut beaucoup",
                "created_time": "2025-03-01T12:30:00+02:00",
                "link": "https://example.com/p/1",
            },
        })
        .unwrap();

        assert_eq!(record.source, "social_post");
        assert_eq!(record.concept_id.as_deref(), Some("climate"));
        assert_eq!(record.origin_keyword.as_deref(), Some("ouragan"));
        assert_eq!(record.keyword_lang.as_deref(), Some("fr"));
        assert_eq!(record.text, "Il pleut beaucoup");
        assert_eq!(record.origin_url.as_deref(), Some("https://example.com/p/1"));

        let created = record.created_at.unwrap();
        assert_eq!(created.to_rfc3339(), "2025-03-01T10:30:00+00:00");
    }

    #[test]
    fn test_native_datetime_accepted() {
        let id = ObjectId::new();
        let millis = 1_740_000_000_000_i64;
        let record = extract(&doc! {
            "_id": id,
            "post": { "text": "x", "created_time": BsonDateTime::from_millis(millis) },
        })
        .unwrap();

        assert_eq!(record.created_at.unwrap().timestamp_millis(), millis);
    }

    #[test]
    fn test_bad_timestamp_is_dropped_not_fatal() {
        let id = ObjectId::new();
        let record = extract(&doc! {
            "_id": id,
            "post": { "text": "still here", "created_time": "last tuesday" },
        })
        .unwrap();

        assert_eq!(record.created_at, None);
        assert_eq!(record.text, "still here");
    }

    #[test]
    fn test_non_string_text_coerced_to_empty() {
        let id = ObjectId::new();
        let record = extract(&doc! { "_id": id, "post": { "text": 17 } }).unwrap();
        assert_eq!(record.text, "");
    }
}
