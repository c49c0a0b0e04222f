use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::bson::{doc, oid::ObjectId, Bson, DateTime, Document};
use mongodb::{Client, Collection};
use thiserror::Error;

use crate::config::Settings;

pub type RawDocument = Document;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("MongoDB driver error: {0}")]
    Driver(#[from] mongodb::error::Error),
}

/// Read side of the service: where unprocessed documents come from and where
/// the consumed marker is written back.
#[async_trait]
pub trait SourceStore: Send + Sync {
    /// Fetches up to `limit` documents not yet carrying the marker.
    /// Store failures surface as an empty batch, not an error.
    async fn fetch_unprocessed(&self, limit: usize) -> Vec<RawDocument>;

    /// Stamps the marker field on the given ids and returns how many
    /// documents were actually modified.
    async fn mark_processed(&self, ids: &[ObjectId]) -> u64;

    async fn ping(&self) -> bool;
}

pub struct MongoSource {
    client: Client,
    collection: Collection<Document>,
    mark_field: String,
    mark_enabled: bool,
}

impl MongoSource {
    /// Fails only on an unparseable URI; an unreachable server is reported
    /// per-operation so the service can start while the store is down.
    pub async fn connect(settings: &Settings) -> crate::Result<Self> {
        let client = Client::with_uri_str(&settings.mongo_uri)
            .await
            .map_err(SourceError::from)?;
        let collection = client
            .database(&settings.mongo_db)
            .collection::<Document>(&settings.mongo_collection);

        let source = Self {
            client,
            collection,
            mark_field: settings.mark_field.clone(),
            mark_enabled: settings.mark_processed,
        };
        if source.ping().await {
            tracing::info!(
                db = %settings.mongo_db,
                collection = %settings.mongo_collection,
                "connected to source store"
            );
        } else {
            tracing::error!("source store unreachable; fetches return nothing until it recovers");
        }
        Ok(source)
    }
}

#[async_trait]
impl SourceStore for MongoSource {
    async fn fetch_unprocessed(&self, limit: usize) -> Vec<RawDocument> {
        let filter = unprocessed_filter(&self.mark_field);
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);

        let mut cursor = match self.collection.find(filter).limit(limit).await {
            Ok(cursor) => cursor,
            Err(err) => {
                tracing::error!(%err, "failed to query unprocessed documents");
                return Vec::new();
            }
        };

        let mut batch = Vec::new();
        loop {
            match cursor.try_next().await {
                Ok(Some(doc)) => batch.push(doc),
                Ok(None) => break,
                Err(err) => {
                    tracing::error!(%err, "cursor failed while draining batch");
                    return Vec::new();
                }
            }
        }
        tracing::debug!(count = batch.len(), "fetched unprocessed documents");
        batch
    }

    async fn mark_processed(&self, ids: &[ObjectId]) -> u64 {
        if ids.is_empty() {
            return 0;
        }
        if !self.mark_enabled {
            tracing::debug!(count = ids.len(), "marking disabled; documents left unconsumed");
            return 0;
        }

        let id_list: Vec<Bson> = ids.iter().map(|id| Bson::ObjectId(*id)).collect();
        let query = doc! { "_id": { "$in": id_list } };

        match self.collection.update_many(query, mark_update(&self.mark_field)).await {
            Ok(result) => {
                if result.matched_count < ids.len() as u64 {
                    tracing::warn!(
                        requested = ids.len(),
                        matched = result.matched_count,
                        "some documents were not found during marking"
                    );
                }
                tracing::debug!(
                    matched = result.matched_count,
                    modified = result.modified_count,
                    "marked documents as processed"
                );
                result.modified_count
            }
            Err(err) => {
                tracing::error!(%err, "failed to mark documents as processed");
                0
            }
        }
    }

    async fn ping(&self) -> bool {
        self.client
            .database("admin")
            .run_command(doc! { "ping": 1 })
            .await
            .is_ok()
    }
}

// Anything without the marker set to `true` counts as unprocessed, including
// documents that predate the marker field.
fn unprocessed_filter(mark_field: &str) -> Document {
    let mut filter = Document::new();
    filter.insert(mark_field, doc! { "$ne": true });
    filter
}

fn mark_update(mark_field: &str) -> Document {
    let mut set = Document::new();
    set.insert(mark_field, true);
    set.insert(format!("{mark_field}_at"), DateTime::now());
    doc! { "$set": set }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unprocessed_filter_matches_absent_and_false() {
        let filter = unprocessed_filter("gleaner_processed");
        let condition = filter.get_document("gleaner_processed").unwrap();
        assert!(condition.get_bool("$ne").unwrap());
        assert_eq!(filter.len(), 1);
    }

    #[test]
    fn test_mark_update_sets_flag_and_timestamp() {
        let update = mark_update("gleaner_processed");
        let set = update.get_document("$set").unwrap();

        assert!(set.get_bool("gleaner_processed").unwrap());
        assert!(matches!(set.get("gleaner_processed_at"), Some(Bson::DateTime(_))));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_mark_update_follows_configured_field() {
        let update = mark_update("consumed");
        let set = update.get_document("$set").unwrap();
        assert!(set.contains_key("consumed"));
        assert!(set.contains_key("consumed_at"));
    }
}
