//! Loading static topic fixtures for local testing.

use super::TOPICS_COLLECTION_NAME;
use super::topics::MongoTopicStore;
use bson::{Document, doc};
use error_stack::{IntoReport, ResultExt};
use serde_json::Value;
use tokio_stream::StreamExt;
use topics_core::result::{StoreError, StoreResult};
use tracing::{debug, info, instrument};

/// Parses a fixture file: a JSON array of topic documents.
pub fn parse_fixture(json: &str) -> StoreResult<Vec<Document>> {
    let value: Value = serde_json::from_str(json)
        .change_context(StoreError::Write)
        .attach("fixture is not valid JSON")?;

    let Value::Array(items) = value else {
        return Err(StoreError::Write.into_report()).attach("fixture must be a JSON array");
    };

    items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            if !item.is_object() {
                return Err(StoreError::Write.into_report())
                    .attach_with(|| format!("fixture item {i} is not an object"));
            }
            bson::to_document(item)
                .change_context(StoreError::Write)
                .attach_with(|| format!("fixture item {i} is not a valid document"))
        })
        .collect()
}

impl MongoTopicStore {
    /// Inserts fixture documents into the topics collection, first removing every existing topic
    /// when `clear` is set. Returns the collection contents afterwards.
    #[instrument(skip_all, name = "mongo#load_fixture")]
    pub async fn load_fixture(
        &self,
        documents: Vec<Document>,
        clear: bool,
    ) -> StoreResult<Vec<Document>> {
        let collection = self.database().collection::<Document>(TOPICS_COLLECTION_NAME);

        if clear {
            let deleted = collection
                .delete_many(doc! {})
                .await
                .change_context(StoreError::Write)?
                .deleted_count;
            debug!("removed {deleted} existing topics");
        }

        if !documents.is_empty() {
            let inserted = collection
                .insert_many(documents)
                .await
                .change_context(StoreError::Write)?
                .inserted_ids
                .len();
            info!("inserted {inserted} fixture topics");
        }

        collection
            .find(doc! {})
            .await
            .change_context(StoreError::Read)?
            .collect::<Result<Vec<_>, _>>()
            .await
            .change_context(StoreError::Read)
    }
}
