use model::{Content, RootTopic, Topic, TopicId};
use result::{OptStoreResult, StoreResult};
use seeder::SeedBatch;
use tracing::debug;

pub mod census;
pub mod id;
pub mod model;
pub mod result;
pub mod seeder;

/// The document store the seeder writes into. Topics and content records are both keyed by
/// their `id` field, not the store's own primary key.
pub trait TopicStore: Send + Sync {
    fn topic_exists(&self, id: TopicId) -> impl Future<Output = StoreResult<bool>> + Send;

    fn find_topic(&self, id: TopicId) -> impl Future<Output = OptStoreResult<Topic>> + Send;

    /// Reads only the id and `subtopics_ids` of a topic, so sparse records are accepted.
    fn find_root(&self, id: TopicId) -> impl Future<Output = OptStoreResult<RootTopic>> + Send;

    /// Fails with [`result::StoreError::DuplicateKey`] if a topic with the same id exists.
    fn insert_topic(&self, topic: Topic) -> impl Future<Output = StoreResult<()>> + Send;

    fn insert_content(&self, content: Content) -> impl Future<Output = StoreResult<()>> + Send;

    /// Overwrites `subtopics_ids` on both views of an existing topic, leaving the rest of
    /// the stored document alone.
    fn set_subtopics(
        &self,
        id: TopicId,
        current: Vec<TopicId>,
        next: Vec<TopicId>,
    ) -> impl Future<Output = StoreResult<()>> + Send;

    /// Persists a whole seed run. Stores that support multi-document transactions can override
    /// this to make the batch all-or-nothing.
    fn write_batch(&self, batch: SeedBatch) -> impl Future<Output = StoreResult<()>> + Send {
        write_batch_sequential(self, batch)
    }
}

/// Writes each entry's topic then its content, in batch order, then the root update.
/// Stops at the first failure; nothing already written is rolled back.
pub async fn write_batch_sequential<S>(store: &S, batch: SeedBatch) -> StoreResult<()>
where
    S: TopicStore + ?Sized,
{
    let SeedBatch {
        children,
        parent,
        root,
    } = batch;
    let entry_count = children.len() + 1;

    for entry in children.into_iter().chain(std::iter::once(parent)) {
        store.insert_topic(entry.topic).await?;
        store.insert_content(entry.content).await?;
    }

    if let Some(root) = root {
        let next = root.next.subtopics_ids.unwrap_or_default();
        let current = root.current.subtopics_ids.unwrap_or_default();
        store.set_subtopics(root.id, current, next).await?;
    }

    debug!("sequentially wrote {entry_count} topic/content pairs");
    Ok(())
}
