use super::{CONTENT_COLLECTION_NAME, ConnectionDetails, StoreOptions, TOPICS_COLLECTION_NAME};
use bson::{Document, doc};
use error_stack::{IntoReport, Report, ResultExt};
use mongodb::error::{Error as MongoError, ErrorKind, WriteFailure};
use mongodb::options::{ClientOptions, IndexOptions};
use mongodb::{Client, ClientSession, Collection, Database, IndexModel};
use topics_core::TopicStore;
use topics_core::model::{Content, RootTopic, Topic, TopicId};
use topics_core::result::{OptStoreResult, StoreError, StoreResult};
use topics_core::seeder::SeedBatch;
use tracing::{debug, error, instrument, warn};

const DUPLICATE_KEY_CODE: i32 = 11000;

#[derive(Debug, Clone)]
pub struct MongoTopicStore {
    client: Client,
    db: Database,
    transactional: bool,
}

impl MongoTopicStore {
    pub fn new(client: Client, options: &StoreOptions) -> Self {
        Self {
            db: client.database(&options.database),
            client,
            transactional: options.transactional,
        }
    }

    pub async fn init(
        connection_details: ConnectionDetails,
        options: StoreOptions,
    ) -> Result<MongoTopicStore, Report<StoreError>> {
        let client = match connection_details {
            ConnectionDetails::Url(url) => {
                let mut client_options = ClientOptions::parse(url.as_str())
                    .await
                    .change_context(StoreError::Connect)
                    .attach("invalid mongodb connection string")?;
                if let Some(timeout) = options.timeout {
                    client_options.server_selection_timeout = Some(timeout);
                    client_options.connect_timeout = Some(timeout);
                }
                Client::with_options(client_options).change_context(StoreError::Connect)?
            }
        };

        debug!(
            "connected to mongodb database '{}' (transactional batches: {})",
            options.database, options.transactional
        );
        Ok(Self::new(client, &options))
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Makes `id` unique in both collections so a colliding insert fails with
    /// [`StoreError::DuplicateKey`]. Existing indexes with the same keys are left as they are.
    #[instrument(skip_all, name = "mongo#ensure_indexes")]
    pub async fn ensure_indexes(&self) -> StoreResult<()> {
        for collection in [TOPICS_COLLECTION_NAME, CONTENT_COLLECTION_NAME] {
            let index = IndexModel::builder()
                .keys(doc! { "id": 1 })
                .options(IndexOptions::builder().unique(true).build())
                .build();
            self.db
                .collection::<Document>(collection)
                .create_index(index)
                .await
                .change_context(StoreError::Write)
                .attach_with(|| format!("creating unique id index on {collection}"))?;
        }
        debug!("unique id indexes in place");
        Ok(())
    }

    fn topics(&self) -> Collection<Topic> {
        self.db.collection(TOPICS_COLLECTION_NAME)
    }

    fn contents(&self) -> Collection<Content> {
        self.db.collection(CONTENT_COLLECTION_NAME)
    }

    #[instrument(skip_all, name = "mongo#write_batch_in_transaction")]
    async fn write_batch_in_transaction(&self, batch: SeedBatch) -> StoreResult<()> {
        let mut session = self
            .client
            .start_session()
            .await
            .change_context(StoreError::Transaction)?;
        session
            .start_transaction()
            .await
            .change_context(StoreError::Transaction)?;

        match self.write_in_session(&mut session, batch).await {
            Ok(()) => session
                .commit_transaction()
                .await
                .change_context(StoreError::Transaction)
                .attach("commit failed"),
            Err(e) => {
                if let Err(abort_err) = session.abort_transaction().await {
                    error!("failed to abort seed transaction: {abort_err}");
                }
                Err(e.change_context(StoreError::Transaction))
            }
        }
    }

    async fn write_in_session(
        &self,
        session: &mut ClientSession,
        batch: SeedBatch,
    ) -> StoreResult<()> {
        let SeedBatch {
            children,
            parent,
            root,
        } = batch;

        for entry in children.into_iter().chain(std::iter::once(parent)) {
            let topic_id = entry.topic.id.clone();
            self.topics()
                .insert_one(&entry.topic)
                .session(&mut *session)
                .await
                .map_err(write_error)
                .attach_with(|| format!("inserting topic {topic_id}"))?;
            self.contents()
                .insert_one(&entry.content)
                .session(&mut *session)
                .await
                .map_err(write_error)
                .attach_with(|| format!("inserting content {topic_id}"))?;
        }

        if let Some(root) = root {
            let (filter, update) = subtopics_update(
                &root.id,
                root.current.subtopics_ids.unwrap_or_default(),
                root.next.subtopics_ids.unwrap_or_default(),
            );
            let result = self
                .topics()
                .update_one(filter, update)
                .session(&mut *session)
                .await
                .map_err(write_error)?;
            if result.matched_count == 0 {
                return Err(StoreError::Write.into_report())
                    .attach_with(|| format!("root topic {} is gone", root.id));
            }
        }

        Ok(())
    }
}

impl TopicStore for MongoTopicStore {
    async fn topic_exists(&self, id: TopicId) -> StoreResult<bool> {
        self.db
            .collection::<Document>(TOPICS_COLLECTION_NAME)
            .find_one(doc! { "id": id.as_str() })
            .projection(doc! { "_id": 1 })
            .await
            .change_context(StoreError::Read)
            .map(|found| found.is_some())
    }

    async fn find_topic(&self, id: TopicId) -> OptStoreResult<Topic> {
        self.topics()
            .find_one(doc! { "id": id.as_str() })
            .await
            .change_context(StoreError::Read)
            .attach_with(|| format!("reading topic {id}"))
    }

    async fn find_root(&self, id: TopicId) -> OptStoreResult<RootTopic> {
        self.db
            .collection::<RootTopic>(TOPICS_COLLECTION_NAME)
            .find_one(doc! { "id": id.as_str() })
            .projection(doc! {
                "_id": 0,
                "id": 1,
                "current.subtopics_ids": 1,
                "next.subtopics_ids": 1,
            })
            .await
            .change_context(StoreError::Read)
            .attach_with(|| format!("reading root topic {id}"))
    }

    #[instrument(skip_all, name = "mongo#insert_topic", fields(id = %topic.id))]
    async fn insert_topic(&self, topic: Topic) -> StoreResult<()> {
        self.topics()
            .insert_one(&topic)
            .await
            .map(|_| ())
            .map_err(write_error)
    }

    #[instrument(skip_all, name = "mongo#insert_content", fields(id = %content.id))]
    async fn insert_content(&self, content: Content) -> StoreResult<()> {
        self.contents()
            .insert_one(&content)
            .await
            .map(|_| ())
            .map_err(write_error)
    }

    async fn set_subtopics(
        &self,
        id: TopicId,
        current: Vec<TopicId>,
        next: Vec<TopicId>,
    ) -> StoreResult<()> {
        let (filter, update) = subtopics_update(&id, current, next);
        let result = self
            .topics()
            .update_one(filter, update)
            .await
            .map_err(write_error)?;

        if result.matched_count == 0 {
            warn!("no topic with id {id} to update");
            return Err(StoreError::Write.into_report())
                .attach_with(|| format!("topic {id} does not exist"));
        }
        Ok(())
    }

    /// Creates the unique id indexes before the first document write of the batch.
    async fn write_batch(&self, batch: SeedBatch) -> StoreResult<()> {
        self.ensure_indexes().await?;
        if self.transactional {
            self.write_batch_in_transaction(batch).await
        } else {
            topics_core::write_batch_sequential(self, batch).await
        }
    }
}

fn subtopics_update(
    id: &TopicId,
    current: Vec<TopicId>,
    next: Vec<TopicId>,
) -> (Document, Document) {
    let current = current.into_iter().map(String::from).collect::<Vec<_>>();
    let next = next.into_iter().map(String::from).collect::<Vec<_>>();
    (
        doc! { "id": id.as_str() },
        doc! { "$set": { "current.subtopics_ids": current, "next.subtopics_ids": next } },
    )
}

fn write_error(err: MongoError) -> Report<StoreError> {
    let kind = if is_duplicate_key(&err) {
        StoreError::DuplicateKey
    } else {
        StoreError::Write
    };
    Report::new(err).change_context(kind)
}

fn is_duplicate_key(err: &MongoError) -> bool {
    matches!(
        err.kind.as_ref(),
        ErrorKind::Write(WriteFailure::WriteError(e)) if e.code == DUPLICATE_KEY_CODE
    )
}
