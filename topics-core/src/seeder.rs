use crate::TopicStore;
use crate::census::census_parent;
use crate::id::{IdConfig, IdGenerator};
use crate::model::{Content, ContentView, NewTopic, RootTopic, State, Topic, TopicId, TopicView};
use crate::result::{SeedError, SeedResult, StoreResult};
use error_stack::{IntoReport, ResultExt};
use itertools::Itertools;
use serde::Serialize;
use std::io::Write;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

pub const DEFAULT_API_URL: &str = "http://localhost:25300/topics";
pub const ROOT_TOPIC_ID: &str = "topic_root";
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct SeedConfig {
    /// print every constructed document before anything is written
    pub verbose: bool,
    /// `false` builds and prints the batch without writing it
    pub insert: bool,
    /// attach the new parent topic under the root topic
    pub link_root: bool,
    pub root_id: TopicId,
    pub api_url: String,
    pub parent: NewTopic,
    pub id: IdConfig,
    pub store_timeout: Duration,
}

impl Default for SeedConfig {
    fn default() -> Self {
        Self {
            verbose: false,
            insert: true,
            link_root: false,
            root_id: TopicId::new(ROOT_TOPIC_ID),
            api_url: DEFAULT_API_URL.to_string(),
            parent: census_parent(),
            id: IdConfig::default(),
            store_timeout: DEFAULT_STORE_TIMEOUT,
        }
    }
}

impl SeedConfig {
    pub fn validate(&self) -> SeedResult<()> {
        if self.store_timeout.is_zero() {
            return Err(SeedError::InvalidConfig.into_report())
                .attach("store timeout must be greater than zero");
        }
        self.id.validate()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedEntry {
    pub topic: Topic,
    pub content: Content,
}

/// Everything one run writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedBatch {
    /// in input order
    pub children: Vec<SeedEntry>,
    pub parent: SeedEntry,
    /// the root topic with the parent already appended to its `subtopics_ids`
    pub root: Option<RootTopic>,
}

impl SeedBatch {
    /// Number of store writes needed to persist this batch.
    pub fn operation_count(&self) -> usize {
        (self.children.len() + 1) * 2 + usize::from(self.root.is_some())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedOutcome {
    pub parent_id: TopicId,
    pub child_ids: Vec<TopicId>,
    pub documents_written: usize,
    pub root_linked: bool,
    pub dry_run: bool,
}

pub fn create_content(id: TopicId) -> Content {
    Content {
        id,
        current: ContentView {
            state: State::Published,
        },
        next: ContentView {
            state: State::Published,
        },
    }
}

pub struct Seeder<S> {
    store: S,
    config: SeedConfig,
    ids: IdGenerator,
}

impl<S> Seeder<S>
where
    S: TopicStore,
{
    pub fn new(store: S, config: SeedConfig) -> SeedResult<Self> {
        config.validate()?;
        let ids = IdGenerator::new(&config.id)?;
        Ok(Self::with_id_generator(store, config, ids))
    }

    pub fn with_id_generator(store: S, config: SeedConfig, ids: IdGenerator) -> Self {
        Self { store, config, ids }
    }

    /// Builds a published leaf topic under a fresh id. Callers that need a branch call
    /// [`Topic::make_branch`] on the result.
    #[instrument(skip_all, name = "seeder#create_topic", fields(title = %new_topic.title))]
    pub async fn create_topic(&mut self, new_topic: &NewTopic) -> SeedResult<Topic> {
        let id = self
            .ids
            .generate(&self.store, self.config.store_timeout)
            .await
            .attach_with(|| format!("creating topic '{}'", new_topic.title))?;

        let view = TopicView::published(&self.config.api_url, &id, new_topic);
        Ok(Topic::new(id, view.clone(), view))
    }

    /// Builds the whole batch without writing anything. Fails with
    /// [`SeedError::PreconditionMissing`] when root linking is on and the root topic is absent.
    #[instrument(skip_all, name = "seeder#plan")]
    pub async fn plan(&mut self, subtopics: &[NewTopic]) -> SeedResult<SeedBatch> {
        let mut root = if self.config.link_root {
            Some(self.find_root().await?)
        } else {
            None
        };

        let parent_input = self.config.parent.clone();
        let mut parent = self.create_topic(&parent_input).await?;
        parent.make_branch(&self.config.api_url);

        if let Some(root) = root.as_mut() {
            root.add_subtopic(parent.id.clone());
            debug!("staged {} under root {}", parent.id, root.id);
        }

        let mut children = Vec::with_capacity(subtopics.len());
        for new_topic in subtopics {
            let topic = self.create_topic(new_topic).await?;
            let content = create_content(topic.id.clone());
            parent.add_subtopic(topic.id.clone());
            children.push(SeedEntry { topic, content });
        }

        let content = create_content(parent.id.clone());
        Ok(SeedBatch {
            children,
            parent: SeedEntry {
                topic: parent,
                content,
            },
            root,
        })
    }

    #[instrument(skip_all, name = "seeder#run")]
    pub async fn run(&mut self, subtopics: &[NewTopic]) -> SeedResult<SeedOutcome> {
        let batch = self.plan(subtopics).await?;

        if self.config.verbose {
            if let Err(e) = print_batch(&batch, &mut std::io::stdout().lock()) {
                warn!("failed to print seed documents: {e}");
            }
        }

        let parent_id = batch.parent.topic.id.clone();
        let child_ids = batch
            .children
            .iter()
            .map(|e| e.topic.id.clone())
            .collect::<Vec<_>>();
        let root_linked = batch.root.is_some();

        if !self.config.insert {
            info!(
                "dry run: built parent {parent_id} with {} subtopics, nothing written",
                child_ids.len()
            );
            return Ok(SeedOutcome {
                parent_id,
                child_ids,
                documents_written: 0,
                root_linked: false,
                dry_run: true,
            });
        }

        let operations = batch.operation_count();
        let limit = self
            .config
            .store_timeout
            .saturating_mul(u32::try_from(operations).unwrap_or(u32::MAX));

        bounded(
            limit,
            "batch write",
            SeedError::StoreWriteFailure,
            self.store.write_batch(batch),
        )
        .await?;

        info!(
            "seeded parent {parent_id} with subtopics [{}]",
            child_ids.iter().join(", ")
        );
        if root_linked {
            info!("linked {parent_id} under root {}", self.config.root_id);
        }

        Ok(SeedOutcome {
            parent_id,
            child_ids,
            documents_written: operations,
            root_linked,
            dry_run: false,
        })
    }

    async fn find_root(&self) -> SeedResult<RootTopic> {
        let root_id = self.config.root_id.clone();
        let root = bounded(
            self.config.store_timeout,
            "root topic lookup",
            SeedError::StoreReadFailure,
            self.store.find_root(root_id.clone()),
        )
        .await?;

        root.ok_or(SeedError::PreconditionMissing)
            .attach_with(|| format!("root topic '{root_id}' must be seeded before linking"))
    }
}

/// Writes every document of the batch as one line of JSON, in the order it would be persisted.
pub fn print_batch(batch: &SeedBatch, out: &mut impl Write) -> std::io::Result<()> {
    for entry in &batch.children {
        print_document(out, "New subtopic document", &entry.topic)?;
        print_document(out, "New content document", &entry.content)?;
    }
    print_document(out, "New parent topic document", &batch.parent.topic)?;
    print_document(out, "New parent content document", &batch.parent.content)?;
    if let Some(root) = &batch.root {
        print_document(out, "Updated root topic document", root)?;
    }
    Ok(())
}

fn print_document<T>(out: &mut impl Write, label: &str, document: &T) -> std::io::Result<()>
where
    T: Serialize,
{
    writeln!(out, "{label}")?;
    serde_json::to_writer(&mut *out, document)?;
    writeln!(out)
}

/// Runs a store operation with a deadline, reporting both failure and timeout as `context`.
pub(crate) async fn bounded<T, F>(
    limit: Duration,
    operation: &'static str,
    context: SeedError,
    fut: F,
) -> SeedResult<T>
where
    F: Future<Output = StoreResult<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result
            .change_context(context)
            .attach_with(|| format!("{operation} failed")),
        Err(_) => Err(context.into_report())
            .attach_with(|| format!("{operation} timed out after {limit:?}")),
    }
}
