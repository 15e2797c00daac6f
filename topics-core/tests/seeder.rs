use error_stack::IntoReport;
use rstest::{fixture, rstest};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use topics_core::TopicStore;
use topics_core::id::{IdConfig, IdGenerator};
use topics_core::model::{Content, NewTopic, RootTopic, RootView, Topic, TopicId, TopicView};
use topics_core::result::{OptStoreResult, SeedError, StoreError, StoreResult};
use topics_core::seeder::{DEFAULT_API_URL, ROOT_TOPIC_ID, SeedConfig, Seeder};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Call {
    InsertTopic(TopicId),
    InsertContent(TopicId),
    SetSubtopics(TopicId),
}

#[derive(Default)]
struct StoreState {
    topics: HashMap<TopicId, Topic>,
    /// records too sparse to read as a full topic
    sparse_roots: HashMap<TopicId, RootTopic>,
    contents: HashMap<TopicId, Content>,
    calls: Vec<Call>,
    fail_content_inserts: bool,
    hide_stored_ids: bool,
}

/// In-memory store that records every write it receives.
#[derive(Clone, Default)]
struct FakeStore {
    state: Arc<Mutex<StoreState>>,
}

impl FakeStore {
    fn with_topic_ids<'a>(ids: impl IntoIterator<Item = &'a str>) -> Self {
        let store = Self::default();
        for id in ids {
            store.put_topic(leaf(id));
        }
        store
    }

    fn put_topic(&self, topic: Topic) {
        self.state
            .lock()
            .unwrap()
            .topics
            .insert(topic.id.clone(), topic);
    }

    fn put_sparse_root(&self, root: RootTopic) {
        self.state
            .lock()
            .unwrap()
            .sparse_roots
            .insert(root.id.clone(), root);
    }

    fn failing_content_inserts(self) -> Self {
        self.state.lock().unwrap().fail_content_inserts = true;
        self
    }

    /// `topic_exists` answers false for everything, as if another writer raced this one.
    fn hiding_stored_ids(self) -> Self {
        self.state.lock().unwrap().hide_stored_ids = true;
        self
    }

    fn sparse_root(&self, id: &TopicId) -> Option<RootTopic> {
        self.state.lock().unwrap().sparse_roots.get(id).cloned()
    }

    fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    fn topic(&self, id: &TopicId) -> Option<Topic> {
        self.state.lock().unwrap().topics.get(id).cloned()
    }

    fn content_count(&self) -> usize {
        self.state.lock().unwrap().contents.len()
    }

    fn topic_count(&self) -> usize {
        self.state.lock().unwrap().topics.len()
    }
}

impl TopicStore for FakeStore {
    async fn topic_exists(&self, id: TopicId) -> StoreResult<bool> {
        let state = self.state.lock().unwrap();
        if state.hide_stored_ids {
            return Ok(false);
        }
        Ok(state.topics.contains_key(&id) || state.sparse_roots.contains_key(&id))
    }

    async fn find_topic(&self, id: TopicId) -> OptStoreResult<Topic> {
        Ok(self.topic(&id))
    }

    async fn find_root(&self, id: TopicId) -> OptStoreResult<RootTopic> {
        let state = self.state.lock().unwrap();
        if let Some(root) = state.sparse_roots.get(&id) {
            return Ok(Some(root.clone()));
        }
        Ok(state.topics.get(&id).map(|topic| RootTopic {
            id: topic.id.clone(),
            current: RootView {
                subtopics_ids: topic.current.subtopics_ids.clone(),
            },
            next: RootView {
                subtopics_ids: topic.next.subtopics_ids.clone(),
            },
        }))
    }

    async fn insert_topic(&self, topic: Topic) -> StoreResult<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::InsertTopic(topic.id.clone()));
        if state.topics.contains_key(&topic.id) {
            return Err(StoreError::DuplicateKey.into_report());
        }
        state.topics.insert(topic.id.clone(), topic);
        Ok(())
    }

    async fn insert_content(&self, content: Content) -> StoreResult<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::InsertContent(content.id.clone()));
        if state.fail_content_inserts {
            return Err(StoreError::Write.into_report());
        }
        state.contents.insert(content.id.clone(), content);
        Ok(())
    }

    async fn set_subtopics(
        &self,
        id: TopicId,
        current: Vec<TopicId>,
        next: Vec<TopicId>,
    ) -> StoreResult<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::SetSubtopics(id.clone()));
        if let Some(root) = state.sparse_roots.get_mut(&id) {
            root.current.subtopics_ids = Some(current);
            root.next.subtopics_ids = Some(next);
            return Ok(());
        }
        let topic = state
            .topics
            .get_mut(&id)
            .ok_or(StoreError::Write.into_report())?;
        topic.current.subtopics_ids = Some(current);
        topic.next.subtopics_ids = Some(next);
        Ok(())
    }
}

fn leaf(id: &str) -> Topic {
    let id = TopicId::new(id);
    let new_topic = NewTopic::new("existing", "existing");
    let view = TopicView::published(DEFAULT_API_URL, &id, &new_topic);
    Topic::new(id, view.clone(), view)
}

fn root_topic() -> Topic {
    let mut root = leaf(ROOT_TOPIC_ID);
    root.make_branch(DEFAULT_API_URL);
    root.add_subtopic(TopicId::new("already-there"));
    root
}

fn subtopics(titles: &[&str]) -> Vec<NewTopic> {
    titles.iter().map(|t| NewTopic::new(*t, *t)).collect()
}

fn seeder(store: FakeStore, config: SeedConfig) -> Seeder<FakeStore> {
    let ids = IdGenerator::with_seed(&config.id, 1234).unwrap();
    Seeder::with_id_generator(store, config, ids)
}

#[fixture]
fn config() -> SeedConfig {
    SeedConfig {
        store_timeout: Duration::from_secs(1),
        ..SeedConfig::default()
    }
}

#[rstest]
#[tokio::test]
async fn generated_id_skips_stored_id(config: SeedConfig) {
    let id_config = IdConfig {
        alphabet: "12".to_string(),
        size: 1,
        max_attempts: 50,
    };
    let store = FakeStore::with_topic_ids(["1"]);
    let mut ids = IdGenerator::with_seed(&id_config, 9).unwrap();

    let id = ids.generate(&store, config.store_timeout).await.unwrap();

    assert_eq!(id, TopicId::new("2"));
}

#[rstest]
#[tokio::test]
async fn generated_ids_are_not_reissued_within_a_run(config: SeedConfig) {
    let id_config = IdConfig {
        alphabet: "12".to_string(),
        size: 1,
        max_attempts: 50,
    };
    let store = FakeStore::default();
    let mut ids = IdGenerator::with_seed(&id_config, 3).unwrap();

    let first = ids.generate(&store, config.store_timeout).await.unwrap();
    let second = ids.generate(&store, config.store_timeout).await.unwrap();

    assert_ne!(first, second);
    let err = ids.generate(&store, config.store_timeout).await.unwrap_err();
    assert_eq!(err.current_context(), &SeedError::IdGenerationExhausted);
}

#[rstest]
#[tokio::test]
async fn exhausted_id_space_fails(config: SeedConfig) {
    let id_config = IdConfig {
        alphabet: "12".to_string(),
        size: 1,
        max_attempts: 20,
    };
    let store = FakeStore::with_topic_ids(["1", "2"]);
    let mut ids = IdGenerator::with_seed(&id_config, 5).unwrap();

    let err = ids.generate(&store, config.store_timeout).await.unwrap_err();

    assert_eq!(err.current_context(), &SeedError::IdGenerationExhausted);
}

#[rstest]
#[tokio::test]
async fn create_topic_builds_identical_published_views(config: SeedConfig) {
    let mut seeder = seeder(FakeStore::default(), config);

    let topic = seeder
        .create_topic(&NewTopic::new("Census", "Census"))
        .await
        .unwrap();

    assert_eq!(topic.id.as_str().len(), 4);
    assert!(topic.id.as_str().chars().all(|c| ('1'..='9').contains(&c)));
    assert_eq!(topic.current, topic.next);
    assert_eq!(topic.current.id, topic.id);
    assert_eq!(topic.current.title, "Census");
    assert!(topic.current.subtopics_ids.is_none());
    assert!(topic.current.links.subtopics.is_none());
    assert_eq!(
        topic.current.links.self_link.href,
        format!("{DEFAULT_API_URL}/{}", topic.id)
    );
    assert_eq!(
        topic.current.links.content.as_ref().unwrap().href,
        format!("{DEFAULT_API_URL}/{}/content", topic.id)
    );
}

#[rstest]
#[tokio::test]
async fn empty_child_list_persists_only_parent(config: SeedConfig) {
    let store = FakeStore::default();
    let mut seeder = seeder(store.clone(), config);

    let outcome = seeder.run(&[]).await.unwrap();

    assert!(outcome.child_ids.is_empty());
    assert_eq!(outcome.documents_written, 2);
    assert_eq!(
        store.calls(),
        vec![
            Call::InsertTopic(outcome.parent_id.clone()),
            Call::InsertContent(outcome.parent_id.clone()),
        ]
    );

    let parent = store.topic(&outcome.parent_id).unwrap();
    assert_eq!(parent.current.subtopics_ids, Some(vec![]));
    assert_eq!(parent.next.subtopics_ids, Some(vec![]));
    assert_eq!(
        parent.current.links.subtopics.as_ref().unwrap().href,
        format!("{DEFAULT_API_URL}/{}/subtopics", parent.id)
    );
    assert_eq!(store.content_count(), 1);
}

#[rstest]
#[tokio::test]
async fn children_are_persisted_before_parent_in_input_order(config: SeedConfig) {
    let store = FakeStore::default();
    let mut seeder = seeder(store.clone(), config);

    let outcome = seeder
        .run(&subtopics(&["Ageing", "Demography", "Education"]))
        .await
        .unwrap();

    assert_eq!(outcome.child_ids.len(), 3);
    assert_eq!(outcome.documents_written, 8);
    assert_eq!(store.topic_count(), 4);
    assert_eq!(store.content_count(), 4);

    let mut expected_calls = outcome
        .child_ids
        .iter()
        .flat_map(|id| [Call::InsertTopic(id.clone()), Call::InsertContent(id.clone())])
        .collect::<Vec<_>>();
    expected_calls.push(Call::InsertTopic(outcome.parent_id.clone()));
    expected_calls.push(Call::InsertContent(outcome.parent_id.clone()));
    assert_eq!(store.calls(), expected_calls);

    let parent = store.topic(&outcome.parent_id).unwrap();
    assert_eq!(parent.current.subtopics_ids.as_ref(), Some(&outcome.child_ids));
    assert_eq!(parent.next.subtopics_ids.as_ref(), Some(&outcome.child_ids));

    let titles = outcome
        .child_ids
        .iter()
        .map(|id| store.topic(id).unwrap().current.title)
        .collect::<Vec<_>>();
    assert_eq!(titles, vec!["Ageing", "Demography", "Education"]);
}

#[rstest]
#[tokio::test]
async fn missing_root_aborts_without_writes(mut config: SeedConfig) {
    config.link_root = true;
    let store = FakeStore::default();
    let mut seeder = seeder(store.clone(), config);

    let err = seeder
        .run(&subtopics(&["Ageing", "Housing"]))
        .await
        .unwrap_err();

    assert_eq!(err.current_context(), &SeedError::PreconditionMissing);
    assert!(store.calls().is_empty());
    assert_eq!(store.topic_count(), 0);
}

#[rstest]
#[tokio::test]
async fn existing_root_gets_parent_appended(mut config: SeedConfig) {
    config.link_root = true;
    let store = FakeStore::default();
    store.put_topic(root_topic());
    let mut seeder = seeder(store.clone(), config);

    let outcome = seeder.run(&subtopics(&["Veterans"])).await.unwrap();

    assert!(outcome.root_linked);
    assert_eq!(outcome.documents_written, 5);
    assert_eq!(
        store.calls().last(),
        Some(&Call::SetSubtopics(TopicId::new(ROOT_TOPIC_ID)))
    );

    let root = store.topic(&TopicId::new(ROOT_TOPIC_ID)).unwrap();
    let expected = vec![TopicId::new("already-there"), outcome.parent_id.clone()];
    assert_eq!(root.current.subtopics_ids, Some(expected.clone()));
    assert_eq!(root.next.subtopics_ids, Some(expected));
}

#[rstest]
#[tokio::test]
async fn dry_run_writes_nothing(mut config: SeedConfig) {
    config.insert = false;
    let store = FakeStore::default();
    let mut seeder = seeder(store.clone(), config);

    let outcome = seeder.run(&subtopics(&["Housing"])).await.unwrap();

    assert!(outcome.dry_run);
    assert_eq!(outcome.documents_written, 0);
    assert_eq!(outcome.child_ids.len(), 1);
    assert!(store.calls().is_empty());
}

#[rstest]
#[tokio::test]
async fn plan_stages_root_without_writing(mut config: SeedConfig) {
    config.link_root = true;
    let store = FakeStore::default();
    store.put_topic(root_topic());
    let mut seeder = seeder(store.clone(), config);

    let batch = seeder.plan(&subtopics(&["Housing"])).await.unwrap();

    let parent_id = batch.parent.topic.id.clone();
    assert_eq!(
        batch.root.as_ref().unwrap().subtopics_ids().last(),
        Some(&parent_id)
    );
    assert!(store.calls().is_empty());
    assert_eq!(
        store
            .topic(&TopicId::new(ROOT_TOPIC_ID))
            .unwrap()
            .subtopics_ids(),
        &[TopicId::new("already-there")]
    );
}

#[rstest]
#[tokio::test]
async fn store_write_failure_is_fatal(config: SeedConfig) {
    let store = FakeStore::default().failing_content_inserts();
    let mut seeder = seeder(store.clone(), config);

    let err = seeder
        .run(&subtopics(&["Ageing", "Housing"]))
        .await
        .unwrap_err();

    assert_eq!(err.current_context(), &SeedError::StoreWriteFailure);
    assert_eq!(store.calls().len(), 2, "stops at the first failed write");
}

#[rstest]
#[tokio::test]
async fn sparse_root_record_gets_parent_appended(mut config: SeedConfig) {
    config.link_root = true;
    let store = FakeStore::default();
    let root: RootTopic = serde_json::from_value(serde_json::json!({
        "id": ROOT_TOPIC_ID,
        "current": { "id": ROOT_TOPIC_ID, "subtopics_ids": ["5555"] },
        "next": { "id": ROOT_TOPIC_ID, "subtopics_ids": ["5555"] }
    }))
    .unwrap();
    store.put_sparse_root(root);
    let mut seeder = seeder(store.clone(), config);

    let outcome = seeder.run(&[]).await.unwrap();

    assert!(outcome.root_linked);
    let root = store.sparse_root(&TopicId::new(ROOT_TOPIC_ID)).unwrap();
    let expected = vec![TopicId::new("5555"), outcome.parent_id.clone()];
    assert_eq!(root.current.subtopics_ids, Some(expected.clone()));
    assert_eq!(root.next.subtopics_ids, Some(expected));
}

#[rstest]
#[tokio::test]
async fn id_taken_between_check_and_insert_is_a_write_failure(mut config: SeedConfig) {
    config.id = IdConfig {
        alphabet: "1".to_string(),
        size: 1,
        max_attempts: 1,
    };
    let store = FakeStore::with_topic_ids(["1"]).hiding_stored_ids();
    let mut seeder = seeder(store.clone(), config);

    let err = seeder.run(&[]).await.unwrap_err();

    assert_eq!(err.current_context(), &SeedError::StoreWriteFailure);
    assert_eq!(
        err.downcast_ref::<StoreError>(),
        Some(&StoreError::DuplicateKey)
    );
    assert_eq!(store.calls(), vec![Call::InsertTopic(TopicId::new("1"))]);
    assert_eq!(store.content_count(), 0);
}

#[rstest]
#[tokio::test]
async fn zero_store_timeout_is_rejected_before_any_store_call(mut config: SeedConfig) {
    config.store_timeout = Duration::ZERO;

    let err = Seeder::new(FakeStore::default(), config)
        .err()
        .expect("zero timeout must be rejected");

    assert_eq!(err.current_context(), &SeedError::InvalidConfig);
}
