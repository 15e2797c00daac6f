use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Hash, Clone)]
#[serde(transparent)]
pub struct TopicId(String);

impl TopicId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for TopicId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<TopicId> for String {
    fn from(value: TopicId) -> Self {
        value.0
    }
}

/// Publication state shared by topic and content views.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "snake_case")]
pub enum State {
    Created,
    Uploaded,
    Importing,
    Imported,
    Published,
    Completed,
    Deleted,
    FailedImport,
    FailedPublish,
    InProgress,
    /// Anything older records carry that isn't a known state, e.g. `"true"`
    #[serde(other)]
    Other,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
pub struct Link {
    pub href: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
pub struct SelfLink {
    pub href: String,
    pub id: TopicId,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
pub struct TopicLinks {
    #[serde(rename = "self")]
    pub self_link: SelfLink,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<Link>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtopics: Option<Link>,
}

impl TopicLinks {
    fn leaf(api_url: &str, id: &TopicId) -> Self {
        Self {
            self_link: SelfLink {
                href: topic_href(api_url, id),
                id: id.clone(),
            },
            content: Some(Link {
                href: format!("{}/content", topic_href(api_url, id)),
            }),
            subtopics: None,
        }
    }
}

/// One side of the current/next pair. Both sides of a freshly created topic are built by
/// [`TopicView::published`] so they can't drift apart.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
pub struct TopicView {
    #[serde(alias = "_id")]
    pub id: TopicId,
    pub title: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keywords: Option<Vec<String>>,
    pub state: State,
    pub links: TopicLinks,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtopics_ids: Option<Vec<TopicId>>,
}

impl TopicView {
    pub fn published(api_url: &str, id: &TopicId, new_topic: &NewTopic) -> Self {
        Self {
            id: id.clone(),
            title: new_topic.title.clone(),
            description: new_topic.description.clone(),
            keywords: None,
            state: State::Published,
            links: TopicLinks::leaf(api_url, id),
            subtopics_ids: None,
        }
    }

    fn make_branch(&mut self, api_url: &str) {
        self.links.subtopics = Some(Link {
            href: format!("{}/subtopics", topic_href(api_url, &self.id)),
        });
        self.subtopics_ids.get_or_insert_with(Vec::new);
    }

    fn add_subtopic(&mut self, id: TopicId) {
        self.subtopics_ids.get_or_insert_with(Vec::new).push(id);
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
pub struct Topic {
    pub id: TopicId,
    pub current: TopicView,
    pub next: TopicView,
}

impl Topic {
    pub fn new(id: TopicId, current: TopicView, next: TopicView) -> Self {
        Self { id, current, next }
    }

    /// Turns a leaf into a node that can hold children: adds the `subtopics` link and an
    /// empty `subtopics_ids` list to both views. Existing children are kept.
    pub fn make_branch(&mut self, api_url: &str) {
        self.current.make_branch(api_url);
        self.next.make_branch(api_url);
    }

    pub fn add_subtopic(&mut self, id: TopicId) {
        self.current.add_subtopic(id.clone());
        self.next.add_subtopic(id);
    }

    pub fn subtopics_ids(&self) -> &[TopicId] {
        self.current.subtopics_ids.as_deref().unwrap_or_default()
    }
}

/// The part of a root topic view this tool reads and writes back.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Default)]
pub struct RootView {
    #[serde(default)]
    pub subtopics_ids: Option<Vec<TopicId>>,
}

/// A root topic read leniently: only `id` is required, so records written by other tools
/// with a sparse shape can still be linked under.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
pub struct RootTopic {
    pub id: TopicId,
    #[serde(default)]
    pub current: RootView,
    #[serde(default)]
    pub next: RootView,
}

impl RootTopic {
    pub fn new(id: TopicId) -> Self {
        Self {
            id,
            current: RootView::default(),
            next: RootView::default(),
        }
    }

    pub fn add_subtopic(&mut self, id: TopicId) {
        self.current
            .subtopics_ids
            .get_or_insert_with(Vec::new)
            .push(id.clone());
        self.next.subtopics_ids.get_or_insert_with(Vec::new).push(id);
    }

    pub fn subtopics_ids(&self) -> &[TopicId] {
        self.current.subtopics_ids.as_deref().unwrap_or_default()
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
pub struct ContentView {
    pub state: State,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
pub struct Content {
    pub id: TopicId,
    pub current: ContentView,
    pub next: ContentView,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
pub struct NewTopic {
    pub title: String,
    pub description: String,
}

impl NewTopic {
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
        }
    }
}

pub fn topic_href(api_url: &str, id: &TopicId) -> String {
    format!("{}/{}", api_url.trim_end_matches('/'), id)
}
