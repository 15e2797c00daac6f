use std::time::Duration;

pub mod fixtures;
pub mod topics;

pub const DEFAULT_DB_NAME: &str = "topics";
pub const TOPICS_COLLECTION_NAME: &str = "topics";
pub const CONTENT_COLLECTION_NAME: &str = "content";

pub enum ConnectionDetails {
    Url(String),
}

#[derive(Debug, Clone)]
pub struct StoreOptions {
    pub database: String,
    /// run `write_batch` inside a single multi-document transaction (needs a replica set)
    pub transactional: bool,
    /// applied to server selection and connection establishment
    pub timeout: Option<Duration>,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            database: DEFAULT_DB_NAME.to_string(),
            transactional: false,
            timeout: None,
        }
    }
}
