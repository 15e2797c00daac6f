use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use topics_core::census::CENSUS_TITLE;
use topics_core::id::{DEFAULT_ID_ALPHABET, DEFAULT_ID_SIZE, DEFAULT_MAX_ATTEMPTS, IdConfig};
use topics_core::model::{NewTopic, TopicId};
use topics_core::seeder::{DEFAULT_API_URL, DEFAULT_STORE_TIMEOUT, ROOT_TOPIC_ID, SeedConfig};

/// Seeds the topics document store.
#[derive(Parser, Debug)]
#[command(name = "topics-seed", version, about, long_about = None)]
pub struct Cli {
    /// MongoDB connection string
    #[arg(
        long,
        global = true,
        env = "DATABASE_URL",
        default_value = "mongodb://localhost:27017"
    )]
    pub database_url: String,

    /// Database holding the topics and content collections
    #[arg(long, global = true, default_value = "topics")]
    pub database: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create a parent topic with its subtopics (the census taxonomy unless --topics is given)
    Seed(SeedArgs),
    /// Load a JSON fixture of topic documents into the topics collection
    Fixture(FixtureArgs),
}

#[derive(Args, Debug)]
pub struct SeedArgs {
    /// Print every document before it is written
    #[arg(short, long)]
    pub verbose: bool,

    /// Build (and with --verbose print) the documents without writing them
    #[arg(long)]
    pub dry_run: bool,

    /// Append the new parent topic to the root topic's subtopics
    #[arg(long)]
    pub link_root: bool,

    #[arg(long, default_value = ROOT_TOPIC_ID)]
    pub root_id: String,

    /// Write the whole batch in one transaction (requires a replica set)
    #[arg(long)]
    pub transactional: bool,

    /// Base URL used to build topic links
    #[arg(long, default_value = DEFAULT_API_URL)]
    pub api_url: String,

    /// JSON file with an array of {"title", "description"} subtopics
    #[arg(long)]
    pub topics: Option<PathBuf>,

    #[arg(long, default_value = CENSUS_TITLE)]
    pub parent_title: String,

    /// Defaults to the parent title
    #[arg(long)]
    pub parent_description: Option<String>,

    #[arg(long, default_value_t = DEFAULT_ID_SIZE)]
    pub id_size: usize,

    #[arg(long, default_value = DEFAULT_ID_ALPHABET)]
    pub id_alphabet: String,

    /// Give up after this many id draws that collide with existing topics
    #[arg(long, default_value_t = DEFAULT_MAX_ATTEMPTS)]
    pub max_id_attempts: u32,

    /// Deadline for each store operation
    #[arg(
        long,
        default_value_t = DEFAULT_STORE_TIMEOUT.as_secs(),
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub store_timeout_secs: u64,
}

impl SeedArgs {
    pub fn seed_config(&self) -> SeedConfig {
        let description = self
            .parent_description
            .clone()
            .unwrap_or_else(|| self.parent_title.clone());

        SeedConfig {
            verbose: self.verbose,
            insert: !self.dry_run,
            link_root: self.link_root,
            root_id: TopicId::new(&self.root_id),
            api_url: self.api_url.clone(),
            parent: NewTopic::new(&self.parent_title, description),
            id: IdConfig {
                alphabet: self.id_alphabet.clone(),
                size: self.id_size,
                max_attempts: self.max_id_attempts,
            },
            store_timeout: self.store_timeout(),
        }
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_secs(self.store_timeout_secs)
    }
}

#[derive(Args, Debug)]
pub struct FixtureArgs {
    /// JSON array of topic documents
    pub file: PathBuf,

    /// Keep the topics already in the collection instead of removing them first
    #[arg(long)]
    pub keep_existing: bool,

    /// Print the collection contents after loading
    #[arg(short, long)]
    pub verbose: bool,
}
