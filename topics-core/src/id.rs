use crate::TopicStore;
use crate::model::TopicId;
use crate::result::{SeedError, SeedResult};
use crate::seeder::bounded;
use error_stack::{IntoReport, ResultExt};
use itertools::Itertools;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, instrument};

pub const DEFAULT_ID_ALPHABET: &str = "123456789";
pub const DEFAULT_ID_SIZE: usize = 4;
pub const DEFAULT_MAX_ATTEMPTS: u32 = 100;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdConfig {
    pub alphabet: String,
    pub size: usize,
    pub max_attempts: u32,
}

impl Default for IdConfig {
    fn default() -> Self {
        Self {
            alphabet: DEFAULT_ID_ALPHABET.to_string(),
            size: DEFAULT_ID_SIZE,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

impl IdConfig {
    pub fn validate(&self) -> SeedResult<()> {
        if self.alphabet.is_empty() {
            return Err(SeedError::InvalidConfig.into_report()).attach("id alphabet is empty");
        }
        if self.size == 0 {
            return Err(SeedError::InvalidConfig.into_report())
                .attach("id size must be at least 1");
        }
        if self.max_attempts == 0 {
            return Err(SeedError::InvalidConfig.into_report())
                .attach("max id attempts must be at least 1");
        }
        Ok(())
    }
}

/// Draws short random ids and re-draws until one is unused, both in the store and among the
/// ids this generator has already handed out. Records are only persisted at the end of a run,
/// so the store alone can't see the earlier ids of the same run.
#[derive(Debug)]
pub struct IdGenerator {
    alphabet: Vec<char>,
    size: usize,
    max_attempts: u32,
    rng: StdRng,
    issued: HashSet<TopicId>,
}

impl IdGenerator {
    pub fn new(config: &IdConfig) -> SeedResult<Self> {
        Self::with_rng(config, StdRng::from_os_rng())
    }

    /// Deterministic generator, for tests and reproducible dry runs.
    pub fn with_seed(config: &IdConfig, seed: u64) -> SeedResult<Self> {
        Self::with_rng(config, StdRng::seed_from_u64(seed))
    }

    fn with_rng(config: &IdConfig, rng: StdRng) -> SeedResult<Self> {
        config.validate()?;
        Ok(Self {
            alphabet: config.alphabet.chars().unique().collect(),
            size: config.size,
            max_attempts: config.max_attempts,
            rng,
            issued: HashSet::new(),
        })
    }

    pub fn candidate(&mut self) -> TopicId {
        let id = (0..self.size)
            .map(|_| self.alphabet[self.rng.random_range(0..self.alphabet.len())])
            .collect::<String>();
        TopicId::new(id)
    }

    #[instrument(skip_all, name = "id#generate")]
    pub async fn generate<S>(
        &mut self,
        store: &S,
        store_timeout: Duration,
    ) -> SeedResult<TopicId>
    where
        S: TopicStore,
    {
        for attempt in 1..=self.max_attempts {
            let id = self.candidate();
            if self.issued.contains(&id) {
                debug!("candidate {id} already issued in this run (attempt {attempt})");
                continue;
            }

            let exists = bounded(
                store_timeout,
                "topic id lookup",
                SeedError::StoreReadFailure,
                store.topic_exists(id.clone()),
            )
            .await?;

            if exists {
                debug!("candidate {id} already stored (attempt {attempt})");
                continue;
            }

            self.issued.insert(id.clone());
            return Ok(id);
        }

        Err(SeedError::IdGenerationExhausted.into_report()).attach_with(|| {
            format!(
                "no unused id after {} attempts (alphabet {:?}, size {}, {} issued this run)",
                self.max_attempts,
                self.alphabet.iter().collect::<String>(),
                self.size,
                self.issued.len()
            )
        })
    }
}
