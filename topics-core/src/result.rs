use error_stack::Report;

pub type StoreResult<T> = Result<T, Report<StoreError>>;
pub type OptStoreResult<T> = Result<Option<T>, Report<StoreError>>;
pub type SeedResult<T> = Result<T, Report<SeedError>>;

#[derive(Debug, thiserror::Error, PartialEq, Eq, Clone, Copy)]
pub enum StoreError {
    #[error("failed to connect to the document store")]
    Connect,
    #[error("failed to read from the document store")]
    Read,
    #[error("failed to write to the document store")]
    Write,
    #[error("a document with the same id already exists")]
    DuplicateKey,
    #[error("the batch transaction failed and was aborted")]
    Transaction,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq, Clone, Copy)]
pub enum SeedError {
    #[error("invalid seed configuration")]
    InvalidConfig,
    #[error("a record required before seeding is missing")]
    PreconditionMissing,
    #[error("could not generate an unused topic id")]
    IdGenerationExhausted,
    #[error("failed to read from the topic store")]
    StoreReadFailure,
    #[error("failed to write to the topic store")]
    StoreWriteFailure,
}
