use error_stack::Report;

pub type AppResult<T> = Result<T, Report<AppError>>;

#[derive(Debug, thiserror::Error)]
#[error("topics seed failed")]
pub struct AppError;
