use std::fmt;
use uuid::Uuid;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("payload encoding error: {0}")]
    Payload(#[from] serde_json::Error),

    #[error("invalid job record {id}: {reason}")]
    InvalidRecord { id: Uuid, reason: String },

    #[error("job store driver '{driver}' is not implemented yet, use JOB_STORE_DRIVER=db")]
    NotImplemented { driver: &'static str },

    #[error("unknown job store driver '{0}' (expected 'db' or 'sqs')")]
    UnknownDriver(String),
}

/// Failure reported by a job handler. `code` is a stable machine-readable tag,
/// `message` is what ends up in the job's `error` column.
#[derive(Debug)]
pub struct JobError {
    pub code: &'static str,
    pub message: String,
}

impl JobError {
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn bad_payload(message: impl Into<String>) -> Self {
        Self::new("BAD_PAYLOAD", message)
    }
}

impl fmt::Display for JobError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for JobError {}

impl From<StoreError> for JobError {
    fn from(err: StoreError) -> Self {
        Self::new("STORE", err.to_string())
    }
}
