use thiserror::Error;

pub type Result<T> = std::result::Result<T, MarketError>;

/// Everything the lifecycle core can refuse to do, plus storage failures.
#[derive(Debug, Error)]
pub enum MarketError {
    #[error("you are not authorized to perform this action")]
    NotAuthorized,

    #[error("invalid transition: {0}")]
    InvalidTransition(String),

    #[error("you have already applied to this job")]
    AlreadyApplied,

    #[error("this job is no longer open for applications")]
    JobNotOpen,

    #[error("this application does not belong to this job")]
    MismatchedJob,

    #[error("no accepted applicant found for this job")]
    NoAcceptedApplicant,

    #[error("rating must be between 1 and 5, got {0}")]
    RatingOutOfRange(u8),

    #[error("you cannot apply to your own job")]
    OwnJob,

    #[error("job not found: {0}")]
    JobNotFound(i64),

    #[error("application not found: {0}")]
    ApplicationNotFound(i64),

    #[error("user not found: {0}")]
    UserNotFound(String),

    #[error("database not initialized. Run 'khidma init' first.")]
    NotInitialized,

    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
