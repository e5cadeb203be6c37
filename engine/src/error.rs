use thiserror::Error;

use booking::pricing::PricingError;
use gateway::{ChatError, LedgerError};

/// Everything a booking flow can fail with, in user-consequence terms.
///
/// `Cancelled`, `NoVolunteers` and `TimedOut` are expected flow endings
/// rather than faults; the command boundary treats them as already
/// communicated. Validation problems never appear here at all — intake
/// steps recover from them locally by re-prompting.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("booking cancelled")]
    Cancelled,

    #[error("no volunteers signed up")]
    NoVolunteers,

    #[error("Request timed out")]
    TimedOut,

    #[error("{0}")]
    NotAuthorized(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    RequestFailed(String),

    #[error("external service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl EngineError {
    /// Line rendered back to the acting user. Internal detail never leaves
    /// the logs.
    pub fn user_message(&self) -> String {
        match self {
            EngineError::Internal(_) => {
                "Something went wrong processing that, please contact management".to_string()
            }
            EngineError::ServiceUnavailable(_) => {
                "An external service is currently unavailable, please contact management"
                    .to_string()
            }
            other => other.to_string(),
        }
    }
}

impl From<ChatError> for EngineError {
    fn from(e: ChatError) -> Self {
        match e {
            ChatError::Timeout => EngineError::TimedOut,
            ChatError::ChannelNotFound(_)
            | ChatError::MessageNotFound(_)
            | ChatError::UserNotFound(_) => EngineError::NotFound(e.to_string()),
            ChatError::Transport(msg) => EngineError::ServiceUnavailable(msg),
        }
    }
}

impl From<LedgerError> for EngineError {
    fn from(e: LedgerError) -> Self {
        match e {
            LedgerError::RowNotFound(id) => EngineError::RequestFailed(format!(
                "Ledger data is missing booking ``{id}``, which should be there - please contact management"
            )),
            LedgerError::Unavailable(msg) => EngineError::ServiceUnavailable(msg),
        }
    }
}

impl From<PricingError> for EngineError {
    fn from(e: PricingError) -> Self {
        EngineError::RequestFailed(e.to_string())
    }
}
