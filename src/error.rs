use thiserror::Error;

#[derive(Debug, Error)]
pub enum DriveError {
    #[error("network request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Drive API returned {status}: {message}")]
    Api { status: u16, message: String },
    #[error("not authorized, the access token is missing, expired or revoked")]
    Unauthorized,
    #[error("{context} is missing required field `{field}`")]
    MissingField {
        field: &'static str,
        context: &'static str,
    },
    #[error("malformed response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("no access token: {0}")]
    Auth(String),
}

pub type Result<T> = std::result::Result<T, DriveError>;

impl DriveError {
    /// Transient failures worth another attempt: network errors, rate
    /// limiting and server side errors.
    pub fn is_retryable(&self) -> bool {
        match self {
            DriveError::Transport(_) => true,
            DriveError::Api { status, .. } => *status == 429 || (500..600).contains(status),
            DriveError::Unauthorized
            | DriveError::MissingField { .. }
            | DriveError::Decode(_)
            | DriveError::Auth(_) => false,
        }
    }

    /// Failures that would repeat for every following request of a batch.
    pub fn is_fatal(&self) -> bool {
        matches!(self, DriveError::Unauthorized | DriveError::Auth(_))
    }
}
