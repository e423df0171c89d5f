use thiserror::Error;

/// Failure of a single HTTP round trip.
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("invalid request url: {0}")]
    Url(#[from] url::ParseError),

    #[error("failed to encode request: {0}")]
    Encode(String),

    #[error("request failed: {message}")]
    Transport { message: String },

    #[error("server responded {status}: {message}")]
    Status { status: u16, message: String },

    #[error("failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),
}

impl RequestError {
    /// HTTP status code, when the server answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport { .. })
    }
}

impl From<reqwest::Error> for RequestError {
    fn from(err: reqwest::Error) -> Self {
        let message = if err.is_timeout() {
            format!("timed out: {err}")
        } else {
            err.to_string()
        };
        Self::Transport { message }
    }
}

/// Task input that cannot be sent.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// The named field is empty once sanitized.
    #[error("{0} is required")]
    Required(&'static str),

    #[error("internal regex compile failure: {0}")]
    Sanitizer(String),
}

/// Failure of a create, update or delete issued through a list controller.
#[derive(Debug, Error)]
pub enum MutationError {
    #[error(transparent)]
    Invalid(#[from] ValidationError),

    #[error(transparent)]
    Request(#[from] RequestError),
}

#[derive(Debug, Error)]
pub enum FormError {
    #[error("the task form is not open")]
    Closed,

    #[error("the task is already being saved")]
    Busy,

    #[error(transparent)]
    Invalid(#[from] ValidationError),

    #[error("failed to save task: {0}")]
    Request(#[from] RequestError),
}
