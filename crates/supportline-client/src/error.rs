use reqwest::StatusCode;
use thiserror::Error;

/// Failure of a client call, classified the way the UI reacts to it.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("forbidden")]
    Forbidden,

    #[error("not found")]
    NotFound,

    /// Caught locally before a call, or rejected by the server as invalid.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Network or server failure. Polls swallow these; direct actions
    /// report them.
    #[error("transient failure: {0}")]
    Transient(String),
}

impl ClientError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn from_status(status: StatusCode) -> Self {
        match status {
            StatusCode::FORBIDDEN => Self::Forbidden,
            StatusCode::NOT_FOUND => Self::NotFound,
            StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
                Self::validation("the server rejected the message")
            }
            StatusCode::PAYLOAD_TOO_LARGE => Self::validation("the attachment is too large"),
            StatusCode::UNSUPPORTED_MEDIA_TYPE => {
                Self::validation("this attachment type is not supported")
            }
            other => Self::Transient(format!("server answered {}", other)),
        }
    }

    /// Text shown to the person who triggered the action. Authorization
    /// and lookup failures share one generic notice.
    pub fn notice(&self) -> String {
        match self {
            Self::Forbidden | Self::NotFound => "The action failed.".to_string(),
            Self::Validation(msg) => msg.clone(),
            Self::Transient(_) => "Connection problem. Please try again.".to_string(),
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        match e.status() {
            Some(status) => Self::from_status(status),
            None => Self::Transient(e.to_string()),
        }
    }
}
