use reqwest::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CloudError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Not authorized")]
    Unauthorized,
    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Provider returned {status}: {message}")]
    Status { status: u16, message: String },
    #[error("Unexpected response: {0}")]
    Parse(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for CloudError {
    fn from(err: serde_json::Error) -> Self {
        CloudError::Parse(err.to_string())
    }
}

impl CloudError {
    /// Maps a non-success response onto an error variant.
    ///
    /// `path` names the item the request addressed; `body` is the raw response
    /// body, from which the provider's `error` field is used when present.
    pub fn from_status(status: StatusCode, path: &str, body: &str) -> Self {
        let message = error_reason(body);
        match status {
            StatusCode::NOT_FOUND => CloudError::NotFound(path.to_string()),
            StatusCode::FORBIDDEN => CloudError::Forbidden(message),
            StatusCode::UNAUTHORIZED => CloudError::Unauthorized,
            other => CloudError::Status {
                status: other.as_u16(),
                message,
            },
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, CloudError::NotFound(_))
    }
}

fn error_reason(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|json| json["error"].as_str().map(|s| s.to_string()))
        .unwrap_or_else(|| body.trim().to_string())
}

pub type CloudResult<T> = Result<T, CloudError>;
