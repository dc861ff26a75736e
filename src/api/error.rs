use serde::Deserialize;
use thiserror::Error;

/// Marker the backend puts in the body of a 401 from `/api/calendar/add-event`
/// when the user has no usable Google Calendar grant.
pub const AUTHORIZATION_REQUIRED: &str = "authorization_required";

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ApiError {
    /// The request never produced a response.
    #[error("network error: {0}")]
    Transport(String),
    /// Non-2xx response carrying a `{message}` body.
    #[error("{message}")]
    Server { status: u16, message: String },
    /// Non-2xx response whose body could not be read as `{message}`.
    #[error("request failed with status {status}")]
    Unparseable { status: u16 },
    #[error("Please connect your Google Calendar first")]
    AuthorizationRequired,
    /// 2xx response whose body did not have the expected shape.
    #[error("unexpected response body: {0}")]
    Decode(String),
}

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    status: Option<String>,
}

impl ApiError {
    pub fn from_response(status: u16, body: &[u8]) -> Self {
        let Ok(parsed) = serde_json::from_slice::<ErrorBody>(body) else {
            return ApiError::Unparseable { status };
        };

        if status == 401 && parsed.status.as_deref() == Some(AUTHORIZATION_REQUIRED) {
            return ApiError::AuthorizationRequired;
        }

        match parsed.message.filter(|m| !m.trim().is_empty()) {
            Some(message) => ApiError::Server { status, message },
            None => ApiError::Unparseable { status },
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Server { status, .. } | ApiError::Unparseable { status } => Some(*status),
            ApiError::AuthorizationRequired => Some(401),
            ApiError::Transport(_) | ApiError::Decode(_) => None,
        }
    }

    /// Text shown to the user. `fallback` names the failed action and is used
    /// whenever the server gave no message of its own.
    pub fn user_message(&self, fallback: &str) -> String {
        match self {
            ApiError::Server { message, .. } => message.clone(),
            ApiError::AuthorizationRequired => self.to_string(),
            ApiError::Unparseable { .. } => fallback.to_string(),
            ApiError::Transport(_) | ApiError::Decode(_) => {
                format!("An error occurred: {fallback}")
            }
        }
    }
}
