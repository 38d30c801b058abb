use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};

use super::state::SessionState;

#[derive(Debug, Clone, thiserror::Error)]
pub enum SessionError {
    #[error("{0}")]
    RemoteRejection(String),

    #[error("{0}")]
    NetworkFailure(String),

    #[error("video feed fault: {0}")]
    StreamFault(String),

    #[error("{0}")]
    PreconditionViolation(&'static str),

    #[error("camera is busy ({})", .state.as_str())]
    TransitionConflict { state: SessionState },

    #[error("camera operation interrupted: {0}")]
    Interrupted(String),
}

impl From<reqwest::Error> for SessionError {
    fn from(value: reqwest::Error) -> Self {
        Self::NetworkFailure(value.to_string())
    }
}

#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    message: String,
}

impl AppError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

impl From<SessionError> for AppError {
    fn from(value: SessionError) -> Self {
        let status = match value {
            SessionError::PreconditionViolation(_)
            | SessionError::TransitionConflict { .. }
            | SessionError::Interrupted(_) => StatusCode::CONFLICT,
            SessionError::RemoteRejection(_)
            | SessionError::NetworkFailure(_)
            | SessionError::StreamFault(_) => StatusCode::BAD_GATEWAY,
        };
        Self::new(status, value.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (self.status, self.message).into_response()
    }
}
