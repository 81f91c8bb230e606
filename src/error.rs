use std::path::PathBuf;

use crate::protocol::{Code, Response, Status};

/// Framing failures. All of them end the connection.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The peer closed the stream before a new frame started.
    #[error("connection closed by peer")]
    Closed,

    #[error("received a zero-length frame")]
    EmptyFrame,

    #[error("malformed message body: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum AccountError {
    #[error("account store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("account store is corrupt: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to replace {path:?}: {source}")]
    Persist {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("password hashing failed: {0}")]
    Hash(String),

    #[error("account {0} already exists")]
    AlreadyRegistered(String),

    #[error("account task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Recoverable per-command failures. Each one becomes an `ERROR` response and
/// the connection stays open.
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    AlreadyExists(String),

    #[error("Access denied.")]
    SandboxViolation(PathBuf),

    #[error("{message}")]
    Io {
        message: String,
        source: std::io::Error,
    },

    #[error("Session not ready.")]
    NotReady,

    #[error("{0}")]
    Unavailable(String),
}

impl CommandError {
    pub fn io(message: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            message: message.into(),
            source,
        }
    }

    pub fn code(&self) -> Code {
        match self {
            CommandError::Validation(_) | CommandError::NotFound(_) => Code::BadRequest,
            CommandError::AlreadyExists(_) => Code::PreconditionFailed,
            CommandError::SandboxViolation(_) => Code::Forbidden,
            CommandError::Io { .. } => Code::InternalServerError,
            CommandError::NotReady | CommandError::Unavailable(_) => Code::ServiceUnavailable,
        }
    }

    pub fn into_response(self) -> Response {
        Response::new(Status::Error, self.code(), self.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_error_codes() {
        assert_eq!(
            CommandError::Validation("x".into()).code(),
            Code::BadRequest
        );
        assert_eq!(
            CommandError::SandboxViolation(PathBuf::from("/etc")).code(),
            Code::Forbidden
        );
        assert_eq!(
            CommandError::AlreadyExists("x".into()).code(),
            Code::PreconditionFailed
        );
        assert_eq!(CommandError::NotReady.code(), Code::ServiceUnavailable);
    }

    #[test]
    fn test_into_response_keeps_message() {
        let response = CommandError::SandboxViolation(PathBuf::from("/etc")).into_response();
        assert_eq!(response.status, Status::Error.as_str());
        assert_eq!(response.code, 403);
        assert_eq!(response.message, "Access denied.");
    }
}
