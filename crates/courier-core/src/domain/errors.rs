//! Errors - エラー型と分類
//!
//! `ErrorKind` は運用上の分類で、API 境界で HTTP ステータスに変換する。
//! Submitter / Watcher の失敗はタスクの status に記録され、呼び出し元には
//! Status API 経由でのみ見える。

use thiserror::Error;

use super::state::TaskStatus;

/// ErrorKind は実行エラーの分類
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad or missing input; the caller can fix it.
    Client,
    /// Deployment is misconfigured; the operator can fix it.
    Operator,
    /// Transient upstream condition; a fresh submission may succeed.
    Transient,
    /// The upstream platform answered with a non-success status.
    Upstream,
    /// Invariant violation or unexpected fault.
    Internal,
}

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("{0}")]
    Validation(String),

    #[error("upstream is not configured: {0}")]
    Configuration(String),

    #[error("upstream rejected the request (status {status}): {detail}")]
    UpstreamRejected { status: u16, detail: String },

    #[error("upstream request timed out")]
    UpstreamTimeout,

    #[error("upstream transport error: {0}")]
    Transport(String),

    #[error("task not found: {0}")]
    NotFound(String),

    #[error("task already exists: {0}")]
    AlreadyExists(String),

    #[error("invalid transition for task {id}: {from} -> {to}")]
    InvalidTransition {
        id: String,
        from: TaskStatus,
        to: TaskStatus,
    },

    #[error("internal error: {0}")]
    Internal(String),
}

impl BridgeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            BridgeError::Validation(_) | BridgeError::NotFound(_) | BridgeError::AlreadyExists(_) => {
                ErrorKind::Client
            }
            BridgeError::Configuration(_) => ErrorKind::Operator,
            BridgeError::UpstreamTimeout | BridgeError::Transport(_) => ErrorKind::Transient,
            BridgeError::UpstreamRejected { .. } => ErrorKind::Upstream,
            BridgeError::InvalidTransition { .. } | BridgeError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Stable machine-readable code used in JSON error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            BridgeError::Validation(_) => "validation_error",
            BridgeError::Configuration(_) => "configuration_error",
            BridgeError::UpstreamRejected { .. } => "upstream_rejected",
            BridgeError::UpstreamTimeout => "upstream_timeout",
            BridgeError::Transport(_) => "upstream_transport",
            BridgeError::NotFound(_) => "not_found",
            BridgeError::AlreadyExists(_) => "already_exists",
            BridgeError::InvalidTransition { .. } => "invalid_transition",
            BridgeError::Internal(_) => "internal_error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_follow_taxonomy() {
        assert_eq!(BridgeError::Validation("x".into()).kind(), ErrorKind::Client);
        assert_eq!(BridgeError::Configuration("x".into()).kind(), ErrorKind::Operator);
        assert_eq!(BridgeError::UpstreamTimeout.kind(), ErrorKind::Transient);
        assert_eq!(
            BridgeError::UpstreamRejected {
                status: 401,
                detail: "unauthorized".into()
            }
            .kind(),
            ErrorKind::Upstream
        );
    }

    #[test]
    fn invalid_transition_message_names_states() {
        let err = BridgeError::InvalidTransition {
            id: "t1".into(),
            from: TaskStatus::Completed,
            to: TaskStatus::Timeout,
        };
        assert_eq!(
            err.to_string(),
            "invalid transition for task t1: completed -> timeout"
        );
        assert_eq!(err.code(), "invalid_transition");
    }
}
