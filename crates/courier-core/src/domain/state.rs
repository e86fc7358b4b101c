//! Task status state machine.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Status of a tracked task.
///
/// State transitions:
/// - Submitted -> WaitingForResponse -> Completed
/// - Submitted -> Failed | Error (upstream rejected / transport failure)
/// - Submitted | WaitingForResponse -> Timeout (wait budget elapsed)
///
/// Terminal states (Completed, Failed, Error, Timeout) are sinks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Task created, outbound command not yet acknowledged.
    Submitted,

    /// Upstream accepted the command; waiting for the generator's reply.
    WaitingForResponse,

    /// A matching reply with at least one image was found.
    Completed,

    /// Upstream rejected the command.
    Failed,

    /// Transport-level failure (timeout, connection error).
    Error,

    /// Wait budget elapsed without a match.
    Timeout,
}

impl TaskStatus {
    /// Is this a terminal state (no further transitions)?
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Error | TaskStatus::Timeout
        )
    }

    pub fn can_transition_to(self, next: TaskStatus) -> bool {
        use TaskStatus::*;
        matches!(
            (self, next),
            (Submitted, WaitingForResponse | Failed | Error | Timeout)
                | (WaitingForResponse, Completed | Timeout | Failed | Error)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Submitted => "submitted",
            TaskStatus::WaitingForResponse => "waiting_for_response",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
            TaskStatus::Error => "error",
            TaskStatus::Timeout => "timeout",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
