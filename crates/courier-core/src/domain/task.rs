//! Task record: one tracked request from prompt submission to final outcome.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::BridgeError;
use super::ids::TaskId;
use super::prompt::Prompt;
use super::state::TaskStatus;

/// A requested state change. Each variant targets exactly one status and
/// carries the fields that status needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// Upstream accepted the outbound command.
    Accepted {
        correlation_id: String,
        strategy: String,
    },
    /// A matching reply was found.
    Completed { image_urls: Vec<String> },
    /// Upstream rejected the command.
    Failed { error: String },
    /// Transport-level failure.
    Errored { error: String },
    /// Wait budget elapsed.
    TimedOut,
}

impl Transition {
    pub fn target(&self) -> TaskStatus {
        match self {
            Transition::Accepted { .. } => TaskStatus::WaitingForResponse,
            Transition::Completed { .. } => TaskStatus::Completed,
            Transition::Failed { .. } => TaskStatus::Failed,
            Transition::Errored { .. } => TaskStatus::Error,
            Transition::TimedOut => TaskStatus::Timeout,
        }
    }
}

/// Task record.
///
/// Design:
/// - The task store is the single source of truth for these.
/// - All state changes go through [`TaskRecord::apply`], which enforces the
///   transition table and the `image_urls` / `completed_at` invariants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub id: TaskId,
    pub prompt: String,
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub image_urls: Vec<String>,
    pub correlation_id: Option<String>,
    pub strategy: Option<String>,
    pub error: Option<String>,
}

impl TaskRecord {
    pub fn new(id: TaskId, prompt: Prompt, now: DateTime<Utc>) -> Self {
        Self {
            id,
            prompt: prompt.into_string(),
            status: TaskStatus::Submitted,
            created_at: now,
            updated_at: now,
            completed_at: None,
            image_urls: Vec::new(),
            correlation_id: None,
            strategy: None,
            error: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Time since creation (zero if the clock went backwards).
    pub fn age(&self, now: DateTime<Utc>) -> chrono::Duration {
        (now - self.created_at).max(chrono::Duration::zero())
    }

    /// Apply a transition.
    ///
    /// Fails with `InvalidTransition` when the target is not reachable from the
    /// current status, or when completing without any image URL. On failure the
    /// record is left untouched.
    pub fn apply(&mut self, transition: Transition, now: DateTime<Utc>) -> Result<(), BridgeError> {
        let target = transition.target();
        let invalid = || BridgeError::InvalidTransition {
            id: self.id.to_string(),
            from: self.status,
            to: target,
        };

        if !self.status.can_transition_to(target) {
            return Err(invalid());
        }

        match transition {
            Transition::Accepted {
                correlation_id,
                strategy,
            } => {
                self.correlation_id = Some(correlation_id);
                self.strategy = Some(strategy);
            }
            Transition::Completed { image_urls } => {
                if image_urls.is_empty() {
                    return Err(invalid());
                }
                self.image_urls = image_urls;
                self.completed_at = Some(now.max(self.created_at));
            }
            Transition::Failed { error } | Transition::Errored { error } => {
                self.error = Some(error);
            }
            Transition::TimedOut => {}
        }

        self.status = target;
        self.updated_at = now.max(self.created_at);
        Ok(())
    }
}
