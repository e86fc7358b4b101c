//! Task identifiers.
//!
//! # TaskId
//! - 呼び出し側が指定する ID（`task_id` フィールド）と、生成する ID の両方を扱う
//! - 生成 ID は ULID ベース（`task-<ULID>`）なので時刻でソート可能
//! - 呼び出し側の ID は URL パスに載るため、文字種と長さを制限する

use serde::{Deserialize, Serialize};
use std::fmt;
use ulid::Ulid;

use super::errors::BridgeError;

/// Maximum length of a caller-supplied task id.
pub const MAX_TASK_ID_LEN: usize = 128;

const GENERATED_PREFIX: &str = "task-";

/// Identifier of a tracked task (key into the task store).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    /// Validate a caller-supplied id.
    ///
    /// Allowed: 1..=128 characters of `[A-Za-z0-9_.-]`.
    pub fn parse(raw: impl Into<String>) -> Result<Self, BridgeError> {
        let raw = raw.into();
        if raw.is_empty() {
            return Err(BridgeError::Validation("task_id must not be empty".into()));
        }
        if raw.len() > MAX_TASK_ID_LEN {
            return Err(BridgeError::Validation(format!(
                "task_id must be at most {MAX_TASK_ID_LEN} characters"
            )));
        }
        if !raw
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
        {
            return Err(BridgeError::Validation(
                "task_id may only contain letters, digits, '_', '-' and '.'".into(),
            ));
        }
        Ok(Self(raw))
    }

    /// Generated (time-based) id.
    pub fn from_ulid(ulid: Ulid) -> Self {
        Self(format!("{GENERATED_PREFIX}{ulid}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
