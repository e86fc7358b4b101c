//! TaskStore port - タスク状態の正本（source of truth）
//!
//! TaskStore は pending / completed の 2 つのパーティションを管理します。
//! - pending: submitted / waiting_for_response
//! - completed: 終端状態（completed / failed / error / timeout）
//!
//! # 設計原則
//! - 生のマップは外に出さない（操作はこの trait のメソッドのみ）
//! - 各操作は並行呼び出しに対してアトミック
//! - 終端状態への遷移でレコードは completed 側へ移動する（重複しない）

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::{BridgeError, Prompt, TaskId, TaskRecord, Transition};

/// Number of records per partition.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskCounts {
    pub pending: usize,
    pub completed: usize,
}

#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Create a new task in `submitted`. Fails with `AlreadyExists` if the id
    /// is present in either partition.
    async fn create(&self, id: TaskId, prompt: Prompt) -> Result<TaskRecord, BridgeError>;

    async fn get(&self, id: &TaskId) -> Result<TaskRecord, BridgeError>;

    /// Apply a transition. `NotFound` if absent, `InvalidTransition` if the
    /// target is unreachable (terminal records reject everything).
    async fn transition(&self, id: &TaskId, transition: Transition)
    -> Result<TaskRecord, BridgeError>;

    /// Non-terminal tasks older than `max_wait` become `timeout`.
    /// Returns the number of tasks affected.
    async fn expire_pending(&self, max_wait: Duration) -> usize;

    /// Terminal tasks older than `retention` are deleted.
    /// Returns the number of tasks removed.
    async fn evict_terminal(&self, retention: Duration) -> usize;

    /// Snapshot of non-terminal tasks, oldest first.
    async fn pending(&self) -> Vec<TaskRecord>;

    async fn counts(&self) -> TaskCounts;
}
