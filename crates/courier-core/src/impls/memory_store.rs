//! In-memory task store.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::{BridgeError, Prompt, TaskId, TaskRecord, Transition};
use crate::ports::{Clock, TaskCounts, TaskStore};

/// In-memory store state.
///
/// Invariant: an id lives in exactly one of the two maps.
#[derive(Default)]
struct StoreState {
    /// Non-terminal tasks.
    pending: HashMap<TaskId, TaskRecord>,

    /// Terminal tasks (kept until the retention horizon).
    completed: HashMap<TaskId, TaskRecord>,
}

impl StoreState {
    fn contains(&self, id: &TaskId) -> bool {
        self.pending.contains_key(id) || self.completed.contains_key(id)
    }

    /// Move a record to the completed partition once it is terminal.
    fn settle(&mut self, id: &TaskId) {
        let is_terminal = self.pending.get(id).is_some_and(TaskRecord::is_terminal);
        if is_terminal && let Some(record) = self.pending.remove(id) {
            self.completed.insert(id.clone(), record);
        }
    }
}

/// In-memory task store.
///
/// A single lock guards both partitions; task volume is low and every
/// operation is short, so there is no await while the lock is held.
pub struct InMemoryTaskStore {
    state: Mutex<StoreState>,
    clock: Arc<dyn Clock>,
}

impl InMemoryTaskStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Mutex::new(StoreState::default()),
            clock,
        }
    }
}

fn to_chrono(duration: Duration) -> chrono::Duration {
    chrono::Duration::from_std(duration).unwrap_or(chrono::Duration::MAX)
}

#[async_trait]
impl TaskStore for InMemoryTaskStore {
    async fn create(&self, id: TaskId, prompt: Prompt) -> Result<TaskRecord, BridgeError> {
        let mut state = self.state.lock().await;
        if state.contains(&id) {
            return Err(BridgeError::AlreadyExists(id.to_string()));
        }
        let record = TaskRecord::new(id.clone(), prompt, self.clock.now());
        state.pending.insert(id, record.clone());
        Ok(record)
    }

    async fn get(&self, id: &TaskId) -> Result<TaskRecord, BridgeError> {
        let state = self.state.lock().await;
        state
            .pending
            .get(id)
            .or_else(|| state.completed.get(id))
            .cloned()
            .ok_or_else(|| BridgeError::NotFound(id.to_string()))
    }

    async fn transition(
        &self,
        id: &TaskId,
        transition: Transition,
    ) -> Result<TaskRecord, BridgeError> {
        let mut state = self.state.lock().await;

        if let Some(done) = state.completed.get(id) {
            return Err(BridgeError::InvalidTransition {
                id: id.to_string(),
                from: done.status,
                to: transition.target(),
            });
        }

        let Some(record) = state.pending.get_mut(id) else {
            return Err(BridgeError::NotFound(id.to_string()));
        };
        record.apply(transition, self.clock.now())?;
        let snapshot = record.clone();

        state.settle(id);
        Ok(snapshot)
    }

    async fn expire_pending(&self, max_wait: Duration) -> usize {
        let max_wait = to_chrono(max_wait);
        let now = self.clock.now();
        let mut state = self.state.lock().await;

        let expired: Vec<TaskId> = state
            .pending
            .values()
            .filter(|record| record.age(now) >= max_wait)
            .map(|record| record.id.clone())
            .collect();

        let mut count = 0;
        for id in &expired {
            if let Some(record) = state.pending.get_mut(id)
                && record.apply(Transition::TimedOut, now).is_ok()
            {
                count += 1;
            }
            state.settle(id);
        }
        count
    }

    async fn evict_terminal(&self, retention: Duration) -> usize {
        let retention = to_chrono(retention);
        let now = self.clock.now();
        let mut state = self.state.lock().await;

        let before = state.completed.len();
        state
            .completed
            .retain(|_, record| record.age(now) < retention);
        before - state.completed.len()
    }

    async fn pending(&self) -> Vec<TaskRecord> {
        let state = self.state.lock().await;
        let mut records: Vec<TaskRecord> = state.pending.values().cloned().collect();
        records.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        records
    }

    async fn counts(&self) -> TaskCounts {
        let state = self.state.lock().await;
        TaskCounts {
            pending: state.pending.len(),
            completed: state.completed.len(),
        }
    }
}
