//! Watcher - 上流の返信を待ってタスクを完了させる
//!
//! # 2 つのモード
//! - **Polling**: 受理されたタスクごとに 1 つの tokio task を spawn し、
//!   `poll_interval` ごとにチャンネル履歴を読んで matcher にかける
//! - **Push**: `WatcherGroup::ingest()` に届いたメッセージを待機中の全タスクに当てる
//!
//! # 終了条件（polling）
//! 1. マッチ → `Completed`
//! 2. 待ち時間（`created_at` から `max_wait`）超過 → `TimedOut`
//! 3. キャンセル → 何も変更せず終了
//! 4. 別経路（push / sweeper）で終端になっていた → 何もせず終了
//!
//! 競合した遷移は store が `InvalidTransition` で弾くので、ここでは debug ログだけ出す。

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at, sleep_until};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::app::matcher;
use crate::domain::{BridgeError, InboundMessage, TaskId, TaskRecord, TaskStatus, Transition};
use crate::ports::{Clock, MessageSource, TaskStore};

#[derive(Debug, Clone)]
pub struct WatchConfig {
    /// Author id of the generating bot.
    pub generator_id: String,
    pub poll_interval: Duration,
    pub max_wait: Duration,
    pub history_limit: usize,
}

/// How a polling watcher ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchOutcome {
    Matched,
    TimedOut,
    /// The task reached a terminal state through another path (or was evicted).
    Superseded,
    Cancelled,
}

struct WatchHandle {
    token: CancellationToken,
    join: JoinHandle<WatchOutcome>,
}

struct Shared {
    store: Arc<dyn TaskStore>,
    source: Option<Arc<dyn MessageSource>>,
    clock: Arc<dyn Clock>,
    config: WatchConfig,
}

/// Per-task watchers under one root cancellation token.
///
/// - `cancel(id)` で個別に止める
/// - `shutdown()` で全体を止め、全 watcher の終了を待つ
pub struct WatcherGroup {
    shared: Arc<Shared>,
    root: CancellationToken,
    active: Mutex<HashMap<TaskId, WatchHandle>>,
}

impl WatcherGroup {
    /// `source` が None の場合は push mode のみ（polling watcher は締め切りまで待つだけ）。
    pub fn new(
        store: Arc<dyn TaskStore>,
        source: Option<Arc<dyn MessageSource>>,
        clock: Arc<dyn Clock>,
        config: WatchConfig,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                store,
                source,
                clock,
                config,
            }),
            root: CancellationToken::new(),
            active: Mutex::new(HashMap::new()),
        }
    }

    pub fn is_polling(&self) -> bool {
        self.shared.source.is_some()
    }

    /// Start watching an accepted task.
    pub async fn spawn(&self, task: &TaskRecord) {
        if self.root.is_cancelled() {
            debug!(task_id = %task.id, "watcher group is shut down; not watching");
            return;
        }

        let token = self.root.child_token();
        let shared = Arc::clone(&self.shared);
        let id = task.id.clone();
        let created_at = task.created_at;
        let loop_token = token.clone();
        let join = tokio::spawn(async move { watch(shared, id, created_at, loop_token).await });

        let mut active = self.active.lock().await;
        active.retain(|_, handle| !handle.join.is_finished());
        if let Some(previous) = active.insert(task.id.clone(), WatchHandle { token, join }) {
            previous.token.cancel();
        }
    }

    /// Evaluate one pushed message against waiting tasks, oldest first.
    /// Returns the id of the task it completed, if any.
    pub async fn ingest(&self, message: &InboundMessage) -> Option<TaskId> {
        let store = &self.shared.store;
        let generator_id = &self.shared.config.generator_id;

        for task in store.pending().await {
            if task.status != TaskStatus::WaitingForResponse || message.timestamp < task.created_at {
                continue;
            }
            let Some(found) = matcher::evaluate(&task.prompt, message, generator_id) else {
                continue;
            };

            match store
                .transition(
                    &task.id,
                    Transition::Completed {
                        image_urls: found.image_urls,
                    },
                )
                .await
            {
                Ok(_) => {
                    info!(task_id = %task.id, message_id = %found.message_id, "task completed from pushed message");
                    self.cancel(&task.id).await;
                    return Some(task.id);
                }
                Err(err @ BridgeError::InvalidTransition { .. }) => {
                    debug!(task_id = %task.id, error = %err, "task resolved concurrently");
                }
                Err(err) => {
                    warn!(task_id = %task.id, error = %err, "failed to complete task");
                }
            }
        }
        None
    }

    /// Stop watching a task without touching its state.
    pub async fn cancel(&self, id: &TaskId) -> bool {
        let handle = self.active.lock().await.remove(id);
        match handle {
            Some(handle) => {
                handle.token.cancel();
                true
            }
            None => false,
        }
    }

    pub async fn active_count(&self) -> usize {
        let mut active = self.active.lock().await;
        active.retain(|_, handle| !handle.join.is_finished());
        active.len()
    }

    /// Wait for a task's watcher to finish.
    pub async fn join(&self, id: &TaskId) -> Option<WatchOutcome> {
        let handle = self.active.lock().await.remove(id)?;
        handle.join.await.ok()
    }

    /// Cancel every watcher and wait for all of them.
    pub async fn shutdown(&self) {
        self.root.cancel();
        let handles: Vec<WatchHandle> = self.active.lock().await.drain().map(|(_, h)| h).collect();
        let count = handles.len();
        for handle in handles {
            let _ = handle.join.await;
        }
        debug!(count, "watchers stopped");
    }
}

impl Shared {
    /// Remaining wait budget measured from the task's creation time.
    fn remaining(&self, created_at: chrono::DateTime<chrono::Utc>) -> Duration {
        let elapsed = (self.clock.now() - created_at)
            .to_std()
            .unwrap_or(Duration::ZERO);
        self.config.max_wait.saturating_sub(elapsed)
    }

    async fn expire(&self, id: &TaskId) -> WatchOutcome {
        match self.store.transition(id, Transition::TimedOut).await {
            Ok(_) => {
                info!(task_id = %id, "no response within the wait budget");
                WatchOutcome::TimedOut
            }
            Err(err) => {
                debug!(task_id = %id, error = %err, "timeout skipped");
                WatchOutcome::Superseded
            }
        }
    }

    /// One scan. `Some` when the watcher should stop.
    async fn poll_once(&self, id: &TaskId) -> Option<WatchOutcome> {
        let task = match self.store.get(id).await {
            Ok(task) if !task.is_terminal() => task,
            Ok(_) | Err(_) => return Some(WatchOutcome::Superseded),
        };
        let source = self.source.as_ref()?;

        let mut messages = match source.recent_messages(self.config.history_limit).await {
            Ok(messages) => messages,
            Err(err) => {
                warn!(task_id = %id, error = %err, "failed to read channel history");
                return None;
            }
        };
        messages.retain(|m| m.timestamp >= task.created_at);
        messages.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));

        let found = matcher::find_match(&task.prompt, &messages, &self.config.generator_id)?;
        match self
            .store
            .transition(
                id,
                Transition::Completed {
                    image_urls: found.image_urls,
                },
            )
            .await
        {
            Ok(_) => {
                info!(task_id = %id, message_id = %found.message_id, "task completed");
                Some(WatchOutcome::Matched)
            }
            Err(err) => {
                debug!(task_id = %id, error = %err, "completion skipped");
                Some(WatchOutcome::Superseded)
            }
        }
    }
}

async fn watch(
    shared: Arc<Shared>,
    id: TaskId,
    created_at: chrono::DateTime<chrono::Utc>,
    token: CancellationToken,
) -> WatchOutcome {
    let deadline = Instant::now() + shared.remaining(created_at);
    let period = shared.config.poll_interval;
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    debug!(task_id = %id, "watching for response");
    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => {
                debug!(task_id = %id, "watcher cancelled");
                return WatchOutcome::Cancelled;
            }
            _ = sleep_until(deadline) => return shared.expire(&id).await,
            _ = ticker.tick() => {
                if let Some(outcome) = shared.poll_once(&id).await {
                    return outcome;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::testing::{FakeSource, GENERATOR, fixture_store, reply, start_time};
    use crate::domain::Prompt;
    use crate::ports::FixedClock;

    fn config() -> WatchConfig {
        WatchConfig {
            generator_id: GENERATOR.into(),
            poll_interval: Duration::from_secs(6),
            max_wait: Duration::from_secs(15 * 60),
            history_limit: 25,
        }
    }

    async fn waiting_task(store: &Arc<dyn TaskStore>, raw_id: &str, prompt: &str) -> TaskRecord {
        let id = TaskId::parse(raw_id).unwrap();
        store
            .create(id.clone(), Prompt::parse(prompt).unwrap())
            .await
            .unwrap();
        store
            .transition(
                &id,
                Transition::Accepted {
                    correlation_id: "c".into(),
                    strategy: "interaction".into(),
                },
            )
            .await
            .unwrap()
    }

    fn group(
        store: &Arc<dyn TaskStore>,
        source: Option<Arc<FakeSource>>,
        clock: &Arc<FixedClock>,
    ) -> WatcherGroup {
        WatcherGroup::new(
            Arc::clone(store),
            source.map(|s| s as Arc<dyn MessageSource>),
            clock.clone(),
            config(),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn polling_completes_on_matching_reply() {
        let (clock, store) = fixture_store();
        let source = FakeSource::new();
        let task = waiting_task(&store, "t1", "a red fox jumps over the lazy dog").await;
        source.post(reply(
            "m1",
            "red fox jumps over rocks",
            &["fox.png"],
            start_time() + chrono::Duration::seconds(30),
        ));

        let watchers = group(&store, Some(source.clone()), &clock);
        watchers.spawn(&task).await;

        assert_eq!(watchers.join(&task.id).await, Some(WatchOutcome::Matched));
        let task = store.get(&task.id).await.unwrap();
        assert_eq!(task.status, TaskStatus::Completed);
        assert_eq!(task.image_urls, vec!["https://cdn.example/fox.png".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn replies_older_than_the_task_are_ignored() {
        let (clock, store) = fixture_store();
        let source = FakeSource::new();
        let task = waiting_task(&store, "t1", "cat").await;
        source.post(reply(
            "old",
            "cat",
            &["cat.png"],
            start_time() - chrono::Duration::minutes(5),
        ));

        let watchers = group(&store, Some(source.clone()), &clock);
        watchers.spawn(&task).await;

        assert_eq!(watchers.join(&task.id).await, Some(WatchOutcome::TimedOut));
        let task = store.get(&task.id).await.unwrap();
        assert_eq!(task.status, TaskStatus::Timeout);
        assert!(task.image_urls.is_empty());
        assert!(source.fetches() > 100);
    }

    #[tokio::test(start_paused = true)]
    async fn fetch_errors_do_not_stop_the_loop() {
        let (clock, store) = fixture_store();
        let source = FakeSource::new();
        source.fail_next();
        source.fail_next();
        let task = waiting_task(&store, "t1", "cat").await;
        source.post(reply("m1", "", &["cat.webp"], start_time()));

        let watchers = group(&store, Some(source.clone()), &clock);
        watchers.spawn(&task).await;

        assert_eq!(watchers.join(&task.id).await, Some(WatchOutcome::Matched));
        assert_eq!(source.fetches(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn oldest_valid_reply_wins() {
        let (clock, store) = fixture_store();
        let source = FakeSource::new();
        let task = waiting_task(&store, "t1", "cat").await;
        source.post(reply("first", "", &["first.png"], start_time() + chrono::Duration::seconds(1)));
        source.post(reply("second", "", &["second.png"], start_time() + chrono::Duration::seconds(2)));

        let watchers = group(&store, Some(source.clone()), &clock);
        watchers.spawn(&task).await;
        watchers.join(&task.id).await;

        let task = store.get(&task.id).await.unwrap();
        assert_eq!(task.image_urls, vec!["https://cdn.example/first.png".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn remaining_budget_counts_from_creation() {
        let (clock, store) = fixture_store();
        let task = waiting_task(&store, "t1", "cat").await;
        // タスク作成から既に 20 分経過
        clock.advance(chrono::Duration::minutes(20));

        let watchers = group(&store, None, &clock);
        let started = Instant::now();
        watchers.spawn(&task).await;

        assert_eq!(watchers.join(&task.id).await, Some(WatchOutcome::TimedOut));
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn terminal_task_stops_the_watcher_without_mutation() {
        let (clock, store) = fixture_store();
        let source = FakeSource::new();
        let task = waiting_task(&store, "t1", "cat").await;
        store
            .transition(&task.id, Transition::Errored { error: "x".into() })
            .await
            .unwrap();

        let watchers = group(&store, Some(source.clone()), &clock);
        watchers.spawn(&task).await;

        assert_eq!(watchers.join(&task.id).await, Some(WatchOutcome::Superseded));
        assert_eq!(store.get(&task.id).await.unwrap().status, TaskStatus::Error);
        assert_eq!(source.fetches(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_leaves_the_task_waiting() {
        let (clock, store) = fixture_store();
        let task = waiting_task(&store, "t1", "cat").await;
        let watchers = group(&store, Some(FakeSource::new()), &clock);
        watchers.spawn(&task).await;
        assert_eq!(watchers.active_count().await, 1);

        assert!(watchers.cancel(&task.id).await);
        assert!(!watchers.cancel(&task.id).await);
        tokio::task::yield_now().await;

        assert_eq!(
            store.get(&task.id).await.unwrap().status,
            TaskStatus::WaitingForResponse
        );
    }

    #[tokio::test]
    async fn ingest_completes_the_oldest_matching_task() {
        let (clock, store) = fixture_store();
        let first = waiting_task(&store, "first", "misty mountain lake sunrise").await;
        clock.advance(chrono::Duration::seconds(5));
        let second = waiting_task(&store, "second", "misty mountain lake sunrise").await;
        let watchers = group(&store, None, &clock);

        let message = reply(
            "m1",
            "misty mountain",
            &["grid.png"],
            start_time() + chrono::Duration::minutes(1),
        );
        assert_eq!(watchers.ingest(&message).await, Some(first.id.clone()));
        assert_eq!(watchers.ingest(&message).await, Some(second.id.clone()));
        assert_eq!(watchers.ingest(&message).await, None);
    }

    #[tokio::test]
    async fn ingest_ignores_foreign_authors_and_text_files() {
        let (clock, store) = fixture_store();
        waiting_task(&store, "t1", "cat").await;
        let watchers = group(&store, None, &clock);

        let mut foreign = reply("m1", "cat", &["cat.png"], start_time());
        foreign.author_id = "42".into();
        let text_only = reply("m2", "cat", &["cat.txt"], start_time());

        assert_eq!(watchers.ingest(&foreign).await, None);
        assert_eq!(watchers.ingest(&text_only).await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_stops_every_watcher() {
        let (clock, store) = fixture_store();
        let watchers = group(&store, Some(FakeSource::new()), &clock);
        for raw in ["a", "b", "c"] {
            let task = waiting_task(&store, raw, "cat").await;
            watchers.spawn(&task).await;
        }

        watchers.shutdown().await;

        assert_eq!(watchers.active_count().await, 0);
        assert_eq!(store.counts().await.pending, 3);
        let late = waiting_task(&store, "d", "cat").await;
        watchers.spawn(&late).await;
        assert_eq!(watchers.active_count().await, 0);
    }
}
