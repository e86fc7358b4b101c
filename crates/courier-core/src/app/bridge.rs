//! Bridge - サービスの表面（HTTP ハンドラから呼ばれる操作の集合）
//!
//! # 操作
//! - `generate`: 送信し、受理されたら watcher を起動
//! - `status` / `health`: 読み取りのみ
//! - `ingest`: push mode のメッセージ受け口
//! - `cancel`: タスクの watcher を止める（状態は変えない）
//! - `start` / `shutdown`: sweeper と watcher のライフサイクル

use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::app::status::{HealthView, TaskView};
use crate::app::submitter::{SubmitOutcome, Submitter};
use crate::app::sweeper::{SweepReport, Sweeper};
use crate::app::watcher::WatcherGroup;
use crate::domain::{BridgeError, InboundMessage, TaskId};
use crate::ports::{Clock, TaskStore};

pub struct Bridge {
    store: Arc<dyn TaskStore>,
    clock: Arc<dyn Clock>,
    submitter: Submitter,
    watchers: WatcherGroup,
    sweeper: Arc<Sweeper>,
    shutdown: CancellationToken,
    sweeper_handle: Mutex<Option<JoinHandle<()>>>,
}

impl Bridge {
    pub(crate) fn new(
        store: Arc<dyn TaskStore>,
        clock: Arc<dyn Clock>,
        submitter: Submitter,
        watchers: WatcherGroup,
        sweeper: Sweeper,
    ) -> Self {
        Self {
            store,
            clock,
            submitter,
            watchers,
            sweeper: Arc::new(sweeper),
            shutdown: CancellationToken::new(),
            sweeper_handle: Mutex::new(None),
        }
    }

    /// Start the background sweeper. Calling it twice is a no-op.
    pub async fn start(&self) {
        let mut handle = self.sweeper_handle.lock().await;
        if handle.is_none() && !self.shutdown.is_cancelled() {
            *handle = Some(Arc::clone(&self.sweeper).spawn(self.shutdown.child_token()));
            info!(
                polling = self.watchers.is_polling(),
                strategies = ?self.submitter.strategy_names(),
                "bridge started"
            );
        }
    }

    pub async fn generate(
        &self,
        prompt: &str,
        task_id: Option<&str>,
    ) -> Result<SubmitOutcome, BridgeError> {
        let outcome = self.submitter.submit(prompt, task_id).await?;
        if let SubmitOutcome::Accepted { task } = &outcome
            && !task.status.is_terminal()
        {
            self.watchers.spawn(task).await;
        }
        info!(
            task_id = %outcome.task().id,
            status = %outcome.task().status,
            "generate handled"
        );
        Ok(outcome)
    }

    /// Ids that fail validation cannot exist, so they are reported as not found.
    pub async fn status(&self, raw_id: &str) -> Result<TaskView, BridgeError> {
        let id = TaskId::parse(raw_id).map_err(|_| BridgeError::NotFound(raw_id.to_string()))?;
        let record = self.store.get(&id).await?;
        Ok(TaskView::from_record(record, self.clock.now()))
    }

    pub async fn health(&self) -> HealthView {
        HealthView::new(
            self.submitter.is_configured(),
            self.submitter
                .strategy_names()
                .into_iter()
                .map(str::to_string)
                .collect(),
            self.store.counts().await,
            self.watchers.active_count().await,
        )
    }

    pub async fn ingest(&self, message: &InboundMessage) -> Option<TaskId> {
        self.watchers.ingest(message).await
    }

    pub async fn cancel(&self, id: &TaskId) -> bool {
        self.watchers.cancel(id).await
    }

    pub async fn sweep(&self) -> SweepReport {
        self.sweeper.sweep_once().await
    }

    pub fn is_configured(&self) -> bool {
        self.submitter.is_configured()
    }

    pub fn watchers(&self) -> &WatcherGroup {
        &self.watchers
    }

    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        if let Some(handle) = self.sweeper_handle.lock().await.take() {
            let _ = handle.await;
        }
        self.watchers.shutdown().await;
        debug!("bridge shut down");
    }
}
