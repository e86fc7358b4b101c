//! Sweeper - 期限切れタスクの回収
//!
//! # フロー（`interval` ごと）
//! 1. TaskStore::expire_pending(max_wait) で待ち時間超過の非終端タスクを timeout に
//! 2. TaskStore::evict_terminal(retention) で保持期間を過ぎた終端タスクを削除
//!
//! polling watcher が止まっていても（push mode やプロセスの取りこぼし）
//! タスクが永遠に waiting のまま残らないようにするためのもの。

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::ports::TaskStore;

#[derive(Debug, Clone, Copy)]
pub struct SweepConfig {
    pub interval: Duration,
    pub max_wait: Duration,
    pub retention: Duration,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub timed_out: usize,
    pub evicted: usize,
}

pub struct Sweeper {
    store: Arc<dyn TaskStore>,
    config: SweepConfig,
}

impl Sweeper {
    pub fn new(store: Arc<dyn TaskStore>, config: SweepConfig) -> Self {
        Self { store, config }
    }

    pub async fn sweep_once(&self) -> SweepReport {
        let report = SweepReport {
            timed_out: self.store.expire_pending(self.config.max_wait).await,
            evicted: self.store.evict_terminal(self.config.retention).await,
        };
        if report != SweepReport::default() {
            info!(
                timed_out = report.timed_out,
                evicted = report.evicted,
                "sweep finished"
            );
        }
        report
    }

    /// Run `sweep_once` every `interval` until `token` is cancelled.
    pub fn spawn(self: Arc<Self>, token: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = interval(self.config.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // 最初の tick は即時に完了するので読み捨てる
            ticker.tick().await;

            loop {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        self.sweep_once().await;
                    }
                }
            }
            debug!("sweeper stopped");
        })
    }
}
