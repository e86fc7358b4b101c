//! Submitter - プロンプトを上流へ送り、タスクを記録する
//!
//! # フロー
//! 1. prompt / task_id の検証（ValidationError）
//! 2. 上流設定の検証（ConfigurationError。タスクは作らない）
//! 3. TaskStore::create() で submitted のタスクを作成（重複 ID はここで弾く）
//! 4. StrategyChain で送信（自動リトライなし）
//! 5. 結果をタスクの status に記録して SubmitOutcome を返す
//!
//! 送信失敗は例外ではなく業務上の結果なので、`Err` ではなく
//! `SubmitOutcome::{Rejected, TimedOut, TransportFailed}` として返す。

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::domain::{BridgeError, Prompt, TaskId, TaskRecord, Transition};
use crate::ports::{CommandSender, GenerateCommand, IdGenerator, SendReceipt, TaskStore};

/// Result of one `generate` call.
#[derive(Debug, Clone)]
pub enum SubmitOutcome {
    /// Upstream accepted the command; the task is `waiting_for_response`.
    Accepted { task: TaskRecord },
    /// Upstream answered with a non-success status; the task is `failed`.
    Rejected {
        task: TaskRecord,
        status: u16,
        detail: String,
    },
    /// The request timed out; the task is `error`.
    TimedOut { task: TaskRecord },
    /// Connection-level failure; the task is `error`.
    TransportFailed { task: TaskRecord, detail: String },
}

impl SubmitOutcome {
    pub fn task(&self) -> &TaskRecord {
        match self {
            SubmitOutcome::Accepted { task }
            | SubmitOutcome::Rejected { task, .. }
            | SubmitOutcome::TimedOut { task }
            | SubmitOutcome::TransportFailed { task, .. } => task,
        }
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self, SubmitOutcome::Accepted { .. })
    }
}

/// Ordered send strategies; the first acceptance short-circuits the rest.
///
/// A later strategy is only tried after a definitive rejection of the previous
/// one. A timeout or transport failure stops the chain: the command may have
/// reached upstream, and sending it again could start a second billable
/// generation.
#[derive(Clone, Default)]
pub struct StrategyChain {
    strategies: Vec<Arc<dyn CommandSender>>,
}

impl StrategyChain {
    pub fn new(strategies: Vec<Arc<dyn CommandSender>>) -> Self {
        Self { strategies }
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    pub async fn dispatch(&self, command: &GenerateCommand) -> Result<SendReceipt, BridgeError> {
        let mut last_rejection = None;

        for (attempt, strategy) in self.strategies.iter().enumerate() {
            match strategy.send(command).await {
                Ok(receipt) => {
                    info!(
                        task_id = %command.task_id,
                        strategy = strategy.name(),
                        attempt,
                        status = receipt.status,
                        "generate command accepted"
                    );
                    return Ok(receipt);
                }
                Err(err @ BridgeError::UpstreamRejected { .. }) => {
                    warn!(
                        task_id = %command.task_id,
                        strategy = strategy.name(),
                        attempt,
                        error = %err,
                        "strategy rejected"
                    );
                    last_rejection = Some(err);
                }
                Err(err) => {
                    warn!(
                        task_id = %command.task_id,
                        strategy = strategy.name(),
                        attempt,
                        error = %err,
                        "strategy failed without a definitive answer; not falling back"
                    );
                    return Err(err);
                }
            }
        }

        Err(last_rejection
            .unwrap_or_else(|| BridgeError::Configuration("no send strategy configured".into())))
    }
}

pub struct Submitter {
    store: Arc<dyn TaskStore>,
    ids: Arc<dyn IdGenerator>,
    chain: StrategyChain,
    missing_config: Vec<String>,
}

impl Submitter {
    pub fn new(
        store: Arc<dyn TaskStore>,
        ids: Arc<dyn IdGenerator>,
        chain: StrategyChain,
        missing_config: Vec<String>,
    ) -> Self {
        Self {
            store,
            ids,
            chain,
            missing_config,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.missing_config.is_empty() && !self.chain.is_empty()
    }

    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.chain.names()
    }

    fn ensure_configured(&self) -> Result<(), BridgeError> {
        if !self.missing_config.is_empty() {
            return Err(BridgeError::Configuration(format!(
                "missing {}",
                self.missing_config.join(", ")
            )));
        }
        if self.chain.is_empty() {
            return Err(BridgeError::Configuration("no send strategy configured".into()));
        }
        Ok(())
    }

    /// Record the send result on the task.
    ///
    /// 送信中に sweeper が先に終端状態へ進めていることがある。その場合は上書きせず
    /// 保存済みの状態を返す。
    async fn record(&self, id: &TaskId, transition: Transition) -> Result<TaskRecord, BridgeError> {
        match self.store.transition(id, transition).await {
            Ok(task) => Ok(task),
            Err(err @ BridgeError::InvalidTransition { .. }) => {
                debug!(task_id = %id, error = %err, "task resolved while sending; keeping stored state");
                self.store.get(id).await
            }
            Err(err) => Err(err),
        }
    }

    /// Submit a prompt. Exactly one pass over the strategy chain, no retry.
    pub async fn submit(&self, prompt: &str, task_id: Option<&str>) -> Result<SubmitOutcome, BridgeError> {
        let prompt = Prompt::parse(prompt)?;
        let task_id = match task_id.map(str::trim).filter(|raw| !raw.is_empty()) {
            Some(raw) => TaskId::parse(raw)?,
            None => self.ids.generate_task_id(),
        };
        self.ensure_configured()?;

        self.store.create(task_id.clone(), prompt.clone()).await?;
        let command = GenerateCommand {
            task_id: task_id.clone(),
            prompt,
            correlation_id: self.ids.generate_correlation_id(),
        };

        let outcome = match self.chain.dispatch(&command).await {
            Ok(receipt) => {
                let task = self
                    .record(
                        &task_id,
                        Transition::Accepted {
                            correlation_id: command.correlation_id.clone(),
                            strategy: receipt.strategy,
                        },
                    )
                    .await?;
                SubmitOutcome::Accepted { task }
            }
            Err(BridgeError::UpstreamRejected { status, detail }) => {
                let error = format!("upstream returned {status}: {detail}");
                let task = self.record(&task_id, Transition::Failed { error }).await?;
                SubmitOutcome::Rejected {
                    task,
                    status,
                    detail,
                }
            }
            Err(BridgeError::UpstreamTimeout) => {
                let error = BridgeError::UpstreamTimeout.to_string();
                let task = self.record(&task_id, Transition::Errored { error }).await?;
                SubmitOutcome::TimedOut { task }
            }
            Err(other) => {
                let detail = other.to_string();
                let task = self
                    .record(
                        &task_id,
                        Transition::Errored {
                            error: detail.clone(),
                        },
                    )
                    .await?;
                SubmitOutcome::TransportFailed { task, detail }
            }
        };

        Ok(outcome)
    }
}
