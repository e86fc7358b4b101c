//! BridgeBuilder - Bridge の構築とワイヤリング
//!
//! # Fail-fast 設計
//! - 待ち時間と保持期間、ポーリング間隔の整合性を build() 時にチェック
//! - 不整合があれば BuildError を返す（起動前に気付けるように）
//!
//! 上流の認証情報が欠けていること自体はエラーにしない。
//! サーバは起動し、`generate` だけが ConfigurationError を返す（/health で確認できる）。

use std::sync::Arc;
use std::time::Duration;

use crate::app::bridge::Bridge;
use crate::app::submitter::{StrategyChain, Submitter};
use crate::app::sweeper::{SweepConfig, Sweeper};
use crate::app::watcher::{WatchConfig, WatcherGroup};
use crate::impls::InMemoryTaskStore;
use crate::ports::{Clock, CommandSender, IdGenerator, MessageSource, SystemClock, TaskStore, UlidGenerator};

pub const DEFAULT_MAX_WAIT: Duration = Duration::from_secs(15 * 60);
pub const DEFAULT_RETENTION: Duration = Duration::from_secs(24 * 3600);
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(6);
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);
pub const DEFAULT_HISTORY_LIMIT: usize = 25;

/// Shortest accepted wait budget. Below this the sweeper could time out a task
/// while its send is still in flight.
pub const MIN_MAX_WAIT: Duration = Duration::from_secs(60);

/// BuildError は Bridge 構築時のエラー
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum BuildError {
    #[error("max wait ({max_wait:?}) must be shorter than the retention horizon ({retention:?})")]
    BudgetExceedsRetention {
        max_wait: Duration,
        retention: Duration,
    },
    #[error("max wait ({max_wait:?}) must be at least {min:?}")]
    BudgetTooShort { max_wait: Duration, min: Duration },
    #[error("poll interval must be greater than zero")]
    ZeroPollInterval,
    #[error("sweep interval must be greater than zero")]
    ZeroSweepInterval,
    #[error("history limit must be greater than zero")]
    ZeroHistoryLimit,
}

/// BridgeBuilder は Bridge を構築
///
/// # 使用例
/// ```ignore
/// let bridge = BridgeBuilder::new("936929561302675456")
///     .strategy(Arc::new(InteractionStrategy::new(http, session)))
///     .message_source(Arc::new(ChannelHistory::new(http, auth)))
///     .build()?;
/// bridge.start().await;
/// ```
pub struct BridgeBuilder {
    generator_id: String,
    clock: Arc<dyn Clock>,
    ids: Option<Arc<dyn IdGenerator>>,
    strategies: Vec<Arc<dyn CommandSender>>,
    source: Option<Arc<dyn MessageSource>>,
    missing_config: Vec<String>,
    max_wait: Duration,
    retention: Duration,
    poll_interval: Duration,
    sweep_interval: Duration,
    history_limit: usize,
}

impl BridgeBuilder {
    pub fn new(generator_id: impl Into<String>) -> Self {
        Self {
            generator_id: generator_id.into(),
            clock: Arc::new(SystemClock),
            ids: None,
            strategies: Vec::new(),
            source: None,
            missing_config: Vec::new(),
            max_wait: DEFAULT_MAX_WAIT,
            retention: DEFAULT_RETENTION,
            poll_interval: DEFAULT_POLL_INTERVAL,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            history_limit: DEFAULT_HISTORY_LIMIT,
        }
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = Some(ids);
        self
    }

    /// Append a send strategy. Strategies are tried in registration order.
    pub fn strategy(mut self, strategy: Arc<dyn CommandSender>) -> Self {
        self.strategies.push(strategy);
        self
    }

    /// Enable polling mode.
    pub fn message_source(mut self, source: Arc<dyn MessageSource>) -> Self {
        self.source = Some(source);
        self
    }

    /// Names of upstream settings that are absent.
    pub fn missing_config(mut self, missing: Vec<String>) -> Self {
        self.missing_config = missing;
        self
    }

    pub fn max_wait(mut self, max_wait: Duration) -> Self {
        self.max_wait = max_wait;
        self
    }

    pub fn retention(mut self, retention: Duration) -> Self {
        self.retention = retention;
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    pub fn history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit;
        self
    }

    fn validate(&self) -> Result<(), BuildError> {
        if self.max_wait < MIN_MAX_WAIT {
            return Err(BuildError::BudgetTooShort {
                max_wait: self.max_wait,
                min: MIN_MAX_WAIT,
            });
        }
        if self.max_wait >= self.retention {
            return Err(BuildError::BudgetExceedsRetention {
                max_wait: self.max_wait,
                retention: self.retention,
            });
        }
        if self.poll_interval.is_zero() {
            return Err(BuildError::ZeroPollInterval);
        }
        if self.sweep_interval.is_zero() {
            return Err(BuildError::ZeroSweepInterval);
        }
        if self.history_limit == 0 {
            return Err(BuildError::ZeroHistoryLimit);
        }
        Ok(())
    }

    pub fn build(self) -> Result<Bridge, BuildError> {
        self.validate()?;

        let store: Arc<dyn TaskStore> = Arc::new(InMemoryTaskStore::new(Arc::clone(&self.clock)));
        let ids: Arc<dyn IdGenerator> = match self.ids {
            Some(ids) => ids,
            None => Arc::new(UlidGenerator::new(Arc::clone(&self.clock))),
        };

        let submitter = Submitter::new(
            Arc::clone(&store),
            ids,
            StrategyChain::new(self.strategies),
            self.missing_config,
        );
        let watchers = WatcherGroup::new(
            Arc::clone(&store),
            self.source,
            Arc::clone(&self.clock),
            WatchConfig {
                generator_id: self.generator_id,
                poll_interval: self.poll_interval,
                max_wait: self.max_wait,
                history_limit: self.history_limit,
            },
        );
        let sweeper = Sweeper::new(
            Arc::clone(&store),
            SweepConfig {
                interval: self.sweep_interval,
                max_wait: self.max_wait,
                retention: self.retention,
            },
        );

        Ok(Bridge::new(store, self.clock, submitter, watchers, sweeper))
    }
}
