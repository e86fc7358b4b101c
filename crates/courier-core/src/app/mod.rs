//! App - アプリケーション層
//!
//! このモジュールは、ports を組み合わせてアプリケーションロジックを実装します。
//!
//! # 主要コンポーネント
//! - **BridgeBuilder**: 構築とワイヤリング（起動時検証）
//! - **Bridge**: HTTP ハンドラから呼ばれる操作の集合
//! - **Submitter**: プロンプト送信（StrategyChain）
//! - **Matcher**: 返信とタスクの対応付け
//! - **WatcherGroup**: 返信待ち（polling / push）
//! - **Sweeper**: 期限切れタスクの回収
//! - **Status**: 読み取り用ビュー

pub mod bridge;
pub mod builder;
pub mod matcher;
pub mod status;
pub mod submitter;
pub mod sweeper;
pub mod watcher;

#[cfg(test)]
pub(crate) mod testing;

// 主要な型を再エクスポート
pub use self::bridge::Bridge;
pub use self::builder::{BridgeBuilder, BuildError};
pub use self::matcher::MatchedResponse;
pub use self::status::{HealthView, TaskView};
pub use self::submitter::{StrategyChain, SubmitOutcome, Submitter};
pub use self::sweeper::{SweepConfig, SweepReport, Sweeper};
pub use self::watcher::{WatchConfig, WatchOutcome, WatcherGroup};
