//! Impls - ports の実装
//!
//! # 含まれる実装
//! - **InMemoryTaskStore**: プロセス内の正本（再起動で消える）
//! - **discord**: Discord API への送信戦略とチャンネル履歴の読み取り

pub mod discord;
pub mod memory_store;

// 主要な型を再エクスポート
pub use self::discord::{
    ChannelHistory, ChannelMessageStrategy, DiscordConfig, DiscordHttp, HistoryAuth,
    InteractionStrategy, UserSession,
};
pub use self::memory_store::InMemoryTaskStore;
