//! Upstream ports - 送信戦略とメッセージ取得の抽象化
//!
//! - **CommandSender**: 1 つの送信戦略（interaction 再生、チャンネル投稿など）
//! - **MessageSource**: チャンネルの最近のメッセージを取得（polling mode 用）

use async_trait::async_trait;

use crate::domain::{BridgeError, InboundMessage, Prompt, TaskId};

/// One outbound "generate" command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerateCommand {
    pub task_id: TaskId,
    pub prompt: Prompt,
    pub correlation_id: String,
}

/// Acknowledgement of an accepted command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendReceipt {
    pub strategy: String,
    pub status: u16,
}

/// CommandSender は generate コマンドを上流に送る
///
/// 失敗の分類:
/// - `UpstreamRejected`: 上流が非成功ステータスを返した（確定的な拒否）
/// - `UpstreamTimeout` / `Transport`: 届いたかどうか不明
#[async_trait]
pub trait CommandSender: Send + Sync {
    fn name(&self) -> &'static str;

    async fn send(&self, command: &GenerateCommand) -> Result<SendReceipt, BridgeError>;
}

/// MessageSource は宛先チャンネルの最近のメッセージを返す（順序は問わない）
#[async_trait]
pub trait MessageSource: Send + Sync {
    async fn recent_messages(&self, limit: usize) -> Result<Vec<InboundMessage>, BridgeError>;
}
