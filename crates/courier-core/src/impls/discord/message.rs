//! Plain channel message fallback.

use async_trait::async_trait;
use serde::Serialize;

use super::{DiscordHttp, classify, rejection};
use crate::domain::BridgeError;
use crate::ports::{CommandSender, GenerateCommand, SendReceipt};

/// Discord rejects message content longer than this.
pub const MAX_CONTENT_CHARS: usize = 2000;

#[derive(Serialize)]
struct MessagePayload<'a> {
    content: &'a str,
}

/// Posts `/<command> prompt: <text>` to the channel with a bot token
/// (`POST /channels/{id}/messages`).
pub struct ChannelMessageStrategy {
    http: DiscordHttp,
    bot_token: String,
}

impl ChannelMessageStrategy {
    pub fn new(http: DiscordHttp, bot_token: impl Into<String>) -> Self {
        Self {
            http,
            bot_token: bot_token.into(),
        }
    }

    fn content(&self, command: &GenerateCommand) -> String {
        format!(
            "/{} prompt: {}",
            self.http.config().command_name,
            command.prompt
        )
    }
}

#[async_trait]
impl CommandSender for ChannelMessageStrategy {
    fn name(&self) -> &'static str {
        "channel_message"
    }

    async fn send(&self, command: &GenerateCommand) -> Result<SendReceipt, BridgeError> {
        let path = format!("channels/{}/messages", self.http.config().channel_id);
        let content = self.content(command);
        // 接頭辞の分だけプロンプトの上限より短くなる。送らずに確定的な拒否として扱う
        let chars = content.chars().count();
        if chars > MAX_CONTENT_CHARS {
            return Err(BridgeError::UpstreamRejected {
                status: 400,
                detail: format!(
                    "message content is {chars} characters; discord allows at most {MAX_CONTENT_CHARS}"
                ),
            });
        }
        let response = self
            .http
            .client()
            .post(self.http.url(&path))
            .header("authorization", format!("Bot {}", self.bot_token))
            .json(&MessagePayload { content: &content })
            .send()
            .await
            .map_err(classify)?;

        if !response.status().is_success() {
            return Err(rejection(response).await);
        }
        Ok(SendReceipt {
            strategy: self.name().to_string(),
            status: response.status().as_u16(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Prompt, TaskId};
    use crate::impls::discord::test_config;
    use httpmock::prelude::*;

    #[tokio::test]
    async fn posts_command_text_with_bot_token() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/channels/222/messages")
                    .header("authorization", "Bot secret")
                    .body_includes("/imagine prompt: a lighthouse at dusk");
                then.status(200).json_body(serde_json::json!({ "id": "555" }));
            })
            .await;

        let http = DiscordHttp::new(test_config(server.base_url())).unwrap();
        let command = GenerateCommand {
            task_id: TaskId::parse("t1").unwrap(),
            prompt: Prompt::parse("a lighthouse at dusk").unwrap(),
            correlation_id: "c".into(),
        };
        let receipt = ChannelMessageStrategy::new(http, "secret")
            .send(&command)
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(receipt.strategy, "channel_message");
        assert_eq!(receipt.status, 200);
    }

    #[tokio::test]
    async fn overlong_content_is_refused_without_sending() {
        // モックなし: 送信されれば 404 が返る
        let server = MockServer::start_async().await;
        let http = DiscordHttp::new(test_config(server.base_url())).unwrap();
        let command = GenerateCommand {
            task_id: TaskId::parse("t1").unwrap(),
            prompt: Prompt::parse(&"x".repeat(2000)).unwrap(),
            correlation_id: "c".into(),
        };

        let err = ChannelMessageStrategy::new(http, "secret")
            .send(&command)
            .await
            .unwrap_err();

        match err {
            BridgeError::UpstreamRejected { status, detail } => {
                assert_eq!(status, 400);
                assert!(detail.contains("2017"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
