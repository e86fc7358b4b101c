//! Slash-command interaction replay.

use async_trait::async_trait;
use serde::Serialize;
use tracing::debug;

use super::{DiscordHttp, classify, rejection};
use crate::domain::BridgeError;
use crate::ports::{CommandSender, GenerateCommand, SendReceipt};

const APPLICATION_COMMAND: u8 = 2;
const CHAT_INPUT: u8 = 1;
const STRING_OPTION: u8 = 3;

/// Credentials of the user session the interaction is replayed from.
///
/// At least one of `token` / `cookie` must be set.
#[derive(Clone)]
pub struct UserSession {
    pub token: Option<String>,
    pub cookie: Option<String>,
    pub user_agent: String,
    pub super_properties: Option<String>,
}

impl std::fmt::Debug for UserSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserSession")
            .field("token", &self.token.as_ref().map(|_| "[MASKED]"))
            .field("cookie", &self.cookie.as_ref().map(|_| "[MASKED]"))
            .field("user_agent", &self.user_agent)
            .finish_non_exhaustive()
    }
}

#[derive(Serialize)]
struct InteractionPayload<'a> {
    #[serde(rename = "type")]
    kind: u8,
    application_id: &'a str,
    guild_id: &'a str,
    channel_id: &'a str,
    session_id: &'a str,
    data: CommandData<'a>,
}

#[derive(Serialize)]
struct CommandData<'a> {
    version: &'a str,
    id: &'a str,
    name: &'a str,
    #[serde(rename = "type")]
    kind: u8,
    options: Vec<CommandOption<'a>>,
}

#[derive(Serialize)]
struct CommandOption<'a> {
    #[serde(rename = "type")]
    kind: u8,
    name: &'a str,
    value: &'a str,
}

/// Sends `/imagine prompt:<text>` as an application-command interaction
/// (`POST /interactions`). Discord answers 204 on acceptance.
pub struct InteractionStrategy {
    http: DiscordHttp,
    session: UserSession,
}

impl InteractionStrategy {
    pub fn new(http: DiscordHttp, session: UserSession) -> Self {
        Self { http, session }
    }

    fn payload<'a>(&'a self, command: &'a GenerateCommand) -> InteractionPayload<'a> {
        let config = self.http.config();
        InteractionPayload {
            kind: APPLICATION_COMMAND,
            application_id: &config.application_id,
            guild_id: &config.guild_id,
            channel_id: &config.channel_id,
            session_id: &command.correlation_id,
            data: CommandData {
                version: &config.command_version,
                id: &config.command_id,
                name: &config.command_name,
                kind: CHAT_INPUT,
                options: vec![CommandOption {
                    kind: STRING_OPTION,
                    name: "prompt",
                    value: command.prompt.as_str(),
                }],
            },
        }
    }
}

#[async_trait]
impl CommandSender for InteractionStrategy {
    fn name(&self) -> &'static str {
        "interaction"
    }

    async fn send(&self, command: &GenerateCommand) -> Result<SendReceipt, BridgeError> {
        let mut request = self
            .http
            .client()
            .post(self.http.url("interactions"))
            .header("accept", "*/*")
            .header("accept-language", "en-US,en;q=0.9")
            .header("origin", "https://discord.com")
            .header("referer", self.http.channel_referer())
            .header("user-agent", &self.session.user_agent)
            .json(&self.payload(command));

        if let Some(token) = &self.session.token {
            request = request.header("authorization", token);
        }
        if let Some(cookie) = &self.session.cookie {
            request = request.header("cookie", cookie);
        }
        if let Some(props) = &self.session.super_properties {
            request = request.header("x-super-properties", props);
        }

        debug!(task_id = %command.task_id, "posting interaction");
        let response = request.send().await.map_err(classify)?;
        if !response.status().is_success() {
            return Err(rejection(response).await);
        }
        Ok(SendReceipt {
            strategy: self.name().to_string(),
            status: response.status().as_u16(),
        })
    }
}
