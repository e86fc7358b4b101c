//! Channel history reader (polling mode).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::{DiscordHttp, UserSession, classify, rejection};
use crate::domain::{Attachment, BridgeError, InboundMessage};
use crate::ports::MessageSource;

/// Discord caps `limit` on the messages endpoint at 100.
const MAX_HISTORY_LIMIT: usize = 100;

/// Credentials used to read the channel.
#[derive(Debug, Clone)]
pub enum HistoryAuth {
    Bot(String),
    User(UserSession),
}

#[derive(Debug, Deserialize)]
struct DiscordMessage {
    id: String,
    #[serde(default)]
    content: String,
    author: DiscordUser,
    #[serde(default)]
    attachments: Vec<DiscordAttachment>,
    timestamp: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct DiscordUser {
    id: String,
}

#[derive(Debug, Deserialize)]
struct DiscordAttachment {
    filename: String,
    url: String,
}

impl From<DiscordMessage> for InboundMessage {
    fn from(message: DiscordMessage) -> Self {
        InboundMessage {
            id: message.id,
            author_id: message.author.id,
            content: message.content,
            attachments: message
                .attachments
                .into_iter()
                .map(|a| Attachment::new(a.filename, a.url))
                .collect(),
            timestamp: message.timestamp,
        }
    }
}

/// Reads `GET /channels/{id}/messages?limit=N` (newest first, as Discord
/// returns them).
pub struct ChannelHistory {
    http: DiscordHttp,
    auth: HistoryAuth,
}

impl ChannelHistory {
    pub fn new(http: DiscordHttp, auth: HistoryAuth) -> Self {
        Self { http, auth }
    }
}

#[async_trait]
impl MessageSource for ChannelHistory {
    async fn recent_messages(&self, limit: usize) -> Result<Vec<InboundMessage>, BridgeError> {
        let limit = limit.clamp(1, MAX_HISTORY_LIMIT);
        let path = format!("channels/{}/messages", self.http.config().channel_id);
        let mut request = self
            .http
            .client()
            .get(self.http.url(&path))
            .query(&[("limit", limit.to_string())]);

        request = match &self.auth {
            HistoryAuth::Bot(token) => request.header("authorization", format!("Bot {token}")),
            HistoryAuth::User(session) => {
                let mut request = request.header("user-agent", &session.user_agent);
                if let Some(token) = &session.token {
                    request = request.header("authorization", token);
                }
                if let Some(cookie) = &session.cookie {
                    request = request.header("cookie", cookie);
                }
                request
            }
        };

        let response = request.send().await.map_err(classify)?;
        if !response.status().is_success() {
            return Err(rejection(response).await);
        }
        let messages: Vec<DiscordMessage> = response
            .json()
            .await
            .map_err(|e| BridgeError::Transport(format!("decode channel history: {e}")))?;
        Ok(messages.into_iter().map(InboundMessage::from).collect())
    }
}
