//! Discord transport.
//!
//! - **InteractionStrategy**: replays an `/imagine` application-command
//!   interaction with a user session
//! - **ChannelMessageStrategy**: posts the command text as a bot message
//! - **ChannelHistory**: reads recent channel messages (polling mode)

mod history;
mod interaction;
mod message;

pub use self::history::{ChannelHistory, HistoryAuth};
pub use self::interaction::{InteractionStrategy, UserSession};
pub use self::message::ChannelMessageStrategy;

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::domain::BridgeError;

pub const DEFAULT_API_BASE: &str = "https://discord.com/api/v9";

/// Upstream error bodies are cut to this many characters before being stored.
const MAX_DETAIL_CHARS: usize = 500;

/// Addresses and command identity for the destination channel.
#[derive(Debug, Clone)]
pub struct DiscordConfig {
    pub api_base: String,
    pub guild_id: String,
    pub channel_id: String,
    pub application_id: String,
    pub command_id: String,
    pub command_version: String,
    pub command_name: String,
    pub request_timeout: Duration,
}

/// Shared HTTP client plus channel addressing.
#[derive(Clone)]
pub struct DiscordHttp {
    client: reqwest::Client,
    config: Arc<DiscordConfig>,
}

impl DiscordHttp {
    pub fn new(config: DiscordConfig) -> Result<Self, BridgeError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| BridgeError::Internal(format!("http client: {e}")))?;
        Ok(Self {
            client,
            config: Arc::new(config),
        })
    }

    pub fn config(&self) -> &DiscordConfig {
        &self.config
    }

    pub(crate) fn client(&self) -> &reqwest::Client {
        &self.client
    }

    pub(crate) fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.config.api_base.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    pub(crate) fn channel_referer(&self) -> String {
        format!(
            "https://discord.com/channels/{}/{}",
            self.config.guild_id, self.config.channel_id
        )
    }
}

/// Map a reqwest failure onto the upstream error taxonomy.
pub(crate) fn classify(err: reqwest::Error) -> BridgeError {
    if err.is_timeout() {
        BridgeError::UpstreamTimeout
    } else {
        BridgeError::Transport(err.to_string())
    }
}

/// Turn a non-success response into `UpstreamRejected` with the body as detail.
pub(crate) async fn rejection(response: reqwest::Response) -> BridgeError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    debug!(status, body = %body, "upstream rejected request");
    BridgeError::UpstreamRejected {
        status,
        detail: body.chars().take(MAX_DETAIL_CHARS).collect(),
    }
}

#[cfg(test)]
pub(crate) fn test_config(api_base: String) -> DiscordConfig {
    DiscordConfig {
        api_base,
        guild_id: "111".into(),
        channel_id: "222".into(),
        application_id: "936929561302675456".into(),
        command_id: "938956540159881230".into(),
        command_version: "1118961510123847772".into(),
        command_name: "imagine".into(),
        request_timeout: Duration::from_secs(5),
    }
}
