//! Settings loaded from config files and the environment.
//!
//! Priority (later wins): struct defaults → `config/default` → `config/{RUN_MODE}`
//! → `config/local` → un-prefixed env (`CHANNEL_ID`) → `COURIER__*` env.
//!
//! 認証情報にはデフォルトがない。欠けていてもサーバは起動し、
//! `generate` だけが ConfigurationError を返す。

use std::sync::Arc;
use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::app::{Bridge, BridgeBuilder, BuildError};
use crate::domain::BridgeError;
use crate::impls::discord::DEFAULT_API_BASE;
use crate::impls::{
    ChannelHistory, ChannelMessageStrategy, DiscordConfig, DiscordHttp, HistoryAuth,
    InteractionStrategy, UserSession,
};

const DEFAULT_APPLICATION_ID: &str = "936929561302675456";
const DEFAULT_COMMAND_ID: &str = "938956540159881230";
const DEFAULT_COMMAND_VERSION: &str = "1118961510123847772";
const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36";

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("failed to load settings: {0}")]
    Load(#[from] ConfigError),
    #[error(transparent)]
    Build(#[from] BuildError),
    #[error("failed to set up discord client: {0}")]
    Client(#[from] BridgeError),
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub host: String,
    pub port: u16,

    pub discord_api_base: String,
    pub guild_id: Option<String>,
    pub channel_id: Option<String>,
    pub application_id: String,
    pub command_id: String,
    pub command_version: String,
    pub command_name: String,
    /// Author id of the generating bot (defaults to `application_id`).
    pub generator_id: Option<String>,

    /// User session used for interaction replay and history reads.
    pub discord_token: Option<String>,
    pub discord_cookie: Option<String>,
    pub discord_user_agent: String,
    pub discord_super_properties: Option<String>,
    /// Bot token for the plain-message fallback and history reads.
    pub bot_token: Option<String>,

    /// Read channel history; disable to rely on `/events/message` only.
    pub polling: bool,
    pub max_wait_minutes: u64,
    pub retention_hours: u64,
    pub poll_interval_secs: u64,
    pub history_limit: usize,
    pub sweep_interval_secs: u64,
    pub request_timeout_secs: u64,

    /// Shared secret required on `/events/message` when set.
    pub webhook_secret: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            discord_api_base: DEFAULT_API_BASE.to_string(),
            guild_id: None,
            channel_id: None,
            application_id: DEFAULT_APPLICATION_ID.to_string(),
            command_id: DEFAULT_COMMAND_ID.to_string(),
            command_version: DEFAULT_COMMAND_VERSION.to_string(),
            command_name: "imagine".to_string(),
            generator_id: None,
            discord_token: None,
            discord_cookie: None,
            discord_user_agent: DEFAULT_USER_AGENT.to_string(),
            discord_super_properties: None,
            bot_token: None,
            polling: true,
            max_wait_minutes: 15,
            retention_hours: 24,
            poll_interval_secs: 6,
            history_limit: 25,
            sweep_interval_secs: 60,
            request_timeout_secs: 30,
            webhook_secret: None,
        }
    }
}

// 認証情報をログに出さない
impl std::fmt::Debug for Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let masked = |v: &Option<String>| v.as_ref().map(|_| "[MASKED]");
        f.debug_struct("Settings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("discord_api_base", &self.discord_api_base)
            .field("guild_id", &self.guild_id)
            .field("channel_id", &self.channel_id)
            .field("generator_id", &self.generator_id())
            .field("discord_token", &masked(&self.discord_token))
            .field("discord_cookie", &masked(&self.discord_cookie))
            .field("bot_token", &masked(&self.bot_token))
            .field("webhook_secret", &masked(&self.webhook_secret))
            .field("polling", &self.polling)
            .field("max_wait_minutes", &self.max_wait_minutes)
            .finish_non_exhaustive()
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

impl Settings {
    /// Load from files and environment (call `dotenvy::dotenv()` first to pick up `.env`).
    pub fn load() -> Result<Self, SettingsError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());
        let config = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{run_mode}")).required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(Environment::default().ignore_empty(true))
            .add_source(
                Environment::with_prefix("COURIER")
                    .prefix_separator("__")
                    .separator("__")
                    .ignore_empty(true),
            )
            .build()?;
        Self::from_config(config)
    }

    pub fn from_config(config: Config) -> Result<Self, SettingsError> {
        Ok(config.try_deserialize()?)
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn generator_id(&self) -> String {
        non_empty(&self.generator_id).unwrap_or_else(|| self.application_id.clone())
    }

    fn user_session(&self) -> Option<UserSession> {
        let token = non_empty(&self.discord_token);
        let cookie = non_empty(&self.discord_cookie);
        if token.is_none() && cookie.is_none() {
            return None;
        }
        Some(UserSession {
            token,
            cookie,
            user_agent: self.discord_user_agent.clone(),
            super_properties: non_empty(&self.discord_super_properties),
        })
    }

    /// Names of the upstream settings that are absent. Empty means `generate` can run.
    pub fn missing_upstream(&self) -> Vec<String> {
        let mut missing = Vec::new();
        if non_empty(&self.guild_id).is_none() {
            missing.push("guild_id".to_string());
        }
        if non_empty(&self.channel_id).is_none() {
            missing.push("channel_id".to_string());
        }
        if self.user_session().is_none() && non_empty(&self.bot_token).is_none() {
            missing.push("discord_token, discord_cookie or bot_token".to_string());
        }
        missing
    }

    pub fn discord_config(&self) -> DiscordConfig {
        DiscordConfig {
            api_base: self.discord_api_base.clone(),
            guild_id: non_empty(&self.guild_id).unwrap_or_default(),
            channel_id: non_empty(&self.channel_id).unwrap_or_default(),
            application_id: self.application_id.clone(),
            command_id: self.command_id.clone(),
            command_version: self.command_version.clone(),
            command_name: self.command_name.clone(),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
        }
    }

    /// Wire the Discord transport into a [`Bridge`].
    ///
    /// Strategy order: interaction replay (user session), then plain bot message.
    /// History is read with the bot token when present, else the user session.
    pub fn build_bridge(&self) -> Result<Bridge, SettingsError> {
        let http = DiscordHttp::new(self.discord_config())?;
        let session = self.user_session();
        let bot_token = non_empty(&self.bot_token);

        let mut builder = BridgeBuilder::new(self.generator_id())
            .missing_config(self.missing_upstream())
            .max_wait(Duration::from_secs(self.max_wait_minutes.saturating_mul(60)))
            .retention(Duration::from_secs(self.retention_hours.saturating_mul(3600)))
            .poll_interval(Duration::from_secs(self.poll_interval_secs))
            .sweep_interval(Duration::from_secs(self.sweep_interval_secs))
            .history_limit(self.history_limit);

        if let Some(session) = &session {
            builder = builder.strategy(Arc::new(InteractionStrategy::new(http.clone(), session.clone())));
        }
        if let Some(token) = &bot_token {
            builder = builder.strategy(Arc::new(ChannelMessageStrategy::new(http.clone(), token.clone())));
        }

        let history_auth = match (bot_token, session) {
            (Some(token), _) => Some(HistoryAuth::Bot(token)),
            (None, Some(session)) => Some(HistoryAuth::User(session)),
            (None, None) => None,
        };
        match history_auth {
            Some(auth) if self.polling => {
                builder = builder.message_source(Arc::new(ChannelHistory::new(http, auth)));
            }
            Some(_) => info!("polling disabled; waiting for pushed messages only"),
            None => warn!("no credentials to read channel history; waiting for pushed messages only"),
        }

        Ok(builder.build()?)
    }
}
