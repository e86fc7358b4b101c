//! courier-core
//!
//! Core building blocks for the Courier bridge: prompts go out to a Discord
//! channel as `/imagine` interactions, generated images come back through a
//! status API.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, prompt, task, state, message, errors）
//! - **ports**: 抽象化レイヤー（TaskStore, CommandSender, MessageSource, Clock, IdGenerator）
//! - **impls**: 実装（InMemoryTaskStore, Discord transport）
//! - **app**: アプリケーションロジック（submitter, matcher, watcher, sweeper, status, bridge）
//! - **api**: HTTP ルーティング（axum）
//! - **settings**: 設定の読み込みとワイヤリング

pub mod api;
pub mod app;
pub mod domain;
pub mod impls;
pub mod ports;
pub mod settings;

pub use self::app::{Bridge, BridgeBuilder};
pub use self::settings::Settings;
