//! テスト用の fake 実装（CommandSender / MessageSource）

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};

use crate::domain::{Attachment, BridgeError, InboundMessage};
use crate::impls::InMemoryTaskStore;
use crate::ports::{CommandSender, FixedClock, GenerateCommand, MessageSource, SendReceipt, TaskStore};

pub const GENERATOR: &str = "936929561302675456";

pub fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()
}

pub fn fixture_store() -> (Arc<FixedClock>, Arc<dyn TaskStore>) {
    let clock = Arc::new(FixedClock::new(start_time()));
    let store: Arc<dyn TaskStore> = Arc::new(InMemoryTaskStore::new(clock.clone()));
    (clock, store)
}

/// Generator reply with the given attachments, posted at `at`.
pub fn reply(id: &str, content: &str, files: &[&str], at: DateTime<Utc>) -> InboundMessage {
    InboundMessage {
        id: id.into(),
        author_id: GENERATOR.into(),
        content: content.into(),
        attachments: files
            .iter()
            .map(|f| Attachment::new(*f, format!("https://cdn.example/{f}")))
            .collect(),
        timestamp: at,
    }
}

#[derive(Debug, Clone, Copy)]
pub enum SendBehavior {
    Accept,
    Reject(u16),
    Timeout,
    Transport,
}

pub struct FakeSender {
    name: &'static str,
    behavior: SendBehavior,
    calls: AtomicUsize,
}

impl FakeSender {
    pub fn new(name: &'static str, behavior: SendBehavior) -> Arc<Self> {
        Arc::new(Self {
            name,
            behavior,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CommandSender for FakeSender {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn send(&self, _command: &GenerateCommand) -> Result<SendReceipt, BridgeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.behavior {
            SendBehavior::Accept => Ok(SendReceipt {
                strategy: self.name.to_string(),
                status: 204,
            }),
            SendBehavior::Reject(status) => Err(BridgeError::UpstreamRejected {
                status,
                detail: "rejected by fake".into(),
            }),
            SendBehavior::Timeout => Err(BridgeError::UpstreamTimeout),
            SendBehavior::Transport => Err(BridgeError::Transport("connection refused".into())),
        }
    }
}

/// Channel history backed by a vector; `fail_next` makes one fetch error out.
#[derive(Default)]
pub struct FakeSource {
    messages: Mutex<Vec<InboundMessage>>,
    failures: AtomicUsize,
    fetches: AtomicUsize,
}

impl FakeSource {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn post(&self, message: InboundMessage) {
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(message);
    }

    pub fn fail_next(&self) {
        self.failures.fetch_add(1, Ordering::SeqCst);
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MessageSource for FakeSource {
    async fn recent_messages(&self, limit: usize) -> Result<Vec<InboundMessage>, BridgeError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(BridgeError::Transport("history unavailable".into()));
        }
        // Discord と同じく新しい順で返す
        let messages = self.messages.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(messages.iter().rev().take(limit).cloned().collect())
    }
}
