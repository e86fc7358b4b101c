//! Inbound messages observed in the destination channel.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Filename extensions accepted as generated images.
pub const IMAGE_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "webp"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub filename: String,
    pub url: String,
}

impl Attachment {
    pub fn new(filename: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            url: url.into(),
        }
    }

    /// Does the filename carry an allow-listed image extension?
    pub fn is_image(&self) -> bool {
        Path::new(&self.filename)
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| {
                IMAGE_EXTENSIONS
                    .iter()
                    .any(|allowed| ext.eq_ignore_ascii_case(allowed))
            })
    }
}

/// A message posted to the channel, normalized from whatever transport saw it
/// (history polling or a pushed event).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundMessage {
    pub id: String,
    pub author_id: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    /// Posting time. Required: it gates matching against `created_at`, so it
    /// must come from the platform, never from the receiver's clock.
    pub timestamp: DateTime<Utc>,
}

impl InboundMessage {
    /// URLs of attachments that look like images, in attachment order.
    pub fn image_urls(&self) -> Vec<String> {
        self.attachments
            .iter()
            .filter(|a| a.is_image())
            .map(|a| a.url.clone())
            .collect()
    }
}
