//! Prompt validation.

use std::fmt;

use super::errors::BridgeError;

/// Upper bound on prompt length, in characters. Discord caps command option
/// values and message content at 2000.
pub const MAX_PROMPT_CHARS: usize = 2000;

/// A validated, trimmed prompt.
///
/// Prompts longer than [`MAX_PROMPT_CHARS`] are rejected, never truncated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt(String);

impl Prompt {
    pub fn parse(raw: &str) -> Result<Self, BridgeError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(BridgeError::Validation("prompt is required".into()));
        }
        let chars = trimmed.chars().count();
        if chars > MAX_PROMPT_CHARS {
            return Err(BridgeError::Validation(format!(
                "prompt is {chars} characters; the limit is {MAX_PROMPT_CHARS}"
            )));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for Prompt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
