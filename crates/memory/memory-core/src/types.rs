//! # Core Types
//!
//! Small value types shared by every entity in the crate.
//!
//! ## ChatMessageRole
//!
//! Role of the party that produced a piece: `system`, `user` or `assistant`.
//!
//! ## PromptDataType
//!
//! Semantic kind of a piece value. `text`, `url` and `error` values live inline as strings;
//! `image_path` and `audio_path` values are paths into the results storage.
//!
//! ## PromptResponseError
//!
//! Error state reported by a target for a response piece.
//!
//! All three serialize as snake_case strings and round-trip through `FromStr`/`Display`,
//! which is also the representation used by the SQL backend.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::MemoryError;

/// Free-form identifier mapping (e.g. `{"__type__": "PromptSendingOrchestrator", "id": "..."}`).
pub type Identifier = BTreeMap<String, String>;

/// Role of a message in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatMessageRole {
    System,
    User,
    Assistant,
}

impl ChatMessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatMessageRole::System => "system",
            ChatMessageRole::User => "user",
            ChatMessageRole::Assistant => "assistant",
        }
    }
}

impl fmt::Display for ChatMessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChatMessageRole {
    type Err = MemoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "system" => Ok(ChatMessageRole::System),
            "user" => Ok(ChatMessageRole::User),
            "assistant" => Ok(ChatMessageRole::Assistant),
            other => Err(MemoryError::validation(format!("Unknown role: {}", other))),
        }
    }
}

/// Semantic kind of a piece value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptDataType {
    #[default]
    Text,
    ImagePath,
    AudioPath,
    Url,
    Error,
}

impl PromptDataType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PromptDataType::Text => "text",
            PromptDataType::ImagePath => "image_path",
            PromptDataType::AudioPath => "audio_path",
            PromptDataType::Url => "url",
            PromptDataType::Error => "error",
        }
    }

    /// True when the value is a path into results storage rather than inline content.
    pub fn is_disk_resident(&self) -> bool {
        matches!(self, PromptDataType::ImagePath | PromptDataType::AudioPath)
    }
}

impl fmt::Display for PromptDataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PromptDataType {
    type Err = MemoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(PromptDataType::Text),
            "image_path" => Ok(PromptDataType::ImagePath),
            "audio_path" => Ok(PromptDataType::AudioPath),
            "url" => Ok(PromptDataType::Url),
            "error" => Ok(PromptDataType::Error),
            other => Err(MemoryError::validation(format!("Data type {} not supported", other))),
        }
    }
}

/// Error state reported by a target for a response piece.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptResponseError {
    #[default]
    None,
    Blocked,
    Processing,
    Empty,
    Unknown,
}

impl PromptResponseError {
    pub fn as_str(&self) -> &'static str {
        match self {
            PromptResponseError::None => "none",
            PromptResponseError::Blocked => "blocked",
            PromptResponseError::Processing => "processing",
            PromptResponseError::Empty => "empty",
            PromptResponseError::Unknown => "unknown",
        }
    }
}

impl fmt::Display for PromptResponseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PromptResponseError {
    type Err = MemoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(PromptResponseError::None),
            "blocked" => Ok(PromptResponseError::Blocked),
            "processing" => Ok(PromptResponseError::Processing),
            "empty" => Ok(PromptResponseError::Empty),
            "unknown" => Ok(PromptResponseError::Unknown),
            other => Err(MemoryError::validation(format!("Unknown response error: {}", other))),
        }
    }
}

/// A single chat message as a target API would see it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatMessageRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatMessageRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatMessageRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatMessageRole::Assistant,
            content: content.into(),
        }
    }
}
