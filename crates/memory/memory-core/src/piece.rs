//! # Prompt Request Pieces
//!
//! A [`PromptRequestPiece`] is one message unit of a conversation. Pieces of one logical exchange
//! are batched in a [`PromptRequestResponse`] and share a sequence number once stored.
//!
//! ## Lineage
//!
//! `original_prompt_id == id` for an original piece. A duplicated piece gets a fresh `id` but keeps
//! the original's id in `original_prompt_id`, which is where its scores live.
//!
//! ## Example
//!
//! ```rust
//! use memory_core::{ChatMessageRole, PromptRequestPiece, PromptRequestResponse};
//!
//! let piece = PromptRequestPiece::new(ChatMessageRole::User, "Hello")
//!     .with_conversation_id("conv-1");
//! assert!(!piece.is_duplicate());
//!
//! let request = PromptRequestResponse::new(vec![piece]);
//! assert!(request.validate().is_ok());
//! ```

use std::cmp::Ordering;
use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::condition::{Column, Record, Value};
use crate::error::{MemoryError, Result};
use crate::score::Score;
use crate::types::{ChatMessage, ChatMessageRole, Identifier, PromptDataType, PromptResponseError};

/// One message unit in a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptRequestPiece {
    pub id: Uuid,
    pub role: ChatMessageRole,
    pub conversation_id: String,
    /// Turn order within the conversation; assigned by the memory interface at insert time.
    pub sequence: i64,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub prompt_metadata: BTreeMap<String, String>,
    #[serde(default)]
    pub converter_identifiers: Vec<Identifier>,
    #[serde(default)]
    pub prompt_target_identifier: Identifier,
    #[serde(default)]
    pub orchestrator_identifier: Identifier,
    pub original_value_data_type: PromptDataType,
    pub original_value: String,
    #[serde(default)]
    pub original_value_sha256: Option<String>,
    pub converted_value_data_type: PromptDataType,
    pub converted_value: String,
    #[serde(default)]
    pub converted_value_sha256: Option<String>,
    #[serde(default)]
    pub response_error: PromptResponseError,
    pub original_prompt_id: Uuid,
    /// Scores attached on read; never persisted with the piece.
    #[serde(default)]
    pub scores: Vec<Score>,
}

impl PromptRequestPiece {
    /// Columns that `update_entries` may change on stored pieces. Content columns stay fixed so a
    /// piece's value, its sha256 and any file it points to never drift apart.
    pub const UPDATABLE_COLUMNS: &'static [Column] = &[
        Column::Labels,
        Column::PromptMetadata,
        Column::OrchestratorIdentifier,
    ];

    /// Creates a text piece in a fresh conversation. The converted value starts equal to the original.
    pub fn new(role: ChatMessageRole, original_value: impl Into<String>) -> Self {
        let id = Uuid::new_v4();
        let original_value = original_value.into();
        Self {
            id,
            role,
            conversation_id: Uuid::new_v4().to_string(),
            sequence: 0,
            timestamp: Utc::now(),
            labels: BTreeMap::new(),
            prompt_metadata: BTreeMap::new(),
            converter_identifiers: Vec::new(),
            prompt_target_identifier: Identifier::new(),
            orchestrator_identifier: Identifier::new(),
            original_value_data_type: PromptDataType::Text,
            converted_value: original_value.clone(),
            original_value,
            original_value_sha256: None,
            converted_value_data_type: PromptDataType::Text,
            converted_value_sha256: None,
            response_error: PromptResponseError::None,
            original_prompt_id: id,
            scores: Vec::new(),
        }
    }

    pub fn with_conversation_id(mut self, conversation_id: impl Into<String>) -> Self {
        self.conversation_id = conversation_id.into();
        self
    }

    /// Sets the data type of both the original and the (not yet converted) value.
    pub fn with_data_type(mut self, data_type: PromptDataType) -> Self {
        self.original_value_data_type = data_type;
        self.converted_value_data_type = data_type;
        self
    }

    pub fn with_converted_value(mut self, value: impl Into<String>, data_type: PromptDataType) -> Self {
        self.converted_value = value.into();
        self.converted_value_data_type = data_type;
        self
    }

    pub fn with_labels(mut self, labels: BTreeMap<String, String>) -> Self {
        self.labels = labels;
        self
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    pub fn with_prompt_metadata(mut self, prompt_metadata: BTreeMap<String, String>) -> Self {
        self.prompt_metadata = prompt_metadata;
        self
    }

    pub fn with_orchestrator_identifier(mut self, identifier: Identifier) -> Self {
        self.orchestrator_identifier = identifier;
        self
    }

    /// Shorthand for an orchestrator identifier that only carries an `id`.
    pub fn with_orchestrator_id(mut self, orchestrator_id: impl Into<String>) -> Self {
        self.orchestrator_identifier
            .insert("id".to_string(), orchestrator_id.into());
        self
    }

    pub fn with_prompt_target_identifier(mut self, identifier: Identifier) -> Self {
        self.prompt_target_identifier = identifier;
        self
    }

    pub fn with_converter_identifiers(mut self, identifiers: Vec<Identifier>) -> Self {
        self.converter_identifiers = identifiers;
        self
    }

    pub fn with_response_error(mut self, response_error: PromptResponseError) -> Self {
        self.response_error = response_error;
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// The `id` entry of the orchestrator identifier, if any.
    pub fn orchestrator_id(&self) -> Option<&str> {
        self.orchestrator_identifier.get("id").map(String::as_str)
    }

    /// True when this piece is a copy of another piece.
    pub fn is_duplicate(&self) -> bool {
        self.original_prompt_id != self.id
    }

    pub fn has_error(&self) -> bool {
        self.response_error != PromptResponseError::None
    }

    pub fn to_chat_message(&self) -> ChatMessage {
        ChatMessage {
            role: self.role,
            content: self.converted_value.clone(),
        }
    }

    /// Structural validation: converted value present and both values consistent with their data type.
    pub fn validate(&self) -> Result<()> {
        if self.converted_value.is_empty() {
            return Err(MemoryError::validation("Converted prompt missing."));
        }
        check_value_matches_type(&self.original_value, self.original_value_data_type)?;
        check_value_matches_type(&self.converted_value, self.converted_value_data_type)
    }

    /// Applies one column update. Only [`Self::UPDATABLE_COLUMNS`] are accepted.
    pub fn set_column(&mut self, column: Column, value: Value) -> Result<()> {
        match (column, value) {
            (Column::Labels, Value::Map(m)) => self.labels = m,
            (Column::PromptMetadata, Value::Map(m)) => self.prompt_metadata = m,
            (Column::OrchestratorIdentifier, Value::Map(m)) => self.orchestrator_identifier = m,
            (column, value) => {
                return Err(MemoryError::validation(format!(
                    "Cannot set {} to {:?} on a prompt request piece",
                    column.name(),
                    value
                )))
            }
        }
        Ok(())
    }
}

fn check_value_matches_type(value: &str, data_type: PromptDataType) -> Result<()> {
    match data_type {
        PromptDataType::Url => url::Url::parse(value).map(|_| ()).map_err(|e| {
            MemoryError::validation(format!("Value '{}' is not a valid url: {}", value, e))
        }),
        PromptDataType::ImagePath | PromptDataType::AudioPath if value.trim().is_empty() => Err(
            MemoryError::validation(format!("Data type {} requires a path", data_type)),
        ),
        _ => Ok(()),
    }
}

impl Record for PromptRequestPiece {
    fn column_value(&self, column: Column) -> Option<Value> {
        let value = match column {
            Column::Id => self.id.into(),
            Column::Role => self.role.as_str().into(),
            Column::ConversationId => self.conversation_id.clone().into(),
            Column::Sequence => self.sequence.into(),
            Column::Timestamp => self.timestamp.into(),
            Column::Labels => self.labels.clone().into(),
            Column::PromptMetadata => self.prompt_metadata.clone().into(),
            Column::PromptTargetIdentifier => self.prompt_target_identifier.clone().into(),
            Column::OrchestratorIdentifier => self.orchestrator_identifier.clone().into(),
            Column::OriginalValueDataType => self.original_value_data_type.as_str().into(),
            Column::OriginalValue => self.original_value.clone().into(),
            Column::OriginalValueSha256 => Value::opt_text(self.original_value_sha256.as_deref()),
            Column::ConvertedValueDataType => self.converted_value_data_type.as_str().into(),
            Column::ConvertedValue => self.converted_value.clone().into(),
            Column::ConvertedValueSha256 => Value::opt_text(self.converted_value_sha256.as_deref()),
            Column::ResponseError => self.response_error.as_str().into(),
            Column::OriginalPromptId => self.original_prompt_id.into(),
            _ => return None,
        };
        Some(value)
    }
}

/// Deterministic order: conversation id, then sequence, then timestamp, then id.
pub fn compare_request_pieces(a: &PromptRequestPiece, b: &PromptRequestPiece) -> Ordering {
    a.conversation_id
        .cmp(&b.conversation_id)
        .then(a.sequence.cmp(&b.sequence))
        .then(a.timestamp.cmp(&b.timestamp))
        .then(a.id.cmp(&b.id))
}

pub fn sort_request_pieces(mut pieces: Vec<PromptRequestPiece>) -> Vec<PromptRequestPiece> {
    pieces.sort_by(compare_request_pieces);
    pieces
}

/// Groups pieces into turns: one [`PromptRequestResponse`] per (conversation, sequence), in order.
pub fn group_conversation_request_pieces_by_sequence(
    pieces: Vec<PromptRequestPiece>,
) -> Vec<PromptRequestResponse> {
    let mut turns: Vec<PromptRequestResponse> = Vec::new();
    for piece in sort_request_pieces(pieces) {
        match turns.last_mut() {
            Some(turn)
                if turn.request_pieces[0].sequence == piece.sequence
                    && turn.request_pieces[0].conversation_id == piece.conversation_id =>
            {
                turn.request_pieces.push(piece)
            }
            _ => turns.push(PromptRequestResponse::new(vec![piece])),
        }
    }
    turns
}

/// An ordered batch of pieces forming one logical exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptRequestResponse {
    pub request_pieces: Vec<PromptRequestPiece>,
}

impl PromptRequestResponse {
    pub fn new(request_pieces: Vec<PromptRequestPiece>) -> Self {
        Self { request_pieces }
    }

    /// Validates the batch as a unit: non-empty, one conversation, one role, every piece valid.
    pub fn validate(&self) -> Result<()> {
        let first = self
            .request_pieces
            .first()
            .ok_or_else(|| MemoryError::validation("Empty request pieces."))?;

        for piece in &self.request_pieces {
            if piece.conversation_id != first.conversation_id {
                return Err(MemoryError::validation("Conversation ID mismatch."));
            }
            if piece.role != first.role {
                return Err(MemoryError::validation(
                    "Inconsistent roles within the same prompt request response entry.",
                ));
            }
            piece.validate()?;
        }
        Ok(())
    }

    pub fn conversation_id(&self) -> Option<&str> {
        self.request_pieces.first().map(|p| p.conversation_id.as_str())
    }

    pub fn sequence(&self) -> Option<i64> {
        self.request_pieces.first().map(|p| p.sequence)
    }

    pub fn role(&self) -> Option<ChatMessageRole> {
        self.request_pieces.first().map(|p| p.role)
    }

    /// Converted value of the piece at `index`.
    pub fn get_value(&self, index: usize) -> Option<&str> {
        self.request_pieces
            .get(index)
            .map(|p| p.converted_value.as_str())
    }

    pub fn len(&self) -> usize {
        self.request_pieces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.request_pieces.is_empty()
    }

    pub fn into_pieces(self) -> Vec<PromptRequestPiece> {
        self.request_pieces
    }
}
