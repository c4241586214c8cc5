//! # Memory Entries
//!
//! [`MemoryEntry`] is the unit a backend stores: one row of one of the four [`Table`]s.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::condition::{Column, Record, Value};
use crate::error::{MemoryError, Result};
use crate::piece::PromptRequestPiece;
use crate::score::Score;
use crate::seed_prompt::SeedPrompt;

/// The tables every backend provides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Table {
    PromptPieces,
    Scores,
    SeedPrompts,
    Embeddings,
}

impl Table {
    pub const ALL: [Table; 4] = [
        Table::PromptPieces,
        Table::Scores,
        Table::SeedPrompts,
        Table::Embeddings,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Table::PromptPieces => "prompt_memory_entries",
            Table::Scores => "score_entries",
            Table::SeedPrompts => "seed_prompt_entries",
            Table::Embeddings => "embedding_entries",
        }
    }
}

/// Embedding vector of a piece; `id` is the piece id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingData {
    pub id: Uuid,
    pub embedding: Vec<f32>,
    pub embedding_type_name: String,
}

impl Record for EmbeddingData {
    fn column_value(&self, column: Column) -> Option<Value> {
        match column {
            Column::Id => Some(self.id.into()),
            Column::EmbeddingTypeName => Some(self.embedding_type_name.clone().into()),
            _ => None,
        }
    }
}

/// One stored row.
#[derive(Debug, Clone, PartialEq)]
pub enum MemoryEntry {
    Prompt(PromptRequestPiece),
    Score(Score),
    SeedPrompt(SeedPrompt),
    Embedding(EmbeddingData),
}

impl MemoryEntry {
    pub fn table(&self) -> Table {
        match self {
            MemoryEntry::Prompt(_) => Table::PromptPieces,
            MemoryEntry::Score(_) => Table::Scores,
            MemoryEntry::SeedPrompt(_) => Table::SeedPrompts,
            MemoryEntry::Embedding(_) => Table::Embeddings,
        }
    }

    pub fn id(&self) -> Uuid {
        match self {
            MemoryEntry::Prompt(p) => p.id,
            MemoryEntry::Score(s) => s.id,
            MemoryEntry::SeedPrompt(s) => s.id,
            MemoryEntry::Embedding(e) => e.id,
        }
    }

    /// Applies one column update; only prompt pieces are updatable.
    pub fn set_column(&mut self, column: Column, value: Value) -> Result<()> {
        match self {
            MemoryEntry::Prompt(piece) => piece.set_column(column, value),
            other => Err(MemoryError::validation(format!(
                "Entries of {} cannot be updated",
                other.table().name()
            ))),
        }
    }

    pub fn into_prompt(self) -> Option<PromptRequestPiece> {
        match self {
            MemoryEntry::Prompt(p) => Some(p),
            _ => None,
        }
    }

    pub fn into_score(self) -> Option<Score> {
        match self {
            MemoryEntry::Score(s) => Some(s),
            _ => None,
        }
    }

    pub fn into_seed_prompt(self) -> Option<SeedPrompt> {
        match self {
            MemoryEntry::SeedPrompt(s) => Some(s),
            _ => None,
        }
    }

    pub fn into_embedding(self) -> Option<EmbeddingData> {
        match self {
            MemoryEntry::Embedding(e) => Some(e),
            _ => None,
        }
    }
}

impl Record for MemoryEntry {
    fn column_value(&self, column: Column) -> Option<Value> {
        match self {
            MemoryEntry::Prompt(p) => p.column_value(column),
            MemoryEntry::Score(s) => s.column_value(column),
            MemoryEntry::SeedPrompt(s) => s.column_value(column),
            MemoryEntry::Embedding(e) => e.column_value(column),
        }
    }
}

impl From<PromptRequestPiece> for MemoryEntry {
    fn from(piece: PromptRequestPiece) -> Self {
        MemoryEntry::Prompt(piece)
    }
}

impl From<Score> for MemoryEntry {
    fn from(score: Score) -> Self {
        MemoryEntry::Score(score)
    }
}

impl From<SeedPrompt> for MemoryEntry {
    fn from(prompt: SeedPrompt) -> Self {
        MemoryEntry::SeedPrompt(prompt)
    }
}

impl From<EmbeddingData> for MemoryEntry {
    fn from(data: EmbeddingData) -> Self {
        MemoryEntry::Embedding(data)
    }
}
