//! # Memory Core
//!
//! Entity model and backend contract for the prompt memory.
//! Used by the `memory` crate and by every backend crate.
//!
//! ## Modules
//!
//! - [`types`] - ChatMessageRole, PromptDataType, PromptResponseError, ChatMessage
//! - [`piece`] - PromptRequestPiece, PromptRequestResponse, ordering and grouping helpers
//! - [`score`] - Score, ScoreType, ScoreValue
//! - [`seed_prompt`] - SeedPrompt, SeedPromptGroup, SeedPromptDataset
//! - [`entry`] - MemoryEntry, Table, EmbeddingData
//! - [`condition`] - Column, Value, Condition, Record
//! - [`store`] - MemoryBackend trait
//! - [`error`] - MemoryError

pub mod condition;
pub mod entry;
pub mod error;
pub mod piece;
pub mod score;
pub mod seed_prompt;
pub mod store;
pub mod types;


pub use condition::*;
pub use entry::*;
pub use error::{MemoryError, Result};
pub use piece::*;
pub use score::*;
pub use seed_prompt::*;
pub use store::*;
pub use types::*;
