//! # Memory Crate
//!
//! Conversation, score and seed prompt memory for red-teaming sessions, on top of a pluggable
//! storage backend.
//!
//! ## Features
//!
//! - **Turn sequencing** per conversation, safe under concurrent appends
//! - **Conversation duplication** that keeps score lineage with the source
//! - **Label and orchestrator filters** shared by piece and score lookups
//! - **Seed prompt datasets** with group-id consistency checks
//! - **Media serialization** of images and audio to disk or blob storage
//! - **JSON / CSV export** of conversations
//!
//! ## Quick Start
//!
//! ```rust
//! use memory::{ChatMessageRole, MemoryInterface, PromptRequestPiece, PromptRequestResponse};
//!
//! # async fn example() -> memory::Result<()> {
//! let memory = MemoryInterface::in_memory();
//!
//! let piece = PromptRequestPiece::new(ChatMessageRole::User, "Hello").with_conversation_id("conv-1");
//! memory
//!     .add_request_response_to_memory(PromptRequestResponse::new(vec![piece]))
//!     .await?;
//!
//! let turns = memory.get_conversation("conv-1").await;
//! assert_eq!(turns.len(), 1);
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`memory_interface`] - The memory interface
//! - [`query`] - Piece and seed prompt filters
//! - [`serializer`] - Data type serializer for on-disk media
//! - [`exporter`] - JSON / CSV export
//! - [`embedding`] - Embedding generation on insert
//! - [`migration`] - Copy memory between backends
//! - [`config`] - Environment configuration
//! - [`logger`] - Tracing setup
//!
//! ## Backends
//!
//! - `memory-inmemory` - In-process tables
//! - `memory-sqlite` - SQLite-based persistent storage

pub mod config;
pub mod embedding;
pub mod exporter;
pub mod logger;
pub mod memory_interface;
pub mod migration;
pub mod query;
mod scores;
mod seed_prompts;
pub mod serializer;

pub use config::{MemoryConfig, StoreType};
pub use embedding::{EmbeddingService, MemoryEmbedding};
pub use exporter::{ExportType, MemoryExporter};
pub use logger::init_tracing;
pub use memory_core::*;
pub use memory_interface::MemoryInterface;
pub use query::{PromptPieceQuery, SeedPromptQuery};
pub use serializer::{is_blob_storage_url, DataTypeSerializer, ResultsStorage};
