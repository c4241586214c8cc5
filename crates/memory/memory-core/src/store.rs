//! # Memory Backend
//!
//! The primitive contract every storage engine implements. The memory interface builds all of its
//! operations out of these hooks, so any backend that honours them can be swapped in.
//!
//! ## Required Methods
//!
//! | Method | Contract |
//! |--------|----------|
//! | `insert_entry` | Stores one row; a duplicate id is an error. |
//! | `insert_entries` | Stores all rows or none. |
//! | `query_entries` | Rows of one table matching the condition (all rows when `None`). |
//! | `update_entries` | Sets `update_fields` on the stored rows with the given entries' ids; `Ok(false)` when none matched. |
//! | `memory_label_conditions` | Condition matching pieces carrying every label with an equal value. |
//! | `orchestrator_conditions` | Condition matching pieces whose orchestrator identifier has the given `id`. |
//! | `dispose` | Releases engine resources. |
//!
//! ### Implementations
//!
//! - `memory_inmemory::InMemoryBackend`: in-process tables, for tests and short sessions
//! - `memory_sqlite::SqliteBackend`: persistent storage using SQLite

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::condition::{Column, Condition, Value};
use crate::entry::{MemoryEntry, Table};

/// Storage engine primitives consumed by the memory interface.
#[async_trait]
pub trait MemoryBackend: Send + Sync {
    /// Inserts one entry.
    async fn insert_entry(&self, entry: MemoryEntry) -> Result<(), anyhow::Error>;

    /// Inserts entries atomically.
    async fn insert_entries(&self, entries: Vec<MemoryEntry>) -> Result<(), anyhow::Error>;

    /// Fetches entries of `table` matching `conditions`. `distinct` removes identical rows.
    async fn query_entries(
        &self,
        table: Table,
        conditions: Option<Condition>,
        distinct: bool,
    ) -> Result<Vec<MemoryEntry>, anyhow::Error>;

    /// Updates the stored counterparts of `entries` with the given column values.
    async fn update_entries(
        &self,
        entries: &[MemoryEntry],
        update_fields: &BTreeMap<Column, Value>,
    ) -> Result<bool, anyhow::Error>;

    /// Builds the condition selecting pieces that carry all of `labels`.
    fn memory_label_conditions(&self, labels: &BTreeMap<String, String>) -> Condition;

    /// Builds the condition selecting pieces produced by the orchestrator with `orchestrator_id`.
    fn orchestrator_conditions(&self, orchestrator_id: &str) -> Condition;

    /// Disposes the engine and cleans up resources.
    async fn dispose(&self) -> Result<(), anyhow::Error>;
}
