//! # In-Memory Backend
//!
//! This crate provides an in-memory implementation of the `MemoryBackend` trait from `memory-core`.
//!
//! ## InMemoryBackend
//!
//! Process-local tables for testing and short-lived sessions.
//!
//! **Advantages**:
//! - No I/O, nothing to set up
//! - Rows keep insertion order
//!
//! **Limitations**:
//! - Data is lost on restart
//! - Native (SQL) conditions are rejected
//!
//! ## Example
//!
//! ```rust
//! use memory_inmemory::InMemoryBackend;
//! use memory_core::{ChatMessageRole, Column, Condition, MemoryBackend, PromptRequestPiece, Table};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), anyhow::Error> {
//!     let backend = InMemoryBackend::new();
//!
//!     let piece = PromptRequestPiece::new(ChatMessageRole::User, "Hello").with_conversation_id("c1");
//!     backend.insert_entry(piece.into()).await?;
//!
//!     let found = backend
//!         .query_entries(Table::PromptPieces, Some(Condition::eq(Column::ConversationId, "c1")), false)
//!         .await?;
//!     assert_eq!(found.len(), 1);
//!     Ok(())
//! }
//! ```
//!
//! ## Thread Safety
//!
//! The tables sit behind one `Arc<RwLock<>>`; every primitive takes the lock once, so inserts and
//! updates are atomic with respect to each other.

mod eval;

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use anyhow::bail;
use memory_core::{Column, Condition, MemoryBackend, MemoryEntry, Table, Value};
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

type Tables = BTreeMap<Table, Vec<MemoryEntry>>;

/// In-memory backend for testing and development.
#[derive(Debug, Clone, Default)]
pub struct InMemoryBackend {
    tables: Arc<RwLock<Tables>>,
}

impl InMemoryBackend {
    /// Creates a new backend with empty tables.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of rows in `table`.
    pub async fn len(&self, table: Table) -> usize {
        let tables = self.tables.read().await;
        tables.get(&table).map(Vec::len).unwrap_or(0)
    }

    /// Returns true if every table is empty.
    pub async fn is_empty(&self) -> bool {
        let tables = self.tables.read().await;
        tables.values().all(Vec::is_empty)
    }

    /// Clears all tables.
    pub async fn clear(&self) {
        let mut tables = self.tables.write().await;
        tables.clear();
    }

    fn check_new_ids(tables: &Tables, entries: &[MemoryEntry]) -> anyhow::Result<()> {
        let mut seen: HashSet<(Table, Uuid)> = HashSet::new();
        for entry in entries {
            let key = (entry.table(), entry.id());
            let exists = tables
                .get(&key.0)
                .is_some_and(|rows| rows.iter().any(|row| row.id() == key.1));
            if exists || !seen.insert(key) {
                bail!("Duplicate id {} in {}", key.1, key.0.name());
            }
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl MemoryBackend for InMemoryBackend {
    async fn insert_entry(&self, entry: MemoryEntry) -> Result<(), anyhow::Error> {
        self.insert_entries(vec![entry]).await
    }

    async fn insert_entries(&self, entries: Vec<MemoryEntry>) -> Result<(), anyhow::Error> {
        let count = entries.len();
        let mut tables = self.tables.write().await;
        Self::check_new_ids(&tables, &entries)?;
        for entry in entries {
            tables.entry(entry.table()).or_default().push(entry);
        }
        drop(tables);

        debug!(count, "Entries written to in-memory backend");
        Ok(())
    }

    async fn query_entries(
        &self,
        table: Table,
        conditions: Option<Condition>,
        distinct: bool,
    ) -> Result<Vec<MemoryEntry>, anyhow::Error> {
        debug!(table = table.name(), ?conditions, distinct, "Querying in-memory backend");
        let tables = self.tables.read().await;
        let Some(rows) = tables.get(&table) else {
            return Ok(Vec::new());
        };

        let mut results: Vec<MemoryEntry> = Vec::new();
        for row in rows {
            let keep = match &conditions {
                Some(condition) => eval::matches(row, condition)?,
                None => true,
            };
            if keep && !(distinct && results.contains(row)) {
                results.push(row.clone());
            }
        }

        debug!(table = table.name(), count = results.len(), "In-memory query returned");
        Ok(results)
    }

    async fn update_entries(
        &self,
        entries: &[MemoryEntry],
        update_fields: &BTreeMap<Column, Value>,
    ) -> Result<bool, anyhow::Error> {
        let mut tables = self.tables.write().await;

        // Stage every change first so a bad field leaves the table untouched.
        let mut staged: Vec<(Table, usize, MemoryEntry)> = Vec::new();
        for entry in entries {
            let table = entry.table();
            let Some(rows) = tables.get(&table) else {
                continue;
            };
            let Some(index) = rows.iter().position(|row| row.id() == entry.id()) else {
                continue;
            };
            let mut updated = rows[index].clone();
            for (column, value) in update_fields {
                updated.set_column(*column, value.clone())?;
            }
            staged.push((table, index, updated));
        }

        if staged.is_empty() {
            return Ok(false);
        }

        let count = staged.len();
        for (table, index, updated) in staged {
            if let Some(rows) = tables.get_mut(&table) {
                rows[index] = updated;
            }
        }
        info!(count, "Entries updated in in-memory backend");
        Ok(true)
    }

    fn memory_label_conditions(&self, labels: &BTreeMap<String, String>) -> Condition {
        Condition::All(
            labels
                .iter()
                .map(|(key, value)| Condition::map_entry(Column::Labels, key, value))
                .collect(),
        )
    }

    fn orchestrator_conditions(&self, orchestrator_id: &str) -> Condition {
        Condition::map_entry(Column::OrchestratorIdentifier, "id", orchestrator_id)
    }

    async fn dispose(&self) -> Result<(), anyhow::Error> {
        self.clear().await;
        info!("In-memory backend disposed");
        Ok(())
    }
}
