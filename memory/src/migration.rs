//! # Migration Tools
//!
//! Tools for moving memory between storage backends.
//!
//! ## Example
//!
//! ```rust,ignore
//! use memory::migration::migrate;
//! use memory_inmemory::InMemoryBackend;
//! use memory_sqlite::SqliteBackend;
//!
//! # async fn example() -> anyhow::Result<()> {
//! // Persist an in-memory session to SQLite
//! let session = InMemoryBackend::new();
//! let sqlite = SqliteBackend::new("./data/memory.db").await?;
//! migrate(&session, &sqlite).await?;
//! # Ok(())
//! # }
//! ```

use anyhow::Result;
use memory_core::{MemoryBackend, MemoryEntry, Table};
use tracing::info;

/// Copies every table from one backend to another.
///
/// Each table is inserted as a single batch, so a failing table leaves nothing of itself behind
/// in `to`. Tables copied before the failure stay.
///
/// # Returns
///
/// Returns the number of entries migrated.
pub async fn migrate(from: &dyn MemoryBackend, to: &dyn MemoryBackend) -> Result<usize> {
    let mut count = 0;
    for table in Table::ALL {
        let entries = from.query_entries(table, None, false).await?;
        if entries.is_empty() {
            continue;
        }
        let table_count = entries.len();
        to.insert_entries(entries).await?;
        info!(table = table.name(), count = table_count, "Migrated table");
        count += table_count;
    }
    Ok(count)
}

/// Reads every entry of every table, in table order.
pub async fn backup(store: &dyn MemoryBackend) -> Result<Vec<MemoryEntry>> {
    let mut all_entries = Vec::new();
    for table in Table::ALL {
        all_entries.extend(store.query_entries(table, None, false).await?);
    }
    Ok(all_entries)
}

/// Restores entries from a backup to a store.
///
/// # Returns
///
/// Returns the number of entries restored.
pub async fn restore(store: &dyn MemoryBackend, entries: Vec<MemoryEntry>) -> Result<usize> {
    let count = entries.len();
    if count > 0 {
        store.insert_entries(entries).await?;
    }
    Ok(count)
}
