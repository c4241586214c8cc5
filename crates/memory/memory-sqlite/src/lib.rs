//! # SQLite Backend
//!
//! This crate provides an SQLite-based implementation of the `MemoryBackend` trait from `memory-core`.
//!
//! ## SqliteBackend
//!
//! Persistent storage for prompt pieces, scores, seed prompts and embeddings.
//!
//! **Advantages**:
//! - Data survives restarts
//! - No external database required
//! - Label and orchestrator filters run inside SQLite through its JSON functions
//!
//! **Limitations**:
//! - Single-file database, one writer at a time
//!
//! ## Example
//!
//! ```rust,no_run
//! use memory_sqlite::SqliteBackend;
//! use memory_core::{ChatMessageRole, MemoryBackend, PromptRequestPiece};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), anyhow::Error> {
//!     let backend = SqliteBackend::new("memory.db").await?;
//!
//!     let piece = PromptRequestPiece::new(ChatMessageRole::User, "Hello world");
//!     backend.insert_entry(piece.into()).await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Database Schema
//!
//! One table per [`memory_core::Table`]: `prompt_memory_entries`, `score_entries`,
//! `seed_prompt_entries` and `embedding_entries`. Embeddings are stored as little-endian `f32` BLOBs.

mod row;
mod schema;
mod sql;

use std::collections::BTreeMap;
use std::str::FromStr;

use anyhow::bail;
use memory_core::{Column, Condition, MemoryBackend, MemoryEntry, PromptRequestPiece, Table, Value};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::schema::{quoted, table_columns, SCHEMA};
use crate::sql::{bind_params, compile, object_entry_clause, to_param, SqlParam};

/// SQLite-based backend for persistent memory storage.
#[derive(Clone)]
pub struct SqliteBackend {
    pool: SqlitePool,
}

impl SqliteBackend {
    /// Opens (creating if missing) the database file at `database_url` and initializes the schema.
    pub async fn new(database_url: &str) -> Result<Self, anyhow::Error> {
        let options = SqliteConnectOptions::new()
            .create_if_missing(true)
            .filename(database_url);

        let pool = SqlitePool::connect_with(options).await?;

        let backend = Self { pool };
        backend.init_schema().await?;

        info!(database_url = %database_url, "SQLite memory backend opened");
        Ok(backend)
    }

    /// A private in-memory database. Held on a single connection so every query sees the same data.
    pub async fn in_memory() -> Result<Self, anyhow::Error> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        let backend = Self { pool };
        backend.init_schema().await?;
        Ok(backend)
    }

    async fn init_schema(&self) -> Result<(), anyhow::Error> {
        sqlx::query(SCHEMA).execute(&self.pool).await?;
        Ok(())
    }

    fn insert_sql(table: Table) -> String {
        let columns = table_columns(table);
        let names: Vec<String> = columns.iter().map(|c| quoted(*c)).collect();
        let placeholders = vec!["?"; columns.len()].join(", ");
        format!(
            "INSERT INTO {} ({}) VALUES ({})",
            table.name(),
            names.join(", "),
            placeholders
        )
    }
}

#[async_trait::async_trait]
impl MemoryBackend for SqliteBackend {
    async fn insert_entry(&self, entry: MemoryEntry) -> Result<(), anyhow::Error> {
        let sql = Self::insert_sql(entry.table());
        let params = row::entry_params(&entry)?;
        bind_params(sqlx::query(&sql), params)
            .execute(&self.pool)
            .await?;

        debug!(table = entry.table().name(), id = %entry.id(), "Entry written to SQLite");
        Ok(())
    }

    async fn insert_entries(&self, entries: Vec<MemoryEntry>) -> Result<(), anyhow::Error> {
        let count = entries.len();
        let mut tx = self.pool.begin().await?;
        for entry in &entries {
            let sql = Self::insert_sql(entry.table());
            let params = row::entry_params(entry)?;
            bind_params(sqlx::query(&sql), params)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;

        debug!(count, "Entries written to SQLite");
        Ok(())
    }

    async fn query_entries(
        &self,
        table: Table,
        conditions: Option<Condition>,
        distinct: bool,
    ) -> Result<Vec<MemoryEntry>, anyhow::Error> {
        let mut params = Vec::new();
        let select = if distinct { "SELECT DISTINCT" } else { "SELECT" };
        let mut sql = format!("{} * FROM {}", select, table.name());
        if let Some(condition) = &conditions {
            let clause = compile(table, condition, &mut params)?;
            sql.push_str(" WHERE ");
            sql.push_str(&clause);
        }
        if !distinct {
            sql.push_str(" ORDER BY rowid");
        }
        debug!(table = table.name(), sql = %sql, "Querying SQLite");

        let rows = bind_params(sqlx::query(&sql), params)
            .fetch_all(&self.pool)
            .await?;
        let entries = rows
            .iter()
            .map(|r| row::row_to_entry(table, r))
            .collect::<anyhow::Result<Vec<_>>>()?;

        debug!(table = table.name(), count = entries.len(), "SQLite query returned");
        Ok(entries)
    }

    async fn update_entries(
        &self,
        entries: &[MemoryEntry],
        update_fields: &BTreeMap<Column, Value>,
    ) -> Result<bool, anyhow::Error> {
        if update_fields.is_empty() {
            bail!("update_fields must not be empty");
        }
        for &column in update_fields.keys() {
            if !PromptRequestPiece::UPDATABLE_COLUMNS.contains(&column) {
                bail!("Column {} cannot be updated", column.name());
            }
        }

        let assignments: Vec<String> = update_fields
            .keys()
            .map(|c| format!("{} = ?", quoted(*c)))
            .collect();

        let mut updated: u64 = 0;
        let mut tx = self.pool.begin().await?;
        for entry in entries {
            // Type-check the values the same way the in-memory tables do.
            let mut check = entry.clone();
            for (column, value) in update_fields {
                check.set_column(*column, value.clone())?;
            }

            let sql = format!(
                "UPDATE {} SET {} WHERE \"id\" = ?",
                entry.table().name(),
                assignments.join(", ")
            );
            let mut params = update_fields
                .values()
                .map(to_param)
                .collect::<anyhow::Result<Vec<_>>>()?;
            params.push(SqlParam::Text(entry.id().to_string()));

            let result = bind_params(sqlx::query(&sql), params)
                .execute(&mut *tx)
                .await?;
            updated += result.rows_affected();
        }
        tx.commit().await?;

        if updated == 0 {
            return Ok(false);
        }
        info!(count = updated, "Entries updated in SQLite");
        Ok(true)
    }

    fn memory_label_conditions(&self, labels: &BTreeMap<String, String>) -> Condition {
        if labels.is_empty() {
            return Condition::All(Vec::new());
        }
        let column = quoted(Column::Labels);
        let clause = vec![object_entry_clause(&column); labels.len()].join(" AND ");
        let params = labels
            .iter()
            .flat_map(|(key, value)| [Value::Text(key.clone()), Value::Text(value.clone())])
            .collect();
        Condition::Native { clause, params }
    }

    fn orchestrator_conditions(&self, orchestrator_id: &str) -> Condition {
        Condition::Native {
            clause: format!(
                "json_extract({}, '$.id') = ?",
                quoted(Column::OrchestratorIdentifier)
            ),
            params: vec![Value::from(orchestrator_id)],
        }
    }

    async fn dispose(&self) -> Result<(), anyhow::Error> {
        self.pool.close().await;
        info!("SQLite memory backend disposed");
        Ok(())
    }
}
