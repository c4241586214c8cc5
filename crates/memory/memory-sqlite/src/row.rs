//! Conversion between memory entries and SQLite rows.

use std::str::FromStr;

use anyhow::{anyhow, Context};
use chrono::{DateTime, Utc};
use memory_core::{
    Column, EmbeddingData, MemoryEntry, PromptRequestPiece, Record, Score, SeedPrompt, Table,
};
use serde::de::DeserializeOwned;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use uuid::Uuid;

use crate::schema::table_columns;
use crate::sql::{to_param, SqlParam};

/// Parameters for `entry`, in the column order of its table.
pub(crate) fn entry_params(entry: &MemoryEntry) -> anyhow::Result<Vec<SqlParam>> {
    table_columns(entry.table())
        .iter()
        .map(|column| column_param(entry, *column))
        .collect()
}

fn column_param(entry: &MemoryEntry, column: Column) -> anyhow::Result<SqlParam> {
    match (entry, column) {
        (MemoryEntry::Prompt(piece), Column::ConverterIdentifiers) => Ok(SqlParam::Text(
            serde_json::to_string(&piece.converter_identifiers)?,
        )),
        (MemoryEntry::Embedding(data), Column::Embedding) => Ok(SqlParam::Blob(
            data.embedding.iter().flat_map(|f| f.to_le_bytes()).collect(),
        )),
        _ => {
            let value = entry
                .column_value(column)
                .ok_or_else(|| anyhow!("No value for column {}", column.name()))?;
            to_param(&value)
        }
    }
}

fn text(row: &SqliteRow, column: Column) -> anyhow::Result<String> {
    row.try_get::<String, _>(column.name())
        .with_context(|| format!("Failed to read column {}", column.name()))
}

fn opt_text(row: &SqliteRow, column: Column) -> anyhow::Result<Option<String>> {
    row.try_get::<Option<String>, _>(column.name())
        .with_context(|| format!("Failed to read column {}", column.name()))
}

fn uuid(row: &SqliteRow, column: Column) -> anyhow::Result<Uuid> {
    Uuid::from_str(&text(row, column)?).with_context(|| format!("Invalid uuid in {}", column.name()))
}

fn parsed<T>(row: &SqliteRow, column: Column) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    text(row, column)?
        .parse::<T>()
        .with_context(|| format!("Invalid value in {}", column.name()))
}

fn timestamp(raw: &str) -> anyhow::Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(raw)
        .with_context(|| format!("Invalid timestamp {}", raw))?
        .with_timezone(&Utc))
}

fn json<T: DeserializeOwned>(row: &SqliteRow, column: Column) -> anyhow::Result<T> {
    serde_json::from_str(&text(row, column)?)
        .with_context(|| format!("Invalid JSON in {}", column.name()))
}

fn opt_json<T: DeserializeOwned>(row: &SqliteRow, column: Column) -> anyhow::Result<Option<T>> {
    opt_text(row, column)?
        .map(|raw| serde_json::from_str(&raw))
        .transpose()
        .with_context(|| format!("Invalid JSON in {}", column.name()))
}

pub(crate) fn row_to_entry(table: Table, row: &SqliteRow) -> anyhow::Result<MemoryEntry> {
    let entry = match table {
        Table::PromptPieces => MemoryEntry::Prompt(row_to_piece(row)?),
        Table::Scores => MemoryEntry::Score(row_to_score(row)?),
        Table::SeedPrompts => MemoryEntry::SeedPrompt(row_to_seed_prompt(row)?),
        Table::Embeddings => MemoryEntry::Embedding(row_to_embedding(row)?),
    };
    Ok(entry)
}

fn row_to_piece(row: &SqliteRow) -> anyhow::Result<PromptRequestPiece> {
    Ok(PromptRequestPiece {
        id: uuid(row, Column::Id)?,
        role: parsed(row, Column::Role)?,
        conversation_id: text(row, Column::ConversationId)?,
        sequence: row.try_get::<i64, _>(Column::Sequence.name())?,
        timestamp: timestamp(&text(row, Column::Timestamp)?)?,
        labels: json(row, Column::Labels)?,
        prompt_metadata: json(row, Column::PromptMetadata)?,
        converter_identifiers: json(row, Column::ConverterIdentifiers)?,
        prompt_target_identifier: json(row, Column::PromptTargetIdentifier)?,
        orchestrator_identifier: json(row, Column::OrchestratorIdentifier)?,
        original_value_data_type: parsed(row, Column::OriginalValueDataType)?,
        original_value: text(row, Column::OriginalValue)?,
        original_value_sha256: opt_text(row, Column::OriginalValueSha256)?,
        converted_value_data_type: parsed(row, Column::ConvertedValueDataType)?,
        converted_value: text(row, Column::ConvertedValue)?,
        converted_value_sha256: opt_text(row, Column::ConvertedValueSha256)?,
        response_error: parsed(row, Column::ResponseError)?,
        original_prompt_id: uuid(row, Column::OriginalPromptId)?,
        scores: Vec::new(),
    })
}

fn row_to_score(row: &SqliteRow) -> anyhow::Result<Score> {
    Ok(Score {
        id: uuid(row, Column::Id)?,
        score_value: text(row, Column::ScoreValue)?,
        score_value_description: text(row, Column::ScoreValueDescription)?,
        score_type: parsed(row, Column::ScoreType)?,
        score_category: text(row, Column::ScoreCategory)?,
        score_rationale: text(row, Column::ScoreRationale)?,
        score_metadata: text(row, Column::ScoreMetadata)?,
        scorer_class_identifier: json(row, Column::ScorerClassIdentifier)?,
        prompt_request_response_id: uuid(row, Column::PromptRequestResponseId)?,
        timestamp: timestamp(&text(row, Column::Timestamp)?)?,
    })
}

fn row_to_seed_prompt(row: &SqliteRow) -> anyhow::Result<SeedPrompt> {
    let date_added = opt_text(row, Column::DateAdded)?
        .map(|raw| timestamp(&raw))
        .transpose()?;
    let prompt_group_id = opt_text(row, Column::PromptGroupId)?
        .map(|raw| Uuid::from_str(&raw))
        .transpose()
        .context("Invalid uuid in prompt_group_id")?;

    Ok(SeedPrompt {
        id: uuid(row, Column::Id)?,
        value: text(row, Column::Value)?,
        data_type: parsed(row, Column::DataType)?,
        name: opt_text(row, Column::Name)?,
        dataset_name: opt_text(row, Column::DatasetName)?,
        harm_categories: json(row, Column::HarmCategories)?,
        description: opt_text(row, Column::Description)?,
        authors: json(row, Column::Authors)?,
        groups: json(row, Column::Groups)?,
        source: opt_text(row, Column::Source)?,
        date_added,
        added_by: opt_text(row, Column::AddedBy)?,
        prompt_metadata: json(row, Column::PromptMetadata)?,
        parameters: opt_json(row, Column::Parameters)?,
        prompt_group_id,
        sequence: row.try_get::<i64, _>(Column::Sequence.name())?,
    })
}

fn row_to_embedding(row: &SqliteRow) -> anyhow::Result<EmbeddingData> {
    let blob: Vec<u8> = row.try_get(Column::Embedding.name())?;
    if blob.len() % 4 != 0 {
        return Err(anyhow!("Embedding blob length {} is not a multiple of 4", blob.len()));
    }
    let embedding = blob
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect();

    Ok(EmbeddingData {
        id: uuid(row, Column::Id)?,
        embedding,
        embedding_type_name: text(row, Column::EmbeddingTypeName)?,
    })
}
