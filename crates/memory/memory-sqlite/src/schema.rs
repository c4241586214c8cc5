//! Table definitions.
//!
//! Identifier maps, label maps and string lists are stored as JSON text so they can be
//! filtered with `json_extract` / `json_each`. Timestamps are RFC 3339 strings in UTC with
//! microsecond precision, which sort correctly as text.

use memory_core::{Column, Table};

pub(crate) const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS prompt_memory_entries (
    "id" TEXT PRIMARY KEY,
    "role" TEXT NOT NULL,
    "conversation_id" TEXT NOT NULL,
    "sequence" INTEGER NOT NULL,
    "timestamp" TEXT NOT NULL,
    "labels" TEXT NOT NULL,
    "prompt_metadata" TEXT NOT NULL,
    "converter_identifiers" TEXT NOT NULL,
    "prompt_target_identifier" TEXT NOT NULL,
    "orchestrator_identifier" TEXT NOT NULL,
    "original_value_data_type" TEXT NOT NULL,
    "original_value" TEXT NOT NULL,
    "original_value_sha256" TEXT,
    "converted_value_data_type" TEXT NOT NULL,
    "converted_value" TEXT NOT NULL,
    "converted_value_sha256" TEXT,
    "response_error" TEXT NOT NULL,
    "original_prompt_id" TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_prompt_conversation_id ON prompt_memory_entries("conversation_id");
CREATE INDEX IF NOT EXISTS idx_prompt_original_prompt_id ON prompt_memory_entries("original_prompt_id");

CREATE TABLE IF NOT EXISTS score_entries (
    "id" TEXT PRIMARY KEY,
    "score_value" TEXT NOT NULL,
    "score_value_description" TEXT NOT NULL,
    "score_type" TEXT NOT NULL,
    "score_category" TEXT NOT NULL,
    "score_rationale" TEXT NOT NULL,
    "score_metadata" TEXT NOT NULL,
    "scorer_class_identifier" TEXT NOT NULL,
    "prompt_request_response_id" TEXT NOT NULL,
    "timestamp" TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_score_prompt_request_response_id ON score_entries("prompt_request_response_id");

CREATE TABLE IF NOT EXISTS seed_prompt_entries (
    "id" TEXT PRIMARY KEY,
    "value" TEXT NOT NULL,
    "data_type" TEXT NOT NULL,
    "name" TEXT,
    "dataset_name" TEXT,
    "harm_categories" TEXT NOT NULL,
    "description" TEXT,
    "authors" TEXT NOT NULL,
    "groups" TEXT NOT NULL,
    "source" TEXT,
    "date_added" TEXT,
    "added_by" TEXT,
    "prompt_metadata" TEXT NOT NULL,
    "parameters" TEXT,
    "prompt_group_id" TEXT,
    "sequence" INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS embedding_entries (
    "id" TEXT PRIMARY KEY,
    "embedding" BLOB NOT NULL,
    "embedding_type_name" TEXT NOT NULL
);
"#;

/// Columns of `table`, in DDL order.
pub(crate) fn table_columns(table: Table) -> &'static [Column] {
    match table {
        Table::PromptPieces => &[
            Column::Id,
            Column::Role,
            Column::ConversationId,
            Column::Sequence,
            Column::Timestamp,
            Column::Labels,
            Column::PromptMetadata,
            Column::ConverterIdentifiers,
            Column::PromptTargetIdentifier,
            Column::OrchestratorIdentifier,
            Column::OriginalValueDataType,
            Column::OriginalValue,
            Column::OriginalValueSha256,
            Column::ConvertedValueDataType,
            Column::ConvertedValue,
            Column::ConvertedValueSha256,
            Column::ResponseError,
            Column::OriginalPromptId,
        ],
        Table::Scores => &[
            Column::Id,
            Column::ScoreValue,
            Column::ScoreValueDescription,
            Column::ScoreType,
            Column::ScoreCategory,
            Column::ScoreRationale,
            Column::ScoreMetadata,
            Column::ScorerClassIdentifier,
            Column::PromptRequestResponseId,
            Column::Timestamp,
        ],
        Table::SeedPrompts => &[
            Column::Id,
            Column::Value,
            Column::DataType,
            Column::Name,
            Column::DatasetName,
            Column::HarmCategories,
            Column::Description,
            Column::Authors,
            Column::Groups,
            Column::Source,
            Column::DateAdded,
            Column::AddedBy,
            Column::PromptMetadata,
            Column::Parameters,
            Column::PromptGroupId,
            Column::Sequence,
        ],
        Table::Embeddings => &[Column::Id, Column::Embedding, Column::EmbeddingTypeName],
    }
}

pub(crate) fn has_column(table: Table, column: Column) -> bool {
    table_columns(table).contains(&column)
}

/// `"name"`, quoted so that keywords such as `groups` are safe.
pub(crate) fn quoted(column: Column) -> String {
    format!("\"{}\"", column.name())
}
