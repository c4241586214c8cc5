//! # Query Conditions
//!
//! Backend-independent filter AST. The memory interface builds conditions out of [`Column`]s
//! and [`Value`]s; each backend evaluates or compiles them in its own way.
//!
//! - `All` is logical AND; an empty `All` matches everything.
//! - `In` with an empty list matches nothing.
//! - `Contains` is a substring match on text and an any-element substring match on lists.
//! - `MapEntry` is an exact key/value match on a map column (labels, identifiers).
//! - `Native` carries a backend-native fragment; backends that cannot run it fail the query.
//!
//! Null column values never satisfy a comparison, matching SQL three-valued logic.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A column of one of the memory tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Column {
    Id,
    Role,
    ConversationId,
    Sequence,
    Timestamp,
    Labels,
    PromptMetadata,
    ConverterIdentifiers,
    PromptTargetIdentifier,
    OrchestratorIdentifier,
    OriginalValueDataType,
    OriginalValue,
    OriginalValueSha256,
    ConvertedValueDataType,
    ConvertedValue,
    ConvertedValueSha256,
    ResponseError,
    OriginalPromptId,
    ScoreValue,
    ScoreValueDescription,
    ScoreType,
    ScoreCategory,
    ScoreRationale,
    ScoreMetadata,
    ScorerClassIdentifier,
    PromptRequestResponseId,
    Value,
    DataType,
    Name,
    DatasetName,
    HarmCategories,
    Description,
    Authors,
    Groups,
    Source,
    DateAdded,
    AddedBy,
    Parameters,
    PromptGroupId,
    Embedding,
    EmbeddingTypeName,
}

impl Column {
    /// Storage name of the column (also the SQL column name).
    pub fn name(&self) -> &'static str {
        match self {
            Column::Id => "id",
            Column::Role => "role",
            Column::ConversationId => "conversation_id",
            Column::Sequence => "sequence",
            Column::Timestamp => "timestamp",
            Column::Labels => "labels",
            Column::PromptMetadata => "prompt_metadata",
            Column::ConverterIdentifiers => "converter_identifiers",
            Column::PromptTargetIdentifier => "prompt_target_identifier",
            Column::OrchestratorIdentifier => "orchestrator_identifier",
            Column::OriginalValueDataType => "original_value_data_type",
            Column::OriginalValue => "original_value",
            Column::OriginalValueSha256 => "original_value_sha256",
            Column::ConvertedValueDataType => "converted_value_data_type",
            Column::ConvertedValue => "converted_value",
            Column::ConvertedValueSha256 => "converted_value_sha256",
            Column::ResponseError => "response_error",
            Column::OriginalPromptId => "original_prompt_id",
            Column::ScoreValue => "score_value",
            Column::ScoreValueDescription => "score_value_description",
            Column::ScoreType => "score_type",
            Column::ScoreCategory => "score_category",
            Column::ScoreRationale => "score_rationale",
            Column::ScoreMetadata => "score_metadata",
            Column::ScorerClassIdentifier => "scorer_class_identifier",
            Column::PromptRequestResponseId => "prompt_request_response_id",
            Column::Value => "value",
            Column::DataType => "data_type",
            Column::Name => "name",
            Column::DatasetName => "dataset_name",
            Column::HarmCategories => "harm_categories",
            Column::Description => "description",
            Column::Authors => "authors",
            Column::Groups => "groups",
            Column::Source => "source",
            Column::DateAdded => "date_added",
            Column::AddedBy => "added_by",
            Column::Parameters => "parameters",
            Column::PromptGroupId => "prompt_group_id",
            Column::Embedding => "embedding",
            Column::EmbeddingTypeName => "embedding_type_name",
        }
    }
}

/// A typed column value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Text(String),
    Integer(i64),
    Timestamp(DateTime<Utc>),
    List(Vec<String>),
    Map(BTreeMap<String, String>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, String>> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn opt_text(value: Option<&str>) -> Self {
        value.map(Value::from).unwrap_or(Value::Null)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(t: DateTime<Utc>) -> Self {
        Value::Timestamp(t)
    }
}

impl From<Uuid> for Value {
    fn from(id: Uuid) -> Self {
        Value::Text(id.to_string())
    }
}

impl From<Vec<String>> for Value {
    fn from(list: Vec<String>) -> Self {
        Value::List(list)
    }
}

impl From<BTreeMap<String, String>> for Value {
    fn from(map: BTreeMap<String, String>) -> Self {
        Value::Map(map)
    }
}

/// Filter AST over [`Column`]s.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    All(Vec<Condition>),
    Eq(Column, Value),
    Ne(Column, Value),
    In(Column, Vec<Value>),
    Ge(Column, Value),
    Le(Column, Value),
    Contains(Column, String),
    MapEntry {
        column: Column,
        key: String,
        value: String,
    },
    Native {
        clause: String,
        params: Vec<Value>,
    },
}

impl Condition {
    /// Combines conditions with AND. Returns `None` when there is nothing to filter on.
    pub fn all(mut conditions: Vec<Condition>) -> Option<Condition> {
        match conditions.len() {
            0 => None,
            1 => conditions.pop(),
            _ => Some(Condition::All(conditions)),
        }
    }

    pub fn eq(column: Column, value: impl Into<Value>) -> Self {
        Condition::Eq(column, value.into())
    }

    pub fn ne(column: Column, value: impl Into<Value>) -> Self {
        Condition::Ne(column, value.into())
    }

    pub fn is_in<V: Into<Value>>(column: Column, values: impl IntoIterator<Item = V>) -> Self {
        Condition::In(column, values.into_iter().map(Into::into).collect())
    }

    pub fn contains(column: Column, needle: impl Into<String>) -> Self {
        Condition::Contains(column, needle.into())
    }

    pub fn map_entry(column: Column, key: impl Into<String>, value: impl Into<String>) -> Self {
        Condition::MapEntry {
            column,
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Column access for stored records. Returns `None` when the column does not belong to the record's table.
pub trait Record {
    fn column_value(&self, column: Column) -> Option<Value>;
}
