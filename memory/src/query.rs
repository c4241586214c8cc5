//! Filter sets for piece and seed prompt lookups. Every field that is set narrows the result
//! (logical AND); unset fields do not filter.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use memory_core::{Column, Condition, MemoryBackend, PromptDataType};
use uuid::Uuid;

/// Filters for `MemoryInterface::get_prompt_request_pieces`.
#[derive(Debug, Clone, Default)]
pub struct PromptPieceQuery {
    pub orchestrator_id: Option<String>,
    pub conversation_id: Option<String>,
    /// An empty list matches nothing.
    pub prompt_ids: Option<Vec<Uuid>>,
    /// Every label must be present with an equal value.
    pub labels: Option<BTreeMap<String, String>>,
    pub sent_after: Option<DateTime<Utc>>,
    pub sent_before: Option<DateTime<Utc>>,
    pub original_values: Option<Vec<String>>,
    pub converted_values: Option<Vec<String>>,
    /// Converted value data type to include.
    pub data_type: Option<PromptDataType>,
    /// Converted value data type to exclude.
    pub not_data_type: Option<PromptDataType>,
    pub converted_value_sha256: Option<Vec<String>>,
}

impl PromptPieceQuery {
    pub fn by_conversation_id(conversation_id: impl Into<String>) -> Self {
        Self {
            conversation_id: Some(conversation_id.into()),
            ..Default::default()
        }
    }

    pub fn by_orchestrator_id(orchestrator_id: impl Into<String>) -> Self {
        Self {
            orchestrator_id: Some(orchestrator_id.into()),
            ..Default::default()
        }
    }

    pub fn by_prompt_ids(prompt_ids: Vec<Uuid>) -> Self {
        Self {
            prompt_ids: Some(prompt_ids),
            ..Default::default()
        }
    }

    pub fn by_labels(labels: BTreeMap<String, String>) -> Self {
        Self {
            labels: Some(labels),
            ..Default::default()
        }
    }

    /// Builds the backend condition; `None` when no filter is set.
    pub fn to_condition(&self, backend: &dyn MemoryBackend) -> Option<Condition> {
        let mut conditions = Vec::new();
        if let Some(orchestrator_id) = &self.orchestrator_id {
            conditions.push(backend.orchestrator_conditions(orchestrator_id));
        }
        if let Some(conversation_id) = &self.conversation_id {
            conditions.push(Condition::eq(Column::ConversationId, conversation_id.as_str()));
        }
        if let Some(prompt_ids) = &self.prompt_ids {
            conditions.push(Condition::is_in(Column::Id, prompt_ids.iter().copied()));
        }
        if let Some(labels) = &self.labels {
            conditions.push(backend.memory_label_conditions(labels));
        }
        if let Some(sent_after) = self.sent_after {
            conditions.push(Condition::Ge(Column::Timestamp, sent_after.into()));
        }
        if let Some(sent_before) = self.sent_before {
            conditions.push(Condition::Le(Column::Timestamp, sent_before.into()));
        }
        if let Some(values) = &self.original_values {
            conditions.push(Condition::is_in(Column::OriginalValue, values.iter().map(String::as_str)));
        }
        if let Some(values) = &self.converted_values {
            conditions.push(Condition::is_in(Column::ConvertedValue, values.iter().map(String::as_str)));
        }
        if let Some(data_type) = self.data_type {
            conditions.push(Condition::eq(Column::ConvertedValueDataType, data_type.as_str()));
        }
        if let Some(data_type) = self.not_data_type {
            conditions.push(Condition::ne(Column::ConvertedValueDataType, data_type.as_str()));
        }
        if let Some(hashes) = &self.converted_value_sha256 {
            conditions.push(Condition::is_in(Column::ConvertedValueSha256, hashes.iter().map(String::as_str)));
        }
        Condition::all(conditions)
    }
}

/// Filters for seed prompt and seed prompt group lookups.
///
/// `value` is a substring match. Each entry of a list filter must be contained in the prompt's
/// list (AND across entries).
#[derive(Debug, Clone, Default)]
pub struct SeedPromptQuery {
    pub value: Option<String>,
    pub dataset_name: Option<String>,
    pub data_types: Option<Vec<PromptDataType>>,
    pub harm_categories: Option<Vec<String>>,
    pub added_by: Option<String>,
    pub authors: Option<Vec<String>>,
    pub groups: Option<Vec<String>>,
    pub source: Option<String>,
    pub parameters: Option<Vec<String>>,
}

impl SeedPromptQuery {
    pub fn by_dataset_name(dataset_name: impl Into<String>) -> Self {
        Self {
            dataset_name: Some(dataset_name.into()),
            ..Default::default()
        }
    }

    pub fn to_condition(&self) -> Option<Condition> {
        let mut conditions = Vec::new();
        if let Some(value) = &self.value {
            conditions.push(Condition::contains(Column::Value, value.as_str()));
        }
        if let Some(dataset_name) = &self.dataset_name {
            conditions.push(Condition::eq(Column::DatasetName, dataset_name.as_str()));
        }
        if let Some(added_by) = &self.added_by {
            conditions.push(Condition::eq(Column::AddedBy, added_by.as_str()));
        }
        if let Some(source) = &self.source {
            conditions.push(Condition::eq(Column::Source, source.as_str()));
        }
        if let Some(data_types) = &self.data_types {
            conditions.push(Condition::is_in(Column::DataType, data_types.iter().map(|t| t.as_str())));
        }
        add_list_conditions(Column::HarmCategories, self.harm_categories.as_deref(), &mut conditions);
        add_list_conditions(Column::Authors, self.authors.as_deref(), &mut conditions);
        add_list_conditions(Column::Groups, self.groups.as_deref(), &mut conditions);
        add_list_conditions(Column::Parameters, self.parameters.as_deref(), &mut conditions);
        Condition::all(conditions)
    }
}

fn add_list_conditions(column: Column, values: Option<&[String]>, conditions: &mut Vec<Condition>) {
    for value in values.unwrap_or_default() {
        conditions.push(Condition::contains(column, value.as_str()));
    }
}
