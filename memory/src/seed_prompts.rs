//! Seed prompt persistence and lookup.

use std::collections::BTreeSet;

use chrono::Utc;
use memory_core::{
    Column, Condition, MemoryEntry, MemoryError, Result, SeedPrompt, SeedPromptDataset,
    SeedPromptGroup, Table,
};
use tracing::{error, info};

use crate::memory_interface::MemoryInterface;
use crate::query::SeedPromptQuery;

impl MemoryInterface {
    /// Stores seed prompts.
    ///
    /// `added_by`, when given, overrides the prompts' own value; every prompt must end up with one.
    /// `date_added` defaults to now.
    pub async fn add_seed_prompts_to_memory(
        &self,
        prompts: Vec<SeedPrompt>,
        added_by: Option<&str>,
    ) -> Result<()> {
        let now = Utc::now();
        let mut entries = Vec::with_capacity(prompts.len());
        for mut prompt in prompts {
            if let Some(added_by) = added_by {
                prompt.added_by = Some(added_by.to_string());
            }
            if prompt.added_by.as_deref().map_or(true, |a| a.trim().is_empty()) {
                return Err(MemoryError::validation(
                    "The 'added_by' attribute must be set for each prompt. Set it explicitly or pass a value to the 'added_by' parameter.",
                ));
            }
            if prompt.date_added.is_none() {
                prompt.date_added = Some(now);
            }
            entries.push(MemoryEntry::from(prompt));
        }

        let count = entries.len();
        if !entries.is_empty() {
            self.backend().insert_entries(entries).await?;
        }
        info!(count, "Added seed prompts to memory");
        Ok(())
    }

    pub async fn get_seed_prompts(&self, query: &SeedPromptQuery) -> Vec<SeedPrompt> {
        match self
            .backend()
            .query_entries(Table::SeedPrompts, query.to_condition(), false)
            .await
        {
            Ok(entries) => entries
                .into_iter()
                .filter_map(MemoryEntry::into_seed_prompt)
                .collect(),
            Err(e) => {
                error!(error = %e, query = ?query, "Failed to retrieve seed prompts");
                Vec::new()
            }
        }
    }

    /// Distinct non-empty dataset names, sorted.
    pub async fn get_seed_prompt_dataset_names(&self) -> Vec<String> {
        let entries = match self
            .backend()
            .query_entries(
                Table::SeedPrompts,
                Some(Condition::ne(Column::DatasetName, "")),
                true,
            )
            .await
        {
            Ok(entries) => entries,
            Err(e) => {
                error!(error = %e, "Failed to retrieve dataset names");
                return Vec::new();
            }
        };

        let names: BTreeSet<String> = entries
            .into_iter()
            .filter_map(MemoryEntry::into_seed_prompt)
            .filter_map(|p| p.dataset_name)
            .filter(|name| !name.is_empty())
            .collect();
        names.into_iter().collect()
    }

    /// Stores the prompts of every group, generating group ids where none is set.
    ///
    /// All groups are checked before anything is stored.
    pub async fn add_seed_prompt_groups_to_memory(
        &self,
        prompt_groups: Vec<SeedPromptGroup>,
        added_by: Option<&str>,
    ) -> Result<()> {
        if prompt_groups.is_empty() {
            return Err(MemoryError::validation(
                "At least one prompt group must be provided.",
            ));
        }

        let mut prompts = Vec::new();
        for mut group in prompt_groups {
            group.ensure_group_id()?;
            prompts.extend(group.prompts);
        }
        self.add_seed_prompts_to_memory(prompts, added_by).await
    }

    /// Seed prompts matching `query`, grouped by `prompt_group_id`.
    pub async fn get_seed_prompt_groups(&self, query: &SeedPromptQuery) -> Vec<SeedPromptGroup> {
        let prompts = self.get_seed_prompts(query).await;
        SeedPromptDataset::group_seed_prompts_by_prompt_group_id(prompts)
    }
}
