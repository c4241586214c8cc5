//! Score persistence and lookup.
//!
//! Every lookup resolves its filter to pieces, maps the pieces to their canonical ids
//! (`original_prompt_id`) and fetches the scores stored against those ids. Scores therefore
//! follow a piece into every duplicate of its conversation.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use memory_core::{Column, Condition, MemoryEntry, Result, Score, Table};
use tracing::{error, info};
use uuid::Uuid;

use crate::memory_interface::MemoryInterface;

impl MemoryInterface {
    /// Stores scores against the canonical piece of the piece they name.
    ///
    /// A score whose piece is not in memory is skipped and logged; the rest are stored in one batch.
    pub async fn add_scores_to_memory(&self, scores: Vec<Score>) -> Result<()> {
        if scores.is_empty() {
            return Ok(());
        }
        for score in &scores {
            score.validate()?;
        }

        let piece_ids: BTreeSet<Uuid> = scores.iter().map(|s| s.prompt_request_response_id).collect();
        let canonical_by_piece: HashMap<Uuid, Uuid> = self
            .query_prompt_pieces(Some(Condition::is_in(Column::Id, piece_ids)))
            .await?
            .into_iter()
            .map(|p| (p.id, p.original_prompt_id))
            .collect();

        let total = scores.len();
        let mut entries = Vec::with_capacity(total);
        for mut score in scores {
            match canonical_by_piece.get(&score.prompt_request_response_id) {
                Some(&canonical_id) => {
                    score.prompt_request_response_id = canonical_id;
                    entries.push(MemoryEntry::from(score));
                }
                None => error!(
                    score_id = %score.id,
                    prompt_request_response_id = %score.prompt_request_response_id,
                    "Prompt with ID not found in memory, skipping score"
                ),
            }
        }

        let count = entries.len();
        if !entries.is_empty() {
            self.backend().insert_entries(entries).await?;
        }
        info!(count, skipped = total - count, "Added scores to memory");
        Ok(())
    }

    /// Scores of the given pieces. An empty id list yields no scores.
    pub async fn get_scores_by_prompt_ids(&self, prompt_request_response_ids: &[Uuid]) -> Vec<Score> {
        if prompt_request_response_ids.is_empty() {
            return Vec::new();
        }
        self.scores_for_pieces(Condition::is_in(
            Column::Id,
            prompt_request_response_ids.iter().copied(),
        ))
        .await
    }

    pub async fn get_scores_by_orchestrator_id(&self, orchestrator_id: &str) -> Vec<Score> {
        let conditions = self.backend().orchestrator_conditions(orchestrator_id);
        self.scores_for_pieces(conditions).await
    }

    pub async fn get_scores_by_memory_labels(&self, labels: &BTreeMap<String, String>) -> Vec<Score> {
        let conditions = self.backend().memory_label_conditions(labels);
        self.scores_for_pieces(conditions).await
    }

    async fn scores_for_pieces(&self, piece_conditions: Condition) -> Vec<Score> {
        let canonical_ids: BTreeSet<Uuid> = match self.query_prompt_pieces(Some(piece_conditions.clone())).await {
            Ok(pieces) => pieces.into_iter().map(|p| p.original_prompt_id).collect(),
            Err(e) => {
                error!(error = %e, conditions = ?piece_conditions, "Failed to retrieve pieces for scores");
                return Vec::new();
            }
        };
        match self.query_scores(&canonical_ids).await {
            Ok(scores) => scores,
            Err(e) => {
                error!(error = %e, "Failed to retrieve scores");
                Vec::new()
            }
        }
    }

    pub(crate) async fn query_scores(&self, canonical_ids: &BTreeSet<Uuid>) -> Result<Vec<Score>> {
        if canonical_ids.is_empty() {
            return Ok(Vec::new());
        }
        let entries = self
            .backend()
            .query_entries(
                Table::Scores,
                Some(Condition::is_in(
                    Column::PromptRequestResponseId,
                    canonical_ids.iter().copied(),
                )),
                false,
            )
            .await?;
        Ok(entries.into_iter().filter_map(MemoryEntry::into_score).collect())
    }
}
