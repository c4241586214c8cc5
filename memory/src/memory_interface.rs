//! # Memory Interface
//!
//! Conversation, score and seed prompt persistence on top of any [`MemoryBackend`].
//!
//! ## Failure policy
//!
//! | Operation kind | On bad input | On backend failure |
//! |----------------|--------------|--------------------|
//! | Writes (`add_*`, `update_*`, `duplicate_*`, `export_*`) | `MemoryError::Validation` | propagated |
//! | Reads (`get_*`) | - | logged at `error!`, empty result |
//! | Score batches | - | a score whose piece is missing is skipped and logged |
//!
//! ## Sequencing
//!
//! Each batch added with [`MemoryInterface::add_request_response_to_memory`] takes the next
//! sequence number of its conversation (`0` for a new conversation). The read of the current
//! maximum and the insert run under a per-conversation lock, so concurrent appends never share a
//! sequence number. Duplication holds the source conversation's lock while it copies. A lock is
//! dropped from the table once no caller holds or waits on it.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use memory_core::{
    group_conversation_request_pieces_by_sequence, sort_request_pieces, ChatMessage,
    ChatMessageRole, Column, Condition, EmbeddingData, MemoryBackend, MemoryEntry, MemoryError,
    PromptDataType, PromptRequestPiece, PromptRequestResponse, Result, Table, Value,
};
use memory_inmemory::InMemoryBackend;
use memory_sqlite::SqliteBackend;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::config::{MemoryConfig, StoreType};
use crate::embedding::{EmbeddingService, MemoryEmbedding};
use crate::exporter::{ExportType, MemoryExporter};
use crate::query::PromptPieceQuery;
use crate::serializer::{DataTypeSerializer, ResultsStorage};

const DEFAULT_RESULTS_PATH: &str = "./results";

/// Memory interface over a storage backend.
pub struct MemoryInterface {
    backend: Arc<dyn MemoryBackend>,
    memory_embedding: RwLock<Option<MemoryEmbedding>>,
    exporter: MemoryExporter,
    results_storage: ResultsStorage,
    default_export_type: ExportType,
    conversation_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl MemoryInterface {
    /// Interface over `backend`, with results written to `./results` on the local disk.
    pub fn new(backend: Arc<dyn MemoryBackend>) -> Self {
        Self {
            backend,
            memory_embedding: RwLock::new(None),
            exporter: MemoryExporter::new(),
            results_storage: ResultsStorage::disk(DEFAULT_RESULTS_PATH),
            default_export_type: ExportType::default(),
            conversation_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Interface over a fresh in-memory backend.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryBackend::new()))
    }

    /// Opens the backend selected by `config`.
    pub async fn from_config(config: &MemoryConfig) -> Result<Self> {
        config
            .validate()
            .map_err(|e| MemoryError::validation(e.to_string()))?;
        let store_type = config
            .store_type()
            .map_err(|e| MemoryError::validation(e.to_string()))?;
        let export_type = config
            .export_type()
            .map_err(|e| MemoryError::validation(e.to_string()))?;

        let backend: Arc<dyn MemoryBackend> = match store_type {
            StoreType::Memory => Arc::new(InMemoryBackend::new()),
            StoreType::Sqlite => {
                if let Some(parent) = Path::new(&config.sqlite_path).parent() {
                    if !parent.as_os_str().is_empty() {
                        tokio::fs::create_dir_all(parent).await?;
                    }
                }
                Arc::new(SqliteBackend::new(&config.sqlite_path).await?)
            }
        };

        info!(
            store_type = ?store_type,
            results_path = %config.results_path,
            "Memory interface initialized"
        );
        Ok(Self::new(backend)
            .with_results_storage(ResultsStorage::disk(config.results_path.clone()))
            .with_export_type(export_type))
    }

    pub fn with_results_storage(mut self, results_storage: ResultsStorage) -> Self {
        self.results_storage = results_storage;
        self
    }

    pub fn with_export_type(mut self, export_type: ExportType) -> Self {
        self.default_export_type = export_type;
        self
    }

    pub fn with_embedding(self, embedding: MemoryEmbedding) -> Self {
        Self {
            memory_embedding: RwLock::new(Some(embedding)),
            ..self
        }
    }

    pub fn backend(&self) -> &Arc<dyn MemoryBackend> {
        &self.backend
    }

    pub fn results_storage(&self) -> &ResultsStorage {
        &self.results_storage
    }

    /// Embeds text pieces on insert from now on.
    pub async fn enable_embedding(
        &self,
        service: Arc<dyn EmbeddingService>,
        embedding_type_name: impl Into<String>,
    ) {
        let embedding = MemoryEmbedding::new(service, embedding_type_name);
        info!(embedding_type_name = %embedding.embedding_type_name(), "Embedding enabled");
        *self.memory_embedding.write().await = Some(embedding);
    }

    pub async fn disable_embedding(&self) {
        *self.memory_embedding.write().await = None;
    }

    pub async fn get_all_embeddings(&self) -> Vec<EmbeddingData> {
        match self.backend.query_entries(Table::Embeddings, None, false).await {
            Ok(entries) => entries
                .into_iter()
                .filter_map(MemoryEntry::into_embedding)
                .collect(),
            Err(e) => {
                error!(error = %e, "Failed to retrieve embeddings");
                Vec::new()
            }
        }
    }

    async fn conversation_lock(&self, conversation_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.conversation_locks.lock().await;
        locks.entry(conversation_id.to_string()).or_default().clone()
    }

    /// Hands back a lock taken with [`Self::conversation_lock`] after its guard is dropped.
    async fn release_conversation_lock(&self, conversation_id: &str, lock: Arc<Mutex<()>>) {
        let mut locks = self.conversation_locks.lock().await;
        // Clones are only made under the table lock: the table and `lock` are the last two holders.
        let idle = locks
            .get(conversation_id)
            .is_some_and(|held| Arc::ptr_eq(held, &lock) && Arc::strong_count(&lock) == 2);
        if idle {
            locks.remove(conversation_id);
        }
    }

    #[cfg(test)]
    pub(crate) async fn conversation_lock_count(&self) -> usize {
        self.conversation_locks.lock().await.len()
    }

    async fn next_sequence(&self, conversation_id: &str) -> Result<i64> {
        let pieces = self
            .query_prompt_pieces(Some(Condition::eq(Column::ConversationId, conversation_id)))
            .await?;
        Ok(pieces
            .iter()
            .map(|p| p.sequence)
            .max()
            .map_or(0, |max| max + 1))
    }

    /// Stores one batch as the next turn of its conversation and returns it with its sequence set.
    pub async fn add_request_response_to_memory(
        &self,
        mut request: PromptRequestResponse,
    ) -> Result<PromptRequestResponse> {
        request.validate()?;
        let conversation_id = request
            .conversation_id()
            .map(str::to_string)
            .unwrap_or_default();

        let lock = self.conversation_lock(&conversation_id).await;
        let stored = {
            let _guard = lock.lock().await;
            self.store_next_turn(&conversation_id, &mut request.request_pieces)
                .await
        };
        self.release_conversation_lock(&conversation_id, lock).await;
        let sequence = stored?;

        let embedding = self.memory_embedding.read().await.clone();
        if let Some(embedding) = embedding {
            let rows = embedding
                .generate_embedding_memory_data_batch(&request.request_pieces)
                .await?;
            if !rows.is_empty() {
                self.backend
                    .insert_entries(rows.into_iter().map(MemoryEntry::from).collect())
                    .await?;
            }
        }

        info!(
            conversation_id = %conversation_id,
            sequence,
            count = request.len(),
            "Added request response to memory"
        );
        Ok(request)
    }

    async fn store_next_turn(
        &self,
        conversation_id: &str,
        pieces: &mut [PromptRequestPiece],
    ) -> Result<i64> {
        let sequence = self.next_sequence(conversation_id).await?;
        for piece in pieces.iter_mut() {
            piece.sequence = sequence;
        }
        self.add_request_pieces_to_memory(pieces.to_vec()).await?;
        Ok(sequence)
    }

    /// Inserts pieces as they are, without sequencing.
    pub async fn add_request_pieces_to_memory(&self, pieces: Vec<PromptRequestPiece>) -> Result<()> {
        if pieces.is_empty() {
            return Ok(());
        }
        let entries = pieces
            .into_iter()
            .map(|mut piece| {
                piece.scores.clear();
                MemoryEntry::from(piece)
            })
            .collect();
        self.backend.insert_entries(entries).await?;
        Ok(())
    }

    pub(crate) async fn query_prompt_pieces(
        &self,
        conditions: Option<Condition>,
    ) -> Result<Vec<PromptRequestPiece>> {
        let entries = self
            .backend
            .query_entries(Table::PromptPieces, conditions, false)
            .await?;
        Ok(entries
            .into_iter()
            .filter_map(MemoryEntry::into_prompt)
            .collect())
    }

    /// Pieces matching every filter of `query`, with scores attached, in conversation order.
    pub async fn get_prompt_request_pieces(&self, query: &PromptPieceQuery) -> Vec<PromptRequestPiece> {
        let conditions = query.to_condition(self.backend.as_ref());
        match self.query_prompt_pieces(conditions).await {
            Ok(pieces) => {
                debug!(count = pieces.len(), "Retrieved prompt request pieces");
                sort_request_pieces(self.populate_prompt_piece_scores(pieces).await)
            }
            Err(e) => {
                error!(error = %e, query = ?query, "Failed to retrieve prompt request pieces");
                Vec::new()
            }
        }
    }

    pub async fn get_prompt_request_pieces_by_memory_labels(
        &self,
        labels: &BTreeMap<String, String>,
    ) -> Vec<PromptRequestPiece> {
        self.get_prompt_request_pieces(&PromptPieceQuery::by_labels(labels.clone()))
            .await
    }

    /// Attaches to each piece the scores of its canonical piece.
    pub async fn populate_prompt_piece_scores(
        &self,
        mut pieces: Vec<PromptRequestPiece>,
    ) -> Vec<PromptRequestPiece> {
        if pieces.is_empty() {
            return pieces;
        }
        let canonical_ids: BTreeSet<Uuid> = pieces.iter().map(|p| p.original_prompt_id).collect();
        let scores = match self.query_scores(&canonical_ids).await {
            Ok(scores) => scores,
            Err(e) => {
                error!(error = %e, "Failed to retrieve scores for prompt request pieces");
                return pieces;
            }
        };

        let mut by_piece: HashMap<Uuid, Vec<_>> = HashMap::new();
        for score in scores {
            by_piece
                .entry(score.prompt_request_response_id)
                .or_default()
                .push(score);
        }
        for piece in &mut pieces {
            piece.scores = by_piece
                .get(&piece.original_prompt_id)
                .cloned()
                .unwrap_or_default();
        }
        pieces
    }

    /// Turns of a conversation, one per sequence number. Empty for an unknown conversation.
    pub async fn get_conversation(&self, conversation_id: &str) -> Vec<PromptRequestResponse> {
        let pieces = self
            .get_prompt_request_pieces(&PromptPieceQuery::by_conversation_id(conversation_id))
            .await;
        group_conversation_request_pieces_by_sequence(pieces)
    }

    pub async fn get_chat_messages_with_conversation_id(&self, conversation_id: &str) -> Vec<ChatMessage> {
        self.get_prompt_request_pieces(&PromptPieceQuery::by_conversation_id(conversation_id))
            .await
            .iter()
            .map(PromptRequestPiece::to_chat_message)
            .collect()
    }

    /// Copies a conversation under a new conversation id and returns that id.
    ///
    /// Copies get fresh ids and keep `original_prompt_id`, so they share the source's scores.
    /// When `new_orchestrator_id` is given it replaces the orchestrator `id` on every copy; it must
    /// differ from the orchestrator ids already in the conversation.
    pub async fn duplicate_conversation(
        &self,
        conversation_id: &str,
        new_orchestrator_id: Option<&str>,
    ) -> Result<String> {
        self.duplicate(conversation_id, new_orchestrator_id, false).await
    }

    /// Like [`Self::duplicate_conversation`], leaving out the last turn.
    ///
    /// A conversation ending in a system or user piece loses its last sequence value. One ending in
    /// an assistant piece loses the last two (the prompt and its reply).
    pub async fn duplicate_conversation_excluding_last_turn(
        &self,
        conversation_id: &str,
        new_orchestrator_id: Option<&str>,
    ) -> Result<String> {
        self.duplicate(conversation_id, new_orchestrator_id, true).await
    }

    async fn duplicate(
        &self,
        conversation_id: &str,
        new_orchestrator_id: Option<&str>,
        exclude_last_turn: bool,
    ) -> Result<String> {
        let lock = self.conversation_lock(conversation_id).await;
        let result = {
            let _guard = lock.lock().await;
            self.copy_conversation(conversation_id, new_orchestrator_id, exclude_last_turn)
                .await
        };
        self.release_conversation_lock(conversation_id, lock).await;
        result
    }

    async fn copy_conversation(
        &self,
        conversation_id: &str,
        new_orchestrator_id: Option<&str>,
        exclude_last_turn: bool,
    ) -> Result<String> {
        let pieces = sort_request_pieces(
            self.query_prompt_pieces(Some(Condition::eq(Column::ConversationId, conversation_id)))
                .await?,
        );

        if let Some(new_id) = new_orchestrator_id {
            if pieces.iter().any(|p| p.orchestrator_id() == Some(new_id)) {
                return Err(MemoryError::validation(
                    "The new orchestrator ID must be different from the existing orchestrator ID.",
                ));
            }
        }

        let pieces = if exclude_last_turn {
            without_last_turn(pieces)
        } else {
            pieces
        };

        let new_conversation_id = Uuid::new_v4().to_string();
        let copies: Vec<PromptRequestPiece> = pieces
            .into_iter()
            .map(|mut piece| {
                piece.id = Uuid::new_v4();
                piece.conversation_id = new_conversation_id.clone();
                if let Some(new_id) = new_orchestrator_id {
                    piece
                        .orchestrator_identifier
                        .insert("id".to_string(), new_id.to_string());
                }
                piece
            })
            .collect();

        let count = copies.len();
        self.add_request_pieces_to_memory(copies).await?;
        info!(
            conversation_id = %conversation_id,
            new_conversation_id = %new_conversation_id,
            count,
            "Duplicated conversation"
        );
        Ok(new_conversation_id)
    }

    /// Sets `update_fields` on every piece of a conversation. `Ok(false)` when it has no pieces.
    pub async fn update_prompt_entries_by_conversation_id(
        &self,
        conversation_id: &str,
        update_fields: &BTreeMap<Column, Value>,
    ) -> Result<bool> {
        if update_fields.is_empty() {
            return Err(MemoryError::validation(
                "update_fields must be provided to update prompt entries.",
            ));
        }
        if let Some(column) = update_fields
            .keys()
            .find(|c| !PromptRequestPiece::UPDATABLE_COLUMNS.contains(*c))
        {
            return Err(MemoryError::validation(format!(
                "Column {} of prompt entries cannot be updated",
                column.name()
            )));
        }

        let entries = self
            .backend
            .query_entries(
                Table::PromptPieces,
                Some(Condition::eq(Column::ConversationId, conversation_id)),
                false,
            )
            .await?;
        if entries.is_empty() {
            info!(conversation_id = %conversation_id, "No entries found to update");
            return Ok(false);
        }

        let updated = self.backend.update_entries(&entries, update_fields).await?;
        if updated {
            info!(
                conversation_id = %conversation_id,
                count = entries.len(),
                "Updated prompt entries"
            );
        }
        Ok(updated)
    }

    /// Replaces the labels of every piece in a conversation.
    pub async fn update_labels_by_conversation_id(
        &self,
        conversation_id: &str,
        labels: BTreeMap<String, String>,
    ) -> Result<bool> {
        let fields = BTreeMap::from([(Column::Labels, Value::Map(labels))]);
        self.update_prompt_entries_by_conversation_id(conversation_id, &fields)
            .await
    }

    /// Replaces the prompt metadata of every piece in a conversation.
    pub async fn update_prompt_metadata_by_conversation_id(
        &self,
        conversation_id: &str,
        prompt_metadata: BTreeMap<String, String>,
    ) -> Result<bool> {
        let fields = BTreeMap::from([(Column::PromptMetadata, Value::Map(prompt_metadata))]);
        self.update_prompt_entries_by_conversation_id(conversation_id, &fields)
            .await
    }

    /// Serializer bound to this interface's results storage.
    pub fn data_serializer(
        &self,
        data_type: PromptDataType,
        value: Option<&str>,
        extension: Option<&str>,
    ) -> Result<DataTypeSerializer> {
        DataTypeSerializer::new(self.results_storage.clone(), data_type, value, extension)
    }

    /// Fills both content hashes of `piece`.
    pub async fn set_request_piece_sha256(&self, piece: &mut PromptRequestPiece) -> Result<()> {
        let original = self.data_serializer(
            piece.original_value_data_type,
            Some(&piece.original_value),
            None,
        )?;
        piece.original_value_sha256 = Some(original.get_sha256().await?);

        let converted = self.data_serializer(
            piece.converted_value_data_type,
            Some(&piece.converted_value),
            None,
        )?;
        piece.converted_value_sha256 = Some(converted.get_sha256().await?);
        Ok(())
    }

    fn default_export_path(&self, stem: &str, export_type: ExportType) -> PathBuf {
        self.results_storage
            .results_path()
            .join(format!("{}.{}", stem, export_type.extension()))
    }

    async fn export_pieces(
        &self,
        pieces: &[PromptRequestPiece],
        default_stem: &str,
        file_path: Option<&Path>,
        export_type: Option<ExportType>,
    ) -> Result<PathBuf> {
        let export_type = export_type.unwrap_or(self.default_export_type);
        let path = match file_path {
            Some(path) => path.to_path_buf(),
            None => self.default_export_path(default_stem, export_type),
        };
        self.exporter.export_data(pieces, &path, export_type).await?;
        Ok(path)
    }

    /// Exports a conversation; defaults to `<results>/<conversation_id>.<ext>`.
    pub async fn export_conversation_by_id(
        &self,
        conversation_id: &str,
        file_path: Option<&Path>,
        export_type: Option<ExportType>,
    ) -> Result<PathBuf> {
        let pieces = self
            .get_prompt_request_pieces(&PromptPieceQuery::by_conversation_id(conversation_id))
            .await;
        self.export_pieces(&pieces, conversation_id, file_path, export_type)
            .await
    }

    /// Exports an orchestrator's pieces; defaults to `<results>/<orchestrator_id>.<ext>`.
    pub async fn export_conversation_by_orchestrator_id(
        &self,
        orchestrator_id: &str,
        file_path: Option<&Path>,
        export_type: Option<ExportType>,
    ) -> Result<PathBuf> {
        let pieces = self
            .get_prompt_request_pieces(&PromptPieceQuery::by_orchestrator_id(orchestrator_id))
            .await;
        self.export_pieces(&pieces, orchestrator_id, file_path, export_type)
            .await
    }

    /// Exports every stored piece with its scores; defaults to `<results>/conversations.<ext>`.
    pub async fn export_all_conversations(
        &self,
        file_path: Option<&Path>,
        export_type: Option<ExportType>,
    ) -> Result<PathBuf> {
        let pieces = self
            .get_prompt_request_pieces(&PromptPieceQuery::default())
            .await;
        self.export_pieces(&pieces, "conversations", file_path, export_type)
            .await
    }

    pub async fn dispose(&self) -> Result<()> {
        self.backend.dispose().await?;
        info!("Memory interface disposed");
        Ok(())
    }
}

/// Drops the last turn of `pieces`, which must be sorted by sequence.
fn without_last_turn(pieces: Vec<PromptRequestPiece>) -> Vec<PromptRequestPiece> {
    let Some(last) = pieces.last() else {
        return pieces;
    };
    let dropped = match last.role {
        ChatMessageRole::System | ChatMessageRole::User => 1,
        ChatMessageRole::Assistant => 2,
    };
    let cutoff = last.sequence - dropped;
    pieces.into_iter().filter(|p| p.sequence <= cutoff).collect()
}
