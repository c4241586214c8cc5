//! # Embeddings
//!
//! [`EmbeddingService`] is the text embedding seam; [`MemoryEmbedding`] turns stored pieces into
//! [`EmbeddingData`] rows with it.

use std::sync::Arc;

use async_trait::async_trait;
use memory_core::{EmbeddingData, MemoryError, PromptDataType, PromptRequestPiece, Result};
use tracing::debug;

/// Service for generating text embeddings.
#[async_trait]
pub trait EmbeddingService: Send + Sync {
    /// Generates an embedding vector for a single text string.
    async fn embed(&self, text: &str) -> std::result::Result<Vec<f32>, anyhow::Error>;

    /// Generates embedding vectors for multiple texts in a single call.
    async fn embed_batch(&self, texts: &[String]) -> std::result::Result<Vec<Vec<f32>>, anyhow::Error>;
}

/// Embedding generator attached to a memory interface.
#[derive(Clone)]
pub struct MemoryEmbedding {
    service: Arc<dyn EmbeddingService>,
    embedding_type_name: String,
}

impl MemoryEmbedding {
    /// `embedding_type_name` is stored with every row (e.g. the model name).
    pub fn new(service: Arc<dyn EmbeddingService>, embedding_type_name: impl Into<String>) -> Self {
        Self {
            service,
            embedding_type_name: embedding_type_name.into(),
        }
    }

    pub fn embedding_type_name(&self) -> &str {
        &self.embedding_type_name
    }

    /// Embeds the converted value of one text piece.
    pub async fn generate_embedding_memory_data(
        &self,
        piece: &PromptRequestPiece,
    ) -> Result<EmbeddingData> {
        if piece.converted_value_data_type != PromptDataType::Text {
            return Err(MemoryError::validation(
                "Only text data is supported for embedding.",
            ));
        }
        let embedding = self.service.embed(&piece.converted_value).await?;
        Ok(EmbeddingData {
            id: piece.id,
            embedding,
            embedding_type_name: self.embedding_type_name.clone(),
        })
    }

    /// Embeds every text piece of `pieces` in one batch; other kinds are skipped.
    pub async fn generate_embedding_memory_data_batch(
        &self,
        pieces: &[PromptRequestPiece],
    ) -> Result<Vec<EmbeddingData>> {
        let text_pieces: Vec<&PromptRequestPiece> = pieces
            .iter()
            .filter(|p| p.converted_value_data_type == PromptDataType::Text)
            .collect();
        if text_pieces.is_empty() {
            return Ok(Vec::new());
        }

        let texts: Vec<String> = text_pieces.iter().map(|p| p.converted_value.clone()).collect();
        let embeddings = self.service.embed_batch(&texts).await?;
        if embeddings.len() != text_pieces.len() {
            return Err(MemoryError::Backend(anyhow::anyhow!(
                "Embedding service returned {} vectors for {} texts",
                embeddings.len(),
                text_pieces.len()
            )));
        }

        debug!(count = embeddings.len(), "Generated piece embeddings");
        Ok(text_pieces
            .into_iter()
            .zip(embeddings)
            .map(|(piece, embedding)| EmbeddingData {
                id: piece.id,
                embedding,
                embedding_type_name: self.embedding_type_name.clone(),
            })
            .collect())
    }
}
