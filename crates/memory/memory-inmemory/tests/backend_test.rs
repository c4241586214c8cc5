//! Integration tests for `InMemoryBackend` against the `MemoryBackend` contract.

use std::collections::BTreeMap;

use memory_core::{
    ChatMessageRole, Column, Condition, MemoryBackend, MemoryEntry, PromptRequestPiece, Score,
    ScoreType, Table, Value,
};
use memory_inmemory::InMemoryBackend;

fn piece(conversation_id: &str, text: &str) -> PromptRequestPiece {
    PromptRequestPiece::new(ChatMessageRole::User, text).with_conversation_id(conversation_id)
}

/// **Test: Insert and query by condition**
///
/// **Setup:** Two pieces in two conversations.
///
/// **Action:** Query with a conversation id condition, then with none.
///
/// **Expected:** The filtered query returns one piece; the unfiltered query returns both in insertion order.
#[tokio::test]
async fn test_insert_and_query() {
    let backend = InMemoryBackend::new();
    let a = piece("a", "first");
    let b = piece("b", "second");
    backend
        .insert_entries(vec![a.clone().into(), b.clone().into()])
        .await
        .unwrap();

    let found = backend
        .query_entries(Table::PromptPieces, Some(Condition::eq(Column::ConversationId, "a")), false)
        .await
        .unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id(), a.id);

    let all = backend.query_entries(Table::PromptPieces, None, false).await.unwrap();
    let ids: Vec<_> = all.iter().map(MemoryEntry::id).collect();
    assert_eq!(ids, vec![a.id, b.id]);
    assert!(backend.query_entries(Table::Scores, None, false).await.unwrap().is_empty());
}

/// **Test: Batch insert is all-or-nothing**
///
/// **Setup:** One stored piece.
///
/// **Action:** Insert a batch containing a new piece and the stored piece again.
///
/// **Expected:** Error; the new piece was not stored.
#[tokio::test]
async fn test_insert_entries_atomic() {
    let backend = InMemoryBackend::new();
    let existing = piece("a", "x");
    backend.insert_entry(existing.clone().into()).await.unwrap();

    let fresh = piece("a", "y");
    let result = backend
        .insert_entries(vec![fresh.into(), existing.into()])
        .await;
    assert!(result.is_err());
    assert_eq!(backend.len(Table::PromptPieces).await, 1);
}

/// **Test: Label conditions use AND semantics**
///
/// **Setup:** One piece with `{op: x, user: y}`, one with only `{op: x}`.
///
/// **Expected:** Querying both labels returns only the first piece.
#[tokio::test]
async fn test_label_conditions_and() {
    let backend = InMemoryBackend::new();
    let both = piece("a", "1").with_label("op", "x").with_label("user", "y");
    let one = piece("b", "2").with_label("op", "x");
    backend
        .insert_entries(vec![both.clone().into(), one.into()])
        .await
        .unwrap();

    let mut labels = BTreeMap::new();
    labels.insert("op".to_string(), "x".to_string());
    labels.insert("user".to_string(), "y".to_string());
    let found = backend
        .query_entries(Table::PromptPieces, Some(backend.memory_label_conditions(&labels)), false)
        .await
        .unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id(), both.id);
}

#[tokio::test]
async fn test_orchestrator_conditions() {
    let backend = InMemoryBackend::new();
    let mine = piece("a", "1").with_orchestrator_id("orch-1");
    let other = piece("a", "2").with_orchestrator_id("orch-2");
    backend
        .insert_entries(vec![mine.clone().into(), other.into()])
        .await
        .unwrap();

    let found = backend
        .query_entries(Table::PromptPieces, Some(backend.orchestrator_conditions("orch-1")), false)
        .await
        .unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id(), mine.id);
}

/// **Test: Update entries**
///
/// **Setup:** Two stored pieces.
///
/// **Action:** Update the labels of the first; then update an entry that was never stored; then try
/// to rewrite the converted value of the first.
///
/// **Expected:** First update returns true and changes only the first piece; second returns false;
/// the content rewrite is rejected and leaves the piece as stored.
#[tokio::test]
async fn test_update_entries() {
    let backend = InMemoryBackend::new();
    let a = piece("a", "1");
    let b = piece("a", "2");
    backend
        .insert_entries(vec![a.clone().into(), b.clone().into()])
        .await
        .unwrap();

    let labels = BTreeMap::from([("op".to_string(), "changed".to_string())]);
    let mut fields = BTreeMap::new();
    fields.insert(Column::Labels, Value::Map(labels.clone()));
    assert!(backend.update_entries(&[a.clone().into()], &fields).await.unwrap());

    let rows = backend.query_entries(Table::PromptPieces, None, false).await.unwrap();
    let pieces: Vec<PromptRequestPiece> = rows.into_iter().filter_map(MemoryEntry::into_prompt).collect();
    assert_eq!(pieces[0].labels, labels);
    assert!(pieces[1].labels.is_empty());

    let missing = piece("z", "never stored");
    assert!(!backend.update_entries(&[missing.into()], &fields).await.unwrap());

    let mut content = BTreeMap::new();
    content.insert(Column::ConvertedValue, Value::from("changed"));
    assert!(backend.update_entries(&[a.clone().into()], &content).await.is_err());
    let rows = backend.query_entries(Table::PromptPieces, None, false).await.unwrap();
    let pieces: Vec<PromptRequestPiece> = rows.into_iter().filter_map(MemoryEntry::into_prompt).collect();
    assert_eq!(pieces[0].converted_value, "1");
}

#[tokio::test]
async fn test_update_rejects_non_updatable_column() {
    let backend = InMemoryBackend::new();
    let a = piece("a", "1");
    backend.insert_entry(a.clone().into()).await.unwrap();

    let mut fields = BTreeMap::new();
    fields.insert(Column::ConversationId, Value::from("b"));
    assert!(backend.update_entries(&[a.into()], &fields).await.is_err());
}

#[tokio::test]
async fn test_native_condition_is_query_error() {
    let backend = InMemoryBackend::new();
    backend.insert_entry(piece("a", "1").into()).await.unwrap();
    let native = Condition::Native {
        clause: "json_extract(labels, ?) = ?".to_string(),
        params: vec![Value::from("$.op"), Value::from("x")],
    };
    assert!(backend
        .query_entries(Table::PromptPieces, Some(native), false)
        .await
        .is_err());
}

#[tokio::test]
async fn test_scores_table_and_dispose() {
    let backend = InMemoryBackend::new();
    let p = piece("a", "1");
    let score = Score::new(ScoreType::FloatScale, "0.3", p.id).unwrap();
    backend.insert_entry(score.clone().into()).await.unwrap();

    let found = backend
        .query_entries(
            Table::Scores,
            Some(Condition::is_in(Column::PromptRequestResponseId, [p.id])),
            false,
        )
        .await
        .unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].clone().into_score().unwrap().id, score.id);

    backend.dispose().await.unwrap();
    assert!(backend.is_empty().await);
}
