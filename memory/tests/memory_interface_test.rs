//! Integration tests for `MemoryInterface` over the in-memory backend.

use std::collections::BTreeMap;
use std::sync::Arc;

use memory::{
    ChatMessageRole, Column, MemoryError, MemoryInterface, PromptPieceQuery, PromptRequestPiece,
    PromptRequestResponse, Score, ScoreType, Value,
};

fn piece(conversation_id: &str, role: ChatMessageRole, text: &str) -> PromptRequestPiece {
    PromptRequestPiece::new(role, text).with_conversation_id(conversation_id)
}

async fn add_turn(memory: &MemoryInterface, pieces: Vec<PromptRequestPiece>) -> PromptRequestResponse {
    memory
        .add_request_response_to_memory(PromptRequestResponse::new(pieces))
        .await
        .unwrap()
}

/// **Test: Sequence numbers increase per conversation**
///
/// **Setup:** Empty memory.
///
/// **Action:** Add three batches to one conversation (the second with two pieces) and one to another.
///
/// **Expected:** Batches get sequences 0, 1, 2; both pieces of the second batch share sequence 1;
/// the other conversation starts again at 0.
#[tokio::test]
async fn test_sequence_monotonic_per_conversation() {
    let memory = MemoryInterface::in_memory();

    let first = add_turn(&memory, vec![piece("c1", ChatMessageRole::User, "hi")]).await;
    let second = add_turn(
        &memory,
        vec![
            piece("c1", ChatMessageRole::Assistant, "part one"),
            piece("c1", ChatMessageRole::Assistant, "part two"),
        ],
    )
    .await;
    let third = add_turn(&memory, vec![piece("c1", ChatMessageRole::User, "again")]).await;
    let other = add_turn(&memory, vec![piece("c2", ChatMessageRole::User, "other")]).await;

    assert_eq!(first.sequence(), Some(0));
    assert!(second.request_pieces.iter().all(|p| p.sequence == 1));
    assert_eq!(third.sequence(), Some(2));
    assert_eq!(other.sequence(), Some(0));

    let turns = memory.get_conversation("c1").await;
    let sequences: Vec<i64> = turns.iter().filter_map(|t| t.sequence()).collect();
    assert_eq!(sequences, vec![0, 1, 2]);
    assert_eq!(turns[1].len(), 2);
}

/// **Test: Concurrent appends never share a sequence number**
///
/// **Setup:** One shared memory interface.
///
/// **Action:** Spawn ten tasks that each append one batch to the same conversation.
///
/// **Expected:** The stored sequences are exactly 0..10.
#[tokio::test]
async fn test_concurrent_appends_get_distinct_sequences() {
    let memory = Arc::new(MemoryInterface::in_memory());

    let mut handles = Vec::new();
    for i in 0..10 {
        let memory = memory.clone();
        handles.push(tokio::spawn(async move {
            memory
                .add_request_response_to_memory(PromptRequestResponse::new(vec![piece(
                    "shared",
                    ChatMessageRole::User,
                    &format!("message {}", i),
                )]))
                .await
                .unwrap();
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let mut sequences: Vec<i64> = memory
        .get_prompt_request_pieces(&PromptPieceQuery::by_conversation_id("shared"))
        .await
        .iter()
        .map(|p| p.sequence)
        .collect();
    sequences.sort();
    assert_eq!(sequences, (0..10).collect::<Vec<_>>());
}

/// **Test: Invalid batches are rejected before anything is stored**
#[tokio::test]
async fn test_invalid_batch_rejected() {
    let memory = MemoryInterface::in_memory();

    let mixed = PromptRequestResponse::new(vec![
        piece("c1", ChatMessageRole::User, "a"),
        piece("c2", ChatMessageRole::User, "b"),
    ]);
    let err = memory.add_request_response_to_memory(mixed).await.unwrap_err();
    assert!(err.is_validation());

    let empty = PromptRequestResponse::new(Vec::new());
    assert!(memory.add_request_response_to_memory(empty).await.is_err());
    assert!(memory
        .get_prompt_request_pieces(&PromptPieceQuery::default())
        .await
        .is_empty());
}

/// **Test: Scores on a duplicate are found through the original piece**
///
/// **Setup:** A conversation with one piece P, duplicated to get D.
///
/// **Action:** Score D, then look scores up by P's id.
///
/// **Expected:** D keeps P's id as `original_prompt_id`; the score is stored against P and shows up
/// on both pieces when they are read back.
#[tokio::test]
async fn test_duplicate_score_lineage() {
    let memory = MemoryInterface::in_memory();
    let original = add_turn(&memory, vec![piece("source", ChatMessageRole::Assistant, "answer")]).await;
    let p = original.request_pieces[0].clone();

    let new_conversation = memory.duplicate_conversation("source", None).await.unwrap();
    let duplicates = memory
        .get_prompt_request_pieces(&PromptPieceQuery::by_conversation_id(&new_conversation))
        .await;
    assert_eq!(duplicates.len(), 1);
    let d = &duplicates[0];
    assert_ne!(d.id, p.id);
    assert_eq!(d.original_prompt_id, p.id);

    let score = Score::new(ScoreType::TrueFalse, "true", d.id).unwrap();
    memory.add_scores_to_memory(vec![score.clone()]).await.unwrap();

    let scores = memory.get_scores_by_prompt_ids(&[p.id]).await;
    assert_eq!(scores.len(), 1);
    assert_eq!(scores[0].id, score.id);
    assert_eq!(scores[0].prompt_request_response_id, p.id);

    let via_duplicate = memory.get_scores_by_prompt_ids(&[d.id]).await;
    assert_eq!(via_duplicate.len(), 1);

    let source_pieces = memory
        .get_prompt_request_pieces(&PromptPieceQuery::by_conversation_id("source"))
        .await;
    assert_eq!(source_pieces[0].scores.len(), 1);
}

/// **Test: Scores for unknown pieces are skipped**
///
/// **Setup:** One stored piece.
///
/// **Action:** Add a batch with one score for the piece and one for a random id.
///
/// **Expected:** No error; only the first score is stored.
#[tokio::test]
async fn test_scores_for_missing_pieces_skipped() {
    let memory = MemoryInterface::in_memory();
    let stored = add_turn(&memory, vec![piece("c", ChatMessageRole::Assistant, "r")]).await;
    let id = stored.request_pieces[0].id;

    let good = Score::new(ScoreType::FloatScale, "0.25", id).unwrap();
    let orphan = Score::new(ScoreType::FloatScale, "0.5", uuid::Uuid::new_v4()).unwrap();
    memory.add_scores_to_memory(vec![good.clone(), orphan]).await.unwrap();

    let scores = memory.get_scores_by_prompt_ids(&[id]).await;
    assert_eq!(scores.len(), 1);
    assert_eq!(scores[0].id, good.id);
    assert!(memory.get_scores_by_prompt_ids(&[]).await.is_empty());
}

/// **Test: Label filters require every label**
///
/// **Setup:** One piece labelled `{op: x, user: y}` and one labelled `{op: x}`.
///
/// **Action:** Query pieces and scores by `{op: x, user: y}`.
///
/// **Expected:** Only the first piece and its score match.
#[tokio::test]
async fn test_label_filters_are_and() {
    let memory = MemoryInterface::in_memory();
    let both = add_turn(
        &memory,
        vec![piece("c1", ChatMessageRole::User, "both")
            .with_label("op", "x")
            .with_label("user", "y")],
    )
    .await;
    let only_op = add_turn(
        &memory,
        vec![piece("c2", ChatMessageRole::User, "op only").with_label("op", "x")],
    )
    .await;
    memory
        .add_scores_to_memory(vec![
            Score::new(ScoreType::TrueFalse, "false", both.request_pieces[0].id).unwrap(),
            Score::new(ScoreType::TrueFalse, "true", only_op.request_pieces[0].id).unwrap(),
        ])
        .await
        .unwrap();

    let labels = BTreeMap::from([
        ("op".to_string(), "x".to_string()),
        ("user".to_string(), "y".to_string()),
    ]);
    let pieces = memory.get_prompt_request_pieces_by_memory_labels(&labels).await;
    assert_eq!(pieces.len(), 1);
    assert_eq!(pieces[0].id, both.request_pieces[0].id);

    let scores = memory.get_scores_by_memory_labels(&labels).await;
    assert_eq!(scores.len(), 1);
    assert_eq!(scores[0].score_value, "false");

    let op_only = BTreeMap::from([("op".to_string(), "x".to_string())]);
    assert_eq!(memory.get_prompt_request_pieces_by_memory_labels(&op_only).await.len(), 2);
}

/// **Test: Orchestrator filters on pieces and scores**
#[tokio::test]
async fn test_orchestrator_lookups() {
    let memory = MemoryInterface::in_memory();
    let mine = add_turn(
        &memory,
        vec![piece("c1", ChatMessageRole::User, "mine").with_orchestrator_id("orch-1")],
    )
    .await;
    add_turn(
        &memory,
        vec![piece("c2", ChatMessageRole::User, "theirs").with_orchestrator_id("orch-2")],
    )
    .await;
    memory
        .add_scores_to_memory(vec![
            Score::new(ScoreType::FloatScale, "1", mine.request_pieces[0].id).unwrap(),
        ])
        .await
        .unwrap();

    let pieces = memory
        .get_prompt_request_pieces(&PromptPieceQuery::by_orchestrator_id("orch-1"))
        .await;
    assert_eq!(pieces.len(), 1);
    assert_eq!(pieces[0].converted_value, "mine");
    assert_eq!(memory.get_scores_by_orchestrator_id("orch-1").await.len(), 1);
    assert!(memory.get_scores_by_orchestrator_id("orch-2").await.is_empty());
}

/// **Test: Duplicating onto an orchestrator already in the conversation fails**
///
/// **Setup:** A conversation produced by `orch-1`.
///
/// **Action:** Duplicate it with `orch-1`, then with `orch-2`.
///
/// **Expected:** The first call is a validation error; the second re-stamps every copy with `orch-2`.
#[tokio::test]
async fn test_duplicate_rejects_same_orchestrator() {
    let memory = MemoryInterface::in_memory();
    add_turn(
        &memory,
        vec![piece("c1", ChatMessageRole::User, "hello").with_orchestrator_id("orch-1")],
    )
    .await;

    let err = memory
        .duplicate_conversation("c1", Some("orch-1"))
        .await
        .unwrap_err();
    assert!(matches!(err, MemoryError::Validation(_)));

    let new_conversation = memory.duplicate_conversation("c1", Some("orch-2")).await.unwrap();
    let copies = memory
        .get_prompt_request_pieces(&PromptPieceQuery::by_conversation_id(&new_conversation))
        .await;
    assert_eq!(copies.len(), 1);
    assert_eq!(copies[0].orchestrator_id(), Some("orch-2"));

    let err = memory
        .duplicate_conversation_excluding_last_turn("c1", Some("orch-1"))
        .await
        .unwrap_err();
    assert!(err.is_validation());
}

/// **Test: Excluding the last turn after an assistant reply**
///
/// **Setup:** System, user and assistant batches at sequences 0, 1, 2.
///
/// **Action:** `duplicate_conversation_excluding_last_turn`.
///
/// **Expected:** Only the sequence 0 piece is copied; the source is untouched.
#[tokio::test]
async fn test_exclude_last_turn_after_assistant() {
    let memory = MemoryInterface::in_memory();
    add_turn(&memory, vec![piece("c1", ChatMessageRole::System, "be helpful")]).await;
    add_turn(&memory, vec![piece("c1", ChatMessageRole::User, "question")]).await;
    add_turn(&memory, vec![piece("c1", ChatMessageRole::Assistant, "answer")]).await;

    let new_conversation = memory
        .duplicate_conversation_excluding_last_turn("c1", None)
        .await
        .unwrap();

    let copies = memory
        .get_prompt_request_pieces(&PromptPieceQuery::by_conversation_id(&new_conversation))
        .await;
    assert_eq!(copies.len(), 1);
    assert_eq!(copies[0].sequence, 0);
    assert_eq!(copies[0].role, ChatMessageRole::System);
    assert_eq!(memory.get_conversation("c1").await.len(), 3);
}

/// **Test: Excluding the last turn after a lone user prompt**
///
/// **Setup:** User, assistant, user batches.
///
/// **Action:** `duplicate_conversation_excluding_last_turn`.
///
/// **Expected:** Only the trailing user piece is dropped.
#[tokio::test]
async fn test_exclude_last_turn_after_user() {
    let memory = MemoryInterface::in_memory();
    add_turn(&memory, vec![piece("c1", ChatMessageRole::User, "q1")]).await;
    add_turn(&memory, vec![piece("c1", ChatMessageRole::Assistant, "a1")]).await;
    add_turn(&memory, vec![piece("c1", ChatMessageRole::User, "q2")]).await;

    let new_conversation = memory
        .duplicate_conversation_excluding_last_turn("c1", None)
        .await
        .unwrap();

    let values: Vec<String> = memory
        .get_chat_messages_with_conversation_id(&new_conversation)
        .await
        .into_iter()
        .map(|m| m.content)
        .collect();
    assert_eq!(values, vec!["q1", "a1"]);
}

/// **Test: Excluding the last turn when system and user share a sequence**
///
/// **Setup:** System and user pieces stored directly at sequence 0, the assistant reply at 1.
///
/// **Action:** `duplicate_conversation_excluding_last_turn`.
///
/// **Expected:** The assistant reply drops two sequence values, so the copy is empty; the source keeps
/// all three pieces.
#[tokio::test]
async fn test_exclude_last_turn_single_batch_prompt() {
    let memory = MemoryInterface::in_memory();
    let mut pieces = vec![
        piece("c1", ChatMessageRole::System, "be helpful"),
        piece("c1", ChatMessageRole::User, "question"),
        piece("c1", ChatMessageRole::Assistant, "answer"),
    ];
    pieces[2].sequence = 1;
    memory.add_request_pieces_to_memory(pieces).await.unwrap();

    let new_conversation = memory
        .duplicate_conversation_excluding_last_turn("c1", None)
        .await
        .unwrap();

    assert!(memory.get_conversation(&new_conversation).await.is_empty());
    let source = memory
        .get_prompt_request_pieces(&PromptPieceQuery::by_conversation_id("c1"))
        .await;
    assert_eq!(source.len(), 3);
    assert_eq!(memory.get_conversation("c1").await.len(), 2);
}

/// **Test: Duplicating an empty conversation**
#[tokio::test]
async fn test_duplicate_empty_conversation() {
    let memory = MemoryInterface::in_memory();
    let new_conversation = memory
        .duplicate_conversation_excluding_last_turn("missing", None)
        .await
        .unwrap();
    assert_ne!(new_conversation, "missing");
    assert!(memory.get_conversation(&new_conversation).await.is_empty());
}

/// **Test: Conversation updates**
///
/// **Setup:** A conversation with two batches.
///
/// **Action:** Update labels and metadata; update an unknown conversation; pass empty or
/// non-updatable fields.
///
/// **Expected:** Known conversation returns true and every piece changes; unknown returns false;
/// bad fields are validation errors.
#[tokio::test]
async fn test_update_by_conversation_id() {
    let memory = MemoryInterface::in_memory();
    add_turn(&memory, vec![piece("c1", ChatMessageRole::User, "q")]).await;
    add_turn(&memory, vec![piece("c1", ChatMessageRole::Assistant, "a")]).await;

    let labels = BTreeMap::from([("run".to_string(), "7".to_string())]);
    assert!(memory
        .update_labels_by_conversation_id("c1", labels.clone())
        .await
        .unwrap());
    let metadata = BTreeMap::from([("note".to_string(), "checked".to_string())]);
    assert!(memory
        .update_prompt_metadata_by_conversation_id("c1", metadata.clone())
        .await
        .unwrap());

    let pieces = memory
        .get_prompt_request_pieces(&PromptPieceQuery::by_conversation_id("c1"))
        .await;
    assert_eq!(pieces.len(), 2);
    assert!(pieces.iter().all(|p| p.labels == labels && p.prompt_metadata == metadata));

    assert!(!memory
        .update_labels_by_conversation_id("unknown", labels)
        .await
        .unwrap());

    let err = memory
        .update_prompt_entries_by_conversation_id("c1", &BTreeMap::new())
        .await
        .unwrap_err();
    assert!(err.is_validation());

    let fields = BTreeMap::from([(Column::Role, Value::from("system"))]);
    let err = memory
        .update_prompt_entries_by_conversation_id("c1", &fields)
        .await
        .unwrap_err();
    assert!(err.is_validation());

    let fields = BTreeMap::from([(Column::ConvertedValue, Value::from("rewritten"))]);
    let err = memory
        .update_prompt_entries_by_conversation_id("c1", &fields)
        .await
        .unwrap_err();
    assert!(err.is_validation());
    let stored = memory
        .get_prompt_request_pieces(&PromptPieceQuery::by_conversation_id("c1"))
        .await;
    assert!(stored.iter().all(|p| p.converted_value != "rewritten"));
}

/// **Test: Piece query filters combine with AND**
#[tokio::test]
async fn test_piece_query_filters() {
    let memory = MemoryInterface::in_memory();
    let before = chrono::Utc::now();
    add_turn(&memory, vec![piece("c1", ChatMessageRole::User, "alpha")]).await;
    add_turn(&memory, vec![piece("c1", ChatMessageRole::Assistant, "beta")]).await;
    add_turn(&memory, vec![piece("c2", ChatMessageRole::User, "alpha")]).await;

    let query = PromptPieceQuery {
        conversation_id: Some("c1".to_string()),
        original_values: Some(vec!["alpha".to_string()]),
        ..Default::default()
    };
    let pieces = memory.get_prompt_request_pieces(&query).await;
    assert_eq!(pieces.len(), 1);
    assert_eq!(pieces[0].conversation_id, "c1");

    let query = PromptPieceQuery {
        converted_values: Some(vec!["alpha".to_string(), "beta".to_string()]),
        sent_after: Some(before),
        ..Default::default()
    };
    let pieces = memory.get_prompt_request_pieces(&query).await;
    assert_eq!(pieces.len(), 3);
    assert_eq!(pieces[0].conversation_id, "c1");
    assert_eq!(pieces[2].conversation_id, "c2");

    let query = PromptPieceQuery {
        sent_before: Some(before),
        ..Default::default()
    };
    assert!(memory.get_prompt_request_pieces(&query).await.is_empty());
    assert!(memory
        .get_prompt_request_pieces(&PromptPieceQuery::by_prompt_ids(Vec::new()))
        .await
        .is_empty());
}

/// **Test: Content hashes are filled and searchable**
#[tokio::test]
async fn test_set_request_piece_sha256_and_query() {
    let memory = MemoryInterface::in_memory();
    let mut hashed = piece("c1", ChatMessageRole::User, "hash me");
    memory.set_request_piece_sha256(&mut hashed).await.unwrap();
    let sha = hashed.converted_value_sha256.clone().unwrap();
    assert_eq!(hashed.original_value_sha256.as_deref(), Some(sha.as_str()));
    assert_eq!(sha.len(), 64);

    add_turn(&memory, vec![hashed]).await;
    add_turn(&memory, vec![piece("c1", ChatMessageRole::Assistant, "plain")]).await;

    let query = PromptPieceQuery {
        converted_value_sha256: Some(vec![sha]),
        ..Default::default()
    };
    let pieces = memory.get_prompt_request_pieces(&query).await;
    assert_eq!(pieces.len(), 1);
    assert_eq!(pieces[0].converted_value, "hash me");
}
