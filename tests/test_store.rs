//! Integration tests for the SQLite store.
//!
//! Run with:
//!   cargo test --test test_store

use tempfile::TempDir;

use learnbot::error::AppError;
use learnbot::store::{DeleteOutcome, KnowledgeDoc, KnowledgePatch, NewPattern, Store};

// ── helpers ──────────────────────────────────────────────────────────────────

fn open() -> (TempDir, Store) {
    let tmp = TempDir::new().expect("tempdir");
    let store = Store::open(&tmp.path().join("learnbot.db")).expect("open store");
    (tmp, store)
}

fn pattern(owner: &str, trigger: &str, response: &str, is_public: bool) -> NewPattern {
    NewPattern {
        owner: owner.into(),
        trigger: trigger.into(),
        response: response.into(),
        taught_by: if owner.is_empty() { "tester".into() } else { owner.into() },
        is_public,
    }
}

// ── seeding / persistence ────────────────────────────────────────────────────

#[test]
fn seed_defaults_runs_once() {
    let (_tmp, store) = open();
    store.seed_defaults().unwrap();
    store.seed_defaults().unwrap();

    let patterns = store.list_patterns(None).unwrap();
    assert_eq!(patterns.len(), 3);
    assert!(patterns.iter().all(|p| p.is_shared() && p.taught_by == "system"));
    assert_eq!(store.list_documents(None).unwrap().len(), 5);
}

#[test]
fn seed_skips_tables_that_have_rows() {
    let (_tmp, store) = open();
    store.upsert_pattern(pattern("", "ping", "pong", false)).unwrap();
    store.seed_defaults().unwrap();

    let patterns = store.list_patterns(None).unwrap();
    assert_eq!(patterns.len(), 1);
    assert_eq!(patterns[0].trigger, "ping");
    // Documents were still empty, so they are seeded.
    assert_eq!(store.list_documents(None).unwrap().len(), 5);
}

#[test]
fn data_survives_reopen() {
    let (tmp, store) = open();
    let user = store.create_user("alice", Some("Alice")).unwrap();
    store.upsert_pattern(pattern(&user.id, "hi", "hey alice", false)).unwrap();
    drop(store);

    let again = Store::open(&tmp.path().join("learnbot.db")).unwrap();
    assert_eq!(again.get_user(&user.id).unwrap().unwrap().username, "alice");
    assert_eq!(again.list_patterns(Some(&user.id)).unwrap().len(), 1);
}

// ── patterns ─────────────────────────────────────────────────────────────────

#[test]
fn private_patterns_are_hidden_from_others() {
    let (_tmp, store) = open();
    let alice = store.create_user("alice", None).unwrap();
    let bob = store.create_user("bob", None).unwrap();
    store.upsert_pattern(pattern(&alice.id, "secret", "only alice", false)).unwrap();
    store.upsert_pattern(pattern(&alice.id, "open", "everyone", true)).unwrap();

    let bob_view: Vec<_> = store
        .visible_patterns(Some(&bob.id))
        .unwrap()
        .into_iter()
        .map(|p| p.trigger)
        .collect();
    assert_eq!(bob_view, vec!["open".to_string()]);

    let anon_view = store.visible_patterns(None).unwrap();
    assert_eq!(anon_view.len(), 1);
    assert_eq!(store.visible_patterns(Some(&alice.id)).unwrap().len(), 2);
}

#[test]
fn own_patterns_match_first() {
    let (_tmp, store) = open();
    let alice = store.create_user("alice", None).unwrap();
    store.upsert_pattern(pattern("", "hello there", "shared long", false)).unwrap();
    store.upsert_pattern(pattern(&alice.id, "hello", "alice short", false)).unwrap();

    let ordered = store.visible_patterns(Some(&alice.id)).unwrap();
    assert_eq!(ordered[0].response, "alice short");
    assert_eq!(ordered[1].response, "shared long");
}

#[test]
fn reteaching_replaces_response_and_keeps_id() {
    let (_tmp, store) = open();
    let first = store.upsert_pattern(pattern("", "Hello", "one", false)).unwrap();
    store.record_use(first.id).unwrap();
    let second = store.upsert_pattern(pattern("", "  hello ", "two", false)).unwrap();

    assert_eq!(first.id, second.id);
    assert_eq!(second.trigger, "hello");
    assert_eq!(second.response, "two");
    assert_eq!(second.use_count, 1);
}

#[test]
fn delete_respects_ownership() {
    let (_tmp, store) = open();
    let alice = store.create_user("alice", None).unwrap();
    let bob = store.create_user("bob", None).unwrap();
    let owned = store.upsert_pattern(pattern(&alice.id, "mine", "x", true)).unwrap();
    let shared = store.upsert_pattern(pattern("", "ours", "y", false)).unwrap();

    assert_eq!(store.delete_pattern(owned.id, Some(&bob.id)).unwrap(), DeleteOutcome::Forbidden);
    assert_eq!(store.delete_pattern(owned.id, None).unwrap(), DeleteOutcome::Forbidden);
    assert!(matches!(
        store.delete_pattern(owned.id, Some(&alice.id)).unwrap(),
        DeleteOutcome::Deleted(p) if p.id == owned.id
    ));
    assert_eq!(store.delete_pattern(owned.id, Some(&alice.id)).unwrap(), DeleteOutcome::NotFound);
    assert!(matches!(
        store.delete_pattern(shared.id, Some(&bob.id)).unwrap(),
        DeleteOutcome::Deleted(p) if p.owner.is_empty()
    ));
    assert!(store.get_pattern(shared.id).unwrap().is_none());
}

#[test]
fn stats_count_teachers_uses_and_chats() {
    let (_tmp, store) = open();
    let alice = store.create_user("alice", None).unwrap();
    let p = store.upsert_pattern(pattern(&alice.id, "a", "1", false)).unwrap();
    store.upsert_pattern(pattern("", "b", "2", false)).unwrap();
    store.record_use(p.id).unwrap();
    store.record_use(p.id).unwrap();
    store.append_message(&alice.id, "user", "a").unwrap();
    store.append_message(&alice.id, "assistant", "1").unwrap();

    let global = store.pattern_stats(None).unwrap();
    assert_eq!(global.total_patterns, 2);
    assert_eq!(global.total_teachers, 2);
    assert_eq!(global.total_uses, 2);
    assert_eq!(global.total_chats, 1);
    assert!(global.my_patterns.is_none());

    let mine = store.pattern_stats(Some(&alice.id)).unwrap();
    assert_eq!(mine.my_patterns, Some(1));
    assert_eq!(mine.my_chats, Some(1));
    assert_eq!(mine.public_patterns, Some(1));
    assert_eq!(mine.total_users, Some(1));
}

// ── users / history ──────────────────────────────────────────────────────────

#[test]
fn duplicate_username_is_rejected() {
    let (_tmp, store) = open();
    store.create_user("alice", None).unwrap();
    let err = store.create_user(" alice ", None).unwrap_err();
    assert!(matches!(err, AppError::Invalid(_)));
    assert!(store.find_user_by_username("alice").unwrap().is_some());
}

#[test]
fn history_is_per_user_and_chronological() {
    let (_tmp, store) = open();
    for i in 0..4 {
        store.append_message("u1", "user", &format!("m{i}")).unwrap();
    }
    store.append_message("u2", "user", "other").unwrap();

    let recent: Vec<_> = store
        .recent_history("u1", 2)
        .unwrap()
        .into_iter()
        .map(|r| r.content)
        .collect();
    assert_eq!(recent, vec!["m2".to_string(), "m3".to_string()]);

    assert_eq!(store.clear_history("u1").unwrap(), 4);
    assert!(store.recent_history("u1", 10).unwrap().is_empty());
    assert_eq!(store.recent_history("u2", 10).unwrap().len(), 1);
}

// ── knowledge ────────────────────────────────────────────────────────────────

#[test]
fn knowledge_document_lifecycle() {
    let (_tmp, store) = open();
    let doc = KnowledgeDoc {
        id: "rust".into(),
        title: "Rust".into(),
        content: "Systems language".into(),
        tags: vec!["lang".into()],
        category: "technical".into(),
        created_at: String::new(),
        updated_at: String::new(),
    };
    let stored = store.insert_document(doc.clone()).unwrap();
    assert!(!stored.created_at.is_empty());
    assert!(matches!(store.insert_document(doc).unwrap_err(), AppError::Invalid(_)));

    let patch = KnowledgePatch {
        content: Some("Fast and safe".into()),
        ..KnowledgePatch::default()
    };
    let updated = store.update_document("rust", patch).unwrap();
    assert_eq!(updated.title, "Rust");
    assert_eq!(updated.content, "Fast and safe");
    assert_eq!(updated.tags, vec!["lang".to_string()]);

    assert_eq!(store.list_documents(Some("technical")).unwrap().len(), 1);
    assert!(store.list_documents(Some("general")).unwrap().is_empty());

    store.delete_document("rust").unwrap();
    assert!(store.get_document("rust").unwrap().is_none());
    assert!(matches!(store.delete_document("rust").unwrap_err(), AppError::NotFound(_)));
}
