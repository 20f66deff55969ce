//! Integration tests for saving and removing documents
//!
//! These tests verify:
//! - Optimistic concurrency through CAS tokens
//! - Cascade save of referenced documents that were never stored
//! - Cascade remove over referenced documents
//! - Lifecycle hooks and mapper events
//! - Key storage options and expiry

use serde_json::json;
use settee_core::{Error, Lifecycle};
use settee_engine::{FindOptions, Mapper, MapperConfig, MapperEvent, RemoveOptions, SaveOptions};
use settee_schema::{Descriptor, Hookable, SchemaBuilder};
use settee_storage::MemoryStore;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn setup(config: MapperConfig) -> (Arc<MemoryStore>, Mapper) {
    let store = Arc::new(MemoryStore::new());
    let mapper = Mapper::new(store.clone(), config).unwrap();
    mapper
        .register(
            SchemaBuilder::new("User")
                .field("name", Descriptor::string())
                .field("age", Descriptor::number())
                .key_prefix("user"),
        )
        .unwrap();
    mapper
        .register(
            SchemaBuilder::new("Post")
                .field("title", Descriptor::string())
                .field("author", Descriptor::reference("User"))
                .field("readers", Descriptor::array_of(Descriptor::reference("User")))
                .key_prefix("post"),
        )
        .unwrap();
    (store, mapper)
}

async fn load(mapper: &Mapper, model: &str, id: &str) -> settee_engine::Document {
    mapper
        .find_by_id(model, id, FindOptions::default())
        .await
        .unwrap()
        .into_one()
        .unwrap()
}

// ============================================================================
// CAS
// ============================================================================

#[tokio::test]
async fn test_stale_cas_is_rejected_without_writing() {
    let (store, mapper) = setup(MapperConfig::default());
    let mut user = mapper.create("User", json!({"id": "1", "name": "ann"})).unwrap();
    mapper.save(&mut user, SaveOptions::default()).await.unwrap();

    let mut first = load(&mapper, "User", "1").await;
    let mut stale = load(&mapper, "User", "1").await;
    assert_eq!(first.cas(), stale.cas());

    first.set("name", json!("bea"));
    let options = SaveOptions::with_cas(first.cas());
    let new_cas = mapper.save(&mut first, options).await.unwrap();
    assert_eq!(first.cas(), Some(new_cas));

    stale.set("name", json!("cat"));
    let options = SaveOptions::with_cas(stale.cas());
    let err = mapper.save(&mut stale, options).await.unwrap_err();
    assert!(err.is_cas_mismatch());
    assert_eq!(store.peek("user_1"), Some(json!({"id": "1", "name": "bea"})));
}

#[tokio::test]
async fn test_remove_with_stale_cas_keeps_document() {
    let (store, mapper) = setup(MapperConfig::default());
    let mut user = mapper.create("User", json!({"id": "1", "name": "ann"})).unwrap();
    mapper.save(&mut user, SaveOptions::default()).await.unwrap();
    let mut stale = load(&mapper, "User", "1").await;
    mapper.save(&mut user, SaveOptions::default()).await.unwrap();

    let options = RemoveOptions {
        cas: stale.cas(),
        ..RemoveOptions::default()
    };
    let err = mapper.remove(&mut stale, options).await.unwrap_err();
    assert!(err.is_cas_mismatch());
    assert!(store.contains("user_1"));
}

#[tokio::test]
async fn test_remove_missing_document_is_not_found() {
    let (_, mapper) = setup(MapperConfig::default());
    let mut user = mapper.create("User", json!({"id": "9"})).unwrap();
    let err = mapper
        .remove(&mut user, RemoveOptions::default())
        .await
        .unwrap_err();
    assert_eq!(err, Error::NotFound("user_9".to_string()));
}

// ============================================================================
// Cascade
// ============================================================================

#[tokio::test]
async fn test_save_stores_unsaved_references_first() {
    let (store, mapper) = setup(MapperConfig::default());
    let author = mapper.create("User", json!({"id": "u9", "name": "zed"})).unwrap();
    let reader = mapper.create("User", json!({"id": "u8", "name": "yan"})).unwrap();

    let mut post = mapper
        .create("Post", json!({"id": "p1", "title": "hello", "readers": ["u1"]}))
        .unwrap();
    assert!(post.set_reference("author", author));
    assert!(post.push_reference("readers", reader));

    mapper.save(&mut post, SaveOptions::default()).await.unwrap();
    assert_eq!(store.peek("user_u9"), Some(json!({"id": "u9", "name": "zed"})));
    assert_eq!(store.peek("user_u8"), Some(json!({"id": "u8", "name": "yan"})));
    assert_eq!(
        store.peek("post_p1"),
        Some(json!({"id": "p1", "title": "hello", "author": "u9", "readers": ["u1", "u8"]}))
    );
    assert_eq!(post.get("author"), Some(json!("u9")));
}

#[tokio::test]
async fn test_cascade_save_with_full_reference_ids() {
    let config = MapperConfig {
        store_full_reference_id: true,
        ..MapperConfig::default()
    };
    let (store, mapper) = setup(config);
    let author = mapper.create("User", json!({"id": "u9"})).unwrap();
    let mut post = mapper.create("Post", json!({"id": "p1"})).unwrap();
    assert!(post.set_reference("author", author));

    mapper.save(&mut post, SaveOptions::default()).await.unwrap();
    assert!(store.contains("user_u9"));
    assert_eq!(store.peek("post_p1"), Some(json!({"id": "p1", "author": "user_u9"})));

    // Full reference keys resolve like short ones
    let found = mapper
        .find_by_id("Post", "p1", FindOptions::populate("author"))
        .await
        .unwrap();
    assert!(found.missing.is_empty());
    let post = found.into_one().unwrap();
    assert_eq!(post.reference("author").and_then(|u| u.key()), Some("u9".to_string()));
}

#[tokio::test]
async fn test_stored_references_are_not_saved_again() {
    let (store, mapper) = setup(MapperConfig::default());
    let mut author = mapper.create("User", json!({"id": "u1", "name": "ann"})).unwrap();
    mapper.save(&mut author, SaveOptions::default()).await.unwrap();

    let mut post = mapper.create("Post", json!({"id": "p1"})).unwrap();
    assert!(post.set_reference("author", author));
    store.reset_stats();
    mapper.save(&mut post, SaveOptions::default()).await.unwrap();
    assert_eq!(store.write_count(), 1);
    assert_eq!(store.peek("post_p1"), Some(json!({"id": "p1", "author": "u1"})));
}

#[tokio::test]
async fn test_remove_cascades_one_level() {
    let (store, mapper) = setup(MapperConfig::default());
    mapper
        .register(
            SchemaBuilder::new("Blog")
                .field("posts", Descriptor::array_of(Descriptor::reference("Post")))
                .key_prefix("blog"),
        )
        .unwrap();
    for (id, name) in [("u1", "ann"), ("u2", "bea")] {
        let mut user = mapper.create("User", json!({"id": id, "name": name})).unwrap();
        mapper.save(&mut user, SaveOptions::default()).await.unwrap();
    }
    let mut post = mapper
        .create("Post", json!({"id": "p1", "author": "u1", "readers": ["u2", "u3"]}))
        .unwrap();
    mapper.save(&mut post, SaveOptions::default()).await.unwrap();
    let mut blog = mapper.create("Blog", json!({"id": "b1", "posts": ["p1"]})).unwrap();
    mapper.save(&mut blog, SaveOptions::default()).await.unwrap();

    let cascade = RemoveOptions {
        remove_refs: true,
        ..RemoveOptions::default()
    };
    mapper.remove(&mut blog, cascade).await.unwrap();
    assert!(!store.contains("blog_b1"));
    assert!(!store.contains("post_p1"));
    // the post's own references stay
    assert!(store.contains("user_u1"));
    assert!(store.contains("user_u2"));
}

#[tokio::test]
async fn test_remove_refs_skips_missing_references() {
    let (store, mapper) = setup(MapperConfig::default());
    let mut user = mapper.create("User", json!({"id": "u1"})).unwrap();
    mapper.save(&mut user, SaveOptions::default()).await.unwrap();
    let mut post = mapper
        .create("Post", json!({"id": "p1", "author": "u1", "readers": ["u3"]}))
        .unwrap();
    mapper.save(&mut post, SaveOptions::default()).await.unwrap();

    let cascade = RemoveOptions {
        remove_refs: true,
        ..RemoveOptions::default()
    };
    mapper.remove(&mut post, cascade).await.unwrap();
    assert!(store.is_empty());
    assert!(!post.is_stored());
}

// ============================================================================
// Hooks and events
// ============================================================================

#[tokio::test]
async fn test_pre_hook_rejects_and_mutates() {
    let (store, mapper) = setup(MapperConfig::default());
    let saved = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&saved);
    mapper
        .register(
            SchemaBuilder::new("Note")
                .field("text", Descriptor::string())
                .field("stamp", Descriptor::string())
                .pre(Lifecycle::Save, |doc| match doc.get("text") {
                    Some(_) => {
                        doc.set("stamp", json!("checked"));
                        Ok(())
                    }
                    None => Err("text is required".to_string()),
                })
                .post(Lifecycle::Save, move |_| {
                    counter.fetch_add(1, Ordering::SeqCst);
                }),
        )
        .unwrap();

    let mut empty = mapper.create("Note", json!({"id": "n1"})).unwrap();
    let err = mapper.save(&mut empty, SaveOptions::default()).await.unwrap_err();
    assert_eq!(
        err,
        Error::HookRejected {
            hook: "save".to_string(),
            reason: "text is required".to_string(),
        }
    );
    assert!(!store.contains("n1"));
    assert_eq!(saved.load(Ordering::SeqCst), 0);

    let mut note = mapper.create("Note", json!({"id": "n2", "text": "hi"})).unwrap();
    mapper.save(&mut note, SaveOptions::default()).await.unwrap();
    assert_eq!(
        store.peek("n2"),
        Some(json!({"id": "n2", "text": "hi", "stamp": "checked"}))
    );
    assert_eq!(saved.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_events_follow_operation_order() {
    let (_, mapper) = setup(MapperConfig::default());
    mapper
        .register(
            SchemaBuilder::new("Account")
                .field("email", Descriptor::string().index())
                .key_prefix("account"),
        )
        .unwrap();
    let mut events = mapper.subscribe();

    let mut account = mapper
        .create("Account", json!({"id": "a1", "email": "a@x.io"}))
        .unwrap();
    let waited = SaveOptions {
        wait_for_index: Some(true),
        ..SaveOptions::default()
    };
    mapper.save(&mut account, waited).await.unwrap();
    mapper
        .remove(
            &mut account,
            RemoveOptions {
                wait_for_index: Some(true),
                ..RemoveOptions::default()
            },
        )
        .await
        .unwrap();

    let expected = vec![
        MapperEvent::Index {
            model: "Account".to_string(),
            key: "account_a1".to_string(),
            operations: 1,
        },
        MapperEvent::Save {
            model: "Account".to_string(),
            key: "account_a1".to_string(),
        },
        MapperEvent::Index {
            model: "Account".to_string(),
            key: "account_a1".to_string(),
            operations: 1,
        },
        MapperEvent::Remove {
            model: "Account".to_string(),
            key: "account_a1".to_string(),
        },
    ];
    for want in expected {
        assert_eq!(events.recv().await.unwrap(), want);
    }
}

#[tokio::test]
async fn test_failed_operations_emit_error_events() {
    let (_, mapper) = setup(MapperConfig::default());
    let mut user = mapper.create("User", json!({"id": "1", "name": "ann"})).unwrap();
    mapper.save(&mut user, SaveOptions::default()).await.unwrap();
    let mut events = mapper.subscribe();

    let mut stale = load(&mapper, "User", "1").await;
    user.set("name", json!("bea"));
    mapper.save(&mut user, SaveOptions::default()).await.unwrap();
    assert!(matches!(events.recv().await.unwrap(), MapperEvent::Save { .. }));

    let options = SaveOptions::with_cas(stale.cas());
    let err = mapper.save(&mut stale, options).await.unwrap_err();
    match events.recv().await.unwrap() {
        MapperEvent::Error { model, key, lifecycle, message } => {
            assert_eq!(model, "User");
            assert_eq!(key, "user_1");
            assert_eq!(lifecycle, Lifecycle::Save);
            assert_eq!(message, err.to_string());
        }
        other => panic!("expected error event, got {:?}", other),
    }

    let mut missing = mapper.create("User", json!({"id": "9"})).unwrap();
    mapper
        .remove(&mut missing, RemoveOptions::default())
        .await
        .unwrap_err();
    match events.recv().await.unwrap() {
        MapperEvent::Error { key, lifecycle, .. } => {
            assert_eq!(key, "user_9");
            assert_eq!(lifecycle, Lifecycle::Remove);
        }
        other => panic!("expected error event, got {:?}", other),
    }
}

// ============================================================================
// Stored form
// ============================================================================

#[tokio::test]
async fn test_rejected_assignment_is_not_persisted() {
    let (store, mapper) = setup(MapperConfig::default());
    let mut user = mapper.create("User", json!({"id": "1", "age": 30})).unwrap();
    assert!(!user.set("age", json!("thirty")));
    mapper.save(&mut user, SaveOptions::default()).await.unwrap();
    assert_eq!(store.peek("user_1"), Some(json!({"id": "1", "age": 30})));
}

#[tokio::test]
async fn test_store_full_key_round_trip() {
    let config = MapperConfig {
        store_full_key: true,
        ..MapperConfig::default()
    };
    let (store, mapper) = setup(config);
    let mut user = mapper.create("User", json!({"id": "1", "name": "ann"})).unwrap();
    mapper.save(&mut user, SaveOptions::default()).await.unwrap();
    assert_eq!(store.peek("user_1"), Some(json!({"id": "user_1", "name": "ann"})));

    let loaded = load(&mapper, "User", "user_1").await;
    assert_eq!(loaded.key(), Some("1".to_string()));
    assert_eq!(loaded.get("name"), Some(json!("ann")));
}

#[tokio::test]
async fn test_generated_key_is_used_for_storage() {
    let (store, mapper) = setup(MapperConfig::default());
    let mut user = mapper.create("User", json!({"name": "ann"})).unwrap();
    let key = user.key().unwrap();
    mapper.save(&mut user, SaveOptions::default()).await.unwrap();
    assert!(store.contains(&format!("user_{}", key)));
}

#[tokio::test]
async fn test_expiry_is_forwarded() {
    let (store, mapper) = setup(MapperConfig::default());
    let mut user = mapper.create("User", json!({"id": "1"})).unwrap();
    let options = SaveOptions {
        expiry: Some(Duration::from_millis(30)),
        ..SaveOptions::default()
    };
    mapper.save(&mut user, options).await.unwrap();
    assert!(store.contains("user_1"));

    tokio::time::sleep(Duration::from_millis(80)).await;
    assert!(!store.contains("user_1"));
    let found = mapper
        .find_by_id("User", "1", FindOptions::default())
        .await
        .unwrap();
    assert!(found.one().is_none());
    assert_eq!(found.missing, vec!["user_1".to_string()]);
}
