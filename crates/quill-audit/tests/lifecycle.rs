//! Lifecycle tests: audited create, update and destroy through an
//! in-memory record store.
//!
//! Run with: cargo test -p quill-audit --test lifecycle

use async_trait::async_trait;
use quill_audit::{
    ActorRegistry, AuditAction, AuditEntry, AuditError, AuditFilter, AuditLogger, AuditMode,
    AuditStorage, AuditedModel, Auditor, CurrentActor, MemoryRecordStore, MemoryStorage,
    ModelDefinition, RecordStore,
};
use quill_core::{AuditConfig, AuditableOptions};
use serde_json::{Value, json};
use std::sync::Arc;
use uuid::Uuid;

// =============================================================================
// FIXTURES
// =============================================================================

struct Fixture {
    people: AuditedModel,
    storage: Arc<MemoryStorage>,
    records: Arc<MemoryRecordStore>,
    current_user: Arc<CurrentActor>,
}

fn person_definition() -> ModelDefinition {
    ModelDefinition::new(
        "Person",
        [
            "id",
            "type",
            "lock_version",
            "created_at",
            "updated_at",
            "name",
            "email",
            "password_digest",
            "status",
        ],
    )
    .default_value("status", json!("active"))
}

fn fixture_with(options: AuditableOptions) -> Fixture {
    let (logger, storage) = AuditLogger::in_memory();
    let records = Arc::new(MemoryRecordStore::new());
    let current_user = Arc::new(CurrentActor::new());
    let actors = ActorRegistry::new().with("User", "current_user", current_user.clone());

    let auditor = Auditor::new(records.clone(), Arc::new(logger)).with_actors(actors);
    let people = auditor
        .register(person_definition(), &options)
        .expect("model registers");

    Fixture {
        people,
        storage,
        records,
        current_user,
    }
}

fn fixture() -> Fixture {
    fixture_with(AuditableOptions::default().exclude(["password_digest"]))
}

fn changes_of(entry: &AuditEntry) -> Value {
    serde_json::from_str(&entry.changes).expect("changes are JSON")
}

fn entries_with(storage: &MemoryStorage, action: AuditAction) -> Vec<AuditEntry> {
    storage
        .entries()
        .into_iter()
        .filter(|e| e.action == action)
        .collect()
}

// =============================================================================
// CREATE
// =============================================================================

#[tokio::test]
async fn create_writes_one_entry_with_initial_values() {
    let f = fixture();
    f.current_user.set("7");

    let mut alice = f
        .people
        .build([("name", json!("Alice")), ("email", json!("alice@example.com"))])
        .unwrap();
    f.people.create(&mut alice).await.unwrap();

    let entries = f.storage.entries();
    assert_eq!(entries.len(), 1);
    let entry = &entries[0];
    assert_eq!(entry.action, AuditAction::Create);
    assert_eq!(entry.auditable_type, "Person");
    assert_eq!(entry.auditable_id.as_deref(), alice.id());
    assert_eq!(entry.user_id.as_deref(), Some("7"));
    assert_eq!(
        changes_of(entry),
        json!({
            "name": [null, "Alice"],
            "email": [null, "alice@example.com"],
            "status": [null, "active"]
        })
    );
    assert!(!alice.changed());
    assert_eq!(f.records.len("Person"), 1);
}

#[tokio::test]
async fn create_without_input_still_writes_entry() {
    let f = fixture_with(AuditableOptions::default().without_user());
    let mut empty = f.people.new_record().unwrap();
    empty.clear_changes();

    f.people.create(&mut empty).await.unwrap();

    let entries = entries_with(&f.storage, AuditAction::Create);
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].changes, "{}");
}

#[tokio::test]
async fn creating_twice_is_rejected() {
    let f = fixture();
    let mut alice = f.people.build([("name", json!("Alice"))]).unwrap();
    f.people.create(&mut alice).await.unwrap();

    let err = f.people.create(&mut alice).await.unwrap_err();
    assert!(matches!(err, AuditError::AlreadyPersisted { .. }));
}

// =============================================================================
// UPDATE
// =============================================================================

#[tokio::test]
async fn update_records_old_and_new_values() {
    let f = fixture();
    let mut alice = f.people.build([("name", json!("Alice"))]).unwrap();
    f.people.create(&mut alice).await.unwrap();

    f.current_user.set("42");
    alice.set("name", "Bob").unwrap();
    assert!(alice.changed());
    assert!(alice.attribute_changed("name"));
    f.people.save(&mut alice).await.unwrap();

    let updates = entries_with(&f.storage, AuditAction::Update);
    assert_eq!(updates.len(), 1);
    assert_eq!(changes_of(&updates[0]), json!({"name": ["Alice", "Bob"]}));
    assert_eq!(updates[0].user_id.as_deref(), Some("42"));
    assert!(!alice.changed());
}

#[tokio::test]
async fn update_without_changes_writes_nothing() {
    let f = fixture();
    let mut alice = f.people.build([("name", json!("Alice"))]).unwrap();
    f.people.create(&mut alice).await.unwrap();

    f.people.update(&mut alice).await.unwrap();
    alice.set("name", "Alice").unwrap();
    f.people.update(&mut alice).await.unwrap();

    assert!(entries_with(&f.storage, AuditAction::Update).is_empty());
    assert_eq!(f.storage.len(), 1);
}

#[tokio::test]
async fn excluded_columns_never_reach_entries() {
    let f = fixture();
    let mut alice = f.people.build([("name", json!("Alice"))]).unwrap();
    f.people.create(&mut alice).await.unwrap();

    alice.set("password_digest", "x1").unwrap();
    alice.set("lock_version", 2).unwrap();
    alice.set("updated_at", "2026-01-01T00:00:00Z").unwrap();
    alice.set("type", "Admin").unwrap();
    assert!(!alice.changed());
    f.people.save(&mut alice).await.unwrap();

    assert!(entries_with(&f.storage, AuditAction::Update).is_empty());
    let stored = f
        .records
        .fetch("Person", alice.id().unwrap())
        .await
        .unwrap()
        .expect("row exists");
    assert_eq!(stored["password_digest"], json!("x1"));
}

#[tokio::test]
async fn last_write_wins_within_one_save() {
    let f = fixture();
    let mut alice = f.people.build([("name", json!("Alice"))]).unwrap();
    f.people.create(&mut alice).await.unwrap();

    alice.set("name", "Bob").unwrap();
    alice.set("name", "Carol").unwrap();
    alice.set("email", "a@example.com").unwrap();
    alice.set("email", Value::Null).unwrap();
    f.people.save(&mut alice).await.unwrap();

    let updates = entries_with(&f.storage, AuditAction::Update);
    assert_eq!(updates.len(), 1);
    assert_eq!(changes_of(&updates[0]), json!({"name": ["Alice", "Carol"]}));
}

#[tokio::test]
async fn found_records_start_clean() {
    let f = fixture();
    let mut alice = f.people.build([("name", json!("Alice"))]).unwrap();
    f.people.create(&mut alice).await.unwrap();

    let mut loaded = f.people.find(alice.id().unwrap()).await.unwrap().unwrap();
    assert!(!loaded.changed());
    assert_eq!(loaded.read_attribute("name"), &json!("Alice"));

    loaded.set("email", "alice@example.com").unwrap();
    f.people.save(&mut loaded).await.unwrap();

    let history = f.people.audits(&loaded).await.unwrap();
    let actions: Vec<AuditAction> = history.iter().map(|e| e.action).collect();
    assert_eq!(actions, vec![AuditAction::Create, AuditAction::Update]);

    assert!(f.people.find("missing").await.unwrap().is_none());
}

// =============================================================================
// DESTROY
// =============================================================================

#[tokio::test]
async fn destroy_writes_entry_and_unlinks_history() {
    let f = fixture();
    let mut alice = f.people.build([("name", json!("Alice"))]).unwrap();
    f.people.create(&mut alice).await.unwrap();
    let id = alice.id().unwrap().to_string();

    f.people.destroy(&mut alice).await.unwrap();

    assert!(alice.is_destroyed());
    assert!(f.records.is_empty("Person"));
    let destroys = entries_with(&f.storage, AuditAction::Destroy);
    assert_eq!(destroys.len(), 1);
    assert_eq!(destroys[0].changes, "{}");
    assert_eq!(destroys[0].auditable_id.as_deref(), Some(id.as_str()));

    let creates = entries_with(&f.storage, AuditAction::Create);
    assert!(creates.iter().all(|e| e.auditable_id.is_none()));

    let history = f
        .storage
        .query(AuditFilter::for_record("Person", id.as_str()))
        .await
        .unwrap();
    let actions: Vec<AuditAction> = history.iter().map(|e| e.action).collect();
    assert_eq!(actions, vec![AuditAction::Destroy]);
}

#[tokio::test]
async fn destroy_entries_identify_their_record() {
    let f = fixture();
    let mut alice = f.people.build([("name", json!("Alice"))]).unwrap();
    let mut bob = f.people.build([("name", json!("Bob"))]).unwrap();
    f.people.create(&mut alice).await.unwrap();
    f.people.create(&mut bob).await.unwrap();
    let ids = vec![
        alice.id().unwrap().to_string(),
        bob.id().unwrap().to_string(),
    ];

    f.people.destroy(&mut alice).await.unwrap();
    f.people.destroy(&mut bob).await.unwrap();

    let destroyed: Vec<String> = entries_with(&f.storage, AuditAction::Destroy)
        .into_iter()
        .filter_map(|e| e.auditable_id)
        .collect();
    assert_eq!(destroyed, ids);
}

#[tokio::test]
async fn destroy_captures_unsaved_changes() {
    let f = fixture_with(
        AuditableOptions::default()
            .exclude(["password_digest"])
            .keep_links_on_destroy(),
    );
    let mut alice = f.people.build([("name", json!("Alice"))]).unwrap();
    f.people.create(&mut alice).await.unwrap();

    alice.set("name", "Zed").unwrap();
    f.people.destroy(&mut alice).await.unwrap();

    let destroys = entries_with(&f.storage, AuditAction::Destroy);
    assert_eq!(destroys.len(), 1);
    assert_eq!(changes_of(&destroys[0]), json!({"name": ["Alice", "Zed"]}));
    assert_eq!(destroys[0].auditable_id.as_deref(), alice.id());
    assert_eq!(f.people.audits(&alice).await.unwrap().len(), 2);
}

#[tokio::test]
async fn destroying_twice_is_rejected() {
    let f = fixture();
    let mut alice = f.people.build([("name", json!("Alice"))]).unwrap();
    f.people.create(&mut alice).await.unwrap();
    f.people.destroy(&mut alice).await.unwrap();

    let err = f.people.destroy(&mut alice).await.unwrap_err();
    assert!(matches!(err, AuditError::NotPersisted(_)));
    assert_eq!(entries_with(&f.storage, AuditAction::Destroy).len(), 1);
}

// =============================================================================
// USER RESOLUTION
// =============================================================================

#[tokio::test]
async fn missing_actor_leaves_user_null() {
    let f = fixture();
    let mut alice = f.people.build([("name", json!("Alice"))]).unwrap();
    f.people.create(&mut alice).await.unwrap();
    assert_eq!(f.storage.entries()[0].user_id, None);
}

#[tokio::test]
async fn disabled_resolution_ignores_actor() {
    let f = fixture_with(AuditableOptions::default().without_user());
    f.current_user.set("7");
    let mut alice = f.people.build([("name", json!("Alice"))]).unwrap();
    f.people.create(&mut alice).await.unwrap();
    assert_eq!(f.storage.entries()[0].user_id, None);
}

// =============================================================================
// SUSPENSION
// =============================================================================

#[tokio::test]
async fn suspended_scope_writes_nothing_and_then_resumes() {
    let f = fixture();
    let mut alice = f.people.build([("name", json!("Alice"))]).unwrap();

    f.people
        .without_auditing(async {
            f.people.create(&mut alice).await?;
            alice.set("name", "Bob")?;
            f.people.save(&mut alice).await?;
            assert!(!alice.changed());

            let mut bob = f.people.build([("name", json!("Bob"))])?;
            f.people.create(&mut bob).await?;
            f.people.destroy(&mut bob).await?;
            Ok::<_, AuditError>(())
        })
        .await
        .unwrap();

    assert!(f.storage.is_empty());
    assert_eq!(f.records.len("Person"), 1);

    alice.set("name", "Carol").unwrap();
    f.people.save(&mut alice).await.unwrap();
    let updates = entries_with(&f.storage, AuditAction::Update);
    assert_eq!(updates.len(), 1);
    assert_eq!(changes_of(&updates[0]), json!({"name": ["Bob", "Carol"]}));
}

#[tokio::test]
async fn scope_is_restored_after_error() {
    let f = fixture();
    let result: Result<(), AuditError> = f
        .people
        .without_auditing(async {
            let mut ghost = f.people.build([("name", json!("Ghost"))])?;
            f.people.create(&mut ghost).await?;
            ghost.set("nickname", "boo")?;
            Ok(())
        })
        .await;
    assert!(matches!(result, Err(AuditError::UnknownAttribute { .. })));

    let mut alice = f.people.build([("name", json!("Alice"))]).unwrap();
    f.people.create(&mut alice).await.unwrap();
    assert_eq!(f.storage.len(), 1);
}

#[tokio::test]
async fn explicit_mode_suspends_one_operation() {
    let f = fixture();
    let mut alice = f.people.build([("name", json!("Alice"))]).unwrap();
    f.people
        .create_with(&mut alice, AuditMode::Suspended)
        .await
        .unwrap();
    assert!(f.storage.is_empty());
    assert!(!alice.changed());

    alice.set("name", "Bob").unwrap();
    f.people.update(&mut alice).await.unwrap();
    assert_eq!(f.storage.len(), 1);
}

#[tokio::test]
async fn instance_scope_suspends_the_whole_model() {
    let f = fixture();
    let mut alice = f.people.build([("name", json!("Alice"))]).unwrap();
    f.people.create(&mut alice).await.unwrap();

    let people = &f.people;
    alice
        .without_auditing(|record| {
            Box::pin(async move {
                record.set("name", "Bob")?;
                people.save(record).await?;

                let mut other = people.build([("name", json!("Other"))])?;
                people.create(&mut other).await
            })
        })
        .await
        .unwrap();

    assert_eq!(f.storage.len(), 1);
    assert_eq!(alice.read_attribute("name"), &json!("Bob"));
}

#[tokio::test]
async fn concurrent_work_outside_the_scope_keeps_auditing() {
    let f = fixture();
    let mut quiet = f.people.build([("name", json!("Quiet"))]).unwrap();
    let mut loud = f.people.build([("name", json!("Loud"))]).unwrap();

    let suspended = f.people.without_auditing(async {
        tokio::task::yield_now().await;
        f.people.create(&mut quiet).await
    });
    let audited = async {
        tokio::task::yield_now().await;
        f.people.create(&mut loud).await
    };
    let (a, b) = tokio::join!(suspended, audited);
    a.unwrap();
    b.unwrap();

    let creates = entries_with(&f.storage, AuditAction::Create);
    assert_eq!(creates.len(), 1);
    assert_eq!(creates[0].auditable_id.as_deref(), loud.id());
}

#[tokio::test]
async fn spawned_tasks_are_not_suspended() {
    let f = fixture();
    let people = Arc::new(f.people);

    let spawned = {
        let people = Arc::clone(&people);
        people
            .clone()
            .without_auditing(async move {
                tokio::spawn(async move {
                    let mut record = people.build([("name", json!("Spawned"))])?;
                    people.create(&mut record).await
                })
                .await
                .expect("task joins")
            })
            .await
    };
    spawned.unwrap();

    assert_eq!(entries_with(&f.storage, AuditAction::Create).len(), 1);
}

// =============================================================================
// FAILURES
// =============================================================================

struct FailingStorage;

#[async_trait]
impl AuditStorage for FailingStorage {
    async fn store(&self, _entry: AuditEntry) -> Result<(), AuditError> {
        Err(AuditError::StorageError("disk full".to_string()))
    }

    async fn query(&self, _filter: AuditFilter) -> Result<Vec<AuditEntry>, AuditError> {
        Ok(vec![])
    }

    async fn count(&self, _filter: AuditFilter) -> Result<usize, AuditError> {
        Ok(0)
    }

    async fn get(&self, _entry_id: Uuid) -> Result<Option<AuditEntry>, AuditError> {
        Ok(None)
    }

    async fn nullify(&self, _type: &str, _id: &str) -> Result<usize, AuditError> {
        Ok(0)
    }
}

#[tokio::test]
async fn failed_audit_write_propagates_and_keeps_changes() {
    let logger = AuditLogger::with_storage(AuditConfig::default(), Arc::new(FailingStorage));
    let auditor = Auditor::new(Arc::new(MemoryRecordStore::new()), Arc::new(logger));
    let people = auditor
        .register(person_definition(), &AuditableOptions::default().without_user())
        .unwrap();

    let mut alice = people.build([("name", json!("Alice"))]).unwrap();
    let err = people.create(&mut alice).await.unwrap_err();
    assert!(matches!(err, AuditError::StorageError(_)));
    assert!(alice.changed());
}

/// Fails the first write, then stores in memory.
struct FlakyStorage {
    failed: std::sync::atomic::AtomicBool,
    inner: MemoryStorage,
}

#[async_trait]
impl AuditStorage for FlakyStorage {
    async fn store(&self, entry: AuditEntry) -> Result<(), AuditError> {
        if !self.failed.swap(true, std::sync::atomic::Ordering::SeqCst) {
            return Err(AuditError::StorageError("connection reset".to_string()));
        }
        self.inner.store(entry).await
    }

    async fn query(&self, filter: AuditFilter) -> Result<Vec<AuditEntry>, AuditError> {
        self.inner.query(filter).await
    }

    async fn count(&self, filter: AuditFilter) -> Result<usize, AuditError> {
        self.inner.count(filter).await
    }

    async fn get(&self, entry_id: Uuid) -> Result<Option<AuditEntry>, AuditError> {
        self.inner.get(entry_id).await
    }

    async fn nullify(&self, auditable_type: &str, auditable_id: &str) -> Result<usize, AuditError> {
        self.inner.nullify(auditable_type, auditable_id).await
    }
}

#[tokio::test]
async fn retry_after_failed_create_entry_logs_update() {
    let storage = Arc::new(FlakyStorage {
        failed: std::sync::atomic::AtomicBool::new(false),
        inner: MemoryStorage::new(),
    });
    let records = Arc::new(MemoryRecordStore::new());
    let logger = AuditLogger::with_storage(AuditConfig::default(), storage.clone());
    let auditor = Auditor::new(records.clone(), Arc::new(logger));
    let people = auditor
        .register(person_definition(), &AuditableOptions::default().without_user())
        .unwrap();

    let mut alice = people.build([("name", json!("Alice"))]).unwrap();
    assert!(people.create(&mut alice).await.is_err());
    assert!(alice.is_persisted());
    assert!(alice.changed());
    assert_eq!(records.len("Person"), 1);

    people.save(&mut alice).await.unwrap();
    assert!(!alice.changed());
    assert_eq!(records.len("Person"), 1);

    let entries = storage.inner.entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].action, AuditAction::Update);
    assert_eq!(
        changes_of(&entries[0]),
        json!({"name": [null, "Alice"], "status": [null, "active"]})
    );
}

#[tokio::test]
async fn record_of_another_model_is_rejected() {
    let f = fixture();
    let (logger, _) = AuditLogger::in_memory();
    let auditor = Auditor::new(f.records.clone(), Arc::new(logger));
    let invoices = auditor
        .register(
            ModelDefinition::new("Invoice", ["id", "total"]),
            &AuditableOptions::default().without_user(),
        )
        .unwrap();

    let mut invoice = invoices.build([("total", json!(10))]).unwrap();
    let err = f.people.create(&mut invoice).await.unwrap_err();
    assert!(matches!(err, AuditError::ModelMismatch { .. }));
}
