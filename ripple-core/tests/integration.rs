//! Integration Tests for Change Observation
//!
//! These tests drive the public API end to end: a schema loaded from JSON,
//! an in-memory store, the accumulators, the dispatcher and the differ.

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;
use proptest::prelude::*;

use ripple_core::detect::{ChangeDetector, DetailedChangeDetector, PotentialChangeDetector};
use ripple_core::diff::{self, EditScript, ListSnapshot, MoveMode, OrderedState};
use ripple_core::dispatch::{ChangeConsumer, Notification, NotificationDispatcher};
use ripple_core::model::{Attribute, ChangeRecord, EntityKind, EntityRef, KeySet, Value};
use ripple_core::schema::DependencyKeyStore;
use ripple_core::store::{MemoryStore, ObjectStore};

const SCHEMA: &str = r#"[
    {
        "kind": "User",
        "attributes": ["name", "accentColor", "lastSeen"],
        "relationships": [
            {"name": "conversations", "target": "Conversation", "cardinality": "to_many"}
        ],
        "observable": [
            {"key": "name"},
            {"key": "accentColor"},
            {"key": "displayName", "affected_by": ["name"]}
        ],
        "propagations": [
            {"via": "conversations", "as_path": "participants", "on_insert_or_delete": "participants"}
        ]
    },
    {
        "kind": "Conversation",
        "attributes": ["userDefinedName", "lastModified"],
        "relationships": [
            {"name": "participants", "target": "User", "cardinality": "to_many"}
        ],
        "observable": [
            {"key": "participants"},
            {"key": "lastModified"},
            {"key": "displayName", "affected_by": ["userDefinedName", "participants.name"]}
        ]
    }
]"#;

fn key_store() -> Arc<DependencyKeyStore> {
    init_tracing();
    Arc::new(DependencyKeyStore::from_json(SCHEMA).unwrap())
}

/// Route the crate's logs to the test output. Set `RUST_LOG=ripple_core=trace`
/// to see them.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Two users sharing one conversation, saved.
fn chat(store: &mut MemoryStore) -> (Vec<EntityRef>, EntityRef) {
    let users: Vec<_> = (0..2).map(|_| store.insert("User")).collect();
    let conversation = store.insert("Conversation");
    for user in &users {
        store.relate(user, "conversations", [conversation.clone()]);
    }
    store.relate(&conversation, "participants", users.clone());
    store.save();
    store.take_batch();
    (users, conversation)
}

// ============================================================================
// Change detection
// ============================================================================

/// A user renaming themselves changes the conversation's display name and
/// nothing else on it, although no field of the conversation was written.
#[test]
fn user_rename_reaches_conversation_display_name() {
    let mut store = MemoryStore::new();
    let (users, conversation) = chat(&mut store);
    let mut detector = DetailedChangeDetector::new(key_store());

    store.set(&users[0], "name", "Bruno");
    detector.detect_changes(&store.take_batch(), &store);

    let changes = detector.consume();
    assert_eq!(
        changes.get(&conversation).unwrap().keys(),
        &KeySet::from([Attribute::new("displayName")])
    );
    assert!(!changes.contains(&users[1]));
}

/// Objects whose pending changes are unreliable are diffed against the
/// snapshot taken when they were first seen.
#[test]
fn faulted_objects_use_snapshots() {
    let mut store = MemoryStore::new();
    let mut detector = DetailedChangeDetector::new(key_store());

    let user = store.insert("User");
    store.set(&user, "accentColor", 1_i64);
    detector.detect_changes(&store.take_batch(), &store);
    store.save();

    store.set(&user, "accentColor", 2_i64);
    store.fault(&user);
    detector.detect_changes(&store.take_batch(), &store);

    let changes = detector.consume();
    assert!(changes.get(&user).unwrap().contains("accentColor"));
}

/// Removing a participant is reported on the conversation via the
/// insert/delete propagation of the deleted user.
#[test]
fn deleting_a_participant_updates_conversation() {
    let mut store = MemoryStore::new();
    let (users, conversation) = chat(&mut store);
    let mut detector = DetailedChangeDetector::new(key_store());

    store.delete(&users[1]);
    detector.detect_changes(&store.take_batch(), &store);

    assert!(detector
        .consume()
        .get(&conversation)
        .unwrap()
        .contains("participants"));
}

// ============================================================================
// Dispatcher
// ============================================================================

#[derive(Default)]
struct ConversationWatcher {
    display_names: Mutex<Vec<EntityRef>>,
}

impl ChangeConsumer for ConversationWatcher {
    fn objects_did_change(&self, notification: &Notification) {
        let Some(changes) = notification.detailed(&EntityKind::new("Conversation")) else {
            return;
        };
        let mut names = self.display_names.lock();
        for (conversation, change) in changes.iter() {
            if change.contains("displayName") {
                names.push(conversation.clone());
            }
        }
    }
}

#[test]
fn dispatcher_delivers_on_fire() {
    let dispatcher = NotificationDispatcher::new(key_store());
    let watcher = Arc::new(ConversationWatcher::default());
    dispatcher.register(&watcher);

    let mut store = MemoryStore::new();
    let (users, conversation) = chat(&mut store);

    store.set(&users[0], "name", "Anna");
    dispatcher.objects_did_change(&store.take_batch(), &store);
    store.set(&users[1], "name", "Bea");
    dispatcher.objects_did_change(&store.take_batch(), &store);
    assert!(watcher.display_names.lock().is_empty());

    dispatcher.fire();
    assert_eq!(*watcher.display_names.lock(), [conversation]);
}

// ============================================================================
// Differ
// ============================================================================

fn conversation_list(store: &MemoryStore, conversations: &[EntityRef]) -> Vec<EntityRef> {
    let mut list: Vec<_> = conversations
        .iter()
        .filter(|c| store.contains(c))
        .cloned()
        .collect();
    let last_modified = Attribute::new("lastModified");
    list.sort_by_key(|c| match store.value(c, &last_modified) {
        Value::Int(t) => -t,
        _ => 0,
    });
    list
}

/// A conversation list sorted by last modification, kept in sync through
/// detected changes and edit scripts.
#[test]
fn conversation_list_follows_changes() {
    let key_store = key_store();
    let mut store = MemoryStore::new();
    let mut detector = DetailedChangeDetector::new(Arc::clone(&key_store));

    let conversations: Vec<_> = (0..4)
        .map(|i| {
            let c = store.insert("Conversation");
            store.set(&c, "lastModified", i as i64);
            c
        })
        .collect();
    detector.detect_changes(&store.take_batch(), &store);
    store.save();
    let before = conversation_list(&store, &conversations);

    store.set(&conversations[0], "lastModified", 10_i64);
    store.set(&conversations[2], "userDefinedName", "Team");
    store.delete(&conversations[3]);
    detector.detect_changes(&store.take_batch(), &store);

    let changes = detector.take_changes();
    let updated: HashSet<_> = changes
        .iter()
        .filter(|(_, change)| change.contains("displayName"))
        .map(|(object, _)| object.clone())
        .collect();
    let after = conversation_list(&store, &conversations);

    for mode in [MoveMode::FromStart, MoveMode::FromIntermediate] {
        let script = diff::calculate(&before, &after, &updated, mode).unwrap();
        assert_eq!(script.deleted().len(), 1);
        assert_eq!(script.updated().len(), 1);
        assert_eq!(script.apply(&before, &after).unwrap(), after);
    }
}

/// A list snapshot remembers the last ordering and reports only refreshes
/// that change something for the list.
#[test]
fn conversation_list_snapshot_tracks_refreshes() {
    let mut store = MemoryStore::new();
    let mut detector = DetailedChangeDetector::new(key_store());

    let conversations: Vec<_> = (0..4)
        .map(|i| {
            let c = store.insert("Conversation");
            store.set(&c, "lastModified", i as i64);
            c
        })
        .collect();
    detector.detect_changes(&store.take_batch(), &store);
    store.save();
    detector.take_changes();

    let initial = OrderedState::new(conversation_list(&store, &conversations)).unwrap();
    let mut snapshot = ListSnapshot::new(initial, MoveMode::FromStart);
    let before: Vec<_> = snapshot.state().iter().cloned().collect();

    store.set(&conversations[0], "lastModified", 10_i64);
    store.set(&conversations[2], "userDefinedName", "Team");
    store.delete(&conversations[3]);
    detector.detect_changes(&store.take_batch(), &store);
    store.save();

    let after = conversation_list(&store, &conversations);
    let changes = detector.take_changes();
    let script = snapshot
        .update(OrderedState::new(after.clone()).unwrap(), &changes)
        .unwrap();
    assert_eq!(script.deleted().iter().copied().collect::<Vec<_>>(), [0]);
    assert_eq!(script.updated().iter().copied().collect::<Vec<_>>(), [1, 3]);
    assert_eq!(script.apply(&before, &after).unwrap(), after);
    assert_eq!(snapshot.state().iter().cloned().collect::<Vec<_>>(), after);

    let unchanged = OrderedState::new(conversation_list(&store, &conversations)).unwrap();
    assert_eq!(snapshot.update(unchanged, &ChangeRecord::new()), None);
}

#[test]
fn move_mode_comes_from_configuration() {
    let mode: MoveMode = "table-view".parse().unwrap();
    assert_eq!(mode, MoveMode::FromIntermediate);
    assert!("list".parse::<MoveMode>().is_err());
}

// ============================================================================
// Properties
// ============================================================================

fn sequence() -> impl Strategy<Value = Vec<u8>> {
    proptest::sample::subsequence((0u8..12).collect::<Vec<_>>(), 0..=12).prop_shuffle()
}

fn move_mode() -> impl Strategy<Value = MoveMode> {
    prop_oneof![Just(MoveMode::FromStart), Just(MoveMode::FromIntermediate)]
}

fn check_totality(before: &[u8], after: &[u8], updated: &HashSet<u8>, script: &EditScript) {
    for (index, item) in before.iter().enumerate() {
        let survives = after.contains(item);
        assert_eq!(script.deleted().contains(&index), !survives);
        assert_eq!(
            script.updated().contains(&index),
            survives && updated.contains(item)
        );
    }
    for (index, item) in after.iter().enumerate() {
        assert_eq!(script.inserted().contains(&index), !before.contains(item));
    }

    let targets: HashSet<_> = script.moves().iter().map(|m| m.to).collect();
    assert_eq!(targets.len(), script.moves().len());

    if script.mode() == MoveMode::FromStart {
        let sources: HashSet<_> = script.moves().iter().map(|m| m.from).collect();
        assert_eq!(sources.len(), script.moves().len());
        assert!(sources.iter().all(|from| !script.deleted().contains(from)));
    }
}

#[derive(Debug, Clone)]
enum Write {
    Name(usize, i64),
    Accent(usize, i64),
    LastSeen(usize, i64),
    Topic(i64),
}

fn write() -> impl Strategy<Value = Write> {
    prop_oneof![
        (0..2usize, any::<i64>()).prop_map(|(u, v)| Write::Name(u, v)),
        (0..2usize, any::<i64>()).prop_map(|(u, v)| Write::Accent(u, v)),
        (0..2usize, any::<i64>()).prop_map(|(u, v)| Write::LastSeen(u, v)),
        any::<i64>().prop_map(Write::Topic),
    ]
}

fn apply_writes(
    store: &mut MemoryStore,
    users: &[EntityRef],
    conversation: &EntityRef,
    writes: &[Write],
) {
    for w in writes {
        match *w {
            Write::Name(u, v) => store.set(&users[u], "name", v),
            Write::Accent(u, v) => store.set(&users[u], "accentColor", v),
            Write::LastSeen(u, v) => store.set(&users[u], "lastSeen", Value::Timestamp(v)),
            Write::Topic(v) => store.set(conversation, "userDefinedName", v),
        }
    }
}

proptest! {
    #[test]
    fn differ_round_trips(
        before in sequence(),
        after in sequence(),
        updated in proptest::collection::hash_set(0u8..12, 0..6),
        mode in move_mode(),
    ) {
        let script = diff::calculate(&before, &after, &updated, mode).unwrap();
        prop_assert_eq!(script.apply(&before, &after).unwrap(), after.clone());
        check_totality(&before, &after, &updated, &script);
    }

    #[test]
    fn unchanged_collections_produce_no_script(before in sequence(), mode in move_mode()) {
        let script = diff::calculate(&before, &before, &HashSet::new(), mode).unwrap();
        prop_assert!(script.is_empty());
    }

    #[test]
    fn detailed_accumulation_is_a_union(
        first in proptest::collection::vec(write(), 0..6),
        second in proptest::collection::vec(write(), 0..6),
    ) {
        let key_store = key_store();
        let mut store = MemoryStore::new();
        let (users, conversation) = chat(&mut store);

        let mut both = DetailedChangeDetector::new(Arc::clone(&key_store));
        let mut only_first = DetailedChangeDetector::new(Arc::clone(&key_store));
        let mut only_second = DetailedChangeDetector::new(Arc::clone(&key_store));

        apply_writes(&mut store, &users, &conversation, &first);
        let batch = store.take_batch();
        both.detect_changes(&batch, &store);
        only_first.detect_changes(&batch, &store);
        store.save();

        apply_writes(&mut store, &users, &conversation, &second);
        let batch = store.take_batch();
        both.detect_changes(&batch, &store);
        only_second.detect_changes(&batch, &store);

        let mut expected: ChangeRecord = only_first.consume();
        expected.merge_record(only_second.consume());
        prop_assert_eq!(both.consume(), expected);
    }

    #[test]
    fn potential_accumulation_is_a_union(
        first in proptest::collection::vec(write(), 0..6),
        second in proptest::collection::vec(write(), 0..6),
    ) {
        let mut store = MemoryStore::new();
        let (users, conversation) = chat(&mut store);
        let mut both = PotentialChangeDetector::new();
        let mut only_first = PotentialChangeDetector::new();
        let mut only_second = PotentialChangeDetector::new();

        apply_writes(&mut store, &users, &conversation, &first);
        let batch = store.take_batch();
        both.detect_changes(&batch, &store);
        only_first.detect_changes(&batch, &store);

        apply_writes(&mut store, &users, &conversation, &second);
        let batch = store.take_batch();
        both.detect_changes(&batch, &store);
        only_second.detect_changes(&batch, &store);

        let mut expected = only_first.consume();
        for (object, flags) in only_second.consume() {
            *expected.entry(object).or_default() |= flags;
        }
        let actual = both.consume();
        prop_assert_eq!(actual.len(), expected.len());
        for (object, flags) in &expected {
            prop_assert_eq!(actual.get(object), Some(flags));
        }
    }
}
