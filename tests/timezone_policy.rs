//! Fixed-Timezone Policy Tests
//!
//! Under a fixed-timezone policy:
//! - naive timestamps are accepted and come back with the policy zone
//! - timestamps tagged with another zone are rejected before any write
//! - engines that drop zones lose nothing

use std::sync::Arc;

use chrono::NaiveDate;
use chrono_tz::{America, UTC};
use flatstore::schema::{FieldDescriptor, FieldType, LinkOptions, LinkedSchema, SchemaRegistry, StructuredSchema};
use flatstore::storage::{create_tables, MemoryEngine, SqliteEngine, StorageEngine};
use flatstore::store::KeyedStore;
use flatstore::value::{Record, Timestamp, Value};
use flatstore::{CodecError, ErrorKind, StoreError};

// =============================================================================
// Helper Functions
// =============================================================================

fn stamped() -> StructuredSchema {
    StructuredSchema::builder("Stamped")
        .field(FieldDescriptor::new("id", FieldType::Int).as_primary_key())
        .field(FieldDescriptor::new("at", FieldType::Timestamp))
        .field(FieldDescriptor::new("seen", FieldType::optional(FieldType::Timestamp)).with_default(Value::Null))
        .build()
        .unwrap()
}

fn link(timezone: &str) -> (SchemaRegistry, Arc<LinkedSchema>) {
    let mut registry = SchemaRegistry::new();
    let linked = registry
        .link(stamped(), LinkOptions::new().fixed_timezone(timezone))
        .unwrap();
    (registry, linked)
}

fn wall_clock() -> chrono::NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 7, 4).unwrap().and_hms_opt(18, 15, 30).unwrap()
}

fn record(id: i64, at: Timestamp) -> Record {
    stamped().record([("id", Value::Int(id)), ("at", Value::Timestamp(at))]).unwrap()
}

fn event() -> StructuredSchema {
    StructuredSchema::builder("Event")
        .field(FieldDescriptor::new("at", FieldType::Timestamp).as_primary_key())
        .field(FieldDescriptor::new("desc", FieldType::Str))
        .build()
        .unwrap()
}

fn engines() -> Vec<Arc<dyn StorageEngine>> {
    vec![
        Arc::new(MemoryEngine::new()) as Arc<dyn StorageEngine>,
        Arc::new(SqliteEngine::open_in_memory().unwrap()) as Arc<dyn StorageEngine>,
    ]
}

fn store_on(engine: Arc<dyn StorageEngine>, registry: &SchemaRegistry) -> KeyedStore {
    store_on_named(engine, registry, "Stamped")
}

fn store_on_named(engine: Arc<dyn StorageEngine>, registry: &SchemaRegistry, name: &str) -> KeyedStore {
    create_tables(engine.as_ref(), registry).unwrap();
    KeyedStore::new(engine, registry, name).unwrap()
}

// =============================================================================
// Codec Tests
// =============================================================================

#[test]
fn test_naive_timestamp_gains_policy_zone() {
    let (_registry, linked) = link("UTC");

    let row = linked.flatten(&record(1, Timestamp::naive(wall_clock()))).unwrap();
    let restored = linked.rehydrate(&row).unwrap();

    assert_eq!(restored.get("at"), Some(&Value::Timestamp(Timestamp::zoned(wall_clock(), UTC))));
    assert_eq!(restored.get("seen"), Some(&Value::Null));
}

#[test]
fn test_matching_zone_roundtrips_unchanged() {
    let (_registry, linked) = link("UTC");
    let original = record(1, Timestamp::zoned(wall_clock(), UTC));

    let row = linked.flatten(&original).unwrap();
    assert_eq!(linked.rehydrate(&row).unwrap(), original);
}

#[test]
fn test_foreign_zone_rejected_at_flatten() {
    let (_registry, linked) = link("UTC");

    let err = linked
        .flatten(&record(2, Timestamp::zoned(wall_clock(), America::Los_Angeles)))
        .unwrap_err();
    assert!(matches!(err, CodecError::TimezoneMismatch { .. }));
    assert_eq!(err.kind(), ErrorKind::Precondition);
}

#[test]
fn test_policy_applies_to_optional_timestamps() {
    let (_registry, linked) = link("America/Los_Angeles");
    let seen = Timestamp::zoned(wall_clock(), UTC);
    let bad = record(3, Timestamp::naive(wall_clock())).with("seen", seen);

    assert!(linked.flatten(&bad).is_err());
}

#[test]
fn test_unknown_timezone_rejected_at_link() {
    let mut registry = SchemaRegistry::new();
    let err = registry
        .link(stamped(), LinkOptions::new().fixed_timezone("Mars/Olympus_Mons"))
        .unwrap_err();
    assert_eq!(err.code(), "FLAT_SCHEMA_INVALID_TIMEZONE");
    assert!(!registry.is_linked("Stamped"));
}

// =============================================================================
// Store Tests
// =============================================================================

#[test]
fn test_sqlite_drops_zone_and_policy_restores_it() {
    let (registry, _linked) = link("UTC");
    let store = store_on(Arc::new(SqliteEngine::open_in_memory().unwrap()), &registry);

    store.add(&record(1, Timestamp::zoned(wall_clock(), UTC))).unwrap();
    store.add(&record(2, Timestamp::naive(wall_clock()))).unwrap();

    for id in [1_i64, 2] {
        let read = store.get_by_key(id).unwrap();
        assert_eq!(read.get("at"), Some(&Value::Timestamp(Timestamp::zoned(wall_clock(), UTC))));
    }
}

#[test]
fn test_store_rejects_foreign_zone_without_writing() {
    let (registry, _linked) = link("UTC");

    for engine in engines() {
        let store = store_on(engine, &registry);
        let good = record(1, Timestamp::naive(wall_clock()));
        let bad = record(2, Timestamp::zoned(wall_clock(), America::Los_Angeles));

        let err = store.add_list(&[good, bad]).unwrap_err();
        assert!(matches!(err, StoreError::Codec(CodecError::TimezoneMismatch { .. })));
        assert!(store.get_all().unwrap().is_empty());
    }
}

#[test]
fn test_without_policy_memory_keeps_zones() {
    let mut registry = SchemaRegistry::new();
    registry.link(stamped(), LinkOptions::new()).unwrap();
    let store = store_on(Arc::new(MemoryEngine::new()), &registry);

    let original = record(1, Timestamp::zoned(wall_clock(), America::Los_Angeles));
    store.add(&original).unwrap();
    assert_eq!(store.get_by_key(1_i64).unwrap(), original);
}

// =============================================================================
// Lookup Tests
// =============================================================================

#[test]
fn test_timestamp_key_lookups_roundtrip() {
    let mut registry = SchemaRegistry::new();
    registry.link(event(), LinkOptions::new().fixed_timezone("UTC")).unwrap();

    for engine in engines() {
        let store = store_on_named(engine, &registry, "Event");
        let naive = event()
            .record([("at", Value::Timestamp(Timestamp::naive(wall_clock()))), ("desc", Value::from("launch"))])
            .unwrap();
        store.add(&naive).unwrap();

        let fetched = store.get_all().unwrap().remove(0);
        let at = fetched.get("at").cloned().unwrap();
        assert_eq!(at, Value::Timestamp(Timestamp::zoned(wall_clock(), UTC)));

        assert_eq!(store.get_by_key(&fetched).unwrap(), fetched);
        assert_eq!(store.get_by_key(Timestamp::naive(wall_clock())).unwrap(), fetched);
        assert_eq!(store.get_by_dict([("at", at.clone())]).unwrap(), vec![fetched.clone()]);
        assert_eq!(store.get_by_dict([("at", Timestamp::naive(wall_clock()))]).unwrap().len(), 1);

        let foreign = Timestamp::zoned(wall_clock(), America::Los_Angeles);
        let err = store.get_by_key(foreign).unwrap_err();
        assert!(matches!(err, StoreError::Codec(CodecError::TimezoneMismatch { .. })));

        assert_eq!(store.delete_record(&fetched).unwrap(), 1);
        assert!(store.get_all().unwrap().is_empty());
    }
}

#[test]
fn test_delete_record_without_key_fields_under_policy() {
    let schema = StructuredSchema::builder("Reading")
        .field(FieldDescriptor::new("at", FieldType::Timestamp))
        .field(FieldDescriptor::new("value", FieldType::Int))
        .build()
        .unwrap();
    let mut registry = SchemaRegistry::new();
    registry.link(schema.clone(), LinkOptions::new().fixed_timezone("UTC")).unwrap();

    for engine in engines() {
        let store = store_on_named(engine, &registry, "Reading");
        let reading = schema
            .record([("at", Value::Timestamp(Timestamp::naive(wall_clock()))), ("value", Value::Int(7))])
            .unwrap();
        store.add(&reading).unwrap();

        let fetched = store.get_all().unwrap().remove(0);
        assert_eq!(store.delete_record(&fetched).unwrap(), 1);
        assert!(store.get_all().unwrap().is_empty());
    }
}
