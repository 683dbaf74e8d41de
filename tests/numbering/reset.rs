use receipt_numbering::{Counters, InMemoryDocumentStore, Numbering, ScopeKey};

use crate::support::{config, instant, quick_retry, receipt_of, seed, FaultyStore};

#[test]
fn reset_clears_pure_counter_drift() {
    let numbering = Numbering::new(InMemoryDocumentStore::new(), config());
    let scope = ScopeKey::new("owner-1", 2025);
    Counters::new(numbering.store(), &quick_retry()).set(&scope, 50).unwrap();

    let result = numbering.reset(&scope);
    assert!(result.success, "{}", result.message);

    let next = numbering.allocate_in(&scope).unwrap();
    assert_eq!(next.number.seq(), 1);
}

#[test]
fn reset_runs_even_when_the_counter_looks_right() {
    let numbering = Numbering::new(InMemoryDocumentStore::new(), config());
    let scope = ScopeKey::new("owner-1", 2025);
    let ids = seed(
        numbering.store(),
        "owner-1",
        instant(2025, 1, 1),
        &[Some("REC 002-2025"), Some("REC 001-2025")],
    );
    Counters::new(numbering.store(), &quick_retry()).set(&scope, 2).unwrap();

    let result = numbering.reset(&scope);

    assert!(result.success);
    let repair = result.repair.expect("reset always repairs");
    assert_eq!((repair.fixed, repair.total), (2, 2));
    assert_eq!(receipt_of(numbering.store(), &ids[0]).as_deref(), Some("REC 001-2025"));
    assert_eq!(receipt_of(numbering.store(), &ids[1]).as_deref(), Some("REC 002-2025"));
    assert_eq!(numbering.allocate_in(&scope).unwrap().number.seq(), 3);
}

#[test]
fn reset_stops_before_repair_when_the_counter_cannot_be_zeroed() {
    let store = FaultyStore::new();
    let ids = seed(&store, "owner-1", instant(2025, 1, 1), &[Some("REC 009-2025")]);
    store.take_counters_offline();
    let numbering = Numbering::new(store, config());

    let result = numbering.reset(&ScopeKey::new("owner-1", 2025));

    assert!(!result.success);
    assert!(result.repair.is_none());
    assert!(result.message.contains("owner-1/2025"), "{}", result.message);
    assert_eq!(receipt_of(numbering.store(), &ids[0]).as_deref(), Some("REC 009-2025"));
}

#[test]
fn partial_repair_is_reported_as_failure() {
    let store = FaultyStore::new();
    let ids = seed(
        &store,
        "owner-1",
        instant(2025, 1, 1),
        &[Some("REC 001-2025"), Some("REC 001-2025")],
    );
    store.fail_writes_to(&ids[0]);
    let numbering = Numbering::new(store, config());

    let result = numbering.reset(&ScopeKey::new("owner-1", 2025));

    assert!(!result.success);
    assert!(result.message.contains("1 errors"), "{}", result.message);
    assert_eq!(result.repair.unwrap().fixed, 1);
}
