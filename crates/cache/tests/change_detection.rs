//! Integration tests for the change-detection cache
//!
//! - Idempotence of evaluate/commit
//! - Diff minimality over arbitrary attribute subsets
//! - Concurrent producers on distinct names
//! - Atomic reconcile on a contended name

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

use proptest::prelude::*;
use scenecast_cache::ChangeCache;
use scenecast_core::{Category, Descriptor, Value, Vector};

// ============================================================================
// Helper Functions
// ============================================================================

fn mesh(name: &str, values: &[i32]) -> Descriptor {
    let mut d = Descriptor::new(name, "GeomStaticMesh", Category::Geometry);
    for (i, v) in values.iter().enumerate() {
        d.set(format!("attr_{i}"), *v, None);
    }
    d
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #[test]
    fn prop_idempotent(values in proptest::collection::vec(any::<i32>(), 0..16)) {
        let cache = ChangeCache::new();
        let d = mesh("m", &values);
        let eval = cache.evaluate(&d);
        prop_assert!(eval.is_new);
        cache.commit(&d);

        let again = cache.evaluate(&mesh("m", &values));
        prop_assert!(!again.is_different);
        prop_assert!(again.delta.is_empty());
    }

    #[test]
    fn prop_delta_is_exactly_the_changed_set(
        values in proptest::collection::vec(any::<i32>(), 1..16),
        flips in proptest::collection::vec(any::<bool>(), 16),
    ) {
        let cache = ChangeCache::new();
        cache.commit(&mesh("m", &values));

        let mut changed_values = values.clone();
        let mut expected = BTreeSet::new();
        for (i, v) in changed_values.iter_mut().enumerate() {
            if flips[i] {
                *v = v.wrapping_add(1);
                expected.insert(format!("attr_{i}"));
            }
        }
        let changed = mesh("m", &changed_values);
        let eval = cache.evaluate(&changed);
        let got: BTreeSet<String> = eval.delta.names().map(str::to_string).collect();
        prop_assert_eq!(got, expected.clone());
        prop_assert_eq!(eval.is_different, !expected.is_empty());

        cache.commit(&changed);
        prop_assert!(!cache.evaluate(&changed).needs_export());
    }
}

// ============================================================================
// Array payloads
// ============================================================================

#[test]
fn test_reordered_array_is_a_change() {
    let cache = ChangeCache::new();
    let a = Descriptor::new("m", "GeomStaticMesh", Category::Geometry).with(
        "vertices",
        vec![Vector::new(0.0, 0.0, 0.0), Vector::new(1.0, 0.0, 0.0)],
    );
    let b = Descriptor::new("m", "GeomStaticMesh", Category::Geometry).with(
        "vertices",
        vec![Vector::new(1.0, 0.0, 0.0), Vector::new(0.0, 0.0, 0.0)],
    );
    cache.commit(&a);
    let eval = cache.evaluate(&b);
    assert!(eval.is_different);
    assert!(eval.delta.contains("vertices"));
}

#[test]
fn test_delta_shares_array_payload() {
    let cache = ChangeCache::new();
    let payload: Arc<[f32]> = vec![1.0; 4096].into();
    let d = Descriptor::new("m", "GeomStaticMesh", Category::Geometry)
        .with("weights", Value::FloatList(Arc::clone(&payload)));
    let eval = cache.evaluate(&d);
    match eval.delta.value("weights") {
        Some(Value::FloatList(shared)) => assert!(Arc::ptr_eq(shared, &payload)),
        other => panic!("unexpected delta value: {other:?}"),
    }
}

// ============================================================================
// Concurrency
// ============================================================================

#[test]
fn test_concurrent_producers_distinct_names() {
    let cache = Arc::new(ChangeCache::new());
    let barrier = Arc::new(Barrier::new(8));

    let handles: Vec<_> = (0..8)
        .map(|t| {
            let cache = Arc::clone(&cache);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                for i in 0..200 {
                    let d = mesh(&format!("entity_{t}_{i}"), &[i, t]);
                    let eval = cache.evaluate(&d);
                    assert!(eval.is_new);
                    cache.commit(&d);
                    assert!(!cache.evaluate(&d).needs_export());
                }
            })
        })
        .collect();

    for h in handles {
        h.join().unwrap();
    }
    assert_eq!(cache.len(), 1600);
}

#[test]
fn test_reconcile_same_name_exports_once() {
    let cache = Arc::new(ChangeCache::new());
    let exported = Arc::new(AtomicUsize::new(0));
    let barrier = Arc::new(Barrier::new(8));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let cache = Arc::clone(&cache);
            let exported = Arc::clone(&exported);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                if cache.reconcile(&mesh("shared", &[1, 2, 3])).needs_export() {
                    exported.fetch_add(1, Ordering::SeqCst);
                }
            })
        })
        .collect();

    for h in handles {
        h.join().unwrap();
    }
    assert_eq!(exported.load(Ordering::SeqCst), 1);
}
