//! Content-addressed change-detection cache
//!
//! Stores one fingerprint record per entity name and answers, for a freshly
//! built descriptor, whether the entity is new, changed or unchanged, and
//! which attributes changed.
//!
//! # Design
//!
//! - One `parking_lot::Mutex` around an `FxHashMap`: every operation is
//!   serialized, so concurrent `evaluate`/`commit` calls for different names
//!   are safe.
//! - The cache guarantees at most one stored record per name. Two producers
//!   racing on the *same* name through separate `evaluate` + `commit` calls
//!   can interleave; use [`ChangeCache::reconcile`] (evaluate and commit
//!   under one lock acquisition) or [`ChangeCache::commit_if`]
//!   (compare-and-swap on the previously observed hash) to make the
//!   transition atomic.
//! - Names are the only key. Two entities of different categories sharing a
//!   name overwrite each other; name uniqueness is the caller's job.
//!
//! # Memory Ordering
//!
//! The statistics counters use Relaxed ordering; they are observational only.

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use scenecast_core::fingerprint::{attribute_hash, attribute_hashes, descriptor_hash};
use scenecast_core::{Category, Descriptor};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

/// Stored fingerprint record of one committed entity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    /// Entity name (cache key)
    pub name: String,
    /// Category at commit time
    pub category: Category,
    /// Fingerprint of the whole attribute set
    pub whole_hash: u32,
    /// Fingerprint of each attribute
    pub attribute_hashes: FxHashMap<String, u32>,
}

impl CacheEntry {
    fn from_descriptor(descriptor: &Descriptor, whole_hash: u32) -> Self {
        Self {
            name: descriptor.name().to_string(),
            category: descriptor.category(),
            whole_hash,
            attribute_hashes: attribute_hashes(descriptor),
        }
    }
}

/// Result of evaluating a descriptor against the cache
#[derive(Debug, Clone)]
pub struct Evaluation {
    /// The name had no stored record
    pub is_new: bool,
    /// The name had a record and the content differs from it
    pub is_different: bool,
    /// Attributes to emit: everything for new entities, the changed subset
    /// for changed entities, nothing for unchanged ones
    pub delta: Descriptor,
}

impl Evaluation {
    /// Whether the descriptor must be (re)emitted
    pub fn needs_export(&self) -> bool {
        self.is_new || self.is_different
    }

    /// Whether the delta is the complete descriptor
    pub fn is_full(&self, descriptor: &Descriptor) -> bool {
        self.delta.len() == descriptor.len()
    }
}

/// Cache metrics snapshot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of stored records
    pub entries: usize,
    /// Total evaluations (including those done by `reconcile`)
    pub evaluations: u64,
    /// Evaluations that reported a new entity
    pub new_entities: u64,
    /// Evaluations that reported a changed entity
    pub changed: u64,
    /// Evaluations that reported no change
    pub unchanged: u64,
}

/// Lock-protected fingerprint store keyed by entity name
#[derive(Debug, Default)]
pub struct ChangeCache {
    entries: Mutex<FxHashMap<String, CacheEntry>>,
    exhaustive_diff: bool,
    evaluations: AtomicU64,
    new_entities: AtomicU64,
    changed: AtomicU64,
    unchanged: AtomicU64,
}

impl ChangeCache {
    /// Create an empty cache with the attribute-count fast path enabled
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty cache.
    ///
    /// With `exhaustive_diff` set, a changed descriptor whose attribute count
    /// differs from the stored record is still diffed attribute by attribute
    /// instead of being emitted whole.
    pub fn with_exhaustive_diff(exhaustive_diff: bool) -> Self {
        Self {
            exhaustive_diff,
            ..Self::default()
        }
    }

    /// Whether a record exists for `name`
    pub fn contains(&self, name: &str) -> bool {
        self.entries.lock().contains_key(name)
    }

    /// Stored whole-set fingerprint for `name`
    pub fn stored_hash(&self, name: &str) -> Option<u32> {
        self.entries.lock().get(name).map(|e| e.whole_hash)
    }

    /// Number of stored records
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether the cache holds no records
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Compare a descriptor against the stored record without modifying it
    pub fn evaluate(&self, descriptor: &Descriptor) -> Evaluation {
        let whole = descriptor_hash(descriptor);
        let entries = self.entries.lock();
        self.evaluate_locked(&entries, descriptor, whole)
    }

    /// Unconditionally (re)write the record for the descriptor's name from
    /// its full attribute set
    pub fn commit(&self, descriptor: &Descriptor) {
        let entry = CacheEntry::from_descriptor(descriptor, descriptor_hash(descriptor));
        self.entries.lock().insert(entry.name.clone(), entry);
    }

    /// Compare-and-swap commit.
    ///
    /// Writes the record only if the stored whole-set fingerprint still
    /// equals `observed` (`None` meaning "no record"). Returns whether the
    /// record was written.
    pub fn commit_if(&self, descriptor: &Descriptor, observed: Option<u32>) -> bool {
        let entry = CacheEntry::from_descriptor(descriptor, descriptor_hash(descriptor));
        let mut entries = self.entries.lock();
        let current = entries.get(descriptor.name()).map(|e| e.whole_hash);
        if current != observed {
            return false;
        }
        entries.insert(entry.name.clone(), entry);
        true
    }

    /// Evaluate and, if the descriptor is new or changed, commit it, under a
    /// single lock acquisition.
    ///
    /// Two producers reconciling the same name concurrently never both
    /// observe the same old state.
    pub fn reconcile(&self, descriptor: &Descriptor) -> Evaluation {
        let whole = descriptor_hash(descriptor);
        let mut entries = self.entries.lock();
        let evaluation = self.evaluate_locked(&entries, descriptor, whole);
        if evaluation.needs_export() {
            let entry = CacheEntry::from_descriptor(descriptor, whole);
            entries.insert(entry.name.clone(), entry);
        }
        evaluation
    }

    /// Remove the record for `name`; returns whether one existed
    pub fn remove(&self, name: &str) -> bool {
        self.entries.lock().remove(name).is_some()
    }

    /// Keep only the records for which `keep` returns true.
    ///
    /// Returns the number of removed records.
    pub fn retain(&self, mut keep: impl FnMut(&CacheEntry) -> bool) -> usize {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, entry| keep(entry));
        let removed = before - entries.len();
        if removed > 0 {
            debug!(
                target: "scenecast::cache",
                removed,
                remaining = entries.len(),
                "pruned change cache"
            );
        }
        removed
    }

    /// Drop every record
    pub fn clear(&self) {
        let mut entries = self.entries.lock();
        debug!(target: "scenecast::cache", entries = entries.len(), "clearing change cache");
        entries.clear();
    }

    /// Return a snapshot of cache metrics
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.len(),
            evaluations: self.evaluations.load(Ordering::Relaxed),
            new_entities: self.new_entities.load(Ordering::Relaxed),
            changed: self.changed.load(Ordering::Relaxed),
            unchanged: self.unchanged.load(Ordering::Relaxed),
        }
    }

    fn evaluate_locked(
        &self,
        entries: &FxHashMap<String, CacheEntry>,
        descriptor: &Descriptor,
        whole: u32,
    ) -> Evaluation {
        self.evaluations.fetch_add(1, Ordering::Relaxed);

        let Some(entry) = entries.get(descriptor.name()) else {
            self.new_entities.fetch_add(1, Ordering::Relaxed);
            return Evaluation {
                is_new: true,
                is_different: false,
                delta: descriptor.clone(),
            };
        };

        if entry.whole_hash == whole {
            self.unchanged.fetch_add(1, Ordering::Relaxed);
            return Evaluation {
                is_new: false,
                is_different: false,
                delta: descriptor.empty_like(),
            };
        }

        self.changed.fetch_add(1, Ordering::Relaxed);

        // Attribute count changed: emit everything unless asked to diff anyway.
        if !self.exhaustive_diff && descriptor.len() != entry.attribute_hashes.len() {
            return Evaluation {
                is_new: false,
                is_different: true,
                delta: descriptor.clone(),
            };
        }

        let mut delta = descriptor.empty_like();
        for (name, attr) in descriptor.iter() {
            let current = attribute_hash(name, &attr.value);
            if entry.attribute_hashes.get(name) != Some(&current) {
                delta.insert(name, attr.clone());
            }
        }
        Evaluation {
            is_new: false,
            is_different: true,
            delta,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scenecast_core::Value;

    fn entity(name: &str) -> Descriptor {
        Descriptor::new(name, "Node", Category::Nodes)
    }

    #[test]
    fn test_absent_name_is_new_with_full_delta() {
        let cache = ChangeCache::new();
        let d = entity("A").with("x", 1).with("y", 2);
        let eval = cache.evaluate(&d);
        assert!(eval.is_new);
        assert!(!eval.is_different);
        assert!(eval.needs_export());
        assert_eq!(eval.delta.len(), 2);
        assert!(eval.is_full(&d));
        assert!(!cache.contains("A"));
    }

    #[test]
    fn test_scenario_evaluate_commit_cycle() {
        let cache = ChangeCache::new();

        let first = entity("A").with("x", 1);
        assert!(cache.evaluate(&first).is_new);
        cache.commit(&first);

        let same = entity("A").with("x", 1);
        let eval = cache.evaluate(&same);
        assert!(!eval.is_new);
        assert!(!eval.is_different);
        assert!(eval.delta.is_empty());

        let changed = entity("A").with("x", 2);
        let eval = cache.evaluate(&changed);
        assert!(eval.is_different);
        assert_eq!(eval.delta.len(), 1);
        assert_eq!(eval.delta.value("x"), Some(&Value::Int(2)));

        cache.commit(&changed);
        assert!(!cache.evaluate(&changed).is_different);
    }

    #[test]
    fn test_delta_contains_only_changed_attributes() {
        let cache = ChangeCache::new();
        cache.commit(&entity("A").with("a", 1).with("b", 2).with("c", 3));

        let eval = cache.evaluate(&entity("A").with("a", 1).with("b", 20).with("c", 3));
        let names: Vec<_> = eval.delta.names().collect();
        assert_eq!(names, vec!["b"]);
    }

    #[test]
    fn test_count_mismatch_emits_whole_descriptor() {
        let cache = ChangeCache::new();
        cache.commit(&entity("A").with("a", 1));

        let grown = entity("A").with("a", 1).with("b", 2);
        let eval = cache.evaluate(&grown);
        assert!(eval.is_different);
        assert_eq!(eval.delta.len(), 2);
    }

    #[test]
    fn test_exhaustive_diff_reports_only_new_attribute() {
        let cache = ChangeCache::with_exhaustive_diff(true);
        cache.commit(&entity("A").with("a", 1));

        let grown = entity("A").with("a", 1).with("b", 2);
        let eval = cache.evaluate(&grown);
        assert!(eval.is_different);
        let names: Vec<_> = eval.delta.names().collect();
        assert_eq!(names, vec!["b"]);
    }

    #[test]
    fn test_commit_replaces_wholesale() {
        let cache = ChangeCache::new();
        cache.commit(&entity("A").with("a", 1).with("b", 2));
        cache.commit(&entity("A").with("c", 3));
        assert_eq!(cache.len(), 1);
        assert!(!cache.evaluate(&entity("A").with("c", 3)).needs_export());
    }

    #[test]
    fn test_commit_if_compare_and_swap() {
        let cache = ChangeCache::new();
        let v1 = entity("A").with("x", 1);
        assert!(cache.commit_if(&v1, None));
        assert!(!cache.commit_if(&v1, None));

        let observed = cache.stored_hash("A");
        let v2 = entity("A").with("x", 2);
        assert!(cache.commit_if(&v2, observed));
        // Stale observation loses.
        let v3 = entity("A").with("x", 3);
        assert!(!cache.commit_if(&v3, observed));
        assert!(!cache.evaluate(&v2).needs_export());
    }

    #[test]
    fn test_reconcile_commits_on_change_only() {
        let cache = ChangeCache::new();
        let d = entity("A").with("x", 1);
        assert!(cache.reconcile(&d).is_new);
        let eval = cache.reconcile(&d);
        assert!(!eval.needs_export());

        let stats = cache.stats();
        assert_eq!(stats.evaluations, 2);
        assert_eq!(stats.new_entities, 1);
        assert_eq!(stats.unchanged, 1);
        assert_eq!(stats.entries, 1);
    }

    #[test]
    fn test_remove_and_clear() {
        let cache = ChangeCache::new();
        cache.commit(&entity("A").with("x", 1));
        cache.commit(&entity("B").with("x", 1));
        assert!(cache.remove("A"));
        assert!(!cache.remove("A"));
        assert!(cache.evaluate(&entity("A").with("x", 1)).is_new);
        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_retain_prunes() {
        let cache = ChangeCache::new();
        for name in ["A", "B", "C"] {
            cache.commit(&entity(name).with("x", 1));
        }
        let removed = cache.retain(|e| e.name != "B");
        assert_eq!(removed, 1);
        assert!(!cache.contains("B"));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_same_name_across_categories_overwrites() {
        let cache = ChangeCache::new();
        cache.commit(&Descriptor::new("dup", "Node", Category::Nodes).with("x", 1));
        cache.commit(&Descriptor::new("dup", "MtlSingleBRDF", Category::Materials).with("y", 1));
        assert_eq!(cache.len(), 1);
        let eval = cache.evaluate(&Descriptor::new("dup", "Node", Category::Nodes).with("x", 1));
        assert!(eval.is_different);
    }
}
