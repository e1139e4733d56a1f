//! Change detection for scenecast
//!
//! This crate implements the content-addressed cache that decides, per
//! entity, whether its description must be (re)emitted:
//! - ChangeCache: lock-protected fingerprint store keyed by entity name
//! - Evaluation: new / changed / unchanged verdict plus the minimal delta
//! - reconcile / commit_if: atomic old-to-new transitions for one name

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cache;

pub use cache::{CacheEntry, CacheStats, ChangeCache, Evaluation};
