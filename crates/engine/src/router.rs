//! Category → writer routing
//!
//! Resolution order for an entity of `category` with type string `type_id`:
//!
//! 1. the writer registered for `category`
//! 2. the writer registered for the category inferred from `type_id`
//! 3. the writer registered for `Category::Settings`
//! 4. a shared null writer (logged once)
//!
//! Writers sit behind a `Mutex`: a writer expects one logical stream of
//! calls, so concurrent producers serialize on it.

use crate::writer::Writer;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use scenecast_core::{Category, EntityKind};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, warn};

/// Maps destination categories to the writers that own them
pub struct ChannelRouter {
    writers: FxHashMap<Category, Mutex<Writer>>,
    null: Mutex<Writer>,
    warned_null: AtomicBool,
}

impl Default for ChannelRouter {
    fn default() -> Self {
        Self::new()
    }
}

impl ChannelRouter {
    /// Router with no registered writers
    pub fn new() -> Self {
        Self {
            writers: FxHashMap::default(),
            null: Mutex::new(Writer::null()),
            warned_null: AtomicBool::new(false),
        }
    }

    /// Register `writer` for `category`, returning the writer it replaces
    pub fn register(&mut self, category: Category, writer: Writer) -> Option<Writer> {
        self.writers
            .insert(category, Mutex::new(writer))
            .map(Mutex::into_inner)
    }

    /// Whether a writer is registered for `category`
    pub fn has(&self, category: Category) -> bool {
        self.writers.contains_key(&category)
    }

    /// Writer registered for exactly `category`
    pub fn get(&self, category: Category) -> Option<&Mutex<Writer>> {
        self.writers.get(&category)
    }

    /// Resolve the writer for an entity. Never fails.
    pub fn resolve(&self, category: Category, type_id: &str) -> &Mutex<Writer> {
        if let Some(writer) = self.writers.get(&category) {
            return writer;
        }
        if let Some(inferred) = EntityKind::from_type_id(type_id).map(|k| k.category()) {
            if let Some(writer) = self.writers.get(&inferred) {
                debug!(
                    target: "scenecast::router",
                    %category,
                    %inferred,
                    type_id,
                    "Routed by type name"
                );
                return writer;
            }
        }
        if let Some(writer) = self.writers.get(&Category::Settings) {
            return writer;
        }
        if !self.warned_null.swap(true, Ordering::Relaxed) {
            warn!(
                target: "scenecast::router",
                %category,
                type_id,
                "No destination registered, output discarded"
            );
        }
        &self.null
    }

    /// Registered writers in category emission order
    pub fn writers(&self) -> impl Iterator<Item = (Category, &Mutex<Writer>)> {
        Category::ALL
            .into_iter()
            .filter_map(move |c| self.writers.get(&c).map(|w| (c, w)))
    }

    /// Flush the ready output of every writer without blocking
    pub fn flush_ready(&self) {
        for (_, writer) in self.writers() {
            writer.lock().flush_ready();
        }
    }

    /// Close every registered writer, the main (settings) destination last
    pub fn close_all(&self) {
        for category in Category::ALL.iter().rev() {
            if let Some(writer) = self.writers.get(category) {
                writer.lock().close();
            }
        }
    }
}
