//! Queued units of writer output
//!
//! A `WriteItem` is either ready text or a pending slot filled by a worker.
//! The slot is a single `OnceLock<String>`: the worker publishes the whole
//! payload with one `set` (release), the flush path observes it with `get`
//! (acquire). There is no separate ready flag that could race the payload.
//!
//! The producing half, `Publisher`, fills the slot with an empty payload if
//! it is dropped unpublished (encode panic, task discarded at scheduler
//! stop), so a pending item always becomes ready and the queue never stalls.

use std::sync::{Arc, OnceLock};

/// Shared pending-text slot
pub(crate) type Slot = Arc<OnceLock<String>>;

/// One unit of queued output
#[derive(Debug)]
pub(crate) enum WriteItem {
    /// Final text
    Ready(String),
    /// Text still being produced by a worker
    Pending(Slot),
}

impl WriteItem {
    /// The item's text, if it is available
    pub(crate) fn text(&self) -> Option<&str> {
        match self {
            WriteItem::Ready(text) => Some(text),
            WriteItem::Pending(slot) => slot.get().map(String::as_str),
        }
    }
}

/// Producing half of a pending slot
#[derive(Debug)]
pub(crate) struct Publisher {
    slot: Option<Slot>,
}

impl Publisher {
    /// Publish the payload, making the item ready
    pub(crate) fn publish(mut self, text: String) {
        if let Some(slot) = self.slot.take() {
            let _ = slot.set(text);
        }
    }
}

impl Drop for Publisher {
    fn drop(&mut self) {
        if let Some(slot) = self.slot.take() {
            let _ = slot.set(String::new());
        }
    }
}

/// Create a pending slot and its publisher
pub(crate) fn pending() -> (Slot, Publisher) {
    let slot: Slot = Arc::new(OnceLock::new());
    let publisher = Publisher {
        slot: Some(Arc::clone(&slot)),
    };
    (slot, publisher)
}
