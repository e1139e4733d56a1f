//! Order-preserving serialization writer
//!
//! One `Writer` owns one output destination. `write` renders a descriptor
//! into a queue of items; small attributes become ready text immediately,
//! large numeric arrays in the binary modes are encoded on the background
//! scheduler and occupy a pending slot at their queue position.
//!
//! Whenever text becomes available the writer flushes every *leading* ready
//! item and stops at the first pending one, so the destination bytes always
//! follow submission order no matter which encode finishes first. All
//! flushing happens on the caller's thread.
//!
//! # Failure handling
//!
//! A destination that cannot be opened (or fails on write) turns the writer
//! "not good": later writes are no-ops and the failure is logged once. An
//! attribute that fails to encode is dropped from the output, also logged.
//! No writer operation returns an error after construction.

mod encode;
mod item;
mod render;

pub use encode::{deflate, hex_token, EncodingMode};

use crate::background::{TaskPriority, TaskScheduler};
use item::{pending, WriteItem};
use parking_lot::Mutex;
use render::{push_indent, render_attribute, RenderCtx};
use scenecast_core::{Descriptor, EntityKind};
use std::collections::VecDeque;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};

/// Writer configuration
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WriterOptions {
    /// Array encoding mode
    pub mode: EncodingMode,
    /// Literal lists break the line every `n` elements
    pub literal_wrap: Option<usize>,
    /// Minimum element count for an array to be encoded in the background
    pub async_threshold: usize,
    /// Poll interval of `block_flush_all`
    pub poll_interval: Duration,
}

impl Default for WriterOptions {
    fn default() -> Self {
        Self {
            mode: EncodingMode::Hex,
            literal_wrap: None,
            async_threshold: 1000,
            poll_interval: Duration::from_micros(100),
        }
    }
}

/// Writer counters snapshot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriterStats {
    /// Descriptors accepted by `write`
    pub entities_written: u64,
    /// Bytes handed to the destination
    pub bytes_flushed: u64,
    /// Attributes encoded on the scheduler
    pub background_encodes: u64,
    /// Attributes dropped because they failed to encode
    pub encode_failures: u64,
}

/// Shared in-memory destination.
///
/// Clones share the same buffer, so a test (or a transport front end) can
/// keep one handle and give another to a `Writer`.
#[derive(Debug, Clone, Default)]
pub struct MemorySink(Arc<Mutex<Vec<u8>>>);

impl MemorySink {
    /// Create an empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything written so far, as text
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock()).into_owned()
    }

    /// Everything written so far, as bytes
    pub fn bytes(&self) -> Vec<u8> {
        self.0.lock().clone()
    }
}

impl Write for MemorySink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Serializer for one output destination
pub struct Writer {
    path: Option<PathBuf>,
    sink: Option<Box<dyn Write + Send>>,
    good: bool,
    closed: bool,
    queue: VecDeque<WriteItem>,
    depth: usize,
    options: WriterOptions,
    scheduler: Option<Arc<TaskScheduler>>,
    includes: Vec<String>,
    stats: WriterStats,
    encode_failures: Arc<AtomicU64>,
    warned_unusable: bool,
    warned_closed: bool,
}

impl std::fmt::Debug for Writer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Writer")
            .field("path", &self.path)
            .field("good", &self.good)
            .field("closed", &self.closed)
            .field("queued", &self.queue.len())
            .field("depth", &self.depth)
            .field("options", &self.options)
            .finish()
    }
}

impl Writer {
    /// Open (truncate) a file destination.
    ///
    /// An unopenable path does not fail: the writer is created "not good"
    /// and every later write is a no-op.
    pub fn create(
        path: impl AsRef<Path>,
        options: WriterOptions,
        scheduler: Option<Arc<TaskScheduler>>,
    ) -> Self {
        let path = path.as_ref().to_path_buf();
        match File::create(&path) {
            Ok(file) => {
                debug!(
                    target: "scenecast::writer",
                    path = ?path,
                    mode = %options.mode,
                    "Opened destination"
                );
                let mut writer =
                    Self::from_sink(Box::new(BufWriter::new(file)), options, scheduler);
                writer.path = Some(path);
                writer
            }
            Err(e) => {
                warn!(
                    target: "scenecast::writer",
                    path = ?path,
                    error = %e,
                    "Cannot open destination, writes disabled"
                );
                let mut writer = Self::from_sink(Box::new(io::sink()), options, scheduler);
                writer.sink = None;
                writer.good = false;
                writer.warned_unusable = true;
                writer.path = Some(path);
                writer
            }
        }
    }

    /// Write to an arbitrary sink
    pub fn from_sink(
        sink: Box<dyn Write + Send>,
        options: WriterOptions,
        scheduler: Option<Arc<TaskScheduler>>,
    ) -> Self {
        Self {
            path: None,
            sink: Some(sink),
            good: true,
            closed: false,
            queue: VecDeque::new(),
            depth: 0,
            options,
            scheduler,
            includes: Vec::new(),
            stats: WriterStats::default(),
            encode_failures: Arc::new(AtomicU64::new(0)),
            warned_unusable: false,
            warned_closed: false,
        }
    }

    /// Writer that discards everything
    pub fn null() -> Self {
        let mut writer = Self::from_sink(Box::new(io::sink()), WriterOptions::default(), None);
        writer.options.mode = EncodingMode::Literal;
        writer.sink = None;
        writer
    }

    /// Destination path, for file writers
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Whether the destination is usable
    pub fn is_good(&self) -> bool {
        self.good
    }

    /// Current encoding mode
    pub fn mode(&self) -> EncodingMode {
        self.options.mode
    }

    /// Change the encoding mode for subsequent writes
    pub fn set_mode(&mut self, mode: EncodingMode) {
        self.options.mode = mode;
    }

    /// Current options
    pub fn options(&self) -> &WriterOptions {
        &self.options
    }

    /// Increase nesting depth
    pub fn indent(&mut self) {
        self.depth += 1;
    }

    /// Decrease nesting depth; saturates at zero
    pub fn unindent(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    /// Current nesting depth
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Number of queued (not yet flushed) items
    pub fn pending_items(&self) -> usize {
        self.queue.len()
    }

    /// Render `descriptor` as one entity block.
    ///
    /// Unknown attributes are skipped. Never blocks on background encodes.
    pub fn write(&mut self, descriptor: &Descriptor) {
        if !self.accepting() {
            return;
        }

        let mut header = String::new();
        push_indent(&mut header, self.depth);
        header.push_str(descriptor.type_id());
        header.push(' ');
        header.push_str(descriptor.name());
        header.push_str(" {\n");
        self.push_text(header);

        let instancer = EntityKind::is_instancer(descriptor.type_id());
        self.indent();
        for (name, attribute) in descriptor.iter() {
            if attribute.value.is_unknown() {
                continue;
            }
            let ctx = RenderCtx {
                mode: self.options.mode,
                wrap: self.options.literal_wrap,
                depth: self.depth,
            };

            if self.wants_background(&attribute.value) {
                if let Some(scheduler) = self.scheduler.clone() {
                    let (slot, publisher) = pending();
                    let name_owned = name.to_string();
                    let attribute_owned = attribute.clone();
                    let failures = Arc::clone(&self.encode_failures);
                    let submitted = scheduler.submit(TaskPriority::Low, move |task| {
                        if task.is_stopped() {
                            return;
                        }
                        match render_attribute(&name_owned, &attribute_owned, instancer, ctx) {
                            Ok(line) => publisher.publish(line),
                            Err(e) => {
                                failures.fetch_add(1, Ordering::Relaxed);
                                error!(
                                    target: "scenecast::writer",
                                    attribute = %name_owned,
                                    error = %e,
                                    "Background encode failed"
                                );
                            }
                        }
                    });
                    match submitted {
                        Ok(()) => {
                            self.stats.background_encodes += 1;
                            self.queue.push_back(WriteItem::Pending(slot));
                            continue;
                        }
                        Err(e) => {
                            debug!(
                                target: "scenecast::writer",
                                attribute = %name,
                                error = %e,
                                "Encoding inline"
                            );
                        }
                    }
                }
            }

            match render_attribute(name, attribute, instancer, ctx) {
                Ok(line) => self.push_text(line),
                Err(e) => {
                    self.encode_failures.fetch_add(1, Ordering::Relaxed);
                    warn!(
                        target: "scenecast::writer",
                        entity = %descriptor.name(),
                        attribute = %name,
                        error = %e,
                        "Encode failed"
                    );
                }
            }
        }
        self.unindent();

        let mut footer = String::new();
        push_indent(&mut footer, self.depth);
        footer.push_str("}\n\n");
        self.push_text(footer);

        self.stats.entities_written += 1;
        self.flush_ready();
    }

    /// Queue verbatim text (comments, preamble)
    pub fn write_raw(&mut self, text: &str) {
        if !self.accepting() {
            return;
        }
        self.push_text(text.to_string());
        self.flush_ready();
    }

    /// Record an include directive emitted at `close`; duplicates are ignored
    pub fn add_include(&mut self, path: impl Into<String>) {
        let path = path.into();
        if !self.includes.contains(&path) {
            self.includes.push(path);
        }
    }

    /// Include directives recorded so far, in first-seen order
    pub fn includes(&self) -> &[String] {
        &self.includes
    }

    /// Flush every leading ready item; never waits.
    ///
    /// Returns the number of items flushed.
    pub fn flush_ready(&mut self) -> usize {
        let mut flushed = 0;
        while let Some(front) = self.queue.front() {
            let Some(text) = front.text() else {
                break;
            };
            if !text.is_empty() {
                if let Some(sink) = self.sink.as_mut() {
                    match sink.write_all(text.as_bytes()) {
                        Ok(()) => self.stats.bytes_flushed += text.len() as u64,
                        Err(e) => {
                            error!(
                                target: "scenecast::writer",
                                path = ?self.path,
                                error = %e,
                                "Write failed, destination disabled"
                            );
                            self.sink = None;
                            self.good = false;
                            self.warned_unusable = true;
                        }
                    }
                }
            }
            self.queue.pop_front();
            flushed += 1;
        }
        flushed
    }

    /// Wait for every pending item and flush the whole queue
    pub fn block_flush_all(&mut self) {
        loop {
            self.flush_ready();
            if self.queue.is_empty() {
                break;
            }
            std::thread::sleep(self.options.poll_interval);
        }
        if let Some(sink) = self.sink.as_mut() {
            if let Err(e) = sink.flush() {
                error!(target: "scenecast::writer", path = ?self.path, error = %e, "Flush failed");
                self.good = false;
            }
        }
    }

    /// Drain the queue, emit include directives and flush the destination.
    ///
    /// Idempotent; writes after `close` are ignored.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        let includes = std::mem::take(&mut self.includes);
        for path in &includes {
            let mut line = String::with_capacity(path.len() + 12);
            line.push_str("#include \"");
            line.push_str(path);
            line.push_str("\"\n");
            self.push_text(line);
        }
        self.includes = includes;
        self.block_flush_all();
        self.closed = true;
        self.sink = None;
        debug!(
            target: "scenecast::writer",
            path = ?self.path,
            entities = self.stats.entities_written,
            "Destination closed"
        );
    }

    /// Whether `close` has run
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Counters snapshot
    pub fn stats(&self) -> WriterStats {
        WriterStats {
            encode_failures: self.encode_failures.load(Ordering::Relaxed),
            ..self.stats
        }
    }

    fn accepting(&mut self) -> bool {
        if self.closed {
            if !self.warned_closed {
                warn!(
                    target: "scenecast::writer",
                    path = ?self.path,
                    "Write after close ignored"
                );
                self.warned_closed = true;
            }
            return false;
        }
        if !self.good {
            if !self.warned_unusable {
                warn!(
                    target: "scenecast::writer",
                    path = ?self.path,
                    "Destination unusable, writes ignored"
                );
                self.warned_unusable = true;
            }
            return false;
        }
        true
    }

    fn wants_background(&self, value: &scenecast_core::Value) -> bool {
        self.options.mode.is_binary()
            && self.scheduler.is_some()
            && value.is_numeric_array()
            && value.element_count() >= self.options.async_threshold
    }

    /// Append ready text, coalescing with a ready tail item
    fn push_text(&mut self, text: String) {
        if let Some(WriteItem::Ready(tail)) = self.queue.back_mut() {
            tail.push_str(&text);
        } else {
            self.queue.push_back(WriteItem::Ready(text));
        }
    }

    #[cfg(test)]
    fn push_pending_for_test(&mut self) -> item::Publisher {
        let (slot, publisher) = pending();
        self.queue.push_back(WriteItem::Pending(slot));
        publisher
    }
}

impl Drop for Writer {
    fn drop(&mut self) {
        self.close();
    }
}
