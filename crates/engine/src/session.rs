//! Export session
//!
//! An `ExportSession` owns everything one export needs: the change cache,
//! the encode scheduler and the routed writers. Nothing outlives it; a new
//! export starts from an empty cache.
//!
//! `export` may be called from many producer threads at once. The
//! destination writer is locked before the cache transition
//! (`ChangeCache::reconcile`) and released after the block is written, so
//! the last block written for a name always matches the cached state. Lock
//! order is writer, then cache.
//!
//! # Teardown
//!
//! `finish` (or dropping the session) drains every writer, emits the include
//! directives of the main file, closes the destinations and only then stops
//! the scheduler, so no queued encode is ever discarded.

use crate::background::{SchedulerStats, TaskScheduler};
use crate::config::ExportConfig;
use crate::router::ChannelRouter;
use crate::writer::{Writer, WriterStats};
use rustc_hash::FxHashSet;
use scenecast_cache::{CacheStats, ChangeCache};
use scenecast_core::{Category, Descriptor, ExportResult};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// What `export` did with a descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportOutcome {
    /// Unchanged since the last export; nothing written
    Skipped,
    /// Written with all of its attributes
    Full,
    /// Written with only the given number of changed attributes
    Delta(usize),
}

/// Per-destination statistics at teardown
#[derive(Debug, Clone, PartialEq)]
pub struct DestinationReport {
    /// Category the writer was registered for
    pub category: Category,
    /// File path, for file destinations
    pub path: Option<PathBuf>,
    /// Whether the destination stayed usable
    pub good: bool,
    /// Writer counters
    pub stats: WriterStats,
}

/// Aggregate statistics of a finished session
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionReport {
    /// Entities written in full
    pub full: u64,
    /// Entities written as deltas
    pub deltas: u64,
    /// Entities skipped as unchanged
    pub skipped: u64,
    /// Cache counters
    pub cache: CacheStats,
    /// Scheduler counters, taken just before the scheduler stopped
    pub scheduler: SchedulerStats,
    /// One entry per registered destination, in emission order
    pub destinations: Vec<DestinationReport>,
}

#[derive(Debug, Default)]
struct Counters {
    full: AtomicU64,
    deltas: AtomicU64,
    skipped: AtomicU64,
}

/// One incremental export
pub struct ExportSession {
    config: ExportConfig,
    cache: ChangeCache,
    router: ChannelRouter,
    scheduler: Arc<TaskScheduler>,
    counters: Counters,
    finished: bool,
}

impl ExportSession {
    /// Open the destinations described by `config`.
    ///
    /// Creates the output directory, starts the encode workers and opens one
    /// writer per category (or a single main writer when `separate_files` is
    /// off). The main file includes every other destination.
    ///
    /// # Errors
    ///
    /// Fails on an invalid encoding, an uncreatable output directory or
    /// when the workers cannot be spawned. Individual destination files
    /// that cannot be opened do not fail the session; their writers report
    /// `is_good() == false`.
    pub fn open(config: ExportConfig) -> ExportResult<Self> {
        let options = config.writer_options()?;
        std::fs::create_dir_all(&config.output_dir)?;
        let scheduler = Arc::new(TaskScheduler::new(
            config.worker_threads,
            config.max_queue_depth,
        )?);

        let mut router = ChannelRouter::new();
        let mut main = Writer::create(config.main_path(), options, Some(Arc::clone(&scheduler)));
        if config.separate_files {
            for category in Category::ALL {
                if category == Category::Settings {
                    continue;
                }
                let path = config.destination_path(category);
                if let Some(file_name) = path.file_name() {
                    main.add_include(file_name.to_string_lossy());
                }
                router.register(
                    category,
                    Writer::create(&path, options, Some(Arc::clone(&scheduler))),
                );
            }
        }
        router.register(Category::Settings, main);

        debug!(
            target: "scenecast::session",
            output_dir = ?config.output_dir,
            mode = %options.mode,
            workers = config.worker_threads,
            separate_files = config.separate_files,
            "Export session opened"
        );

        let cache = ChangeCache::with_exhaustive_diff(config.exhaustive_diff);
        Ok(Self::from_parts(config, cache, scheduler, router))
    }

    /// Assemble a session from prebuilt parts (custom sinks, shared scheduler)
    pub fn from_parts(
        config: ExportConfig,
        cache: ChangeCache,
        scheduler: Arc<TaskScheduler>,
        router: ChannelRouter,
    ) -> Self {
        Self {
            config,
            cache,
            router,
            scheduler,
            counters: Counters::default(),
            finished: false,
        }
    }

    /// Export one entity if it is new or changed.
    ///
    /// The cache is updated and the full descriptor (new entity, or changed
    /// attribute count) or the delta is written to the entity's destination.
    /// The destination writer stays locked from the cache update through the
    /// write, so output order matches cache commit order per destination.
    pub fn export(&self, descriptor: &Descriptor) -> ExportOutcome {
        let mut writer = self
            .router
            .resolve(descriptor.category(), descriptor.type_id())
            .lock();
        let evaluation = self.cache.reconcile(descriptor);
        if !evaluation.needs_export() {
            self.counters.skipped.fetch_add(1, Ordering::Relaxed);
            return ExportOutcome::Skipped;
        }

        let outcome = if evaluation.is_new || evaluation.is_full(descriptor) {
            self.counters.full.fetch_add(1, Ordering::Relaxed);
            ExportOutcome::Full
        } else {
            self.counters.deltas.fetch_add(1, Ordering::Relaxed);
            ExportOutcome::Delta(evaluation.delta.len())
        };

        writer.write(&evaluation.delta);
        outcome
    }

    /// Forget every cached entity whose name is not in `live_names`.
    ///
    /// Returns the number of entries removed. A pruned entity is exported in
    /// full the next time it appears.
    pub fn prune<'a>(&self, live_names: impl IntoIterator<Item = &'a str>) -> usize {
        let live: FxHashSet<&str> = live_names.into_iter().collect();
        let removed = self.cache.retain(|entry| live.contains(entry.name.as_str()));
        if removed > 0 {
            debug!(target: "scenecast::session", removed, "Pruned cache entries");
        }
        removed
    }

    /// Flush the ready output of every destination without waiting
    pub fn flush(&self) {
        self.router.flush_ready();
    }

    /// The change cache
    pub fn cache(&self) -> &ChangeCache {
        &self.cache
    }

    /// The writer router
    pub fn router(&self) -> &ChannelRouter {
        &self.router
    }

    /// The encode scheduler
    pub fn scheduler(&self) -> &Arc<TaskScheduler> {
        &self.scheduler
    }

    /// The session configuration
    pub fn config(&self) -> &ExportConfig {
        &self.config
    }

    /// Drain and close every destination, stop the workers and report
    pub fn finish(mut self) -> SessionReport {
        self.teardown()
    }

    fn teardown(&mut self) -> SessionReport {
        self.finished = true;
        self.router.close_all();
        let scheduler = self.scheduler.stats();
        if !self.scheduler.is_stopped() {
            self.scheduler.stop();
        }

        let destinations: Vec<_> = self
            .router
            .writers()
            .map(|(category, writer)| {
                let writer = writer.lock();
                DestinationReport {
                    category,
                    path: writer.path().map(PathBuf::from),
                    good: writer.is_good(),
                    stats: writer.stats(),
                }
            })
            .collect();

        let report = SessionReport {
            full: self.counters.full.load(Ordering::Relaxed),
            deltas: self.counters.deltas.load(Ordering::Relaxed),
            skipped: self.counters.skipped.load(Ordering::Relaxed),
            cache: self.cache.stats(),
            scheduler,
            destinations,
        };
        info!(
            target: "scenecast::session",
            full = report.full,
            deltas = report.deltas,
            skipped = report.skipped,
            entities = report.cache.entries,
            "Export session finished"
        );
        report
    }
}

impl Drop for ExportSession {
    fn drop(&mut self) {
        if !self.finished {
            self.teardown();
        }
    }
}
