//! Export engine for scenecast
//!
//! This crate turns changed descriptors into destination text:
//! - TaskScheduler: bounded encode worker pool (or synchronous inline mode)
//! - Writer: order-preserving serializer for one destination
//! - ChannelRouter: category to writer resolution with fallbacks
//! - ExportSession: cache + scheduler + writers for one export
//! - ExportConfig: `scenecast.toml` configuration
//!
//! The engine never fails on the streaming path: unusable destinations and
//! failed encodes are reported through status flags, counters and logs.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod background;
pub mod config;
pub mod router;
pub mod session;
pub mod writer;

pub use background::{SchedulerStats, TaskContext, TaskPriority, TaskScheduler};
pub use config::{ExportConfig, CONFIG_FILE_NAME};
pub use router::ChannelRouter;
pub use session::{DestinationReport, ExportOutcome, ExportSession, SessionReport};
pub use writer::{EncodingMode, MemorySink, Writer, WriterOptions, WriterStats};
