//! scenecast - incremental scene export core
//!
//! scenecast decides, per entity, whether its description must be
//! (re)emitted, computes the minimal attribute delta when only part of an
//! entity changed, and streams the text of each entity to a categorized
//! destination without blocking the producer on array encoding.
//!
//! # Quick Start
//!
//! ```no_run
//! use scenecast::{Category, Descriptor, ExportConfig, ExportOutcome, ExportSession};
//!
//! let session = ExportSession::open(ExportConfig::in_dir("out"))?;
//!
//! let mesh = Descriptor::new("mesh1", "GeomStaticMesh", Category::Geometry)
//!     .with("faces", vec![0, 1, 2])
//!     .with("smooth", true);
//! assert_eq!(session.export(&mesh), ExportOutcome::Full);
//! assert_eq!(session.export(&mesh), ExportOutcome::Skipped);
//!
//! let report = session.finish();
//! println!("{} entities written", report.full + report.deltas);
//! # Ok::<(), scenecast::ExportError>(())
//! ```
//!
//! # Architecture
//!
//! - [`scenecast_core`]: values, descriptors, fingerprints, errors
//! - [`scenecast_cache`]: the change-detection cache
//! - [`scenecast_engine`]: scheduler, writers, router, session, config

pub use scenecast_cache::*;
pub use scenecast_core::*;
pub use scenecast_engine::*;
