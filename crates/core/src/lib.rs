//! Core types for scenecast
//!
//! This crate defines the foundational types used throughout the export core:
//! - Value: tagged union of attribute values with shared array payloads
//! - Descriptor: named, typed attribute record for one entity
//! - Fingerprints: xxHash32-based digests of values and descriptors
//! - Category / EntityKind: destination categories and the closed set of entity kinds
//! - ExportError: error type hierarchy

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod category;
pub mod descriptor;
pub mod error;
pub mod fingerprint;
pub mod value;

pub use category::{Category, EntityKind};
pub use descriptor::{AttrKind, Attribute, Descriptor};
pub use error::{ExportError, ExportResult};
pub use fingerprint::{attribute_hash, attribute_hashes, descriptor_hash, hash_str, hash_value};
pub use value::{
    AColor, Color, EntityRef, InstanceItem, InstancerArray, MapChannel, Matrix, Transform, Value,
    Vector,
};
