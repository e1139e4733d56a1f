//! Content fingerprints for change detection
//!
//! Fast, non-cryptographic 32-bit digests built on xxHash32.
//!
//! ## Contract
//!
//! - Deterministic: equal values hash equally (including `-0.0 == 0.0`).
//! - Unequal values differ with overwhelming probability. Every variant mixes
//!   a one-byte tag first, so `Int(1)` and `Float(f32::from_bits(1))` differ.
//! - Order-sensitive: reordering a sequence is a content change.
//! - `Unknown` hashes to [`UNKNOWN_HASH`] regardless of seed.
//!
//! ## Folding order
//!
//! - Numeric sequences stream their elements' little-endian bytes, in order,
//!   through one hasher seeded with `seed` (after the tag and the length).
//! - Generic sequences fold `h = mix(h, hash_value(element, h))`.
//! - `EntityRef`: hash of the name, then the output slot name folded in
//!   when present.
//! - Map channels: for each channel in name order, the name, then the
//!   vertex bytes, then the face bytes.
//! - Instancers: frame, then for each item index, transform, velocity and
//!   the referenced entity.
//!
//! Time samples never participate; a value re-sampled at a later time with
//! identical content is unchanged.

use crate::descriptor::Descriptor;
use crate::value::{AColor, Color, EntityRef, Matrix, Transform, Value, Vector};
use rustc_hash::FxHashMap;
use xxhash_rust::xxh32::{xxh32, Xxh32};

/// Fixed digest of `Value::Unknown`
pub const UNKNOWN_HASH: u32 = 0x9E37_79B1;

/// Seed used for descriptor-level fingerprints
pub const DESCRIPTOR_SEED: u32 = 0;

mod tag {
    pub const INT: u8 = 1;
    pub const FLOAT: u8 = 2;
    pub const STRING: u8 = 3;
    pub const COLOR: u8 = 4;
    pub const ACOLOR: u8 = 5;
    pub const VECTOR: u8 = 6;
    pub const MATRIX: u8 = 7;
    pub const TRANSFORM: u8 = 8;
    pub const REF: u8 = 9;
    pub const INT_LIST: u8 = 10;
    pub const FLOAT_LIST: u8 = 11;
    pub const STRING_LIST: u8 = 12;
    pub const COLOR_LIST: u8 = 13;
    pub const ACOLOR_LIST: u8 = 14;
    pub const VECTOR_LIST: u8 = 15;
    pub const MATRIX_LIST: u8 = 16;
    pub const TRANSFORM_LIST: u8 = 17;
    pub const REF_LIST: u8 = 18;
    pub const LIST: u8 = 19;
    pub const MAP_CHANNELS: u8 = 20;
    pub const INSTANCER: u8 = 21;
}

/// Types whose raw bytes can be streamed into a hasher
trait Feed {
    fn feed(&self, h: &mut Xxh32);
}

// -0.0 and 0.0 compare equal, so they must hash equal.
fn canonical_bits(v: f32) -> u32 {
    if v == 0.0 {
        0
    } else {
        v.to_bits()
    }
}

impl Feed for i32 {
    fn feed(&self, h: &mut Xxh32) {
        h.update(&self.to_le_bytes());
    }
}

impl Feed for f32 {
    fn feed(&self, h: &mut Xxh32) {
        h.update(&canonical_bits(*self).to_le_bytes());
    }
}

impl Feed for Color {
    fn feed(&self, h: &mut Xxh32) {
        self.r.feed(h);
        self.g.feed(h);
        self.b.feed(h);
    }
}

impl Feed for AColor {
    fn feed(&self, h: &mut Xxh32) {
        self.color.feed(h);
        self.alpha.feed(h);
    }
}

impl Feed for Vector {
    fn feed(&self, h: &mut Xxh32) {
        self.x.feed(h);
        self.y.feed(h);
        self.z.feed(h);
    }
}

impl Feed for Matrix {
    fn feed(&self, h: &mut Xxh32) {
        for v in &self.v {
            v.feed(h);
        }
    }
}

impl Feed for Transform {
    fn feed(&self, h: &mut Xxh32) {
        self.matrix.feed(h);
        self.offset.feed(h);
    }
}

fn hasher(tag: u8, seed: u32) -> Xxh32 {
    let mut h = Xxh32::new(seed);
    h.update(&[tag]);
    h
}

fn hash_one<T: Feed>(tag: u8, item: &T, seed: u32) -> u32 {
    let mut h = hasher(tag, seed);
    item.feed(&mut h);
    h.digest()
}

fn hash_slice<T: Feed>(tag: u8, items: &[T], seed: u32) -> u32 {
    let mut h = hasher(tag, seed);
    h.update(&(items.len() as u64).to_le_bytes());
    for item in items {
        item.feed(&mut h);
    }
    h.digest()
}

/// Fold a 32-bit digest into a running hash
#[inline]
pub fn mix(h: u32, v: u32) -> u32 {
    xxh32(&v.to_le_bytes(), h)
}

/// Hash a string
#[inline]
pub fn hash_str(s: &str, seed: u32) -> u32 {
    xxh32(s.as_bytes(), seed)
}

fn hash_ref(tag: u8, r: &EntityRef, seed: u32) -> u32 {
    let mut h = hasher(tag, seed);
    h.update(r.name.as_bytes());
    let h = h.digest();
    match &r.output {
        Some(output) => hash_str(output, h),
        None => h,
    }
}

fn hash_len(tag: u8, len: usize, seed: u32) -> u32 {
    let mut h = hasher(tag, seed);
    h.update(&(len as u64).to_le_bytes());
    h.digest()
}

/// Hash one value
pub fn hash_value(value: &Value, seed: u32) -> u32 {
    match value {
        Value::Unknown => UNKNOWN_HASH,
        Value::Int(v) => hash_one(tag::INT, v, seed),
        Value::Float(v) => hash_one(tag::FLOAT, v, seed),
        Value::String(s) => {
            let mut h = hasher(tag::STRING, seed);
            h.update(s.as_bytes());
            h.digest()
        }
        Value::Color(c) => hash_one(tag::COLOR, c, seed),
        Value::AColor(c) => hash_one(tag::ACOLOR, c, seed),
        Value::Vector(v) => hash_one(tag::VECTOR, v, seed),
        Value::Matrix(m) => hash_one(tag::MATRIX, m, seed),
        Value::Transform(t) => hash_one(tag::TRANSFORM, t, seed),
        Value::Ref(r) => hash_ref(tag::REF, r, seed),
        Value::IntList(v) => hash_slice(tag::INT_LIST, v, seed),
        Value::FloatList(v) => hash_slice(tag::FLOAT_LIST, v, seed),
        Value::ColorList(v) => hash_slice(tag::COLOR_LIST, v, seed),
        Value::AColorList(v) => hash_slice(tag::ACOLOR_LIST, v, seed),
        Value::VectorList(v) => hash_slice(tag::VECTOR_LIST, v, seed),
        Value::MatrixList(v) => hash_slice(tag::MATRIX_LIST, v, seed),
        Value::TransformList(v) => hash_slice(tag::TRANSFORM_LIST, v, seed),
        Value::StringList(v) => v.iter().fold(hash_len(tag::STRING_LIST, v.len(), seed), |h, s| {
            mix(h, hash_str(s, h))
        }),
        Value::RefList(v) => v.iter().fold(hash_len(tag::REF_LIST, v.len(), seed), |h, r| {
            mix(h, hash_ref(tag::REF, r, h))
        }),
        Value::List(v) => v.iter().fold(hash_len(tag::LIST, v.len(), seed), |h, e| {
            mix(h, hash_value(e, h))
        }),
        Value::MapChannels(channels) => channels.iter().fold(
            hash_len(tag::MAP_CHANNELS, channels.len(), seed),
            |h, (name, channel)| {
                let h = mix(h, hash_str(name, h));
                let h = mix(h, hash_slice(tag::VECTOR_LIST, &channel.vertices, h));
                mix(h, hash_slice(tag::INT_LIST, &channel.faces, h))
            },
        ),
        Value::Instancer(inst) => {
            let mut h = hasher(tag::INSTANCER, seed);
            h.update(&inst.frame.to_bits().to_le_bytes());
            h.update(&(inst.items.len() as u64).to_le_bytes());
            inst.items.iter().fold(h.digest(), |acc, item| {
                let mut ih = Xxh32::new(acc);
                item.index.feed(&mut ih);
                item.transform.feed(&mut ih);
                item.velocity.feed(&mut ih);
                let acc = mix(acc, ih.digest());
                mix(acc, hash_ref(tag::REF, &item.entity, acc))
            })
        }
    }
}

/// Fingerprint of one attribute (name and value)
pub fn attribute_hash(name: &str, value: &Value) -> u32 {
    let h = hash_str(name, DESCRIPTOR_SEED);
    mix(h, hash_value(value, h))
}

/// Fingerprint of a descriptor's whole attribute set, in name order
pub fn descriptor_hash(descriptor: &Descriptor) -> u32 {
    descriptor
        .iter()
        .fold(DESCRIPTOR_SEED, |h, (name, attr)| {
            let h = mix(h, hash_str(name, h));
            mix(h, hash_value(&attr.value, h))
        })
}

/// Per-attribute fingerprints of a descriptor
pub fn attribute_hashes(descriptor: &Descriptor) -> FxHashMap<String, u32> {
    descriptor
        .iter()
        .map(|(name, attr)| (name.to_string(), attribute_hash(name, &attr.value)))
        .collect()
}
