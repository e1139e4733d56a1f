//! Value types for scenecast
//!
//! This module defines:
//! - Value: tagged union of every attribute value an entity can carry
//! - The composite scalar types (Color, AColor, Vector, Matrix, Transform)
//! - EntityRef, MapChannel and InstancerArray payloads
//!
//! ## Value Model
//!
//! - Scalars and small composites are stored inline.
//! - Sequences are stored as `Arc<[T]>` so the cache, the writer and any
//!   background encode task can share one payload without copying it.
//! - Values are immutable once built.
//!
//! ### Type Rules
//!
//! - Different variants are NEVER equal: `Int(1) != Float(1.0)`,
//!   `IntList([1]) != List([Int(1)])`.
//! - Float equality follows IEEE-754: `NaN != NaN`, `-0.0 == 0.0`.
//! - Sequence equality is order-sensitive.
//!
//! The `Display` impls of the composite scalars produce the output token
//! grammar (`Color(r,g,b)`, `Vector(x,y,z)`, ...) used by the writers.

use byteorder::{LittleEndian, WriteBytesExt};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// RGB color
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Color {
    /// Red
    pub r: f32,
    /// Green
    pub g: f32,
    /// Blue
    pub b: f32,
}

impl Color {
    /// Create a color from its components
    pub const fn new(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }
}

/// RGB color with alpha
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AColor {
    /// Color part
    pub color: Color,
    /// Alpha
    pub alpha: f32,
}

impl AColor {
    /// Create a color with alpha
    pub const fn new(color: Color, alpha: f32) -> Self {
        Self { color, alpha }
    }
}

/// Three-component vector
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vector {
    /// X
    pub x: f32,
    /// Y
    pub y: f32,
    /// Z
    pub z: f32,
}

impl Vector {
    /// Create a vector from its components
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

/// 3x3 matrix stored as three column vectors
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Matrix {
    /// Columns
    pub v: [Vector; 3],
}

impl Matrix {
    /// Create a matrix from three column vectors
    pub const fn new(v0: Vector, v1: Vector, v2: Vector) -> Self {
        Self { v: [v0, v1, v2] }
    }

    /// The identity matrix
    pub const fn identity() -> Self {
        Self::new(
            Vector::new(1.0, 0.0, 0.0),
            Vector::new(0.0, 1.0, 0.0),
            Vector::new(0.0, 0.0, 1.0),
        )
    }
}

/// Affine transform: matrix plus offset
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Transform {
    /// Rotation/scale part
    pub matrix: Matrix,
    /// Translation part
    pub offset: Vector,
}

impl Transform {
    /// Create a transform
    pub const fn new(matrix: Matrix, offset: Vector) -> Self {
        Self { matrix, offset }
    }

    /// The identity transform
    pub const fn identity() -> Self {
        Self::new(Matrix::identity(), Vector::new(0.0, 0.0, 0.0))
    }

    /// Pure translation
    pub const fn translation(offset: Vector) -> Self {
        Self::new(Matrix::identity(), offset)
    }
}

/// Reference to another entity, optionally to one of its output slots
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityRef {
    /// Name of the referenced entity
    pub name: String,
    /// Output slot of the referenced entity, if any
    pub output: Option<String>,
}

impl EntityRef {
    /// Reference the default output of `name`
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            output: None,
        }
    }

    /// Reference output slot `output` of `name`
    pub fn with_output(name: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            output: Some(output.into()),
        }
    }
}

/// One mapping channel: vertex array plus index array
#[derive(Debug, Clone, PartialEq)]
pub struct MapChannel {
    /// Channel vertices
    pub vertices: Arc<[Vector]>,
    /// Face indices into `vertices`
    pub faces: Arc<[i32]>,
}

impl MapChannel {
    /// Build a channel from owned arrays
    pub fn new(vertices: Vec<Vector>, faces: Vec<i32>) -> Self {
        Self {
            vertices: vertices.into(),
            faces: faces.into(),
        }
    }
}

/// One instance of an instancer array
#[derive(Debug, Clone, PartialEq)]
pub struct InstanceItem {
    /// Stable instance index
    pub index: i32,
    /// Instance transform
    pub transform: Transform,
    /// Velocity, expressed as a transform delta
    pub velocity: Transform,
    /// The instanced entity
    pub entity: EntityRef,
}

/// Per-frame instancer payload
#[derive(Debug, Clone, PartialEq)]
pub struct InstancerArray {
    /// Frame number the instances were sampled at
    pub frame: f64,
    /// Instances in output order
    pub items: Vec<InstanceItem>,
}

/// Attribute value of an exportable entity
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// No value / unsupported source type
    #[default]
    Unknown,
    /// 32-bit signed integer
    Int(i32),
    /// 32-bit float (IEEE-754)
    Float(f32),
    /// UTF-8 string
    String(String),
    /// RGB color
    Color(Color),
    /// RGBA color
    AColor(AColor),
    /// 3D vector
    Vector(Vector),
    /// 3x3 matrix
    Matrix(Matrix),
    /// Affine transform
    Transform(Transform),
    /// Reference to another entity
    Ref(EntityRef),
    /// Sequence of integers
    IntList(Arc<[i32]>),
    /// Sequence of floats
    FloatList(Arc<[f32]>),
    /// Sequence of strings
    StringList(Arc<[String]>),
    /// Sequence of colors
    ColorList(Arc<[Color]>),
    /// Sequence of colors with alpha
    AColorList(Arc<[AColor]>),
    /// Sequence of vectors
    VectorList(Arc<[Vector]>),
    /// Sequence of matrices
    MatrixList(Arc<[Matrix]>),
    /// Sequence of transforms
    TransformList(Arc<[Transform]>),
    /// Sequence of entity references
    RefList(Arc<[EntityRef]>),
    /// Generic, untyped sequence of values
    List(Arc<[Value]>),
    /// Named mapping channels
    MapChannels(Arc<BTreeMap<String, MapChannel>>),
    /// Instancer array
    Instancer(Arc<InstancerArray>),
}

impl Value {
    /// Get the type name as a string
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Unknown => "Unknown",
            Value::Int(_) => "Int",
            Value::Float(_) => "Float",
            Value::String(_) => "String",
            Value::Color(_) => "Color",
            Value::AColor(_) => "AColor",
            Value::Vector(_) => "Vector",
            Value::Matrix(_) => "Matrix",
            Value::Transform(_) => "Transform",
            Value::Ref(_) => "Ref",
            Value::IntList(_) => "IntList",
            Value::FloatList(_) => "FloatList",
            Value::StringList(_) => "StringList",
            Value::ColorList(_) => "ColorList",
            Value::AColorList(_) => "AColorList",
            Value::VectorList(_) => "VectorList",
            Value::MatrixList(_) => "MatrixList",
            Value::TransformList(_) => "TransformList",
            Value::RefList(_) => "RefList",
            Value::List(_) => "List",
            Value::MapChannels(_) => "MapChannels",
            Value::Instancer(_) => "Instancer",
        }
    }

    /// Check if this is the unknown value
    pub fn is_unknown(&self) -> bool {
        matches!(self, Value::Unknown)
    }

    /// Check if this is a generic untyped list
    pub fn is_generic_list(&self) -> bool {
        matches!(self, Value::List(_))
    }

    /// Get as i32 if this is an Int value
    pub fn as_int(&self) -> Option<i32> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Get as f32 if this is a Float value
    pub fn as_float(&self) -> Option<f32> {
        match self {
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Get as &str if this is a String value
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Get as &EntityRef if this is a Ref value
    pub fn as_entity_ref(&self) -> Option<&EntityRef> {
        match self {
            Value::Ref(r) => Some(r),
            _ => None,
        }
    }

    /// Number of scalar elements held by a sequence-like value.
    ///
    /// Scalars report 0. Mapping channels report the sum of all vertex and
    /// face counts, instancers their instance count.
    pub fn element_count(&self) -> usize {
        match self {
            Value::IntList(v) => v.len(),
            Value::FloatList(v) => v.len(),
            Value::StringList(v) => v.len(),
            Value::ColorList(v) => v.len(),
            Value::AColorList(v) => v.len(),
            Value::VectorList(v) => v.len(),
            Value::MatrixList(v) => v.len(),
            Value::TransformList(v) => v.len(),
            Value::RefList(v) => v.len(),
            Value::List(v) => v.iter().map(|e| e.element_count().max(1)).sum(),
            Value::MapChannels(m) => m
                .values()
                .map(|c| c.vertices.len() + c.faces.len())
                .sum(),
            Value::Instancer(i) => i.items.len(),
            _ => 0,
        }
    }

    /// Whether this value is a homogeneous numeric array with a raw binary form
    pub fn is_numeric_array(&self) -> bool {
        matches!(
            self,
            Value::IntList(_) | Value::FloatList(_) | Value::ColorList(_) | Value::VectorList(_)
        )
    }

    /// Raw little-endian bytes of a homogeneous numeric array.
    ///
    /// Returns `None` for every other variant.
    pub fn raw_le_bytes(&self) -> Option<Vec<u8>> {
        let mut out = Vec::new();
        match self {
            Value::IntList(v) => {
                out.reserve(v.len() * 4);
                for i in v.iter() {
                    out.write_i32::<LittleEndian>(*i).ok()?;
                }
            }
            Value::FloatList(v) => {
                out.reserve(v.len() * 4);
                for f in v.iter() {
                    out.write_f32::<LittleEndian>(*f).ok()?;
                }
            }
            Value::ColorList(v) => {
                out.reserve(v.len() * 12);
                for c in v.iter() {
                    for f in [c.r, c.g, c.b] {
                        out.write_f32::<LittleEndian>(f).ok()?;
                    }
                }
            }
            Value::VectorList(v) => {
                out.reserve(v.len() * 12);
                for c in v.iter() {
                    for f in [c.x, c.y, c.z] {
                        out.write_f32::<LittleEndian>(f).ok()?;
                    }
                }
            }
            _ => return None,
        }
        Some(out)
    }
}

// ============================================================================
// Output token grammar
// ============================================================================

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Color({},{},{})", self.r, self.g, self.b)
    }
}

impl fmt::Display for AColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let c = &self.color;
        write!(f, "AColor({},{},{},{})", c.r, c.g, c.b, self.alpha)
    }
}

impl fmt::Display for Vector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Vector({},{},{})", self.x, self.y, self.z)
    }
}

impl fmt::Display for Matrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Matrix({},{},{})", self.v[0], self.v[1], self.v[2])
    }
}

impl fmt::Display for Transform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Transform({},{})", self.matrix, self.offset)
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.output {
            Some(output) => write!(f, "{}::{}", self.name, output),
            None => f.write_str(&self.name),
        }
    }
}

// ============================================================================
// From implementations for ergonomic API usage
// ============================================================================

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Int(i32::from(b))
    }
}

impl From<f32> for Value {
    fn from(f: f32) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<Color> for Value {
    fn from(c: Color) -> Self {
        Value::Color(c)
    }
}

impl From<AColor> for Value {
    fn from(c: AColor) -> Self {
        Value::AColor(c)
    }
}

impl From<Vector> for Value {
    fn from(v: Vector) -> Self {
        Value::Vector(v)
    }
}

impl From<Matrix> for Value {
    fn from(m: Matrix) -> Self {
        Value::Matrix(m)
    }
}

impl From<Transform> for Value {
    fn from(t: Transform) -> Self {
        Value::Transform(t)
    }
}

impl From<EntityRef> for Value {
    fn from(r: EntityRef) -> Self {
        Value::Ref(r)
    }
}

impl From<Vec<i32>> for Value {
    fn from(v: Vec<i32>) -> Self {
        Value::IntList(v.into())
    }
}

impl From<Vec<f32>> for Value {
    fn from(v: Vec<f32>) -> Self {
        Value::FloatList(v.into())
    }
}

impl From<Vec<String>> for Value {
    fn from(v: Vec<String>) -> Self {
        Value::StringList(v.into())
    }
}

impl From<Vec<Color>> for Value {
    fn from(v: Vec<Color>) -> Self {
        Value::ColorList(v.into())
    }
}

impl From<Vec<Vector>> for Value {
    fn from(v: Vec<Vector>) -> Self {
        Value::VectorList(v.into())
    }
}

impl From<Vec<Transform>> for Value {
    fn from(v: Vec<Transform>) -> Self {
        Value::TransformList(v.into())
    }
}

impl From<Vec<EntityRef>> for Value {
    fn from(v: Vec<EntityRef>) -> Self {
        Value::RefList(v.into())
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::List(v.into())
    }
}

impl From<InstancerArray> for Value {
    fn from(i: InstancerArray) -> Self {
        Value::Instancer(Arc::new(i))
    }
}
