//! Entity descriptors
//!
//! A `Descriptor` is the named, typed record of attributes describing one
//! exportable entity. It is a pure data holder: descriptors are never
//! compared structurally, because a descriptor may legitimately hold only a
//! subset of an entity's attributes (a delta). Change detection goes
//! through the fingerprints in [`crate::fingerprint`].
//!
//! Attributes are kept in name order so iteration, fingerprints and the
//! rendered output are deterministic.

use crate::category::Category;
use crate::value::Value;
use std::collections::BTreeMap;

/// How an attribute value is to be interpreted by writers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AttrKind {
    /// Ordinary data
    #[default]
    Data,
    /// File or directory path; never interpolated
    Path,
}

/// One attribute: value plus optional time sample
#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    /// The value
    pub value: Value,
    /// Sample time; `None` means "no time"
    pub time: Option<f64>,
    /// Interpretation hint
    pub kind: AttrKind,
}

impl Attribute {
    /// A data attribute without a time sample
    pub fn new(value: Value) -> Self {
        Self {
            value,
            time: None,
            kind: AttrKind::Data,
        }
    }
}

/// Named, typed record of attributes for one exportable entity
#[derive(Debug, Clone)]
pub struct Descriptor {
    name: String,
    type_id: String,
    category: Category,
    attributes: BTreeMap<String, Attribute>,
}

impl Descriptor {
    /// Create an empty descriptor.
    ///
    /// `name` is the cache key and the entity identifier in the output;
    /// `type_id` is the entity type rendered as the block header.
    pub fn new(name: impl Into<String>, type_id: impl Into<String>, category: Category) -> Self {
        Self {
            name: name.into(),
            type_id: type_id.into(),
            category,
            attributes: BTreeMap::new(),
        }
    }

    /// A descriptor with the same name, type and category but no attributes
    pub fn empty_like(&self) -> Self {
        Self::new(self.name.clone(), self.type_id.clone(), self.category)
    }

    /// Entity name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Entity type string
    pub fn type_id(&self) -> &str {
        &self.type_id
    }

    /// Destination category
    pub fn category(&self) -> Category {
        self.category
    }

    /// Insert or replace a data attribute
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>, time: Option<f64>) {
        self.attributes.insert(
            name.into(),
            Attribute {
                value: value.into(),
                time,
                kind: AttrKind::Data,
            },
        );
    }

    /// Insert or replace a file/directory path attribute
    pub fn set_path(
        &mut self,
        name: impl Into<String>,
        path: impl Into<String>,
        time: Option<f64>,
    ) {
        self.attributes.insert(
            name.into(),
            Attribute {
                value: Value::String(path.into()),
                time,
                kind: AttrKind::Path,
            },
        );
    }

    /// Insert or replace a fully formed attribute
    pub fn insert(&mut self, name: impl Into<String>, attribute: Attribute) {
        self.attributes.insert(name.into(), attribute);
    }

    /// Builder-style `set` without a time sample
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(name, value, None);
        self
    }

    /// Builder-style insertion of several untimed attributes
    pub fn with_attributes<K, V>(mut self, attributes: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
    {
        for (name, value) in attributes {
            self.set(name, value, None);
        }
        self
    }

    /// Look up an attribute
    pub fn get(&self, name: &str) -> Option<&Attribute> {
        self.attributes.get(name)
    }

    /// Look up an attribute's value
    pub fn value(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name).map(|a| &a.value)
    }

    /// Whether the attribute is present
    pub fn contains(&self, name: &str) -> bool {
        self.attributes.contains_key(name)
    }

    /// Remove an attribute, returning it if present
    pub fn remove(&mut self, name: &str) -> Option<Attribute> {
        self.attributes.remove(name)
    }

    /// Number of attributes
    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    /// Whether there are no attributes
    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    /// Attributes in name order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Attribute)> {
        self.attributes.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Attribute names in name order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.attributes.keys().map(String::as_str)
    }
}
