//! Typed store values.
//!
//! These are the values a record holds once it has been resolved against its
//! scheme: the shape handed to the store on import and received from it on
//! export.

use std::cmp::Ordering;
use std::fmt;

use chrono::{DateTime, FixedOffset};

use crate::schema::DataType;

/// Identifier of one key segment.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum KeyId {
    /// Named key
    Name(String),
    /// Numeric id
    Id(i64),
    /// Not assigned yet; the store allocates an id on write
    Incomplete,
}

/// Hierarchical key. Each node owns its parent; the root has none.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Key {
    pub kind: String,
    pub id: KeyId,
    pub namespace: Option<String>,
    pub parent: Option<Box<Key>>,
}

impl Key {
    pub fn new(
        kind: impl Into<String>,
        id: KeyId,
        namespace: Option<String>,
        parent: Option<Key>,
    ) -> Self {
        Key {
            kind: kind.into(),
            id,
            namespace,
            parent: parent.map(Box::new),
        }
    }

    pub fn named(kind: impl Into<String>, name: impl Into<String>, parent: Option<Key>) -> Self {
        Key::new(kind, KeyId::Name(name.into()), None, parent)
    }

    pub fn id(kind: impl Into<String>, id: i64, parent: Option<Key>) -> Self {
        Key::new(kind, KeyId::Id(id), None, parent)
    }

    pub fn incomplete(kind: impl Into<String>, parent: Option<Key>) -> Self {
        Key::new(kind, KeyId::Incomplete, None, parent)
    }

    pub fn with_namespace(mut self, namespace: Option<String>) -> Self {
        self.parent = self
            .parent
            .map(|p| Box::new(p.with_namespace(namespace.clone())));
        self.namespace = namespace;
        self
    }

    pub fn is_complete(&self) -> bool {
        self.id != KeyId::Incomplete
    }

    pub fn parent(&self) -> Option<&Key> {
        self.parent.as_deref()
    }

    /// Segments from the root down to this key.
    pub fn path(&self) -> Vec<&Key> {
        let mut path = vec![self];
        let mut current = self;
        while let Some(parent) = current.parent() {
            path.push(parent);
            current = parent;
        }
        path.reverse();
        path
    }

    /// Whether `ancestor` is this key or one of its parents.
    pub fn has_ancestor(&self, ancestor: &Key) -> bool {
        let mut current = Some(self);
        while let Some(key) = current {
            if key == ancestor {
                return true;
            }
            current = key.parent();
        }
        false
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let segments: Vec<String> = self
            .path()
            .iter()
            .map(|k| match &k.id {
                KeyId::Name(name) => format!("{}:{:?}", k.kind, name),
                KeyId::Id(id) => format!("{}:{}", k.kind, id),
                KeyId::Incomplete => format!("{}:?", k.kind),
            })
            .collect();
        write!(f, "{}", segments.join("/"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

/// A strongly typed store value.
#[derive(Debug, Clone, PartialEq)]
pub enum TypedValue {
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
    Datetime(DateTime<FixedOffset>),
    Key(Key),
    Geo(GeoPoint),
    Blob(Vec<u8>),
    Array(Vec<TypedValue>),
    /// Embedded record without a key
    Embedded(Vec<Property>),
}

impl TypedValue {
    pub fn data_type(&self) -> DataType {
        match self {
            TypedValue::Null => DataType::Null,
            TypedValue::Boolean(_) => DataType::Boolean,
            TypedValue::Integer(_) => DataType::Integer,
            TypedValue::Float(_) => DataType::Float,
            TypedValue::String(_) => DataType::String,
            TypedValue::Datetime(_) => DataType::Datetime,
            TypedValue::Key(_) => DataType::Key,
            TypedValue::Geo(_) => DataType::Geo,
            TypedValue::Blob(_) => DataType::Blob,
            TypedValue::Array(_) => DataType::Array,
            TypedValue::Embedded(_) => DataType::Embed,
        }
    }

    /// Orders two values of the same type; `None` across types and for
    /// composite values.
    pub fn compare(&self, other: &TypedValue) -> Option<Ordering> {
        use TypedValue::*;
        match (self, other) {
            (Null, Null) => Some(Ordering::Equal),
            (Boolean(a), Boolean(b)) => a.partial_cmp(b),
            (Integer(a), Integer(b)) => a.partial_cmp(b),
            (Float(a), Float(b)) => a.partial_cmp(b),
            (Integer(a), Float(b)) => (*a as f64).partial_cmp(b),
            (Float(a), Integer(b)) => a.partial_cmp(&(*b as f64)),
            (String(a), String(b)) => a.partial_cmp(b),
            (Datetime(a), Datetime(b)) => a.partial_cmp(b),
            (Blob(a), Blob(b)) => a.partial_cmp(b),
            (Key(a), Key(b)) => (a == b).then_some(Ordering::Equal),
            _ => None,
        }
    }
}

/// A named value with its no-index flag.
#[derive(Debug, Clone, PartialEq)]
pub struct Property {
    pub name: String,
    pub value: TypedValue,
    pub no_index: bool,
}

impl Property {
    pub fn new(name: impl Into<String>, value: TypedValue) -> Self {
        Property {
            name: name.into(),
            value,
            no_index: false,
        }
    }

    pub fn no_index(mut self, no_index: bool) -> Self {
        self.no_index = no_index;
        self
    }
}

/// A keyed record. Property names are unique.
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    pub key: Key,
    pub properties: Vec<Property>,
}

impl Entity {
    pub fn new(key: Key, properties: Vec<Property>) -> Self {
        Entity { key, properties }
    }

    pub fn property(&self, name: &str) -> Option<&Property> {
        self.properties.iter().find(|p| p.name == name)
    }

    pub fn get(&self, name: &str) -> Option<&TypedValue> {
        self.property(name).map(|p| &p.value)
    }
}
