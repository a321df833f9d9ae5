use std::fmt;

use chrono::{DateTime, FixedOffset};

use crate::entity::{Key, KeyId};

/// Type tag of a literal value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    Integer,
    Double,
    String,
    Bool,
    Key,
    Blob,
    Datetime,
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueType::Integer => "INTEGER",
            ValueType::Double => "DOUBLE",
            ValueType::String => "STRING",
            ValueType::Bool => "BOOL",
            ValueType::Key => "KEY",
            ValueType::Blob => "BLOB",
            ValueType::Datetime => "DATETIME",
        };
        f.write_str(name)
    }
}

/// Literal value on one side of a condition.
///
/// The literal is decoded at parse time: `BLOB(...)` holds the base64-decoded
/// bytes and `DATETIME(...)` the parsed RFC 3339 instant.
#[derive(Debug, Clone, PartialEq)]
pub enum ValueExpr {
    /// Literal integer
    ///
    /// # Example
    /// ```text
    /// 1234
    /// ```
    Integer(i64),

    /// Literal floating point number
    Double(f64),

    /// String literal
    ///
    /// # Example
    /// ```text
    /// 'Huxley'
    /// ```
    String(String),

    /// `TRUE` or `FALSE`
    Bool(bool),

    /// Key literal
    ///
    /// # Example
    /// ```text
    /// KEY(PROJECT('p'), NAMESPACE('n'), Author, 'Huxley', Book, 1234)
    /// ```
    Key(KeyLiteral),

    /// Blob literal
    ///
    /// # Example
    /// ```text
    /// BLOB('aGVsbG8=')
    /// ```
    Blob(Vec<u8>),

    /// Datetime literal
    ///
    /// # Example
    /// ```text
    /// DATETIME('2013-09-29T09:30:20-08:00')
    /// ```
    Datetime(DateTime<FixedOffset>),
}

impl ValueExpr {
    pub fn value_type(&self) -> ValueType {
        match self {
            ValueExpr::Integer(_) => ValueType::Integer,
            ValueExpr::Double(_) => ValueType::Double,
            ValueExpr::String(_) => ValueType::String,
            ValueExpr::Bool(_) => ValueType::Bool,
            ValueExpr::Key(_) => ValueType::Key,
            ValueExpr::Blob(_) => ValueType::Blob,
            ValueExpr::Datetime(_) => ValueType::Datetime,
        }
    }
}

/// One `kind, identifier` pair of a key literal path.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyPathElement {
    pub kind: String,
    /// `KeyId::Incomplete` for a trailing kind without identifier
    pub id: KeyId,
}

/// Parsed `KEY(...)` literal.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct KeyLiteral {
    pub project: Option<String>,
    pub namespace: Option<String>,
    /// Root first
    pub path: Vec<KeyPathElement>,
}

impl KeyLiteral {
    /// Builds the key chain, root first. The literal's own namespace wins over
    /// `namespace`.
    pub fn to_key(&self, namespace: Option<&str>) -> Option<Key> {
        let namespace = self.namespace.as_deref().or(namespace);

        let mut key: Option<Key> = None;
        for element in &self.path {
            key = Some(Key::new(
                element.kind.clone(),
                element.id.clone(),
                namespace.map(str::to_string),
                key,
            ));
        }
        key
    }
}
