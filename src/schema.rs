//! Declarative per-kind type metadata.
//!
//! A record file carries an optional `scheme` naming the kind, its namespace
//! and the type of some or all properties. Properties without a declaration are
//! inferred from their values.
//!
//! ```yaml
//! scheme:
//!   namespace: library
//!   kind: Book
//!   key: isbn
//!   time-format: "%Y/%m/%d %H:%M"
//!   time-locale: "+09:00"
//!   properties:
//!     title: string
//!     summary: [string, noindex]
//!     created: datetime
//! default:
//!   created: __current__
//! entities:
//!   - __key__: ["Author", "Huxley", "Book", 1234]
//!     title: Brave New World
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

use crate::resolver::ResolveError;
use crate::value::RawValue;

/// Reserved record field holding the key specification.
pub const KEY_FIELD: &str = "__key__";
/// Sentinel datetime value meaning "now".
pub const CURRENT_DATETIME: &str = "__current__";
/// Boolean flag key accompanying a direct-type marker.
pub const NO_INDEX_MARKER: &str = "__noindex__";
/// Second element of a `[type, noindex]` descriptor.
pub const NO_INDEX_VALUE: &str = "noindex";
/// Suffix of a tabular type cell for a no-index column.
pub const CSV_NO_INDEX_SUFFIX: &str = ":noindex";

/// Store value types, as named in schemes and type markers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    String,
    Datetime,
    Integer,
    Float,
    Boolean,
    Key,
    Geo,
    Array,
    Embed,
    Blob,
    Null,
}

impl DataType {
    pub const ALL: [DataType; 11] = [
        DataType::String,
        DataType::Datetime,
        DataType::Integer,
        DataType::Float,
        DataType::Boolean,
        DataType::Key,
        DataType::Geo,
        DataType::Array,
        DataType::Embed,
        DataType::Blob,
        DataType::Null,
    ];

    /// Canonical name.
    pub fn as_str(self) -> &'static str {
        match self {
            DataType::String => "string",
            DataType::Datetime => "datetime",
            DataType::Integer => "integer",
            DataType::Float => "float",
            DataType::Boolean => "boolean",
            DataType::Key => "key",
            DataType::Geo => "geo",
            DataType::Array => "array",
            DataType::Embed => "embed",
            DataType::Blob => "blob",
            DataType::Null => "null",
        }
    }

    /// Canonical direct-type marker key, e.g. `__integer__`.
    pub fn marker(self) -> &'static str {
        match self {
            DataType::String => "__string__",
            DataType::Datetime => "__datetime__",
            DataType::Integer => "__integer__",
            DataType::Float => "__float__",
            DataType::Boolean => "__boolean__",
            DataType::Key => "__key__",
            DataType::Geo => "__geo__",
            DataType::Array => "__array__",
            DataType::Embed => "__embed__",
            DataType::Blob => "__blob__",
            DataType::Null => "__null__",
        }
    }

    /// Parses a type name, accepting the aliases `int`, `bool` and `embedded`.
    pub fn from_name(name: &str) -> Option<DataType> {
        match name {
            "int" => Some(DataType::Integer),
            "bool" => Some(DataType::Boolean),
            "embedded" => Some(DataType::Embed),
            _ => DataType::ALL.iter().copied().find(|t| t.as_str() == name),
        }
    }

    /// Parses a marker key such as `__int__`.
    pub fn from_marker(key: &str) -> Option<DataType> {
        key.strip_prefix("__")
            .and_then(|k| k.strip_suffix("__"))
            .and_then(DataType::from_name)
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DataType {
    type Err = ResolveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DataType::from_name(s)
            .ok_or_else(|| ResolveError::Schema(format!("property type '{}' is not supported", s)))
    }
}

/// Declared type of one property: `string` or `[string, noindex]`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum TypeDescriptor {
    Bare(String),
    Flagged(String, String),
}

impl TypeDescriptor {
    pub fn new(data_type: DataType, no_index: bool) -> Self {
        if no_index {
            TypeDescriptor::Flagged(data_type.as_str().to_string(), NO_INDEX_VALUE.to_string())
        } else {
            TypeDescriptor::Bare(data_type.as_str().to_string())
        }
    }

    /// The declared type and its no-index flag.
    pub fn resolve(&self) -> Result<(DataType, bool), ResolveError> {
        match self {
            TypeDescriptor::Bare(name) => Ok((name.parse()?, false)),
            TypeDescriptor::Flagged(name, flag) => Ok((name.parse()?, flag == NO_INDEX_VALUE)),
        }
    }
}

/// Per-kind type metadata.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct Scheme {
    pub namespace: Option<String>,

    pub kind: Option<String>,

    /// Property whose value doubles as the record key when `__key__` is absent
    pub key: Option<String>,

    /// chrono `strftime` pattern for declared datetimes
    #[serde(rename = "time-format")]
    pub time_format: Option<String>,

    /// `UTC`, `Local` or a fixed offset such as `+09:00`
    #[serde(rename = "time-locale")]
    pub time_locale: Option<String>,

    /// A `null` descriptor declares the `null` type
    pub properties: BTreeMap<String, Option<TypeDescriptor>>,
}

impl Scheme {
    /// Declared type of `name`, `None` when it should be inferred.
    pub fn property_type(&self, name: &str) -> Result<Option<(DataType, bool)>, ResolveError> {
        match self.properties.get(name) {
            None => Ok(None),
            Some(None) => Ok(Some((DataType::Null, false))),
            Some(Some(descriptor)) => descriptor.resolve().map(Some),
        }
    }

    /// Reconciles the kind and namespace given on the command line with the
    /// ones declared in the file. Both present and different is an error;
    /// otherwise whichever is present wins. A kind is required afterwards.
    pub fn reconcile(
        &mut self,
        kind: Option<&str>,
        namespace: Option<&str>,
    ) -> Result<(), ResolveError> {
        self.kind = reconcile_field("kind", kind, self.kind.as_deref())?;
        self.namespace = reconcile_field("namespace", namespace, self.namespace.as_deref())?;

        if self.kind.is_none() {
            return Err(ResolveError::Schema("kind should be specified".to_string()));
        }
        Ok(())
    }
}

fn reconcile_field(
    what: &str,
    option: Option<&str>,
    file: Option<&str>,
) -> Result<Option<String>, ResolveError> {
    let option = option.filter(|s| !s.is_empty());
    let file = file.filter(|s| !s.is_empty());

    match (option, file) {
        (Some(o), Some(f)) if o != f => Err(ResolveError::Schema(format!(
            "different {}. option:'{}' != file:'{}'",
            what, o, f
        ))),
        (Some(v), _) | (None, Some(v)) => Ok(Some(v.to_string())),
        (None, None) => Ok(None),
    }
}

/// A raw record: property name to value, in file order. `__key__` holds the
/// key specification.
pub type RawEntity = Vec<(String, RawValue)>;

/// Contents of one record file.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct KindData {
    pub scheme: Scheme,
    /// Values for properties a record does not set
    pub defaults: Vec<(String, RawValue)>,
    pub entities: Vec<RawEntity>,
}
