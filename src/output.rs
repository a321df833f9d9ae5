//! Exporting typed records.
//!
//! Records are first encoded into [`RawValue`]s, the same shape the readers
//! produce, and then written by a format-specific [`Exporter`]. Encoding
//! follows one of three [`TypeStyle`]s:
//!
//! - **scheme**: a value is written bare when its type and no-index flag match
//!   its column in the emitted scheme, and tagged with a direct-type marker
//!   otherwise. Values without a scheme column (nested ones included) are
//!   tagged whenever re-importing them by inference would change them.
//! - **direct**: every value is tagged.
//! - **auto**: only keys, geo points and blobs are tagged.
//!
//! # Examples
//!
//! ```
//! use dsio::entity::{Property, TypedValue};
//! use dsio::output::{Encoder, TypeStyle};
//! use dsio::RawValue;
//!
//! let encoder = Encoder::new(TypeStyle::Direct);
//! let property = Property::new("pages", TypedValue::Integer(311)).no_index(true);
//!
//! assert_eq!(
//!     encoder.encode_property(&property),
//!     RawValue::Mapping(vec![
//!         ("__integer__".to_string(), RawValue::Integer(311)),
//!         ("__noindex__".to_string(), RawValue::Boolean(true)),
//!     ])
//! );
//! ```

pub mod csv;
pub mod yaml;

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::io::Write;
use std::str::FromStr;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::SecondsFormat;
use thiserror::Error;

use crate::entity::{Entity, Key, KeyId, Property, TypedValue};
use crate::reader::Format;
use crate::resolver::looks_like_timestamp;
use crate::schema::{DataType, KEY_FIELD, NO_INDEX_MARKER};
use crate::value::RawValue;

/// Errors raised while writing exported records.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("can not write output: {0}")]
    Io(#[from] std::io::Error),

    #[error("can not encode YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("can not write tabular output: {0}")]
    Csv(#[from] ::csv::Error),

    #[error("unknown type style '{0}', expected scheme, direct or auto")]
    UnknownStyle(String),
}

/// How values are tagged with their types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TypeStyle {
    #[default]
    Scheme,
    Direct,
    Auto,
}

impl FromStr for TypeStyle {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "scheme" => Ok(TypeStyle::Scheme),
            "direct" => Ok(TypeStyle::Direct),
            "auto" => Ok(TypeStyle::Auto),
            _ => Err(ExportError::UnknownStyle(s.to_string())),
        }
    }
}

impl fmt::Display for TypeStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeStyle::Scheme => write!(f, "scheme"),
            TypeStyle::Direct => write!(f, "direct"),
            TypeStyle::Auto => write!(f, "auto"),
        }
    }
}

/// One exported column: a property name with the type and no-index flag of
/// the first value seen for it.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyInfo {
    pub name: String,
    pub data_type: DataType,
    pub no_index: bool,
}

/// Columns of a batch, sorted by property name.
pub fn collect_columns(entities: &[Entity]) -> Vec<PropertyInfo> {
    let mut columns: BTreeMap<&str, PropertyInfo> = BTreeMap::new();
    for property in entities.iter().flat_map(|e| &e.properties) {
        columns
            .entry(property.name.as_str())
            .or_insert_with(|| PropertyInfo {
                name: property.name.clone(),
                data_type: property.value.data_type(),
                no_index: property.no_index,
            });
    }
    columns.into_values().collect()
}

/// Column order accumulated across batches. New names are appended, existing
/// ones never move or disappear.
#[derive(Debug, Clone, Default)]
pub struct ColumnSet {
    columns: Vec<PropertyInfo>,
}

impl ColumnSet {
    pub fn new() -> Self {
        ColumnSet::default()
    }

    /// Appends the names of `batch` not seen yet. Returns whether any were.
    pub fn extend(&mut self, batch: impl IntoIterator<Item = PropertyInfo>) -> bool {
        let before = self.columns.len();
        for info in batch {
            if self.get(&info.name).is_none() {
                self.columns.push(info);
            }
        }
        self.columns.len() != before
    }

    pub fn get(&self, name: &str) -> Option<&PropertyInfo> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn columns(&self) -> &[PropertyInfo] {
        &self.columns
    }

    pub fn names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// Encodes typed values into raw values in one [`TypeStyle`].
#[derive(Debug, Clone)]
pub struct Encoder {
    style: TypeStyle,
    scheme: HashMap<String, PropertyInfo>,
}

impl Encoder {
    pub fn new(style: TypeStyle) -> Self {
        Encoder {
            style,
            scheme: HashMap::new(),
        }
    }

    pub fn style(&self) -> TypeStyle {
        self.style
    }

    /// Records the columns declared in the emitted scheme.
    pub fn set_scheme(&mut self, columns: &[PropertyInfo]) {
        self.scheme = columns
            .iter()
            .map(|c| (c.name.clone(), c.clone()))
            .collect();
    }

    /// A record with its `__key__` first and its properties in stored order.
    pub fn encode_entity(&self, entity: &Entity) -> RawValue {
        let mut entries = Vec::with_capacity(entity.properties.len() + 1);
        entries.push((KEY_FIELD.to_string(), encode_entity_key(&entity.key)));
        for property in &entity.properties {
            entries.push((property.name.clone(), self.encode_property(property)));
        }
        RawValue::Mapping(entries)
    }

    /// A top-level property value.
    pub fn encode_property(&self, property: &Property) -> RawValue {
        if self.tags_property(property) {
            self.tagged(&property.value, property.no_index)
        } else {
            self.payload(&property.value)
        }
    }

    /// Whether a top-level property is written with its type marker.
    pub fn tags_property(&self, property: &Property) -> bool {
        match (self.style, self.scheme.get(&property.name)) {
            (TypeStyle::Scheme, Some(column)) => {
                column.data_type != property.value.data_type()
                    || column.no_index != property.no_index
            }
            _ => self.needs_tag(&property.value, property.no_index),
        }
    }

    /// A value with no scheme column to lean on.
    pub fn encode_value(&self, value: &TypedValue, no_index: bool) -> RawValue {
        if self.needs_tag(value, no_index) {
            self.tagged(value, no_index)
        } else {
            self.payload(value)
        }
    }

    fn needs_tag(&self, value: &TypedValue, no_index: bool) -> bool {
        let plain = !matches!(
            value.data_type(),
            DataType::Key | DataType::Geo | DataType::Blob
        );
        match self.style {
            TypeStyle::Direct => true,
            TypeStyle::Auto => !plain,
            TypeStyle::Scheme => {
                !plain
                    || no_index
                    || matches!(value, TypedValue::String(s) if looks_like_timestamp(s))
            }
        }
    }

    /// `{marker: payload}`, plus the no-index flag when set.
    pub fn tagged(&self, value: &TypedValue, no_index: bool) -> RawValue {
        let mut entries = vec![(value.data_type().marker().to_string(), self.payload(value))];
        if no_index {
            entries.push((NO_INDEX_MARKER.to_string(), RawValue::Boolean(true)));
        }
        RawValue::Mapping(entries)
    }

    /// The untagged form of a value. Elements and embedded properties are
    /// still encoded in this encoder's style.
    pub fn payload(&self, value: &TypedValue) -> RawValue {
        match value {
            TypedValue::Null => RawValue::Null,
            TypedValue::Boolean(b) => RawValue::Boolean(*b),
            TypedValue::Integer(n) => RawValue::Integer(*n),
            TypedValue::Float(n) => RawValue::Float(*n),
            TypedValue::String(s) => RawValue::String(s.clone()),
            TypedValue::Datetime(t) => RawValue::String(format_datetime(t)),
            TypedValue::Key(key) => encode_key(key),
            TypedValue::Geo(geo) => {
                RawValue::Sequence(vec![RawValue::Float(geo.lat), RawValue::Float(geo.lng)])
            }
            TypedValue::Blob(bytes) => RawValue::String(STANDARD.encode(bytes)),
            TypedValue::Array(items) => RawValue::Sequence(
                items
                    .iter()
                    .map(|item| self.encode_value(item, false))
                    .collect(),
            ),
            TypedValue::Embedded(properties) => RawValue::Mapping(
                properties
                    .iter()
                    .map(|p| (p.name.clone(), self.encode_value(&p.value, p.no_index)))
                    .collect(),
            ),
        }
    }
}

pub(crate) fn format_datetime(t: &chrono::DateTime<chrono::FixedOffset>) -> String {
    t.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

/// Full `[kind, id, kind, id, ...]` path of a key, root first.
pub fn encode_key(key: &Key) -> RawValue {
    let mut items = Vec::new();
    for segment in key.path() {
        items.push(RawValue::String(segment.kind.clone()));
        match &segment.id {
            KeyId::Name(name) => items.push(RawValue::String(name.clone())),
            KeyId::Id(id) => items.push(RawValue::Integer(*id)),
            KeyId::Incomplete => {}
        }
    }
    RawValue::Sequence(items)
}

/// A record's own key: the bare id for a complete root key, the full path
/// otherwise.
pub fn encode_entity_key(key: &Key) -> RawValue {
    if key.parent().is_none() {
        match &key.id {
            KeyId::Id(id) => return RawValue::Integer(*id),
            KeyId::Name(name) if !name.starts_with('[') => return RawValue::String(name.clone()),
            _ => {}
        }
    }
    encode_key(key)
}

/// Writes pages of records.
pub trait Exporter {
    /// Writes the scheme inferred from the first page.
    fn dump_scheme(&mut self, entities: &[Entity]) -> Result<(), ExportError>;

    /// Writes one page of records.
    fn dump_entities(&mut self, entities: &[Entity]) -> Result<(), ExportError>;
}

/// Exporter for `format`, writing to `writer`.
pub fn exporter<'a, W: Write + 'a>(
    writer: W,
    format: Format,
    style: TypeStyle,
    namespace: Option<&str>,
    kind: Option<&str>,
) -> Box<dyn Exporter + 'a> {
    match format.delimiter() {
        None => Box::new(yaml::YamlExporter::new(writer, style, namespace, kind)),
        Some(delimiter) => Box::new(self::csv::CsvExporter::new(writer, delimiter, style)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(name: &str) -> PropertyInfo {
        PropertyInfo {
            name: name.to_string(),
            data_type: DataType::String,
            no_index: false,
        }
    }

    #[test]
    fn test_column_set_appends() {
        let mut set = ColumnSet::new();
        assert!(set.extend(vec![info("b"), info("c")]));
        assert!(!set.extend(vec![info("b")]));
        assert!(set.extend(vec![info("a")]));
        assert_eq!(set.names(), vec!["b", "c", "a"]);
    }

    #[test]
    fn test_entity_key_forms() {
        let root = Key::id("Book", 7, None);
        assert_eq!(encode_entity_key(&root), RawValue::Integer(7));

        let child = Key::named("Page", "p1", Some(root.clone()));
        assert_eq!(
            encode_entity_key(&child),
            RawValue::Sequence(vec![
                RawValue::string("Book"),
                RawValue::Integer(7),
                RawValue::string("Page"),
                RawValue::string("p1"),
            ])
        );
    }

    #[test]
    fn test_scheme_style_tags_ambiguous_strings() {
        let encoder = Encoder::new(TypeStyle::Scheme);
        let value = TypedValue::String("2020-01-02".to_string());
        assert_eq!(
            encoder.encode_value(&value, false),
            RawValue::Mapping(vec![(
                "__string__".to_string(),
                RawValue::string("2020-01-02")
            )])
        );
        assert_eq!(
            encoder.encode_value(&TypedValue::String("x".to_string()), false),
            RawValue::string("x")
        );
    }
}
