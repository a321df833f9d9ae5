use thiserror::Error;

use crate::entity::{Key, KeyId};
use crate::value::RawValue;

/// A raw key specification that cannot form a key.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum KeyFormatError {
    #[error("key should be string or integer: {0}")]
    InvalidId(String),

    #[error("key kind should be a scalar: {0}")]
    InvalidKind(String),

    #[error("key path is empty")]
    Empty,

    #[error("can not decode key path '{text}': {reason}")]
    Json { text: String, reason: String },
}

/// Builds a key from its raw specification.
///
/// A scalar is a single segment of `default_kind`. A sequence alternates kind
/// and identifier, root first; an odd length leaves a trailing incomplete
/// segment. A string wrapped in `[...]` is decoded as a JSON sequence first,
/// which is how tabular cells carry paths.
pub fn resolve_key_path(
    raw: &RawValue,
    default_kind: &str,
    namespace: Option<&str>,
) -> Result<Key, KeyFormatError> {
    let decoded;
    let raw = match raw {
        RawValue::String(s) if s.starts_with('[') && s.ends_with(']') => {
            decoded = RawValue::from_json_str(s).map_err(|e| KeyFormatError::Json {
                text: s.clone(),
                reason: e.to_string(),
            })?;
            &decoded
        }
        other => other,
    };

    let namespace = namespace.filter(|ns| !ns.is_empty()).map(str::to_string);

    let RawValue::Sequence(items) = raw else {
        let id = key_id(raw)?;
        return Ok(Key::new(default_kind, id, namespace, None));
    };

    let mut key: Option<Key> = None;
    for pair in items.chunks(2) {
        let kind = key_kind(&pair[0])?;
        let id = match pair.get(1) {
            Some(id) => key_id(id)?,
            None => KeyId::Incomplete,
        };
        key = Some(Key::new(kind, id, namespace.clone(), key));
    }

    key.ok_or(KeyFormatError::Empty)
}

fn key_kind(raw: &RawValue) -> Result<String, KeyFormatError> {
    match raw {
        RawValue::Sequence(_) | RawValue::Mapping(_) | RawValue::Null => {
            Err(KeyFormatError::InvalidKind(raw.to_json_string()))
        }
        other => Ok(other.to_string()),
    }
}

fn key_id(raw: &RawValue) -> Result<KeyId, KeyFormatError> {
    match raw {
        RawValue::String(name) => Ok(KeyId::Name(name.clone())),
        RawValue::Integer(id) => Ok(KeyId::Id(*id)),
        other => Err(KeyFormatError::InvalidId(format!(
            "{} ({})",
            other.to_json_string(),
            other.type_name()
        ))),
    }
}
