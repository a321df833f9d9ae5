/// A loosely typed value as read from a record file.
///
/// Every document format (YAML, JSON cells, CSV cells) is converted into this
/// closed set once, at the reading boundary. The resolver then works on it
/// without looking at the original format.
///
/// # Examples
///
/// ```
/// use dsio::RawValue;
///
/// let key = RawValue::Sequence(vec![
///     RawValue::String("Author".to_string()),
///     RawValue::String("Huxley".to_string()),
/// ]);
/// let record = RawValue::Mapping(vec![("__key__".to_string(), key)]);
/// assert!(record.get("__key__").is_some());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Null,

    Boolean(bool),

    Integer(i64),

    Float(f64),

    String(String),

    Sequence(Vec<RawValue>),

    /// Entries in document order
    Mapping(Vec<(String, RawValue)>),
}

impl RawValue {
    pub fn string(s: impl Into<String>) -> Self {
        RawValue::String(s.into())
    }

    /// Looks up a mapping entry.
    pub fn get(&self, name: &str) -> Option<&RawValue> {
        match self {
            RawValue::Mapping(entries) => entries.iter().find(|(k, _)| k == name).map(|(_, v)| v),
            _ => None,
        }
    }

    pub fn is_scalar(&self) -> bool {
        !matches!(self, RawValue::Sequence(_) | RawValue::Mapping(_))
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            RawValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Text of a scalar, the way it would be written in a cell.
    pub fn as_text(&self) -> Option<String> {
        match self {
            RawValue::Null => Some(String::new()),
            RawValue::Boolean(b) => Some(b.to_string()),
            RawValue::Integer(n) => Some(n.to_string()),
            RawValue::Float(n) => Some(n.to_string()),
            RawValue::String(s) => Some(s.clone()),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            RawValue::Null => "null",
            RawValue::Boolean(_) => "boolean",
            RawValue::Integer(_) => "integer",
            RawValue::Float(_) => "float",
            RawValue::String(_) => "string",
            RawValue::Sequence(_) => "sequence",
            RawValue::Mapping(_) => "mapping",
        }
    }

    /// Compact JSON rendering, used in error messages and tabular cells.
    pub fn to_json_string(&self) -> String {
        serde_json::Value::from(self.clone()).to_string()
    }

    /// Decodes a JSON document.
    pub fn from_json_str(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str::<serde_json::Value>(text).map(RawValue::from)
    }
}

impl std::fmt::Display for RawValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RawValue::String(s) => write!(f, "{}", s),
            other => write!(f, "{}", other.to_json_string()),
        }
    }
}

impl From<serde_json::Value> for RawValue {
    fn from(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => RawValue::Null,
            serde_json::Value::Bool(b) => RawValue::Boolean(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => RawValue::Integer(i),
                None => RawValue::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => RawValue::String(s),
            serde_json::Value::Array(arr) => {
                RawValue::Sequence(arr.into_iter().map(RawValue::from).collect())
            }
            serde_json::Value::Object(obj) => {
                RawValue::Mapping(obj.into_iter().map(|(k, v)| (k, RawValue::from(v))).collect())
            }
        }
    }
}

impl From<RawValue> for serde_json::Value {
    fn from(v: RawValue) -> Self {
        match v {
            RawValue::Null => serde_json::Value::Null,
            RawValue::Boolean(b) => serde_json::Value::Bool(b),
            RawValue::Integer(i) => serde_json::Value::Number(i.into()),
            RawValue::Float(f) => serde_json::Number::from_f64(f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            RawValue::String(s) => serde_json::Value::String(s),
            RawValue::Sequence(seq) => {
                serde_json::Value::Array(seq.into_iter().map(serde_json::Value::from).collect())
            }
            RawValue::Mapping(entries) => serde_json::Value::Object(
                entries
                    .into_iter()
                    .map(|(k, v)| (k, serde_json::Value::from(v)))
                    .collect(),
            ),
        }
    }
}

impl From<serde_yaml::Value> for RawValue {
    fn from(v: serde_yaml::Value) -> Self {
        match v {
            serde_yaml::Value::Null => RawValue::Null,
            serde_yaml::Value::Bool(b) => RawValue::Boolean(b),
            serde_yaml::Value::Number(n) => match n.as_i64() {
                Some(i) => RawValue::Integer(i),
                None => RawValue::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_yaml::Value::String(s) => RawValue::String(s),
            serde_yaml::Value::Sequence(seq) => {
                RawValue::Sequence(seq.into_iter().map(RawValue::from).collect())
            }
            serde_yaml::Value::Mapping(map) => RawValue::Mapping(mapping_entries(map)),
            serde_yaml::Value::Tagged(tagged) => RawValue::from(tagged.value),
        }
    }
}

impl From<RawValue> for serde_yaml::Value {
    fn from(v: RawValue) -> Self {
        match v {
            RawValue::Null => serde_yaml::Value::Null,
            RawValue::Boolean(b) => serde_yaml::Value::Bool(b),
            RawValue::Integer(i) => serde_yaml::Value::Number(i.into()),
            RawValue::Float(f) => serde_yaml::Value::Number(f.into()),
            RawValue::String(s) => serde_yaml::Value::String(s),
            RawValue::Sequence(seq) => {
                serde_yaml::Value::Sequence(seq.into_iter().map(serde_yaml::Value::from).collect())
            }
            RawValue::Mapping(entries) => serde_yaml::Value::Mapping(
                entries
                    .into_iter()
                    .map(|(k, v)| (serde_yaml::Value::String(k), serde_yaml::Value::from(v)))
                    .collect(),
            ),
        }
    }
}

/// Converts a YAML mapping to ordered entries. Non-string keys are written out
/// as their scalar text.
pub fn mapping_entries(map: serde_yaml::Mapping) -> Vec<(String, RawValue)> {
    map.into_iter()
        .map(|(k, v)| {
            let name = match RawValue::from(k) {
                RawValue::String(s) => s,
                other => other.to_json_string(),
            };
            (name, RawValue::from(v))
        })
        .collect()
}
