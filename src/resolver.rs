//! Turns raw record values into typed store values.
//!
//! Each property is resolved by the first rule that applies:
//!
//! 1. a direct-type marker mapping (`{__integer__: "12", __noindex__: true}`),
//! 2. the type declared for the property in the scheme,
//! 3. structural inference from the value itself.
//!
//! Inference keeps numbers, booleans and nulls as they are, promotes strings
//! shaped like `2020-01-02` or `2020-01-02T03:04:05Z` to datetimes, turns
//! sequences into arrays and plain mappings into embedded records. Both
//! recursions apply the same rules to their elements.

use std::collections::HashSet;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{
    DateTime, FixedOffset, Local, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc,
};
use chrono_tz::Tz;
use lazy_static::lazy_static;
use regex::Regex;
use thiserror::Error;
use tracing::debug;

use crate::entity::{Entity, GeoPoint, Key, Property, TypedValue};
use crate::keys::{KeyFormatError, resolve_key_path};
use crate::schema::{
    CURRENT_DATETIME, DataType, KEY_FIELD, KindData, NO_INDEX_MARKER, RawEntity, Scheme,
};
use crate::value::RawValue;

lazy_static! {
    static ref DATE_PATTERN: Regex = Regex::new(r"^\d{4}-\d{2}-\d{2}$").unwrap();
    static ref TIMESTAMP_PATTERN: Regex =
        Regex::new(r"^\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}(\.\d+)?(Z|[-+]\d{2}:\d{2})$").unwrap();
}

/// Whether automatic inference would read `text` as a datetime.
pub fn looks_like_timestamp(text: &str) -> bool {
    DATE_PATTERN.is_match(text) || TIMESTAMP_PATTERN.is_match(text)
}

/// Errors raised while resolving records.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ResolveError {
    #[error("{0}")]
    Schema(String),

    #[error("can not parse '{raw}' as {data_type} for property '{property}': {reason}")]
    Coercion {
        property: String,
        data_type: DataType,
        raw: String,
        reason: String,
    },

    #[error(transparent)]
    KeyFormat(#[from] KeyFormatError),

    #[error("entity #{index}: {source}")]
    Entity {
        index: usize,
        #[source]
        source: Box<ResolveError>,
    },
}

/// Time zone naive timestamps are read in.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TimeLocale {
    Utc,
    Local,
    /// An IANA zone such as `Asia/Tokyo`, daylight saving included
    Named(Tz),
    Fixed(FixedOffset),
}

impl TimeLocale {
    pub fn parse(locale: Option<&str>) -> Result<Self, ResolveError> {
        match locale.map(str::trim) {
            None | Some("") => Ok(TimeLocale::Utc),
            Some(s) if s.eq_ignore_ascii_case("utc") => Ok(TimeLocale::Utc),
            Some(s) if s.eq_ignore_ascii_case("local") => Ok(TimeLocale::Local),
            Some(s) => {
                if let Ok(tz) = s.parse::<Tz>() {
                    return Ok(TimeLocale::Named(tz));
                }
                s.parse::<FixedOffset>().map(TimeLocale::Fixed).map_err(|_| {
                    ResolveError::Schema(format!(
                        "time-locale '{}' should be UTC, Local, a zone like Asia/Tokyo \
                         or an offset like +09:00",
                        s
                    ))
                })
            }
        }
    }

    fn now(self) -> DateTime<FixedOffset> {
        match self {
            TimeLocale::Utc => Utc::now().fixed_offset(),
            TimeLocale::Local => Local::now().fixed_offset(),
            TimeLocale::Named(tz) => Utc::now().with_timezone(&tz).fixed_offset(),
            TimeLocale::Fixed(offset) => Utc::now().with_timezone(&offset),
        }
    }

    fn localize(self, naive: NaiveDateTime) -> Option<DateTime<FixedOffset>> {
        match self {
            TimeLocale::Utc => Some(Utc.from_utc_datetime(&naive).fixed_offset()),
            TimeLocale::Local => Local
                .from_local_datetime(&naive)
                .earliest()
                .map(|t| t.fixed_offset()),
            TimeLocale::Named(tz) => tz
                .from_local_datetime(&naive)
                .earliest()
                .map(|t| t.fixed_offset()),
            TimeLocale::Fixed(offset) => offset.from_local_datetime(&naive).single(),
        }
    }
}

/// Resolves the records of one kind against its scheme.
pub struct Resolver<'a> {
    scheme: &'a Scheme,
    kind: &'a str,
    locale: TimeLocale,
}

impl<'a> Resolver<'a> {
    /// The scheme must name a kind, see [`Scheme::reconcile`].
    pub fn new(scheme: &'a Scheme) -> Result<Self, ResolveError> {
        let kind = scheme
            .kind
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| ResolveError::Schema("kind should be specified".to_string()))?;

        Ok(Resolver {
            scheme,
            kind,
            locale: TimeLocale::parse(scheme.time_locale.as_deref())?,
        })
    }

    fn namespace(&self) -> Option<&str> {
        self.scheme.namespace.as_deref()
    }

    /// Resolves every record of `data`, stopping at the first failure.
    pub fn resolve_all(&self, data: &KindData) -> Result<Vec<Entity>, ResolveError> {
        let entities = data
            .entities
            .iter()
            .enumerate()
            .map(|(index, raw)| {
                self.resolve_entity(raw, &data.defaults)
                    .map_err(|e| ResolveError::Entity {
                        index,
                        source: Box::new(e),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        debug!(kind = self.kind, count = entities.len(), "resolved entities");
        Ok(entities)
    }

    /// Resolves one record. Defaults fill in properties the record lacks and
    /// are evaluated anew for every record.
    pub fn resolve_entity(
        &self,
        raw: &RawEntity,
        defaults: &[(String, RawValue)],
    ) -> Result<Entity, ResolveError> {
        let mut seen = HashSet::new();
        let mut key = None;
        let mut properties = Vec::with_capacity(raw.len() + defaults.len());

        for (name, value) in raw {
            if !seen.insert(name.as_str()) {
                return Err(ResolveError::Schema(format!(
                    "property '{}' appears more than once",
                    name
                )));
            }

            if name == KEY_FIELD {
                key = Some(self.resolve_key(value)?);
                continue;
            }

            let (typed, no_index) = self.resolve(name, value)?;
            properties.push(Property::new(name.as_str(), typed).no_index(no_index));
        }

        for (name, value) in defaults {
            if name == KEY_FIELD {
                return Err(ResolveError::Schema(format!(
                    "{} can not be a default value",
                    KEY_FIELD
                )));
            }
            if !seen.contains(name.as_str()) {
                let (typed, no_index) = self.resolve(name, value)?;
                properties.push(Property::new(name.as_str(), typed).no_index(no_index));
            }
        }

        if key.is_none() {
            if let Some(field) = self.scheme.key.as_deref() {
                if let Some(property) = properties.iter().find(|p| p.name == field) {
                    key = Some(self.key_from_value(&property.value)?);
                }
            }
        }

        let key = match key {
            Some(key) => key,
            None => Key::incomplete(self.kind, None)
                .with_namespace(self.namespace().map(str::to_string)),
        };

        Ok(Entity::new(key, properties))
    }

    fn resolve_key(&self, raw: &RawValue) -> Result<Key, ResolveError> {
        Ok(resolve_key_path(raw, self.kind, self.namespace())?)
    }

    /// Key from an already resolved key-field property.
    fn key_from_value(&self, value: &TypedValue) -> Result<Key, ResolveError> {
        match value {
            TypedValue::Key(key) => Ok(key.clone()),
            TypedValue::String(s) => self.resolve_key(&RawValue::String(s.clone())),
            TypedValue::Integer(n) => self.resolve_key(&RawValue::Integer(*n)),
            other => Err(KeyFormatError::InvalidId(format!("{:?}", other)).into()),
        }
    }

    /// Resolves one property value and its no-index flag.
    pub fn resolve(&self, name: &str, raw: &RawValue) -> Result<(TypedValue, bool), ResolveError> {
        let Some((data_type, no_index)) = self.scheme.property_type(name)? else {
            return self.infer(name, raw);
        };

        if let RawValue::Mapping(entries) = raw {
            if let Some(direct) = self.direct(name, entries)? {
                return Ok(direct);
            }
        }

        Ok((self.coerce(name, data_type, raw)?, no_index))
    }

    fn infer(&self, name: &str, raw: &RawValue) -> Result<(TypedValue, bool), ResolveError> {
        let value = match raw {
            RawValue::Null => TypedValue::Null,
            RawValue::Boolean(b) => TypedValue::Boolean(*b),
            RawValue::Integer(n) => TypedValue::Integer(*n),
            RawValue::Float(n) => TypedValue::Float(*n),
            RawValue::String(s) => match self.parse_timestamp(s) {
                Some(t) => TypedValue::Datetime(t),
                None => TypedValue::String(s.clone()),
            },
            RawValue::Sequence(items) => self.array(name, items)?,
            RawValue::Mapping(entries) => match self.direct(name, entries)? {
                Some(direct) => return Ok(direct),
                None => self.embedded(entries)?,
            },
        };
        Ok((value, false))
    }

    /// Resolves a direct-type marker mapping. `None` when the mapping carries
    /// no marker at all, i.e. it is an embedded record.
    fn direct(
        &self,
        name: &str,
        entries: &[(String, RawValue)],
    ) -> Result<Option<(TypedValue, bool)>, ResolveError> {
        let mut marker = None;
        let mut no_index = None;
        let mut others = 0;

        for (key, value) in entries {
            if key == NO_INDEX_MARKER {
                no_index = Some(value);
            } else if let Some(data_type) = DataType::from_marker(key) {
                if let Some((first, _)) = marker {
                    return Err(ResolveError::Schema(format!(
                        "property '{}' has ambiguous type markers {} and {}",
                        name,
                        DataType::marker(first),
                        key
                    )));
                }
                marker = Some((data_type, value));
            } else {
                others += 1;
            }
        }

        let Some((data_type, value)) = marker else {
            if no_index.is_some() {
                return Err(ResolveError::Schema(format!(
                    "property '{}' has {} but no type marker",
                    name, NO_INDEX_MARKER
                )));
            }
            return Ok(None);
        };

        if others > 0 {
            return Err(ResolveError::Schema(format!(
                "property '{}' mixes the type marker {} with other fields",
                name,
                data_type.marker()
            )));
        }

        let no_index = match no_index {
            None => false,
            Some(RawValue::Boolean(b)) => *b,
            Some(other) => {
                return Err(ResolveError::Schema(format!(
                    "{} of property '{}' should be a boolean, got {}",
                    NO_INDEX_MARKER, name, other
                )));
            }
        };

        Ok(Some((self.coerce(name, data_type, value)?, no_index)))
    }

    /// Coerces a raw value to `data_type`.
    pub fn coerce(
        &self,
        name: &str,
        data_type: DataType,
        raw: &RawValue,
    ) -> Result<TypedValue, ResolveError> {
        let fail = |reason: &str| ResolveError::Coercion {
            property: name.to_string(),
            data_type,
            raw: raw.to_string(),
            reason: reason.to_string(),
        };

        match data_type {
            DataType::Null => Ok(TypedValue::Null),

            DataType::String => Ok(TypedValue::String(
                raw.as_text().unwrap_or_else(|| raw.to_json_string()),
            )),

            DataType::Integer => match raw {
                RawValue::Integer(n) => Ok(TypedValue::Integer(*n)),
                RawValue::Float(n) => whole_number(*n)
                    .map(TypedValue::Integer)
                    .ok_or_else(|| fail("not a whole number")),
                RawValue::Null => Ok(TypedValue::Integer(0)),
                RawValue::String(s) if s.is_empty() => Ok(TypedValue::Integer(0)),
                RawValue::String(s) => s
                    .trim()
                    .parse::<i64>()
                    .map(TypedValue::Integer)
                    .map_err(|e| fail(&e.to_string())),
                _ => Err(fail("not an integer")),
            },

            DataType::Float => match raw {
                RawValue::Float(n) => Ok(TypedValue::Float(*n)),
                RawValue::Integer(n) => Ok(TypedValue::Float(*n as f64)),
                RawValue::String(s) => s
                    .trim()
                    .parse::<f64>()
                    .map(TypedValue::Float)
                    .map_err(|e| fail(&e.to_string())),
                _ => Err(fail("not a number")),
            },

            DataType::Boolean => match raw {
                RawValue::Boolean(b) => Ok(TypedValue::Boolean(*b)),
                other => other
                    .as_text()
                    .and_then(|s| parse_bool(&s))
                    .map(TypedValue::Boolean)
                    .ok_or_else(|| fail("not a boolean")),
            },

            DataType::Datetime => {
                let text = raw.as_text().ok_or_else(|| fail("not a scalar"))?;
                self.parse_datetime(&text).map_err(|reason| fail(&reason))
            }

            DataType::Key => self
                .resolve_key(raw)
                .map(TypedValue::Key)
                .map_err(|e| fail(&e.to_string())),

            DataType::Geo => {
                let decoded = decode_json_text(raw).map_err(|e| fail(&e))?;
                match decoded.as_ref().unwrap_or(raw) {
                    RawValue::Sequence(items) if items.len() == 2 => {
                        match (as_float(&items[0]), as_float(&items[1])) {
                            (Some(lat), Some(lng)) => Ok(TypedValue::Geo(GeoPoint { lat, lng })),
                            _ => Err(fail("latitude and longitude should be numbers")),
                        }
                    }
                    _ => Err(fail("should be a [lat, lng] pair")),
                }
            }

            DataType::Array => {
                let decoded = decode_json_text(raw).map_err(|e| fail(&e))?;
                match decoded.as_ref().unwrap_or(raw) {
                    RawValue::Sequence(items) => self.array(name, items),
                    _ => Err(fail("not a sequence")),
                }
            }

            DataType::Embed => {
                if matches!(raw, RawValue::String(s) if s.is_empty()) {
                    return Ok(TypedValue::Null);
                }
                let decoded = decode_json_text(raw).map_err(|e| fail(&e))?;
                match decoded.as_ref().unwrap_or(raw) {
                    RawValue::Mapping(entries) => self.embedded(entries),
                    _ => Err(fail("not a mapping")),
                }
            }

            DataType::Blob => match raw {
                RawValue::String(s) => STANDARD
                    .decode(s.trim())
                    .map(TypedValue::Blob)
                    .map_err(|e| fail(&e.to_string())),
                _ => Err(fail("not a base64 string")),
            },
        }
    }

    /// Array elements are always inferred.
    fn array(&self, name: &str, items: &[RawValue]) -> Result<TypedValue, ResolveError> {
        items
            .iter()
            .map(|item| self.infer(name, item).map(|(value, _)| value))
            .collect::<Result<Vec<_>, _>>()
            .map(TypedValue::Array)
    }

    fn embedded(&self, entries: &[(String, RawValue)]) -> Result<TypedValue, ResolveError> {
        entries
            .iter()
            .map(|(name, raw)| {
                self.infer(name, raw)
                    .map(|(value, no_index)| Property::new(name.as_str(), value).no_index(no_index))
            })
            .collect::<Result<Vec<_>, _>>()
            .map(TypedValue::Embedded)
    }

    fn parse_datetime(&self, text: &str) -> Result<TypedValue, String> {
        if text.is_empty() {
            return Ok(TypedValue::Null);
        }
        if text == CURRENT_DATETIME {
            return Ok(TypedValue::Datetime(self.locale.now()));
        }

        let parsed = match self.scheme.time_format.as_deref().filter(|f| !f.is_empty()) {
            Some(format) => self.parse_with_format(text, format),
            None => self.parse_timestamp(text),
        };
        parsed
            .map(TypedValue::Datetime)
            .ok_or_else(|| "not a valid datetime".to_string())
    }

    fn parse_with_format(&self, text: &str, format: &str) -> Option<DateTime<FixedOffset>> {
        if let Ok(t) = DateTime::parse_from_str(text, format) {
            return Some(t);
        }
        let naive = NaiveDateTime::parse_from_str(text, format).ok().or_else(|| {
            NaiveDate::parse_from_str(text, format)
                .ok()
                .map(|d| d.and_time(NaiveTime::MIN))
        })?;
        self.locale.localize(naive)
    }

    /// Datetime for strings shaped like a date or an RFC 3339 timestamp.
    /// Well-formed shapes naming an impossible date yield `None`.
    fn parse_timestamp(&self, text: &str) -> Option<DateTime<FixedOffset>> {
        if DATE_PATTERN.is_match(text) {
            let date = NaiveDate::parse_from_str(text, "%Y-%m-%d").ok()?;
            self.locale.localize(date.and_time(NaiveTime::MIN))
        } else if TIMESTAMP_PATTERN.is_match(text) {
            DateTime::parse_from_rfc3339(text).ok()
        } else {
            None
        }
    }
}

/// Decodes a JSON-encoded string, as composite values are written in tabular
/// cells. `None` when `raw` is not a string.
fn decode_json_text(raw: &RawValue) -> Result<Option<RawValue>, String> {
    match raw {
        RawValue::String(s) => RawValue::from_json_str(s)
            .map(Some)
            .map_err(|e| format!("can not decode as json: {}", e)),
        _ => Ok(None),
    }
}

/// `3.0` as `3`; `None` for fractions and values outside `i64`.
fn whole_number(n: f64) -> Option<i64> {
    let in_range = n >= i64::MIN as f64 && n < i64::MAX as f64;
    (n.fract() == 0.0 && in_range).then_some(n as i64)
}

fn as_float(raw: &RawValue) -> Option<f64> {
    match raw {
        RawValue::Integer(n) => Some(*n as f64),
        RawValue::Float(n) => Some(*n),
        RawValue::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s {
        "1" | "t" | "T" | "true" | "TRUE" | "True" => Some(true),
        "0" | "f" | "F" | "false" | "FALSE" | "False" => Some(false),
        _ => None,
    }
}
