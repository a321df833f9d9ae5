use std::io::Read;

use serde::Deserialize;

use crate::reader::ReadError;
use crate::schema::{KindData, Scheme};
use crate::value::mapping_entries;

#[derive(Debug, Deserialize)]
struct Document {
    #[serde(default)]
    scheme: Option<Scheme>,
    #[serde(default)]
    default: Option<serde_yaml::Mapping>,
    #[serde(default)]
    entities: Option<Vec<serde_yaml::Mapping>>,
}

/// Reads a `scheme` / `default` / `entities` document.
pub fn read<R: Read>(reader: R) -> Result<KindData, ReadError> {
    let document: Document = serde_yaml::from_reader(reader)?;
    Ok(into_kind_data(document))
}

pub fn parse_str(text: &str) -> Result<KindData, ReadError> {
    let document: Document = serde_yaml::from_str(text)?;
    Ok(into_kind_data(document))
}

fn into_kind_data(document: Document) -> KindData {
    KindData {
        scheme: document.scheme.unwrap_or_default(),
        defaults: document.default.map(mapping_entries).unwrap_or_default(),
        entities: document
            .entities
            .unwrap_or_default()
            .into_iter()
            .map(mapping_entries)
            .collect(),
    }
}
