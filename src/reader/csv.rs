//! Tabular record files.
//!
//! ```text
//! __key__,title,tags,tags,memo
//! key,string,array,array,string:noindex
//! "[""Author"",""Huxley"",""Book"",1234]",Brave New World,dystopia,classic,
//! ```
//!
//! Row 1 names the columns, row 2 types them (empty means infer), every
//! further row is one record. Empty cells leave the property out. A cell
//! holding a JSON object led by a type marker, such as `{"__integer__":5}`,
//! overrides its column type. A row starting with `__key__` opens a new
//! two-row header, so files written page by page with a growing column set
//! read back as one.
//!
//! An `array` column holds a JSON sequence or a single element; repeated
//! `array` columns of one name add an element each. Columns typed
//! `array[N].field` fill `field` of the N-th embedded record of an array:
//!
//! ```text
//! __key__,items,items,items
//! key,array[0].name,array[0].qty,array[1].name
//! 1,pen,2,ink
//! ```

use std::collections::HashMap;
use std::io::Read;

use ::csv::{ReaderBuilder, StringRecord};
use lazy_static::lazy_static;
use regex::Regex;

use crate::reader::ReadError;
use crate::schema::{
    CSV_NO_INDEX_SUFFIX, DataType, KEY_FIELD, KindData, RawEntity, TypeDescriptor,
};
use crate::value::RawValue;

/// Leading text of a cell written as a type marker object.
pub const MARKER_CELL_PREFIX: &str = "{\"__";

lazy_static! {
    static ref INDEXED_TYPE: Regex = Regex::new(r"^array\[([0-9]+)\]\.(.+)$").unwrap();
}

#[derive(Debug, PartialEq)]
enum Layout {
    Single,
    /// Several array-typed columns with this name collect into one sequence
    Repeated,
    /// `array[N].field`
    Indexed { index: usize, field: String },
}

#[derive(Debug)]
struct Column {
    name: String,
    data_type: Option<DataType>,
    no_index: bool,
    layout: Layout,
}

pub fn read<R: Read>(reader: R, delimiter: u8) -> Result<KindData, ReadError> {
    let mut reader = ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .from_reader(reader);

    let mut data = KindData::default();
    let mut names: Option<Vec<String>> = None;
    let mut columns: Option<Vec<Column>> = None;

    for record in reader.records() {
        let record = record?;
        let line = record.position().map(|p| p.line()).unwrap_or_default();

        let starts_header = record.get(0) == Some(KEY_FIELD);
        if names.is_none() || (columns.is_some() && starts_header) {
            names = Some(record.iter().map(str::to_string).collect());
            columns = None;
            continue;
        }

        if let Some(columns) = &columns {
            data.entities.push(parse_entity(columns, &record, line)?);
        } else if let Some(names) = &names {
            let parsed = parse_types(names, &record, line)?;
            declare(&mut data, &parsed);
            columns = Some(parsed);
        }
    }

    Ok(data)
}

pub fn parse_str(text: &str, delimiter: u8) -> Result<KindData, ReadError> {
    read(text.as_bytes(), delimiter)
}

fn parse_types(
    names: &[String],
    record: &StringRecord,
    line: u64,
) -> Result<Vec<Column>, ReadError> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for name in names {
        *counts.entry(name.as_str()).or_default() += 1;
    }

    let mut columns = Vec::with_capacity(names.len());
    for (i, name) in names.iter().enumerate() {
        let cell = record.get(i).unwrap_or_default().trim();
        let (type_name, no_index) = match cell.strip_suffix(CSV_NO_INDEX_SUFFIX) {
            Some(t) => (t, true),
            None => (cell, false),
        };

        let count = counts.get(name.as_str()).copied().unwrap_or_default();
        let malformed = |message: String| ReadError::Malformed { line, message };

        let column = if let Some(captures) = INDEXED_TYPE.captures(type_name) {
            // every element needs a column of its own
            let index = captures[1]
                .parse::<usize>()
                .ok()
                .filter(|index| *index < count)
                .ok_or_else(|| {
                    malformed(format!("index of '{}' in '{}' is out of range", type_name, name))
                })?;
            if no_index {
                return Err(malformed(format!(
                    "'{}' of '{}' can not be noindex",
                    type_name, name
                )));
            }
            Column {
                name: name.clone(),
                data_type: None,
                no_index,
                layout: Layout::Indexed {
                    index,
                    field: captures[2].to_string(),
                },
            }
        } else {
            let data_type = match type_name {
                "" => None,
                t => Some(DataType::from_name(t).ok_or_else(|| {
                    malformed(format!("property type '{}' of '{}' is not supported", t, name))
                })?),
            };

            let layout = if count > 1 {
                if data_type != Some(DataType::Array) {
                    return Err(malformed(format!(
                        "column '{}' repeats but is not typed array",
                        name
                    )));
                }
                Layout::Repeated
            } else {
                Layout::Single
            };

            Column {
                name: name.clone(),
                data_type,
                no_index,
                layout,
            }
        };
        columns.push(column);
    }
    Ok(columns)
}

/// Typed columns become scheme declarations; untyped ones are inferred.
fn declare(data: &mut KindData, columns: &[Column]) {
    for column in columns {
        if column.name == KEY_FIELD {
            continue;
        }
        if let Some(data_type) = column.data_type {
            data.scheme.properties.insert(
                column.name.clone(),
                Some(TypeDescriptor::new(data_type, column.no_index)),
            );
        }
    }
}

fn parse_entity(
    columns: &[Column],
    record: &StringRecord,
    line: u64,
) -> Result<RawEntity, ReadError> {
    if record.len() > columns.len() {
        return Err(ReadError::Malformed {
            line,
            message: format!("{} cells for {} columns", record.len(), columns.len()),
        });
    }

    let mut entity: RawEntity = Vec::new();
    for (column, cell) in columns.iter().zip(record.iter()) {
        if cell.is_empty() {
            continue;
        }

        if column.name == KEY_FIELD {
            entity.push((KEY_FIELD.to_string(), key_cell(column.data_type, cell, line)?));
            continue;
        }

        match &column.layout {
            Layout::Repeated => {
                sequence_entry(&mut entity, &column.name, line)?.push(cell_value(cell));
            }
            Layout::Indexed { index, field } => {
                let items = sequence_entry(&mut entity, &column.name, line)?;
                while items.len() <= *index {
                    items.push(RawValue::Mapping(Vec::new()));
                }
                match &mut items[*index] {
                    RawValue::Mapping(fields) => fields.push((field.clone(), cell_value(cell))),
                    _ => {
                        return Err(ReadError::Malformed {
                            line,
                            message: format!(
                                "element {} of '{}' is not an embedded record",
                                index, column.name
                            ),
                        });
                    }
                }
            }
            Layout::Single if column.data_type == Some(DataType::Array) => {
                entity.push((column.name.clone(), array_cell(cell)));
            }
            Layout::Single => entity.push((column.name.clone(), cell_value(cell))),
        }
    }
    Ok(entity)
}

/// The sequence collecting the cells of `name`, created on first use.
fn sequence_entry<'e>(
    entity: &'e mut RawEntity,
    name: &str,
    line: u64,
) -> Result<&'e mut Vec<RawValue>, ReadError> {
    let position = match entity.iter().position(|(n, _)| n == name) {
        Some(position) => position,
        None => {
            entity.push((name.to_string(), RawValue::Sequence(Vec::new())));
            entity.len() - 1
        }
    };
    match &mut entity[position].1 {
        RawValue::Sequence(items) => Ok(items),
        _ => Err(ReadError::Malformed {
            line,
            message: format!("column '{}' mixes arrays with other values", name),
        }),
    }
}

/// A lone `array` cell: a JSON sequence as exported, else one element.
fn array_cell(cell: &str) -> RawValue {
    match cell_value(cell) {
        RawValue::String(_) => match RawValue::from_json_str(cell) {
            Ok(items @ RawValue::Sequence(_)) => items,
            _ => RawValue::Sequence(vec![RawValue::string(cell)]),
        },
        marker => marker,
    }
}

fn cell_value(cell: &str) -> RawValue {
    if cell.starts_with(MARKER_CELL_PREFIX) {
        if let Ok(RawValue::Mapping(entries)) = RawValue::from_json_str(cell) {
            if entries.iter().any(|(k, _)| DataType::from_marker(k).is_some()) {
                return RawValue::Mapping(entries);
            }
        }
    }
    RawValue::string(cell)
}

/// Raw key from a key cell: typed as integer or string, else JSON when it
/// decodes to something a key can be built from, else a name.
fn key_cell(data_type: Option<DataType>, cell: &str, line: u64) -> Result<RawValue, ReadError> {
    match data_type {
        Some(DataType::Integer) => cell
            .trim()
            .parse::<i64>()
            .map(RawValue::Integer)
            .map_err(|e| ReadError::Malformed {
                line,
                message: format!("can not parse key '{}' as int: {}", cell, e),
            }),
        Some(DataType::String) => Ok(RawValue::string(cell)),
        _ => match RawValue::from_json_str(cell) {
            Ok(raw @ (RawValue::Integer(_) | RawValue::String(_) | RawValue::Sequence(_))) => {
                Ok(raw)
            }
            _ => Ok(RawValue::string(cell)),
        },
    }
}
