use std::io::Write;

use ::csv::{Writer, WriterBuilder};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use tracing::debug;

use crate::entity::{Entity, Property, TypedValue};
use crate::output::{
    ColumnSet, Encoder, ExportError, Exporter, PropertyInfo, TypeStyle, collect_columns,
    encode_key, format_datetime,
};
use crate::reader::csv::MARKER_CELL_PREFIX;
use crate::schema::{CSV_NO_INDEX_SUFFIX, DataType, KEY_FIELD};

/// Writes records as delimited rows under a two-row header. When a page
/// brings new columns, a fresh header pair with the grown column set is
/// written before its rows.
///
/// A cell the header can not carry is written as a JSON marker object such
/// as `{"__integer__":5}`: values off their column's type or no-index flag
/// in any style, every value in the direct style, keys, geo points and blobs
/// in the auto style, and strings that would read back as a marker object.
pub struct CsvExporter<W: Write> {
    writer: Writer<W>,
    encoder: Encoder,
    columns: ColumnSet,
    header_written: bool,
}

impl<W: Write> CsvExporter<W> {
    pub fn new(writer: W, delimiter: u8, style: TypeStyle) -> Self {
        CsvExporter {
            writer: WriterBuilder::new()
                .delimiter(delimiter)
                .flexible(true)
                .from_writer(writer),
            encoder: Encoder::new(style),
            columns: ColumnSet::new(),
            header_written: false,
        }
    }

    pub fn columns(&self) -> &ColumnSet {
        &self.columns
    }

    fn write_header(&mut self) -> Result<(), ExportError> {
        let mut names = vec![KEY_FIELD.to_string()];
        let mut types = vec![DataType::Key.as_str().to_string()];

        for column in self.columns.columns() {
            names.push(column.name.clone());
            let type_name = match column.data_type {
                DataType::Null => "",
                other => other.as_str(),
            };
            if column.no_index {
                types.push(format!("{}{}", type_name, CSV_NO_INDEX_SUFFIX));
            } else {
                types.push(type_name.to_string());
            }
        }

        self.writer.write_record(&names)?;
        self.writer.write_record(&types)?;
        self.header_written = true;
        Ok(())
    }

    fn needs_marker(&self, column: &PropertyInfo, property: &Property) -> bool {
        self.encoder.tags_property(property)
            || column.data_type != property.value.data_type()
            || column.no_index != property.no_index
            || matches!(
                &property.value,
                TypedValue::String(s) if s.starts_with(MARKER_CELL_PREFIX)
            )
    }

    fn cell(&self, value: &TypedValue) -> String {
        match value {
            TypedValue::Null => String::new(),
            TypedValue::Boolean(b) => b.to_string(),
            TypedValue::Integer(n) => n.to_string(),
            TypedValue::Float(n) => n.to_string(),
            TypedValue::String(s) => s.clone(),
            TypedValue::Datetime(t) => format_datetime(t),
            TypedValue::Key(key) => encode_key(key).to_json_string(),
            TypedValue::Blob(bytes) => STANDARD.encode(bytes),
            TypedValue::Geo(_) | TypedValue::Array(_) | TypedValue::Embedded(_) => {
                self.encoder.payload(value).to_json_string()
            }
        }
    }
}

impl<W: Write> Exporter for CsvExporter<W> {
    /// The header pair doubles as the scheme.
    fn dump_scheme(&mut self, _entities: &[Entity]) -> Result<(), ExportError> {
        Ok(())
    }

    fn dump_entities(&mut self, entities: &[Entity]) -> Result<(), ExportError> {
        let grew = self.columns.extend(collect_columns(entities));
        if grew || !self.header_written {
            self.encoder.set_scheme(self.columns.columns());
            self.write_header()?;
        }

        for entity in entities {
            let mut row = Vec::with_capacity(self.columns.len() + 1);
            row.push(encode_key(&entity.key).to_json_string());
            for column in self.columns.columns() {
                let cell = match entity.property(&column.name) {
                    Some(p) if self.needs_marker(column, p) => {
                        self.encoder.tagged(&p.value, p.no_index).to_json_string()
                    }
                    Some(p) => self.cell(&p.value),
                    None => String::new(),
                };
                row.push(cell);
            }
            self.writer.write_record(&row)?;
        }

        self.writer.flush()?;
        debug!(
            count = entities.len(),
            columns = self.columns.len(),
            "wrote tabular page"
        );
        Ok(())
    }
}
