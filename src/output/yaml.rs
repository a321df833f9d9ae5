use std::io::Write;

use tracing::debug;

use crate::entity::Entity;
use crate::output::{Encoder, ExportError, Exporter, TypeStyle, collect_columns};
use crate::schema::TypeDescriptor;
use crate::value::RawValue;

/// Writes one YAML document: a `scheme` section followed by an `entities`
/// list that grows page by page.
pub struct YamlExporter<W: Write> {
    writer: W,
    encoder: Encoder,
    namespace: Option<String>,
    kind: Option<String>,
    started: bool,
}

impl<W: Write> YamlExporter<W> {
    pub fn new(writer: W, style: TypeStyle, namespace: Option<&str>, kind: Option<&str>) -> Self {
        YamlExporter {
            writer,
            encoder: Encoder::new(style),
            namespace: namespace.filter(|s| !s.is_empty()).map(str::to_string),
            kind: kind.filter(|s| !s.is_empty()).map(str::to_string),
            started: false,
        }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> Exporter for YamlExporter<W> {
    fn dump_scheme(&mut self, entities: &[Entity]) -> Result<(), ExportError> {
        let mut scheme = Vec::new();
        if let Some(namespace) = &self.namespace {
            scheme.push(("namespace".to_string(), RawValue::string(namespace.as_str())));
        }
        if let Some(kind) = &self.kind {
            scheme.push(("kind".to_string(), RawValue::string(kind.as_str())));
        }

        if self.encoder.style() == TypeStyle::Scheme {
            let columns = collect_columns(entities);
            let properties = columns
                .iter()
                .map(|c| {
                    let descriptor = match TypeDescriptor::new(c.data_type, c.no_index) {
                        TypeDescriptor::Bare(t) => RawValue::String(t),
                        TypeDescriptor::Flagged(t, flag) => {
                            RawValue::Sequence(vec![RawValue::String(t), RawValue::String(flag)])
                        }
                    };
                    (c.name.clone(), descriptor)
                })
                .collect();
            scheme.push(("properties".to_string(), RawValue::Mapping(properties)));
            self.encoder.set_scheme(&columns);
        }

        if scheme.is_empty() {
            return Ok(());
        }

        let document = RawValue::Mapping(vec![("scheme".to_string(), RawValue::Mapping(scheme))]);
        let text = serde_yaml::to_string(&serde_yaml::Value::from(document))?;
        self.writer.write_all(text.as_bytes())?;
        self.writer.flush()?;
        Ok(())
    }

    fn dump_entities(&mut self, entities: &[Entity]) -> Result<(), ExportError> {
        if !self.started {
            self.writer.write_all(b"entities:\n")?;
            self.started = true;
        }

        if !entities.is_empty() {
            let items: Vec<serde_yaml::Value> = entities
                .iter()
                .map(|e| serde_yaml::Value::from(self.encoder.encode_entity(e)))
                .collect();
            let text = serde_yaml::to_string(&items)?;
            self.writer.write_all(text.as_bytes())?;
        }

        self.writer.flush()?;
        debug!(count = entities.len(), "wrote YAML page");
        Ok(())
    }
}
