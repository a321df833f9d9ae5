//! Record stores.
//!
//! [`Datastore`] is the seam the import and export pipelines talk to.
//! [`MemoryStore`] evaluates queries in memory; [`LocalStore`] keeps the same
//! data in a directory of YAML record files between runs.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info};

use crate::entity::{Entity, Key, KeyId, TypedValue};
use crate::output::yaml::YamlExporter;
use crate::output::{ExportError, Exporter, TypeStyle};
use crate::plan::{Filter, FilterOp, StoreQuery};
use crate::reader::{self, Format, ReadError};
use crate::resolver::{ResolveError, Resolver};
use crate::schema::KEY_FIELD;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sorry. {0} is not supported by this store")]
    Unsupported(String),

    #[error("can not access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("can not load {}: {source}", path.display())]
    Load {
        path: PathBuf,
        #[source]
        source: Box<StoreError>,
    },

    #[error(transparent)]
    Read(#[from] ReadError),

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    Export(#[from] ExportError),
}

pub type EntityIter<'a> = Box<dyn Iterator<Item = Result<Entity, StoreError>> + 'a>;

/// A store of keyed records.
pub trait Datastore {
    /// Inserts or replaces records. Incomplete keys are completed; the
    /// written keys come back in input order.
    fn put_multi(&mut self, entities: Vec<Entity>) -> Result<Vec<Key>, StoreError>;

    /// Runs a query, yielding matching records in query order.
    fn run_query(&self, query: &StoreQuery) -> Result<EntityIter<'_>, StoreError>;
}

/// Orders keys the way the store lists them: path segment by segment, kind
/// first, numeric ids before names.
pub fn compare_keys(a: &Key, b: &Key) -> Ordering {
    let (a, b) = (a.path(), b.path());
    for (x, y) in a.iter().zip(b.iter()) {
        let ord = x.kind.cmp(&y.kind).then_with(|| compare_ids(&x.id, &y.id));
        if ord != Ordering::Equal {
            return ord;
        }
    }
    a.len().cmp(&b.len())
}

fn compare_ids(a: &KeyId, b: &KeyId) -> Ordering {
    match (a, b) {
        (KeyId::Incomplete, KeyId::Incomplete) => Ordering::Equal,
        (KeyId::Incomplete, _) => Ordering::Less,
        (_, KeyId::Incomplete) => Ordering::Greater,
        (KeyId::Id(x), KeyId::Id(y)) => x.cmp(y),
        (KeyId::Id(_), KeyId::Name(_)) => Ordering::Less,
        (KeyId::Name(_), KeyId::Id(_)) => Ordering::Greater,
        (KeyId::Name(x), KeyId::Name(y)) => x.cmp(y),
    }
}

/// In-memory store.
#[derive(Debug)]
pub struct MemoryStore {
    entities: Vec<Entity>,
    next_id: i64,
}

impl Default for MemoryStore {
    fn default() -> Self {
        MemoryStore::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore {
            entities: Vec::new(),
            next_id: 1,
        }
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    fn complete(&mut self, mut key: Key) -> Key {
        if key.id == KeyId::Incomplete {
            key.id = KeyId::Id(self.next_id);
            self.next_id += 1;
        }
        key
    }

    fn upsert(&mut self, entity: Entity) {
        if let KeyId::Id(id) = entity.key.id {
            self.next_id = self.next_id.max(id.saturating_add(1));
        }
        match self.entities.iter_mut().find(|e| e.key == entity.key) {
            Some(existing) => *existing = entity,
            None => self.entities.push(entity),
        }
    }

    fn matches(query: &StoreQuery, entity: &Entity) -> bool {
        let key = &entity.key;
        key.kind == query.kind
            && key.namespace.as_deref().filter(|ns| !ns.is_empty())
                == query.namespace.as_deref().filter(|ns| !ns.is_empty())
            && query.ancestor.as_ref().is_none_or(|a| key.has_ancestor(a))
            && query.filters.iter().all(|f| filter_matches(f, entity))
            && query
                .orders
                .iter()
                .all(|o| o.property == KEY_FIELD || entity.get(&o.property).is_some())
    }
}

fn filter_matches(filter: &Filter, entity: &Entity) -> bool {
    let test = |value: &TypedValue| -> bool {
        let ordering = match (value, &filter.value) {
            (TypedValue::Key(a), TypedValue::Key(b)) => Some(compare_keys(a, b)),
            (a, b) => a.compare(b),
        };
        ordering.is_some_and(|ord| match filter.op {
            FilterOp::Equal => ord == Ordering::Equal,
            FilterOp::LessThan => ord == Ordering::Less,
            FilterOp::LessThanOrEqual => ord != Ordering::Greater,
            FilterOp::GreaterThan => ord == Ordering::Greater,
            FilterOp::GreaterThanOrEqual => ord != Ordering::Less,
        })
    };

    if filter.property == KEY_FIELD {
        return test(&TypedValue::Key(entity.key.clone()));
    }

    match entity.get(&filter.property) {
        Some(TypedValue::Array(items)) => items.iter().any(|item| test(item)),
        Some(value) => test(value),
        None => false,
    }
}

impl Datastore for MemoryStore {
    fn put_multi(&mut self, entities: Vec<Entity>) -> Result<Vec<Key>, StoreError> {
        let mut keys = Vec::with_capacity(entities.len());
        for mut entity in entities {
            entity.key = self.complete(entity.key);
            keys.push(entity.key.clone());
            self.upsert(entity);
        }
        Ok(keys)
    }

    fn run_query(&self, query: &StoreQuery) -> Result<EntityIter<'_>, StoreError> {
        if query.distinct || !query.distinct_on.is_empty() {
            return Err(StoreError::Unsupported("DISTINCT".to_string()));
        }

        let mut found: Vec<&Entity> = self
            .entities
            .iter()
            .filter(|e| Self::matches(query, e))
            .collect();

        found.sort_by(|a, b| {
            query
                .orders
                .iter()
                .map(|o| {
                    let ord = if o.property == KEY_FIELD {
                        compare_keys(&a.key, &b.key)
                    } else {
                        match (a.get(&o.property), b.get(&o.property)) {
                            (Some(x), Some(y)) => x.compare(y).unwrap_or(Ordering::Equal),
                            _ => Ordering::Equal,
                        }
                    };
                    if o.descending { ord.reverse() } else { ord }
                })
                .find(|ord| *ord != Ordering::Equal)
                .unwrap_or_else(|| compare_keys(&a.key, &b.key))
        });

        let limit = query.limit.unwrap_or(usize::MAX);
        let projection = query.projection.clone();
        let keys_only = query.keys_only;

        debug!(kind = %query.kind, matched = found.len(), "ran query");

        Ok(Box::new(
            found
                .into_iter()
                .skip(query.offset)
                .take(limit)
                .map(move |entity| {
                    let mut entity = entity.clone();
                    if keys_only {
                        entity.properties.clear();
                    } else if !projection.is_empty() {
                        entity.properties.retain(|p| projection.contains(&p.name));
                    }
                    Ok(entity)
                }),
        ))
    }
}

/// Store kept in a directory, one YAML record file per namespace and kind.
#[derive(Debug)]
pub struct LocalStore {
    dir: PathBuf,
    memory: MemoryStore,
}

impl LocalStore {
    /// Opens `dir`, loading every record file in it. A missing directory is
    /// an empty store.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let dir = dir.as_ref().to_path_buf();
        let mut memory = MemoryStore::new();

        if dir.is_dir() {
            let mut paths = fs::read_dir(&dir)
                .map_err(|source| StoreError::Io {
                    path: dir.clone(),
                    source,
                })?
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|path| Format::from_path(path) == Some(Format::Yaml))
                .collect::<Vec<_>>();
            paths.sort();

            for path in paths {
                let entities = load_file(&path).map_err(|e| StoreError::Load {
                    path: path.clone(),
                    source: Box::new(e),
                })?;
                for entity in entities {
                    memory.upsert(entity);
                }
            }
        }

        debug!(dir = %dir.display(), entities = memory.len(), "opened local store");
        Ok(LocalStore { dir, memory })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn len(&self) -> usize {
        self.memory.len()
    }

    pub fn is_empty(&self) -> bool {
        self.memory.is_empty()
    }

    /// Rewrites the record files of the given namespace/kind groups.
    fn save(&self, groups: &[(Option<String>, String)]) -> Result<(), StoreError> {
        fs::create_dir_all(&self.dir).map_err(|source| StoreError::Io {
            path: self.dir.clone(),
            source,
        })?;

        for (namespace, kind) in groups {
            let mut entities: Vec<Entity> = self
                .memory
                .entities()
                .iter()
                .filter(|e| e.key.kind == *kind && e.key.namespace == *namespace)
                .cloned()
                .collect();
            entities.sort_by(|a, b| compare_keys(&a.key, &b.key));

            let path = self.dir.join(file_name(namespace.as_deref(), kind));
            let file = File::create(&path).map_err(|source| StoreError::Io {
                path: path.clone(),
                source,
            })?;

            let mut exporter = YamlExporter::new(
                BufWriter::new(file),
                TypeStyle::Direct,
                namespace.as_deref(),
                Some(kind),
            );
            exporter.dump_scheme(&entities)?;
            exporter.dump_entities(&entities)?;
            debug!(path = %path.display(), count = entities.len(), "saved kind");
        }
        Ok(())
    }
}

fn file_name(namespace: Option<&str>, kind: &str) -> String {
    match namespace {
        Some(ns) => format!("{}.{}.yaml", ns, kind),
        None => format!("{}.yaml", kind),
    }
}

fn load_file(path: &Path) -> Result<Vec<Entity>, StoreError> {
    let data = reader::read_file(path, Some(Format::Yaml))?;
    let resolver = Resolver::new(&data.scheme)?;
    Ok(resolver.resolve_all(&data)?)
}

impl Datastore for LocalStore {
    fn put_multi(&mut self, entities: Vec<Entity>) -> Result<Vec<Key>, StoreError> {
        let keys = self.memory.put_multi(entities)?;

        let mut groups: BTreeMap<(Option<String>, String), ()> = BTreeMap::new();
        for key in &keys {
            groups.insert((key.namespace.clone(), key.kind.clone()), ());
        }
        let groups: Vec<_> = groups.into_keys().collect();
        self.save(&groups)?;

        info!(count = keys.len(), dir = %self.dir.display(), "stored entities");
        Ok(keys)
    }

    fn run_query(&self, query: &StoreQuery) -> Result<EntityIter<'_>, StoreError> {
        self.memory.run_query(query)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::Property;

    fn book(id: i64, pages: i64) -> Entity {
        Entity::new(
            Key::id("Book", id, None),
            vec![Property::new("pages", TypedValue::Integer(pages))],
        )
    }

    #[test]
    fn test_incomplete_keys_get_ids() {
        let mut store = MemoryStore::new();
        store.put_multi(vec![book(5, 1)]).unwrap();
        let keys = store
            .put_multi(vec![Entity::new(Key::incomplete("Book", None), vec![])])
            .unwrap();
        assert_eq!(keys[0].id, KeyId::Id(6));
    }

    #[test]
    fn test_query_order_and_limit() {
        let mut store = MemoryStore::new();
        store
            .put_multi(vec![book(1, 300), book(2, 100), book(3, 200)])
            .unwrap();

        let mut query = StoreQuery::new("Book");
        query.orders.push(crate::plan::Order {
            property: "pages".to_string(),
            descending: true,
        });
        query.limit = Some(2);

        let ids: Vec<KeyId> = store
            .run_query(&query)
            .unwrap()
            .map(|e| e.unwrap().key.id)
            .collect();
        assert_eq!(ids, vec![KeyId::Id(1), KeyId::Id(3)]);
    }

    #[test]
    fn test_distinct_is_unsupported() {
        let store = MemoryStore::new();
        let mut query = StoreQuery::new("Book");
        query.distinct = true;
        assert!(matches!(
            store.run_query(&query),
            Err(StoreError::Unsupported(_))
        ));
    }

    #[test]
    fn test_key_ordering() {
        let a = Key::id("Book", 10, None);
        let b = Key::named("Book", "a", None);
        assert_eq!(compare_keys(&a, &b), Ordering::Less);
        let child = Key::id("Page", 1, Some(a.clone()));
        assert_eq!(compare_keys(&a, &child), Ordering::Less);
    }
}
