//! Translation of a parsed `SELECT` into a [`StoreQuery`].
//!
//! The parser accepts the whole grammar; this is where shapes the store
//! cannot run are turned away, one error per construct.

use std::fmt;

use thiserror::Error;

use crate::ast::{Comparator, ConditionExpr, KeyLiteral, SelectExpr, SortOrder, ValueExpr};
use crate::entity::{Key, TypedValue};
use crate::schema::KEY_FIELD;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PlanError {
    #[error("sorry. {0} is not supported")]
    Unsupported(String),

    #[error("invalid query: {0}")]
    Invalid(String),
}

/// Comparison a store filter applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Equal,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
}

impl FilterOp {
    fn from_comparator(comparator: Comparator) -> Option<FilterOp> {
        match comparator {
            Comparator::Equals => Some(FilterOp::Equal),
            Comparator::Less => Some(FilterOp::LessThan),
            Comparator::LessEquals => Some(FilterOp::LessThanOrEqual),
            Comparator::Greater => Some(FilterOp::GreaterThan),
            Comparator::GreaterEquals => Some(FilterOp::GreaterThanOrEqual),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FilterOp::Equal => "=",
            FilterOp::LessThan => "<",
            FilterOp::LessThanOrEqual => "<=",
            FilterOp::GreaterThan => ">",
            FilterOp::GreaterThanOrEqual => ">=",
        }
    }
}

impl fmt::Display for FilterOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `property op value`, property always on the left. A backward condition
/// keeps the comparator it was written with.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub property: String,
    pub op: FilterOp,
    pub value: TypedValue,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub property: String,
    pub descending: bool,
}

/// A query the store can run.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StoreQuery {
    pub kind: String,
    pub namespace: Option<String>,
    /// Properties to keep; empty keeps all
    pub projection: Vec<String>,
    pub keys_only: bool,
    pub distinct: bool,
    pub distinct_on: Vec<String>,
    pub filters: Vec<Filter>,
    pub ancestor: Option<Key>,
    pub orders: Vec<Order>,
    pub limit: Option<usize>,
    pub offset: usize,
}

impl StoreQuery {
    pub fn new(kind: impl Into<String>) -> Self {
        StoreQuery {
            kind: kind.into(),
            ..StoreQuery::default()
        }
    }
}

/// Translates `select` for the store, under the configured namespace and
/// project.
pub fn translate(
    select: &SelectExpr,
    namespace: Option<&str>,
    project: Option<&str>,
) -> Result<StoreQuery, PlanError> {
    let kind = select
        .kind()
        .ok_or_else(|| PlanError::Unsupported("kindless query".to_string()))?;

    let namespace = namespace.filter(|ns| !ns.is_empty());
    let mut query = StoreQuery::new(kind);
    query.namespace = namespace.map(str::to_string);

    let field = &select.field;
    query.distinct = field.distinct;
    query.distinct_on = field.distinct_on.clone();
    if !field.asterisk {
        if field.fields.len() == 1 && field.fields[0] == KEY_FIELD {
            query.keys_only = true;
        } else {
            query.projection = field.fields.clone();
        }
    }

    for condition in &select.conditions {
        plan_condition(&mut query, condition, namespace, project)?;
    }

    query.orders = select
        .order
        .iter()
        .map(|o| Order {
            property: o.property.clone(),
            descending: o.sort == SortOrder::Desc,
        })
        .collect();

    if let Some(limit) = &select.limit {
        if let Some(binding) = &limit.binding {
            return Err(PlanError::Unsupported(format!("cursor @{} in LIMIT", binding)));
        }
        query.limit = limit.number.map(|n| count("LIMIT", n)).transpose()?;
    }

    if let Some(offset) = &select.offset {
        if let Some(binding) = &offset.binding {
            return Err(PlanError::Unsupported(format!("cursor @{} in OFFSET", binding)));
        }
        query.offset = offset.number.map(|n| count("OFFSET", n)).transpose()?.unwrap_or(0);
    }

    Ok(query)
}

fn count(clause: &str, n: i64) -> Result<usize, PlanError> {
    usize::try_from(n).map_err(|_| PlanError::Invalid(format!("{} should not be negative: {}", clause, n)))
}

fn plan_condition(
    query: &mut StoreQuery,
    condition: &ConditionExpr,
    namespace: Option<&str>,
    project: Option<&str>,
) -> Result<(), PlanError> {
    let comparator = condition.comparator();
    match comparator {
        Comparator::IsNull => Err(PlanError::Unsupported("'IS NULL'".to_string())),
        Comparator::Contains => Err(PlanError::Unsupported("'CONTAINS'".to_string())),
        Comparator::In => Err(PlanError::Unsupported("'IN'".to_string())),
        Comparator::HasDescendant => Err(PlanError::Unsupported("'HAS DESCENDANT'".to_string())),

        Comparator::HasAncestor => {
            let Some(ValueExpr::Key(literal)) = condition.value() else {
                return Err(PlanError::Invalid(
                    "HAS ANCESTOR requires a KEY(...) literal".to_string(),
                ));
            };
            if condition.property() != KEY_FIELD {
                return Err(PlanError::Invalid(format!(
                    "HAS ANCESTOR applies to {}, not '{}'",
                    KEY_FIELD,
                    condition.property()
                )));
            }
            if query.ancestor.is_some() {
                return Err(PlanError::Unsupported("more than one HAS ANCESTOR".to_string()));
            }
            query.ancestor = Some(key_value(literal, namespace, project)?);
            Ok(())
        }

        _ => {
            let Some(op) = FilterOp::from_comparator(comparator) else {
                return Err(PlanError::Unsupported(format!("'{}'", comparator)));
            };
            let value = condition
                .value()
                .ok_or_else(|| PlanError::Invalid(format!("'{}' needs a value", comparator)))?;

            query.filters.push(Filter {
                property: condition.property().to_string(),
                op,
                value: typed_value(value, namespace, project)?,
            });
            Ok(())
        }
    }
}

fn typed_value(
    value: &ValueExpr,
    namespace: Option<&str>,
    project: Option<&str>,
) -> Result<TypedValue, PlanError> {
    Ok(match value {
        ValueExpr::Integer(n) => TypedValue::Integer(*n),
        ValueExpr::Double(n) => TypedValue::Float(*n),
        ValueExpr::String(s) => TypedValue::String(s.clone()),
        ValueExpr::Bool(b) => TypedValue::Boolean(*b),
        ValueExpr::Blob(bytes) => TypedValue::Blob(bytes.clone()),
        ValueExpr::Datetime(t) => TypedValue::Datetime(*t),
        ValueExpr::Key(literal) => TypedValue::Key(key_value(literal, namespace, project)?),
    })
}

fn key_value(
    literal: &KeyLiteral,
    namespace: Option<&str>,
    project: Option<&str>,
) -> Result<Key, PlanError> {
    if let (Some(wanted), Some(configured)) = (literal.project.as_deref(), project) {
        if wanted != configured {
            return Err(PlanError::Unsupported(format!(
                "key of project '{}' while connected to '{}'",
                wanted, configured
            )));
        }
    }

    let key = literal
        .to_key(namespace)
        .ok_or_else(|| PlanError::Invalid("KEY() without a path".to_string()))?;
    if key.path().iter().any(|k| !k.is_complete()) {
        return Err(PlanError::Invalid(format!("incomplete key {} in a condition", key)));
    }
    Ok(key)
}
