use crate::ast::{Comparator, SortOrder, ValueExpr};

/// Complete `SELECT` statement.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SelectExpr {
    /// Selected fields
    pub field: FieldExpr,

    /// `FROM kind`, `None` for a kindless query
    pub from: Option<FromExpr>,

    /// `WHERE` conditions, joined by `AND`
    pub conditions: Vec<ConditionExpr>,

    /// `ORDER BY` terms
    pub order: Vec<OrderExpr>,

    pub limit: Option<LimitExpr>,

    pub offset: Option<OffsetExpr>,
}

impl SelectExpr {
    pub fn kind(&self) -> Option<&str> {
        self.from.as_ref().map(|f| f.kind.as_str())
    }
}

/// Field list of a `SELECT`.
///
/// `DISTINCT ON (a, b)` fills `distinct_on` and leaves `distinct` false.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FieldExpr {
    pub distinct: bool,
    pub distinct_on: Vec<String>,
    pub asterisk: bool,
    pub fields: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FromExpr {
    pub kind: String,
}

/// The `(property, comparator, value)` triple shared by both condition forms.
///
/// `value` is `None` only for `IS NULL`.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub property: String,
    pub comparator: Comparator,
    pub value: Option<ValueExpr>,
}

/// A `WHERE` condition in the operand order it was written.
#[derive(Debug, Clone, PartialEq)]
pub enum ConditionExpr {
    /// `property OP value`
    Forward(Condition),
    /// `value OP property`
    Backward(Condition),
}

impl ConditionExpr {
    pub fn condition(&self) -> &Condition {
        match self {
            ConditionExpr::Forward(c) | ConditionExpr::Backward(c) => c,
        }
    }

    pub fn property(&self) -> &str {
        &self.condition().property
    }

    pub fn comparator(&self) -> Comparator {
        self.condition().comparator
    }

    pub fn value(&self) -> Option<&ValueExpr> {
        self.condition().value.as_ref()
    }

    pub fn is_forward(&self) -> bool {
        matches!(self, ConditionExpr::Forward(_))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderExpr {
    pub property: String,
    pub sort: SortOrder,
}

/// `LIMIT n`, `LIMIT @b` or `LIMIT FIRST(@b, n)`.
///
/// `FIRST` keeps both the binding and the literal fallback.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LimitExpr {
    pub binding: Option<String>,
    pub number: Option<i64>,
}

/// `OFFSET n`, `OFFSET @b` or `OFFSET @b + n`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct OffsetExpr {
    pub binding: Option<String>,
    pub number: Option<i64>,
}
