use std::fmt;

/// Condition comparators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparator {
    /// `=`
    Equals,
    /// `<`
    Less,
    /// `<=`
    LessEquals,
    /// `>`
    Greater,
    /// `>=`
    GreaterEquals,
    /// `IS NULL`
    IsNull,
    /// `CONTAINS`
    Contains,
    /// `IN`
    In,
    /// `HAS ANCESTOR`
    HasAncestor,
    /// `HAS DESCENDANT`
    HasDescendant,
}

impl Comparator {
    pub fn as_str(self) -> &'static str {
        match self {
            Comparator::Equals => "=",
            Comparator::Less => "<",
            Comparator::LessEquals => "<=",
            Comparator::Greater => ">",
            Comparator::GreaterEquals => ">=",
            Comparator::IsNull => "IS NULL",
            Comparator::Contains => "CONTAINS",
            Comparator::In => "IN",
            Comparator::HasAncestor => "HAS ANCESTOR",
            Comparator::HasDescendant => "HAS DESCENDANT",
        }
    }
}

impl fmt::Display for Comparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sort direction of an `ORDER BY` term.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    /// No direction written
    #[default]
    None,
    /// `ASC`
    Asc,
    /// `DESC`
    Desc,
}
