//! # GQL - Abstract Syntax Tree
//!
//! This module defines the Abstract Syntax Tree (AST) for the GQL subset understood
//! by `dsio query`: a single `SELECT` statement over one kind, with conjunctive
//! filters, ordering and a limit/offset window.
//!
//! ## Architecture Overview
//!
//! The AST module is organized into focused submodules:
//!
//! - **[tokens]** - Lexical tokens produced by the lexer
//! - **[operators]** - Condition comparators and sort directions
//! - **[expressions]** - Literal values, including the `KEY(...)`, `BLOB(...)` and
//!   `DATETIME(...)` sub-grammars
//! - **[query]** - The `SELECT` statement and its clauses
//!
//! ## Quick Start
//!
//! ```text
//! SELECT * FROM Book WHERE author = 'Huxley' AND pages > 100 ORDER BY title LIMIT 10
//! ```
//!
//! ## Core Concepts
//!
//! ### Conditions keep their written order
//!
//! A condition may be written property-first (`a = 1`) or value-first (`1 = a`).
//! Both forms are kept apart as [`ConditionExpr::Forward`] and
//! [`ConditionExpr::Backward`] but share the same [`Condition`] triple; the
//! comparator is never flipped.
//!
//! ### Permissive shapes
//!
//! The parser accepts `IS NULL`, `CONTAINS`, `IN` and `HAS DESCENDANT`, and
//! bindings in `LIMIT`/`OFFSET`. Whether a store can honour them is decided when
//! the AST is translated into a store query (see [`crate::plan`]).
//!
//! ### Sort direction
//!
//! `ORDER BY name` without `ASC`/`DESC` is recorded as [`SortOrder::None`], not
//! defaulted to ascending.
//!
//! ## Examples
//!
//! ### Key literal with ancestor path
//!
//! ```text
//! SELECT * FROM Book WHERE __key__ HAS ANCESTOR KEY(Author, 'Huxley')
//! ```
//!
//! ### Bound limit with a literal fallback
//!
//! ```text
//! SELECT * FROM Book LIMIT FIRST(@limit, 20) OFFSET @start + 10
//! ```
pub mod expressions;
pub mod operators;
pub mod query;
pub mod tokens;

pub use expressions::{KeyLiteral, KeyPathElement, ValueExpr, ValueType};
pub use operators::{Comparator, SortOrder};
pub use query::{
    Condition, ConditionExpr, FieldExpr, FromExpr, LimitExpr, OffsetExpr, OrderExpr, SelectExpr,
};
pub use tokens::{Keyword, Span, Token, TokenKind};
