pub mod ast;
pub mod cli;
pub mod entity;
pub mod keys;
pub mod lexer;
pub mod output;
pub mod parser;
pub mod plan;
pub mod reader;
pub mod resolver;
pub mod schema;
pub mod store;
pub mod value;

pub use ast::{SelectExpr, Token};
pub use entity::{Entity, Key, KeyId, Property, TypedValue};
pub use lexer::{LexError, Lexer};
pub use output::{Exporter, TypeStyle};
pub use parser::{ParseError, Parser, parse_query};
pub use plan::{StoreQuery, translate};
pub use reader::{Format, read_file};
pub use resolver::{ResolveError, Resolver};
pub use schema::{DataType, KindData, Scheme};
pub use store::{Datastore, LocalStore, MemoryStore};
pub use value::RawValue;
