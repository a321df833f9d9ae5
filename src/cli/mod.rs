//! Import and export pipelines behind the `dsio` binary.
//!
//! Everything here takes an explicit [`Context`] and a
//! [`Datastore`](crate::store::Datastore), so the
//! pipelines run the same against the local store, an in-memory store or any
//! other implementation.

mod confirm;
mod context;
mod query;
mod upsert;

pub use confirm::{AssumeYes, Confirm, StdinConfirm};
pub use context::{Context, DEFAULT_STORE_DIR};
pub use query::{
    DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE, QueryOptions, execute_query, open_output,
};
pub use upsert::{MAX_BATCH_SIZE, UpsertOptions, execute_upsert};

use thiserror::Error;

use crate::output::ExportError;
use crate::parser::ParseError;
use crate::plan::PlanError;
use crate::reader::ReadError;
use crate::resolver::ResolveError;
use crate::store::StoreError;

/// Errors that can occur during CLI operations
#[derive(Debug, Error)]
pub enum CliError {
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("{0}")]
    Plan(#[from] PlanError),

    #[error("{0}")]
    Read(#[from] ReadError),

    #[error("{0}")]
    Resolve(#[from] ResolveError),

    #[error("{0}")]
    Export(#[from] ExportError),

    #[error("{0}")]
    Store(#[from] StoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid option: {0}")]
    InvalidOption(String),

    #[error("No query provided. Pass it as an argument or pipe it to stdin.")]
    NoInput,
}
