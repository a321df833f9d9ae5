//! Import a record file into the store

use std::path::PathBuf;

use tracing::{debug, info};

use super::{CliError, Context};
use crate::reader::{self, Format};
use crate::resolver::Resolver;
use crate::store::Datastore;

/// Largest number of records written in one store call.
pub const MAX_BATCH_SIZE: usize = 500;

/// Options for the upsert command
#[derive(Debug, Clone)]
pub struct UpsertOptions {
    /// Record file to import
    pub file: PathBuf,
    /// Kind, when the file does not name one (or to check the one it names)
    pub kind: Option<String>,
    /// File format; taken from the extension when absent
    pub format: Option<Format>,
    pub batch_size: usize,
}

impl UpsertOptions {
    pub fn new(file: impl Into<PathBuf>) -> Self {
        UpsertOptions {
            file: file.into(),
            kind: None,
            format: None,
            batch_size: MAX_BATCH_SIZE,
        }
    }
}

/// Reads, resolves and writes one record file. Every record is resolved
/// before the first write, so a bad record leaves the store untouched.
/// Returns the number of records resolved.
pub fn execute_upsert(
    ctx: &Context,
    options: &UpsertOptions,
    store: &mut dyn Datastore,
) -> Result<usize, CliError> {
    if options.batch_size == 0 || options.batch_size > MAX_BATCH_SIZE {
        return Err(CliError::InvalidOption(format!(
            "batch size should be between 1 and {}, got {}",
            MAX_BATCH_SIZE, options.batch_size
        )));
    }

    let mut data = reader::read_file(&options.file, options.format)?;
    data.scheme
        .reconcile(options.kind.as_deref(), ctx.namespace())?;

    let resolver = Resolver::new(&data.scheme)?;
    let entities = resolver.resolve_all(&data)?;
    let total = entities.len();

    if ctx.dry_run {
        info!("dry run: {} entities were resolved, nothing was upserted", total);
        return Ok(total);
    }

    let mut written = 0;
    for batch in entities.chunks(options.batch_size) {
        let keys = store.put_multi(batch.to_vec())?;
        written += keys.len();
        debug!(batch = keys.len(), written, total, "upserted batch");
    }

    info!("{} entities were successfully upserted", written);
    Ok(total)
}
