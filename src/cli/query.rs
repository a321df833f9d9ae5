//! Export the results of a GQL query

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use tracing::{debug, info};

use super::{CliError, Confirm, Context};
use crate::output::{self, TypeStyle};
use crate::parser::parse_query;
use crate::plan::translate;
use crate::reader::Format;
use crate::store::Datastore;

pub const DEFAULT_PAGE_SIZE: usize = 50;
pub const MAX_PAGE_SIZE: usize = 1000;

const MORE_PROMPT: &str = "Do you want to output more entities?";
const OVERWRITE_PROMPT: &str = "File exists. Do you want to over-write?";

/// Options for the query command
#[derive(Debug, Clone)]
pub struct QueryOptions {
    /// The GQL query to run
    pub query: String,
    pub format: Format,
    pub style: TypeStyle,
    /// Records written before asking whether to go on
    pub page_size: usize,
}

impl QueryOptions {
    pub fn new(query: impl Into<String>) -> Self {
        QueryOptions {
            query: query.into(),
            format: Format::Yaml,
            style: TypeStyle::Scheme,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

/// Opens `path` for writing. An existing file is only replaced once the
/// operator agrees; `None` when they decline.
pub fn open_output(
    path: &Path,
    confirm: &mut dyn Confirm,
) -> Result<Option<BufWriter<File>>, CliError> {
    if path.exists() && !confirm.confirm(OVERWRITE_PROMPT, None)? {
        return Ok(None);
    }
    Ok(Some(BufWriter::new(File::create(path)?)))
}

/// Runs a query and exports its results page by page, asking between pages
/// whether to continue. Declining ends the export without error. Returns the
/// number of records written.
pub fn execute_query<W: Write>(
    ctx: &Context,
    options: &QueryOptions,
    store: &dyn Datastore,
    writer: W,
    confirm: &mut dyn Confirm,
) -> Result<usize, CliError> {
    if options.page_size == 0 || options.page_size > MAX_PAGE_SIZE {
        return Err(CliError::InvalidOption(format!(
            "page size should be between 1 and {}, got {}",
            MAX_PAGE_SIZE, options.page_size
        )));
    }

    let select = parse_query(&options.query)?;
    let query = translate(&select, ctx.namespace(), ctx.project_id())?;
    debug!(?query, "translated query");

    let mut exporter = output::exporter(
        writer,
        options.format,
        options.style,
        query.namespace.as_deref(),
        Some(query.kind.as_str()),
    );

    let mut results = store.run_query(&query)?.peekable();
    let mut written = 0;
    let mut first = true;

    loop {
        let page = results
            .by_ref()
            .take(options.page_size)
            .collect::<Result<Vec<_>, _>>()?;

        if first {
            exporter.dump_scheme(&page)?;
            first = false;
        }
        exporter.dump_entities(&page)?;

        if !page.is_empty() {
            info!(
                "{} entities were successfully output. (No.{} - No.{})",
                page.len(),
                written + 1,
                written + page.len()
            );
        }
        written += page.len();

        if page.len() < options.page_size || results.peek().is_none() {
            break;
        }
        if !confirm.confirm(MORE_PROMPT, Some(true))? {
            debug!(written, "export stopped by operator");
            break;
        }
    }

    Ok(written)
}
