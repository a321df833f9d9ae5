use clap::{Parser as ClapParser, Subcommand};
use dsio::cli::{
    self, AssumeYes, CliError, Confirm, Context, DEFAULT_PAGE_SIZE, DEFAULT_STORE_DIR,
    MAX_BATCH_SIZE, QueryOptions, StdinConfirm, UpsertOptions,
};
use dsio::output::TypeStyle;
use dsio::reader::Format;
use dsio::store::LocalStore;
use std::io::{self, BufRead, Read, Write};
use std::path::PathBuf;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(ClapParser)]
#[command(name = "dsio")]
#[command(about = "dsio - bulk import and GQL export for a Datastore-style entity store")]
#[command(version)]
struct Cli {
    /// Namespace to read and write
    #[arg(short, long, global = true)]
    namespace: Option<String>,

    /// Project that KEY(PROJECT(...)) literals must match
    #[arg(long, global = true, env = "DSIO_PROJECT_ID")]
    project_id: Option<String>,

    /// Directory of the local store
    #[arg(long, global = true, env = "DSIO_STORE_DIR", default_value = DEFAULT_STORE_DIR)]
    store_dir: PathBuf,

    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Insert or update the records of a YAML, CSV or TSV file
    Upsert {
        /// Record file to import
        file: PathBuf,

        /// Kind of the records
        #[arg(short, long)]
        kind: Option<String>,

        /// File format (yaml, csv or tsv); taken from the extension by default
        #[arg(short, long)]
        format: Option<Format>,

        /// Resolve the records without writing them
        #[arg(long)]
        dry_run: bool,

        /// Records written per store call
        #[arg(long, default_value_t = MAX_BATCH_SIZE)]
        batch_size: usize,
    },

    /// Export the results of a GQL query
    Query {
        /// The GQL query (read from stdin if not provided)
        #[arg(allow_negative_numbers = true)]
        query: Vec<String>,

        /// Output file (stdout if not provided)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Output format (yaml, csv or tsv)
        #[arg(short, long, default_value = "yaml")]
        format: Format,

        /// Type annotation style (scheme, direct or auto)
        #[arg(short, long, default_value = "scheme")]
        style: TypeStyle,

        /// Records written before asking whether to go on
        #[arg(long, default_value_t = DEFAULT_PAGE_SIZE)]
        page_size: usize,

        /// Answer yes to every question
        #[arg(short, long)]
        yes: bool,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();

    let mut ctx = Context {
        namespace: cli.namespace,
        project_id: cli.project_id,
        store_dir: cli.store_dir,
        verbose: cli.verbose,
        ..Context::default()
    };

    let result = match cli.command {
        Commands::Upsert {
            file,
            kind,
            format,
            dry_run,
            batch_size,
        } => {
            ctx.dry_run = dry_run;
            let options = UpsertOptions {
                file,
                kind,
                format,
                batch_size,
            };
            run_upsert(&ctx, &options)
        }
        Commands::Query {
            query,
            output,
            format,
            style,
            page_size,
            yes,
        } => run_query(&ctx, query, output, format, style, page_size, yes),
    };

    if let Err(e) = result {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}

fn run_upsert(ctx: &Context, options: &UpsertOptions) -> Result<(), CliError> {
    debug!(?ctx, ?options, "upsert");
    let mut store = LocalStore::open(&ctx.store_dir)?;
    cli::execute_upsert(ctx, options, &mut store)?;
    Ok(())
}

fn run_query(
    ctx: &Context,
    query: Vec<String>,
    output: Option<PathBuf>,
    format: Format,
    style: TypeStyle,
    page_size: usize,
    yes: bool,
) -> Result<(), CliError> {
    debug!(?ctx, %format, %style, page_size, "query");
    let mut confirm: Box<dyn Confirm> = if yes {
        Box::new(AssumeYes)
    } else {
        Box::new(StdinConfirm)
    };

    let store = LocalStore::open(&ctx.store_dir)?;
    let query = if query.is_empty() {
        read_query(ctx)?
    } else {
        query.join(" ")
    };

    let options = QueryOptions {
        query,
        format,
        style,
        page_size,
    };

    match output {
        Some(path) => match cli::open_output(&path, confirm.as_mut())? {
            Some(file) => {
                cli::execute_query(ctx, &options, &store, file, confirm.as_mut())?;
            }
            None => eprintln!("canceled"),
        },
        None => {
            let stdout = io::stdout();
            cli::execute_query(ctx, &options, &store, stdout.lock(), confirm.as_mut())?;
        }
    }
    Ok(())
}

/// Takes the query from piped stdin, or prompts for one until it parses.
fn read_query(ctx: &Context) -> Result<String, CliError> {
    if !atty::is(atty::Stream::Stdin) {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        let buffer = buffer.trim().to_string();
        if buffer.is_empty() {
            return Err(CliError::NoInput);
        }
        return Ok(buffer);
    }

    let stdin = io::stdin();
    let mut lines = stdin.lock();
    loop {
        eprint!("gql> ");
        io::stderr().flush()?;

        let mut line = String::new();
        if lines.read_line(&mut line)? == 0 {
            return Err(CliError::NoInput);
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match dsio::parse_query(line) {
            Ok(select) => match dsio::translate(&select, ctx.namespace(), ctx.project_id()) {
                Ok(_) => return Ok(line.to_string()),
                Err(e) => eprintln!("{}", e),
            },
            Err(e) => eprintln!("Parse error: {}", e),
        }
    }
}
