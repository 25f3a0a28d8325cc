//! sheetgate CLI - run spreadsheet imports from the command line

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use sheetgate::{
    ImportOptions, ImportRequest, Importer, JsonLinesPersistence, KeyValueContext, Schema,
    SchemaRegistry, SecurityGuard,
};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "sheetgate")]
#[command(author, version, about = "Schema-driven spreadsheet import tool")]
struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Import a workbook and print the result as JSON
    Import {
        /// Uploaded workbook (xlsx)
        input: PathBuf,

        /// Schema definition (JSON)
        #[arg(short, long)]
        schema: PathBuf,

        /// Import options (JSON); absent keys keep their defaults
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Directory for error reports (overrides the config)
        #[arg(long)]
        report_dir: Option<PathBuf>,

        /// Caller context entry, repeatable
        #[arg(short, long = "key", value_name = "NAME=VALUE", value_parser = parse_key)]
        keys: Vec<(String, String)>,

        /// Where accepted rows are appended (default: <input>.rows.jsonl)
        #[arg(long)]
        rows_out: Option<PathBuf>,
    },

    /// Count the rows of one sheet without loading it
    CountRows {
        input: PathBuf,

        /// Sheet index (0-based)
        #[arg(short, long, default_value = "0")]
        sheet: usize,
    },

    /// List sheets with their used ranges
    Sheets {
        input: PathBuf,
    },

    /// Run only the security check
    Check {
        input: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Import {
            input,
            schema,
            config,
            report_dir,
            keys,
            rows_out,
        } => import(
            &input,
            &schema,
            config.as_deref(),
            report_dir,
            keys,
            rows_out,
        ),
        Commands::CountRows { input, sheet } => count_rows(&input, sheet),
        Commands::Sheets { input } => list_sheets(&input),
        Commands::Check { input } => check(&input),
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn parse_key(pair: &str) -> std::result::Result<(String, String), String> {
    KeyValueContext::parse_pair(pair).ok_or_else(|| format!("expected NAME=VALUE, got '{}'", pair))
}

fn load_options(config: Option<&Path>) -> Result<ImportOptions> {
    match config {
        Some(path) => ImportOptions::from_file(path)
            .with_context(|| format!("Failed to read options from '{}'", path.display())),
        None => Ok(ImportOptions::default()),
    }
}

fn import(
    input: &Path,
    schema_path: &Path,
    config: Option<&Path>,
    report_dir: Option<PathBuf>,
    keys: Vec<(String, String)>,
    rows_out: Option<PathBuf>,
) -> Result<()> {
    let mut options = load_options(config)?;
    if let Some(dir) = report_dir {
        options.report_dir = dir;
    }

    let text = std::fs::read_to_string(schema_path)
        .with_context(|| format!("Failed to read '{}'", schema_path.display()))?;
    let schema = Schema::from_json(&text)
        .with_context(|| format!("Invalid schema '{}'", schema_path.display()))?;
    let schema_id = schema.id.clone();

    let rows_out = rows_out.unwrap_or_else(|| input.with_extension("rows.jsonl"));
    let registry = SchemaRegistry::builder()
        .register(schema, JsonLinesPersistence::new(&rows_out))
        .build()?;
    let importer = Importer::new(registry, options).context("Invalid import options")?;

    let mut context = KeyValueContext::new();
    for (name, value) in keys {
        context.insert(name, value);
    }

    let original_name = input.file_name().and_then(|n| n.to_str());
    let mut request = ImportRequest::file(input, &schema_id, &context);
    if let Some(name) = original_name {
        request = request.original_name(name);
    }

    let result = importer.run(&request);
    println!("{}", serde_json::to_string_pretty(&result)?);

    if let Some(id) = &result.report_id {
        let path = importer.reports().locate(&context, id)?;
        eprintln!("Error report: {}", path.display());
    } else if result.success {
        log::info!("rows appended to '{}'", rows_out.display());
    }

    if !result.success {
        std::process::exit(2);
    }
    Ok(())
}

fn guard() -> SecurityGuard {
    let options = ImportOptions::default();
    SecurityGuard::new(options.max_file_bytes, options.read_limits())
}

fn count_rows(input: &Path, sheet: usize) -> Result<()> {
    let guard = guard();
    guard
        .check_file(input)
        .with_context(|| format!("'{}' failed the security check", input.display()))?;

    let file = std::fs::File::open(input)
        .with_context(|| format!("Failed to open '{}'", input.display()))?;
    let reader = std::io::BufReader::new(file);
    let count = sheetgate_xlsx::count_rows(reader, sheet, guard.limits(), None)
        .with_context(|| format!("Failed to count rows of sheet {}", sheet))?;

    println!("{}", count);
    Ok(())
}

fn list_sheets(input: &Path) -> Result<()> {
    let workbook = guard()
        .open_workbook(input)
        .with_context(|| format!("Failed to open '{}'", input.display()))?;

    for (i, sheet) in workbook.worksheets().enumerate() {
        match sheet.used_range() {
            Some(range) => println!(
                "{}\t{}\t{} rows x {} columns",
                i,
                sheet.name(),
                range.end.row + 1,
                range.end.col + 1
            ),
            None => println!("{}\t{}\tempty", i, sheet.name()),
        }
    }

    Ok(())
}

fn check(input: &Path) -> Result<()> {
    match guard().check_file(input) {
        Ok(sheets) => {
            println!("OK: {} sheets", sheets.len());
            for sheet in sheets.iter().filter(|s| !s.visible) {
                println!("  hidden: {}", sheet.name);
            }
            Ok(())
        }
        Err(e) => bail!("'{}' rejected: {}", input.display(), e),
    }
}
