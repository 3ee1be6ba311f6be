//! `propuesta` CLI - batch jobs for assembling a bid proposal

use std::path::Path;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use anyhow::Result;
use clap::Parser;
use clap::Subcommand;
use tracing::error;
use tracing::info;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use propuesta::document::updated_path;
use propuesta::files::build_hybrids;
use propuesta::files::extract_requirements;
use propuesta::files::hybrid_groups;
use propuesta::files::move_files;
use propuesta::files::write_requirements;
use propuesta::pdf::export_pdf;
use propuesta::pdf::load_bookmark_names;
use propuesta::pdf::split_by_bookmarks;
use propuesta::pricing::extract_prices;
use propuesta::pricing::write_prices;
use propuesta::spreadsheet::read_dataset;
use propuesta::spreadsheet::read_sheet;
use propuesta::spreadsheet::Value;
use propuesta::spreadsheet::WorkbookWriter;
use propuesta::Config;
use propuesta::Document;

/// Header of the manifest written after a split.
const SPLIT_MANIFEST_HEADER: &str = "PDF File Name";

#[derive(Parser)]
#[command(name = "propuesta")]
#[command(about = "Batch jobs for bid documents: Word tables from Excel, PDF split and merge, file moves")]
#[command(version)]
struct Cli {
    /// Job configuration (TOML); the built-in workflow is used when omitted
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log at debug level unless RUST_LOG is set
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Preview the first rows of every table in the template
    Tables,

    /// Fill the configured tables and save the updated copy
    Populate {
        /// Only fill the tables with these names
        #[arg(short, long)]
        table: Vec<String>,
    },

    /// List the headings that become PDF bookmarks
    Headings,

    /// Convert the updated document to PDF
    ExportPdf {
        /// Document to convert instead of the updated template
        input: Option<PathBuf>,
    },

    /// Split the exported PDF at its bookmarks
    Split,

    /// Copy the files listed in the mover manifest
    Move,

    /// Build the hybrid PDFs
    Merge,

    /// Extract requirement blocks from the PDFs of a folder
    Requirements,

    /// Write unit prices into the portal template
    Prices,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(if cli.verbose { "debug" } else { "info" }));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).compact().init();

    match run(cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(error) => {
            error!("{error:#}");
            ExitCode::FAILURE
        }
    }
}

/// Runs one command; `Ok(false)` means it finished with failures already reported.
fn run(cli: Cli) -> Result<bool> {
    let config = Config::load(cli.config.as_deref()).context("loading configuration")?;

    match cli.command {
        Commands::Tables => cmd_tables(&config),
        Commands::Populate { table } => cmd_populate(&config, &table),
        Commands::Headings => cmd_headings(&config),
        Commands::ExportPdf { input } => cmd_export_pdf(&config, input.as_deref()),
        Commands::Split => cmd_split(&config),
        Commands::Move => cmd_move(&config),
        Commands::Merge => cmd_merge(&config),
        Commands::Requirements => cmd_requirements(&config),
        Commands::Prices => cmd_prices(&config),
    }
}

fn open_template(config: &Config) -> Result<Document> {
    let path = config.resolve(&config.populate.document);
    Document::open(&path).with_context(|| format!("opening '{}'", path.display()))
}

fn cmd_tables(config: &Config) -> Result<bool> {
    let document = open_template(config)?;
    for (index, rows) in document.show_tables(config.populate.preview_rows).iter().enumerate() {
        println!("Table {}:", index + 1);
        for row in rows {
            println!("  {}", row.join(" | "));
        }
        println!();
    }
    Ok(true)
}

fn cmd_headings(config: &Config) -> Result<bool> {
    let document = open_template(config)?;
    for (index, heading) in document.headings(&config.populate.heading_style).iter().enumerate() {
        println!("{}. {}", index + 1, heading);
    }
    Ok(true)
}

fn cmd_populate(config: &Config, only: &[String]) -> Result<bool> {
    for name in only {
        config.table(name)?;
    }
    let mut document = open_template(config)?;
    let workbook = config.resolve(&config.populate.workbook);
    let mut rows = read_dataset(&workbook, Some(&config.populate.sheet))
        .with_context(|| format!("reading '{}'", workbook.display()))?;
    if let Some(column) = &config.populate.sort_by {
        rows = rows.sort_by(column);
    }

    let mut failures = Vec::new();
    for spec in &config.populate.tables {
        if !only.is_empty() && !only.contains(&spec.name) {
            continue;
        }
        let selected = match &spec.filter {
            Some(filter) => rows.filter_eq(&filter.column, &filter.value),
            None => rows.clone(),
        };
        match propuesta::populate(&mut document, &selected, spec) {
            Ok(report) => {
                for recovered in &report.recovered {
                    warn!(table = %spec.label(), row = recovered.row, field = %recovered.field, value = %recovered.value, "written as text");
                }
                info!(table = %spec.label(), rows = report.rows, placeholders = report.placeholders, "table filled");
            }
            Err(reason) => {
                error!(table = %spec.label(), %reason, "table not filled");
                failures.push((spec.label(), reason));
            }
        }
    }

    let output = updated_path(config.resolve(&config.populate.document));
    document.save_as(&output).with_context(|| format!("saving '{}'", output.display()))?;

    if failures.is_empty() {
        println!("All tables filled; saved '{}'", output.display());
        return Ok(true);
    }
    println!("Saved '{}' with {} table(s) not filled:", output.display(), failures.len());
    for (label, reason) in &failures {
        println!("  {label}: {reason}");
    }
    Ok(false)
}

fn cmd_export_pdf(config: &Config, input: Option<&Path>) -> Result<bool> {
    let input = match input {
        Some(path) => config.resolve(path),
        None => updated_path(config.resolve(&config.populate.document)),
    };
    let pdf = export_pdf(&input, &config.export.converter)?;
    println!("Exported '{}'", pdf.display());
    Ok(true)
}

fn cmd_split(config: &Config) -> Result<bool> {
    let split = &config.split;
    let names = load_bookmark_names(config.resolve(&split.names))?;
    let output = config.resolve(&split.output);
    let written = split_by_bookmarks(config.resolve(&split.pdf), &names, &output)?;

    let mut manifest = WorkbookWriter::new("Sheet1");
    manifest.push_row(vec![Value::from(SPLIT_MANIFEST_HEADER)]);
    for name in &written {
        manifest.push_row(vec![Value::from(name.as_str())]);
    }
    let manifest_path = config.resolve(&split.manifest);
    manifest.save(&manifest_path).with_context(|| format!("writing '{}'", manifest_path.display()))?;

    println!("Wrote {} file(s) to '{}'", written.len(), output.display());
    Ok(written.len() == names.len())
}

fn cmd_move(config: &Config) -> Result<bool> {
    let workbook = config.resolve(&config.mover.workbook);
    let manifest = read_dataset(&workbook, Some(&config.mover.sheet))
        .with_context(|| format!("reading '{}'", workbook.display()))?;
    let missing = move_files(&manifest, &config.base_dir())?;
    if missing.is_empty() {
        println!("All files copied");
        return Ok(true);
    }
    println!("{} file(s) not found:", missing.len());
    for file in &missing {
        println!("  {} (in '{}')", file.file_name, file.source.display());
    }
    Ok(false)
}

fn cmd_merge(config: &Config) -> Result<bool> {
    let hybrids = &config.hybrids;
    let workbook = config.resolve(&hybrids.workbook);
    let sheet = read_sheet(&workbook, Some(&hybrids.sheet)).with_context(|| format!("reading '{}'", workbook.display()))?;
    let report = build_hybrids(&hybrid_groups(&sheet), &config.base_dir(), &config.resolve(&hybrids.output))?;

    println!("Merged {}, copied {}", report.merged.len(), report.copied.len());
    for (output, files) in &report.missing {
        println!("  {output} not written, missing:");
        for file in files {
            println!("    {}", file.display());
        }
    }
    for (output, reason) in &report.failed {
        println!("  {output} failed: {reason}");
    }
    Ok(report.missing.is_empty() && report.failed.is_empty())
}

fn cmd_requirements(config: &Config) -> Result<bool> {
    let folder = config.resolve(&config.requirements.folder);
    let requirements = extract_requirements(&folder, &config.requirements.fields)?;
    let output = folder.join(&config.requirements.output);
    write_requirements(&requirements, &output).with_context(|| format!("writing '{}'", output.display()))?;
    println!("Wrote {} requirement(s) to '{}'", requirements.len(), output.display());
    Ok(true)
}

fn cmd_prices(config: &Config) -> Result<bool> {
    let prices = &config.prices;
    let source = config.resolve(&prices.source);
    let dataset = read_dataset(&source, Some(&prices.sheet)).with_context(|| format!("reading '{}'", source.display()))?;
    let lines = extract_prices(&dataset)?;
    let report = write_prices(&config.resolve(&prices.template), &lines, &config.resolve(&prices.output))?;

    println!("Wrote {} price(s) to '{}'", report.written, report.path.display());
    for description in &report.not_found {
        println!("  not found in template: {description}");
    }
    Ok(report.not_found.is_empty())
}
