use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde_json::{Map, Value};
use tracing::debug;
use tracing_subscriber::EnvFilter;
use zoo_contracts::events::EventWriter;
use zoo_contracts::models::{CatalogIndex, MatchKind, Model, ModelSelector};
use zoo_contracts::summary::{write_summary, CatalogSummary};
use zoo_contracts::ValidationErrors;
use zoo_engine::checksum::{verify_weights_file, WeightsCheck};
use zoo_engine::{CatalogLoader, LoadedCatalog, LoaderConfig};

const EXIT_INVALID: i32 = 2;

#[derive(Debug, Parser)]
#[command(name = "zoo-rs", version, about = "Validate and query model zoo catalogs")]
struct Cli {
    /// Emit diagnostic logs as JSON lines.
    #[arg(long, global = true)]
    log_json: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Validate every record and report all violations.
    Validate(ValidateArgs),
    /// List collections and their models.
    List(ListArgs),
    /// Show one model by name or alias.
    Show(ShowArgs),
    /// Re-serialize the merged catalog.
    Export(ExportArgs),
    /// Check a downloaded weights file against the hash in its filename.
    VerifyWeights(VerifyWeightsArgs),
}

#[derive(Debug, Args)]
struct CatalogArgs {
    /// Directory tree (or single record file) to load.
    #[arg(long, default_value = ".")]
    root: PathBuf,
    /// Load the files listed under `Import` in this model index instead of walking `--root`.
    #[arg(long)]
    index: Option<PathBuf>,
    /// File names treated as catalog records; repeatable.
    #[arg(long = "metafile-name")]
    metafile_names: Vec<String>,
    /// Validate files one at a time.
    #[arg(long)]
    no_parallel: bool,
    /// Append load events to this JSONL file.
    #[arg(long)]
    events: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct ValidateArgs {
    #[command(flatten)]
    catalog: CatalogArgs,
    /// Write a JSON summary of the loaded catalog.
    #[arg(long)]
    summary: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct ListArgs {
    #[command(flatten)]
    catalog: CatalogArgs,
    /// Only list this collection.
    #[arg(long)]
    collection: Option<String>,
}

#[derive(Debug, Args)]
struct ShowArgs {
    query: String,
    #[command(flatten)]
    catalog: CatalogArgs,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ExportFormat {
    Yaml,
    Json,
}

#[derive(Debug, Args)]
struct ExportArgs {
    #[command(flatten)]
    catalog: CatalogArgs,
    #[arg(long, value_enum, default_value = "yaml")]
    format: ExportFormat,
    /// Output file; stdout when omitted.
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct VerifyWeightsArgs {
    query: String,
    #[arg(long)]
    file: PathBuf,
    #[command(flatten)]
    catalog: CatalogArgs,
}

fn main() {
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("zoo-rs error: {err:#}");
            std::process::exit(1);
        }
    }
}

fn run() -> anyhow::Result<i32> {
    let cli = Cli::parse();
    init_logging(cli.log_json);
    match cli.command {
        Command::Validate(args) => run_validate(args),
        Command::List(args) => run_list(args),
        Command::Show(args) => run_show(args),
        Command::Export(args) => run_export(args),
        Command::VerifyWeights(args) => run_verify_weights(args),
    }
}

fn init_logging(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn loader(args: &CatalogArgs) -> (CatalogLoader, Option<EventWriter>) {
    let mut config = LoaderConfig::from_env(&args.root)
        .with_metafile_names(args.metafile_names.clone());
    if args.no_parallel {
        config = config.with_parallel(false);
    }
    let events = args.events.as_ref().map(EventWriter::with_random_id);
    let mut loader = CatalogLoader::new(config);
    if let Some(events) = &events {
        loader = loader.with_events(events.clone());
    }
    (loader, events)
}

fn load(args: &CatalogArgs) -> (Result<LoadedCatalog, ValidationErrors>, Option<EventWriter>) {
    let (loader, events) = loader(args);
    debug!(root = %args.root.display(), index = ?args.index, "loading catalog");
    let outcome = match &args.index {
        Some(index) => loader.load_model_index(index),
        None => loader.load(),
    };
    (outcome, events)
}

/// Loads a catalog for read-only commands; an invalid catalog is a hard error.
fn load_valid(args: &CatalogArgs) -> anyhow::Result<LoadedCatalog> {
    match load(args).0 {
        Ok(catalog) => Ok(catalog),
        Err(errors) => {
            print_errors(&errors);
            bail!("catalog is invalid ({} error(s))", errors.len())
        }
    }
}

fn print_errors(errors: &ValidationErrors) {
    for err in errors.iter() {
        eprintln!("{err}");
    }
}

fn run_validate(args: ValidateArgs) -> anyhow::Result<i32> {
    let (outcome, events) = load(&args.catalog);
    let catalog = match outcome {
        Ok(catalog) => catalog,
        Err(errors) => {
            print_errors(&errors);
            eprintln!("{} error(s) found", errors.len());
            return Ok(EXIT_INVALID);
        }
    };

    println!(
        "OK: {} file(s), {} collection(s), {} model(s)",
        catalog.files.len(),
        catalog.index.collection_count(),
        catalog.index.model_count()
    );

    if let Some(path) = &args.summary {
        let catalog_id = events
            .as_ref()
            .map(|events| events.catalog_id().to_string())
            .unwrap_or_else(|| "local".to_string());
        let summary = CatalogSummary::from_index(
            &catalog.index,
            catalog_id,
            &args.catalog.root,
            catalog.files.len(),
        );
        let mut extra = Map::new();
        extra.insert(
            "files".to_string(),
            Value::Array(
                catalog
                    .files
                    .iter()
                    .map(|file| Value::String(file.display().to_string()))
                    .collect(),
            ),
        );
        write_summary(path, &summary, Some(&extra))
            .with_context(|| format!("failed to write summary to {}", path.display()))?;
    }
    Ok(0)
}

fn run_list(args: ListArgs) -> anyhow::Result<i32> {
    let catalog = load_valid(&args.catalog)?;
    let index = &catalog.index;

    let names: Vec<String> = match &args.collection {
        Some(name) => {
            if index.collection(name).is_none() {
                bail!("unknown collection '{name}'");
            }
            vec![name.clone()]
        }
        None => index.collections().map(|c| c.name.clone()).collect(),
    };

    for name in names {
        println!("{name}");
        for model in index.models_in(&name) {
            match &model.alias {
                Some(alias) => println!("  {} ({alias})", model.name),
                None => println!("  {}", model.name),
            }
        }
    }
    Ok(0)
}

fn run_show(args: ShowArgs) -> anyhow::Result<i32> {
    let catalog = load_valid(&args.catalog)?;
    let selection = ModelSelector::new(&catalog.index)
        .select(&args.query)
        .map_err(anyhow::Error::msg)?;
    if selection.matched_by == MatchKind::Alias {
        println!("(matched alias '{}')", selection.query);
    }
    print_model(&catalog.index, selection.model);
    Ok(0)
}

fn print_model(index: &CatalogIndex, model: &Model) {
    println!("Name:          {}", model.name);
    if let Some(alias) = &model.alias {
        println!("Alias:         {alias}");
    }
    println!("In Collection: {}", model.in_collection);
    if let Some(collection) = index.collection(&model.in_collection) {
        println!("Paper:         {} <{}>", collection.paper.title, collection.paper.url);
        println!("Code:          {} @ {}", collection.code.url, collection.code.version);
    }
    println!("Config:        {}", model.config);
    if let Some(gb) = model.metadata.training_memory_gb {
        println!("Memory (GB):   {gb}");
    }
    for result in &model.results {
        let metrics: Vec<String> = result
            .metrics
            .iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect();
        println!(
            "Result:        {} / {}: {}",
            result.task,
            result.dataset,
            metrics.join(", ")
        );
    }
    println!("Weights:       {}", model.weights);
    if let Some(hash) = model.weights_hash() {
        println!("Weights hash:  {hash}");
    }
}

fn run_export(args: ExportArgs) -> anyhow::Result<i32> {
    let catalog = load_valid(&args.catalog)?;
    let record = catalog.index.to_record();
    let rendered = match args.format {
        ExportFormat::Yaml => serde_yaml::to_string(&record)?,
        ExportFormat::Json => {
            let mut text = serde_json::to_string_pretty(&record)?;
            text.push('\n');
            text
        }
    };
    match &args.out {
        Some(path) => write_output(path, &rendered)?,
        None => print!("{rendered}"),
    }
    Ok(0)
}

fn write_output(path: &Path, content: &str) -> anyhow::Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, content).with_context(|| format!("failed to write {}", path.display()))
}

fn run_verify_weights(args: VerifyWeightsArgs) -> anyhow::Result<i32> {
    let catalog = load_valid(&args.catalog)?;
    let selection = ModelSelector::new(&catalog.index)
        .select(&args.query)
        .map_err(anyhow::Error::msg)?;

    match verify_weights_file(selection.model, &args.file)? {
        WeightsCheck::Match { expected, actual } => {
            println!("OK: {} matches {expected} (sha256 {actual})", args.file.display());
            Ok(0)
        }
        WeightsCheck::Mismatch { expected, actual } => {
            eprintln!(
                "MISMATCH: {} has sha256 {actual}, expected prefix {expected}",
                args.file.display()
            );
            Ok(EXIT_INVALID)
        }
        WeightsCheck::NoExpectedHash { actual } => {
            println!(
                "{} carries no hash in its weights URL; sha256 {actual}",
                selection.model.name
            );
            Ok(0)
        }
    }
}
