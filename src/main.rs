use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use partscan::cache;
use partscan::catalog::load_catalogs;
use partscan::config::{MatcherConfig, DEFAULT_CATALOG_FILES, DEFAULT_DB_PATH};
use partscan::index::ReferenceIndex;
use partscan::matcher::Matcher;
use partscan::models::SourceRecord;
use partscan::pipeline::{run_pipeline, PipelineOptions};
use partscan::source::CsvRecords;
use partscan::store::{SourcePages, SqliteStore};
use partscan::validate::Validator;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[derive(Parser)]
#[command(name = "partscan")]
#[command(about = "Find catalog part articles and brands in product texts")]
struct Cli {
    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Match source texts and upsert results into the database
    Run(RunArgs),
    /// Build the reference index and refresh its cache
    Index(IndexArgs),
    /// Match a single text and print the result as JSON
    Match(MatchArgs),
    /// Export stored match results to CSV
    Export(ExportArgs),
}

#[derive(Args)]
struct CatalogArgs {
    /// Reference catalog CSV files (article and brand columns)
    #[arg(short, long = "catalog")]
    catalogs: Vec<PathBuf>,

    /// Directory for the index cache
    #[arg(long, default_value = ".")]
    cache_dir: PathBuf,

    /// Force rebuild of the index cache
    #[arg(long)]
    no_cache: bool,
}

impl CatalogArgs {
    fn catalog_paths(&self) -> Vec<PathBuf> {
        if self.catalogs.is_empty() {
            DEFAULT_CATALOG_FILES.iter().map(PathBuf::from).collect()
        } else {
            self.catalogs.clone()
        }
    }
}

#[derive(Args)]
struct RunArgs {
    #[command(flatten)]
    catalog: CatalogArgs,

    /// SQLite database for source texts and results
    #[arg(long, default_value = DEFAULT_DB_PATH)]
    db: PathBuf,

    /// Read records from this CSV instead of the source_texts table
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Records matched in parallel per transaction
    #[arg(long, default_value_t = partscan::config::BATCH_SIZE)]
    batch_size: usize,

    /// Match without writing results
    #[arg(long)]
    dry_run: bool,
}

#[derive(Args)]
struct IndexArgs {
    #[command(flatten)]
    catalog: CatalogArgs,
}

#[derive(Args)]
struct MatchArgs {
    #[command(flatten)]
    catalog: CatalogArgs,

    /// Text to scan
    text: String,
}

#[derive(Args)]
struct ExportArgs {
    /// SQLite database holding match results
    #[arg(long, default_value = DEFAULT_DB_PATH)]
    db: PathBuf,

    /// Output CSV path
    #[arg(short, long)]
    output: PathBuf,
}

fn load_config() -> Result<MatcherConfig> {
    MatcherConfig::from_env().context("Invalid matcher configuration")
}

/// Loads the index from cache when valid, otherwise builds it from the catalogs.
fn load_index(args: &CatalogArgs, config: &MatcherConfig) -> Result<ReferenceIndex> {
    let catalogs = args.catalog_paths();
    let cache_path = cache::cache_path(&args.cache_dir);

    if !args.no_cache {
        if let Some(index) = cache::try_load_index(&cache_path, &catalogs, config)? {
            return Ok(index);
        }
        info!("Building index (cache miss or invalid)");
    } else {
        info!("Cache disabled, building fresh index");
    }

    let entries = load_catalogs(&catalogs)?;
    let index = ReferenceIndex::build(entries, &Validator::new(config))?;

    if let Err(e) = cache::save_index(&index, &cache_path, &catalogs, config) {
        warn!(error = %e, "Failed to save index cache");
    }
    Ok(index)
}

fn run_match(args: RunArgs, config: MatcherConfig) -> Result<()> {
    let start_indexing = Instant::now();
    let index = load_index(&args.catalog, &config)?;
    let indexing_duration = start_indexing.elapsed();
    let (brands, articles, pairs) = index.stats();
    info!(
        brands,
        articles,
        pairs,
        duration_secs = indexing_duration.as_secs_f64(),
        "Index ready"
    );

    let matcher = Matcher::new(index, &config)?;
    let mut store = SqliteStore::open(&args.db)?;
    let options = PipelineOptions {
        batch_size: args.batch_size,
        limit: config.text_limit,
        dry_run: args.dry_run,
    };

    info!("Starting matching pass");
    let start_matching = Instant::now();
    let stats = match &args.input {
        Some(path) => run_pipeline(CsvRecords::open(path)?, &matcher, &mut store, &options)?,
        None => {
            let records = SourcePages::open(&args.db, options.batch_size, config.text_limit)?;
            run_pipeline(records, &matcher, &mut store, &options)?
        }
    };
    let matching_duration = start_matching.elapsed();

    println!();
    println!("=== Summary ===");
    println!("Index time:         {:.2}s", indexing_duration.as_secs_f64());
    println!("Matching time:      {:.2}s", matching_duration.as_secs_f64());
    println!();
    println!("Catalog brands:     {}", brands);
    println!("Catalog pairs:      {}", pairs);
    println!("Records processed:  {}", stats.processed());
    println!("Records matched:    {}", stats.matched());
    println!("Records unmatched:  {}", stats.unmatched());
    println!("Records skipped:    {}", stats.skipped());
    println!("Texts truncated:    {}", stats.truncated());
    println!("Pairs found:        {}", stats.pairs());
    println!("Results written:    {}", stats.written());

    Ok(())
}

fn run_index(args: IndexArgs, config: MatcherConfig) -> Result<()> {
    let catalogs = args.catalog.catalog_paths();
    let entries = load_catalogs(&catalogs)?;
    let (index, report) = ReferenceIndex::build_with_report(entries, &Validator::new(&config))?;
    cache::save_index(&index, &cache::cache_path(&args.catalog.cache_dir), &catalogs, &config)?;

    let (brands, articles, pairs) = index.stats();
    println!("Rows read:          {}", report.rows_seen);
    println!("Rows kept:          {}", report.rows_kept);
    println!("Bad article:        {}", report.invalid_article);
    println!("Bad brand:          {}", report.invalid_brand);
    println!("Duplicates:         {}", report.duplicates);
    for (source, kept) in &report.kept_by_source {
        println!("  {:<24}{}", source, kept);
    }
    println!("Brands:             {}", brands);
    println!("Articles:           {}", articles);
    println!("Pairs:              {}", pairs);
    Ok(())
}

fn run_single(args: MatchArgs, config: MatcherConfig) -> Result<()> {
    let index = load_index(&args.catalog, &config)?;
    let matcher = Matcher::new(index, &config)?;
    let record = SourceRecord {
        id: "-".to_string(),
        text: args.text,
    };
    let outcome = matcher.match_record(&record)?;
    println!("{}", serde_json::to_string_pretty(&outcome.result)?);
    Ok(())
}

fn run_export(args: ExportArgs) -> Result<()> {
    if !Path::new(&args.db).exists() {
        anyhow::bail!("Database does not exist: {:?}", args.db);
    }
    let store = SqliteStore::open(&args.db)?;
    let rows = store.export_csv(&args.output)?;
    info!(rows, path = ?args.output, "Export complete");
    println!("Exported {} results to {}", rows, args.output.display());
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");

    let result = match cli.command {
        Commands::Run(args) => load_config().and_then(|config| run_match(args, config)),
        Commands::Index(args) => load_config().and_then(|config| run_index(args, config)),
        Commands::Match(args) => load_config().and_then(|config| run_single(args, config)),
        Commands::Export(args) => run_export(args),
    };

    match result {
        Ok(()) => {
            info!("Completed successfully");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Error: {:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
