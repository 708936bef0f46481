use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{info, warn, Instrument, Span};

use fec_pipeline::config::Config;
use fec_pipeline::logging;
use fec_pipeline::metrics;
use fec_pipeline::pipeline::ingestion::grid_import::{import_grid, GridKind};
use fec_pipeline::pipeline::processing::geocode::GeoNamesTable;
use fec_pipeline::pipeline::processing::normalize::RecordNormalizer;
use fec_pipeline::pipeline::processing::recurrence::RecurrenceMode;
use fec_pipeline::pipeline::processing::schema::SchemaCatalog;
use fec_pipeline::pipeline::storage::Store;
use fec_pipeline::server;

#[derive(Parser)]
#[command(name = "fec_pipeline")]
#[command(about = "FEC bulk campaign-finance ingestion and query service")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Normalize every raw bulk file under a directory, in place
    Normalize {
        data_dir: PathBuf,
        /// Directory holding one `<table>.sql` schema per data file
        sql_dir: PathBuf,
        /// Election cycle stamped into `file_year`
        year: u16,
        /// Write fixed placeholder recurrence values instead of aggregating
        #[arg(long)]
        placeholder: bool,
    },
    /// Load normalized files into the database, one table per file stem
    Load { data_dir: PathBuf },
    /// Download and import the committee and candidate summary grids
    ImportGrids {
        year: u16,
        #[arg(long, conflicts_with = "candidate_only")]
        committee_only: bool,
        #[arg(long)]
        candidate_only: bool,
    },
    /// Recompute committee totals on candidate-committee linkages
    CommitteeTotals,
    /// Start the HTTP query service
    Serve {
        #[arg(long)]
        port: Option<u16>,
    },
}

fn run_normalize(
    config: &Config,
    data_dir: PathBuf,
    sql_dir: PathBuf,
    year: u16,
    placeholder: bool,
) -> anyhow::Result<()> {
    let mode = if placeholder {
        RecurrenceMode::Placeholder
    } else {
        config.ingest.recurrence_mode
    };
    let geonames = GeoNamesTable::load(&config.paths.geonames)
        .with_context(|| format!("loading geocoding table {}", config.paths.geonames.display()))?;
    info!(postal_codes = geonames.len(), "Geocoding table loaded");

    let catalog = SchemaCatalog::load(&sql_dir)
        .with_context(|| format!("reading schemas from {}", sql_dir.display()))?;
    let mut normalizer = RecordNormalizer::new(geonames, mode);
    let files = normalizer.normalize_directory(&data_dir, &catalog, &year.to_string())?;
    info!(files = files.len(), ?mode, "Normalization finished");

    println!("\n📊 Normalization summary for {}:", data_dir.display());
    println!("{}", normalizer.diagnostics());
    Ok(())
}

fn run_load(config: &Config, data_dir: PathBuf) -> anyhow::Result<()> {
    let mut store = Store::open(&config.paths.database)?;
    let rows = store.load_directory(&data_dir)?;
    println!("✅ Loaded {rows} rows into {}", config.paths.database.display());
    Ok(())
}

fn run_import_grids(config: &Config, year: u16, kinds: Vec<GridKind>) -> anyhow::Result<()> {
    let mut store = Store::open(&config.paths.database)?;
    for kind in kinds {
        let inserted = import_grid(&mut store, &config.grids, kind, year)
            .with_context(|| format!("importing {kind} grid for {year}"))?;
        println!("✅ {kind} grid: {inserted} records");
    }
    Ok(())
}

fn run_committee_totals(config: &Config) -> anyhow::Result<()> {
    let store = Store::open(&config.paths.database)?;
    let updated = store.refresh_committee_totals()?;
    println!("✅ Updated committee totals on {updated} linkages");
    Ok(())
}

async fn blocking<F>(task: F) -> anyhow::Result<()>
where
    F: FnOnce() -> anyhow::Result<()> + Send + 'static,
{
    let span = Span::current();
    tokio::task::spawn_blocking(move || span.in_scope(task)).await?
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let config = Config::load()?;
    let _guard = logging::init_logging(&config.paths.log_dir);

    let cli = Cli::parse();

    let run_id = uuid::Uuid::new_v4();
    dispatch(cli.command, config)
        .instrument(tracing::info_span!("run", run_id = %run_id))
        .await
}

async fn dispatch(command: Commands, config: Config) -> anyhow::Result<()> {
    match command {
        Commands::Normalize {
            data_dir,
            sql_dir,
            year,
            placeholder,
        } => {
            if config.metrics.enabled {
                metrics::init_metrics(&config.metrics.addr);
            }
            println!("🔄 Normalizing {}...", data_dir.display());
            blocking(move || run_normalize(&config, data_dir, sql_dir, year, placeholder)).await?;
        }
        Commands::Load { data_dir } => {
            println!("📥 Loading {}...", data_dir.display());
            blocking(move || run_load(&config, data_dir)).await?;
        }
        Commands::ImportGrids {
            year,
            committee_only,
            candidate_only,
        } => {
            let kinds = match (committee_only, candidate_only) {
                (true, _) => vec![GridKind::Committee],
                (_, true) => vec![GridKind::Candidate],
                _ => vec![GridKind::Committee, GridKind::Candidate],
            };
            println!("🌐 Importing summary grids for {year}...");
            blocking(move || run_import_grids(&config, year, kinds)).await?;
        }
        Commands::CommitteeTotals => {
            blocking(move || run_committee_totals(&config)).await?;
        }
        Commands::Serve { port } => {
            if config.metrics.enabled {
                metrics::init_metrics(&config.metrics.addr);
            }
            if !config.paths.database.exists() {
                warn!(db = %config.paths.database.display(), "Database file not found; queries will answer 503");
            }
            let port = port.unwrap_or(config.server.port);
            server::start_server(config.paths.database.clone(), port).await?;
        }
    }
    Ok(())
}
