use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{ArgAction, Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use dataspace_fetch::config::Config;
use dataspace_fetch::dataspace::{CatalogQuery, MatchPolicy, Provider};
use dataspace_fetch::download::DownloadOptions;
use dataspace_fetch::error::ConfigError;
use dataspace_fetch::orchestrator::{search_and_download, SearchOptions};
use dataspace_fetch::product::{DateRange, ProductType, Satellite, TileCode};
use dataspace_fetch::source::ProductSource;

/// Search the Copernicus Data Space catalog for Sentinel-2 products and download them.
#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Configuration file with credentials and tile sets
    #[arg(short, long, default_value = "dataspace.toml", global = true)]
    config: PathBuf,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[arg(long, env = "DATASPACE_USERNAME", global = true)]
    username: Option<String>,

    #[arg(long, env = "DATASPACE_PASSWORD", hide_env_values = true, global = true)]
    password: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Search and download one product per tile
    Download(DownloadArgs),
    /// Print the product a search would select, without downloading it
    Search(SearchArgs),
    /// Write a configuration template
    InitConfig { path: PathBuf },
}

#[derive(Args)]
struct QueryArgs {
    /// Acquisition date (YYYY-MM-DD)
    #[arg(long)]
    date: NaiveDate,

    #[arg(long, value_enum, default_value = "l1c")]
    product_type: ProductType,

    #[arg(long, value_enum)]
    satellite: Option<Satellite>,

    /// Overrides `match_policy` from the configuration
    #[arg(long, value_enum)]
    policy: Option<MatchPolicy>,
}

#[derive(Args)]
struct DownloadArgs {
    /// Named tile set from the configuration
    #[arg(long, conflicts_with = "tile", required_unless_present = "tile")]
    tile_set: Option<String>,

    #[arg(long, num_args = 1..)]
    tile: Vec<TileCode>,

    #[command(flatten)]
    query: QueryArgs,

    /// Last acquisition date; only single-day ranges are supported
    #[arg(long)]
    end: Option<NaiveDate>,

    #[arg(long)]
    datadir: Option<PathBuf>,

    #[arg(long)]
    max_retries: Option<u32>,

    #[arg(long)]
    unzip: bool,
}

#[derive(Args)]
struct SearchArgs {
    #[arg(long)]
    tile: TileCode,

    #[command(flatten)]
    query: QueryArgs,

    /// Raw OData filter sent instead of the one built from tile and date
    #[arg(long)]
    filter: Option<String>,
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("dataspace_fetch={level}")));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = Config::read(&cli.config)
        .with_context(|| format!("Unable to read config {}", cli.config.display()))?;
    config
        .credentials
        .override_with(cli.username.clone(), cli.password.clone());
    Ok(config)
}

fn search_options(config: &Config, query: &QueryArgs) -> SearchOptions {
    SearchOptions {
        product_type: query.product_type,
        satellite: query.satellite,
        policy: query.policy.unwrap_or(config.download.match_policy),
    }
}

async fn download(config: &Config, args: &DownloadArgs) -> Result<()> {
    let tiles = match &args.tile_set {
        Some(name) => match config.tile_set(name) {
            Ok(tiles) => tiles.to_vec(),
            Err(err @ ConfigError::UnknownTileSet(_)) => {
                let known = config.tile_set_names().collect::<Vec<_>>().join(", ");
                error!(known = %known, "Unknown tile set");
                return Err(err.into());
            }
            Err(err) => return Err(err.into()),
        },
        None => args.tile.clone(),
    };

    let range = DateRange::new(args.query.date, args.end.unwrap_or(args.query.date))?;

    let mut options = DownloadOptions::from_settings(&config.download);
    options.unzip = args.unzip;
    if let Some(datadir) = &args.datadir {
        options.datadir = datadir.clone();
    }
    if let Some(max_retries) = args.max_retries {
        options.max_retries = max_retries;
    }

    let provider = Provider::from_config(config)?;
    let outcomes = search_and_download(
        &provider,
        &tiles,
        range,
        &search_options(config, &args.query),
        &options,
    )
    .await?;

    let bytes: u64 = outcomes.iter().filter(|o| !o.skipped).map(|o| o.bytes).sum();
    info!(products = outcomes.len(), bytes, "All tiles downloaded");
    Ok(())
}

async fn search(config: &Config, args: &SearchArgs) -> Result<()> {
    let options = search_options(config, &args.query);
    let mut query = CatalogQuery::new(args.tile.clone(), args.query.date)
        .product_type(options.product_type)
        .satellite(options.satellite);
    if let Some(filter) = &args.filter {
        query = query.raw_filter(filter);
    }

    let provider = Provider::from_config(config)?;
    let product = provider.search(&query, options.policy).await?;
    println!("{}", serde_json::to_string_pretty(&product)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match &cli.command {
        Command::InitConfig { path } => {
            let config = Config::from_template(&Config::template())?;
            config.write(path)?;
            info!(path = %path.display(), "Configuration template written");
        }
        Command::Download(args) => download(&load_config(&cli)?, args).await?,
        Command::Search(args) => search(&load_config(&cli)?, args).await?,
    }

    Ok(())
}
