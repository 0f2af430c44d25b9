use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use airfleet::FleetConfig;
use airfleet::commands::{
    AnalyzeOutputs, EstimateSources, handle_analyze, handle_compare, handle_merge,
    handle_reconcile, handle_select, handle_summary,
};
use airfleet::companies::FleetSizeBand;

#[derive(Parser)]
#[command(name = "airfleet")]
#[command(about = "Airline fleet inventories from aircraft sightings")]
#[command(version)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(long, global = true, env = "AIRFLEET_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay saved sightings (CSV or feed JSON) into fleet inventories
    Analyze {
        /// Sighting files, ingested in order
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Zone label for the printed summary
        #[arg(long)]
        zone: Option<String>,

        #[command(flatten)]
        outputs: AnalyzeOutputs,
    },
    /// Reconcile fleet-size estimates into one size per airline
    Reconcile {
        #[command(flatten)]
        sources: EstimateSources,

        /// CSV listing the airlines to report on, in order
        #[arg(long)]
        targets: Option<PathBuf>,

        /// Name column of the `--targets` file
        #[arg(long, default_value = "airline_name")]
        targets_column: String,

        /// Output CSV (`airline,fleet_size,fleet_size_known`)
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Join reconciled fleet sizes onto a company table
    Merge {
        /// Company CSV with a `company_name` column
        companies: PathBuf,

        #[command(flatten)]
        sources: EstimateSources,

        /// Fix an existing `fleet_size` column instead of joining
        #[arg(long)]
        correct: bool,

        /// Output CSV (defaults to `<name>_with_fleet.csv`, or in place with --correct)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Select companies whose fleet size lies in the configured band
    Select {
        /// Company CSV with `company_name` and `fleet_size` columns
        companies: PathBuf,

        /// Only consider names listed in this CSV
        #[arg(long)]
        allow_list: Option<PathBuf>,

        /// Name column of the `--allow-list` file
        #[arg(long, default_value = "companies_name")]
        allow_column: String,

        /// Override the band's exclusive lower bound
        #[arg(long)]
        min_exclusive: Option<u32>,

        /// Override the band's inclusive upper bound
        #[arg(long)]
        max_inclusive: Option<u32>,

        #[arg(short, long)]
        output: PathBuf,
    },
    /// Print the fleet report for saved inventories
    Summary {
        /// Inventories JSON written by `analyze --output-json`
        inventory: PathBuf,

        #[arg(long)]
        zone: Option<String>,

        /// Write the report to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Compare two saved runs
    Compare {
        first: PathBuf,
        second: PathBuf,

        #[arg(long)]
        first_zone: Option<String>,

        #[arg(long)]
        second_zone: Option<String>,

        /// Print the comparison as JSON
        #[arg(long)]
        json: bool,
    },
}

/// Zone label for a run: explicit name, else the file stem
fn zone_name(explicit: Option<String>, path: &Path) -> String {
    explicit.unwrap_or_else(|| {
        path.file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("zone")
            .to_string()
    })
}

fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "airfleet=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = FleetConfig::load_or_default(cli.config.as_deref())?;
    debug!("Using config {:?}", config);

    match cli.command {
        Commands::Analyze {
            inputs,
            zone,
            outputs,
        } => {
            let inventories = handle_analyze(&config, &inputs, &outputs, zone.as_deref())?;
            info!("Analyzed {} airlines", inventories.len());
        }
        Commands::Reconcile {
            sources,
            targets,
            targets_column,
            output,
        } => {
            let targets = targets.as_deref().map(|path| (path, targets_column.as_str()));
            handle_reconcile(&sources, targets, &output)?;
        }
        Commands::Merge {
            companies,
            sources,
            correct,
            output,
        } => {
            handle_merge(&sources, &companies, output.as_deref(), correct)?;
        }
        Commands::Select {
            companies,
            allow_list,
            allow_column,
            min_exclusive,
            max_inclusive,
            output,
        } => {
            let band = FleetSizeBand {
                min_exclusive: min_exclusive.unwrap_or(config.fleet_band.min_exclusive),
                max_inclusive: max_inclusive.unwrap_or(config.fleet_band.max_inclusive),
            };
            let allow_list = allow_list.as_deref().map(|path| (path, allow_column.as_str()));
            handle_select(&companies, band, allow_list, &output)?;
        }
        Commands::Summary {
            inventory,
            zone,
            output,
        } => {
            handle_summary(&inventory, zone.as_deref(), output.as_deref())?;
        }
        Commands::Compare {
            first,
            second,
            first_zone,
            second_zone,
            json,
        } => {
            let first_zone = zone_name(first_zone, &first);
            let second_zone = zone_name(second_zone, &second);
            handle_compare(
                (first_zone.as_str(), first.as_path()),
                (second_zone.as_str(), second.as_path()),
                json,
            )?;
        }
    }

    Ok(())
}
