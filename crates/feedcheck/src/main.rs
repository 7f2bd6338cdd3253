use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use feedcheck_core::config::Settings;
use feedcheck_gtfsplus::{validate_feed, FeedSources, GtfsReference, SpecCatalog};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "GTFS+ feed validation", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Validate the GTFS+ tables of one feed version and print the report as JSON
    Validate(ValidateArgs),
}

#[derive(Args, Debug)]
struct ValidateArgs {
    /// Identifier of the feed version the report is produced for
    #[arg(long)]
    subject: String,
    /// GTFS+ table specification (JSON); falls back to `gtfsplus.spec_path`
    #[arg(long)]
    spec: Option<PathBuf>,
    /// Published GTFS archive of the version
    #[arg(long)]
    gtfs: PathBuf,
    /// GTFS+ archive saved after publication, validated instead when present
    #[arg(long)]
    edited: Option<PathBuf>,
    /// Settings file (defaults to ./feedcheck.toml when it exists)
    #[arg(long)]
    config: Option<PathBuf>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Validate(args) => handle_validate(args),
    }
}

fn handle_validate(args: ValidateArgs) -> Result<()> {
    dotenvy::dotenv().ok();

    let settings = Settings::load(args.config.as_deref()).context("failed to load settings")?;

    let spec_path = args
        .spec
        .or_else(|| settings.gtfsplus.spec_path.clone())
        .context("--spec (or gtfsplus.spec_path in the settings file) must be set")?;
    let catalog = SpecCatalog::from_path(&spec_path)
        .with_context(|| format!("failed to load GTFS+ spec {}", spec_path.display()))?;
    info!(tables = catalog.len(), path = %spec_path.display(), "Loaded GTFS+ spec");

    let reference = GtfsReference::from_path(&args.gtfs)
        .with_context(|| format!("failed to load GTFS reference {}", args.gtfs.display()))?;

    let sources = FeedSources {
        published: args.gtfs,
        edited: args.edited,
    };
    let report = validate_feed(
        &args.subject,
        &sources,
        &catalog,
        &reference,
        &settings.gtfsplus.format,
        settings.modules.gtfsplus,
    )?;
    // The reference sets are only needed while validating.
    drop(reference);

    info!(issues = report.issues.len(), "GTFS+ validation finished");
    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(())
}
