use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use comfy_table::{presets::UTF8_FULL, Table};
use feedcheck_core::config::Settings;
use feedcheck_core::db;
use feedcheck_core::feed_catalog::NamespaceKind;
use feedcheck_core::introspect::PgSchemaStore;
use feedcheck_core::orchestrator::{
    check_referenced_namespaces, upgrade_all, PendingSummary, ReconciliationReport,
};
use feedcheck_core::reconcile::{NamespaceCache, SchemaReconciler};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Feed namespace schema tooling", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Report the DDL needed to bring referenced namespaces up to date
    SchemaCheck(SchemaCheckArgs),
    /// Check referenced namespaces and apply the missing tables and columns
    SchemaUpgrade(SchemaUpgradeArgs),
}

#[derive(Args, Debug, Default)]
struct SchemaCheckArgs {
    /// Namespace kinds to check (editor, versions, snapshots); all by default
    #[arg(long, value_delimiter = ',', value_parser = parse_kind)]
    kinds: Vec<NamespaceKind>,
    /// Settings file (defaults to ./feedcheck.toml when it exists)
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Args, Debug, Default)]
struct SchemaUpgradeArgs {
    #[command(flatten)]
    check: SchemaCheckArgs,
    /// Print the pending statements without executing them
    #[arg(long)]
    dry_run: bool,
}

fn parse_kind(value: &str) -> std::result::Result<NamespaceKind, String> {
    NamespaceKind::try_from(value)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::SchemaCheck(args) => handle_schema_check(args).await,
        Command::SchemaUpgrade(args) => handle_schema_upgrade(args).await,
    }
}

struct Session {
    reconciler: SchemaReconciler<PgSchemaStore>,
    report: ReconciliationReport,
}

async fn run_check(args: &SchemaCheckArgs) -> Result<Session> {
    dotenvy::dotenv().ok();

    let settings = Settings::load(args.config.as_deref()).context("failed to load settings")?;
    let database_url = settings
        .database_url()
        .context("DATABASE_URL (or FEEDCHECK_DATABASE_URL) must be set")?;
    let kinds = if args.kinds.is_empty() {
        settings.schema.namespace_kinds.clone()
    } else {
        args.kinds.clone()
    };

    let expected = settings
        .expected_catalog()
        .context("failed to load expected table catalog")?;
    let catalog = settings
        .feed_catalog()
        .context("schema.feed_catalog must point at a feed catalog export")?;

    let pool = db::connect(database_url, settings.max_connections).await?;
    let store = PgSchemaStore::acquire(&pool).await?;
    let mut reconciler = SchemaReconciler::new(store, expected, settings.schema.type_comparison);
    let mut cache = NamespaceCache::new();

    info!(kinds = ?kinds, "Checking referenced namespaces");
    let report = check_referenced_namespaces(&mut reconciler, &mut cache, &catalog, &kinds).await?;

    Ok(Session { reconciler, report })
}

fn print_report(report: &ReconciliationReport) {
    print!("{}", report.change_log());
    println!("{}", summary_table(&report.summary()));

    for failure in &report.failures {
        println!(
            "Namespace {} ({}) could not be checked: {}",
            failure.namespace, failure.label, failure.message
        );
    }
}

fn summary_table(summary: &PendingSummary) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL).set_header(vec!["", "Count"]);
    for (label, count) in [
        ("Namespaces checked", summary.namespaces_checked),
        ("Orphan namespaces", summary.orphan_namespaces),
        ("Failed namespaces", summary.failed_namespaces),
        ("Tables to create", summary.tables_to_create),
        ("Tables to alter", summary.tables_to_alter),
        ("Columns to add", summary.columns_to_add),
        ("Columns to retype", summary.columns_to_retype),
    ] {
        table.add_row(vec![label.to_string(), count.to_string()]);
    }
    table
}

async fn handle_schema_check(args: SchemaCheckArgs) -> Result<()> {
    let session = run_check(&args).await?;
    print_report(&session.report);

    let summary = session.report.summary();
    if summary.tables_to_create + summary.tables_to_alter > 0 {
        println!("Run schema-upgrade to apply the statements above.");
    } else {
        println!("All referenced namespaces match the expected tables.");
    }
    Ok(())
}

async fn handle_schema_upgrade(args: SchemaUpgradeArgs) -> Result<()> {
    let Session {
        mut reconciler,
        report,
    } = run_check(&args.check).await?;
    print_report(&report);

    if args.dry_run {
        println!("Dry run: no statements were executed.");
        return Ok(());
    }

    let outcomes = upgrade_all(&mut reconciler, &report).await;
    if outcomes.is_empty() {
        println!("Nothing to upgrade.");
        return Ok(());
    }

    let mut failed = 0;
    for outcome in &outcomes {
        println!(
            "Namespace {}: {} statements applied",
            outcome.namespace,
            outcome.applied.len()
        );
        for failure in &outcome.failures {
            failed += 1;
            warn!(
                namespace = %failure.namespace,
                table = %failure.table,
                error = %failure.message,
                "Statement failed"
            );
            println!("  FAILED on {}: {}", failure.table, failure.message);
            println!("    {}", failure.statement);
        }
    }

    if failed > 0 {
        anyhow::bail!("{failed} statements failed; see output above");
    }
    println!("Applied schema upgrade successfully.");
    Ok(())
}
