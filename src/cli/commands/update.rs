//! `mpsync update` commands - reconciliation runs
//!
//! Each subcommand pairs an analytics query with a record-store query,
//! diffs the two, and writes the corrections. Queries default to the
//! versioned .sql files in the queries directory; `--inline` switches
//! the arguments to literal SQL for one-off runs.

use std::path::PathBuf;
use std::time::Duration;

use clap::Subcommand;
use console::style;
use miette::{IntoDiagnostic, Result};

use crate::cli::helpers::{resolve_query, Context};
use crate::cli::table::{print_table, CellValue};
use crate::cli::GlobalOpts;
use crate::recon::engine::{ReconEngine, WriteReport};
use crate::recon::scorecard::ScorecardError;
use crate::recon::ReconError;

#[derive(clap::Args, Clone, Debug)]
pub struct StoreOpts {
    /// Analytics database (overrides config)
    #[arg(long)]
    pub analytics_db: Option<PathBuf>,

    /// Record database (overrides config)
    #[arg(long)]
    pub records_db: Option<PathBuf>,

    /// Queries directory (overrides config)
    #[arg(long)]
    pub queries_dir: Option<PathBuf>,

    /// Milliseconds to sleep between writes (overrides config)
    #[arg(long)]
    pub throttle_ms: Option<u64>,
}

#[derive(clap::Args, Debug)]
pub struct QueryPairArgs {
    /// Analytics query file, relative to the queries directory
    #[arg(long)]
    pub analytics_query: Option<String>,

    /// Record-store query file, relative to the queries directory
    #[arg(long)]
    pub records_query: Option<String>,

    /// Treat the query arguments as inline SQL instead of file names
    #[arg(long, requires = "analytics_query", requires = "records_query")]
    pub inline: bool,

    #[command(flatten)]
    pub store: StoreOpts,
}

#[derive(clap::Args, Debug)]
pub struct StatusArgs {
    /// Analytics query returning the partners with a wrong status
    #[arg(long)]
    pub query: Option<String>,

    /// Treat the query argument as inline SQL instead of a file name
    #[arg(long, requires = "query")]
    pub inline: bool,

    #[command(flatten)]
    pub store: StoreOpts,
}

#[derive(clap::Args, Debug)]
pub struct ScorecardArgs {
    /// Scorecard sheets (CSV exports of the visit template)
    #[arg(required = true)]
    pub sheets: Vec<PathBuf>,

    #[command(flatten)]
    pub store: StoreOpts,
}

#[derive(Subcommand)]
pub enum UpdateCommands {
    /// Correct partner account statuses
    Status(StatusArgs),

    /// Reconcile completed work-order and quote counts
    WosQuotes(QueryPairArgs),

    /// Reconcile the on-time-in-full metric
    Otif(QueryPairArgs),

    /// Reconcile each partner's most recent work-order date
    LastWoDate(QueryPairArgs),

    /// Classify main processes from activity and backfill capabilities
    MainProcess(QueryPairArgs),

    /// Push scorecard sheet KPIs onto partner records
    Scorecard(ScorecardArgs),
}

pub fn run(cmd: UpdateCommands, global: &GlobalOpts) -> Result<()> {
    let ctx = Context::load(global);
    match cmd {
        UpdateCommands::Status(args) => {
            let engine = Engine::open(&ctx, &args.store)?;
            let queries_dir = ctx.queries_dir(args.store.queries_dir.as_deref());
            let query = resolve_query(
                args.query.as_deref().unwrap_or("status.sql"),
                !args.inline,
                &queries_dir,
            );
            let report = engine.get().update_status(&query).into_diagnostic()?;
            print_report("status", &report, global);
        }
        UpdateCommands::WosQuotes(args) => {
            let engine = Engine::open(&ctx, &args.store)?;
            let (analytics_query, records_query) =
                pair(&ctx, &args, "wos_quotes_mb.sql", "wos_quotes_sf.sql");
            let report = engine
                .get()
                .update_wos_quotes(&analytics_query, &records_query)
                .into_diagnostic()?;
            print_report("wos-quotes", &report, global);
        }
        UpdateCommands::Otif(args) => {
            let engine = Engine::open(&ctx, &args.store)?;
            let (analytics_query, records_query) = pair(&ctx, &args, "otif_mb.sql", "otif_sf.sql");
            let report = engine
                .get()
                .update_otif(&analytics_query, &records_query)
                .into_diagnostic()?;
            print_report("otif", &report, global);
        }
        UpdateCommands::LastWoDate(args) => {
            let engine = Engine::open(&ctx, &args.store)?;
            let (analytics_query, records_query) =
                pair(&ctx, &args, "last_wo_date_mb.sql", "last_wo_date_sf.sql");
            let report = engine
                .get()
                .update_last_wo_date(&analytics_query, &records_query)
                .into_diagnostic()?;
            print_report("last-wo-date", &report, global);
        }
        UpdateCommands::MainProcess(args) => {
            let engine = Engine::open(&ctx, &args.store)?;
            let (analytics_query, records_query) =
                pair(&ctx, &args, "main_process_mb.sql", "main_process_sf.sql");
            let outcome = engine
                .get()
                .update_main_process(&analytics_query, &records_query)
                .into_diagnostic()?;
            print_report("main-process", &outcome.report, global);

            if !outcome.divergent.is_empty() {
                println!();
                println!(
                    "{} partner(s) classify differently by quotes and by work orders; review by hand:",
                    style(outcome.divergent.len()).yellow()
                );
                let rows: Vec<Vec<CellValue>> = outcome
                    .divergent
                    .iter()
                    .map(|d| {
                        vec![
                            CellValue::Id(d.salesforce_id.clone()),
                            CellValue::Text(d.mp_name.clone()),
                            CellValue::Text(d.by_quotes.label().to_string()),
                            CellValue::Text(d.by_wos.label().to_string()),
                        ]
                    })
                    .collect();
                print_table(
                    &["ID", "NAME", "BY QUOTES", "BY WOS"],
                    &rows,
                    global.format,
                    global.quiet,
                );
            }
        }
        UpdateCommands::Scorecard(args) => {
            let engine = Engine::open(&ctx, &args.store)?;
            let mut total = WriteReport::default();
            for sheet in &args.sheets {
                match engine.get().update_scorecards(sheet) {
                    Ok(report) => total.merge(report),
                    // A sheet with no partner id is skipped, not fatal.
                    Err(ReconError::Scorecard(ScorecardError::MissingIdentifier)) => {
                        eprintln!(
                            "{} {}: no partner id, skipped",
                            style("warning:").yellow().bold(),
                            sheet.display()
                        );
                    }
                    Err(err) => return Err(err).into_diagnostic(),
                }
            }
            print_report("scorecard", &total, global);
        }
    }
    Ok(())
}

/// Owns the opened adapters so the engine can borrow them.
struct Engine {
    analytics: crate::core::sqlite::SqliteAnalyticsSource,
    records: crate::core::sqlite::SqliteRecordStore,
    mutator: crate::core::sqlite::SqliteRecordMutator,
    throttle: Duration,
}

impl Engine {
    fn open(ctx: &Context, store: &StoreOpts) -> Result<Self> {
        let throttle_ms = store.throttle_ms.unwrap_or(ctx.config.throttle_ms());
        Ok(Self {
            analytics: ctx.analytics(store.analytics_db.as_deref())?,
            records: ctx.records(store.records_db.as_deref())?,
            mutator: ctx.mutator(store.records_db.as_deref())?,
            throttle: Duration::from_millis(throttle_ms),
        })
    }

    fn get(&self) -> ReconEngine<'_> {
        ReconEngine::new(&self.analytics, &self.records, &self.mutator)
            .with_throttle(self.throttle)
    }
}

fn pair(
    ctx: &Context,
    args: &QueryPairArgs,
    analytics_default: &str,
    records_default: &str,
) -> (crate::core::query::QueryText, crate::core::query::QueryText) {
    let queries_dir = ctx.queries_dir(args.store.queries_dir.as_deref());
    (
        resolve_query(
            args.analytics_query.as_deref().unwrap_or(analytics_default),
            !args.inline,
            &queries_dir,
        ),
        resolve_query(
            args.records_query.as_deref().unwrap_or(records_default),
            !args.inline,
            &queries_dir,
        ),
    )
}

fn print_report(operation: &str, report: &WriteReport, global: &GlobalOpts) {
    if !global.quiet {
        println!(
            "{}: {} write(s), {} succeeded, {} failed",
            operation,
            report.attempted,
            style(report.succeeded()).green(),
            if report.failures.is_empty() {
                style(0).dim()
            } else {
                style(report.failures.len()).red()
            }
        );
    }
    if !report.failures.is_empty() {
        let rows: Vec<Vec<CellValue>> = report
            .failures
            .iter()
            .map(|f| {
                vec![
                    CellValue::Id(f.record_id.clone()),
                    CellValue::Text(f.field.clone()),
                    CellValue::Text(f.value.to_string()),
                    CellValue::Text(f.message.clone()),
                ]
            })
            .collect();
        print_table(
            &["ID", "FIELD", "VALUE", "ERROR"],
            &rows,
            global.format,
            global.quiet,
        );
    }
}
