//! `mpsync find` commands - partner and product search
//!
//! Loads the search views from both stores and filters them in memory.
//! Raw-materials searches are recorded in the audit log when one is
//! configured.

use std::path::PathBuf;

use chrono::Utc;
use clap::Subcommand;
use console::style;
use miette::{miette, IntoDiagnostic, Result};

use crate::cli::helpers::Context;
use crate::cli::table::{print_table, CellValue};
use crate::cli::GlobalOpts;
use crate::finder::audit::{RawMaterialsSearchEntry, SearchLog};
use crate::finder::manufacturing::{filter_manufacturing, ManufacturingFilter, SortMetric};
use crate::finder::model::ProcessFlag;
use crate::finder::raw_materials::{fetch_contacts, filter_raw_materials};
use crate::finder::views::FinderViews;

#[derive(clap::Args, Clone, Debug)]
pub struct ViewOpts {
    /// Analytics database (overrides config)
    #[arg(long)]
    pub analytics_db: Option<PathBuf>,

    /// Record database (overrides config)
    #[arg(long)]
    pub records_db: Option<PathBuf>,

    /// Queries directory (overrides config)
    #[arg(long)]
    pub queries_dir: Option<PathBuf>,
}

#[derive(clap::Args, Debug)]
pub struct MpsArgs {
    /// Capability flags to match, OR-combined (machining, logistics,
    /// formation, tooling, heavy_fab, laboratory, finishing,
    /// joining_welding, light_fab, other)
    #[arg(long = "process", short = 'p', required = true)]
    pub processes: Vec<String>,

    /// State to search in
    #[arg(long, short = 's')]
    pub state: String,

    /// Search the state's whole region instead
    #[arg(long)]
    pub region: bool,

    /// Only partners with completed work orders
    #[arg(long)]
    pub only_active: bool,

    /// Only partners still in development
    #[arg(long)]
    pub only_developing: bool,

    /// Narrow to partners whose main process matches this flag
    #[arg(long)]
    pub main_process: Option<String>,

    /// Extra sort metrics after the match count: wos, quotes, score
    #[arg(long, value_delimiter = ',')]
    pub sort: Vec<String>,

    #[command(flatten)]
    pub view: ViewOpts,
}

#[derive(clap::Args, Debug)]
pub struct RmArgs {
    /// Products to look for
    #[arg(long = "product", short = 'p', required = true)]
    pub products: Vec<String>,

    /// State to search in
    #[arg(long, short = 's')]
    pub state: String,

    /// Search the state's whole region instead
    #[arg(long)]
    pub region: bool,

    /// Skip recording this search in the audit log
    #[arg(long)]
    pub no_log: bool,

    #[command(flatten)]
    pub view: ViewOpts,
}

#[derive(clap::Args, Debug)]
pub struct ContactsArgs {
    /// Partner names to look up
    #[arg(required = true)]
    pub mps: Vec<String>,

    #[command(flatten)]
    pub view: ViewOpts,
}

#[derive(Subcommand)]
pub enum FindCommands {
    /// Search manufacturing partners by capability
    Mps(MpsArgs),

    /// Search raw-materials suppliers by product
    Rm(RmArgs),

    /// Show contact info for the named partners
    Contacts(ContactsArgs),
}

pub fn run(cmd: FindCommands, global: &GlobalOpts) -> Result<()> {
    let ctx = Context::load(global);
    match cmd {
        FindCommands::Mps(args) => run_mps(&ctx, args, global),
        FindCommands::Rm(args) => run_rm(&ctx, args, global),
        FindCommands::Contacts(args) => run_contacts(&ctx, args, global),
    }
}

fn load_views(ctx: &Context, view: &ViewOpts) -> Result<FinderViews> {
    let analytics = ctx.analytics(view.analytics_db.as_deref())?;
    let records = ctx.records(view.records_db.as_deref())?;
    let queries_dir = ctx.queries_dir(view.queries_dir.as_deref());
    FinderViews::load(&records, &analytics, &queries_dir).into_diagnostic()
}

fn run_mps(ctx: &Context, args: MpsArgs, global: &GlobalOpts) -> Result<()> {
    let flags: Vec<ProcessFlag> = args
        .processes
        .iter()
        .map(|p| p.parse().map_err(|e: String| miette!(e)))
        .collect::<Result<_>>()?;
    let main_process = args
        .main_process
        .as_deref()
        .map(|p| p.parse().map_err(|e: String| miette!(e)))
        .transpose()?;
    let sort_by: Vec<SortMetric> = args
        .sort
        .iter()
        .map(|s| match s.as_str() {
            "wos" => Ok(SortMetric::WorkOrders),
            "quotes" => Ok(SortMetric::Quotes),
            "score" => Ok(SortMetric::Score),
            other => Err(miette!("unknown sort metric '{other}' (wos, quotes, score)")),
        })
        .collect::<Result<_>>()?;

    let views = load_views(ctx, &args.view)?;
    let filter = ManufacturingFilter {
        flags: flags.clone(),
        state: args.state,
        search_region: args.region,
        only_active: args.only_active,
        only_developing: args.only_developing,
        main_process,
        sort_by,
    };
    let matches = filter_manufacturing(&views, &filter).into_diagnostic()?;

    let mut headers: Vec<&str> = vec!["NAME"];
    if args.region {
        headers.push("STATE");
    }
    headers.extend(["MAIN PROCESS", "STATUS", "WOS", "QUOTES", "SCORE"]);
    let flag_headers: Vec<String> = flags.iter().map(|f| f.as_str().to_uppercase()).collect();
    headers.extend(flag_headers.iter().map(String::as_str));

    let rows: Vec<Vec<CellValue>> = matches
        .iter()
        .map(|m| {
            let p = &m.partner;
            let mut row = vec![CellValue::Text(p.name.clone())];
            if args.region {
                row.push(CellValue::Text(p.state.clone()));
            }
            row.push(match p.main_process {
                Some(process) => CellValue::Text(process.label().to_string()),
                None => CellValue::Empty,
            });
            row.push(match &p.status {
                Some(status) => CellValue::Text(status.clone()),
                None => CellValue::Empty,
            });
            row.push(CellValue::Number(p.wos as i64));
            row.push(CellValue::Number(p.quotes as i64));
            row.push(match p.global_score {
                Some(score) => CellValue::Float(score, 1),
                None => CellValue::Empty,
            });
            for flag in &flags {
                row.push(CellValue::Flag(m.matched.contains(flag)));
            }
            row
        })
        .collect();
    print_table(&headers, &rows, global.format, global.quiet);
    Ok(())
}

fn run_rm(ctx: &Context, args: RmArgs, global: &GlobalOpts) -> Result<()> {
    let views = load_views(ctx, &args.view)?;
    let result =
        filter_raw_materials(&views, &args.products, &args.state, args.region).into_diagnostic()?;

    let mut headers: Vec<&str> = vec!["NAME"];
    if args.region {
        headers.push("STATE");
    }
    headers.extend(["STATUS", "TYPE", "SCORE", "QUOTES", "WOS"]);
    headers.extend(result.columns.iter().map(String::as_str));

    let rows: Vec<Vec<CellValue>> = result
        .rows
        .iter()
        .map(|m| {
            let p = &m.partner;
            let mut row = vec![CellValue::Text(p.mp_name.clone())];
            if args.region {
                row.push(CellValue::Text(m.state.clone()));
            }
            row.push(match &p.status {
                Some(status) => CellValue::Text(status.clone()),
                None => CellValue::Empty,
            });
            row.push(match &p.mp_type {
                Some(t) => CellValue::Text(t.clone()),
                None => CellValue::Empty,
            });
            row.push(match p.score {
                Some(score) => CellValue::Float(score, 1),
                None => CellValue::Empty,
            });
            row.push(CellValue::Number(p.quotes));
            row.push(CellValue::Number(p.wos));
            row.extend(m.offers.iter().map(|o| CellValue::Flag(*o)));
            row
        })
        .collect();
    print_table(&headers, &rows, global.format, global.quiet);

    if !result.missing_products.is_empty() {
        eprintln!(
            "{} no supplier found for: {}",
            style("warning:").yellow().bold(),
            result.missing_products.join(", ")
        );
    }

    if !args.no_log {
        record_search(ctx, &args, &result.rows.iter().map(|r| r.partner.mp_name.clone()).collect::<Vec<_>>(), global)?;
    }
    Ok(())
}

/// Append the search to the audit log. Initializes the log from the
/// configured template on first use.
fn record_search(
    ctx: &Context,
    args: &RmArgs,
    matched_mps: &[String],
    global: &GlobalOpts,
) -> Result<()> {
    let Some(log_path) = ctx.config.search_log.as_deref() else {
        if global.verbose {
            eprintln!("no search_log configured; search not recorded");
        }
        return Ok(());
    };
    let log = SearchLog::open(log_path);
    if let Some(template) = ctx.config.search_log_template.as_deref() {
        log.init_from_template(template).into_diagnostic()?;
    }

    let entry = RawMaterialsSearchEntry {
        user: ctx.config.user(),
        state: args.state.clone(),
        products: args.products.clone(),
        mps: matched_mps.to_vec(),
        region: args.region,
        quotes: true,
        wos: true,
        status: true,
        mp_type: true,
        score: true,
    };
    log.append(&entry.into_pairs(Utc::now())).into_diagnostic()?;
    if global.verbose {
        eprintln!("search recorded in {}", log_path.display());
    }
    Ok(())
}

fn run_contacts(ctx: &Context, args: ContactsArgs, global: &GlobalOpts) -> Result<()> {
    let views = load_views(ctx, &args.view)?;
    let records = ctx.records(args.view.records_db.as_deref())?;
    let contacts = fetch_contacts(&records, &views, &args.mps).into_diagnostic()?;

    if contacts.is_empty() {
        if !global.quiet {
            println!("No contacts found.");
        }
        return Ok(());
    }

    let text_or_dash = |v: &Option<String>| match v {
        Some(s) => CellValue::Text(s.clone()),
        None => CellValue::Empty,
    };
    let rows: Vec<Vec<CellValue>> = contacts
        .iter()
        .map(|c| {
            vec![
                CellValue::Text(c.mp_name.clone()),
                text_or_dash(&c.first_name),
                text_or_dash(&c.last_name),
                text_or_dash(&c.phone),
                text_or_dash(&c.mobile_phone),
                text_or_dash(&c.email),
                text_or_dash(&c.title),
            ]
        })
        .collect();
    print_table(
        &["PARTNER", "FIRST", "LAST", "PHONE", "MOBILE", "EMAIL", "TITLE"],
        &rows,
        global.format,
        global.quiet,
    );
    Ok(())
}
