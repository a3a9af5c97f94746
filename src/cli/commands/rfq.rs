//! `mpsync rfq` commands - RFQ item browsing and classification
//!
//! Items come from the analytics store, the classification vocabulary
//! from the record store, and classified entries land in the shared
//! pricing sheet.

use std::path::PathBuf;

use clap::Subcommand;
use console::style;
use miette::{miette, IntoDiagnostic, Result};

use crate::cli::helpers::Context;
use crate::cli::table::{print_table, CellValue};
use crate::cli::GlobalOpts;
use crate::core::sink::CsvSheetSink;
use crate::items::manager::{ItemClassification, ItemManager};

#[derive(clap::Args, Clone, Debug)]
pub struct ItemOpts {
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
pub struct RfqIdArgs {
    /// RFQ number
    pub rfq_id: i64,

    #[command(flatten)]
    pub items: ItemOpts,
}

#[derive(clap::Args, Debug)]
pub struct CategoriesArgs {
    /// List the subcategories of this category instead
    #[arg(long)]
    pub category: Option<String>,

    #[command(flatten)]
    pub items: ItemOpts,
}

#[derive(clap::Args, Debug)]
pub struct ClassifyArgs {
    /// RFQ number
    pub rfq_id: i64,

    /// Classifications as item_id=category/subcategory
    #[arg(required = true)]
    pub entries: Vec<String>,

    /// Pricing sheet to append to (overrides config)
    #[arg(long)]
    pub sink: Option<PathBuf>,

    #[command(flatten)]
    pub items: ItemOpts,
}

#[derive(Subcommand)]
pub enum RfqCommands {
    /// Show an RFQ's header info
    Info(RfqIdArgs),

    /// Show the item-by-partner price matrix
    Items(RfqIdArgs),

    /// List the classification categories and subcategories
    Categories(CategoriesArgs),

    /// Classify items and append them to the pricing sheet
    Classify(ClassifyArgs),
}

pub fn run(cmd: RfqCommands, global: &GlobalOpts) -> Result<()> {
    let ctx = Context::load(global);
    match cmd {
        RfqCommands::Info(args) => {
            let manager = load_manager(&ctx, &args.items)?;
            let info = manager
                .rfq_info(args.rfq_id)
                .ok_or_else(|| miette!("no quotes found for RFQ {}", args.rfq_id))?;
            let dash = |v: Option<String>| v.unwrap_or_else(|| "-".to_string());
            println!("{} {}", style("RFQ:").bold(), dash(info.rfq_name));
            println!("{} {}", style("Customer:").bold(), dash(info.customer_name));
            println!("{} {}", style("Main process:").bold(), dash(info.main_process));
            println!("{} {}", style("POD:").bold(), dash(info.pod));
        }
        RfqCommands::Items(args) => {
            let manager = load_manager(&ctx, &args.items)?;
            let matrix = manager
                .price_matrix(args.rfq_id)
                .ok_or_else(|| miette!("no quotes found for RFQ {}", args.rfq_id))?;

            let mut headers: Vec<&str> = vec!["ITEM"];
            headers.extend(matrix.mp_names.iter().map(String::as_str));
            let rows: Vec<Vec<CellValue>> = matrix
                .rows
                .iter()
                .map(|r| {
                    let mut row = vec![CellValue::Number(r.item_id)];
                    row.extend(r.prices.iter().map(|p| match p {
                        Some(price) => CellValue::Float(*price, 2),
                        None => CellValue::Empty,
                    }));
                    row
                })
                .collect();
            print_table(&headers, &rows, global.format, global.quiet);
        }
        RfqCommands::Categories(args) => {
            let manager = load_manager(&ctx, &args.items)?;
            let names = match &args.category {
                Some(category) => manager.subcategories_of(category),
                None => manager.categories(),
            };
            for name in names {
                println!("{name}");
            }
        }
        RfqCommands::Classify(args) => {
            let manager = load_manager(&ctx, &args.items)?;
            let classifications: Vec<ItemClassification> = args
                .entries
                .iter()
                .map(|e| parse_entry(e))
                .collect::<Result<_>>()?;

            let sink_path = args
                .sink
                .as_deref()
                .or(ctx.config.classification_sink.as_deref())
                .ok_or_else(|| {
                    miette!("no pricing sheet configured; set classification_sink in the config or pass --sink")
                })?;
            let mut sink = CsvSheetSink::new(sink_path);
            let written = manager
                .add_entries(&mut sink, args.rfq_id, &classifications)
                .into_diagnostic()?;
            if !global.quiet {
                println!("{} entrie(s) added", style(written).green());
            }
        }
    }
    Ok(())
}

fn load_manager(ctx: &Context, opts: &ItemOpts) -> Result<ItemManager> {
    let analytics = ctx.analytics(opts.analytics_db.as_deref())?;
    let records = ctx.records(opts.records_db.as_deref())?;
    let queries_dir = ctx.queries_dir(opts.queries_dir.as_deref());
    ItemManager::load(&analytics, &records, &queries_dir).into_diagnostic()
}

/// Parse `item_id=category/subcategory`.
fn parse_entry(entry: &str) -> Result<ItemClassification> {
    let (item, rest) = entry
        .split_once('=')
        .ok_or_else(|| miette!("expected item_id=category/subcategory, got '{entry}'"))?;
    let item_id: i64 = item
        .trim()
        .parse()
        .map_err(|_| miette!("'{item}' is not an item id"))?;
    let (category, subcategory) = rest
        .split_once('/')
        .ok_or_else(|| miette!("expected category/subcategory after '=' in '{entry}'"))?;
    Ok(ItemClassification {
        item_id,
        category: Some(category.trim().to_string()),
        subcategory: Some(subcategory.trim().to_string()),
    })
}
