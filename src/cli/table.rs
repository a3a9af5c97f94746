//! Table formatting utilities for CLI list commands
//!
//! One rendering path for every tabular output so the commands don't
//! each reinvent column alignment and escaping. TSV output is aligned
//! and colored for terminals; CSV, JSON, and Markdown stay plain for
//! piping.

use console::style;

use crate::cli::helpers::{escape_csv, truncate_str};
use crate::cli::OutputFormat;

/// A typed cell value with semantic meaning for formatting
#[derive(Debug, Clone)]
pub enum CellValue {
    /// Record-store id (cyan)
    Id(String),
    /// Plain text, truncated to the column width in TSV
    Text(String),
    /// Yes/no flag (✓ green / dim -)
    Flag(bool),
    /// Integer count
    Number(i64),
    /// Float with precision
    Float(f64, usize),
    /// Empty/placeholder
    Empty,
}

impl CellValue {
    /// Unstyled content, used for CSV/JSON/Markdown and width math.
    pub fn plain(&self) -> String {
        match self {
            CellValue::Id(id) => id.clone(),
            CellValue::Text(s) => s.clone(),
            CellValue::Flag(true) => "yes".to_string(),
            CellValue::Flag(false) => "no".to_string(),
            CellValue::Number(n) => n.to_string(),
            CellValue::Float(f, precision) => format!("{:.*}", precision, f),
            CellValue::Empty => "-".to_string(),
        }
    }

    fn format_tsv(&self, width: usize) -> String {
        match self {
            CellValue::Id(id) => {
                format!("{:<width$}", style(truncate_str(id, width)).cyan(), width = width)
            }
            CellValue::Text(s) => format!("{:<width$}", truncate_str(s, width), width = width),
            CellValue::Flag(true) => format!("{:<width$}", style("✓").green(), width = width),
            CellValue::Flag(false) => format!("{:<width$}", style("-").dim(), width = width),
            other => format!("{:<width$}", other.plain(), width = width),
        }
    }
}

/// Render a table in the requested format. `Name` output prints only
/// the first column, one value per line.
pub fn print_table(
    headers: &[&str],
    rows: &[Vec<CellValue>],
    format: OutputFormat,
    quiet: bool,
) {
    let format = match format {
        OutputFormat::Auto => OutputFormat::Tsv,
        f => f,
    };

    match format {
        OutputFormat::Tsv | OutputFormat::Auto => {
            let widths: Vec<usize> = headers
                .iter()
                .enumerate()
                .map(|(i, h)| {
                    rows.iter()
                        .map(|r| r.get(i).map(|c| c.plain().chars().count()).unwrap_or(0))
                        .chain(std::iter::once(h.chars().count()))
                        .max()
                        .unwrap_or(0)
                        .min(40)
                        + 2
                })
                .collect();

            let header_line: Vec<String> = headers
                .iter()
                .zip(&widths)
                .map(|(h, w)| format!("{:<width$}", style(*h).bold(), width = w))
                .collect();
            println!("{}", header_line.join(""));
            println!("{}", "-".repeat(widths.iter().sum::<usize>().max(1)));

            for row in rows {
                let line: Vec<String> = row
                    .iter()
                    .zip(&widths)
                    .map(|(cell, w)| cell.format_tsv(*w))
                    .collect();
                println!("{}", line.join(""));
            }
            if !quiet {
                println!();
                println!("{} row(s)", style(rows.len()).cyan());
            }
        }
        OutputFormat::Csv => {
            println!("{}", headers.join(","));
            for row in rows {
                let line: Vec<String> = row.iter().map(|c| escape_csv(&c.plain())).collect();
                println!("{}", line.join(","));
            }
        }
        OutputFormat::Json => {
            let objects: Vec<serde_json::Value> = rows
                .iter()
                .map(|row| {
                    let mut object = serde_json::Map::new();
                    for (header, cell) in headers.iter().zip(row) {
                        let value = match cell {
                            CellValue::Flag(b) => serde_json::Value::Bool(*b),
                            CellValue::Number(n) => serde_json::Value::from(*n),
                            CellValue::Float(f, _) => serde_json::Value::from(*f),
                            CellValue::Empty => serde_json::Value::Null,
                            other => serde_json::Value::String(other.plain()),
                        };
                        object.insert(header.to_string(), value);
                    }
                    serde_json::Value::Object(object)
                })
                .collect();
            println!(
                "{}",
                serde_json::to_string_pretty(&objects).unwrap_or_else(|_| "[]".to_string())
            );
        }
        OutputFormat::Md => {
            println!("| {} |", headers.join(" | "));
            println!("|{}|", headers.iter().map(|_| "---").collect::<Vec<_>>().join("|"));
            for row in rows {
                let line: Vec<String> = row
                    .iter()
                    .map(|c| c.plain().replace('|', "\\|"))
                    .collect();
                println!("| {} |", line.join(" | "));
            }
        }
        OutputFormat::Name => {
            for row in rows {
                if let Some(first) = row.first() {
                    println!("{}", first.plain());
                }
            }
        }
    }
}
