//! `claimlens prices` — billed-amount reconciliation against the price list.

use std::path::PathBuf;

use clap::{Subcommand, ValueEnum};
use serde::Serialize;

use claimlens_engine::{
    extract_claim_lines, reconcile_lines, MultiplierKind, MultiplierTable, PriceList, PriceStatus,
    PriceSummary, PriceVerdict,
};
use claimlens_io::{export, table};

use crate::exit_codes::EXIT_FINDINGS;
use crate::CliError;

#[derive(Subcommand)]
pub enum PriceCommands {
    /// Reconcile every billed line in a claim XML export
    #[command(after_help = "\
Examples:
  claimlens prices check claims.xml --prices prices.xlsx
  claimlens prices check claims.xml --prices prices.xlsx --multipliers mult.toml
  claimlens prices check claims.xml --prices prices.xlsx --active basic
  claimlens prices check claims.xml --prices prices.xlsx --json --output report.json")]
    Check {
        /// Claim XML export file
        claims: PathBuf,

        /// Contracted price list (xlsx, xls, csv, ...)
        #[arg(long)]
        prices: PathBuf,

        /// TOML file overriding the default category multipliers
        #[arg(long)]
        multipliers: Option<PathBuf>,

        /// Pin one multiplier for every category instead of auto-detecting
        #[arg(long, value_enum)]
        active: Option<ActiveMultiplier>,

        /// Output JSON to stdout instead of human summary
        #[arg(long)]
        json: bool,

        /// Write JSON output to file
        #[arg(long)]
        output: Option<PathBuf>,

        /// Write the full verdict table as CSV
        #[arg(long)]
        export_csv: Option<PathBuf>,
    },

    /// Search the price list by code or description
    #[command(after_help = "\
Examples:
  claimlens prices find 99213 --prices prices.xlsx
  claimlens prices find 'x-ray' --prices prices.xlsx --limit 10 --json")]
    Find {
        /// Search term (case-insensitive substring)
        term: String,

        /// Contracted price list (xlsx, xls, csv, ...)
        #[arg(long)]
        prices: PathBuf,

        /// Maximum number of results
        #[arg(long, default_value_t = 50)]
        limit: usize,

        /// Output JSON to stdout instead of a table
        #[arg(long)]
        json: bool,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ActiveMultiplier {
    Thiqa,
    LowEnd,
    Basic,
}

impl From<ActiveMultiplier> for MultiplierKind {
    fn from(value: ActiveMultiplier) -> Self {
        match value {
            ActiveMultiplier::Thiqa => Self::Thiqa,
            ActiveMultiplier::LowEnd => Self::LowEnd,
            ActiveMultiplier::Basic => Self::Basic,
        }
    }
}

#[derive(Serialize)]
struct PriceReport {
    verdicts: Vec<PriceVerdict>,
    summary: PriceSummary,
}

pub fn cmd_prices(cmd: PriceCommands) -> Result<(), CliError> {
    match cmd {
        PriceCommands::Check {
            claims,
            prices,
            multipliers,
            active,
            json,
            output,
            export_csv,
        } => cmd_check(claims, prices, multipliers, active, json, output, export_csv),
        PriceCommands::Find { term, prices, limit, json } => cmd_find(term, prices, limit, json),
    }
}

fn load_price_list(path: &PathBuf) -> Result<PriceList, CliError> {
    let rows = table::read_table(path).map_err(CliError::audit)?;
    PriceList::from_rows(&rows).map_err(CliError::audit)
}

fn cmd_check(
    claims_path: PathBuf,
    prices_path: PathBuf,
    multipliers_path: Option<PathBuf>,
    active: Option<ActiveMultiplier>,
    json_output: bool,
    output_file: Option<PathBuf>,
    export_csv: Option<PathBuf>,
) -> Result<(), CliError> {
    let xml = table::read_text(&claims_path).map_err(CliError::audit)?;
    let lines = extract_claim_lines(&xml).map_err(CliError::audit)?;

    let price_list = load_price_list(&prices_path)?;

    let mut multiplier_table = match multipliers_path {
        Some(ref path) => {
            let toml_str = table::read_text(path).map_err(CliError::audit)?;
            MultiplierTable::from_toml(&toml_str).map_err(CliError::audit)?
        }
        None => MultiplierTable::default(),
    };
    if let Some(kind) = active {
        multiplier_table.set_active_all(kind.into());
    }

    let verdicts = reconcile_lines(&lines, &price_list, &multiplier_table);
    let summary = PriceSummary::from_verdicts(&verdicts);

    if let Some(ref path) = export_csv {
        export::write_price_csv(path, &verdicts).map_err(CliError::audit)?;
        eprintln!("wrote {}", path.display());
    }

    let report = PriceReport { verdicts, summary };
    if json_output || output_file.is_some() {
        let json_str = serde_json::to_string_pretty(&report)
            .map_err(|e| CliError::io(format!("JSON serialization error: {e}")))?;
        if let Some(ref path) = output_file {
            std::fs::write(path, &json_str)
                .map_err(|e| CliError::io(format!("cannot write output: {e}")))?;
            eprintln!("wrote {}", path.display());
        }
        if json_output {
            println!("{json_str}");
        }
    }

    // Human summary to stderr
    let s = &report.summary;
    eprintln!(
        "{} lines — {} matched, {} mismatches, {} not found, {} errors ({} priced codes)",
        s.total,
        s.matches,
        s.mismatches,
        s.not_found,
        s.errors,
        price_list.len(),
    );
    for verdict in &report.verdicts {
        if verdict.status != PriceStatus::Match {
            eprintln!(
                "  {} {} code {} net {:.2}: {}",
                verdict.status, verdict.claim_id, verdict.code, verdict.net, verdict.reason,
            );
        }
    }

    if s.mismatches > 0 || s.errors > 0 {
        return Err(CliError {
            code: EXIT_FINDINGS,
            message: format!("{} price finding(s)", s.mismatches + s.errors),
            hint: None,
        });
    }
    Ok(())
}

fn cmd_find(
    term: String,
    prices_path: PathBuf,
    limit: usize,
    json_output: bool,
) -> Result<(), CliError> {
    if term.trim().is_empty() {
        return Err(CliError::args("search term is empty"));
    }

    let price_list = load_price_list(&prices_path)?;
    let hits = price_list.search(&term, limit);

    if json_output {
        let json_str = serde_json::to_string_pretty(&hits)
            .map_err(|e| CliError::io(format!("JSON serialization error: {e}")))?;
        println!("{json_str}");
        return Ok(());
    }

    for record in &hits {
        println!("{}\t{:.2}\t{}", record.code, record.base_price, record.description);
    }
    eprintln!("{} result(s) for \"{}\"", hits.len(), term.trim());
    Ok(())
}
