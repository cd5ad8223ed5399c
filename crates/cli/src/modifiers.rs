//! `claimlens modifiers` — CPT modifier validation against the eligibility ledger.

use std::path::PathBuf;

use clap::Subcommand;
use serde::Serialize;

use claimlens_engine::{
    extract_claims, validate_modifiers, validation_stats, EligibilityIndex, ModifierCodeMap,
    ValidationResult, ValidationStats, ValidationStatus,
};
use claimlens_io::{export, table};

use crate::exit_codes::EXIT_FINDINGS;
use crate::CliError;

#[derive(Subcommand)]
pub enum ModifierCommands {
    /// Validate modifier observations in a claim XML export
    #[command(after_help = "\
Examples:
  claimlens modifiers check claims.xml --eligibility elig.xlsx
  claimlens modifiers check claims.xml --eligibility elig.csv --codes map.xlsx
  claimlens modifiers check claims.xml --eligibility elig.xlsx --json
  claimlens modifiers check claims.xml --eligibility elig.xlsx --export-csv report.csv")]
    Check {
        /// Claim XML export file
        claims: PathBuf,

        /// Eligibility/pre-authorization export (xlsx, xls, csv, ...)
        #[arg(long)]
        eligibility: PathBuf,

        /// Optional modifier-requirement mapping table. Enables the
        /// missing-modifier-25 check.
        #[arg(long)]
        codes: Option<PathBuf>,

        /// Output JSON to stdout instead of human summary
        #[arg(long)]
        json: bool,

        /// Write JSON output to file
        #[arg(long)]
        output: Option<PathBuf>,

        /// Write the full result table as CSV
        #[arg(long)]
        export_csv: Option<PathBuf>,
    },
}

#[derive(Serialize)]
struct ModifierReport {
    results: Vec<ValidationResult>,
    stats: ValidationStats,
}

pub fn cmd_modifiers(cmd: ModifierCommands) -> Result<(), CliError> {
    match cmd {
        ModifierCommands::Check {
            claims,
            eligibility,
            codes,
            json,
            output,
            export_csv,
        } => cmd_check(claims, eligibility, codes, json, output, export_csv),
    }
}

fn cmd_check(
    claims_path: PathBuf,
    eligibility_path: PathBuf,
    codes_path: Option<PathBuf>,
    json_output: bool,
    output_file: Option<PathBuf>,
    export_csv: Option<PathBuf>,
) -> Result<(), CliError> {
    let xml = table::read_text(&claims_path).map_err(CliError::audit)?;
    let extraction = extract_claims(&xml).map_err(CliError::audit)?;

    let eligibility_rows = table::read_table(&eligibility_path).map_err(CliError::audit)?;
    let mut index = EligibilityIndex::from_rows(&eligibility_rows).map_err(CliError::audit)?;

    let code_map = match codes_path {
        Some(path) => {
            let rows = table::read_table(&path).map_err(CliError::audit)?;
            Some(ModifierCodeMap::from_rows(&rows).map_err(CliError::audit)?)
        }
        None => None,
    };

    let results = validate_modifiers(
        &extraction.candidates,
        &mut index,
        &extraction.activities,
        code_map.as_ref(),
    );
    let stats = validation_stats(&results);

    if let Some(ref path) = export_csv {
        export::write_validation_csv(path, &results).map_err(CliError::audit)?;
        eprintln!("wrote {}", path.display());
    }

    let report = ModifierReport { results, stats };
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
    let s = &report.stats;
    eprintln!(
        "{} candidates — {} valid, {} invalid, {} unknown ({} eligibility rows)",
        s.total,
        s.valid,
        s.invalid,
        s.unknown,
        index.len(),
    );
    for result in &report.results {
        if result.status != ValidationStatus::Valid {
            eprintln!(
                "  {} {} activity {} modifier {}: {}",
                result.status, result.claim_id, result.activity_id, result.modifier, result.remarks,
            );
        }
    }

    if s.invalid > 0 {
        return Err(CliError {
            code: EXIT_FINDINGS,
            message: format!("{} invalid modifier usage(s) found", s.invalid),
            hint: None,
        });
    }
    Ok(())
}
