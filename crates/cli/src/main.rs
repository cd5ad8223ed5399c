// claimlens CLI - headless claim audit operations

mod exit_codes;
mod modifiers;
mod prices;

use std::process::ExitCode;

use clap::{Parser, Subcommand};

use exit_codes::{audit_exit_code, EXIT_IO, EXIT_SUCCESS, EXIT_USAGE};

use claimlens_engine::AuditError;

#[derive(Parser)]
#[command(name = "claimlens")]
#[command(about = "Insurance claim audit: CPT modifier validation and price reconciliation")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate CPT modifiers (24/52/25) against the eligibility ledger
    Modifiers {
        #[command(subcommand)]
        command: modifiers::ModifierCommands,
    },

    /// Reconcile billed amounts against the contracted price list
    Prices {
        #[command(subcommand)]
        command: prices::PriceCommands,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        None => {
            // No subcommand = show help
            eprintln!("Usage: claimlens <command> [options]");
            eprintln!("       claimlens --help for more information");
            Ok(())
        }
        Some(Commands::Modifiers { command }) => modifiers::cmd_modifiers(command),
        Some(Commands::Prices { command }) => prices::cmd_prices(command),
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn args(msg: impl Into<String>) -> Self {
        Self { code: EXIT_USAGE, message: msg.into(), hint: None }
    }

    pub fn io(msg: impl Into<String>) -> Self {
        Self { code: EXIT_IO, message: msg.into(), hint: None }
    }

    /// Create error from engine error with proper exit code.
    pub fn audit(err: AuditError) -> Self {
        let hint = match &err {
            AuditError::MissingColumn { source_name, .. } => Some(format!(
                "check the {source_name} file's header row for the expected column names"
            )),
            _ => None,
        };
        Self { code: audit_exit_code(&err), message: err.to_string(), hint }
    }
}
