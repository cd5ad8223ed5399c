//! CLI Exit Code Registry
//!
//! This is the single source of truth for all CLI exit codes.
//! Exit codes are part of the shell contract — scripts rely on them.
//!
//! # Exit Code Ranges
//!
//! | Range   | Domain           | Description                              |
//! |---------|------------------|------------------------------------------|
//! | 0       | Universal        | Success                                  |
//! | 1       | Universal        | Findings (like diff(1): audit flagged)   |
//! | 2       | Universal        | CLI usage error (bad args, missing file) |
//! | 3-9     | audit            | Input/config failure codes               |
//!
//! # Adding New Exit Codes
//!
//! 1. Add the constant in the appropriate range
//! 2. Document what triggers it
//! 3. Update the table above
//! 4. Wire it into the relevant command's error handling

use claimlens_engine::AuditError;

// =============================================================================
// Universal (0-2)
// =============================================================================

/// Success - command completed and the audit is clean.
pub const EXIT_SUCCESS: u8 = 0;

/// Findings - the audit ran to completion and flagged something
/// (invalid modifiers, price mismatches). Like `diff(1)`, exit 1 means
/// "the inputs disagree", not "the tool broke".
pub const EXIT_FINDINGS: u8 = 1;

/// Usage error - bad arguments, missing required options.
pub const EXIT_USAGE: u8 = 2;

// =============================================================================
// Audit (3-9)
// =============================================================================

/// Cannot read an input file (missing, unreadable, unsupported format).
pub const EXIT_IO: u8 = 3;

/// Input parse failure (malformed XML, missing required column, empty table).
pub const EXIT_PARSE: u8 = 4;

/// Config failure (bad multiplier TOML, unknown category).
pub const EXIT_CONFIG: u8 = 5;

/// Map an engine error to its registry exit code.
pub fn audit_exit_code(err: &AuditError) -> u8 {
    match err {
        AuditError::Io(_) => EXIT_IO,
        AuditError::MalformedXml(_)
        | AuditError::MissingColumn { .. }
        | AuditError::EmptyTable { .. } => EXIT_PARSE,
        AuditError::ConfigParse(_) => EXIT_CONFIG,
    }
}
