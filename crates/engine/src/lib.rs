//! `claimlens-engine` — Claim audit engine: modifier validation and price
//! reconciliation over insurance claim exports.
//!
//! Pure engine crate: receives pre-loaded tables and XML text, returns
//! classified results. No CLI or IO dependencies.

pub mod category;
pub mod codemap;
pub mod eligibility;
pub mod error;
pub mod extract;
pub mod model;
pub mod normalize;
pub mod pricing;
pub mod validate;

pub use category::{code_category, CodeCategory};
pub use codemap::ModifierCodeMap;
pub use eligibility::{match_key, EligibilityIndex};
pub use error::AuditError;
pub use extract::{extract_claim_lines, extract_claims, sanitize_entities, Extraction};
pub use model::{
    ActivityRecord, ClaimLine, EligibilityRecord, Modifier, ModifierCandidate, PriceRecord,
    PriceStatus, PriceSummary, PriceVerdict, ValidationResult, ValidationStats, ValidationStatus,
};
pub use pricing::{
    check_line, reconcile_lines, MultiplierKind, MultiplierRow, MultiplierTable, PriceList,
};
pub use normalize::{normalize_date, normalize_member_id, normalize_voi};
pub use validate::{validate_modifiers, validation_stats};
