use std::collections::BTreeMap;

use serde::Serialize;

// ---------------------------------------------------------------------------
// Eligibility
// ---------------------------------------------------------------------------

/// One pre-authorization row from the eligibility export.
///
/// Created once per source row at load time. The `used` flag is the only
/// mutation in the whole pipeline: each record is consumed at most once per
/// validation pass (see `EligibilityIndex::consume`).
#[derive(Debug, Clone, Serialize)]
pub struct EligibilityRecord {
    pub member_id: String,
    pub date: String,
    pub clinician: String,
    pub voi_number: String,
    pub original_member_id: String,
    pub original_date: String,
    #[serde(skip)]
    pub used: bool,
}

// ---------------------------------------------------------------------------
// Claim extraction
// ---------------------------------------------------------------------------

/// CPT modifier under audit. Only these three have justification rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Modifier {
    M24,
    M52,
    M25,
}

impl Modifier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::M24 => "24",
            Self::M52 => "52",
            Self::M25 => "25",
        }
    }
}

impl std::fmt::Display for Modifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Modifier {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// One (claim, activity, qualifying observation) tuple from the claim export.
#[derive(Debug, Clone, Serialize)]
pub struct ModifierCandidate {
    pub claim_id: String,
    pub member_id: String,
    pub activity_id: String,
    pub activity_code: String,
    pub activity_amount: f64,
    pub payer_id: String,
    pub clinician: String,
    pub date: String,
    pub modifier: Modifier,
    /// The observation's Code attribute — free text expected to read
    /// "CPT modifier". Distinct from the activity procedure code.
    pub code: String,
    /// Raw observation value (VOI), pre-normalization.
    pub value: String,
}

/// Every claim activity, modifier-relevant or not. Feeds the modifier-25
/// co-occurrence check.
#[derive(Debug, Clone, Serialize)]
pub struct ActivityRecord {
    pub claim_id: String,
    pub activity_id: String,
    pub code: String,
    pub amount: f64,
    pub payer_id: String,
}

// ---------------------------------------------------------------------------
// Validation output
// ---------------------------------------------------------------------------

/// Three-way verdict. `Unknown` is reserved for candidates whose payer is
/// outside the eligibility-governed set and no eligibility row matched —
/// deliberately not collapsed into Invalid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationStatus {
    Valid,
    Invalid,
    Unknown,
}

impl std::fmt::Display for ValidationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Valid => write!(f, "valid"),
            Self::Invalid => write!(f, "invalid"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// One candidate graded, immutable after construction. Synthetic entries
/// (claim missing a required modifier 25) carry empty activity fields.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationResult {
    pub claim_id: String,
    pub member_id: String,
    pub activity_id: String,
    pub activity_code: String,
    pub activity_amount: f64,
    pub payer_id: String,
    pub clinician: String,
    pub date: String,
    pub modifier: Modifier,
    pub code: String,
    pub value: String,
    pub match_key: String,
    pub status: ValidationStatus,
    pub remarks: String,
    pub eligibility: Option<EligibilityRecord>,
}

/// Pure reduction over a result list.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ValidationStats {
    pub total: usize,
    pub valid: usize,
    pub invalid: usize,
    pub unknown: usize,
    pub by_modifier: BTreeMap<String, usize>,
    pub by_payer: BTreeMap<String, usize>,
}

// ---------------------------------------------------------------------------
// Pricing
// ---------------------------------------------------------------------------

/// One row of the price list. Keyed by code; duplicate codes last-row-wins.
#[derive(Debug, Clone, Serialize)]
pub struct PriceRecord {
    pub code: String,
    pub description: String,
    pub base_price: f64,
}

/// One billed claim line, as extracted for price reconciliation.
#[derive(Debug, Clone, Serialize)]
pub struct ClaimLine {
    pub claim_id: String,
    pub kind: String,
    pub code: String,
    pub net: f64,
    pub quantity: u32,
    pub clinician: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PriceStatus {
    Match,
    Mismatch,
    NotFound,
    Error,
}

impl std::fmt::Display for PriceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Match => write!(f, "Match"),
            Self::Mismatch => write!(f, "Mismatch"),
            Self::NotFound => write!(f, "Not Found"),
            Self::Error => write!(f, "Error"),
        }
    }
}

/// Price-match verdict for one claim line.
#[derive(Debug, Clone, Serialize)]
pub struct PriceVerdict {
    pub claim_id: String,
    pub clinician: String,
    pub kind: String,
    pub code: String,
    pub category: String,
    pub quantity: u32,
    pub net: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched_multiplier: Option<String>,
    pub status: PriceStatus,
    pub reason: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct PriceSummary {
    pub total: usize,
    pub matches: usize,
    pub mismatches: usize,
    pub not_found: usize,
    pub errors: usize,
}

impl PriceSummary {
    pub fn from_verdicts(verdicts: &[PriceVerdict]) -> Self {
        let mut summary = Self {
            total: verdicts.len(),
            ..Self::default()
        };
        for v in verdicts {
            match v.status {
                PriceStatus::Match => summary.matches += 1,
                PriceStatus::Mismatch => summary.mismatches += 1,
                PriceStatus::NotFound => summary.not_found += 1,
                PriceStatus::Error => summary.errors += 1,
            }
        }
        summary
    }
}
