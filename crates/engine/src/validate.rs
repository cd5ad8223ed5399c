//! Per-candidate modifier rule evaluation, plus the claim-level pass that
//! surfaces claims missing a required modifier 25.
//!
//! Every rule runs for every candidate; failing remarks accumulate and are
//! joined with "; ". The candidate pass consumes eligibility records in
//! source order, so an `EligibilityIndex` is single-use per validation run.

use std::collections::HashSet;

use crate::codemap::ModifierCodeMap;
use crate::eligibility::{match_key, EligibilityIndex};
use crate::model::{
    ActivityRecord, Modifier, ModifierCandidate, ValidationResult, ValidationStats,
    ValidationStatus,
};
use crate::normalize::normalize_voi;

/// E&M / ophthalmology codes that can trigger a modifier-25 requirement when
/// billed alongside another procedure.
pub const MAIN_PROCEDURE_CODES: [&str; 8] = [
    "99202", "99203", "99212", "99213", "92002", "92004", "92012", "92014",
];

/// Payers whose claims are governed by the eligibility ledger. A lookup miss
/// for anyone else is graded Unknown, not Invalid.
const ELIGIBILITY_PAYERS: [&str; 2] = ["E001", "D001"];

/// Validate every candidate record against the eligibility index and the
/// claim's activity context. Appends synthetic results for claims missing a
/// required modifier 25 when `required_codes` is supplied and non-empty.
pub fn validate_modifiers(
    candidates: &[ModifierCandidate],
    eligibility: &mut EligibilityIndex,
    activities: &[ActivityRecord],
    required_codes: Option<&ModifierCodeMap>,
) -> Vec<ValidationResult> {
    let mut results: Vec<ValidationResult> = candidates
        .iter()
        .map(|record| validate_one(record, eligibility, activities, required_codes))
        .collect();

    if let Some(map) = required_codes {
        if !map.codes_for("25").is_empty() {
            append_missing_modifier_25(&mut results, candidates, activities, map);
        }
    }

    results
}

fn validate_one(
    record: &ModifierCandidate,
    eligibility: &mut EligibilityIndex,
    activities: &[ActivityRecord],
    required_codes: Option<&ModifierCodeMap>,
) -> ValidationResult {
    let mut remarks: Vec<String> = Vec::new();
    let mut invalid = false;
    let mut unknown = false;

    // Rule 1: the observation's Code field must read "CPT modifier".
    if !record.code.trim().eq_ignore_ascii_case("cpt modifier") {
        invalid = true;
        remarks.push(format!(
            "Code is \"{}\", expected \"CPT modifier\"",
            record.code
        ));
    }

    // Rule 2: eligibility lookup and consumption.
    let key = match_key(&record.member_id, &record.date, &record.clinician);
    let matched = eligibility.consume(&key).cloned();
    if matched.is_none() {
        if ELIGIBILITY_PAYERS.contains(&record.payer_id.as_str()) {
            invalid = true;
            remarks.push("No eligibility match found".to_string());
        } else {
            unknown = true;
            remarks.push("Unknown status (PayerID not E001 or D001)".to_string());
        }
    }

    // Rule 3: VOI compatibility. Eligibility VOI preferred, observation
    // value as fallback. Modifier 25 is judged by co-occurrence instead.
    let voi_source = matched
        .as_ref()
        .map(|e| e.voi_number.trim())
        .filter(|v| !v.is_empty())
        .unwrap_or(record.value.as_str());
    let voi = normalize_voi(voi_source);
    match record.modifier {
        Modifier::M24 if voi != "VOID" && voi != "24" => {
            invalid = true;
            remarks.push("Modifier 24 does not match VOI (expected VOI_D)".to_string());
        }
        Modifier::M52 if voi != "VOIEF1" && voi != "52" => {
            invalid = true;
            remarks.push("Modifier 52 does not match VOI (expected VOI_EF1)".to_string());
        }
        Modifier::M25 => {
            // Rule 4: main procedure + ancillary procedure co-occurrence.
            let claim_activities: Vec<&ActivityRecord> = activities
                .iter()
                .filter(|a| a.claim_id == record.claim_id)
                .collect();

            let has_main = claim_activities
                .iter()
                .any(|a| is_main_procedure(&a.code) && a.amount > 0.0);
            let has_ancillary = claim_activities
                .iter()
                .any(|a| a.amount > 0.0 && qualifies_as_ancillary(&a.code, required_codes));

            if !has_main {
                invalid = true;
                remarks.push("Modifier 25 not justified: no main procedure".to_string());
            }
            if !has_ancillary {
                invalid = true;
                remarks
                    .push("Modifier 25 not required: no qualifying ancillary activity".to_string());
            }
        }
        _ => {}
    }

    let status = if invalid {
        ValidationStatus::Invalid
    } else if unknown {
        ValidationStatus::Unknown
    } else {
        ValidationStatus::Valid
    };

    ValidationResult {
        claim_id: record.claim_id.clone(),
        member_id: record.member_id.clone(),
        activity_id: record.activity_id.clone(),
        activity_code: record.activity_code.clone(),
        activity_amount: record.activity_amount,
        payer_id: record.payer_id.clone(),
        clinician: record.clinician.clone(),
        date: record.date.clone(),
        modifier: record.modifier,
        code: record.code.clone(),
        value: record.value.clone(),
        match_key: key,
        status,
        remarks: if status == ValidationStatus::Valid {
            "Valid".to_string()
        } else {
            remarks.join("; ")
        },
        eligibility: matched,
    }
}

fn is_main_procedure(code: &str) -> bool {
    MAIN_PROCEDURE_CODES.contains(&code)
}

/// With a supplied mapping, only codes the mapping flags as modifier-25
/// procedures count; without one, any non-main billed activity does
/// (permissive default).
fn qualifies_as_ancillary(code: &str, required_codes: Option<&ModifierCodeMap>) -> bool {
    match required_codes {
        Some(map) if !map.codes_for("25").is_empty() => map.contains("25", code),
        _ => !is_main_procedure(code),
    }
}

/// Claim-level pass: claims with no modifier-25 candidate but a main
/// procedure AND a mapped modifier-25 procedure, both billed, get a
/// synthetic invalid entry. Only runs with a non-empty mapping — without
/// one, "required" cannot be established and the pass would false-positive.
fn append_missing_modifier_25(
    results: &mut Vec<ValidationResult>,
    candidates: &[ModifierCandidate],
    activities: &[ActivityRecord],
    map: &ModifierCodeMap,
) {
    let claims_with_25: HashSet<&str> = candidates
        .iter()
        .filter(|c| c.modifier == Modifier::M25)
        .map(|c| c.claim_id.as_str())
        .collect();

    let mut seen_claims: HashSet<&str> = HashSet::new();
    for activity in activities {
        if !seen_claims.insert(activity.claim_id.as_str()) {
            continue;
        }
        if claims_with_25.contains(activity.claim_id.as_str()) {
            continue;
        }

        let claim_activities: Vec<&ActivityRecord> = activities
            .iter()
            .filter(|a| a.claim_id == activity.claim_id)
            .collect();
        let has_main = claim_activities
            .iter()
            .any(|a| is_main_procedure(&a.code) && a.amount > 0.0);
        let has_required = claim_activities
            .iter()
            .any(|a| a.amount > 0.0 && map.contains("25", &a.code));

        if has_main && has_required {
            results.push(ValidationResult {
                claim_id: activity.claim_id.clone(),
                member_id: String::new(),
                activity_id: String::new(),
                activity_code: String::new(),
                activity_amount: 0.0,
                payer_id: activity.payer_id.clone(),
                clinician: String::new(),
                date: String::new(),
                modifier: Modifier::M25,
                code: String::new(),
                value: String::new(),
                match_key: String::new(),
                status: ValidationStatus::Invalid,
                remarks: "Modifier 25 required but missing".to_string(),
                eligibility: None,
            });
        }
    }
}

/// Count totals by status, modifier, and payer. Pure reduction.
pub fn validation_stats(results: &[ValidationResult]) -> ValidationStats {
    let mut stats = ValidationStats {
        total: results.len(),
        ..ValidationStats::default()
    };
    for record in results {
        match record.status {
            ValidationStatus::Valid => stats.valid += 1,
            ValidationStatus::Invalid => stats.invalid += 1,
            ValidationStatus::Unknown => stats.unknown += 1,
        }
        *stats
            .by_modifier
            .entry(record.modifier.as_str().to_string())
            .or_insert(0) += 1;
        if !record.payer_id.is_empty() {
            *stats.by_payer.entry(record.payer_id.clone()).or_insert(0) += 1;
        }
    }
    stats
}
