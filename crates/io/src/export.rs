// CSV report export for validation results and price verdicts

use std::path::Path;

use claimlens_engine::{AuditError, PriceVerdict, ValidationResult};

const VALIDATION_HEADER: &[&str] = &[
    "Claim ID",
    "Member ID",
    "Activity ID",
    "Activity Code",
    "Payer ID",
    "Clinician",
    "Date",
    "Modifier",
    "VOI Number",
    "Status",
    "Remarks",
];

const PRICE_HEADER: &[&str] = &[
    "Claim ID",
    "Clinician",
    "Type",
    "Code",
    "Category",
    "Quantity",
    "NET",
    "Expected Price",
    "Matched Multiplier",
    "Status",
    "Reason",
];

/// Write modifier validation results as CSV. The VOI column shows the
/// matched eligibility row's number when one exists, else the claim's own
/// observation value.
pub fn write_validation_csv(path: &Path, results: &[ValidationResult]) -> Result<(), AuditError> {
    let io_err = |e: csv::Error| AuditError::Io(format!("{}: {e}", path.display()));
    let mut writer = csv::Writer::from_path(path).map_err(io_err)?;

    writer.write_record(VALIDATION_HEADER).map_err(io_err)?;
    for r in results {
        let voi = r
            .eligibility
            .as_ref()
            .map(|e| e.voi_number.as_str())
            .unwrap_or(&r.value);
        let status = r.status.to_string();
        writer
            .write_record([
                r.claim_id.as_str(),
                r.member_id.as_str(),
                r.activity_id.as_str(),
                r.activity_code.as_str(),
                r.payer_id.as_str(),
                r.clinician.as_str(),
                r.date.as_str(),
                r.modifier.as_str(),
                voi,
                status.as_str(),
                r.remarks.as_str(),
            ])
            .map_err(io_err)?;
    }
    writer
        .flush()
        .map_err(|e| AuditError::Io(format!("{}: {e}", path.display())))
}

/// Write price reconciliation verdicts as CSV. Absent expected prices and
/// multiplier tags render as empty fields.
pub fn write_price_csv(path: &Path, verdicts: &[PriceVerdict]) -> Result<(), AuditError> {
    let io_err = |e: csv::Error| AuditError::Io(format!("{}: {e}", path.display()));
    let mut writer = csv::Writer::from_path(path).map_err(io_err)?;

    writer.write_record(PRICE_HEADER).map_err(io_err)?;
    for v in verdicts {
        let expected = v
            .expected_price
            .map(|p| format!("{p:.2}"))
            .unwrap_or_default();
        let quantity = v.quantity.to_string();
        let net = format!("{:.2}", v.net);
        let status = v.status.to_string();
        writer
            .write_record([
                v.claim_id.as_str(),
                v.clinician.as_str(),
                v.kind.as_str(),
                v.code.as_str(),
                v.category.as_str(),
                quantity.as_str(),
                net.as_str(),
                expected.as_str(),
                v.matched_multiplier.as_deref().unwrap_or(""),
                status.as_str(),
                v.reason.as_str(),
            ])
            .map_err(io_err)?;
    }
    writer
        .flush()
        .map_err(|e| AuditError::Io(format!("{}: {e}", path.display())))
}
