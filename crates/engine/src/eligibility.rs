//! Eligibility/pre-authorization ledger: column resolution, index build,
//! single-use consumption.

use std::collections::HashMap;

use crate::error::AuditError;
use crate::model::EligibilityRecord;
use crate::normalize::{normalize_date, normalize_member_id};

/// Accepted header spellings per logical field, resolved once at load time.
const MEMBER_COLUMNS: &[&str] = &[
    "Card Number / DHA Member ID",
    "Card Number",
    "DHA Member ID",
];
const DATE_COLUMNS: &[&str] = &["Ordered On"];
const CLINICIAN_COLUMNS: &[&str] = &["Clinician"];
const VOI_COLUMNS: &[&str] = &["VOI Number"];

/// How many leading rows may precede the header row (title banners etc.).
const HEADER_SCAN_ROWS: usize = 5;

/// Composite lookup key shared by eligibility rows and claim candidates.
pub fn match_key(member_id: &str, date: &str, clinician: &str) -> String {
    format!("{member_id}|{date}|{clinician}")
}

/// Multi-valued lookup from `member|date|clinician` to eligibility records,
/// in source row order. Duplicate keys are expected (repeat authorizations).
#[derive(Debug, Clone, Default)]
pub struct EligibilityIndex {
    records: Vec<EligibilityRecord>,
    index: HashMap<String, Vec<usize>>,
}

impl EligibilityIndex {
    /// Build the index from a raw table (header row + data rows).
    ///
    /// The header row is located by scanning the first few rows for a member
    /// column synonym; all four required columns must then resolve or the
    /// whole load fails. Data rows missing any of the three join-key fields
    /// after normalization are skipped silently; a blank VOI number never
    /// drops a row.
    pub fn from_rows(rows: &[Vec<String>]) -> Result<Self, AuditError> {
        let source = "eligibility";
        let header_at = rows
            .iter()
            .take(HEADER_SCAN_ROWS)
            .position(|row| find_column(row, MEMBER_COLUMNS).is_some())
            .ok_or_else(|| AuditError::MissingColumn {
                source_name: source.into(),
                column: MEMBER_COLUMNS[0].into(),
            })?;
        let header = &rows[header_at];

        let col = |synonyms: &[&str]| -> Result<usize, AuditError> {
            find_column(header, synonyms).ok_or_else(|| AuditError::MissingColumn {
                source_name: source.into(),
                column: synonyms[0].into(),
            })
        };
        let member_col = col(MEMBER_COLUMNS)?;
        let date_col = col(DATE_COLUMNS)?;
        let clinician_col = col(CLINICIAN_COLUMNS)?;
        let voi_col = col(VOI_COLUMNS)?;

        let mut out = Self::default();
        for row in &rows[header_at + 1..] {
            let member_raw = cell(row, member_col);
            let date_raw = cell(row, date_col);

            let member_id = normalize_member_id(member_raw);
            let date = normalize_date(date_raw);
            let clinician = cell(row, clinician_col).trim().to_uppercase();
            if member_id.is_empty() || date.is_empty() || clinician.is_empty() {
                continue;
            }

            let key = match_key(&member_id, &date, &clinician);
            let record = EligibilityRecord {
                member_id,
                date,
                clinician,
                voi_number: cell(row, voi_col).trim().to_string(),
                original_member_id: member_raw.to_string(),
                original_date: date_raw.to_string(),
                used: false,
            };
            out.index.entry(key).or_default().push(out.records.len());
            out.records.push(record);
        }
        Ok(out)
    }

    /// Consume one record for `key`: the first unused record wins and is
    /// marked used. When every record under the key has already been
    /// consumed, the first one is returned again without complaint — reuse
    /// is silent, only the lookup miss is an audit finding.
    pub fn consume(&mut self, key: &str) -> Option<&EligibilityRecord> {
        let slots = self.index.get(key)?;
        let idx = slots
            .iter()
            .copied()
            .find(|&i| !self.records[i].used)
            .unwrap_or(slots[0]);
        self.records[idx].used = true;
        Some(&self.records[idx])
    }

    /// Full ordered record list, for audit/export.
    pub fn records(&self) -> &[EligibilityRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

fn find_column(header: &[String], synonyms: &[&str]) -> Option<usize> {
    header.iter().position(|h| {
        let h = h.trim();
        synonyms.iter().any(|s| h.eq_ignore_ascii_case(s))
    })
}

fn cell(row: &[String], idx: usize) -> &str {
    row.get(idx).map(String::as_str).unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(rows: &[&[&str]]) -> Vec<Vec<String>> {
        rows.iter()
            .map(|r| r.iter().map(|c| c.to_string()).collect())
            .collect()
    }

    fn sample() -> Vec<Vec<String>> {
        table(&[
            &["Card Number / DHA Member ID", "Ordered On", "Clinician", "VOI Number"],
            &["00123", "15/03/2024", "dr smith", "VOI_D"],
            &["00123", "15/03/2024", "dr smith", "VOI_EF1"],
            &["456", "16/03/2024", "DR JONES", ""],
        ])
    }

    #[test]
    fn builds_index_with_normalized_keys() {
        let index = EligibilityIndex::from_rows(&sample()).unwrap();
        assert_eq!(index.len(), 3);
        assert_eq!(index.records()[0].member_id, "123");
        assert_eq!(index.records()[0].date, "2024-03-15");
        assert_eq!(index.records()[0].clinician, "DR SMITH");
        assert_eq!(index.records()[0].original_member_id, "00123");
    }

    #[test]
    fn blank_voi_kept_blank_join_key_dropped() {
        let mut rows = sample();
        rows.push(vec!["".into(), "17/03/2024".into(), "DR X".into(), "VOI_D".into()]);
        let index = EligibilityIndex::from_rows(&rows).unwrap();
        // blank-VOI row kept, blank-member row dropped
        assert_eq!(index.len(), 3);
        assert_eq!(index.records()[2].voi_number, "");
    }

    #[test]
    fn header_found_past_banner_row() {
        let mut rows = vec![vec!["Eligibility Export 2024".to_string()]];
        rows.extend(sample());
        let index = EligibilityIndex::from_rows(&rows).unwrap();
        assert_eq!(index.len(), 3);
    }

    #[test]
    fn missing_column_is_fatal() {
        let rows = table(&[
            &["Card Number", "Clinician", "VOI Number"],
            &["123", "DR SMITH", "VOI_D"],
        ]);
        let err = EligibilityIndex::from_rows(&rows).unwrap_err();
        match err {
            AuditError::MissingColumn { column, .. } => assert_eq!(column, "Ordered On"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn consume_prefers_first_unused_then_reuses_first() {
        let mut index = EligibilityIndex::from_rows(&sample()).unwrap();
        let key = match_key("123", "2024-03-15", "DR SMITH");

        let first = index.consume(&key).unwrap().voi_number.clone();
        assert_eq!(first, "VOI_D");
        let second = index.consume(&key).unwrap().voi_number.clone();
        assert_eq!(second, "VOI_EF1");
        // exhausted: falls back to the first record, never fails
        let third = index.consume(&key).unwrap().voi_number.clone();
        assert_eq!(third, "VOI_D");

        assert!(index.consume("nope|2024-01-01|DR WHO").is_none());
    }
}
