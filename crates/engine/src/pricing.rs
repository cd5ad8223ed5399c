//! Price list, category multiplier table, and per-line price matching.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::category::{code_category, CodeCategory};
use crate::error::AuditError;
use crate::model::{ClaimLine, PriceRecord, PriceStatus, PriceVerdict};

/// Absolute tolerance for all price comparisons (2-decimal currency,
/// floating-point safe).
pub const PRICE_TOLERANCE: f64 = 0.01;

// ---------------------------------------------------------------------------
// Price list
// ---------------------------------------------------------------------------

/// Accepted header spellings, resolved once at load time.
const CODE_COLUMNS: &[&str] = &["Code"];
const DESCRIPTION_COLUMNS: &[&str] = &["Code Description", "Name", "Description"];

/// Code → price mapping plus the full ordered row list (for search/audit).
/// Duplicate codes: last row wins in the mapping, all rows kept in the list.
#[derive(Debug, Clone, Default)]
pub struct PriceList {
    records: Vec<PriceRecord>,
    by_code: HashMap<String, usize>,
}

impl PriceList {
    /// Build from a raw table (header row + data rows). A code column is
    /// mandatory; the price column is any column whose name contains
    /// "price" or equals "Thiqa". Unparseable prices degrade to 0.
    pub fn from_rows(rows: &[Vec<String>]) -> Result<Self, AuditError> {
        let source = "price list";
        let header = rows.first().ok_or_else(|| AuditError::EmptyTable {
            source_name: source.into(),
        })?;

        let code_col = find_column(header, CODE_COLUMNS).ok_or_else(|| {
            AuditError::MissingColumn {
                source_name: source.into(),
                column: "Code".into(),
            }
        })?;
        let description_col = find_column(header, DESCRIPTION_COLUMNS);
        let price_col = header.iter().position(|h| {
            let h = h.trim();
            h.to_lowercase().contains("price") || h.eq_ignore_ascii_case("thiqa")
        });
        if description_col.is_none() && price_col.is_none() {
            return Err(AuditError::MissingColumn {
                source_name: source.into(),
                column: "Price".into(),
            });
        }

        let mut out = Self::default();
        for row in &rows[1..] {
            let code = cell(row, code_col).trim();
            if code.is_empty() {
                continue;
            }
            let description = description_col
                .map(|i| cell(row, i).trim().to_string())
                .unwrap_or_default();
            let base_price = price_col
                .and_then(|i| cell(row, i).trim().parse().ok())
                .unwrap_or(0.0);

            out.by_code.insert(code.to_string(), out.records.len());
            out.records.push(PriceRecord {
                code: code.to_string(),
                description,
                base_price,
            });
        }
        Ok(out)
    }

    pub fn get(&self, code: &str) -> Option<&PriceRecord> {
        self.by_code.get(code).map(|&i| &self.records[i])
    }

    /// Case-insensitive substring search over code and description,
    /// capped at `limit` results.
    pub fn search(&self, term: &str, limit: usize) -> Vec<&PriceRecord> {
        let term = term.trim().to_lowercase();
        if term.is_empty() {
            return Vec::new();
        }
        self.records
            .iter()
            .filter(|r| {
                r.code.to_lowercase().contains(&term)
                    || r.description.to_lowercase().contains(&term)
            })
            .take(limit)
            .collect()
    }

    pub fn records(&self) -> &[PriceRecord] {
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

// ---------------------------------------------------------------------------
// Multiplier table
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MultiplierKind {
    Thiqa,
    LowEnd,
    Basic,
}

impl MultiplierKind {
    pub const ALL: [MultiplierKind; 3] = [Self::Thiqa, Self::LowEnd, Self::Basic];
}

impl std::fmt::Display for MultiplierKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Thiqa => write!(f, "Thiqa"),
            Self::LowEnd => write!(f, "Low-End"),
            Self::Basic => write!(f, "Basic"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct MultiplierRow {
    pub category: CodeCategory,
    pub thiqa: f64,
    pub low_end: f64,
    pub basic: f64,
}

impl MultiplierRow {
    pub fn rate(&self, kind: MultiplierKind) -> f64 {
        match kind {
            MultiplierKind::Thiqa => self.thiqa,
            MultiplierKind::LowEnd => self.low_end,
            MultiplierKind::Basic => self.basic,
        }
    }
}

/// Category multiplier table, user-editable at runtime. An empty `active`
/// map means auto-detect mode: all three multipliers are tried per line.
#[derive(Debug, Clone)]
pub struct MultiplierTable {
    rows: Vec<MultiplierRow>,
    active: BTreeMap<CodeCategory, MultiplierKind>,
}

impl Default for MultiplierTable {
    fn default() -> Self {
        let row = |category, thiqa, low_end, basic| MultiplierRow {
            category,
            thiqa,
            low_end,
            basic,
        };
        Self {
            rows: vec![
                row(CodeCategory::Medical, 1.3, 1.0, 1.0),
                row(CodeCategory::Radiology, 1.0, 1.0, 1.0),
                row(CodeCategory::Laboratory, 1.0, 1.0, 1.0),
                row(CodeCategory::Physiotherapy, 1.0, 1.0, 1.0),
                row(CodeCategory::OpEm, 1.3, 1.08, 1.0),
            ],
            active: BTreeMap::new(),
        }
    }
}

/// TOML shape for multiplier overrides:
///
/// ```toml
/// [[category]]
/// name = "Medical"
/// thiqa = 1.3
/// low_end = 1.0
/// basic = 1.0
/// active = "thiqa"   # optional; omit for auto-detect
/// ```
#[derive(Debug, Deserialize)]
struct MultiplierConfig {
    #[serde(default)]
    category: Vec<CategoryConfig>,
}

#[derive(Debug, Deserialize)]
struct CategoryConfig {
    name: String,
    thiqa: f64,
    low_end: f64,
    basic: f64,
    #[serde(default)]
    active: Option<MultiplierKind>,
}

impl MultiplierTable {
    /// Parse overrides from TOML; categories not mentioned keep their
    /// defaults. Unknown category names are a config error.
    pub fn from_toml(input: &str) -> Result<Self, AuditError> {
        let config: MultiplierConfig =
            toml::from_str(input).map_err(|e| AuditError::ConfigParse(e.to_string()))?;

        let mut table = Self::default();
        for entry in config.category {
            let category = category_by_name(&entry.name).ok_or_else(|| {
                AuditError::ConfigParse(format!("unknown category: \"{}\"", entry.name))
            })?;
            table.set(category, entry.thiqa, entry.low_end, entry.basic);
            if let Some(kind) = entry.active {
                table.active.insert(category, kind);
            }
        }
        Ok(table)
    }

    pub fn set(&mut self, category: CodeCategory, thiqa: f64, low_end: f64, basic: f64) {
        if let Some(row) = self.rows.iter_mut().find(|r| r.category == category) {
            row.thiqa = thiqa;
            row.low_end = low_end;
            row.basic = basic;
        }
    }

    /// Pin one multiplier as active for every category (single-active mode).
    pub fn set_active_all(&mut self, kind: MultiplierKind) {
        for category in CodeCategory::ALL {
            self.active.insert(category, kind);
        }
    }

    pub fn rates(&self, category: CodeCategory) -> Option<&MultiplierRow> {
        self.rows.iter().find(|r| r.category == category)
    }

    pub fn active_for(&self, category: CodeCategory) -> Option<MultiplierKind> {
        self.active.get(&category).copied()
    }

    pub fn rows(&self) -> &[MultiplierRow] {
        &self.rows
    }
}

fn category_by_name(name: &str) -> Option<CodeCategory> {
    CodeCategory::ALL
        .into_iter()
        .find(|c| c.to_string().eq_ignore_ascii_case(name.trim()))
}

// ---------------------------------------------------------------------------
// Matching
// ---------------------------------------------------------------------------

fn price_eq(a: f64, b: f64) -> bool {
    (a - b).abs() < PRICE_TOLERANCE
}

/// Price-match one claim line.
///
/// Codes with no multiplier category are reported Not Found with the raw
/// base-price figure for reference, never auto-matched (see DESIGN.md on
/// the policy fork).
pub fn check_line(line: &ClaimLine, prices: &PriceList, table: &MultiplierTable) -> PriceVerdict {
    let category = code_category(&line.code);
    let quantity = line.quantity.max(1) as f64;

    let verdict = |status, category: String, expected, matched, reason: String| PriceVerdict {
        claim_id: line.claim_id.clone(),
        clinician: line.clinician.clone(),
        kind: line.kind.clone(),
        code: line.code.clone(),
        category,
        quantity: line.quantity,
        net: line.net,
        expected_price: expected,
        matched_multiplier: matched,
        status,
        reason,
    };

    // Placeholder code short-circuits before any lookup
    if line.code == "00000" {
        return verdict(
            PriceStatus::Error,
            "Invalid Code".into(),
            None,
            None,
            "Invalid code 00000".into(),
        );
    }

    let base_price = match prices.get(&line.code) {
        Some(record) if record.base_price > 0.0 => record.base_price,
        _ => {
            let category_name = category
                .map(|c| c.to_string())
                .unwrap_or_else(|| "Unknown".into());
            return verdict(
                PriceStatus::NotFound,
                category_name,
                None,
                None,
                "Code not in price list".into(),
            );
        }
    };

    let Some(category) = category else {
        return verdict(
            PriceStatus::NotFound,
            "No Category".into(),
            Some(base_price * quantity),
            None,
            "No modifier category available".into(),
        );
    };
    let Some(rates) = table.rates(category) else {
        return verdict(
            PriceStatus::NotFound,
            category.to_string(),
            Some(base_price * quantity),
            None,
            "No modifier category available".into(),
        );
    };

    if let Some(kind) = table.active_for(category) {
        // Single-active mode: only the pinned multiplier counts
        let rate = rates.rate(kind);
        let expected = base_price * rate * quantity;
        if price_eq(line.net, expected) {
            verdict(
                PriceStatus::Match,
                category.to_string(),
                Some(expected),
                Some(format!("{kind} ({rate})")),
                "-".into(),
            )
        } else {
            verdict(
                PriceStatus::Mismatch,
                category.to_string(),
                Some(expected),
                None,
                format!("Expected {expected:.2} for {kind} ({rate})"),
            )
        }
    } else {
        // Auto mode: Thiqa, Low-End, Basic in fixed order; first hit wins
        for kind in MultiplierKind::ALL {
            let rate = rates.rate(kind);
            let expected = base_price * rate * quantity;
            if price_eq(line.net, expected) {
                return verdict(
                    PriceStatus::Match,
                    category.to_string(),
                    Some(expected),
                    Some(format!("{kind} ({rate})")),
                    "-".into(),
                );
            }
        }
        verdict(
            PriceStatus::Mismatch,
            category.to_string(),
            Some(base_price * rates.thiqa * quantity),
            None,
            format!(
                "Price doesn't match any modifier (Thiqa={}, Low-End={}, Basic={})",
                rates.thiqa, rates.low_end, rates.basic
            ),
        )
    }
}

pub fn reconcile_lines(
    lines: &[ClaimLine],
    prices: &PriceList,
    table: &MultiplierTable,
) -> Vec<PriceVerdict> {
    lines
        .iter()
        .map(|line| check_line(line, prices, table))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PriceSummary;

    fn price_table() -> PriceList {
        let rows: Vec<Vec<String>> = vec![
            vec!["Code".into(), "Code Description".into(), "Price (AED)".into()],
            vec!["10040".into(), "Acne surgery".into(), "100".into()],
            vec!["73000".into(), "X-ray clavicle".into(), "120".into()],
            vec!["99213".into(), "Office visit, established".into(), "150".into()],
            vec!["90834".into(), "Psychotherapy 45 min".into(), "0".into()],
            // duplicate code, last row wins
            vec!["10040".into(), "Acne surgery (rev)".into(), "110".into()],
        ];
        PriceList::from_rows(&rows).unwrap()
    }

    fn line(code: &str, net: f64, quantity: u32) -> ClaimLine {
        ClaimLine {
            claim_id: "C1".into(),
            kind: "OP".into(),
            code: code.into(),
            net,
            quantity,
            clinician: "DR SMITH".into(),
        }
    }

    #[test]
    fn auto_mode_matches_thiqa_with_quantity() {
        let prices = price_table();
        let table = MultiplierTable::default();
        // Medical thiqa 1.3: 110 * 1.3 * 2 = 286
        let v = check_line(&line("10040", 286.0, 2), &prices, &table);
        assert_eq!(v.status, PriceStatus::Match);
        assert_eq!(v.matched_multiplier.as_deref(), Some("Thiqa (1.3)"));
        assert_eq!(v.category, "Medical");
    }

    #[test]
    fn auto_mode_tolerance_boundary() {
        let prices = price_table();
        let table = MultiplierTable::default();
        assert_eq!(
            check_line(&line("10040", 286.005, 2), &prices, &table).status,
            PriceStatus::Match
        );
        let v = check_line(&line("10040", 287.0, 2), &prices, &table);
        assert_eq!(v.status, PriceStatus::Mismatch);
        // mismatch defaults expected price to the Thiqa figure
        assert_eq!(v.expected_price, Some(286.0));
        assert!(v.reason.contains("Thiqa=1.3"));
    }

    #[test]
    fn auto_mode_falls_through_to_basic() {
        let prices = price_table();
        let table = MultiplierTable::default();
        // Medical basic 1.0: 110 * 1.0 = 110
        let v = check_line(&line("10040", 110.0, 1), &prices, &table);
        assert_eq!(v.status, PriceStatus::Match);
        // lowEnd 1.0 comes before basic in the fixed order and wins the tag
        assert_eq!(v.matched_multiplier.as_deref(), Some("Low-End (1)"));
    }

    #[test]
    fn single_active_mode_checks_only_pinned_multiplier() {
        let prices = price_table();
        let mut table = MultiplierTable::default();
        table.set_active_all(MultiplierKind::Basic);
        // 110 * 1.0 = 110 matches Basic
        let v = check_line(&line("10040", 110.0, 1), &prices, &table);
        assert_eq!(v.status, PriceStatus::Match);
        assert_eq!(v.matched_multiplier.as_deref(), Some("Basic (1)"));
        // 143 would match Thiqa, but Basic is pinned
        let v = check_line(&line("10040", 143.0, 1), &prices, &table);
        assert_eq!(v.status, PriceStatus::Mismatch);
        assert!(v.reason.contains("Expected 110.00 for Basic (1)"));
    }

    #[test]
    fn invalid_code_short_circuits() {
        let prices = price_table();
        let table = MultiplierTable::default();
        let v = check_line(&line("00000", 999.0, 1), &prices, &table);
        assert_eq!(v.status, PriceStatus::Error);
        assert_eq!(v.category, "Invalid Code");
        assert_eq!(v.expected_price, None);
    }

    #[test]
    fn unknown_code_and_zero_price_not_found() {
        let prices = price_table();
        let table = MultiplierTable::default();
        assert_eq!(
            check_line(&line("99999", 50.0, 1), &prices, &table).status,
            PriceStatus::NotFound
        );
        // 90834 is listed but has zero base price
        assert_eq!(
            check_line(&line("90834", 50.0, 1), &prices, &table).status,
            PriceStatus::NotFound
        );
    }

    #[test]
    fn no_category_reported_not_found_with_reference_price() {
        let rows: Vec<Vec<String>> = vec![
            vec!["Code".into(), "Name".into(), "Price".into()],
            vec!["90834".into(), "Psychotherapy".into(), "80".into()],
        ];
        let prices = PriceList::from_rows(&rows).unwrap();
        let table = MultiplierTable::default();
        let v = check_line(&line("90834", 80.0, 2), &prices, &table);
        assert_eq!(v.status, PriceStatus::NotFound);
        assert_eq!(v.category, "No Category");
        assert_eq!(v.expected_price, Some(160.0));
    }

    #[test]
    fn price_list_last_row_wins_and_search() {
        let prices = price_table();
        assert_eq!(prices.get("10040").unwrap().base_price, 110.0);
        assert_eq!(prices.len(), 5);

        let hits = prices.search("x-ray", 50);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].code, "73000");
        assert_eq!(prices.search("1004", 50).len(), 2);
        assert!(prices.search("", 50).is_empty());
    }

    #[test]
    fn price_list_missing_code_column_is_fatal() {
        let rows: Vec<Vec<String>> = vec![
            vec!["Item".into(), "Price".into()],
            vec!["10040".into(), "100".into()],
        ];
        let err = PriceList::from_rows(&rows).unwrap_err();
        assert!(matches!(err, AuditError::MissingColumn { .. }));
    }

    #[test]
    fn multiplier_table_from_toml() {
        let toml = r#"
[[category]]
name = "Medical"
thiqa = 1.5
low_end = 1.1
basic = 1.0
active = "thiqa"

[[category]]
name = "OP E&M"
thiqa = 1.3
low_end = 1.08
basic = 1.0
"#;
        let table = MultiplierTable::from_toml(toml).unwrap();
        let medical = table.rates(CodeCategory::Medical).unwrap();
        assert_eq!(medical.thiqa, 1.5);
        assert_eq!(
            table.active_for(CodeCategory::Medical),
            Some(MultiplierKind::Thiqa)
        );
        assert_eq!(table.active_for(CodeCategory::OpEm), None);
        // unmentioned categories keep defaults
        assert_eq!(table.rates(CodeCategory::Radiology).unwrap().thiqa, 1.0);

        assert!(MultiplierTable::from_toml("[[category]]\nname = \"Dental\"\nthiqa = 1.0\nlow_end = 1.0\nbasic = 1.0").is_err());
    }

    #[test]
    fn summary_counts() {
        let prices = price_table();
        let table = MultiplierTable::default();
        let lines = vec![
            line("10040", 143.0, 1), // Thiqa match
            line("10040", 999.0, 1), // mismatch
            line("99999", 10.0, 1),  // not found
            line("00000", 10.0, 1),  // error
        ];
        let verdicts = reconcile_lines(&lines, &prices, &table);
        let summary = PriceSummary::from_verdicts(&verdicts);
        assert_eq!(summary.total, 4);
        assert_eq!(summary.matches, 1);
        assert_eq!(summary.mismatches, 1);
        assert_eq!(summary.not_found, 1);
        assert_eq!(summary.errors, 1);
    }
}
