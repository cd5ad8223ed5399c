//! Optional modifier-requirement mapping: which procedure codes require
//! which modifier. Two row layouts exist in the wild and are auto-detected
//! from the header (or first data row when the header is unlabeled).

use std::collections::BTreeMap;

use crate::error::AuditError;

/// Modifier number → ordered, de-duplicated set of procedure codes.
#[derive(Debug, Clone, Default)]
pub struct ModifierCodeMap {
    map: BTreeMap<String, Vec<String>>,
}

impl ModifierCodeMap {
    /// Parse from a raw table. Layouts:
    /// - code-then-modifier-text: `10040 | "25 Modifiers"` — modifier numbers
    ///   (24/25/50/52) harvested from the text by substring;
    /// - modifier-then-code: `25 | 10040`.
    pub fn from_rows(rows: &[Vec<String>]) -> Result<Self, AuditError> {
        if rows.is_empty() {
            return Err(AuditError::EmptyTable {
                source_name: "modifier codes".into(),
            });
        }

        let header_1 = cell(&rows[0], 1).to_lowercase();
        let first_data_1 = rows
            .get(1)
            .map(|r| cell(r, 1).to_lowercase())
            .unwrap_or_default();

        let code_then_modifier =
            header_1.contains("modifier") || first_data_1.contains("modifier");

        let mut out = Self::default();
        if code_then_modifier {
            for row in &rows[1..] {
                let code = cell(row, 0).trim();
                let modifier_text = cell(row, 1).trim().to_lowercase();
                if code.is_empty() || modifier_text.is_empty() {
                    continue;
                }
                for modifier in ["25", "50", "24", "52"] {
                    if modifier_text.contains(modifier) {
                        out.insert(modifier, code);
                    }
                }
            }
        } else {
            for row in &rows[1..] {
                let modifier = cell(row, 0).trim();
                let code = cell(row, 1).trim();
                if modifier.is_empty() || code.is_empty() {
                    continue;
                }
                out.insert(modifier, code);
            }
        }
        Ok(out)
    }

    fn insert(&mut self, modifier: &str, code: &str) {
        let codes = self.map.entry(modifier.to_string()).or_default();
        if !codes.iter().any(|c| c == code) {
            codes.push(code.to_string());
        }
    }

    pub fn codes_for(&self, modifier: &str) -> &[String] {
        self.map.get(modifier).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn contains(&self, modifier: &str, code: &str) -> bool {
        self.codes_for(modifier).iter().any(|c| c == code)
    }

    pub fn is_empty(&self) -> bool {
        self.map.values().all(Vec::is_empty)
    }

    /// Test/config convenience: build directly from (modifier, codes) pairs.
    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a [&'a str])>) -> Self {
        let mut out = Self::default();
        for (modifier, codes) in pairs {
            for code in codes {
                out.insert(modifier, code);
            }
        }
        out
    }
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

    #[test]
    fn code_then_modifier_text_layout() {
        let rows = table(&[
            &["Code", "Modifier Type"],
            &["10040", "25 Modifiers"],
            &["10060", "25 Modifiers"],
            &["64715", "24 and 25 Modifiers"],
            &["", "25 Modifiers"],
        ]);
        let map = ModifierCodeMap::from_rows(&rows).unwrap();
        assert_eq!(map.codes_for("25"), ["10040", "10060", "64715"]);
        assert_eq!(map.codes_for("24"), ["64715"]);
        assert!(map.codes_for("52").is_empty());
    }

    #[test]
    fn modifier_then_code_layout() {
        let rows = table(&[
            &["Modifier", "Code"],
            &["25", "10040"],
            &["25", "10040"],
            &["52", "73000"],
        ]);
        let map = ModifierCodeMap::from_rows(&rows).unwrap();
        // duplicates collapse
        assert_eq!(map.codes_for("25"), ["10040"]);
        assert_eq!(map.codes_for("52"), ["73000"]);
    }

    #[test]
    fn layout_detected_from_data_row_when_header_unlabeled() {
        let rows = table(&[&["A", "B"], &["10040", "25 Modifiers"]]);
        let map = ModifierCodeMap::from_rows(&rows).unwrap();
        assert_eq!(map.codes_for("25"), ["10040"]);
    }

    #[test]
    fn empty_table_is_fatal() {
        let err = ModifierCodeMap::from_rows(&[]).unwrap_err();
        assert!(matches!(err, AuditError::EmptyTable { .. }));
    }
}
