use serde::Serialize;

/// Multiplier category for a CPT/service code, derived from its prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum CodeCategory {
    Medical,
    Radiology,
    Laboratory,
    Physiotherapy,
    OpEm,
}

impl CodeCategory {
    pub const ALL: [CodeCategory; 5] = [
        Self::Medical,
        Self::Radiology,
        Self::Laboratory,
        Self::Physiotherapy,
        Self::OpEm,
    ];
}

impl std::fmt::Display for CodeCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Medical => write!(f, "Medical"),
            Self::Radiology => write!(f, "Radiology"),
            Self::Laboratory => write!(f, "Laboratory"),
            Self::Physiotherapy => write!(f, "Physiotherapy"),
            Self::OpEm => write!(f, "OP E&M"),
        }
    }
}

/// Classify a service code by prefix.
///
/// Precedence matters: "97" (Physiotherapy) and "99" (OP E&M) are checked
/// before the generic leading-digit rules, and "96" is an explicit Medical
/// exception inside the 9x range. Codes outside every rule get no category
/// and cannot be price-validated through the multiplier table.
pub fn code_category(code: &str) -> Option<CodeCategory> {
    if code.is_empty() {
        return None;
    }
    if code.starts_with("97") {
        return Some(CodeCategory::Physiotherapy);
    }
    if code.starts_with("99") {
        return Some(CodeCategory::OpEm);
    }
    if code.starts_with("96") {
        return Some(CodeCategory::Medical);
    }
    match code.as_bytes()[0] {
        b'1'..=b'6' => Some(CodeCategory::Medical),
        b'7' => Some(CodeCategory::Radiology),
        b'8' => Some(CodeCategory::Laboratory),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leading_digit_rules() {
        assert_eq!(code_category("10040"), Some(CodeCategory::Medical));
        assert_eq!(code_category("64715"), Some(CodeCategory::Medical));
        assert_eq!(code_category("73000"), Some(CodeCategory::Radiology));
        assert_eq!(code_category("80050"), Some(CodeCategory::Laboratory));
    }

    #[test]
    fn nine_range_precedence() {
        // 97 before the generic rules, 99 E&M, 96 explicit Medical exception
        assert_eq!(code_category("97110"), Some(CodeCategory::Physiotherapy));
        assert_eq!(code_category("99213"), Some(CodeCategory::OpEm));
        assert_eq!(code_category("96372"), Some(CodeCategory::Medical));
        // other 9x codes have no category
        assert_eq!(code_category("90834"), None);
    }

    #[test]
    fn unclassifiable_codes() {
        assert_eq!(code_category(""), None);
        assert_eq!(code_category("A4550"), None);
        assert_eq!(code_category("0001U"), None);
    }
}
