//! Canonical forms for the three join-key fields shared by both pipelines.
//!
//! Source exports disagree on member-ID padding, date formats, and VOI
//! spelling ("VOI_D" vs "VOID"). Everything is normalized once, at the edge,
//! so the matching keys compare byte-for-byte.

use chrono::NaiveDate;

/// Strip leading zeros from a member/card number.
///
/// All-zero input collapses to "0"; null-ish input stays "".
pub fn normalize_member_id(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return String::new();
    }
    let stripped = trimmed.trim_start_matches('0').trim();
    if stripped.is_empty() {
        "0".to_string()
    } else {
        stripped.to_string()
    }
}

/// Normalize a raw date value to "YYYY-MM-DD".
///
/// Accepts D/M/Y and D-M-Y (2- or 4-digit year, 2-digit assumed 2000+),
/// D-MMM-YYYY, and ISO-ish forms. A trailing time component separated by
/// whitespace is dropped first. Never fails: wholly unparseable input is
/// returned trimmed but otherwise unchanged, empty input returns "".
pub fn normalize_date(raw: &str) -> String {
    let s = raw.trim();
    if s.is_empty() {
        return String::new();
    }

    // "15/03/2024 10:30" → "15/03/2024"
    let date_only = s.split_whitespace().next().unwrap_or(s);

    if let Some(date) = parse_day_first(date_only) {
        return date.format("%Y-%m-%d").to_string();
    }
    if let Some(date) = parse_month_abbrev(date_only) {
        return date.format("%Y-%m-%d").to_string();
    }
    if let Some(date) = parse_generic(date_only) {
        return date.format("%Y-%m-%d").to_string();
    }

    s.to_string()
}

/// Uppercase and strip underscores/whitespace, so "VOI_D" ≡ "VOID" and
/// "VOI_EF1" ≡ "VOIEF1".
pub fn normalize_voi(raw: &str) -> String {
    raw.chars()
        .filter(|c| *c != '_' && !c.is_whitespace())
        .flat_map(|c| c.to_uppercase())
        .collect()
}

/// D/M/Y or D-M-Y with 2- or 4-digit year. Day-first: regional exports in
/// this domain are DD/MM/YYYY.
fn parse_day_first(s: &str) -> Option<NaiveDate> {
    let parts: Vec<&str> = s.split(['/', '-']).collect();
    if parts.len() != 3 {
        return None;
    }
    let day = parse_digits(parts[0], 1, 2)?;
    let month = parse_digits(parts[1], 1, 2)?;
    let mut year = parse_digits(parts[2], 2, 4)? as i32;
    if parts[2].len() == 2 {
        year += 2000;
    }
    NaiveDate::from_ymd_opt(year, month, day)
}

/// D-MMM-YYYY, e.g. "11-Aug-2025".
fn parse_month_abbrev(s: &str) -> Option<NaiveDate> {
    let parts: Vec<&str> = s.split('-').collect();
    if parts.len() != 3 {
        return None;
    }
    let day = parse_digits(parts[0], 1, 2)?;
    let month = month_from_abbrev(parts[1])?;
    let year = parse_digits(parts[2], 4, 4)? as i32;
    NaiveDate::from_ymd_opt(year, month, day)
}

fn parse_generic(s: &str) -> Option<NaiveDate> {
    for fmt in ["%Y-%m-%d", "%Y/%m/%d"] {
        if let Ok(date) = NaiveDate::parse_from_str(s, fmt) {
            return Some(date);
        }
    }
    // ISO timestamps attached with 'T' (not stripped by the whitespace split)
    for fmt in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(dt) = chrono::NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt.date());
        }
    }
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(s) {
        return Some(dt.date_naive());
    }
    None
}

fn parse_digits(s: &str, min_len: usize, max_len: usize) -> Option<u32> {
    if s.len() < min_len || s.len() > max_len || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

fn month_from_abbrev(s: &str) -> Option<u32> {
    const MONTHS: [&str; 12] = [
        "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
    ];
    let lower = s.to_lowercase();
    MONTHS
        .iter()
        .position(|m| *m == lower)
        .map(|i| i as u32 + 1)
}
