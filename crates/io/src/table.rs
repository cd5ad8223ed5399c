// Tabular import (xlsx, xls, xlsb, ods, csv, tsv) and claim XML text loading
//
// One-way conversion: every supported format is flattened to rows of strings.
// Column resolution and normalization happen downstream in the engine.

use std::io::Read;
use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader};
use claimlens_engine::AuditError;

/// Load a table from disk, dispatching on file extension. Spreadsheets read
/// the first sheet only; delimited text sniffs its own delimiter.
pub fn read_table(path: &Path) -> Result<Vec<Vec<String>>, AuditError> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();

    match extension.as_str() {
        "xlsx" | "xls" | "xlsb" | "ods" => read_spreadsheet(path),
        "csv" | "tsv" | "txt" => read_delimited(path),
        other => Err(AuditError::Io(format!(
            "unsupported table format: .{other} ({})",
            path.display()
        ))),
    }
}

/// Read a file as UTF-8, falling back to Windows-1252 (common for
/// Excel-exported CSVs and legacy claim XML dumps).
pub fn read_text(path: &Path) -> Result<String, AuditError> {
    let io_err = |e: std::io::Error| AuditError::Io(format!("{}: {e}", path.display()));
    let mut file = std::fs::File::open(path).map_err(io_err)?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes).map_err(io_err)?;

    // Strict UTF-8 first; the error hands the buffer back for the
    // legacy-codepage retry
    match String::from_utf8(bytes) {
        Ok(s) => Ok(s),
        Err(e) => {
            let bytes = e.into_bytes();
            let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(&bytes);
            Ok(decoded.into_owned())
        }
    }
}

fn read_spreadsheet(path: &Path) -> Result<Vec<Vec<String>>, AuditError> {
    let mut workbook = open_workbook_auto(path)
        .map_err(|e| AuditError::Io(format!("{}: {e}", path.display())))?;
    let sheet_name = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| AuditError::Io(format!("{}: workbook has no sheets", path.display())))?;
    let range = workbook
        .worksheet_range(&sheet_name)
        .map_err(|e| AuditError::Io(format!("{}: {e}", path.display())))?;

    let mut rows = Vec::with_capacity(range.height());
    for row in range.rows() {
        rows.push(row.iter().map(cell_to_string).collect());
    }
    Ok(rows)
}

fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Float(n) => {
            // Integers without decimals
            if n.fract() == 0.0 && n.abs() < 1e15 {
                format!("{}", *n as i64)
            } else {
                format!("{n}")
            }
        }
        Data::Int(n) => format!("{n}"),
        Data::Bool(b) => (if *b { "TRUE" } else { "FALSE" }).to_string(),
        Data::Error(e) => format!("#{e:?}"),
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(when) if dt.as_f64().fract().abs() > 0.0001 => {
                when.format("%Y-%m-%d %H:%M:%S").to_string()
            }
            Some(when) => when.format("%Y-%m-%d").to_string(),
            None => format!("{}", dt.as_f64()),
        },
        Data::DateTimeIso(s) | Data::DurationIso(s) => s.clone(),
    }
}

fn read_delimited(path: &Path) -> Result<Vec<Vec<String>>, AuditError> {
    let content = read_text(path)?;
    let delimiter = sniff_delimiter(&content);

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .from_reader(content.as_bytes());

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result.map_err(|e| AuditError::Io(format!("{}: {e}", path.display())))?;
        rows.push(record.iter().map(str::to_string).collect());
    }
    Ok(rows)
}

/// Pick the most plausible field delimiter for a delimited-text sample.
///
/// Each candidate is scored over the first ten lines: number of lines that
/// agree with line one's field count, weighted by that count, so a candidate
/// splitting every line into many columns beats one that only splits a few.
/// A candidate that cannot split line one at all is out. Comma on no winner.
fn sniff_delimiter(content: &str) -> u8 {
    const CANDIDATES: [u8; 4] = [b'\t', b';', b',', b'|'];
    let sample: Vec<&str> = content.lines().take(10).collect();

    let mut best = b',';
    let mut best_score = 0u64;
    for delim in CANDIDATES {
        let counts: Vec<usize> = sample
            .iter()
            .map(|line| count_fields(line, delim))
            .collect();
        let first = match counts.first() {
            Some(&n) if n > 1 => n,
            _ => continue,
        };

        let agreeing = counts.iter().filter(|&&c| c == first).count() as u64;
        let score = agreeing * first as u64;
        if score > best_score {
            best_score = score;
            best = delim;
        }
    }
    best
}

/// Field count of one line under a candidate delimiter, quote-aware so a
/// comma inside a quoted field does not inflate the comma candidate.
fn count_fields(line: &str, delimiter: u8) -> usize {
    csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .from_reader(line.as_bytes())
        .records()
        .next()
        .and_then(|r| r.ok())
        .map(|r| r.len())
        .unwrap_or(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn reads_csv_with_sniffed_delimiter() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("elig.csv");
        fs::write(&path, "Card Number;Ordered On;Clinician\n00123;15/03/2024;DR SMITH\n").unwrap();

        let rows = read_table(&path).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0], ["Card Number", "Ordered On", "Clinician"]);
        assert_eq!(rows[1][0], "00123");
    }

    #[test]
    fn reads_tsv() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("prices.tsv");
        fs::write(&path, "Code\tPrice\n10040\t100\n").unwrap();

        let rows = read_table(&path).unwrap();
        assert_eq!(rows[1], ["10040", "100"]);
    }

    #[test]
    fn unsupported_extension_is_io_error() {
        let err = read_table(Path::new("claims.pdf")).unwrap_err();
        assert!(matches!(err, AuditError::Io(_)));
    }

    #[test]
    fn read_text_recovers_windows_1252() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("claims.xml");
        // 0xE9 is é in Windows-1252, invalid as standalone UTF-8
        fs::write(&path, b"<Claim>Jos\xE9</Claim>").unwrap();

        let text = read_text(&path).unwrap();
        assert_eq!(text, "<Claim>José</Claim>");
    }

    #[test]
    fn sniffer_prefers_consistent_delimiter() {
        assert_eq!(sniff_delimiter("a,b,c\nd,e,f\n"), b',');
        assert_eq!(sniff_delimiter("a|b|c\nd|e|f\n"), b'|');
        // quoted comma does not fool the pipe count
        assert_eq!(sniff_delimiter("a|\"b,x\"|c\nd|e|f\n"), b'|');
    }

    #[test]
    fn sniffer_defaults_to_comma() {
        assert_eq!(sniff_delimiter(""), b',');
        // no candidate splits a single-column file
        assert_eq!(sniff_delimiter("one\ntwo\nthree\n"), b',');
    }
}
