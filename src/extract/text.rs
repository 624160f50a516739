use std::path::Path;

use super::{ExtractError, Extractor};

/// Reads the file as UTF-8, replacing invalid sequences.
pub struct PlainTextExtractor;

impl Extractor for PlainTextExtractor {
    fn name(&self) -> &'static str {
        "plain-text"
    }

    fn extract(&self, path: &Path) -> Result<String, ExtractError> {
        let bytes = std::fs::read(path)?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

/// Renders each CSV record as one line with fields joined by `" | "`.
pub struct CsvExtractor;

impl Extractor for CsvExtractor {
    fn name(&self) -> &'static str {
        "csv"
    }

    fn extract(&self, path: &Path) -> Result<String, ExtractError> {
        let bytes = std::fs::read(path)?;
        let source = String::from_utf8_lossy(&bytes);
        let source = source.trim_start_matches('\u{feff}');

        let lines: Vec<String> = parse_records(source)?
            .into_iter()
            .filter(|r| r.iter().any(|f| !f.trim().is_empty()))
            .map(|r| {
                r.iter()
                    .map(|f| f.trim())
                    .collect::<Vec<_>>()
                    .join(" | ")
            })
            .collect();
        Ok(lines.join("\n"))
    }
}

/// RFC 4180 records: quoted fields may hold commas, doubled quotes and newlines.
fn parse_records(src: &str) -> Result<Vec<Vec<String>>, ExtractError> {
    let mut records = Vec::new();
    let mut record = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = src.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    field.push('"');
                    chars.next();
                }
                '"' => in_quotes = false,
                _ => field.push(c),
            }
            continue;
        }
        match c {
            '"' if field.is_empty() => in_quotes = true,
            ',' => record.push(std::mem::take(&mut field)),
            '\r' if chars.peek() == Some(&'\n') => {}
            '\n' | '\r' => {
                record.push(std::mem::take(&mut field));
                records.push(std::mem::take(&mut record));
            }
            _ => field.push(c),
        }
    }

    if in_quotes {
        return Err(ExtractError::Csv("unterminated quoted field".to_string()));
    }
    if !field.is_empty() || !record.is_empty() {
        record.push(field);
        records.push(record);
    }
    Ok(records)
}
