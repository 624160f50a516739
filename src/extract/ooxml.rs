//! Office Open XML extractors (DOCX, PPTX, XLSX).
//!
//! Each format is a ZIP of XML parts; text lives in `w:t` (Word), `a:t`
//! (DrawingML, used by slides) and `<v>`/`<is>` cells plus the shared-string
//! table (spreadsheets). Entries are read with a decompressed-size cap.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::fs::File;
use std::io::{Read, Seek};
use std::path::Path;

use super::{ExtractError, Extractor};

const XLSX_MAX_SHEETS: usize = 100;
const XLSX_MAX_CELLS_PER_SHEET: usize = 100_000;
/// Zip-bomb guard for a single entry.
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

pub struct DocxExtractor;

impl Extractor for DocxExtractor {
    fn name(&self) -> &'static str {
        "docx"
    }

    fn extract(&self, path: &Path) -> Result<String, ExtractError> {
        docx_text(File::open(path)?)
    }
}

pub struct PptxExtractor;

impl Extractor for PptxExtractor {
    fn name(&self) -> &'static str {
        "pptx"
    }

    fn extract(&self, path: &Path) -> Result<String, ExtractError> {
        pptx_text(File::open(path)?)
    }
}

pub struct XlsxExtractor;

impl Extractor for XlsxExtractor {
    fn name(&self) -> &'static str {
        "xlsx"
    }

    fn extract(&self, path: &Path) -> Result<String, ExtractError> {
        xlsx_text(File::open(path)?)
    }
}

fn ooxml_err(e: impl std::fmt::Display) -> ExtractError {
    ExtractError::Ooxml(e.to_string())
}

fn open_archive<R: Read + Seek>(reader: R) -> Result<zip::ZipArchive<R>, ExtractError> {
    zip::ZipArchive::new(reader).map_err(ooxml_err)
}

fn read_entry<R: Read + Seek>(
    archive: &mut zip::ZipArchive<R>,
    name: &str,
) -> Result<Vec<u8>, ExtractError> {
    let entry = archive.by_name(name).map_err(ooxml_err)?;
    let mut out = Vec::new();
    entry
        .take(MAX_XML_ENTRY_BYTES)
        .read_to_end(&mut out)
        .map_err(ooxml_err)?;
    if out.len() as u64 >= MAX_XML_ENTRY_BYTES {
        return Err(ExtractError::Ooxml(format!(
            "ZIP entry {} exceeds size limit ({} bytes)",
            name, MAX_XML_ENTRY_BYTES
        )));
    }
    Ok(out)
}

/// Part names under `prefix` ending in `<n>.xml`, sorted by `n`.
fn numbered_parts<R: Read + Seek>(archive: &zip::ZipArchive<R>, prefix: &str) -> Vec<String> {
    let mut names: Vec<String> = archive
        .file_names()
        .filter(|n| n.starts_with(prefix) && n.ends_with(".xml"))
        .map(str::to_string)
        .collect();
    names.sort_by_key(|name| {
        name.trim_start_matches(prefix)
            .trim_end_matches(".xml")
            .parse::<u32>()
            .unwrap_or(u32::MAX)
    });
    names
}

pub(crate) fn docx_text<R: Read + Seek>(reader: R) -> Result<String, ExtractError> {
    let mut archive = open_archive(reader)?;
    let xml = read_entry(&mut archive, "word/document.xml")?;

    let mut reader = Reader::from_reader(xml.as_slice());
    let mut buf = Vec::new();
    let mut out = String::new();
    let mut in_text = false;

    loop {
        match reader.read_event_into(&mut buf).map_err(ooxml_err)? {
            Event::Start(e) if e.local_name().as_ref() == b"t" => in_text = true,
            Event::End(e) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"p" => out.push('\n'),
                _ => {}
            },
            Event::Empty(e) => match e.local_name().as_ref() {
                b"tab" => out.push('\t'),
                b"br" | b"cr" => out.push('\n'),
                _ => {}
            },
            Event::Text(t) if in_text => out.push_str(&t.unescape().map_err(ooxml_err)?),
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(out.trim_end().to_string())
}

pub(crate) fn pptx_text<R: Read + Seek>(reader: R) -> Result<String, ExtractError> {
    let mut archive = open_archive(reader)?;
    let slides = numbered_parts(&archive, "ppt/slides/slide");
    if slides.is_empty() {
        return Err(ExtractError::Ooxml("no slides found".to_string()));
    }

    let mut blocks = Vec::new();
    for name in slides {
        let xml = read_entry(&mut archive, &name)?;
        let text = slide_text(&xml)?;
        if !text.is_empty() {
            blocks.push(text);
        }
    }
    Ok(blocks.join("\n\n"))
}

/// Paragraph-separated `a:t` runs of one slide.
fn slide_text(xml: &[u8]) -> Result<String, ExtractError> {
    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut paragraphs: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut in_text = false;

    loop {
        match reader.read_event_into(&mut buf).map_err(ooxml_err)? {
            Event::Start(e) if e.local_name().as_ref() == b"t" => in_text = true,
            Event::End(e) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"p" => {
                    let line = current.trim();
                    if !line.is_empty() {
                        paragraphs.push(line.to_string());
                    }
                    current.clear();
                }
                _ => {}
            },
            Event::Text(t) if in_text => current.push_str(&t.unescape().map_err(ooxml_err)?),
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    if !current.trim().is_empty() {
        paragraphs.push(current.trim().to_string());
    }
    Ok(paragraphs.join("\n"))
}

pub(crate) fn xlsx_text<R: Read + Seek>(reader: R) -> Result<String, ExtractError> {
    let mut archive = open_archive(reader)?;

    let shared = match read_entry(&mut archive, "xl/sharedStrings.xml") {
        Ok(xml) => shared_strings(&xml)?,
        Err(_) => Vec::new(),
    };

    let sheets = numbered_parts(&archive, "xl/worksheets/sheet");
    if sheets.is_empty() {
        return Err(ExtractError::Ooxml("no worksheets found".to_string()));
    }

    let mut blocks = Vec::new();
    for name in sheets.into_iter().take(XLSX_MAX_SHEETS) {
        let xml = read_entry(&mut archive, &name)?;
        let text = sheet_text(&xml, &shared)?;
        if !text.is_empty() {
            blocks.push(text);
        }
    }
    Ok(blocks.join("\n\n"))
}

/// One string per `<si>`, rich-text runs concatenated, phonetic hints skipped.
fn shared_strings(xml: &[u8]) -> Result<Vec<String>, ExtractError> {
    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut strings = Vec::new();
    let mut current = String::new();
    let mut in_text = false;
    let mut in_phonetic = false;

    loop {
        match reader.read_event_into(&mut buf).map_err(ooxml_err)? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"si" => current.clear(),
                b"rPh" => in_phonetic = true,
                b"t" => in_text = !in_phonetic,
                _ => {}
            },
            Event::End(e) => match e.local_name().as_ref() {
                b"si" => strings.push(std::mem::take(&mut current)),
                b"rPh" => in_phonetic = false,
                b"t" => in_text = false,
                _ => {}
            },
            Event::Empty(e) if e.local_name().as_ref() == b"si" => strings.push(String::new()),
            Event::Text(t) if in_text => current.push_str(&t.unescape().map_err(ooxml_err)?),
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(strings)
}

#[derive(Clone, Copy, PartialEq)]
enum CellType {
    Shared,
    Inline,
    Other,
}

fn cell_type(e: &BytesStart<'_>) -> CellType {
    for attr in e.attributes().flatten() {
        if attr.key.as_ref() == b"t" {
            return match attr.value.as_ref() {
                b"s" => CellType::Shared,
                b"inlineStr" => CellType::Inline,
                _ => CellType::Other,
            };
        }
    }
    CellType::Other
}

/// Tab-separated cells, one line per non-empty row.
fn sheet_text(xml: &[u8], shared: &[String]) -> Result<String, ExtractError> {
    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut rows: Vec<String> = Vec::new();
    let mut row: Vec<String> = Vec::new();
    let mut value = String::new();
    let mut kind = CellType::Other;
    let mut in_value = false;
    let mut in_inline = false;
    let mut cells = 0usize;

    loop {
        if cells >= XLSX_MAX_CELLS_PER_SHEET {
            tracing::warn!(limit = XLSX_MAX_CELLS_PER_SHEET, "worksheet truncated at cell limit");
            break;
        }
        match reader.read_event_into(&mut buf).map_err(ooxml_err)? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"c" => {
                    kind = cell_type(&e);
                    value.clear();
                }
                b"v" => in_value = true,
                b"t" if kind == CellType::Inline => in_inline = true,
                _ => {}
            },
            Event::End(e) => match e.local_name().as_ref() {
                b"v" => in_value = false,
                b"t" => in_inline = false,
                b"c" => {
                    let raw = value.trim();
                    let resolved = match kind {
                        CellType::Shared => raw
                            .parse::<usize>()
                            .ok()
                            .and_then(|i| shared.get(i))
                            .cloned()
                            .unwrap_or_default(),
                        _ => raw.to_string(),
                    };
                    if !resolved.is_empty() {
                        row.push(resolved);
                        cells += 1;
                    }
                    kind = CellType::Other;
                }
                b"row" => {
                    if !row.is_empty() {
                        rows.push(row.join("\t"));
                    }
                    row.clear();
                }
                _ => {}
            },
            Event::Text(t) if in_value || in_inline => {
                value.push_str(&t.unescape().map_err(ooxml_err)?)
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    if !row.is_empty() {
        rows.push(row.join("\t"));
    }
    Ok(rows.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};
    use zip::write::SimpleFileOptions;

    fn zip_of(entries: &[(&str, &str)]) -> Cursor<Vec<u8>> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        for (name, body) in entries {
            writer.start_file(*name, SimpleFileOptions::default()).unwrap();
            writer.write_all(body.as_bytes()).unwrap();
        }
        let mut cursor = writer.finish().unwrap();
        cursor.set_position(0);
        cursor
    }

    #[test]
    fn docx_keeps_paragraphs_and_spaces() {
        let doc = r#"<w:document xmlns:w="w"><w:body>
            <w:p><w:r><w:t>Hello</w:t></w:r><w:r><w:t xml:space="preserve"> world &amp; all</w:t></w:r></w:p>
            <w:p><w:r><w:t>Second</w:t><w:tab/><w:t>line</w:t></w:r></w:p>
        </w:body></w:document>"#;
        let text = docx_text(zip_of(&[("word/document.xml", doc)])).unwrap();
        assert_eq!(text, "Hello world & all\nSecond\tline");
    }

    #[test]
    fn docx_without_document_part_errors() {
        let err = docx_text(zip_of(&[("word/other.xml", "<x/>")])).unwrap_err();
        assert!(matches!(err, ExtractError::Ooxml(_)));
    }

    #[test]
    fn pptx_orders_slides_numerically() {
        let slide = |s: &str| {
            format!(
                r#"<p:sld xmlns:a="a" xmlns:p="p"><a:p><a:r><a:t>{}</a:t></a:r></a:p></p:sld>"#,
                s
            )
        };
        let s1 = slide("one");
        let s2 = slide("two");
        let s10 = slide("ten");
        let text = pptx_text(zip_of(&[
            ("ppt/slides/slide10.xml", &s10),
            ("ppt/slides/slide2.xml", &s2),
            ("ppt/slides/slide1.xml", &s1),
        ]))
        .unwrap();
        assert_eq!(text, "one\n\ntwo\n\nten");
    }

    #[test]
    fn xlsx_resolves_shared_and_inline_strings() {
        let shared = r#"<sst><si><t>Name</t></si><si><r><t>Ka</t></r><r><t>vya</t></r><rPh><t>kana</t></rPh></si></sst>"#;
        let sheet = r#"<worksheet><sheetData>
            <row r="1"><c r="A1" t="s"><v>0</v></c><c r="B1" t="inlineStr"><is><t>Score</t></is></c></row>
            <row r="2"><c r="A2" t="s"><v>1</v></c><c r="B2"><v>42</v></c></row>
            <row r="3"></row>
        </sheetData></worksheet>"#;
        let text = xlsx_text(zip_of(&[
            ("xl/sharedStrings.xml", shared),
            ("xl/worksheets/sheet1.xml", sheet),
        ]))
        .unwrap();
        assert_eq!(text, "Name\tScore\nKavya\t42");
    }

    #[test]
    fn xlsx_without_shared_strings_still_reads_values() {
        let sheet = r#"<worksheet><sheetData><row><c><v>3.5</v></c></row></sheetData></worksheet>"#;
        let text = xlsx_text(zip_of(&[("xl/worksheets/sheet1.xml", sheet)])).unwrap();
        assert_eq!(text, "3.5");
    }

    #[test]
    fn not_a_zip_is_an_ooxml_error() {
        let err = xlsx_text(Cursor::new(b"plain text".to_vec())).unwrap_err();
        assert!(matches!(err, ExtractError::Ooxml(_)));
    }
}
