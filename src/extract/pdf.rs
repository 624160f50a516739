//! PDF extraction strategies, from cheapest to most expensive.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use super::image::ocr_image;
use super::tools::run_capture;
use super::{ExtractError, Extractor};

/// Rendering resolution for OCR, in DPI.
const OCR_DPI: &str = "300";

/// Pure-Rust text layer extraction via the `pdf-extract` crate.
pub struct PdfExtractCrate;

impl Extractor for PdfExtractCrate {
    fn name(&self) -> &'static str {
        "pdf-extract"
    }

    fn extract(&self, path: &Path) -> Result<String, ExtractError> {
        let bytes = std::fs::read(path)?;
        pdf_extract::extract_text_from_mem(&bytes).map_err(|e| ExtractError::Pdf(e.to_string()))
    }
}

/// Page-by-page text extraction through `lopdf`'s content stream decoder.
pub struct LopdfExtractor;

impl Extractor for LopdfExtractor {
    fn name(&self) -> &'static str {
        "lopdf"
    }

    fn extract(&self, path: &Path) -> Result<String, ExtractError> {
        let doc = lopdf::Document::load(path).map_err(|e| ExtractError::Pdf(e.to_string()))?;
        let pages: Vec<u32> = doc.get_pages().keys().copied().collect();
        if pages.is_empty() {
            return Err(ExtractError::Pdf("document has no pages".to_string()));
        }
        doc.extract_text(&pages)
            .map_err(|e| ExtractError::Pdf(e.to_string()))
    }
}

/// Poppler's `pdftotext`, layout-preserving.
pub struct PdftotextExtractor {
    program: String,
}

impl PdftotextExtractor {
    pub fn new(program: &str) -> Self {
        Self {
            program: program.to_string(),
        }
    }
}

impl Extractor for PdftotextExtractor {
    fn name(&self) -> &'static str {
        "pdftotext"
    }

    fn extract(&self, path: &Path) -> Result<String, ExtractError> {
        let args: [&OsStr; 5] = [
            OsStr::new("-layout"),
            OsStr::new("-enc"),
            OsStr::new("UTF-8"),
            path.as_os_str(),
            OsStr::new("-"),
        ];
        run_capture("pdftotext", &self.program, args)
    }
}

/// Render every page with `pdftoppm` and OCR the images with `tesseract`.
pub struct PdfOcrExtractor {
    pdftoppm: String,
    tesseract: String,
    languages: String,
}

impl PdfOcrExtractor {
    pub fn new(pdftoppm: &str, tesseract: &str, languages: &str) -> Self {
        Self {
            pdftoppm: pdftoppm.to_string(),
            tesseract: tesseract.to_string(),
            languages: languages.to_string(),
        }
    }
}

impl Extractor for PdfOcrExtractor {
    fn name(&self) -> &'static str {
        "ocr"
    }

    fn extract(&self, path: &Path) -> Result<String, ExtractError> {
        let workdir = tempfile::tempdir()?;
        let prefix = workdir.path().join("page");

        let args: [&OsStr; 5] = [
            OsStr::new("-r"),
            OsStr::new(OCR_DPI),
            OsStr::new("-png"),
            path.as_os_str(),
            prefix.as_os_str(),
        ];
        run_capture("pdftoppm", &self.pdftoppm, args)?;

        let pages = rendered_pages(workdir.path())?;
        if pages.is_empty() {
            return Err(ExtractError::ToolFailed {
                tool: "pdftoppm".to_string(),
                message: "no pages rendered".to_string(),
            });
        }
        tracing::debug!(pages = pages.len(), "running OCR over rendered pages");

        let mut out = Vec::with_capacity(pages.len());
        for page in &pages {
            let text = ocr_image(&self.tesseract, page, &self.languages)?;
            if !text.trim().is_empty() {
                out.push(text.trim().to_string());
            }
        }
        Ok(out.join("\n\n"))
    }
}

/// `page-<n>.png` files in page order.
fn rendered_pages(dir: &Path) -> Result<Vec<PathBuf>, ExtractError> {
    let mut pages: Vec<(u32, PathBuf)> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("png"))
        .map(|p| {
            let n = p
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(|s| s.rsplit('-').next())
                .and_then(|s| s.parse::<u32>().ok())
                .unwrap_or(u32::MAX);
            (n, p)
        })
        .collect();
    pages.sort();
    Ok(pages.into_iter().map(|(_, p)| p).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn garbage_pdf() -> tempfile::NamedTempFile {
        let mut f = tempfile::Builder::new().suffix(".pdf").tempfile().unwrap();
        f.write_all(b"%PDF-1.4\nthis is not really a pdf").unwrap();
        f
    }

    #[test]
    fn pdf_extract_rejects_garbage() {
        let f = garbage_pdf();
        // pdf-extract may panic on malformed input; the dispatcher guards that.
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            PdfExtractCrate.extract(f.path())
        }));
        assert!(!matches!(result, Ok(Ok(ref s)) if !s.trim().is_empty()));
    }

    #[test]
    fn lopdf_rejects_garbage() {
        let f = garbage_pdf();
        assert!(matches!(LopdfExtractor.extract(f.path()), Err(ExtractError::Pdf(_))));
    }

    #[test]
    fn pages_sorted_numerically() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["page-10.png", "page-02.png", "page-1.png", "notes.txt"] {
            std::fs::write(dir.path().join(name), b"").unwrap();
        }
        let pages = rendered_pages(dir.path()).unwrap();
        let names: Vec<_> = pages
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["page-1.png", "page-02.png", "page-10.png"]);
    }

    #[test]
    fn missing_pdftotext_binary_is_tool_missing() {
        let f = garbage_pdf();
        let extractor = PdftotextExtractor::new("definitely-not-pdftotext-9917");
        assert!(matches!(
            extractor.extract(f.path()),
            Err(ExtractError::ToolMissing(_))
        ));
    }
}
