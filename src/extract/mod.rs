//! Multi-format text extraction with cascading fallback extractors.
//!
//! Every upload is classified once into a [`FileKind`]. The
//! [`ExtractorRegistry`] maps each kind to an ordered chain of [`Extractor`]s,
//! built a single time at startup by [`ExtractorRegistry::detect`] after
//! probing for the external tools some strategies need (poppler, tesseract).
//!
//! The [`ExtractionDispatcher`] walks the chain for a file: the first
//! extractor returning non-whitespace text wins, while errors, panics and
//! empty output are logged and the next candidate is tried. When the chain is
//! exhausted the result is [`Extraction::Failed`], which renders as the fixed
//! [`EXTRACTION_FAILED_MESSAGE`]. The dispatcher itself never fails.
//!
//! ```text
//! pdf   ─▶ pdf-extract ─▶ lopdf ─▶ pdftotext ─▶ ocr     (order from config)
//! docx  ─▶ docx
//! pptx  ─▶ pptx
//! xlsx  ─▶ xlsx
//! csv   ─▶ csv
//! image ─▶ tesseract
//! text / unknown ─▶ plain-text
//! ```

mod image;
mod ooxml;
mod pdf;
mod text;
mod tools;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use crate::config::ExtractionConfig;

pub use image::ImageOcrExtractor;
pub use ooxml::{DocxExtractor, PptxExtractor, XlsxExtractor};
pub use pdf::{LopdfExtractor, PdfExtractCrate, PdfOcrExtractor, PdftotextExtractor};
pub use text::{CsvExtractor, PlainTextExtractor};
pub use tools::ToolStatus;

pub const MIME_PDF: &str = "application/pdf";
pub const MIME_DOCX: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";
pub const MIME_PPTX: &str =
    "application/vnd.openxmlformats-officedocument.presentationml.presentation";
pub const MIME_XLSX: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

/// Returned in place of content when every extractor for a file failed.
///
/// Callers must treat this as a soft failure, not as document text.
pub const EXTRACTION_FAILED_MESSAGE: &str =
    "Could not extract text from this file. It may be encrypted, scanned without OCR support, or corrupted.";

/// Error from a single extraction strategy.
#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("PDF extraction failed: {0}")]
    Pdf(String),
    #[error("OOXML extraction failed: {0}")]
    Ooxml(String),
    #[error("CSV extraction failed: {0}")]
    Csv(String),
    #[error("{tool} failed: {message}")]
    ToolFailed { tool: String, message: String },
    #[error("{0} is not installed")]
    ToolMissing(String),
    #[error("extractor panicked: {0}")]
    Panicked(String),
}

/// A single text-extraction strategy over a file on disk.
pub trait Extractor: Send + Sync {
    /// Stable identifier, recorded alongside stored text.
    fn name(&self) -> &'static str;
    fn extract(&self, path: &Path) -> Result<String, ExtractError>;
}

/// Coarse file type, resolved once per upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    Pdf,
    Docx,
    Pptx,
    Xlsx,
    Csv,
    Image,
    Text,
    Unknown,
}

impl FileKind {
    pub const ALL: [FileKind; 8] = [
        FileKind::Pdf,
        FileKind::Docx,
        FileKind::Pptx,
        FileKind::Xlsx,
        FileKind::Csv,
        FileKind::Image,
        FileKind::Text,
        FileKind::Unknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FileKind::Pdf => "pdf",
            FileKind::Docx => "docx",
            FileKind::Pptx => "pptx",
            FileKind::Xlsx => "xlsx",
            FileKind::Csv => "csv",
            FileKind::Image => "image",
            FileKind::Text => "text",
            FileKind::Unknown => "unknown",
        }
    }

    /// Map a MIME type (parameters allowed) to a kind. Generic binary types
    /// return `None` so the caller can fall back to the file extension.
    pub fn from_mime(mime: &str) -> Option<FileKind> {
        let essence = mime
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        match essence.as_str() {
            MIME_PDF => Some(FileKind::Pdf),
            MIME_DOCX => Some(FileKind::Docx),
            MIME_PPTX => Some(FileKind::Pptx),
            MIME_XLSX => Some(FileKind::Xlsx),
            "text/csv" | "application/csv" => Some(FileKind::Csv),
            "application/json" | "application/xml" => Some(FileKind::Text),
            "" | "application/octet-stream" => None,
            m if m.starts_with("image/") => Some(FileKind::Image),
            m if m.starts_with("text/") => Some(FileKind::Text),
            _ => Some(FileKind::Unknown),
        }
    }

    pub fn from_extension(ext: &str) -> Option<FileKind> {
        let ext = ext.trim_start_matches('.').to_ascii_lowercase();
        let kind = match ext.as_str() {
            "pdf" => FileKind::Pdf,
            "docx" => FileKind::Docx,
            "pptx" => FileKind::Pptx,
            "xlsx" => FileKind::Xlsx,
            "csv" => FileKind::Csv,
            "png" | "jpg" | "jpeg" | "tif" | "tiff" | "bmp" | "gif" | "webp" => FileKind::Image,
            "txt" | "md" | "markdown" | "json" | "xml" | "html" | "htm" | "log" | "rst" => {
                FileKind::Text
            }
            _ => return None,
        };
        Some(kind)
    }

    /// Classify a free-form type hint: a MIME type, a bare or dotted
    /// extension, or a filename.
    pub fn classify(hint: &str) -> FileKind {
        let hint = hint.trim();
        if hint.contains('/') {
            if let Some(kind) = FileKind::from_mime(hint) {
                return kind;
            }
        }
        if let Some(kind) = FileKind::from_extension(hint) {
            return kind;
        }
        Path::new(hint)
            .extension()
            .and_then(|e| e.to_str())
            .and_then(FileKind::from_extension)
            .unwrap_or(FileKind::Unknown)
    }

    /// Classify an upload: declared type (MIME or extension) first, then the
    /// filename.
    pub fn from_upload(content_type: Option<&str>, filename: &str) -> FileKind {
        content_type
            .map(FileKind::classify)
            .filter(|k| *k != FileKind::Unknown)
            .or_else(|| {
                Path::new(filename)
                    .extension()
                    .and_then(|e| e.to_str())
                    .and_then(FileKind::from_extension)
            })
            .unwrap_or(FileKind::Unknown)
    }
}

impl fmt::Display for FileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FileKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FileKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| anyhow::anyhow!("unknown file kind: {}", s))
    }
}

/// A PDF extraction strategy; the configured order is the attempt order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PdfStrategy {
    PdfExtract,
    Lopdf,
    Pdftotext,
    Ocr,
}

/// One failed or empty attempt, kept for diagnostics.
#[derive(Debug, Clone, Serialize)]
pub struct Attempt {
    pub extractor: &'static str,
    pub error: String,
}

/// Result of running a file through its extractor chain.
#[derive(Debug, Clone)]
pub enum Extraction {
    Text {
        text: String,
        extractor: &'static str,
        attempts: Vec<Attempt>,
    },
    Failed {
        attempts: Vec<Attempt>,
    },
}

impl Extraction {
    pub fn is_success(&self) -> bool {
        matches!(self, Extraction::Text { .. })
    }

    pub fn extractor(&self) -> Option<&'static str> {
        match self {
            Extraction::Text { extractor, .. } => Some(extractor),
            Extraction::Failed { .. } => None,
        }
    }

    pub fn attempts(&self) -> &[Attempt] {
        match self {
            Extraction::Text { attempts, .. } | Extraction::Failed { attempts } => attempts,
        }
    }

    /// The extracted text, or [`EXTRACTION_FAILED_MESSAGE`].
    pub fn into_text(self) -> String {
        match self {
            Extraction::Text { text, .. } => text,
            Extraction::Failed { .. } => EXTRACTION_FAILED_MESSAGE.to_string(),
        }
    }
}

/// Ordered extractor chains per [`FileKind`], plus the tool probe results
/// that shaped them.
#[derive(Default)]
pub struct ExtractorRegistry {
    chains: HashMap<FileKind, Vec<Arc<dyn Extractor>>>,
    tools: Vec<ToolStatus>,
}

impl ExtractorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an extractor to the end of a kind's chain.
    pub fn register(&mut self, kind: FileKind, extractor: Arc<dyn Extractor>) -> &mut Self {
        self.chains.entry(kind).or_default().push(extractor);
        self
    }

    pub fn chain(&self, kind: FileKind) -> &[Arc<dyn Extractor>] {
        self.chains.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn tools(&self) -> &[ToolStatus] {
        &self.tools
    }

    /// Probe external tools and build every chain once.
    ///
    /// Strategies whose tool is missing are left out rather than failing at
    /// call time.
    pub fn detect(config: &ExtractionConfig) -> Self {
        let pdftotext = ToolStatus::probe("pdftotext", &config.pdftotext_bin, "-v");
        let pdftoppm = ToolStatus::probe("pdftoppm", &config.pdftoppm_bin, "-v");
        let tesseract = ToolStatus::probe("tesseract", &config.tesseract_bin, "--version");

        let mut registry = Self::new();

        for strategy in &config.pdf_order {
            let extractor: Arc<dyn Extractor> = match strategy {
                PdfStrategy::PdfExtract => Arc::new(PdfExtractCrate),
                PdfStrategy::Lopdf => Arc::new(LopdfExtractor),
                PdfStrategy::Pdftotext if pdftotext.available => {
                    Arc::new(PdftotextExtractor::new(&config.pdftotext_bin))
                }
                PdfStrategy::Ocr if pdftoppm.available && tesseract.available => {
                    Arc::new(PdfOcrExtractor::new(
                        &config.pdftoppm_bin,
                        &config.tesseract_bin,
                        &config.ocr_languages,
                    ))
                }
                skipped => {
                    tracing::warn!(
                        strategy = ?skipped,
                        "PDF strategy disabled: required tool not found"
                    );
                    continue;
                }
            };
            registry.register(FileKind::Pdf, extractor);
        }

        registry.register(FileKind::Docx, Arc::new(DocxExtractor));
        registry.register(FileKind::Pptx, Arc::new(PptxExtractor));
        registry.register(FileKind::Xlsx, Arc::new(XlsxExtractor));
        registry.register(FileKind::Csv, Arc::new(CsvExtractor));
        if tesseract.available {
            registry.register(
                FileKind::Image,
                Arc::new(ImageOcrExtractor::new(
                    &config.tesseract_bin,
                    &config.ocr_languages,
                )),
            );
        } else {
            tracing::warn!("image OCR disabled: tesseract not found");
        }
        registry.register(FileKind::Text, Arc::new(PlainTextExtractor));
        registry.register(FileKind::Unknown, Arc::new(PlainTextExtractor));

        registry.tools = vec![pdftotext, pdftoppm, tesseract];
        registry
    }
}

/// Registered chains and tool availability, for reporting.
#[derive(Debug, Clone, Serialize)]
pub struct Capabilities {
    pub chains: Vec<KindChain>,
    pub tools: Vec<ToolStatus>,
}

#[derive(Debug, Clone, Serialize)]
pub struct KindChain {
    pub kind: FileKind,
    pub extractors: Vec<&'static str>,
}

/// Runs a file through its kind's extractor chain.
pub struct ExtractionDispatcher {
    registry: ExtractorRegistry,
}

impl ExtractionDispatcher {
    pub fn new(registry: ExtractorRegistry) -> Self {
        Self { registry }
    }

    pub fn detect(config: &ExtractionConfig) -> Self {
        Self::new(ExtractorRegistry::detect(config))
    }

    /// Try each extractor for `kind` in order and keep the first non-blank text.
    pub fn extract(&self, path: &Path, kind: FileKind) -> Extraction {
        let mut attempts = Vec::new();

        for extractor in self.registry.chain(kind) {
            let name = extractor.name();
            let outcome = catch_unwind(AssertUnwindSafe(|| extractor.extract(path)))
                .unwrap_or_else(|payload| Err(ExtractError::Panicked(panic_message(&payload))));

            match outcome {
                Ok(text) if !text.trim().is_empty() => {
                    tracing::info!(
                        extractor = name,
                        kind = %kind,
                        chars = text.chars().count(),
                        "text extracted"
                    );
                    return Extraction::Text {
                        text,
                        extractor: name,
                        attempts,
                    };
                }
                Ok(_) => {
                    tracing::debug!(extractor = name, kind = %kind, "extractor returned no text");
                    attempts.push(Attempt {
                        extractor: name,
                        error: "no text".to_string(),
                    });
                }
                Err(e) => {
                    tracing::warn!(extractor = name, kind = %kind, error = %e, "extractor failed");
                    attempts.push(Attempt {
                        extractor: name,
                        error: e.to_string(),
                    });
                }
            }
        }

        tracing::error!(
            kind = %kind,
            path = %path.display(),
            attempts = attempts.len(),
            "all extractors failed"
        );
        Extraction::Failed { attempts }
    }

    /// Classify `type_hint` and return the text or the failure sentinel.
    pub fn extract_text(&self, path: &Path, type_hint: &str) -> String {
        self.extract(path, FileKind::classify(type_hint)).into_text()
    }

    pub fn capabilities(&self) -> Capabilities {
        Capabilities {
            chains: FileKind::ALL
                .into_iter()
                .map(|kind| KindChain {
                    kind,
                    extractors: self.registry.chain(kind).iter().map(|e| e.name()).collect(),
                })
                .collect(),
            tools: self.registry.tools().to_vec(),
        }
    }
}

fn panic_message(payload: &Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Fixed(&'static str, &'static str);

    impl Extractor for Fixed {
        fn name(&self) -> &'static str {
            self.0
        }
        fn extract(&self, _path: &Path) -> Result<String, ExtractError> {
            Ok(self.1.to_string())
        }
    }

    struct Failing(&'static str);

    impl Extractor for Failing {
        fn name(&self) -> &'static str {
            self.0
        }
        fn extract(&self, _path: &Path) -> Result<String, ExtractError> {
            Err(ExtractError::Pdf("broken xref".to_string()))
        }
    }

    struct Panicking;

    impl Extractor for Panicking {
        fn name(&self) -> &'static str {
            "panicking"
        }
        fn extract(&self, _path: &Path) -> Result<String, ExtractError> {
            panic!("font table out of range")
        }
    }

    struct Counting(Arc<AtomicUsize>);

    impl Extractor for Counting {
        fn name(&self) -> &'static str {
            "counting"
        }
        fn extract(&self, _path: &Path) -> Result<String, ExtractError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok("late".to_string())
        }
    }

    fn dispatcher(chain: Vec<Arc<dyn Extractor>>) -> ExtractionDispatcher {
        let mut registry = ExtractorRegistry::new();
        for e in chain {
            registry.register(FileKind::Pdf, e);
        }
        ExtractionDispatcher::new(registry)
    }

    #[test]
    fn last_strategy_wins_when_others_fail() {
        let d = dispatcher(vec![
            Arc::new(Failing("first")),
            Arc::new(Fixed("second", "   \n\t ")),
            Arc::new(Panicking),
            Arc::new(Fixed("last", "recovered text")),
        ]);
        let result = d.extract(Path::new("doc.pdf"), FileKind::Pdf);
        assert_eq!(result.extractor(), Some("last"));
        assert_eq!(result.attempts().len(), 3);
        assert_eq!(result.into_text(), "recovered text");
    }

    #[test]
    fn first_success_stops_the_chain() {
        let calls = Arc::new(AtomicUsize::new(0));
        let d = dispatcher(vec![
            Arc::new(Fixed("first", "early")),
            Arc::new(Counting(calls.clone())),
        ]);
        let text = d.extract_text(Path::new("doc.pdf"), MIME_PDF);
        assert_eq!(text, "early");
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn all_failures_yield_sentinel() {
        let d = dispatcher(vec![Arc::new(Failing("a")), Arc::new(Panicking)]);
        let result = d.extract(Path::new("doc.pdf"), FileKind::Pdf);
        assert!(!result.is_success());
        assert_eq!(result.attempts().len(), 2);
        assert_eq!(result.into_text(), EXTRACTION_FAILED_MESSAGE);
    }

    #[test]
    fn kind_without_chain_yields_sentinel() {
        let d = dispatcher(vec![]);
        assert_eq!(
            d.extract_text(Path::new("photo.png"), "image/png"),
            EXTRACTION_FAILED_MESSAGE
        );
    }

    #[test]
    fn classify_hints() {
        assert_eq!(FileKind::classify("application/pdf"), FileKind::Pdf);
        assert_eq!(FileKind::classify(".PDF"), FileKind::Pdf);
        assert_eq!(FileKind::classify("docx"), FileKind::Docx);
        assert_eq!(FileKind::classify("report.final.xlsx"), FileKind::Xlsx);
        assert_eq!(FileKind::classify("text/csv; charset=utf-8"), FileKind::Csv);
        assert_eq!(FileKind::classify("image/jpeg"), FileKind::Image);
        assert_eq!(FileKind::classify("text/plain"), FileKind::Text);
        assert_eq!(FileKind::classify("application/msword"), FileKind::Unknown);
        assert_eq!(FileKind::classify("archive.tar.gz"), FileKind::Unknown);
    }

    #[test]
    fn upload_falls_back_to_extension_for_generic_mime() {
        assert_eq!(
            FileKind::from_upload(Some("application/octet-stream"), "slides.pptx"),
            FileKind::Pptx
        );
        assert_eq!(FileKind::from_upload(None, "scan.JPG"), FileKind::Image);
        assert_eq!(
            FileKind::from_upload(Some(MIME_DOCX), "misnamed.bin"),
            FileKind::Docx
        );
    }

    #[test]
    fn file_kind_round_trips_through_str() {
        for kind in FileKind::ALL {
            assert_eq!(kind.as_str().parse::<FileKind>().unwrap(), kind);
        }
    }

    #[test]
    fn detect_honors_configured_pdf_order() {
        let config = ExtractionConfig {
            pdf_order: vec![PdfStrategy::Lopdf, PdfStrategy::PdfExtract],
            ..ExtractionConfig::default()
        };
        let registry = ExtractorRegistry::detect(&config);
        let names: Vec<_> = registry.chain(FileKind::Pdf).iter().map(|e| e.name()).collect();
        assert_eq!(names, vec!["lopdf", "pdf-extract"]);
        assert_eq!(registry.chain(FileKind::Unknown)[0].name(), "plain-text");
        assert_eq!(registry.tools().len(), 3);
    }
}
