use std::ffi::OsStr;
use std::path::Path;

use super::tools::run_capture;
use super::{ExtractError, Extractor};

/// OCR for raster images through `tesseract`.
pub struct ImageOcrExtractor {
    program: String,
    languages: String,
}

impl ImageOcrExtractor {
    pub fn new(program: &str, languages: &str) -> Self {
        Self {
            program: program.to_string(),
            languages: languages.to_string(),
        }
    }
}

impl Extractor for ImageOcrExtractor {
    fn name(&self) -> &'static str {
        "tesseract"
    }

    fn extract(&self, path: &Path) -> Result<String, ExtractError> {
        ocr_image(&self.program, path, &self.languages)
    }
}

/// `tesseract <image> stdout -l <languages>`.
pub(super) fn ocr_image(
    program: &str,
    image: &Path,
    languages: &str,
) -> Result<String, ExtractError> {
    let args: [&OsStr; 4] = [
        image.as_os_str(),
        OsStr::new("stdout"),
        OsStr::new("-l"),
        OsStr::new(languages),
    ];
    run_capture("tesseract", program, args)
}
