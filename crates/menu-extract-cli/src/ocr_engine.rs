//! Tesseract-backed [`menu_extract::OcrEngine`], grounded on the teacher's
//! `ocr/tesseract_backend.rs` / `ocr/processor/execution.rs` call pattern:
//! one `TesseractAPI` per call, PSM set before `set_image`, word boxes read
//! back from TSV rather than plain text so the layout segmenter gets real
//! bounding boxes.

use image::RgbImage;
use kreuzberg_tesseract::{TessPageSegMode, TesseractAPI};
use menu_extract::error::{Error, Result};
use menu_extract::ocr::primitive::RawToken;
use menu_extract::traits::OcrEngine;

/// TSV row level that marks a word (as opposed to page/block/paragraph/line).
const TSV_WORD_LEVEL: u32 = 5;
const TSV_MIN_FIELDS: usize = 12;

/// Resolves `TESSDATA_PREFIX`, falling back to an empty string so Tesseract
/// uses its compiled-in default search path.
fn tessdata_path() -> String {
    std::env::var("TESSDATA_PREFIX").unwrap_or_default()
}

fn parse_tsv_words(tsv: &str) -> Vec<RawToken> {
    let mut tokens = Vec::new();
    for (line_num, line) in tsv.lines().enumerate() {
        if line_num == 0 {
            continue;
        }
        let fields: Vec<&str> = line.trim_end().split('\t').collect();
        if fields.len() < TSV_MIN_FIELDS {
            continue;
        }
        let level: u32 = fields[0].parse().unwrap_or(0);
        if level != TSV_WORD_LEVEL {
            continue;
        }
        let text = fields[11].trim();
        if text.is_empty() {
            continue;
        }
        tokens.push(RawToken {
            text: text.to_string(),
            conf: fields[10].parse().unwrap_or(-1.0),
            left: fields[6].parse().unwrap_or(0),
            top: fields[7].parse().unwrap_or(0),
            width: fields[8].parse().unwrap_or(0),
            height: fields[9].parse().unwrap_or(0),
        });
    }
    tokens
}

/// A single-language Tesseract engine. One `TesseractAPI` instance is
/// created per [`OcrEngine::recognize`] call, matching the teacher's
/// per-call-init idiom rather than holding a long-lived handle across
/// threads.
pub struct TesseractOcrEngine {
    language: String,
}

impl TesseractOcrEngine {
    pub fn new(language: impl Into<String>) -> Self {
        Self { language: language.into() }
    }
}

impl Default for TesseractOcrEngine {
    fn default() -> Self {
        Self::new("eng")
    }
}

impl OcrEngine for TesseractOcrEngine {
    fn recognize(&self, image: &RgbImage, psm: u8) -> Result<Vec<RawToken>> {
        let (width, height) = image.dimensions();
        let bytes_per_pixel = 3;
        let bytes_per_line = width * bytes_per_pixel;

        let api = TesseractAPI::new();
        api.init(&tessdata_path(), &self.language)
            .map_err(|e| Error::ocr(format!("failed to initialize tesseract for language '{}': {e}", self.language)))?;

        let psm_mode = TessPageSegMode::from_int(psm as i32);
        api.set_page_seg_mode(psm_mode)
            .map_err(|e| Error::ocr(format!("failed to set PSM mode {psm}: {e}")))?;

        api.set_image(image.as_raw(), width as i32, height as i32, bytes_per_pixel as i32, bytes_per_line as i32)
            .map_err(|e| Error::ocr(format!("failed to hand image to tesseract: {e}")))?;

        api.recognize().map_err(|e| Error::ocr(format!("tesseract recognition failed: {e}")))?;

        let tsv = api.get_tsv_text(0).map_err(|e| Error::ocr(format!("failed to read tesseract TSV output: {e}")))?;

        Ok(parse_tsv_words(&tsv))
    }

    fn config_description(&self, psm: u8) -> String {
        format!("tesseract lang={} psm={psm}", self.language)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_word_level_rows_only() {
        let tsv = "level\tpage_num\tblock_num\tpar_num\tline_num\tword_num\tleft\ttop\twidth\theight\tconf\ttext\n\
                    3\t1\t0\t0\t0\t0\t0\t0\t100\t20\t95.0\tParagraph\n\
                    5\t1\t0\t0\t0\t0\t10\t20\t80\t30\t91.5\tCheese\n\
                    5\t1\t0\t0\t0\t1\t100\t20\t60\t30\t88.0\tPizza";
        let tokens = parse_tsv_words(tsv);
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[0].text, "Cheese");
        assert_eq!(tokens[0].left, 10);
        assert_eq!(tokens[1].text, "Pizza");
        assert_eq!(tokens[1].conf, 88.0);
    }

    #[test]
    fn skips_empty_text_rows() {
        let tsv = "level\tpage_num\tblock_num\tpar_num\tline_num\tword_num\tleft\ttop\twidth\theight\tconf\ttext\n\
                    5\t1\t0\t0\t0\t0\t10\t20\t80\t30\t91.5\t";
        assert!(parse_tsv_words(tsv).is_empty());
    }
}
