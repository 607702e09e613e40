//! Inbound external interfaces the core consumes (`spec.md` §6), grounded on
//! the teacher's plugin/registry pattern (`plugins/registry/ocr.rs`,
//! `plugins/extractor/mod.rs`): a `HashMap`-free trait-object seam with
//! graceful degradation when a collaborator is absent.

use image::RgbImage;

use crate::error::Result;
use crate::ocr::primitive::RawToken;

/// Renders a PDF or image into an ordered sequence of page images. The core
/// never rasterises PDFs itself (`spec.md` §1 Non-goals).
pub trait Rasteriser: Send + Sync {
    fn render(&self, input: &[u8]) -> Result<Vec<(usize, RgbImage)>>;
}

/// Wraps an external OCR engine. Tesseract configuration is opaque to the
/// core beyond the PSM argument (`spec.md` §6); the core logs the effective
/// config string for debug output via [`OcrEngine::config_description`].
pub trait OcrEngine: Send + Sync {
    fn recognize(&self, image: &RgbImage, psm: u8) -> Result<Vec<RawToken>>;

    /// Optional orientation-and-script-detection query. `None` means OSD is
    /// unavailable and the orientation normaliser falls back to the
    /// brute-force probe (`spec.md` §4.2).
    fn detect_orientation(&self, _image: &RgbImage) -> Option<u16> {
        None
    }

    fn config_description(&self, psm: u8) -> String {
        format!("psm={psm}")
    }
}

/// Optional fusion signal used alongside rule-based category inference
/// (`spec.md` §6, §1 Non-goals: "optional external classifier fusion as a
/// boolean hook"). The core falls back entirely to rules when absent.
pub trait Classifier: Send + Sync {
    fn classify(&self, text: &str) -> Option<(String, f64)>;
}
