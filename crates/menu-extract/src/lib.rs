//! Menu extraction core: OCRs restaurant-menu images/PDFs, segments layout
//! into geometric text blocks, parses blocks with a domain grammar, infers
//! categories and size/flavor variants, validates price integrity, and
//! emits a structured menu payload with per-item confidence and quality
//! flags. See `spec.md` for the full design.

pub mod category;
pub mod confidence;
pub mod config;
pub mod crossitem;
pub mod error;
pub mod grammar;
pub mod layout;
pub mod ocr;
pub mod pipeline;
pub mod similarity;
pub mod textonly;
pub mod traits;
pub mod types;
pub mod variants;
pub mod vocab;

pub use config::PipelineConfig;
pub use error::{Error, Result, StageWarning};
pub use pipeline::extract;
pub use textonly::parse_text_only;
pub use traits::{Classifier, OcrEngine, Rasteriser};
pub use types::StructuredMenuPayload;
