//! Three-tier error model (`spec.md` §7).
//!
//! Only input errors abort a document. Stage warnings and per-item
//! anomalies are data, not [`Error`] values — see [`StageWarning`] and
//! [`crate::types::PriceFlag`].

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("input error: {message}")]
    Input { message: String },

    #[error("ocr engine error: {message}")]
    Ocr {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("rasterisation error: {message}")]
    Rasterise { message: String },

    #[error("config error: {message}")]
    Config { message: String },
}

impl Error {
    pub fn input(message: impl Into<String>) -> Self {
        Error::Input { message: message.into() }
    }

    pub fn ocr(message: impl Into<String>) -> Self {
        Error::Ocr { message: message.into(), source: None }
    }

    pub fn ocr_with_source(message: impl Into<String>, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        Error::Ocr { message: message.into(), source: Some(Box::new(source)) }
    }

    pub fn rasterise(message: impl Into<String>) -> Self {
        Error::Rasterise { message: message.into() }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Error::Config { message: message.into() }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// A degraded-signal condition for a page that does not abort processing
/// (e.g. OSD failed, column split fell back to single column). Attached to
/// `PayloadMeta::warnings`, logged at `tracing::warn!` when produced.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct StageWarning {
    pub stage: String,
    pub message: String,
    pub page: Option<usize>,
}

impl StageWarning {
    pub fn new(stage: impl Into<String>, message: impl Into<String>, page: Option<usize>) -> Self {
        Self { stage: stage.into(), message: message.into(), page }
    }

    pub fn log(&self) {
        tracing::warn!(stage = %self.stage, page = ?self.page, "{}", self.message);
    }
}
