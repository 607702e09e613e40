//! OCR stage: the primitive wrapper, orientation normaliser, column
//! splitter, and multi-pass fusion (`spec.md` §4.1–§4.4).

pub mod columns;
pub mod fusion;
pub mod orientation;
pub mod primitive;

pub use primitive::{RawToken, clean_and_filter_tokens};
