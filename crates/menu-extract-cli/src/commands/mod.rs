//! Command modules for the menu extraction CLI.
//!
//! - `extract` - single-document and batch extraction
//! - `config` - pipeline configuration loading and discovery

pub mod config;
pub mod extract;

pub use config::load_config;
pub use extract::{batch_command, extract_command};
