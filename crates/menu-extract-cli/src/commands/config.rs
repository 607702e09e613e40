//! Config command - pipeline configuration loading and discovery.
//!
//! Loads `menu_extract::PipelineConfig` from an explicit file or discovers
//! `menu-extract.{toml,yaml,yml,json}` the way the core's own
//! [`menu_extract::PipelineConfig::discover`] does.

use std::path::PathBuf;

use anyhow::{Context, Result};
use menu_extract::PipelineConfig;

/// Loads pipeline configuration from a file or discovers it automatically.
///
/// 1. Explicit config file (if `--config` flag provided)
/// 2. Auto-discovered config (searches `menu-extract.{toml,yaml,yml,json}` in
///    current and parent directories)
/// 3. Default configuration (if no config file found)
///
/// # Errors
///
/// Returns an error if:
/// - Explicit config file has unsupported extension (must be .toml, .yaml, .yml, or .json)
/// - Config file cannot be read or parsed
pub fn load_config(config_path: Option<PathBuf>) -> Result<PipelineConfig> {
    if let Some(path) = config_path {
        let path_lower = path.to_string_lossy().to_lowercase();
        let config = if path_lower.ends_with(".toml") {
            PipelineConfig::from_toml_file(&path)
        } else if path_lower.ends_with(".yaml") || path_lower.ends_with(".yml") {
            PipelineConfig::from_yaml_file(&path)
        } else if path_lower.ends_with(".json") {
            PipelineConfig::from_json_file(&path)
        } else {
            anyhow::bail!("Config file must have .toml, .yaml, .yml, or .json extension (case-insensitive)");
        };
        config.with_context(|| {
            format!(
                "Failed to load configuration from '{}'. Ensure the file exists, is readable, and contains valid configuration.",
                path.display()
            )
        })
    } else {
        match PipelineConfig::discover() {
            Ok(Some(config)) => Ok(config),
            Ok(None) => Ok(PipelineConfig::default()),
            Err(e) => Err(e).context(
                "Failed to auto-discover configuration file. Searched for menu-extract.{toml,yaml,yml,json} in current and parent directories. Use --config to specify an explicit path.",
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_config_falls_back_to_default() {
        let config = load_config(None);
        assert!(config.is_ok());
    }

    #[test]
    fn unsupported_extension_is_rejected() {
        let result = load_config(Some(PathBuf::from("config.ini")));
        assert!(result.is_err());
    }
}
