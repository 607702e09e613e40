//! Extract command - runs the image pipeline or the text-only path over one
//! or more inputs and prints the structured menu payload.

use std::path::PathBuf;

use anyhow::{Context, Result};
use menu_extract::{PipelineConfig, StructuredMenuPayload};

use crate::ocr_engine::TesseractOcrEngine;
use crate::rasteriser::ImageFileRasteriser;
use crate::OutputFormat;

fn run_image_pipeline(path: &std::path::Path, config: &PipelineConfig) -> Result<StructuredMenuPayload> {
    let rasteriser = ImageFileRasteriser;
    let ocr = TesseractOcrEngine::default();
    let path_str = path.to_string_lossy();
    menu_extract::extract(path_str.as_bytes(), &rasteriser, &ocr, None, config)
        .with_context(|| format!("Failed to extract menu from '{}'. Ensure the path points to a readable image file or a directory of pages.", path.display()))
}

fn run_text_only(path: &std::path::Path, config: &PipelineConfig) -> Result<StructuredMenuPayload> {
    let text = std::fs::read_to_string(path).with_context(|| format!("Failed to read text file '{}'", path.display()))?;
    menu_extract::parse_text_only(&text, None, config)
        .with_context(|| format!("Failed to parse menu text from '{}'", path.display()))
}

fn print_payload(payload: &StructuredMenuPayload, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Text => {
            for section in &payload.sections {
                println!("=== {} ===", section.path);
                for item in &section.items {
                    if item.price_cents > 0 {
                        println!("{:<40} ${:.2}", item.name, item.price_cents as f64 / 100.0);
                    } else {
                        println!("{:<40} (no price)", item.name);
                    }
                }
            }
        }
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string_pretty(payload).context("Failed to serialize menu payload to JSON")?
            );
        }
    }
    Ok(())
}

/// Runs the extraction pipeline over a single input and prints the result.
pub fn extract_command(path: PathBuf, text_only: bool, config: PipelineConfig, format: OutputFormat) -> Result<()> {
    let payload = if text_only { run_text_only(&path, &config)? } else { run_image_pipeline(&path, &config)? };
    print_payload(&payload, format)
}

/// Runs the extraction pipeline over several inputs independently, printing
/// one payload per input.
pub fn batch_command(paths: Vec<PathBuf>, text_only: bool, config: PipelineConfig, format: OutputFormat) -> Result<()> {
    let mut payloads = Vec::with_capacity(paths.len());
    for path in &paths {
        let payload = if text_only { run_text_only(path, &config)? } else { run_image_pipeline(path, &config)? };
        payloads.push((path.clone(), payload));
    }

    match format {
        OutputFormat::Text => {
            for (path, payload) in &payloads {
                println!("### {}", path.display());
                print_payload(payload, OutputFormat::Text)?;
                println!();
            }
        }
        OutputFormat::Json => {
            let output: Vec<_> = payloads
                .iter()
                .map(|(path, payload)| serde_json::json!({ "path": path.to_string_lossy(), "payload": payload }))
                .collect();
            println!(
                "{}",
                serde_json::to_string_pretty(&output).context("Failed to serialize batch menu payloads to JSON")?
            );
        }
    }

    Ok(())
}
