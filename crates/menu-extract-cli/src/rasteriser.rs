//! File-based [`menu_extract::Rasteriser`]: turns a single image file, or a
//! directory of image files, into an ordered page sequence. The core never
//! rasterises PDFs itself, so PDF input is out of scope here too — feed
//! pre-rendered page images instead.

use std::path::{Path, PathBuf};

use menu_extract::error::{Error, Result};
use menu_extract::traits::Rasteriser;

/// Reads `input` as a UTF-8 path (to a single image, or a directory of
/// images sorted by filename) and decodes each into an [`image::RgbImage`]
/// page.
pub struct ImageFileRasteriser;

impl ImageFileRasteriser {
    fn decode(path: &Path) -> Result<image::RgbImage> {
        let img = image::open(path).map_err(|e| Error::rasterise(format!("failed to decode image '{}': {e}", path.display())))?;
        Ok(img.to_rgb8())
    }

    fn collect_paths(root: &Path) -> Result<Vec<PathBuf>> {
        if root.is_file() {
            return Ok(vec![root.to_path_buf()]);
        }
        if !root.is_dir() {
            return Err(Error::rasterise(format!("input path '{}' is neither a file nor a directory", root.display())));
        }
        let mut paths: Vec<PathBuf> = std::fs::read_dir(root)
            .map_err(|e| Error::rasterise(format!("failed to list directory '{}': {e}", root.display())))?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|p| p.is_file())
            .collect();
        paths.sort();
        Ok(paths)
    }
}

impl Rasteriser for ImageFileRasteriser {
    fn render(&self, input: &[u8]) -> Result<Vec<(usize, image::RgbImage)>> {
        let path_str = std::str::from_utf8(input).map_err(|_| Error::input("rasteriser input must be a UTF-8 file or directory path"))?;
        let root = Path::new(path_str);
        let paths = Self::collect_paths(root)?;
        if paths.is_empty() {
            return Err(Error::rasterise(format!("no image files found under '{}'", root.display())));
        }
        paths.iter().enumerate().map(|(index, path)| Ok((index, Self::decode(path)?))).collect()
    }
}
