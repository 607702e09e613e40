//! Column splitter: adaptive gutter detection from a vertical ink
//! projection (`spec.md` §4.3), grounded on `image/resize.rs` / `image/dpi.rs`
//! (pixel-geometry idiom).

use image::RgbImage;

use crate::config::ColumnSplitConfig;

/// Per-column pixel ink count, used to find gutters (low-ink vertical runs).
fn vertical_ink_projection(image: &RgbImage) -> Vec<u32> {
    let (width, height) = image.dimensions();
    let mut projection = vec![0u32; width as usize];
    for y in 0..height {
        for x in 0..width {
            let pixel = image.get_pixel(x, y);
            // Treat anything darker than mid-grey as ink.
            let luma = (pixel[0] as u32 + pixel[1] as u32 + pixel[2] as u32) / 3;
            if luma < 128 {
                projection[x as usize] += 1;
            }
        }
    }
    projection
}

/// Minimum gutter width per `spec.md` §4.3:
/// `max(12, min(64, floor(width * 0.0075)))`.
pub fn min_gutter_width(page_width: u32, cfg: &ColumnSplitConfig) -> u32 {
    let scaled = (page_width as f64 * cfg.min_gutter_width_frac).floor();
    let capped = scaled.min(cfg.min_gutter_cap_px);
    capped.max(cfg.min_gutter_floor_px) as u32
}

/// Splits a page image into ordered (left-to-right) sub-images along
/// vertical ink-projection gutters at least `min_gutter_width` wide.
/// Returns a single full-width sub-image if no gutter is found.
pub fn split_columns(image: &RgbImage, cfg: &ColumnSplitConfig) -> Vec<RgbImage> {
    split_columns_with_offsets(image, cfg).into_iter().map(|(_, img)| img).collect()
}

/// Same as [`split_columns`] but additionally returns each column's `x`
/// offset in the original page's coordinate space, so downstream stages can
/// translate column-local word bboxes back to page coordinates.
pub fn split_columns_with_offsets(image: &RgbImage, cfg: &ColumnSplitConfig) -> Vec<(u32, RgbImage)> {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return vec![(0, image.clone())];
    }
    let projection = vertical_ink_projection(image);
    let ink_threshold = (height as f64 * 0.01).ceil() as u32;
    let min_gutter = min_gutter_width(width, cfg);

    let mut gutters: Vec<(u32, u32)> = Vec::new();
    let mut run_start: Option<u32> = None;
    for x in 0..width {
        if projection[x as usize] <= ink_threshold {
            if run_start.is_none() {
                run_start = Some(x);
            }
        } else if let Some(start) = run_start.take() {
            if x - start >= min_gutter {
                gutters.push((start, x));
            }
        }
    }
    if let Some(start) = run_start {
        if width - start >= min_gutter {
            gutters.push((start, width));
        }
    }

    if gutters.is_empty() {
        return vec![(0, image.clone())];
    }

    let mut columns = Vec::new();
    let mut cursor = 0u32;
    for (gstart, gend) in &gutters {
        if *gstart > cursor {
            columns.push((cursor, image::imageops::crop_imm(image, cursor, 0, gstart - cursor, height).to_image()));
        }
        cursor = *gend;
    }
    if cursor < width {
        columns.push((cursor, image::imageops::crop_imm(image, cursor, 0, width - cursor, height).to_image()));
    }

    if columns.is_empty() { vec![(0, image.clone())] } else { columns }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn min_gutter_width_respects_floor_and_cap() {
        let cfg = ColumnSplitConfig::default();
        assert_eq!(min_gutter_width(100, &cfg), 12);
        assert_eq!(min_gutter_width(20_000, &cfg), 64);
        assert_eq!(min_gutter_width(4_000, &cfg), 30);
    }

    #[test]
    fn blank_image_returns_single_column() {
        let image = RgbImage::from_pixel(200, 100, image::Rgb([255, 255, 255]));
        let cfg = ColumnSplitConfig::default();
        let columns = split_columns(&image, &cfg);
        assert_eq!(columns.len(), 1);
    }

    #[test]
    fn detects_a_real_gutter() {
        let mut image = RgbImage::from_pixel(300, 100, image::Rgb([255, 255, 255]));
        for y in 0..100 {
            for x in 0..50 {
                image.put_pixel(x, y, image::Rgb([0, 0, 0]));
            }
            for x in 250..300 {
                image.put_pixel(x, y, image::Rgb([0, 0, 0]));
            }
        }
        let cfg = ColumnSplitConfig::default();
        let columns = split_columns(&image, &cfg);
        assert_eq!(columns.len(), 2);
    }
}
