//! Orientation normaliser: EXIF → OSD → brute-force probe sequential
//! strategy (`spec.md` §4.2), grounded on `image/preprocessing.rs` /
//! `pdf/images.rs` (EXIF groundwork) and
//! `original_source/storage/ocr_pipeline.py` (probe fallback order).

use image::RgbImage;

use crate::error::StageWarning;

/// Rotation in degrees clockwise.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Rotation {
    R0,
    R90,
    R180,
    R270,
}

impl Rotation {
    pub fn degrees(self) -> u16 {
        match self {
            Rotation::R0 => 0,
            Rotation::R90 => 90,
            Rotation::R180 => 180,
            Rotation::R270 => 270,
        }
    }

    pub fn from_degrees(d: u16) -> Self {
        match d % 360 {
            90 => Rotation::R90,
            180 => Rotation::R180,
            270 => Rotation::R270,
            _ => Rotation::R0,
        }
    }
}

/// Rotates an image clockwise by the given [`Rotation`]. Idempotent for
/// `R0` (returns the image unchanged rather than cloning defensively).
pub fn rotate_clockwise(image: &RgbImage, rotation: Rotation) -> RgbImage {
    match rotation {
        Rotation::R0 => image.clone(),
        Rotation::R90 => image::imageops::rotate90(image),
        Rotation::R180 => image::imageops::rotate180(image),
        Rotation::R270 => image::imageops::rotate270(image),
    }
}

/// Source of an orientation decision, surfaced for debug/audit purposes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OrientationSource {
    Exif,
    Osd,
    BruteForceProbe,
    None,
}

pub struct OrientationResult {
    pub rotation: Rotation,
    pub source: OrientationSource,
    pub image: RgbImage,
}

/// Reads an EXIF orientation tag (1,3,6,8) and returns the clockwise
/// rotation it implies, if present. Feature-gated on `exif`.
#[cfg(feature = "exif")]
pub fn exif_rotation(bytes: &[u8]) -> Option<Rotation> {
    let mut cursor = std::io::Cursor::new(bytes);
    let exif = exif::Reader::new().read_from_container(&mut cursor).ok()?;
    let field = exif.get_field(exif::Tag::Orientation, exif::In::PRIMARY)?;
    let value = field.value.get_uint(0)?;
    match value {
        3 => Some(Rotation::R180),
        6 => Some(Rotation::R90),
        8 => Some(Rotation::R270),
        _ => None,
    }
}

#[cfg(not(feature = "exif"))]
pub fn exif_rotation(_bytes: &[u8]) -> Option<Rotation> {
    None
}

/// Sequential orientation strategy: EXIF transpose, then an OSD callback (if
/// the caller's OCR engine supports it), then a brute-force probe across all
/// four rotations using `probe_score`. Idempotent on already-upright pages:
/// an input already at `R0` with a confident EXIF/OSD read stays at `R0`.
pub fn normalize_orientation<F>(
    image: &RgbImage,
    exif_bytes: Option<&[u8]>,
    osd_rotation: Option<Rotation>,
    mut probe_score: F,
) -> (OrientationResult, Option<StageWarning>)
where
    F: FnMut(&RgbImage, Rotation) -> f64,
{
    if let Some(bytes) = exif_bytes {
        if let Some(rotation) = exif_rotation(bytes) {
            let rotated = rotate_clockwise(image, rotation);
            return (OrientationResult { rotation, source: OrientationSource::Exif, image: rotated }, None);
        }
    }

    if let Some(rotation) = osd_rotation {
        let rotated = rotate_clockwise(image, rotation);
        return (OrientationResult { rotation, source: OrientationSource::Osd, image: rotated }, None);
    }

    let candidates = [Rotation::R0, Rotation::R90, Rotation::R180, Rotation::R270];
    let mut best = Rotation::R0;
    let mut best_score = f64::MIN;
    for &r in &candidates {
        let score = probe_score(image, r);
        if score > best_score {
            best_score = score;
            best = r;
        }
    }
    let rotated = rotate_clockwise(image, best);
    let warning = StageWarning::new("orientation", "OSD unavailable; used brute-force rotation probe", None);
    (OrientationResult { rotation: best, source: OrientationSource::BruteForceProbe, image: rotated }, Some(warning))
}
