//! Multi-pass OCR fusion: run a (rotation × PSM) grid, cluster tokens
//! geometrically, score each rotation, and select the winner
//! (`spec.md` §4.4), grounded on `ocr/processor/execution.rs` (parallel pass
//! scheduling) and `original_source/storage/ocr_pipeline.py` (clustering and
//! scoring constants), confirmed against the §8 scenario-4 fixture.

use rayon::prelude::*;
use serde::Serialize;

use crate::config::OcrStageConfig;
use crate::error::Result;
use crate::ocr::orientation::{Rotation, rotate_clockwise};
use crate::ocr::primitive::clean_and_filter_tokens;
use crate::traits::OcrEngine;
use crate::types::{BBox, Word};

/// A single accepted token from one (rotation, PSM) pass, bbox already
/// un-rotated into the original column's coordinate system.
#[derive(Clone, Debug)]
struct Candidate {
    word: Word,
    psm_index: usize,
}

/// Maps a bbox produced by OCR on a rotated image back into the original
/// (pre-rotation) image's coordinate system (`spec.md` §4.4 step 2).
fn unrotate_bbox(bbox: BBox, rotation: Rotation, rotated_width: i64, rotated_height: i64) -> BBox {
    match rotation {
        Rotation::R0 => bbox,
        // A clockwise 90° OCR rotation means original_x = y, original_y = (rotated_height - 1) - (x + w).
        Rotation::R90 => {
            let x = bbox.y;
            let y = rotated_width - bbox.x - bbox.w;
            BBox::new(x, y, bbox.h, bbox.w)
        }
        Rotation::R180 => {
            let x = rotated_width - bbox.x - bbox.w;
            let y = rotated_height - bbox.y - bbox.h;
            BBox::new(x, y, bbox.w, bbox.h)
        }
        Rotation::R270 => {
            let x = rotated_height - bbox.y - bbox.h;
            let y = bbox.x;
            BBox::new(x, y, bbox.h, bbox.w)
        }
    }
}

/// Runs OCR across every (rotation, PSM) combination for a single column
/// image, collecting every accepted word with its bbox mapped back to
/// original coordinates. Passes have no data dependency on each other and
/// may be scheduled concurrently (`spec.md` §5).
fn generate_candidates(
    column: &image::RgbImage,
    engine: &dyn OcrEngine,
    cfg: &OcrStageConfig,
) -> Result<Vec<(Rotation, Vec<Candidate>)>> {
    let rotations: Vec<Rotation> = cfg.rotations.iter().map(|d| Rotation::from_degrees(*d)).collect();

    let per_rotation: Vec<Result<(Rotation, Vec<Candidate>)>> = rotations
        .par_iter()
        .map(|&rotation| {
            let rotated = rotate_clockwise(column, rotation);
            let (rw, rh) = (rotated.width() as i64, rotated.height() as i64);

            let mut candidates = Vec::new();
            for (psm_index, &psm) in cfg.psm_modes.iter().enumerate() {
                let raw = engine.recognize(&rotated, psm)?;
                let words = clean_and_filter_tokens(&raw, cfg.conf_floor);
                for word in words {
                    let bbox = unrotate_bbox(word.bbox, rotation, rw, rh);
                    candidates.push(Candidate { word: Word { bbox, ..word }, psm_index });
                }
            }
            Ok((rotation, candidates))
        })
        .collect();

    per_rotation.into_iter().collect()
}

/// Clusters same-rotation candidates whose text matches and whose bboxes
/// satisfy `IoU ≥ iou_threshold` OR `overlap-ratio-vs-smaller ≥
/// overlap_threshold`. Multi-pass-agreement clusters are kept unconditionally;
/// single-pass clusters are kept only when `conf ≥ single_pass_conf_floor`
/// (`spec.md` §4.4 step 3).
fn cluster_candidates(candidates: Vec<Candidate>, cfg: &OcrStageConfig) -> Vec<Word> {
    let mut clusters: Vec<Vec<Candidate>> = Vec::new();

    'outer: for candidate in candidates {
        for cluster in clusters.iter_mut() {
            let representative = &cluster[0];
            if representative.word.text == candidate.word.text
                && (representative.word.bbox.iou(&candidate.word.bbox) >= cfg.iou_cluster_threshold
                    || representative.word.bbox.overlap_ratio_vs_smaller(&candidate.word.bbox)
                        >= cfg.overlap_cluster_threshold)
            {
                cluster.push(candidate);
                continue 'outer;
            }
        }
        clusters.push(vec![candidate]);
    }

    clusters
        .into_iter()
        .filter_map(|cluster| {
            let distinct_passes: std::collections::HashSet<usize> = cluster.iter().map(|c| c.psm_index).collect();
            let best = cluster
                .iter()
                .max_by(|a, b| {
                    a.word
                        .conf
                        .partial_cmp(&b.word.conf)
                        .unwrap()
                        .then(a.word.bbox.area().cmp(&b.word.bbox.area()))
                })
                .unwrap();
            if distinct_passes.len() >= 2 || best.word.conf >= cfg.single_pass_conf_floor {
                Some(best.word.clone())
            } else {
                None
            }
        })
        .collect()
}

/// Statistics feeding the per-rotation score (`spec.md` §4.4 step 4).
#[derive(Clone, Copy, Debug, Serialize)]
pub struct RotationStats {
    pub usable: usize,
    pub avg_conf: f64,
    pub avg_chars: f64,
}

impl RotationStats {
    pub fn from_words(words: &[Word]) -> Self {
        let usable_words: Vec<&Word> = words.iter().filter(|w| w.conf >= 0.0).collect();
        let usable = usable_words.len();
        if usable == 0 {
            return RotationStats { usable: 0, avg_conf: 0.0, avg_chars: 0.0 };
        }
        let avg_conf = usable_words.iter().map(|w| w.conf).sum::<f64>() / usable as f64;
        let avg_chars = usable_words.iter().map(|w| w.text.chars().count() as f64).sum::<f64>() / usable as f64;
        RotationStats { usable, avg_conf, avg_chars }
    }

    /// `score = avg_conf × coherence × content`, `coherence = min(avg_chars /
    /// 4.0, 1.5)`, `content = sqrt(usable)` (`spec.md` §4.4 step 4).
    pub fn raw_score(&self) -> f64 {
        if self.usable == 0 {
            return 0.0;
        }
        let coherence = (self.avg_chars / 4.0).min(1.5);
        let content = (self.usable as f64).sqrt();
        self.avg_conf * coherence * content
    }
}

fn median_usize(values: &[usize]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_unstable();
    let n = sorted.len();
    if n == 0 {
        return 0.0;
    }
    if n % 2 == 1 {
        sorted[n / 2] as f64
    } else {
        (sorted[n / 2 - 1] + sorted[n / 2]) as f64 / 2.0
    }
}

/// Outcome of scoring and selecting among rotations (`spec.md` §4.4 steps 5-6).
#[derive(Clone, Debug, Serialize)]
pub struct RotationDecision {
    pub winner: u16,
    pub scores: Vec<(u16, f64)>,
}

/// Applies the cross-rotation outlier penalty and picks the highest-scoring
/// rotation, preferring rotation 0 on ties within `tie_epsilon`
/// (`spec.md` §4.4 steps 5-6, §8).
pub fn select_rotation(stats: &[(u16, RotationStats)], cfg: &OcrStageConfig) -> RotationDecision {
    let usable_counts: Vec<usize> = stats.iter().map(|(_, s)| s.usable).collect();
    let median_tokens = median_usize(&usable_counts);

    let mut scores: Vec<(u16, f64)> = stats
        .iter()
        .map(|(degrees, s)| {
            let mut score = s.raw_score();
            if median_tokens > 0.0 && s.usable as f64 > cfg.rotation_outlier_ratio * median_tokens {
                let penalty = (median_tokens / s.usable as f64).powi(2);
                score *= penalty;
            }
            (*degrees, score)
        })
        .collect();

    // Deterministic order: original rotation order, so tie-break logic below
    // is stable regardless of input ordering.
    scores.sort_by(|a, b| stats.iter().position(|(d, _)| *d == a.0).cmp(&stats.iter().position(|(d, _)| *d == b.0)));

    let mut winner = scores[0].0;
    let mut best_score = scores[0].1;
    for &(degrees, score) in scores.iter().skip(1) {
        if score > best_score + cfg.rotation_tie_epsilon {
            best_score = score;
            winner = degrees;
        } else if (score - best_score).abs() <= cfg.rotation_tie_epsilon && degrees == 0 {
            winner = 0;
            best_score = best_score.max(score);
        }
    }

    RotationDecision { winner, scores }
}

/// Full per-column fusion pipeline: candidate generation, clustering per
/// rotation, scoring, and selection. Returns the winning rotation's fused
/// token stream in original image coordinates plus the rotation decision for
/// debug output.
pub fn fuse_column(
    column: &image::RgbImage,
    engine: &dyn OcrEngine,
    cfg: &OcrStageConfig,
) -> Result<(Vec<Word>, RotationDecision)> {
    let per_rotation_candidates = generate_candidates(column, engine, cfg)?;

    let mut fused_by_rotation: Vec<(u16, Vec<Word>)> = Vec::new();
    for (rotation, candidates) in per_rotation_candidates {
        let words = cluster_candidates(candidates, cfg);
        fused_by_rotation.push((rotation.degrees(), words));
    }

    let stats: Vec<(u16, RotationStats)> =
        fused_by_rotation.iter().map(|(deg, words)| (*deg, RotationStats::from_words(words))).collect();

    let decision = select_rotation(&stats, cfg);
    let winning_words =
        fused_by_rotation.into_iter().find(|(deg, _)| *deg == decision.winner).map(|(_, w)| w).unwrap_or_default();

    Ok((winning_words, decision))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats(usable: usize, avg_conf: f64, avg_chars: f64) -> RotationStats {
        RotationStats { usable, avg_conf, avg_chars }
    }

    #[test]
    fn scenario_4_rotation_270_penalised_winner_is_90() {
        let cfg = OcrStageConfig::default();
        let data = vec![
            (0u16, stats(255, 80.0, 1.6)),
            (90u16, stats(232, 80.6, 3.2)),
            (180u16, stats(279, 80.6, 1.7)),
            (270u16, stats(1174, 92.7, 5.5)),
        ];
        let decision = select_rotation(&data, &cfg);
        assert_eq!(decision.winner, 90);
    }

    #[test]
    fn tie_within_epsilon_prefers_rotation_zero() {
        let cfg = OcrStageConfig::default();
        let data = vec![(0u16, stats(100, 80.0, 4.0)), (90u16, stats(100, 80.0005, 4.0))];
        let decision = select_rotation(&data, &cfg);
        assert_eq!(decision.winner, 0);
    }

    #[test]
    fn clear_winner_beyond_epsilon_is_not_overridden() {
        let cfg = OcrStageConfig::default();
        let data = vec![(0u16, stats(100, 50.0, 4.0)), (90u16, stats(100, 95.0, 4.0))];
        let decision = select_rotation(&data, &cfg);
        assert_eq!(decision.winner, 90);
    }

    #[test]
    fn unrotate_bbox_r0_is_identity() {
        let bbox = BBox::new(5, 5, 10, 10);
        assert_eq!(unrotate_bbox(bbox, Rotation::R0, 100, 100), bbox);
    }

    #[test]
    fn unrotate_bbox_r180_round_trips() {
        let bbox = BBox::new(5, 5, 10, 10);
        let rotated = unrotate_bbox(bbox, Rotation::R180, 100, 100);
        let back = unrotate_bbox(rotated, Rotation::R180, 100, 100);
        assert_eq!(back, bbox);
    }
}
