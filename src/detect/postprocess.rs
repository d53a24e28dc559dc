//! Candidate selection and overlap suppression.
//!
//! Backends emit raw per-class scores with normalized boxes; this module
//! applies the selection rules: argmax class per candidate, confidence
//! filtering, normalized-to-pixel conversion, and greedy IoU suppression
//! of duplicate boxes.

use crate::detect::classes::class_label;
use crate::detect::result::{BoundingBox, Detection, RawCandidate};

/// Minimum class confidence for a candidate to survive (strict).
pub const CONFIDENCE_THRESHOLD: f32 = 0.5;

/// IoU at or above which the lower-confidence of two same-frame boxes is
/// considered a duplicate and dropped.
pub const SUPPRESSION_THRESHOLD: f32 = 0.4;

/// Pick each candidate's best class, drop low-confidence candidates, and
/// convert the surviving boxes to pixel space.
pub fn select_candidates(
    candidates: &[RawCandidate],
    frame_width: u32,
    frame_height: u32,
) -> Vec<Detection> {
    let mut selected = Vec::new();
    for candidate in candidates {
        let Some((class_id, confidence)) = argmax(&candidate.scores) else {
            continue;
        };
        if confidence <= CONFIDENCE_THRESHOLD {
            continue;
        }
        let Some(label) = class_label(class_id) else {
            continue;
        };

        let bbox = to_pixel_box(candidate, frame_width, frame_height);
        selected.push(Detection {
            label,
            class_id,
            confidence,
            bbox,
        });
    }
    selected
}

/// Greedy overlap suppression: keep the highest-confidence box, drop every
/// remaining box overlapping it at `threshold` IoU or more, repeat.
///
/// Idempotent: survivors pairwise overlap below the threshold, so a second
/// pass removes nothing.
pub fn suppress_overlaps(mut detections: Vec<Detection>, threshold: f32) -> Vec<Detection> {
    detections.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut kept: Vec<Detection> = Vec::with_capacity(detections.len());
    for detection in detections {
        // Class-agnostic: a heavy overlap is one object regardless of
        // which labels the candidates carry.
        let duplicate = kept
            .iter()
            .any(|k| k.bbox.iou(&detection.bbox) >= threshold);
        if !duplicate {
            kept.push(detection);
        }
    }
    kept
}

fn argmax(scores: &[f32]) -> Option<(usize, f32)> {
    let mut best: Option<(usize, f32)> = None;
    for (idx, &score) in scores.iter().enumerate() {
        match best {
            Some((_, b)) if score <= b => {}
            _ => best = Some((idx, score)),
        }
    }
    best
}

fn to_pixel_box(candidate: &RawCandidate, frame_width: u32, frame_height: u32) -> BoundingBox {
    let nb = candidate.bbox;
    let w = nb.w * frame_width as f32;
    let h = nb.h * frame_height as f32;
    let x = nb.cx * frame_width as f32 - w / 2.0;
    let y = nb.cy * frame_height as f32 - h / 2.0;
    BoundingBox {
        x: x as i32,
        y: y as i32,
        width: w.max(0.0) as u32,
        height: h.max(0.0) as u32,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::result::NormalizedBox;

    fn candidate(cx: f32, cy: f32, w: f32, h: f32, class_id: usize, score: f32) -> RawCandidate {
        let mut scores = vec![0.0f32; 80];
        scores[class_id] = score;
        RawCandidate {
            bbox: NormalizedBox { cx, cy, w, h },
            scores,
        }
    }

    #[test]
    fn low_confidence_candidates_are_dropped() {
        let candidates = vec![
            candidate(0.5, 0.5, 0.2, 0.2, 0, 0.9),
            candidate(0.2, 0.2, 0.1, 0.1, 0, 0.3),
        ];
        let detections = select_candidates(&candidates, 1020, 600);
        assert_eq!(detections.len(), 1);
        assert_eq!(detections[0].label, "person");
    }

    #[test]
    fn exactly_threshold_confidence_is_dropped() {
        let candidates = vec![candidate(0.5, 0.5, 0.2, 0.2, 0, 0.5)];
        assert!(select_candidates(&candidates, 1020, 600).is_empty());
    }

    #[test]
    fn boxes_convert_to_pixel_space() {
        let candidates = vec![candidate(0.5, 0.5, 0.2, 0.2, 2, 0.8)];
        let detections = select_candidates(&candidates, 1000, 500);
        let bbox = detections[0].bbox;
        assert_eq!(bbox.width, 200);
        assert_eq!(bbox.height, 100);
        assert_eq!(bbox.x, 400);
        assert_eq!(bbox.y, 200);
        assert_eq!(detections[0].label, "car");
    }

    #[test]
    fn suppression_drops_heavy_overlap_and_keeps_highest() {
        let mut a = select_candidates(&[candidate(0.5, 0.5, 0.2, 0.2, 0, 0.9)], 1000, 500);
        let b = select_candidates(&[candidate(0.51, 0.5, 0.2, 0.2, 0, 0.7)], 1000, 500);
        let c = select_candidates(&[candidate(0.1, 0.1, 0.1, 0.1, 0, 0.8)], 1000, 500);
        a.extend(b);
        a.extend(c);

        let kept = suppress_overlaps(a, SUPPRESSION_THRESHOLD);
        assert_eq!(kept.len(), 2);
        assert!((kept[0].confidence - 0.9).abs() < 1e-6);
        assert!((kept[1].confidence - 0.8).abs() < 1e-6);
    }

    #[test]
    fn suppression_is_idempotent() {
        let mut detections = select_candidates(&[candidate(0.5, 0.5, 0.2, 0.2, 0, 0.9)], 1000, 500);
        detections.extend(select_candidates(
            &[candidate(0.52, 0.5, 0.2, 0.2, 0, 0.6)],
            1000,
            500,
        ));
        detections.extend(select_candidates(
            &[candidate(0.8, 0.8, 0.1, 0.1, 0, 0.7)],
            1000,
            500,
        ));

        let once = suppress_overlaps(detections, SUPPRESSION_THRESHOLD);
        let twice = suppress_overlaps(once.clone(), SUPPRESSION_THRESHOLD);
        assert_eq!(once.len(), twice.len());
        for (a, b) in once.iter().zip(twice.iter()) {
            assert_eq!(a.bbox, b.bbox);
        }
    }

    #[test]
    fn suppression_crosses_class_boundaries() {
        // A person and a car reported at the identical box are one
        // object; only the higher-confidence label survives.
        let mut detections = select_candidates(&[candidate(0.5, 0.5, 0.2, 0.2, 0, 0.9)], 1000, 500);
        detections.extend(select_candidates(
            &[candidate(0.5, 0.5, 0.2, 0.2, 2, 0.8)],
            1000,
            500,
        ));
        let kept = suppress_overlaps(detections, SUPPRESSION_THRESHOLD);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].label, "person");
    }

    #[test]
    fn disjoint_boxes_of_different_classes_both_survive() {
        let mut detections = select_candidates(&[candidate(0.2, 0.2, 0.1, 0.1, 0, 0.9)], 1000, 500);
        detections.extend(select_candidates(
            &[candidate(0.8, 0.8, 0.1, 0.1, 2, 0.8)],
            1000,
            500,
        ));
        let kept = suppress_overlaps(detections, SUPPRESSION_THRESHOLD);
        assert_eq!(kept.len(), 2);
    }
}
