use anyhow::Result;

use crate::detect::backend::DetectorBackend;
use crate::detect::classes::{CLASS_LABELS, PERSON_CLASS_ID};
use crate::detect::result::{NormalizedBox, RawCandidate};

/// Stub backend for testing and model-free runs.
///
/// Emits a scripted number of person candidates per call, cycling through
/// the script. Candidates are laid out on a non-overlapping grid so they
/// survive overlap suppression, which makes scripted counts show up
/// unchanged in the final snapshot.
pub struct StubBackend {
    script: Vec<usize>,
    calls: usize,
    confidence: f32,
}

impl StubBackend {
    pub fn new() -> Self {
        Self::scripted(vec![2, 5, 9])
    }

    /// Emit exactly `script[n % len]` person candidates on the nth call.
    pub fn scripted(script: Vec<usize>) -> Self {
        Self {
            script,
            calls: 0,
            confidence: 0.9,
        }
    }

    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = confidence;
        self
    }

    fn grid_box(index: usize) -> NormalizedBox {
        // 12 columns, rows grow downward; cells never overlap.
        let col = (index % 12) as f32;
        let row = (index / 12) as f32;
        NormalizedBox {
            cx: 0.05 + 0.078 * col,
            cy: 0.08 + 0.07 * row,
            w: 0.05,
            h: 0.06,
        }
    }
}

impl Default for StubBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl DetectorBackend for StubBackend {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn detect(&mut self, _pixels: &[u8], _width: u32, _height: u32) -> Result<Vec<RawCandidate>> {
        let count = if self.script.is_empty() {
            0
        } else {
            self.script[self.calls % self.script.len()]
        };
        self.calls += 1;

        let mut candidates = Vec::with_capacity(count);
        for i in 0..count {
            let mut scores = vec![0.0f32; CLASS_LABELS.len()];
            scores[PERSON_CLASS_ID] = self.confidence;
            candidates.push(RawCandidate {
                bbox: Self::grid_box(i),
                scores,
            });
        }
        Ok(candidates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::postprocess::{
        select_candidates, suppress_overlaps, SUPPRESSION_THRESHOLD,
    };

    #[test]
    fn scripted_counts_cycle() {
        let mut backend = StubBackend::scripted(vec![1, 4]);
        assert_eq!(backend.detect(&[], 1020, 600).unwrap().len(), 1);
        assert_eq!(backend.detect(&[], 1020, 600).unwrap().len(), 4);
        assert_eq!(backend.detect(&[], 1020, 600).unwrap().len(), 1);
    }

    #[test]
    fn scripted_candidates_survive_post_processing() {
        let mut backend = StubBackend::scripted(vec![60]);
        let candidates = backend.detect(&[], 1020, 600).unwrap();
        let detections = select_candidates(&candidates, 1020, 600);
        let kept = suppress_overlaps(detections, SUPPRESSION_THRESHOLD);
        assert_eq!(kept.len(), 60);
        assert!(kept.iter().all(|d| d.label == "person"));
    }
}
