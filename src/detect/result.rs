use serde::Serialize;

/// A detector-space box: center and size, each normalized to 0..1 of the
/// frame it was produced from.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NormalizedBox {
    pub cx: f32,
    pub cy: f32,
    pub w: f32,
    pub h: f32,
}

/// Raw per-candidate detector output before any selection has happened:
/// one score per known class plus the candidate's box.
#[derive(Clone, Debug)]
pub struct RawCandidate {
    pub bbox: NormalizedBox,
    pub scores: Vec<f32>,
}

/// An axis-aligned pixel-space box. The origin may be negative when a
/// detection's center sits near the frame edge; drawing clips to the frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct BoundingBox {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl BoundingBox {
    /// Intersection-over-union with another box, in [0, 1].
    pub fn iou(&self, other: &BoundingBox) -> f32 {
        let ax2 = self.x + self.width as i32;
        let ay2 = self.y + self.height as i32;
        let bx2 = other.x + other.width as i32;
        let by2 = other.y + other.height as i32;

        let ix = (ax2.min(bx2) - self.x.max(other.x)).max(0) as f32;
        let iy = (ay2.min(by2) - self.y.max(other.y)).max(0) as f32;
        let intersection = ix * iy;

        let area_a = (self.width * self.height) as f32;
        let area_b = (other.width * other.height) as f32;
        let union = area_a + area_b - intersection;
        if union <= 0.0 {
            return 0.0;
        }
        intersection / union
    }
}

/// A finished detection: selected class, its confidence, and a pixel box.
#[derive(Clone, Debug, Serialize)]
pub struct Detection {
    pub label: &'static str,
    pub class_id: usize,
    pub confidence: f32,
    pub bbox: BoundingBox,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn iou_of_identical_boxes_is_one() {
        let a = BoundingBox {
            x: 10,
            y: 10,
            width: 40,
            height: 40,
        };
        assert!((a.iou(&a) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn iou_of_disjoint_boxes_is_zero() {
        let a = BoundingBox {
            x: 0,
            y: 0,
            width: 10,
            height: 10,
        };
        let b = BoundingBox {
            x: 100,
            y: 100,
            width: 10,
            height: 10,
        };
        assert_eq!(a.iou(&b), 0.0);
    }

    #[test]
    fn iou_of_half_overlap() {
        let a = BoundingBox {
            x: 0,
            y: 0,
            width: 10,
            height: 10,
        };
        let b = BoundingBox {
            x: 5,
            y: 0,
            width: 10,
            height: 10,
        };
        // Intersection 50, union 150.
        assert!((a.iou(&b) - 1.0 / 3.0).abs() < 1e-6);
    }
}
