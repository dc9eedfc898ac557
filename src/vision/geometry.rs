//! Box geometry utilities
//!
//! Axis-aligned boxes in pixel coordinates (top-left origin), IoU, and
//! greedy non-maximum suppression.

/// Axis-aligned bounding box, top-left origin, non-negative extent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BBox {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl BBox {
    pub fn new(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self { x, y, w, h }
    }

    /// Build from center-form coordinates (model output convention).
    pub fn from_center(cx: f32, cy: f32, w: f32, h: f32) -> Self {
        Self {
            x: cx - w / 2.0,
            y: cy - h / 2.0,
            w,
            h,
        }
    }

    pub fn right(&self) -> f32 {
        self.x + self.w
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.h
    }

    pub fn area(&self) -> f32 {
        self.w * self.h
    }

    /// IoU (intersection over union) with another box. Zero union yields 0.
    pub fn iou(&self, other: &BBox) -> f32 {
        let ix = self.x.max(other.x);
        let iy = self.y.max(other.y);
        let ix2 = self.right().min(other.right());
        let iy2 = self.bottom().min(other.bottom());

        let inter = (ix2 - ix).max(0.0) * (iy2 - iy).max(0.0);
        if inter == 0.0 {
            return 0.0;
        }
        let union = self.area() + other.area() - inter;
        if union <= 0.0 {
            return 0.0;
        }
        inter / union
    }

    /// Rescale by independent horizontal/vertical factors (model-input space
    /// to display space).
    pub fn scaled(&self, scale_x: f32, scale_y: f32) -> BBox {
        BBox {
            x: self.x * scale_x,
            y: self.y * scale_y,
            w: self.w * scale_x,
            h: self.h * scale_y,
        }
    }

    /// Coordinates are usable for cropping and drawing.
    pub fn is_valid(&self) -> bool {
        self.x.is_finite()
            && self.y.is_finite()
            && self.w.is_finite()
            && self.h.is_finite()
            && self.w > 0.0
            && self.h > 0.0
    }
}

/// A scored candidate box. Ephemeral: produced once per inference cycle and
/// discarded after selection.
#[derive(Debug, Clone, Copy)]
pub struct Detection {
    pub bbox: BBox,
    pub confidence: f32,
}

/// Greedy NMS: sort by confidence descending, keep the best remaining box,
/// suppress everything overlapping it beyond `iou_threshold`.
pub fn nms(mut detections: Vec<Detection>, iou_threshold: f32) -> Vec<Detection> {
    detections.sort_unstable_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut kept: Vec<Detection> = Vec::new();
    let mut suppressed = vec![false; detections.len()];

    for i in 0..detections.len() {
        if suppressed[i] {
            continue;
        }
        kept.push(detections[i]);
        for j in (i + 1)..detections.len() {
            if detections[i].bbox.iou(&detections[j].bbox) > iou_threshold {
                suppressed[j] = true;
            }
        }
    }

    kept
}

#[cfg(test)]
mod tests {
    use super::*;

    fn det(x: f32, y: f32, w: f32, h: f32, confidence: f32) -> Detection {
        Detection {
            bbox: BBox::new(x, y, w, h),
            confidence,
        }
    }

    #[test]
    fn test_iou_with_self_is_one() {
        let b = BBox::new(10.0, 20.0, 50.0, 30.0);
        assert!((b.iou(&b) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_iou_disjoint_is_zero() {
        let a = BBox::new(0.0, 0.0, 10.0, 10.0);
        let b = BBox::new(100.0, 100.0, 10.0, 10.0);
        assert_eq!(a.iou(&b), 0.0);
    }

    #[test]
    fn test_iou_degenerate_boxes_do_not_divide_by_zero() {
        let a = BBox::new(5.0, 5.0, 0.0, 0.0);
        let b = BBox::new(5.0, 5.0, 0.0, 0.0);
        let iou = a.iou(&b);
        assert!(iou.is_finite());
        assert_eq!(iou, 0.0);
    }

    #[test]
    fn test_iou_partial_overlap() {
        // Two 10x10 boxes sharing a 5x10 strip: inter 50, union 150
        let a = BBox::new(0.0, 0.0, 10.0, 10.0);
        let b = BBox::new(5.0, 0.0, 10.0, 10.0);
        assert!((a.iou(&b) - 50.0 / 150.0).abs() < 1e-6);
    }

    #[test]
    fn test_from_center_form() {
        let b = BBox::from_center(100.0, 50.0, 40.0, 20.0);
        assert_eq!(b, BBox::new(80.0, 40.0, 40.0, 20.0));
    }

    #[test]
    fn test_scaled_uses_independent_factors() {
        let b = BBox::new(100.0, 100.0, 50.0, 20.0).scaled(2.0, 1.5);
        assert_eq!(b, BBox::new(200.0, 150.0, 100.0, 30.0));
    }

    #[test]
    fn test_nms_suppresses_overlapping_boxes() {
        let input = vec![
            det(0.0, 0.0, 10.0, 10.0, 0.9),
            det(1.0, 1.0, 10.0, 10.0, 0.8), // heavy overlap with the first
            det(100.0, 100.0, 10.0, 10.0, 0.7),
        ];
        let kept = nms(input, 0.45);
        assert_eq!(kept.len(), 2);
        assert!((kept[0].confidence - 0.9).abs() < f32::EPSILON);
        assert!((kept[1].confidence - 0.7).abs() < f32::EPSILON);
    }

    #[test]
    fn test_nms_output_has_no_pair_above_threshold() {
        let threshold = 0.45;
        let input: Vec<Detection> = (0..20)
            .map(|i| det(i as f32 * 3.0, 0.0, 20.0, 20.0, 0.5 + (i as f32) * 0.01))
            .collect();

        let kept = nms(input, threshold);
        for i in 0..kept.len() {
            for j in (i + 1)..kept.len() {
                assert!(kept[i].bbox.iou(&kept[j].bbox) <= threshold);
            }
        }
    }

    #[test]
    fn test_nms_output_is_subset_of_input() {
        let input = vec![
            det(0.0, 0.0, 10.0, 10.0, 0.6),
            det(50.0, 50.0, 10.0, 10.0, 0.4),
        ];
        let kept = nms(input.clone(), 0.45);
        for k in &kept {
            assert!(input.iter().any(|d| d.bbox == k.bbox));
        }
    }

    #[test]
    fn test_nms_is_order_independent_as_a_set() {
        let a = vec![
            det(0.0, 0.0, 10.0, 10.0, 0.9),
            det(2.0, 0.0, 10.0, 10.0, 0.5),
            det(40.0, 0.0, 10.0, 10.0, 0.7),
        ];
        let mut b = a.clone();
        b.reverse();

        let mut boxes_a: Vec<_> = nms(a, 0.45).iter().map(|d| d.bbox.x as i32).collect();
        let mut boxes_b: Vec<_> = nms(b, 0.45).iter().map(|d| d.bbox.x as i32).collect();
        boxes_a.sort_unstable();
        boxes_b.sort_unstable();
        assert_eq!(boxes_a, boxes_b);
    }
}
