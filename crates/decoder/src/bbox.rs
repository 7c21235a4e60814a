// SPDX-FileCopyrightText: Copyright 2025 Au-Zone Technologies
// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};

/// Guards the IoU denominator against zero-area unions.
pub const IOU_EPSILON: f32 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BoundingBox {
    /// left-most normalized coordinate of the bounding box
    pub xmin: f32,
    /// top-most normalized coordinate of the bounding box
    pub ymin: f32,
    /// right-most normalized coordinate of the bounding box
    pub xmax: f32,
    /// bottom-most normalized coordinate of the bounding box
    pub ymax: f32,
}

impl BoundingBox {
    pub const fn new(xmin: f32, ymin: f32, xmax: f32, ymax: f32) -> Self {
        Self {
            xmin,
            ymin,
            xmax,
            ymax,
        }
    }

    /// Builds a box from its top-left corner and size.
    pub fn from_xywh(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self::new(x, y, x + w, y + h)
    }

    /// Builds a box from its center and size.
    pub fn from_cxcywh(cx: f32, cy: f32, w: f32, h: f32) -> Self {
        let (hw, hh) = (w * 0.5, h * 0.5);
        Self::new(cx - hw, cy - hh, cx + hw, cy + hh)
    }

    /// Top-left anchored `(x, y, w, h)`.
    pub fn to_xywh(&self) -> [f32; 4] {
        [self.xmin, self.ymin, self.width(), self.height()]
    }

    /// Transforms BoundingBox so that xmin <= xmax and ymin <= ymax
    pub fn to_canonical(&self) -> Self {
        let xmin = self.xmin.min(self.xmax);
        let xmax = self.xmin.max(self.xmax);
        let ymin = self.ymin.min(self.ymax);
        let ymax = self.ymin.max(self.ymax);
        BoundingBox {
            xmin,
            ymin,
            xmax,
            ymax,
        }
    }

    /// Clamps every coordinate into `[0, 1]`. NaN coordinates become 0.
    pub fn clamp_unit(&self) -> Self {
        BoundingBox {
            xmin: clamp01(self.xmin),
            ymin: clamp01(self.ymin),
            xmax: clamp01(self.xmax),
            ymax: clamp01(self.ymax),
        }
    }

    pub fn width(&self) -> f32 {
        self.xmax - self.xmin
    }

    pub fn height(&self) -> f32 {
        self.ymax - self.ymin
    }

    /// Area with negative extents treated as empty.
    pub fn area(&self) -> f32 {
        self.width().max(0.0) * self.height().max(0.0)
    }

    pub fn center(&self) -> (f32, f32) {
        (
            (self.xmin + self.xmax) * 0.5,
            (self.ymin + self.ymax) * 0.5,
        )
    }

    pub fn center_x(&self) -> f32 {
        (self.xmin + self.xmax) * 0.5
    }

    pub fn contains_point(&self, x: f32, y: f32) -> bool {
        x >= self.xmin && x <= self.xmax && y >= self.ymin && y <= self.ymax
    }

    /// True when the center of `other` lies inside this box.
    pub fn contains_center_of(&self, other: &BoundingBox) -> bool {
        let (cx, cy) = other.center();
        self.contains_point(cx, cy)
    }

    pub fn intersection_area(&self, other: &BoundingBox) -> f32 {
        let left = self.xmin.max(other.xmin);
        let top = self.ymin.max(other.ymin);
        let right = self.xmax.min(other.xmax);
        let bottom = self.ymax.min(other.ymax);
        (right - left).max(0.0) * (bottom - top).max(0.0)
    }

    /// Intersection over union. Returns 0 when either box has a non-positive
    /// width or height.
    pub fn iou(&self, other: &BoundingBox) -> f32 {
        if self.width() <= 0.0
            || self.height() <= 0.0
            || other.width() <= 0.0
            || other.height() <= 0.0
        {
            return 0.0;
        }
        let intersection = self.intersection_area(other);
        let union = self.area() + other.area() - intersection + IOU_EPSILON;
        (intersection / union).clamp(0.0, 1.0)
    }

    /// Intersection divided by the area of the smaller box.
    pub fn overlap_ratio(&self, other: &BoundingBox) -> f32 {
        let small = self.area().min(other.area());
        if small <= 0.0 {
            return 0.0;
        }
        self.intersection_area(other) / small
    }

    /// Smallest box enclosing both boxes.
    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        BoundingBox {
            xmin: self.xmin.min(other.xmin),
            ymin: self.ymin.min(other.ymin),
            xmax: self.xmax.max(other.xmax),
            ymax: self.ymax.max(other.ymax),
        }
    }

    /// The top `ratio` of the box, used as the head region of a person.
    pub fn top_band(&self, ratio: f32) -> BoundingBox {
        BoundingBox {
            ymax: self.ymin + self.height() * ratio,
            ..*self
        }
    }

    pub fn is_finite(&self) -> bool {
        self.xmin.is_finite() && self.ymin.is_finite() && self.xmax.is_finite() && self.ymax.is_finite()
    }
}

impl From<BoundingBox> for [f32; 4] {
    fn from(b: BoundingBox) -> Self {
        [b.xmin, b.ymin, b.xmax, b.ymax]
    }
}

impl From<[f32; 4]> for BoundingBox {
    fn from(arr: [f32; 4]) -> Self {
        BoundingBox {
            xmin: arr[0],
            ymin: arr[1],
            xmax: arr[2],
            ymax: arr[3],
        }
    }
}

fn clamp01(v: f32) -> f32 {
    if v.is_nan() { 0.0 } else { v.clamp(0.0, 1.0) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_iou_identical_boxes() {
        let a = BoundingBox::new(0.1, 0.1, 0.5, 0.5);
        assert!((a.iou(&a) - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_iou_symmetric_and_bounded() {
        let boxes = [
            BoundingBox::new(0.0, 0.0, 0.5, 0.5),
            BoundingBox::new(0.25, 0.25, 0.75, 0.75),
            BoundingBox::new(0.6, 0.1, 0.9, 0.95),
            BoundingBox::new(0.0, 0.0, 1.0, 1.0),
            BoundingBox::new(0.3, 0.3, 0.3, 0.8),
        ];
        for a in &boxes {
            for b in &boxes {
                let ab = a.iou(b);
                let ba = b.iou(a);
                assert_eq!(ab, ba, "{a:?} vs {b:?}");
                assert!((0.0..=1.0).contains(&ab));
            }
        }
    }

    #[test]
    fn test_iou_degenerate_is_zero() {
        let line = BoundingBox::new(0.3, 0.3, 0.3, 0.8);
        let a = BoundingBox::new(0.0, 0.0, 1.0, 1.0);
        assert_eq!(line.iou(&a), 0.0);
        assert_eq!(line.iou(&line), 0.0);
    }

    #[test]
    fn test_iou_partial_overlap() {
        let a = BoundingBox::new(0.0, 0.0, 0.5, 0.5);
        let b = BoundingBox::new(0.25, 0.25, 0.75, 0.75);
        // Intersection: 0.0625, Union: 0.4375
        assert!((a.iou(&b) - 0.142857).abs() < 1e-3);
    }

    #[test]
    fn test_overlap_ratio_uses_smaller_box() {
        let head = BoundingBox::new(0.4, 0.1, 0.6, 0.2);
        let big = BoundingBox::new(0.0, 0.0, 1.0, 1.0);
        assert!((head.overlap_ratio(&big) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_top_band_and_union() {
        let person = BoundingBox::new(0.2, 0.2, 0.4, 0.6);
        let head = person.top_band(0.35);
        assert!((head.ymax - 0.34).abs() < 1e-6);
        assert_eq!(head.xmin, person.xmin);

        let u = person.union(&BoundingBox::new(0.5, 0.1, 0.7, 0.3));
        assert_eq!(u, BoundingBox::new(0.2, 0.1, 0.7, 0.6));
    }

    #[test]
    fn test_xywh_roundtrip() {
        let b = BoundingBox::from_xywh(0.1, 0.2, 0.3, 0.4);
        let [x, y, w, h] = b.to_xywh();
        assert!((x - 0.1).abs() < 1e-6);
        assert!((y - 0.2).abs() < 1e-6);
        assert!((w - 0.3).abs() < 1e-6);
        assert!((h - 0.4).abs() < 1e-6);
    }

    #[test]
    fn test_clamp_and_canonical() {
        let b = BoundingBox::new(1.4, -0.2, 0.3, f32::NAN)
            .clamp_unit()
            .to_canonical();
        assert_eq!(b, BoundingBox::new(0.3, 0.0, 1.0, 0.0));
    }
}
