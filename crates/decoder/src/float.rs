// SPDX-FileCopyrightText: Copyright 2025 Au-Zone Technologies
// SPDX-License-Identifier: Apache-2.0

use crate::{BoundingBox, Detection};
use ndarray::{
    ArrayView2, Axis, Zip,
    parallel::prelude::{IntoParallelIterator, ParallelIterator as _},
};
use num_traits::{AsPrimitive, Float};

/// Number of anchors inspected when guessing the coordinate space.
pub const PROBE_ANCHORS: usize = 32;
/// Largest coordinate magnitude still considered normalized.
pub const NORMALIZED_PROBE_LIMIT: f32 = 1.05;

/// Maps model-space center boxes onto the original frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameTransform {
    pub scale_x: f32,
    pub scale_y: f32,
    pub frame_width: f32,
    pub frame_height: f32,
}

impl FrameTransform {
    /// Coordinates are already normalized to the model input.
    pub fn normalized(frame_width: u32, frame_height: u32) -> Self {
        Self {
            scale_x: frame_width as f32,
            scale_y: frame_height as f32,
            frame_width: frame_width as f32,
            frame_height: frame_height as f32,
        }
    }

    /// Coordinates are in model input pixels.
    pub fn input_pixels(input_width: u32, input_height: u32, frame_width: u32, frame_height: u32) -> Self {
        Self {
            scale_x: frame_width as f32 / input_width as f32,
            scale_y: frame_height as f32 / input_height as f32,
            frame_width: frame_width as f32,
            frame_height: frame_height as f32,
        }
    }

    /// Center-form model box to a clamped, canonical, normalized corner box.
    pub fn apply(&self, cx: f32, cy: f32, w: f32, h: f32) -> BoundingBox {
        let hw = w * 0.5;
        let hh = h * 0.5;
        let to_frame = |v: f32, scale: f32, size: f32| {
            let px = v * scale;
            if px.is_nan() { 0.0 } else { px.clamp(0.0, size) / size }
        };
        BoundingBox {
            xmin: to_frame(cx - hw, self.scale_x, self.frame_width),
            ymin: to_frame(cy - hh, self.scale_y, self.frame_height),
            xmax: to_frame(cx + hw, self.scale_x, self.frame_width),
            ymax: to_frame(cy + hh, self.scale_y, self.frame_height),
        }
        .clamp_unit()
        .to_canonical()
    }
}

#[inline(always)]
fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

/// Best class and score of one anchor. Ties keep the lowest index and NaN
/// scores never win.
pub fn arg_max<T: AsPrimitive<f32>>(
    scores: impl IntoIterator<Item = T>,
    apply_sigmoid: bool,
) -> Option<(f32, usize)> {
    let mut best: Option<(f32, usize)> = None;
    for (ind, s) in scores.into_iter().enumerate() {
        let mut s: f32 = s.as_();
        if apply_sigmoid {
            s = sigmoid(s);
        }
        match best {
            Some((max, _)) if !(s > max) => {}
            _ if s.is_nan() => {}
            _ => best = Some((s, ind)),
        }
    }
    best
}

/// Guesses whether the box channels hold normalized coordinates by looking at
/// the first anchors.
pub fn probe_normalized<T: Float + AsPrimitive<f32>>(boxes: ArrayView2<T>) -> bool {
    let count = boxes.len_of(Axis(1)).min(PROBE_ANCHORS);
    let mut max_abs = 0.0f32;
    for col in boxes.columns().into_iter().take(count) {
        for v in col.iter() {
            let v: f32 = v.as_();
            if v.is_finite() {
                max_abs = max_abs.max(v.abs());
            }
        }
    }
    max_abs <= NORMALIZED_PROBE_LIMIT
}

/// Decodes channel-major `boxes` (4 x N, center form) and `scores` (C x N)
/// into detections above `threshold`. The output keeps anchor order.
pub fn decode_boxes_float<T>(
    threshold: f32,
    apply_sigmoid: bool,
    scores: ArrayView2<T>,
    boxes: ArrayView2<T>,
    transform: &FrameTransform,
    labels: &[String],
) -> Vec<Detection>
where
    T: Float + AsPrimitive<f32> + Send + Sync,
{
    debug_assert_eq!(scores.len_of(Axis(1)), boxes.len_of(Axis(1)));
    Zip::from(scores.columns())
        .and(boxes.columns())
        .into_par_iter()
        .filter_map(|(score, bbox)| {
            let (score_, label) = arg_max(score.iter().copied(), apply_sigmoid)?;
            if !(score_ >= threshold) {
                return None;
            }
            let bbox = transform.apply(bbox[0].as_(), bbox[1].as_(), bbox[2].as_(), bbox[3].as_());
            let label = labels
                .get(label)
                .cloned()
                .unwrap_or_else(|| label.to_string());
            Some(Detection {
                label,
                score: score_,
                bbox,
            })
        })
        .collect()
}

/// Greedy non-max suppression. Detections are stably sorted by descending
/// score; a detection is dropped when its IoU with an already kept detection
/// is at least `iou`. When `class_agnostic` is false only detections sharing
/// a label suppress each other.
pub fn nms(iou: f32, class_agnostic: bool, mut boxes: Vec<Detection>) -> Vec<Detection> {
    // Stable sort, equal scores keep their input order.
    boxes.sort_by(|a, b| b.score.total_cmp(&a.score));
    let mut suppressed = vec![false; boxes.len()];
    for i in 0..boxes.len() {
        if suppressed[i] {
            continue;
        }
        for j in (i + 1)..boxes.len() {
            if suppressed[j] {
                continue;
            }
            if !class_agnostic && boxes[i].label != boxes[j].label {
                continue;
            }
            if boxes[i].bbox.iou(&boxes[j].bbox) >= iou {
                suppressed[j] = true;
            }
        }
    }

    boxes
        .into_iter()
        .zip(suppressed)
        .filter_map(|(b, s)| (!s).then_some(b))
        .collect()
}
