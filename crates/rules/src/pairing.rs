// SPDX-FileCopyrightText: Copyright 2025 Au-Zone Technologies
// SPDX-License-Identifier: Apache-2.0

use roadwatch_decoder::{BoundingBox, Detection};

/// Picks the candidate that best belongs to `anchor`. A candidate whose
/// center lies inside `anchor` scores `center_bonus`, any other candidate
/// scores its IoU and needs at least `min_iou`. The first candidate wins ties.
pub(crate) fn best_partner<'a>(
    anchor: &BoundingBox,
    candidates: &[&'a Detection],
    min_iou: f32,
    center_bonus: f32,
) -> Option<&'a Detection> {
    let mut best = None;
    let mut best_score = 0.0f32;
    for &c in candidates {
        let iou = anchor.iou(&c.bbox);
        let center_inside = anchor.contains_center_of(&c.bbox);
        let score = if center_inside { center_bonus } else { iou };
        if score > best_score && (iou >= min_iou || center_inside) {
            best_score = score;
            best = Some(c);
        }
    }
    best
}
