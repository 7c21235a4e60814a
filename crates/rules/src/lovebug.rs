// SPDX-FileCopyrightText: Copyright 2025 Au-Zone Technologies
// SPDX-License-Identifier: Apache-2.0

//! A "lovebug" is the model's class for a second rider on a kickboard.

use roadwatch_decoder::Detection;
use roadwatch_tracker::Track;
use serde::{Deserialize, Serialize};

use crate::{
    KICKBOARD_DOUBLE_RIDING, KICKBOARD_DOUBLE_RIDING_NO_HELMET, NO_HELMET, ViolationEvent,
    ViolationRule, pairing::best_partner,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LovebugConfig {
    pub kickboard_label: String,
    pub lovebug_label: String,
    pub min_kickboard: f32,
    pub min_lovebug: f32,
    pub pair_iou: f32,
    /// pairing score when the kickboard's center lies inside the lovebug box
    pub center_bonus: f32,
}

impl Default for LovebugConfig {
    fn default() -> Self {
        Self {
            kickboard_label: "kickboard".into(),
            lovebug_label: "lovebug".into(),
            min_kickboard: 0.45,
            min_lovebug: 0.40,
            pair_iou: 0.15,
            center_bonus: 0.70,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct LovebugRule {
    config: LovebugConfig,
}

impl LovebugRule {
    pub fn new(config: LovebugConfig) -> Self {
        Self { config }
    }
}

impl ViolationRule for LovebugRule {
    fn name(&self) -> &str {
        "Lovebug"
    }

    fn evaluate(&mut self, detections: &[Detection], _: &[Track], now_ms: u64) -> Vec<ViolationEvent> {
        let cfg = &self.config;
        let kickboards: Vec<&Detection> = detections
            .iter()
            .filter(|d| d.score >= cfg.min_kickboard && d.is_label(&cfg.kickboard_label))
            .collect();
        if kickboards.is_empty() {
            return Vec::new();
        }

        detections
            .iter()
            .filter(|d| d.score >= cfg.min_lovebug && d.is_label(&cfg.lovebug_label))
            .filter_map(|lb| {
                let kb = best_partner(&lb.bbox, &kickboards, cfg.pair_iou, cfg.center_bonus)?;
                Some(
                    ViolationEvent::new(
                        KICKBOARD_DOUBLE_RIDING_NO_HELMET,
                        kb.score.min(lb.score),
                        kb.bbox.union(&lb.bbox),
                        now_ms,
                    )
                    .with_announce_types(&[KICKBOARD_DOUBLE_RIDING, NO_HELMET]),
                )
            })
            .collect()
    }
}
