// SPDX-FileCopyrightText: Copyright 2025 Au-Zone Technologies
// SPDX-License-Identifier: Apache-2.0

use roadwatch_decoder::Detection;
use roadwatch_tracker::Track;
use serde::{Deserialize, Serialize};

use crate::{NO_PLATE, ViolationEvent, ViolationRule};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IllegalMotorcycleConfig {
    /// class name as spelled by the model
    pub label: String,
    pub min_illegal_score: f32,
    /// normalized area below which boxes are treated as distant noise
    pub min_box_area: f32,
}

impl Default for IllegalMotorcycleConfig {
    fn default() -> Self {
        Self {
            label: "ileegal_motorcycle".into(),
            min_illegal_score: 0.50,
            min_box_area: 0.002,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct IllegalMotorcycleRule {
    config: IllegalMotorcycleConfig,
}

impl IllegalMotorcycleRule {
    pub fn new(config: IllegalMotorcycleConfig) -> Self {
        Self { config }
    }
}

impl ViolationRule for IllegalMotorcycleRule {
    fn name(&self) -> &str {
        "IllegalMotorcycle"
    }

    fn evaluate(&mut self, detections: &[Detection], _: &[Track], now_ms: u64) -> Vec<ViolationEvent> {
        let cfg = &self.config;
        detections
            .iter()
            .filter(|d| {
                d.score >= cfg.min_illegal_score
                    && d.is_label(&cfg.label)
                    && d.bbox.area() >= cfg.min_box_area
            })
            .map(|d| ViolationEvent::new(NO_PLATE, d.score, d.bbox, now_ms))
            .collect()
    }
}
