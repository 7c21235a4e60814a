// SPDX-FileCopyrightText: Copyright 2025 Au-Zone Technologies
// SPDX-License-Identifier: Apache-2.0

use roadwatch_decoder::{Detection, labels::label_in};
use roadwatch_tracker::Track;
use serde::{Deserialize, Serialize};

use crate::{SIGNAL_VIOLATION, ViolationEvent, ViolationRule};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrosswalkConfig {
    pub vehicle_labels: Vec<String>,
    /// a detection is a crosswalk when its label contains one of these
    pub crosswalk_labels: Vec<String>,
    pub red_signal_labels: Vec<String>,
    pub min_vehicle_score: f32,
    pub min_crosswalk_score: f32,
    pub min_red_signal_score: f32,
    pub invade_iou: f32,
    /// also accept a vehicle whose center lies inside the crosswalk
    pub center_inside: bool,
    /// only fire while a red signal is visible
    pub require_red_signal: bool,
}

impl Default for CrosswalkConfig {
    fn default() -> Self {
        Self {
            vehicle_labels: vec!["motorcycle".into(), "car".into(), "bicycle".into()],
            crosswalk_labels: vec!["crosswalk".into(), "zebra_crossing".into()],
            red_signal_labels: vec!["vehicular_signal_red".into()],
            min_vehicle_score: 0.40,
            min_crosswalk_score: 0.35,
            min_red_signal_score: 0.45,
            invade_iou: 0.20,
            center_inside: false,
            require_red_signal: false,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CrosswalkInvadeRule {
    config: CrosswalkConfig,
}

impl CrosswalkInvadeRule {
    pub fn new(config: CrosswalkConfig) -> Self {
        Self { config }
    }

    fn is_crosswalk(&self, d: &Detection) -> bool {
        let label = d.label.to_lowercase();
        d.score >= self.config.min_crosswalk_score
            && self
                .config
                .crosswalk_labels
                .iter()
                .any(|c| label.contains(&c.to_lowercase()))
    }
}

impl ViolationRule for CrosswalkInvadeRule {
    fn name(&self) -> &str {
        "CrosswalkInvade"
    }

    fn evaluate(&mut self, detections: &[Detection], _: &[Track], now_ms: u64) -> Vec<ViolationEvent> {
        let cfg = &self.config;
        let vehicles: Vec<&Detection> = detections
            .iter()
            .filter(|d| d.score >= cfg.min_vehicle_score && label_in(&d.label, &cfg.vehicle_labels))
            .collect();
        let crosswalks: Vec<&Detection> = detections.iter().filter(|d| self.is_crosswalk(d)).collect();
        if vehicles.is_empty() || crosswalks.is_empty() {
            return Vec::new();
        }

        let red_cap = if cfg.require_red_signal {
            let best_red = detections
                .iter()
                .filter(|d| {
                    d.score >= cfg.min_red_signal_score && label_in(&d.label, &cfg.red_signal_labels)
                })
                .map(|d| d.score)
                .reduce(f32::max);
            match best_red {
                Some(score) => score,
                None => return Vec::new(),
            }
        } else {
            f32::INFINITY
        };

        let mut events = Vec::new();
        for v in &vehicles {
            for cw in &crosswalks {
                let invades = v.bbox.iou(&cw.bbox) >= cfg.invade_iou
                    || (cfg.center_inside && cw.bbox.contains_center_of(&v.bbox));
                if !invades {
                    continue;
                }
                let confidence = v.score.min(cw.score).min(red_cap);
                events.push(ViolationEvent::new(
                    SIGNAL_VIOLATION,
                    confidence,
                    v.bbox.union(&cw.bbox),
                    now_ms,
                ));
            }
        }
        events
    }
}
