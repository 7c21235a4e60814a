// SPDX-FileCopyrightText: Copyright 2025 Au-Zone Technologies
// SPDX-License-Identifier: Apache-2.0

use roadwatch_decoder::{Detection, labels::label_in};
use roadwatch_tracker::Track;
use serde::{Deserialize, Serialize};

use crate::{NO_HELMET, ViolationEvent, ViolationRule, pairing::best_partner};

/// Share of the person box, from the top, treated as the head.
const HEAD_RATIO: f32 = 0.35;
/// Confidence scale of an event inferred from a missing helmet.
const SUSPECTED_FACTOR: f32 = 0.75;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NoHelmetConfig {
    pub vehicle_labels: Vec<String>,
    pub person_label: String,
    pub helmet_label: String,
    pub no_helmet_label: String,
    pub min_person: f32,
    pub min_vehicle: f32,
    pub min_helmet: f32,
    pub min_no_helmet: f32,
    /// IoU a person needs with a vehicle to ride it
    pub pair_iou: f32,
    /// pairing score when the person's center lies inside the vehicle
    pub center_bonus: f32,
    /// share of the smaller box a helmet box must cover on the head
    pub head_overlap: f32,
}

impl Default for NoHelmetConfig {
    fn default() -> Self {
        Self {
            vehicle_labels: vec!["kickboard".into(), "motorcycle".into(), "bicycle".into()],
            person_label: "person".into(),
            helmet_label: "helmet".into(),
            no_helmet_label: "no-helmet".into(),
            min_person: 0.40,
            min_vehicle: 0.45,
            min_helmet: 0.50,
            min_no_helmet: 0.55,
            pair_iou: 0.20,
            center_bonus: 0.65,
            head_overlap: 0.30,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct NoHelmetRule {
    config: NoHelmetConfig,
}

impl NoHelmetRule {
    pub fn new(config: NoHelmetConfig) -> Self {
        Self { config }
    }
}

impl ViolationRule for NoHelmetRule {
    fn name(&self) -> &str {
        "NoHelmet"
    }

    fn evaluate(&mut self, detections: &[Detection], _: &[Track], now_ms: u64) -> Vec<ViolationEvent> {
        let cfg = &self.config;
        let select = |label: &str, min: f32| {
            detections
                .iter()
                .filter(|d| d.score >= min && d.is_label(label))
                .collect::<Vec<&Detection>>()
        };
        let persons = select(&cfg.person_label, cfg.min_person);
        let vehicles: Vec<&Detection> = detections
            .iter()
            .filter(|d| d.score >= cfg.min_vehicle && label_in(&d.label, &cfg.vehicle_labels))
            .collect();
        if persons.is_empty() || vehicles.is_empty() {
            return Vec::new();
        }
        let helmets = select(&cfg.helmet_label, cfg.min_helmet);
        let no_helmets = select(&cfg.no_helmet_label, cfg.min_no_helmet);

        let mut events = Vec::new();
        for v in &vehicles {
            let Some(p) = best_partner(&v.bbox, &persons, cfg.pair_iou, cfg.center_bonus) else {
                continue;
            };
            let head = p.bbox.top_band(HEAD_RATIO);
            let region = p.bbox.union(&v.bbox);

            if let Some(nh) = no_helmets
                .iter()
                .find(|nh| head.overlap_ratio(&nh.bbox) >= cfg.head_overlap)
            {
                let confidence = p.score.min(v.score).min(nh.score);
                events.push(ViolationEvent::new(NO_HELMET, confidence, region, now_ms));
                continue;
            }

            let helmet_on_head = helmets
                .iter()
                .any(|h| head.overlap_ratio(&h.bbox) >= cfg.head_overlap);
            if !helmet_on_head {
                let confidence = p.score.min(v.score) * SUSPECTED_FACTOR;
                events.push(ViolationEvent::new(NO_HELMET, confidence, region, now_ms));
            }
        }
        events
    }
}
