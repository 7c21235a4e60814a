// SPDX-FileCopyrightText: Copyright 2025 Au-Zone Technologies
// SPDX-License-Identifier: Apache-2.0

use log::debug;
use serde::{Deserialize, Serialize};

use crate::{ThrottleConfig, ViolationEvent, ViolationThrottle};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregatorConfig {
    /// collapse same-kind candidates of equal confidence percentage within a
    /// frame before throttling
    pub frame_dedup: bool,
    pub throttle: ThrottleConfig,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            frame_dedup: true,
            throttle: ThrottleConfig::default(),
        }
    }
}

/// Keeps the strongest event of every `(kind, confidence percent)` group.
/// Groups keep the order of their first member.
pub fn collapse_frame(events: Vec<ViolationEvent>) -> Vec<ViolationEvent> {
    let mut out: Vec<ViolationEvent> = Vec::with_capacity(events.len());
    let key = |e: &ViolationEvent| (e.kind.clone(), (e.confidence * 100.0) as i32);
    for e in events {
        match out.iter().position(|o| key(o) == key(&e)) {
            Some(i) if e.confidence > out[i].confidence => out[i] = e,
            Some(_) => {}
            None => out.push(e),
        }
    }
    out
}

#[derive(Debug, Clone, Default)]
pub struct ViolationAggregator {
    frame_dedup: bool,
    throttle: ViolationThrottle,
}

impl ViolationAggregator {
    pub fn new(config: AggregatorConfig) -> Self {
        Self {
            frame_dedup: config.frame_dedup,
            throttle: ViolationThrottle::new(config.throttle),
        }
    }

    /// Filters one frame of candidate events down to the ones to report.
    pub fn aggregate(&mut self, events: Vec<ViolationEvent>, now_ms: u64) -> Vec<ViolationEvent> {
        let candidates = events.len();
        let events = if self.frame_dedup {
            collapse_frame(events)
        } else {
            events
        };
        let accepted: Vec<ViolationEvent> = events
            .into_iter()
            .filter(|e| self.throttle.allow(e, now_ms))
            .collect();
        if accepted.len() < candidates {
            debug!(
                "aggregated {} candidate(s) into {} event(s)",
                candidates,
                accepted.len()
            );
        }
        accepted
    }

    pub fn reset(&mut self) {
        self.throttle.reset();
    }
}
