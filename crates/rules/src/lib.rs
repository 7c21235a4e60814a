// SPDX-FileCopyrightText: Copyright 2025 Au-Zone Technologies
// SPDX-License-Identifier: Apache-2.0

//! roadwatch - Violation rules
//!
//! Independent rules evaluated over one frame of detections and tracks, and
//! the aggregator that collapses and throttles their candidate events.

use roadwatch_decoder::{BoundingBox, Detection};
use roadwatch_tracker::Track;
use serde::{Deserialize, Serialize};

pub mod aggregator;
pub mod crosswalk;
pub mod illegal_motorcycle;
pub mod lovebug;
pub mod no_helmet;
mod pairing;
pub mod red_signal;
pub mod throttle;

pub use aggregator::{AggregatorConfig, ViolationAggregator};
pub use crosswalk::{CrosswalkConfig, CrosswalkInvadeRule};
pub use illegal_motorcycle::{IllegalMotorcycleConfig, IllegalMotorcycleRule};
pub use lovebug::{LovebugConfig, LovebugRule};
pub use no_helmet::{NoHelmetConfig, NoHelmetRule};
pub use red_signal::{RedSignalConfig, RedSignalCrosswalkRule, SignalPhaseState};
pub use throttle::{ThrottleConfig, ViolationThrottle};

/// Vehicle entered a crosswalk against a red signal.
pub const SIGNAL_VIOLATION: &str = "신호위반";
/// Rider without a helmet.
pub const NO_HELMET: &str = "헬멧 미착용";
/// Two riders on one kickboard.
pub const KICKBOARD_DOUBLE_RIDING: &str = "킥보드 2인이상";
/// Combined kickboard event, announced as double riding and no helmet.
pub const KICKBOARD_DOUBLE_RIDING_NO_HELMET: &str = "킥보드 2인이상·헬멧 미착용";
/// Motorcycle without a license plate.
pub const NO_PLATE: &str = "무번호판";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViolationEvent {
    pub kind: String,
    pub confidence: f32,
    /// phrases to announce; a single entry equal to `kind` unless the rule
    /// reports a combined violation
    pub announce_types: Vec<String>,
    pub region: BoundingBox,
    pub timestamp_ms: u64,
}

impl ViolationEvent {
    pub fn new(kind: &str, confidence: f32, region: BoundingBox, timestamp_ms: u64) -> Self {
        Self {
            kind: kind.to_string(),
            confidence,
            announce_types: vec![kind.to_string()],
            region,
            timestamp_ms,
        }
    }

    pub fn with_announce_types(mut self, announce_types: &[&str]) -> Self {
        self.announce_types = announce_types.iter().map(|s| s.to_string()).collect();
        self
    }
}

/// One violation check. Rules see the same frame inputs and never each
/// other's output.
pub trait ViolationRule: Send {
    fn name(&self) -> &str;

    fn evaluate(
        &mut self,
        detections: &[Detection],
        tracks: &[Track],
        now_ms: u64,
    ) -> Vec<ViolationEvent>;

    /// Clears cross-frame state. Stateless rules have nothing to do.
    fn reset(&mut self) {}
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RulesConfig {
    pub crosswalk: CrosswalkConfig,
    pub no_helmet: NoHelmetConfig,
    pub lovebug: LovebugConfig,
    pub illegal_motorcycle: IllegalMotorcycleConfig,
    pub red_signal: RedSignalConfig,
}

/// Rules evaluated in a fixed order: crosswalk invasion, no helmet, lovebug,
/// illegal motorcycle, red signal crosswalk.
pub struct RuleSet {
    rules: Vec<Box<dyn ViolationRule>>,
}

impl RuleSet {
    pub fn new(rules: Vec<Box<dyn ViolationRule>>) -> Self {
        Self { rules }
    }

    pub fn from_config(config: &RulesConfig) -> Self {
        Self::new(vec![
            Box::new(CrosswalkInvadeRule::new(config.crosswalk.clone())),
            Box::new(NoHelmetRule::new(config.no_helmet.clone())),
            Box::new(LovebugRule::new(config.lovebug.clone())),
            Box::new(IllegalMotorcycleRule::new(config.illegal_motorcycle.clone())),
            Box::new(RedSignalCrosswalkRule::new(config.red_signal.clone())),
        ])
    }

    pub fn names(&self) -> Vec<&str> {
        self.rules.iter().map(|r| r.name()).collect()
    }

    /// Candidate events of every rule, concatenated in rule order.
    pub fn evaluate(
        &mut self,
        detections: &[Detection],
        tracks: &[Track],
        now_ms: u64,
    ) -> Vec<ViolationEvent> {
        let mut events = Vec::new();
        for rule in &mut self.rules {
            let found = rule.evaluate(detections, tracks, now_ms);
            if !found.is_empty() {
                log::debug!("{} produced {} candidate(s)", rule.name(), found.len());
            }
            events.extend(found);
        }
        events
    }

    pub fn reset(&mut self) {
        for rule in &mut self.rules {
            rule.reset();
        }
    }
}

impl Default for RuleSet {
    fn default() -> Self {
        Self::from_config(&RulesConfig::default())
    }
}

impl std::fmt::Debug for RuleSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}
