// SPDX-FileCopyrightText: Copyright 2025 Au-Zone Technologies
// SPDX-License-Identifier: Apache-2.0

use std::collections::{BTreeMap, HashMap};

use log::trace;
use roadwatch_decoder::BoundingBox;
use serde::{Deserialize, Serialize};

use crate::ViolationEvent;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThrottleConfig {
    pub cooldown_ms: u64,
    /// per-kind cooldown overrides
    pub kind_cooldown_ms: BTreeMap<String, u64>,
    /// IoU at which a repeated region counts as the same violation
    pub dedup_iou: f32,
    /// kinds throttled by time alone, regardless of region
    pub global_kinds: Vec<String>,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            cooldown_ms: 10_000,
            kind_cooldown_ms: BTreeMap::new(),
            dedup_iou: 0.50,
            global_kinds: Vec::new(),
        }
    }
}

/// Suppresses repeats of recently emitted events. Lives for one detection
/// session.
#[derive(Debug, Clone, Default)]
pub struct ViolationThrottle {
    config: ThrottleConfig,
    last_emitted_at: HashMap<String, u64>,
    last_emitted_region: HashMap<String, BoundingBox>,
}

impl ViolationThrottle {
    pub fn new(config: ThrottleConfig) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    pub fn cooldown(&self, kind: &str) -> u64 {
        self.config
            .kind_cooldown_ms
            .get(kind)
            .copied()
            .unwrap_or(self.config.cooldown_ms)
    }

    fn is_global(&self, kind: &str) -> bool {
        self.config.global_kinds.iter().any(|k| k == kind)
    }

    /// Returns true and records the event unless it repeats a recent one.
    pub fn allow(&mut self, event: &ViolationEvent, now_ms: u64) -> bool {
        let kind = event.kind.as_str();
        let cooldown = self.cooldown(kind);
        let cooling = |since: u64| now_ms.saturating_sub(since) < cooldown;

        let suppressed = match (
            self.last_emitted_at.get(kind),
            self.last_emitted_region.get(kind),
        ) {
            (Some(&at), _) if self.is_global(kind) => cooling(at),
            (Some(&at), Some(region)) => {
                cooling(at) && event.region.iou(region) >= self.config.dedup_iou
            }
            _ => false,
        };
        if suppressed {
            trace!("throttled {} at {}", kind, now_ms);
            return false;
        }

        self.last_emitted_at.insert(kind.to_string(), now_ms);
        self.last_emitted_region.insert(kind.to_string(), event.region);
        true
    }

    pub fn reset(&mut self) {
        self.last_emitted_at.clear();
        self.last_emitted_region.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{NO_HELMET, NO_PLATE, SIGNAL_VIOLATION};

    fn event(kind: &str, b: [f32; 4]) -> ViolationEvent {
        ViolationEvent::new(kind, 0.8, b.into(), 0)
    }

    #[test]
    fn test_repeat_within_cooldown_is_suppressed() {
        let mut throttle = ViolationThrottle::default();
        let e = event(NO_HELMET, [0.1, 0.1, 0.4, 0.6]);
        assert!(throttle.allow(&e, 1_000));
        assert!(!throttle.allow(&e, 5_000));
        assert!(throttle.allow(&e, 11_000));
    }

    #[test]
    fn test_distinct_region_or_kind_passes() {
        let mut throttle = ViolationThrottle::default();
        assert!(throttle.allow(&event(NO_HELMET, [0.1, 0.1, 0.4, 0.6]), 0));
        assert!(throttle.allow(&event(NO_HELMET, [0.6, 0.1, 0.9, 0.6]), 10));
        assert!(throttle.allow(&event(NO_PLATE, [0.6, 0.1, 0.9, 0.6]), 20));
        // only the latest region of a kind is remembered
        assert!(throttle.allow(&event(NO_HELMET, [0.1, 0.1, 0.4, 0.6]), 30));
    }

    #[test]
    fn test_global_kind_ignores_region() {
        let mut throttle = ViolationThrottle::new(ThrottleConfig {
            global_kinds: vec![SIGNAL_VIOLATION.to_string()],
            ..Default::default()
        });
        assert!(throttle.allow(&event(SIGNAL_VIOLATION, [0.0, 0.0, 0.2, 0.2]), 0));
        assert!(!throttle.allow(&event(SIGNAL_VIOLATION, [0.7, 0.7, 0.9, 0.9]), 9_999));
        assert!(throttle.allow(&event(SIGNAL_VIOLATION, [0.7, 0.7, 0.9, 0.9]), 10_000));
    }

    #[test]
    fn test_global_kinds_keep_separate_timers() {
        let mut throttle = ViolationThrottle::new(ThrottleConfig {
            global_kinds: vec![NO_PLATE.to_string(), SIGNAL_VIOLATION.to_string()],
            ..Default::default()
        });
        assert!(throttle.allow(&event(NO_PLATE, [0.0, 0.0, 0.2, 0.2]), 0));
        assert!(throttle.allow(&event(SIGNAL_VIOLATION, [0.7, 0.7, 0.9, 0.9]), 100));
        assert!(!throttle.allow(&event(NO_PLATE, [0.7, 0.7, 0.9, 0.9]), 200));
        assert!(!throttle.allow(&event(SIGNAL_VIOLATION, [0.0, 0.0, 0.2, 0.2]), 300));
    }

    #[test]
    fn test_kind_cooldown_override() {
        let mut throttle = ViolationThrottle::new(ThrottleConfig {
            kind_cooldown_ms: BTreeMap::from([(NO_PLATE.to_string(), 500)]),
            ..Default::default()
        });
        let e = event(NO_PLATE, [0.1, 0.1, 0.4, 0.6]);
        assert_eq!(throttle.cooldown(NO_PLATE), 500);
        assert_eq!(throttle.cooldown(NO_HELMET), 10_000);
        assert!(throttle.allow(&e, 0));
        assert!(!throttle.allow(&e, 499));
        assert!(throttle.allow(&e, 500));
    }

    #[test]
    fn test_reset_forgets_history() {
        let mut throttle = ViolationThrottle::default();
        let e = event(NO_HELMET, [0.1, 0.1, 0.4, 0.6]);
        assert!(throttle.allow(&e, 0));
        throttle.reset();
        assert!(throttle.allow(&e, 1));
    }
}
