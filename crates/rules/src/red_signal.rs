// SPDX-FileCopyrightText: Copyright 2025 Au-Zone Technologies
// SPDX-License-Identifier: Apache-2.0

//! Vehicles entering or crawling across a crosswalk while the primary
//! vehicular signal is red.
//!
//! The rule runs its own tracker over vehicle detections so ids stay stable
//! with looser thresholds than the session tracker. Each track can trigger at
//! most once per red phase, through either of two conditions:
//!
//! * the bottom of the box moves from at or below the crosswalk top edge to
//!   above it (advancing past the stop line),
//! * while inside the crosswalk band, the box center keeps moving left until
//!   the accumulated displacement reaches `lateral_accum_thresh`.

use std::collections::{HashMap, HashSet};

use log::{debug, warn};
use roadwatch_decoder::{
    BoundingBox, Detection,
    labels::{VEHICLE_LABELS, label_in},
};
use roadwatch_tracker::{ByteTrack, ByteTrackConfig, Track, Tracker};
use serde::{Deserialize, Serialize};

use crate::{SIGNAL_VIOLATION, ViolationEvent, ViolationRule};

/// Confidence used when the primary signal has no score to offer.
const FALLBACK_CONFIDENCE: f32 = 0.9;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RedSignalConfig {
    pub vehicle_labels: Vec<String>,
    pub crosswalk_labels: Vec<String>,
    pub signal_prefix: String,
    /// substring of the signal label marking the red phase
    pub red_marker: String,
    pub crossing_tol: f32,
    pub lateral_step_tol: f32,
    pub lateral_accum_thresh: f32,
    pub crosswalk_iou_thresh: f32,
    pub tracker: ByteTrackConfig,
}

impl Default for RedSignalConfig {
    fn default() -> Self {
        Self {
            vehicle_labels: VEHICLE_LABELS.iter().map(|s| s.to_string()).collect(),
            crosswalk_labels: vec!["crosswalk".into()],
            signal_prefix: "vehicular_signal_".into(),
            red_marker: "red".into(),
            crossing_tol: 0.012,
            lateral_step_tol: 0.004,
            lateral_accum_thresh: 0.03,
            crosswalk_iou_thresh: 0.02,
            tracker: ByteTrackConfig {
                score_thresh: 0.10,
                track_thresh: 0.25,
                match_thresh: 0.70,
                track_buffer: 90,
                ..Default::default()
            },
        }
    }
}

/// Cross-frame memory of the rule.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SignalPhaseState {
    /// incremented on every green to red edge
    pub phase_id: u64,
    pub is_red: bool,
    /// tracks that already triggered in the current phase
    pub recorded_track_ids: HashSet<u32>,
    pub prev_bottom_y: HashMap<u32, f32>,
    pub prev_center_x: HashMap<u32, f32>,
    /// running leftward displacement; never positive
    pub accum_left_dx: HashMap<u32, f32>,
}

impl SignalPhaseState {
    /// Drops per-track memory of tracks that are gone.
    fn retain_alive(&mut self, tracks: &[Track]) {
        let alive: HashSet<u32> = tracks.iter().map(|t| t.id).collect();
        self.prev_bottom_y.retain(|id, _| alive.contains(id));
        self.prev_center_x.retain(|id, _| alive.contains(id));
        self.accum_left_dx.retain(|id, _| alive.contains(id));
    }

    fn remember(&mut self, track: &Track) {
        self.prev_bottom_y.insert(track.id, track.bbox.ymax);
        self.prev_center_x.insert(track.id, track.bbox.center_x());
    }
}

#[derive(Debug)]
pub struct RedSignalCrosswalkRule {
    config: RedSignalConfig,
    tracker: ByteTrack,
    state: SignalPhaseState,
}

impl Default for RedSignalCrosswalkRule {
    fn default() -> Self {
        Self::new(RedSignalConfig::default())
    }
}

impl RedSignalCrosswalkRule {
    pub fn new(config: RedSignalConfig) -> Self {
        Self {
            tracker: ByteTrack::new(config.tracker.clone()),
            config,
            state: SignalPhaseState::default(),
        }
    }

    pub fn state(&self) -> &SignalPhaseState {
        &self.state
    }

    /// Evaluates the frame against vehicle tracks supplied by the caller
    /// instead of the rule's own tracker.
    pub fn evaluate_tracked(
        &mut self,
        detections: &[Detection],
        tracks: &[Track],
        now_ms: u64,
    ) -> Vec<ViolationEvent> {
        let primary = self.observe_signal(detections);
        let crosswalk = self.select_crosswalk(detections).map(|d| d.bbox);
        self.judge(tracks, primary, crosswalk, now_ms)
    }

    /// Picks the topmost vehicular signal and handles the green to red edge.
    fn observe_signal<'a>(&mut self, detections: &'a [Detection]) -> Option<&'a Detection> {
        let prefix = self.config.signal_prefix.to_lowercase();
        let primary = detections
            .iter()
            .filter(|d| d.label.trim().to_lowercase().starts_with(&prefix))
            .min_by(|a, b| a.bbox.ymin.total_cmp(&b.bbox.ymin));
        let red_now = primary.is_some_and(|d| {
            d.label
                .to_lowercase()
                .contains(&self.config.red_marker.to_lowercase())
        });

        if red_now && !self.state.is_red {
            self.state.phase_id += 1;
            self.state.recorded_track_ids.clear();
            self.state.accum_left_dx.clear();
            debug!("red phase {} started", self.state.phase_id);
        }
        self.state.is_red = red_now;
        primary
    }

    /// The crosswalk closest to the camera.
    fn select_crosswalk<'a>(&self, detections: &'a [Detection]) -> Option<&'a Detection> {
        detections
            .iter()
            .filter(|d| label_in(&d.label, &self.config.crosswalk_labels))
            .max_by(|a, b| a.bbox.ymin.total_cmp(&b.bbox.ymin))
    }

    fn judge(
        &mut self,
        tracks: &[Track],
        primary: Option<&Detection>,
        crosswalk: Option<BoundingBox>,
        now_ms: u64,
    ) -> Vec<ViolationEvent> {
        let mut events = Vec::new();
        let crosswalk = match crosswalk {
            Some(cw) if self.state.is_red => cw,
            _ => {
                for t in tracks {
                    self.state.remember(t);
                }
                self.state.retain_alive(tracks);
                return events;
            }
        };

        let cfg = &self.config;
        let state = &mut self.state;
        let top = crosswalk.ymin;
        let bottom = crosswalk.ymax;
        let confidence = primary.map_or(FALLBACK_CONFIDENCE, |p| p.score);

        for t in tracks {
            let curr_bottom = t.bbox.ymax;
            let curr_cx = t.bbox.center_x();
            let prev_bottom = state.prev_bottom_y.get(&t.id).copied();
            let prev_cx = state.prev_center_x.get(&t.id).copied();

            let in_band = curr_bottom <= bottom + cfg.crossing_tol
                && curr_bottom >= top - cfg.crossing_tol;
            let inside = in_band || t.bbox.iou(&crosswalk) >= cfg.crosswalk_iou_thresh;

            let crossed_up = prev_bottom.is_some_and(|prev| {
                prev >= top - cfg.crossing_tol && curr_bottom < top - cfg.crossing_tol
            });
            let recorded = state.recorded_track_ids.contains(&t.id);

            let mut trigger = false;
            if crossed_up && !recorded {
                debug!("track {} crossed the stop line", t.id);
                trigger = true;
            } else if let (true, Some(prev_cx)) = (inside, prev_cx) {
                let step = curr_cx - prev_cx;
                if step <= -cfg.lateral_step_tol {
                    let accum = state.accum_left_dx.entry(t.id).or_insert(0.0);
                    *accum += step;
                    if *accum <= -cfg.lateral_accum_thresh && !recorded {
                        debug!("track {} crawled {:.3} left on the crosswalk", t.id, *accum);
                        *accum = 0.0;
                        trigger = true;
                    }
                } else if step > 0.0 {
                    state.accum_left_dx.remove(&t.id);
                }
            } else {
                state.accum_left_dx.remove(&t.id);
            }

            if trigger {
                state.recorded_track_ids.insert(t.id);
                events.push(ViolationEvent::new(
                    SIGNAL_VIOLATION,
                    confidence,
                    t.bbox.union(&crosswalk),
                    now_ms,
                ));
            }
            state.remember(t);
        }

        state.retain_alive(tracks);
        events
    }
}

impl ViolationRule for RedSignalCrosswalkRule {
    fn name(&self) -> &str {
        "RedSignalCrosswalk"
    }

    fn evaluate(&mut self, detections: &[Detection], _: &[Track], now_ms: u64) -> Vec<ViolationEvent> {
        let vehicles: Vec<Detection> = detections
            .iter()
            .filter(|d| label_in(&d.label, &self.config.vehicle_labels))
            .cloned()
            .collect();
        let tracks = match self.tracker.update(vehicles.as_slice()) {
            Ok(tracks) => tracks,
            Err(e) => {
                warn!("signal tracker failed, no tracks this frame: {}", e);
                Vec::new()
            }
        };
        self.evaluate_tracked(detections, &tracks, now_ms)
    }

    fn reset(&mut self) {
        <ByteTrack as Tracker<Detection>>::reset(&mut self.tracker);
        self.state = SignalPhaseState::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use roadwatch_tracker::TrackState;

    fn det(label: &str, score: f32, b: [f32; 4]) -> Detection {
        Detection::new(label, score, b.into())
    }

    fn track(id: u32, b: [f32; 4]) -> Track {
        Track {
            id,
            label: "car".into(),
            score: 0.9,
            bbox: b.into(),
            predicted: b.into(),
            state: TrackState::Confirmed,
            hits: 1,
            missed: 0,
        }
    }

    fn scene(signal: &str) -> Vec<Detection> {
        vec![
            det(signal, 0.85, [0.45, 0.02, 0.50, 0.08]),
            det("crosswalk", 0.7, [0.0, 0.60, 1.0, 0.75]),
        ]
    }

    fn crossing_config() -> RedSignalConfig {
        RedSignalConfig {
            crossing_tol: 0.01,
            ..Default::default()
        }
    }

    #[test]
    fn test_boundary_crossing_fires_once() {
        let mut rule = RedSignalCrosswalkRule::new(crossing_config());
        let red = scene("vehicular_signal_red");

        let first = rule.evaluate_tracked(&red, &[track(7, [0.3, 0.5, 0.4, 0.80])], 0);
        assert!(first.is_empty());

        let second = rule.evaluate_tracked(&red, &[track(7, [0.3, 0.1, 0.4, 0.40])], 33);
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].kind, SIGNAL_VIOLATION);
        assert!((second[0].confidence - 0.85).abs() < 1e-6);
        assert_eq!(second[0].region, BoundingBox::new(0.0, 0.1, 1.0, 0.75));

        // back below the line and across again, same phase
        rule.evaluate_tracked(&red, &[track(7, [0.3, 0.5, 0.4, 0.80])], 66);
        let again = rule.evaluate_tracked(&red, &[track(7, [0.3, 0.1, 0.4, 0.40])], 99);
        assert!(again.is_empty());
        assert!(rule.state().recorded_track_ids.contains(&7));
    }

    #[test]
    fn test_phase_reset_allows_new_trigger() {
        let mut rule = RedSignalCrosswalkRule::new(crossing_config());
        let red = scene("vehicular_signal_red");
        let green = scene("vehicular_signal_green");
        let below = [track(3, [0.3, 0.5, 0.4, 0.80])];
        let above = [track(3, [0.3, 0.1, 0.4, 0.40])];

        rule.evaluate_tracked(&red, &below, 0);
        assert_eq!(rule.evaluate_tracked(&red, &above, 1).len(), 1);
        assert_eq!(rule.state().phase_id, 1);

        // still red: no re-trigger
        rule.evaluate_tracked(&red, &below, 2);
        assert!(rule.evaluate_tracked(&red, &above, 3).is_empty());

        // red -> green -> red
        rule.evaluate_tracked(&green, &below, 4);
        assert!(!rule.state().is_red);
        rule.evaluate_tracked(&red, &below, 5);
        assert_eq!(rule.state().phase_id, 2);
        assert!(rule.state().recorded_track_ids.is_empty());
        assert_eq!(rule.evaluate_tracked(&red, &above, 6).len(), 1);
    }

    #[test]
    fn test_green_only_tracks_positions() {
        let mut rule = RedSignalCrosswalkRule::default();
        let green = scene("vehicular_signal_green");
        rule.evaluate_tracked(&green, &[track(1, [0.3, 0.5, 0.4, 0.80])], 0);
        assert!(
            rule.evaluate_tracked(&green, &[track(1, [0.3, 0.1, 0.4, 0.40])], 1)
                .is_empty()
        );
        assert_eq!(rule.state().prev_bottom_y.get(&1), Some(&0.40));
    }

    #[test]
    fn test_primary_signal_is_topmost() {
        let mut rule = RedSignalCrosswalkRule::default();
        let dets = [
            det("vehicular_signal_green", 0.9, [0.1, 0.01, 0.15, 0.05]),
            det("vehicular_signal_red", 0.9, [0.6, 0.10, 0.65, 0.15]),
        ];
        rule.evaluate_tracked(&dets, &[], 0);
        assert!(!rule.state().is_red);
    }

    #[test]
    fn test_lateral_crawl_triggers_and_rightward_step_resets() {
        let mut rule = RedSignalCrosswalkRule::default();
        let red = scene("vehicular_signal_red");
        let at = |cx: f32| [track(5, [cx - 0.05, 0.55, cx + 0.05, 0.70])];

        // two leftward steps, then a rightward step wipes the accumulator
        rule.evaluate_tracked(&red, &at(0.60), 0);
        rule.evaluate_tracked(&red, &at(0.59), 1);
        rule.evaluate_tracked(&red, &at(0.58), 2);
        assert!(rule.state().accum_left_dx.contains_key(&5));
        rule.evaluate_tracked(&red, &at(0.581), 3);
        assert!(!rule.state().accum_left_dx.contains_key(&5));

        // steady crawl past the threshold fires exactly once
        let mut fired = 0;
        let mut cx = 0.581;
        for i in 0..8 {
            cx -= 0.01;
            fired += rule.evaluate_tracked(&red, &at(cx), 10 + i).len();
        }
        assert_eq!(fired, 1);
    }

    #[test]
    fn test_jitter_below_step_tolerance_does_not_accumulate() {
        let mut rule = RedSignalCrosswalkRule::default();
        let red = scene("vehicular_signal_red");
        let at = |cx: f32| [track(9, [cx - 0.05, 0.55, cx + 0.05, 0.70])];
        let mut cx = 0.5;
        for i in 0..20 {
            cx -= 0.002;
            assert!(rule.evaluate_tracked(&red, &at(cx), i).is_empty());
        }
    }

    #[test]
    fn test_state_of_vanished_tracks_is_collected() {
        let mut rule = RedSignalCrosswalkRule::default();
        let red = scene("vehicular_signal_red");
        rule.evaluate_tracked(&red, &[track(1, [0.3, 0.5, 0.4, 0.7])], 0);
        rule.evaluate_tracked(&red, &[track(2, [0.6, 0.5, 0.7, 0.7])], 1);
        assert!(!rule.state().prev_bottom_y.contains_key(&1));
        assert!(rule.state().prev_center_x.contains_key(&2));
    }

    #[test]
    fn test_tracker_failure_yields_no_events_and_recovers() {
        let mut rule = RedSignalCrosswalkRule::default();
        let mut frame = scene("vehicular_signal_red");
        frame.push(det("car", 0.8, [0.30, 0.50, 0.45, 0.66]));
        assert!(rule.evaluate(&frame, &[], 0).is_empty());
        assert_eq!(rule.state().prev_bottom_y.len(), 1);

        // the car crosses the stop line, but a malformed vehicle fails the
        // whole tracker update
        let mut frame = scene("vehicular_signal_red");
        frame.push(det("car", 0.8, [0.30, 0.39, 0.45, 0.55]));
        frame.push(det("motorcycle", f32::NAN, [0.60, 0.50, 0.70, 0.66]));
        assert!(rule.evaluate(&frame, &[], 33).is_empty());
        assert!(rule.state().prev_bottom_y.is_empty());
        assert!(rule.state().prev_center_x.is_empty());
        assert!(rule.state().recorded_track_ids.is_empty());

        let mut frame = scene("vehicular_signal_red");
        frame.push(det("car", 0.8, [0.30, 0.50, 0.45, 0.66]));
        assert!(rule.evaluate(&frame, &[], 66).is_empty());
        assert_eq!(rule.state().prev_bottom_y.len(), 1);
        assert!(rule.state().is_red);
    }

    #[test]
    fn test_internal_tracker_follows_vehicles() {
        let mut rule = RedSignalCrosswalkRule::default();
        let mut frame = scene("vehicular_signal_red");
        frame.push(det("car", 0.8, [0.30, 0.50, 0.45, 0.66]));
        assert!(rule.evaluate(&frame, &[], 0).is_empty());
        assert_eq!(rule.state().prev_bottom_y.len(), 1);

        let mut frame = scene("vehicular_signal_red");
        frame.push(det("car", 0.8, [0.30, 0.49, 0.45, 0.65]));
        rule.evaluate(&frame, &[], 33);
        assert_eq!(rule.state().prev_bottom_y.len(), 1);

        rule.reset();
        assert_eq!(rule.state(), &SignalPhaseState::default());
    }
}
