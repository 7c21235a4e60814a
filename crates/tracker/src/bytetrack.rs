// SPDX-FileCopyrightText: Copyright 2025 Au-Zone Technologies
// SPDX-License-Identifier: Apache-2.0

use crate::{
    DetectionBox, Track, TrackState, Tracker,
    error::{TrackerError, TrackerResult},
    kalman::ConstantVelocityXYAHModel,
};
use log::{debug, trace};
use roadwatch_decoder::BoundingBox;
use serde::{Deserialize, Serialize};

/// Detections narrower or shorter than this are ignored.
const MIN_BOX_SIDE: f32 = 1e-4;
const EPSILON: f32 = 0.00001;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ByteTrackConfig {
    /// detections below this score are ignored
    pub score_thresh: f32,
    /// detections at or above this score are high confidence and may spawn
    /// tracks
    pub track_thresh: f32,
    /// IoU needed to match a high confidence detection
    pub match_thresh: f32,
    /// IoU needed to match a low confidence detection
    pub low_match_thresh: f32,
    /// consecutive missed frames a track survives
    pub track_buffer: u32,
    /// hits needed to promote a tentative track
    pub min_hits: u32,
}

impl Default for ByteTrackConfig {
    fn default() -> Self {
        Self {
            score_thresh: 0.2,
            track_thresh: 0.5,
            match_thresh: 0.8,
            low_match_thresh: 0.5,
            track_buffer: 30,
            min_hits: 1,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ByteTrack {
    pub config: ByteTrackConfig,
    pub tracklets: Vec<Tracklet>,
    pub frame_count: u64,
    next_id: u32,
}

impl Default for ByteTrack {
    fn default() -> Self {
        Self::new(ByteTrackConfig::default())
    }
}

#[derive(Debug, Clone)]
pub struct Tracklet {
    pub id: u32,
    pub label: String,
    pub score: f32,
    pub bbox: BoundingBox,
    pub filter: ConstantVelocityXYAHModel,
    pub state: TrackState,
    pub hits: u32,
    pub missed: u32,
}

impl Tracklet {
    fn update<T: DetectionBox>(&mut self, detect_box: &T, min_hits: u32) -> TrackerResult<()> {
        self.filter.update(&bbox_to_xyah(&detect_box.bbox()))?;
        self.hits += 1;
        self.missed = 0;
        self.label = detect_box.label().to_string();
        self.score = detect_box.score();
        self.bbox = detect_box.bbox();
        self.state = match self.state {
            TrackState::Tentative if self.hits < min_hits => TrackState::Tentative,
            _ => TrackState::Confirmed,
        };
        Ok(())
    }

    /// Motion model estimate as a corner box.
    pub fn get_predicted_location(&self) -> BoundingBox {
        xyah_to_bbox(&self.filter.xyah())
    }

    fn to_track(&self) -> Track {
        Track {
            id: self.id,
            label: self.label.clone(),
            score: self.score,
            bbox: self.bbox,
            predicted: self.get_predicted_location(),
            state: self.state,
            hits: self.hits,
            missed: self.missed,
        }
    }
}

fn bbox_to_xyah(b: &BoundingBox) -> [f32; 4] {
    let (x, y) = b.center();
    let w = b.width().max(EPSILON);
    let h = b.height().max(EPSILON);
    [x, y, w / h, h]
}

fn xyah_to_bbox(xyah: &[f32; 4]) -> BoundingBox {
    let [x, y, a, h] = *xyah;
    BoundingBox::from_cxcywh(x, y, h * a, h)
}

/// Greedy highest-IoU-first assignment. Equal IoUs resolve to the lower track
/// index, then the lower detection index.
fn greedy_assign(
    tracks: &[usize],
    dets: &[usize],
    iou: impl Fn(usize, usize) -> f32,
    threshold: f32,
) -> Vec<(usize, usize)> {
    let mut pairs = Vec::new();
    for &t in tracks {
        for &d in dets {
            let v = iou(t, d);
            if v >= threshold {
                pairs.push((v, t, d));
            }
        }
    }
    pairs.sort_by(|a, b| b.0.total_cmp(&a.0));

    let mut used_tracks = Vec::new();
    let mut used_dets = Vec::new();
    let mut matches = Vec::new();
    for (_, t, d) in pairs {
        if used_tracks.contains(&t) || used_dets.contains(&d) {
            continue;
        }
        used_tracks.push(t);
        used_dets.push(d);
        matches.push((t, d));
    }
    matches
}

impl ByteTrack {
    pub fn new(config: ByteTrackConfig) -> ByteTrack {
        ByteTrack {
            config,
            tracklets: Vec::new(),
            frame_count: 0,
            next_id: 1,
        }
    }

    fn validate<T: DetectionBox>(boxes: &[T]) -> TrackerResult<()> {
        match boxes
            .iter()
            .position(|b| !b.score().is_finite() || !b.bbox().is_finite())
        {
            Some(index) => Err(TrackerError::MalformedDetection { index }),
            None => Ok(()),
        }
    }

    /// Applies matched pairs and marks both sides as used.
    fn process_assignments<T: DetectionBox>(
        &mut self,
        assignments: &[(usize, usize)],
        boxes: &[T],
        matched: &mut [bool],
        tracked: &mut [bool],
    ) -> TrackerResult<()> {
        for &(t, d) in assignments {
            trace!(
                "Box: {:?} ID: {} Mean: {}",
                boxes[d],
                self.tracklets[t].id,
                self.tracklets[t].filter.mean
            );
            matched[d] = true;
            tracked[t] = true;
            self.tracklets[t].update(&boxes[d], self.config.min_hits)?;
        }
        Ok(())
    }

    /// Ages unmatched tracklets and drops the ones that expired.
    fn remove_expired_tracklets(&mut self, tracked: &[bool]) {
        let track_buffer = self.config.track_buffer;
        for (tracklet, _) in self
            .tracklets
            .iter_mut()
            .zip(tracked)
            .filter(|(_, tracked)| !**tracked)
        {
            tracklet.missed += 1;
            tracklet.state = match tracklet.state {
                TrackState::Tentative => TrackState::Removed,
                _ if tracklet.missed > track_buffer => TrackState::Removed,
                _ => TrackState::Lost,
            };
        }
        self.tracklets.retain(|t| {
            if t.state == TrackState::Removed {
                debug!("Tracklet removed: {} ({})", t.id, t.label);
                false
            } else {
                true
            }
        });
    }

    /// Create new tracklets from unmatched high-confidence boxes.
    fn create_new_tracklets<T: DetectionBox>(
        &mut self,
        boxes: &[T],
        high_conf_indices: &[usize],
        matched: &[bool],
    ) {
        for &i in high_conf_indices {
            if matched[i] {
                continue;
            }
            let id = self.next_id;
            self.next_id += 1;
            let state = if self.config.min_hits <= 1 {
                TrackState::Confirmed
            } else {
                TrackState::Tentative
            };
            let bbox = boxes[i].bbox();
            debug!("Tracklet created: {} ({})", id, boxes[i].label());
            self.tracklets.push(Tracklet {
                id,
                label: boxes[i].label().to_string(),
                score: boxes[i].score(),
                bbox,
                filter: ConstantVelocityXYAHModel::new(&bbox_to_xyah(&bbox)),
                state,
                hits: 1,
                missed: 0,
            });
        }
    }
}

impl<T> Tracker<T> for ByteTrack
where
    T: DetectionBox,
{
    fn update(&mut self, boxes: &[T]) -> TrackerResult<Vec<Track>> {
        Self::validate(boxes)?;
        self.frame_count += 1;

        let usable = |b: &T| {
            let bbox = b.bbox();
            bbox.width() >= MIN_BOX_SIDE
                && bbox.height() >= MIN_BOX_SIDE
                && b.score() >= self.config.score_thresh
        };
        let (high_conf_ind, low_conf_ind): (Vec<usize>, Vec<usize>) = boxes
            .iter()
            .enumerate()
            .filter(|(_, b)| usable(*b))
            .map(|(i, _)| i)
            .partition(|&i| boxes[i].score() >= self.config.track_thresh);

        let mut matched = vec![false; boxes.len()];
        let mut tracked = vec![false; self.tracklets.len()];

        for track in &mut self.tracklets {
            track.filter.predict();
        }
        let predicted: Vec<BoundingBox> = self
            .tracklets
            .iter()
            .map(Tracklet::get_predicted_location)
            .collect();

        // First pass: every tracklet against high-confidence detections
        let all_tracks: Vec<usize> = (0..self.tracklets.len()).collect();
        let first = greedy_assign(
            &all_tracks,
            &high_conf_ind,
            |t, d| predicted[t].iou(&boxes[d].bbox()),
            self.config.match_thresh,
        );
        self.process_assignments(&first, boxes, &mut matched, &mut tracked)?;

        // Second pass: remaining established tracklets against low-confidence
        // detections
        let remaining: Vec<usize> = (0..self.tracklets.len())
            .filter(|&t| {
                !tracked[t]
                    && matches!(
                        self.tracklets[t].state,
                        TrackState::Confirmed | TrackState::Lost
                    )
            })
            .collect();
        let second = greedy_assign(
            &remaining,
            &low_conf_ind,
            |t, d| predicted[t].iou(&boxes[d].bbox()),
            self.config.low_match_thresh,
        );
        self.process_assignments(&second, boxes, &mut matched, &mut tracked)?;

        self.remove_expired_tracklets(&tracked);
        self.create_new_tracklets(boxes, &high_conf_ind, &matched);

        Ok(<Self as Tracker<T>>::get_active_tracks(self))
    }

    fn get_active_tracks(&self) -> Vec<Track> {
        self.tracklets
            .iter()
            .map(Tracklet::to_track)
            .filter(Track::is_alive)
            .collect()
    }

    fn reset(&mut self) {
        self.tracklets.clear();
        self.frame_count = 0;
    }
}
