// SPDX-FileCopyrightText: Copyright 2025 Au-Zone Technologies
// SPDX-License-Identifier: Apache-2.0

use std::fmt::Debug;

use roadwatch_decoder::{BoundingBox, Detection};
use serde::{Deserialize, Serialize};

pub mod bytetrack;
pub mod error;
pub mod kalman;

pub use bytetrack::{ByteTrack, ByteTrackConfig};
pub use error::{TrackerError, TrackerResult};

pub trait DetectionBox: Debug {
    fn bbox(&self) -> BoundingBox;
    fn score(&self) -> f32;
    fn label(&self) -> &str;
}

impl DetectionBox for Detection {
    fn bbox(&self) -> BoundingBox {
        self.bbox
    }

    fn score(&self) -> f32 {
        self.score
    }

    fn label(&self) -> &str {
        &self.label
    }
}

/// Lifecycle of a track. Only `Confirmed` and `Lost` tracks are reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrackState {
    Tentative,
    Confirmed,
    Lost,
    Removed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    /// stable for the lifetime of the track, never reused by a tracker
    pub id: u32,
    pub label: String,
    pub score: f32,
    /// box of the last matched detection
    pub bbox: BoundingBox,
    /// motion model estimate for the current frame
    pub predicted: BoundingBox,
    pub state: TrackState,
    pub hits: u32,
    /// consecutive frames without a matching detection
    pub missed: u32,
}

impl Track {
    pub fn is_alive(&self) -> bool {
        matches!(self.state, TrackState::Confirmed | TrackState::Lost)
    }
}

pub trait Tracker<T: DetectionBox> {
    /// Associates one frame of detections and returns the reported tracks.
    fn update(&mut self, boxes: &[T]) -> TrackerResult<Vec<Track>>;

    fn get_active_tracks(&self) -> Vec<Track>;

    /// Forgets every track. Ids keep increasing.
    fn reset(&mut self);
}
