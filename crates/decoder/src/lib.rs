//! roadwatch - Decoders
//!
//! Turns the dense per-frame output tensor of a YOLO-style traffic detector
//! into normalized [`Detection`]s and removes redundant boxes with
//! [`float::nms`].
pub mod bbox;
pub mod error;
pub mod float;
pub mod labels;

mod decoder;
pub use decoder::*;

pub use bbox::{BoundingBox, IOU_EPSILON};
pub use error::{DecoderError, DecoderResult};

use serde::{Deserialize, Serialize};

/// One detected object in normalized frame coordinates.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Detection {
    /// class name resolved through the decoder label table
    pub label: String,
    /// model confidence in `[0, 1]`
    pub score: f32,
    pub bbox: BoundingBox,
}

impl Detection {
    pub fn new(label: impl Into<String>, score: f32, bbox: BoundingBox) -> Self {
        Self {
            label: label.into(),
            score,
            bbox,
        }
    }

    /// Returns true if the two detections share a label and their score and
    /// coordinates are within `eps` of each other.
    pub fn equal_within_delta(&self, rhs: &Detection, eps: f32) -> bool {
        let eq_delta = |a: f32, b: f32| (a - b).abs() <= eps;
        self.label == rhs.label
            && eq_delta(self.score, rhs.score)
            && eq_delta(self.bbox.xmin, rhs.bbox.xmin)
            && eq_delta(self.bbox.ymin, rhs.bbox.ymin)
            && eq_delta(self.bbox.xmax, rhs.bbox.xmax)
            && eq_delta(self.bbox.ymax, rhs.bbox.ymax)
    }

    pub fn is_label(&self, expected: &str) -> bool {
        labels::label_eq(&self.label, expected)
    }
}
