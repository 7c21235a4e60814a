// SPDX-FileCopyrightText: Copyright 2025 Au-Zone Technologies
// SPDX-License-Identifier: Apache-2.0

use std::fmt;

pub type TrackerResult<T, E = TrackerError> = std::result::Result<T, E>;

#[derive(Debug, Clone, PartialEq)]
pub enum TrackerError {
    /// The detection at `index` has a non-finite score or box.
    MalformedDetection { index: usize },
    /// The motion model could not absorb a measurement.
    Association(String),
}

impl fmt::Display for TrackerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackerError::MalformedDetection { index } => {
                write!(f, "Malformed detection at index {}", index)
            }
            TrackerError::Association(msg) => write!(f, "Association failed: {}", msg),
        }
    }
}

impl std::error::Error for TrackerError {}
