// SPDX-FileCopyrightText: Copyright 2025 Au-Zone Technologies
// SPDX-License-Identifier: Apache-2.0

use std::fmt;

pub type DecoderResult<T, E = DecoderError> = std::result::Result<T, E>;

#[derive(Debug)]
pub enum DecoderError {
    /// The output tensor matches neither the channel-major `[1, 4+C, N]` nor
    /// the anchor-major `[1, N, 4+C]` layout.
    UnsupportedShape {
        shape: Vec<usize>,
        num_classes: usize,
    },
    InvalidConfig(String),
    InvalidFrameSize(u32, u32),
    Json(serde_json::Error),
    Yaml(serde_yaml::Error),
}

impl From<serde_json::Error> for DecoderError {
    fn from(err: serde_json::Error) -> Self {
        DecoderError::Json(err)
    }
}

impl From<serde_yaml::Error> for DecoderError {
    fn from(err: serde_yaml::Error) -> Self {
        DecoderError::Yaml(err)
    }
}

impl fmt::Display for DecoderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecoderError::UnsupportedShape { shape, num_classes } => write!(
                f,
                "Unsupported output shape {:?} for {} classes",
                shape, num_classes
            ),
            DecoderError::InvalidConfig(msg) => write!(f, "Invalid config: {}", msg),
            DecoderError::InvalidFrameSize(w, h) => write!(f, "Invalid frame size: {}x{}", w, h),
            DecoderError::Json(e) => write!(f, "JSON config error: {}", e),
            DecoderError::Yaml(e) => write!(f, "YAML config error: {}", e),
        }
    }
}

impl std::error::Error for DecoderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DecoderError::Json(e) => Some(e),
            DecoderError::Yaml(e) => Some(e),
            _ => None,
        }
    }
}
