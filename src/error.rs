// SPDX-FileCopyrightText: Copyright 2025 Au-Zone Technologies
// SPDX-License-Identifier: Apache-2.0

use std::time::Duration;

use roadwatch_decoder::DecoderError;
use roadwatch_tracker::TrackerError;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug)]
pub enum Error {
    IoError(std::io::Error),
    Decoder(DecoderError),
    Tracker(TrackerError),
    /// No inference result arrived within the session's timeout.
    InferenceTimeout(Duration),
    /// The inference backend rejected the frame.
    Inference(String),
    /// The inference worker thread is gone.
    WorkerDisconnected,
    /// The inference worker could not take another frame.
    WorkerBusy,
    InvalidConfig(String),
    Json(serde_json::Error),
    Yaml(serde_yaml::Error),
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::IoError(err)
    }
}

impl From<DecoderError> for Error {
    fn from(err: DecoderError) -> Self {
        Error::Decoder(err)
    }
}

impl From<TrackerError> for Error {
    fn from(err: TrackerError) -> Self {
        Error::Tracker(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Json(err)
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Error::Yaml(err)
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::IoError(e) => write!(f, "IO error: {}", e),
            Error::Decoder(e) => write!(f, "Decoder error: {}", e),
            Error::Tracker(e) => write!(f, "Tracker error: {}", e),
            Error::InferenceTimeout(t) => {
                write!(f, "Inference timed out after {} ms", t.as_millis())
            }
            Error::Inference(msg) => write!(f, "Inference failed: {}", msg),
            Error::WorkerDisconnected => write!(f, "Inference worker disconnected"),
            Error::WorkerBusy => write!(f, "Inference worker busy"),
            Error::InvalidConfig(msg) => write!(f, "Invalid config: {}", msg),
            Error::Json(e) => write!(f, "JSON config error: {}", e),
            Error::Yaml(e) => write!(f, "YAML config error: {}", e),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::IoError(e) => Some(e),
            Error::Decoder(e) => Some(e),
            Error::Tracker(e) => Some(e),
            Error::Json(e) => Some(e),
            Error::Yaml(e) => Some(e),
            _ => None,
        }
    }
}
