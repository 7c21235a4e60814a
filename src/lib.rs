// SPDX-FileCopyrightText: Copyright 2025 Au-Zone Technologies
// SPDX-License-Identifier: Apache-2.0

//! roadwatch
//!
//! Turns per-frame detector output into a throttled stream of traffic
//! violation events. A [`DetectionSession`] owns the decoder, the tracker,
//! the rule set and the aggregator of one session; a [`FramePipeline`] puts
//! an inference worker and latest-frame-wins admission in front of it.

mod config;
mod error;
mod pipeline;
mod session;

pub use config::{SessionBuilder, SessionConfig};
pub use error::{Error, Result};
pub use pipeline::{
    FrameInput, FrameOutcome, FramePipeline, InferenceBackend, InferenceOutput, InferenceWorker,
};
pub use session::{DetectionSession, FrameOutput};

pub use roadwatch_decoder as decoder;
pub use roadwatch_rules as rules;
pub use roadwatch_tracker as tracker;
