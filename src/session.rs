// SPDX-FileCopyrightText: Copyright 2025 Au-Zone Technologies
// SPDX-License-Identifier: Apache-2.0

use std::time::Duration;

use log::{debug, warn};
use ndarray::ArrayViewD;
use num_traits::{AsPrimitive, Float};
use roadwatch_decoder::{Decoder, DecoderBuilder, Detection};
use roadwatch_rules::{RuleSet, ViolationAggregator, ViolationEvent};
use roadwatch_tracker::{ByteTrack, Track, Tracker};
use serde::{Deserialize, Serialize};

use crate::{Result, SessionConfig};

/// Everything produced for one frame.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FrameOutput {
    pub detections: Vec<Detection>,
    pub tracks: Vec<Track>,
    /// events that survived aggregation and throttling
    pub events: Vec<ViolationEvent>,
}

impl FrameOutput {
    pub fn is_empty(&self) -> bool {
        self.detections.is_empty() && self.tracks.is_empty() && self.events.is_empty()
    }
}

/// Owns the decoder, tracker, rules and throttle of one detection session.
/// Frames must be fed in order from a single owner.
#[derive(Debug)]
pub struct DetectionSession {
    decoder: Decoder,
    tracker: ByteTrack,
    rules: RuleSet,
    aggregator: ViolationAggregator,
    inference_timeout: Duration,
    frames: u64,
}

impl DetectionSession {
    pub fn new(config: SessionConfig) -> Result<Self> {
        config.validate()?;
        let inference_timeout = config.inference_timeout();
        let decoder = DecoderBuilder::new().with_config(config.decoder).build()?;
        Ok(Self {
            decoder,
            tracker: ByteTrack::new(config.tracker),
            rules: RuleSet::from_config(&config.rules),
            aggregator: ViolationAggregator::new(config.aggregator),
            inference_timeout,
            frames: 0,
        })
    }

    pub fn decoder(&self) -> &Decoder {
        &self.decoder
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    pub fn inference_timeout(&self) -> Duration {
        self.inference_timeout
    }

    /// Frames processed since the session started or was last reset.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Runs one raw model output through decoding, tracking, the rules and
    /// the aggregator. A tensor the decoder cannot read yields an empty
    /// output and leaves the session state untouched.
    pub fn process_output<T>(
        &mut self,
        output: ArrayViewD<T>,
        frame_width: u32,
        frame_height: u32,
        now_ms: u64,
    ) -> FrameOutput
    where
        T: Float + AsPrimitive<f32> + Send + Sync,
    {
        match self.decoder.decode(output, frame_width, frame_height) {
            Ok(detections) => self.process_detections(detections, now_ms),
            Err(e) => {
                warn!("skipping frame at {} ms: {}", now_ms, e);
                FrameOutput::default()
            }
        }
    }

    /// Runs already decoded detections through tracking, the rules and the
    /// aggregator.
    pub fn process_detections(&mut self, detections: Vec<Detection>, now_ms: u64) -> FrameOutput {
        self.frames += 1;
        let tracks = match self.tracker.update(detections.as_slice()) {
            Ok(tracks) => tracks,
            Err(e) => {
                warn!("tracking failed at {} ms, no tracks this frame: {}", now_ms, e);
                Vec::new()
            }
        };
        let candidates = self.rules.evaluate(&detections, &tracks, now_ms);
        let events = self.aggregator.aggregate(candidates, now_ms);
        for e in &events {
            debug!("{} ({:.2}) at {} ms", e.kind, e.confidence, now_ms);
        }
        FrameOutput {
            detections,
            tracks,
            events,
        }
    }

    /// Forgets every track, phase and throttle record.
    pub fn reset(&mut self) {
        <ByteTrack as Tracker<Detection>>::reset(&mut self.tracker);
        self.rules.reset();
        self.aggregator.reset();
        self.frames = 0;
    }
}
