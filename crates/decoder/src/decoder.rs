// SPDX-FileCopyrightText: Copyright 2025 Au-Zone Technologies
// SPDX-License-Identifier: Apache-2.0

use ndarray::{ArrayView2, ArrayViewD, Axis, Ix3, s};
use num_traits::{AsPrimitive, Float};
use serde::{Deserialize, Serialize};

use crate::{
    DecoderError, DecoderResult, Detection,
    float::{FrameTransform, decode_boxes_float, nms, probe_normalized},
    labels::traffic_labels,
};

/// Coordinate space of the four box channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoordinateSpace {
    /// `[0, 1]` relative to the model input
    Normalized,
    /// pixels of the model input
    InputPixels,
    /// probe the first anchors and pick one of the above
    #[default]
    Auto,
}

/// Memory layout of a single-batch detector output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TensorLayout {
    /// `[1, 4 + C, N]`
    ChannelMajor,
    /// `[1, N, 4 + C]`
    AnchorMajor,
}

impl TensorLayout {
    /// Detects the layout from the tensor shape. Channel-major wins when both
    /// trailing dimensions equal `4 + num_classes`.
    pub fn from_shape(shape: &[usize], num_classes: usize) -> DecoderResult<Self> {
        let unsupported = || DecoderError::UnsupportedShape {
            shape: shape.to_vec(),
            num_classes,
        };
        let channels = num_classes + 4;
        match shape {
            [1, c, _] if *c == channels => Ok(TensorLayout::ChannelMajor),
            [1, _, c] if *c == channels => Ok(TensorLayout::AnchorMajor),
            _ => Err(unsupported()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecoderConfig {
    pub num_classes: usize,
    /// class index to label; indices without an entry decode to their number
    pub labels: Vec<String>,
    pub input_width: u32,
    pub input_height: u32,
    pub score_threshold: f32,
    pub iou_threshold: f32,
    pub class_agnostic: bool,
    /// apply the logistic function to raw class logits
    pub apply_sigmoid: bool,
    pub coordinates: CoordinateSpace,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        let labels = traffic_labels();
        Self {
            num_classes: labels.len(),
            labels,
            input_width: 640,
            input_height: 640,
            score_threshold: 0.35,
            iou_threshold: 0.55,
            class_agnostic: true,
            apply_sigmoid: false,
            coordinates: CoordinateSpace::Auto,
        }
    }
}

impl DecoderConfig {
    pub fn validate(&self) -> DecoderResult<()> {
        if self.num_classes == 0 {
            return Err(DecoderError::InvalidConfig(
                "num_classes must be positive".to_string(),
            ));
        }
        if self.input_width == 0 || self.input_height == 0 {
            return Err(DecoderError::InvalidConfig(format!(
                "Invalid input size {}x{}",
                self.input_width, self.input_height
            )));
        }
        for (name, v) in [
            ("score_threshold", self.score_threshold),
            ("iou_threshold", self.iou_threshold),
        ] {
            if !(0.0..=1.0).contains(&v) {
                return Err(DecoderError::InvalidConfig(format!(
                    "{name} must be in [0, 1], got {v}"
                )));
            }
        }
        if self.labels.len() > self.num_classes {
            log::warn!(
                "{} labels configured for {} classes, extra labels are unused",
                self.labels.len(),
                self.num_classes
            );
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct DecoderBuilder {
    config_src: Option<ConfigSource>,
    iou_threshold: Option<f32>,
    score_threshold: Option<f32>,
    class_agnostic: Option<bool>,
}

#[derive(Debug, Clone, PartialEq)]
enum ConfigSource {
    Yaml(String),
    Json(String),
    Config(DecoderConfig),
}

impl DecoderBuilder {
    /// Creates a builder using [`DecoderConfig::default`] unless a
    /// configuration is supplied.
    ///
    /// # Examples
    /// ```rust
    /// # use roadwatch_decoder::{DecoderBuilder, DecoderResult};
    /// # fn main() -> DecoderResult<()> {
    /// let decoder = DecoderBuilder::new().build()?;
    /// assert_eq!(decoder.score_threshold, 0.35);
    /// assert_eq!(decoder.iou_threshold, 0.55);
    /// # Ok(())
    /// # }
    /// ```
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a decoder configuration in YAML format. The string is parsed by
    /// `DecoderBuilder.build()`.
    ///
    /// # Examples
    /// ```rust
    /// # use roadwatch_decoder::{DecoderBuilder, DecoderResult};
    /// # fn main() -> DecoderResult<()> {
    /// let decoder = DecoderBuilder::new()
    ///     .with_config_yaml_str("num_classes: 2\nlabels: [person, car]\n".to_string())
    ///     .build()?;
    /// assert_eq!(decoder.num_classes(), 2);
    /// # Ok(())
    /// # }
    /// ```
    pub fn with_config_yaml_str(mut self, yaml_str: String) -> Self {
        self.config_src.replace(ConfigSource::Yaml(yaml_str));
        self
    }

    /// Loads a decoder configuration in JSON format. The string is parsed by
    /// `DecoderBuilder.build()`.
    pub fn with_config_json_str(mut self, json_str: String) -> Self {
        self.config_src.replace(ConfigSource::Json(json_str));
        self
    }

    pub fn with_config(mut self, config: DecoderConfig) -> Self {
        self.config_src.replace(ConfigSource::Config(config));
        self
    }

    /// Overrides the score threshold of the configuration.
    pub fn with_score_threshold(mut self, score_threshold: f32) -> Self {
        self.score_threshold = Some(score_threshold);
        self
    }

    /// Overrides the IOU threshold of the configuration.
    pub fn with_iou_threshold(mut self, iou_threshold: f32) -> Self {
        self.iou_threshold = Some(iou_threshold);
        self
    }

    pub fn with_class_agnostic(mut self, class_agnostic: bool) -> Self {
        self.class_agnostic = Some(class_agnostic);
        self
    }

    /// Builds the decoder. JSON and YAML sources are deserialized here and
    /// the resulting configuration is validated.
    pub fn build(self) -> Result<Decoder, DecoderError> {
        let mut config: DecoderConfig = match self.config_src {
            Some(ConfigSource::Json(s)) => serde_json::from_str(&s)?,
            Some(ConfigSource::Yaml(s)) => serde_yaml::from_str(&s)?,
            Some(ConfigSource::Config(c)) => c,
            None => DecoderConfig::default(),
        };
        if let Some(v) = self.score_threshold {
            config.score_threshold = v;
        }
        if let Some(v) = self.iou_threshold {
            config.iou_threshold = v;
        }
        if let Some(v) = self.class_agnostic {
            config.class_agnostic = v;
        }
        config.validate()?;
        Ok(Decoder {
            num_classes: config.num_classes,
            labels: config.labels,
            input_width: config.input_width,
            input_height: config.input_height,
            apply_sigmoid: config.apply_sigmoid,
            coordinates: config.coordinates,
            class_agnostic: config.class_agnostic,
            iou_threshold: config.iou_threshold,
            score_threshold: config.score_threshold,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Decoder {
    num_classes: usize,
    labels: Vec<String>,
    input_width: u32,
    input_height: u32,
    apply_sigmoid: bool,
    coordinates: CoordinateSpace,
    pub class_agnostic: bool,
    pub iou_threshold: f32,
    pub score_threshold: f32,
}

impl Decoder {
    pub fn num_classes(&self) -> usize {
        self.num_classes
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Decodes one output tensor and applies non-max suppression.
    ///
    /// `frame_width` and `frame_height` are the size of the original camera
    /// frame; the returned boxes are normalized to it.
    ///
    /// # Examples
    /// ```rust
    /// # use roadwatch_decoder::{DecoderBuilder, DecoderResult};
    /// # use ndarray::Array3;
    /// # fn main() -> DecoderResult<()> {
    /// let decoder = DecoderBuilder::new()
    ///     .with_config_yaml_str("num_classes: 1\nlabels: [car]\n".to_string())
    ///     .build()?;
    /// let output = Array3::from_shape_vec(
    ///     (1, 5, 1),
    ///     vec![0.5f32, 0.5, 0.2, 0.2, 0.8],
    /// ).unwrap();
    /// let detections = decoder.decode(output.view().into_dyn(), 1280, 720)?;
    /// assert_eq!(detections.len(), 1);
    /// assert_eq!(detections[0].label, "car");
    /// # Ok(())
    /// # }
    /// ```
    pub fn decode<T>(
        &self,
        output: ArrayViewD<T>,
        frame_width: u32,
        frame_height: u32,
    ) -> DecoderResult<Vec<Detection>>
    where
        T: Float + AsPrimitive<f32> + Send + Sync,
    {
        let candidates = self.decode_boxes(output, frame_width, frame_height)?;
        let count = candidates.len();
        let kept = nms(self.iou_threshold, self.class_agnostic, candidates);
        log::trace!("nms kept {} of {} candidates", kept.len(), count);
        Ok(kept)
    }

    /// Decodes one output tensor into score-filtered candidates without
    /// suppression. Candidates keep anchor order.
    pub fn decode_boxes<T>(
        &self,
        output: ArrayViewD<T>,
        frame_width: u32,
        frame_height: u32,
    ) -> DecoderResult<Vec<Detection>>
    where
        T: Float + AsPrimitive<f32> + Send + Sync,
    {
        if frame_width == 0 || frame_height == 0 {
            return Err(DecoderError::InvalidFrameSize(frame_width, frame_height));
        }
        let layout = TensorLayout::from_shape(output.shape(), self.num_classes)?;
        let shape = output.shape().to_vec();
        let output = output
            .into_dimensionality::<Ix3>()
            .map_err(|_| DecoderError::UnsupportedShape {
                shape,
                num_classes: self.num_classes,
            })?;
        let output = output.index_axis_move(Axis(0), 0);
        let output = match layout {
            TensorLayout::ChannelMajor => output,
            TensorLayout::AnchorMajor => output.reversed_axes(),
        };
        let boxes = output.slice_move(s![..4, ..]);
        let scores = output.slice_move(s![4..4 + self.num_classes, ..]);

        let transform = self.transform(boxes, frame_width, frame_height);
        log::trace!("decoding {:?} output with {:?}", layout, transform);
        Ok(decode_boxes_float(
            self.score_threshold,
            self.apply_sigmoid,
            scores,
            boxes,
            &transform,
            &self.labels,
        ))
    }

    fn transform<T: Float + AsPrimitive<f32>>(
        &self,
        boxes: ArrayView2<T>,
        frame_width: u32,
        frame_height: u32,
    ) -> FrameTransform {
        let normalized = match self.coordinates {
            CoordinateSpace::Normalized => true,
            CoordinateSpace::InputPixels => false,
            CoordinateSpace::Auto => probe_normalized(boxes),
        };
        if normalized {
            FrameTransform::normalized(frame_width, frame_height)
        } else {
            FrameTransform::input_pixels(
                self.input_width,
                self.input_height,
                frame_width,
                frame_height,
            )
        }
    }
}
