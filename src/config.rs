// SPDX-FileCopyrightText: Copyright 2025 Au-Zone Technologies
// SPDX-License-Identifier: Apache-2.0

use std::time::Duration;

use roadwatch_decoder::DecoderConfig;
use roadwatch_rules::{AggregatorConfig, RulesConfig};
use roadwatch_tracker::ByteTrackConfig;
use serde::{Deserialize, Serialize};

use crate::{DetectionSession, Error, Result};

/// Everything a detection session needs, read once when the session starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub decoder: DecoderConfig,
    pub tracker: ByteTrackConfig,
    pub rules: RulesConfig,
    pub aggregator: AggregatorConfig,
    /// how long a frame may wait for the inference worker
    pub inference_timeout_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            decoder: DecoderConfig::default(),
            tracker: ByteTrackConfig::default(),
            rules: RulesConfig::default(),
            aggregator: AggregatorConfig::default(),
            inference_timeout_ms: 1500,
        }
    }
}

impl SessionConfig {
    pub fn inference_timeout(&self) -> Duration {
        Duration::from_millis(self.inference_timeout_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.inference_timeout_ms == 0 {
            return Err(Error::InvalidConfig(
                "inference_timeout_ms must be positive".to_string(),
            ));
        }
        self.decoder.validate()?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
enum ConfigSource {
    Yaml(String),
    Json(String),
    Config(SessionConfig),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SessionBuilder {
    config_src: Option<ConfigSource>,
    inference_timeout_ms: Option<u64>,
}

impl SessionBuilder {
    /// Creates a builder using [`SessionConfig::default`] unless a
    /// configuration is supplied.
    ///
    /// # Examples
    /// ```rust
    /// # use roadwatch::{Result, SessionBuilder};
    /// # fn main() -> Result<()> {
    /// let session = SessionBuilder::new()
    ///     .with_config_yaml_str("inference_timeout_ms: 800\n".to_string())
    ///     .build()?;
    /// assert_eq!(session.inference_timeout().as_millis(), 800);
    /// # Ok(())
    /// # }
    /// ```
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config_yaml_str(mut self, yaml_str: String) -> Self {
        self.config_src.replace(ConfigSource::Yaml(yaml_str));
        self
    }

    pub fn with_config_json_str(mut self, json_str: String) -> Self {
        self.config_src.replace(ConfigSource::Json(json_str));
        self
    }

    pub fn with_config(mut self, config: SessionConfig) -> Self {
        self.config_src.replace(ConfigSource::Config(config));
        self
    }

    pub fn with_inference_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.inference_timeout_ms = Some(timeout_ms);
        self
    }

    /// Parses and validates the configuration without building a session.
    pub fn build_config(self) -> Result<SessionConfig> {
        let mut config: SessionConfig = match self.config_src {
            Some(ConfigSource::Json(s)) => serde_json::from_str(&s)?,
            Some(ConfigSource::Yaml(s)) => serde_yaml::from_str(&s)?,
            Some(ConfigSource::Config(c)) => c,
            None => SessionConfig::default(),
        };
        if let Some(v) = self.inference_timeout_ms {
            config.inference_timeout_ms = v;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn build(self) -> Result<DetectionSession> {
        DetectionSession::new(self.build_config()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_session_config() {
        let config = SessionBuilder::new().build_config().unwrap();
        assert_eq!(config, SessionConfig::default());
        assert_eq!(config.inference_timeout(), Duration::from_millis(1500));
        assert_eq!(config.tracker.track_buffer, 30);
        assert_eq!(config.aggregator.throttle.cooldown_ms, 10_000);
    }

    #[test]
    fn test_yaml_nested_sections() {
        let yaml = "
decoder:
  score_threshold: 0.5
tracker:
  track_buffer: 10
rules:
  crosswalk:
    center_inside: true
aggregator:
  frame_dedup: false
  throttle:
    cooldown_ms: 3000
";
        let config = SessionBuilder::new()
            .with_config_yaml_str(yaml.to_string())
            .build_config()
            .unwrap();
        assert_eq!(config.decoder.score_threshold, 0.5);
        assert_eq!(config.decoder.iou_threshold, 0.55);
        assert_eq!(config.tracker.track_buffer, 10);
        assert!(config.rules.crosswalk.center_inside);
        assert!(!config.aggregator.frame_dedup);
        assert_eq!(config.aggregator.throttle.cooldown_ms, 3000);
        assert_eq!(config.inference_timeout_ms, 1500);
    }

    #[test]
    fn test_json_and_override() {
        let config = SessionBuilder::new()
            .with_config_json_str(r#"{"inference_timeout_ms": 250}"#.to_string())
            .with_inference_timeout_ms(400)
            .build_config()
            .unwrap();
        assert_eq!(config.inference_timeout_ms, 400);
    }

    #[test]
    fn test_invalid_configs() {
        let err = SessionBuilder::new()
            .with_inference_timeout_ms(0)
            .build_config()
            .unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));

        let err = SessionBuilder::new()
            .with_config_yaml_str("decoder:\n  iou_threshold: 2.0\n".to_string())
            .build_config()
            .unwrap_err();
        assert!(matches!(err, Error::Decoder(_)));

        let err = SessionBuilder::new()
            .with_config_json_str("{".to_string())
            .build_config()
            .unwrap_err();
        assert!(matches!(err, Error::Json(_)));
    }
}
