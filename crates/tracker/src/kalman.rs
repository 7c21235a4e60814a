// SPDX-FileCopyrightText: Copyright 2025 Au-Zone Technologies
// SPDX-License-Identifier: Apache-2.0

//! Constant-velocity Kalman filter over `(cx, cy, aspect, h)`.

use crate::error::{TrackerError, TrackerResult};
use nalgebra::{SMatrix, SVector};

const STD_WEIGHT_POSITION: f32 = 1.0 / 20.0;
const STD_WEIGHT_VELOCITY: f32 = 1.0 / 160.0;

type Mean = SVector<f32, 8>;
type Covariance = SMatrix<f32, 8, 8>;

/// State is `[cx, cy, a, h, vx, vy, va, vh]`. Noise scales with the box
/// height so the filter behaves the same for small and large objects.
#[derive(Debug, Clone)]
pub struct ConstantVelocityXYAHModel {
    pub mean: Mean,
    pub covariance: Covariance,
    motion: Covariance,
    observation: SMatrix<f32, 4, 8>,
}

impl ConstantVelocityXYAHModel {
    pub fn new(xyah: &[f32; 4]) -> Self {
        let mut mean = Mean::zeros();
        mean.fixed_rows_mut::<4>(0).copy_from_slice(xyah);

        let h = xyah[3];
        let std = [
            2.0 * STD_WEIGHT_POSITION * h,
            2.0 * STD_WEIGHT_POSITION * h,
            1e-2,
            2.0 * STD_WEIGHT_POSITION * h,
            10.0 * STD_WEIGHT_VELOCITY * h,
            10.0 * STD_WEIGHT_VELOCITY * h,
            1e-5,
            10.0 * STD_WEIGHT_VELOCITY * h,
        ];
        let covariance = Covariance::from_diagonal(&Mean::from_iterator(std.map(|s| s * s)));

        let mut motion = Covariance::identity();
        for i in 0..4 {
            motion[(i, i + 4)] = 1.0;
        }
        let observation = SMatrix::<f32, 4, 8>::identity();

        Self {
            mean,
            covariance,
            motion,
            observation,
        }
    }

    /// Advances the state one frame.
    pub fn predict(&mut self) {
        let h = self.mean[3];
        let std = [
            STD_WEIGHT_POSITION * h,
            STD_WEIGHT_POSITION * h,
            1e-2,
            STD_WEIGHT_POSITION * h,
            STD_WEIGHT_VELOCITY * h,
            STD_WEIGHT_VELOCITY * h,
            1e-5,
            STD_WEIGHT_VELOCITY * h,
        ];
        let noise = Covariance::from_diagonal(&Mean::from_iterator(std.map(|s| s * s)));
        self.mean = self.motion * self.mean;
        self.covariance = self.motion * self.covariance * self.motion.transpose() + noise;
    }

    /// Corrects the state with a measured `(cx, cy, a, h)`.
    pub fn update(&mut self, xyah: &[f32; 4]) -> TrackerResult<()> {
        let h = self.mean[3];
        let std = [
            STD_WEIGHT_POSITION * h,
            STD_WEIGHT_POSITION * h,
            1e-1,
            STD_WEIGHT_POSITION * h,
        ];
        let noise = SMatrix::<f32, 4, 4>::from_diagonal(&SVector::<f32, 4>::from_iterator(
            std.map(|s| s * s),
        ));

        let projected = self.observation * self.mean;
        let innovation_cov =
            self.observation * self.covariance * self.observation.transpose() + noise;
        let inverse = innovation_cov.try_inverse().ok_or_else(|| {
            TrackerError::Association("singular innovation covariance".to_string())
        })?;
        let gain = self.covariance * self.observation.transpose() * inverse;

        let measurement = SVector::<f32, 4>::from_column_slice(xyah);
        let mean = self.mean + gain * (measurement - projected);
        if mean.iter().any(|v| !v.is_finite()) {
            return Err(TrackerError::Association(
                "non-finite filter state".to_string(),
            ));
        }
        self.mean = mean;
        self.covariance -= gain * innovation_cov * gain.transpose();
        Ok(())
    }

    /// Current `(cx, cy, a, h)` estimate.
    pub fn xyah(&self) -> [f32; 4] {
        [self.mean[0], self.mean[1], self.mean[2], self.mean[3]]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_predict_without_velocity_keeps_position() {
        let mut kf = ConstantVelocityXYAHModel::new(&[0.5, 0.5, 1.0, 0.2]);
        kf.predict();
        let [x, y, a, h] = kf.xyah();
        assert!((x - 0.5).abs() < 1e-6);
        assert!((y - 0.5).abs() < 1e-6);
        assert!((a - 1.0).abs() < 1e-6);
        assert!((h - 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_update_moves_toward_measurement_and_learns_velocity() {
        let mut kf = ConstantVelocityXYAHModel::new(&[0.5, 0.5, 1.0, 0.2]);
        for step in 1..=5 {
            kf.predict();
            kf.update(&[0.5 + 0.01 * step as f32, 0.5, 1.0, 0.2]).unwrap();
        }
        assert!((kf.mean[0] - 0.55).abs() < 0.02);
        assert!(kf.mean[4] > 0.0, "velocity should be positive");
    }

    #[test]
    fn test_degenerate_height_fails_update() {
        let mut kf = ConstantVelocityXYAHModel::new(&[0.5, 0.5, 1.0, 0.0]);
        assert!(matches!(
            kf.update(&[0.5, 0.5, 1.0, 0.0]),
            Err(TrackerError::Association(_))
        ));
    }
}
