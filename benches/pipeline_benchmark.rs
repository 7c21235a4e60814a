// SPDX-FileCopyrightText: Copyright 2025 Au-Zone Technologies
// SPDX-License-Identifier: Apache-2.0

use divan::black_box_drop;
use ndarray::Array3;
use roadwatch::{DetectionSession, SessionConfig};

const CLASSES: usize = 26;
const ANCHORS: usize = 8400;

/// Channel-major output where every 100th anchor holds a car, a motorcycle or
/// a crosswalk drifting by `frame` steps.
fn synthetic_output(frame: usize) -> Array3<f32> {
    let mut out = Array3::<f32>::zeros((1, 4 + CLASSES, ANCHORS));
    for (n, a) in (0..ANCHORS).step_by(100).enumerate() {
        let cx = 0.05 + (n % 9) as f32 * 0.1 + frame as f32 * 0.001;
        let cy = 0.1 + (n / 9) as f32 * 0.08;
        out[[0, 0, a]] = cx;
        out[[0, 1, a]] = cy;
        out[[0, 2, a]] = 0.06;
        out[[0, 3, a]] = 0.06;
        let class = [1, 8, 3][n % 3];
        out[[0, 4 + class, a]] = 0.6 + (n % 4) as f32 * 0.1;
    }
    out
}

#[divan::bench]
fn session_process_output(bencher: divan::Bencher) {
    let frames: Vec<Array3<f32>> = (0..10).map(synthetic_output).collect();
    bencher.bench_local(|| {
        let mut session = DetectionSession::new(SessionConfig::default()).unwrap();
        for (i, frame) in frames.iter().enumerate() {
            let out = session.process_output(frame.view().into_dyn(), 1920, 1080, i as u64 * 33);
            black_box_drop(out);
        }
    });
}

fn main() {
    env_logger::init();
    divan::main();
}
