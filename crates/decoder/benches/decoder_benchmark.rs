use divan::black_box_drop;
use ndarray::{Array3, s};
use roadwatch_decoder::{
    DecoderBuilder, Detection,
    float::{FrameTransform, decode_boxes_float, nms},
    labels::{TRAFFIC_LABELS, traffic_labels},
};

const ANCHORS: usize = 8400;

/// Synthetic `[1, 4 + C, N]` output with a few hundred confident anchors
/// clustered into overlapping groups.
fn synthetic_output() -> Array3<f32> {
    let classes = TRAFFIC_LABELS.len();
    let mut out = Array3::<f32>::zeros((1, 4 + classes, ANCHORS));
    let mut seed = 0x1234_5678u32;
    let mut next = || {
        seed ^= seed << 13;
        seed ^= seed >> 17;
        seed ^= seed << 5;
        (seed % 10_000) as f32 / 10_000.0
    };
    for a in 0..ANCHORS {
        let group = (a % 40) as f32;
        out[[0, 0, a]] = 16.0 * group + next() * 4.0;
        out[[0, 1, a]] = 320.0 + next() * 4.0;
        out[[0, 2, a]] = 40.0 + next() * 2.0;
        out[[0, 3, a]] = 60.0 + next() * 2.0;
        let confident = a % 25 == 0;
        for c in 0..classes {
            out[[0, 4 + c, a]] = if confident && c == a % classes {
                0.5 + next() * 0.5
            } else {
                next() * 0.2
            };
        }
    }
    out
}

#[divan::bench()]
fn decoder_decode_f32(bencher: divan::Bencher) {
    let out = synthetic_output();
    let decoder = DecoderBuilder::new()
        .with_score_threshold(0.35)
        .with_iou_threshold(0.55)
        .build()
        .unwrap();
    bencher.bench_local(|| {
        let detections = decoder.decode(out.view().into_dyn(), 1920, 1080).unwrap();
        black_box_drop(detections);
    });
}

#[divan::bench()]
fn decoder_decode_boxes(bencher: divan::Bencher) {
    let out = synthetic_output();
    let out = out.slice(s![0, .., ..]);
    let boxes = out.slice(s![..4, ..]);
    let scores = out.slice(s![4.., ..]);
    let labels = traffic_labels();
    let transform = FrameTransform::input_pixels(640, 640, 1920, 1080);
    bencher.bench_local(|| {
        let detections = decode_boxes_float(0.35, false, scores, boxes, &transform, &labels);
        black_box_drop(detections);
    });
}

#[divan::bench()]
fn decoder_nms(bencher: divan::Bencher) {
    let out = synthetic_output();
    let decoder = DecoderBuilder::new().build().unwrap();
    let candidates: Vec<Detection> = decoder
        .decode_boxes(out.view().into_dyn(), 1920, 1080)
        .unwrap();
    bencher
        .with_inputs(|| candidates.clone())
        .bench_local_values(|candidates| nms(0.55, true, candidates));
}

fn main() {
    env_logger::init();
    divan::main();
}
