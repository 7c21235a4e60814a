// SPDX-FileCopyrightText: Copyright 2025 Au-Zone Technologies
// SPDX-License-Identifier: Apache-2.0

//! Class table of the traffic detection model.

pub const TRAFFIC_LABELS: [&str; 26] = [
    "bicycle",
    "car",
    "carplate",
    "crosswalk",
    "helmet",
    "invisible_signal_None",
    "kickboard",
    "lovebug",
    "motorcycle",
    "no-helmet",
    "pedestrian_signal_etc",
    "pedestrian_signal_green",
    "pedestrian_signal_red",
    "person",
    "unusual_signal_bus",
    "vehicular_signal_etc",
    "vehicular_signal_green",
    "vehicular_signal_green and green arrow",
    "vehicular_signal_green and yellow",
    "vehicular_signal_green arrow",
    "vehicular_signal_green arrow and green arrow",
    "vehicular_signal_green arrow down",
    "vehicular_signal_red",
    "vehicular_signal_red and green arrow",
    "vehicular_signal_red and yellow",
    "vehicular_signal_yellow",
];

/// Labels the signal rule hands to its tracker.
pub const VEHICLE_LABELS: [&str; 5] = ["car", "motorcycle", "bicycle", "kickboard", "lovebug"];

pub fn traffic_labels() -> Vec<String> {
    TRAFFIC_LABELS.iter().map(|s| s.to_string()).collect()
}

/// Case-insensitive, whitespace-tolerant label comparison.
pub fn label_eq(label: &str, expected: &str) -> bool {
    label.trim().eq_ignore_ascii_case(expected.trim())
}

pub fn label_in<S: AsRef<str>>(label: &str, set: &[S]) -> bool {
    set.iter().any(|s| label_eq(label, s.as_ref()))
}
