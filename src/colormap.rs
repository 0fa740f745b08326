// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Value normalization and colour mapping for point cloud display.

/// Default percentile clipped off each end by [`normalize`].
pub const DEFAULT_PERCENTILE: f64 = 0.05;

/// Viridis anchor colours at evenly spaced positions in `[0, 1]`.
const VIRIDIS: [[u8; 3]; 9] = [
    [68, 1, 84],
    [71, 44, 122],
    [59, 81, 139],
    [44, 113, 142],
    [33, 144, 141],
    [39, 173, 129],
    [92, 200, 99],
    [170, 220, 50],
    [253, 231, 37],
];

/// Linearly interpolated percentile of sorted data, `q` in `[0, 100]`.
fn percentile(sorted: &[f64], q: f64) -> f64 {
    let rank = q / 100.0 * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (rank - lo as f64)
}

/// Normalize values to `[0, 1]`, clipping `percentile` percent at each end.
///
/// When the clipped range is empty, positive data is scaled by its maximum
/// and anything else maps to zero.
pub fn normalize(values: &[f64], percentile_clip: f64) -> Vec<f64> {
    if values.is_empty() {
        return Vec::new();
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let top = percentile(&sorted, 100.0 - percentile_clip);
    let bottom = percentile(&sorted, percentile_clip);

    values
        .iter()
        .map(|v| {
            let n = if top == bottom {
                if top > 0.0 {
                    v / top
                } else {
                    0.0
                }
            } else {
                (v - bottom) / (top - bottom)
            };
            n.clamp(0.0, 1.0)
        })
        .collect()
}

/// Viridis colour of a normalized value.
pub fn viridis(t: f64) -> [u8; 3] {
    let t = if t.is_nan() { 0.0 } else { t.clamp(0.0, 1.0) };
    let pos = t * (VIRIDIS.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = (lo + 1).min(VIRIDIS.len() - 1);
    let frac = pos - lo as f64;

    let mut rgb = [0u8; 3];
    for (i, c) in rgb.iter_mut().enumerate() {
        let a = VIRIDIS[lo][i] as f64;
        let b = VIRIDIS[hi][i] as f64;
        *c = (a + (b - a) * frac).round() as u8;
    }
    rgb
}
