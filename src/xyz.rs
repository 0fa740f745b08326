// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Cartesian projection of range images.
//!
//! [`XyzLut`] precomputes, for every pixel of a scan, a unit direction and an
//! offset in the sensor frame so that projecting a range image is a single
//! multiply-add per coordinate:
//!
//! ```text
//! xyz = direction * range + offset      (range != 0)
//! xyz = 0                               (range == 0)
//! ```

use crate::ouster::Parameters;
use ndarray::{Array2, Array3, Axis};
use std::f64::consts::PI;

/// Range values are reported in millimeters, points are in meters.
const RANGE_UNIT: f64 = 0.001;

/// Per-pixel projection table.
#[derive(Clone, Debug)]
pub struct XyzLut {
    w: usize,
    h: usize,
    /// `(h * w, 3)` direction scaled by the range unit
    direction: Array2<f64>,
    /// `(h * w, 3)` offset in meters
    offset: Array2<f64>,
}

impl XyzLut {
    pub fn new(params: &Parameters) -> Self {
        let w = params.width();
        let h = params.height();
        let beams = &params.beam_intrinsics;
        let b2l = &beams.beam_to_lidar_transform;
        let l2s = &params.lidar_intrinsics.lidar_to_sensor_transform;

        let mut n = b2l[3];
        if b2l[11] != 0.0 {
            n = b2l[3].hypot(b2l[11]);
        }

        let mut direction = Array2::zeros((h * w, 3));
        let mut offset = Array2::zeros((h * w, 3));

        for u in 0..h {
            let azimuth = -beams.beam_azimuth_angles[u] * PI / 180.0;
            let altitude = beams.beam_altitude_angles[u] * PI / 180.0;
            let (alt_sin, alt_cos) = altitude.sin_cos();

            for v in 0..w {
                let encoder = 2.0 * PI * (1.0 - v as f64 / w as f64);
                let (enc_sin, enc_cos) = encoder.sin_cos();
                let (theta_sin, theta_cos) = (encoder + azimuth).sin_cos();

                let dir = [theta_cos * alt_cos, theta_sin * alt_cos, alt_sin];
                let off = [
                    enc_cos * b2l[3] - dir[0] * n,
                    enc_sin * b2l[3] - dir[1] * n,
                    b2l[11] - dir[2] * n,
                ];

                let idx = u * w + v;
                for i in 0..3 {
                    let row = &l2s[i * 4..i * 4 + 4];
                    let rotated_dir = row[0] * dir[0] + row[1] * dir[1] + row[2] * dir[2];
                    let rotated_off = row[0] * off[0] + row[1] * off[1] + row[2] * off[2] + row[3];
                    direction[[idx, i]] = rotated_dir * RANGE_UNIT;
                    offset[[idx, i]] = rotated_off * RANGE_UNIT;
                }
            }
        }

        Self {
            w,
            h,
            direction,
            offset,
        }
    }

    /// Project a `(h, w)` range image (mm) to `(h, w, 3)` points (m).
    ///
    /// # Panics
    ///
    /// Panics if the range image shape does not match the table.
    pub fn project(&self, range: &Array2<u32>) -> Array3<f64> {
        assert_eq!(
            range.dim(),
            (self.h, self.w),
            "range image does not match lookup table"
        );

        let mut xyz = Array3::zeros((self.h, self.w, 3));
        for ((u, v), &r) in range.indexed_iter() {
            if r == 0 {
                continue;
            }
            let idx = u * self.w + v;
            for i in 0..3 {
                xyz[[u, v, i]] = self.direction[[idx, i]] * r as f64 + self.offset[[idx, i]];
            }
        }
        xyz
    }

    /// Project a range image to a flat list of points in row-major `(h, w)` order.
    pub fn project_points(&self, range: &Array2<u32>) -> Vec<[f64; 3]> {
        self.project(range)
            .lanes(Axis(2))
            .into_iter()
            .map(|p| [p[0], p[1], p[2]])
            .collect()
    }
}
