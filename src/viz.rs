// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Point cloud viewers backed by Rerun.
//!
//! Both viewers spawn a local Rerun viewer process and log a single point
//! cloud to it. Builds without the `rerun` feature return
//! [`Error::MissingFeature`].

use crate::lidar::Error;

/// Whether this build can open a viewer.
pub const VIEWER_AVAILABLE: bool = cfg!(feature = "rerun");

/// Printed once the point cloud was handed to the viewer.
pub const VIEWER_EXIT_HINT: &str = "Close the Rerun viewer window to exit";

/// Application id shown by the viewer.
#[cfg(feature = "rerun")]
const APPLICATION_ID: &str = "lidarpcap";

#[cfg(feature = "rerun")]
fn viewer_error(err: impl std::fmt::Display) -> Error {
    Error::Viewer(err.to_string())
}

#[cfg(feature = "rerun")]
fn positions(points: &[[f64; 3]]) -> Vec<[f32; 3]> {
    points
        .iter()
        .map(|p| [p[0] as f32, p[1] as f32, p[2] as f32])
        .collect()
}

/// Show a point cloud with unit coordinate axes (x red, y green, z blue).
#[cfg(feature = "rerun")]
pub fn show_scan_3d(points: &[[f64; 3]]) -> Result<(), Error> {
    let rec = rerun::RecordingStreamBuilder::new(APPLICATION_ID)
        .spawn()
        .map_err(viewer_error)?;

    rec.log(
        "scan/points",
        &rerun::Points3D::new(positions(points))
            .with_radii([rerun::Radius::new_ui_points(1.0)]),
    )
    .map_err(viewer_error)?;

    rec.log(
        "scan/axes",
        &rerun::Arrows3D::from_vectors([[1.0f32, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]])
            .with_colors([
                rerun::Color::from_rgb(255, 0, 0),
                rerun::Color::from_rgb(0, 255, 0),
                rerun::Color::from_rgb(0, 0, 255),
            ]),
    )
    .map_err(viewer_error)?;

    Ok(())
}

/// Scatter plot of the points inside the `±bound` cube, with given colours.
#[cfg(feature = "rerun")]
pub fn plot_scan_points(points: &[[f64; 3]], colors: &[[u8; 3]], bound: f64) -> Result<(), Error> {
    let (inside, inside_colors): (Vec<[f64; 3]>, Vec<rerun::Color>) = points
        .iter()
        .zip(colors)
        .filter(|(p, _)| p.iter().all(|v| v.abs() <= bound))
        .map(|(p, c)| (*p, rerun::Color::from_rgb(c[0], c[1], c[2])))
        .unzip();
    log::debug!(
        "plotting {} of {} points within ±{} m",
        inside.len(),
        points.len(),
        bound
    );

    let rec = rerun::RecordingStreamBuilder::new(APPLICATION_ID)
        .spawn()
        .map_err(viewer_error)?;

    rec.log(
        "scan/points",
        &rerun::Points3D::new(positions(&inside))
            .with_colors(inside_colors)
            .with_radii([rerun::Radius::new_ui_points(1.0)]),
    )
    .map_err(viewer_error)?;

    let half = bound as f32;
    rec.log(
        "scan/bounds",
        &rerun::Boxes3D::from_half_sizes([[half, half, half]]),
    )
    .map_err(viewer_error)?;

    Ok(())
}

#[cfg(not(feature = "rerun"))]
pub fn show_scan_3d(_points: &[[f64; 3]]) -> Result<(), Error> {
    Err(Error::MissingFeature("rerun"))
}

#[cfg(not(feature = "rerun"))]
pub fn plot_scan_points(
    _points: &[[f64; 3]],
    _colors: &[[u8; 3]],
    _bound: f64,
) -> Result<(), Error> {
    Err(Error::MissingFeature("rerun"))
}
