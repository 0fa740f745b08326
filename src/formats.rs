// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Point cloud file writers.
//!
//! # Formats
//!
//! ## LAS
//! LAS 1.2, point data record format 0, coordinates scaled to millimeters.
//!
//! ## PCD
//! Binary PCD with three float fields.
//! ```text
//! ┌───────┬───────┬───────┐
//! │ x:f32 │ y:f32 │ z:f32 │
//! │ 4B    │ 4B    │ 4B    │
//! └───────┴───────┴───────┘
//! ```
//!
//! ## PLY
//! Binary little-endian PLY, one `vertex` element with three doubles.
//! ```text
//! ┌───────┬───────┬───────┐
//! │ x:f64 │ y:f64 │ z:f64 │
//! │ 8B    │ 8B    │ 8B    │
//! └───────┴───────┴───────┘
//! ```

use crate::lidar::Error;
use byteorder::{LittleEndian, WriteBytesExt as _};
use pcd_rs::{DataKind, DynRecord, DynWriter, Field, Schema, ValueKind, WriterInit};
use std::{
    fs::File,
    io::{BufWriter, Write as _},
    path::{Path, PathBuf},
};

/// Output path of frame `idx`: `{dir}/{base}_{idx:06}.{ext}`.
pub fn frame_path(dir: &Path, base: &str, idx: usize, ext: &str) -> PathBuf {
    dir.join(format!("{}_{:06}.{}", base, idx, ext))
}

/// Write points to a LAS file.
pub fn write_las(path: &Path, points: &[[f64; 3]]) -> Result<(), Error> {
    let mut writer = las::Writer::from_path(path, las::Header::default())?;
    for p in points {
        writer.write_point(las::Point {
            x: p[0],
            y: p[1],
            z: p[2],
            ..Default::default()
        })?;
    }
    writer.close()?;
    Ok(())
}

/// Write points to a binary PCD file.
pub fn write_pcd(path: &Path, points: &[[f64; 3]]) -> Result<(), Error> {
    let schema = vec![
        ("x", ValueKind::F32, 1),
        ("y", ValueKind::F32, 1),
        ("z", ValueKind::F32, 1),
    ];
    let mut writer: DynWriter<_> = WriterInit {
        width: points.len() as u64,
        height: 1,
        viewpoint: Default::default(),
        data_kind: DataKind::Binary,
        schema: Some(Schema::from_iter(schema)),
    }
    .create(path)
    .map_err(|err| Error::Pcd(err.to_string()))?;

    for p in points {
        let record = DynRecord(vec![
            Field::F32(vec![p[0] as f32]),
            Field::F32(vec![p[1] as f32]),
            Field::F32(vec![p[2] as f32]),
        ]);
        writer
            .push(&record)
            .map_err(|err| Error::Pcd(err.to_string()))?;
    }
    writer.finish().map_err(|err| Error::Pcd(err.to_string()))?;
    Ok(())
}

/// Write points to a binary little-endian PLY file.
pub fn write_ply(path: &Path, points: &[[f64; 3]]) -> Result<(), Error> {
    let mut writer = BufWriter::new(File::create(path)?);
    write!(
        writer,
        "ply\nformat binary_little_endian 1.0\nelement vertex {}\n\
         property double x\nproperty double y\nproperty double z\nend_header\n",
        points.len()
    )?;
    for p in points {
        for v in p {
            writer.write_f64::<LittleEndian>(*v)?;
        }
    }
    writer.flush()?;
    Ok(())
}

/// Write a point cloud, choosing the format from the file extension.
///
/// `ply` writes PLY, anything else writes PCD.
pub fn write_point_cloud(path: &Path, points: &[[f64; 3]]) -> Result<(), Error> {
    let ext = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("ply") => write_ply(path, points),
        _ => write_pcd(path, points),
    }
}
