// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Example procedures over a recorded capture.
//!
//! Each example takes the capture files and a scan number. Exporters write one
//! file per scan and return the written paths. Progress and results are
//! printed to stdout.
//!
//! | name              | function                    |
//! |-------------------|-----------------------------|
//! | `open3d-one-scan` | [`pcap_3d_one_scan`]        |
//! | `plot-xyz-points` | [`pcap_display_xyz_points`] |
//! | `pcap-to-las`     | [`pcap_to_las`]             |
//! | `pcap-to-pcd`     | [`pcap_to_pcd`]             |
//! | `pcap-to-ply`     | [`pcap_to_ply`]             |
//! | `pcap-to-csv`     | [`pcap_to_csv`]             |
//! | `query-scan`      | [`pcap_query_scan`]         |
//! | `read-packets`    | [`pcap_read_packets`]       |

use crate::{
    colormap::{normalize, viridis, DEFAULT_PERCENTILE},
    formats::{frame_path, write_las, write_point_cloud},
    lidar::{ChanField, Error},
    scan::LidarScan,
    source::{nth_scan, Packet, PcapPacketSource, PcapScanSource, SourceFiles},
    viz::{plot_scan_points, show_scan_3d, VIEWER_AVAILABLE, VIEWER_EXIT_HINT},
    xyz::XyzLut,
};
use log::{debug, info};
use std::{
    fs,
    path::{Path, PathBuf},
};

/// Half extent of the scatter plot axes in meters.
const PLOT_BOUND: f64 = 6.0;

const LAS_DUAL_NOTE: &str = "Note: You've selected to convert a dual returns pcap to LAS. \
    Second returns are ignored in this conversion by this example for clarity reasons.  \
    You can modify the code as needed by accessing it through Github or the SDK documentation.";

const PCD_DUAL_NOTE: &str = "Note: You've selected to convert a dual returns pcap. \
    Second returns are ignored in this conversion by this example for clarity reasons.  \
    You can modify the code as needed by accessing it through github or the SDK documentation.";

const CSV_NOTICE: &str = "NOTICE: The pcap-to-csv example has been retired in favor of the \
    ouster-cli utility installed with the Python Ouster SDK.\n\
    To try: ouster-cli source <PCAP> save <OUT.CSV>";

/// Printed when a viewer example runs in a build without a viewer.
pub const VIEWER_HINT: &str = "This example requires the `rerun` viewer, which is not enabled \
    in this build. Try rebuilding with `--features rerun` first.";

/// Signature shared by all examples.
pub type ExampleFn = fn(&SourceFiles, usize) -> Result<(), Error>;

/// Named example.
pub struct Example {
    pub name: &'static str,
    pub run: ExampleFn,
}

/// All examples in presentation order.
pub static EXAMPLES: [Example; 8] = [
    Example {
        name: "open3d-one-scan",
        run: pcap_3d_one_scan,
    },
    Example {
        name: "plot-xyz-points",
        run: pcap_display_xyz_points,
    },
    Example {
        name: "pcap-to-las",
        run: run_pcap_to_las,
    },
    Example {
        name: "pcap-to-pcd",
        run: run_pcap_to_pcd,
    },
    Example {
        name: "pcap-to-ply",
        run: run_pcap_to_ply,
    },
    Example {
        name: "pcap-to-csv",
        run: pcap_to_csv,
    },
    Example {
        name: "query-scan",
        run: pcap_query_scan,
    },
    Example {
        name: "read-packets",
        run: pcap_read_packets,
    },
];

pub fn find_example(name: &str) -> Option<&'static Example> {
    EXAMPLES.iter().find(|example| example.name == name)
}

/// Command description listing the example names.
pub fn description() -> String {
    let names: Vec<&str> = EXAMPLES.iter().map(|example| example.name).collect();
    format!(
        "Ouster lidar pcap examples. The EXAMPLE must be one of:\n  {}",
        names.join("\n  ")
    )
}

fn run_pcap_to_las(source: &SourceFiles, num: usize) -> Result<(), Error> {
    pcap_to_las(source, num, Path::new("."), "las_out", "las").map(|_| ())
}

fn run_pcap_to_pcd(source: &SourceFiles, num: usize) -> Result<(), Error> {
    pcap_to_pcd(source, num, Path::new("."), "pcd_out", "pcd").map(|_| ())
}

fn run_pcap_to_ply(source: &SourceFiles, num: usize) -> Result<(), Error> {
    pcap_to_ply(source, num, Path::new("."), "ply_out", "ply").map(|_| ())
}

fn scan_points(lut: &XyzLut, scan: &LidarScan) -> Result<Vec<[f64; 3]>, Error> {
    let range = scan
        .range()
        .ok_or_else(|| Error::InvalidPacket("scan has no RANGE field".to_string()))?;
    Ok(lut.project_points(range))
}

/// Numpy style shape, `(16,)` or `(64, 16)`.
fn shape_str(dims: &[usize]) -> String {
    match dims {
        [len] => format!("({},)", len),
        _ => {
            let dims: Vec<String> = dims.iter().map(usize::to_string).collect();
            format!("({})", dims.join(", "))
        }
    }
}

/// Scan limit, zero means every scan.
fn scan_limit(num: usize) -> usize {
    if num == 0 {
        usize::MAX
    } else {
        num
    }
}

/// Render scan `num` with coordinate axes in a 3-D viewer.
pub fn pcap_3d_one_scan(source: &SourceFiles, num: usize) -> Result<(), Error> {
    if !VIEWER_AVAILABLE {
        return Err(Error::MissingFeature("rerun"));
    }

    let scans = PcapScanSource::open(source)?;
    let lut = XyzLut::new(scans.metadata());
    let scan = nth_scan(scans, num)?;

    let points = scan_points(&lut, &scan)?;
    info!("showing scan #{} ({} points)", num, points.len());
    show_scan_3d(&points)?;
    println!("{}", VIEWER_EXIT_HINT);
    Ok(())
}

/// Scatter plot of scan `num` coloured by normalized reflectivity.
pub fn pcap_display_xyz_points(source: &SourceFiles, num: usize) -> Result<(), Error> {
    if !VIEWER_AVAILABLE {
        return Err(Error::MissingFeature("rerun"));
    }

    let scans = PcapScanSource::open(source)?;
    let lut = XyzLut::new(scans.metadata());
    let scan = nth_scan(scans, num)?;

    let points = scan_points(&lut, &scan)?;
    let key: Vec<f64> = scan
        .field(ChanField::Reflectivity)
        .map(|field| field.to_f64().iter().copied().collect())
        .unwrap_or_else(|| vec![0.0; points.len()]);
    let colors: Vec<[u8; 3]> = normalize(&key, DEFAULT_PERCENTILE)
        .into_iter()
        .map(viridis)
        .collect();

    plot_scan_points(&points, &colors, PLOT_BOUND)?;
    println!("{}", VIEWER_EXIT_HINT);
    Ok(())
}

/// Write scans to LAS files, one per scan.
///
/// At most `num` scans are written, all of them when `num` is zero.
pub fn pcap_to_las(
    source: &SourceFiles,
    num: usize,
    las_dir: &Path,
    las_base: &str,
    las_ext: &str,
) -> Result<Vec<PathBuf>, Error> {
    let scans = PcapScanSource::open(source)?;
    if scans.is_dual() {
        println!("{}", LAS_DUAL_NOTE);
    }

    let lut = XyzLut::new(scans.metadata());
    fs::create_dir_all(las_dir)?;

    let mut written = Vec::new();
    for (idx, scan) in scans.take(scan_limit(num)).enumerate() {
        let points = scan_points(&lut, &scan?)?;
        let las_path = frame_path(las_dir, las_base, idx, las_ext);
        println!("write frame #{} to file: {}", idx, las_path.display());
        write_las(&las_path, &points)?;
        written.push(las_path);
    }
    Ok(written)
}

/// Write scans to point cloud files, one per scan.
///
/// The file format follows `pcd_ext`, see [`write_point_cloud`]. The output
/// directory is created if needed.
pub fn pcap_to_pcd(
    source: &SourceFiles,
    num: usize,
    pcd_dir: &Path,
    pcd_base: &str,
    pcd_ext: &str,
) -> Result<Vec<PathBuf>, Error> {
    let scans = PcapScanSource::open(source)?;
    if scans.is_dual() {
        println!("{}", PCD_DUAL_NOTE);
    }

    fs::create_dir_all(pcd_dir)?;
    let lut = XyzLut::new(scans.metadata());

    let mut written = Vec::new();
    for (idx, scan) in scans.take(scan_limit(num)).enumerate() {
        let points = scan_points(&lut, &scan?)?;
        let pcd_path = frame_path(pcd_dir, pcd_base, idx, pcd_ext);
        println!("write frame #{} to file: {}", idx, pcd_path.display());
        write_point_cloud(&pcd_path, &points)?;
        written.push(pcd_path);
    }
    Ok(written)
}

/// Write scans to PLY files, one per scan.
pub fn pcap_to_ply(
    source: &SourceFiles,
    num: usize,
    ply_dir: &Path,
    ply_base: &str,
    ply_ext: &str,
) -> Result<Vec<PathBuf>, Error> {
    pcap_to_pcd(source, num, ply_dir, ply_base, ply_ext)
}

/// Print the channels of the first scan with their element types.
///
/// `num` is accepted for a uniform signature and ignored.
pub fn pcap_query_scan(source: &SourceFiles, _num: usize) -> Result<(), Error> {
    let scans = PcapScanSource::open(source)?;
    let scan = nth_scan(scans, 0)?;

    info!("Available fields and corresponding dtype in LidarScan");
    for (field, ty) in scan.fields() {
        println!("{:15} {}", field, ty);
    }
    Ok(())
}

/// Print a summary of every lidar and IMU packet.
///
/// `num` is accepted for a uniform signature and ignored.
pub fn pcap_read_packets(source: &SourceFiles, _num: usize) -> Result<(), Error> {
    let packets = PcapPacketSource::open(source)?;
    let format = packets.packet_format().clone();

    for packet in packets {
        match packet? {
            Packet::Lidar(lidar) => {
                let packet = lidar.view(&format)?;
                if let Some(header) = packet.header() {
                    debug!("{}", header.to_header());
                }
                let measurement_ids = packet.measurement_ids();
                let timestamps = packet.timestamps();
                let ranges = packet
                    .field(ChanField::Range)
                    .ok_or_else(|| Error::InvalidPacket("packet has no RANGE field".to_string()))?;
                println!("  encoder counts = {}", shape_str(measurement_ids.shape()));
                println!("  timestamps = {}", shape_str(timestamps.shape()));
                println!("  ranges = {}", shape_str(ranges.shape()));
            }
            Packet::Imu(imu) => {
                let imu = imu.view(&format)?;
                println!(
                    "  acceleration = {}, {}, {}",
                    imu.la_x(),
                    imu.la_y(),
                    imu.la_z()
                );
                println!(
                    "  angular_velocity = {}, {}, {}",
                    imu.av_x(),
                    imu.av_y(),
                    imu.av_z()
                );
            }
        }
    }
    Ok(())
}

/// Print the retirement notice of the CSV exporter.
pub fn pcap_to_csv(_source: &SourceFiles, _num: usize) -> Result<(), Error> {
    println!("{}", CSV_NOTICE);
    Ok(())
}
