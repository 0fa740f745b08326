// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Synthetic Ouster captures for the integration tests.
//!
//! A capture is written as a legacy pcap file (Ethernet/IPv4/UDP) plus the
//! sensor metadata JSON next to it, inside a temporary directory.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub const COLUMNS_PER_FRAME: usize = 8;
pub const COLUMNS_PER_PACKET: usize = 4;
pub const PIXELS_PER_COLUMN: usize = 4;
pub const LIDAR_PORT: u16 = 7502;
pub const IMU_PORT: u16 = 7503;

/// Acceleration written into every IMU packet.
pub const ACCELERATION: [f32; 3] = [0.25, -0.5, 1.0];
/// Angular velocity written into every IMU packet.
pub const ANGULAR_VELOCITY: [f32; 3] = [1.5, 0.0, -2.0];

/// Ethernet MTU, lidar packets of real sensors are fragmented at it.
pub const ETHERNET_MTU: usize = 1500;

// Minimal valid legacy PCAP header (little-endian, Ethernet)
const PCAP_HEADER: [u8; 24] = [
    0xd4, 0xc3, 0xb2, 0xa1, // Magic number (little-endian)
    0x02, 0x00, // Major version
    0x04, 0x00, // Minor version
    0x00, 0x00, 0x00, 0x00, // Timezone
    0x00, 0x00, 0x00, 0x00, // Timestamp accuracy
    0xff, 0xff, 0x00, 0x00, // Snap length
    0x01, 0x00, 0x00, 0x00, // Network type (Ethernet)
];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Profile {
    Legacy,
    Single,
    Dual,
}

impl Profile {
    fn name(&self) -> &'static str {
        match self {
            Profile::Legacy => "LEGACY",
            Profile::Single => "RNG19_RFL8_SIG16_NIR16",
            Profile::Dual => "RNG19_RFL8_SIG16_NIR16_DUAL",
        }
    }

    fn pixel_size(&self) -> usize {
        match self {
            Profile::Legacy | Profile::Single => 12,
            Profile::Dual => 16,
        }
    }

    fn reflectivity_offset(&self) -> usize {
        match self {
            Profile::Legacy | Profile::Single => 4,
            Profile::Dual => 3,
        }
    }
}

/// Sensor resolution of a capture.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Layout {
    pub columns_per_frame: usize,
    pub columns_per_packet: usize,
    pub pixels_per_column: usize,
}

impl Layout {
    /// Tiny 4 beam sensor used by most tests.
    pub const SMALL: Layout = Layout {
        columns_per_frame: COLUMNS_PER_FRAME,
        columns_per_packet: COLUMNS_PER_PACKET,
        pixels_per_column: PIXELS_PER_COLUMN,
    };

    /// OS1-64 in 512x10 mode.
    pub const OS1_64: Layout = Layout {
        columns_per_frame: 512,
        columns_per_packet: 16,
        pixels_per_column: 64,
    };
}

/// How a synthetic capture is recorded.
#[derive(Clone, Copy, Debug)]
pub struct Options {
    pub profile: Profile,
    pub layout: Layout,
    /// Port lidar packets are sent on, the metadata always lists [`LIDAR_PORT`]
    pub lidar_port: u16,
    /// Port IMU packets are sent on, the metadata always lists [`IMU_PORT`]
    pub imu_port: u16,
    /// IPv4 packets larger than this are fragmented
    pub mtu: Option<usize>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            profile: Profile::Single,
            layout: Layout::SMALL,
            lidar_port: LIDAR_PORT,
            imu_port: IMU_PORT,
            mtu: None,
        }
    }
}

/// Range in mm of a pixel in the synthetic capture.
pub fn range_mm(frame: usize, col: usize, px: usize) -> u32 {
    1000 + (frame * 100 + col * 10 + px) as u32
}

/// Temporary capture directory with `capture.pcap` and `capture.json`.
pub struct Capture {
    pub dir: TempDir,
    pub pcap: PathBuf,
    pub meta: PathBuf,
}

impl Capture {
    /// Capture with `scans` complete single return scans.
    pub fn new(scans: usize) -> Self {
        Self::with_profile(scans, Profile::Single)
    }

    pub fn with_profile(scans: usize, profile: Profile) -> Self {
        Self::with_options(
            scans,
            Options {
                profile,
                ..Default::default()
            },
        )
    }

    pub fn with_options(scans: usize, options: Options) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let pcap = dir.path().join("capture.pcap");
        let meta = dir.path().join("capture.json");
        std::fs::write(&pcap, pcap_bytes(scans, &options)).unwrap();
        std::fs::write(&meta, metadata(options.profile, options.layout)).unwrap();
        Self { dir, pcap, meta }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }
}

fn metadata(profile: Profile, layout: Layout) -> String {
    let pixels = layout.pixels_per_column;
    let step = 6.0 / (pixels.max(2) - 1) as f64;
    let altitudes: Vec<String> = (0..pixels)
        .map(|px| format!("{:.4}", 3.0 - step * px as f64))
        .collect();
    let zeros = vec!["0"; pixels].join(", ");

    format!(
        r#"{{
    "sensor_info": {{
        "prod_line": "OS-1-{}",
        "prod_sn": "992100000042",
        "status": "RUNNING"
    }},
    "lidar_data_format": {{
        "columns_per_frame": {},
        "columns_per_packet": {},
        "pixels_per_column": {},
        "column_window": [0, {}],
        "pixel_shift_by_row": [{}],
        "udp_profile_lidar": "{}",
        "udp_profile_imu": "LEGACY"
    }},
    "beam_intrinsics": {{
        "beam_altitude_angles": [{}],
        "beam_azimuth_angles": [{}],
        "beam_to_lidar_transform": [1, 0, 0, 0, 0, 1, 0, 0, 0, 0, 1, 0, 0, 0, 0, 1]
    }},
    "lidar_intrinsics": {{
        "lidar_to_sensor_transform": [1, 0, 0, 0, 0, 1, 0, 0, 0, 0, 1, 0, 0, 0, 0, 1]
    }},
    "config_params": {{
        "lidar_mode": "{}x10",
        "udp_port_lidar": {},
        "udp_port_imu": {}
    }}
}}"#,
        pixels,
        layout.columns_per_frame,
        layout.columns_per_packet,
        pixels,
        layout.columns_per_frame - 1,
        zeros,
        profile.name(),
        altitudes.join(", "),
        zeros,
        layout.columns_per_frame,
        LIDAR_PORT,
        IMU_PORT,
    )
}

/// Lidar packet of the small layout with columns
/// `first_col..first_col + COLUMNS_PER_PACKET`.
pub fn lidar_packet(profile: Profile, frame: usize, first_col: usize) -> Vec<u8> {
    lidar_packet_with(profile, Layout::SMALL, frame, first_col)
}

pub fn lidar_packet_with(profile: Profile, layout: Layout, frame: usize, first_col: usize) -> Vec<u8> {
    let legacy = profile == Profile::Legacy;
    let mut buf = Vec::new();
    if !legacy {
        buf.resize(32, 0);
        buf[0..2].copy_from_slice(&1u16.to_le_bytes());
        buf[2..4].copy_from_slice(&(frame as u16).to_le_bytes());
    }

    for col in first_col..first_col + layout.columns_per_packet {
        let timestamp = (frame * layout.columns_per_frame + col) as u64 * 1_000_000;
        buf.extend_from_slice(&timestamp.to_le_bytes());
        buf.extend_from_slice(&(col as u16).to_le_bytes());
        if legacy {
            buf.extend_from_slice(&(frame as u16).to_le_bytes());
            buf.extend_from_slice(&0u32.to_le_bytes()); // Encoder count
        } else {
            buf.extend_from_slice(&1u16.to_le_bytes()); // Status
        }

        for px in 0..layout.pixels_per_column {
            let mut pixel = vec![0u8; profile.pixel_size()];
            pixel[0..4].copy_from_slice(&range_mm(frame, col, px).to_le_bytes());
            pixel[profile.reflectivity_offset()] = (col * 16 + px) as u8;
            buf.extend_from_slice(&pixel);
        }

        if legacy {
            buf.extend_from_slice(&0xffff_ffffu32.to_le_bytes()); // Column valid
        }
    }

    if !legacy {
        buf.extend_from_slice(&[0u8; 32]);
    }
    buf
}

pub fn imu_packet() -> Vec<u8> {
    let mut buf = vec![0u8; 24];
    for v in ACCELERATION.iter().chain(ANGULAR_VELOCITY.iter()) {
        buf.extend_from_slice(&v.to_le_bytes());
    }
    buf
}

fn udp_datagram(src_port: u16, dst_port: u16, payload: &[u8]) -> Vec<u8> {
    let udp_len = 8 + payload.len();
    let mut datagram = Vec::with_capacity(udp_len);
    datagram.extend_from_slice(&src_port.to_be_bytes());
    datagram.extend_from_slice(&dst_port.to_be_bytes());
    datagram.extend_from_slice(&(udp_len as u16).to_be_bytes());
    datagram.extend_from_slice(&[0x00, 0x00]); // Checksum
    datagram.extend_from_slice(payload);
    datagram
}

fn ethernet_ipv4(id: u16, flags_offset: u16, ip_payload: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(14 + 20 + ip_payload.len());

    frame.extend_from_slice(&[0x00; 6]); // Dst MAC
    frame.extend_from_slice(&[0x00; 6]); // Src MAC
    frame.extend_from_slice(&[0x08, 0x00]); // EtherType: IPv4

    frame.push(0x45); // Version + IHL
    frame.push(0x00); // DSCP + ECN
    frame.extend_from_slice(&((20 + ip_payload.len()) as u16).to_be_bytes());
    frame.extend_from_slice(&id.to_be_bytes());
    frame.extend_from_slice(&flags_offset.to_be_bytes());
    frame.push(0x40); // TTL
    frame.push(0x11); // Protocol: UDP
    frame.extend_from_slice(&[0x00, 0x00]); // Checksum
    frame.extend_from_slice(&[169, 254, 0, 2]); // Src IP
    frame.extend_from_slice(&[169, 254, 0, 1]); // Dst IP

    frame.extend_from_slice(ip_payload);
    frame
}

/// Ethernet frames carrying one UDP datagram, fragmented when larger than
/// `mtu`.
fn udp_frames(id: u16, src_port: u16, dst_port: u16, payload: &[u8], mtu: Option<usize>) -> Vec<Vec<u8>> {
    let datagram = udp_datagram(src_port, dst_port, payload);
    let max_data = match mtu {
        Some(mtu) if 20 + datagram.len() > mtu => (mtu - 20) / 8 * 8,
        // Don't fragment
        _ => return vec![ethernet_ipv4(id, 0x4000, &datagram)],
    };

    datagram
        .chunks(max_data)
        .enumerate()
        .map(|(idx, chunk)| {
            let offset = idx * max_data;
            let more = offset + chunk.len() < datagram.len();
            let flags_offset = ((offset / 8) as u16) | if more { 0x2000 } else { 0 };
            ethernet_ipv4(id, flags_offset, chunk)
        })
        .collect()
}

fn pcap_record(ts_usec: u64, data: &[u8]) -> Vec<u8> {
    let len = data.len() as u32;
    let mut record = Vec::with_capacity(16 + data.len());
    record.extend_from_slice(&((ts_usec / 1_000_000) as u32).to_le_bytes());
    record.extend_from_slice(&((ts_usec % 1_000_000) as u32).to_le_bytes());
    record.extend_from_slice(&len.to_le_bytes()); // Captured length
    record.extend_from_slice(&len.to_le_bytes()); // Original length
    record.extend_from_slice(data);
    record
}

/// Pcap file with `scans` full scans and one IMU packet after every lidar
/// packet. A stray mDNS packet and an IMU sized NTP packet precede them.
pub fn pcap_bytes(scans: usize, options: &Options) -> Vec<u8> {
    let layout = options.layout;
    let mut data = PCAP_HEADER.to_vec();
    let mut ts_usec = 1_700_000_000_000_000u64;
    let mut id = 0u16;

    let mut push = |data: &mut Vec<u8>, ts_usec: u64, src: u16, dst: u16, payload: &[u8]| {
        id = id.wrapping_add(1);
        for frame in udp_frames(id, src, dst, payload, options.mtu) {
            data.extend_from_slice(&pcap_record(ts_usec, &frame));
        }
    };

    push(&mut data, ts_usec, 5353, 5353, b"mdns");
    push(&mut data, ts_usec, 123, 123, &[0u8; 48]);
    for frame in 0..scans {
        for first_col in (0..layout.columns_per_frame).step_by(layout.columns_per_packet) {
            ts_usec += 1000;
            let lidar = lidar_packet_with(options.profile, layout, frame, first_col);
            push(&mut data, ts_usec, options.lidar_port, options.lidar_port, &lidar);

            ts_usec += 10;
            push(&mut data, ts_usec, options.imu_port, options.imu_port, &imu_packet());
        }
    }
    data
}
