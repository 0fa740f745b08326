// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! EdgeFirst LiDAR pcap Library
//!
//! Reads Ouster lidar captures recorded as pcap files together with the
//! sensor metadata JSON, and turns them into scans, point clouds and files.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌───────────────┐     ┌─────────────────┐
//! │  PacketSource   │ ──► │  ScanBatcher  │ ──► │  LidarScan      │
//! │  (pcap/test)    │     │  (frame_id)   │     │  (w x h fields) │
//! └─────────────────┘     └───────────────┘     └─────────────────┘
//!                                                       │
//!                                                       ▼
//!                                               ┌─────────────────┐
//!                                               │  XyzLut         │
//!                                               │  (range → xyz)  │
//!                                               └─────────────────┘
//!                                                       │
//!                                     ┌─────────────────┴───────┐
//!                                     ▼                         ▼
//!                            ┌─────────────────┐      ┌─────────────────┐
//!                            │  formats        │      │  viz            │
//!                            │  (LAS/PCD/PLY)  │      │  (rerun)        │
//!                            └─────────────────┘      └─────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`colormap`]: Value normalization and viridis colours
//! - [`examples`]: The named example procedures run by the `lidarpcap` binary
//! - [`formats`]: LAS, PCD and PLY writers
//! - [`lidar`]: Channel fields and error handling
//! - [`ouster`]: Sensor metadata and packet decoding
//! - [`packet_source`]: Packet source abstraction for testing
//! - [`pcap_source`]: UDP payloads from pcap and pcapng files
//! - [`scan`]: Scan assembly from lidar packets
//! - [`source`]: Scan and packet iterators over a capture
//! - [`viz`]: Point cloud viewers
//! - [`xyz`]: Cartesian projection of range images
//!
//! # Example
//!
//! ```no_run
//! use edgefirst_lidarpcap::{PcapScanSource, SourceFiles, XyzLut};
//!
//! let files = SourceFiles::new("drive.pcap", None);
//! let scans = PcapScanSource::open(&files)?;
//! let lut = XyzLut::new(scans.metadata());
//! for scan in scans {
//!     let scan = scan?;
//!     if let Some(range) = scan.range() {
//!         let xyz = lut.project(range);
//!         println!("frame {} has {} points", scan.frame_id, xyz.len() / 3);
//!     }
//! }
//! # Ok::<(), edgefirst_lidarpcap::Error>(())
//! ```

pub mod colormap;
pub mod examples;
pub mod formats;
pub mod lidar;
pub mod ouster;
pub mod packet_source;
pub mod pcap_source;
pub mod scan;
pub mod source;
pub mod viz;
pub mod xyz;

// Re-exports for convenience
pub use lidar::{ChanField, Error, FieldType};
pub use ouster::{PacketFormat, Parameters};
pub use packet_source::PacketSource;
pub use pcap_source::PcapSource;
pub use scan::{LidarScan, ScanBatcher};
pub use source::{nth_scan, PcapPacketSource, PcapScanSource, SourceFiles};
pub use xyz::XyzLut;
