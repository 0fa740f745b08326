// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Scan and packet iterators over a recorded capture.
//!
//! A capture is a pcap file plus the sensor metadata JSON recorded with it.
//! [`PcapScanSource`] yields decoded scans, [`PcapPacketSource`] yields the
//! raw lidar and IMU packets.
//!
//! A payload is a lidar packet when it has the lidar packet size of the
//! configured format and was sent from or to `udp_port_lidar`, likewise for
//! IMU packets and `udp_port_imu`. Captures with no such packet at all, for
//! example sensors reconfigured to other ports, fall back to classifying by
//! size alone. Everything else is skipped.

use crate::{
    lidar::Error,
    ouster::{ImuPacket, LidarPacket, PacketFormat, PacketKind, Parameters},
    packet_source::{CapturedPacket, PacketSource},
    pcap_source::PcapSource,
    scan::{LidarScan, ScanBatcher},
};
use log::{debug, info, warn};
use std::path::{Path, PathBuf};

/// Capture file and its metadata file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SourceFiles {
    pub pcap: PathBuf,
    pub meta: PathBuf,
}

impl SourceFiles {
    /// Metadata defaults to the capture path with a `.json` extension.
    pub fn new<P: AsRef<Path>>(pcap: P, meta: Option<PathBuf>) -> Self {
        let pcap = pcap.as_ref().to_path_buf();
        let meta = meta.unwrap_or_else(|| pcap.with_extension("json"));
        Self { pcap, meta }
    }

    pub fn metadata(&self) -> Result<Parameters, Error> {
        Parameters::from_file(&self.meta)
    }
}

/// Decides which payloads are lidar or IMU packets.
#[derive(Clone, Debug)]
struct Classifier {
    format: PacketFormat,
    lidar_port: u16,
    imu_port: u16,
    size_only: bool,
}

impl Classifier {
    fn new(params: &Parameters) -> Self {
        Self {
            format: PacketFormat::new(&params.lidar_data_format),
            lidar_port: params.udp_port_lidar,
            imu_port: params.udp_port_imu,
            size_only: false,
        }
    }

    fn classify(&self, packet: &CapturedPacket) -> Option<PacketKind> {
        let kind = self.format.classify(&packet.payload)?;
        if self.size_only {
            return Some(kind);
        }
        let port = match kind {
            PacketKind::Lidar => self.lidar_port,
            PacketKind::Imu => self.imu_port,
        };
        (packet.src_port == port || packet.dst_port == port).then_some(kind)
    }
}

/// Open the capture and pick the classification for it.
///
/// The capture is read once up front until a lidar or IMU packet on the
/// metadata ports is found.
fn open_capture(files: &SourceFiles) -> Result<(PcapSource, Parameters, Classifier), Error> {
    let params = files.metadata()?;
    let mut classifier = Classifier::new(&params);

    let mut scan = PcapSource::open(&files.pcap)?;
    let mut on_ports = false;
    while let Some(packet) = scan.next_packet()? {
        if classifier.classify(&packet).is_some() {
            on_ports = true;
            break;
        }
    }
    if !on_ports {
        info!(
            "no packets on ports {} (lidar) or {} (imu), classifying by size",
            classifier.lidar_port, classifier.imu_port
        );
        classifier.size_only = true;
    }

    Ok((PcapSource::open(&files.pcap)?, params, classifier))
}

/// Iterator over the scans of a capture.
///
/// The trailing partial scan is yielded as well.
pub struct PcapScanSource<S: PacketSource = PcapSource> {
    source: S,
    params: Parameters,
    classifier: Classifier,
    batcher: ScanBatcher,
    done: bool,
}

impl PcapScanSource<PcapSource> {
    pub fn open(files: &SourceFiles) -> Result<Self, Error> {
        let (source, params, classifier) = open_capture(files)?;
        Ok(Self {
            classifier,
            ..Self::new(source, params)
        })
    }
}

impl<S: PacketSource> PcapScanSource<S> {
    /// Scans from `source`, keeping lidar packets on the metadata lidar port.
    pub fn new(source: S, params: Parameters) -> Self {
        let classifier = Classifier::new(&params);
        let batcher = ScanBatcher::new(classifier.format.clone());
        Self {
            source,
            params,
            classifier,
            batcher,
            done: false,
        }
    }

    /// Accept lidar packets on any port.
    pub fn by_size(mut self) -> Self {
        self.classifier.size_only = true;
        self
    }

    pub fn metadata(&self) -> &Parameters {
        &self.params
    }

    pub fn is_dual(&self) -> bool {
        self.batcher.is_dual()
    }
}

impl<S: PacketSource> Iterator for PcapScanSource<S> {
    type Item = Result<LidarScan, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done {
            let packet = match self.source.next_packet() {
                Ok(Some(packet)) => packet,
                Ok(None) => {
                    self.done = true;
                    return self.batcher.finish().map(Ok);
                }
                Err(err) => {
                    self.done = true;
                    return Some(Err(err));
                }
            };

            if self.classifier.classify(&packet) != Some(PacketKind::Lidar) {
                continue;
            }

            match self.batcher.process_packet(&packet.payload) {
                Ok(Some(scan)) => return Some(Ok(scan)),
                Ok(None) => {}
                Err(err) => warn!("skipping lidar packet: {}", err),
            }
        }
        None
    }
}

/// Owned lidar packet payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LidarPacketBuf {
    pub timestamp_ns: u64,
    pub buf: Vec<u8>,
}

impl LidarPacketBuf {
    pub fn view<'a>(&'a self, format: &'a PacketFormat) -> Result<LidarPacket<'a>, Error> {
        format.lidar_packet(&self.buf)
    }
}

/// Owned IMU packet payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImuPacketBuf {
    pub timestamp_ns: u64,
    pub buf: Vec<u8>,
}

impl ImuPacketBuf {
    pub fn view<'a>(&'a self, format: &PacketFormat) -> Result<ImuPacket<'a>, Error> {
        format.imu_packet(&self.buf)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Packet {
    Lidar(LidarPacketBuf),
    Imu(ImuPacketBuf),
}

/// Iterator over the lidar and IMU packets of a capture.
pub struct PcapPacketSource<S: PacketSource = PcapSource> {
    source: S,
    params: Parameters,
    classifier: Classifier,
    done: bool,
}

impl PcapPacketSource<PcapSource> {
    pub fn open(files: &SourceFiles) -> Result<Self, Error> {
        let (source, params, classifier) = open_capture(files)?;
        Ok(Self {
            source,
            params,
            classifier,
            done: false,
        })
    }
}

impl<S: PacketSource> PcapPacketSource<S> {
    /// Packets from `source`, keeping those on the metadata ports.
    pub fn new(source: S, params: Parameters) -> Self {
        let classifier = Classifier::new(&params);
        Self {
            source,
            params,
            classifier,
            done: false,
        }
    }

    /// Accept lidar and IMU packets on any port.
    pub fn by_size(mut self) -> Self {
        self.classifier.size_only = true;
        self
    }

    pub fn metadata(&self) -> &Parameters {
        &self.params
    }

    pub fn packet_format(&self) -> &PacketFormat {
        &self.classifier.format
    }
}

impl<S: PacketSource> Iterator for PcapPacketSource<S> {
    type Item = Result<Packet, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done {
            let packet = match self.source.next_packet() {
                Ok(Some(packet)) => packet,
                Ok(None) => {
                    self.done = true;
                    return None;
                }
                Err(err) => {
                    self.done = true;
                    return Some(Err(err));
                }
            };

            match self.classifier.classify(&packet) {
                Some(PacketKind::Lidar) => {
                    if let Err(err) = self.classifier.format.lidar_packet(&packet.payload) {
                        warn!("skipping lidar packet: {}", err);
                        continue;
                    }
                    return Some(Ok(Packet::Lidar(LidarPacketBuf {
                        timestamp_ns: packet.timestamp_ns,
                        buf: packet.payload,
                    })));
                }
                Some(PacketKind::Imu) => {
                    return Some(Ok(Packet::Imu(ImuPacketBuf {
                        timestamp_ns: packet.timestamp_ns,
                        buf: packet.payload,
                    })));
                }
                None => debug!(
                    "skipping {} byte packet on port {}",
                    packet.payload.len(),
                    packet.dst_port
                ),
            }
        }
        None
    }
}

/// Return scan `num` (zero-based) of a scan sequence.
pub fn nth_scan<I>(scans: I, num: usize) -> Result<LidarScan, Error>
where
    I: IntoIterator<Item = Result<LidarScan, Error>>,
{
    for (idx, scan) in scans.into_iter().enumerate() {
        let scan = scan?;
        if idx == num {
            return Ok(scan);
        }
    }
    Err(Error::ScanNotFound(num))
}
