// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! PCAP file packet source for offline replay.
//!
//! This module provides [`PcapSource`], a [`PacketSource`] implementation that
//! streams UDP packets from PCAP/PCAPNG files. Records are read incrementally
//! so captures larger than memory can be replayed.
//!
//! Ouster lidar packets are larger than a standard MTU and are usually
//! captured as IPv4 fragments, which are reassembled before the UDP payload is
//! extracted.
//!
//! # Example
//!
//! ```ignore
//! use edgefirst_lidarpcap::PcapSource;
//! use edgefirst_lidarpcap::packet_source::PacketSource;
//!
//! // Open a capture, keeping only packets on the lidar port
//! let mut source = PcapSource::open("sensor_data.pcap")?.with_port(7502);
//!
//! while let Some(packet) = source.next_packet()? {
//!     // Process packet.payload
//! }
//! ```

use crate::{
    lidar::Error,
    packet_source::{CapturedPacket, PacketSource},
};
use etherparse::{
    defrag::IpDefragPool, IpNumber, SlicedPacket, TransportSlice, UdpHeaderSlice,
};
use log::{debug, trace, warn};
use pcap_parser::{
    traits::PcapReaderIterator, Block, Linktype, PcapBlockOwned, PcapError,
};
use std::{
    fs::File,
    io::{Cursor, Read},
    path::Path,
};

/// Reader buffer size, large enough for any single capture record.
const READ_BUFFER_SIZE: usize = 1 << 18;

/// Consecutive refills without a complete record before giving up.
const MAX_STALLED_REFILLS: usize = 16;

/// Records after which a datagram still missing fragments is dropped.
const MAX_FRAGMENT_AGE: u64 = 64;

/// Default pcapng timestamp resolution (microseconds) in units per second.
const DEFAULT_TS_RESOLUTION: u64 = 1_000_000;

/// Per-interface capture state.
struct Interface {
    linktype: Linktype,
    /// Timestamp units per second
    ts_resolution: u64,
    /// Seconds added to every timestamp
    ts_offset: i64,
    warned: bool,
}

impl Interface {
    fn new(linktype: Linktype) -> Self {
        Self {
            linktype,
            ts_resolution: DEFAULT_TS_RESOLUTION,
            ts_offset: 0,
            warned: false,
        }
    }
}

/// Nanoseconds since the epoch of a pcapng timestamp given as whole seconds
/// and a fraction in interface resolution units.
fn ng_timestamp_ns(secs: u32, frac: u32, interface: &Interface) -> u64 {
    let secs = (secs as i64).saturating_add(interface.ts_offset).max(0) as u64;
    let frac_ns = frac as u128 * 1_000_000_000 / interface.ts_resolution as u128;
    secs.saturating_mul(1_000_000_000).saturating_add(frac_ns as u64)
}

/// Record decoding state, kept apart from the reader so blocks borrowed from
/// the reader buffer can be processed while the reader is borrowed.
struct Extractor {
    port: Option<u16>,
    interfaces: Vec<Interface>,
    nanosecond: bool,
    /// IP fragments keyed by the record index of their latest fragment
    defrag: IpDefragPool<u64>,
    records: u64,
}

impl Extractor {
    fn handle_block(&mut self, block: PcapBlockOwned) -> Option<CapturedPacket> {
        match block {
            PcapBlockOwned::LegacyHeader(header) => {
                self.nanosecond = header.is_nanosecond_precision();
                self.interfaces = vec![Interface::new(header.network)];
                None
            }
            PcapBlockOwned::Legacy(packet) => {
                let scale = if self.nanosecond { 1 } else { 1_000 };
                let timestamp_ns =
                    packet.ts_sec as u64 * 1_000_000_000 + packet.ts_usec as u64 * scale;
                self.extract(0, packet.data, timestamp_ns)
            }
            PcapBlockOwned::NG(Block::SectionHeader(_)) => {
                self.interfaces.clear();
                None
            }
            PcapBlockOwned::NG(Block::InterfaceDescription(idb)) => {
                let mut interface = Interface::new(idb.linktype);
                match idb.ts_resolution() {
                    Some(resolution) => interface.ts_resolution = resolution,
                    None => warn!(
                        "unsupported timestamp resolution {:#x}, assuming microseconds",
                        idb.if_tsresol
                    ),
                }
                interface.ts_offset = idb.ts_offset();
                self.interfaces.push(interface);
                None
            }
            PcapBlockOwned::NG(Block::EnhancedPacket(epb)) => {
                let if_id = epb.if_id as usize;
                let Some(interface) = self.interfaces.get(if_id) else {
                    trace!("packet on unknown interface {}", if_id);
                    return None;
                };
                let (secs, frac) = epb.decode_ts(0, interface.ts_resolution);
                let timestamp_ns = ng_timestamp_ns(secs, frac, interface);
                let len = (epb.caplen as usize).min(epb.data.len());
                self.extract(if_id, &epb.data[..len], timestamp_ns)
            }
            PcapBlockOwned::NG(Block::SimplePacket(spb)) => self.extract(0, spb.data, 0),
            PcapBlockOwned::NG(_) => None,
        }
    }

    fn extract(&mut self, if_id: usize, data: &[u8], timestamp_ns: u64) -> Option<CapturedPacket> {
        let Some(interface) = self.interfaces.get_mut(if_id) else {
            trace!("packet on unknown interface {}", if_id);
            return None;
        };

        let sliced = match interface.linktype {
            Linktype::ETHERNET => SlicedPacket::from_ethernet(data),
            Linktype::LINUX_SLL => SlicedPacket::from_linux_sll(data),
            Linktype::RAW | Linktype::IPV4 | Linktype::IPV6 => SlicedPacket::from_ip(data),
            other => {
                if !interface.warned {
                    warn!("skipping packets with unsupported link type {:?}", other);
                    interface.warned = true;
                }
                return None;
            }
        };

        let packet = match sliced {
            Ok(packet) => packet,
            Err(err) => {
                trace!("skipping malformed frame: {:?}", err);
                return None;
            }
        };

        self.records += 1;
        let fragmented = packet
            .net
            .as_ref()
            .and_then(|net| net.ip_payload_ref())
            .is_some_and(|payload| payload.fragmented);
        if fragmented {
            return self.reassemble(&packet, timestamp_ns);
        }

        match packet.transport {
            Some(TransportSlice::Udp(udp)) => self.filtered(CapturedPacket {
                timestamp_ns,
                src_port: udp.source_port(),
                dst_port: udp.destination_port(),
                payload: udp.payload().to_vec(),
            }),
            _ => None,
        }
    }

    /// Add an IP fragment, returning the UDP packet once all fragments arrived.
    fn reassemble(&mut self, packet: &SlicedPacket, timestamp_ns: u64) -> Option<CapturedPacket> {
        let oldest = self.records.saturating_sub(MAX_FRAGMENT_AGE);
        self.defrag.retain(|seen| *seen > oldest);

        let datagram = match self.defrag.process_sliced_packet(packet, self.records, ()) {
            Ok(Some(datagram)) => datagram,
            Ok(None) => return None,
            Err(err) => {
                debug!("dropping fragment: {}", err);
                return None;
            }
        };

        trace!("reassembled {} byte datagram", datagram.payload.len());
        let udp = if datagram.ip_number == IpNumber::UDP {
            self.udp_datagram(&datagram.payload, timestamp_ns)
        } else {
            None
        };
        self.defrag.return_buf(datagram);
        udp
    }

    /// Extract the UDP payload of a reassembled datagram.
    fn udp_datagram(&self, datagram: &[u8], timestamp_ns: u64) -> Option<CapturedPacket> {
        let header = UdpHeaderSlice::from_slice(datagram).ok()?;
        let end = (header.length() as usize).clamp(8, datagram.len());
        self.filtered(CapturedPacket {
            timestamp_ns,
            src_port: header.source_port(),
            dst_port: header.destination_port(),
            payload: datagram[8..end].to_vec(),
        })
    }

    fn filtered(&self, packet: CapturedPacket) -> Option<CapturedPacket> {
        if let Some(port) = self.port {
            if packet.src_port != port && packet.dst_port != port {
                return None;
            }
        }
        if packet.payload.is_empty() {
            return None;
        }
        Some(packet)
    }
}

/// PCAP file packet source.
///
/// Streams records from a legacy PCAP or PCAPNG capture (detected from the
/// file magic) and yields the UDP payloads. The file is closed when the
/// source is dropped.
pub struct PcapSource {
    reader: Box<dyn PcapReaderIterator>,
    state: Extractor,
    finished: bool,
}

impl PcapSource {
    /// Open a capture file from disk.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let file = File::open(path.as_ref()).map_err(|err| {
            Error::Io(std::io::Error::new(
                err.kind(),
                format!("cannot open {}: {}", path.as_ref().display(), err),
            ))
        })?;
        Self::from_reader(file)
    }

    /// Read a capture held in memory.
    ///
    /// Useful for embedded test data.
    pub fn from_bytes(data: &[u8]) -> Result<Self, Error> {
        Self::from_reader(Cursor::new(data.to_vec()))
    }

    fn from_reader<R: Read + Send + 'static>(reader: R) -> Result<Self, Error> {
        let reader = pcap_parser::create_reader(READ_BUFFER_SIZE, reader)
            .map_err(|err| Error::Pcap(format!("failed to create reader: {:?}", err)))?;
        Ok(Self {
            reader,
            state: Extractor {
                port: None,
                interfaces: Vec::new(),
                nanosecond: false,
                defrag: IpDefragPool::new(),
                records: 0,
            },
            finished: false,
        })
    }

    /// Only yield packets whose source or destination port matches.
    pub fn with_port(mut self, port: u16) -> Self {
        self.state.port = Some(port);
        self
    }
}

impl PacketSource for PcapSource {
    fn next_packet(&mut self) -> Result<Option<CapturedPacket>, Error> {
        let mut stalled = 0;

        while !self.finished {
            match self.reader.next() {
                Ok((offset, block)) => {
                    stalled = 0;
                    let packet = self.state.handle_block(block);
                    self.reader.consume(offset);
                    if packet.is_some() {
                        return Ok(packet);
                    }
                }
                Err(PcapError::Eof) => self.finished = true,
                Err(PcapError::Incomplete(_)) => {
                    stalled += 1;
                    if stalled > MAX_STALLED_REFILLS {
                        warn!("capture ends with a truncated record");
                        self.finished = true;
                    } else {
                        self.reader
                            .refill()
                            .map_err(|err| Error::Pcap(format!("refill failed: {:?}", err)))?;
                    }
                }
                Err(PcapError::UnexpectedEof) => {
                    warn!("capture ends with a truncated record");
                    self.finished = true;
                }
                Err(err) => return Err(Error::Pcap(format!("{:?}", err))),
            }
        }

        Ok(None)
    }
}
