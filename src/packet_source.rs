// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Packet source abstraction for capture readers.
//!
//! A [`PacketSource`] yields UDP payloads together with their capture
//! timestamp and ports. The scan and packet iterators in [`crate::source`] are
//! generic over it, which lets unit tests feed prebuilt payloads through
//! [`TestSource`] instead of writing capture files.
//!
//! # Example
//!
//! ```ignore
//! use edgefirst_lidarpcap::packet_source::{PacketSource, TestSource};
//!
//! let mut source = TestSource::new(vec![vec![1, 2, 3], vec![4, 5]]);
//! while let Some(packet) = source.next_packet()? {
//!     // Process packet.payload
//! }
//! ```

use crate::lidar::Error;

/// UDP payload read from a capture.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CapturedPacket {
    /// Capture timestamp in nanoseconds since the epoch
    pub timestamp_ns: u64,
    pub src_port: u16,
    pub dst_port: u16,
    /// UDP payload data
    pub payload: Vec<u8>,
}

/// Trait for packet sources.
pub trait PacketSource {
    /// Read the next packet.
    ///
    /// # Returns
    /// - `Ok(Some(packet))` - Next UDP packet
    /// - `Ok(None)` - Source is exhausted
    /// - `Err` - I/O or parse error
    fn next_packet(&mut self) -> Result<Option<CapturedPacket>, Error>;
}

impl<S: PacketSource + ?Sized> PacketSource for Box<S> {
    fn next_packet(&mut self) -> Result<Option<CapturedPacket>, Error> {
        (**self).next_packet()
    }
}

/// Test packet source for unit testing.
///
/// Provides a sequence of pre-defined payloads without a capture file.
pub struct TestSource {
    packets: Vec<CapturedPacket>,
    index: usize,
}

impl TestSource {
    /// Create a new test source with the given payloads.
    ///
    /// Timestamps count up from zero in packet order.
    pub fn new(payloads: Vec<Vec<u8>>) -> Self {
        let packets = payloads
            .into_iter()
            .enumerate()
            .map(|(idx, payload)| CapturedPacket {
                timestamp_ns: idx as u64,
                payload,
                ..Default::default()
            })
            .collect();
        Self { packets, index: 0 }
    }

    /// Create a test source from fully described packets.
    pub fn from_packets(packets: Vec<CapturedPacket>) -> Self {
        Self { packets, index: 0 }
    }

    /// Create an empty test source.
    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    pub fn len(&self) -> usize {
        self.packets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packets.is_empty()
    }
}

impl PacketSource for TestSource {
    fn next_packet(&mut self) -> Result<Option<CapturedPacket>, Error> {
        let packet = self.packets.get(self.index).cloned();
        if packet.is_some() {
            self.index += 1;
        }
        Ok(packet)
    }
}
