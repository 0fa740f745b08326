// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Common LiDAR types and the crate error type.
//!
//! Channel names and storage types are shared by the packet decoder, the scan
//! batcher and the example procedures which print or export scan contents.

use std::fmt;

/// Measurement channels carried by Ouster lidar packets.
///
/// The declaration order is the order in which populated channels are listed
/// by [`crate::scan::LidarScan::fields`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ChanField {
    /// Range in millimeters (first return)
    Range,
    /// Range in millimeters (second return)
    Range2,
    /// Signal photons (first return)
    Signal,
    /// Signal photons (second return)
    Signal2,
    /// Calibrated reflectivity (first return)
    Reflectivity,
    /// Calibrated reflectivity (second return)
    Reflectivity2,
    /// Near-infrared ambient photons
    NearIr,
}

impl ChanField {
    pub fn name(&self) -> &'static str {
        match self {
            ChanField::Range => "RANGE",
            ChanField::Range2 => "RANGE2",
            ChanField::Signal => "SIGNAL",
            ChanField::Signal2 => "SIGNAL2",
            ChanField::Reflectivity => "REFLECTIVITY",
            ChanField::Reflectivity2 => "REFLECTIVITY2",
            ChanField::NearIr => "NEAR_IR",
        }
    }
}

impl fmt::Display for ChanField {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        // Use pad so width specifiers such as {:15} apply.
        f.pad(self.name())
    }
}

/// Element storage type of a channel.
///
/// Doubles as the on-wire width when reading a channel out of a packet.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FieldType {
    U8 = 1,
    U16 = 2,
    U32 = 4,
}

impl FieldType {
    /// Size of one element in bytes.
    pub fn size(&self) -> usize {
        *self as usize
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            FieldType::U8 => f.pad("uint8"),
            FieldType::U16 => f.pad("uint16"),
            FieldType::U32 => f.pad("uint32"),
        }
    }
}

/// Common error type for capture reading, decoding and export.
#[derive(Debug)]
pub enum Error {
    /// I/O error (capture file, output files)
    Io(std::io::Error),
    /// Capture file could not be parsed
    Pcap(String),
    /// Metadata JSON could not be parsed
    Json(serde_json::Error),
    /// Metadata is inconsistent or missing required values
    Metadata(String),
    /// Invalid packet data
    InvalidPacket(String),
    /// Unexpected end of data at given byte position
    UnexpectedEnd(usize),
    /// Unknown packet type
    UnknownPacketType(u16),
    /// Lidar UDP profile not handled by the decoder
    UnsupportedProfile(String),
    /// Shape error from ndarray operations
    Shape(ndarray::ShapeError),
    /// LAS writer error
    Las(las::Error),
    /// PCD writer error
    Pcd(String),
    /// Point cloud viewer error
    Viewer(String),
    /// Requested scan index is not present in the capture
    ScanNotFound(usize),
    /// Example needs a cargo feature this build does not have
    MissingFeature(&'static str),
}

impl std::error::Error for Error {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Io(err) => write!(f, "I/O error: {}", err),
            Error::Pcap(msg) => write!(f, "pcap error: {}", msg),
            Error::Json(err) => write!(f, "metadata json error: {}", err),
            Error::Metadata(msg) => write!(f, "invalid metadata: {}", msg),
            Error::InvalidPacket(msg) => write!(f, "invalid packet: {}", msg),
            Error::UnexpectedEnd(len) => write!(f, "unexpected end of data at {} bytes", len),
            Error::UnknownPacketType(typ) => write!(f, "unknown packet type: {}", typ),
            Error::UnsupportedProfile(profile) => {
                write!(f, "unsupported lidar udp profile: {}", profile)
            }
            Error::Shape(err) => write!(f, "shape error: {}", err),
            Error::Las(err) => write!(f, "las error: {}", err),
            Error::Pcd(msg) => write!(f, "pcd error: {}", msg),
            Error::Viewer(msg) => write!(f, "viewer error: {}", msg),
            Error::ScanNotFound(num) => write!(f, "scan #{} is not present in pcap file", num),
            Error::MissingFeature(feature) => {
                write!(f, "this build was compiled without the `{}` feature", feature)
            }
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Json(err)
    }
}

impl From<ndarray::ShapeError> for Error {
    fn from(err: ndarray::ShapeError) -> Self {
        Error::Shape(err)
    }
}

impl From<las::Error> for Error {
    fn from(err: las::Error) -> Self {
        Error::Las(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chan_field_padding() {
        assert_eq!(format!("{:15}|", ChanField::Range), "RANGE          |");
        assert_eq!(format!("{}", ChanField::NearIr), "NEAR_IR");
    }

    #[test]
    fn test_chan_field_order() {
        let mut fields = vec![ChanField::NearIr, ChanField::Reflectivity, ChanField::Range];
        fields.sort();
        assert_eq!(
            fields,
            vec![ChanField::Range, ChanField::Reflectivity, ChanField::NearIr]
        );
    }

    #[test]
    fn test_field_type() {
        assert_eq!(FieldType::U8.size(), 1);
        assert_eq!(FieldType::U16.size(), 2);
        assert_eq!(FieldType::U32.size(), 4);
        assert_eq!(FieldType::U32.to_string(), "uint32");
    }

    #[test]
    fn test_error_display() {
        assert_eq!(
            Error::ScanNotFound(7).to_string(),
            "scan #7 is not present in pcap file"
        );
        assert_eq!(Error::UnknownPacketType(3).to_string(), "unknown packet type: 3");
    }
}
