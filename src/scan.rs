// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Lidar scans assembled from packets.
//!
//! A [`LidarScan`] holds one full rotation of the sensor: a `(h, w)` image per
//! measurement channel plus per-column header data. Images use the staggered
//! layout of the sensor, column `m` holds the measurements of measurement id
//! `m`.
//!
//! [`ScanBatcher`] decodes lidar packets into scans and returns a scan once a
//! packet of the next frame arrives.

use crate::{
    lidar::{ChanField, Error, FieldType},
    ouster::{PacketFormat, UdpProfileLidar},
};
use log::trace;
use ndarray::{Array1, Array2};
use std::collections::BTreeMap;

/// Image of one measurement channel, stored with its native element type.
#[derive(Clone, Debug, PartialEq)]
pub enum FieldArray {
    U8(Array2<u8>),
    U16(Array2<u16>),
    U32(Array2<u32>),
}

impl FieldArray {
    fn zeros(ty: FieldType, shape: (usize, usize)) -> Self {
        match ty {
            FieldType::U8 => FieldArray::U8(Array2::zeros(shape)),
            FieldType::U16 => FieldArray::U16(Array2::zeros(shape)),
            FieldType::U32 => FieldArray::U32(Array2::zeros(shape)),
        }
    }

    pub fn field_type(&self) -> FieldType {
        match self {
            FieldArray::U8(_) => FieldType::U8,
            FieldArray::U16(_) => FieldType::U16,
            FieldArray::U32(_) => FieldType::U32,
        }
    }

    pub fn dim(&self) -> (usize, usize) {
        match self {
            FieldArray::U8(arr) => arr.dim(),
            FieldArray::U16(arr) => arr.dim(),
            FieldArray::U32(arr) => arr.dim(),
        }
    }

    /// Store a decoded value, truncating to the element type.
    fn set(&mut self, idx: [usize; 2], value: u32) {
        match self {
            FieldArray::U8(arr) => arr[idx] = value as u8,
            FieldArray::U16(arr) => arr[idx] = value as u16,
            FieldArray::U32(arr) => arr[idx] = value,
        }
    }

    /// Copy of the image widened to `f64`.
    pub fn to_f64(&self) -> Array2<f64> {
        match self {
            FieldArray::U8(arr) => arr.mapv(f64::from),
            FieldArray::U16(arr) => arr.mapv(f64::from),
            FieldArray::U32(arr) => arr.mapv(f64::from),
        }
    }
}

/// One full rotation of lidar data.
#[derive(Clone, Debug, PartialEq)]
pub struct LidarScan {
    /// Columns per frame
    pub w: usize,
    /// Pixels per column
    pub h: usize,
    pub frame_id: u16,
    /// Column timestamps (ns), zero for columns never received
    pub timestamp: Array1<u64>,
    pub measurement_id: Array1<u16>,
    pub status: Array1<u32>,
    fields: BTreeMap<ChanField, FieldArray>,
}

impl LidarScan {
    /// Empty scan with one zeroed image per channel of the packet format.
    pub fn new(format: &PacketFormat, frame_id: u16) -> Self {
        let (w, h) = (format.columns_per_frame, format.pixels_per_column);
        let fields = format
            .fields()
            .iter()
            .map(|spec| (spec.chan, FieldArray::zeros(spec.ty, (h, w))))
            .collect();

        Self {
            w,
            h,
            frame_id,
            timestamp: Array1::zeros(w),
            measurement_id: Array1::zeros(w),
            status: Array1::zeros(w),
            fields,
        }
    }

    /// Populated channels with their element type, in channel order.
    pub fn fields(&self) -> Vec<(ChanField, FieldType)> {
        self.fields
            .iter()
            .map(|(chan, arr)| (*chan, arr.field_type()))
            .collect()
    }

    pub fn field(&self, chan: ChanField) -> Option<&FieldArray> {
        self.fields.get(&chan)
    }

    /// First return range image in millimeters.
    pub fn range(&self) -> Option<&Array2<u32>> {
        match self.fields.get(&ChanField::Range) {
            Some(FieldArray::U32(arr)) => Some(arr),
            _ => None,
        }
    }

    /// Number of columns that received valid data.
    pub fn valid_columns(&self) -> usize {
        self.status.iter().filter(|status| **status != 0).count()
    }
}

/// Assembles lidar packets into scans.
pub struct ScanBatcher {
    format: PacketFormat,
    scan: Option<LidarScan>,
}

impl ScanBatcher {
    pub fn new(format: PacketFormat) -> Self {
        Self { format, scan: None }
    }

    pub fn format(&self) -> &PacketFormat {
        &self.format
    }

    /// Decode one lidar packet.
    ///
    /// Returns the previous scan when the packet starts a new frame.
    pub fn process_packet(&mut self, buf: &[u8]) -> Result<Option<LidarScan>, Error> {
        let packet = self.format.lidar_packet(buf)?;
        let frame_id = packet.frame_id();

        let completed = if self
            .scan
            .as_ref()
            .is_some_and(|scan| scan.frame_id != frame_id)
        {
            self.scan.take()
        } else {
            None
        };

        let format = &self.format;
        let scan = self
            .scan
            .get_or_insert_with(|| LidarScan::new(format, frame_id));

        for col in 0..packet.columns() {
            if !packet.col_valid(col) {
                continue;
            }

            let m_id = packet.col_measurement_id(col) as usize;
            if m_id >= scan.w {
                trace!("frame {}: measurement id {} out of range", frame_id, m_id);
                continue;
            }

            scan.timestamp[m_id] = packet.col_timestamp(col);
            scan.measurement_id[m_id] = m_id as u16;
            scan.status[m_id] = packet.col_status(col);

            for spec in format.fields() {
                if let Some(field) = scan.fields.get_mut(&spec.chan) {
                    for px in 0..scan.h {
                        field.set([px, m_id], packet.value(spec, col, px));
                    }
                }
            }
        }

        Ok(completed)
    }

    /// Return the scan still being assembled, if any.
    pub fn finish(&mut self) -> Option<LidarScan> {
        self.scan.take()
    }

    /// Whether scans carry a second return.
    pub fn is_dual(&self) -> bool {
        self.format.udp_profile_lidar == UdpProfileLidar::Rng19Rfl8Sig16Nir16Dual
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ouster::Parameters;

    const METADATA: &str = r#"{
        "lidar_data_format": {
            "columns_per_frame": 4,
            "columns_per_packet": 2,
            "pixels_per_column": 2,
            "udp_profile_lidar": "RNG19_RFL8_SIG16_NIR16"
        },
        "beam_intrinsics": {
            "beam_altitude_angles": [1.0, -1.0],
            "beam_azimuth_angles": [0.0, 0.0]
        }
    }"#;

    fn format() -> PacketFormat {
        let params = Parameters::from_json(METADATA).unwrap();
        PacketFormat::new(&params.lidar_data_format)
    }

    /// Build a single-return packet, `valid` selects columns with status set.
    fn packet(frame_id: u16, first_m_id: u16, valid: [bool; 2]) -> Vec<u8> {
        let mut buf = vec![0u8; 32];
        buf[0] = 1;
        buf[2..4].copy_from_slice(&frame_id.to_le_bytes());
        for (col, valid) in valid.iter().enumerate() {
            let m_id = first_m_id + col as u16;
            buf.extend_from_slice(&(100 * m_id as u64).to_le_bytes());
            buf.extend_from_slice(&m_id.to_le_bytes());
            buf.extend_from_slice(&(*valid as u16).to_le_bytes());
            for px in 0..2u32 {
                let range = 1000 * (m_id as u32 + 1) + px;
                buf.extend_from_slice(&range.to_le_bytes());
                buf.push(50 + px as u8); // reflectivity
                buf.push(0);
                buf.extend_from_slice(&7u16.to_le_bytes()); // signal
                buf.extend_from_slice(&9u16.to_le_bytes()); // near ir
                buf.extend_from_slice(&[0, 0]);
            }
        }
        buf.extend_from_slice(&[0u8; 32]);
        buf
    }

    #[test]
    fn test_batches_by_frame_id() {
        let mut batcher = ScanBatcher::new(format());
        assert!(batcher
            .process_packet(&packet(5, 0, [true, true]))
            .unwrap()
            .is_none());
        assert!(batcher
            .process_packet(&packet(5, 2, [true, true]))
            .unwrap()
            .is_none());

        let scan = batcher
            .process_packet(&packet(6, 0, [true, true]))
            .unwrap()
            .unwrap();
        assert_eq!(scan.frame_id, 5);
        assert_eq!((scan.h, scan.w), (2, 4));
        assert_eq!(scan.valid_columns(), 4);
        assert_eq!(scan.timestamp.to_vec(), vec![0, 100, 200, 300]);

        let range = scan.range().unwrap();
        assert_eq!(range[[0, 0]], 1000);
        assert_eq!(range[[1, 3]], 4001);

        match scan.field(ChanField::Reflectivity).unwrap() {
            FieldArray::U8(arr) => assert_eq!(arr[[1, 2]], 51),
            other => panic!("unexpected reflectivity storage {:?}", other.field_type()),
        }

        let partial = batcher.finish().unwrap();
        assert_eq!(partial.frame_id, 6);
        assert_eq!(partial.valid_columns(), 2);
        assert!(batcher.finish().is_none());
    }

    #[test]
    fn test_invalid_columns_skipped() {
        let mut batcher = ScanBatcher::new(format());
        batcher
            .process_packet(&packet(1, 0, [true, false]))
            .unwrap();
        let scan = batcher.finish().unwrap();
        assert_eq!(scan.valid_columns(), 1);
        assert_eq!(scan.range().unwrap()[[0, 1]], 0);
    }

    #[test]
    fn test_out_of_range_measurement_id() {
        let mut batcher = ScanBatcher::new(format());
        batcher
            .process_packet(&packet(1, 3, [true, true]))
            .unwrap();
        let scan = batcher.finish().unwrap();
        assert_eq!(scan.valid_columns(), 1);
        assert_eq!(scan.range().unwrap()[[0, 3]], 4000);
    }

    #[test]
    fn test_fields_in_channel_order() {
        let scan = LidarScan::new(&format(), 0);
        assert_eq!(
            scan.fields(),
            vec![
                (ChanField::Range, FieldType::U32),
                (ChanField::Signal, FieldType::U16),
                (ChanField::Reflectivity, FieldType::U8),
                (ChanField::NearIr, FieldType::U16),
            ]
        );
    }

    /// Build a legacy packet: no packet header, the frame id and a 32-bit
    /// status live in every column.
    fn legacy_packet(frame_id: u16, first_m_id: u16, valid: [bool; 2]) -> Vec<u8> {
        let mut buf = Vec::new();
        for (col, valid) in valid.iter().enumerate() {
            let m_id = first_m_id + col as u16;
            buf.extend_from_slice(&(100 * m_id as u64).to_le_bytes());
            buf.extend_from_slice(&m_id.to_le_bytes());
            buf.extend_from_slice(&frame_id.to_le_bytes());
            buf.extend_from_slice(&0u32.to_le_bytes()); // encoder count
            for px in 0..2u32 {
                let range = 0xfff0_0000 | (1000 * (m_id as u32 + 1) + px);
                buf.extend_from_slice(&range.to_le_bytes());
                buf.extend_from_slice(&(300 + px as u16).to_le_bytes()); // reflectivity
                buf.extend_from_slice(&7u16.to_le_bytes()); // signal
                buf.extend_from_slice(&9u16.to_le_bytes()); // near ir
                buf.extend_from_slice(&[0, 0]);
            }
            let status: u32 = if *valid { 0xffff_ffff } else { 0 };
            buf.extend_from_slice(&status.to_le_bytes());
        }
        buf
    }

    #[test]
    fn test_legacy_batches_by_column_frame_id() {
        let params = Parameters::from_json(&METADATA.replace("RNG19_RFL8_SIG16_NIR16", "LEGACY"))
            .unwrap();
        let mut batcher = ScanBatcher::new(PacketFormat::new(&params.lidar_data_format));
        assert!(!batcher.is_dual());

        assert!(batcher
            .process_packet(&legacy_packet(9, 0, [true, true]))
            .unwrap()
            .is_none());
        assert!(batcher
            .process_packet(&legacy_packet(9, 2, [true, false]))
            .unwrap()
            .is_none());

        let scan = batcher
            .process_packet(&legacy_packet(10, 0, [true, true]))
            .unwrap()
            .unwrap();
        assert_eq!(scan.frame_id, 9);
        assert_eq!(scan.valid_columns(), 3);
        assert_eq!(scan.status.to_vec(), vec![0xffff_ffff, 0xffff_ffff, 0xffff_ffff, 0]);
        assert_eq!(scan.timestamp.to_vec(), vec![0, 100, 200, 0]);

        let range = scan.range().unwrap();
        assert_eq!(range[[1, 2]], 3001);
        assert_eq!(range[[0, 3]], 0);

        match scan.field(ChanField::Reflectivity).unwrap() {
            FieldArray::U16(arr) => assert_eq!(arr[[1, 0]], 301),
            other => panic!("unexpected reflectivity storage {:?}", other.field_type()),
        }

        assert_eq!(batcher.finish().unwrap().frame_id, 10);
    }

    #[test]
    fn test_bad_packet_size() {
        let mut batcher = ScanBatcher::new(format());
        assert!(matches!(
            batcher.process_packet(&[0u8; 10]),
            Err(Error::InvalidPacket(_))
        ));
    }
}
