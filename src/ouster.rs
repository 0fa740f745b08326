// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Ouster sensor metadata and UDP packet format.
//!
//! Metadata is read from the JSON file recorded next to a capture. Both the
//! nested layout returned by the sensor HTTP API (`sensor_info`,
//! `lidar_data_format`, `beam_intrinsics`, ...) and the older flat layout
//! (`lidar_mode`, `beam_altitude_angles`, `data_format`, ...) are accepted.
//!
//! # Lidar packet layout
//!
//! ```text
//! ┌───────────────┬──────────────────────────────────────┬───────────────┐
//! │ packet header │ column 0 .. columns_per_packet - 1   │ packet footer │
//! │ 32B (0 legacy)│ col header | pixels | col footer     │ 32B (0 legacy)│
//! └───────────────┴──────────────────────────────────────┴───────────────┘
//! ```
//!
//! Pixel layout depends on the lidar UDP profile, see [`UdpProfileLidar`].

use crate::lidar::{ChanField, Error, FieldType};
use byteorder::{ByteOrder as _, LittleEndian};
use ndarray::{Array1, Array2};
use serde::Deserialize;
use std::{fmt, path::Path, str::FromStr};

/// Size of an IMU packet in bytes.
pub const IMU_PACKET_SIZE: usize = 48;

/// Default UDP port for lidar data.
pub const DEFAULT_UDP_PORT_LIDAR: u16 = 7502;

/// Default UDP port for IMU data.
pub const DEFAULT_UDP_PORT_IMU: u16 = 7503;

/// Lidar origin to sensor origin transform of OS sensors (row-major 4x4, mm).
const DEFAULT_LIDAR_TO_SENSOR: [f64; 16] = [
    -1.0, 0.0, 0.0, 0.0, 0.0, -1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 36.18, 0.0, 0.0, 0.0, 1.0,
];

/// Lidar UDP packet profile.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum UdpProfileLidar {
    /// Legacy 12-byte pixels, no packet header
    #[default]
    Legacy,
    /// Single return, 12-byte pixels
    Rng19Rfl8Sig16Nir16,
    /// Dual return, 16-byte pixels
    Rng19Rfl8Sig16Nir16Dual,
    /// Low data rate, 4-byte pixels
    Rng15Rfl8Nir8,
}

impl UdpProfileLidar {
    /// Whether packets carry a second return.
    pub fn is_dual(&self) -> bool {
        matches!(self, UdpProfileLidar::Rng19Rfl8Sig16Nir16Dual)
    }
}

impl FromStr for UdpProfileLidar {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "LEGACY" => Ok(UdpProfileLidar::Legacy),
            "RNG19_RFL8_SIG16_NIR16" => Ok(UdpProfileLidar::Rng19Rfl8Sig16Nir16),
            "RNG19_RFL8_SIG16_NIR16_DUAL" => Ok(UdpProfileLidar::Rng19Rfl8Sig16Nir16Dual),
            "RNG15_RFL8_NIR8" => Ok(UdpProfileLidar::Rng15Rfl8Nir8),
            other => Err(Error::UnsupportedProfile(other.to_string())),
        }
    }
}

impl fmt::Display for UdpProfileLidar {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            UdpProfileLidar::Legacy => write!(f, "LEGACY"),
            UdpProfileLidar::Rng19Rfl8Sig16Nir16 => write!(f, "RNG19_RFL8_SIG16_NIR16"),
            UdpProfileLidar::Rng19Rfl8Sig16Nir16Dual => write!(f, "RNG19_RFL8_SIG16_NIR16_DUAL"),
            UdpProfileLidar::Rng15Rfl8Nir8 => write!(f, "RNG15_RFL8_NIR8"),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct SensorInfo {
    pub status: String,
    pub build_rev: String,
    pub prod_sn: String,
    pub prod_pn: String,
    pub prod_line: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct LidarDataFormat {
    pub udp_profile_lidar: UdpProfileLidar,
    pub udp_profile_imu: String,
    pub columns_per_packet: usize,
    pub columns_per_frame: usize,
    pub pixels_per_column: usize,
    pub column_window: [usize; 2],
    pub pixel_shift_by_row: Vec<i16>,
}

/// Per-beam calibration.
///
/// Angles are in degrees, the transform is a row-major 4x4 matrix in mm.
#[derive(Clone, Debug, PartialEq)]
pub struct BeamIntrinsics {
    pub beam_altitude_angles: Vec<f64>,
    pub beam_azimuth_angles: Vec<f64>,
    pub beam_to_lidar_transform: Vec<f64>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct LidarIntrinsics {
    /// Row-major 4x4 transform from lidar to sensor frame (mm).
    pub lidar_to_sensor_transform: Vec<f64>,
}

/// Everything needed to decode and project the packets of one sensor.
#[derive(Clone, Debug, PartialEq)]
pub struct Parameters {
    pub sensor_info: SensorInfo,
    pub lidar_data_format: LidarDataFormat,
    pub beam_intrinsics: BeamIntrinsics,
    pub lidar_intrinsics: LidarIntrinsics,
    pub udp_port_lidar: u16,
    pub udp_port_imu: u16,
}

impl Parameters {
    /// Load sensor metadata from a JSON file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let json = std::fs::read_to_string(path.as_ref()).map_err(|err| {
            Error::Metadata(format!(
                "cannot read metadata {}: {}",
                path.as_ref().display(),
                err
            ))
        })?;
        Self::from_json(&json)
    }

    /// Parse sensor metadata from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, Error> {
        let raw: RawMetadata = serde_json::from_str(json)?;
        raw.into_parameters()
    }

    /// Columns per frame (scan width).
    pub fn width(&self) -> usize {
        self.lidar_data_format.columns_per_frame
    }

    /// Pixels per column (scan height).
    pub fn height(&self) -> usize {
        self.lidar_data_format.pixels_per_column
    }
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct RawSensorInfo {
    status: Option<String>,
    build_rev: Option<String>,
    prod_sn: Option<String>,
    prod_pn: Option<String>,
    prod_line: Option<String>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct RawDataFormat {
    columns_per_packet: Option<usize>,
    columns_per_frame: Option<usize>,
    pixels_per_column: Option<usize>,
    column_window: Option<[usize; 2]>,
    pixel_shift_by_row: Option<Vec<i16>>,
    udp_profile_lidar: Option<String>,
    udp_profile_imu: Option<String>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct RawBeamIntrinsics {
    beam_altitude_angles: Option<Vec<f64>>,
    beam_azimuth_angles: Option<Vec<f64>>,
    beam_to_lidar_transform: Option<Vec<f64>>,
    lidar_origin_to_beam_origin_mm: Option<f64>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct RawLidarIntrinsics {
    lidar_to_sensor_transform: Option<Vec<f64>>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct RawConfigParams {
    lidar_mode: Option<String>,
    udp_port_lidar: Option<u16>,
    udp_port_imu: Option<u16>,
}

/// Union of the nested and flat metadata layouts.
#[derive(Deserialize, Default)]
#[serde(default)]
struct RawMetadata {
    sensor_info: Option<RawSensorInfo>,
    lidar_data_format: Option<RawDataFormat>,
    beam_intrinsics: Option<RawBeamIntrinsics>,
    lidar_intrinsics: Option<RawLidarIntrinsics>,
    config_params: Option<RawConfigParams>,

    status: Option<String>,
    build_rev: Option<String>,
    prod_sn: Option<String>,
    prod_pn: Option<String>,
    prod_line: Option<String>,
    lidar_mode: Option<String>,
    beam_altitude_angles: Option<Vec<f64>>,
    beam_azimuth_angles: Option<Vec<f64>>,
    beam_to_lidar_transform: Option<Vec<f64>>,
    lidar_origin_to_beam_origin_mm: Option<f64>,
    lidar_to_sensor_transform: Option<Vec<f64>>,
    data_format: Option<RawDataFormat>,
    udp_port_lidar: Option<u16>,
    udp_port_imu: Option<u16>,
}

impl RawMetadata {
    fn into_parameters(self) -> Result<Parameters, Error> {
        let info = self.sensor_info.unwrap_or_default();
        let sensor_info = SensorInfo {
            status: info
                .status
                .or(self.status)
                .unwrap_or_else(|| "RUNNING".to_string()),
            build_rev: info
                .build_rev
                .or(self.build_rev)
                .unwrap_or_else(|| "unknown".to_string()),
            prod_sn: info
                .prod_sn
                .or(self.prod_sn)
                .unwrap_or_else(|| "unknown".to_string()),
            prod_pn: info
                .prod_pn
                .or(self.prod_pn)
                .unwrap_or_else(|| "unknown".to_string()),
            prod_line: info
                .prod_line
                .or(self.prod_line)
                .unwrap_or_else(|| "unknown".to_string()),
        };

        let config = self.config_params.unwrap_or_default();
        let lidar_mode = config.lidar_mode.or(self.lidar_mode);
        let mode_cols = lidar_mode
            .as_deref()
            .and_then(|mode| mode.split('x').next())
            .and_then(|cols| cols.parse::<usize>().ok());

        let beam = self.beam_intrinsics.unwrap_or(RawBeamIntrinsics {
            beam_altitude_angles: self.beam_altitude_angles,
            beam_azimuth_angles: self.beam_azimuth_angles,
            beam_to_lidar_transform: self.beam_to_lidar_transform,
            lidar_origin_to_beam_origin_mm: self.lidar_origin_to_beam_origin_mm,
        });

        let beam_altitude_angles = beam
            .beam_altitude_angles
            .ok_or_else(|| Error::Metadata("missing beam_altitude_angles".to_string()))?;
        let rows = beam_altitude_angles.len();
        let beam_azimuth_angles = beam
            .beam_azimuth_angles
            .unwrap_or_else(|| vec![0.0; rows]);
        let beam_to_lidar_transform = beam.beam_to_lidar_transform.unwrap_or_else(|| {
            let mut transform = identity();
            transform[3] = beam.lidar_origin_to_beam_origin_mm.unwrap_or(0.0);
            transform
        });

        let format = self
            .lidar_data_format
            .or(self.data_format)
            .unwrap_or_default();
        let cols = format
            .columns_per_frame
            .or(mode_cols)
            .ok_or_else(|| Error::Metadata("missing columns_per_frame".to_string()))?;
        let pixels = format.pixels_per_column.unwrap_or(rows);

        let lidar_data_format = LidarDataFormat {
            udp_profile_lidar: match format.udp_profile_lidar.as_deref() {
                Some(profile) => profile.parse()?,
                None => UdpProfileLidar::Legacy,
            },
            udp_profile_imu: format
                .udp_profile_imu
                .unwrap_or_else(|| "LEGACY".to_string()),
            columns_per_packet: format.columns_per_packet.unwrap_or(16),
            columns_per_frame: cols,
            pixels_per_column: pixels,
            column_window: format.column_window.unwrap_or([0, cols.saturating_sub(1)]),
            pixel_shift_by_row: format
                .pixel_shift_by_row
                .unwrap_or_else(|| vec![0; pixels]),
        };

        let lidar_to_sensor_transform = self
            .lidar_intrinsics
            .and_then(|intrinsics| intrinsics.lidar_to_sensor_transform)
            .or(self.lidar_to_sensor_transform)
            .unwrap_or_else(|| DEFAULT_LIDAR_TO_SENSOR.to_vec());

        let params = Parameters {
            sensor_info,
            lidar_data_format,
            beam_intrinsics: BeamIntrinsics {
                beam_altitude_angles,
                beam_azimuth_angles,
                beam_to_lidar_transform,
            },
            lidar_intrinsics: LidarIntrinsics {
                lidar_to_sensor_transform,
            },
            udp_port_lidar: config
                .udp_port_lidar
                .or(self.udp_port_lidar)
                .unwrap_or(DEFAULT_UDP_PORT_LIDAR),
            udp_port_imu: config
                .udp_port_imu
                .or(self.udp_port_imu)
                .unwrap_or(DEFAULT_UDP_PORT_IMU),
        };

        validate(&params)?;
        Ok(params)
    }
}

fn identity() -> Vec<f64> {
    vec![
        1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0,
    ]
}

fn validate(params: &Parameters) -> Result<(), Error> {
    let format = &params.lidar_data_format;
    let beams = &params.beam_intrinsics;

    if format.columns_per_frame == 0 || format.columns_per_packet == 0 {
        return Err(Error::Metadata(format!(
            "invalid column layout: {} columns per frame, {} per packet",
            format.columns_per_frame, format.columns_per_packet
        )));
    }
    if format.pixels_per_column == 0 {
        return Err(Error::Metadata("pixels_per_column is zero".to_string()));
    }
    if beams.beam_altitude_angles.len() != format.pixels_per_column
        || beams.beam_azimuth_angles.len() != format.pixels_per_column
    {
        return Err(Error::Metadata(format!(
            "expected {} beam angles, got {} altitude and {} azimuth",
            format.pixels_per_column,
            beams.beam_altitude_angles.len(),
            beams.beam_azimuth_angles.len()
        )));
    }
    if beams.beam_to_lidar_transform.len() != 16
        || params.lidar_intrinsics.lidar_to_sensor_transform.len() != 16
    {
        return Err(Error::Metadata(
            "transforms must be 4x4 row-major matrices".to_string(),
        ));
    }
    Ok(())
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ShotLimiting {
    Normal,
    Imminent(u8),
    Limiting(u8),
    Invalid(u8),
}

impl fmt::Display for ShotLimiting {
    fn fmt(&self, f: &mut fmt::Formatter) -> std::fmt::Result {
        match self {
            ShotLimiting::Normal => write!(f, "Normal"),
            ShotLimiting::Imminent(seconds) => write!(f, "Limiting in {} seconds", seconds),
            ShotLimiting::Limiting(range) => {
                write!(f, "Limiting to approximately {}% range", range)
            }
            ShotLimiting::Invalid(val) => write!(f, "Invalid shot limiting value: {}", val),
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ShutdownStatus {
    Normal,
    Imminent(u8),
    Invalid(u8),
}

impl fmt::Display for ShutdownStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> std::fmt::Result {
        match self {
            ShutdownStatus::Normal => write!(f, "Normal"),
            ShutdownStatus::Imminent(seconds) => {
                write!(f, "Shutdown imminent in {} seconds", seconds)
            }
            ShutdownStatus::Invalid(val) => write!(f, "Invalid shutdown status value: {}", val),
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum AlertStatus {
    Normal,
    Active(u8),
    Overflow(u8),
}

impl AlertStatus {
    pub fn from_flags(flags: u8) -> AlertStatus {
        if flags & 2 != 0 {
            AlertStatus::Overflow(flags >> 6)
        } else if flags & 1 != 0 {
            AlertStatus::Active(flags >> 6)
        } else {
            AlertStatus::Normal
        }
    }
}

impl fmt::Display for AlertStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> std::fmt::Result {
        match self {
            AlertStatus::Normal => write!(f, "Normal"),
            AlertStatus::Active(cursor) => write!(f, "Alert: {}", cursor),
            AlertStatus::Overflow(cursor) => write!(f, "Alert (overflow): {}", cursor),
        }
    }
}

/// Decoded lidar packet header (non-legacy profiles).
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Header {
    /// Packet Type is 0x1 for Lidar packets.
    pub packet_type: u16,
    /// Index of the lidar scan, increments every time the sensor completes a
    /// rotation, crossing the zero azimuth angle.
    pub frame_id: u16,
    /// Initialization ID. Updates on every reinit and every reboot.
    pub init_id: u32,
    /// Serial number of the sensor.
    pub serial_number: u64,
    pub shot_limiting: ShotLimiting,
    pub shutdown_status: ShutdownStatus,
    pub alert_status: AlertStatus,
}

impl Header {
    /// Length of the header in bytes/octets.
    pub const LEN: usize = 32;
}

impl fmt::Display for Header {
    fn fmt(&self, f: &mut fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "frame {} init {} serial {}: shot limiting {}, shutdown {}, alert {}",
            self.frame_id,
            self.init_id,
            self.serial_number,
            self.shot_limiting,
            self.shutdown_status,
            self.alert_status
        )
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct HeaderSlice<'a> {
    slice: &'a [u8],
}

impl<'a> HeaderSlice<'a> {
    pub fn from_slice(slice: &'a [u8]) -> Result<HeaderSlice<'a>, Error> {
        if slice.len() < Header::LEN {
            return Err(Error::UnexpectedEnd(slice.len()));
        }

        let packet_type = LittleEndian::read_u16(&slice[0..2]);
        if packet_type != 1 {
            return Err(Error::UnknownPacketType(packet_type));
        }

        Ok(HeaderSlice { slice })
    }

    pub fn to_header(&self) -> Header {
        Header {
            packet_type: self.packet_type(),
            frame_id: self.frame_id(),
            init_id: self.init_id(),
            serial_number: self.serial_number(),
            shot_limiting: self.shot_limiting(),
            shutdown_status: self.shutdown_status(),
            alert_status: self.alert_status(),
        }
    }

    pub fn packet_type(&self) -> u16 {
        LittleEndian::read_u16(&self.slice[0..2])
    }

    pub fn frame_id(&self) -> u16 {
        LittleEndian::read_u16(&self.slice[2..4])
    }

    pub fn init_id(&self) -> u32 {
        LittleEndian::read_u24(&self.slice[4..7])
    }

    pub fn serial_number(&self) -> u64 {
        LittleEndian::read_uint(&self.slice[7..12], 5)
    }

    pub fn shot_limiting(&self) -> ShotLimiting {
        match self.slice[19] & 0x0f {
            0 => ShotLimiting::Normal,
            1 => ShotLimiting::Imminent(self.shot_limiting_countdown()),
            2 => ShotLimiting::Limiting(3),
            3 => ShotLimiting::Limiting(6),
            4 => ShotLimiting::Limiting(9),
            5 => ShotLimiting::Limiting(12),
            6 => ShotLimiting::Limiting(16),
            7 => ShotLimiting::Limiting(21),
            8 => ShotLimiting::Limiting(25),
            9 => ShotLimiting::Limiting(27),
            val => ShotLimiting::Invalid(val),
        }
    }

    pub fn shutdown_status(&self) -> ShutdownStatus {
        match self.slice[18] & 0x0f {
            0 => ShutdownStatus::Normal,
            1 => ShutdownStatus::Imminent(self.shutdown_countdown()),
            val => ShutdownStatus::Invalid(val),
        }
    }

    pub fn shot_limiting_countdown(&self) -> u8 {
        self.slice[17]
    }

    pub fn shutdown_countdown(&self) -> u8 {
        self.slice[16]
    }

    pub fn alert_status(&self) -> AlertStatus {
        AlertStatus::from_flags(self.slice[12])
    }
}

/// Location of one channel inside a pixel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FieldSpec {
    pub chan: ChanField,
    /// Storage type in a [`crate::scan::LidarScan`]
    pub ty: FieldType,
    /// Width read from the packet
    pub wire: FieldType,
    pub offset: usize,
    pub mask: u32,
    /// Positive shifts right, negative shifts left (scales the raw value).
    pub shift: i8,
}

impl FieldSpec {
    const fn new(chan: ChanField, ty: FieldType, wire: FieldType, offset: usize) -> Self {
        Self {
            chan,
            ty,
            wire,
            offset,
            mask: u32::MAX,
            shift: 0,
        }
    }

    const fn masked(self, mask: u32) -> Self {
        Self { mask, ..self }
    }

    const fn shifted(self, shift: i8) -> Self {
        Self { shift, ..self }
    }

    fn read(&self, pixel: &[u8]) -> u32 {
        let raw = match self.wire {
            FieldType::U8 => pixel[self.offset] as u32,
            FieldType::U16 => LittleEndian::read_u16(&pixel[self.offset..]) as u32,
            FieldType::U32 => LittleEndian::read_u32(&pixel[self.offset..]),
        } & self.mask;

        match self.shift {
            0 => raw,
            s if s > 0 => raw >> s,
            s => raw << -s,
        }
    }
}

fn profile_fields(profile: UdpProfileLidar) -> Vec<FieldSpec> {
    use ChanField::*;
    use FieldType::*;

    match profile {
        UdpProfileLidar::Legacy => vec![
            FieldSpec::new(Range, U32, U32, 0).masked(0x000f_ffff),
            FieldSpec::new(Reflectivity, U16, U16, 4),
            FieldSpec::new(Signal, U16, U16, 6),
            FieldSpec::new(NearIr, U16, U16, 8),
        ],
        UdpProfileLidar::Rng19Rfl8Sig16Nir16 => vec![
            FieldSpec::new(Range, U32, U32, 0).masked(0x0007_ffff),
            FieldSpec::new(Reflectivity, U8, U8, 4),
            FieldSpec::new(Signal, U16, U16, 6),
            FieldSpec::new(NearIr, U16, U16, 8),
        ],
        UdpProfileLidar::Rng19Rfl8Sig16Nir16Dual => vec![
            FieldSpec::new(Range, U32, U32, 0).masked(0x0007_ffff),
            FieldSpec::new(Range2, U32, U32, 4).masked(0x0007_ffff),
            FieldSpec::new(Signal, U16, U16, 8),
            FieldSpec::new(Signal2, U16, U16, 10),
            FieldSpec::new(Reflectivity, U8, U8, 3),
            FieldSpec::new(Reflectivity2, U8, U8, 7),
            FieldSpec::new(NearIr, U16, U16, 12),
        ],
        UdpProfileLidar::Rng15Rfl8Nir8 => vec![
            FieldSpec::new(Range, U32, U16, 0).masked(0x7fff).shifted(-3),
            FieldSpec::new(Reflectivity, U8, U8, 2),
            FieldSpec::new(NearIr, U16, U8, 3).shifted(-4),
        ],
    }
}

/// Byte layout of lidar and IMU packets for one sensor configuration.
#[derive(Clone, Debug)]
pub struct PacketFormat {
    pub udp_profile_lidar: UdpProfileLidar,
    pub pixels_per_column: usize,
    pub columns_per_packet: usize,
    pub columns_per_frame: usize,
    packet_header_size: usize,
    col_header_size: usize,
    channel_data_size: usize,
    col_footer_size: usize,
    packet_footer_size: usize,
    fields: Vec<FieldSpec>,
}

/// Packet kind inferred from the payload size.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PacketKind {
    Lidar,
    Imu,
}

impl PacketFormat {
    pub fn new(format: &LidarDataFormat) -> Self {
        let profile = format.udp_profile_lidar;
        let (packet_header_size, col_header_size, col_footer_size, packet_footer_size) =
            match profile {
                UdpProfileLidar::Legacy => (0, 16, 4, 0),
                _ => (Header::LEN, 12, 0, 32),
            };
        let channel_data_size = match profile {
            UdpProfileLidar::Legacy | UdpProfileLidar::Rng19Rfl8Sig16Nir16 => 12,
            UdpProfileLidar::Rng19Rfl8Sig16Nir16Dual => 16,
            UdpProfileLidar::Rng15Rfl8Nir8 => 4,
        };

        Self {
            udp_profile_lidar: profile,
            pixels_per_column: format.pixels_per_column,
            columns_per_packet: format.columns_per_packet,
            columns_per_frame: format.columns_per_frame,
            packet_header_size,
            col_header_size,
            channel_data_size,
            col_footer_size,
            packet_footer_size,
            fields: profile_fields(profile),
        }
    }

    /// Channels carried by this profile.
    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    pub fn field(&self, chan: ChanField) -> Option<&FieldSpec> {
        self.fields.iter().find(|spec| spec.chan == chan)
    }

    fn col_size(&self) -> usize {
        self.col_header_size + self.pixels_per_column * self.channel_data_size + self.col_footer_size
    }

    pub fn lidar_packet_size(&self) -> usize {
        self.packet_header_size
            + self.columns_per_packet * self.col_size()
            + self.packet_footer_size
    }

    pub fn imu_packet_size(&self) -> usize {
        IMU_PACKET_SIZE
    }

    /// Infer the packet kind from the payload size.
    pub fn classify(&self, payload: &[u8]) -> Option<PacketKind> {
        if payload.len() == self.lidar_packet_size() {
            Some(PacketKind::Lidar)
        } else if payload.len() == self.imu_packet_size() {
            Some(PacketKind::Imu)
        } else {
            None
        }
    }

    /// Borrow a lidar packet, validating its size and header.
    pub fn lidar_packet<'a>(&'a self, buf: &'a [u8]) -> Result<LidarPacket<'a>, Error> {
        if buf.len() != self.lidar_packet_size() {
            return Err(Error::InvalidPacket(format!(
                "lidar packet of {} bytes, expected {}",
                buf.len(),
                self.lidar_packet_size()
            )));
        }
        let header = match self.udp_profile_lidar {
            UdpProfileLidar::Legacy => None,
            _ => Some(HeaderSlice::from_slice(buf)?),
        };
        Ok(LidarPacket {
            format: self,
            buf,
            header,
        })
    }

    /// Borrow an IMU packet, validating its size.
    pub fn imu_packet<'a>(&self, buf: &'a [u8]) -> Result<ImuPacket<'a>, Error> {
        if buf.len() != IMU_PACKET_SIZE {
            return Err(Error::InvalidPacket(format!(
                "imu packet of {} bytes, expected {}",
                buf.len(),
                IMU_PACKET_SIZE
            )));
        }
        Ok(ImuPacket { buf })
    }
}

/// Borrowed view of a lidar packet.
#[derive(Clone, Copy, Debug)]
pub struct LidarPacket<'a> {
    format: &'a PacketFormat,
    buf: &'a [u8],
    header: Option<HeaderSlice<'a>>,
}

impl<'a> LidarPacket<'a> {
    /// Packet header, absent for the legacy profile.
    pub fn header(&self) -> Option<HeaderSlice<'a>> {
        self.header
    }

    pub fn frame_id(&self) -> u16 {
        match self.header {
            Some(header) => header.frame_id(),
            // Legacy packets carry the frame id in every column header.
            None => LittleEndian::read_u16(&self.column(0)[10..12]),
        }
    }

    pub fn columns(&self) -> usize {
        self.format.columns_per_packet
    }

    fn column(&self, col: usize) -> &'a [u8] {
        let size = self.format.col_size();
        let start = self.format.packet_header_size + col * size;
        &self.buf[start..start + size]
    }

    pub fn col_timestamp(&self, col: usize) -> u64 {
        LittleEndian::read_u64(&self.column(col)[0..8])
    }

    pub fn col_measurement_id(&self, col: usize) -> u16 {
        LittleEndian::read_u16(&self.column(col)[8..10])
    }

    pub fn col_status(&self, col: usize) -> u32 {
        let column = self.column(col);
        match self.format.udp_profile_lidar {
            UdpProfileLidar::Legacy => LittleEndian::read_u32(&column[column.len() - 4..]),
            _ => LittleEndian::read_u16(&column[10..12]) as u32,
        }
    }

    /// Whether the column holds valid measurements.
    pub fn col_valid(&self, col: usize) -> bool {
        match self.format.udp_profile_lidar {
            UdpProfileLidar::Legacy => self.col_status(col) == 0xffff_ffff,
            _ => self.col_status(col) & 0x01 != 0,
        }
    }

    /// Raw pixel bytes of one column/row.
    fn pixel(&self, col: usize, px: usize) -> &'a [u8] {
        let size = self.format.channel_data_size;
        let start = self.format.col_header_size + px * size;
        &self.column(col)[start..start + size]
    }

    /// Value of one channel at a column/row.
    pub fn value(&self, spec: &FieldSpec, col: usize, px: usize) -> u32 {
        spec.read(self.pixel(col, px))
    }

    /// Measurement ids of all columns, shape `(columns_per_packet,)`.
    pub fn measurement_ids(&self) -> Array1<u16> {
        Array1::from_shape_fn(self.columns(), |col| self.col_measurement_id(col))
    }

    /// Timestamps of all columns, shape `(columns_per_packet,)`.
    pub fn timestamps(&self) -> Array1<u64> {
        Array1::from_shape_fn(self.columns(), |col| self.col_timestamp(col))
    }

    /// One channel for the whole packet, shape `(pixels_per_column, columns_per_packet)`.
    pub fn field(&self, chan: ChanField) -> Option<Array2<u32>> {
        let spec = self.format.field(chan)?;
        Some(Array2::from_shape_fn(
            (self.format.pixels_per_column, self.columns()),
            |(px, col)| self.value(spec, col, px),
        ))
    }
}

/// Borrowed view of an IMU packet.
#[derive(Clone, Copy, Debug)]
pub struct ImuPacket<'a> {
    buf: &'a [u8],
}

impl ImuPacket<'_> {
    fn f32_at(&self, offset: usize) -> f32 {
        LittleEndian::read_f32(&self.buf[offset..offset + 4])
    }

    pub fn sys_ts(&self) -> u64 {
        LittleEndian::read_u64(&self.buf[0..8])
    }

    pub fn accel_ts(&self) -> u64 {
        LittleEndian::read_u64(&self.buf[8..16])
    }

    pub fn gyro_ts(&self) -> u64 {
        LittleEndian::read_u64(&self.buf[16..24])
    }

    /// Linear acceleration along x (g)
    pub fn la_x(&self) -> f32 {
        self.f32_at(24)
    }

    pub fn la_y(&self) -> f32 {
        self.f32_at(28)
    }

    pub fn la_z(&self) -> f32 {
        self.f32_at(32)
    }

    /// Angular velocity around x (deg/s)
    pub fn av_x(&self) -> f32 {
        self.f32_at(36)
    }

    pub fn av_y(&self) -> f32 {
        self.f32_at(40)
    }

    pub fn av_z(&self) -> f32 {
        self.f32_at(44)
    }
}
