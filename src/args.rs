// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use clap::{CommandFactory as _, FromArgMatches as _, Parser};
use log::LevelFilter;
use std::path::PathBuf;

use edgefirst_lidarpcap::examples::description;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to pcap file
    #[arg(value_name = "PCAP")]
    pub pcap: PathBuf,

    /// Name of the example to run
    #[arg(value_name = "EXAMPLE")]
    pub example: String,

    /// Index of scan to use
    #[arg(long, default_value = "1")]
    pub scan_num: usize,

    /// Sensor metadata JSON, defaults to the pcap path with a .json extension
    #[arg(long, env = "LIDARPCAP_META")]
    pub meta: Option<PathBuf>,

    /// Application log level
    #[arg(long, env, default_value = "info")]
    pub rust_log: LevelFilter,
}

impl Args {
    /// Parse the command line, with the example list as the description.
    pub fn parse_with_examples() -> Self {
        let matches = Self::command().about(description()).get_matches();
        match Self::from_arg_matches(&matches) {
            Ok(args) => args,
            Err(err) => err.exit(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let args = Args::try_parse_from(["lidarpcap", "drive.pcap", "query-scan"]).unwrap();
        assert_eq!(args.pcap, PathBuf::from("drive.pcap"));
        assert_eq!(args.example, "query-scan");
        assert_eq!(args.scan_num, 1);
    }

    #[test]
    fn test_options() {
        let args = Args::try_parse_from([
            "lidarpcap",
            "drive.pcap",
            "pcap-to-las",
            "--scan-num",
            "3",
            "--meta",
            "os1.json",
            "--rust-log",
            "debug",
        ])
        .unwrap();
        assert_eq!(args.scan_num, 3);
        assert_eq!(args.meta, Some(PathBuf::from("os1.json")));
        assert_eq!(args.rust_log, LevelFilter::Debug);
    }

    #[test]
    fn test_missing_example() {
        assert!(Args::try_parse_from(["lidarpcap", "drive.pcap"]).is_err());
    }
}
