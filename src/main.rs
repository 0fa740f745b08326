// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

mod args;

use args::Args;
use edgefirst_lidarpcap::{
    examples::{description, find_example, VIEWER_HINT},
    Error, SourceFiles,
};
use log::debug;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse_with_examples();
    env_logger::Builder::new()
        .filter_level(args.rust_log)
        .init();
    debug!("{:?}", args);

    let example = match find_example(&args.example) {
        Some(example) => example,
        None => {
            println!("No such example: {}", args.example);
            println!("{}", description());
            std::process::exit(1);
        }
    };

    println!("example: {}", example.name);
    let files = SourceFiles::new(&args.pcap, args.meta.clone());
    match (example.run)(&files, args.scan_num) {
        Ok(()) => Ok(()),
        Err(Error::ScanNotFound(num)) => {
            println!("ERROR: Scan # {} in not present in pcap file", num);
            std::process::exit(1);
        }
        Err(Error::MissingFeature(_)) => {
            println!("{}", VIEWER_HINT);
            std::process::exit(1);
        }
        Err(err) => Err(err.into()),
    }
}
