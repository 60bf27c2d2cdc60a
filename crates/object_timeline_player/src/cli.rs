// SPDX-License-Identifier: MIT OR Apache-2.0
use clap::Parser;
use std::path::PathBuf;

/// Steps the demo door timeline headlessly and logs every notification
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Runtime configuration (RON); defaults are used when omitted
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Number of fixed steps to run
    #[arg(short = 'n', long = "steps", value_name = "N", default_value_t = 240)]
    pub steps: u32,

    /// Real seconds per step
    #[arg(short = 'd', long = "delta", value_name = "SECONDS", default_value_t = 1.0 / 60.0)]
    pub delta: f32,

    /// World time dilation applied to each step
    #[arg(long = "dilation", value_name = "FACTOR", default_value_t = 1.0)]
    pub dilation: f32,

    /// Write the effective configuration to this file and exit
    #[arg(long = "dump-config", value_name = "FILE")]
    pub dump_config: Option<PathBuf>,

    /// Increase logging verbosity (-v: debug, -vv+: trace)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    pub verbosity: u8,
}
