// Copyright 2023 Matthew Ingwersen.
//
// Licensed under the Apache License, Version 2.0 (the "License"); you
// may not use this file except in compliance with the License. You may
// obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or
// implied. See the License for the specific language governing
// permissions and limitations under the License.

//! Implements command-line argument parsing.

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Parses the command line arguments.
pub fn parse() -> Args {
    Args::parse()
}

/// The taproot authoritative DNS responder
#[derive(Debug, Parser)]
#[clap(author, version)]
pub struct Args {
    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Serve a zone over UDP
    Run(RunArgs),

    /// Replay a raw query file against a zone and report throughput
    Bench(BenchArgs),
}

#[derive(Debug, Parser)]
pub struct RunArgs {
    /// Set the zone file to serve
    #[clap(long, value_name = "FILE")]
    pub zone: PathBuf,

    /// Set the bind IP address and port
    #[clap(long, default_value = "127.0.0.1:5353", value_name = "IP:PORT")]
    pub bind: SocketAddr,

    /// Set the number of UDP worker threads
    #[clap(long, default_value_t = 4, value_name = "N")]
    pub workers: usize,
}

#[derive(Debug, Parser)]
pub struct BenchArgs {
    /// Set the zone file to serve
    #[clap(long, value_name = "FILE")]
    pub zone: PathBuf,

    /// Replay queries from this file (each packet prefixed with a
    /// 2-octet big-endian length)
    #[clap(long, value_name = "FILE")]
    pub queries: PathBuf,

    /// Set the number of queries to execute
    #[clap(long, default_value_t = 10_000_000, value_name = "COUNT")]
    pub count: u64,
}
