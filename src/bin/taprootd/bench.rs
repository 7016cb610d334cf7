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

//! Implements the `bench` command: offline replay of captured queries.
//!
//! The query file is a concatenation of packets, each prefixed with a
//! 2-octet big-endian length. The replay runs the query core against
//! each packet in turn (wrapping around the file), with no sockets
//! involved, and reports throughput and a histogram of response codes.

use std::collections::BTreeMap;
use std::fmt::Write;
use std::fs;
use std::path::Path;
use std::process;
use std::time::Instant;

use anyhow::{bail, Context as _, Result};
use env_logger::Env;
use log::{error, info};

use taproot::server::{Scratch, Server};
use taproot::zone::Zone;

use crate::args::BenchArgs;

/// Runs the benchmark.
pub fn run(args: BenchArgs) {
    env_logger::init_from_env(Env::new().default_filter_or("warn"));

    if let Err(e) = try_running(args) {
        let mut message = String::from("Failed to run the benchmark:");
        for (i, cause) in e.chain().enumerate() {
            write!(message, "\n[{}] {}", i + 1, cause).unwrap();
        }
        error!("{}", message);
        process::exit(1);
    }
}

fn try_running(args: BenchArgs) -> Result<()> {
    let start = Instant::now();
    let zone = Zone::load(&args.zone).context("failed to load the zone")?;
    info!("Loaded the zone in {:?}.", start.elapsed());

    let start = Instant::now();
    let queries = load_queries(&args.queries).context("failed to load the query file")?;
    info!(
        "Loaded {} queries in {:?}.",
        queries.len(),
        start.elapsed(),
    );
    if queries.is_empty() {
        bail!("the query file contains no queries");
    }

    let server = Server::new(zone.into());
    let mut scratch = Scratch::new();
    let mut rcodes: BTreeMap<u8, u64> = BTreeMap::new();
    let mut dropped = 0u64;

    let start = Instant::now();
    for i in 0..args.count {
        let query = &queries[(i % queries.len() as u64) as usize];
        match server.handle_query(query, &mut scratch) {
            Some(response) => {
                let head = response[0].octets();
                if head.len() >= 12 {
                    *rcodes.entry(head[3] & 0x0f).or_default() += 1;
                }
            }
            None => dropped += 1,
        }
    }
    let elapsed = start.elapsed();

    println!(
        "{} queries in {:.3} s ({:.0} q/s)",
        args.count,
        elapsed.as_secs_f64(),
        args.count as f64 / elapsed.as_secs_f64(),
    );
    for (rcode, count) in &rcodes {
        println!("rcode {} : {}", rcode, count);
    }
    if dropped > 0 {
        println!("dropped : {}", dropped);
    }
    Ok(())
}

/// Loads a length-prefixed query file.
fn load_queries(path: &Path) -> Result<Vec<Vec<u8>>> {
    let raw = fs::read(path)?;
    let mut queries = Vec::new();
    let mut at = 0;
    while at < raw.len() {
        if raw.len() - at < 2 {
            bail!("truncated length prefix at offset {}", at);
        }
        let len = u16::from_be_bytes([raw[at], raw[at + 1]]) as usize;
        at += 2;
        if raw.len() - at < len {
            bail!("truncated query at offset {}", at);
        }
        queries.push(raw[at..at + len].to_vec());
        at += len;
    }
    Ok(queries)
}
