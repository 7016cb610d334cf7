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

//! Implements the `run` command (i.e., serving a zone).

use std::fmt::Write;
use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use env_logger::Env;
use log::{error, info};
use signal_hook::consts::signal::{SIGINT, SIGTERM};
use signal_hook::iterator::Signals;

use taproot::io::UdpServer;
use taproot::server::Server;
use taproot::zone::Zone;

use crate::args::RunArgs;

/// Runs the responder.
pub fn run(args: RunArgs) {
    env_logger::init_from_env(Env::new().default_filter_or("warn"));

    if let Err(e) = try_running(args) {
        let mut message = String::from("Failed to run:");
        for (i, cause) in e.chain().enumerate() {
            write!(message, "\n[{}] {}", i + 1, cause).unwrap();
        }
        message.push_str("\nExiting with failure.");
        error!("{}", message);
        process::exit(1);
    }
    info!("Exiting with success.");
}

fn try_running(args: RunArgs) -> Result<()> {
    info!(
        "taproot daemon v{}.{}.{} starting.",
        env!("CARGO_PKG_VERSION_MAJOR"),
        env!("CARGO_PKG_VERSION_MINOR"),
        env!("CARGO_PKG_VERSION_PATCH"),
    );

    // Bind before loading the zone: zone loading is the expensive part,
    // so fail fast on the socket.
    let udp = UdpServer::bind(args.bind, args.workers).context("failed to bind the UDP socket")?;
    info!("Listening on {}.", args.bind);

    info!("Loading the zone from {}.", args.zone.display());
    let zone = Zone::load(&args.zone).context("failed to load the zone")?;
    let server = Arc::new(Server::new(Arc::new(zone)));

    // Set up signal handling before starting the workers.
    let mut signals = set_up_signal_handling().context("failed to set up signal handling")?;

    info!("Set-up is complete; starting {} workers.", args.workers);
    let shutdown = Arc::new(AtomicBool::new(false));
    let workers = udp
        .start(&server, &shutdown)
        .context("failed to start the workers")?;

    // Wait for a termination signal.
    for signal in signals.forever() {
        match signal {
            s @ (SIGINT | SIGTERM) => {
                let name = match s {
                    SIGINT => "SIGINT",
                    SIGTERM => "SIGTERM",
                    _ => unreachable!(),
                };
                info!("Received {}; shutting down.", name);
                break;
            }
            _ => unreachable!(),
        }
    }

    // Shut down the workers.
    shutdown.store(true, Ordering::Relaxed);
    for worker in workers {
        let _ = worker.join();
    }
    info!("Shutdown complete.");
    Ok(())
}

fn set_up_signal_handling() -> Result<Signals> {
    let term_signals = &[SIGINT, SIGTERM];
    let already_terminating = Arc::new(AtomicBool::new(false));

    // This sets up signal handlers to exit immediately if a second
    // termination signal arrives before the process finishes shutting
    // down gracefully.
    for sig in term_signals {
        signal_hook::flag::register_conditional_shutdown(*sig, 1, already_terminating.clone())?;
        signal_hook::flag::register(*sig, already_terminating.clone())?;
    }

    Signals::new(term_signals).map_err(|e| e.into())
}
