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

//! The blocking UDP I/O provider.
//!
//! A configurable number of worker threads share one bound socket.
//! Each worker owns its receive buffer and response scratch, receives a
//! packet, runs the query core, and sends the response segments with a
//! single gather write, so answer bundles go out without being copied
//! into a contiguous buffer first.
//!
//! Error policy: a failed send is logged and the worker keeps serving
//! (the client simply sees a drop); a failed receive ends the worker,
//! since it indicates something wrong with the socket itself. Receives
//! time out once a second so workers notice a shutdown request.

use std::io::{self, IoSlice};
use std::net::{SocketAddr, UdpSocket};
use std::os::unix::io::AsRawFd;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use arrayvec::ArrayVec;
use log::error;
use nix::sys::socket::{sendmsg, MsgFlags, SockaddrStorage};

use crate::server::{Response, Scratch, Server};

/// The maximum interval between checks of the shutdown flag, and
/// therefore the longest a shutdown has to wait for the workers.
const CHECK_FOR_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(1);

/// The size of the receive buffer. Queries are far smaller than this.
const RECEIVE_BUFFER_SIZE: usize = 512;

////////////////////////////////////////////////////////////////////////
// UDP SERVER                                                         //
////////////////////////////////////////////////////////////////////////

/// A bound UDP socket and the worker configuration to serve it.
pub struct UdpServer {
    socket: UdpSocket,
    workers: usize,
}

impl UdpServer {
    /// Binds a UDP socket to `addr` in preparation for serving with
    /// `workers` threads. The server is not started yet.
    pub fn bind(addr: SocketAddr, workers: usize) -> io::Result<Self> {
        let socket = UdpSocket::bind(addr)?;
        socket.set_read_timeout(Some(CHECK_FOR_SHUTDOWN_TIMEOUT))?;
        Ok(Self { socket, workers })
    }

    /// Returns the bound local address.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Starts the worker threads. The threads serve until `shutdown`
    /// becomes true; the returned handles can then be joined.
    pub fn start(
        self,
        server: &Arc<Server>,
        shutdown: &Arc<AtomicBool>,
    ) -> io::Result<Vec<JoinHandle<()>>> {
        let mut handles = Vec::with_capacity(self.workers);
        for i in 0..self.workers {
            let socket = self.socket.try_clone()?;
            let server = server.clone();
            let shutdown = shutdown.clone();
            let handle = thread::Builder::new()
                .name(format!("udp worker {}", i))
                .spawn(move || log_io_errors(run_udp_worker(&server, socket, &shutdown)))?;
            handles.push(handle);
        }
        Ok(handles)
    }
}

/// The UDP receive/handle/send loop.
fn run_udp_worker(
    server: &Server,
    socket: UdpSocket,
    shutdown: &AtomicBool,
) -> io::Result<()> {
    let mut packet = [0; RECEIVE_BUFFER_SIZE];
    let mut scratch = Scratch::new();

    loop {
        if shutdown.load(Ordering::Relaxed) {
            return Ok(());
        }

        // On a timeout or interruption, loop back to the shutdown check
        // before retrying.
        let (received_len, src) = match socket.recv_from(&mut packet) {
            Ok(pair) => pair,
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => continue,
            Err(e) if e.kind() == io::ErrorKind::TimedOut => continue,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };

        if let Some(response) = server.handle_query(&packet[..received_len], &mut scratch) {
            // A send failure only loses this one response; don't exit
            // the task for it.
            log_io_errors(send_response(&socket, src, &response));
        }
    }
}

/// Sends the response segments to `dest` with a single gather write.
fn send_response(socket: &UdpSocket, dest: SocketAddr, response: &Response<'_>) -> io::Result<()> {
    let slices: ArrayVec<IoSlice, 3> = response
        .iter()
        .map(|segment| IoSlice::new(segment.octets()))
        .collect();
    let dest = SockaddrStorage::from(dest);

    loop {
        match sendmsg(
            socket.as_raw_fd(),
            &slices,
            &[],
            MsgFlags::empty(),
            Some(&dest),
        ) {
            Ok(_) => return Ok(()),
            Err(nix::errno::Errno::EINTR) => continue,
            Err(errno) => return Err(io::Error::from_raw_os_error(errno as i32)),
        }
    }
}

/// Logs errors if a task exits with an I/O error.
fn log_io_errors<T>(result: io::Result<T>) {
    if let Err(e) = result {
        let current_thread = thread::current();
        let thread_name = current_thread.name().unwrap_or("anonymous thread");
        error!("I/O error in thread {}: {}", thread_name, e);
    }
}
