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

//! The query-processing core of the responder, abstracted from any
//! underlying network I/O provider.
//!
//! A [`Server`] pairs a loaded [`Zone`] with per-call scratch storage
//! to answer one packet at a time. I/O providers call
//! [`Server::handle_query`] with a received packet and a [`Scratch`]
//! they own; the returned segments borrow from the scratch and from the
//! zone, and are sent (gathered) before the next query reuses either.

use std::sync::Arc;

use crate::zone::Zone;

mod context;

pub use context::{classify, Context, Response, HEAD_SCRATCH_SIZE, OPT_SCRATCH_SIZE};

////////////////////////////////////////////////////////////////////////
// SERVER                                                             //
////////////////////////////////////////////////////////////////////////

/// An authoritative responder for one zone.
///
/// The zone is immutable once loaded, so a `Server` is freely shared
/// across worker threads; queries carry no cross-query state.
pub struct Server {
    zone: Arc<Zone>,
}

impl Server {
    /// Creates a `Server` that answers from `zone`.
    pub fn new(zone: Arc<Zone>) -> Self {
        Self { zone }
    }

    /// Returns the served zone.
    pub fn zone(&self) -> &Zone {
        &self.zone
    }

    /// Handles one received packet. Returns `None` when the packet does
    /// not merit a response.
    pub fn handle_query<'a>(
        &'a self,
        packet: &'a [u8],
        scratch: &'a mut Scratch,
    ) -> Option<Response<'a>> {
        Context::new(&self.zone, packet, &mut scratch.head, &mut scratch.opt).execute()
    }
}

/// The scratch storage backing one in-flight query's response. Worker
/// threads keep one `Scratch` and reuse it for every query they handle.
pub struct Scratch {
    head: [u8; HEAD_SCRATCH_SIZE],
    opt: [u8; OPT_SCRATCH_SIZE],
}

impl Scratch {
    pub fn new() -> Self {
        Self {
            head: [0; HEAD_SCRATCH_SIZE],
            opt: [0; OPT_SCRATCH_SIZE],
        }
    }
}

impl Default for Scratch {
    fn default() -> Self {
        Self::new()
    }
}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;
    use crate::zone_file;

    const TEST_ZONE: &str = concat!(
        ".\t86400\tIN\tSOA\ta.ns.test. admin.test. 1 1800 900 604800 86400\n",
        ".\t518400\tIN\tNS\ta.ns.test.\n",
        "com.\t172800\tIN\tNS\ta.gtld.test.\n",
        "a.gtld.test.\t172800\tIN\tA\t192.5.6.30\n",
    );

    #[test]
    fn scratch_is_reused_across_queries() {
        let zone = Zone::from_records(zone_file::parse(TEST_ZONE).unwrap()).unwrap();
        let server = Server::new(Arc::new(zone));
        let mut scratch = Scratch::new();

        let soa_query =
            b"\x00\x01\x00\x00\x00\x01\x00\x00\x00\x00\x00\x00\x00\x00\x06\x00\x01";
        let first: Vec<u8> = {
            let response = server.handle_query(soa_query, &mut scratch).unwrap();
            response
                .iter()
                .flat_map(|segment| segment.octets().iter().copied())
                .collect()
        };
        assert_eq!(first[0..2], [0x00, 0x01]);
        assert_eq!(first[6..8], [0x00, 0x01]); // ANCOUNT 1

        // A second query through the same scratch produces a fresh,
        // unrelated response.
        let mut com_query = b"\x00\x02\x00\x00\x00\x01\x00\x00\x00\x00\x00\x00".to_vec();
        com_query.extend_from_slice(b"\x03com\x00\x00\x02\x00\x01");
        let second: Vec<u8> = {
            let response = server.handle_query(&com_query, &mut scratch).unwrap();
            response
                .iter()
                .flat_map(|segment| segment.octets().iter().copied())
                .collect()
        };
        assert_eq!(second[0..2], [0x00, 0x02]);
        assert_eq!(second[6..8], [0x00, 0x00]); // referral: ANCOUNT 0
        assert_eq!(second[8..10], [0x00, 0x01]); // NSCOUNT 1

        // Packets that fail the legal-header gate get no response.
        assert!(server.handle_query(&soa_query[..16], &mut scratch).is_none());
    }
}
