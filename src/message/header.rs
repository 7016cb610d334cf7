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

//! Reading, validation, and writing of the 12-octet DNS header.

use super::constants::*;
use super::Opcode;
use crate::buffer::{ReadBuffer, Result, WriteBuffer};

////////////////////////////////////////////////////////////////////////
// HEADER                                                             //
////////////////////////////////////////////////////////////////////////

/// The fixed 12-octet DNS message header of [RFC 1035 § 4.1.1], with
/// multi-octet fields already converted to host order.
///
/// [RFC 1035 § 4.1.1]: https://datatracker.ietf.org/doc/html/rfc1035#section-4.1.1
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Header {
    pub id: u16,
    pub flags: u16,
    pub qdcount: u16,
    pub ancount: u16,
    pub nscount: u16,
    pub arcount: u16,
}

impl Header {
    /// Reads a header from `input`.
    pub fn read(input: &mut ReadBuffer<'_>) -> Result<Self> {
        Ok(Self {
            id: input.read_u16()?,
            flags: input.read_u16()?,
            qdcount: input.read_u16()?,
            ancount: input.read_u16()?,
            nscount: input.read_u16()?,
            arcount: input.read_u16()?,
        })
    }

    /// Writes the header to `output` in wire format.
    pub fn write(&self, output: &mut WriteBuffer<'_>) -> Result<()> {
        output.push_u16(self.id)?;
        output.push_u16(self.flags)?;
        output.push_u16(self.qdcount)?;
        output.push_u16(self.ancount)?;
        output.push_u16(self.nscount)?;
        output.push_u16(self.arcount)
    }

    /// Returns the opcode encoded in the flags field.
    pub fn opcode(&self) -> Opcode {
        Opcode::from_flags(self.flags)
    }
}

////////////////////////////////////////////////////////////////////////
// HEADER GATES                                                       //
////////////////////////////////////////////////////////////////////////

/// The gate applied to raw packets before any parsing: packets that
/// fail it do not merit any response at all and are dropped silently.
///
/// A packet passes when it is at least [`MIN_QUERY_SIZE`] octets long
/// and its QR bit is clear (responses are never answered, which also
/// breaks reflection loops between two responders).
pub fn legal_header(input: &ReadBuffer<'_>) -> bool {
    input.available() >= MIN_QUERY_SIZE && input[QR_BYTE] & QR_BYTE_MASK == 0
}

/// The check applied to a parsed header. Failing packets are still
/// answered, with FORMERR.
///
/// A query must arrive with a clear RCODE, exactly one question, no
/// answer or authority records, and at most one additional record (the
/// optional OPT pseudo-RR).
pub fn valid_header(header: &Header) -> bool {
    header.flags & RCODE_MASK == 0
        && header.qdcount == 1
        && header.ancount == 0
        && header.nscount == 0
        && header.arcount <= 1
}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    /// A minimal legal query: id 1, no flags, one question for ". SOA
    /// IN".
    const ROOT_SOA_QUERY: &[u8] =
        b"\x00\x01\x00\x00\x00\x01\x00\x00\x00\x00\x00\x00\x00\x00\x06\x00\x01";

    #[test]
    fn header_round_trips_through_wire_format() {
        let mut input = ReadBuffer::new(ROOT_SOA_QUERY);
        let header = Header::read(&mut input).unwrap();
        assert_eq!(header.id, 1);
        assert_eq!(header.flags, 0);
        assert_eq!(header.qdcount, 1);
        assert_eq!(input.position(), HEADER_SIZE);

        let mut backing = [0; HEADER_SIZE];
        let mut output = WriteBuffer::new(&mut backing);
        header.write(&mut output).unwrap();
        assert_eq!(output.into_segment().octets(), &ROOT_SOA_QUERY[..12]);
    }

    #[test]
    fn legal_header_requires_seventeen_octets() {
        for size in 0..MIN_QUERY_SIZE {
            assert!(!legal_header(&ReadBuffer::new(&ROOT_SOA_QUERY[..size])));
        }
        assert!(legal_header(&ReadBuffer::new(ROOT_SOA_QUERY)));
    }

    #[test]
    fn legal_header_rejects_responses() {
        let mut response = ROOT_SOA_QUERY.to_vec();
        response[2] |= 0x80;
        assert!(!legal_header(&ReadBuffer::new(&response)));
    }

    #[test]
    fn valid_header_accepts_a_plain_query() {
        let header = Header {
            qdcount: 1,
            ..Default::default()
        };
        assert!(valid_header(&header));
        assert!(valid_header(&Header {
            arcount: 1,
            ..header
        }));
    }

    #[test]
    fn valid_header_rejects_bad_counts_and_rcodes() {
        let good = Header {
            qdcount: 1,
            ..Default::default()
        };
        assert!(!valid_header(&Header { flags: 0x0001, ..good }));
        assert!(!valid_header(&Header { qdcount: 0, ..good }));
        assert!(!valid_header(&Header { qdcount: 2, ..good }));
        assert!(!valid_header(&Header { ancount: 1, ..good }));
        assert!(!valid_header(&Header { nscount: 1, ..good }));
        assert!(!valid_header(&Header { arcount: 2, ..good }));
    }
}
