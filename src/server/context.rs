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

//! Execution of one query, from inbound packet to response segments.
//!
//! A [`Context`] lives for exactly one query. It parses the packet
//! stage by stage, accumulating the response code as it goes: once a
//! stage records a failure, later stages are skipped and response
//! assembly runs with whatever was gathered. The assembled response is
//! an ordered list of at most three [`Segment`]s (header plus echoed
//! question, answer bundle, OPT record) whose concatenation is the wire
//! message; the network layer can hand the list to a gather write
//! without ever copying the bundle.

use arrayvec::ArrayVec;

use crate::buffer::{ReadBuffer, Segment, WriteBuffer};
use crate::class::Class;
use crate::message::constants::{
    FLAGS_AA, FLAGS_ECHO_MASK, FLAGS_QR, HEADER_SIZE, MAX_NAME_SIZE, PADDED_FRAME_SIZE,
};
use crate::message::edns::{self, OPT_RECORD_SIZE};
use crate::message::name::{self, LookupKey};
use crate::message::{legal_header, valid_header, ExtendedRcode, Header, Opcode, Qclass, Qtype};
use crate::rr::Type;
use crate::zone::{Answer, Category, Zone};

////////////////////////////////////////////////////////////////////////
// SCRATCH SIZING                                                     //
////////////////////////////////////////////////////////////////////////

/// The size of the scratch region backing the header and echoed
/// question: a header plus the longest possible question section.
pub const HEAD_SCRATCH_SIZE: usize = HEADER_SIZE + MAX_NAME_SIZE + 1 + 4;

/// The size of the scratch region backing the synthesized OPT record.
pub const OPT_SCRATCH_SIZE: usize = OPT_RECORD_SIZE;

/// An assembled response: the ordered segments whose concatenation is
/// the wire message.
pub type Response<'a> = ArrayVec<Segment<'a>, 3>;

////////////////////////////////////////////////////////////////////////
// QUERY CONTEXT                                                      //
////////////////////////////////////////////////////////////////////////

/// The state of one query's execution.
///
/// The two scratch regions are caller-provided so that a worker thread
/// can reuse the same backing storage for every query it handles; the
/// regions are overwritten from the start on each query. The only heap
/// allocation on the query path is the relocated copy of an answer
/// bundle that contains compression pointers.
pub struct Context<'a> {
    zone: &'a Zone,
    packet: &'a [u8],
    input: ReadBuffer<'a>,
    head: WriteBuffer<'a>,
    opt: WriteBuffer<'a>,

    qname: LookupKey,
    qlabels: u8,
    qtype: Qtype,
    qdstart: usize,
    qdsize: usize,
    has_edns: bool,
    do_bit: bool,
    bufsize: u16,
    rcode: ExtendedRcode,
    matched: bool,
    answer: Option<&'a Answer>,
}

impl<'a> Context<'a> {
    /// Creates a `Context` for one query. `head_scratch` must hold at
    /// least [`HEAD_SCRATCH_SIZE`] octets and `opt_scratch` at least
    /// [`OPT_SCRATCH_SIZE`], so that response assembly cannot run out
    /// of room.
    pub fn new(
        zone: &'a Zone,
        packet: &'a [u8],
        head_scratch: &'a mut [u8],
        opt_scratch: &'a mut [u8],
    ) -> Self {
        Self {
            zone,
            packet,
            input: ReadBuffer::new(packet),
            head: WriteBuffer::new(head_scratch),
            opt: WriteBuffer::new(opt_scratch),
            qname: LookupKey::new(),
            qlabels: 0,
            qtype: Qtype::from(0),
            qdstart: 0,
            qdsize: 0,
            has_edns: false,
            do_bit: false,
            bufsize: 0,
            rcode: ExtendedRcode::NOERROR,
            matched: false,
            answer: None,
        }
    }

    /// Executes the query. `None` means the packet does not merit a
    /// response; otherwise the returned segments are the response.
    pub fn execute(mut self) -> Option<Response<'a>> {
        if !legal_header(&self.input) {
            return None;
        }

        // The gate guarantees a full header is present.
        let request = Header::read(&mut self.input).ok()?;

        if !valid_header(&request) {
            self.rcode = ExtendedRcode::FORMERR;
        } else {
            // The question is parsed even for unsupported opcodes, so
            // the NOTIMPL response can echo it.
            self.parse_question();
            if request.opcode() != Opcode::QUERY {
                self.rcode = ExtendedRcode::NOTIMPL;
            } else if self.rcode.is_noerror() {
                self.parse_edns();
                if self.rcode.is_noerror() {
                    self.check_trailing_garbage();
                }
                if self.rcode.is_noerror() {
                    self.lookup();
                }
            }
        }

        self.assemble(&request)
    }

    /// Parses the question section: QNAME, QTYPE, and QCLASS.
    fn parse_question(&mut self) {
        self.qdstart = self.input.position();

        let parsed = match name::read_qname(&mut self.input) {
            Ok(parsed) => parsed,
            Err(_) => {
                self.rcode = ExtendedRcode::FORMERR;
                return;
            }
        };

        let qtype = self.input.read_u16();
        let qclass = self.input.read_u16();
        let (qtype, qclass) = match (qtype, qclass) {
            (Ok(qtype), Ok(qclass)) => (Qtype::from(qtype), Qclass::from(qclass)),
            _ => {
                self.rcode = ExtendedRcode::FORMERR;
                return;
            }
        };

        self.qname = parsed.key;
        self.qlabels = parsed.labels;
        self.qtype = qtype;

        // From here on, responses echo the question section.
        self.qdsize = self.input.position() - self.qdstart;

        if qtype.in_meta_range() {
            self.rcode = ExtendedRcode::NOTIMPL;
            return;
        }

        if qclass != Qclass::from(Class::IN) {
            self.rcode = ExtendedRcode::NOTIMPL;
        }
    }

    /// Parses the OPT pseudo-RR, if the query has one.
    fn parse_edns(&mut self) {
        match edns::read_opt(&mut self.input) {
            Ok(None) => (),
            Ok(Some(opt)) => {
                self.has_edns = true;
                self.do_bit = opt.do_bit;
                self.bufsize = opt.udp_size;
                if opt.version > 0 {
                    self.rcode = ExtendedRcode::BADVERS;
                }
            }
            Err(_) => self.rcode = ExtendedRcode::FORMERR,
        }
    }

    /// Rejects octets left over after the question and OPT record.
    /// Packets no larger than [`PADDED_FRAME_SIZE`] are exempt: packet
    /// sockets pad short frames up to the Ethernet minimum, and that
    /// padding is not the sender's fault.
    fn check_trailing_garbage(&mut self) {
        if self.input.available() > 0 && self.input.size() > PADDED_FRAME_SIZE {
            self.rcode = ExtendedRcode::FORMERR;
        }
    }

    /// Looks up the query in the zone and selects its answer bundle.
    fn lookup(&mut self) {
        let (set, matched) = self.zone.lookup(&self.qname);
        self.matched = matched;
        self.rcode = if self.matched {
            ExtendedRcode::NOERROR
        } else {
            ExtendedRcode::NXDOMAIN
        };
        let category = classify(self.matched, self.qlabels, self.qtype);
        self.answer = Some(set.answer(category, self.do_bit));
    }

    /// Assembles the response segments: header and echoed question,
    /// then the answer bundle, then the OPT record.
    fn assemble(mut self, request: &Header) -> Option<Response<'a>> {
        let mut flags = request.flags & FLAGS_ECHO_MASK;
        flags |= FLAGS_QR;
        flags |= self.rcode.header_bits();
        if self.answer.map_or(false, Answer::authoritative) {
            flags |= FLAGS_AA;
        }

        let (ancount, nscount, arcount) = match self.answer {
            Some(answer) => (answer.ancount(), answer.nscount(), answer.arcount()),
            None => (0, 0, 0),
        };
        let header = Header {
            id: request.id,
            flags,
            qdcount: (self.qdsize > 0) as u16,
            ancount,
            nscount,
            arcount: arcount + self.has_edns as u16,
        };

        // The scratch regions are sized so these writes cannot fail on
        // any input that passed the legal-header gate.
        header.write(&mut self.head).ok()?;
        let question = &self.packet[self.qdstart..self.qdstart + self.qdsize];
        self.head.push_slice(question).ok()?;

        let mut response = Response::new();
        response.push(self.head.into_segment());

        if let Some(answer) = self.answer {
            if !answer.is_empty() {
                response.push(answer.segment((HEADER_SIZE + self.qdsize) as u16));
            }
        }

        if self.has_edns {
            edns::write_opt(&mut self.opt, self.rcode, self.do_bit).ok()?;
            response.push(self.opt.into_segment());
        }

        Some(response)
    }
}

impl std::fmt::Debug for Context<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("qname", &self.qname)
            .field("qlabels", &self.qlabels)
            .field("qtype", &self.qtype)
            .field("qdstart", &self.qdstart)
            .field("qdsize", &self.qdsize)
            .field("has_edns", &self.has_edns)
            .field("do_bit", &self.do_bit)
            .field("bufsize", &self.bufsize)
            .field("rcode", &self.rcode)
            .field("matched", &self.matched)
            .finish()
    }
}

////////////////////////////////////////////////////////////////////////
// CLASSIFIER                                                         //
////////////////////////////////////////////////////////////////////////

/// Maps a query onto its answer [`Category`].
///
/// `matched` is the zone lookup's verdict; `qlabels` is the QNAME's
/// label count. Everything at or below a TLD is a referral, except that
/// DS sits in the parent zone and is answered authoritatively when
/// asked of the TLD itself. At the apex, the handful of types with data
/// get their bundles and the rest are NODATA.
pub fn classify(matched: bool, qlabels: u8, qtype: Qtype) -> Category {
    if !matched {
        Category::Nxdomain
    } else if qlabels > 1 {
        Category::TldReferral
    } else if qlabels == 1 {
        if Type::from(qtype) == Type::DS {
            Category::TldDs
        } else {
            Category::TldReferral
        }
    } else if qtype == Qtype::ANY {
        Category::RootAny
    } else {
        match Type::from(qtype) {
            Type::SOA => Category::RootSoa,
            Type::NS => Category::RootNs,
            Type::NSEC => Category::RootNsec,
            Type::DNSKEY => Category::RootDnskey,
            _ => Category::RootNodata,
        }
    }
}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;
    use crate::zone_file;

    /// A miniature root zone: apex SOA/NS/DNSKEY, a signed delegation
    /// (com) with glue, and an unsigned delegation (test).
    const TEST_ZONE: &str = concat!(
        ".\t86400\tIN\tSOA\ta.ns.test. admin.test. 1 1800 900 604800 86400\n",
        ".\t518400\tIN\tNS\ta.ns.test.\n",
        ".\t172800\tIN\tDNSKEY\t257 3 8 AwEAAa96\n",
        "a.ns.test.\t518400\tIN\tA\t198.41.0.4\n",
        "com.\t172800\tIN\tNS\ta.gtld.test.\n",
        "com.\t172800\tIN\tNS\tb.gtld.test.\n",
        "com.\t86400\tIN\tDS\t30909 8 2 AABB\n",
        "a.gtld.test.\t172800\tIN\tA\t192.5.6.30\n",
        "b.gtld.test.\t172800\tIN\tA\t192.33.14.30\n",
        "test.\t172800\tIN\tNS\tns.nic.test.\n",
    );

    fn test_zone() -> Zone {
        Zone::from_records(zone_file::parse(TEST_ZONE).unwrap()).unwrap()
    }

    /// Executes `packet` against the test zone and returns the
    /// concatenated response, if any.
    fn respond(zone: &Zone, packet: &[u8]) -> Option<Vec<u8>> {
        let mut head_scratch = [0; HEAD_SCRATCH_SIZE];
        let mut opt_scratch = [0; OPT_SCRATCH_SIZE];
        let context = Context::new(zone, packet, &mut head_scratch, &mut opt_scratch);
        context.execute().map(|response| {
            response
                .iter()
                .flat_map(|segment| segment.octets().iter().copied())
                .collect()
        })
    }

    fn header_of(response: &[u8]) -> Header {
        Header::read(&mut ReadBuffer::new(response)).unwrap()
    }

    /// Builds a query packet: header, then a question assembled from
    /// the wire-format QNAME, QTYPE, and QCLASS, then a trailer (OPT
    /// record or garbage).
    fn query(id: u16, flags: u16, qname: &[u8], qtype: u16, qclass: u16, trailer: &[u8]) -> Vec<u8> {
        let mut packet = Vec::new();
        packet.extend_from_slice(&id.to_be_bytes());
        packet.extend_from_slice(&flags.to_be_bytes());
        packet.extend_from_slice(&1u16.to_be_bytes());
        packet.extend_from_slice(&[0; 4]);
        packet.extend_from_slice(&(!trailer.is_empty() as u16).to_be_bytes());
        packet.extend_from_slice(qname);
        packet.extend_from_slice(&qtype.to_be_bytes());
        packet.extend_from_slice(&qclass.to_be_bytes());
        packet.extend_from_slice(trailer);
        packet
    }

    const OPT_PLAIN: &[u8] = b"\x00\x00\x29\x02\x00\x00\x00\x00\x00\x00\x00";
    const OPT_DO: &[u8] = b"\x00\x00\x29\x10\x00\x00\x00\x80\x00\x00\x00";
    const OPT_VERSION_1: &[u8] = b"\x00\x00\x29\x02\x00\x00\x01\x00\x00\x00\x00";

    ////////////////////////////////////////////////////////////////////
    // LITERAL SCENARIOS                                              //
    ////////////////////////////////////////////////////////////////////

    #[test]
    fn root_soa_query_gets_an_authoritative_soa_answer() {
        let zone = test_zone();
        let packet =
            b"\x00\x01\x00\x00\x00\x01\x00\x00\x00\x00\x00\x00\x00\x00\x06\x00\x01";
        let response = respond(&zone, packet).unwrap();
        let header = header_of(&response);

        assert_eq!(header.id, 1);
        assert_eq!(header.flags & RCODE_TEST_MASK, 0); // NOERROR
        assert_ne!(header.flags & FLAGS_AA, 0);
        assert_eq!(header.qdcount, 1);
        assert_eq!(header.ancount, 1);
        assert_eq!(header.arcount, 0);
        // The question is echoed verbatim.
        assert_eq!(&response[12..17], &packet[12..17]);
        // The SOA bundle follows, starting with a pointer-free root
        // owner.
        assert_eq!(response[17], 0);
    }

    #[test]
    fn tld_ns_query_gets_a_referral() {
        let zone = test_zone();
        let packet = query(2, 0, b"\x03com\x00", 2, 1, b"");
        let response = respond(&zone, &packet).unwrap();
        let header = header_of(&response);

        assert_eq!(header.id, 2);
        assert_eq!(header.flags & RCODE_TEST_MASK, 0);
        assert_eq!(header.flags & FLAGS_AA, 0); // referrals are not authoritative
        assert_eq!(header.ancount, 0);
        assert_eq!(header.nscount, 2);
        assert_eq!(header.arcount, 2);
    }

    #[test]
    fn tld_ds_query_gets_an_authoritative_answer() {
        let zone = test_zone();
        let packet = query(3, 0, b"\x03com\x00", 43, 1, b"");
        let response = respond(&zone, &packet).unwrap();
        let header = header_of(&response);

        assert_eq!(header.flags & RCODE_TEST_MASK, 0);
        assert_ne!(header.flags & FLAGS_AA, 0);
        assert_eq!(header.ancount, 1);
    }

    #[test]
    fn unregistered_tld_gets_nxdomain() {
        let zone = test_zone();
        let packet = query(4, 0, b"\x03xxx\x00", 1, 1, b"");
        let response = respond(&zone, &packet).unwrap();
        let header = header_of(&response);

        assert_eq!(header.flags & RCODE_TEST_MASK, 3); // NXDOMAIN
        assert_eq!(header.ancount, 0);
        assert_eq!(header.nscount, 1); // the apex SOA
    }

    #[test]
    fn unsupported_opcode_gets_notimpl_with_the_question_echoed() {
        let zone = test_zone();
        let packet =
            b"\x00\x05\x08\x00\x00\x01\x00\x00\x00\x00\x00\x00\x00\x00\x06\x00\x01";
        let response = respond(&zone, packet).unwrap();
        let header = header_of(&response);

        assert_eq!(header.flags & RCODE_TEST_MASK, 4); // NOTIMPL
        assert_eq!(header.qdcount, 1);
        assert_eq!(&response[12..17], &packet[12..17]);
        // The opcode comes back unchanged.
        assert_eq!(header.flags & 0x7800, 0x0800);
    }

    #[test]
    fn edns_version_above_zero_gets_badvers() {
        let zone = test_zone();
        let packet = query(6, 0, b"\x00", 6, 1, OPT_VERSION_1);
        let response = respond(&zone, &packet).unwrap();
        let header = header_of(&response);

        // BADVERS is 16: the header nibble is 0 and the OPT record
        // carries extended-RCODE octet 1.
        assert_eq!(header.flags & RCODE_TEST_MASK, 0);
        assert_eq!(header.ancount, 0);
        assert_eq!(header.arcount, 1);
        let opt = &response[response.len() - 11..];
        assert_eq!(opt[5], 1); // extended RCODE
        assert_eq!(opt[6], 0); // version
    }

    #[test]
    fn truncated_headers_are_dropped_silently() {
        let zone = test_zone();
        let packet = b"\x00\x07\x00\x00\x00\x01\x00\x00\x00\x00\x00\x00\x00\x00\x06\x00";
        assert_eq!(packet.len(), 16);
        assert_eq!(respond(&zone, packet), None);
    }

    ////////////////////////////////////////////////////////////////////
    // HEADER AND DROP RULES                                          //
    ////////////////////////////////////////////////////////////////////

    const RCODE_TEST_MASK: u16 = 0x000f;

    #[test]
    fn inbound_responses_are_dropped_silently() {
        let zone = test_zone();
        let packet = query(8, 0x8000, b"\x00", 6, 1, b"");
        assert_eq!(respond(&zone, &packet), None);
    }

    #[test]
    fn bad_counts_get_formerr_with_an_empty_question() {
        let zone = test_zone();
        let mangles: [fn(&mut Vec<u8>); 5] = [
            |header| header[5] = 2,  // QDCOUNT 2
            |header| header[7] = 1,  // ANCOUNT 1
            |header| header[9] = 1,  // NSCOUNT 1
            |header| header[11] = 2, // ARCOUNT 2
            |header| header[3] = 3,  // RCODE set
        ];
        for mangle in mangles {
            let mut packet = query(9, 0, b"\x00", 6, 1, b"");
            mangle(&mut packet);
            let response = respond(&zone, &packet).unwrap();
            let header = header_of(&response);
            assert_eq!(header.flags & RCODE_TEST_MASK, 1); // FORMERR
            assert_eq!(header.qdcount, 0);
            assert_eq!(response.len(), 12);
        }
    }

    #[test]
    fn malformed_names_get_formerr() {
        let zone = test_zone();
        for qname in [
            &b"\xc0\x0c\x00\x00"[..], // compression pointer
            &b"\x3fwww"[..],          // runs off the end
        ] {
            let packet = query(10, 0, qname, 1, 1, b"");
            let response = respond(&zone, &packet).unwrap();
            let header = header_of(&response);
            assert_eq!(header.flags & RCODE_TEST_MASK, 1);
            assert_eq!(header.qdcount, 0);
        }
    }

    #[test]
    fn meta_qtypes_and_non_in_qclasses_get_notimpl() {
        let zone = test_zone();
        for (qtype, qclass) in [(128, 1), (254, 1), (6, 3), (6, 255)] {
            let packet = query(11, 0, b"\x00", qtype, qclass, b"");
            let response = respond(&zone, &packet).unwrap();
            let header = header_of(&response);
            assert_eq!(header.flags & RCODE_TEST_MASK, 4);
            // These failures still echo the question.
            assert_eq!(header.qdcount, 1);
        }

        // ANY (255) and types above it are not meta-rejected.
        for qtype in [255, 257] {
            let packet = query(12, 0, b"\x00", qtype, 1, b"");
            let response = respond(&zone, &packet).unwrap();
            let header = header_of(&response);
            assert_eq!(header.flags & RCODE_TEST_MASK, 0);
        }
    }

    ////////////////////////////////////////////////////////////////////
    // RESPONSE INVARIANTS                                            //
    ////////////////////////////////////////////////////////////////////

    #[test]
    fn responses_echo_id_flags_and_question() {
        let zone = test_zone();
        // RD and CD set, opcode QUERY.
        let packet = query(0xbeef, 0x0110, b"\x03CoM\x00", 2, 1, b"");
        let response = respond(&zone, &packet).unwrap();
        let header = header_of(&response);

        assert!(response.len() >= 12);
        assert_eq!(header.id, 0xbeef);
        assert_ne!(header.flags & FLAGS_QR, 0);
        assert_eq!(header.flags & 0x0110, 0x0110); // RD and CD
        assert_eq!(header.flags & 0x7800, 0); // opcode QUERY
        assert_eq!(header.qdcount, 1);
        // The question echo preserves the original case.
        assert_eq!(&response[12..21], &packet[12..21]);
    }

    #[test]
    fn rd_and_cd_clear_stay_clear() {
        let zone = test_zone();
        let packet = query(13, 0, b"\x00", 6, 1, b"");
        let response = respond(&zone, &packet).unwrap();
        let header = header_of(&response);
        assert_eq!(header.flags & 0x0110, 0);
    }

    ////////////////////////////////////////////////////////////////////
    // EDNS BEHAVIOR                                                  //
    ////////////////////////////////////////////////////////////////////

    #[test]
    fn opt_round_trips_with_the_do_bit() {
        let zone = test_zone();
        for (trailer, do_bit) in [(OPT_PLAIN, false), (OPT_DO, true)] {
            let packet = query(14, 0, b"\x03com\x00", 2, 1, trailer);
            let response = respond(&zone, &packet).unwrap();
            let header = header_of(&response);

            // arcount is the bundle's count plus one for the OPT.
            let glue = 2;
            let ds_rrset = 1;
            assert_eq!(header.arcount, glue + 1);
            assert_eq!(
                header.nscount,
                if do_bit { 2 + ds_rrset } else { 2 },
            );

            let opt = &response[response.len() - 11..];
            assert_eq!(opt[0], 0);
            assert_eq!(&opt[1..3], b"\x00\x29");
            assert_eq!(&opt[3..5], b"\x05\xc8"); // UDP size 1480
            assert_eq!(opt[5], 0); // extended RCODE
            assert_eq!(opt[6], 0); // version
            assert_eq!(opt[7] & 0x80 != 0, do_bit);
        }
    }

    #[test]
    fn queries_without_opt_get_no_opt() {
        let zone = test_zone();
        let packet = query(15, 0, b"\x03com\x00", 2, 1, b"");
        let response = respond(&zone, &packet).unwrap();
        let header = header_of(&response);
        assert_eq!(header.arcount, 2); // glue only

        // The same query with an OPT record gets exactly 11 more
        // octets: the synthesized OPT.
        let with_opt = respond(&zone, &query(15, 0, b"\x03com\x00", 2, 1, OPT_PLAIN)).unwrap();
        assert_eq!(with_opt.len(), response.len() + 11);
    }

    #[test]
    fn malformed_opt_records_get_formerr() {
        let zone = test_zone();
        // 1..=10 trailing octets cannot be an OPT record.
        let packet = query(16, 0, b"\x00", 6, 1, b"\x00\x00\x29");
        let response = respond(&zone, &packet).unwrap();
        assert_eq!(header_of(&response).flags & RCODE_TEST_MASK, 1);

        // A non-OPT additional record is FORMERR too.
        let not_opt = b"\x00\x00\x02\x02\x00\x00\x00\x00\x00\x00\x00";
        let packet = query(17, 0, b"\x00", 6, 1, not_opt);
        let response = respond(&zone, &packet).unwrap();
        assert_eq!(header_of(&response).flags & RCODE_TEST_MASK, 1);
    }

    ////////////////////////////////////////////////////////////////////
    // TRAILING GARBAGE                                               //
    ////////////////////////////////////////////////////////////////////

    #[test]
    fn padding_after_the_opt_is_tolerated_on_tiny_packets() {
        let zone = test_zone();
        // 17 octets of query plus an 11-octet OPT record, padded with
        // zeros to the 46-octet Ethernet minimum.
        let mut packet = query(18, 0, b"\x00", 6, 1, OPT_PLAIN);
        assert_eq!(packet.len(), 28);
        packet.resize(46, 0);

        let response = respond(&zone, &packet).unwrap();
        let header = header_of(&response);
        assert_eq!(header.flags & RCODE_TEST_MASK, 0); // NOERROR
        assert_eq!(header.ancount, 1);
        assert_eq!(header.arcount, 1); // the echoed OPT
    }

    #[test]
    fn trailing_octets_on_larger_packets_are_formerr() {
        let zone = test_zone();
        // Header 12 + question 18 + OPT 11 = 41 octets; padding to 47
        // puts the total over the exemption.
        let mut packet = query(19, 0, b"\x0caaaaaaaaaaaa\x00", 1, 1, OPT_PLAIN);
        assert_eq!(packet.len(), 41);
        packet.resize(47, 0);

        let response = respond(&zone, &packet).unwrap();
        assert_eq!(header_of(&response).flags & RCODE_TEST_MASK, 1);
    }

    #[test]
    fn leftover_octets_that_are_not_an_opt_record_are_formerr() {
        let zone = test_zone();
        // Without an OPT record, padding is indistinguishable from a
        // malformed OPT record and is rejected even on tiny packets
        // (zeros decode as RR type 0).
        let mut packet = query(22, 0, b"\x00", 6, 1, b"");
        packet.resize(46, 0);
        let response = respond(&zone, &packet).unwrap();
        assert_eq!(header_of(&response).flags & RCODE_TEST_MASK, 1);
    }

    ////////////////////////////////////////////////////////////////////
    // CLASSIFIER TABLE                                               //
    ////////////////////////////////////////////////////////////////////

    #[test]
    fn classifier_covers_the_full_cross_product() {
        use Category::*;

        let qtypes: [(u16, &str); 8] = [
            (6, "SOA"),
            (2, "NS"),
            (47, "NSEC"),
            (48, "DNSKEY"),
            (43, "DS"),
            (255, "ANY"),
            (1, "A"),
            (16, "TXT"),
        ];

        for (raw, mnemonic) in qtypes {
            let qtype = Qtype::from(raw);

            // A failed lookup is NXDOMAIN no matter what.
            for qlabels in [0, 1, 2] {
                assert_eq!(classify(false, qlabels, qtype), Nxdomain, "{}", mnemonic);
            }

            // Two or more labels: always a referral.
            assert_eq!(classify(true, 2, qtype), TldReferral, "{}", mnemonic);

            // One label: DS is special.
            let expected = if raw == 43 { TldDs } else { TldReferral };
            assert_eq!(classify(true, 1, qtype), expected, "{}", mnemonic);

            // The apex.
            let expected = match raw {
                6 => RootSoa,
                2 => RootNs,
                47 => RootNsec,
                48 => RootDnskey,
                255 => RootAny,
                _ => RootNodata,
            };
            assert_eq!(classify(true, 0, qtype), expected, "{}", mnemonic);
        }
    }

    ////////////////////////////////////////////////////////////////////
    // BUNDLE EMISSION                                                //
    ////////////////////////////////////////////////////////////////////

    #[test]
    fn referral_bundles_are_relocated_past_the_question() {
        let zone = test_zone();
        let packet = query(20, 0, b"\x03com\x00", 2, 1, b"");
        let response = respond(&zone, &packet).unwrap();

        // The first authority RR owns "com." in full at offset 21 (12 +
        // question 9); the second compresses to a pointer to it.
        assert_eq!(&response[21..26], b"\x03com\x00");
        let pointer_at = 21 + 5 + 10 + 13; // owner, fixed fields, RDATA
        assert_eq!(&response[pointer_at..pointer_at + 2], b"\xc0\x15");
    }

    #[test]
    fn deep_names_classify_by_their_final_label() {
        let zone = test_zone();
        let packet = query(21, 0, b"\x03www\x07example\x03com\x00", 1, 1, b"");
        let response = respond(&zone, &packet).unwrap();
        let header = header_of(&response);
        // A referral for com, from a three-label QNAME.
        assert_eq!(header.flags & RCODE_TEST_MASK, 0);
        assert_eq!(header.nscount, 2);
    }
}

