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

//! Serialization of answer bundles at zone load.

use std::collections::HashMap;

use super::Answer;
use crate::name::Name;
use crate::rr::Type;
use crate::zone_file::{Rdata, Record};

////////////////////////////////////////////////////////////////////////
// ANSWER BUILDER                                                     //
////////////////////////////////////////////////////////////////////////

/// Builds one [`Answer`] bundle, RR by RR.
///
/// Records are serialized in wire format with compression internal to
/// the bundle: when a whole name has already been written, later
/// occurrences become pointers to its first occurrence. This is what
/// makes referral bundles compact (a TLD's NS RRset repeats the owner,
/// and its glue repeats the name-server names). Pointer targets are
/// relative to the bundle's own start and the position of every pointer
/// is recorded, so [`Answer::segment`] can relocate them once the
/// bundle's final position in a response is known.
pub(super) struct AnswerBuilder {
    wire: Vec<u8>,
    pointers: Vec<u16>,
    name_offsets: HashMap<Box<[u8]>, u16>,
    ancount: u16,
    nscount: u16,
    arcount: u16,
}

/// The section of a response an RR is destined for. Bundles do not
/// delimit sections on the wire; only the counts differ.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(super) enum Section {
    Answer,
    Authority,
    Additional,
}

/// The largest bundle offset a compression pointer may target. A
/// pointer holds 14 bits and is relocated by the header plus the
/// question section (at most 12 + 260 octets) before it goes out, so
/// targets beyond this would overflow on relocation.
const MAX_POINTER_TARGET: u16 = 0x3fff - 272;

impl AnswerBuilder {
    pub fn new() -> Self {
        Self {
            wire: Vec::new(),
            pointers: Vec::new(),
            name_offsets: HashMap::new(),
            ancount: 0,
            nscount: 0,
            arcount: 0,
        }
    }

    /// Returns whether any RR has been added yet.
    pub fn is_empty(&self) -> bool {
        self.wire.is_empty()
    }

    /// Serializes `record` into the bundle, counting it in `section`.
    pub fn add_rr(&mut self, section: Section, record: &Record) {
        self.write_name(&record.owner);
        self.wire
            .extend_from_slice(&u16::from(record.rr_type).to_be_bytes());
        self.wire
            .extend_from_slice(&u16::from(record.class).to_be_bytes());
        self.wire
            .extend_from_slice(&u32::from(record.ttl).to_be_bytes());

        // RDLENGTH is backpatched: a compressed name in the RDATA makes
        // it smaller than the stored form.
        let rdlength_at = self.wire.len();
        self.wire.extend_from_slice(&[0, 0]);
        match &record.rdata {
            Rdata::Name(name) => self.write_name(name),
            Rdata::Opaque(octets) => self.wire.extend_from_slice(octets),
        }
        let rdlength = (self.wire.len() - rdlength_at - 2) as u16;
        self.wire[rdlength_at..rdlength_at + 2].copy_from_slice(&rdlength.to_be_bytes());

        match section {
            Section::Answer => self.ancount += 1,
            Section::Authority => self.nscount += 1,
            Section::Additional => self.arcount += 1,
        }
    }

    /// Serializes every record of `records` into the bundle.
    pub fn add_rrset<'a>(
        &mut self,
        section: Section,
        records: impl IntoIterator<Item = &'a Record>,
    ) {
        for record in records {
            self.add_rr(section, record);
        }
    }

    /// Finishes the bundle.
    pub fn build(self, authoritative: bool) -> Answer {
        Answer::new(
            (self.ancount, self.nscount, self.arcount),
            authoritative,
            self.wire.into(),
            self.pointers.into(),
        )
    }

    /// Writes `name` at the current position, as a pointer if the same
    /// name was already written in full.
    fn write_name(&mut self, name: &Name) {
        if let Some(&target) = self.name_offsets.get(name.wire_repr()) {
            self.pointers.push(self.wire.len() as u16);
            self.wire.extend_from_slice(&(0xc000 | target).to_be_bytes());
            return;
        }

        let offset = self.wire.len();
        // A name no longer than a pointer is not worth compressing, and
        // a target too deep into the bundle could overflow when
        // relocated.
        if name.wire_repr().len() > 2 && offset <= MAX_POINTER_TARGET as usize {
            self.name_offsets
                .insert(name.wire_repr().into(), offset as u16);
        }
        self.wire.extend_from_slice(name.wire_repr());
    }
}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;
    use crate::class::Class;
    use crate::rr::Ttl;

    fn ns(owner: &str, target: &str) -> Record {
        Record {
            owner: owner.parse().unwrap(),
            rr_type: Type::NS,
            class: Class::IN,
            ttl: Ttl::from(3600),
            rdata: Rdata::Name(target.parse().unwrap()),
        }
    }

    fn a(owner: &str, address: [u8; 4]) -> Record {
        Record {
            owner: owner.parse().unwrap(),
            rr_type: Type::A,
            class: Class::IN,
            ttl: Ttl::from(3600),
            rdata: Rdata::Opaque(Box::new(address)),
        }
    }

    #[test]
    fn a_lone_rr_is_written_uncompressed() {
        let mut builder = AnswerBuilder::new();
        builder.add_rr(Section::Answer, &a("ns.test.", [192, 0, 2, 1]));
        let answer = builder.build(true);

        assert_eq!(answer.ancount(), 1);
        assert_eq!(answer.nscount(), 0);
        assert_eq!(
            answer.segment(0).octets(),
            b"\x02ns\x04test\x00\x00\x01\x00\x01\x00\x00\x0e\x10\x00\x04\xc0\x00\x02\x01",
        );
    }

    #[test]
    fn repeated_owners_compress_to_pointers() {
        let mut builder = AnswerBuilder::new();
        builder.add_rrset(
            Section::Authority,
            &[ns("com.", "a.gtld.test."), ns("com.", "b.gtld.test.")],
        );
        let answer = builder.build(false);
        assert_eq!(answer.nscount(), 2);

        let segment = answer.segment(0);
        let octets = segment.octets();
        // First record: owner in full (5 octets), fixed fields (10),
        // RDATA name in full (13). Second record: owner is a pointer to
        // offset 0.
        assert_eq!(&octets[0..5], b"\x03com\x00");
        assert_eq!(&octets[15..28], b"\x01a\x04gtld\x04test\x00");
        assert_eq!(&octets[28..30], b"\xc0\x00");
        // The second RDATA cannot compress (different first label), so
        // it is written in full again.
        assert_eq!(&octets[40..53], b"\x01b\x04gtld\x04test\x00");
    }

    #[test]
    fn glue_owners_compress_against_rdata_names() {
        let mut builder = AnswerBuilder::new();
        builder.add_rr(Section::Authority, &ns("com.", "ns.gtld.test."));
        builder.add_rr(Section::Additional, &a("ns.gtld.test.", [192, 0, 2, 53]));
        let answer = builder.build(false);
        assert_eq!(answer.nscount(), 1);
        assert_eq!(answer.arcount(), 1);

        let segment = answer.segment(0);
        let octets = segment.octets();
        // The NS RDATA name starts at offset 15 (owner 5 + fixed fields
        // 8 + RDLENGTH 2); the glue owner points at it.
        assert_eq!(&octets[13..15], b"\x00\x0e");
        assert_eq!(&octets[29..31], b"\xc0\x0f");
    }

    #[test]
    fn relocation_shifts_pointer_targets_only() {
        let mut builder = AnswerBuilder::new();
        builder.add_rrset(
            Section::Authority,
            &[ns("com.", "x.test."), ns("com.", "y.test.")],
        );
        let unshifted = builder.build(false);

        let shifted = unshifted.segment(0x20);
        let baseline = unshifted.segment(0);
        // The pointer to the owner moves from 0xc000 to 0xc020; all
        // other octets are identical.
        let mut expected = baseline.octets().to_vec();
        let position = expected
            .windows(2)
            .position(|pair| pair == b"\xc0\x00")
            .unwrap();
        expected[position + 1] = 0x20;
        assert_eq!(shifted.octets(), expected.as_slice());
    }
}
