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

//! Pre-computed answer bundles and the per-name sets that hold them.

use std::sync::Arc;

use crate::buffer::Segment;

////////////////////////////////////////////////////////////////////////
// ANSWER CATEGORIES                                                  //
////////////////////////////////////////////////////////////////////////

/// The closed set of answers a query can select.
///
/// The zone is one level deep, so every query lands in one of these
/// buckets: it either misses the zone entirely, hits a delegated name
/// (at or below a TLD), or asks the apex for one of the handful of
/// types with data there.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Category {
    Nxdomain,
    TldReferral,
    TldDs,
    RootSoa,
    RootNs,
    RootNsec,
    RootDnskey,
    RootAny,
    RootNodata,
}

impl Category {
    /// The number of categories.
    pub const COUNT: usize = 9;

    fn index(self) -> usize {
        match self {
            Self::Nxdomain => 0,
            Self::TldReferral => 1,
            Self::TldDs => 2,
            Self::RootSoa => 3,
            Self::RootNs => 4,
            Self::RootNsec => 5,
            Self::RootDnskey => 6,
            Self::RootAny => 7,
            Self::RootNodata => 8,
        }
    }
}

////////////////////////////////////////////////////////////////////////
// ANSWERS                                                            //
////////////////////////////////////////////////////////////////////////

/// A pre-computed answer bundle: the RR sections of one response in
/// wire format, built once at zone load.
///
/// The bundle's octets are laid out as they will appear in a response,
/// immediately after the echoed question. Compression pointers within
/// the bundle are relative to the bundle's own start; since the
/// question's length is only known per-query, [`Answer::segment`]
/// relocates them by the caller's offset when the bundle is emitted.
/// The positions of the pointers are recorded at build time so
/// relocation is a straight pass over a small list.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Answer {
    ancount: u16,
    nscount: u16,
    arcount: u16,
    authoritative: bool,
    wire: Box<[u8]>,
    pointers: Box<[u16]>,
}

impl Answer {
    /// Creates an answer bundle. `pointers` lists the offsets of the
    /// 2-octet compression pointers within `wire`.
    pub(super) fn new(
        counts: (u16, u16, u16),
        authoritative: bool,
        wire: Box<[u8]>,
        pointers: Box<[u16]>,
    ) -> Self {
        Self {
            ancount: counts.0,
            nscount: counts.1,
            arcount: counts.2,
            authoritative,
            wire,
            pointers,
        }
    }

    /// Creates the empty answer: no RRs, not authoritative.
    pub fn empty() -> Self {
        Self {
            ancount: 0,
            nscount: 0,
            arcount: 0,
            authoritative: false,
            wire: Box::new([]),
            pointers: Box::new([]),
        }
    }

    /// Returns the number of answer RRs in the bundle.
    pub fn ancount(&self) -> u16 {
        self.ancount
    }

    /// Returns the number of authority RRs in the bundle.
    pub fn nscount(&self) -> u16 {
        self.nscount
    }

    /// Returns the number of additional RRs in the bundle.
    pub fn arcount(&self) -> u16 {
        self.arcount
    }

    /// Returns whether a response built from this bundle carries the AA
    /// bit.
    pub fn authoritative(&self) -> bool {
        self.authoritative
    }

    /// Returns whether this is the empty answer.
    pub fn is_empty(&self) -> bool {
        self.wire.is_empty()
    }

    /// Returns the bundle's octets as an output segment, with
    /// compression pointers relocated by `shift` (the length of the
    /// response header plus question section).
    ///
    /// Bundles without pointers are borrowed as-is; only bundles with
    /// pointers cost a per-query copy.
    pub fn segment(&self, shift: u16) -> Segment<'_> {
        if self.pointers.is_empty() {
            return Segment::Borrowed(&self.wire);
        }

        let mut wire = self.wire.to_vec();
        for &position in self.pointers.iter() {
            let position = position as usize;
            let field: [u8; 2] = wire[position..position + 2].try_into().unwrap();
            let relocated = u16::from_be_bytes(field) + shift;
            wire[position..position + 2].copy_from_slice(&relocated.to_be_bytes());
        }
        Segment::Owned(wire)
    }
}

////////////////////////////////////////////////////////////////////////
// ANSWER SETS                                                        //
////////////////////////////////////////////////////////////////////////

/// The answers pre-computed for one name in the zone, indexed by
/// [`Category`] and the query's DO bit.
///
/// Slots a name has no answer for hold the shared empty answer; a TLD's
/// set is never asked for a `Root*` category (and vice versa), so those
/// slots simply stay empty.
#[derive(Clone, Debug)]
pub struct AnswerSet {
    slots: [[Arc<Answer>; 2]; Category::COUNT],
}

impl AnswerSet {
    /// Creates an `AnswerSet` with every slot holding `empty`.
    pub(super) fn new(empty: &Arc<Answer>) -> Self {
        Self {
            slots: std::array::from_fn(|_| [empty.clone(), empty.clone()]),
        }
    }

    /// Fills the slot for `category` and `do_bit`.
    pub(super) fn set(&mut self, category: Category, do_bit: bool, answer: Arc<Answer>) {
        self.slots[category.index()][do_bit as usize] = answer;
    }

    /// Returns the answer for `category` and `do_bit`.
    pub fn answer(&self, category: Category, do_bit: bool) -> &Answer {
        &self.slots[category.index()][do_bit as usize]
    }
}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////
