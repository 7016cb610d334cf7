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

//! The served zone, kept in memory as pre-computed answer bundles.
//!
//! A [`Zone`] is built once at startup and is immutable afterwards, so
//! it can be shared freely across query threads. Building it means
//! serializing, for the apex and for every delegated TLD, the complete
//! RR sections of each possible response (see
//! [`Category`]); query execution then only selects and emits bundles.

use std::collections::HashMap;
use std::fmt;
use std::io;
use std::path::Path;
use std::sync::Arc;

use log::{info, warn};

use crate::class::Class;
use crate::name::Name;
use crate::rr::Type;
use crate::zone_file::{self, Record};

mod answer;
mod builder;

pub use answer::{Answer, AnswerSet, Category};

use builder::{AnswerBuilder, Section};

////////////////////////////////////////////////////////////////////////
// ZONE                                                               //
////////////////////////////////////////////////////////////////////////

/// A root (or root-like) zone, ready to answer queries.
pub struct Zone {
    apex: AnswerSet,
    tlds: HashMap<Box<[u8]>, AnswerSet>,
}

impl Zone {
    /// Loads a zone from the master file at `path`.
    pub fn load(path: &Path) -> Result<Self, LoadError> {
        let text = std::fs::read_to_string(path).map_err(LoadError::Io)?;
        let records = zone_file::parse(&text).map_err(LoadError::Parse)?;
        info!(
            "Parsed {} records from {}.",
            records.len(),
            path.display(),
        );
        let zone = Self::from_records(records).map_err(LoadError::Build)?;
        info!("Serving {} TLD delegations.", zone.tld_count());
        Ok(zone)
    }

    /// Builds a zone from records (in master-file order).
    pub fn from_records(records: Vec<Record>) -> Result<Self, Error> {
        let data = ZoneData::index(records)?;
        let empty = Arc::new(Answer::empty());

        // The negative bundle (apex SOA in the authority section) backs
        // NXDOMAIN, apex NODATA, and DS-less TLDs alike.
        let negative: [Arc<Answer>; 2] =
            [false, true].map(|do_bit| Arc::new(data.build_negative(do_bit)));

        let mut apex = AnswerSet::new(&empty);
        for do_bit in [false, true] {
            let negative = negative[do_bit as usize].clone();
            apex.set(Category::Nxdomain, do_bit, negative.clone());
            apex.set(Category::RootNodata, do_bit, negative.clone());
            apex.set(
                Category::RootSoa,
                do_bit,
                Arc::new(data.build_apex_positive(Type::SOA, do_bit)),
            );
            apex.set(
                Category::RootNs,
                do_bit,
                Arc::new(data.build_apex_positive(Type::NS, do_bit)),
            );
            for (category, rr_type) in [
                (Category::RootNsec, Type::NSEC),
                (Category::RootDnskey, Type::DNSKEY),
            ] {
                let answer = if data.rrset(&data.apex, rr_type).is_empty() {
                    negative.clone()
                } else {
                    Arc::new(data.build_apex_positive(rr_type, do_bit))
                };
                apex.set(category, do_bit, answer);
            }
            apex.set(Category::RootAny, do_bit, Arc::new(data.build_any(do_bit)));
        }

        let mut tlds = HashMap::new();
        for tld in data.tld_names() {
            if data.rrset(&tld, Type::NS).is_empty() {
                warn!("{} has records but no NS RRset; not serving it.", tld);
                continue;
            }

            let mut set = AnswerSet::new(&empty);
            for do_bit in [false, true] {
                set.set(
                    Category::TldReferral,
                    do_bit,
                    Arc::new(data.build_referral(&tld, do_bit)),
                );
                let ds = if data.rrset(&tld, Type::DS).is_empty() {
                    negative[do_bit as usize].clone()
                } else {
                    Arc::new(data.build_ds(&tld, do_bit))
                };
                set.set(Category::TldDs, do_bit, ds);
            }
            tlds.insert(tld.first_label().into(), set);
        }

        Ok(Self { apex, tlds })
    }

    /// Looks up the answer set for a query's lookup key (the final
    /// label of the QNAME, lowercased; empty for the root).
    ///
    /// The returned flag tells whether the key names the apex or a
    /// delegated TLD. On a miss, the apex set is returned so its
    /// NXDOMAIN bundle can be served.
    pub fn lookup(&self, key: &[u8]) -> (&AnswerSet, bool) {
        if key.is_empty() {
            (&self.apex, true)
        } else if let Some(set) = self.tlds.get(key) {
            (set, true)
        } else {
            (&self.apex, false)
        }
    }

    /// Returns the number of TLD delegations served.
    pub fn tld_count(&self) -> usize {
        self.tlds.len()
    }
}

////////////////////////////////////////////////////////////////////////
// ZONE DATA INDEXING AND BUNDLE CONSTRUCTION                         //
////////////////////////////////////////////////////////////////////////

/// Parsed records indexed by owner, used only while bundles are built.
struct ZoneData {
    apex: Name,
    by_owner: HashMap<Name, Vec<Record>>,
    owners: Vec<Name>,
}

impl ZoneData {
    fn index(records: Vec<Record>) -> Result<ZoneData, Error> {
        let apex = Name::root();
        let mut by_owner: HashMap<Name, Vec<Record>> = HashMap::new();
        let mut owners = Vec::new();
        let mut class: Option<Class> = None;

        for record in records {
            match class {
                None => class = Some(record.class),
                Some(class) if class != record.class => return Err(Error::ClassMismatch),
                Some(_) => (),
            }
            if !by_owner.contains_key(&record.owner) {
                owners.push(record.owner.clone());
            }
            by_owner.entry(record.owner.clone()).or_default().push(record);
        }

        let data = ZoneData {
            apex,
            by_owner,
            owners,
        };
        if data.rrset(&data.apex, Type::SOA).is_empty() {
            return Err(Error::NoSoa);
        }
        if data.rrset(&data.apex, Type::NS).is_empty() {
            return Err(Error::NoApexNs);
        }
        Ok(data)
    }

    /// Returns the records of the RRset at `owner` with `rr_type`, in
    /// file order.
    fn rrset(&self, owner: &Name, rr_type: Type) -> Vec<&Record> {
        self.by_owner
            .get(owner)
            .map(|records| {
                records
                    .iter()
                    .filter(|record| record.rr_type == rr_type)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Returns the RRSIG records at `owner` covering `rr_type`.
    fn sigs(&self, owner: &Name, covered: Type) -> Vec<&Record> {
        self.by_owner
            .get(owner)
            .map(|records| {
                records
                    .iter()
                    .filter(|record| record.covered_type() == Some(covered))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Returns the names of the TLD owners (one label deep), in file
    /// order.
    fn tld_names(&self) -> Vec<Name> {
        self.owners
            .iter()
            .filter(|owner| owner.label_count() == 1)
            .cloned()
            .collect()
    }

    /// Adds an RRset and (with the DO bit) its covering signatures.
    fn add_rrset_with_sigs(
        &self,
        answer: &mut AnswerBuilder,
        section: Section,
        owner: &Name,
        rr_type: Type,
        do_bit: bool,
    ) {
        answer.add_rrset(section, self.rrset(owner, rr_type));
        if do_bit {
            answer.add_rrset(section, self.sigs(owner, rr_type));
        }
    }

    /// Adds A and AAAA glue for the targets of the NS RRset at `owner`.
    fn add_glue(&self, answer: &mut AnswerBuilder, owner: &Name) {
        for ns in self.rrset(owner, Type::NS) {
            if let zone_file::Rdata::Name(target) = &ns.rdata {
                answer.add_rrset(Section::Additional, self.rrset(target, Type::A));
                answer.add_rrset(Section::Additional, self.rrset(target, Type::AAAA));
            }
        }
    }

    /// Builds the authoritative answer for one apex RRset. NS answers
    /// carry glue in the additional section.
    fn build_apex_positive(&self, rr_type: Type, do_bit: bool) -> Answer {
        let mut answer = AnswerBuilder::new();
        self.add_rrset_with_sigs(&mut answer, Section::Answer, &self.apex, rr_type, do_bit);
        if rr_type == Type::NS {
            self.add_glue(&mut answer, &self.apex);
        }
        answer.build(true)
    }

    /// Builds the apex ANY answer: the SOA and NS RRsets, with glue.
    fn build_any(&self, do_bit: bool) -> Answer {
        let mut answer = AnswerBuilder::new();
        self.add_rrset_with_sigs(&mut answer, Section::Answer, &self.apex, Type::SOA, do_bit);
        self.add_rrset_with_sigs(&mut answer, Section::Answer, &self.apex, Type::NS, do_bit);
        self.add_glue(&mut answer, &self.apex);
        answer.build(true)
    }

    /// Builds the negative answer: the apex SOA in the authority
    /// section, for NXDOMAIN and NODATA responses alike.
    fn build_negative(&self, do_bit: bool) -> Answer {
        let mut answer = AnswerBuilder::new();
        self.add_rrset_with_sigs(&mut answer, Section::Authority, &self.apex, Type::SOA, do_bit);
        answer.build(true)
    }

    /// Builds the referral for `tld`: its NS RRset in the authority
    /// section (with the DS RRset and signatures when the DO bit is
    /// set) and glue in the additional section. Referrals are not
    /// authoritative.
    fn build_referral(&self, tld: &Name, do_bit: bool) -> Answer {
        let mut answer = AnswerBuilder::new();
        answer.add_rrset(Section::Authority, self.rrset(tld, Type::NS));
        if do_bit {
            self.add_rrset_with_sigs(&mut answer, Section::Authority, tld, Type::DS, do_bit);
        }
        self.add_glue(&mut answer, tld);
        answer.build(false)
    }

    /// Builds the authoritative DS answer for `tld`.
    fn build_ds(&self, tld: &Name, do_bit: bool) -> Answer {
        let mut answer = AnswerBuilder::new();
        self.add_rrset_with_sigs(&mut answer, Section::Answer, tld, Type::DS, do_bit);
        answer.build(true)
    }
}

////////////////////////////////////////////////////////////////////////
// ERRORS                                                             //
////////////////////////////////////////////////////////////////////////

/// An error signaling that a set of records does not form a servable
/// zone.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Error {
    /// There is no SOA record at the apex.
    NoSoa,

    /// There is no NS RRset at the apex.
    NoApexNs,

    /// The records do not all share one class.
    ClassMismatch,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Self::NoSoa => f.write_str("no SOA record at the apex"),
            Self::NoApexNs => f.write_str("no NS RRset at the apex"),
            Self::ClassMismatch => f.write_str("records with differing classes"),
        }
    }
}

impl std::error::Error for Error {}

/// An error signaling that a zone could not be loaded from a file.
#[derive(Debug)]
pub enum LoadError {
    Io(io::Error),
    Parse(zone_file::Error),
    Build(Error),
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Io(err) => write!(f, "failed to read the zone file: {}", err),
            Self::Parse(err) => write!(f, "failed to parse the zone file: {}", err),
            Self::Build(err) => write!(f, "the zone is not servable: {}", err),
        }
    }
}

impl std::error::Error for LoadError {}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////
