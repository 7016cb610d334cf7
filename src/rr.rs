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

//! The [`Type`] and [`Ttl`] types for DNS resource records.

use std::fmt;
use std::str::FromStr;

use crate::message::Qtype;
use crate::util::Caseless;

////////////////////////////////////////////////////////////////////////
// RR TYPES                                                           //
////////////////////////////////////////////////////////////////////////

/// Represents the RR type of a DNS record.
///
/// An RR type is represented on the wire as an unsigned 16-bit integer.
/// Hence this is basically a wrapper around [`u16`] with nice
/// [`Debug`](fmt::Debug), [`Display`](fmt::Display), and [`FromStr`]
/// implementations, plus constants for the types that occur in the root
/// zone.
#[derive(Clone, Copy, Eq, Hash, PartialEq, PartialOrd, Ord)]
pub struct Type(u16);

impl Type {
    pub const A: Type = Type(1);
    pub const NS: Type = Type(2);
    pub const SOA: Type = Type(6);
    pub const TXT: Type = Type(16);
    pub const AAAA: Type = Type(28);
    pub const OPT: Type = Type(41);
    pub const DS: Type = Type(43);
    pub const RRSIG: Type = Type(46);
    pub const NSEC: Type = Type(47);
    pub const DNSKEY: Type = Type(48);
    pub const ZONEMD: Type = Type(63);

    /// The defined mnemonics. Parsing compares against them
    /// case-insensitively (zone files in the wild spell them both
    /// ways); display uses them as spelled here.
    const MNEMONICS: [(&'static str, Self); 11] = [
        ("A", Self::A),
        ("NS", Self::NS),
        ("SOA", Self::SOA),
        ("TXT", Self::TXT),
        ("AAAA", Self::AAAA),
        ("OPT", Self::OPT),
        ("DS", Self::DS),
        ("RRSIG", Self::RRSIG),
        ("NSEC", Self::NSEC),
        ("DNSKEY", Self::DNSKEY),
        ("ZONEMD", Self::ZONEMD),
    ];
}

impl From<u16> for Type {
    fn from(raw: u16) -> Self {
        Self(raw)
    }
}

impl From<Type> for u16 {
    fn from(rr_type: Type) -> Self {
        rr_type.0
    }
}

impl From<Qtype> for Type {
    fn from(qtype: Qtype) -> Self {
        Self(qtype.into())
    }
}

impl FromStr for Type {
    type Err = &'static str;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let mnemonic = Self::MNEMONICS
            .iter()
            .find(|&&(mnemonic, _)| Caseless(mnemonic) == Caseless(text));
        if let Some((_, rr_type)) = mnemonic {
            Ok(*rr_type)
        } else if text
            .get(0..4)
            .map_or(false, |prefix| prefix.eq_ignore_ascii_case("TYPE"))
        {
            text[4..]
                .parse::<u16>()
                .map(Self::from)
                .or(Err("type value is not a valid unsigned 16-bit integer"))
        } else {
            Err("unrecognized RR type")
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match Self::MNEMONICS.iter().find(|(_, rr_type)| rr_type == self) {
            Some((mnemonic, _)) => f.write_str(mnemonic),
            None => write!(f, "TYPE{}", self.0),
        }
    }
}

impl fmt::Debug for Type {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self)
    }
}

////////////////////////////////////////////////////////////////////////
// TTLS                                                               //
////////////////////////////////////////////////////////////////////////

/// The TTL of a DNS record: an unsigned 32-bit integer in wire format.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, PartialOrd, Ord)]
pub struct Ttl(u32);

impl From<u32> for Ttl {
    fn from(raw: u32) -> Self {
        Self(raw)
    }
}

impl From<Ttl> for u32 {
    fn from(ttl: Ttl) -> Self {
        ttl.0
    }
}

impl fmt::Display for Ttl {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.0.fmt(f)
    }
}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_from_str_accepts_mnemonics_and_generic_forms() {
        assert_eq!("NS".parse(), Ok(Type::NS));
        assert_eq!("dnskey".parse(), Ok(Type::DNSKEY));
        assert_eq!("RrSiG".parse(), Ok(Type::RRSIG));
        assert_eq!("TYPE63".parse(), Ok(Type::ZONEMD));
        assert_eq!("type63".parse(), Ok(Type::ZONEMD));
        assert_eq!("TYPE65280".parse(), Ok(Type::from(65280)));
        assert!("NSX".parse::<Type>().is_err());
        assert!("TYPE65536".parse::<Type>().is_err());
    }

    #[test]
    fn type_display_matches_from_str() {
        for raw in [1, 2, 6, 28, 43, 46, 47, 48, 12345] {
            let rr_type = Type::from(raw);
            assert_eq!(rr_type.to_string().parse(), Ok(rr_type));
        }
    }
}
