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

//! Parsing of master files in the shape the root zone is published in.
//!
//! The published root zone is fully expanded: every line is
//! `owner TTL class type rdata`, with no `$` directives, no
//! parenthesized continuations, and no escapes. This module parses
//! exactly that shape. Record types that cannot appear in a one-level
//! zone's answers are skipped with a warning rather than rejected, so
//! a zone file with unexpected-but-harmless content still loads.

use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

use data_encoding::{BASE64, HEXUPPER_PERMISSIVE};
use log::warn;

use crate::class::Class;
use crate::name::Name;
use crate::rr::{Ttl, Type};

////////////////////////////////////////////////////////////////////////
// RECORDS                                                            //
////////////////////////////////////////////////////////////////////////

/// One resource record parsed from a master file.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Record {
    pub owner: Name,
    pub rr_type: Type,
    pub class: Class,
    pub ttl: Ttl,
    pub rdata: Rdata,
}

/// A record's RDATA, pre-serialized to wire format.
///
/// RDATA that consists of a single domain name (NS) keeps the parsed
/// [`Name`], so the answer builder can compress it; everything else is
/// stored as opaque wire octets.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Rdata {
    Name(Name),
    Opaque(Box<[u8]>),
}

impl Record {
    /// For RRSIG records, returns the covered RR type (the first two
    /// octets of the RDATA).
    pub fn covered_type(&self) -> Option<Type> {
        match (self.rr_type, &self.rdata) {
            (Type::RRSIG, Rdata::Opaque(octets)) if octets.len() >= 2 => {
                Some(Type::from(u16::from_be_bytes([octets[0], octets[1]])))
            }
            _ => None,
        }
    }
}

////////////////////////////////////////////////////////////////////////
// PARSING                                                            //
////////////////////////////////////////////////////////////////////////

/// Parses the master-file `text`, returning its records in file order.
pub fn parse(text: &str) -> Result<Vec<Record>> {
    let mut records = Vec::new();
    for (index, line) in text.lines().enumerate() {
        let line_no = index + 1;
        let line = line.split(';').next().unwrap_or("");
        if line.trim().is_empty() {
            continue;
        }
        if let Some(record) = parse_line(line).map_err(|kind| Error { line: line_no, kind })? {
            records.push(record);
        } else {
            warn!("Skipping unsupported record on line {}.", line_no);
        }
    }
    Ok(records)
}

/// Parses one non-empty line. Returns `Ok(None)` for records of
/// unsupported types.
fn parse_line(line: &str) -> std::result::Result<Option<Record>, ErrorKind> {
    let mut fields = line.split_whitespace();
    let mut next = |what| fields.next().ok_or(ErrorKind::MissingField(what));

    let owner: Name = next("owner")?
        .parse()
        .map_err(|_| ErrorKind::BadField("owner"))?;
    let ttl: u32 = next("TTL")?
        .parse()
        .map_err(|_| ErrorKind::BadField("TTL"))?;
    let class: Class = next("class")?
        .parse()
        .map_err(|_| ErrorKind::BadField("class"))?;
    let type_text = next("type")?;
    let rr_type: Type = match type_text.parse() {
        Ok(rr_type) => rr_type,
        Err(_) => return Ok(None),
    };

    let rdata = match parse_rdata(rr_type, fields)? {
        Some(rdata) => rdata,
        None => return Ok(None),
    };

    Ok(Some(Record {
        owner,
        rr_type,
        class,
        ttl: Ttl::from(ttl),
        rdata,
    }))
}

/// Parses the RDATA fields for `rr_type`. Returns `Ok(None)` when the
/// type has no RDATA parser here.
fn parse_rdata<'a>(
    rr_type: Type,
    mut fields: impl Iterator<Item = &'a str>,
) -> std::result::Result<Option<Rdata>, ErrorKind> {
    let mut next = |what| fields.next().ok_or(ErrorKind::MissingField(what));

    let rdata = match rr_type {
        Type::A => {
            let address: Ipv4Addr = next("address")?
                .parse()
                .map_err(|_| ErrorKind::BadField("address"))?;
            Rdata::Opaque(Box::new(address.octets()))
        }
        Type::AAAA => {
            let address: Ipv6Addr = next("address")?
                .parse()
                .map_err(|_| ErrorKind::BadField("address"))?;
            Rdata::Opaque(Box::new(address.octets()))
        }
        Type::NS => Rdata::Name(parse_name_field(next("name server")?)?),
        Type::SOA => {
            let mut octets = Vec::new();
            octets.extend_from_slice(parse_name_field(next("MNAME")?)?.wire_repr());
            octets.extend_from_slice(parse_name_field(next("RNAME")?)?.wire_repr());
            for what in ["SERIAL", "REFRESH", "RETRY", "EXPIRE", "MINIMUM"] {
                let value: u32 = next(what)?.parse().map_err(|_| ErrorKind::BadField(what))?;
                octets.extend_from_slice(&value.to_be_bytes());
            }
            Rdata::Opaque(octets.into())
        }
        Type::DS => {
            let mut octets = Vec::new();
            octets.extend_from_slice(&parse_u16(next("key tag")?, "key tag")?.to_be_bytes());
            octets.push(parse_u8(next("algorithm")?, "algorithm")?);
            octets.push(parse_u8(next("digest type")?, "digest type")?);
            octets.extend_from_slice(&parse_hex(fields)?);
            Rdata::Opaque(octets.into())
        }
        Type::DNSKEY => {
            let mut octets = Vec::new();
            octets.extend_from_slice(&parse_u16(next("flags")?, "flags")?.to_be_bytes());
            octets.push(parse_u8(next("protocol")?, "protocol")?);
            octets.push(parse_u8(next("algorithm")?, "algorithm")?);
            octets.extend_from_slice(&parse_base64(fields)?);
            Rdata::Opaque(octets.into())
        }
        Type::NSEC => {
            let mut octets = Vec::new();
            octets.extend_from_slice(parse_name_field(next("next name")?)?.wire_repr());
            let types = fields
                .map(Type::from_str)
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(|_| ErrorKind::BadField("type bitmap"))?;
            octets.extend_from_slice(&build_type_bitmap(&types));
            Rdata::Opaque(octets.into())
        }
        Type::RRSIG => {
            let mut octets = Vec::new();
            let covered: Type = next("type covered")?
                .parse()
                .map_err(|_| ErrorKind::BadField("type covered"))?;
            octets.extend_from_slice(&u16::from(covered).to_be_bytes());
            octets.push(parse_u8(next("algorithm")?, "algorithm")?);
            octets.push(parse_u8(next("labels")?, "labels")?);
            let original_ttl: u32 = next("original TTL")?
                .parse()
                .map_err(|_| ErrorKind::BadField("original TTL"))?;
            octets.extend_from_slice(&original_ttl.to_be_bytes());
            octets.extend_from_slice(&parse_time(next("expiration")?, "expiration")?.to_be_bytes());
            octets.extend_from_slice(&parse_time(next("inception")?, "inception")?.to_be_bytes());
            octets.extend_from_slice(&parse_u16(next("key tag")?, "key tag")?.to_be_bytes());
            octets.extend_from_slice(parse_name_field(next("signer")?)?.wire_repr());
            octets.extend_from_slice(&parse_base64(fields)?);
            Rdata::Opaque(octets.into())
        }
        _ => return Ok(None),
    };

    Ok(Some(rdata))
}

fn parse_name_field(text: &str) -> std::result::Result<Name, ErrorKind> {
    text.parse().map_err(|_| ErrorKind::BadField("domain name"))
}

fn parse_u8(text: &str, what: &'static str) -> std::result::Result<u8, ErrorKind> {
    text.parse().map_err(|_| ErrorKind::BadField(what))
}

fn parse_u16(text: &str, what: &'static str) -> std::result::Result<u16, ErrorKind> {
    text.parse().map_err(|_| ErrorKind::BadField(what))
}

/// Decodes the remaining fields as one hexadecimal string (master files
/// may split it across whitespace).
fn parse_hex<'a>(
    fields: impl Iterator<Item = &'a str>,
) -> std::result::Result<Vec<u8>, ErrorKind> {
    let text: String = fields.collect();
    if text.is_empty() {
        return Err(ErrorKind::MissingField("hex data"));
    }
    HEXUPPER_PERMISSIVE
        .decode(text.as_bytes())
        .map_err(|_| ErrorKind::BadField("hex data"))
}

/// Decodes the remaining fields as one base64 string.
fn parse_base64<'a>(
    fields: impl Iterator<Item = &'a str>,
) -> std::result::Result<Vec<u8>, ErrorKind> {
    let text: String = fields.collect();
    if text.is_empty() {
        return Err(ErrorKind::MissingField("base64 data"));
    }
    BASE64
        .decode(text.as_bytes())
        .map_err(|_| ErrorKind::BadField("base64 data"))
}

/// Parses an RRSIG timestamp: either `YYYYMMDDHHmmSS` or seconds since
/// the epoch ([RFC 4034 § 3.2]).
///
/// [RFC 4034 § 3.2]: https://datatracker.ietf.org/doc/html/rfc4034#section-3.2
fn parse_time(text: &str, what: &'static str) -> std::result::Result<u32, ErrorKind> {
    if text.len() != 14 {
        return text.parse().map_err(|_| ErrorKind::BadField(what));
    }

    let digits = |range: std::ops::Range<usize>| {
        text[range]
            .parse::<u32>()
            .map_err(|_| ErrorKind::BadField(what))
    };
    let year = digits(0..4)? as i64;
    let month = digits(4..6)?;
    let day = digits(6..8)?;
    let (hour, minute, second) = (digits(8..10)?, digits(10..12)?, digits(12..14)?);
    if !(1..=12).contains(&month) || !(1..=31).contains(&day) {
        return Err(ErrorKind::BadField(what));
    }

    // Days since 1970-01-01 from the proleptic Gregorian calendar.
    let adjusted_year = year - (month <= 2) as i64;
    let era = adjusted_year.div_euclid(400);
    let year_of_era = adjusted_year - era * 400;
    let month = month as i64;
    let day_of_year = (153 * (month + if month > 2 { -3 } else { 9 }) + 2) / 5 + day as i64 - 1;
    let day_of_era = year_of_era * 365 + year_of_era / 4 - year_of_era / 100 + day_of_year;
    let days = era * 146097 + day_of_era - 719468;

    // Serial arithmetic: timestamps wrap modulo 2^32.
    let seconds = days * 86400 + (hour * 3600 + minute * 60 + second) as i64;
    Ok(seconds as u32)
}

/// Builds an NSEC type bitmap ([RFC 4034 § 4.1.2]).
///
/// [RFC 4034 § 4.1.2]: https://datatracker.ietf.org/doc/html/rfc4034#section-4.1.2
fn build_type_bitmap(types: &[Type]) -> Vec<u8> {
    let mut octets = Vec::new();
    let mut values: Vec<u16> = types.iter().map(|&rr_type| rr_type.into()).collect();
    values.sort_unstable();

    let mut window = None;
    let mut bits = [0u8; 32];
    let mut bits_len = 0;
    for value in values {
        let this_window = (value >> 8) as u8;
        if window != Some(this_window) {
            if let Some(window) = window {
                octets.push(window);
                octets.push(bits_len as u8);
                octets.extend_from_slice(&bits[..bits_len]);
            }
            window = Some(this_window);
            bits = [0; 32];
            bits_len = 0;
        }
        let low = (value & 0xff) as usize;
        bits[low / 8] |= 0x80 >> (low % 8);
        bits_len = bits_len.max(low / 8 + 1);
    }
    if let Some(window) = window {
        octets.push(window);
        octets.push(bits_len as u8);
        octets.extend_from_slice(&bits[..bits_len]);
    }
    octets
}

////////////////////////////////////////////////////////////////////////
// ERRORS                                                             //
////////////////////////////////////////////////////////////////////////

/// An error signaling that a master file could not be parsed.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Error {
    pub line: usize,
    pub kind: ErrorKind,
}

/// The ways a master-file line can be malformed.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorKind {
    MissingField(&'static str),
    BadField(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.kind {
            ErrorKind::MissingField(what) => {
                write!(f, "line {}: missing {} field", self.line, what)
            }
            ErrorKind::BadField(what) => write!(f, "line {}: invalid {} field", self.line, what),
        }
    }
}

impl std::error::Error for Error {}

/// The type returned by [`parse`].
pub type Result<T> = std::result::Result<T, Error>;

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_records_parse_to_wire_octets() {
        let records = parse(concat!(
            "a.root-servers.net. 3600000 IN A 198.41.0.4\n",
            "a.root-servers.net. 3600000 IN AAAA 2001:503:ba3e::2:30\n",
        ))
        .unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(
            records[0].rdata,
            Rdata::Opaque(Box::new([198, 41, 0, 4])),
        );
        assert_eq!(records[0].ttl, Ttl::from(3600000));
        assert_eq!(
            records[1].rdata,
            Rdata::Opaque(Box::new([
                0x20, 0x01, 0x05, 0x03, 0xba, 0x3e, 0, 0, 0, 0, 0, 0, 0, 2, 0, 0x30,
            ])),
        );
    }

    #[test]
    fn ns_rdata_keeps_the_parsed_name() {
        let records = parse(". 518400 IN NS A.ROOT-SERVERS.NET.\n").unwrap();
        assert!(records[0].owner.is_root());
        assert_eq!(
            records[0].rdata,
            Rdata::Name("a.root-servers.net.".parse().unwrap()),
        );
    }

    #[test]
    fn soa_rdata_serializes_names_and_counters() {
        let records =
            parse(". 86400 IN SOA a.root-servers.net. nstld.verisign-grs.com. 2023061400 1800 900 604800 86400\n")
                .unwrap();
        let Rdata::Opaque(octets) = &records[0].rdata else {
            panic!("expected opaque RDATA");
        };
        let mname: Name = "a.root-servers.net.".parse().unwrap();
        let rname: Name = "nstld.verisign-grs.com.".parse().unwrap();
        assert!(octets.starts_with(mname.wire_repr()));
        assert!(octets[mname.wire_repr().len()..].starts_with(rname.wire_repr()));
        let counters = &octets[mname.wire_repr().len() + rname.wire_repr().len()..];
        assert_eq!(counters.len(), 20);
        assert_eq!(&counters[0..4], &2023061400u32.to_be_bytes());
        assert_eq!(&counters[16..20], &86400u32.to_be_bytes());
    }

    #[test]
    fn ds_hex_may_span_fields() {
        let records = parse("com. 86400 IN DS 30909 8 2 E2D3C916F6DEEAC73294E8268FB5885044A833FC5459588F4A9184CF C41A5766\n").unwrap();
        let Rdata::Opaque(octets) = &records[0].rdata else {
            panic!("expected opaque RDATA");
        };
        assert_eq!(&octets[0..4], &[0x78, 0xbd, 8, 2]);
        assert_eq!(octets.len(), 4 + 32);
        assert_eq!(octets[4], 0xe2);
        assert_eq!(octets[35], 0x66);
    }

    #[test]
    fn dnskey_base64_decodes() {
        let records = parse(". 172800 IN DNSKEY 256 3 8 AwEAAa96jeuknZlaeSrvyAJj6ZHv28hhOKkx3rLGXVaC6rXTsDc449/c\n").unwrap();
        let Rdata::Opaque(octets) = &records[0].rdata else {
            panic!("expected opaque RDATA");
        };
        assert_eq!(&octets[0..4], &[1, 0, 3, 8]);
        assert_eq!(&octets[4..7], &[0x03, 0x01, 0x00]);
    }

    #[test]
    fn nsec_builds_a_type_bitmap() {
        let records = parse(". 86400 IN NSEC aaa. NS SOA RRSIG NSEC DNSKEY\n").unwrap();
        let Rdata::Opaque(octets) = &records[0].rdata else {
            panic!("expected opaque RDATA");
        };
        let next: Name = "aaa.".parse().unwrap();
        assert!(octets.starts_with(next.wire_repr()));
        // Types 2, 6, 46, 47, 48: window 0, 7 octets of bitmap.
        let bitmap = &octets[next.wire_repr().len()..];
        assert_eq!(bitmap[0..2], [0, 7]);
        assert_eq!(bitmap[2], 0x22); // NS (2) and SOA (6)
        assert_eq!(bitmap[7], 0x03); // RRSIG (46) and NSEC (47)
        assert_eq!(bitmap[8], 0x80); // DNSKEY (48)
    }

    #[test]
    fn rrsig_timestamps_accept_both_forms() {
        let records = parse(concat!(
            "com. 86400 IN RRSIG DS 8 1 86400 20230627050000 20230614040000 60955 . sig=\n",
            "com. 86400 IN RRSIG DS 8 1 86400 1687842000 1686715200 60955 . sig=\n",
        ))
        .unwrap();
        let octets = |record: &Record| match &record.rdata {
            Rdata::Opaque(octets) => octets.clone(),
            _ => panic!("expected opaque RDATA"),
        };
        let first = octets(&records[0]);
        let second = octets(&records[1]);
        assert_eq!(records[0].covered_type(), Some(Type::DS));
        // 2023-06-27T05:00:00Z and 2023-06-14T04:00:00Z.
        assert_eq!(&first[8..12], &1687842000u32.to_be_bytes());
        assert_eq!(&first[12..16], &1686715200u32.to_be_bytes());
        assert_eq!(first, second);
    }

    #[test]
    fn unknown_types_are_skipped() {
        let records = parse(concat!(
            ". 86400 IN ZZZZ some rdata\n",
            "com. 172800 IN NS a.gtld-servers.net.\n",
        ))
        .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].rr_type, Type::NS);
    }

    #[test]
    fn comments_and_blank_lines_are_ignored() {
        let records = parse(concat!(
            "; the root zone\n",
            "\n",
            "com. 172800 IN NS a.gtld-servers.net. ; delegation\n",
        ))
        .unwrap();
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn malformed_lines_are_rejected_with_positions() {
        let error = parse("com. oops IN NS a.gtld-servers.net.\n").unwrap_err();
        assert_eq!(error.line, 1);
        assert_eq!(error.kind, ErrorKind::BadField("TTL"));

        let error = parse("\ncom. 86400 IN DS 30909 8 2\n").unwrap_err();
        assert_eq!(error.line, 2);
        assert_eq!(error.kind, ErrorKind::MissingField("hex data"));
    }
}
