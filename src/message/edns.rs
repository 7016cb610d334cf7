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

//! EDNS(0) OPT pseudo-RR handling.
//!
//! A query carries at most one OPT record, at the end of the message
//! ([RFC 6891 § 6.1.1]). [`read_opt`] extracts the fields the responder
//! cares about; [`write_opt`] synthesizes the OPT record that every
//! EDNS response carries. EDNS options themselves are skipped: none are
//! implemented, and [RFC 6891 § 6.1.2] says to ignore unknown ones.
//!
//! [RFC 6891 § 6.1.1]: https://datatracker.ietf.org/doc/html/rfc6891#section-6.1.1
//! [RFC 6891 § 6.1.2]: https://datatracker.ietf.org/doc/html/rfc6891#section-6.1.2

use std::fmt;

use super::ExtendedRcode;
use crate::buffer::{self, OverrunError, ReadBuffer, WriteBuffer};
use crate::rr::Type;

////////////////////////////////////////////////////////////////////////
// OPT RECORD LAYOUT                                                  //
////////////////////////////////////////////////////////////////////////

/// The size of an OPT record with no options: owner (1), type (2), UDP
/// payload size (2), extended RCODE (1), version (1), flags (2), and
/// RDLENGTH (2).
pub const OPT_RECORD_SIZE: usize = 11;

/// The UDP payload size advertised in responses. Responses are built to
/// fit it, so no truncation handling is needed.
pub const ADVERTISED_UDP_PAYLOAD: u16 = 1480;

/// The DO (DNSSEC OK) bit in the OPT flags field.
const FLAGS_DO: u16 = 0x8000;

/// The fields of a query's OPT pseudo-RR that affect the response.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct OptRecord {
    /// The requestor's advertised UDP payload size.
    pub udp_size: u16,

    /// The EDNS version. Anything above 0 is answered with BADVERS.
    pub version: u8,

    /// Whether the DO (DNSSEC OK) bit is set.
    pub do_bit: bool,
}

////////////////////////////////////////////////////////////////////////
// READING                                                            //
////////////////////////////////////////////////////////////////////////

/// Reads an OPT pseudo-RR from the remainder of `input`.
///
/// An exhausted buffer means the query has no OPT record and yields
/// `Ok(None)`. Anything else must be a complete OPT record: fewer than
/// [`OPT_RECORD_SIZE`] remaining octets, a non-root owner, a non-OPT
/// type, or options running past the end of the buffer are all errors
/// (answered with FORMERR).
pub fn read_opt(input: &mut ReadBuffer<'_>) -> Result<Option<OptRecord>> {
    if input.available() == 0 {
        return Ok(None);
    }

    if input.available() < OPT_RECORD_SIZE {
        return Err(Error::TooShort);
    }

    if input.read_u8()? != 0 {
        return Err(Error::OwnerNotRoot);
    }

    if Type::from(input.read_u16()?) != Type::OPT {
        return Err(Error::NotOpt);
    }

    let udp_size = input.read_u16()?;
    let _ext_rcode = input.read_u8()?;
    let version = input.read_u8()?;
    let flags = input.read_u16()?;
    let rdlen = input.read_u16()?;

    if input.available() < rdlen as usize {
        return Err(Error::OptionsTruncated);
    }
    input.read_slice(rdlen as usize)?;

    Ok(Some(OptRecord {
        udp_size,
        version,
        do_bit: flags & FLAGS_DO != 0,
    }))
}

////////////////////////////////////////////////////////////////////////
// WRITING                                                            //
////////////////////////////////////////////////////////////////////////

/// Writes the response's OPT pseudo-RR to `output`.
///
/// The record advertises [`ADVERTISED_UDP_PAYLOAD`], carries the high
/// bits of `rcode` in its extended-RCODE octet, echoes the query's DO
/// bit, and has no options.
pub fn write_opt(
    output: &mut WriteBuffer<'_>,
    rcode: ExtendedRcode,
    do_bit: bool,
) -> buffer::Result<()> {
    output.push_u8(0)?; // owner: the root
    output.push_u16(Type::OPT.into())?;
    output.push_u16(ADVERTISED_UDP_PAYLOAD)?;
    output.push_u8(rcode.ext_bits())?;
    output.push_u8(0)?; // version
    output.push_u16(if do_bit { FLAGS_DO } else { 0 })?;
    output.push_u16(0) // RDLENGTH
}

////////////////////////////////////////////////////////////////////////
// ERRORS                                                             //
////////////////////////////////////////////////////////////////////////

/// An error signaling that a query's OPT pseudo-RR is malformed. Every
/// variant is answered with FORMERR.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Error {
    /// Octets remain after the question, but fewer than an OPT record's
    /// minimum size.
    TooShort,

    /// The OPT owner name is not the root.
    OwnerNotRoot,

    /// The record in the additional section is not an OPT record.
    NotOpt,

    /// The RDLENGTH field runs past the end of the message.
    OptionsTruncated,
}

impl From<OverrunError> for Error {
    fn from(_: OverrunError) -> Self {
        Self::TooShort
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Self::TooShort => f.write_str("trailing octets too short for an OPT record"),
            Self::OwnerNotRoot => f.write_str("OPT owner name is not the root"),
            Self::NotOpt => f.write_str("additional record is not an OPT record"),
            Self::OptionsTruncated => f.write_str("OPT options run past the end of the message"),
        }
    }
}

impl std::error::Error for Error {}

/// The type returned by [`read_opt`].
pub type Result<T> = std::result::Result<T, Error>;

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    /// An OPT record advertising 4,096 octets with DO set and a 4-octet
    /// option.
    const OPT_WITH_OPTION: &[u8] =
        b"\x00\x00\x29\x10\x00\x00\x00\x80\x00\x00\x04\xab\xcd\x00\x00";

    #[test]
    fn absence_of_an_opt_record_is_not_an_error() {
        assert_eq!(read_opt(&mut ReadBuffer::new(b"")), Ok(None));
    }

    #[test]
    fn opt_fields_are_extracted_and_options_skipped() {
        let mut input = ReadBuffer::new(OPT_WITH_OPTION);
        let opt = read_opt(&mut input).unwrap().unwrap();
        assert_eq!(opt.udp_size, 4096);
        assert_eq!(opt.version, 0);
        assert!(opt.do_bit);
        assert_eq!(input.available(), 0);
    }

    #[test]
    fn short_trailers_are_rejected() {
        for size in 1..OPT_RECORD_SIZE {
            let mut input = ReadBuffer::new(&OPT_WITH_OPTION[..size]);
            assert_eq!(read_opt(&mut input), Err(Error::TooShort));
        }
    }

    #[test]
    fn non_root_owner_and_non_opt_types_are_rejected() {
        let mut owner = OPT_WITH_OPTION.to_vec();
        owner[0] = 1;
        assert_eq!(
            read_opt(&mut ReadBuffer::new(&owner)),
            Err(Error::OwnerNotRoot),
        );

        let mut rr_type = OPT_WITH_OPTION.to_vec();
        rr_type[2] = 0x02; // NS
        assert_eq!(
            read_opt(&mut ReadBuffer::new(&rr_type)),
            Err(Error::NotOpt),
        );
    }

    #[test]
    fn truncated_options_are_rejected() {
        let mut input = ReadBuffer::new(&OPT_WITH_OPTION[..OPT_RECORD_SIZE + 2]);
        assert_eq!(read_opt(&mut input), Err(Error::OptionsTruncated));
    }

    #[test]
    fn synthesized_opt_carries_rcode_and_do_bit() {
        let mut backing = [0; OPT_RECORD_SIZE];
        let mut output = WriteBuffer::new(&mut backing);
        write_opt(&mut output, ExtendedRcode::BADVERS, true).unwrap();
        assert_eq!(
            output.into_segment().octets(),
            b"\x00\x00\x29\x05\xc8\x01\x00\x80\x00\x00\x00",
        );

        let mut backing = [0; OPT_RECORD_SIZE];
        let mut output = WriteBuffer::new(&mut backing);
        write_opt(&mut output, ExtendedRcode::NOERROR, false).unwrap();
        assert_eq!(
            output.into_segment().octets(),
            b"\x00\x00\x29\x05\xc8\x00\x00\x00\x00\x00\x00",
        );
    }
}
