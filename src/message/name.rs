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

//! Parsing of the question-section owner name.
//!
//! The served zone is one level deep, so the only part of the QNAME
//! that distinguishes answers is its final label: the label adjacent to
//! the root, which names a TLD (or nothing at all, for queries against
//! the root apex itself). [`read_qname`] therefore walks the whole name
//! to validate it and count labels, but keeps just the final label,
//! ASCII-lowercased, as the zone lookup key.

use std::fmt;

use arrayvec::ArrayVec;

use super::constants::{LABEL_POINTER_MASK, MAX_LABEL_SIZE, MAX_NAME_SIZE};
use crate::buffer::{OverrunError, ReadBuffer};

////////////////////////////////////////////////////////////////////////
// QUESTION NAME PARSING                                              //
////////////////////////////////////////////////////////////////////////

/// The zone lookup key: the final label of a QNAME, lowercased. A label
/// body never exceeds 63 octets, so the key lives inline without heap
/// allocation.
pub type LookupKey = ArrayVec<u8, MAX_LABEL_SIZE>;

/// The outcome of parsing a question-section owner name.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ParsedQname {
    /// The lookup key (empty for the root).
    pub key: LookupKey,

    /// The number of labels in the name (0 for the root).
    pub labels: u8,
}

/// Reads a question-section owner name from `input`, which must be
/// positioned at the first length octet.
///
/// Labels are consumed up to and including the root label. Compression
/// pointers are illegal in the question section ([RFC 1035 § 4.1.2]
/// queries carry literal names), so any length octet with the top two
/// bits set is rejected, which also caps individual labels at 63
/// octets. The cumulative encoded length must not exceed
/// [`MAX_NAME_SIZE`].
///
/// On success the cursor rests one octet past the root label.
///
/// [RFC 1035 § 4.1.2]: https://datatracker.ietf.org/doc/html/rfc1035#section-4.1.2
pub fn read_qname(input: &mut ReadBuffer<'_>) -> Result<ParsedQname> {
    let mut labels = 0;
    let mut total = 0;
    let mut last: &[u8] = &[];

    loop {
        let len = input.read_u8()?;
        if len == 0 {
            break;
        }

        if len & LABEL_POINTER_MASK != 0 {
            return Err(Error::Compressed);
        }

        total += len as usize + 1;
        if total > MAX_NAME_SIZE {
            return Err(Error::TooLong);
        }

        last = input.read_slice(len as usize)?;
        labels += 1;
    }

    // A label body is at most 63 octets, so this cannot overflow the
    // key's capacity.
    let mut key = LookupKey::new();
    key.try_extend_from_slice(last).unwrap();
    key.as_mut_slice().make_ascii_lowercase();

    Ok(ParsedQname { key, labels })
}

////////////////////////////////////////////////////////////////////////
// ERRORS                                                             //
////////////////////////////////////////////////////////////////////////

/// An error signaling that a question-section owner name could not be
/// read. Every variant is answered with FORMERR.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Error {
    /// A length octet had the compression-pointer bits set.
    Compressed,

    /// The encoded name exceeds 255 octets.
    TooLong,

    /// The buffer ran out before the root label.
    Unterminated,
}

impl From<OverrunError> for Error {
    fn from(_: OverrunError) -> Self {
        Self::Unterminated
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Self::Compressed => f.write_str("compression pointer in question name"),
            Self::TooLong => f.write_str("question name exceeds 255 octets"),
            Self::Unterminated => f.write_str("question name is unterminated"),
        }
    }
}

impl std::error::Error for Error {}

/// The type returned by [`read_qname`].
pub type Result<T> = std::result::Result<T, Error>;

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(octets: &[u8]) -> Result<ParsedQname> {
        read_qname(&mut ReadBuffer::new(octets))
    }

    #[test]
    fn root_name_has_no_labels_and_an_empty_key() {
        let parsed = parse(b"\x00").unwrap();
        assert_eq!(parsed.labels, 0);
        assert!(parsed.key.is_empty());
    }

    #[test]
    fn key_is_the_final_label() {
        let parsed = parse(b"\x03www\x07example\x03com\x00").unwrap();
        assert_eq!(parsed.labels, 3);
        assert_eq!(parsed.key.as_slice(), b"com");
    }

    #[test]
    fn key_is_ascii_lowercased() {
        let parsed = parse(b"\x03CoM\x00").unwrap();
        assert_eq!(parsed.key.as_slice(), b"com");

        // Non-letter octets pass through bit-exact.
        let parsed = parse(b"\x04X\xc3\x89x\x00").unwrap();
        assert_eq!(parsed.key.as_slice(), b"x\xc3\x89x");
    }

    #[test]
    fn cursor_rests_after_the_root_label() {
        let mut input = ReadBuffer::new(b"\x03com\x00\x00\x02\x00\x01");
        read_qname(&mut input).unwrap();
        assert_eq!(input.position(), 5);
        assert_eq!(input.available(), 4);
    }

    #[test]
    fn compression_pointers_are_rejected() {
        assert_eq!(parse(b"\xc0\x0c"), Err(Error::Compressed));
        // Both reserved top bits count.
        assert_eq!(parse(b"\x40abc\x00"), Err(Error::Compressed));
        assert_eq!(parse(b"\x03www\xc0\x0c"), Err(Error::Compressed));
    }

    #[test]
    fn overlong_names_are_rejected() {
        // 4 labels of 63 octets: 4 * 64 = 256 encoded octets.
        let mut octets = Vec::new();
        for _ in 0..4 {
            octets.push(63);
            octets.extend_from_slice(&[b'a'; 63]);
        }
        octets.push(0);
        assert_eq!(parse(&octets), Err(Error::TooLong));

        // One label shorter stays within bounds.
        let parsed = parse(&octets[64..]).unwrap();
        assert_eq!(parsed.labels, 3);
    }

    #[test]
    fn unterminated_names_are_rejected() {
        assert_eq!(parse(b""), Err(Error::Unterminated));
        assert_eq!(parse(b"\x03com"), Err(Error::Unterminated));
        assert_eq!(parse(b"\x3fabc"), Err(Error::Unterminated));
    }
}
