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

//! Implementation of the [`Name`] type for domain names in zone data.
//!
//! Names are stored in uncompressed wire format (length-prefixed labels
//! ending with the root label) with ASCII letters folded to lowercase,
//! so that equality and hashing match the case-insensitive comparison
//! the DNS requires. Question-section names never become [`Name`]s; the
//! hot path works with the fixed-size lookup key from
//! [`crate::message::name`] instead.

use std::fmt;
use std::str::FromStr;

use crate::message::constants::{MAX_LABEL_SIZE, MAX_NAME_SIZE};

////////////////////////////////////////////////////////////////////////
// NAMES                                                              //
////////////////////////////////////////////////////////////////////////

/// A domain name in lowercase, uncompressed wire format.
#[derive(Clone, Eq, Hash, PartialEq, PartialOrd, Ord)]
pub struct Name {
    wire: Box<[u8]>,
}

impl Name {
    /// Returns the root name.
    pub fn root() -> Self {
        Self {
            wire: Box::new([0]),
        }
    }

    /// Returns the name's wire representation, including the final root
    /// label.
    pub fn wire_repr(&self) -> &[u8] {
        &self.wire
    }

    /// Returns the number of labels, not counting the root label.
    pub fn label_count(&self) -> usize {
        self.labels().count()
    }

    /// Returns whether this is the root name.
    pub fn is_root(&self) -> bool {
        self.wire.len() == 1
    }

    /// Returns the body of the first (leftmost) label, or an empty
    /// slice for the root.
    pub fn first_label(&self) -> &[u8] {
        let len = self.wire[0] as usize;
        &self.wire[1..1 + len]
    }

    /// Iterates over the bodies of the name's labels, root excluded.
    pub fn labels(&self) -> impl Iterator<Item = &[u8]> {
        LabelIter {
            wire: &self.wire,
            position: 0,
        }
    }
}

struct LabelIter<'a> {
    wire: &'a [u8],
    position: usize,
}

impl<'a> Iterator for LabelIter<'a> {
    type Item = &'a [u8];

    fn next(&mut self) -> Option<&'a [u8]> {
        let len = self.wire[self.position] as usize;
        if len == 0 {
            None
        } else {
            let body = &self.wire[self.position + 1..self.position + 1 + len];
            self.position += 1 + len;
            Some(body)
        }
    }
}

impl FromStr for Name {
    type Err = Error;

    /// Parses a name from presentation format.
    ///
    /// Absolute and relative spellings are both accepted (zone files
    /// for the root are fully qualified anyway, so relative names are
    /// treated as already complete). Escape sequences are not
    /// supported; no name in the root zone needs them.
    fn from_str(text: &str) -> Result<Self, Error> {
        if text.is_empty() {
            return Err(Error::Empty);
        }
        if text == "." {
            return Ok(Self::root());
        }

        let mut wire = Vec::with_capacity(text.len() + 2);
        for label in text.strip_suffix('.').unwrap_or(text).split('.') {
            if label.is_empty() {
                return Err(Error::EmptyLabel);
            }
            if label.len() > MAX_LABEL_SIZE {
                return Err(Error::LabelTooLong);
            }
            if label.bytes().any(|octet| octet == b'\\') {
                return Err(Error::UnsupportedEscape);
            }
            wire.push(label.len() as u8);
            wire.extend(label.bytes().map(|octet| octet.to_ascii_lowercase()));
        }
        wire.push(0);

        if wire.len() > MAX_NAME_SIZE + 1 {
            Err(Error::NameTooLong)
        } else {
            Ok(Self { wire: wire.into() })
        }
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.is_root() {
            return f.write_str(".");
        }
        for label in self.labels() {
            for &octet in label {
                if octet.is_ascii_graphic() && octet != b'.' {
                    write!(f, "{}", octet as char)?;
                } else {
                    write!(f, "\\{:03}", octet)?;
                }
            }
            f.write_str(".")?;
        }
        Ok(())
    }
}

impl fmt::Debug for Name {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self)
    }
}

////////////////////////////////////////////////////////////////////////
// ERRORS                                                             //
////////////////////////////////////////////////////////////////////////

/// An error signaling that a presentation-format name could not be
/// parsed.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Error {
    Empty,
    EmptyLabel,
    LabelTooLong,
    NameTooLong,
    UnsupportedEscape,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Self::Empty => f.write_str("empty name"),
            Self::EmptyLabel => f.write_str("empty label"),
            Self::LabelTooLong => f.write_str("label exceeds 63 octets"),
            Self::NameTooLong => f.write_str("name exceeds 255 octets"),
            Self::UnsupportedEscape => f.write_str("escape sequences are not supported"),
        }
    }
}

impl std::error::Error for Error {}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////
