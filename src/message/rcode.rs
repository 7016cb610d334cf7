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

//! Implementation of the [`Rcode`] and [`ExtendedRcode`] types.

use std::fmt;

////////////////////////////////////////////////////////////////////////
// RCODES                                                             //
////////////////////////////////////////////////////////////////////////

/// The four-bit RCODE field of the DNS message header, defined by
/// [RFC 1035 § 4.1.1].
///
/// [RFC 1035 § 4.1.1]: https://datatracker.ietf.org/doc/html/rfc1035#section-4.1.1
#[derive(Copy, Clone, Eq, Hash, PartialEq)]
pub struct Rcode(u8);

impl Rcode {
    pub const NOERROR: Self = Self(0);
    pub const FORMERR: Self = Self(1);
    pub const SERVFAIL: Self = Self(2);
    pub const NXDOMAIN: Self = Self(3);
    pub const NOTIMPL: Self = Self(4);
    pub const REFUSED: Self = Self(5);
}

impl From<Rcode> for u8 {
    fn from(rcode: Rcode) -> Self {
        rcode.0
    }
}

impl fmt::Debug for Rcode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", *self)
    }
}

impl fmt::Display for Rcode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        ExtendedRcode::from(*self).fmt(f)
    }
}

////////////////////////////////////////////////////////////////////////
// EXTENDED RCODES                                                    //
////////////////////////////////////////////////////////////////////////

/// A 12-bit extended RCODE as defined by [RFC 6891 § 6.1.3].
///
/// EDNS(0) widens the header's four-bit RCODE with eight additional
/// high bits carried in the OPT pseudo-RR. A query's response code is
/// accumulated in this form; serialization splits it back into
/// [`header_bits`](ExtendedRcode::header_bits) for the header and
/// [`ext_bits`](ExtendedRcode::ext_bits) for the OPT record.
///
/// [RFC 6891 § 6.1.3]: https://datatracker.ietf.org/doc/html/rfc6891#section-6.1.3
#[derive(Copy, Clone, Eq, Hash, PartialEq)]
pub struct ExtendedRcode(u16);

impl ExtendedRcode {
    pub const NOERROR: Self = Self(0);
    pub const FORMERR: Self = Self(1);
    pub const SERVFAIL: Self = Self(2);
    pub const NXDOMAIN: Self = Self(3);
    pub const NOTIMPL: Self = Self(4);
    pub const REFUSED: Self = Self(5);
    pub const BADVERS: Self = Self(16);

    /// Returns the low four bits, which go into the message header.
    pub fn header_bits(self) -> u16 {
        self.0 & 0xf
    }

    /// Returns the high eight bits, which go into the OPT record's
    /// extended-RCODE octet.
    pub fn ext_bits(self) -> u8 {
        (self.0 >> 4) as u8
    }

    /// Returns whether this is [`NOERROR`](ExtendedRcode::NOERROR).
    /// Parse stages are guarded on this: once a stage records a
    /// failure, later stages do not run.
    pub fn is_noerror(self) -> bool {
        self.0 == 0
    }
}

impl From<Rcode> for ExtendedRcode {
    fn from(rcode: Rcode) -> Self {
        Self(rcode.0 as u16)
    }
}

impl From<ExtendedRcode> for u16 {
    fn from(rcode: ExtendedRcode) -> Self {
        rcode.0
    }
}

impl fmt::Debug for ExtendedRcode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", *self)
    }
}

impl fmt::Display for ExtendedRcode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Self::NOERROR => f.write_str("NOERROR"),
            Self::FORMERR => f.write_str("FORMERR"),
            Self::SERVFAIL => f.write_str("SERVFAIL"),
            Self::NXDOMAIN => f.write_str("NXDOMAIN"),
            Self::NOTIMPL => f.write_str("NOTIMPL"),
            Self::REFUSED => f.write_str("REFUSED"),
            Self::BADVERS => f.write_str("BADVERS"),
            Self(value) => write!(f, "RCODE{}", value),
        }
    }
}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////
