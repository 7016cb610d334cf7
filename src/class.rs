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

//! Implementation of the [`Class`] type for DNS classes.

use std::fmt;
use std::str::FromStr;

use crate::message::Qclass;
use crate::util::Caseless;

/// Represents a class in the DNS.
///
/// A class is represented on the wire as an unsigned 16-bit integer, so
/// this is basically a wrapper around [`u16`] with nice
/// [`Debug`](fmt::Debug), [`Display`](fmt::Display), and [`FromStr`]
/// implementations. The only class actually served is
/// [`IN`](Class::IN).
#[derive(Clone, Copy, Eq, Hash, PartialEq, PartialOrd, Ord)]
pub struct Class(u16);

impl Class {
    pub const IN: Self = Self(1);
    pub const CH: Self = Self(3);
    pub const HS: Self = Self(4);

    /// The defined mnemonics. Parsing compares against them
    /// case-insensitively; display uses them as spelled here.
    const MNEMONICS: [(&'static str, Self); 3] =
        [("IN", Self::IN), ("CH", Self::CH), ("HS", Self::HS)];
}

impl From<u16> for Class {
    fn from(value: u16) -> Self {
        Class(value)
    }
}

impl From<Class> for u16 {
    fn from(class: Class) -> Self {
        class.0
    }
}

impl From<Qclass> for Class {
    fn from(qclass: Qclass) -> Self {
        Self(qclass.into())
    }
}

impl FromStr for Class {
    type Err = &'static str;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let mnemonic = Self::MNEMONICS
            .iter()
            .find(|&&(mnemonic, _)| Caseless(mnemonic) == Caseless(text));
        if let Some((_, class)) = mnemonic {
            Ok(*class)
        } else if text
            .get(0..5)
            .map_or(false, |prefix| prefix.eq_ignore_ascii_case("CLASS"))
        {
            text[5..]
                .parse::<u16>()
                .map(Self::from)
                .or(Err("class value is not a valid unsigned 16-bit integer"))
        } else {
            Err("unrecognized class")
        }
    }
}

impl fmt::Display for Class {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match Self::MNEMONICS.iter().find(|(_, class)| class == self) {
            Some((mnemonic, _)) => f.write_str(mnemonic),
            None => write!(f, "CLASS{}", self.0),
        }
    }
}

impl fmt::Debug for Class {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self)
    }
}
