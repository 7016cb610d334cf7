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

//! Constants related to DNS messages.

pub const HEADER_SIZE: usize = 12;

/// The smallest packet worth answering: a header followed by a
/// root-label question (1 octet) plus QTYPE and QCLASS.
pub const MIN_QUERY_SIZE: usize = HEADER_SIZE + 1 + 2 + 2;

/// The octet of the raw header holding the QR bit, for the pre-parse
/// gate that runs before any fields are decoded.
pub const QR_BYTE: usize = 2;
pub const QR_BYTE_MASK: u8 = 0x80;

// Bit masks over the 16-bit flags field in host order.
pub const FLAGS_QR: u16 = 0x8000;
pub const FLAGS_AA: u16 = 0x0400;
pub const FLAGS_TC: u16 = 0x0200;
pub const FLAGS_RD: u16 = 0x0100;
pub const FLAGS_RA: u16 = 0x0080;
pub const FLAGS_CD: u16 = 0x0010;
pub const OPCODE_MASK: u16 = 0x7800;
pub const OPCODE_SHIFT: usize = 11;
pub const RCODE_MASK: u16 = 0x000f;

/// Request flag bits propagated verbatim into responses: the opcode
/// plus RD and CD.
pub const FLAGS_ECHO_MASK: u16 = OPCODE_MASK | FLAGS_RD | FLAGS_CD;

/// The maximum encoded length of a domain name, length octets included.
pub const MAX_NAME_SIZE: usize = 255;

/// The maximum length of a single label's body.
pub const MAX_LABEL_SIZE: usize = 63;

/// Label length octets with either of the top two bits set are
/// compression pointers (or reserved encodings), which are illegal in a
/// question section.
pub const LABEL_POINTER_MASK: u8 = 0xc0;

/// AF_PACKET pads short inbound frames up to the 46-octet Ethernet
/// minimum; trailing octets are tolerated on packets up to this size.
pub const PADDED_FRAME_SIZE: usize = 46;
