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

//! An authoritative DNS responder specialized for the root zone.
//!
//! The root zone is tiny, almost static, and queried relentlessly, so
//! this responder trades generality for a hot path with no parsing of
//! zone data and no allocation: every possible answer is pre-computed
//! into wire-format bundles when the zone loads (the [`zone`] module),
//! and query execution (the [`server`] module) only validates the
//! packet, classifies the question, and emits the matching bundle as a
//! list of scatter-gather segments.

pub mod buffer;
pub mod class;
pub mod io;
pub mod message;
pub mod name;
pub mod rr;
pub mod server;
pub mod zone;
pub mod zone_file;

mod util;
