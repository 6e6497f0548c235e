// Copyright 2021 The Grin Developers
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! The extension block chain state: layered coins views over the MMRs and
//! leaf set, block application and undo, and state snapshots.

#![deny(non_upper_case_globals)]
#![deny(non_camel_case_types)]
#![deny(non_snake_case)]
#![deny(unused_mut)]
#![warn(missing_docs)]

#[macro_use]
extern crate log;
#[macro_use]
extern crate serde_derive;

use mweb_core as core;
use mweb_keychain as keychain;
use mweb_util as util;

mod chain;
pub mod coins;
mod error;
pub mod state;
pub mod store;
pub mod types;

// Re-export the base interface

pub use crate::chain::Chain;
pub use crate::coins::{CoinsView, CoinsViewCache, CoinsViewDB};
pub use crate::error::Error;
pub use crate::state::State;
pub use crate::types::{BlockUndo, ChainConfig, HeaderProvider, Utxo};
