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

//! Merkle Mountain Range
//!
//! An MMR is a set of perfectly balanced binary trees, laid out left to
//! right in post-order, each tree being as large as possible given the
//! number of leaves. Positions are 0-based; the height of every position is
//! a pure function of the position, as are parents, siblings and children,
//! so nothing but the flat list of hashes needs to be stored.
//!
//! Leaves are hashed as `H(position | payload)`, parents as
//! `H(position | left | right)`. The root bags the peaks right to left,
//! each bagging step hashed at the position of the earlier peak.
//!
//! The leaf set (which leaves are still unspent) and the caches layered
//! over a base accumulator live here as well, storage specific
//! implementations live in the store crate.

mod backend;
mod cache;
mod index;
mod leaf_set;
mod mmr;
mod vec_backend;

pub use self::backend::Backend;
pub use self::cache::{MMRCache, MMRChanges};
pub use self::index::*;
pub use self::leaf_set::{
	LeafSetCache, LeafSetChanges, ReadableLeafSet, WriteableLeafSet,
};
pub use self::mmr::{leaf_hash, node_hash, Leaf, ReadableMMR, WriteableMMR, MMR};
pub use self::vec_backend::VecBackend;

/// Errors raised by the MMR and its backends.
#[derive(Clone, Eq, PartialEq, Debug, thiserror::Error)]
pub enum Error {
	/// Rewind target is not a leaf boundary, or lies past the end.
	#[error("invalid rewind to {0} nodes")]
	InvalidRewind(u64),
	/// Node count that doesn't describe a valid MMR
	#[error("invalid mmr size {0}")]
	InvalidSize(u64),
	/// No hash stored at that position
	#[error("hash not found at position {0}")]
	HashNotFound(u64),
	/// No payload stored for that leaf
	#[error("leaf not found at index {0}")]
	LeafNotFound(u64),
	/// Storage failure in the backend
	#[error("mmr backend error: {0}")]
	Backend(String),
}
