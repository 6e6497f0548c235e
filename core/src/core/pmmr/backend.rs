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

use crate::core::hash::Hash;
use crate::core::pmmr::{Error, Leaf, LeafIndex};

/// Storage backend for the MMR, indexed by position. Hashes are appended
/// strictly in position order; leaf payloads are kept separately, keyed by
/// the leaf hash, so a backend may hold a leaf's hash without its payload
/// (leaves restored from a snapshot after their data was pruned).
pub trait Backend {
	/// Append the hash of a leaf and store its payload.
	fn append_leaf(&mut self, leaf: &Leaf) -> Result<(), Error>;

	/// Append the hash of an interior node, or of a leaf whose payload is
	/// not available.
	fn append_hash(&mut self, hash: Hash) -> Result<(), Error>;

	/// Rewind the backend state to `num_nodes` nodes, as if all append
	/// operations after that had been canceled.
	fn rewind(&mut self, num_nodes: u64) -> Result<(), Error>;

	/// Number of nodes (hashes) currently held.
	fn num_nodes(&self) -> u64;

	/// Get a Hash by position.
	fn get_hash(&self, pos: u64) -> Result<Hash, Error>;

	/// Get the leaf, including its payload.
	fn get_leaf(&self, idx: LeafIndex) -> Result<Leaf, Error>;
}
