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

//! In-memory MMR layered over a read-only base. Everything from
//! `first_leaf` onwards is held by the cache; below it reads go straight to
//! the base, which is never touched.

use crate::core::hash::Hash;
use crate::core::pmmr::mmr::{check_rewind, parent_hashes};
use crate::core::pmmr::{self, Error, Leaf, LeafIndex, ReadableMMR, WriteableMMR};

/// What a cache did to its base: drop every leaf from `first_leaf` on, then
/// append `leaves` in order.
#[derive(Clone, Debug, Default)]
pub struct MMRChanges {
	/// First leaf of the base that is replaced
	pub first_leaf: LeafIndex,
	/// Leaves appended from there
	pub leaves: Vec<Leaf>,
}

/// Copy-on-write MMR over a base.
pub struct MMRCache<'a> {
	base: &'a dyn ReadableMMR,
	first_leaf: LeafIndex,
	leaves: Vec<Leaf>,
	// every node from first_leaf.position() on
	hashes: Vec<Hash>,
}

impl<'a> MMRCache<'a> {
	/// Empty cache over `base`.
	pub fn new(base: &'a dyn ReadableMMR) -> MMRCache<'a> {
		MMRCache {
			base,
			first_leaf: base.next_leaf(),
			leaves: vec![],
			hashes: vec![],
		}
	}

	/// Changes to replay on the base.
	pub fn into_changes(self) -> MMRChanges {
		MMRChanges {
			first_leaf: self.first_leaf,
			leaves: self.leaves,
		}
	}
}

impl<'a> ReadableMMR for MMRCache<'a> {
	fn num_leaves(&self) -> u64 {
		self.first_leaf.get() + self.leaves.len() as u64
	}

	fn get_hash(&self, pos: u64) -> Result<Hash, Error> {
		let first_pos = self.first_leaf.position();
		if pos < first_pos {
			self.base.get_hash(pos)
		} else {
			self.hashes
				.get((pos - first_pos) as usize)
				.cloned()
				.ok_or(Error::HashNotFound(pos))
		}
	}

	fn get_leaf(&self, idx: LeafIndex) -> Result<Leaf, Error> {
		if idx < self.first_leaf {
			self.base.get_leaf(idx)
		} else {
			self.leaves
				.get((idx.get() - self.first_leaf.get()) as usize)
				.cloned()
				.ok_or(Error::LeafNotFound(idx.get()))
		}
	}
}

impl<'a> WriteableMMR for MMRCache<'a> {
	fn add(&mut self, data: Vec<u8>) -> Result<LeafIndex, Error> {
		let idx = self.next_leaf();
		let leaf = Leaf::create(idx, data);
		let parents = parent_hashes(idx, leaf.hash(), |pos| self.get_hash(pos))?;

		self.hashes.push(leaf.hash());
		self.hashes.extend(parents);
		self.leaves.push(leaf);
		Ok(idx)
	}

	fn rewind(&mut self, num_nodes: u64) -> Result<(), Error> {
		check_rewind(self.num_nodes(), num_nodes)?;
		let num_leaves = pmmr::num_leaves(num_nodes);
		if num_leaves < self.first_leaf.get() {
			self.first_leaf = LeafIndex::at(num_leaves);
			self.leaves.clear();
			self.hashes.clear();
		} else {
			self.leaves
				.truncate((num_leaves - self.first_leaf.get()) as usize);
			self.hashes
				.truncate((num_nodes - self.first_leaf.position()) as usize);
		}
		Ok(())
	}
}
