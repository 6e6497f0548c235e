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

use std::collections::HashMap;
use std::convert::TryFrom;

use crate::core::hash::Hash;
use crate::core::pmmr::{Backend, Error, Leaf, LeafIndex};

/// Simple/minimal/naive MMR backend implementation backed by Vec<Hash>,
/// leaf payloads in a HashMap keyed by leaf hash.
#[derive(Clone, Debug, Default)]
pub struct VecBackend {
	/// Vec of hashes for the MMR (both leaves and parents).
	pub hashes: Vec<Hash>,
	/// Leaf payloads by leaf hash.
	pub data: HashMap<Hash, Vec<u8>>,
}

impl Backend for VecBackend {
	fn append_leaf(&mut self, leaf: &Leaf) -> Result<(), Error> {
		self.hashes.push(leaf.hash());
		self.data.insert(leaf.hash(), leaf.data().to_vec());
		Ok(())
	}

	fn append_hash(&mut self, hash: Hash) -> Result<(), Error> {
		self.hashes.push(hash);
		Ok(())
	}

	fn rewind(&mut self, num_nodes: u64) -> Result<(), Error> {
		let len = usize::try_from(num_nodes).map_err(|_| Error::InvalidRewind(num_nodes))?;
		self.hashes.truncate(len);
		Ok(())
	}

	fn num_nodes(&self) -> u64 {
		self.hashes.len() as u64
	}

	fn get_hash(&self, pos: u64) -> Result<Hash, Error> {
		usize::try_from(pos)
			.ok()
			.and_then(|idx| self.hashes.get(idx).cloned())
			.ok_or(Error::HashNotFound(pos))
	}

	fn get_leaf(&self, idx: LeafIndex) -> Result<Leaf, Error> {
		let hash = self
			.get_hash(idx.position())
			.map_err(|_| Error::LeafNotFound(idx.get()))?;
		let data = self
			.data
			.get(&hash)
			.ok_or(Error::LeafNotFound(idx.get()))?;
		Ok(Leaf::from_parts(idx, hash, data.clone()))
	}
}

impl VecBackend {
	/// Instantiates a new empty vec backend.
	pub fn new() -> VecBackend {
		VecBackend::default()
	}

	/// Size of this vec backend in hashes.
	pub fn size(&self) -> u64 {
		self.hashes.len() as u64
	}
}
