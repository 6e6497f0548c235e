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

use crate::core::hash::{Hash, HashWriter, ZERO_HASH};
use crate::core::pmmr::{self, Backend, Error, Index, LeafIndex, MMRChanges};
use crate::ser::Writer;

/// A leaf of the MMR: its index, payload and the payload hash committed to
/// at that position. The hash is computed once, on construction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Leaf {
	idx: LeafIndex,
	hash: Hash,
	data: Vec<u8>,
}

impl Leaf {
	/// Leaf holding `data` at `idx`.
	pub fn create(idx: LeafIndex, data: Vec<u8>) -> Leaf {
		let hash = leaf_hash(idx.position(), &data);
		Leaf { idx, hash, data }
	}

	/// Reassemble a leaf read back from storage.
	pub fn from_parts(idx: LeafIndex, hash: Hash, data: Vec<u8>) -> Leaf {
		Leaf { idx, hash, data }
	}

	/// Leaf index
	pub fn index(&self) -> LeafIndex {
		self.idx
	}

	/// Hash committed to by the MMR
	pub fn hash(&self) -> Hash {
		self.hash
	}

	/// Payload
	pub fn data(&self) -> &[u8] {
		&self.data
	}

	/// Take the payload
	pub fn into_data(self) -> Vec<u8> {
		self.data
	}
}

/// `H(position | data)`
pub fn leaf_hash(pos: u64, data: &[u8]) -> Hash {
	let mut hasher = HashWriter::default();
	// writing into a HashWriter never fails
	let _ = hasher.write_u64(pos);
	let _ = hasher.write_fixed_bytes(data);
	hasher.into_hash()
}

/// `H(position | left | right)`
pub fn node_hash(pos: u64, left: &Hash, right: &Hash) -> Hash {
	let mut hasher = HashWriter::default();
	let _ = hasher.write_u64(pos);
	let _ = hasher.write_fixed_bytes(left);
	let _ = hasher.write_fixed_bytes(right);
	hasher.into_hash()
}

/// Hashes of the parents completed by appending the leaf `idx`, in position
/// order. Left children always precede the new leaf so `get_hash` is only
/// ever asked for nodes that already exist.
pub(crate) fn parent_hashes<F>(idx: LeafIndex, leaf_hash: Hash, get_hash: F) -> Result<Vec<Hash>, Error>
where
	F: Fn(u64) -> Result<Hash, Error>,
{
	let mut hashes = vec![];
	let mut right = leaf_hash;
	let mut next = idx.index().next();
	while !next.is_leaf() {
		let left = get_hash(next.left_child().position())?;
		right = node_hash(next.position(), &left, &right);
		hashes.push(right);
		next = next.next();
	}
	Ok(hashes)
}

/// Read access to an MMR.
pub trait ReadableMMR {
	/// Number of leaves.
	fn num_leaves(&self) -> u64;

	/// Hash of the node at `pos`.
	fn get_hash(&self, pos: u64) -> Result<Hash, Error>;

	/// Leaf (with payload) at `idx`.
	fn get_leaf(&self, idx: LeafIndex) -> Result<Leaf, Error>;

	/// Number of nodes, the position the next leaf will be written at.
	fn num_nodes(&self) -> u64 {
		LeafIndex::at(self.num_leaves()).position()
	}

	/// Index the next leaf will get.
	fn next_leaf(&self) -> LeafIndex {
		LeafIndex::at(self.num_leaves())
	}

	/// Bag the peaks right to left, each bagging parent hashed at the
	/// position of the earlier peak. Zero hash when empty.
	fn root(&self) -> Result<Hash, Error> {
		let size = self.num_nodes();
		if size == 0 {
			return Ok(ZERO_HASH);
		}
		let peaks = pmmr::peaks(size).ok_or(Error::InvalidSize(size))?;
		let mut root: Option<Hash> = None;
		for peak in peaks.iter().rev() {
			let peak_hash = self.get_hash(*peak)?;
			root = Some(match root {
				None => peak_hash,
				Some(rhash) => node_hash(*peak, &peak_hash, &rhash),
			});
		}
		root.ok_or(Error::InvalidSize(size))
	}
}

/// Write access to an MMR.
pub trait WriteableMMR: ReadableMMR {
	/// Append a leaf holding `data`, along with any parents it completes.
	fn add(&mut self, data: Vec<u8>) -> Result<LeafIndex, Error>;

	/// Truncate to `num_nodes` nodes. `num_nodes` must be the position of a
	/// leaf, anything else would leave a half built parent behind.
	fn rewind(&mut self, num_nodes: u64) -> Result<(), Error>;

	/// Truncate to `num_leaves` leaves.
	fn rewind_leaves(&mut self, num_leaves: u64) -> Result<(), Error> {
		self.rewind(LeafIndex::at(num_leaves).position())
	}

	/// Replay the changes recorded by a cache layered over this MMR.
	fn apply(&mut self, changes: MMRChanges) -> Result<(), Error> {
		self.rewind_leaves(changes.first_leaf.get())?;
		for leaf in changes.leaves {
			self.add(leaf.into_data())?;
		}
		Ok(())
	}
}

pub(crate) fn check_rewind(current_nodes: u64, num_nodes: u64) -> Result<(), Error> {
	if num_nodes > current_nodes || !Index::at(num_nodes).is_leaf() {
		return Err(Error::InvalidRewind(num_nodes));
	}
	Ok(())
}

/// MMR over a storage backend.
pub struct MMR<B: Backend> {
	backend: B,
}

impl<B: Backend> MMR<B> {
	/// Build an MMR over the provided backend, picking up whatever it
	/// already holds.
	pub fn new(backend: B) -> MMR<B> {
		MMR { backend }
	}

	/// The underlying backend.
	pub fn backend(&self) -> &B {
		&self.backend
	}

	/// Mutable access to the underlying backend.
	pub fn backend_mut(&mut self) -> &mut B {
		&mut self.backend
	}

	/// Append a leaf known only by its hash, its payload having been pruned
	/// away. Parents are computed as for a regular leaf.
	pub fn add_pruned_leaf(&mut self, hash: Hash) -> Result<LeafIndex, Error> {
		let idx = self.next_leaf();
		let parents = parent_hashes(idx, hash, |pos| self.backend.get_hash(pos))?;
		self.backend.append_hash(hash)?;
		for h in parents {
			self.backend.append_hash(h)?;
		}
		Ok(idx)
	}
}

impl<B: Backend> ReadableMMR for MMR<B> {
	fn num_leaves(&self) -> u64 {
		pmmr::num_leaves(self.backend.num_nodes())
	}

	fn get_hash(&self, pos: u64) -> Result<Hash, Error> {
		if pos >= self.backend.num_nodes() {
			return Err(Error::HashNotFound(pos));
		}
		self.backend.get_hash(pos)
	}

	fn get_leaf(&self, idx: LeafIndex) -> Result<Leaf, Error> {
		if idx.get() >= self.num_leaves() {
			return Err(Error::LeafNotFound(idx.get()));
		}
		self.backend.get_leaf(idx)
	}
}

impl<B: Backend> WriteableMMR for MMR<B> {
	fn add(&mut self, data: Vec<u8>) -> Result<LeafIndex, Error> {
		let idx = self.next_leaf();
		let leaf = Leaf::create(idx, data);
		let parents = parent_hashes(idx, leaf.hash(), |pos| self.backend.get_hash(pos))?;

		self.backend.append_leaf(&leaf)?;
		for h in parents {
			self.backend.append_hash(h)?;
		}
		trace!("mmr: added leaf {:?} ({})", idx, leaf.hash());
		Ok(idx)
	}

	fn rewind(&mut self, num_nodes: u64) -> Result<(), Error> {
		check_rewind(self.num_nodes(), num_nodes)?;
		self.backend.rewind(num_nodes)
	}
}
