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

//! Snapshots of the chain state, enough to rebuild a compacted coins view
//! from scratch and check it against a trusted header.
//!
//! Beside the header, a snapshot carries every kernel, the leaf set bits,
//! the unspent outputs and, for the output and range proof MMRs, the hashes
//! compaction keeps that no unspent leaf can reproduce: peaks and siblings
//! over fully spent subtrees. Everything else is recomputed.

use std::collections::HashMap;

use croaring::Bitmap;

use crate::coins::leafset_root;
use crate::core::core::hash::Hash;
use crate::core::core::pmmr::{
	self, leaf_hash, node_hash, Error as MMRError, Index, Leaf, LeafIndex, ReadableLeafSet,
	ReadableMMR, VecBackend, WriteableMMR, MMR,
};
use crate::core::core::{committed, transaction, Header, Kernel};
use crate::core::libtx::Crypto;
use crate::core::ser::{self, Readable, Reader, Writeable, Writer};
use crate::error::Error;
use crate::types::Utxo;
use crate::util::secp::pedersen::{Commitment, RangeProof};
use mweb_store::prune_list::{build_compact_bitset, live_bitset};

/// Leaf set read straight from packed bytes.
pub struct PackedLeafSet<'a> {
	bytes: &'a [u8],
	next_leaf: LeafIndex,
}

impl<'a> PackedLeafSet<'a> {
	/// `num_leaves` bits packed MSB first in `bytes`.
	pub fn new(bytes: &'a [u8], num_leaves: u64) -> PackedLeafSet<'a> {
		PackedLeafSet {
			bytes,
			next_leaf: LeafIndex::at(num_leaves),
		}
	}
}

impl<'a> ReadableLeafSet for PackedLeafSet<'a> {
	fn next_leaf(&self) -> LeafIndex {
		self.next_leaf
	}

	fn get_byte(&self, byte_idx: u64) -> u8 {
		self.bytes.get(byte_idx as usize).cloned().unwrap_or(0)
	}
}

/// The first `num_leaves` bits of a leaf set, trailing bits cleared.
pub fn pack_leaf_set(leaf_set: &dyn ReadableLeafSet, num_leaves: u64) -> Vec<u8> {
	let mut bytes: Vec<u8> = (0..(num_leaves + 7) / 8)
		.map(|i| leaf_set.get_byte(i))
		.collect();
	let rem = num_leaves % 8;
	if rem != 0 {
		if let Some(last) = bytes.last_mut() {
			*last &= 0xffu8 << (8 - rem);
		}
	}
	bytes
}

/// Hashes of the nodes compaction keeps though no unspent leaf lies beneath
/// them, in position order.
pub fn frontier_hashes(
	num_leaves: u64,
	leaf_set: &dyn ReadableLeafSet,
	mmr: &dyn ReadableMMR,
) -> Result<Vec<Hash>, Error> {
	let num_nodes = LeafIndex::at(num_leaves).position();
	let live = live_bitset(num_leaves, leaf_set)?;
	let pruned = build_compact_bitset(num_leaves, leaf_set)?;
	let mut hashes = vec![];
	for pos in 0..num_nodes {
		if live.contains(pos as u32) || pruned.contains(pos as u32) {
			continue;
		}
		hashes.push(mmr.get_hash(pos)?);
	}
	Ok(hashes)
}

/// An MMR rebuilt from its unspent leaves and frontier hashes. Holds the
/// hash of every position compaction keeps, nothing else.
pub struct CompactedMMR {
	num_leaves: u64,
	pruned: Bitmap,
	hashes: Vec<Hash>,
	positions: HashMap<u64, usize>,
}

impl CompactedMMR {
	/// Rebuild from the leaf set, the frontier hashes in position order and
	/// the payloads of the unspent leaves by leaf index.
	pub fn rebuild(
		num_leaves: u64,
		leaf_set: &dyn ReadableLeafSet,
		frontier: &[Hash],
		leaves: &HashMap<u64, Vec<u8>>,
	) -> Result<CompactedMMR, Error> {
		let num_nodes = LeafIndex::at(num_leaves).position();
		let live = live_bitset(num_leaves, leaf_set)?;
		let pruned = build_compact_bitset(num_leaves, leaf_set)?;

		let mut mmr = CompactedMMR {
			num_leaves,
			pruned,
			hashes: vec![],
			positions: HashMap::new(),
		};
		let mut frontier = frontier.iter();
		for pos in 0..num_nodes {
			if mmr.pruned.contains(pos as u32) {
				continue;
			}
			let hash = if live.contains(pos as u32) {
				let idx = Index::at(pos);
				if idx.is_leaf() {
					let n = pmmr::num_leaves(pos);
					let data = leaves
						.get(&n)
						.ok_or_else(|| Error::InvalidState(format!("missing unspent leaf {}", n)))?;
					leaf_hash(pos, data)
				} else {
					let left = mmr.get_hash(idx.left_child().position())?;
					let right = mmr.get_hash(idx.right_child().position())?;
					node_hash(pos, &left, &right)
				}
			} else {
				*frontier
					.next()
					.ok_or_else(|| Error::InvalidState("not enough frontier hashes".to_owned()))?
			};
			mmr.positions.insert(pos, mmr.hashes.len());
			mmr.hashes.push(hash);
		}
		if frontier.next().is_some() {
			return Err(Error::InvalidState("unused frontier hashes".to_owned()));
		}
		Ok(mmr)
	}

	/// Pruned positions and the hashes of all the others, in order.
	pub fn into_parts(self) -> (Bitmap, Vec<Hash>) {
		(self.pruned, self.hashes)
	}
}

impl ReadableMMR for CompactedMMR {
	fn num_leaves(&self) -> u64 {
		self.num_leaves
	}

	fn get_hash(&self, pos: u64) -> Result<Hash, MMRError> {
		self.positions
			.get(&pos)
			.map(|i| self.hashes[*i])
			.ok_or(MMRError::HashNotFound(pos))
	}

	fn get_leaf(&self, idx: LeafIndex) -> Result<Leaf, MMRError> {
		Err(MMRError::LeafNotFound(idx.get()))
	}
}

/// Full chain state at a header.
#[derive(Debug, Clone, PartialEq)]
pub struct State {
	/// Header the state is at
	pub header: Header,
	/// Every kernel, in MMR order
	pub kernels: Vec<Kernel>,
	/// Leaf set bits over all outputs ever created, packed
	pub leafset: Vec<u8>,
	/// Frontier hashes of the output MMR
	pub output_hashes: Vec<Hash>,
	/// Frontier hashes of the range proof MMR
	pub rangeproof_hashes: Vec<Hash>,
	/// Unspent outputs, by leaf index
	pub utxos: Vec<Utxo>,
}

impl Writeable for State {
	fn write<W: Writer>(&self, writer: &mut W) -> Result<(), ser::Error> {
		self.header.write(writer)?;
		self.kernels.write(writer)?;
		writer.write_bytes(&self.leafset)?;
		self.output_hashes.write(writer)?;
		self.rangeproof_hashes.write(writer)?;
		self.utxos.write(writer)
	}
}

impl Readable for State {
	fn read<R: Reader>(reader: &mut R) -> Result<State, ser::Error> {
		Ok(State {
			header: Header::read(reader)?,
			kernels: Vec::read(reader)?,
			leafset: reader.read_bytes_len_prefix()?,
			output_hashes: Vec::read(reader)?,
			rangeproof_hashes: Vec::read(reader)?,
			utxos: Vec::read(reader)?,
		})
	}
}

impl State {
	/// The packed leaf set as a leaf set.
	pub fn leaf_set(&self) -> PackedLeafSet<'_> {
		PackedLeafSet::new(&self.leafset, self.header.num_txos)
	}

	/// Payloads of the unspent output MMR leaves, by leaf index.
	pub fn output_leaves(&self) -> Result<HashMap<u64, Vec<u8>>, Error> {
		let mut leaves = HashMap::with_capacity(self.utxos.len());
		for utxo in &self.utxos {
			leaves.insert(utxo.leaf_idx.get(), utxo.output.mmr_data()?);
		}
		Ok(leaves)
	}

	/// Payloads of the unspent range proof MMR leaves, by leaf index.
	pub fn rangeproof_leaves(&self) -> Result<HashMap<u64, Vec<u8>>, Error> {
		let mut leaves = HashMap::with_capacity(self.utxos.len());
		for utxo in &self.utxos {
			leaves.insert(utxo.leaf_idx.get(), utxo.output.proof_data()?);
		}
		Ok(leaves)
	}

	/// Rebuild the output and range proof MMRs.
	pub fn rebuild_mmrs(&self) -> Result<(CompactedMMR, CompactedMMR), Error> {
		let num_txos = self.header.num_txos;
		let leaf_set = self.leaf_set();
		let outputs =
			CompactedMMR::rebuild(num_txos, &leaf_set, &self.output_hashes, &self.output_leaves()?)?;
		let rangeproofs = CompactedMMR::rebuild(
			num_txos,
			&leaf_set,
			&self.rangeproof_hashes,
			&self.rangeproof_leaves()?,
		)?;
		Ok((outputs, rangeproofs))
	}

	/// Full validation against the header: MMR roots and sizes, the leaf
	/// set, kernel signatures, range proofs and the kernel sums over the
	/// whole UTXO set.
	pub fn validate(&self, crypto: &Crypto) -> Result<(), Error> {
		let header = &self.header;
		let mismatch = |what: &str| Err(Error::MmrMismatch(format!("state {}", what)));

		if self.kernels.len() as u64 != header.num_kernels {
			return mismatch("kernel count");
		}
		let mut kernel_mmr = MMR::new(VecBackend::new());
		for kernel in &self.kernels {
			kernel_mmr.add(ser::ser_vec(kernel)?)?;
		}
		if kernel_mmr.root()? != header.kernel_root {
			return mismatch("kernel root");
		}

		if self.leafset.len() as u64 != (header.num_txos + 7) / 8 {
			return Err(Error::InvalidState(format!(
				"{} leaf set bytes for {} outputs",
				self.leafset.len(),
				header.num_txos
			)));
		}
		let leaf_idxs: Vec<LeafIndex> = self.utxos.iter().map(|u| u.leaf_idx).collect();
		if leaf_idxs.windows(2).any(|w| w[0] >= w[1]) || leaf_idxs != self.leaf_set().leaves() {
			return Err(Error::InvalidState(
				"unspent outputs don't match the leaf set".to_owned(),
			));
		}

		let (outputs, rangeproofs) = self.rebuild_mmrs()?;
		if leafset_root(&self.leaf_set(), header.num_txos) != header.leafset_root {
			return mismatch("leafset root");
		}
		if outputs.root()? != header.output_root {
			return mismatch("output root");
		}
		if rangeproofs.root()? != header.rangeproof_root {
			return mismatch("rangeproof root");
		}

		Kernel::batch_sig_verify(crypto, &self.kernels)?;
		let proofs: Vec<(Commitment, RangeProof)> = self
			.utxos
			.iter()
			.map(|u| (u.output.commit, u.output.proof))
			.collect();
		if !crypto.verify_range_proofs(&proofs) {
			return Err(Error::Transaction(transaction::Error::RangeProof));
		}

		let commits: Vec<Commitment> = self.utxos.iter().map(|u| u.output.commit).collect();
		committed::validate_state(crypto, &commits, &self.kernels, &header.kernel_offset)?;
		debug!(
			"state: valid at {}, {} kernels, {} utxos",
			header.height,
			self.kernels.len(),
			self.utxos.len()
		);
		Ok(())
	}
}
