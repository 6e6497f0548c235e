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

//! In-memory coins view layered over another one.

use std::collections::HashMap;

use crate::coins::{apply_actions, check_roots, CoinsView, CoinsViewChanges, UtxoAction};
use crate::core::core::pmmr::{
	LeafIndex, LeafSetCache, MMRCache, ReadableLeafSet, ReadableMMR, WriteableLeafSet,
	WriteableMMR,
};
use crate::core::core::{Block, Header, TxBody};
use crate::core::ser;
use crate::error::Error;
use crate::types::{BlockUndo, Utxo};
use crate::util::secp::pedersen::Commitment;

type CommitKey = [u8; 33];

/// Copy-on-write coins view. Reads fall through to the base for whatever
/// the cache doesn't hold, writes only ever touch the cache.
///
/// A cache an update failed on is left half applied, it must be dropped
/// rather than flushed.
pub struct CoinsViewCache<'a> {
	base: &'a dyn CoinsView,
	header: Header,
	leaf_set: LeafSetCache<'a>,
	kernel_mmr: MMRCache<'a>,
	output_mmr: MMRCache<'a>,
	rangeproof_mmr: MMRCache<'a>,
	// actions per commitment, and the order commitments were first touched
	actions: HashMap<CommitKey, Vec<UtxoAction>>,
	touched: Vec<Commitment>,
}

impl<'a> CoinsViewCache<'a> {
	/// Empty cache over `base`.
	pub fn new(base: &'a dyn CoinsView) -> CoinsViewCache<'a> {
		CoinsViewCache {
			base,
			header: base.best_header(),
			leaf_set: LeafSetCache::new(base.leaf_set()),
			kernel_mmr: MMRCache::new(base.kernel_mmr()),
			output_mmr: MMRCache::new(base.output_mmr()),
			rangeproof_mmr: MMRCache::new(base.rangeproof_mmr()),
			actions: HashMap::new(),
			touched: vec![],
		}
	}

	fn record(&mut self, commit: Commitment, action: UtxoAction) {
		let touched = &mut self.touched;
		self.actions
			.entry(commit.0)
			.or_insert_with(|| {
				touched.push(commit);
				vec![]
			})
			.push(action);
	}

	/// Spend the most recent live output with this commitment.
	fn spend(&mut self, commit: &Commitment) -> Result<Utxo, Error> {
		let utxo = self
			.get_utxos(commit)?
			.pop()
			.ok_or(Error::UtxoMissing(*commit))?;
		self.leaf_set.remove(utxo.leaf_idx);
		self.record(*commit, UtxoAction::Spend);
		Ok(utxo)
	}

	fn apply_body(
		&mut self,
		body: &TxBody,
		height: u64,
	) -> Result<(Vec<Utxo>, Vec<Commitment>), Error> {
		for kernel in body.kernels() {
			self.kernel_mmr.add(ser::ser_vec(kernel)?)?;
		}

		let mut spent = Vec::with_capacity(body.inputs().len());
		for input in body.inputs() {
			spent.push(self.spend(&input.commit)?);
		}

		let mut added = Vec::with_capacity(body.outputs().len());
		for output in body.outputs() {
			let leaf_idx = self.output_mmr.add(output.mmr_data()?)?;
			let proof_idx = self.rangeproof_mmr.add(output.proof_data()?)?;
			if leaf_idx != proof_idx {
				return Err(Error::MmrMismatch(format!(
					"output at {:?}, proof at {:?}",
					leaf_idx, proof_idx
				)));
			}
			self.leaf_set.add(leaf_idx);
			self.record(
				output.commit,
				UtxoAction::Add(Utxo {
					height,
					leaf_idx,
					output: *output,
				}),
			);
			added.push(output.commit);
		}
		Ok((spent, added))
	}

	/// Apply a transaction body on top of the best header: kernels are
	/// appended, each input spends the most recent live output with its
	/// commitment, each output is appended to the output and range proof
	/// MMRs at the same leaf and marked unspent. Returns what was spent and
	/// the commitments added.
	pub fn apply_updates(&mut self, body: &TxBody) -> Result<(Vec<Utxo>, Vec<Commitment>), Error> {
		let height = self.header.height + 1;
		self.apply_body(body, height)
	}

	/// Apply a block and check the result against its header. The returned
	/// undo data takes the block back off.
	pub fn apply_block(&mut self, block: &Block) -> Result<BlockUndo, Error> {
		let previous_header = self.header.clone();
		let (coins_spent, coins_added) = self.apply_body(&block.body, block.height())?;
		check_roots(self, &block.header)?;
		self.header = block.header.clone();
		Ok(BlockUndo {
			previous_header,
			coins_spent,
			coins_added,
		})
	}

	/// Take the block `undo` was recorded for back off: its outputs are
	/// spent, the outputs it spent come back, and the leaf set and MMRs are
	/// rewound to the previous header.
	pub fn undo_block(&mut self, undo: &BlockUndo) -> Result<(), Error> {
		for commit in undo.coins_added.iter().rev() {
			self.spend(commit)?;
		}
		for utxo in undo.coins_spent.iter().rev() {
			self.record(utxo.commitment(), UtxoAction::Add(utxo.clone()));
		}

		let prev = &undo.previous_header;
		let restored: Vec<LeafIndex> = undo.coins_spent.iter().map(|u| u.leaf_idx).collect();
		self.leaf_set.rewind(prev.num_txos, &restored);
		self.kernel_mmr.rewind_leaves(prev.num_kernels)?;
		self.output_mmr.rewind_leaves(prev.num_txos)?;
		self.rangeproof_mmr.rewind_leaves(prev.num_txos)?;

		check_roots(self, prev)?;
		self.header = prev.clone();
		Ok(())
	}

	/// Push the changes of a cache layered over this one into it.
	pub fn flush(&mut self, changes: CoinsViewChanges) -> Result<(), Error> {
		self.kernel_mmr.apply(changes.kernels)?;
		self.output_mmr.apply(changes.outputs)?;
		self.rangeproof_mmr.apply(changes.rangeproofs)?;
		self.leaf_set.apply(&changes.leaf_set);
		for (commit, actions) in changes.actions {
			for action in actions {
				self.record(commit, action);
			}
		}
		self.header = changes.header;
		Ok(())
	}

	/// What this cache did to its base.
	pub fn into_changes(self) -> CoinsViewChanges {
		let mut actions = self.actions;
		let ordered = self
			.touched
			.into_iter()
			.map(|commit| {
				let acts = actions.remove(&commit.0).unwrap_or_default();
				(commit, acts)
			})
			.collect();
		CoinsViewChanges {
			header: self.header,
			leaf_set: self.leaf_set.into_changes(),
			kernels: self.kernel_mmr.into_changes(),
			outputs: self.output_mmr.into_changes(),
			rangeproofs: self.rangeproof_mmr.into_changes(),
			actions: ordered,
		}
	}
}

impl<'a> CoinsView for CoinsViewCache<'a> {
	fn best_header(&self) -> Header {
		self.header.clone()
	}

	fn get_utxos(&self, commit: &Commitment) -> Result<Vec<Utxo>, Error> {
		let mut utxos = self.base.get_utxos(commit)?;
		if let Some(actions) = self.actions.get(&commit.0) {
			apply_actions(&mut utxos, commit, actions)?;
		}
		Ok(utxos)
	}

	fn leaf_set(&self) -> &dyn ReadableLeafSet {
		&self.leaf_set
	}

	fn kernel_mmr(&self) -> &dyn ReadableMMR {
		&self.kernel_mmr
	}

	fn output_mmr(&self) -> &dyn ReadableMMR {
		&self.output_mmr
	}

	fn rangeproof_mmr(&self) -> &dyn ReadableMMR {
		&self.rangeproof_mmr
	}
}
