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

//! Coins views: the UTXO set along with the leaf set and the kernel,
//! output and range proof MMRs committing to it.
//!
//! Views stack. `CoinsViewDB` is the persisted view at the bottom, any
//! number of `CoinsViewCache` can be layered over it, each recording what
//! it does without touching its base. A cache's changes are pushed down
//! with `flush`, or dropped along with the cache.

mod cache;
mod db;

pub use self::cache::CoinsViewCache;
pub use self::db::CoinsViewDB;

use crate::core::core::hash::{Hash, Hashed, ZERO_HASH};
use crate::core::core::pmmr::{LeafSetChanges, MMRChanges, ReadableLeafSet, ReadableMMR};
use crate::core::core::{transaction, Block, Header, Transaction};
use crate::core::libtx::Crypto;
use crate::error::Error;
use crate::keychain::BlindingFactor;
use crate::types::Utxo;
use crate::util::secp::pedersen::Commitment;

/// Read access to a UTXO set and the accumulators committing to it.
pub trait CoinsView {
	/// Header of the last block applied, the default header when none was.
	fn best_header(&self) -> Header;

	/// Live outputs with this commitment, most recent last.
	fn get_utxos(&self, commit: &Commitment) -> Result<Vec<Utxo>, Error>;

	/// Which output MMR leaves are unspent.
	fn leaf_set(&self) -> &dyn ReadableLeafSet;

	/// Kernel MMR
	fn kernel_mmr(&self) -> &dyn ReadableMMR;

	/// Output MMR
	fn output_mmr(&self) -> &dyn ReadableMMR;

	/// Range proof MMR, leaf for leaf alongside the output MMR.
	fn rangeproof_mmr(&self) -> &dyn ReadableMMR;
}

/// A change to the outputs sharing a commitment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UtxoAction {
	/// A new output, becoming the most recent one.
	Add(Utxo),
	/// The most recent output is spent.
	Spend,
}

/// Everything a cache did to its base.
#[derive(Debug, Clone)]
pub struct CoinsViewChanges {
	/// New best header
	pub header: Header,
	/// Leaf set bytes and size
	pub leaf_set: LeafSetChanges,
	/// Kernel MMR
	pub kernels: MMRChanges,
	/// Output MMR
	pub outputs: MMRChanges,
	/// Range proof MMR
	pub rangeproofs: MMRChanges,
	/// Actions per commitment, in the order they were taken
	pub actions: Vec<(Commitment, Vec<UtxoAction>)>,
}

/// Replay `actions` over the outputs with commitment `commit`.
pub(crate) fn apply_actions(
	utxos: &mut Vec<Utxo>,
	commit: &Commitment,
	actions: &[UtxoAction],
) -> Result<(), Error> {
	for action in actions {
		match action {
			UtxoAction::Add(utxo) => utxos.push(utxo.clone()),
			UtxoAction::Spend => {
				utxos.pop().ok_or(Error::UtxoMissing(*commit))?;
			}
		}
	}
	Ok(())
}

/// Root of the leaf set over the `num_txos` outputs created so far. Zero
/// hash while there are none, like the MMR roots.
pub fn leafset_root(leaf_set: &dyn ReadableLeafSet, num_txos: u64) -> Hash {
	if num_txos == 0 {
		ZERO_HASH
	} else {
		leaf_set.root(num_txos)
	}
}

/// Header committing to the current state of `view`.
pub fn header_for(
	view: &dyn CoinsView,
	height: u64,
	kernel_offset: BlindingFactor,
	owner_offset: BlindingFactor,
) -> Result<Header, Error> {
	Ok(Header {
		height,
		output_root: view.output_mmr().root()?,
		rangeproof_root: view.rangeproof_mmr().root()?,
		kernel_root: view.kernel_mmr().root()?,
		leafset_root: leafset_root(view.leaf_set(), view.output_mmr().num_leaves()),
		kernel_offset,
		owner_offset,
		num_txos: view.output_mmr().num_leaves(),
		num_kernels: view.kernel_mmr().num_leaves(),
	})
}

/// Check the sizes and roots `header` commits to against `view`.
pub fn check_roots(view: &dyn CoinsView, header: &Header) -> Result<(), Error> {
	let mismatch = |what: &str| {
		Err(Error::MmrMismatch(format!(
			"{} doesn't match header at {}",
			what, header.height
		)))
	};
	if view.kernel_mmr().num_leaves() != header.num_kernels {
		return mismatch("kernel count");
	}
	if view.output_mmr().num_leaves() != header.num_txos
		|| view.rangeproof_mmr().num_leaves() != header.num_txos
	{
		return mismatch("output count");
	}
	if view.kernel_mmr().root()? != header.kernel_root {
		return mismatch("kernel root");
	}
	if view.output_mmr().root()? != header.output_root {
		return mismatch("output root");
	}
	if view.rangeproof_mmr().root()? != header.rangeproof_root {
		return mismatch("rangeproof root");
	}
	if leafset_root(view.leaf_set(), header.num_txos) != header.leafset_root {
		return mismatch("leafset root");
	}
	Ok(())
}

/// Build the block that would follow the best header of `view` with
/// `txs`. The transactions are aggregated and applied to a throwaway cache
/// to find the roots, `view` is left untouched.
pub fn build_next_block(
	view: &dyn CoinsView,
	crypto: &Crypto,
	txs: Vec<Transaction>,
) -> Result<Block, Error> {
	let prev = view.best_header();
	let tx = transaction::aggregate(crypto, txs)?;

	let mut cache = CoinsViewCache::new(view);
	cache.apply_updates(&tx.body)?;

	let kernel_offset =
		crypto.add_blinding_factors(&[prev.kernel_offset.clone(), tx.kernel_offset.clone()], &[])?;
	let header = header_for(&cache, prev.height + 1, kernel_offset, tx.owner_offset.clone())?;
	debug!(
		"build_next_block: {} at {}, {} kernels",
		header.hash(),
		header.height,
		tx.body.kernels().len()
	);
	Ok(Block::new(header, tx.body))
}
