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

//! Facade over the coins view: applies and takes back blocks handed over by
//! the base chain, builds blocks, snapshots and restores the state.

use std::path::Path;
use std::sync::Arc;

use crate::coins::{self, CoinsView, CoinsViewCache, CoinsViewDB};
use crate::core::core::hash::{Hash, Hashed};
use crate::core::core::{Block, Header, Transaction};
use crate::core::libtx::Crypto;
use crate::error::Error;
use crate::state::State;
use crate::store::UndoStore;
use crate::types::{ChainConfig, HeaderProvider, Utxo};
use crate::util::locks::{lock_both, Write};
use crate::util::secp::pedersen::Commitment;
use crate::util::RwLock;
use mweb_store::{self as store, Store};

const DB_ENV: &str = "lmdb";
const DB_NAME: &str = "mweb";
const COINS_SUBDIR: &str = "coins";

/// The extension block state, along with what it takes to move it forward
/// and back one block at a time.
pub struct Chain {
	config: ChainConfig,
	crypto: Crypto,
	db: Arc<Store>,
	headers: Arc<dyn HeaderProvider>,
	view: RwLock<CoinsViewDB>,
	undo: RwLock<UndoStore>,
}

impl Chain {
	/// Open the state under `config.db_root`, creating an empty one if there
	/// is none. Files left ahead of the last committed block by a crash are
	/// trimmed back.
	pub fn init(
		config: ChainConfig,
		crypto: Crypto,
		headers: Arc<dyn HeaderProvider>,
	) -> Result<Chain, Error> {
		let db = Arc::new(Store::new(
			&config.db_root,
			Some(DB_ENV),
			Some(DB_NAME),
			None,
		)?);
		let view = CoinsViewDB::open(Path::new(&config.db_root).join(COINS_SUBDIR), db.clone())?;
		let head = view.best_header();
		info!(
			"chain: init: {} at {}, {} txos, {} kernels",
			head.hash(),
			head.height,
			head.num_txos,
			head.num_kernels
		);

		Ok(Chain {
			undo: RwLock::new(UndoStore::new(db.clone())),
			view: RwLock::new(view),
			config,
			crypto,
			db,
			headers,
		})
	}

	/// Header of the last block applied.
	pub fn head_header(&self) -> Header {
		self.view.read().best_header()
	}

	/// Live outputs with this commitment, most recent last.
	pub fn get_utxos(&self, commit: &Commitment) -> Result<Vec<Utxo>, Error> {
		self.view.read().get_utxos(commit)
	}

	/// Fetch the block with hash `hash` from the header provider and apply it.
	pub fn connect_block(&self, hash: &Hash) -> Result<Header, Error> {
		let block = self
			.headers
			.get_block(hash)
			.ok_or_else(|| Error::Unfit(format!("block {} unknown", hash)))?;
		self.process_block(&block)
	}

	/// Validate `block` and apply it on top of the state. The block must be
	/// the next one on the header chain the base chain trusts.
	pub fn process_block(&self, block: &Block) -> Result<Header, Error> {
		let hash = block.hash();
		let (header, pegins, pegouts) = self
			.headers
			.get_header_and_pegs(&hash)
			.ok_or_else(|| Error::Unfit(format!("header {} unknown", hash)))?;
		if header != block.header {
			return Err(Error::Unfit(format!("header {} differs from block", hash)));
		}

		let mut guard = lock_both(Write(&self.view), Write(&self.undo));
		let prev = guard.first.best_header();
		if block.height() != prev.height + 1 {
			return Err(Error::Unfit(format!(
				"block {} at {}, head at {}",
				hash,
				block.height(),
				prev.height
			)));
		}
		debug!(
			"chain: process_block: {} at {}, {} in / {} out / {} kern",
			hash,
			block.height(),
			block.inputs().len(),
			block.outputs().len(),
			block.kernels().len()
		);

		block.validate(&self.crypto, &prev.kernel_offset, &pegins, &pegouts)?;

		let (changes, undo) = {
			let mut cache = CoinsViewCache::new(&*guard.first);
			let undo = cache.apply_block(block)?;
			(cache.into_changes(), undo)
		};

		let batch = self.db.batch()?;
		if let Err(e) = guard.first.flush(&batch, changes) {
			guard.first.discard();
			return Err(e);
		}
		if let Err(e) = guard.second.save_undo(&batch, &hash, &undo) {
			guard.first.discard();
			return Err(e.into());
		}
		guard.first.commit(batch)?;

		let interval = self.config.compaction_interval;
		if interval > 0 && block.height() % interval == 0 {
			let (view, undo) = (&mut guard.first, &guard.second);
			// the block is committed whatever happens here
			if let Err(e) = Chain::compact_locked(&self.db, view, undo) {
				error!(
					"chain: process_block: {} accepted, compaction failed: {}",
					hash, e
				);
			}
		}

		info!(
			"chain: process_block: {} at {} accepted, {} txos",
			hash, block.height(), block.header.num_txos
		);
		Ok(block.header.clone())
	}

	/// Take the last block applied back off the state. Returns the new head.
	pub fn undo_block(&self) -> Result<Header, Error> {
		let mut guard = lock_both(Write(&self.view), Write(&self.undo));
		let head = guard.first.best_header();
		if head == Header::default() {
			return Err(Error::InvalidState("no block to undo".to_owned()));
		}
		let hash = head.hash();
		let undo = match guard.second.get_undo(&hash) {
			Ok(undo) => undo,
			Err(store::Error::NotFoundErr(_)) => {
				return Err(Error::InvalidState(format!(
					"no undo data for {} at {}, compacted away",
					hash, head.height
				)));
			}
			Err(e) => return Err(e.into()),
		};

		let changes = {
			let mut cache = CoinsViewCache::new(&*guard.first);
			cache.undo_block(&undo)?;
			cache.into_changes()
		};

		let batch = self.db.batch()?;
		if let Err(e) = guard.first.flush(&batch, changes) {
			guard.first.discard();
			return Err(e);
		}
		if let Err(e) = guard.second.delete_undo(&batch, &hash) {
			guard.first.discard();
			return Err(e.into());
		}
		guard.first.commit(batch)?;

		let prev = undo.previous_header;
		info!(
			"chain: undo_block: {} at {} undone, head now {} at {}",
			hash,
			head.height,
			prev.hash(),
			prev.height
		);
		Ok(prev)
	}

	/// Block that would follow the head with `txs` aggregated in it.
	pub fn build_next_block(&self, txs: Vec<Transaction>) -> Result<Block, Error> {
		let view = self.view.read();
		coins::build_next_block(&*view, &self.crypto, txs)
	}

	fn compact_batch(
		db: &Store,
		view: &mut CoinsViewDB,
		undo: &UndoStore,
	) -> Result<(usize, usize), Error> {
		let batch = db.batch()?;
		let pruned = view.compact(&batch)?;
		let dropped = undo.clear_undo(&batch)?;
		batch.commit()?;
		Ok((pruned, dropped))
	}

	fn compact_locked(db: &Store, view: &mut CoinsViewDB, undo: &UndoStore) -> Result<usize, Error> {
		let (pruned, dropped) = match Chain::compact_batch(db, view, undo) {
			Ok(counts) => counts,
			Err(e) => {
				// back to the generation recorded in the store
				error!("chain: compact: {}", e);
				view.reload()?;
				return Err(e);
			}
		};
		view.drop_stale_files();
		debug!(
			"chain: compact: {} outputs pruned, undo data of {} blocks dropped",
			pruned, dropped
		);
		Ok(pruned)
	}

	/// Compact the output and range proof MMRs. Blocks applied so far can
	/// no longer be undone. Returns the number of outputs pruned.
	pub fn compact(&self) -> Result<usize, Error> {
		let mut guard = lock_both(Write(&self.view), Write(&self.undo));
		let (view, undo) = (&mut guard.first, &guard.second);
		Chain::compact_locked(&self.db, view, undo)
	}

	/// Snapshot of the state at the head.
	pub fn snapshot(&self) -> Result<State, Error> {
		self.view.read().snapshot()
	}

	/// Replace an empty state with `state`, once it is validated and its
	/// header is known to the base chain.
	pub fn apply_state(&self, state: &State) -> Result<(), Error> {
		let hash = state.header.hash();
		match self.headers.get_header(&hash) {
			Some(ref header) if *header == state.header => {}
			_ => return Err(Error::Unfit(format!("snapshot header {} unknown", hash))),
		}
		state.validate(&self.crypto)?;

		let mut guard = lock_both(Write(&self.view), Write(&self.undo));
		let batch = self.db.batch()?;
		if let Err(e) = guard.first.restore(&batch, state) {
			guard.first.reload()?;
			return Err(e);
		}
		guard.first.commit(batch)?;
		guard.first.drop_stale_files();
		info!(
			"chain: apply_state: {} at {}, {} utxos",
			hash,
			state.header.height,
			state.utxos.len()
		);
		Ok(())
	}

	/// Check the whole state at the head: roots, signatures, range proofs
	/// and the supply balance.
	pub fn validate(&self) -> Result<(), Error> {
		let state = self.snapshot()?;
		state.validate(&self.crypto)
	}
}
