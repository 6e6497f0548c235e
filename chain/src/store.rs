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

//! Implements storage primitives required by the chain

use std::sync::Arc;

use crate::core::core::hash::Hash;
use crate::core::core::Header;
use crate::core::ser;
use crate::types::{BlockUndo, Utxo};
use crate::util::secp::pedersen::Commitment;
use mweb_store as store;
use mweb_store::{option_to_not_found, to_key, Batch, Error};

/// Leaf payloads of the kernel MMR
pub const KERNEL_LEAF_PREFIX: u8 = b'K';
/// Leaf payloads of the output MMR
pub const OUTPUT_LEAF_PREFIX: u8 = b'O';
/// Leaf payloads of the range proof MMR
pub const RANGEPROOF_LEAF_PREFIX: u8 = b'R';

const HEADER_PREFIX: u8 = b'H';
const UTXO_PREFIX: u8 = b'U';
const UNDO_PREFIX: u8 = b'u';
const PRUNE_INDEX_PREFIX: u8 = b'P';

/// All chain-related database operations. Reads go to the committed state,
/// writes go to a caller provided batch.
pub struct ChainStore {
	db: Arc<store::Store>,
}

impl ChainStore {
	/// Create new chain store
	pub fn new(db: Arc<store::Store>) -> ChainStore {
		ChainStore { db }
	}

	/// The underlying key/value store.
	pub fn db(&self) -> &Arc<store::Store> {
		&self.db
	}

	/// Start a new batch.
	pub fn batch(&self) -> Result<Batch<'_>, Error> {
		self.db.batch()
	}
}

#[allow(missing_docs)]
impl ChainStore {
	pub fn head_header(&self) -> Result<Option<Header>, Error> {
		self.db.get_ser(&[HEADER_PREFIX])
	}

	pub fn save_head_header(&self, batch: &Batch<'_>, header: &Header) -> Result<(), Error> {
		batch.put_ser(&[HEADER_PREFIX], header)
	}

	/// Live outputs with the given commitment, oldest first.
	pub fn get_utxos(&self, commit: &Commitment) -> Result<Vec<Utxo>, Error> {
		let utxos: Option<Vec<Utxo>> = self.db.get_ser(&to_key(UTXO_PREFIX, commit))?;
		Ok(utxos.unwrap_or_default())
	}

	/// Same as `get_utxos`, but sees what was written to the batch.
	pub fn batch_get_utxos(&self, batch: &Batch<'_>, commit: &Commitment) -> Result<Vec<Utxo>, Error> {
		let utxos: Option<Vec<Utxo>> = batch.get_ser(&to_key(UTXO_PREFIX, commit))?;
		Ok(utxos.unwrap_or_default())
	}

	pub fn save_utxos(
		&self,
		batch: &Batch<'_>,
		commit: &Commitment,
		utxos: &Vec<Utxo>,
	) -> Result<(), Error> {
		let key = to_key(UTXO_PREFIX, commit);
		if utxos.is_empty() {
			batch.delete(&key)
		} else {
			batch.put_ser(&key, utxos)
		}
	}

	/// Every live output, grouped by commitment.
	pub fn iter_utxos(&self) -> Result<impl Iterator<Item = Vec<Utxo>>, Error> {
		let prefix = to_key(UTXO_PREFIX, b"");
		self.db.iter(&prefix, |_, mut v| {
			let utxos: Vec<Utxo> = ser::deserialize(&mut v)?;
			Ok(utxos)
		})
	}

	/// Prune list generation of the output and range proof MMRs.
	pub fn prune_file_index(&self) -> Result<u32, Error> {
		let index: Option<u64> = self.db.get_ser(&[PRUNE_INDEX_PREFIX])?;
		Ok(index.unwrap_or(0) as u32)
	}

	pub fn save_prune_file_index(&self, batch: &Batch<'_>, file_index: u32) -> Result<(), Error> {
		batch.put_ser(&[PRUNE_INDEX_PREFIX], &u64::from(file_index))
	}
}

/// Undo data of the blocks applied since the last compaction, keyed by
/// block hash. Kept apart from the coins view so both can be locked
/// together.
pub struct UndoStore {
	db: Arc<store::Store>,
}

impl UndoStore {
	/// Undo store over `db`.
	pub fn new(db: Arc<store::Store>) -> UndoStore {
		UndoStore { db }
	}

	/// Undo data of the block with hash `hash`.
	pub fn get_undo(&self, hash: &Hash) -> Result<BlockUndo, Error> {
		option_to_not_found(self.db.get_ser(&to_key(UNDO_PREFIX, hash)), || {
			format!("undo data for block {}", hash)
		})
	}

	/// Record undo data for a block.
	pub fn save_undo(&self, batch: &Batch<'_>, hash: &Hash, undo: &BlockUndo) -> Result<(), Error> {
		batch.put_ser(&to_key(UNDO_PREFIX, hash), undo)
	}

	/// Drop the undo data of a block, nothing to do when there is none.
	pub fn delete_undo(&self, batch: &Batch<'_>, hash: &Hash) -> Result<(), Error> {
		batch.delete(&to_key(UNDO_PREFIX, hash))
	}

	/// Drop the undo data of every block.
	pub fn clear_undo(&self, batch: &Batch<'_>) -> Result<usize, Error> {
		let prefix = to_key(UNDO_PREFIX, b"");
		let keys: Vec<Vec<u8>> = self.db.iter(&prefix, |k, _| Ok(k.to_vec()))?.collect();
		for key in &keys {
			batch.delete(key)?;
		}
		Ok(keys.len())
	}
}
