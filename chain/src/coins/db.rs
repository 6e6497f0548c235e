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

//! The persisted coins view.
//!
//! UTXO lists and the best header live in the key/value store, the MMR
//! hashes and the leaf set in flat files under the data directory. A commit
//! flushes the files first and the batch last. A crash in between leaves
//! the files ahead of the stored header, which `open` trims back.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::coins::{apply_actions, check_roots, leafset_root, CoinsView, CoinsViewChanges};
use crate::core::core::pmmr::{
	Leaf, LeafIndex, ReadableLeafSet, ReadableMMR, WriteableLeafSet, WriteableMMR, MMR,
};
use crate::core::core::{Header, Kernel};
use crate::core::ser;
use crate::error::Error;
use crate::state::{frontier_hashes, pack_leaf_set, State};
use crate::store::{
	ChainStore, KERNEL_LEAF_PREFIX, OUTPUT_LEAF_PREFIX, RANGEPROOF_LEAF_PREFIX,
};
use crate::types::Utxo;
use crate::util::secp::pedersen::Commitment;
use mweb_store::leaf_set::LeafSet;
use mweb_store::pmmr::PMMRBackend;
use mweb_store::prune_list::build_compact_bitset;
use mweb_store::{to_key, Batch, Store};

const KERNEL_SUBDIR: &str = "kernel";
const OUTPUT_SUBDIR: &str = "output";
const RANGEPROOF_SUBDIR: &str = "rangeproof";
const LEAFSET_FILE: &str = "leafset.bin";

/// Coins view over the on-disk state.
pub struct CoinsViewDB {
	data_dir: PathBuf,
	store: ChainStore,
	header: Header,
	committed_header: Header,
	leaf_set: LeafSet,
	kernel_mmr: MMR<PMMRBackend>,
	output_mmr: MMR<PMMRBackend>,
	rangeproof_mmr: MMR<PMMRBackend>,
}

fn trim_mmr(mmr: &mut MMR<PMMRBackend>, num_leaves: u64, name: &str) -> Result<bool, Error> {
	let found = mmr.num_leaves();
	if found > num_leaves {
		warn!(
			"coins_view: {} mmr ahead of head ({} vs {} leaves), rewinding",
			name, found, num_leaves
		);
		mmr.rewind_leaves(num_leaves)?;
		Ok(true)
	} else if found < num_leaves {
		Err(Error::InvalidState(format!(
			"{} mmr has {} leaves, head expects {}",
			name, found, num_leaves
		)))
	} else {
		Ok(false)
	}
}

impl CoinsViewDB {
	/// Open the view stored under `data_dir`, leaf payloads and records in
	/// `db`. Files left ahead of the stored header are trimmed back.
	pub fn open<P: AsRef<Path>>(data_dir: P, db: Arc<Store>) -> Result<CoinsViewDB, Error> {
		let data_dir = data_dir.as_ref().to_path_buf();
		std::fs::create_dir_all(&data_dir)?;
		let store = ChainStore::new(db.clone());
		let header = store.head_header()?.unwrap_or_default();
		let file_index = store.prune_file_index()?;

		let kernel_mmr = MMR::new(PMMRBackend::new(
			data_dir.join(KERNEL_SUBDIR),
			KERNEL_LEAF_PREFIX,
			db.clone(),
			0,
		)?);
		let output_mmr = MMR::new(PMMRBackend::new(
			data_dir.join(OUTPUT_SUBDIR),
			OUTPUT_LEAF_PREFIX,
			db.clone(),
			file_index,
		)?);
		let rangeproof_mmr = MMR::new(PMMRBackend::new(
			data_dir.join(RANGEPROOF_SUBDIR),
			RANGEPROOF_LEAF_PREFIX,
			db,
			file_index,
		)?);
		let leaf_set = LeafSet::open(data_dir.join(LEAFSET_FILE))?;

		let mut view = CoinsViewDB {
			data_dir,
			store,
			committed_header: header.clone(),
			header,
			leaf_set,
			kernel_mmr,
			output_mmr,
			rangeproof_mmr,
		};
		view.recover()?;
		view.drop_stale_files();
		debug!(
			"coins_view: opened {:?} at height {}, {} txos, {} kernels",
			view.data_dir, view.header.height, view.header.num_txos, view.header.num_kernels
		);
		Ok(view)
	}

	fn recover(&mut self) -> Result<(), Error> {
		let header = self.header.clone();
		let mut trimmed = trim_mmr(&mut self.kernel_mmr, header.num_kernels, "kernel")?;
		trimmed |= trim_mmr(&mut self.output_mmr, header.num_txos, "output")?;
		trimmed |= trim_mmr(&mut self.rangeproof_mmr, header.num_txos, "rangeproof")?;
		if leafset_root(&self.leaf_set, header.num_txos) != header.leafset_root
			|| self.leaf_set.next_leaf().get() != header.num_txos
		{
			warn!("coins_view: leaf set doesn't match head, rebuilding from utxos");
			self.rebuild_leaf_set(header.num_txos)?;
			trimmed = true;
		}
		if trimmed {
			let db = self.store.db().clone();
			let batch = db.batch()?;
			self.write_leaves(&batch)?;
			self.commit_files()?;
			batch.commit()?;
		}
		check_roots(self, &header)
			.map_err(|e| Error::InvalidState(format!("state on disk doesn't match head: {}", e)))
	}

	fn rebuild_leaf_set(&mut self, num_txos: u64) -> Result<(), Error> {
		let mut bytes = vec![0u8; ((num_txos + 7) / 8) as usize];
		for utxos in self.store.iter_utxos()? {
			for utxo in utxos {
				let n = utxo.leaf_idx.get();
				if n >= num_txos {
					return Err(Error::InvalidState(format!(
						"utxo at leaf {} beyond {} txos",
						n, num_txos
					)));
				}
				bytes[(n / 8) as usize] |= 0x80 >> (n % 8);
			}
		}
		let stale = (self.leaf_set.next_leaf().get() + 7) / 8;
		for i in (bytes.len() as u64)..stale {
			self.leaf_set.set_byte(i, 0);
		}
		for (i, byte) in bytes.into_iter().enumerate() {
			self.leaf_set.set_byte(i as u64, byte);
		}
		self.leaf_set.set_next_leaf(LeafIndex::at(num_txos));
		Ok(())
	}

	/// Close and reopen from disk, dropping anything staged.
	pub fn reload(&mut self) -> Result<(), Error> {
		let data_dir = self.data_dir.clone();
		let db = self.store.db().clone();
		*self = CoinsViewDB::open(data_dir, db)?;
		Ok(())
	}

	/// Stage the changes of a cache layered over this view. UTXO records and
	/// the header go to `batch`, MMR and leaf set changes are staged in the
	/// files until `commit`.
	pub fn flush(&mut self, batch: &Batch<'_>, changes: CoinsViewChanges) -> Result<(), Error> {
		self.kernel_mmr.apply(changes.kernels)?;
		self.output_mmr.apply(changes.outputs)?;
		self.rangeproof_mmr.apply(changes.rangeproofs)?;
		self.leaf_set.apply(&changes.leaf_set);

		for (commit, actions) in changes.actions {
			let mut utxos = self.store.batch_get_utxos(batch, &commit)?;
			apply_actions(&mut utxos, &commit, &actions)?;
			self.store.save_utxos(batch, &commit, &utxos)?;
		}

		self.store.save_head_header(batch, &changes.header)?;
		self.header = changes.header;
		Ok(())
	}

	fn write_leaves(&self, batch: &Batch<'_>) -> Result<(), Error> {
		self.kernel_mmr.backend().write_leaves(batch)?;
		self.output_mmr.backend().write_leaves(batch)?;
		self.rangeproof_mmr.backend().write_leaves(batch)?;
		Ok(())
	}

	fn commit_files(&mut self) -> Result<(), Error> {
		self.kernel_mmr.backend_mut().commit()?;
		self.output_mmr.backend_mut().commit()?;
		self.rangeproof_mmr.backend_mut().commit()?;
		self.leaf_set.commit()?;
		Ok(())
	}

	/// Persist everything staged: leaf payloads go to `batch`, then the
	/// files are flushed, then `batch` is committed.
	pub fn commit(&mut self, batch: Batch<'_>) -> Result<(), Error> {
		if let Err(e) = self.write_leaves(&batch) {
			self.discard();
			return Err(e);
		}
		if let Err(e) = self.commit_files() {
			error!("coins_view: file commit failed: {}", e);
			self.reload()?;
			return Err(e);
		}
		if let Err(e) = batch.commit() {
			error!("coins_view: batch commit failed, files ahead of head: {}", e);
			self.reload()?;
			return Err(e.into());
		}
		self.committed_header = self.header.clone();
		Ok(())
	}

	/// Drop everything staged since the last commit.
	pub fn discard(&mut self) {
		self.kernel_mmr.backend_mut().discard();
		self.output_mmr.backend_mut().discard();
		self.rangeproof_mmr.backend_mut().discard();
		self.leaf_set.rollback();
		self.header = self.committed_header.clone();
	}

	/// Drop the hashes and payloads of spent outputs nothing needs anymore
	/// from the output and range proof MMRs. Payload deletions and the new
	/// prune list generation go to `batch`, the new hash files and prune
	/// lists are written right away. Returns the number of outputs pruned.
	///
	/// Both MMRs switch to the new generation in memory, the previous one
	/// stays on disk. On error, or if `batch` is not committed, `reload`
	/// goes back to the generation recorded in the store.
	pub fn compact(&mut self, batch: &Batch<'_>) -> Result<usize, Error> {
		let num_txos = self.output_mmr.num_leaves();
		let bitset = build_compact_bitset(num_txos, &self.leaf_set)?;
		let file_index = self.store.prune_file_index()? + 1;

		let outputs = self.output_mmr.backend_mut().compact(file_index, &bitset)?;
		let proofs = self.rangeproof_mmr.backend_mut().compact(file_index, &bitset)?;
		for hash in &outputs {
			batch.delete(&to_key(OUTPUT_LEAF_PREFIX, hash))?;
		}
		for hash in &proofs {
			batch.delete(&to_key(RANGEPROOF_LEAF_PREFIX, hash))?;
		}
		self.store.save_prune_file_index(batch, file_index)?;

		info!(
			"coins_view: compacted {} txos, {} positions pruned, generation {}",
			num_txos,
			bitset.cardinality(),
			file_index
		);
		Ok(outputs.len())
	}

	/// Remove the hash files and prune lists of generations other than the
	/// one in use. Failures are only logged, stale files are harmless.
	pub fn drop_stale_files(&self) {
		for mmr in &[&self.output_mmr, &self.rangeproof_mmr] {
			if let Err(e) = mmr.backend().drop_stale_files() {
				warn!("coins_view: failed to drop stale files: {}", e);
			}
		}
	}

	/// Snapshot of the committed state.
	pub fn snapshot(&self) -> Result<State, Error> {
		let header = self.committed_header.clone();
		let mut kernels = Vec::with_capacity(header.num_kernels as usize);
		for n in 0..header.num_kernels {
			let leaf = self.kernel_mmr.get_leaf(LeafIndex::at(n))?;
			let kernel: Kernel = ser::deserialize_exact(leaf.data())?;
			kernels.push(kernel);
		}

		let mut utxos: Vec<Utxo> = self.store.iter_utxos()?.flatten().collect();
		utxos.sort_by_key(|u| u.leaf_idx);

		Ok(State {
			leafset: pack_leaf_set(&self.leaf_set, header.num_txos),
			output_hashes: frontier_hashes(header.num_txos, &self.leaf_set, &self.output_mmr)?,
			rangeproof_hashes: frontier_hashes(
				header.num_txos,
				&self.leaf_set,
				&self.rangeproof_mmr,
			)?,
			kernels,
			utxos,
			header,
		})
	}

	/// Fill an empty view from a snapshot, which must have been validated.
	/// Records go to `batch`, files are staged until `commit`.
	pub fn restore(&mut self, batch: &Batch<'_>, state: &State) -> Result<(), Error> {
		if self.kernel_mmr.num_leaves() > 0 || self.output_mmr.num_leaves() > 0 {
			return Err(Error::InvalidState(
				"cannot restore a snapshot over existing state".to_owned(),
			));
		}
		let header = &state.header;

		for kernel in &state.kernels {
			self.kernel_mmr.add(ser::ser_vec(kernel)?)?;
		}

		let packed = state.leaf_set();
		for (i, byte) in state.leafset.iter().enumerate() {
			self.leaf_set.set_byte(i as u64, *byte);
		}
		self.leaf_set.set_next_leaf(packed.next_leaf());

		let (outputs, rangeproofs) = state.rebuild_mmrs()?;
		let mut output_leaves = Vec::with_capacity(state.utxos.len());
		let mut proof_leaves = Vec::with_capacity(state.utxos.len());
		let mut by_commit: BTreeMap<Vec<u8>, (Commitment, Vec<Utxo>)> = BTreeMap::new();
		for utxo in &state.utxos {
			output_leaves.push(Leaf::create(utxo.leaf_idx, utxo.output.mmr_data()?));
			proof_leaves.push(Leaf::create(utxo.leaf_idx, utxo.output.proof_data()?));
			by_commit
				.entry(utxo.output.commit.0.to_vec())
				.or_insert_with(|| (utxo.output.commit, vec![]))
				.1
				.push(utxo.clone());
		}

		let file_index = 1;
		let (pruned, hashes) = outputs.into_parts();
		self.output_mmr
			.backend_mut()
			.restore(file_index, pruned, &hashes, output_leaves)?;
		let (pruned, hashes) = rangeproofs.into_parts();
		self.rangeproof_mmr
			.backend_mut()
			.restore(file_index, pruned, &hashes, proof_leaves)?;

		for (commit, utxos) in by_commit.values() {
			self.store.save_utxos(batch, commit, utxos)?;
		}
		self.store.save_prune_file_index(batch, file_index)?;
		self.store.save_head_header(batch, header)?;
		self.header = header.clone();

		check_roots(self, header)?;
		info!(
			"coins_view: restored state at {}, {} utxos, {} kernels",
			header.height,
			state.utxos.len(),
			state.kernels.len()
		);
		Ok(())
	}
}

impl CoinsView for CoinsViewDB {
	fn best_header(&self) -> Header {
		self.header.clone()
	}

	/// Reads the committed records only. Whatever a flush staged in a batch
	/// shows up once that batch is committed.
	fn get_utxos(&self, commit: &Commitment) -> Result<Vec<Utxo>, Error> {
		Ok(self.store.get_utxos(commit)?)
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
