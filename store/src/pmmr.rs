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

//! Implementation of the persistent Backend for the MMR.
//!
//! * Hashes go to an append-only file of 32 byte records, backed by a mmap
//!   for reads. Positions compacted away are skipped in the file, the prune
//!   list translates MMR positions to file positions.
//! * Each compaction writes a new generation of both the hash file and the
//!   prune list next to the current one. Generations no longer recorded as
//!   current are removed by `drop_stale_files`.
//! * Leaf payloads go to the key/value store, keyed by a per-MMR prefix and
//!   the leaf hash. They are staged in memory and handed to the caller's
//!   batch by `write_leaves`.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use croaring::Bitmap;

use crate::core::core::hash::Hash;
use crate::core::core::pmmr::{self, Backend, Error as MMRError, Leaf, LeafIndex};
use crate::lmdb::{Batch, Error, Store};
use crate::prune_list::{self, PruneList, PRUNE_FILE_STEM};
use crate::to_key;
use crate::types::AppendOnlyFile;

const PMMR_HASH_FILE: &str = "pmmr_hash.bin";
const PMMR_HASH_STEM: &str = "pmmr_hash_";

fn hash_file_path(dir: &Path, file_index: u32) -> PathBuf {
	if file_index == 0 {
		dir.join(PMMR_HASH_FILE)
	} else {
		dir.join(format!("{}{}.bin", PMMR_HASH_STEM, file_index))
	}
}

fn backend_err<E: std::fmt::Display>(e: E) -> MMRError {
	MMRError::Backend(e.to_string())
}

/// MMR persistent backend implementation.
pub struct PMMRBackend {
	data_dir: PathBuf,
	prefix: u8,
	store: Arc<Store>,
	hash_file: AppendOnlyFile<Hash>,
	prune_list: PruneList,
	// leaves added since the last commit
	pending: Vec<Leaf>,
	// committed leaves rewound since the last commit
	erased: Vec<Hash>,
}

impl PMMRBackend {
	/// Instantiates a new backend in `data_dir`, leaf payloads stored under
	/// `prefix`, using generation `file_index` of the hash file and prune
	/// list.
	pub fn new<P: AsRef<Path>>(
		data_dir: P,
		prefix: u8,
		store: Arc<Store>,
		file_index: u32,
	) -> Result<PMMRBackend, Error> {
		let data_dir = data_dir.as_ref().to_path_buf();
		fs::create_dir_all(&data_dir)
			.map_err(|e| Error::FileErr(format!("{:?}: {}", data_dir, e)))?;

		let hash_file =
			AppendOnlyFile::open(hash_file_path(&data_dir, file_index), Hash::LEN as u16)
				.map_err(|e| Error::FileErr(format!("{:?}: {}", data_dir, e)))?;
		let prune_list = PruneList::open(&data_dir, file_index)
			.map_err(|e| Error::FileErr(format!("{:?}: {}", data_dir, e)))?;

		Ok(PMMRBackend {
			data_dir,
			prefix,
			store,
			hash_file,
			prune_list,
			pending: vec![],
			erased: vec![],
		})
	}

	fn leaf_key(&self, hash: &Hash) -> Vec<u8> {
		to_key(self.prefix, hash)
	}

	/// Put the staged leaf payloads (and erase the rewound ones) in `batch`.
	pub fn write_leaves(&self, batch: &Batch<'_>) -> Result<(), Error> {
		for hash in &self.erased {
			batch.delete(&self.leaf_key(hash))?;
		}
		for leaf in &self.pending {
			batch.put(&self.leaf_key(&leaf.hash()), leaf.data())?;
		}
		Ok(())
	}

	/// Flush the hash file. The leaf payloads must already be in a batch.
	pub fn commit(&mut self) -> Result<(), Error> {
		self.hash_file
			.flush()
			.map_err(|e| Error::FileErr(format!("{:?}: {}", self.data_dir, e)))?;
		self.pending.clear();
		self.erased.clear();
		Ok(())
	}

	/// Drop everything staged since the last commit.
	pub fn discard(&mut self) {
		self.hash_file.discard();
		self.pending.clear();
		self.erased.clear();
	}

	/// Prune list generation in use.
	pub fn prune_list(&self) -> &PruneList {
		&self.prune_list
	}

	fn io_err(&self) -> impl Fn(std::io::Error) -> Error {
		let data_dir = self.data_dir.clone();
		move |e| Error::FileErr(format!("{:?}: {}", data_dir, e))
	}

	/// Write generation `file_index`: the hash file without the positions in
	/// `bitset` and the prune list including them, then switch to it. The
	/// current generation stays on disk. Returns the hashes of the leaves
	/// newly pruned, so their payloads can be erased.
	pub fn compact(&mut self, file_index: u32, bitset: &Bitmap) -> Result<Vec<Hash>, Error> {
		if self.hash_file.is_dirty() {
			return Err(Error::OtherErr(
				"cannot compact with uncommitted changes".to_string(),
			));
		}
		if file_index <= self.prune_list.file_index() {
			return Err(Error::OtherErr(format!(
				"cannot compact generation {} into {}",
				self.prune_list.file_index(),
				file_index
			)));
		}
		let old = self.prune_list.bitmap();
		let merged = bitset.or(old);
		let added = merged.andnot(old);

		let mut file_pos = Vec::with_capacity(added.cardinality() as usize);
		let mut pruned_leaves = vec![];
		for pos in added.iter() {
			let pos = u64::from(pos);
			if pmmr::height(pos) == 0 {
				let hash = self.get_hash(pos).map_err(|e| Error::OtherErr(e.to_string()))?;
				pruned_leaves.push(hash);
			}
			file_pos.push(pos - self.prune_list.get_shift(pos));
		}

		let io_err = self.io_err();
		let path = hash_file_path(&self.data_dir, file_index);
		self.hash_file
			.write_pruned_copy(&path, &file_pos)
			.map_err(&io_err)?;
		let prune_list = PruneList::create(&self.data_dir, file_index, merged).map_err(&io_err)?;
		let hash_file = AppendOnlyFile::open(path, Hash::LEN as u16).map_err(&io_err)?;
		self.hash_file = hash_file;
		self.prune_list = prune_list;

		debug!(
			"compact: {:?} dropped {} hashes, {} leaves, generation {}",
			self.data_dir,
			file_pos.len(),
			pruned_leaves.len(),
			file_index
		);
		Ok(pruned_leaves)
	}

	/// Fill an empty backend from a snapshot, as generation `file_index`.
	/// `pruned` becomes its prune list, `hashes` are those of every other
	/// position in order and `leaves` the leaves still holding a payload.
	/// Staged like any append, `write_leaves` and `commit` persist it.
	pub fn restore(
		&mut self,
		file_index: u32,
		pruned: Bitmap,
		hashes: &[Hash],
		leaves: Vec<Leaf>,
	) -> Result<(), Error> {
		if self.num_nodes() != 0 {
			return Err(Error::OtherErr(format!(
				"{:?}: cannot restore over {} nodes",
				self.data_dir,
				self.num_nodes()
			)));
		}
		let io_err = self.io_err();
		let path = hash_file_path(&self.data_dir, file_index);
		if path != hash_file_path(&self.data_dir, self.prune_list.file_index()) {
			// left over by an earlier attempt
			match fs::remove_file(&path) {
				Err(e) if e.kind() != std::io::ErrorKind::NotFound => return Err(io_err(e)),
				_ => {}
			}
		}
		let prune_list = PruneList::create(&self.data_dir, file_index, pruned).map_err(&io_err)?;
		let mut hash_file = AppendOnlyFile::open(path, Hash::LEN as u16).map_err(&io_err)?;
		for hash in hashes {
			hash_file.append_elmt(hash).map_err(&io_err)?;
		}
		self.hash_file = hash_file;
		self.prune_list = prune_list;
		self.pending = leaves;
		Ok(())
	}

	/// Remove the hash files and prune lists of every generation but the
	/// current one. Only call once the current generation is recorded.
	pub fn drop_stale_files(&self) -> Result<(), Error> {
		let io_err = self.io_err();
		let current = self.prune_list.file_index();
		let keep_hash = hash_file_path(&self.data_dir, current);
		let keep_prune = prune_list::file_path(&self.data_dir, current);
		for entry in fs::read_dir(&self.data_dir).map_err(&io_err)? {
			let path = entry.map_err(&io_err)?.path();
			let name = match path.file_name().and_then(|n| n.to_str()) {
				Some(name) => name,
				None => continue,
			};
			let generation_file = name == PMMR_HASH_FILE
				|| name.starts_with(PMMR_HASH_STEM)
				|| name.starts_with(PRUNE_FILE_STEM);
			if !generation_file || path == keep_hash || path == keep_prune {
				continue;
			}
			match fs::remove_file(&path) {
				Ok(()) => debug!("drop_stale_files: removed {:?}", path),
				Err(e) => warn!("drop_stale_files: failed to remove {:?}: {}", path, e),
			}
		}
		Ok(())
	}
}

impl Backend for PMMRBackend {
	fn append_leaf(&mut self, leaf: &Leaf) -> Result<(), MMRError> {
		self.hash_file.append_elmt(&leaf.hash()).map_err(backend_err)?;
		self.pending.push(leaf.clone());
		Ok(())
	}

	fn append_hash(&mut self, hash: Hash) -> Result<(), MMRError> {
		self.hash_file.append_elmt(&hash).map_err(backend_err)
	}

	fn rewind(&mut self, num_nodes: u64) -> Result<(), MMRError> {
		let shift = self.prune_list.get_shift(num_nodes);
		if shift != self.prune_list.total_shift() {
			// below the compaction horizon
			return Err(MMRError::InvalidRewind(num_nodes));
		}

		let num_leaves = pmmr::num_leaves(num_nodes);
		let first_pending = self
			.pending
			.first()
			.map(|leaf| leaf.index().get())
			.unwrap_or_else(|| pmmr::num_leaves(self.num_nodes()));
		for n in num_leaves..first_pending {
			if let Ok(hash) = self.get_hash(LeafIndex::at(n).position()) {
				self.erased.push(hash);
			}
		}
		self.pending.retain(|leaf| leaf.index().get() < num_leaves);

		self.hash_file.rewind(num_nodes - shift);
		Ok(())
	}

	fn num_nodes(&self) -> u64 {
		self.hash_file.size_unsync_in_elmts() + self.prune_list.total_shift()
	}

	fn get_hash(&self, pos: u64) -> Result<Hash, MMRError> {
		if self.prune_list.is_pruned(pos) {
			return Err(MMRError::HashNotFound(pos));
		}
		let shift = self.prune_list.get_shift(pos);
		self.hash_file
			.read_as_elmt(pos - shift)
			.map_err(|_| MMRError::HashNotFound(pos))
	}

	fn get_leaf(&self, idx: LeafIndex) -> Result<Leaf, MMRError> {
		let hash = self
			.get_hash(idx.position())
			.map_err(|_| MMRError::LeafNotFound(idx.get()))?;
		if let Some(leaf) = self.pending.iter().rev().find(|l| l.index() == idx) {
			return Ok(leaf.clone());
		}
		match self.store.get(&self.leaf_key(&hash)) {
			Ok(Some(data)) => Ok(Leaf::from_parts(idx, hash, data)),
			Ok(None) => Err(MMRError::LeafNotFound(idx.get())),
			Err(e) => Err(backend_err(e)),
		}
	}
}
