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

//! The prune list: one bit per MMR node whose hash has been compacted out of
//! the hash file.
//!
//! A node's hash is only needed while it is a peak, has an unspent leaf
//! beneath it, or its sibling has one (a proof for that leaf goes through
//! it). Every other hash can be dropped. Dropped positions are removed from
//! the hash file, so reading position `p` means reading the file at
//! `p - get_shift(p)`.
//!
//! Each compaction writes a new generation of the list to its own file,
//! identified by a file index the caller records alongside the rest of the
//! state. A generation stays on disk until the caller drops it, so the one
//! recorded is always readable.

use std::convert::TryFrom;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use croaring::Bitmap;

use crate::core::core::pmmr::{self, Index, LeafIndex, ReadableLeafSet};
use crate::lmdb::Error;
use crate::{read_bitmap, save_via_temp_file};

/// Positions of the nodes at a given height, left to right.
///
/// Going from the k-th node at a height to the next skips the subtree
/// rooted at its sibling (`2^(h+1) - 1` nodes) plus one parent for every
/// level the k-th node completes, that is `ctz(k)`.
pub struct SiblingIter {
	base_inc: u64,
	num_nodes: u64,
	next_pos: u64,
	sibling_num: u64,
}

impl SiblingIter {
	/// Nodes at `height` in an MMR of `num_nodes` nodes.
	pub fn new(height: u64, num_nodes: u64) -> SiblingIter {
		let base_inc = (1u64 << (height + 1)) - 1;
		SiblingIter {
			base_inc,
			num_nodes,
			next_pos: base_inc - 1,
			sibling_num: 1,
		}
	}
}

impl Iterator for SiblingIter {
	type Item = u64;

	fn next(&mut self) -> Option<u64> {
		if self.next_pos >= self.num_nodes {
			return None;
		}
		let pos = self.next_pos;
		self.next_pos += self.base_inc + u64::from(self.sibling_num.trailing_zeros());
		self.sibling_num += 1;
		Some(pos)
	}
}

fn to_u32(pos: u64) -> Result<u32, Error> {
	u32::try_from(pos).map_err(|_| Error::OtherErr(format!("position {} out of bitmap range", pos)))
}

/// Nodes with an unspent leaf beneath them, the leaves included.
pub fn live_bitset(num_leaves: u64, leaf_set: &dyn ReadableLeafSet) -> Result<Bitmap, Error> {
	let num_nodes = LeafIndex::at(num_leaves).position();
	to_u32(num_nodes)?;

	let mut live = Bitmap::create();
	let mut height = 0;
	loop {
		let mut any = false;
		for (n, pos) in SiblingIter::new(height, num_nodes).enumerate() {
			any = true;
			let is_live = if height == 0 {
				leaf_set.contains(LeafIndex::at(n as u64))
			} else {
				let idx = Index::at(pos);
				live.contains(idx.left_child().position() as u32)
					|| live.contains(idx.right_child().position() as u32)
			};
			if is_live {
				live.add(pos as u32);
			}
		}
		if !any {
			break;
		}
		height += 1;
	}
	Ok(live)
}

/// Nodes whose hash can be dropped given which of the first `num_leaves`
/// leaves are unspent.
pub fn build_compact_bitset(
	num_leaves: u64,
	leaf_set: &dyn ReadableLeafSet,
) -> Result<Bitmap, Error> {
	let num_nodes = LeafIndex::at(num_leaves).position();
	let live = live_bitset(num_leaves, leaf_set)?;
	let peaks = pmmr::peaks(num_nodes).unwrap_or_default();

	let mut compact = Bitmap::create();
	for pos in 0..num_nodes {
		if live.contains(pos as u32) || peaks.contains(&pos) {
			continue;
		}
		let sibling = Index::at(pos).sibling().position();
		if !live.contains(sibling as u32) {
			compact.add(pos as u32);
		}
	}
	compact.run_optimize();
	Ok(compact)
}

/// A generation of the prune list, loaded from disk.
pub struct PruneList {
	file_index: u32,
	bitmap: Bitmap,
}

/// Name prefix shared by the files of every generation.
pub const PRUNE_FILE_STEM: &str = "pmmr_prun_";

/// File holding generation `file_index` of the prune list in `dir`.
pub fn file_path(dir: &Path, file_index: u32) -> PathBuf {
	dir.join(format!("{}{}.bin", PRUNE_FILE_STEM, file_index))
}

impl PruneList {
	/// Open generation `file_index` of the prune list in `dir`. Generation
	/// 0 is the empty list and has no file.
	pub fn open<P: AsRef<Path>>(dir: P, file_index: u32) -> io::Result<PruneList> {
		let dir = dir.as_ref().to_path_buf();
		let path = file_path(&dir, file_index);
		let bitmap = if file_index > 0 {
			read_bitmap(&path)?
		} else {
			Bitmap::create()
		};
		if !bitmap.is_empty() {
			debug!(
				"prune_list: {:?} {} pos ({} bytes)",
				path,
				bitmap.cardinality(),
				bitmap.get_serialized_size_in_bytes()
			);
		}
		Ok(PruneList { file_index, bitmap })
	}

	/// Write `bitset` as generation `file_index` in `dir`. Files of other
	/// generations are left alone, the caller decides which one is current.
	pub fn create<P: AsRef<Path>>(dir: P, file_index: u32, bitset: Bitmap) -> io::Result<PruneList> {
		if file_index == 0 {
			return Err(io::Error::new(
				io::ErrorKind::InvalidInput,
				"prune_list: generation 0 is always empty",
			));
		}
		let path = file_path(dir.as_ref(), file_index);
		save_via_temp_file(&path, ".tmp", |file| file.write_all(&bitset.serialize()))?;
		Ok(PruneList {
			file_index,
			bitmap: bitset,
		})
	}

	/// Current generation.
	pub fn file_index(&self) -> u32 {
		self.file_index
	}

	/// Number of pruned positions strictly before `pos`.
	pub fn get_shift(&self, pos: u64) -> u64 {
		if pos == 0 || self.bitmap.is_empty() {
			return 0;
		}
		match u32::try_from(pos - 1) {
			Ok(prev) => self.bitmap.rank(prev),
			Err(_) => self.total_shift(),
		}
	}

	/// Number of pruned positions.
	pub fn total_shift(&self) -> u64 {
		self.bitmap.cardinality()
	}

	/// Whether the hash at `pos` was dropped.
	pub fn is_pruned(&self, pos: u64) -> bool {
		match u32::try_from(pos) {
			Ok(pos) => self.bitmap.contains(pos),
			Err(_) => false,
		}
	}

	/// The pruned positions.
	pub fn bitmap(&self) -> &Bitmap {
		&self.bitmap
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn sibling_positions() {
		let leaves: Vec<u64> = SiblingIter::new(0, 16).collect();
		assert_eq!(leaves, vec![0, 1, 3, 4, 7, 8, 10, 11, 15]);
		let h1: Vec<u64> = SiblingIter::new(1, 18).collect();
		assert_eq!(h1, vec![2, 5, 9, 12, 17]);
		let h2: Vec<u64> = SiblingIter::new(2, 38).collect();
		assert_eq!(h2, vec![6, 13, 21, 28, 37]);
		assert_eq!(SiblingIter::new(3, 14).count(), 0);
	}

	#[test]
	fn leaf_positions_match_index() {
		for (n, pos) in SiblingIter::new(0, 1000).enumerate() {
			assert_eq!(pos, LeafIndex::at(n as u64).position());
		}
	}
}
