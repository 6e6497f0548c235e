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

//! File backed leaf set. The file holds the leaf count as a big endian u64
//! followed by the packed bits. Modified bytes are staged in memory until
//! `commit` rewrites the file, `rollback` forgets them.

use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use byteorder::{BigEndian, ByteOrder};

use crate::core::core::pmmr::{LeafIndex, ReadableLeafSet, WriteableLeafSet};
use crate::save_via_temp_file;

/// Leaf set persisted to a single bitmap file.
pub struct LeafSet {
	path: PathBuf,
	bytes: Vec<u8>,
	next_leaf: LeafIndex,
	staged: BTreeMap<u64, u8>,
	staged_next_leaf: LeafIndex,
}

impl LeafSet {
	/// Open the leaf set at `path`, empty if the file doesn't exist.
	pub fn open<P: AsRef<Path>>(path: P) -> io::Result<LeafSet> {
		let path = path.as_ref().to_path_buf();
		let (next_leaf, bytes) = if path.exists() {
			let data = fs::read(&path)?;
			if data.len() < 8 {
				return Err(io::Error::new(
					io::ErrorKind::InvalidData,
					format!("leaf_set: truncated file {:?}", path),
				));
			}
			(LeafIndex::at(BigEndian::read_u64(&data[..8])), data[8..].to_vec())
		} else {
			(LeafIndex::at(0), vec![])
		};
		debug!("leaf_set: {:?}, {} leaves", path, next_leaf.get());

		Ok(LeafSet {
			path,
			bytes,
			next_leaf,
			staged: BTreeMap::new(),
			staged_next_leaf: next_leaf,
		})
	}

	/// Whether there are staged changes.
	pub fn is_dirty(&self) -> bool {
		!self.staged.is_empty() || self.staged_next_leaf != self.next_leaf
	}

	/// Apply the staged bytes and write the file.
	pub fn commit(&mut self) -> io::Result<()> {
		let num_bytes = ((self.staged_next_leaf.get() + 7) / 8) as usize;
		let mut bytes = self.bytes.clone();
		bytes.resize(num_bytes.max(bytes.len()), 0);
		for (idx, value) in self.staged.iter() {
			let idx = *idx as usize;
			if idx < bytes.len() {
				bytes[idx] = *value;
			}
		}
		bytes.truncate(num_bytes);

		let mut header = [0u8; 8];
		BigEndian::write_u64(&mut header, self.staged_next_leaf.get());
		save_via_temp_file(&self.path, ".tmp", |file| {
			file.write_all(&header)?;
			file.write_all(&bytes)
		})?;

		self.bytes = bytes;
		self.next_leaf = self.staged_next_leaf;
		self.staged.clear();
		Ok(())
	}

	/// Forget the staged changes.
	pub fn rollback(&mut self) {
		self.staged.clear();
		self.staged_next_leaf = self.next_leaf;
	}
}

impl ReadableLeafSet for LeafSet {
	fn next_leaf(&self) -> LeafIndex {
		self.staged_next_leaf
	}

	fn get_byte(&self, byte_idx: u64) -> u8 {
		if let Some(b) = self.staged.get(&byte_idx) {
			return *b;
		}
		self.bytes.get(byte_idx as usize).cloned().unwrap_or(0)
	}
}

impl WriteableLeafSet for LeafSet {
	fn set_byte(&mut self, byte_idx: u64, value: u8) {
		self.staged.insert(byte_idx, value);
	}

	fn set_next_leaf(&mut self, next_leaf: LeafIndex) {
		self.staged_next_leaf = next_leaf;
	}
}
