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

//! The leaf set: one bit per output MMR leaf, set while the output is
//! unspent. Bits are packed most significant first, leaf `i` lives in byte
//! `i / 8` under mask `0x80 >> (i % 8)`.

use std::collections::BTreeMap;

use crate::core::hash::{hash_bytes, Hash};
use crate::core::pmmr::LeafIndex;

fn bit_mask(idx: LeafIndex) -> u8 {
	0x80 >> (idx.get() % 8)
}

/// Read access to a leaf set.
pub trait ReadableLeafSet {
	/// One past the highest leaf this set tracks.
	fn next_leaf(&self) -> LeafIndex;

	/// Byte at `byte_idx`, 0 past the end.
	fn get_byte(&self, byte_idx: u64) -> u8;

	/// Whether the leaf is marked unspent.
	fn contains(&self, idx: LeafIndex) -> bool {
		self.get_byte(idx.get() / 8) & bit_mask(idx) != 0
	}

	/// Hash of the first `num_leaves` bits, packed into `ceil(n / 8)` bytes.
	/// Bits past `num_leaves` in the last byte are cleared first so stray
	/// bits never affect the root.
	fn root(&self, num_leaves: u64) -> Hash {
		let num_bytes = (num_leaves + 7) / 8;
		let mut bytes: Vec<u8> = (0..num_bytes).map(|i| self.get_byte(i)).collect();
		let rem = num_leaves % 8;
		if rem != 0 {
			if let Some(last) = bytes.last_mut() {
				*last &= 0xffu8 << (8 - rem);
			}
		}
		hash_bytes(&bytes)
	}

	/// Leaves currently set, in order.
	fn leaves(&self) -> Vec<LeafIndex> {
		(0..self.next_leaf().get())
			.map(LeafIndex::at)
			.filter(|idx| self.contains(*idx))
			.collect()
	}
}

/// Write access to a leaf set.
pub trait WriteableLeafSet: ReadableLeafSet {
	/// Overwrite the byte at `byte_idx`.
	fn set_byte(&mut self, byte_idx: u64, value: u8);

	/// Move the end of the set.
	fn set_next_leaf(&mut self, next_leaf: LeafIndex);

	/// Mark a leaf unspent, extending the set if needed.
	fn add(&mut self, idx: LeafIndex) {
		let byte_idx = idx.get() / 8;
		let byte = self.get_byte(byte_idx);
		self.set_byte(byte_idx, byte | bit_mask(idx));
		if idx >= self.next_leaf() {
			self.set_next_leaf(idx.next());
		}
	}

	/// Mark a leaf spent.
	fn remove(&mut self, idx: LeafIndex) {
		let byte_idx = idx.get() / 8;
		let byte = self.get_byte(byte_idx);
		self.set_byte(byte_idx, byte & !bit_mask(idx));
	}

	/// Re-add `leaves_to_add` (outputs a rewound block spent), then clear
	/// every bit from `num_leaves` on and shrink the set to `num_leaves`.
	fn rewind(&mut self, num_leaves: u64, leaves_to_add: &[LeafIndex]) {
		for idx in leaves_to_add {
			self.add(*idx);
		}
		let end = self.next_leaf().get();
		let mut i = num_leaves;
		while i < end {
			if i % 8 == 0 && i + 8 <= end {
				self.set_byte(i / 8, 0);
				i += 8;
			} else {
				self.remove(LeafIndex::at(i));
				i += 1;
			}
		}
		self.set_next_leaf(LeafIndex::at(num_leaves));
	}

	/// Replay the changes recorded by a cache layered over this set.
	fn apply(&mut self, changes: &LeafSetChanges) {
		for (byte_idx, value) in changes.modified.iter() {
			self.set_byte(*byte_idx, *value);
		}
		self.set_next_leaf(changes.next_leaf);
	}
}

/// Bytes a cache modified, and where it left the end of the set.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LeafSetChanges {
	/// Modified bytes by index
	pub modified: BTreeMap<u64, u8>,
	/// End of the set
	pub next_leaf: LeafIndex,
}

/// Copy-on-write leaf set over a base.
pub struct LeafSetCache<'a> {
	base: &'a dyn ReadableLeafSet,
	modified: BTreeMap<u64, u8>,
	next_leaf: LeafIndex,
}

impl<'a> LeafSetCache<'a> {
	/// Empty cache over `base`.
	pub fn new(base: &'a dyn ReadableLeafSet) -> LeafSetCache<'a> {
		LeafSetCache {
			base,
			modified: BTreeMap::new(),
			next_leaf: base.next_leaf(),
		}
	}

	/// Changes to apply to the base.
	pub fn into_changes(self) -> LeafSetChanges {
		LeafSetChanges {
			modified: self.modified,
			next_leaf: self.next_leaf,
		}
	}
}

impl<'a> ReadableLeafSet for LeafSetCache<'a> {
	fn next_leaf(&self) -> LeafIndex {
		self.next_leaf
	}

	fn get_byte(&self, byte_idx: u64) -> u8 {
		match self.modified.get(&byte_idx) {
			Some(b) => *b,
			None => self.base.get_byte(byte_idx),
		}
	}
}

impl<'a> WriteableLeafSet for LeafSetCache<'a> {
	fn set_byte(&mut self, byte_idx: u64, value: u8) {
		self.modified.insert(byte_idx, value);
	}

	fn set_next_leaf(&mut self, next_leaf: LeafIndex) {
		self.next_leaf = next_leaf;
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[derive(Default)]
	struct MemLeafSet {
		bytes: Vec<u8>,
		next: LeafIndex,
	}

	impl ReadableLeafSet for MemLeafSet {
		fn next_leaf(&self) -> LeafIndex {
			self.next
		}
		fn get_byte(&self, byte_idx: u64) -> u8 {
			self.bytes.get(byte_idx as usize).cloned().unwrap_or(0)
		}
	}

	impl WriteableLeafSet for MemLeafSet {
		fn set_byte(&mut self, byte_idx: u64, value: u8) {
			let idx = byte_idx as usize;
			if idx >= self.bytes.len() {
				self.bytes.resize(idx + 1, 0);
			}
			self.bytes[idx] = value;
		}
		fn set_next_leaf(&mut self, next: LeafIndex) {
			self.next = next;
		}
	}

	#[test]
	fn msb_first_packing() {
		let mut set = MemLeafSet::default();
		set.add(LeafIndex::at(0));
		set.add(LeafIndex::at(9));
		assert_eq!(set.bytes, vec![0x80, 0x40]);
		assert_eq!(set.next_leaf(), LeafIndex::at(10));
		assert!(set.contains(LeafIndex::at(9)));
		assert!(!set.contains(LeafIndex::at(8)));
		assert!(!set.contains(LeafIndex::at(1000)));

		set.remove(LeafIndex::at(0));
		assert_eq!(set.bytes, vec![0x00, 0x40]);
		assert_eq!(set.leaves(), vec![LeafIndex::at(9)]);
	}

	#[test]
	fn root_ignores_trailing_bits() {
		let mut a = MemLeafSet::default();
		a.add(LeafIndex::at(1));
		let mut b = MemLeafSet::default();
		b.add(LeafIndex::at(1));
		b.add(LeafIndex::at(5));
		b.add(LeafIndex::at(12));

		assert_eq!(a.root(3), b.root(3));
		assert_ne!(a.root(6), b.root(6));
		assert_eq!(a.root(3), hash_bytes(&[0x40]));
		assert_eq!(a.root(0), hash_bytes(&[]));
	}

	#[test]
	fn rewind_restores_and_truncates() {
		let mut set = MemLeafSet::default();
		for i in 0..20 {
			set.add(LeafIndex::at(i));
		}
		set.remove(LeafIndex::at(3));
		set.remove(LeafIndex::at(4));
		let before = set.root(20);

		// block adds 20..30, spends 3 and 4
		let mut set2 = MemLeafSet {
			bytes: set.bytes.clone(),
			next: set.next,
		};
		for i in 20..30 {
			set2.add(LeafIndex::at(i));
		}
		set2.remove(LeafIndex::at(2));
		set2.remove(LeafIndex::at(7));

		set2.rewind(20, &[LeafIndex::at(2), LeafIndex::at(7)]);
		assert_eq!(set2.next_leaf(), LeafIndex::at(20));
		assert_eq!(set2.root(20), before);
		for i in 20..30 {
			assert!(!set2.contains(LeafIndex::at(i)));
		}
	}

	#[test]
	fn cache_shadows_base() {
		let mut base = MemLeafSet::default();
		base.add(LeafIndex::at(0));
		base.add(LeafIndex::at(1));

		let changes = {
			let mut cache = LeafSetCache::new(&base);
			cache.remove(LeafIndex::at(0));
			cache.add(LeafIndex::at(2));
			assert!(!cache.contains(LeafIndex::at(0)));
			assert!(cache.contains(LeafIndex::at(1)));
			assert_eq!(cache.next_leaf(), LeafIndex::at(3));
			cache.into_changes()
		};
		assert!(base.contains(LeafIndex::at(0)));

		base.apply(&changes);
		assert_eq!(base.leaves(), vec![LeafIndex::at(1), LeafIndex::at(2)]);
		assert_eq!(base.next_leaf(), LeafIndex::at(3));
	}
}
