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

//! Position arithmetic over the post-order layout of an MMR.

use std::fmt;

use crate::ser::{self, Readable, Reader, Writeable, Writer};

/// 64 bits all ones: 0b11111111...1
const ALL_ONES: u64 = u64::MAX;

/// Returns the 0-based height of the node at 0-based position `pos`.
/// Positions are post-order over a forest of perfect binary trees:
///
/// ```text
///     height 2:        6
///                    /   \
///     height 1:    2       5       9
///                 / \     / \     / \
///     height 0:  0   1   3   4   7   8   10
/// ```
pub fn height(pos: u64) -> u64 {
	peak_map_height(pos).1
}

/// Return (peak_map, pos_height) of given 0-based node pos prior to its
/// addition.
/// Example: on input 4 returns (0b11, 0) as mmr state before adding 4 was
///    2
///   / \
///  0   1   3
/// with 0b11 indicating presence of peaks of height 0 and 1.
/// NOTE:
/// the peak map also encodes the path taken from the root to the added node
/// since the path turns left (resp. right) if-and-only-if
/// a peak at that height is absent (resp. present)
pub fn peak_map_height(mut pos: u64) -> (u64, u64) {
	if pos == 0 {
		return (0, 0);
	}
	let mut peak_size = ALL_ONES >> pos.leading_zeros();
	let mut bitmap = 0;
	while peak_size != 0 {
		bitmap <<= 1;
		if pos >= peak_size {
			pos -= peak_size;
			bitmap |= 1;
		}
		peak_size >>= 1;
	}
	(bitmap, pos)
}

/// sizes of peaks and height of next node in mmr of given size
/// Example: on input 5 returns ([3,1], 1) as mmr state before adding 5 was
///    2
///   / \
///  0   1   3   4
pub fn peak_sizes_height(mut size: u64) -> (Vec<u64>, u64) {
	if size == 0 {
		return (vec![], 0);
	}
	let mut peak_size = ALL_ONES >> size.leading_zeros();
	let mut peak_sizes = vec![];
	while peak_size != 0 {
		if size >= peak_size {
			peak_sizes.push(peak_size);
			size -= peak_size;
		}
		peak_size >>= 1;
	}
	(peak_sizes, size)
}

/// Gets the 0-based positions of the peaks of an MMR of `size` nodes, left
/// to right. Returns None if `size` is not a valid MMR size (the next
/// position would not be a leaf).
pub fn peaks(size: u64) -> Option<Vec<u64>> {
	let (peak_sizes, height) = peak_sizes_height(size);
	if height != 0 {
		return None;
	}
	let mut acc = 0;
	Some(
		peak_sizes
			.iter()
			.map(|x| {
				acc += x;
				acc - 1
			})
			.collect(),
	)
}

/// The number of leaves in an MMR of the provided size.
pub fn num_leaves(size: u64) -> u64 {
	let (peak_map, height) = peak_map_height(size);
	if height == 0 {
		peak_map
	} else {
		peak_map + 1
	}
}

/// 0-based position of the leaf with 0-based ordinal `n`.
pub fn insertion_to_pmmr_index(n: u64) -> u64 {
	2 * n - u64::from(n.count_ones())
}

/// Whether `pos` is the left child of its parent.
fn is_left_sibling(pos: u64) -> bool {
	height(pos + 1) <= height(pos)
}

/// A node position together with its height.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Index {
	position: u64,
	height: u64,
}

impl fmt::Debug for Index {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "Index({}, h{})", self.position, self.height)
	}
}

impl Index {
	/// Node at the given 0-based position.
	pub fn at(position: u64) -> Index {
		Index {
			position,
			height: height(position),
		}
	}

	/// 0-based position.
	pub fn position(&self) -> u64 {
		self.position
	}

	/// Height, 0 for leaves.
	pub fn height(&self) -> u64 {
		self.height
	}

	/// Whether this node is a leaf.
	pub fn is_leaf(&self) -> bool {
		self.height == 0
	}

	/// The node immediately following this one.
	pub fn next(&self) -> Index {
		Index::at(self.position + 1)
	}

	/// Whether this node is the left child of its parent.
	pub fn is_left_sibling(&self) -> bool {
		is_left_sibling(self.position)
	}

	/// Parent of this node.
	pub fn parent(&self) -> Index {
		if self.is_left_sibling() {
			Index {
				position: self.position + (2 << self.height),
				height: self.height + 1,
			}
		} else {
			Index {
				position: self.position + 1,
				height: self.height + 1,
			}
		}
	}

	/// Sibling of this node.
	pub fn sibling(&self) -> Index {
		let position = if self.is_left_sibling() {
			self.position + (2 << self.height) - 1
		} else {
			self.position + 1 - (2 << self.height)
		};
		Index {
			position,
			height: self.height,
		}
	}

	/// Left child. Only valid on interior nodes.
	pub fn left_child(&self) -> Index {
		debug_assert!(!self.is_leaf());
		Index {
			position: self.position - (1 << self.height),
			height: self.height - 1,
		}
	}

	/// Right child. Only valid on interior nodes.
	pub fn right_child(&self) -> Index {
		debug_assert!(!self.is_leaf());
		Index {
			position: self.position - 1,
			height: self.height - 1,
		}
	}
}

/// Index of a leaf, which also knows its ordinal among leaves.
#[derive(Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LeafIndex {
	leaf_idx: u64,
	position: u64,
}

impl fmt::Debug for LeafIndex {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "Leaf({} @{})", self.leaf_idx, self.position)
	}
}

impl LeafIndex {
	/// Leaf with the given 0-based ordinal.
	pub fn at(leaf_idx: u64) -> LeafIndex {
		LeafIndex {
			leaf_idx,
			position: insertion_to_pmmr_index(leaf_idx),
		}
	}

	/// Leaf ordinal.
	pub fn get(&self) -> u64 {
		self.leaf_idx
	}

	/// Position of the leaf node. For the leaf one past the end this is
	/// the number of nodes in the MMR.
	pub fn position(&self) -> u64 {
		self.position
	}

	/// Node index of this leaf.
	pub fn index(&self) -> Index {
		Index {
			position: self.position,
			height: 0,
		}
	}

	/// Following leaf.
	pub fn next(&self) -> LeafIndex {
		LeafIndex::at(self.leaf_idx + 1)
	}
}

impl Writeable for LeafIndex {
	fn write<W: Writer>(&self, writer: &mut W) -> Result<(), ser::Error> {
		writer.write_u64(self.leaf_idx)
	}
}

impl Readable for LeafIndex {
	fn read<R: Reader>(reader: &mut R) -> Result<LeafIndex, ser::Error> {
		Ok(LeafIndex::at(reader.read_u64()?))
	}
}
