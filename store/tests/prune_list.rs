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

use std::fs;

use rand::{thread_rng, Rng};

use self::core::core::pmmr::{self, LeafIndex, ReadableLeafSet, WriteableLeafSet};
use self::store::leaf_set::LeafSet;
use self::store::prune_list::{build_compact_bitset, PruneList};
use mweb_core as core;
use mweb_store as store;
use mweb_util as util;

fn setup(tag: &str) -> String {
	util::init_test_logger();
	let data_dir = format!("target/tmp/prune_list_{}", tag);
	let _ = fs::remove_dir_all(&data_dir);
	fs::create_dir_all(&data_dir).unwrap();
	data_dir
}

fn random_leaf_set(data_dir: &str, num_leaves: u64) -> LeafSet {
	let mut rng = thread_rng();
	let mut leaf_set = LeafSet::open(format!("{}/leafset.bin", data_dir)).unwrap();
	for n in 0..num_leaves {
		leaf_set.add(LeafIndex::at(n));
	}
	for n in 0..num_leaves {
		if rng.gen_bool(0.7) {
			leaf_set.remove(LeafIndex::at(n));
		}
	}
	leaf_set
}

#[test]
fn unspent_paths_survive() {
	let data_dir = setup("unspent_paths");
	for num_leaves in &[1u64, 2, 7, 16, 33, 100] {
		let leaf_set = random_leaf_set(&data_dir, *num_leaves);
		let num_nodes = LeafIndex::at(*num_leaves).position();
		let bitset = build_compact_bitset(*num_leaves, &leaf_set).unwrap();

		let peaks = pmmr::peaks(num_nodes).unwrap();
		for peak in &peaks {
			assert!(!bitset.contains(*peak as u32));
		}
		// everything on the path from an unspent leaf up to its peak is
		// kept, along with the siblings along the way
		for idx in leaf_set.leaves() {
			let mut node = idx.index();
			while !peaks.contains(&node.position()) {
				assert!(!bitset.contains(node.position() as u32));
				assert!(!bitset.contains(node.sibling().position() as u32));
				node = node.parent();
			}
		}
		assert!(bitset.iter().all(|pos| u64::from(pos) < num_nodes));
	}
	let _ = fs::remove_dir_all(data_dir);
}

#[test]
fn fully_spent_subtrees_collapse() {
	let data_dir = setup("spent_subtrees");
	let mut leaf_set = LeafSet::open(format!("{}/leafset.bin", data_dir)).unwrap();
	for n in 0..8 {
		leaf_set.add(LeafIndex::at(n));
	}
	for n in 0..4 {
		leaf_set.remove(LeafIndex::at(n));
	}
	assert_eq!(leaf_set.leaves().len(), 4);

	// the left half goes, except its root which the right half still needs
	let bitset = build_compact_bitset(8, &leaf_set).unwrap();
	assert_eq!(bitset.iter().collect::<Vec<u32>>(), vec![0, 1, 2, 3, 4, 5]);
	assert!(!bitset.contains(6));
	let _ = fs::remove_dir_all(data_dir);
}

#[test]
fn shift_is_monotonic() {
	let data_dir = setup("shift");
	let leaf_set = random_leaf_set(&data_dir, 200);
	let bitset = build_compact_bitset(200, &leaf_set).unwrap();

	assert_eq!(PruneList::open(&data_dir, 0).unwrap().total_shift(), 0);
	let prune_list = PruneList::create(&data_dir, 1, bitset.clone()).unwrap();

	let num_nodes = LeafIndex::at(200).position();
	let mut expected = 0;
	for pos in 0..num_nodes {
		assert_eq!(prune_list.get_shift(pos), expected);
		if prune_list.is_pruned(pos) {
			expected += 1;
		}
	}
	assert_eq!(prune_list.get_shift(num_nodes), prune_list.total_shift());
	assert_eq!(prune_list.total_shift(), bitset.cardinality());
	let _ = fs::remove_dir_all(data_dir);
}

#[test]
fn generations_on_disk() {
	let data_dir = setup("generations");
	assert!(PruneList::create(&data_dir, 0, croaring::Bitmap::create()).is_err());

	let mut first = croaring::Bitmap::create();
	first.add_many(&[0, 1, 2]);
	let prune_list = PruneList::create(&data_dir, 1, first).unwrap();
	assert!(fs::metadata(format!("{}/pmmr_prun_1.bin", data_dir)).is_ok());

	let reopened = PruneList::open(&data_dir, 1).unwrap();
	assert_eq!(reopened.file_index(), 1);
	assert_eq!(reopened.total_shift(), 3);
	assert_eq!(reopened.get_shift(4), 3);

	let mut second = prune_list.bitmap().clone();
	second.add_many(&[3, 4, 5]);
	PruneList::create(&data_dir, 2, second).unwrap();

	// both generations stay readable
	assert_eq!(PruneList::open(&data_dir, 1).unwrap().total_shift(), 3);
	let reopened = PruneList::open(&data_dir, 2).unwrap();
	assert_eq!(reopened.total_shift(), 6);
	assert!(reopened.is_pruned(5));
	assert!(!reopened.is_pruned(6));

	// a generation that was never written
	assert!(PruneList::open(&data_dir, 7).is_err());
	let _ = fs::remove_dir_all(data_dir);
}
