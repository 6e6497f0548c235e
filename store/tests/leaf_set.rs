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

use self::core::core::pmmr::{LeafIndex, ReadableLeafSet, WriteableLeafSet};
use self::store::leaf_set::LeafSet;
use mweb_core as core;
use mweb_store as store;
use mweb_util as util;

fn setup(tag: &str) -> String {
	util::init_test_logger();
	let data_dir = format!("target/tmp/leaf_set_{}", tag);
	let _ = fs::remove_dir_all(&data_dir);
	fs::create_dir_all(&data_dir).unwrap();
	data_dir
}

#[test]
fn commit_and_reopen() {
	let data_dir = setup("commit");
	let path = format!("{}/leafset.bin", data_dir);
	let root = {
		let mut leaf_set = LeafSet::open(&path).unwrap();
		for n in 0..10 {
			leaf_set.add(LeafIndex::at(n));
		}
		leaf_set.remove(LeafIndex::at(3));
		assert!(leaf_set.is_dirty());
		leaf_set.commit().unwrap();
		assert!(!leaf_set.is_dirty());
		leaf_set.root(10)
	};

	// header plus two bytes
	assert_eq!(fs::metadata(&path).unwrap().len(), 10);

	let leaf_set = LeafSet::open(&path).unwrap();
	assert_eq!(leaf_set.next_leaf(), LeafIndex::at(10));
	assert!(leaf_set.contains(LeafIndex::at(2)));
	assert!(!leaf_set.contains(LeafIndex::at(3)));
	assert_eq!(leaf_set.get_byte(0), 0b1110_1111);
	assert_eq!(leaf_set.get_byte(1), 0b1100_0000);
	assert_eq!(leaf_set.root(10), root);
	let _ = fs::remove_dir_all(data_dir);
}

#[test]
fn rollback_forgets_staged() {
	let data_dir = setup("rollback");
	let path = format!("{}/leafset.bin", data_dir);
	let mut leaf_set = LeafSet::open(&path).unwrap();
	for n in 0..4 {
		leaf_set.add(LeafIndex::at(n));
	}
	leaf_set.commit().unwrap();

	leaf_set.remove(LeafIndex::at(0));
	leaf_set.add(LeafIndex::at(4));
	assert!(!leaf_set.contains(LeafIndex::at(0)));
	leaf_set.rollback();

	assert!(!leaf_set.is_dirty());
	assert_eq!(leaf_set.next_leaf(), LeafIndex::at(4));
	assert!(leaf_set.contains(LeafIndex::at(0)));
	assert!(!leaf_set.contains(LeafIndex::at(4)));
	let _ = fs::remove_dir_all(data_dir);
}

#[test]
fn rewind_shrinks_file() {
	let data_dir = setup("rewind");
	let path = format!("{}/leafset.bin", data_dir);
	let mut leaf_set = LeafSet::open(&path).unwrap();
	for n in 0..20 {
		leaf_set.add(LeafIndex::at(n));
	}
	leaf_set.remove(LeafIndex::at(5));
	leaf_set.commit().unwrap();

	// undo the spend of leaf 5 and drop everything from leaf 9 on
	leaf_set.rewind(9, &[LeafIndex::at(5)]);
	leaf_set.commit().unwrap();
	assert_eq!(fs::metadata(&path).unwrap().len(), 10);

	let leaf_set = LeafSet::open(&path).unwrap();
	assert_eq!(leaf_set.next_leaf(), LeafIndex::at(9));
	assert_eq!(leaf_set.leaves().len(), 9);
	assert_eq!(leaf_set.get_byte(1), 0b1000_0000);
	let _ = fs::remove_dir_all(data_dir);
}
