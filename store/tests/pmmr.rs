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
use std::sync::Arc;

use self::core::core::pmmr::{
	Error, LeafIndex, ReadableMMR, VecBackend, WriteableLeafSet, WriteableMMR, MMR,
};
use self::store::leaf_set::LeafSet;
use self::store::pmmr::PMMRBackend;
use self::store::prune_list::build_compact_bitset;
use self::store::Store;
use mweb_core as core;
use mweb_store as store;
use mweb_util as util;

const PREFIX: u8 = b'O';

fn payload(i: u64) -> Vec<u8> {
	format!("output {}", i).into_bytes()
}

fn setup(tag: &str) -> (String, Arc<Store>) {
	util::init_test_logger();
	let data_dir = format!("target/tmp/pmmr_{}", tag);
	let _ = fs::remove_dir_all(&data_dir);
	let store = Store::new(&data_dir, None, None, None).unwrap();
	(data_dir, Arc::new(store))
}

fn teardown(data_dir: String) {
	let _ = fs::remove_dir_all(data_dir);
}

fn open(data_dir: &str, store: &Arc<Store>, file_index: u32) -> MMR<PMMRBackend> {
	let backend =
		PMMRBackend::new(format!("{}/output", data_dir), PREFIX, store.clone(), file_index).unwrap();
	MMR::new(backend)
}

fn commit(store: &Store, mmr: &mut MMR<PMMRBackend>) {
	let batch = store.batch().unwrap();
	mmr.backend().write_leaves(&batch).unwrap();
	mmr.backend_mut().commit().unwrap();
	batch.commit().unwrap();
}

fn vec_mmr(leaves: &[Vec<u8>]) -> MMR<VecBackend> {
	let mut mmr = MMR::new(VecBackend::new());
	for l in leaves {
		mmr.add(l.clone()).unwrap();
	}
	mmr
}

#[test]
fn file_backed_matches_vec() {
	let (data_dir, store) = setup("matches_vec");
	let leaves: Vec<Vec<u8>> = (0..9).map(payload).collect();
	{
		let mut mmr = open(&data_dir, &store, 0);
		for l in &leaves[..4] {
			mmr.add(l.clone()).unwrap();
		}
		commit(&store, &mut mmr);
		for l in &leaves[4..] {
			mmr.add(l.clone()).unwrap();
		}
		// staged leaves are readable before commit
		assert_eq!(mmr.get_leaf(LeafIndex::at(6)).unwrap().data(), &leaves[6][..]);
		commit(&store, &mut mmr);
		assert_eq!(mmr.root().unwrap(), vec_mmr(&leaves).root().unwrap());
	}

	let mmr = open(&data_dir, &store, 0);
	assert_eq!(mmr.num_leaves(), 9);
	assert_eq!(mmr.num_nodes(), 16);
	assert_eq!(mmr.root().unwrap(), vec_mmr(&leaves).root().unwrap());
	for i in 0..9 {
		let leaf = mmr.get_leaf(LeafIndex::at(i)).unwrap();
		assert_eq!(leaf.data(), &leaves[i as usize][..]);
	}
	teardown(data_dir);
}

#[test]
fn discard_drops_staged() {
	let (data_dir, store) = setup("discard");
	let mut mmr = open(&data_dir, &store, 0);
	for i in 0..3 {
		mmr.add(payload(i)).unwrap();
	}
	commit(&store, &mut mmr);
	let root = mmr.root().unwrap();

	mmr.add(payload(3)).unwrap();
	mmr.add(payload(4)).unwrap();
	// back past the committed leaves too
	mmr.rewind_leaves(1).unwrap();
	mmr.backend_mut().discard();

	assert_eq!(mmr.num_leaves(), 3);
	assert_eq!(mmr.root().unwrap(), root);
	assert_eq!(
		mmr.get_leaf(LeafIndex::at(3)),
		Err(Error::LeafNotFound(3))
	);
	assert_eq!(mmr.get_leaf(LeafIndex::at(2)).unwrap().data(), &payload(2)[..]);
	teardown(data_dir);
}

#[test]
fn rewind_then_commit() {
	let (data_dir, store) = setup("rewind");
	let old_hash = {
		let mut mmr = open(&data_dir, &store, 0);
		for i in 0..8 {
			mmr.add(payload(i)).unwrap();
		}
		commit(&store, &mut mmr);
		let old_hash = mmr.get_leaf(LeafIndex::at(6)).unwrap().hash();

		mmr.rewind_leaves(5).unwrap();
		mmr.add(b"replacement 5".to_vec()).unwrap();
		mmr.add(b"replacement 6".to_vec()).unwrap();
		commit(&store, &mut mmr);
		old_hash
	};

	let mut expected: Vec<Vec<u8>> = (0..5).map(payload).collect();
	expected.push(b"replacement 5".to_vec());
	expected.push(b"replacement 6".to_vec());

	let mmr = open(&data_dir, &store, 0);
	assert_eq!(mmr.num_leaves(), 7);
	assert_eq!(mmr.root().unwrap(), vec_mmr(&expected).root().unwrap());
	assert_eq!(
		mmr.get_leaf(LeafIndex::at(6)).unwrap().data(),
		&b"replacement 6"[..]
	);
	// payloads of rewound leaves are gone
	assert_eq!(store.get(&store::to_key(PREFIX, old_hash)).unwrap(), None);
	teardown(data_dir);
}

#[test]
fn compaction_keeps_root() {
	let (data_dir, store) = setup("compact");
	let leaves: Vec<Vec<u8>> = (0..16).map(payload).collect();

	let mut leaf_set = LeafSet::open(format!("{}/leafset.bin", data_dir)).unwrap();
	let mut mmr = open(&data_dir, &store, 0);
	for l in &leaves {
		let idx = mmr.add(l.clone()).unwrap();
		leaf_set.add(idx);
	}
	commit(&store, &mut mmr);
	for spent in &[0, 1, 2, 3, 8] {
		leaf_set.remove(LeafIndex::at(*spent));
	}
	let root = mmr.root().unwrap();

	let bitset = build_compact_bitset(16, &leaf_set).unwrap();
	assert_eq!(bitset.iter().collect::<Vec<u32>>(), vec![0, 1, 2, 3, 4, 5]);

	let pruned = mmr.backend_mut().compact(1, &bitset).unwrap();
	assert_eq!(pruned.len(), 4);
	assert_eq!(mmr.backend().prune_list().total_shift(), 6);
	assert_eq!(mmr.num_nodes(), 31);
	assert_eq!(mmr.root().unwrap(), root);
	assert_eq!(mmr.get_hash(2), Err(Error::HashNotFound(2)));
	assert!(mmr.get_hash(6).is_ok());
	// spent leaf 8 stays, its sibling is unspent
	assert_eq!(mmr.get_leaf(LeafIndex::at(8)).unwrap().data(), &leaves[8][..]);
	assert_eq!(mmr.get_leaf(LeafIndex::at(9)).unwrap().data(), &leaves[9][..]);

	// below the compaction horizon
	assert_eq!(mmr.rewind_leaves(2), Err(Error::InvalidRewind(3)));

	mmr.add(payload(16)).unwrap();
	commit(&store, &mut mmr);
	drop(mmr);

	let mut all = leaves.clone();
	all.push(payload(16));
	let mmr = open(&data_dir, &store, 1);
	assert_eq!(mmr.num_leaves(), 17);
	assert_eq!(mmr.root().unwrap(), vec_mmr(&all).root().unwrap());
	teardown(data_dir);
}

#[test]
fn previous_generation_survives_compaction() {
	let (data_dir, store) = setup("generations");
	let mut leaf_set = LeafSet::open(format!("{}/leafset.bin", data_dir)).unwrap();
	let mut mmr = open(&data_dir, &store, 0);
	for i in 0..8 {
		let idx = mmr.add(payload(i)).unwrap();
		leaf_set.add(idx);
	}
	commit(&store, &mut mmr);
	for spent in 0..4 {
		leaf_set.remove(LeafIndex::at(spent));
	}
	let root = mmr.root().unwrap();

	let bitset = build_compact_bitset(8, &leaf_set).unwrap();
	mmr.backend_mut().compact(1, &bitset).unwrap();
	assert_eq!(mmr.root().unwrap(), root);
	assert!(mmr.backend_mut().compact(1, &bitset).is_err());

	// generation 0 is still whole until dropped
	let previous = open(&data_dir, &store, 0);
	assert_eq!(previous.num_nodes(), 15);
	assert_eq!(previous.root().unwrap(), root);
	assert!(previous.get_hash(2).is_ok());
	drop(previous);

	let output_dir = format!("{}/output", data_dir);
	mmr.backend().drop_stale_files().unwrap();
	assert!(fs::metadata(format!("{}/pmmr_hash.bin", output_dir)).is_err());
	assert!(fs::metadata(format!("{}/pmmr_hash_1.bin", output_dir)).is_ok());
	assert!(fs::metadata(format!("{}/pmmr_prun_1.bin", output_dir)).is_ok());
	drop(mmr);

	let mmr = open(&data_dir, &store, 1);
	assert_eq!(mmr.root().unwrap(), root);
	teardown(data_dir);
}
