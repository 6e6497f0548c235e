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

use self::core::core::hash::ZERO_HASH;
use self::core::core::pmmr::{
	self, leaf_hash, node_hash, Error, LeafIndex, MMRCache, ReadableMMR, VecBackend,
	WriteableMMR, MMR,
};
use mweb_core as core;

fn payload(i: u64) -> Vec<u8> {
	format!("leaf {}", i).into_bytes()
}

fn mmr_with(n: u64) -> MMR<VecBackend> {
	let mut mmr = MMR::new(VecBackend::new());
	for i in 0..n {
		mmr.add(payload(i)).unwrap();
	}
	mmr
}

#[test]
fn some_peak_map() {
	assert_eq!(pmmr::peak_map_height(0), (0b0, 0));
	assert_eq!(pmmr::peak_map_height(1), (0b1, 0));
	assert_eq!(pmmr::peak_map_height(2), (0b1, 1));
	assert_eq!(pmmr::peak_map_height(3), (0b10, 0));
	assert_eq!(pmmr::peak_map_height(4), (0b11, 0));
	assert_eq!(pmmr::peak_map_height(5), (0b11, 1));
	assert_eq!(pmmr::peak_map_height(6), (0b11, 2));
	assert_eq!(pmmr::peak_map_height(7), (0b100, 0));
	assert_eq!(pmmr::peak_map_height(u64::MAX), ((u64::MAX >> 1) + 1, 0));
	assert_eq!(pmmr::peak_map_height(u64::MAX - 1), (u64::MAX >> 1, 63));
}

#[test]
fn empty_root_is_zero() {
	let mmr = MMR::new(VecBackend::new());
	assert_eq!(mmr.num_nodes(), 0);
	assert_eq!(mmr.root().unwrap(), ZERO_HASH);
}

#[test]
fn small_roots() {
	let mmr = mmr_with(1);
	let h0 = leaf_hash(0, &payload(0));
	assert_eq!(mmr.root().unwrap(), h0);

	// 3 leaves: peaks at 2 and 3, bagged at the earlier peak
	let mmr = mmr_with(3);
	assert_eq!(mmr.num_nodes(), 4);
	let h1 = leaf_hash(1, &payload(1));
	let h2 = node_hash(2, &h0, &h1);
	let h3 = leaf_hash(3, &payload(2));
	assert_eq!(mmr.get_hash(2).unwrap(), h2);
	assert_eq!(mmr.root().unwrap(), node_hash(2, &h2, &h3));

	// 4 leaves: a single peak at 6
	let mmr = mmr_with(4);
	assert_eq!(mmr.num_nodes(), 7);
	let h4 = leaf_hash(4, &payload(3));
	let h5 = node_hash(5, &h3, &h4);
	let h6 = node_hash(6, &h2, &h5);
	assert_eq!(mmr.root().unwrap(), h6);

	// 7 leaves: peaks at 6, 9 and 10, bagged 9 then 6
	let mmr = mmr_with(7);
	assert_eq!(mmr.num_nodes(), 11);
	let h7 = leaf_hash(7, &payload(4));
	let h8 = leaf_hash(8, &payload(5));
	let h9 = node_hash(9, &h7, &h8);
	let h10 = leaf_hash(10, &payload(6));
	let bagged = node_hash(9, &h9, &h10);
	assert_eq!(mmr.root().unwrap(), node_hash(6, &h6, &bagged));
}

#[test]
fn num_nodes_follows_leaves() {
	for n in 0..100 {
		let mmr = mmr_with(n);
		assert_eq!(mmr.num_leaves(), n);
		assert_eq!(mmr.num_nodes(), LeafIndex::at(n).position());
		assert_eq!(mmr.backend().size(), mmr.num_nodes());
	}
}

#[test]
fn rewind_and_readd_gives_same_root() {
	for n in 1..40 {
		let full = mmr_with(n);
		let root = full.root().unwrap();
		for k in 0..n {
			let mut mmr = mmr_with(n);
			mmr.rewind(LeafIndex::at(k).position()).unwrap();
			assert_eq!(mmr.num_leaves(), k);
			assert_eq!(mmr.root().unwrap(), mmr_with(k).root().unwrap());
			for i in k..n {
				mmr.add(payload(i)).unwrap();
			}
			assert_eq!(mmr.root().unwrap(), root, "n {} k {}", n, k);
		}
	}
}

#[test]
fn rewind_must_land_on_leaf() {
	let mut mmr = mmr_with(4);
	assert_eq!(mmr.rewind(2), Err(Error::InvalidRewind(2)));
	assert_eq!(mmr.rewind(5), Err(Error::InvalidRewind(5)));
	assert_eq!(mmr.rewind(6), Err(Error::InvalidRewind(6)));
	// past the end
	assert_eq!(mmr.rewind(8), Err(Error::InvalidRewind(8)));
	assert_eq!(mmr.num_leaves(), 4);

	assert_eq!(mmr.rewind(7), Ok(()));
	assert_eq!(mmr.rewind(4), Ok(()));
	assert_eq!(mmr.num_leaves(), 3);
}

#[test]
fn leaves_are_retrievable() {
	let mmr = mmr_with(10);
	for i in 0..10 {
		let leaf = mmr.get_leaf(LeafIndex::at(i)).unwrap();
		assert_eq!(leaf.data(), &payload(i)[..]);
		assert_eq!(leaf.index(), LeafIndex::at(i));
		assert_eq!(
			leaf.hash(),
			mmr.get_hash(LeafIndex::at(i).position()).unwrap()
		);
	}
	assert_eq!(
		mmr.get_leaf(LeafIndex::at(10)),
		Err(Error::LeafNotFound(10))
	);
}

#[test]
fn cache_leaves_base_untouched() {
	let base = mmr_with(5);
	let base_root = base.root().unwrap();

	let changes = {
		let mut cache = MMRCache::new(&base);
		for i in 5..9 {
			cache.add(payload(i)).unwrap();
		}
		assert_eq!(cache.num_leaves(), 9);
		assert_eq!(cache.root().unwrap(), mmr_with(9).root().unwrap());
		assert_eq!(cache.get_leaf(LeafIndex::at(2)).unwrap().data(), &payload(2)[..]);
		assert_eq!(cache.get_leaf(LeafIndex::at(7)).unwrap().data(), &payload(7)[..]);
		cache.into_changes()
	};
	assert_eq!(base.root().unwrap(), base_root);
	assert_eq!(changes.first_leaf, LeafIndex::at(5));
	assert_eq!(changes.leaves.len(), 4);

	let mut base = base;
	base.apply(changes).unwrap();
	assert_eq!(base.root().unwrap(), mmr_with(9).root().unwrap());
}

#[test]
fn cache_rewinds_below_base() {
	let mut base = mmr_with(8);
	let changes = {
		let mut cache = MMRCache::new(&base);
		cache.add(payload(8)).unwrap();
		cache.rewind_leaves(3).unwrap();
		assert_eq!(cache.num_leaves(), 3);
		assert_eq!(cache.root().unwrap(), mmr_with(3).root().unwrap());
		cache.add(b"other".to_vec()).unwrap();
		cache.into_changes()
	};
	assert_eq!(changes.first_leaf, LeafIndex::at(3));
	base.apply(changes).unwrap();

	let mut expected = mmr_with(3);
	expected.add(b"other".to_vec()).unwrap();
	assert_eq!(base.root().unwrap(), expected.root().unwrap());
}

#[test]
fn nested_caches() {
	let base = mmr_with(2);
	let mut outer = MMRCache::new(&base);
	outer.add(payload(2)).unwrap();
	let changes = {
		let mut inner = MMRCache::new(&outer);
		inner.add(payload(3)).unwrap();
		inner.into_changes()
	};
	outer.apply(changes).unwrap();
	assert_eq!(outer.root().unwrap(), mmr_with(4).root().unwrap());
}

#[test]
fn pruned_leaf_matches_full_leaf() {
	let full = mmr_with(6);
	let mut pruned = MMR::new(VecBackend::new());
	for i in 0..6 {
		if i % 2 == 0 {
			pruned
				.add_pruned_leaf(leaf_hash(LeafIndex::at(i).position(), &payload(i)))
				.unwrap();
		} else {
			pruned.add(payload(i)).unwrap();
		}
	}
	assert_eq!(pruned.root().unwrap(), full.root().unwrap());
	assert!(pruned.get_leaf(LeafIndex::at(0)).is_err());
}
