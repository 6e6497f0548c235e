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


use self::chain::Error;
use self::chain_test_helper::{
	clean_output_dir, init_chain, init_compacting_chain, mine, pegin_tx, setup, spend_tx,
	MemoryHeaderProvider,
};
use self::core::core::{Header, OutputFeatures, PegInCoin};
use self::core::libtx::build;
use self::core::libtx::Crypto;
use mweb_chain as chain;
use mweb_core as core;
use mweb_util as util;
use std::fs;
use std::path::Path;
use std::sync::Arc;

#[test]
fn mine_and_spend() {
	let chain_dir = ".mweb.mine_and_spend";
	let (chain, headers, crypto) = setup(chain_dir);
	assert_eq!(chain.head_header(), Header::default());

	let (tx, coins) = pegin_tx(&crypto, &[50, 25]);
	let b1 = mine(&chain, &headers, vec![tx]);
	assert_eq!(b1.height(), 1);
	assert_eq!(chain.head_header(), b1.header);
	assert_eq!(b1.header.num_txos, 2);
	assert_eq!(b1.header.num_kernels, 1);

	let (tx, change) = spend_tx(&crypto, &[&coins[0]], &[45], 5);
	let b2 = mine(&chain, &headers, vec![tx]);
	assert_eq!(b2.height(), 2);
	assert_eq!(b2.header.num_txos, 3);

	assert!(chain.get_utxos(&coins[0].output.commit).unwrap().is_empty());
	let utxos = chain.get_utxos(&change[0].output.commit).unwrap();
	assert_eq!(utxos.len(), 1);
	assert_eq!(utxos[0].height, 2);
	assert_eq!(utxos[0].leaf_idx.get(), 2);
	assert_eq!(chain.get_utxos(&coins[1].output.commit).unwrap()[0].height, 1);

	chain.validate().unwrap();
	clean_output_dir(chain_dir);
}

#[test]
fn several_txs_per_block() {
	let chain_dir = ".mweb.several_txs_per_block";
	let (chain, headers, crypto) = setup(chain_dir);

	let (tx1, c1) = pegin_tx(&crypto, &[10]);
	let (tx2, c2) = pegin_tx(&crypto, &[20]);
	let b1 = mine(&chain, &headers, vec![tx1, tx2]);
	assert_eq!(b1.kernels().len(), 2);
	assert_eq!(b1.pegins().len(), 2);
	assert_eq!(b1.header.num_txos, 2);

	let (tx3, _) = spend_tx(&crypto, &[&c1[0]], &[9], 1);
	let (tx4, _) = spend_tx(&crypto, &[&c2[0]], &[18], 2);
	mine(&chain, &headers, vec![tx3, tx4]);
	chain.validate().unwrap();
	clean_output_dir(chain_dir);
}

#[test]
fn reopen_keeps_head() {
	let chain_dir = ".mweb.reopen_keeps_head";
	let (chain, headers, crypto) = setup(chain_dir);
	let (tx, coins) = pegin_tx(&crypto, &[7, 8]);
	mine(&chain, &headers, vec![tx]);
	let (tx, _) = spend_tx(&crypto, &[&coins[1]], &[8], 0);
	let b2 = mine(&chain, &headers, vec![tx]);
	drop(chain);

	let chain = init_chain(chain_dir, &crypto, headers.clone());
	assert_eq!(chain.head_header(), b2.header);
	assert_eq!(chain.get_utxos(&coins[0].output.commit).unwrap().len(), 1);

	// and the state keeps moving from there
	let (tx, _) = spend_tx(&crypto, &[&coins[0]], &[6], 1);
	mine(&chain, &headers, vec![tx]);
	chain.validate().unwrap();
	clean_output_dir(chain_dir);
}

#[test]
fn undo_restores_previous_state() {
	let chain_dir = ".mweb.undo_restores_previous_state";
	let (chain, headers, crypto) = setup(chain_dir);
	let (tx, coins) = pegin_tx(&crypto, &[100]);
	let b1 = mine(&chain, &headers, vec![tx]);
	let (tx, created) = spend_tx(&crypto, &[&coins[0]], &[60, 39], 1);
	let b2 = mine(&chain, &headers, vec![tx]);

	assert_eq!(chain.undo_block(), Ok(b1.header.clone()));
	assert_eq!(chain.head_header(), b1.header);
	let restored = chain.get_utxos(&coins[0].output.commit).unwrap();
	assert_eq!(restored.len(), 1);
	assert_eq!(restored[0].height, 1);
	assert_eq!(restored[0].leaf_idx.get(), 0);
	for coin in &created {
		assert!(chain.get_utxos(&coin.output.commit).unwrap().is_empty());
	}
	chain.validate().unwrap();

	// the same block applies again on the restored state
	assert_eq!(chain.process_block(&b2), Ok(b2.header.clone()));
	assert_eq!(chain.undo_block(), Ok(b1.header.clone()));
	assert_eq!(chain.undo_block(), Ok(Header::default()));
	assert!(chain.undo_block().is_err());
	assert!(chain.get_utxos(&coins[0].output.commit).unwrap().is_empty());

	assert_eq!(chain.process_block(&b1), Ok(b1.header.clone()));
	assert_eq!(chain.connect_block(&b2.hash()), Ok(b2.header.clone()));
	clean_output_dir(chain_dir);
}

#[test]
fn unfit_blocks() {
	let chain_dir = ".mweb.unfit_blocks";
	let (chain, headers, crypto) = setup(chain_dir);
	let (tx, coins) = pegin_tx(&crypto, &[10]);
	let b1 = mine(&chain, &headers, vec![tx]);

	// already applied
	match chain.process_block(&b1) {
		Err(Error::Unfit(_)) => {}
		other => panic!("expected unfit, got {:?}", other),
	}

	// not on the base chain
	let (tx, _) = spend_tx(&crypto, &[&coins[0]], &[10], 0);
	let b2 = chain.build_next_block(vec![tx]).unwrap();
	match chain.process_block(&b2) {
		Err(Error::Unfit(_)) => {}
		other => panic!("expected unfit, got {:?}", other),
	}
	match chain.connect_block(&b2.hash()) {
		Err(Error::Unfit(_)) => {}
		other => panic!("expected unfit, got {:?}", other),
	}

	// tampered header, unknown to the base chain
	let mut tampered = b2.clone();
	tampered.header.num_kernels += 1;
	headers.add_block(&b2);
	assert!(chain.process_block(&tampered).is_err());
	assert_eq!(chain.head_header(), b1.header);

	assert_eq!(chain.process_block(&b2), Ok(b2.header.clone()));
	clean_output_dir(chain_dir);
}

#[test]
fn heights_must_follow_head() {
	let chain_dir = ".mweb.heights_must_follow_head";
	let (chain, headers, crypto) = setup(chain_dir);

	// an empty chain only takes height 1
	let (tx, _) = pegin_tx(&crypto, &[10]);
	let mut far = chain.build_next_block(vec![tx.clone()]).unwrap();
	far.header.height = 1_000_000;
	headers.add_block(&far);
	match chain.process_block(&far) {
		Err(Error::Unfit(_)) => {}
		other => panic!("expected unfit, got {:?}", other),
	}
	assert_eq!(chain.head_header(), Header::default());

	let b1 = mine(&chain, &headers, vec![tx]);
	assert_eq!(b1.height(), 1);

	let mut skip = chain.build_next_block(vec![]).unwrap();
	skip.header.height = 3;
	headers.add_block(&skip);
	match chain.process_block(&skip) {
		Err(Error::Unfit(_)) => {}
		other => panic!("expected unfit, got {:?}", other),
	}
	assert_eq!(chain.head_header(), b1.header);
	clean_output_dir(chain_dir);
}

#[test]
fn pegs_must_match_base_chain() {
	let chain_dir = ".mweb.pegs_must_match_base_chain";
	let (chain, headers, crypto) = setup(chain_dir);
	let (tx, _) = pegin_tx(&crypto, &[10]);
	let block = chain.build_next_block(vec![tx]).unwrap();
	headers.add_block(&block);

	let pegin = &block.pegins()[0];
	let wrong = PegInCoin {
		amount: 11,
		kernel_id: pegin.kernel_id,
	};
	headers.expect_pegs(block.hash(), vec![wrong], vec![]);
	let res = chain.process_block(&block);
	assert_eq!(res, Err(Error::PegInMismatch));
	assert!(res.unwrap_err().is_bad_data());
	assert_eq!(chain.head_header(), Header::default());

	headers.expect_pegs(block.hash(), vec![], vec![]);
	assert_eq!(chain.process_block(&block), Err(Error::PegInMismatch));

	headers.expect_pegs(block.hash(), block.pegins(), vec![]);
	assert_eq!(chain.process_block(&block), Ok(block.header.clone()));
	clean_output_dir(chain_dir);
}

#[test]
fn bad_roots_rejected() {
	let chain_dir = ".mweb.bad_roots_rejected";
	let (chain, headers, crypto) = setup(chain_dir);
	let (tx, _) = pegin_tx(&crypto, &[10]);
	let mut block = chain.build_next_block(vec![tx]).unwrap();
	block.header.output_root = block.header.kernel_root;
	headers.add_block(&block);

	match chain.process_block(&block) {
		Err(Error::MmrMismatch(_)) => {}
		other => panic!("expected mmr mismatch, got {:?}", other),
	}
	assert_eq!(chain.head_header(), Header::default());
	assert!(chain.snapshot().unwrap().utxos.is_empty());
	clean_output_dir(chain_dir);
}

#[test]
fn spending_unknown_output() {
	let chain_dir = ".mweb.spending_unknown_output";
	let (chain, headers, crypto) = setup(chain_dir);
	let (tx, _) = pegin_tx(&crypto, &[10]);
	mine(&chain, &headers, vec![tx]);

	let stranger = build::coin(&crypto, 10, OutputFeatures::empty()).unwrap();
	let (tx, _) = spend_tx(&crypto, &[&stranger], &[10], 0);
	assert_eq!(
		chain.build_next_block(vec![tx]),
		Err(Error::UtxoMissing(stranger.output.commit))
	);
	let err = Error::UtxoMissing(stranger.output.commit);
	assert!(err.is_bad_data());
	assert_eq!(chain.head_header().height, 1);
	clean_output_dir(chain_dir);
}

#[test]
fn failed_compaction_keeps_block() {
	let chain_dir = ".mweb.failed_compaction_keeps_block";
	util::init_test_logger();
	clean_output_dir(chain_dir);
	let crypto = Crypto::new();
	let headers = Arc::new(MemoryHeaderProvider::default());
	let chain = init_compacting_chain(chain_dir, &crypto, headers.clone(), 2);

	let (tx, coins) = pegin_tx(&crypto, &[50, 25]);
	mine(&chain, &headers, vec![tx]);

	// the next generation of the output hash file cannot be created
	let blocker = Path::new(chain_dir).join("coins/output/pmmr_hash_1.bin");
	fs::create_dir_all(&blocker).unwrap();

	let (tx, change) = spend_tx(&crypto, &[&coins[0], &coins[1]], &[70], 5);
	let b2 = chain.build_next_block(vec![tx]).unwrap();
	headers.add_block(&b2);
	assert_eq!(chain.process_block(&b2), Ok(b2.header.clone()));
	assert_eq!(chain.head_header(), b2.header);
	assert!(chain.get_utxos(&coins[0].output.commit).unwrap().is_empty());
	assert!(chain.get_utxos(&coins[1].output.commit).unwrap().is_empty());
	assert_eq!(chain.get_utxos(&change[0].output.commit).unwrap().len(), 1);
	chain.validate().unwrap();

	// still usable, and compacts once the file can be written
	fs::remove_dir_all(&blocker).unwrap();
	assert_eq!(chain.compact(), Ok(2));
	chain.validate().unwrap();
	match chain.undo_block() {
		Err(Error::InvalidState(_)) => {}
		other => panic!("expected undo data gone, got {:?}", other),
	}

	// and reopens at the compacted generation
	drop(chain);
	let chain = init_chain(chain_dir, &crypto, headers);
	assert_eq!(chain.head_header(), b2.header);
	chain.validate().unwrap();
	clean_output_dir(chain_dir);
}
