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

use self::core::core::{
	aggregate, Block, Error, Header, OutputFeatures, PegInCoin, PegOutCoin, Transaction,
};
use self::core::libtx::build::{self, TxBuilder};
use self::core::libtx::Crypto;
use self::core::ser;
use self::keychain::BlindingFactor;
use mweb_core as core;
use mweb_keychain as keychain;

fn block_from(crypto: &Crypto, height: u64, prev_offset: &BlindingFactor, tx: &Transaction) -> Block {
	let header = Header {
		height,
		kernel_offset: crypto
			.add_blinding_factors(&[prev_offset.clone(), tx.kernel_offset.clone()], &[])
			.unwrap(),
		owner_offset: tx.owner_offset.clone(),
		..Header::default()
	};
	Block::new(header, tx.body.clone())
}

fn pegin_tx(crypto: &Crypto, amount: u64) -> Transaction {
	TxBuilder::new(crypto)
		.pegged_in_output(amount)
		.pegin(amount)
		.build()
		.unwrap()
		.0
}

#[test]
fn valid_block() {
	let crypto = Crypto::new();
	let prev = crypto.with_secp(|secp| BlindingFactor::rand(secp));
	let tx = pegin_tx(&crypto, 1_000);
	let block = block_from(&crypto, 5, &prev, &tx);

	let pegins = block.pegins();
	assert_eq!(pegins.len(), 1);
	assert_eq!(pegins[0].amount, 1_000);
	assert_eq!(block.validate(&crypto, &prev, &pegins, &[]), Ok(()));

	// the cumulative offset only balances against the right predecessor
	assert_eq!(
		block.validate(&crypto, &BlindingFactor::zero(), &pegins, &[]),
		Err(Error::BlockSums)
	);
}

#[test]
fn pegins_compare_as_multiset() {
	let crypto = Crypto::new();
	let txs = vec![pegin_tx(&crypto, 10), pegin_tx(&crypto, 20)];
	let tx = aggregate(&crypto, txs).unwrap();
	let block = block_from(&crypto, 1, &BlindingFactor::zero(), &tx);

	let mut expected = block.pegins();
	expected.reverse();
	let zero = BlindingFactor::zero();
	assert_eq!(block.validate(&crypto, &zero, &expected, &[]), Ok(()));

	assert_eq!(
		block.validate(&crypto, &zero, &expected[..1], &[]),
		Err(Error::PegInMismatch)
	);
	let mut doubled = expected.clone();
	doubled.push(expected[0].clone());
	assert_eq!(
		block.validate(&crypto, &zero, &doubled, &[]),
		Err(Error::PegInMismatch)
	);
	let wrong = vec![
		PegInCoin {
			amount: 11,
			kernel_id: expected[0].kernel_id,
		},
		expected[1].clone(),
	];
	assert_eq!(
		block.validate(&crypto, &zero, &wrong, &[]),
		Err(Error::PegInMismatch)
	);
}

#[test]
fn pegouts_must_match() {
	let crypto = Crypto::new();
	let funding = build::coin(&crypto, 100, OutputFeatures::empty()).unwrap();
	let (tx, _) = TxBuilder::new(&crypto)
		.spend(&funding)
		.output(40)
		.pegout(59, vec![0x00, 0x14])
		.fee(1)
		.build()
		.unwrap();
	let block = block_from(&crypto, 3, &BlindingFactor::zero(), &tx);
	let zero = BlindingFactor::zero();

	let expected = vec![PegOutCoin {
		amount: 59,
		script_pubkey: vec![0x00, 0x14],
	}];
	assert_eq!(block.validate(&crypto, &zero, &[], &expected), Ok(()));
	assert_eq!(
		block.validate(&crypto, &zero, &[], &[]),
		Err(Error::PegOutMismatch)
	);
	let other_script = vec![PegOutCoin {
		amount: 59,
		script_pubkey: vec![0x51],
	}];
	assert_eq!(
		block.validate(&crypto, &zero, &[], &other_script),
		Err(Error::PegOutMismatch)
	);
}

#[test]
fn lock_height_enforced() {
	let crypto = Crypto::new();
	let (tx, _) = TxBuilder::new(&crypto)
		.pegged_in_output(5)
		.pegin(5)
		.lock_height(11)
		.build()
		.unwrap();
	let zero = BlindingFactor::zero();
	let pegins = tx.body.pegins();

	let early = block_from(&crypto, 10, &zero, &tx);
	assert_eq!(
		early.validate(&crypto, &zero, &pegins, &[]),
		Err(Error::KernelLockHeight(11))
	);
	let on_time = block_from(&crypto, 11, &zero, &tx);
	assert_eq!(on_time.validate(&crypto, &zero, &pegins, &[]), Ok(()));
}

#[test]
fn empty_block() {
	let crypto = Crypto::new();
	let prev = crypto.with_secp(|secp| BlindingFactor::rand(secp));
	let header = Header {
		height: 2,
		kernel_offset: prev.clone(),
		..Header::default()
	};
	let block = Block::new(header, Default::default());
	assert_eq!(block.validate(&crypto, &prev, &[], &[]), Ok(()));
}

#[test]
fn header_hash_covers_fields() {
	let header = Header {
		height: 7,
		num_txos: 3,
		num_kernels: 1,
		..Header::default()
	};
	let bytes = ser::ser_vec(&header).unwrap();
	let back: Header = ser::deserialize_exact(&bytes).unwrap();
	assert_eq!(back, header);

	let mut other = header.clone();
	other.num_txos = 4;
	assert_ne!(
		Block::new(header, Default::default()).hash(),
		Block::new(other, Default::default()).hash()
	);
}
