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

//! Utility functions to build transactions. Key management is out of scope
//! here: every secret is random and handed back to the caller in a `Coin`
//! so the outputs can be spent later.
//!
//! ```ignore
//! let (tx, coins) = TxBuilder::new(&crypto)
//!     .spend(&coin)
//!     .output(6)
//!     .fee(4)
//!     .build()?;
//! ```

use crate::core::transaction::{
	Error, Input, Kernel, Output, OutputFeatures, PegOutCoin, SignedMessage, Transaction, TxBody,
};
use crate::core::hash::Hash;
use crate::keychain::BlindingFactor;
use crate::libtx::Crypto;

/// An output together with the secrets needed to spend it.
#[derive(Debug, Clone)]
pub struct Coin {
	/// Value
	pub amount: u64,
	/// Blinding factor of the commitment
	pub blind: BlindingFactor,
	/// Secret behind the sender public key
	pub sender_key: BlindingFactor,
	/// Secret behind the receiver public key
	pub receiver_key: BlindingFactor,
	/// The output itself
	pub output: Output,
}

impl Coin {
	/// Input spending this coin.
	pub fn input(&self) -> Input {
		Input::spending(&self.output)
	}
}

fn rand_key(crypto: &Crypto) -> BlindingFactor {
	crypto.with_secp(|secp| BlindingFactor::rand(secp))
}

/// New coin of `amount` with fresh random keys.
pub fn coin(crypto: &Crypto, amount: u64, features: OutputFeatures) -> Result<Coin, Error> {
	let blind = rand_key(crypto);
	let sender_key = rand_key(crypto);
	let receiver_key = rand_key(crypto);

	let commit = crypto.commit_blinded(amount, &blind)?;
	let proof = crypto.generate_range_proof(amount, &blind)?;
	let receiver_pubkey = crypto.calculate_public_key(&receiver_key)?;
	let output = Output::create(
		crypto,
		features,
		commit,
		&sender_key,
		receiver_pubkey,
		proof,
	)?;
	Ok(Coin {
		amount,
		blind,
		sender_key,
		receiver_key,
		output,
	})
}

/// Owner signature over `msg_hash`.
pub fn owner_sig(
	crypto: &Crypto,
	key: &BlindingFactor,
	msg_hash: Hash,
) -> Result<SignedMessage, Error> {
	Ok(SignedMessage {
		msg_hash,
		pubkey: crypto.calculate_public_key(key)?,
		signature: crypto.build_signature(key, &msg_hash)?,
	})
}

/// Builds a single kernel transaction spending and creating coins.
pub struct TxBuilder<'a> {
	crypto: &'a Crypto,
	spent: Vec<Coin>,
	amounts: Vec<(u64, OutputFeatures)>,
	fee: u64,
	pegin: u64,
	pegout: Option<PegOutCoin>,
	lock_height: u64,
}

impl<'a> TxBuilder<'a> {
	/// Empty builder.
	pub fn new(crypto: &'a Crypto) -> TxBuilder<'a> {
		TxBuilder {
			crypto,
			spent: vec![],
			amounts: vec![],
			fee: 0,
			pegin: 0,
			pegout: None,
			lock_height: 0,
		}
	}

	/// Spend `coin`.
	pub fn spend(mut self, coin: &Coin) -> TxBuilder<'a> {
		self.spent.push(coin.clone());
		self
	}

	/// Create an output of `amount`.
	pub fn output(mut self, amount: u64) -> TxBuilder<'a> {
		self.amounts.push((amount, OutputFeatures::empty()));
		self
	}

	/// Create a pegged-in output of `amount`.
	pub fn pegged_in_output(mut self, amount: u64) -> TxBuilder<'a> {
		self.amounts.push((amount, OutputFeatures::PEGGED_IN));
		self
	}

	/// Pay `fee`.
	pub fn fee(mut self, fee: u64) -> TxBuilder<'a> {
		self.fee = fee;
		self
	}

	/// Peg in `amount`.
	pub fn pegin(mut self, amount: u64) -> TxBuilder<'a> {
		self.pegin = amount;
		self
	}

	/// Peg out `amount` to `script_pubkey`.
	pub fn pegout(mut self, amount: u64, script_pubkey: Vec<u8>) -> TxBuilder<'a> {
		self.pegout = Some(PegOutCoin {
			amount,
			script_pubkey,
		});
		self
	}

	/// Lock the kernel until `height`.
	pub fn lock_height(mut self, height: u64) -> TxBuilder<'a> {
		self.lock_height = height;
		self
	}

	/// Build the transaction, returning it with the coins it creates. Amounts
	/// are not checked, an unbalanced transaction simply fails validation.
	pub fn build(self) -> Result<(Transaction, Vec<Coin>), Error> {
		let crypto = self.crypto;
		let mut created = Vec::with_capacity(self.amounts.len());
		for (amount, features) in &self.amounts {
			created.push(coin(crypto, *amount, *features)?);
		}

		let out_blinds: Vec<BlindingFactor> = created.iter().map(|c| c.blind.clone()).collect();
		let in_blinds: Vec<BlindingFactor> = self.spent.iter().map(|c| c.blind.clone()).collect();
		let excess = crypto.add_blinding_factors(&out_blinds, &in_blinds)?;
		let kernel_offset = rand_key(crypto);
		let kernel_blind = crypto.add_blinding_factors(&[excess], &[kernel_offset.clone()])?;
		let kernel = Kernel::create(
			crypto,
			&kernel_blind,
			self.fee,
			self.pegin,
			self.pegout,
			self.lock_height,
		)?;

		let out_keys: Vec<BlindingFactor> =
			created.iter().map(|c| c.sender_key.clone()).collect();
		let in_keys: Vec<BlindingFactor> =
			self.spent.iter().map(|c| c.sender_key.clone()).collect();
		let owner_offset = crypto.add_blinding_factors(&out_keys, &in_keys)?;

		let inputs = self.spent.iter().map(|c| c.input()).collect();
		let outputs = created.iter().map(|c| c.output).collect();
		let tx = Transaction::new(
			kernel_offset,
			owner_offset,
			TxBody::new(inputs, outputs, vec![kernel], vec![]),
		);
		Ok((tx, created))
	}
}
