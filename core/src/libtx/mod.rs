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

//! The commitment algebra: Pedersen commitments, blinding factor sums,
//! bulletproofs and signatures, all behind an explicit `Crypto` handle
//! owning its secp context.

pub mod aggsig;
pub mod build;
mod error;
pub mod proof;

use crate::core::hash::Hash;
use crate::keychain::BlindingFactor;
use crate::util::secp::key::PublicKey;
use crate::util::secp::pedersen::{Commitment, RangeProof};
use crate::util::secp::{Secp256k1, Signature};
use crate::util::SecpContext;

pub use crate::libtx::error::Error;

/// Handle on the curve operations. Cheap to clone, clones share a context.
#[derive(Clone, Default)]
pub struct Crypto {
	ctx: SecpContext,
}

impl Crypto {
	/// Fresh handle with its own context.
	pub fn new() -> Crypto {
		Crypto {
			ctx: SecpContext::new(),
		}
	}

	/// Handle sharing an existing context.
	pub fn with_context(ctx: SecpContext) -> Crypto {
		Crypto { ctx }
	}

	/// Direct access to the underlying context.
	pub fn with_secp<F, T>(&self, f: F) -> T
	where
		F: FnOnce(&Secp256k1) -> T,
	{
		self.ctx.with(f)
	}

	/// The commitment to zero, used as the identity when summing.
	pub fn zero_commitment(&self) -> Result<Commitment, Error> {
		Ok(self.with_secp(|secp| secp.commit_value(0))?)
	}

	/// `value*H` with no blinding.
	pub fn commit_transparent(&self, value: u64) -> Result<Commitment, Error> {
		Ok(self.with_secp(|secp| secp.commit_value(value))?)
	}

	/// `blind*G + value*H`
	pub fn commit_blinded(&self, value: u64, blind: &BlindingFactor) -> Result<Commitment, Error> {
		self.with_secp(|secp| {
			let skey = blind.secret_key(secp)?;
			Ok(secp.commit(value, skey)?)
		})
	}

	/// Sum of `positive` minus sum of `negative`. Zero commitments are
	/// skipped, both sides empty sums to the zero commitment.
	pub fn add_commitments(
		&self,
		positive: &[Commitment],
		negative: &[Commitment],
	) -> Result<Commitment, Error> {
		let zero = self.zero_commitment()?;
		let pos: Vec<Commitment> = positive.iter().filter(|c| **c != zero).cloned().collect();
		let neg: Vec<Commitment> = negative.iter().filter(|c| **c != zero).cloned().collect();
		if pos.is_empty() && neg.is_empty() {
			return Ok(zero);
		}
		Ok(self.with_secp(|secp| secp.commit_sum(pos, neg))?)
	}

	/// Sum of `positive` minus sum of `negative`.
	pub fn add_blinding_factors(
		&self,
		positive: &[BlindingFactor],
		negative: &[BlindingFactor],
	) -> Result<BlindingFactor, Error> {
		Ok(self.with_secp(|secp| BlindingFactor::sum(secp, positive, negative))?)
	}

	/// Bulletproof that `value` lies in range, for `commit_blinded(value, blind)`.
	pub fn generate_range_proof(
		&self,
		value: u64,
		blind: &BlindingFactor,
	) -> Result<RangeProof, Error> {
		self.with_secp(|secp| {
			let skey = blind.secret_key(secp)?;
			Ok(proof::create(secp, value, skey))
		})
	}

	/// Batch verify range proofs. An empty batch is valid.
	pub fn verify_range_proofs(&self, proofs: &[(Commitment, RangeProof)]) -> bool {
		if proofs.is_empty() {
			return true;
		}
		let commits = proofs.iter().map(|(c, _)| *c).collect();
		let proofs = proofs.iter().map(|(_, p)| *p).collect();
		self.with_secp(|secp| proof::verify_multi(secp, commits, proofs).is_ok())
	}

	/// Sign `msg` with `key`.
	pub fn build_signature(&self, key: &BlindingFactor, msg: &Hash) -> Result<Signature, Error> {
		self.with_secp(|secp| {
			let skey = key.secret_key(secp)?;
			aggsig::sign_single(secp, msg, &skey)
		})
	}

	/// Batch verify `(signature, public key, message)` triples. An empty batch
	/// is valid.
	pub fn verify_signatures(&self, sigs: &[(Signature, PublicKey, Hash)]) -> bool {
		if sigs.is_empty() {
			return true;
		}
		let mut msgs = Vec::with_capacity(sigs.len());
		for (_, _, msg) in sigs {
			match aggsig::message(msg) {
				Ok(m) => msgs.push(m),
				Err(_) => return false,
			}
		}
		let pubkeys = sigs.iter().map(|(_, k, _)| *k).collect();
		let sigs = sigs.iter().map(|(s, _, _)| *s).collect();
		self.with_secp(|secp| aggsig::verify_batch(secp, &sigs, &msgs, &pubkeys))
	}

	/// `key*G`
	pub fn calculate_public_key(&self, key: &BlindingFactor) -> Result<PublicKey, Error> {
		Ok(self.with_secp(|secp| key.public_key(secp))?)
	}

	/// Sum of public keys. None stands for the point at infinity, the sum of
	/// an empty list or of keys cancelling out.
	pub fn add_public_keys(&self, keys: &[PublicKey]) -> Option<PublicKey> {
		if keys.is_empty() {
			return None;
		}
		let refs: Vec<&PublicKey> = keys.iter().collect();
		// parsed keys can only fail to combine by summing to infinity
		self.with_secp(|secp| PublicKey::from_combination(secp, refs).ok())
	}

	/// The public key behind a commitment to zero value, used to verify
	/// kernel signatures against their excess.
	pub fn to_public_key(&self, commit: &Commitment) -> Result<PublicKey, Error> {
		Ok(self.with_secp(|secp| commit.to_pubkey(secp))?)
	}
}
