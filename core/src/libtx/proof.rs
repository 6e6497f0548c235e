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

//! Rangeproof library functions

use rand::thread_rng;

use crate::util::secp::key::SecretKey;
use crate::util::secp::pedersen::{Commitment, RangeProof};
use crate::util::secp::{self, Secp256k1};

/// Create a bulletproof for `amount` committed to with `blind`. Nonces are
/// random, the proof is not meant to be rewound.
pub fn create(secp: &Secp256k1, amount: u64, blind: SecretKey) -> RangeProof {
	let rewind_nonce = SecretKey::new(secp, &mut thread_rng());
	let private_nonce = SecretKey::new(secp, &mut thread_rng());
	secp.bullet_proof(amount, blind, rewind_nonce, private_nonce, None, None)
}

/// Verify a single proof
pub fn verify(secp: &Secp256k1, commit: Commitment, proof: RangeProof) -> Result<(), secp::Error> {
	secp.verify_bullet_proof(commit, proof, None).map(|_| ())
}

/// Batch verify proofs against their commitments.
pub fn verify_multi(
	secp: &Secp256k1,
	commits: Vec<Commitment>,
	proofs: Vec<RangeProof>,
) -> Result<(), secp::Error> {
	secp.verify_bullet_proof_multi(commits, proofs, None)
		.map(|_| ())
}
