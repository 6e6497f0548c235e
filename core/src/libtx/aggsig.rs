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

//! Single signer Schnorr signatures over 32 byte message hashes. Thin layer
//! over the aggsig module of the secp library.

use crate::core::hash::Hash;
use crate::libtx::error::Error;
use crate::util::secp::key::{PublicKey, SecretKey};
use crate::util::secp::{aggsig, Message, Secp256k1, Signature};

/// Message for a 32 byte hash.
pub fn message(hash: &Hash) -> Result<Message, Error> {
	Ok(Message::from_slice(hash.as_bytes())?)
}

/// Sign `msg` with `skey`, committing to the signer's own public key in `e`
/// so the result batch verifies against that key alone.
pub fn sign_single(secp: &Secp256k1, msg: &Hash, skey: &SecretKey) -> Result<Signature, Error> {
	let pubkey = PublicKey::from_secret_key(secp, skey)?;
	let msg = message(msg)?;
	let sig = aggsig::sign_single(secp, &msg, skey, None, None, None, Some(&pubkey), None)?;
	Ok(sig)
}

/// Verifies a single signature.
pub fn verify_single(secp: &Secp256k1, sig: &Signature, msg: &Hash, pubkey: &PublicKey) -> bool {
	match message(msg) {
		Ok(msg) => aggsig::verify_single(secp, sig, &msg, None, pubkey, Some(pubkey), None, false),
		Err(_) => false,
	}
}

/// Verify a batch of signatures.
pub fn verify_batch(
	secp: &Secp256k1,
	sigs: &Vec<Signature>,
	msgs: &Vec<Message>,
	pubkeys: &Vec<PublicKey>,
) -> bool {
	aggsig::verify_batch(secp, sigs, msgs, pubkeys)
}
