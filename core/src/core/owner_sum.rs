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

//! Owner sums, the key counterpart of the kernel sums:
//! `sum(output sender keys) == sum(input keys) + owner_offset*G`.
//! An input carries the sender key of the output it spends, so cutting
//! through a matched pair removes the same key from both sides.

use crate::core::transaction::{Error, TxBody};
use crate::keychain::BlindingFactor;
use crate::libtx::Crypto;
use crate::util::secp::key::PublicKey;

/// Check the owner key balance of a body.
pub fn validate(crypto: &Crypto, body: &TxBody, owner_offset: &BlindingFactor) -> Result<(), Error> {
	let senders: Vec<PublicKey> = body.outputs().iter().map(|o| o.sender_pubkey).collect();

	let mut spent: Vec<PublicKey> = body.inputs().iter().map(|i| i.pubkey).collect();
	if !owner_offset.is_zero() {
		spent.push(crypto.calculate_public_key(owner_offset)?);
	}

	let lhs = crypto.add_public_keys(&senders);
	let rhs = crypto.add_public_keys(&spent);
	if lhs != rhs {
		return Err(Error::OwnerSums);
	}
	Ok(())
}
