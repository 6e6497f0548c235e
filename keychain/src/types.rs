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

/// BlindingFactor is a useful wrapper around a private key to help with
/// commitment generation and offset arithmetic.
use std::fmt;

use rand::thread_rng;
use zeroize::Zeroize;

use crate::util;
use crate::util::secp::constants::SECRET_KEY_SIZE;
use crate::util::secp::key::{PublicKey, SecretKey, ZERO_KEY};
use crate::util::secp::{self, Secp256k1};

/// Keychain error
#[derive(Clone, Eq, PartialEq, Debug, thiserror::Error)]
pub enum Error {
	/// Wraps an error from the secp library
	#[error("Keychain secp error: {0}")]
	Secp(secp::Error),
}

impl From<secp::Error> for Error {
	fn from(e: secp::Error) -> Error {
		Error::Secp(e)
	}
}

/// A 32 byte scalar. The all zero value is accepted and treated as the
/// additive identity even though it is not a valid secp secret key.
#[derive(Default, Clone, PartialEq, Eq, Zeroize)]
#[zeroize(drop)]
pub struct BlindingFactor([u8; SECRET_KEY_SIZE]);

impl fmt::Debug for BlindingFactor {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.to_hex())
	}
}

impl AsRef<[u8]> for BlindingFactor {
	fn as_ref(&self) -> &[u8] {
		&self.0
	}
}

impl BlindingFactor {
	/// Wrap a secret key.
	pub fn from_secret_key(skey: SecretKey) -> BlindingFactor {
		BlindingFactor::from_slice(&skey.as_ref())
	}

	/// Build from raw bytes, zero padded or truncated to 32 bytes.
	pub fn from_slice(data: &[u8]) -> BlindingFactor {
		let mut blind = [0; SECRET_KEY_SIZE];
		let len = data.len().min(SECRET_KEY_SIZE);
		blind[..len].copy_from_slice(&data[..len]);
		BlindingFactor(blind)
	}

	/// The additive identity.
	pub fn zero() -> BlindingFactor {
		BlindingFactor([0; SECRET_KEY_SIZE])
	}

	/// Whether this is the additive identity.
	pub fn is_zero(&self) -> bool {
		self.0 == [0; SECRET_KEY_SIZE]
	}

	/// Fresh random blinding factor.
	pub fn rand(secp: &Secp256k1) -> BlindingFactor {
		BlindingFactor::from_secret_key(SecretKey::new(secp, &mut thread_rng()))
	}

	/// Hex representation
	pub fn to_hex(&self) -> String {
		util::to_hex(&self.0)
	}

	/// Parse from a hex string.
	pub fn from_hex(hex: &str) -> Result<BlindingFactor, Error> {
		let bytes = util::from_hex(hex).map_err(|_| Error::Secp(secp::Error::InvalidSecretKey))?;
		Ok(BlindingFactor::from_slice(&bytes))
	}

	/// The underlying secret key. Zero maps onto `ZERO_KEY`, which the curve
	/// operations must never be handed directly.
	pub fn secret_key(&self, secp: &Secp256k1) -> Result<SecretKey, Error> {
		if self.is_zero() {
			Ok(ZERO_KEY)
		} else {
			SecretKey::from_slice(secp, &self.0).map_err(Error::Secp)
		}
	}

	/// Public key `self*G`. Fails for zero.
	pub fn public_key(&self, secp: &Secp256k1) -> Result<PublicKey, Error> {
		let skey = self.secret_key(secp)?;
		PublicKey::from_secret_key(secp, &skey).map_err(Error::Secp)
	}

	/// Sum of `positive` minus sum of `negative`, zero factors skipped.
	pub fn sum(
		secp: &Secp256k1,
		positive: &[BlindingFactor],
		negative: &[BlindingFactor],
	) -> Result<BlindingFactor, Error> {
		let to_keys = |factors: &[BlindingFactor]| -> Result<Vec<SecretKey>, Error> {
			factors
				.iter()
				.filter(|b| !b.is_zero())
				.map(|b| b.secret_key(secp))
				.collect()
		};
		let pos = to_keys(positive)?;
		let neg = to_keys(negative)?;
		if pos.is_empty() && neg.is_empty() {
			return Ok(BlindingFactor::zero());
		}
		if pos == neg {
			return Ok(BlindingFactor::zero());
		}
		match secp.blind_sum(pos, neg) {
			Ok(sum) => Ok(BlindingFactor::from_secret_key(sum)),
			// the only way a well formed sum fails is by landing on zero
			Err(secp::Error::InvalidSecretKey) => Ok(BlindingFactor::zero()),
			Err(e) => Err(Error::Secp(e)),
		}
	}

	/// `self + other`
	pub fn add(&self, secp: &Secp256k1, other: &BlindingFactor) -> Result<BlindingFactor, Error> {
		BlindingFactor::sum(secp, &[self.clone(), other.clone()], &[])
	}

	/// `self - other`
	pub fn sub(&self, secp: &Secp256k1, other: &BlindingFactor) -> Result<BlindingFactor, Error> {
		BlindingFactor::sum(secp, &[self.clone()], &[other.clone()])
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::util::secp::ContextFlag;

	#[test]
	fn blind_sum_roundtrip() {
		let secp = Secp256k1::with_caps(ContextFlag::Commit);
		let a = BlindingFactor::rand(&secp);
		let b = BlindingFactor::rand(&secp);

		let sum = a.add(&secp, &b).unwrap();
		assert_eq!(sum.sub(&secp, &b).unwrap(), a);
		assert_eq!(a.sub(&secp, &a).unwrap(), BlindingFactor::zero());
		assert_eq!(a.add(&secp, &BlindingFactor::zero()).unwrap(), a);
		assert_eq!(
			BlindingFactor::sum(&secp, &[], &[]).unwrap(),
			BlindingFactor::zero()
		);
	}

	#[test]
	fn hex_roundtrip() {
		let secp = Secp256k1::with_caps(ContextFlag::Commit);
		let a = BlindingFactor::rand(&secp);
		assert_eq!(BlindingFactor::from_hex(&a.to_hex()).unwrap(), a);
	}
}
