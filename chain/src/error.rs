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

//! Error types for chain

use crate::core::core::pmmr;
use crate::core::core::transaction;
use crate::core::libtx;
use crate::core::ser;
use crate::keychain;
use crate::util::secp;
use crate::util::secp::pedersen::Commitment;
use mweb_store as store;
use std::io;

/// Chain error definitions
#[derive(Clone, Eq, PartialEq, Debug, thiserror::Error)]
pub enum Error {
	/// The block doesn't fit on top of our state
	#[error("Block is unfit: {0}")]
	Unfit(String),
	/// A transaction or block failed validation
	#[error("Transaction Validation Error: {0}")]
	Transaction(transaction::Error),
	/// Peg-ins in the block differ from what the base chain expects
	#[error("Peg-in mismatch")]
	PegInMismatch,
	/// Peg-outs in the block differ from what the base chain expects
	#[error("Peg-out mismatch")]
	PegOutMismatch,
	/// MMR roots or sizes don't match the header committing to them
	#[error("MMR mismatch: {0}")]
	MmrMismatch(String),
	/// An input spends a commitment with no live output
	#[error("UTXO missing: {0:?}")]
	UtxoMissing(Commitment),
	/// A snapshot or the on-disk state is inconsistent
	#[error("Invalid state: {0}")]
	InvalidState(String),
	/// Error from the MMR or one of its backends
	#[error("MMR error: {0}")]
	Mmr(pmmr::Error),
	/// Internal issue when trying to save or load data from store
	#[error("Store Error: {1}, reason: {0}")]
	StoreErr(store::Error, String),
	/// Internal issue when trying to save or load data from files
	#[error("File Error: {0}")]
	FileErr(String),
	/// Error serializing or deserializing a type
	#[error("Serialization Error: {0}")]
	SerErr(ser::Error),
	/// Error from underlying secp lib
	#[error("Secp Lib Error: {0:?}")]
	Secp(secp::Error),
	/// Error from underlying keychain impl
	#[error("Keychain Error: {0}")]
	Keychain(keychain::Error),
	/// Anything else
	#[error("Other Error: {0}")]
	Other(String),
}

impl Error {
	/// Whether the error is due to data that was intrinsically wrong, as
	/// opposed to a failure of the node itself.
	pub fn is_bad_data(&self) -> bool {
		// shorter to match on all the "not the data's fault" errors
		match self {
			Error::Transaction(e) => e.is_consensus(),
			Error::Unfit(_)
			| Error::Mmr(_)
			| Error::StoreErr(_, _)
			| Error::FileErr(_)
			| Error::SerErr(_)
			| Error::Secp(_)
			| Error::Keychain(_)
			| Error::Other(_) => false,
			_ => true,
		}
	}
}

impl From<transaction::Error> for Error {
	fn from(error: transaction::Error) -> Error {
		match error {
			transaction::Error::PegInMismatch => Error::PegInMismatch,
			transaction::Error::PegOutMismatch => Error::PegOutMismatch,
			e => Error::Transaction(e),
		}
	}
}

impl From<store::Error> for Error {
	fn from(error: store::Error) -> Error {
		let reason = format!("{:?}", error);
		Error::StoreErr(error, reason)
	}
}

impl From<pmmr::Error> for Error {
	fn from(error: pmmr::Error) -> Error {
		Error::Mmr(error)
	}
}

impl From<ser::Error> for Error {
	fn from(error: ser::Error) -> Error {
		Error::SerErr(error)
	}
}

impl From<io::Error> for Error {
	fn from(e: io::Error) -> Error {
		Error::FileErr(e.to_string())
	}
}

impl From<secp::Error> for Error {
	fn from(e: secp::Error) -> Error {
		Error::Secp(e)
	}
}

impl From<keychain::Error> for Error {
	fn from(e: keychain::Error) -> Error {
		Error::Keychain(e)
	}
}

impl From<libtx::Error> for Error {
	fn from(e: libtx::Error) -> Error {
		Error::from(transaction::Error::from(e))
	}
}
