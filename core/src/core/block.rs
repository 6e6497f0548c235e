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

//! Blocks and blockheaders

use std::fmt;

use crate::core::committed;
use crate::core::hash::{DefaultHashable, Hash, Hashed, ZERO_HASH};
use crate::core::owner_sum;
use crate::core::transaction::{
	Error, Input, Kernel, Output, PegInCoin, PegOutCoin, SignedMessage, TxBody,
};
use crate::keychain::BlindingFactor;
use crate::libtx::Crypto;
use crate::ser::{self, Readable, Reader, Writeable, Writer};

/// Extension block header. Commits to the state after the block: the roots
/// and sizes of the three MMRs, the leaf set root, and the offsets.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Header {
	/// Height of this block since the activation of the extension block
	pub height: u64,
	/// Root of the output MMR
	pub output_root: Hash,
	/// Root of the range proof MMR
	pub rangeproof_root: Hash,
	/// Root of the kernel MMR
	pub kernel_root: Hash,
	/// Root of the leaf set over all outputs ever created
	pub leafset_root: Hash,
	/// Total accumulated sum of kernel offsets since genesis
	pub kernel_offset: BlindingFactor,
	/// Owner offset of this block alone
	pub owner_offset: BlindingFactor,
	/// Number of outputs ever created, the output MMR leaf count
	pub num_txos: u64,
	/// Number of kernels ever included, the kernel MMR leaf count
	pub num_kernels: u64,
}

impl Default for Header {
	fn default() -> Header {
		Header {
			height: 0,
			output_root: ZERO_HASH,
			rangeproof_root: ZERO_HASH,
			kernel_root: ZERO_HASH,
			leafset_root: ZERO_HASH,
			kernel_offset: BlindingFactor::zero(),
			owner_offset: BlindingFactor::zero(),
			num_txos: 0,
			num_kernels: 0,
		}
	}
}

impl DefaultHashable for Header {}

impl fmt::Display for Header {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "header {} at {}", self.hash(), self.height)
	}
}

impl Writeable for Header {
	fn write<W: Writer>(&self, writer: &mut W) -> Result<(), ser::Error> {
		writer.write_u64(self.height)?;
		self.output_root.write(writer)?;
		self.rangeproof_root.write(writer)?;
		self.kernel_root.write(writer)?;
		self.leafset_root.write(writer)?;
		self.kernel_offset.write(writer)?;
		self.owner_offset.write(writer)?;
		writer.write_u64(self.num_txos)?;
		writer.write_u64(self.num_kernels)
	}
}

impl Readable for Header {
	fn read<R: Reader>(reader: &mut R) -> Result<Header, ser::Error> {
		Ok(Header {
			height: reader.read_u64()?,
			output_root: Hash::read(reader)?,
			rangeproof_root: Hash::read(reader)?,
			kernel_root: Hash::read(reader)?,
			leafset_root: Hash::read(reader)?,
			kernel_offset: BlindingFactor::read(reader)?,
			owner_offset: BlindingFactor::read(reader)?,
			num_txos: reader.read_u64()?,
			num_kernels: reader.read_u64()?,
		})
	}
}

/// An extension block: the header and the aggregated body of every
/// transaction it includes. There is no reward, value only enters through
/// peg-ins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
	/// The header with metadata and commitments to the rest of the data
	pub header: Header,
	/// The body - inputs/outputs/kernels/owner signatures
	pub body: TxBody,
}

impl Writeable for Block {
	fn write<W: Writer>(&self, writer: &mut W) -> Result<(), ser::Error> {
		self.header.write(writer)?;
		self.body.write(writer)
	}
}

impl Readable for Block {
	fn read<R: Reader>(reader: &mut R) -> Result<Block, ser::Error> {
		Ok(Block {
			header: Header::read(reader)?,
			body: TxBody::read(reader)?,
		})
	}
}

impl Block {
	/// Block from a header and body.
	pub fn new(header: Header, body: TxBody) -> Block {
		Block { header, body }
	}

	/// Hash of the header.
	pub fn hash(&self) -> Hash {
		self.header.hash()
	}

	/// Height
	pub fn height(&self) -> u64 {
		self.header.height
	}

	/// Inputs
	pub fn inputs(&self) -> &[Input] {
		self.body.inputs()
	}

	/// Outputs
	pub fn outputs(&self) -> &[Output] {
		self.body.outputs()
	}

	/// Kernels
	pub fn kernels(&self) -> &[Kernel] {
		self.body.kernels()
	}

	/// Owner signatures
	pub fn owner_sigs(&self) -> &[SignedMessage] {
		self.body.owner_sigs()
	}

	/// Peg-ins claimed by the block's kernels.
	pub fn pegins(&self) -> Vec<PegInCoin> {
		self.body.pegins()
	}

	/// Peg-outs made by the block's kernels.
	pub fn pegouts(&self) -> Vec<PegOutCoin> {
		self.body.pegouts()
	}

	/// Validates all the elements in a block that can be checked without
	/// additional data: the body, lock heights, the pegs against what the
	/// base chain expects, and both sums. `prev_kernel_offset` is the total
	/// offset in the previous header.
	pub fn validate(
		&self,
		crypto: &Crypto,
		prev_kernel_offset: &BlindingFactor,
		expected_pegins: &[PegInCoin],
		expected_pegouts: &[PegOutCoin],
	) -> Result<(), Error> {
		self.body.validate(crypto)?;

		for k in self.kernels() {
			if k.lock_height > self.header.height {
				return Err(Error::KernelLockHeight(k.lock_height));
			}
		}

		if !same_coins(self.pegins(), expected_pegins) {
			return Err(Error::PegInMismatch);
		}
		if !same_coins(self.pegouts(), expected_pegouts) {
			return Err(Error::PegOutMismatch);
		}

		committed::validate_for_block(
			crypto,
			&self.body,
			&self.header.kernel_offset,
			prev_kernel_offset,
		)?;
		owner_sum::validate(crypto, &self.body, &self.header.owner_offset)?;
		Ok(())
	}
}

/// Multiset equality.
fn same_coins<T: Ord + Clone>(mut actual: Vec<T>, expected: &[T]) -> bool {
	let mut expected = expected.to_vec();
	actual.sort();
	expected.sort();
	actual == expected
}
