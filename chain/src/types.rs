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

//! Base types that the chain module requires.

use crate::core::core::hash::Hash;
use crate::core::core::pmmr::LeafIndex;
use crate::core::core::{Block, Header, Output, PegInCoin, PegOutCoin};
use crate::core::ser::{self, Readable, Reader, Writeable, Writer};
use crate::util::secp::pedersen::Commitment;

/// An unspent output, where and when it was created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Utxo {
	/// Height of the block that created it
	pub height: u64,
	/// Leaf of the output and range proof MMRs holding it
	pub leaf_idx: LeafIndex,
	/// The output itself
	pub output: Output,
}

impl Utxo {
	/// Commitment of the output
	pub fn commitment(&self) -> Commitment {
		self.output.commit
	}
}

impl Writeable for Utxo {
	fn write<W: Writer>(&self, writer: &mut W) -> Result<(), ser::Error> {
		writer.write_u64(self.height)?;
		self.leaf_idx.write(writer)?;
		self.output.write(writer)
	}
}

impl Readable for Utxo {
	fn read<R: Reader>(reader: &mut R) -> Result<Utxo, ser::Error> {
		Ok(Utxo {
			height: reader.read_u64()?,
			leaf_idx: LeafIndex::read(reader)?,
			output: Output::read(reader)?,
		})
	}
}

/// What it takes to take a block back off the state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockUndo {
	/// Header the state was at before the block
	pub previous_header: Header,
	/// Outputs the block spent, in spending order
	pub coins_spent: Vec<Utxo>,
	/// Commitments of the outputs the block created, in creation order
	pub coins_added: Vec<Commitment>,
}

impl Writeable for BlockUndo {
	fn write<W: Writer>(&self, writer: &mut W) -> Result<(), ser::Error> {
		self.previous_header.write(writer)?;
		self.coins_spent.write(writer)?;
		self.coins_added.write(writer)
	}
}

impl Readable for BlockUndo {
	fn read<R: Reader>(reader: &mut R) -> Result<BlockUndo, ser::Error> {
		Ok(BlockUndo {
			previous_header: Header::read(reader)?,
			coins_spent: Vec::read(reader)?,
			coins_added: Vec::read(reader)?,
		})
	}
}

/// The trusted chain of extension block headers, as the base chain sees it.
pub trait HeaderProvider: Send + Sync {
	/// Header with the given hash.
	fn get_header(&self, hash: &Hash) -> Option<Header>;

	/// Full block with the given header hash.
	fn get_block(&self, hash: &Hash) -> Option<Block>;

	/// Header with the given hash, along with the peg-ins and peg-outs the
	/// base chain expects its block to carry.
	fn get_header_and_pegs(&self, hash: &Hash) -> Option<(Header, Vec<PegInCoin>, Vec<PegOutCoin>)>;
}

/// Chain configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChainConfig {
	/// Directory under which the chain state is stored
	pub db_root: String,
	/// Compact the output and range proof MMRs every this many blocks, 0
	/// to never compact on its own
	#[serde(default)]
	pub compaction_interval: u64,
}

impl Default for ChainConfig {
	fn default() -> ChainConfig {
		ChainConfig {
			db_root: "chain_data".to_string(),
			compaction_interval: 0,
		}
	}
}
